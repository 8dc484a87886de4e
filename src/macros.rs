pub use enclose::*;

/// Builds a [`Computed`](crate::Computed), cloning the listed handles into
/// the closure first.
///
/// ```
/// use reactant::{computed, Var};
///
/// let a = Var::new(2);
/// let double = computed!((a) cx => *a.get(cx) * 2);
/// assert_eq!(*double.get_once().unwrap(), 4);
/// ```
#[macro_export]
macro_rules! computed {
    (( $($d_tt:tt)* ) $ctx:ident => $($b:tt)*) => {
        $crate::Computed::new($crate::macros::enclose!(($( $d_tt )*) move |$ctx: &$crate::Evaluation| { $($b)* }))
    };
    ($ctx:ident => $($b:tt)*) => {
        $crate::Computed::new(move |$ctx: &$crate::Evaluation| { $($b)* })
    };
}

/// Builds a [`Reaction`](crate::Reaction) and runs it once. The body has to
/// evaluate to `reactant::Result<()>`.
///
/// ```
/// use reactant::{autorun, Var};
///
/// let a = Var::new(1);
/// let log = autorun!((a) cx => {
///     println!("a = {}", *a.get(cx));
///     Ok(())
/// });
/// a.set(2);
/// log.dispose();
/// ```
#[macro_export]
macro_rules! autorun {
    (( $($d_tt:tt)* ) $ctx:ident => $($b:tt)*) => {
        $crate::Reaction::new($crate::macros::enclose!(($( $d_tt )*) move |$ctx: &$crate::Evaluation| { $($b)* }))
    };
    ($ctx:ident => $($b:tt)*) => {
        $crate::Reaction::new(move |$ctx: &$crate::Evaluation| { $($b)* })
    };
}
