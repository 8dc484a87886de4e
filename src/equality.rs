use std::fmt::Debug;
use std::hash::Hash;
use std::rc::Rc;

/// Decides whether a new value is a change worth propagating.
///
/// Vars use it to skip writes that change nothing, computeds use it to stop
/// invalidation when a recomputation produced the same output.
pub struct Equality<T: ?Sized> {
	func: Rc<dyn Fn(&T, &T) -> bool>,
}

impl<T: ?Sized> Clone for Equality<T> {
	fn clone(&self) -> Self {
		Equality {
			func: self.func.clone(),
		}
	}
}

impl<T> Equality<T>
where
	T: ?Sized + 'static,
{
	/// `PartialEq` comparison.
	pub fn structural() -> Self
	where
		T: PartialEq,
	{
		Equality::custom(|a: &T, b: &T| a == b)
	}

	/// Two values are equal when their fxhash digests match.
	pub fn hashed() -> Self
	where
		T: Hash,
	{
		Equality::custom(|a: &T, b: &T| fxhash::hash64(a) == fxhash::hash64(b))
	}

	/// Every value is a change.
	pub fn never() -> Self {
		Equality::custom(|_: &T, _: &T| false)
	}

	pub fn custom(func: impl Fn(&T, &T) -> bool + 'static) -> Self {
		Equality {
			func: Rc::new(func),
		}
	}

	#[inline]
	pub fn equals(&self, a: &T, b: &T) -> bool {
		(self.func)(a, b)
	}
}

impl<U> Equality<Rc<U>>
where
	U: ?Sized + 'static,
{
	/// Pointer identity.
	pub fn by_reference() -> Self {
		Equality::custom(|a: &Rc<U>, b: &Rc<U>| Rc::ptr_eq(a, b))
	}
}

impl<T> Default for Equality<T>
where
	T: PartialEq + ?Sized + 'static,
{
	fn default() -> Self {
		Equality::structural()
	}
}

impl<T: ?Sized> Debug for Equality<T> {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Equality").finish_non_exhaustive()
	}
}
