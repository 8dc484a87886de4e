//! Transparent reactive state for single-threaded programs.
//!
//! A [`Var`] holds a value, a [`Computed`] caches a function of other vars and
//! computeds, and a [`Reaction`] runs side effects whenever the things it read
//! change. Reads are tracked through the [`Evaluation`] passed to every
//! computation, so dependencies are rediscovered on each run and branches that
//! were not taken are not tracked.
//!
//! Writes never run reactions directly. They mark dependents stale and queue
//! the reactions, which run once the outermost [`batch`] is over.

pub mod macros;

mod batch;
mod computed;
mod config;
mod r#const;
mod dependencies;
mod equality;
mod error;
mod evaluation;
mod observers;
mod reaction;
mod value;
mod var;

use std::rc::Weak;
use std::sync::atomic::{AtomicU64, Ordering};

pub use batch::{batch, in_batch, run_in_action};
pub use computed::{Computed, Options};
pub use config::{config, configure, Config};
pub use equality::Equality;
pub use error::{on_reaction_error, Error, ErrorSubscription, Result};
pub use evaluation::Evaluation;
pub use r#const::Const;
pub use reaction::{autorun, reaction, Reaction, Reactions};
pub use value::{Access, Ref, Value};
pub use var::{Toggle, Var};

pub trait Derived: 'static {
	/// Called when something this node depends on has (`Definitely`)
	/// or may have (`Maybe`) changed.
	fn invalidate(self: std::rc::Rc<Self>, invalid: Invalid);
}

pub trait Observable: 'static {
	fn id(&self) -> NodeId;

	/// This function is called when we want
	/// this observable to bring itself up to date.
	fn update(&self) -> Result<Version>;

	/// This function should return the current
	/// computed version.
	fn version(&self) -> Version;

	/// Notify this observable that `derived` started
	/// to listen.
	fn used_by(&self, id: NodeId, derived: Weak<dyn Derived>);

	/// Notify this observable that `derived` stopped
	/// to listen.
	fn not_used_by(&self, id: NodeId);
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum State {
	/// No dependencies are tracked and nothing is cached: the node was never
	/// observed, or it was suspended after losing its last observer.
	Untracked,
	UpToDate,
	/// Something upstream changed, but it is not known yet whether any
	/// direct dependency actually produced a different value.
	PossiblyStale,
	Stale,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Invalid {
	Maybe,
	Definitely,
}

impl From<Invalid> for State {
	fn from(invalid: Invalid) -> Self {
		match invalid {
			Invalid::Maybe => State::PossiblyStale,
			Invalid::Definitely => State::Stale,
		}
	}
}

/// Monotonic change counter of an observable node.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Clone, Copy)]
pub struct Version(u64);

impl Version {
	pub(crate) const INITIAL: Version = Version(0);

	pub(crate) fn next(self) -> Self {
		Version(self.0 + 1)
	}
}

/// Stable identity of a node. Ids grow with creation time, which makes them
/// usable as registration order.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Clone, Copy)]
pub struct NodeId(u64);

impl NodeId {
	pub(crate) fn next() -> Self {
		static NEXT: AtomicU64 = AtomicU64::new(1);
		NodeId(NEXT.fetch_add(1, Ordering::Relaxed))
	}
}
