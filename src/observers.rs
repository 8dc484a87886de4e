use std::collections::BTreeMap;
use std::rc::Weak;

use smallvec::SmallVec;

use crate::{Derived, Invalid, NodeId};

pub(crate) type Snapshot = SmallVec<[Weak<dyn Derived>; 4]>;

/// Back-edges from an observable to everything that read it during its
/// last evaluation. Edges are weak: dependents own their dependencies,
/// never the other way around.
#[derive(Default)]
pub(crate) struct Observers {
	used_by: BTreeMap<NodeId, Weak<dyn Derived>>,
}

impl Observers {
	pub fn new() -> Self {
		Observers {
			used_by: BTreeMap::new(),
		}
	}

	pub fn insert(&mut self, id: NodeId, derived: Weak<dyn Derived>) {
		self.used_by.insert(id, derived);
	}

	/// Returns `true` when the last observer went away.
	pub fn remove(&mut self, id: NodeId) -> bool {
		self.used_by.remove(&id).is_some() && self.used_by.is_empty()
	}

	pub fn is_empty(&self) -> bool {
		self.used_by.is_empty()
	}

	pub fn len(&self) -> usize {
		self.used_by.len()
	}

	/// Copies the edges out so that no borrow is held while they are
	/// notified.
	pub fn snapshot(&self) -> Snapshot {
		self.used_by.values().cloned().collect()
	}
}

pub(crate) fn invalidate(observers: Snapshot, invalid: Invalid) {
	for item in observers {
		if let Some(item) = item.upgrade() {
			item.invalidate(invalid)
		}
	}
}
