use std::rc::{Rc, Weak};

use fxhash::FxHashMap;
use smallvec::SmallVec;

use crate::{Derived, NodeId, Observable, Version};

pub(crate) type Snapshot = SmallVec<[(Rc<dyn Observable>, Version); 8]>;

/// Everything a derivation read during one evaluation, in read order,
/// together with the version it saw.
#[derive(Default)]
pub(crate) struct Dependencies {
	based_on: Vec<(Rc<dyn Observable>, Version)>,
	index: FxHashMap<NodeId, usize>,
}

impl Dependencies {
	pub fn new() -> Self {
		Self {
			based_on: Vec::new(),
			index: FxHashMap::default(),
		}
	}

	pub fn len(&self) -> usize {
		self.based_on.len()
	}

	pub fn contains(&self, id: NodeId) -> bool {
		self.index.contains_key(&id)
	}

	/// Records a read. Only the first read of a node counts.
	pub(crate) fn based_on(&mut self, observable: Rc<dyn Observable>, version: Version) {
		let id = observable.id();
		if self.index.contains_key(&id) {
			return;
		}

		self.index.insert(id, self.based_on.len());
		self.based_on.push((observable, version));
	}

	pub(crate) fn snapshot(&self) -> Snapshot {
		self.based_on.iter().cloned().collect()
	}

	/// Replaces the tracked set with `next`, subscribing `parent` to the
	/// nodes it started to read and unsubscribing it from the ones it
	/// no longer reads.
	pub(crate) fn swap(&mut self, next: Dependencies, id: NodeId, parent: &Weak<dyn Derived>) {
		// Subscribe first: a node read both times must never drop to zero
		// observers in between.
		next.based_on
			.iter()
			.filter(|(observable, _)| !self.contains(observable.id()))
			.for_each(|(observable, _)| observable.used_by(id, parent.clone()));

		let prev = std::mem::replace(self, next);

		// Diff the keys
		prev.based_on
			.iter()
			.filter(|(observable, _)| !self.contains(observable.id()))
			.for_each(|(observable, _)| observable.not_used_by(id));
	}

	/// Tears every edge down.
	pub(crate) fn clear(self, id: NodeId) {
		for (observable, _) in &self.based_on {
			observable.not_used_by(id)
		}
	}
}

/// Brings every dependency up to date, in read order, and checks that none
/// of them moved past the version seen by the last evaluation.
///
/// Stops at the first mismatch, so dependencies that the next evaluation
/// may not read anymore are not recomputed for nothing.
pub(crate) fn are_valid(snapshot: &Snapshot) -> bool {
	for (base, version) in snapshot.iter() {
		match base.update() {
			Ok(current) if current == *version => continue,
			_ => return false,
		}
	}

	true
}
