use std::cell::RefCell;
use std::rc::Rc;

use crate::dependencies::Dependencies;
use crate::{Observable, Version};

/// Tracking frame of a single run of a computed or a reaction.
///
/// Every tracked read (`get(cx)`) records itself here. Nested evaluations
/// get frames of their own, so the frames form a stack that follows the
/// call chain.
pub struct Evaluation {
	reads: RefCell<Dependencies>,
}

impl Evaluation {
	pub(crate) fn new() -> Self {
		Evaluation {
			reads: RefCell::new(Dependencies::new()),
		}
	}

	pub(crate) fn based_on(&self, observable: Rc<dyn Observable>, version: Version) {
		self.reads.borrow_mut().based_on(observable, version);
	}

	/// Ends the frame and hands over what it read.
	pub(crate) fn take(self) -> Dependencies {
		self.reads.into_inner()
	}
}

impl AsRef<Evaluation> for Evaluation {
	fn as_ref(&self) -> &Evaluation {
		self
	}
}
