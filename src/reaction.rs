use std::cell::{Cell, RefCell};
use std::panic::{self, AssertUnwindSafe};
use std::rc::{Rc, Weak};

use smallvec::SmallVec;

use crate::batch::batch;
use crate::config::config;
use crate::dependencies::{self, Dependencies};
use crate::error::{self, Error};
use crate::{Derived, Evaluation, Invalid, NodeId, Result, State};

thread_local! {
	static PENDING: RefCell<Vec<(NodeId, Weak<ReactionBody>)>> = RefCell::new(Vec::new());
	static FLUSHING: Cell<bool> = Cell::new(false);
}

#[derive(Default, Clone)]
pub struct Reactions<const N: usize> {
	vec: SmallVec<[Reaction; N]>,
}

impl<const N: usize> Reactions<N> {
	pub const fn new() -> Self {
		Reactions {
			vec: SmallVec::new_const(),
		}
	}

	pub fn add(&mut self, reaction: Reaction) {
		self.vec.push(reaction);

		#[cfg(debug_assertions)]
		if self.vec.len() > N {
			tracing::trace!(limit = N, "reactions spilled to the heap");
		}
	}

	pub fn update(&self) {
		for reaction in &self.vec {
			reaction.update()
		}
	}

	pub fn dispose(&mut self) {
		for reaction in self.vec.drain(..) {
			reaction.dispose()
		}
	}

	pub fn len(&self) -> usize {
		self.vec.len()
	}

	pub fn is_empty(&self) -> bool {
		self.vec.is_empty()
	}
}

/// A side effect that re-runs whenever something it read changes.
///
/// Reactions never run as a direct consequence of a write: they are queued
/// and run when the outermost batch is over. Dropping the last handle
/// disposes the reaction.
#[derive(Clone)]
pub struct Reaction {
	pub(crate) body: Rc<ReactionBody>,
}

pub(crate) struct ReactionBody {
	id: NodeId,
	name: &'static str,
	func: Box<dyn Fn(&Evaluation) -> Result<()>>,
	state: Cell<State>,
	scheduled: Cell<bool>,
	disposed: Cell<bool>,
	dependencies: RefCell<Dependencies>,
	this: Weak<ReactionBody>,
}

impl Drop for ReactionBody {
	fn drop(&mut self) {
		self.dispose()
	}
}

impl Reaction {
	/// Creates the reaction and runs it right away to collect its
	/// dependencies.
	#[must_use]
	pub fn new(func: impl Fn(&Evaluation) -> Result<()> + 'static) -> Self {
		Self::new_with_name("<unnamed>", func)
	}

	#[must_use]
	pub fn new_with_name(
		name: &'static str,
		func: impl Fn(&Evaluation) -> Result<()> + 'static,
	) -> Self {
		let reaction = Reaction {
			body: Rc::new_cyclic(|this| ReactionBody {
				id: NodeId::next(),
				name,
				func: Box::new(func),
				state: Cell::new(State::Untracked),
				scheduled: Cell::new(false),
				disposed: Cell::new(false),
				dependencies: RefCell::new(Dependencies::new()),
				this: this.clone(),
			}),
		};

		reaction.body.run();
		reaction
	}

	/// Runs the reaction regardless of its state.
	pub fn update_unchecked(&self) {
		self.body.run();
	}

	/// Runs the reaction if anything it depends on has changed.
	pub fn update(&self) {
		self.body.update();
	}

	/// Stops the reaction. Calling it again does nothing.
	pub fn dispose(&self) {
		self.body.dispose();
	}

	pub fn is_disposed(&self) -> bool {
		self.body.disposed.get()
	}

	pub fn id(&self) -> NodeId {
		self.body.id
	}

	pub fn name(&self) -> &'static str {
		self.body.name
	}

	pub fn state(&self) -> State {
		self.body.state.get()
	}

	pub fn dependency_count(&self) -> usize {
		self.body.dependencies.borrow().len()
	}
}

/// Runs `func` now and every time one of the things it read changes.
#[must_use]
pub fn autorun(func: impl Fn(&Evaluation) -> Result<()> + 'static) -> Reaction {
	Reaction::new(func)
}

/// Tracks `expr` and passes its value to `effect`: once right away, then
/// every time the value changes. `effect` itself is not tracked.
#[must_use]
pub fn reaction<T>(
	expr: impl Fn(&Evaluation) -> Result<T> + 'static,
	effect: impl Fn(&T) + 'static,
) -> Reaction
where
	T: PartialEq + 'static,
{
	let previous: RefCell<Option<T>> = RefCell::new(None);

	Reaction::new(move |cx| {
		let next = expr(cx)?;
		let changed = previous.borrow().as_ref() != Some(&next);
		if changed {
			effect(&next);
			*previous.borrow_mut() = Some(next);
		}

		Ok(())
	})
}

impl ReactionBody {
	fn update(&self) {
		self.scheduled.set(false);
		if self.disposed.get() {
			return;
		}

		let stale = match self.state.get() {
			State::UpToDate => false,
			State::PossiblyStale => {
				let snapshot = self.dependencies.borrow().snapshot();
				!dependencies::are_valid(&snapshot)
			}
			State::Stale | State::Untracked => true,
		};

		if stale || self.state.get() == State::Stale {
			self.run();
		} else {
			self.state.set(State::UpToDate);
		}
	}

	fn run(&self) {
		if self.disposed.get() {
			return;
		}

		let _span = tracing::trace_span!("reaction", name = self.name).entered();

		batch(|| {
			self.state.set(State::UpToDate);

			let eval = Evaluation::new();
			let result = panic::catch_unwind(AssertUnwindSafe(|| (self.func)(&eval)))
				.unwrap_or_else(|payload| {
					Err(Error::Panicked {
						name: self.name,
						message: error::panic_message(payload.as_ref()),
					})
				});

			// The reaction may have disposed itself while running.
			if !self.disposed.get() {
				let parent = self.this.clone() as Weak<dyn Derived>;
				self.dependencies
					.borrow_mut()
					.swap(eval.take(), self.id, &parent);
			}

			if let Err(error) = result {
				error::report(self.name, &error);
			}
		})
	}

	fn schedule(&self) {
		if self.scheduled.replace(true) {
			return;
		}

		let _ = PENDING.try_with(|pending| pending.borrow_mut().push((self.id, self.this.clone())));
	}

	fn dispose(&self) {
		if self.disposed.replace(true) {
			return;
		}

		tracing::debug!(name = self.name, "reaction disposed");

		let id = self.id;
		self.scheduled.set(false);
		self.state.set(State::Untracked);
		let _ = PENDING.try_with(|pending| pending.borrow_mut().retain(|(p, _)| *p != id));

		let dependencies = std::mem::take(&mut *self.dependencies.borrow_mut());
		dependencies.clear(id);
	}
}

impl Derived for ReactionBody {
	fn invalidate(self: Rc<Self>, invalid: Invalid) {
		let state = self.state.get();
		if self.disposed.get() || state == State::Untracked {
			return;
		}

		if state == State::UpToDate || invalid == Invalid::Definitely {
			self.state.set(invalid.into());
		}

		self.schedule();
	}
}

impl std::fmt::Debug for Reaction {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Reaction")
			.field("name", &self.body.name)
			.field("state", &self.body.state.get())
			.finish()
	}
}

struct Flushing;

impl Drop for Flushing {
	fn drop(&mut self) {
		let _ = FLUSHING.try_with(|f| f.set(false));
	}
}

/// Runs queued reactions until none are left.
///
/// Every round runs the reactions queued so far in creation order; the ones
/// they schedule run in the next round.
pub(crate) fn flush() {
	let flushing = FLUSHING.try_with(|f| f.replace(true)).unwrap_or(true);
	if flushing {
		return;
	}

	let _flushing = Flushing;
	let limit = config().max_reaction_iterations;
	let mut iterations = 0;

	loop {
		let mut pending = PENDING
			.try_with(|pending| std::mem::take(&mut *pending.borrow_mut()))
			.unwrap_or_default();

		if pending.is_empty() {
			break;
		}

		iterations += 1;
		if iterations > limit {
			let name = pending
				.iter()
				.find_map(|(_, reaction)| reaction.upgrade())
				.map(|reaction| reaction.name)
				.unwrap_or("<dropped>");

			tracing::warn!(iterations = limit, reaction = name, "reactions did not converge");

			for (_, reaction) in &pending {
				if let Some(reaction) = reaction.upgrade() {
					reaction.scheduled.set(false);
				}
			}

			error::report(
				name,
				&Error::NotConverged {
					iterations: limit,
					name,
				},
			);
			break;
		}

		pending.sort_by_key(|(id, _)| *id);
		for (_, reaction) in pending {
			if let Some(reaction) = reaction.upgrade() {
				reaction.update();
			}
		}
	}
}
