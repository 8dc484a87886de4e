use std::cell::{Cell, RefCell};
use std::fmt::Debug;
use std::panic::{self, AssertUnwindSafe};
use std::rc::{Rc, Weak};

use crate::batch::{self, batch, in_batch, Suspend};
use crate::config::config;
use crate::dependencies::{self, Dependencies};
use crate::equality::Equality;
use crate::error;
use crate::observers::{self, Observers};
use crate::reaction::Reaction;
use crate::value::{Access, Ref, Value};
use crate::{Derived, Error, Evaluation, Invalid, NodeId, Observable, Result, State, Version};

/// Construction options of a [`Computed`].
pub struct Options<T> {
	name: &'static str,
	keep_alive: bool,
	requires_reaction: bool,
	equality: Equality<T>,
}

impl<T> Default for Options<T>
where
	T: PartialEq + 'static,
{
	fn default() -> Self {
		Options::with_equality(Equality::structural())
	}
}

impl<T> Options<T> {
	pub fn with_equality(equality: Equality<T>) -> Self {
		Options {
			name: "<unnamed>",
			keep_alive: false,
			requires_reaction: false,
			equality,
		}
	}

	pub fn name(mut self, name: &'static str) -> Self {
		self.name = name;
		self
	}

	/// Keep the cached value and the dependency edges even when nothing
	/// observes the computed.
	pub fn keep_alive(mut self, keep_alive: bool) -> Self {
		self.keep_alive = keep_alive;
		self
	}

	/// Same as [`Config::computed_requires_reaction`](crate::Config), for
	/// this computed only.
	pub fn requires_reaction(mut self, requires_reaction: bool) -> Self {
		self.requires_reaction = requires_reaction;
		self
	}

	pub fn equality(mut self, equality: Equality<T>) -> Self {
		self.equality = equality;
		self
	}
}

/// A cached derivation over vars and other computeds.
///
/// The function only runs when the computed is read and something it read
/// last time has changed. While nothing observes it (and it is not kept
/// alive) it caches nothing and runs on every read.
pub struct Computed<T>
where
	T: 'static,
{
	body: Rc<ComputedBody<T>>,
}

impl<T> Clone for Computed<T>
where
	T: 'static,
{
	fn clone(&self) -> Self {
		Self {
			body: self.body.clone(),
		}
	}
}

pub(crate) struct ComputedBody<T>
where
	T: 'static,
{
	id: NodeId,
	name: &'static str,
	keep_alive: bool,
	requires_reaction: bool,
	func: Box<dyn Fn(&Evaluation) -> Result<T>>,
	equality: Equality<T>,
	value: RefCell<Option<Result<T>>>,
	version: Cell<Version>,
	state: Cell<State>,
	computing: Cell<bool>,
	dependencies: RefCell<Dependencies>,
	observers: RefCell<Observers>,
	this: Weak<ComputedBody<T>>,
}

impl<T> Drop for ComputedBody<T>
where
	T: 'static,
{
	fn drop(&mut self) {
		std::mem::take(self.dependencies.get_mut()).clear(self.id);
	}
}

impl<T> Computed<T>
where
	T: 'static,
{
	pub fn new(func: impl Fn(&Evaluation) -> T + 'static) -> Self
	where
		T: PartialEq,
	{
		Computed::with_options(move |cx: &Evaluation| Ok(func(cx)), Options::default())
	}

	/// A computed whose function may fail. The error is cached like a value.
	pub fn try_new(func: impl Fn(&Evaluation) -> Result<T> + 'static) -> Self
	where
		T: PartialEq,
	{
		Computed::with_options(func, Options::default())
	}

	pub fn with_options(
		func: impl Fn(&Evaluation) -> Result<T> + 'static,
		options: Options<T>,
	) -> Self {
		Computed {
			body: Rc::new_cyclic(|this| ComputedBody {
				id: NodeId::next(),
				name: options.name,
				keep_alive: options.keep_alive,
				requires_reaction: options.requires_reaction,
				func: Box::new(func),
				equality: options.equality,
				value: RefCell::new(None),
				version: Cell::new(Version::INITIAL),
				state: Cell::new(State::Untracked),
				computing: Cell::new(false),
				dependencies: RefCell::new(Dependencies::new()),
				observers: RefCell::new(Observers::new()),
				this: this.clone(),
			}),
		}
	}

	/// Tracked read.
	#[inline]
	pub fn get<'a>(&'a self, cx: &impl AsRef<Evaluation>) -> Result<Ref<'a, T>> {
		self.body.get(cx.as_ref())
	}

	/// Untracked read.
	#[inline]
	pub fn get_once(&self) -> Result<Ref<'_, T>> {
		self.body.get_once()
	}

	/// Calls `callback(old, new)` every time the value changes.
	///
	/// The callback is not called for the value the computed has right now.
	/// It keeps being called for as long as the returned reaction lives.
	#[must_use]
	pub fn observe(&self, callback: impl Fn(&T, &T) + 'static) -> Reaction
	where
		T: Clone,
	{
		let computed = self.clone();
		let equality = self.body.equality.clone();
		let previous: RefCell<Option<T>> = RefCell::new(None);

		Reaction::new_with_name(self.body.name, move |cx| {
			let next = (*computed.get(cx)?).clone();
			if let Some(prev) = previous.replace(Some(next.clone())) {
				if !equality.equals(&prev, &next) {
					callback(&prev, &next);
				}
			}

			Ok(())
		})
	}

	pub fn id(&self) -> NodeId {
		self.body.id
	}

	pub fn name(&self) -> &'static str {
		self.body.name
	}

	pub fn keep_alive(&self) -> bool {
		self.body.keep_alive
	}

	pub fn state(&self) -> State {
		self.body.state.get()
	}

	pub fn version(&self) -> Version {
		self.body.version.get()
	}

	pub fn is_observed(&self) -> bool {
		self.body.is_observed()
	}
}

/// Marks a computed as running for the lifetime of the guard.
struct Computing<'a>(&'a Cell<bool>);

impl<'a> Computing<'a> {
	fn enter(computing: &'a Cell<bool>) -> Self {
		computing.set(true);
		Computing(computing)
	}
}

impl<'a> Drop for Computing<'a> {
	fn drop(&mut self) {
		self.0.set(false);
	}
}

impl<T> ComputedBody<T>
where
	T: 'static,
{
	fn get<'a>(&'a self, eval: &'_ Evaluation) -> Result<Ref<'a, T>> {
		let version = self.refresh()?;
		if let Some(this) = self.this.upgrade() {
			eval.based_on(this, version);
		}

		self.read()
	}

	fn get_once(&self) -> Result<Ref<'_, T>> {
		self.check_cycle()?;

		// Inside a batch the computed stays tracked until the batch ends,
		// so repeated reads within one action hit the cache.
		if self.keep_alive || self.is_observed() || in_batch() {
			self.refresh()?;
			return self.read();
		}

		if self.requires_reaction || config().computed_requires_reaction {
			return Err(Error::RequiresReaction { name: self.name });
		}

		let eval = Evaluation::new();
		batch(|| self.evaluate(&eval)).map(Ref::Owned)
	}

	fn is_observed(&self) -> bool {
		!self.observers.borrow().is_empty()
	}

	fn check_cycle(&self) -> Result<()> {
		if self.computing.get() {
			return Err(Error::Cycle { name: self.name });
		}

		Ok(())
	}

	/// Brings the cached result up to date and returns its version.
	fn refresh(&self) -> Result<Version> {
		self.check_cycle()?;

		let stale = match self.state.get() {
			State::UpToDate => false,
			State::PossiblyStale => {
				let snapshot = self.dependencies.borrow().snapshot();
				!dependencies::are_valid(&snapshot)
			}
			State::Stale | State::Untracked => true,
		};

		if stale || self.state.get() == State::Stale {
			self.compute();
		} else {
			self.state.set(State::UpToDate);
		}

		Ok(self.version.get())
	}

	fn compute(&self) {
		batch(|| {
			// Invalidations that arrive while the function runs must win.
			self.state.set(State::UpToDate);

			let eval = Evaluation::new();
			let result = self.evaluate(&eval);

			let parent = self.this.clone() as Weak<dyn Derived>;
			self.dependencies
				.borrow_mut()
				.swap(eval.take(), self.id, &parent);

			if self.store(result) {
				tracing::trace!(name = self.name, version = ?self.version.get(), "computed changed");
			}

			if !self.keep_alive && !self.is_observed() {
				batch::queue_for_unobservation(self.this.clone() as Weak<dyn Suspend>);
			}
		})
	}

	/// Runs the function. A panic is turned into an error and cached like
	/// any other.
	fn evaluate(&self, eval: &Evaluation) -> Result<T> {
		let _computing = Computing::enter(&self.computing);
		let _span = tracing::trace_span!("computed", name = self.name).entered();

		panic::catch_unwind(AssertUnwindSafe(|| (self.func)(eval))).unwrap_or_else(|payload| {
			Err(Error::Panicked {
				name: self.name,
				message: error::panic_message(payload.as_ref()),
			})
		})
	}

	/// Returns `true` when the result differs from the cached one. An equal
	/// value keeps the old one and its version.
	fn store(&self, result: Result<T>) -> bool {
		let mut value = self.value.borrow_mut();
		let changed = match (&*value, &result) {
			(Some(Ok(prev)), Ok(next)) => !self.equality.equals(prev, next),
			_ => true,
		};

		if changed {
			*value = Some(result);
			self.version.set(self.version.get().next());
		}

		changed
	}

	fn read(&self) -> Result<Ref<'_, T>> {
		let value = self.value.borrow();
		match std::cell::Ref::filter_map(value, |v| v.as_ref().and_then(|r| r.as_ref().ok())) {
			Ok(value) => Ok(Ref::Cell(value)),
			Err(value) => match &*value {
				Some(Err(error)) => Err(error.clone()),
				_ => unreachable!("computed `{}` has no cached value after refresh", self.name),
			},
		}
	}
}

impl<T> Suspend for ComputedBody<T>
where
	T: 'static,
{
	fn suspend(&self) {
		if self.keep_alive
			|| self.computing.get()
			|| self.is_observed()
			|| self.state.get() == State::Untracked
		{
			return;
		}

		tracing::debug!(name = self.name, "suspending computed");
		self.state.set(State::Untracked);

		if let Ok(mut value) = self.value.try_borrow_mut() {
			*value = None;
		}

		let dependencies = std::mem::take(&mut *self.dependencies.borrow_mut());
		dependencies.clear(self.id);
	}
}

impl<T> Observable for ComputedBody<T>
where
	T: 'static,
{
	fn id(&self) -> NodeId {
		self.id
	}

	fn update(&self) -> Result<Version> {
		self.refresh()
	}

	fn version(&self) -> Version {
		self.version.get()
	}

	fn used_by(&self, id: NodeId, derived: Weak<dyn Derived>) {
		self.observers.borrow_mut().insert(id, derived);
	}

	fn not_used_by(&self, id: NodeId) {
		let last = self.observers.borrow_mut().remove(id);
		if last && !self.keep_alive {
			batch::queue_for_unobservation(self.this.clone() as Weak<dyn Suspend>);
		}
	}
}

impl<T> Derived for ComputedBody<T>
where
	T: 'static,
{
	fn invalidate(self: Rc<Self>, invalid: Invalid) {
		match (self.state.get(), invalid) {
			(State::UpToDate, _) => {
				self.state.set(invalid.into());
				let observers = self.observers.borrow().snapshot();
				observers::invalidate(observers, Invalid::Maybe);
			}
			(State::PossiblyStale, Invalid::Definitely) => self.state.set(State::Stale),
			_ => {}
		}
	}
}

impl<T> Access<T> for ComputedBody<T>
where
	T: 'static,
{
	fn get(&self, eval: &Evaluation) -> Result<Ref<'_, T>> {
		ComputedBody::get(self, eval)
	}

	fn get_once(&self) -> Result<Ref<'_, T>> {
		ComputedBody::get_once(self)
	}
}

impl<T> From<Computed<T>> for Value<T>
where
	T: 'static,
{
	fn from(computed: Computed<T>) -> Self {
		Value::new(computed.body)
	}
}

impl<T> Debug for Computed<T>
where
	T: 'static,
{
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Computed")
			.field("name", &self.body.name)
			.field("state", &self.body.state.get())
			.field("version", &self.body.version.get())
			.finish()
	}
}
