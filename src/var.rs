use std::cell::{Cell, Ref, RefCell};
use std::fmt::Debug;
use std::rc::{Rc, Weak};

use crate::batch::batch;
use crate::equality::Equality;
use crate::evaluation::Evaluation;
use crate::observers::{self, Observers};
use crate::value::{Access, Value};
use crate::{Computed, Derived, Invalid, NodeId, Observable, Version};

/// A mutable observable cell.
pub struct Var<T> {
	body: Rc<VarBody<T>>,
}

pub(crate) struct VarBody<T> {
	id: NodeId,
	value: RefCell<T>,
	version: Cell<Version>,
	equality: Equality<T>,
	observers: RefCell<Observers>,
	this: Weak<VarBody<T>>,
}

impl<T> Clone for Var<T> {
	fn clone(&self) -> Self {
		Self {
			body: self.body.clone(),
		}
	}
}

impl<T> Default for Var<T>
where
	T: Default + PartialEq + 'static,
{
	fn default() -> Self {
		Var::new(Default::default())
	}
}

pub trait Toggle {
	fn toggle(&mut self);
}

impl Toggle for bool {
	fn toggle(&mut self) {
		*self = !*self
	}
}

impl<T> Var<T>
where
	T: 'static,
{
	pub fn new(value: T) -> Self
	where
		T: PartialEq,
	{
		Var::with_equality(value, Equality::structural())
	}

	pub fn with_equality(value: T, equality: Equality<T>) -> Self {
		Var {
			body: Rc::new_cyclic(|this| VarBody {
				id: NodeId::next(),
				value: RefCell::new(value),
				version: Cell::new(Version::INITIAL),
				equality,
				observers: RefCell::new(Observers::new()),
				this: this.clone(),
			}),
		}
	}

	pub fn map<F, R>(&self, func: F) -> Computed<R>
	where
		F: Fn(&T) -> R + 'static,
		R: PartialEq + 'static,
	{
		let this = self.clone();
		Computed::new(move |ev| {
			let value = this.get(ev);
			func(&*value)
		})
	}

	/// Tracked read.
	#[inline]
	pub fn get(&self, eval: &impl AsRef<Evaluation>) -> Ref<'_, T> {
		self.body.get(eval.as_ref())
	}

	/// Untracked read.
	#[inline]
	pub fn get_once(&self) -> Ref<'_, T> {
		self.body.get_once()
	}

	#[inline]
	pub fn set(&self, value: T) {
		let _ = self.body.replace(value);
	}

	#[inline]
	pub fn toggle(&self)
	where
		T: Toggle + Clone,
	{
		self.update(T::toggle)
	}

	/// Stores `value` and returns the previous one. When `value` equals the
	/// current value nothing is stored and `value` is handed back.
	#[inline]
	pub fn replace(&self, value: T) -> T {
		self.body.replace(value)
	}

	/// Runs `func` on a copy of the value. The copy is stored only when it
	/// is a change, exactly like [`Var::replace`].
	#[inline]
	pub fn update(&self, func: impl FnOnce(&mut T))
	where
		T: Clone,
	{
		self.body.update(func)
	}

	pub fn id(&self) -> NodeId {
		self.body.id
	}

	pub fn version(&self) -> Version {
		self.body.version.get()
	}

	pub fn is_observed(&self) -> bool {
		!self.body.observers.borrow().is_empty()
	}

	pub fn observer_count(&self) -> usize {
		self.body.observers.borrow().len()
	}
}

impl<T> VarBody<T>
where
	T: 'static,
{
	fn get_once(&self) -> Ref<'_, T> {
		self.value.borrow()
	}

	fn get<'a>(&'a self, eval: &'_ Evaluation) -> Ref<'a, T> {
		if let Some(this) = self.this.upgrade() {
			eval.based_on(this, self.version.get());
		}

		self.value.borrow()
	}

	fn update(&self, func: impl FnOnce(&mut T))
	where
		T: Clone,
	{
		let mut next = self.value.borrow().clone();
		func(&mut next);
		let _ = self.replace(next);
	}

	fn replace(&self, value: T) -> T {
		batch(|| {
			let mut current = self.value.borrow_mut();
			if self.equality.equals(&current, &value) {
				return value;
			}

			let old = std::mem::replace(&mut *current, value);
			std::mem::drop(current);
			self.changed();
			old
		})
	}

	fn changed(&self) {
		let version = self.version.get().next();
		self.version.set(version);
		tracing::trace!(id = ?self.id, ?version, "var changed");

		let observers = self.observers.borrow().snapshot();
		observers::invalidate(observers, Invalid::Definitely);
	}
}

impl<T: 'static> Observable for VarBody<T> {
	fn id(&self) -> NodeId {
		self.id
	}

	fn version(&self) -> Version {
		self.version.get()
	}

	fn update(&self) -> crate::Result<Version> {
		Ok(self.version.get())
	}

	fn used_by(&self, id: NodeId, derived: Weak<dyn Derived>) {
		self.observers.borrow_mut().insert(id, derived);
	}

	fn not_used_by(&self, id: NodeId) {
		self.observers.borrow_mut().remove(id);
	}
}

impl<T> Access<T> for VarBody<T>
where
	T: 'static,
{
	fn get(&self, eval: &Evaluation) -> crate::Result<crate::value::Ref<'_, T>> {
		Ok(crate::value::Ref::Cell(VarBody::get(self, eval)))
	}

	fn get_once(&self) -> crate::Result<crate::value::Ref<'_, T>> {
		Ok(crate::value::Ref::Cell(VarBody::get_once(self)))
	}
}

impl<T> From<Var<T>> for Value<T>
where
	T: 'static,
{
	fn from(var: Var<T>) -> Self {
		Value::new(var.body)
	}
}

impl<T> Debug for Var<T>
where
	T: 'static + Debug,
{
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		self.get_once().fmt(f)
	}
}
