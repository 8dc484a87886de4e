use std::ops::Deref;
use std::rc::Rc;

use crate::{Evaluation, Observable, Result};

/// A read-only handle over anything that produces a `T`: a [`Var`](crate::Var),
/// a [`Computed`](crate::Computed) or a [`Const`](crate::Const).
pub struct Value<T> {
	value: Rc<dyn Access<T>>,
}

impl<T> Clone for Value<T> {
	fn clone(&self) -> Self {
		Value {
			value: self.value.clone(),
		}
	}
}

impl<T> Value<T>
where
	T: 'static,
{
	pub fn new(value: Rc<dyn Access<T>>) -> Self {
		Value { value }
	}

	#[inline]
	pub fn get(&self, eval: &impl AsRef<Evaluation>) -> Result<Ref<'_, T>> {
		self.value.get(eval.as_ref())
	}

	#[inline]
	pub fn get_once(&self) -> Result<Ref<'_, T>> {
		self.value.get_once()
	}
}

pub enum Ref<'a, T> {
	Ref(&'a T),
	Cell(std::cell::Ref<'a, T>),
	/// Result of an untracked computation that was not cached.
	Owned(T),
}

impl<'a, T> Deref for Ref<'a, T> {
	type Target = T;

	fn deref(&self) -> &Self::Target {
		match self {
			Ref::Cell(guard) => guard.deref(),
			Ref::Ref(t) => t,
			Ref::Owned(t) => t,
		}
	}
}

impl<'a, T> std::fmt::Debug for Ref<'a, T>
where
	T: std::fmt::Debug,
{
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		self.deref().fmt(f)
	}
}

pub trait Access<T>: Observable {
	fn get(&self, tracker: &Evaluation) -> Result<Ref<'_, T>>;
	fn get_once(&self) -> Result<Ref<'_, T>>;
}
