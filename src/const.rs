use std::fmt::Debug;
use std::rc::{Rc, Weak};

use crate::value::{Access, Ref, Value};
use crate::{Derived, Evaluation, NodeId, Observable, Result, Version};

/// A value that never changes. Reading it is never tracked.
pub struct Const<T> {
	body: Rc<ConstBody<T>>,
}

impl<T> Clone for Const<T> {
	fn clone(&self) -> Self {
		Self {
			body: self.body.clone(),
		}
	}
}

struct ConstBody<T> {
	id: NodeId,
	value: T,
}

impl<T> Const<T> {
	pub fn new(value: T) -> Self {
		Const {
			body: Rc::new(ConstBody {
				id: NodeId::next(),
				value,
			}),
		}
	}

	pub fn get(&self) -> &T {
		&self.body.value
	}
}

impl<T> Observable for ConstBody<T>
where
	T: 'static,
{
	fn id(&self) -> NodeId {
		self.id
	}

	fn update(&self) -> Result<Version> {
		Ok(self.version())
	}

	fn version(&self) -> Version {
		Version::INITIAL
	}

	fn used_by(&self, _: NodeId, _: Weak<dyn Derived>) {}
	fn not_used_by(&self, _: NodeId) {}
}

impl<T> Access<T> for ConstBody<T>
where
	T: 'static,
{
	fn get(&self, _: &Evaluation) -> Result<Ref<'_, T>> {
		Ok(Ref::Ref(&self.value))
	}

	fn get_once(&self) -> Result<Ref<'_, T>> {
		Ok(Ref::Ref(&self.value))
	}
}

impl<T> From<Const<T>> for Value<T>
where
	T: 'static,
{
	fn from(value: Const<T>) -> Self {
		Value::new(value.body)
	}
}

impl<T> Debug for Const<T>
where
	T: Debug,
{
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		self.get().fmt(f)
	}
}
