use std::any::Any;
use std::cell::{Cell, RefCell};
use std::fmt::Display;
use std::rc::Rc;

use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors are cached by computeds and handed out again on every read,
/// so they have to be cheap to clone.
#[derive(Debug, Clone, Error)]
pub enum Error {
	#[error("{0}")]
	Computation(Rc<dyn std::error::Error>),

	#[error("cycle detected in computation `{name}`")]
	Cycle { name: &'static str },

	#[error("computed value `{name}` is read outside a reactive context")]
	RequiresReaction { name: &'static str },

	#[error("`{name}` panicked: {message}")]
	Panicked { name: &'static str, message: String },

	#[error("reactions did not converge after {iterations} iterations, last scheduled reaction: `{name}`")]
	NotConverged {
		iterations: usize,
		name: &'static str,
	},
}

#[derive(Debug, Error)]
#[error("{0}")]
struct Message(String);

impl Error {
	pub fn computation<E>(error: E) -> Self
	where
		E: std::error::Error + 'static,
	{
		Error::Computation(Rc::new(error))
	}

	pub fn msg(message: impl Display) -> Self {
		Self::computation(Message(message.to_string()))
	}

	pub fn is_cycle(&self) -> bool {
		matches!(self, Error::Cycle { .. })
	}
}

type Handler = Rc<dyn Fn(&Error)>;

thread_local! {
	static HANDLERS: RefCell<Vec<(u64, Handler)>> = RefCell::new(Vec::new());
	static NEXT_HANDLER: Cell<u64> = Cell::new(0);
}

/// Registers a handler for errors raised by reactions.
///
/// Handlers stay registered until the returned subscription is dropped.
#[must_use]
pub fn on_reaction_error(handler: impl Fn(&Error) + 'static) -> ErrorSubscription {
	let id = NEXT_HANDLER.with(|next| {
		let id = next.get();
		next.set(id + 1);
		id
	});

	HANDLERS.with(|handlers| handlers.borrow_mut().push((id, Rc::new(handler))));
	ErrorSubscription { id }
}

pub struct ErrorSubscription {
	id: u64,
}

impl ErrorSubscription {
	pub fn dispose(self) {}
}

impl Drop for ErrorSubscription {
	fn drop(&mut self) {
		let id = self.id;
		let _ = HANDLERS.try_with(|handlers| handlers.borrow_mut().retain(|(h, _)| *h != id));
	}
}

pub(crate) fn report(reaction: &'static str, error: &Error) {
	tracing::error!(reaction, %error, "uncaught error in reaction");

	// Handlers may register or drop subscriptions themselves.
	let handlers: Vec<Handler> = HANDLERS
		.try_with(|handlers| handlers.borrow().iter().map(|(_, h)| h.clone()).collect())
		.unwrap_or_default();

	for handler in handlers {
		handler(error);
	}
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
	if let Some(message) = payload.downcast_ref::<&str>() {
		message.to_string()
	} else if let Some(message) = payload.downcast_ref::<String>() {
		message.clone()
	} else {
		String::from("Box<dyn Any>")
	}
}
