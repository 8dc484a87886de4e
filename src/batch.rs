use std::cell::{Cell, RefCell};
use std::rc::Weak;

use crate::reaction;

/// Something that drops its cache and its edges once nobody observes it.
pub(crate) trait Suspend {
	fn suspend(&self);
}

thread_local! {
	static DEPTH: Cell<usize> = Cell::new(0);
	static UNOBSERVED: RefCell<Vec<Weak<dyn Suspend>>> = RefCell::new(Vec::new());
	static DRAINING: Cell<bool> = Cell::new(false);
}

pub fn in_batch() -> bool {
	DEPTH.try_with(|d| d.get() > 0).unwrap_or(false)
}

/// Runs `func` as one transaction: reactions triggered by the writes inside
/// run once, after the outermost batch is over.
///
/// The flush also happens when `func` returns an `Err`. When `func` panics
/// nothing runs while the panic unwinds: reactions stay queued and the next
/// outermost batch, including the one around any write, runs them.
pub fn batch<R>(func: impl FnOnce() -> R) -> R {
	let guard = BatchGuard::start();
	let result = func();
	std::mem::drop(guard);
	result
}

/// Same as [`batch`], reported as an action in the trace.
pub fn run_in_action<R>(func: impl FnOnce() -> R) -> R {
	let _span = tracing::trace_span!("action").entered();
	batch(func)
}

struct BatchGuard;

impl BatchGuard {
	fn start() -> Self {
		DEPTH.with(|d| d.set(d.get() + 1));
		BatchGuard
	}
}

impl Drop for BatchGuard {
	fn drop(&mut self) {
		let outermost = DEPTH
			.try_with(|d| {
				let depth = d.get().saturating_sub(1);
				d.set(depth);
				depth == 0
			})
			.unwrap_or(false);

		// While unwinding the queues stay as they are, the next outermost
		// batch picks them up.
		if outermost && !std::thread::panicking() {
			reaction::flush();
			run_unobservations();
		}
	}
}

/// Queues a node that may have lost its last observer. Outside of a batch
/// the queue is processed right away.
pub(crate) fn queue_for_unobservation(node: Weak<dyn Suspend>) {
	let _ = UNOBSERVED.try_with(|u| u.borrow_mut().push(node));
	if !in_batch() {
		run_unobservations();
	}
}

fn run_unobservations() {
	let draining = DRAINING.try_with(|d| d.replace(true)).unwrap_or(true);
	if draining {
		return;
	}

	loop {
		let unobserved = UNOBSERVED
			.try_with(|u| std::mem::take(&mut *u.borrow_mut()))
			.unwrap_or_default();

		if unobserved.is_empty() {
			break;
		}

		// Suspending a node may queue its own dependencies.
		for node in unobserved {
			if let Some(node) = node.upgrade() {
				node.suspend();
			}
		}
	}

	let _ = DRAINING.try_with(|d| d.set(false));
}
