use std::cell::RefCell;
use std::rc::Rc;

use reactant::{
	autorun, batch, configure, on_reaction_error, reaction, Computed, Config, Error, Reaction, Reactions,
	State, Var,
};


use mock::{Counter, Spy};

#[test]
fn runs_right_away_and_on_every_change() {
	let a = Var::new(1i64);

	let mock = mock::SharedMock::new();
	mock.get().expect_trigger().times(3).return_const(());

	let r = autorun({
		let a = a.clone();
		let mock = mock.clone();
		move |cx| {
			let value = *a.get(cx);
			mock.get().trigger(value);
			Ok(())
		}
	});

	assert_eq!(r.state(), State::UpToDate);
	assert_eq!(r.dependency_count(), 1);

	a.set(2);
	a.set(2);
	a.set(3);

	mock.get().checkpoint();
	r.dispose();
}

#[test]
fn writes_in_a_batch_run_reactions_once() {
	let a = Var::new(1i64);
	let b = Var::new(1i64);

	let mock = mock::SharedMock::new();
	mock.get().expect_trigger().times(1).return_const(());

	let r = autorun({
		let a = a.clone();
		let b = b.clone();
		let mock = mock.clone();
		move |cx| {
			let sum = *a.get(cx) + *b.get(cx);
			mock.get().trigger(sum);
			Ok(())
		}
	});

	mock.get().checkpoint();
	mock.get()
		.expect_trigger()
		.withf(|sum| *sum == 7)
		.times(1)
		.return_const(());

	batch(|| {
		a.set(2);
		b.set(5);
	});

	mock.get().checkpoint();
	r.dispose();
}

#[test]
fn reaction_passes_changed_values_to_the_effect() {
	let a = Var::new(1i64);
	let seen = Rc::new(RefCell::new(Vec::new()));

	let r = reaction(
		{
			let a = a.clone();
			move |cx| Ok(*a.get(cx) / 2)
		},
		{
			let seen = seen.clone();
			move |half| seen.borrow_mut().push(*half)
		},
	);

	assert_eq!(*seen.borrow(), vec![0]);

	a.set(0);
	a.set(4);
	a.set(5);
	a.set(6);

	assert_eq!(*seen.borrow(), vec![0, 2, 3]);
	r.dispose();
}

#[test]
fn runs_in_creation_order() {
	let x = Var::new(0i64);
	let y = Var::new(0i64);
	let order = Rc::new(RefCell::new(Vec::new()));

	let first = autorun({
		let y = y.clone();
		let order = order.clone();
		move |cx| {
			let _ = y.get(cx);
			order.borrow_mut().push("first");
			Ok(())
		}
	});

	let second = autorun({
		let x = x.clone();
		let order = order.clone();
		move |cx| {
			let _ = x.get(cx);
			order.borrow_mut().push("second");
			Ok(())
		}
	});

	assert!(first.id() < second.id());
	order.borrow_mut().clear();

	batch(|| {
		x.set(1);
		y.set(1);
	});

	assert_eq!(*order.borrow(), vec!["first", "second"]);
}

#[test]
fn writes_from_reactions_run_in_a_later_round() {
	let source = Var::new(1i64);
	let mirror = Var::new(0i64);
	let seen = Rc::new(RefCell::new(Vec::new()));

	let copy = autorun({
		let source = source.clone();
		let mirror = mirror.clone();
		move |cx| {
			let value = *source.get(cx);
			mirror.set(value * 10);
			Ok(())
		}
	});

	let log = autorun({
		let mirror = mirror.clone();
		let seen = seen.clone();
		move |cx| {
			seen.borrow_mut().push(*mirror.get(cx));
			Ok(())
		}
	});

	source.set(2);
	assert_eq!(*seen.borrow(), vec![10, 20]);

	copy.dispose();
	log.dispose();
}

#[test]
fn disposing_drops_edges_and_pending_runs() {
	let a = Var::new(1i64);
	let runs = Counter::new();

	let r = autorun({
		let a = a.clone();
		let runs = runs.clone();
		move |cx| {
			let _ = a.get(cx);
			runs.hit();
			Ok(())
		}
	});

	batch(|| {
		a.set(2);
		r.dispose();
	});

	assert_eq!(runs.get(), 1);
	assert!(r.is_disposed());
	assert_eq!(r.state(), State::Untracked);
	assert!(!a.is_observed());

	r.dispose();
	a.set(3);
	assert_eq!(runs.get(), 1);
}

#[test]
fn dropping_the_handle_disposes() {
	let a = Var::new(1i64);

	let r = Reaction::new({
		let a = a.clone();
		move |cx| {
			let _ = a.get(cx);
			Ok(())
		}
	});

	assert_eq!(a.observer_count(), 1);
	drop(r);
	assert_eq!(a.observer_count(), 0);
}

#[test]
fn a_reaction_may_dispose_itself() {
	let a = Var::new(0i64);
	let slot: Rc<RefCell<Option<Reaction>>> = Rc::new(RefCell::new(None));
	let runs = Counter::new();

	let r = autorun({
		let a = a.clone();
		let slot = slot.clone();
		let runs = runs.clone();
		move |cx| {
			runs.hit();
			if *a.get(cx) > 1 {
				let this = slot.borrow().clone();
				if let Some(this) = this {
					this.dispose();
				}
			}
			Ok(())
		}
	});

	*slot.borrow_mut() = Some(r.clone());

	a.set(1);
	a.set(2);
	a.set(3);

	assert_eq!(runs.get(), 3);
	assert!(r.is_disposed());
	assert!(!a.is_observed());

	slot.borrow_mut().take();
}

#[test]
fn errors_are_reported_and_isolated() {
	let a = Var::new(0i64);
	let errors = Rc::new(RefCell::new(Vec::new()));

	let _subscription = on_reaction_error({
		let errors = errors.clone();
		move |error: &Error| errors.borrow_mut().push(error.to_string())
	});

	let failing = Reaction::new_with_name("failing", {
		let a = a.clone();
		move |cx| {
			if *a.get(cx) > 0 {
				return Err(Error::msg("too big"));
			}
			Ok(())
		}
	});

	let panicking = Reaction::new_with_name("panicking", {
		let a = a.clone();
		move |cx| {
			if *a.get(cx) > 0 {
				panic!("boom");
			}
			Ok(())
		}
	});

	let runs = Counter::new();
	let healthy = autorun({
		let a = a.clone();
		let runs = runs.clone();
		move |cx| {
			let _ = a.get(cx);
			runs.hit();
			Ok(())
		}
	});

	assert!(errors.borrow().is_empty());

	a.set(1);

	assert_eq!(runs.get(), 2);
	assert_eq!(
		*errors.borrow(),
		vec![
			String::from("too big"),
			String::from("`panicking` panicked: boom"),
		]
	);

	// Failing runs still track what they read.
	assert_eq!(failing.dependency_count(), 1);
	assert_eq!(panicking.dependency_count(), 1);
	assert_eq!(a.observer_count(), 3);

	a.set(0);
	assert_eq!(errors.borrow().len(), 2);
	assert_eq!(runs.get(), 3);

	failing.dispose();
	panicking.dispose();
	healthy.dispose();
}

#[test]
fn computed_errors_reach_the_reaction_and_recover() {
	let divisor = Var::new(1i64);
	let errors = Rc::new(RefCell::new(Vec::new()));
	let seen = Rc::new(RefCell::new(Vec::new()));

	let _subscription = on_reaction_error({
		let errors = errors.clone();
		move |error: &Error| errors.borrow_mut().push(error.clone())
	});

	let quotient = Computed::try_new({
		let divisor = divisor.clone();
		move |cx| {
			let divisor = *divisor.get(cx);
			if divisor == 0 {
				return Err(Error::msg("division by zero"));
			}
			Ok(12 / divisor)
		}
	});

	let r = autorun({
		let quotient = quotient.clone();
		let seen = seen.clone();
		move |cx| {
			seen.borrow_mut().push(*quotient.get(cx)?);
			Ok(())
		}
	});

	divisor.set(0);
	assert_eq!(errors.borrow().len(), 1);
	assert!(matches!(errors.borrow()[0], Error::Computation(_)));
	assert!(quotient.is_observed());

	divisor.set(4);
	assert_eq!(*seen.borrow(), vec![12, 3]);

	r.dispose();
}

#[test]
fn dropped_subscriptions_stop_receiving_errors() {
	let a = Var::new(0i64);
	let count = Counter::new();

	let subscription = on_reaction_error({
		let count = count.clone();
		move |_: &Error| count.hit()
	});

	let r = autorun({
		let a = a.clone();
		move |cx| {
			if *a.get(cx) % 2 == 1 {
				return Err(Error::msg("odd"));
			}
			Ok(())
		}
	});

	a.set(1);
	assert_eq!(count.get(), 1);

	drop(subscription);
	a.set(3);
	assert_eq!(count.get(), 1);

	r.dispose();
}

#[test]
fn runaway_reactions_stop_with_an_error() {
	configure(Config {
		max_reaction_iterations: 10,
		..Config::default()
	});

	let a = Var::new(0i64);
	let errors = Rc::new(RefCell::new(Vec::new()));
	let runs = Counter::new();

	let _subscription = on_reaction_error({
		let errors = errors.clone();
		move |error: &Error| errors.borrow_mut().push(error.clone())
	});

	let runaway = Reaction::new_with_name("runaway", {
		let a = a.clone();
		let runs = runs.clone();
		move |cx| {
			runs.hit();
			let value = *a.get(cx);
			if value > 0 {
				a.set(value + 1);
			}
			Ok(())
		}
	});

	a.set(1);

	assert_eq!(runs.get(), 11);
	assert!(matches!(
		errors.borrow().last(),
		Some(Error::NotConverged {
			iterations: 10,
			name: "runaway"
		})
	));

	// The graph is usable afterwards.
	runaway.dispose();
	a.set(100);
	assert_eq!(runs.get(), 11);
	assert_eq!(*a.get_once(), 100);

	configure(Config::default());
}

#[test]
fn reactions_collection() {
	let a = Var::new(0i64);
	let runs = Counter::new();

	let mut reactions = Reactions::<2>::new();
	assert!(reactions.is_empty());

	for _ in 0..3 {
		reactions.add(autorun({
			let a = a.clone();
			let runs = runs.clone();
			move |cx| {
				let _ = a.get(cx);
				runs.hit();
				Ok(())
			}
		}));
	}

	assert_eq!(reactions.len(), 3);
	assert_eq!(runs.get(), 3);

	a.set(1);
	assert_eq!(runs.get(), 6);

	// Everything is up to date, nothing runs.
	reactions.update();
	assert_eq!(runs.get(), 6);

	reactions.dispose();
	assert!(reactions.is_empty());
	assert!(!a.is_observed());
}

#[test]
fn update_unchecked_always_runs() {
	let runs = Counter::new();

	let r = autorun({
		let runs = runs.clone();
		move |_| {
			runs.hit();
			Ok(())
		}
	});

	r.update();
	assert_eq!(runs.get(), 1);

	r.update_unchecked();
	assert_eq!(runs.get(), 2);
	assert_eq!(r.dependency_count(), 0);
}

#[test]
fn writes_during_validation_rerun_the_reaction() {
	let trigger = Var::new(0i64);
	let side = Var::new(0i64);

	let non_negative = Computed::new({
		let trigger = trigger.clone();
		let side = side.clone();
		move |cx| {
			let value = *trigger.get(cx);
			side.set(value * 10);
			value >= 0
		}
	});

	let runs = Counter::new();
	let seen = Rc::new(RefCell::new(Vec::new()));
	let r = autorun({
		let side = side.clone();
		let non_negative = non_negative.clone();
		let runs = runs.clone();
		let seen = seen.clone();
		move |cx| {
			runs.hit();
			let side = *side.get(cx);
			non_negative.get(cx)?;
			seen.borrow_mut().push(side);
			Ok(())
		}
	});

	trigger.set(1);

	assert_eq!(*seen.borrow(), vec![0, 10]);
	assert_eq!(runs.get(), 2);
	assert_eq!(r.state(), State::UpToDate);

	r.dispose();
}
