use std::cell::Cell;

/// Engine settings. They live next to the rest of the graph state, so each
/// thread has its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
	/// Reading a computed with [`Computed::get_once`](crate::Computed::get_once)
	/// while it is not observed, not kept alive and no batch is running fails
	/// with [`Error::RequiresReaction`](crate::Error::RequiresReaction) instead
	/// of recomputing it untracked.
	pub computed_requires_reaction: bool,

	/// How many rounds of reactions a single flush may run before giving up.
	pub max_reaction_iterations: usize,
}

impl Default for Config {
	fn default() -> Self {
		Config {
			computed_requires_reaction: false,
			max_reaction_iterations: 100,
		}
	}
}

thread_local! {
	static CONFIG: Cell<Config> = Cell::new(Config::default());
}

pub fn configure(config: Config) {
	tracing::debug!(?config, "configure");
	CONFIG.with(|c| c.set(config));
}

pub fn config() -> Config {
	CONFIG.try_with(|c| c.get()).unwrap_or_default()
}
