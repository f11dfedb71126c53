use tracing_subscriber::{
	fmt,
	layer::SubscriberExt,
	util::{SubscriberInitExt, TryInitError},
	EnvFilter,
};

const DEFAULT_DIRECTIVES: &str = "feedsync_core=info,feedsync_job_queue=info";

/// Install the global tracing subscriber, filtered by `RUST_LOG` when set.
///
/// Fails if a global subscriber was already installed.
pub fn init_logging() -> Result<(), TryInitError> {
	tracing_subscriber::registry()
		.with(
			EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVES)),
		)
		.with(fmt::layer().with_target(true).with_thread_ids(true))
		.try_init()
}
