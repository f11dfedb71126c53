//!
//! # Feed Sync Core
//!
//! Decides when feeds get synced and dispatches the syncs as background jobs on a
//! [`JobQueue`](feedsync_job_queue::JobQueue).
//!
//! - Manual syncs, requested through [`SyncDispatcher::request_sync`], always go ahead;
//! - Periodic syncs, requested through [`SyncDispatcher::request_periodic_sync`] (usually by the
//!   [`PeriodicSyncScheduler`]), must pass [`is_ok_to_sync_automatically`] unless forced, and at
//!   most one of them is ever active;
//! - The [`RefreshState`] tells whether any sync is in progress.
//!
//! Fetching and storing feeds is left to a [`FeedSyncer`] provided by the host application,
//! together with the other collaborators bundled in [`SyncDeps`].

#![warn(
	clippy::all,
	clippy::pedantic,
	clippy::correctness,
	clippy::perf,
	clippy::style,
	clippy::suspicious,
	clippy::complexity,
	clippy::nursery,
	clippy::unwrap_used,
	unused_qualifications,
	rust_2018_idioms,
	trivial_casts,
	trivial_numeric_casts,
	unused_allocation,
	clippy::unnecessary_cast,
	clippy::cast_lossless,
	clippy::cast_possible_truncation,
	clippy::cast_possible_wrap,
	clippy::cast_precision_loss,
	clippy::cast_sign_loss,
	clippy::dbg_macro,
	clippy::deprecated_cfg_attr,
	clippy::separated_literal_suffix,
	deprecated
)]
#![forbid(deprecated_in_future)]
#![allow(clippy::missing_errors_doc, clippy::module_name_repetitions)]

mod conditions;
mod dispatcher;
mod error;
mod feeds;
mod job;
pub mod logging;
mod refresh;
mod request;
mod scheduler;
mod settings;

pub use conditions::{
	is_ok_to_sync_automatically, DeviceConditions, DeviceProbe, PolicySource, SyncPolicy,
};
pub use dispatcher::{SyncDeps, SyncDispatch, SyncDispatcher, PERIODIC_SYNC_KEY};
pub use error::{ConfigError, SyncError};
pub use feeds::{FeedSyncer, FetchError, NoopNotifier, SyncNotifier};
pub use job::SyncTrigger;
pub use refresh::{RefreshGuard, RefreshState, RefreshWatcher};
pub use request::{FeedId, SyncRequest, DEFAULT_MIN_FEED_AGE_MINUTES};
pub use scheduler::PeriodicSyncScheduler;
pub use settings::{
	ManualSyncPolicy, SyncSettings, MAX_PERIODIC_INTERVAL_MINUTES, SETTINGS_FILE_NAME,
};
