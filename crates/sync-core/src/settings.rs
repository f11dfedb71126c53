//! Sync settings, persisted as JSON in the application data directory

use std::{fs, path::Path, time::Duration};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::{
	conditions::SyncPolicy,
	error::ConfigError,
	request::{SyncRequest, DEFAULT_MIN_FEED_AGE_MINUTES},
};

pub const SETTINGS_FILE_NAME: &str = "sync_settings.json";

const DEFAULT_PERIODIC_INTERVAL_MINUTES: u64 = 60;

/// Longest interval between periodic syncs, one week.
pub const MAX_PERIODIC_INTERVAL_MINUTES: u64 = 7 * 24 * 60;

/// How manual sync requests interact with the periodic one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ManualSyncPolicy {
	/// Every manual request gets its own job, even if a periodic sync covers the same feeds.
	#[default]
	AllowOverlap,
	/// Skip manual requests whose scope matches an active periodic sync.
	CoalesceWithPeriodic,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncSettings {
	/// Settings schema version
	pub version: u32,

	pub periodic_interval_minutes: u64,

	/// Feeds refreshed more recently than this are skipped by periodic syncs
	pub min_feed_age_minutes: u32,

	/// Whether periodic syncs fetch feeds concurrently
	pub parallel: bool,

	/// Conditions automatic syncs have to satisfy, unless the host provides its own policy source
	pub policy: SyncPolicy,

	pub manual_sync: ManualSyncPolicy,
}

impl Default for SyncSettings {
	fn default() -> Self {
		Self {
			version: Self::target_version(),
			periodic_interval_minutes: DEFAULT_PERIODIC_INTERVAL_MINUTES,
			min_feed_age_minutes: DEFAULT_MIN_FEED_AGE_MINUTES,
			parallel: false,
			policy: SyncPolicy::default(),
			manual_sync: ManualSyncPolicy::default(),
		}
	}
}

impl SyncSettings {
	#[must_use]
	pub const fn target_version() -> u32 {
		1
	}

	/// Load settings from a data directory, writing the defaults there when none exist yet.
	pub fn load_from(data_dir: impl AsRef<Path>) -> Result<Self, ConfigError> {
		let data_dir = data_dir.as_ref();
		let settings_path = data_dir.join(SETTINGS_FILE_NAME);

		if settings_path.exists() {
			info!(?settings_path, "Loading sync settings");
			let json = fs::read_to_string(&settings_path)
				.map_err(ConfigError::io("read", &settings_path))?;
			let mut settings: Self =
				serde_json::from_str(&json).map_err(ConfigError::json(&settings_path))?;

			if settings.version < Self::target_version() {
				info!(
					"Migrating sync settings from v{} to v{}",
					settings.version,
					Self::target_version()
				);
				// Fields added since then were already filled by serde defaults
				settings.version = Self::target_version();
				settings.save_to(data_dir)?;
			}

			Ok(settings)
		} else {
			warn!(?settings_path, "No sync settings found, creating default");
			let settings = Self::default();
			settings.save_to(data_dir)?;
			Ok(settings)
		}
	}

	pub fn save_to(&self, data_dir: impl AsRef<Path>) -> Result<(), ConfigError> {
		let data_dir = data_dir.as_ref();
		fs::create_dir_all(data_dir).map_err(ConfigError::io("create", data_dir))?;

		let settings_path = data_dir.join(SETTINGS_FILE_NAME);
		let json =
			serde_json::to_string_pretty(self).map_err(ConfigError::json(&settings_path))?;
		fs::write(&settings_path, json).map_err(ConfigError::io("write", &settings_path))?;
		info!(?settings_path, "Saved sync settings");

		Ok(())
	}

	/// Interval between periodic syncs, kept between a minute and
	/// [`MAX_PERIODIC_INTERVAL_MINUTES`].
	#[must_use]
	pub fn periodic_interval(&self) -> Duration {
		Duration::from_secs(
			self.periodic_interval_minutes
				.clamp(1, MAX_PERIODIC_INTERVAL_MINUTES)
				* 60,
		)
	}

	/// Request issued on every periodic tick.
	#[must_use]
	pub fn periodic_request(&self) -> SyncRequest {
		SyncRequest::all_feeds()
			.with_parallel(self.parallel)
			.with_min_feed_age_minutes(self.min_feed_age_minutes)
	}
}
