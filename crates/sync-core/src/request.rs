use serde::{Deserialize, Serialize};

/// Identifier of a feed, as stored by the repository layer.
pub type FeedId = i64;

/// Feeds refreshed more recently than this are skipped, unless told otherwise.
pub const DEFAULT_MIN_FEED_AGE_MINUTES: u32 = 5;

/// Parameters of one sync invocation, carried as the sync job parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncRequest {
	/// Single feed to sync, `None` means all feeds.
	pub feed_id: Option<FeedId>,
	/// Tag grouping the feeds to sync.
	pub feed_tag: Option<String>,
	/// Skip connectivity and staleness checks.
	pub force_network: bool,
	/// Sync feeds concurrently instead of one after the other.
	pub parallel: bool,
	pub min_feed_age_minutes: u32,
}

impl Default for SyncRequest {
	fn default() -> Self {
		Self::all_feeds()
	}
}

impl SyncRequest {
	#[must_use]
	pub const fn all_feeds() -> Self {
		Self {
			feed_id: None,
			feed_tag: None,
			force_network: false,
			parallel: false,
			min_feed_age_minutes: DEFAULT_MIN_FEED_AGE_MINUTES,
		}
	}

	#[must_use]
	pub fn for_feed(feed_id: FeedId) -> Self {
		Self {
			feed_id: Some(feed_id),
			..Self::all_feeds()
		}
	}

	/// An empty tag means no tag filter.
	#[must_use]
	pub fn for_tag(feed_tag: impl Into<String>) -> Self {
		let feed_tag = feed_tag.into();

		Self {
			feed_tag: (!feed_tag.is_empty()).then_some(feed_tag),
			..Self::all_feeds()
		}
	}

	#[must_use]
	pub fn with_force_network(mut self, force_network: bool) -> Self {
		self.force_network = force_network;
		self
	}

	#[must_use]
	pub fn with_parallel(mut self, parallel: bool) -> Self {
		self.parallel = parallel;
		self
	}

	#[must_use]
	pub fn with_min_feed_age_minutes(mut self, min_feed_age_minutes: u32) -> Self {
		self.min_feed_age_minutes = min_feed_age_minutes;
		self
	}

	/// Two requests have the same scope when they target the same feed and tag.
	#[must_use]
	pub fn same_scope(&self, other: &Self) -> bool {
		self.feed_id == other.feed_id && self.feed_tag == other.feed_tag
	}
}
