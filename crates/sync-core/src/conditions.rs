use serde::{Deserialize, Serialize};
use tokio::sync::watch;

/// Snapshot of the device state, read right before deciding on an automatic sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DeviceConditions {
	pub connected: bool,
	pub charging: bool,
	pub unmetered: bool,
}

/// User preferences restricting automatic syncs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SyncPolicy {
	pub require_charging: bool,
	pub require_wifi: bool,
}

/// Pre-flight check for automatic syncs. Manual syncs and forced requests never go through it.
#[must_use]
pub const fn is_ok_to_sync_automatically(conditions: DeviceConditions, policy: SyncPolicy) -> bool {
	conditions.connected
		&& (!policy.require_charging || conditions.charging)
		&& (!policy.require_wifi || conditions.unmetered)
}

/// Live device probes.
pub trait DeviceProbe: Send + Sync + 'static {
	fn is_connected(&self) -> bool;

	fn is_charging(&self) -> bool;

	/// Whether the active network isn't metered.
	fn is_unmetered(&self) -> bool;

	fn conditions(&self) -> DeviceConditions {
		DeviceConditions {
			connected: self.is_connected(),
			charging: self.is_charging(),
			unmetered: self.is_unmetered(),
		}
	}
}

/// A fixed snapshot also works as a probe, handy for platforms pushing state changes to us.
impl DeviceProbe for DeviceConditions {
	fn is_connected(&self) -> bool {
		self.connected
	}

	fn is_charging(&self) -> bool {
		self.charging
	}

	fn is_unmetered(&self) -> bool {
		self.unmetered
	}

	fn conditions(&self) -> DeviceConditions {
		*self
	}
}

/// Where the persisted user policy is read from.
pub trait PolicySource: Send + Sync + 'static {
	fn policy(&self) -> SyncPolicy;
}

impl PolicySource for SyncPolicy {
	fn policy(&self) -> SyncPolicy {
		*self
	}
}

impl PolicySource for watch::Receiver<SyncPolicy> {
	fn policy(&self) -> SyncPolicy {
		*self.borrow()
	}
}
