//! Delivery profile selection

use crate::models::{DeliveryMode, DeliveryProfile};

impl DeliveryProfile {
    /// Whether the relay must re-encode feeds routed through this profile
    pub fn transcodes(&self) -> bool {
        self.mode != DeliveryMode::Proxy
    }

    /// Human-readable description carried on switch results
    pub fn descriptor(&self) -> String {
        format!("{} ({})", self.name, self.mode)
    }

    /// Pick the profile a feed of this account should be played through.
    ///
    /// Any active profile of the account wins, default-flagged first and
    /// then by id; without an active one the account's default profile is
    /// used even when inactive. Several profiles without a default resolve
    /// to the lowest id: stable, not meaningful.
    pub fn select(profiles: &[DeliveryProfile]) -> Option<&DeliveryProfile> {
        let active = profiles
            .iter()
            .filter(|p| p.is_active)
            .min_by_key(|p| (!p.is_default, p.id));

        active.or_else(|| {
            profiles
                .iter()
                .filter(|p| p.is_default)
                .min_by_key(|p| p.id)
        })
    }
}
