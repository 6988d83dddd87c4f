//! Verification Gate
//!
//! Users must join every required channel before the bot talks to them. The
//! gate records verified users once and never re-validates them.

use std::sync::Arc;
use tracing::{info, warn};

use crate::platform::Platform;
use crate::store::BotStore;

pub struct VerificationGate {
    store: Arc<BotStore>,
    platform: Arc<dyn Platform>,
    channels: Vec<String>,
}

impl VerificationGate {
    pub fn new(store: Arc<BotStore>, platform: Arc<dyn Platform>, channels: Vec<String>) -> Self {
        Self {
            store,
            platform,
            channels,
        }
    }

    /// Required channel usernames (no `@`)
    pub fn channels(&self) -> &[String] {
        &self.channels
    }

    pub fn is_verified(&self, user_id: i64) -> bool {
        self.store.is_verified(&user_id.to_string())
    }

    /// Record a verified user; false if already present
    pub fn record_verified(&self, user_id: i64) -> bool {
        let added = self.store.insert_verified(&user_id.to_string());
        if added {
            info!("User {} verified", user_id);
        }
        added
    }

    /// Whether `user_id` has joined `channel`; lookup failures count as not joined
    pub async fn check_membership(&self, user_id: i64, channel: &str) -> bool {
        let channel = channel.trim_start_matches('@');
        match self.platform.chat_member_status(channel, user_id).await {
            Ok(status) => status.is_joined(),
            Err(e) => {
                warn!("Membership lookup for {} in @{} failed: {}", user_id, channel, e);
                false
            }
        }
    }

    /// Required channels the user has not joined, in configured order
    pub async fn missing_channels(&self, user_id: i64) -> Vec<String> {
        let mut missing = Vec::new();
        for channel in &self.channels {
            if !self.check_membership(user_id, channel).await {
                missing.push(channel.clone());
            }
        }
        missing
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keyboards::Keyboard;
    use crate::platform::{MemberStatus, OutgoingMessage, PlatformError};
    use async_trait::async_trait;
    use std::collections::HashMap;

    /// Membership table; unknown channels fail the lookup
    struct MembershipPlatform {
        statuses: HashMap<String, MemberStatus>,
    }

    #[async_trait]
    impl Platform for MembershipPlatform {
        async fn send_message(&self, _message: OutgoingMessage) -> Result<(), PlatformError> {
            Ok(())
        }

        async fn edit_message(&self, _: i64, _: i32, _: &str, _: Option<Keyboard>) -> bool {
            true
        }

        async fn answer_callback(&self, _: &str, _: Option<&str>) -> Result<(), PlatformError> {
            Ok(())
        }

        async fn chat_member_status(&self, channel: &str, _user_id: i64) -> Result<MemberStatus, PlatformError> {
            self.statuses
                .get(channel)
                .copied()
                .ok_or_else(|| PlatformError::LookupFailed("chat not found".to_string()))
        }

        async fn send_typing(&self, _: i64) -> Result<(), PlatformError> {
            Ok(())
        }
    }

    fn gate(statuses: &[(&str, MemberStatus)], dir: &std::path::Path) -> VerificationGate {
        let platform = MembershipPlatform {
            statuses: statuses.iter().map(|(c, s)| (c.to_string(), *s)).collect(),
        };
        VerificationGate::new(
            Arc::new(BotStore::open_dir(dir)),
            Arc::new(platform),
            vec!["alpha".to_string(), "beta".to_string(), "gamma".to_string()],
        )
    }

    #[tokio::test]
    async fn test_missing_channels() {
        let dir = tempfile::tempdir().unwrap();
        let gate = gate(
            &[("alpha", MemberStatus::Member), ("beta", MemberStatus::Left)],
            dir.path(),
        );

        assert!(gate.check_membership(1, "@alpha").await);
        // "gamma" lookup errors out and counts as missing
        assert_eq!(gate.missing_channels(1).await, vec!["beta", "gamma"]);
    }

    #[tokio::test]
    async fn test_owner_and_admin_count_as_joined() {
        let dir = tempfile::tempdir().unwrap();
        let gate = gate(
            &[
                ("alpha", MemberStatus::Owner),
                ("beta", MemberStatus::Administrator),
                ("gamma", MemberStatus::Member),
            ],
            dir.path(),
        );
        assert!(gate.missing_channels(1).await.is_empty());
    }

    #[test]
    fn test_record_verified_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let gate = gate(&[], dir.path());

        assert!(!gate.is_verified(5));
        assert!(gate.record_verified(5));
        assert!(!gate.record_verified(5));
        assert!(gate.is_verified(5));
    }
}
