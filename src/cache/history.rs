// Recently used roles
use super::Cache;
use crate::arn::{make_role_arn, parse_role_arn};
use crate::catalog::{format_history_tag, parse_history_tag, TAG_HISTORY};
use crate::error::{Result, SsoError};
use chrono::Utc;

impl Cache {
    /// Move `arn` to the front of the history and stamp its `History` tag.
    /// Does not persist; call `save` afterwards.
    pub fn record_use(&mut self, arn: &str) -> Result<()> {
        self.record_use_at(arn, Utc::now().timestamp())
    }

    pub(crate) fn record_use_at(&mut self, arn: &str, now: i64) -> Result<()> {
        let (account_id, role_name) = parse_role_arn(arn)?;
        let arn = make_role_arn(account_id, &role_name);
        let limit = self.policy.limit;

        let instance = self.instance_mut();
        let account = instance
            .roles
            .accounts
            .get_mut(&account_id)
            .ok_or_else(|| SsoError::NotFound(arn.clone()))?;
        let label = account.history_label();
        let role = account
            .roles
            .get_mut(&role_name)
            .ok_or_else(|| SsoError::NotFound(arn.clone()))?;
        role.tags.insert(
            TAG_HISTORY.to_string(),
            format_history_tag(&label, &role_name, now),
        );

        instance.history.retain(|h| h != &arn);
        instance.history.insert(0, arn);
        instance.history.truncate(limit);
        instance.strip_stale_history_tags();
        Ok(())
    }

    /// Drop history entries older than `max_age_minutes`. Entries whose ARN
    /// or tag cannot be decoded are dropped with a warning. A limit of 0 or
    /// less disables age-based pruning.
    pub fn prune_expired_history(&mut self, max_age_minutes: i64) {
        self.prune_expired_history_at(max_age_minutes, Utc::now().timestamp());
    }

    pub(crate) fn prune_expired_history_at(&mut self, max_age_minutes: i64, now: i64) {
        if max_age_minutes <= 0 {
            return;
        }
        let max_age_secs = max_age_minutes.saturating_mul(60);

        let instance = self.instance_mut();
        let entries = std::mem::take(&mut instance.history);
        let mut kept = Vec::with_capacity(entries.len());

        for arn in entries {
            let (account_id, role_name) = match parse_role_arn(&arn) {
                Ok(parsed) => parsed,
                Err(e) => {
                    tracing::error!("Unable to parse History ARN {}: {}", arn, e);
                    continue;
                }
            };
            let role = match instance.roles.get_role_mut(account_id, &role_name) {
                Ok(role) => role,
                Err(_) => {
                    tracing::debug!("Dropping history entry for vanished role {}", arn);
                    continue;
                }
            };

            let used_at = role
                .history()
                .map(|tag| parse_history_tag(tag).map(|(_, ts)| ts));
            match used_at {
                None => {
                    tracing::warn!("{} is in history but has no History tag", arn);
                }
                Some(Err(e)) => {
                    tracing::warn!("Dropping history for {}: {}", arn, e);
                    role.tags.remove(TAG_HISTORY);
                }
                Some(Ok(ts)) if now - ts > max_age_secs => {
                    tracing::debug!("Expiring history entry {}", arn);
                    role.tags.remove(TAG_HISTORY);
                }
                Some(Ok(_)) => kept.push(arn),
            }
        }

        instance.history = kept;
        instance.strip_stale_history_tags();
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::{open_with, sample_catalog};
    use super::super::HistoryPolicy;
    use super::*;
    use crate::catalog::{Account, Role};

    const ADMIN: &str = "arn:aws:iam::000000011111:role/Admin";
    const READ_ONLY: &str = "arn:aws:iam::000000011111:role/ReadOnly";

    fn history_tag(cache: &Cache, role: &str) -> Option<String> {
        cache
            .catalog()
            .get_role(11111, role)
            .unwrap()
            .history()
            .map(str::to_string)
    }

    #[test]
    fn test_record_use_moves_to_front() {
        let dir = tempfile::tempdir().unwrap();
        let mut cache = open_with(dir.path(), sample_catalog());

        cache.record_use_at(ADMIN, 100).unwrap();
        cache.record_use_at(READ_ONLY, 200).unwrap();
        cache.record_use_at(ADMIN, 300).unwrap();

        assert_eq!(cache.history(), &[ADMIN, READ_ONLY]);
        assert_eq!(history_tag(&cache, "Admin").unwrap(), "Sandbox:Admin,300");
        assert_eq!(history_tag(&cache, "ReadOnly").unwrap(), "Sandbox:ReadOnly,200");
    }

    #[test]
    fn test_record_use_accepts_short_arn() {
        let dir = tempfile::tempdir().unwrap();
        let mut cache = open_with(dir.path(), sample_catalog());
        cache.record_use_at("11111:Admin", 100).unwrap();
        assert_eq!(cache.history(), &[ADMIN]);
    }

    #[test]
    fn test_record_use_unknown_role() {
        let dir = tempfile::tempdir().unwrap();
        let mut cache = open_with(dir.path(), sample_catalog());
        assert!(matches!(
            cache.record_use_at("arn:aws:iam::000000011111:role/Nope", 1),
            Err(SsoError::NotFound(_))
        ));
        assert!(cache.history().is_empty());
    }

    #[test]
    fn test_history_limit_evicts_and_strips_tags() {
        let dir = tempfile::tempdir().unwrap();
        let mut catalog = sample_catalog();
        let mut account = Account::new(22222);
        account.roles.insert("Ops".into(), Role::new(22222, "Ops"));
        catalog.accounts.insert(22222, account);

        let mut cache = open_with(dir.path(), catalog);
        cache.policy = HistoryPolicy {
            limit: 2,
            max_age_minutes: 0,
        };

        cache.record_use_at(ADMIN, 1).unwrap();
        cache.record_use_at(READ_ONLY, 2).unwrap();
        cache.record_use_at("22222:Ops", 3).unwrap();

        assert_eq!(
            cache.history(),
            &["arn:aws:iam::000000022222:role/Ops", READ_ONLY]
        );
        assert!(history_tag(&cache, "Admin").is_none());
        // alias is empty so the padded id labels the entry
        assert_eq!(
            cache.catalog().get_role(22222, "Ops").unwrap().history(),
            Some("000000022222:Ops,3")
        );
    }

    #[test]
    fn test_prune_expired_history() {
        let dir = tempfile::tempdir().unwrap();
        let mut cache = open_with(dir.path(), sample_catalog());
        let now = 1_700_000_000;

        cache.record_use_at(ADMIN, now - 2 * 3600).unwrap();
        cache.record_use_at(READ_ONLY, now - 60).unwrap();

        cache.prune_expired_history_at(0, now);
        assert_eq!(cache.history().len(), 2);

        cache.prune_expired_history_at(60, now);
        assert_eq!(cache.history(), &[READ_ONLY]);
        assert!(history_tag(&cache, "Admin").is_none());
        assert!(history_tag(&cache, "ReadOnly").is_some());
    }

    #[test]
    fn test_prune_drops_malformed_entries() {
        let dir = tempfile::tempdir().unwrap();
        let mut cache = open_with(dir.path(), sample_catalog());
        let now = 1_700_000_000;

        cache.record_use_at(ADMIN, now).unwrap();
        cache.record_use_at(READ_ONLY, now).unwrap();
        cache
            .instance_mut()
            .roles
            .get_role_mut(11111, "Admin")
            .unwrap()
            .tags
            .insert(TAG_HISTORY.to_string(), "garbage".to_string());
        cache.instance_mut().history.push("not-an-arn".to_string());

        cache.prune_expired_history_at(60, now);
        assert_eq!(cache.history(), &[READ_ONLY]);
        assert!(history_tag(&cache, "Admin").is_none());
    }
}
