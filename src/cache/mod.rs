// Persistent cache of the merged role catalog and usage history
mod history;
mod merge;
pub(crate) mod persist;

use crate::catalog::{RoleCatalog, TAG_HISTORY};
use crate::error::{Result, SsoError};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Bump whenever the on-disk layout changes; older files are stale
pub const CACHE_VERSION: u32 = 2;

/// The on-disk document
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CacheRecord {
    #[serde(default)]
    pub version: u32,
    /// Config modification time the catalogs were built against
    #[serde(default)]
    pub config_created_at: i64,
    #[serde(default)]
    pub instances: BTreeMap<String, InstanceCache>,
}

/// Cached state for one SSO instance
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct InstanceCache {
    #[serde(default)]
    pub last_update: i64,
    /// Recently used role ARNs, most recent first
    #[serde(default)]
    pub history: Vec<String>,
    #[serde(default)]
    pub roles: RoleCatalog,
}

static EMPTY_INSTANCE: InstanceCache = InstanceCache {
    last_update: 0,
    history: Vec::new(),
    roles: RoleCatalog {
        sso_region: String::new(),
        start_url: String::new(),
        default_region: None,
        accounts: BTreeMap::new(),
    },
};

impl InstanceCache {
    /// Remove `History` tags from roles that are no longer in the history list
    pub(crate) fn strip_stale_history_tags(&mut self) {
        let keep: BTreeSet<&str> = self.history.iter().map(String::as_str).collect();
        for account in self.roles.accounts.values_mut() {
            for role in account.roles.values_mut() {
                if role.tags.contains_key(TAG_HISTORY) && !keep.contains(role.arn().as_str()) {
                    role.tags.remove(TAG_HISTORY);
                }
            }
        }
    }

    /// Drop history entries whose role is not in the catalog
    pub(crate) fn retain_known_history(&mut self) {
        let roles = &self.roles;
        self.history.retain(|arn| {
            let known = roles.get_role_by_arn(arn).is_ok();
            if !known {
                tracing::debug!("Dropping history entry for vanished role {}", arn);
            }
            known
        });
    }
}

/// Why a cached catalog has to be rebuilt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Staleness {
    SchemaVersion { found: u32, current: u32 },
    TtlExpired { last_update: i64, ttl_secs: i64 },
    ConfigModified { built_against: i64, modified_at: i64 },
}

impl fmt::Display for Staleness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Staleness::SchemaVersion { found, current } => {
                write!(f, "cache version {} is older than {}", found, current)
            }
            Staleness::TtlExpired {
                last_update,
                ttl_secs,
            } => write!(
                f,
                "last refreshed at {} with a TTL of {}s",
                last_update, ttl_secs
            ),
            Staleness::ConfigModified {
                built_against,
                modified_at,
            } => write!(
                f,
                "config changed at {} after the cache was built at {}",
                modified_at, built_against
            ),
        }
    }
}

/// History retention settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistoryPolicy {
    /// Maximum number of entries
    pub limit: usize,
    /// Maximum age in minutes; 0 or less disables age-based pruning
    pub max_age_minutes: i64,
}

impl Default for HistoryPolicy {
    fn default() -> Self {
        Self {
            limit: 10,
            max_age_minutes: 1440,
        }
    }
}

pub struct Cache {
    path: PathBuf,
    record: CacheRecord,
    sso_name: String,
    policy: HistoryPolicy,
}

impl Cache {
    /// Load the cache file for the `sso_name` instance.
    ///
    /// A missing or unreadable file starts an empty cache. A file that is
    /// present but cannot be decoded is reported as `CorruptCache`. Expired
    /// history is pruned on every open.
    pub fn open(path: &Path, sso_name: &str, policy: HistoryPolicy) -> Result<Self> {
        let record = match fs::read(path) {
            Ok(bytes) => serde_json::from_slice::<CacheRecord>(&bytes)
                .map_err(|e| SsoError::CorruptCache(format!("{}: {}", path.display(), e)))?,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::info!("Creating new cache file: {}", path.display());
                CacheRecord::default()
            }
            Err(e) => {
                tracing::warn!("Unable to read cache file {}: {}", path.display(), e);
                CacheRecord::default()
            }
        };

        let mut cache = Self {
            path: path.to_path_buf(),
            record,
            sso_name: sso_name.to_string(),
            policy,
        };
        cache.prune_expired_history(policy.max_age_minutes);
        Ok(cache)
    }

    /// State of the active instance (empty if it was never refreshed)
    pub fn instance(&self) -> &InstanceCache {
        self.record
            .instances
            .get(&self.sso_name)
            .unwrap_or(&EMPTY_INSTANCE)
    }

    pub(crate) fn instance_mut(&mut self) -> &mut InstanceCache {
        self.record
            .instances
            .entry(self.sso_name.clone())
            .or_default()
    }

    pub fn catalog(&self) -> &RoleCatalog {
        &self.instance().roles
    }

    /// Reason the cached catalog must be rebuilt, if any
    pub fn staleness_at(
        &self,
        schema_version: u32,
        ttl_secs: i64,
        config_modified_at: i64,
        now: i64,
    ) -> Option<Staleness> {
        if self.record.version < schema_version {
            return Some(Staleness::SchemaVersion {
                found: self.record.version,
                current: schema_version,
            });
        }

        let last_update = self.instance().last_update;
        if now > last_update.saturating_add(ttl_secs) {
            return Some(Staleness::TtlExpired {
                last_update,
                ttl_secs,
            });
        }

        if config_modified_at > self.record.config_created_at {
            return Some(Staleness::ConfigModified {
                built_against: self.record.config_created_at,
                modified_at: config_modified_at,
            });
        }

        None
    }

    pub fn is_stale(&self, schema_version: u32, ttl_secs: i64, config_modified_at: i64) -> bool {
        self.staleness_at(
            schema_version,
            ttl_secs,
            config_modified_at,
            Utc::now().timestamp(),
        )
        .is_some()
    }

    /// `Err(StaleCache)` when the catalog needs a refresh
    pub fn ensure_fresh(&self, ttl_secs: i64, config_modified_at: i64) -> Result<()> {
        match self.staleness_at(
            CACHE_VERSION,
            ttl_secs,
            config_modified_at,
            Utc::now().timestamp(),
        ) {
            Some(reason) => Err(SsoError::StaleCache(reason)),
            None => Ok(()),
        }
    }

    /// Write the whole cache to disk, optionally stamping the active
    /// instance's `last_update`
    pub fn save(&mut self, update_timestamp: bool) -> Result<()> {
        let mut record = self.record.clone();
        record.version = CACHE_VERSION;
        if update_timestamp {
            record
                .instances
                .entry(self.sso_name.clone())
                .or_default()
                .last_update = Utc::now().timestamp();
        }

        let json = serde_json::to_vec_pretty(&record)
            .map_err(|e| SsoError::Persistence(format!("encode cache: {}", e)))?;
        persist::write_atomic(&self.path, &json)?;
        self.record = record;
        tracing::debug!("Saved cache to {}", self.path.display());
        Ok(())
    }

    /// Record the expiry of freshly issued credentials and persist
    pub fn set_role_expires(&mut self, arn: &str, expires_at: i64) -> Result<()> {
        let role = self.instance_mut().roles.get_role_by_arn_mut(arn)?;
        role.expires_at = expires_at;
        self.save(false)
    }

    /// Forget every known credential expiry in the active instance and persist
    pub fn mark_all_expired(&mut self) -> Result<()> {
        let instance = self.instance_mut();
        for account in instance.roles.accounts.values_mut() {
            for role in account.roles.values_mut() {
                role.expires_at = 0;
            }
        }
        self.save(false)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::catalog::{Account, Role};

    impl Cache {
        pub(crate) fn path(&self) -> &Path {
            &self.path
        }

        pub(crate) fn record(&self) -> &CacheRecord {
            &self.record
        }

        pub(crate) fn history(&self) -> &[String] {
            &self.instance().history
        }
    }

    pub(crate) fn sample_catalog() -> RoleCatalog {
        let mut catalog = RoleCatalog::new("us-east-1", "https://example.awsapps.com/start", None);
        let mut account = Account::new(11111);
        account.alias = "Sandbox".to_string();
        for name in ["Admin", "ReadOnly"] {
            account.roles.insert(name.to_string(), Role::new(11111, name));
        }
        catalog.accounts.insert(11111, account);
        catalog.recompute_derived_tags();
        catalog
    }

    pub(crate) fn open_with(dir: &Path, catalog: RoleCatalog) -> Cache {
        let mut cache = Cache::open(&dir.join("cache.json"), "Default", HistoryPolicy::default())
            .unwrap();
        cache.instance_mut().roles = catalog;
        cache
    }

    #[test]
    fn test_open_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let cache = Cache::open(&dir.path().join("cache.json"), "Default", HistoryPolicy::default())
            .unwrap();
        assert_eq!(cache.catalog().role_count(), 0);
        assert!(cache.history().is_empty());
        assert_eq!(cache.record().version, 0);
    }

    #[test]
    fn test_open_corrupt_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");
        fs::write(&path, "{ not json").unwrap();

        let result = Cache::open(&path, "Default", HistoryPolicy::default());
        assert!(matches!(result, Err(SsoError::CorruptCache(_))));
    }

    #[test]
    fn test_save_and_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let mut cache = open_with(dir.path(), sample_catalog());
        cache.save(true).unwrap();

        let reopened =
            Cache::open(cache.path(), "Default", HistoryPolicy::default()).unwrap();
        assert_eq!(reopened.record().version, CACHE_VERSION);
        assert_eq!(reopened.catalog(), cache.catalog());
        assert!(reopened.instance().last_update > 0);

        // other instances are untouched and independent
        let other = Cache::open(cache.path(), "Other", HistoryPolicy::default()).unwrap();
        assert_eq!(other.catalog().role_count(), 0);
    }

    #[test]
    fn test_full_record_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let mut catalog = sample_catalog();
        catalog.default_region = Some("eu-west-1".to_string());

        let account = catalog.accounts.get_mut(&11111).unwrap();
        account.name = Some("Sandbox Dev".to_string());
        account.email_address = "sandbox@example.com".to_string();
        account.default_region = Some("eu-central-1".to_string());
        account.tags.insert("Team".to_string(), "Platform".to_string());

        let admin = account.roles.get_mut("Admin").unwrap();
        admin.profile = Some("sandbox-admin".to_string());
        admin.default_region = Some("us-west-2".to_string());
        admin.expires_at = 1_900_000_000;
        admin.via = Some("arn:aws:iam::000000022222:role/Jump".to_string());
        admin.tags.insert("Env".to_string(), "Dev".to_string());
        catalog.recompute_derived_tags();

        let mut cache = open_with(dir.path(), catalog);
        cache.record.config_created_at = 1_700_000_000;
        cache.record_use("arn:aws:iam::000000011111:role/ReadOnly").unwrap();
        cache.record_use("arn:aws:iam::11111:role/Admin").unwrap();
        cache.save(true).unwrap();

        let reopened =
            Cache::open(cache.path(), "Default", HistoryPolicy::default()).unwrap();
        assert_eq!(reopened.record(), cache.record());
        assert_eq!(reopened.history().len(), 2);
        assert!(reopened
            .catalog()
            .get_role(11111, "Admin")
            .unwrap()
            .history()
            .is_some());
    }

    #[test]
    fn test_failed_save_keeps_record() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        fs::write(&blocker, "").unwrap();

        let mut cache =
            Cache::open(&blocker.join("cache.json"), "Default", HistoryPolicy::default())
                .unwrap();
        cache.instance_mut().roles = sample_catalog();

        assert!(matches!(cache.save(true), Err(SsoError::Persistence(_))));
        assert_eq!(cache.record().version, 0);
        assert_eq!(cache.instance().last_update, 0);
        assert!(cache.is_stale(CACHE_VERSION, 60, 0));
    }

    #[cfg(unix)]
    #[test]
    fn test_save_is_private() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let mut cache = open_with(dir.path(), sample_catalog());
        cache.save(false).unwrap();

        let mode = fs::metadata(cache.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn test_staleness_reasons() {
        let dir = tempfile::tempdir().unwrap();
        let mut cache = open_with(dir.path(), sample_catalog());
        let now = 1_700_000_000;

        assert!(matches!(
            cache.staleness_at(CACHE_VERSION, 60, 0, now),
            Some(Staleness::SchemaVersion { found: 0, .. })
        ));

        cache.record.version = CACHE_VERSION;
        cache.instance_mut().last_update = now - 30;
        assert_eq!(cache.staleness_at(CACHE_VERSION, 60, 0, now), None);
        assert!(matches!(
            cache.staleness_at(CACHE_VERSION, 10, 0, now),
            Some(Staleness::TtlExpired { .. })
        ));

        cache.record.config_created_at = now - 100;
        assert_eq!(cache.staleness_at(CACHE_VERSION, 60, now - 100, now), None);
        assert!(matches!(
            cache.staleness_at(CACHE_VERSION, 60, now - 50, now),
            Some(Staleness::ConfigModified { .. })
        ));

        // an old layout is stale even with a fresh TTL and unchanged config
        cache.record.version = CACHE_VERSION - 1;
        assert!(matches!(
            cache.staleness_at(CACHE_VERSION, 60, now - 100, now),
            Some(Staleness::SchemaVersion { found, current: CACHE_VERSION })
                if found == CACHE_VERSION - 1
        ));
    }

    #[test]
    fn test_ensure_fresh_reports_stale() {
        let dir = tempfile::tempdir().unwrap();
        let mut cache = open_with(dir.path(), sample_catalog());
        assert!(cache.is_stale(CACHE_VERSION, 60, 0));
        let err = cache.ensure_fresh(60, 0).unwrap_err();
        assert!(err.is_transient());
        assert!(matches!(err, SsoError::StaleCache(_)));

        cache.save(true).unwrap();
        assert!(!cache.is_stale(CACHE_VERSION, 60, 0));
        assert!(cache.ensure_fresh(60, 0).is_ok());
    }

    #[test]
    fn test_expiry_bookkeeping() {
        let dir = tempfile::tempdir().unwrap();
        let mut cache = open_with(dir.path(), sample_catalog());

        cache
            .set_role_expires("arn:aws:iam::000000011111:role/Admin", 1_900_000_000)
            .unwrap();
        let reopened =
            Cache::open(cache.path(), "Default", HistoryPolicy::default()).unwrap();
        assert_eq!(
            reopened.catalog().get_role(11111, "Admin").unwrap().expires_at,
            1_900_000_000
        );

        assert!(matches!(
            cache.set_role_expires("arn:aws:iam::000000011111:role/Missing", 1),
            Err(SsoError::NotFound(_))
        ));

        cache.mark_all_expired().unwrap();
        assert!(cache.catalog().all_roles().all(|r| r.expires_at == 0));
    }
}
