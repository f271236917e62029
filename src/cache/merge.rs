// Rebuilding a catalog from AWS SSO and the user's config
use super::Cache;
use crate::catalog::{Account, Role, RoleCatalog, TAG_HISTORY};
use crate::config::SsoConfig;
use crate::error::Result;
use crate::source::RoleSource;

impl Cache {
    /// Replace the active instance's catalog with a fresh merge of
    /// `source` and `sso`. Credential expiry and usage history carry over
    /// for roles that still exist. Does not persist; call `save(true)`.
    pub async fn refresh(
        &mut self,
        source: &dyn RoleSource,
        sso: &SsoConfig,
        config_modified_at: i64,
    ) -> Result<()> {
        let catalog = build_catalog(source, self.catalog(), sso).await?;
        tracing::info!(
            "Refreshed {} roles in {} accounts for {}",
            catalog.role_count(),
            catalog.accounts.len(),
            self.sso_name
        );

        let instance = self.instance_mut();
        instance.roles = catalog;
        instance.retain_known_history();
        instance.strip_stale_history_tags();
        self.record.config_created_at = config_modified_at;
        Ok(())
    }
}

/// Build a new catalog from the remote listing with config overrides
/// applied, carrying forward per-role state from `previous`
pub async fn build_catalog(
    source: &dyn RoleSource,
    previous: &RoleCatalog,
    sso: &SsoConfig,
) -> Result<RoleCatalog> {
    let mut catalog = RoleCatalog::new(&sso.sso_region, &sso.start_url, sso.default_region.clone());

    for remote in source.list_accounts().await? {
        let mut account = Account::new(remote.account_id);
        for role_name in source.list_roles(&remote).await? {
            account
                .roles
                .insert(role_name.clone(), Role::new(remote.account_id, &role_name));
        }
        account.alias = remote.alias;
        account.email_address = remote.email_address;
        catalog.accounts.insert(account.account_id, account);
    }

    apply_overrides(&mut catalog, sso)?;
    carry_forward(&mut catalog, previous);
    catalog.recompute_derived_tags();
    Ok(catalog)
}

/// Overlay config accounts and roles. Entries missing from AWS SSO are
/// synthesized so config-only roles stay selectable.
fn apply_overrides(catalog: &mut RoleCatalog, sso: &SsoConfig) -> Result<()> {
    for (account_id, config) in sso.account_overrides()? {
        let account = catalog
            .accounts
            .entry(account_id)
            .or_insert_with(|| Account::new(account_id));

        if config.name.is_some() {
            account.name = config.name.clone();
        }
        if config.default_region.is_some() {
            account.default_region = config.default_region.clone();
        }
        account
            .tags
            .extend(config.tags.iter().map(|(k, v)| (k.clone(), v.clone())));

        for (role_name, role_config) in &config.roles {
            let role = account
                .roles
                .entry(role_name.clone())
                .or_insert_with(|| Role::new(account_id, role_name));
            role.profile = role_config.profile.clone();
            role.via = role_config.via.clone();
            role.default_region = role_config.default_region.clone();
            role.tags
                .extend(role_config.tags.iter().map(|(k, v)| (k.clone(), v.clone())));
        }

        // account tags fill in under role tags; regions inherit the same way
        for role in account.roles.values_mut() {
            for (key, value) in &account.tags {
                role.tags.entry(key.clone()).or_insert_with(|| value.clone());
            }
            if role.default_region.is_none() {
                role.default_region = account.default_region.clone();
            }
        }
    }
    Ok(())
}

fn carry_forward(catalog: &mut RoleCatalog, previous: &RoleCatalog) {
    for account in catalog.accounts.values_mut() {
        for role in account.roles.values_mut() {
            let Ok(old) = previous.get_role(role.account_id, &role.role_name) else {
                continue;
            };
            role.expires_at = old.expires_at;
            if let Some(history) = old.tags.get(TAG_HISTORY) {
                role.tags.insert(TAG_HISTORY.to_string(), history.clone());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::open_with;
    use super::*;
    use crate::catalog::{TAG_ACCOUNT_ALIAS, TAG_DEFAULT_REGION, TAG_ROLE};
    use crate::config::{AccountConfig, RoleConfig};
    use crate::error::SsoError;
    use crate::source::{MockRoleSource, RemoteAccount};
    use std::collections::BTreeMap;

    fn remote(account_id: u64, alias: &str) -> RemoteAccount {
        RemoteAccount {
            account_id,
            alias: alias.to_string(),
            email_address: format!("{}@example.com", alias.to_lowercase()),
        }
    }

    fn mock_source(roles: Vec<(u64, &'static str, Vec<&'static str>)>) -> MockRoleSource {
        let mut source = MockRoleSource::new();
        let accounts: Vec<RemoteAccount> = roles
            .iter()
            .map(|(id, alias, _)| remote(*id, alias))
            .collect();
        source
            .expect_list_accounts()
            .returning(move || Ok(accounts.clone()));
        source.expect_list_roles().returning(move |account| {
            Ok(roles
                .iter()
                .find(|(id, _, _)| *id == account.account_id)
                .map(|(_, _, names)| names.iter().map(|n| n.to_string()).collect())
                .unwrap_or_default())
        });
        source
    }

    fn sso_config() -> SsoConfig {
        SsoConfig {
            sso_region: "us-east-1".to_string(),
            start_url: "https://example.awsapps.com/start".to_string(),
            default_region: Some("us-west-2".to_string()),
            sso_session: None,
            accounts: BTreeMap::new(),
        }
    }

    #[tokio::test]
    async fn test_build_from_remote() {
        let source = mock_source(vec![
            (11111, "Sandbox", vec!["Admin", "ReadOnly"]),
            (22222, "Prod", vec!["ReadOnly"]),
        ]);

        let catalog = build_catalog(&source, &RoleCatalog::default(), &sso_config())
            .await
            .unwrap();

        assert_eq!(catalog.role_count(), 3);
        assert_eq!(catalog.default_region.as_deref(), Some("us-west-2"));
        let role = catalog.get_role(22222, "ReadOnly").unwrap();
        assert_eq!(role.tags[TAG_ACCOUNT_ALIAS], "Prod");
        assert_eq!(role.tags[TAG_ROLE], "ReadOnly");
        assert_eq!(
            catalog.account(22222).unwrap().email_address,
            "prod@example.com"
        );
    }

    #[tokio::test]
    async fn test_config_overrides_and_synthesized_roles() {
        let source = mock_source(vec![(11111, "Sandbox", vec!["Admin", "ReadOnly"])]);

        let mut sso = sso_config();
        let mut account = AccountConfig {
            name: Some("Play".to_string()),
            default_region: Some("eu-west-1".to_string()),
            ..Default::default()
        };
        account.tags.insert("Env".to_string(), "dev".to_string());
        account.tags.insert("Team".to_string(), "platform".to_string());
        let mut admin = RoleConfig {
            profile: Some("play-admin".to_string()),
            ..Default::default()
        };
        admin.tags.insert("Team".to_string(), "ops".to_string());
        account.roles.insert("Admin".to_string(), admin);
        account.roles.insert(
            "Jump".to_string(),
            RoleConfig {
                default_region: Some("ap-south-1".to_string()),
                ..Default::default()
            },
        );
        sso.accounts.insert("000000011111".to_string(), account);
        sso.accounts.insert(
            "33333".to_string(),
            AccountConfig {
                name: Some("Configured".to_string()),
                ..Default::default()
            },
        );

        let catalog = build_catalog(&source, &RoleCatalog::default(), &sso)
            .await
            .unwrap();

        let admin = catalog.get_role(11111, "Admin").unwrap();
        assert_eq!(admin.profile.as_deref(), Some("play-admin"));
        assert_eq!(admin.tags["Team"], "ops");
        assert_eq!(admin.tags["Env"], "dev");
        assert_eq!(admin.tags[TAG_DEFAULT_REGION], "eu-west-1");

        let read_only = catalog.get_role(11111, "ReadOnly").unwrap();
        assert_eq!(read_only.tags["Team"], "platform");

        let jump = catalog.get_role(11111, "Jump").unwrap();
        assert_eq!(catalog.region_for(jump), Some("ap-south-1"));

        assert_eq!(catalog.account(11111).unwrap().display_name(), "Play");
        assert_eq!(catalog.account(33333).unwrap().display_name(), "Configured");
        assert_eq!(catalog.role_count(), 3);
    }

    #[tokio::test]
    async fn test_refresh_carries_forward_state() {
        let dir = tempfile::tempdir().unwrap();
        let first = mock_source(vec![(11111, "Sandbox", vec!["Admin", "ReadOnly"])]);
        let sso = sso_config();

        let mut cache = open_with(dir.path(), RoleCatalog::default());
        cache.refresh(&first, &sso, 10).await.unwrap();
        cache
            .instance_mut()
            .roles
            .get_role_mut(11111, "Admin")
            .unwrap()
            .expires_at = 1_900_000_000;
        cache
            .record_use_at("arn:aws:iam::000000011111:role/Admin", 1_700_000_000)
            .unwrap();
        cache
            .record_use_at("arn:aws:iam::000000011111:role/ReadOnly", 1_700_000_100)
            .unwrap();

        // ReadOnly disappears upstream
        let second = mock_source(vec![(11111, "Sandbox", vec!["Admin"])]);
        cache.refresh(&second, &sso, 20).await.unwrap();

        let admin = cache.catalog().get_role(11111, "Admin").unwrap();
        assert_eq!(admin.expires_at, 1_900_000_000);
        assert_eq!(admin.history(), Some("Sandbox:Admin,1700000000"));
        assert_eq!(cache.history(), &["arn:aws:iam::000000011111:role/Admin"]);
        assert_eq!(cache.record().config_created_at, 20);
    }

    #[tokio::test]
    async fn test_refresh_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let source = mock_source(vec![(11111, "Sandbox", vec!["Admin"])]);
        let sso = sso_config();

        let mut cache = open_with(dir.path(), RoleCatalog::default());
        cache.refresh(&source, &sso, 10).await.unwrap();
        let first = cache.catalog().clone();
        cache.refresh(&source, &sso, 10).await.unwrap();
        assert_eq!(cache.catalog(), &first);
    }

    #[tokio::test]
    async fn test_refresh_failure_keeps_cache() {
        let dir = tempfile::tempdir().unwrap();
        let mut source = MockRoleSource::new();
        source
            .expect_list_accounts()
            .returning(|| Err(SsoError::Timeout("listing accounts after 1s".to_string())));

        let mut cache = open_with(dir.path(), super::super::tests::sample_catalog());
        let before = cache.catalog().clone();

        let err = cache.refresh(&source, &sso_config(), 10).await.unwrap_err();
        assert!(err.is_transient());
        assert_eq!(cache.catalog(), &before);
    }
}
