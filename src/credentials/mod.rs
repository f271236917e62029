// Role credential issuance with store-backed reuse
use crate::arn::make_role_arn;
use crate::error::{Result, SsoError};
use crate::models::RoleCredentials;
use crate::source::CredentialResolver;
use crate::store::{credentials_key, get_as, save_as, SecureStore};

/// Hands out credentials, reusing unexpired ones from the store
pub struct CredentialManager<'a> {
    store: &'a mut dyn SecureStore,
}

impl<'a> CredentialManager<'a> {
    pub fn new(store: &'a mut dyn SecureStore) -> Self {
        Self { store }
    }

    /// Unexpired stored credentials for a role, if any
    pub fn cached(&self, account_id: u64, role_name: &str) -> Result<Option<RoleCredentials>> {
        let key = credentials_key(&make_role_arn(account_id, role_name));
        match get_as::<RoleCredentials>(&*self.store, &key) {
            Ok(creds) if !creds.is_expired() => Ok(Some(creds)),
            Ok(_) => Ok(None),
            Err(SsoError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Get credentials for a role, fetching if necessary
    pub async fn get_credentials(
        &mut self,
        resolver: &dyn CredentialResolver,
        account_id: u64,
        role_name: &str,
    ) -> Result<RoleCredentials> {
        if let Some(creds) = self.cached(account_id, role_name)? {
            tracing::debug!("Reusing stored credentials for {}/{}", account_id, role_name);
            return Ok(creds);
        }

        let creds = resolver.resolve(account_id, role_name).await?;
        let key = credentials_key(&make_role_arn(account_id, role_name));
        save_as(&mut *self.store, &key, &creds)?;
        Ok(creds)
    }

    /// Remove every stored role credential; returns how many were removed
    pub fn clear_all(&mut self) -> Result<usize> {
        let prefix = credentials_key("");
        let keys: Vec<String> = self
            .store
            .keys()
            .into_iter()
            .filter(|k| k.starts_with(&prefix))
            .collect();
        for key in &keys {
            self.store.delete(key)?;
        }
        Ok(keys.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::MockCredentialResolver;
    use crate::store::JsonStore;
    use chrono::{Duration, Utc};
    use mockall::predicate::eq;

    fn creds(hours: i64) -> RoleCredentials {
        RoleCredentials {
            access_key_id: "AKIA".to_string(),
            secret_access_key: "secret".to_string(),
            session_token: "token".to_string(),
            expiration: Utc::now() + Duration::hours(hours),
        }
    }

    #[tokio::test]
    async fn test_fetch_once_then_reuse() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = JsonStore::open(&dir.path().join("store.json")).unwrap();

        let mut resolver = MockCredentialResolver::new();
        resolver
            .expect_resolve()
            .with(eq(11111), eq("Admin"))
            .times(1)
            .returning(|_, _| Ok(creds(1)));

        let mut manager = CredentialManager::new(&mut store);
        let first = manager.get_credentials(&resolver, 11111, "Admin").await.unwrap();
        let second = manager.get_credentials(&resolver, 11111, "Admin").await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_expired_credentials_are_refetched() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = JsonStore::open(&dir.path().join("store.json")).unwrap();
        save_as(
            &mut store,
            &credentials_key("arn:aws:iam::000000011111:role/Admin"),
            &creds(-1),
        )
        .unwrap();

        let mut resolver = MockCredentialResolver::new();
        resolver
            .expect_resolve()
            .times(1)
            .returning(|_, _| Ok(creds(2)));

        let mut manager = CredentialManager::new(&mut store);
        let fresh = manager.get_credentials(&resolver, 11111, "Admin").await.unwrap();
        assert!(!fresh.is_expired());
    }

    #[tokio::test]
    async fn test_resolver_errors_propagate() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = JsonStore::open(&dir.path().join("store.json")).unwrap();

        let mut resolver = MockCredentialResolver::new();
        resolver
            .expect_resolve()
            .returning(|id, role| Err(SsoError::NotFound(make_role_arn(id, role))));

        let mut manager = CredentialManager::new(&mut store);
        let err = manager
            .get_credentials(&resolver, 11111, "Gone")
            .await
            .unwrap_err();
        assert!(matches!(err, SsoError::NotFound(_)));
        assert!(store.keys().is_empty());
    }

    #[test]
    fn test_clear_all_only_touches_credentials() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = JsonStore::open(&dir.path().join("store.json")).unwrap();
        save_as(&mut store, &credentials_key("a"), &creds(1)).unwrap();
        save_as(&mut store, &credentials_key("b"), &creds(1)).unwrap();
        store.save("token:https://x", serde_json::Value::Null).unwrap();

        let removed = CredentialManager::new(&mut store).clear_all().unwrap();
        assert_eq!(removed, 2);
        assert_eq!(store.keys(), vec!["token:https://x".to_string()]);
    }
}
