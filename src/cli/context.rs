// Per-invocation state shared by every command
use crate::arn::{make_role_arn, parse_account_id, parse_role_arn};
use crate::auth::{load_access_token, AwsCliTokenCache};
use crate::cache::{Cache, HistoryPolicy, CACHE_VERSION};
use crate::catalog::RoleCatalog;
use crate::cli::RoleArgs;
use crate::config::{Config, SsoConfig};
use crate::credentials::CredentialManager;
use crate::error::{Result, SsoError};
use crate::models::RoleCredentials;
use crate::select::{prompt, NarrowingEngine, Selection};
use crate::source::SsoSource;
use crate::store::JsonStore;
use std::path::Path;
use std::time::Duration;

/// Config, cache and store for one run, plus a lazily connected AWS SSO
/// client that is reused by every remote call in the run
pub struct RunContext {
    config: Config,
    sso_name: String,
    cache: Cache,
    store: JsonStore,
    source: Option<SsoSource>,
}

impl RunContext {
    pub fn new(config_path: Option<&Path>, sso: Option<&str>) -> Result<Self> {
        let config = Config::load(config_path)?;
        let sso_name = config.select_sso(sso)?.0.to_string();
        tracing::debug!("Using SSO instance {}", sso_name);

        let policy = HistoryPolicy {
            limit: config.history_limit,
            max_age_minutes: config.history_minutes,
        };
        let cache = Cache::open(&Config::cache_file_path()?, &sso_name, policy)?;
        let store = JsonStore::open(&Config::store_file_path()?)?;

        Ok(Self {
            config,
            sso_name,
            cache,
            store,
            source: None,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn sso_config(&self) -> Result<&SsoConfig> {
        Ok(self.config.select_sso(Some(&self.sso_name))?.1)
    }

    /// Catalog as currently cached, without refreshing
    pub fn cached_catalog(&self) -> &RoleCatalog {
        self.cache.catalog()
    }

    async fn connect(&mut self) -> Result<()> {
        if self.source.is_some() {
            return Ok(());
        }

        let sso = self.sso_config()?;
        let token = load_access_token(
            &self.store,
            &AwsCliTokenCache::new()?,
            &sso.start_url,
            sso.sso_session.as_deref(),
        )?;
        let source = SsoSource::new(
            &sso.sso_region,
            token.access_token,
            Duration::from_secs(self.config.credential_timeout_secs),
        )
        .await?;
        self.source = Some(source);
        Ok(())
    }

    async fn refresh(&mut self) -> Result<()> {
        self.connect().await?;
        let source = self.source.as_ref().ok_or(SsoError::NoSessionFound)?;
        let sso = self.config.select_sso(Some(&self.sso_name))?.1;
        self.cache
            .refresh(source, sso, self.config.modified_at())
            .await?;
        self.cache.save(true)
    }

    /// The role catalog, refreshed first when stale or `force` is set.
    /// A transient refresh failure falls back to cached roles.
    pub async fn catalog(&mut self, force: bool) -> Result<&RoleCatalog> {
        let ttl_secs = self.config.cache_ttl_secs;
        let modified_at = self.config.modified_at();
        let stale = self.cache.is_stale(CACHE_VERSION, ttl_secs, modified_at);

        if force || stale {
            if let Err(SsoError::StaleCache(reason)) =
                self.cache.ensure_fresh(ttl_secs, modified_at)
            {
                tracing::info!("Refreshing AWS SSO roles: {}", reason);
            }
            match self.refresh().await {
                Ok(()) => {}
                Err(e) if !force && e.is_transient() && self.cache.catalog().role_count() > 0 => {
                    tracing::warn!("Using cached roles, refresh failed: {}", e);
                }
                Err(e) => return Err(e),
            }
        }

        Ok(self.cache.catalog())
    }

    /// Resolve the role named by `args`, or ask interactively.
    /// `None` when the user cancels.
    pub async fn choose_role(&mut self, args: &RoleArgs) -> Result<Option<String>> {
        let catalog = self.catalog(false).await?;

        let role = match (&args.arn, &args.account, &args.role, &args.profile) {
            (Some(arn), _, _, _) => catalog.get_role_by_arn(arn)?,
            (None, Some(account), Some(role), _) => {
                catalog.get_role(parse_account_id(account)?, role)?
            }
            (None, None, None, Some(profile)) => catalog.get_role_by_profile(profile)?,
            (None, None, None, None) => {
                let engine = NarrowingEngine::from_catalog(catalog);
                if engine.role_count() == 0 {
                    return Err(SsoError::NotFound(
                        "any roles for this SSO instance".to_string(),
                    ));
                }
                return match prompt::run(&engine)? {
                    Selection::Role(arn) => Ok(Some(arn)),
                    Selection::Cancelled => Ok(None),
                };
            }
            _ => {
                return Err(SsoError::InvalidConfig(
                    "--account and --role must be given together".to_string(),
                ))
            }
        };

        Ok(Some(role.arn()))
    }

    /// Credentials for `arn`, reused from the store while valid. The role
    /// is recorded in history and its expiry persisted.
    pub async fn credentials(&mut self, arn: &str) -> Result<RoleCredentials> {
        let (account_id, role_name) = parse_role_arn(arn)?;
        let arn = make_role_arn(account_id, &role_name);
        self.cache.catalog().get_role(account_id, &role_name)?;

        let cached = CredentialManager::new(&mut self.store).cached(account_id, &role_name)?;
        let creds = match cached {
            Some(creds) => creds,
            None => {
                self.connect().await?;
                let source = self.source.as_ref().ok_or(SsoError::NoSessionFound)?;
                CredentialManager::new(&mut self.store)
                    .get_credentials(source, account_id, &role_name)
                    .await?
            }
        };

        self.cache.record_use(&arn)?;
        self.cache.set_role_expires(&arn, creds.expires_at())?;
        Ok(creds)
    }

    /// Forget every credential expiry and stored credential
    pub fn flush(&mut self) -> Result<usize> {
        self.cache.mark_all_expired()?;
        CredentialManager::new(&mut self.store).clear_all()
    }
}
