use super::{CredentialResolver, RemoteAccount, RoleSource};
use crate::arn::{account_id_to_string, make_role_arn, parse_account_id};
use crate::error::{Result, SsoError};
use crate::models::RoleCredentials;
use async_trait::async_trait;
use aws_sdk_sso::operation::get_role_credentials::GetRoleCredentialsError;
use aws_sdk_sso::Client as SsoClient;
use chrono::{TimeZone, Utc};
use std::future::Future;
use std::time::Duration;

/// AWS SSO portal client bound to one access token
pub struct SsoSource {
    client: SsoClient,
    access_token: String,
    timeout: Duration,
}

impl SsoSource {
    pub async fn new(region: &str, access_token: String, timeout: Duration) -> Result<Self> {
        let config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(aws_config::Region::new(region.to_string()))
            .load()
            .await;

        Ok(Self {
            client: SsoClient::new(&config),
            access_token,
            timeout,
        })
    }

    async fn bounded<T, F>(&self, what: &str, call: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(SsoError::Timeout(format!(
                "{} after {}s",
                what,
                self.timeout.as_secs()
            ))),
        }
    }

    async fn fetch_accounts(&self) -> Result<Vec<RemoteAccount>> {
        let mut accounts = Vec::new();
        let mut next_token: Option<String> = None;

        loop {
            let mut request = self.client.list_accounts().access_token(&self.access_token);
            if let Some(token) = next_token {
                request = request.next_token(token);
            }

            let response = request
                .send()
                .await
                .map_err(|e| SsoError::AwsSdk(format!("Failed to list accounts: {}", e)))?;

            for account in response.account_list() {
                let Some(id) = account.account_id() else {
                    continue;
                };
                accounts.push(RemoteAccount {
                    account_id: parse_account_id(id)?,
                    alias: account.account_name().unwrap_or_default().to_string(),
                    email_address: account.email_address().unwrap_or_default().to_string(),
                });
            }

            next_token = response.next_token().map(|s| s.to_string());
            if next_token.is_none() {
                break;
            }
        }

        tracing::debug!("AWS SSO returned {} accounts", accounts.len());
        Ok(accounts)
    }

    async fn fetch_roles(&self, account_id: u64) -> Result<Vec<String>> {
        let account_id = account_id_to_string(account_id);
        let mut roles = Vec::new();
        let mut next_token: Option<String> = None;

        loop {
            let mut request = self
                .client
                .list_account_roles()
                .access_token(&self.access_token)
                .account_id(&account_id);
            if let Some(token) = next_token {
                request = request.next_token(token);
            }

            let response = request.send().await.map_err(|e| {
                SsoError::AwsSdk(format!("Failed to list roles for {}: {}", account_id, e))
            })?;

            roles.extend(
                response
                    .role_list()
                    .iter()
                    .filter_map(|role| role.role_name().map(str::to_string)),
            );

            next_token = response.next_token().map(|s| s.to_string());
            if next_token.is_none() {
                break;
            }
        }

        Ok(roles)
    }

    async fn fetch_credentials(&self, account_id: u64, role_name: &str) -> Result<RoleCredentials> {
        let response = self
            .client
            .get_role_credentials()
            .access_token(&self.access_token)
            .account_id(account_id_to_string(account_id))
            .role_name(role_name)
            .send()
            .await
            .map_err(|e| match e.into_service_error() {
                GetRoleCredentialsError::ResourceNotFoundException(_) => {
                    SsoError::NotFound(make_role_arn(account_id, role_name))
                }
                GetRoleCredentialsError::UnauthorizedException(_) => SsoError::TokenExpired,
                other => SsoError::AwsSdk(format!("Failed to get role credentials: {}", other)),
            })?;

        let creds = response
            .role_credentials()
            .ok_or_else(|| SsoError::AwsSdk("No role_credentials in response".to_string()))?;

        let field = |value: Option<&str>, name: &str| {
            value
                .map(str::to_string)
                .ok_or_else(|| SsoError::AwsSdk(format!("No {} in credentials", name)))
        };

        let expiration = Utc
            .timestamp_millis_opt(creds.expiration())
            .single()
            .ok_or_else(|| SsoError::AwsSdk("Invalid expiration timestamp".to_string()))?;

        Ok(RoleCredentials {
            access_key_id: field(creds.access_key_id(), "access_key_id")?,
            secret_access_key: field(creds.secret_access_key(), "secret_access_key")?,
            session_token: field(creds.session_token(), "session_token")?,
            expiration,
        })
    }
}

#[async_trait]
impl RoleSource for SsoSource {
    async fn list_accounts(&self) -> Result<Vec<RemoteAccount>> {
        self.bounded("listing accounts", self.fetch_accounts()).await
    }

    async fn list_roles(&self, account: &RemoteAccount) -> Result<Vec<String>> {
        self.bounded("listing roles", self.fetch_roles(account.account_id))
            .await
    }
}

#[async_trait]
impl CredentialResolver for SsoSource {
    async fn resolve(&self, account_id: u64, role_name: &str) -> Result<RoleCredentials> {
        tracing::info!(
            "Fetching credentials for {}",
            make_role_arn(account_id, role_name)
        );
        self.bounded(
            "fetching role credentials",
            self.fetch_credentials(account_id, role_name),
        )
        .await
    }
}
