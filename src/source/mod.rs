// Remote collaborators: role discovery and credential issuance
mod sso;

pub use sso::SsoSource;

use crate::error::Result;
use crate::models::RoleCredentials;
use async_trait::async_trait;

/// An account as reported by AWS SSO
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteAccount {
    pub account_id: u64,
    pub alias: String,
    pub email_address: String,
}

/// Lists the accounts and roles the signed-in user can reach
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RoleSource: Send + Sync {
    async fn list_accounts(&self) -> Result<Vec<RemoteAccount>>;

    async fn list_roles(&self, account: &RemoteAccount) -> Result<Vec<String>>;
}

/// Issues temporary credentials for a role
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CredentialResolver: Send + Sync {
    async fn resolve(&self, account_id: u64, role_name: &str) -> Result<RoleCredentials>;
}
