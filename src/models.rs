use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Cached SSO-OIDC token (AWS CLI v2 compatible format)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SsoToken {
    #[serde(rename = "accessToken", alias = "access_token")]
    pub access_token: String,

    #[serde(rename = "expiresAt", alias = "expires_at")]
    pub expires_at: DateTime<Utc>,

    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub region: Option<String>,

    #[serde(
        rename = "startUrl",
        alias = "start_url",
        skip_serializing_if = "Option::is_none",
        default
    )]
    pub start_url: Option<String>,
}

impl SsoToken {
    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }
}

/// AWS temporary credentials
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleCredentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: String,
    pub expiration: DateTime<Utc>,
}

impl RoleCredentials {
    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expiration
    }

    /// Expiration as Unix seconds
    pub fn expires_at(&self) -> i64 {
        self.expiration.timestamp()
    }
}
