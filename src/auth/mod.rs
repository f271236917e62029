// SSO access token lookup
mod token_cache;

pub use token_cache::AwsCliTokenCache;

use crate::error::{Result, SsoError};
use crate::models::SsoToken;
use crate::store::{get_as, token_key, SecureStore};

/// Find a usable access token for `start_url`: the secure store first,
/// then the AWS CLI v2 cache left behind by `aws sso login`
pub fn load_access_token(
    store: &dyn SecureStore,
    cli_cache: &AwsCliTokenCache,
    start_url: &str,
    session_name: Option<&str>,
) -> Result<SsoToken> {
    let stored = match get_as::<SsoToken>(store, &token_key(start_url)) {
        Ok(token) => Some(token),
        Err(SsoError::NotFound(_)) => None,
        Err(e) => return Err(e),
    };

    let token = match stored.filter(|t| !t.is_expired()) {
        Some(token) => token,
        None => cli_cache
            .find_token(start_url, session_name)
            .ok_or(SsoError::NoSessionFound)?,
    };

    if token.is_expired() {
        tracing::debug!("Access token for {} expired at {}", start_url, token.expires_at);
        return Err(SsoError::TokenExpired);
    }
    Ok(token)
}
