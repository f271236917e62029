use crate::error::{Result, SsoError};
use crate::models::SsoToken;
use sha1::{Digest, Sha1};
use std::fs;
use std::path::PathBuf;

/// Read-only view of the AWS CLI v2 token cache in ~/.aws/sso/cache/
pub struct AwsCliTokenCache {
    cache_dir: PathBuf,
}

impl AwsCliTokenCache {
    pub fn new() -> Result<Self> {
        let cache_dir = dirs::home_dir()
            .ok_or_else(|| {
                SsoError::ConfigError("Could not determine home directory".to_string())
            })?
            .join(".aws")
            .join("sso")
            .join("cache");
        Ok(Self { cache_dir })
    }

    #[cfg(test)]
    pub fn with_dir(cache_dir: PathBuf) -> Self {
        Self { cache_dir }
    }

    /// File stem the AWS CLI uses: SHA1 of the session name for
    /// `[sso-session]` profiles, else of the start URL
    pub(crate) fn cache_key(key_material: &str) -> String {
        let mut hasher = Sha1::new();
        hasher.update(key_material.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    fn read_token(path: &std::path::Path) -> Option<SsoToken> {
        let contents = fs::read_to_string(path).ok()?;
        match serde_json::from_str::<SsoToken>(&contents) {
            Ok(token) => Some(token),
            Err(e) => {
                tracing::debug!("Skipping {}: {}", path.display(), e);
                None
            }
        }
    }

    /// Newest token for `start_url`, looked up by hashed file name and then
    /// by scanning every cache entry. Expired tokens are returned too so the
    /// caller can tell "expired" from "missing".
    pub fn find_token(&self, start_url: &str, session_name: Option<&str>) -> Option<SsoToken> {
        let key = Self::cache_key(session_name.unwrap_or(start_url));
        let direct = self.cache_dir.join(format!("{}.json", key));
        if let Some(token) = Self::read_token(&direct) {
            return Some(token);
        }

        let entries = fs::read_dir(&self.cache_dir).ok()?;
        entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.extension().and_then(|s| s.to_str()) == Some("json"))
            .filter_map(|path| Self::read_token(&path))
            .filter(|token| token.start_url.as_deref() == Some(start_url))
            .max_by_key(|token| token.expires_at)
    }
}
