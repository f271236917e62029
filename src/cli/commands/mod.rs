pub mod completions;
pub mod console;
pub mod eval;
pub mod exec;
pub mod flush;
pub mod list;
pub mod select;
pub mod tags;

use crate::catalog::RoleCatalog;
use crate::error::Result;
use crate::models::RoleCredentials;

pub const ENV_VARS: &[&str] = &[
    "AWS_ACCESS_KEY_ID",
    "AWS_SECRET_ACCESS_KEY",
    "AWS_SESSION_TOKEN",
    "AWS_DEFAULT_REGION",
    "AWS_SSO_ROLE_ARN",
    "AWS_SSO_PROFILE",
    "AWS_SSO_SESSION_EXPIRATION",
];

/// Environment for running as `arn` with `creds`
pub fn credential_env(
    catalog: &RoleCatalog,
    arn: &str,
    creds: &RoleCredentials,
) -> Result<Vec<(&'static str, String)>> {
    let role = catalog.get_role_by_arn(arn)?;

    let mut env = vec![
        ("AWS_ACCESS_KEY_ID", creds.access_key_id.clone()),
        ("AWS_SECRET_ACCESS_KEY", creds.secret_access_key.clone()),
        ("AWS_SESSION_TOKEN", creds.session_token.clone()),
    ];
    if let Some(region) = catalog.region_for(role) {
        env.push(("AWS_DEFAULT_REGION", region.to_string()));
    }
    env.push(("AWS_SSO_ROLE_ARN", role.arn()));
    env.push(("AWS_SSO_PROFILE", catalog.profile_name(role)));
    env.push(("AWS_SSO_SESSION_EXPIRATION", creds.expiration.to_rfc3339()));
    Ok(env)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Account, Role};
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_credential_env() {
        let mut catalog = RoleCatalog::new("us-east-1", "https://x", Some("us-west-2".into()));
        let mut account = Account::new(11111);
        account.alias = "Sandbox".to_string();
        account.roles.insert("Admin".into(), Role::new(11111, "Admin"));
        catalog.accounts.insert(11111, account);

        let creds = RoleCredentials {
            access_key_id: "AKIA".to_string(),
            secret_access_key: "secret".to_string(),
            session_token: "token".to_string(),
            expiration: Utc.timestamp_opt(1_900_000_000, 0).unwrap(),
        };

        let env = credential_env(&catalog, "11111:Admin", &creds).unwrap();
        let get = |k: &str| env.iter().find(|(key, _)| *key == k).map(|(_, v)| v.as_str());
        assert_eq!(get("AWS_ACCESS_KEY_ID"), Some("AKIA"));
        assert_eq!(get("AWS_DEFAULT_REGION"), Some("us-west-2"));
        assert_eq!(get("AWS_SSO_ROLE_ARN"), Some("arn:aws:iam::000000011111:role/Admin"));
        assert_eq!(get("AWS_SSO_PROFILE"), Some("Sandbox/Admin"));
        assert!(env.iter().all(|(k, _)| ENV_VARS.contains(k)));
    }
}
