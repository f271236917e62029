// Merged account/role model for one SSO instance
mod tags;

pub use tags::{Predicate, RoleTags, TagIndex};

use crate::arn::{account_id_to_string, make_role_arn, parse_role_arn};
use crate::error::{Result, SsoError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const TAG_ACCOUNT_ID: &str = "AccountId";
pub const TAG_ACCOUNT_ALIAS: &str = "AccountAlias";
pub const TAG_ACCOUNT_NAME: &str = "AccountName";
pub const TAG_EMAIL: &str = "Email";
pub const TAG_ROLE: &str = "Role";
pub const TAG_DEFAULT_REGION: &str = "DefaultRegion";
pub const TAG_HISTORY: &str = "History";

fn is_zero(v: &i64) -> bool {
    *v == 0
}

/// An assumable role, identified by `(account_id, role_name)`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Role {
    pub account_id: u64,
    pub role_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_region: Option<String>,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
    /// Unix expiry of the last issued credentials, 0 when unknown
    #[serde(default, skip_serializing_if = "is_zero")]
    pub expires_at: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub via: Option<String>,
}

impl Role {
    pub fn new(account_id: u64, role_name: &str) -> Self {
        Self {
            account_id,
            role_name: role_name.to_string(),
            profile: None,
            default_region: None,
            tags: BTreeMap::new(),
            expires_at: 0,
            via: None,
        }
    }

    pub fn arn(&self) -> String {
        make_role_arn(self.account_id, &self.role_name)
    }

    pub fn history(&self) -> Option<&str> {
        self.tags.get(TAG_HISTORY).map(String::as_str)
    }
}

/// Encode the `History` tag value: `<alias>:<role>,<unix seconds>`
pub fn format_history_tag(alias: &str, role_name: &str, used_at: i64) -> String {
    format!("{}:{},{}", alias, role_name, used_at)
}

/// Decode a `History` tag value into its label and timestamp
pub fn parse_history_tag(value: &str) -> Result<(&str, i64)> {
    let (label, ts) = value.rsplit_once(',').ok_or_else(|| {
        SsoError::MalformedIdentifier(format!("Too few fields in History tag '{}'", value))
    })?;
    let used_at = ts.trim().parse::<i64>().map_err(|e| {
        SsoError::MalformedIdentifier(format!("Bad timestamp in History tag '{}': {}", value, e))
    })?;
    Ok((label, used_at))
}

/// An AWS account and the roles the user can assume in it
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub account_id: u64,
    /// Display name reported by AWS SSO
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub alias: String,
    /// Display name from the user's config
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub email_address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_region: Option<String>,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
    #[serde(default)]
    pub roles: BTreeMap<String, Role>,
}

impl Account {
    pub fn new(account_id: u64) -> Self {
        Self {
            account_id,
            ..Default::default()
        }
    }

    /// Config name wins over the SSO alias; falls back to the padded id
    pub fn display_name(&self) -> String {
        match &self.name {
            Some(name) if !name.is_empty() => name.clone(),
            _ if !self.alias.is_empty() => self.alias.clone(),
            _ => account_id_to_string(self.account_id),
        }
    }

    /// Every tag value carried by the roles of this account
    pub fn tag_index(&self) -> TagIndex {
        let mut index = TagIndex::new();
        for role in self.roles.values() {
            index.add_tags(&role.tags);
        }
        index
    }

    /// Label written into `History` tags
    pub fn history_label(&self) -> String {
        if self.alias.is_empty() {
            self.display_name()
        } else {
            self.alias.clone()
        }
    }
}

/// All accounts and roles for one SSO instance
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RoleCatalog {
    #[serde(default)]
    pub sso_region: String,
    #[serde(default)]
    pub start_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_region: Option<String>,
    #[serde(default)]
    pub accounts: BTreeMap<u64, Account>,
}

impl RoleCatalog {
    pub fn new(sso_region: &str, start_url: &str, default_region: Option<String>) -> Self {
        Self {
            sso_region: sso_region.to_string(),
            start_url: start_url.to_string(),
            default_region,
            accounts: BTreeMap::new(),
        }
    }

    pub fn account_ids(&self) -> Vec<u64> {
        self.accounts.keys().copied().collect()
    }

    pub fn account(&self, account_id: u64) -> Option<&Account> {
        self.accounts.get(&account_id)
    }

    pub fn all_roles(&self) -> impl Iterator<Item = &Role> {
        self.accounts.values().flat_map(|a| a.roles.values())
    }

    pub fn role_count(&self) -> usize {
        self.accounts.values().map(|a| a.roles.len()).sum()
    }

    pub fn account_roles(&self, account_id: u64) -> Vec<&Role> {
        self.accounts
            .get(&account_id)
            .map(|a| a.roles.values().collect())
            .unwrap_or_default()
    }

    pub fn get_role(&self, account_id: u64, role_name: &str) -> Result<&Role> {
        self.accounts
            .get(&account_id)
            .and_then(|a| a.roles.get(role_name))
            .ok_or_else(|| SsoError::NotFound(make_role_arn(account_id, role_name)))
    }

    pub fn get_role_mut(&mut self, account_id: u64, role_name: &str) -> Result<&mut Role> {
        self.accounts
            .get_mut(&account_id)
            .and_then(|a| a.roles.get_mut(role_name))
            .ok_or_else(|| SsoError::NotFound(make_role_arn(account_id, role_name)))
    }

    pub fn get_role_by_arn(&self, arn: &str) -> Result<&Role> {
        let (account_id, role_name) = parse_role_arn(arn)?;
        self.get_role(account_id, &role_name)
    }

    pub fn get_role_by_arn_mut(&mut self, arn: &str) -> Result<&mut Role> {
        let (account_id, role_name) = parse_role_arn(arn)?;
        self.get_role_mut(account_id, &role_name)
    }

    /// Profile name for a role: the configured one, else `<account>/<role>`
    pub fn profile_name(&self, role: &Role) -> String {
        if let Some(profile) = &role.profile {
            return profile.clone();
        }
        let account = self
            .accounts
            .get(&role.account_id)
            .map(Account::display_name)
            .unwrap_or_else(|| account_id_to_string(role.account_id));
        format!("{}/{}", account, role.role_name)
    }

    pub fn get_role_by_profile(&self, profile: &str) -> Result<&Role> {
        self.all_roles()
            .find(|role| self.profile_name(role) == profile)
            .ok_or_else(|| SsoError::NotFound(format!("profile {}", profile)))
    }

    /// Region to use for a role: its own, else the instance default
    pub fn region_for<'a>(&'a self, role: &'a Role) -> Option<&'a str> {
        role.default_region
            .as_deref()
            .or(self.default_region.as_deref())
    }

    /// Rewrite the identity-derived tags on every role.
    ///
    /// These are applied last, so user tags can never shadow them.
    pub fn recompute_derived_tags(&mut self) {
        for account in self.accounts.values_mut() {
            let account_id = account_id_to_string(account.account_id);
            for role in account.roles.values_mut() {
                role.tags
                    .insert(TAG_ACCOUNT_ID.to_string(), account_id.clone());
                role.tags
                    .insert(TAG_ROLE.to_string(), role.role_name.clone());
                if !account.alias.is_empty() {
                    role.tags
                        .insert(TAG_ACCOUNT_ALIAS.to_string(), account.alias.clone());
                }
                if let Some(name) = account.name.as_ref().filter(|n| !n.is_empty()) {
                    role.tags.insert(TAG_ACCOUNT_NAME.to_string(), name.clone());
                }
                if !account.email_address.is_empty() {
                    role.tags
                        .insert(TAG_EMAIL.to_string(), account.email_address.clone());
                }
                if let Some(region) = &role.default_region {
                    role.tags
                        .insert(TAG_DEFAULT_REGION.to_string(), region.clone());
                }
            }
        }
    }

    pub fn role_tags(&self) -> RoleTags {
        let mut roles = RoleTags::new();
        for role in self.all_roles() {
            roles.insert(role.arn(), role.tags.clone());
        }
        roles
    }

    pub fn tag_index(&self) -> TagIndex {
        let mut index = TagIndex::new();
        for account in self.accounts.values() {
            index.merge(&account.tag_index());
        }
        index
    }

    /// Tag view for the interactive selector: every key and value is a
    /// single whitespace-free token and `History` drops its timestamp
    pub fn select_role_tags(&self) -> RoleTags {
        let mut roles = RoleTags::new();
        for role in self.all_roles() {
            let tags = role
                .tags
                .iter()
                .map(|(k, v)| {
                    let value = if k == TAG_HISTORY {
                        parse_history_tag(v)
                            .map(|(label, _)| label.to_string())
                            .unwrap_or_else(|_| v.clone())
                    } else {
                        v.clone()
                    };
                    (k.replace(' ', "_"), value.replace(' ', "_"))
                })
                .collect();
            roles.insert(role.arn(), tags);
        }
        roles
    }
}
