use crate::arn::account_id_to_string;
use crate::cli::{OutputFormat, RunContext};
use crate::error::Result;
use crate::expiry::format_time_remaining;
use serde::Serialize;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RoleRow {
    account_id: String,
    account_name: String,
    role_name: String,
    profile: String,
    arn: String,
    expires_at: i64,
}

pub async fn execute(ctx: &mut RunContext, force_update: bool, format: OutputFormat) -> Result<()> {
    let catalog = ctx.catalog(force_update).await?;

    let mut rows = Vec::with_capacity(catalog.role_count());
    for account_id in catalog.account_ids() {
        let account_name = catalog
            .account(account_id)
            .map(|a| a.display_name())
            .unwrap_or_default();
        for role in catalog.account_roles(account_id) {
            rows.push(RoleRow {
                account_id: account_id_to_string(account_id),
                account_name: account_name.clone(),
                role_name: role.role_name.clone(),
                profile: catalog.profile_name(role),
                arn: role.arn(),
                expires_at: role.expires_at,
            });
        }
    }

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&rows)?),
        OutputFormat::Text => {
            let name_width = rows.iter().map(|r| r.account_name.len()).max().unwrap_or(0);
            let role_width = rows.iter().map(|r| r.role_name.len()).max().unwrap_or(0);
            println!(
                "{:12}  {:nw$}  {:rw$}  {}",
                "AccountId",
                "AccountName",
                "RoleName",
                "Profile / Expires",
                nw = name_width.max(11),
                rw = role_width.max(8)
            );
            for row in &rows {
                let expires = format_time_remaining(row.expires_at);
                let tail = if expires.is_empty() {
                    row.profile.clone()
                } else {
                    format!("{} ({})", row.profile, expires)
                };
                println!(
                    "{:12}  {:nw$}  {:rw$}  {}",
                    row.account_id,
                    row.account_name,
                    row.role_name,
                    tail,
                    nw = name_width.max(11),
                    rw = role_width.max(8)
                );
            }
        }
    }

    Ok(())
}
