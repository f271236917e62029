use crate::arn::{account_id_to_string, parse_account_id};
use crate::catalog::{Predicate, TAG_ACCOUNT_ID, TAG_ROLE};
use crate::cli::RunContext;
use crate::error::Result;

pub async fn execute(
    ctx: &mut RunContext,
    force_update: bool,
    account: Option<String>,
    role_name: Option<String>,
) -> Result<()> {
    let account = account.as_deref().map(parse_account_id).transpose()?;
    let catalog = ctx.catalog(force_update).await?;

    if account.is_none() && role_name.is_none() {
        for (key, values) in catalog.tag_index().iter() {
            println!("{}", key);
            for value in values {
                println!("    {}", value);
            }
        }
        return Ok(());
    }

    let mut predicate = Predicate::new();
    if let Some(id) = account {
        predicate.insert(TAG_ACCOUNT_ID.to_string(), account_id_to_string(id));
    }
    if let Some(name) = role_name {
        predicate.insert(TAG_ROLE.to_string(), name);
    }

    let roles = catalog.role_tags();
    eprintln!("{} matching roles", roles.match_count(&predicate));
    for arn in roles.matching_roles(&predicate) {
        println!("{}", arn);
        for (key, value) in roles.get(&arn).into_iter().flatten() {
            println!("    {}: {}", key, value);
        }
    }
    Ok(())
}
