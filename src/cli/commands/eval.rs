use super::{credential_env, ENV_VARS};
use crate::cli::{RoleArgs, RunContext};
use crate::error::Result;

/// Quote for POSIX shells
fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

pub async fn execute(ctx: &mut RunContext, role: RoleArgs, clear: bool) -> Result<()> {
    if clear {
        for var in ENV_VARS {
            println!("unset {}", var);
        }
        return Ok(());
    }

    let Some(arn) = ctx.choose_role(&role).await? else {
        return Ok(());
    };
    let creds = ctx.credentials(&arn).await?;

    for (key, value) in credential_env(ctx.cached_catalog(), &arn, &creds)? {
        println!("export {}={}", key, shell_quote(&value));
    }
    Ok(())
}
