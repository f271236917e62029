use super::credential_env;
use crate::cli::{RoleArgs, RunContext};
use crate::error::{Result, SsoError};
use std::process::Command;

pub async fn execute(ctx: &mut RunContext, role: RoleArgs, command: Vec<String>) -> Result<()> {
    let Some((program, args)) = command.split_first() else {
        return Err(SsoError::InvalidConfig("No command specified".to_string()));
    };

    let Some(arn) = ctx.choose_role(&role).await? else {
        return Ok(());
    };
    let creds = ctx.credentials(&arn).await?;
    let env = credential_env(ctx.cached_catalog(), &arn, &creds)?;

    tracing::debug!("Running {} as {}", program, arn);
    let status = Command::new(program)
        .args(args)
        .env_remove("AWS_PROFILE")
        .envs(env)
        .status()
        .map_err(SsoError::Io)?;

    // Exit with same code as the command
    if !status.success() {
        std::process::exit(status.code().unwrap_or(1));
    }

    Ok(())
}
