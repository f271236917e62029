use crate::cli::{RoleArgs, RunContext};
use crate::console::generate_console_url;
use crate::error::Result;
use crate::url::UrlAction;

pub async fn execute(
    ctx: &mut RunContext,
    role: RoleArgs,
    region: Option<String>,
    print_url: bool,
) -> Result<()> {
    let Some(arn) = ctx.choose_role(&role).await? else {
        return Ok(());
    };
    let creds = ctx.credentials(&arn).await?;

    let catalog = ctx.cached_catalog();
    let role = catalog.get_role_by_arn(&arn)?;
    let region = region.or_else(|| catalog.region_for(role).map(str::to_string));

    eprintln!("Opening AWS Console...");
    eprintln!("  Role: {}", catalog.profile_name(role));
    if let Some(r) = &region {
        eprintln!("  Region: {}", r);
    }

    let url = generate_console_url(&creds, region.as_deref(), env!("CARGO_PKG_NAME")).await?;

    let config = ctx.config();
    let action = if print_url {
        UrlAction::Print
    } else {
        config.url_action.clone()
    };
    action.open(&url, config.clipboard_command.as_deref())
}
