// CLI interface
pub mod commands;
mod context;

pub use context::RunContext;

use crate::error::Result;
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "ssorole")]
#[command(about = "Find AWS SSO roles by tag and use their credentials", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to the config file
    #[arg(long, global = true, env = "SSOROLE_CONFIG")]
    pub config: Option<PathBuf>,

    /// SSO instance to use
    #[arg(long, global = true, env = "AWS_SSO")]
    pub sso: Option<String>,

    /// Enable verbose/debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Print URLs instead of opening them
    #[arg(long, global = true)]
    pub print_url: bool,
}

/// How a command picks its role; prompts when nothing is given
#[derive(Args, Debug, Clone, Default)]
pub struct RoleArgs {
    /// Role ARN (`arn:aws:iam::<id>:role/<name>` or `<id>:<name>`)
    #[arg(long, conflicts_with_all = ["account", "role", "profile"])]
    pub arn: Option<String>,

    /// AWS account id
    #[arg(short, long, requires = "role")]
    pub account: Option<String>,

    /// Role name
    #[arg(short = 'R', long, requires = "account")]
    pub role: Option<String>,

    /// Profile name
    #[arg(short, long, conflicts_with_all = ["account", "role"])]
    pub profile: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List accounts and roles
    List {
        /// Refresh from AWS SSO even if the cache is fresh
        #[arg(long)]
        force_update: bool,

        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// Show role tags
    Tags {
        #[arg(long)]
        force_update: bool,

        /// Only roles in this account
        #[arg(short, long)]
        account: Option<String>,

        /// Only roles with this name
        #[arg(short = 'R', long)]
        role: Option<String>,
    },

    /// Pick a role by narrowing on tags and print its ARN
    Select {
        /// Tags to match instead of prompting, e.g. `Env:prod,Team:ops`
        #[arg(long)]
        tags: Option<String>,
    },

    /// Print shell exports for a role's credentials
    Eval {
        #[command(flatten)]
        role: RoleArgs,

        /// Print commands that unset the variables instead
        #[arg(long)]
        clear: bool,
    },

    /// Execute a command with a role's credentials
    Exec {
        #[command(flatten)]
        role: RoleArgs,

        /// Command to execute
        #[arg(last = true, required = true)]
        command: Vec<String>,
    },

    /// Open the AWS Console for a role
    Console {
        #[command(flatten)]
        role: RoleArgs,

        /// Console region (defaults to the role's region)
        #[arg(long)]
        region: Option<String>,
    },

    /// Forget cached credentials and their expiry times
    Flush,

    /// Generate shell completion scripts
    ///
    /// INSTALLATION:
    ///
    /// Bash:
    ///   eval "$(ssorole completions bash)"    # Add to ~/.bashrc
    ///
    /// Zsh:
    ///   eval "$(ssorole completions zsh)"     # Add to ~/.zshrc
    ///
    /// Fish:
    ///   ssorole completions fish > ~/.config/fish/completions/ssorole.fish
    Completions {
        /// Shell type to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Debug, Clone, ValueEnum)]
#[allow(clippy::enum_variant_names)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
    Elvish,
}

pub async fn execute(args: Cli) -> Result<()> {
    if let Commands::Completions { shell } = &args.command {
        commands::completions::execute(shell.clone());
        return Ok(());
    }

    let mut ctx = RunContext::new(args.config.as_deref(), args.sso.as_deref())?;

    match args.command {
        Commands::List {
            force_update,
            format,
        } => commands::list::execute(&mut ctx, force_update, format).await,
        Commands::Tags {
            force_update,
            account,
            role,
        } => commands::tags::execute(&mut ctx, force_update, account, role).await,
        Commands::Select { tags } => commands::select::execute(&mut ctx, tags).await,
        Commands::Eval { role, clear } => commands::eval::execute(&mut ctx, role, clear).await,
        Commands::Exec { role, command } => commands::exec::execute(&mut ctx, role, command).await,
        Commands::Console { role, region } => {
            commands::console::execute(&mut ctx, role, region, args.print_url).await
        }
        Commands::Flush => commands::flush::execute(&mut ctx),
        Commands::Completions { .. } => Ok(()),
    }
}
