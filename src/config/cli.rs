use clap::Parser;

/// Every flag is optional; a bare invocation is the normal postdeploy hook.
#[derive(Debug, Clone, Parser)]
#[command(name = "heroku-postdeploy")]
#[command(
    about = "Add domains to Heroku and update Cloudflare DNS after a review app is created"
)]
pub struct CliConfig {
    /// Path to the TOML configuration file
    #[arg(short, long, env = "POSTDEPLOY_CONFIG", default_value = "postdeploy.toml")]
    pub config: String,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long)]
    pub json_logs: bool,

    /// Show what would be provisioned without calling either API
    #[arg(long)]
    pub dry_run: bool,
}
