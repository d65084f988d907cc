//! subreg CLI - claim and manage subdomains from the terminal.

mod commands;
mod output;

use clap::{Parser, Subcommand};
use commands::{Context, DraftArgs};
use std::path::PathBuf;
use subreg_config::{init_logging, Config, Paths};
use subreg_registry::SubdomainId;
use tracing::debug;

/// subreg - sign in with GitHub and manage your subdomains.
#[derive(Parser)]
#[command(name = "subreg")]
#[command(about = "Claim and manage subdomains from the command line")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format (text or json)
    #[arg(short, long, default_value = "text", global = true)]
    format: output::OutputFormat,

    /// Log level (trace, debug, info, warn, error) [default: from config]
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Directory for config, credentials and logs [default: ~/.subreg]
    #[arg(long, global = true, env = "SUBREG_STATE_DIR")]
    state_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign in with GitHub in the browser
    Login,

    /// Logout and clear the stored credential
    Logout,

    /// Check authentication status
    Status,

    /// List your subdomains
    List,

    /// Show one subdomain
    Show {
        /// Subdomain ID
        id: SubdomainId,
    },

    /// Create a subdomain
    Create {
        #[command(flatten)]
        draft: DraftArgs,
    },

    /// Replace a subdomain's record
    Update {
        /// Subdomain ID
        id: SubdomainId,
        #[command(flatten)]
        draft: DraftArgs,
    },

    /// Delete a subdomain
    Delete {
        /// Subdomain ID
        id: SubdomainId,
    },

    /// Keep refreshing the list until Ctrl-C
    Watch,

    /// Check API health
    Health,
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let paths = match &cli.state_dir {
        Some(dir) => Paths::with_base_dir(dir.clone()),
        None => Paths::new()?,
    };
    paths.ensure_dirs()?;
    let config = Config::load(&paths)?;

    let level = cli.log_level.as_deref().unwrap_or(&config.log_level);
    init_logging("cli", level, &paths);
    debug!(state_dir = %paths.base_dir().display(), "subreg starting");

    let ctx = Context::new(&paths, config)?;
    let format = &cli.format;

    match cli.command {
        Commands::Login => commands::login(&ctx, format).await,
        Commands::Logout => commands::logout(&ctx, format).await,
        Commands::Status => commands::status(&ctx, format).await,
        Commands::List => commands::subdomains_list(&ctx, format).await,
        Commands::Show { id } => commands::subdomains_show(&ctx, id, format).await,
        Commands::Create { draft } => commands::subdomains_create(&ctx, draft, format).await,
        Commands::Update { id, draft } => {
            commands::subdomains_update(&ctx, id, draft, format).await
        }
        Commands::Delete { id } => commands::subdomains_delete(&ctx, id, format).await,
        Commands::Watch => commands::subdomains_watch(&ctx, format).await,
        Commands::Health => commands::health(&ctx, format).await,
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let format = cli.format;

    if let Err(e) = run(cli).await {
        output::print_error(&format!("{:#}", e), &format);
        std::process::exit(1);
    }
}
