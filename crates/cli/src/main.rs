mod commands;
mod logging;

use clap::{Args, Parser, Subcommand};
use dbshift_migrate::config::{
    DEFAULT_DATABASE_URL_VAR, DEFAULT_LOCK_TIMEOUT_SECS, DEFAULT_MIGRATIONS_DIR, DEFAULT_PROJECT,
};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use commands::*;
use logging::{init_logging, LogFormat, LoggingConfig};

#[derive(Parser, Debug)]
#[command(name = "dbshift")]
#[command(version, about = "Plain SQL database migrations for PostgreSQL, MySQL and SQLite")]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

/// Options shared by every command
#[derive(Args, Debug, Clone)]
pub struct GlobalArgs {
    /// Database URL; overrides the variable named by --env
    #[arg(short = 'u', long, env = "DBSHIFT_URL", global = true)]
    pub url: Option<String>,

    /// Environment variable holding the database URL
    #[arg(
        short = 'e',
        long = "env",
        env = "DBSHIFT_ENV",
        default_value = DEFAULT_DATABASE_URL_VAR,
        global = true
    )]
    pub env_var: String,

    /// Directory containing migration files
    #[arg(
        short = 'd',
        long,
        env = "DBSHIFT_MIGRATIONS_DIR",
        default_value = DEFAULT_MIGRATIONS_DIR,
        global = true
    )]
    pub migrations_dir: PathBuf,

    /// Ledger namespace, for several projects sharing one database
    #[arg(
        short = 'p',
        long,
        env = "DBSHIFT_PROJECT",
        default_value = DEFAULT_PROJECT,
        global = true
    )]
    pub project: String,

    /// Seconds to wait for the migration lock
    #[arg(
        long,
        env = "DBSHIFT_LOCK_TIMEOUT",
        default_value_t = DEFAULT_LOCK_TIMEOUT_SECS,
        global = true
    )]
    pub lock_timeout: u64,

    /// File of environment variables loaded before anything else
    #[arg(long, env = "DBSHIFT_ENV_FILE", default_value = ".env", global = true)]
    pub env_file: PathBuf,

    /// Log debug output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(
        long,
        value_enum,
        env = "DBSHIFT_LOG_FORMAT",
        default_value_t = LogFormat::Text,
        global = true
    )]
    pub log_format: LogFormat,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Generate a new migration file
    New {
        /// Migration name, appended to the timestamp
        name: Option<String>,
    },

    /// Create the database if needed and run pending migrations
    Up,

    /// Create the database
    Create,

    /// Drop the database
    Drop,

    /// Run pending migrations
    Migrate,

    /// Roll back the most recent migration
    Rollback,

    /// Show applied and pending migrations
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

/// Load variables from `path` without overriding ones already set
fn load_env_file(path: &Path) -> anyhow::Result<()> {
    match dotenvy::from_path(path) {
        Ok(()) => Ok(()),
        Err(dotenvy::Error::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(anyhow::anyhow!("loading {}: {}", path.display(), e)),
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let global = &cli.global;

    match cli.command {
        Commands::New { name } => new::run(global, name.as_deref())?,
        Commands::Up => migrate::up(global).await?,
        Commands::Create => database::create(global).await?,
        Commands::Drop => database::drop(global).await?,
        Commands::Migrate => migrate::run(global).await?,
        Commands::Rollback => migrate::rollback(global).await?,
        Commands::Status { json } => status::run(global, json).await?,
    }

    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    // Parse once to learn --env-file, then again so clap sees its variables
    let first = Cli::parse();
    if let Err(e) = load_env_file(&first.global.env_file) {
        eprintln!("Error: {}", e);
        return ExitCode::FAILURE;
    }
    let cli = Cli::parse();

    let logging = LoggingConfig::from_flags(cli.global.verbose, cli.global.log_format);
    if let Err(e) = init_logging(logging) {
        eprintln!("Error: {}", e);
        return ExitCode::FAILURE;
    }

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
