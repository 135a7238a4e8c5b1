use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::{debug, info};

use vehicle_gateway::comms::http_api;
use vehicle_gateway::config::{self, Config};
use vehicle_gateway::utils;

const DEFAULT_PORT: u16 = 3000;

#[derive(Parser)]
#[command(name = "vehicle-gateway", version, about = "Vehicle data backend-for-frontend gateway")]
struct AppCli {
    /// Optional JSON config file (environment, endpoint overrides, TTL)
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Dotenv file with CLIENT_ID, REDIRECT_URI and PRIVATE_KEY
    #[arg(long, default_value = ".env", global = true)]
    env_file: String,

    /// Subcommands
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start HTTP server
    Serve {
        #[arg(long, default_value_t = DEFAULT_PORT)]
        port: u16,
    },
    /// Print the resolved configuration (secrets redacted)
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = AppCli::parse();
    let loaded = config::load_env_file(&args.env_file)?;
    utils::logging::init();
    match loaded {
        Some(path) => debug!(path = %path.display(), "loaded env file"),
        None => debug!(path = %args.env_file, "no env file"),
    }

    let config = Config::load(args.config.as_deref())?;

    match args.command.unwrap_or(Commands::Serve { port: DEFAULT_PORT }) {
        Commands::Serve { port } => {
            info!("Starting vehicle gateway on port {port}");
            http_api::serve(config, port).await?;
        }
        Commands::Config => {
            println!("{config:#?}");
        }
    }

    Ok(())
}
