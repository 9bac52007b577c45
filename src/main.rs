use clap::{Parser, Subcommand};
use std::path::Path;
use std::sync::Arc;

use atri::application::errors::ConfigError;
use atri::domain::traits::Transport;
use atri::infrastructure::adapters::ConsoleAdapter;
use atri::infrastructure::config::{AtriConfig, TransportConfig};
use atri::plugins::builtin_catalog;
use atri::Atri;

#[derive(Parser)]
#[command(name = "atri")]
#[command(about = "A plugin host for chat bots", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path
    #[arg(short, long, default_value = "atri.yaml")]
    config: String,

    /// Debug logging (overrides config)
    #[arg(short, long)]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the bot
    Run,
    /// Show version
    Version,
    /// Generate default config
    InitConfig,
}

fn main() {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run => {
            let config = match load_config(&cli.config) {
                Ok(config) => config,
                Err(e) => {
                    init_logging(cli.debug);
                    tracing::error!("Failed to load config {}: {}", cli.config, e);
                    std::process::exit(1);
                }
            };

            init_logging(cli.debug || config.debug);
            if let Err(e) = run_bot(config) {
                tracing::error!("{}", e);
                std::process::exit(1);
            }
        }
        Commands::Version => {
            println!("atri v{}", env!("CARGO_PKG_VERSION"));
        }
        Commands::InitConfig => {
            init_config();
        }
    }
}

fn init_logging(debug: bool) {
    let level = if debug { tracing::Level::DEBUG } else { tracing::Level::INFO };
    tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();
}

fn load_config(path: &str) -> Result<AtriConfig, ConfigError> {
    if Path::new(path).exists() {
        AtriConfig::load(path)
    } else {
        eprintln!("Config {} not found, using defaults", path);
        Ok(AtriConfig::default())
    }
}

fn run_bot(config: AtriConfig) -> Result<(), Box<dyn std::error::Error>> {
    let transport: Arc<dyn Transport> = match &config.transport {
        TransportConfig::Console { user_id, group_id } => {
            let adapter = ConsoleAdapter::new(*user_id);
            Arc::new(match *group_id {
                Some(group_id) => adapter.with_group(group_id),
                None => adapter,
            })
        }
    };

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async {
        let plugins = config.plugins.clone();
        let mut atri = Atri::init(config, transport, builtin_catalog()).await?;

        if !atri.load_plugins(&plugins).await {
            tracing::warn!("Plugin loading stopped at the first failure");
        }
        atri.check_waiting_plugins()?;

        let loaded: Vec<&str> = atri.loaded_plugins().map(|plugin| plugin.name()).collect();
        tracing::info!("Loaded plugins: {}", loaded.join(", "));

        atri.run().await?;
        Ok::<(), Box<dyn std::error::Error>>(())
    })
}

fn init_config() {
    match AtriConfig::default().to_yaml() {
        Ok(yaml) => {
            println!("{}", yaml);
            println!("\nSave this to atri.yaml and adjust as needed.");
        }
        Err(e) => eprintln!("Failed to render config: {}", e),
    }
}
