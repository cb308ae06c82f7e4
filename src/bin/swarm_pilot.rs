//! Swarm pilot for Tello EDU drones.
//!
//! Flies an ordered swarm over a course of mission pads with:
//! - CLI arguments and TOML config file support
//! - pluggable strategies (follow-to-end-pad, deadhead)
//! - structured logging with tracing
//! - a proximity guard that force-lands a unit near an obstacle

use std::net::IpAddr;
use std::path::Path;
use std::sync::Arc;
use std::sync::Mutex;

use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use tello_swarm::{
    DeadheadConfig, DeadheadNTimes, FollowConfig, FollowToEndPad, SessionConfig, SwarmSession,
    SwarmStrategy,
};

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Parser)]
#[command(name = "swarm_pilot")]
#[command(version, about = "Tello EDU mission-pad swarm pilot", long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "swarm_pilot.toml")]
    config: String,

    /// Drone IP address, in swarm order; repeat per drone (overrides config)
    #[arg(long = "ip", value_name = "ADDR")]
    ips: Vec<IpAddr>,

    /// Override strategy from config (follow_to_end, deadhead)
    #[arg(long)]
    strategy: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,

    /// Output format (pretty, json, compact)
    #[arg(long)]
    log_format: Option<String>,

    /// Log file path (logs to both file and stdout)
    #[arg(long)]
    log_file: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a sample config file
    GenerateConfig {
        /// Output file path
        #[arg(short, long, default_value = "swarm_pilot.toml")]
        output: String,
    },
    /// Validate config without flying
    ValidateConfig,
    /// Fly the swarm (default)
    Run,
}

// ============================================================================
// Configuration
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
struct AppConfig {
    #[serde(default)]
    swarm: SwarmConfig,
    #[serde(default)]
    session: SessionConfig,
    #[serde(default)]
    strategy: StrategyAppConfig,
    #[serde(default)]
    logging: LoggingConfig,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
struct SwarmConfig {
    /// Drone IP addresses in swarm order. The order is load-bearing: it
    /// picks each unit's altitude band and LED label.
    #[serde(default)]
    ips: Vec<IpAddr>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
struct StrategyAppConfig {
    /// Strategy type: follow_to_end, deadhead
    #[serde(default)]
    strategy_type: StrategyType,
    #[serde(default)]
    follow: FollowConfig,
    #[serde(default)]
    deadhead: DeadheadConfig,
}

#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
enum StrategyType {
    #[default]
    FollowToEnd,
    Deadhead,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
struct LoggingConfig {
    #[serde(default = "default_log_level")]
    level: String,
    #[serde(default)]
    format: LogFormat,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    log_file: Option<String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
            log_file: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
enum LogFormat {
    #[default]
    Pretty,
    Compact,
    Json,
}

fn load_config(cli: &Cli) -> Result<AppConfig, Box<dyn std::error::Error>> {
    let config_path = Path::new(&cli.config);
    if config_path.exists() {
        let content = std::fs::read_to_string(config_path)?;
        let config: AppConfig = toml::from_str(&content)?;
        Ok(config)
    } else {
        // Return default config if file doesn't exist
        Ok(AppConfig::default())
    }
}

fn generate_sample_config(output: &str) -> Result<(), Box<dyn std::error::Error>> {
    let sample = AppConfig {
        swarm: SwarmConfig {
            ips: vec!["192.168.50.51".parse()?, "192.168.50.52".parse()?],
        },
        ..AppConfig::default()
    };
    std::fs::write(output, toml::to_string_pretty(&sample)?)?;
    println!("Sample config written to {output}");
    Ok(())
}

// ============================================================================
// Logging
// ============================================================================

fn setup_logging(config: &AppConfig, cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    let level = cli.log_level.as_ref().unwrap_or(&config.logging.level);

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.clone()));

    let format = cli
        .log_format
        .as_deref()
        .unwrap_or(match config.logging.format {
            LogFormat::Json => "json",
            LogFormat::Compact => "compact",
            LogFormat::Pretty => "pretty",
        });

    let log_file = cli.log_file.as_ref().or(config.logging.log_file.as_ref());

    if let Some(log_path) = log_file {
        let file = std::fs::File::create(log_path)?;
        let file = Mutex::new(file);

        // When logging to file, use JSON format for both (easier to parse)
        let stdout_layer = tracing_subscriber::fmt::layer().json();
        let file_layer = tracing_subscriber::fmt::layer()
            .with_writer(file)
            .with_ansi(false)
            .json();

        tracing_subscriber::registry()
            .with(filter)
            .with(stdout_layer)
            .with(file_layer)
            .init();

        eprintln!("Logging to file: {log_path} (using JSON format for both stdout and file)");
    } else {
        match format {
            "json" => {
                tracing_subscriber::fmt()
                    .with_env_filter(filter)
                    .json()
                    .init();
            }
            "compact" => {
                tracing_subscriber::fmt()
                    .with_env_filter(filter)
                    .compact()
                    .init();
            }
            _ => {
                tracing_subscriber::fmt()
                    .with_env_filter(filter)
                    .with_target(false)
                    .init();
            }
        }
    }

    Ok(())
}

fn print_startup_banner(ips: &[IpAddr], strategy: &str) {
    println!("============================================");
    println!("  Tello Swarm Pilot");
    println!("  Strategy: {strategy}");
    println!("  Units ({}):", ips.len());
    for (index, ip) in ips.iter().enumerate() {
        println!("    [{}] {ip}", (b'a' + (index % 26) as u8) as char);
    }
    println!("============================================");
}

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env file if it exists (before parsing CLI args)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    match &cli.command {
        Some(Commands::GenerateConfig { output }) => {
            generate_sample_config(output)?;
            return Ok(());
        }
        Some(Commands::ValidateConfig) => {
            let config = load_config(&cli)?;
            println!("Configuration is valid:\n{config:#?}");
            return Ok(());
        }
        Some(Commands::Run) | None => {
            // Continue to fly the swarm
        }
    }

    let config = load_config(&cli)?;
    setup_logging(&config, &cli)?;

    // CLI addresses override the config's
    let ips = if cli.ips.is_empty() {
        config.swarm.ips.clone()
    } else {
        cli.ips.clone()
    };
    if ips.is_empty() {
        return Err("No drone addresses. Set via --ip or the [swarm] section of the config.".into());
    }

    let strategy_type = match cli.strategy.as_deref() {
        Some("follow_to_end") => StrategyType::FollowToEnd,
        Some("deadhead") => StrategyType::Deadhead,
        Some(other) => return Err(format!("Unknown strategy '{other}'").into()),
        None => config.strategy.strategy_type,
    };
    let strategy: Arc<dyn SwarmStrategy> = match strategy_type {
        StrategyType::FollowToEnd => Arc::new(FollowToEndPad::new(config.strategy.follow.clone())),
        StrategyType::Deadhead => Arc::new(DeadheadNTimes::new(config.strategy.deadhead.clone())),
    };

    print_startup_banner(&ips, strategy.name());

    let session = SwarmSession::new(ips, strategy, config.session.clone()).await?;
    session.run().await?;

    info!("swarm run complete");
    Ok(())
}
