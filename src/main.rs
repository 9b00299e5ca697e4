//! blender-mcp: MCP server bridging AI assistants to a running Blender
//!
//! Speaks JSON-RPC 2.0 over stdio to the MCP client and relays tool
//! calls as JSON commands over TCP to the Blender addon.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, ValueEnum};
use tracing::{error, info, Level};
use tracing_subscriber::EnvFilter;

use blender_mcp::blender::BlenderConnection;
use blender_mcp::config;
use blender_mcp::mcp::{Framing, McpServer};
use blender_mcp::telemetry::Telemetry;
use blender_mcp::tools::ToolDispatcher;

/// MCP server bridging AI assistants to a running Blender instance.
///
/// Relays tool calls from an MCP client (over stdio) to the Blender
/// addon (over TCP) and returns Blender's replies as text results.
#[derive(Parser, Debug)]
#[command(name = "blender-mcp")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(value_name = "CONFIG_FILE")]
    config: Option<PathBuf>,

    /// Stdio framing discipline (overrides the configuration file)
    #[arg(long, value_enum)]
    framing: Option<FramingArg>,

    /// Increase logging verbosity (-v for info, -vv for debug, -vvv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Decrease logging verbosity (only show errors)
    #[arg(short, long)]
    quiet: bool,
}

/// CLI spelling of the framing disciplines.
#[derive(Debug, Clone, Copy, ValueEnum)]
enum FramingArg {
    /// One compact JSON document per line
    Newline,
    /// Content-Length header followed by the JSON body
    ContentLength,
}

impl From<FramingArg> for Framing {
    fn from(arg: FramingArg) -> Self {
        match arg {
            FramingArg::Newline => Self::NewlineDelimited,
            FramingArg::ContentLength => Self::ContentLength,
        }
    }
}

/// Determines the log level from CLI arguments.
#[allow(clippy::match_same_arms)] // Explicit "warn" arm for clarity
fn get_log_level(verbose: u8, quiet: bool, config_level: &str) -> Level {
    if quiet {
        return Level::ERROR;
    }

    match verbose {
        0 => match config_level.to_lowercase().as_str() {
            "trace" => Level::TRACE,
            "debug" => Level::DEBUG,
            "info" => Level::INFO,
            "warn" => Level::WARN,
            "error" => Level::ERROR,
            _ => Level::WARN, // Default to warn for unknown levels
        },
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    }
}

/// Initialises the tracing subscriber for logging.
///
/// Logs go to stderr only; stdout carries protocol bytes exclusively.
fn init_tracing(level: Level) {
    let filter = EnvFilter::from_default_env().add_directive(level.into());

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Entry point for the blender-mcp server.
fn main() -> ExitCode {
    let args = Args::parse();

    // Load configuration
    let config_path = args.config.as_deref();
    let mut cfg = match config::load_config(config_path) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {e}");
            return ExitCode::FAILURE;
        }
    };
    if let Err(e) = cfg.apply_env_overrides() {
        eprintln!("Configuration error: {e}");
        return ExitCode::FAILURE;
    }

    // Initialise logging
    let log_level = get_log_level(args.verbose, args.quiet, &cfg.logging.level);
    init_tracing(log_level);

    // Display GPL license notice (required by GPLv3 Section 5d)
    eprintln!(
        "blender-mcp {}  Copyright (C) 2026  The Embedded Society",
        env!("CARGO_PKG_VERSION")
    );
    eprintln!("This program comes with ABSOLUTELY NO WARRANTY.");
    eprintln!("This is free software, licensed under GPL-3.0-or-later.");
    eprintln!("Source: {}", env!("CARGO_PKG_REPOSITORY"));
    eprintln!();

    let framing = args.framing.map_or(cfg.framing, Framing::from);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "Starting blender-mcp server"
    );
    info!(
        host = %cfg.blender.host,
        port = cfg.blender.port,
        %framing,
        "Blender gateway configured"
    );

    // Run the server
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("Failed to create Tokio runtime");

    let result = runtime.block_on(async {
        let telemetry = Telemetry::spawn(&cfg.telemetry);
        telemetry.record_startup();

        let connection = BlenderConnection::new(&cfg.blender);
        let dispatcher = ToolDispatcher::new(connection, telemetry.clone());
        let mut server = McpServer::stdio(framing, dispatcher, telemetry);

        info!("MCP server ready, waiting for client...");
        server.run().await
    });

    match result {
        Ok(()) => {
            info!("Server shut down gracefully");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "Server error");
            ExitCode::FAILURE
        }
    }
}
