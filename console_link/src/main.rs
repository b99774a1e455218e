/*!
# Console Link Application

Command-line front end for the exercise multicast link.

## Usage

### Listen for status traffic (JSON lines on stdout)
```bash
console-link listen
```

### Send a command
```bash
console-link send --platform uav-1 --command FireCmd --params '{"fireParam":{"targetId":"t-7","rounds":2}}'
console-link send --request command.json
```

### Show the package-type catalogue
```bash
console-link catalogue
```

### Generate a configuration file
```bash
console-link config --output console-link.toml
```
*/

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use console_link::{
    load_registry, CommandDispatcher, CommandParams, LinkConfig, ListenerEvent,
    PlatformCommandRequest, StatusListener,
};
use mcast_protocol::schema::CommandType;
use mcast_protocol::CATALOGUE;
use std::io::{Read, Write};
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::runtime::Runtime;
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "console-link")]
#[command(about = "Status ingestion and command dispatch for the exercise multicast group")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path (optional)
    #[arg(short, long, global = true, default_value = "console-link.toml")]
    config: PathBuf,

    /// Multicast group address
    #[arg(long, global = true)]
    address: Option<Ipv4Addr>,

    /// Multicast group port
    #[arg(long, global = true)]
    port: Option<u16>,

    /// Local interface address
    #[arg(long, global = true)]
    interface: Option<Ipv4Addr>,

    /// Extra schema directory, searched before configured ones (repeatable)
    #[arg(long = "schema-path", global = true)]
    schema_paths: Vec<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Listen for status traffic until Ctrl+C
    Listen,

    /// Send one command to a platform
    Send {
        /// JSON request file, or `-` for stdin
        #[arg(short, long, conflicts_with_all = ["platform", "command", "params", "command_id"])]
        request: Option<PathBuf>,

        /// Target platform name
        #[arg(long, required_unless_present = "request")]
        platform: Option<String>,

        /// Command verb, e.g. FireCmd
        #[arg(long, value_parser = parse_command_type, required_unless_present = "request")]
        command: Option<CommandType>,

        /// Parameter group as JSON, e.g. '{"fireParam":{"rounds":1}}'
        #[arg(long)]
        params: Option<String>,

        /// Command id (generated when omitted)
        #[arg(long)]
        command_id: Option<String>,
    },

    /// Print the package-type catalogue
    Catalogue,

    /// Generate configuration file
    Config {
        /// Output path for configuration file
        #[arg(short, long, default_value = "console-link.toml")]
        output: PathBuf,
    },
}

fn parse_command_type(value: &str) -> Result<CommandType, String> {
    CommandType::from_name(value).ok_or_else(|| {
        let names: Vec<&str> = CommandType::ALL.iter().map(|c| c.name()).collect();
        format!("unknown command `{}`, expected one of: {}", value, names.join(", "))
    })
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr to keep stdout clean for JSON output
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    match &cli.command {
        Commands::Listen => {
            let config = resolve_config(&cli)?;
            run_listen(config)
        }
        Commands::Send {
            request,
            platform,
            command,
            params,
            command_id,
        } => {
            let config = resolve_config(&cli)?;
            let request = match request {
                Some(path) => read_request(path)?,
                None => build_request(
                    platform.as_deref(),
                    *command,
                    params.as_deref(),
                    command_id.clone(),
                )?,
            };
            run_send(config, request)
        }
        Commands::Catalogue => {
            print_catalogue();
            Ok(())
        }
        Commands::Config { output } => generate_config_file(output),
    }
}

/// Defaults, then the config file, then environment, then flags
fn resolve_config(cli: &Cli) -> Result<LinkConfig> {
    let mut config = LinkConfig::load_or_default(&cli.config)?;
    config.apply_env()?;

    if let Some(address) = cli.address {
        config.multicast.address = address;
    }
    if let Some(port) = cli.port {
        config.multicast.port = port;
    }
    if let Some(interface) = cli.interface {
        config.multicast.interface = interface;
    }
    if !cli.schema_paths.is_empty() {
        let mut paths = cli.schema_paths.clone();
        paths.append(&mut config.schema.search_paths);
        config.schema.search_paths = paths;
    }

    Ok(config)
}

/// Run the status listener until Ctrl+C
fn run_listen(config: LinkConfig) -> Result<()> {
    let registry = Arc::new(load_registry(&config));

    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
    ctrlc::set_handler(move || {
        eprintln!("\n🛑 Received Ctrl+C, shutting down gracefully...");
        let _ = shutdown_tx.send(true);
    })?;

    let rt = Runtime::new()?;
    rt.block_on(async {
        let mut listener = StatusListener::new(&config, registry);
        let events = listener.subscribe();

        let printer = std::thread::spawn(move || -> Result<()> {
            let stdout = std::io::stdout();
            for event in events {
                match event {
                    ListenerEvent::Packet(packet) => {
                        let line = serde_json::to_string(&packet)?;
                        let mut out = stdout.lock();
                        writeln!(out, "{}", line)?;
                        out.flush()?;
                    }
                    ListenerEvent::Error { .. } => {}
                    ListenerEvent::Started { address, port } => {
                        info!("🚀 Listening for status on {}:{}", address, port)
                    }
                    ListenerEvent::Stopped => break,
                }
            }
            Ok(())
        });

        listener.start().await.context("Failed to start status listener")?;

        while !*shutdown_rx.borrow() {
            if shutdown_rx.changed().await.is_err() {
                break;
            }
        }

        listener.stop().await;
        drop(listener);

        printer
            .join()
            .map_err(|_| anyhow!("Output thread panicked"))??;
        Ok::<(), anyhow::Error>(())
    })?;

    info!("✅ Listener shut down");
    Ok(())
}

/// Initialize a dispatcher and send a single command
fn run_send(config: LinkConfig, request: PlatformCommandRequest) -> Result<()> {
    let rt = Runtime::new()?;
    let receipt = rt.block_on(async {
        let mut dispatcher = CommandDispatcher::new(config);
        dispatcher.initialize().await?;
        dispatcher.send(&request).await
    });

    match receipt {
        Ok(receipt) => {
            println!("{}", serde_json::to_string(&receipt)?);
            Ok(())
        }
        Err(err) => {
            error!("Failed to send {}: {}", request.command_id, err);
            Err(err.into())
        }
    }
}

fn read_request(path: &Path) -> Result<PlatformCommandRequest> {
    let content = if path.as_os_str() == "-" {
        let mut buffer = String::new();
        std::io::stdin()
            .read_to_string(&mut buffer)
            .context("Failed to read request from stdin")?;
        buffer
    } else {
        std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read request file: {}", path.display()))?
    };

    serde_json::from_str(&content).context("Failed to parse command request JSON")
}

fn build_request(
    platform: Option<&str>,
    command: Option<CommandType>,
    params: Option<&str>,
    command_id: Option<String>,
) -> Result<PlatformCommandRequest> {
    let (Some(platform), Some(command)) = (platform, command) else {
        bail!("--platform and --command are required without --request");
    };

    let mut request = PlatformCommandRequest::new(platform, command);
    if let Some(command_id) = command_id {
        request = request.with_command_id(command_id);
    }
    if let Some(params) = params {
        let params: CommandParams =
            serde_json::from_str(params).context("Failed to parse --params JSON")?;
        request = request.with_params(params);
    }
    Ok(request)
}

fn print_catalogue() {
    println!("{:<6} {:<18} {}", "CODE", "NAME", "SCHEMA");
    for descriptor in &CATALOGUE {
        println!(
            "0x{:02X}   {:<18} {}",
            descriptor.code,
            descriptor.name,
            descriptor.schema_name().unwrap_or("-")
        );
    }
}

/// Generate a default configuration file
fn generate_config_file(output: &Path) -> Result<()> {
    if output.exists() {
        warn!("Overwriting existing configuration file {}", output.display());
    }
    LinkConfig::default().save_to_file(output)?;
    println!("✅ Configuration written to {}", output.display());
    Ok(())
}
