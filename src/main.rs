//! sensorhub - Unified Sensor Channels Binary
//!
//! Drives a virtual device (optionally mirroring the host's network, locale
//! and backlight) through the channel controller and prints or serves the
//! resulting update stream.

use anyhow::Context;
use clap::{Args, Parser, Subcommand, ValueEnum};
use futures_util::StreamExt;
use sensorhub::platform::host::HostBridge;
use sensorhub::{
    catalog_for, start_web_server, ChannelId, MonitorConfig, NativeServices, Payload,
    PlatformType, RegisterOptions, SensorController, StaticPermissionGate,
    Update, VirtualDevice, WebConfig, DEFAULT_BUFFER_CAPACITY, DEFAULT_INTERVAL_MS,
    DEFAULT_WEB_PORT,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{info, warn, Level};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser)]
#[command(name = "sensorhub")]
#[command(about = "Unified sensor and device-state channels")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(author = "Austin Couch")]
#[command(long_about = "Registers sensor and device-state channels on a simulated phone and streams their updates")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Platform whose adapters are used: android or ios
    #[arg(long, global = true, default_value = "android")]
    platform: PlatformType,

    /// Updates buffered per stream before the oldest are dropped
    #[arg(long, global = true, default_value_t = DEFAULT_BUFFER_CAPACITY)]
    buffer: usize,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Print channel updates to stdout
    Watch(WatchArgs),

    /// Stream channel updates over WebSocket (default)
    Serve(ServeArgs),

    /// List channel identifiers and how each platform provides them
    Channels,
}

#[derive(Args, Clone)]
struct SourceArgs {
    /// Channels to register (default: all)
    #[arg(value_name = "CHANNEL")]
    channels: Vec<ChannelId>,

    /// Debounce interval for raw sensor channels in milliseconds
    #[arg(long)]
    interval_ms: Option<u64>,

    /// Minimum spacing of location updates in milliseconds
    #[arg(long, default_value_t = DEFAULT_INTERVAL_MS)]
    location_interval_ms: u64,

    /// Period of simulated device events in milliseconds
    #[arg(long, default_value_t = 200)]
    demo_period_ms: u64,

    /// Mirror host network, locale and backlight into the device
    #[arg(long)]
    host_probes: bool,

    /// Answer location permission requests with DENIED
    #[arg(long)]
    deny_location: bool,
}

impl Default for SourceArgs {
    fn default() -> Self {
        Self {
            channels: Vec::new(),
            interval_ms: None,
            location_interval_ms: DEFAULT_INTERVAL_MS,
            demo_period_ms: 200,
            host_probes: false,
            deny_location: false,
        }
    }
}

#[derive(Args)]
struct WatchArgs {
    #[command(flatten)]
    source: SourceArgs,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Pretty)]
    format: OutputFormat,

    /// Stop after this many updates
    #[arg(short = 'n', long)]
    count: Option<usize>,
}

#[derive(Args)]
struct ServeArgs {
    #[command(flatten)]
    source: SourceArgs,

    /// Web server bind address
    #[arg(long, default_value = "0.0.0.0")]
    host: String,

    /// Web server port
    #[arg(short, long, default_value_t = DEFAULT_WEB_PORT)]
    port: u16,

    /// Disable CORS headers
    #[arg(long)]
    no_cors: bool,

    /// Maximum WebSocket connections
    #[arg(long, default_value_t = 100)]
    max_connections: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Json,
    Pretty,
}

/// Everything one run keeps alive: the device, its drivers and the
/// controller built on top of it.
struct Session {
    controller: SensorController,
    drivers: Vec<JoinHandle<()>>,
}

impl Session {
    fn start(cli: &Cli, source: &SourceArgs) -> anyhow::Result<Self> {
        let config = MonitorConfig::new(cli.platform)
            .with_buffer_capacity(cli.buffer)
            .with_location_interval_ms(source.location_interval_ms);
        config.validate().context("invalid monitor configuration")?;

        let device = Arc::new(VirtualDevice::new());
        let mut drivers = vec![device.spawn_demo(Duration::from_millis(source.demo_period_ms.max(1)))];
        if source.host_probes {
            drivers.push(HostBridge::new(device.clone()).spawn(Duration::from_secs(2)));
            info!("Host probes enabled");
        }

        let gate = if source.deny_location {
            StaticPermissionGate::denied()
        } else {
            StaticPermissionGate::granted()
        };
        let catalog = catalog_for(&config, &NativeServices::from_device(&device));
        let controller = SensorController::new(catalog, Arc::new(gate), config);
        Ok(Self { controller, drivers })
    }

    fn channels(source: &SourceArgs) -> Vec<ChannelId> {
        if source.channels.is_empty() {
            ChannelId::ALL.to_vec()
        } else {
            source.channels.clone()
        }
    }

    fn options(source: &SourceArgs, channels: &[ChannelId]) -> RegisterOptions {
        let mut options = RegisterOptions::new();
        if let Some(interval_ms) = source.interval_ms {
            for channel in channels.iter().filter(|c| c.is_sampled()) {
                options = options.with_interval_ms(*channel, interval_ms);
            }
        }
        options
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        for driver in &self.drivers {
            driver.abort();
        }
        self.controller.shutdown();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_logging(&cli)?;

    match &cli.command {
        Some(Commands::Watch(args)) => watch_command(&cli, args).await?,
        Some(Commands::Serve(args)) => serve_command(&cli, args).await?,
        Some(Commands::Channels) => channels_command(),
        None => {
            // Default to serve command
            let args = ServeArgs {
                source: SourceArgs::default(),
                host: "0.0.0.0".to_string(),
                port: DEFAULT_WEB_PORT,
                no_cors: false,
                max_connections: 100,
            };
            serve_command(&cli, &args).await?;
        }
    }

    Ok(())
}

fn init_logging(cli: &Cli) -> anyhow::Result<()> {
    let level = if cli.debug {
        Level::DEBUG
    } else if cli.verbose {
        Level::INFO
    } else {
        Level::WARN
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    Ok(())
}

async fn watch_command(cli: &Cli, args: &WatchArgs) -> anyhow::Result<()> {
    let session = Session::start(cli, &args.source)?;
    let channels = Session::channels(&args.source);
    let options = Session::options(&args.source, &channels);

    let mut stream = session.controller.register_channels(&channels, &options).await;
    info!(
        "Watching {} channels on {} ({} active)",
        channels.len(),
        cli.platform,
        session.controller.active_channels().len()
    );

    let mut seen = 0usize;
    loop {
        tokio::select! {
            next = stream.next() => {
                let Some(update) = next else { break };
                print_update(&update, args.format)?;
                seen += 1;
                if args.count.is_some_and(|limit| seen >= limit) {
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                break;
            }
        }
    }

    let dropped = stream.dropped();
    stream.close();
    if dropped > 0 {
        warn!("{} updates were dropped because output fell behind", dropped);
    }
    info!(
        "Received {} updates, {} channels still active",
        seen,
        session.controller.active_channels().len()
    );
    Ok(())
}

async fn serve_command(cli: &Cli, args: &ServeArgs) -> anyhow::Result<()> {
    let session = Session::start(cli, &args.source)?;
    let channels = Session::channels(&args.source);
    let options = Session::options(&args.source, &channels);

    let web_config = WebConfig::new(&args.host, args.port)
        .with_cors(!args.no_cors)
        .with_max_websocket_connections(args.max_connections)
        .with_client_buffer(cli.buffer);

    info!("Web server configuration:");
    info!("  - Bind address: {}", web_config.bind_address());
    info!("  - CORS enabled: {}", web_config.enable_cors);
    info!("  - Max WebSocket connections: {}", web_config.max_websocket_connections);
    info!("  - Platform: {}", cli.platform);

    let stream = session.controller.register_channels(&channels, &options).await;
    start_web_server(web_config, cli.platform, stream).await?;
    Ok(())
}

fn channels_command() {
    println!("{:<20} {:<8} {:<28} {:<28}", "CHANNEL", "KIND", "ANDROID", "IOS");
    for channel in ChannelId::ALL {
        println!(
            "{:<20} {:<8} {:<28} {:<28}",
            channel.as_str(),
            format!("{:?}", channel.kind()).to_lowercase(),
            provider(channel, PlatformType::Android),
            provider(channel, PlatformType::Ios)
        );
    }
}

/// How a platform sources a channel, for the `channels` listing.
fn provider(channel: ChannelId, platform: PlatformType) -> &'static str {
    match (channel, platform) {
        (c, _) if c.is_sampled() => "sensor listener",
        (ChannelId::Location, _) => "location provider (gated)",
        (ChannelId::DeviceOrientation, _) => "orientation notification",
        (ChannelId::Proximity, PlatformType::Android) => "sensor listener",
        (ChannelId::Proximity, PlatformType::Ios) => "near/far notification",
        (ChannelId::Light, PlatformType::Android) => "sensor listener",
        (ChannelId::Light, PlatformType::Ios) => "brightness poll (synthetic)",
        (ChannelId::TouchGestures, _) => "shared window hook",
        (ChannelId::Screen, PlatformType::Ios) => "unsupported",
        _ => "state notification",
    }
}

fn print_update(update: &Update, format: OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string(update)?),
        OutputFormat::Pretty => match update {
            Update::Data {
                channel,
                payload,
                platform,
                timestamp,
            } => println!(
                "{} {:<18} [{}] {}",
                chrono::DateTime::from_timestamp_millis(*timestamp as i64)
                    .unwrap_or_default()
                    .format("%H:%M:%S%.3f"),
                channel.as_str(),
                platform,
                describe(payload)
            ),
            Update::Error { channel, fault } => {
                println!("ERROR {:<18} {}", channel.as_str(), fault)
            }
        },
    }
    Ok(())
}

fn describe(payload: &Payload) -> String {
    match payload {
        Payload::Accelerometer { x, y, z }
        | Payload::Gyroscope { x, y, z }
        | Payload::Magnetometer { x, y, z } => format!("x={:.3} y={:.3} z={:.3}", x, y, z),
        Payload::Barometer { pressure } => format!("{:.2} hPa", pressure),
        Payload::StepCounter { steps, delta } => format!("{} steps (+{})", steps, delta),
        Payload::Location {
            latitude,
            longitude,
            altitude,
        } => format!(
            "lat={} lon={} alt={}",
            fmt_opt(*latitude),
            fmt_opt(*longitude),
            fmt_opt(*altitude)
        ),
        Payload::Orientation {
            orientation,
            degrees,
        } => match degrees {
            Some(d) => format!("{:?} ({}°)", orientation, d),
            None => format!("{:?}", orientation),
        },
        Payload::Proximity {
            distance_cm,
            is_near,
        } => format!("{} ({} cm)", if *is_near { "near" } else { "far" }, distance_cm),
        Payload::Light {
            illuminance,
            fidelity,
        } => format!("{:.1} lx ({:?})", illuminance, fidelity),
        Payload::TouchGesture { x, y, action } => format!("{:?} at ({:.0}, {:.0})", action, x, y),
        Payload::Screen { is_on } => format!("screen {}", if *is_on { "on" } else { "off" }),
        Payload::AppVisibility { is_visible } => {
            (if *is_visible { "foreground" } else { "background" }).to_string()
        }
        Payload::Connectivity { is_connected } => {
            (if *is_connected { "connected" } else { "disconnected" }).to_string()
        }
        Payload::ActiveNetwork { network } => format!("{:?}", network),
        Payload::LocationProvider { is_enabled } => {
            format!("provider {}", if *is_enabled { "enabled" } else { "disabled" })
        }
        Payload::Volume { percent } => format!("{}%", percent),
        Payload::Locale(locale) => format!("{} ({})", locale.display_name, locale.tag),
    }
}

fn fmt_opt(value: Option<f64>) -> String {
    value.map_or_else(|| "-".to_string(), |v| format!("{:.5}", v))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parsing() {
        let cli = Cli::try_parse_from([
            "sensorhub",
            "--platform",
            "ios",
            "watch",
            "accelerometer",
            "step-counter",
            "--interval-ms",
            "100",
            "-n",
            "5",
        ])
        .unwrap();
        assert_eq!(cli.platform, PlatformType::Ios);
        match cli.command {
            Some(Commands::Watch(args)) => {
                assert_eq!(
                    args.source.channels,
                    vec![ChannelId::Accelerometer, ChannelId::StepCounter]
                );
                assert_eq!(args.source.interval_ms, Some(100));
                assert_eq!(args.count, Some(5));
                assert_eq!(args.format, OutputFormat::Pretty);
            }
            _ => panic!("expected watch command"),
        }
    }

    #[test]
    fn test_default_values() {
        let cli = Cli::try_parse_from(["sensorhub"]).unwrap();
        assert_eq!(cli.platform, PlatformType::Android);
        assert_eq!(cli.buffer, DEFAULT_BUFFER_CAPACITY);
        assert!(cli.command.is_none());
    }

    #[test]
    fn test_unknown_channel_rejected() {
        assert!(Cli::try_parse_from(["sensorhub", "watch", "thermometer"]).is_err());
    }

    #[test]
    fn test_interval_applies_to_sampled_channels_only() {
        let source = SourceArgs {
            interval_ms: Some(250),
            ..SourceArgs::default()
        };
        let options = Session::options(&source, &[ChannelId::Gyroscope, ChannelId::Volume]);
        assert_eq!(options.for_channel(ChannelId::Gyroscope).interval_ms, Some(250));
        assert_eq!(options.for_channel(ChannelId::Volume).interval_ms, None);
    }

    #[test]
    fn test_describe_payloads() {
        assert_eq!(describe(&Payload::Volume { percent: 40 }), "40%");
        assert_eq!(
            describe(&Payload::StepCounter { steps: 120, delta: 3 }),
            "120 steps (+3)"
        );
    }
}
