use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use ptpcam_core::config::DeviceConfig;
use ptpcam_core::descriptors::DeviceDescriptors;
use ptpcam_core::engine::{LegacyResponder, Personality, Responder, StandardResponder};
use ptpcam_core::events::{ObserverSet, PtpObserver, RecEventDispatcher, TracingObserver};
use ptpcam_core::proxy::{ProxyServer, RawProxyBridge};
use ptpcam_core::relay::{CameraBackend, EmulatedBackend, RelayClient, ReplyLayout};
use ptpcam_core::usbip::UsbIpDevice;
use ptpcam_core::{DeviceInfo, PtpCamera};
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(author, version, about = "PTP Still-Camera Emulator (Pure Rust)", long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to a TOML device configuration
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Export the emulated camera over USB/IP
    Serve {
        /// standard, legacy or raw-proxy
        #[arg(long)]
        personality: Option<Personality>,

        /// USB/IP listen address
        #[arg(long)]
        bind: Option<String>,

        /// TCP port for the raw proxy relay
        #[arg(long)]
        proxy_port: Option<u16>,
    },
    /// Answer a raw-proxy device from this PC
    Relay {
        /// Device proxy address (HOST:PORT)
        #[arg(long)]
        device: String,

        /// Relay to a real camera on the local USB bus
        #[arg(long)]
        camera: bool,

        /// Camera vendor ID (hex)
        #[arg(long, value_parser = parse_hex_u16)]
        vid: Option<u16>,

        /// Camera product ID (hex)
        #[arg(long, value_parser = parse_hex_u16)]
        pid: Option<u16>,

        /// Layout of camera replies: standard, or mirror to echo the host's layout
        #[arg(long, default_value_t = ReplyLayout::Standard)]
        reply_layout: ReplyLayout,
    },
    /// Read DeviceInfo from a real camera
    Probe {
        /// Camera vendor ID (hex)
        #[arg(long, value_parser = parse_hex_u16)]
        vid: Option<u16>,

        /// Camera product ID (hex)
        #[arg(long, value_parser = parse_hex_u16)]
        pid: Option<u16>,
    },
    /// Print a default configuration file
    ConfigTemplate {
        /// Write to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn parse_hex_u16(s: &str) -> Result<u16, String> {
    let digits = s.trim_start_matches("0x").trim_start_matches("0X");
    u16::from_str_radix(digits, 16).map_err(|e| format!("invalid hex id '{s}': {e}"))
}

fn main() {
    let cli = Cli::parse();

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::builder()
                .with_default_directive(if cli.verbose {
                    tracing::Level::DEBUG.into()
                } else {
                    tracing::Level::INFO.into()
                })
                .from_env_lossy(),
        )
        .with_writer(std::io::stderr)
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("setting default subscriber failed: {e}");
    }

    if let Err(e) = run(cli) {
        error!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let mut config = match &cli.config {
        Some(path) => DeviceConfig::load_from_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => DeviceConfig::default(),
    };

    match cli.command {
        Commands::Serve {
            personality,
            bind,
            proxy_port,
        } => {
            if let Some(p) = personality {
                config.personality = p;
            }
            if let Some(b) = bind {
                config.usbip.bind = b;
            }
            if let Some(port) = proxy_port {
                config.proxy.port = port;
            }
            serve(&config)
        }
        Commands::Relay {
            device,
            camera,
            vid,
            pid,
            reply_layout,
        } => relay(&device, camera, vid, pid, reply_layout),
        Commands::Probe { vid, pid } => probe(vid, pid),
        Commands::ConfigTemplate { output } => match output {
            Some(path) => {
                config.save_to_file(&path)?;
                info!(path = %path.display(), "Configuration written");
                Ok(())
            }
            None => {
                print!("{}", config.to_toml()?);
                Ok(())
            }
        },
    }
}

fn serve(config: &DeviceConfig) -> Result<()> {
    info!(personality = %config.personality, "Starting PTP camera emulator (USB/IP backend)...");

    let dispatcher = RecEventDispatcher::start();
    dispatcher.subscribe(|ev| {
        info!(
            target: "rec",
            kind = %ev.kind,
            tid = ev.transaction_id,
            at = %ev.timestamp.format("%H:%M:%S%.3f"),
            "REC {}",
            if ev.recording { "on" } else { "off" }
        );
    })?;
    let observer: Arc<dyn PtpObserver> = Arc::new(
        ObserverSet::new()
            .with(Arc::new(TracingObserver))
            .with(Arc::new(dispatcher)),
    );

    let responder: Responder = match config.personality {
        Personality::Standard => Responder::Standard(StandardResponder::new(
            config.usb.device_identity(),
            observer,
        )),
        Personality::Legacy => Responder::Legacy(LegacyResponder::new(observer)),
        Personality::RawProxy => {
            let server = ProxyServer::bind(config.proxy.listen_addr())
                .context("starting raw proxy server")?;
            info!(addr = %server.local_addr(), "Waiting for relay client");
            Responder::RawProxy(RawProxyBridge::new(
                server,
                config.proxy.relay_settings(),
                observer,
            ))
        }
    };

    let descriptors = DeviceDescriptors::new(config.personality, &config.usb);
    let mut device = UsbIpDevice::new(responder, descriptors, &config.usbip.bus_id);
    device.serve(config.usbip.bind_addr()?)
}

fn relay(
    device: &str,
    camera: bool,
    vid: Option<u16>,
    pid: Option<u16>,
    reply_layout: ReplyLayout,
) -> Result<()> {
    if camera {
        let backend = CameraBackend::open(vid, pid, reply_layout)?;
        info!(reply_layout = %reply_layout, "Relaying to local camera");
        RelayClient::new(backend).connect_and_run(device)
    } else {
        info!("Relaying to emulated camera");
        let observer: Arc<dyn PtpObserver> = Arc::new(TracingObserver);
        RelayClient::new(EmulatedBackend::new(observer)).connect_and_run(device)
    }
}

fn probe(vid: Option<u16>, pid: Option<u16>) -> Result<()> {
    let mut camera = PtpCamera::open(vid, pid)?;
    let info = camera.device_info()?;
    print_device_info(&camera, &info);
    Ok(())
}

fn print_device_info(camera: &PtpCamera, info: &DeviceInfo) {
    println!(
        "Camera {:04X}:{:04X} (interface {})",
        camera.vendor_id(),
        camera.product_id(),
        camera.interface_number()
    );
    println!("  Manufacturer:   {}", info.manufacturer);
    println!("  Model:          {}", info.model);
    println!("  Version:        {}", info.device_version);
    println!("  Serial:         {}", info.serial_number);
    println!(
        "  PTP version:    {}.{:02}",
        info.standard_version / 100,
        info.standard_version % 100
    );
    println!(
        "  Vendor ext:     0x{:08X} v{} \"{}\"",
        info.vendor_extension_id, info.vendor_extension_version, info.vendor_extension_desc
    );
    println!("  Operations ({}):", info.operations.len());
    for chunk in info.operations.chunks(8) {
        let line: Vec<String> = chunk.iter().map(|op| format!("0x{op:04X}")).collect();
        println!("    {}", line.join(" "));
    }
    println!(
        "  Events: {}  Properties: {}  Capture formats: {}  Image formats: {}",
        info.events.len(),
        info.device_properties.len(),
        info.capture_formats.len(),
        info.image_formats.len()
    );
}
