//! BLE provisioning tool for HyperHDR devices
//!
//! Lists nearby devices, shows the networks a device sees, hands it Wi-Fi
//! credentials and drives connect/disconnect/forget requests.

use std::path::Path;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use hyperhdr_ble_controller::{
    BleController, BtleplugTransport, ControllerConfig, GattSession, HyperhdrDevice, PeripheralId,
    RecentDevice, RecentDevices,
};
use hyperhdr_proto::{SignalLevel, StatusEvent, WifiAction, WifiNetwork};
use log::debug;

type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

#[derive(Parser)]
#[command(name = "hyperhdr-ble")]
#[command(about = "BLE Wi-Fi provisioning tool for HyperHDR devices")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List nearby BLE devices
    Devices {
        /// Scan duration in seconds (default from config)
        #[arg(short, long)]
        duration: Option<u64>,
        /// Show every device, not only HyperHDR ones
        #[arg(short, long)]
        all: bool,
    },
    /// List the Wi-Fi networks a device can see
    Networks {
        /// Device name, id or address (default: first HyperHDR device found)
        #[arg(short, long)]
        device: Option<String>,
    },
    /// Send Wi-Fi credentials and wait for the device to join
    Provision {
        #[arg(short, long)]
        device: Option<String>,
        #[arg(short, long, requires = "password", conflicts_with = "file")]
        ssid: Option<String>,
        #[arg(short, long)]
        password: Option<String>,
        /// Credentials file (SSID on line 1, password on line 2)
        #[arg(short, long)]
        file: Option<String>,
    },
    /// Ask the device to connect to, disconnect from or forget a network
    Action {
        #[arg(short, long)]
        device: Option<String>,
        /// connect, disconnect or forget
        action: WifiAction,
        ssid: String,
    },
    /// Print status notifications until Ctrl-C
    Watch {
        #[arg(short, long)]
        device: Option<String>,
    },
    /// Show the device's IP, MAC and last status
    Info {
        #[arg(short, long)]
        device: Option<String>,
    },
    /// List or forget recently used devices
    Recent {
        /// Remove this id from the list
        #[arg(long)]
        remove: Option<String>,
    },
}

#[tokio::main]
async fn main() -> CliResult<()> {
    env_logger::init();
    let cli = Cli::parse();

    let home = hyperhdr_ble_controller::hyperhdr_home()?;
    let config = ControllerConfig::load_or_create(&home)?;
    debug!("home {}, config {config:?}", home.display());

    if let Commands::Recent { remove } = &cli.command {
        return recent(&home, remove.as_deref());
    }

    let transport = Arc::new(
        BtleplugTransport::new(config.adapter_index, config.device_scan_duration()).await?,
    );

    if let Commands::Devices { duration, all } = cli.command {
        let duration = duration.map_or(config.device_scan_duration(), std::time::Duration::from_secs);
        return list_devices(&transport, duration, all).await;
    }

    // credentials are checked before anything is sent to the device
    let credentials = match &cli.command {
        Commands::Provision { ssid: Some(ssid), password: Some(password), .. } => {
            Some((ssid.clone(), password.clone()))
        }
        Commands::Provision { file: Some(file), .. } => Some(read_wifi_credentials(file)?),
        Commands::Provision { .. } => return Err("pass --ssid and --password, or --file".into()),
        _ => None,
    };

    let controller = BleController::new(transport.clone(), config);
    let (id, session) = open(&transport, &controller, &home, &cli.command).await?;

    let result = match cli.command {
        Commands::Networks { .. } => networks(&session).await,
        Commands::Provision { .. } => match credentials {
            Some((ssid, password)) => provision(&session, &ssid, &password).await,
            None => Ok(()),
        },
        Commands::Action { action, ssid, .. } => action_request(&session, &ssid, action).await,
        Commands::Watch { .. } => watch(&session).await,
        Commands::Info { .. } => info(&session).await,
        Commands::Devices { .. } | Commands::Recent { .. } => Ok(()),
    };

    controller.disconnect(&id).await?;
    result
}

fn read_wifi_credentials(file: &str) -> CliResult<(String, String)> {
    let content = std::fs::read_to_string(file)?;
    let mut lines = content.lines();
    let ssid = lines.next().ok_or("Missing SSID in credentials file")?.trim().to_string();
    // open networks may leave the second line out
    let password = lines.next().unwrap_or_default().trim().to_string();
    Ok((ssid, password))
}

fn target(command: &Commands) -> Option<&str> {
    match command {
        Commands::Networks { device }
        | Commands::Provision { device, .. }
        | Commands::Action { device, .. }
        | Commands::Watch { device }
        | Commands::Info { device } => device.as_deref(),
        Commands::Devices { .. } | Commands::Recent { .. } => None,
    }
}

async fn list_devices(
    transport: &BtleplugTransport,
    duration: std::time::Duration,
    all: bool,
) -> CliResult<()> {
    println!("Scanning for HyperHDR devices ({} seconds)...", duration.as_secs());
    let devices = transport.discover_devices(duration).await?;
    let shown: Vec<&HyperhdrDevice> = devices.iter().filter(|d| all || d.is_hyperhdr).collect();

    println!("\nFound {} devices:", shown.len());
    for device in shown {
        let rssi = device.rssi.map_or_else(|| "N/A".to_string(), |r| format!("{r} dBm"));
        let marker = if device.is_hyperhdr { " [HYPERHDR]" } else { "" };
        println!("  {} ({}) id: {} RSSI: {rssi}{marker}", device.name, device.address, device.id);
    }
    Ok(())
}

/// Resolve the target device, connect and remember it
async fn open(
    transport: &BtleplugTransport,
    controller: &BleController,
    home: &Path,
    command: &Commands,
) -> CliResult<(PeripheralId, Arc<GattSession>)> {
    let recent = RecentDevices::new(home);
    let (id, name, rssi) = match target(command) {
        // exact ids and addresses go straight to the transport
        Some(t) if t.contains(':') || t.contains('-') => (PeripheralId::from(t), None, None),
        wanted => {
            println!("Scanning for HyperHDR devices...");
            let devices = transport.discover_devices(controller.config().device_scan_duration()).await?;
            let device = devices
                .into_iter()
                .find(|d| match wanted {
                    Some(t) => d.name.contains(t) || d.address.contains(t),
                    None => d.is_hyperhdr,
                })
                .ok_or("No HyperHDR device found")?;
            println!("Found device: {} ({})", device.name, device.address);
            (device.id, Some(device.name), device.rssi)
        }
    };

    println!("Connecting...");
    let session = controller.connect(&id).await?;
    println!("Connected!");
    if let Err(e) = session.discover_services_and_characteristics().await {
        controller.disconnect(&id).await?;
        return Err(e.into());
    }

    if let Err(e) = recent.record(RecentDevice::new(id.clone(), name, rssi)) {
        eprintln!("could not update recent devices: {e}");
    }
    Ok((id, session))
}

fn bars(level: SignalLevel) -> &'static str {
    match level {
        SignalLevel::Full => "[####]",
        SignalLevel::Medium => "[### ]",
        SignalLevel::Weak => "[##  ]",
        SignalLevel::None => "[#   ]",
    }
}

fn describe(network: &WifiNetwork) -> String {
    let mut flags = Vec::new();
    if network.currently_connected {
        flags.push("connected");
    }
    if network.saved {
        flags.push("saved");
    }
    if network.locked {
        flags.push("secured");
    }
    let actions: Vec<&str> = network.available_actions().into_iter().map(WifiAction::name).collect();
    format!(
        "{} {:<32} {:>3}%  {:<24} actions: {}",
        bars(network.signal_level()),
        network.ssid,
        network.signal_strength,
        flags.join(","),
        actions.join("/")
    )
}

async fn networks(session: &GattSession) -> CliResult<()> {
    let networks = hyperhdr_ble_controller::scan(session).await?;
    println!("\n{} networks:", networks.len());
    for network in &networks {
        println!("  {}", describe(network));
    }
    Ok(())
}

fn report(event: &StatusEvent) -> CliResult<()> {
    if event.is_success() {
        println!("Success: {}", event.summary());
        Ok(())
    } else if event.is_timeout() {
        Err("no answer from the device in time".into())
    } else {
        Err(format!("Failed: {}", event.summary()).into())
    }
}

async fn provision(session: &GattSession, ssid: &str, password: &str) -> CliResult<()> {
    println!("Sending Wi-Fi credentials...");
    println!("  SSID: {ssid}");
    let event = hyperhdr_ble_controller::provision(session, ssid, password).await?;
    report(&event)
}

async fn action_request(session: &GattSession, ssid: &str, action: WifiAction) -> CliResult<()> {
    println!("Requesting {action} for {ssid:?}...");
    let event = hyperhdr_ble_controller::perform_action(session, ssid, action).await?;
    report(&event)
}

async fn watch(session: &GattSession) -> CliResult<()> {
    let subscription = hyperhdr_ble_controller::subscribe_status(
        session,
        |event| println!("{}: {}", event.status, event.summary()),
        |err| eprintln!("{err}"),
    )
    .await?;

    println!("Watching status, Ctrl-C to stop");
    tokio::signal::ctrl_c().await?;
    subscription.cancel();
    Ok(())
}

async fn info(session: &GattSession) -> CliResult<()> {
    let ip = hyperhdr_ble_controller::read_ip(session).await?;
    let mac = hyperhdr_ble_controller::read_mac(session).await?;
    let status = hyperhdr_ble_controller::read_status(session).await?;

    println!("IP:     {}", if ip.is_empty() { "-" } else { &ip });
    println!("MAC:    {mac}");
    match status {
        Some(event) => println!("Status: {} ({})", event.status, event.summary()),
        None => println!("Status: -"),
    }
    Ok(())
}

fn recent(home: &Path, remove: Option<&str>) -> CliResult<()> {
    let store = RecentDevices::new(home);
    let devices = match remove {
        Some(id) => store.remove(&PeripheralId::from(id))?,
        None => store.list()?,
    };

    if devices.is_empty() {
        println!("No recent devices");
    }
    for device in devices {
        let name = device.name.as_deref().unwrap_or("Unknown");
        println!("  {name} ({}) last connected {}", device.id, device.last_connected);
    }
    Ok(())
}
