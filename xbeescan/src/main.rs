#[macro_use]
extern crate log;

use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::time::Instant;
use xbee::{CoordinatorConfig, CoordinatorHandle, Device};

#[derive(Parser, Debug)]
#[command(name = "xbeescan", version, about = "Discover the devices behind an XBee coordinator")]
struct Args {
    /// Serial port the coordinator is attached to, e.g. /dev/ttyUSB0
    port: String,

    #[arg(short, long, default_value_t = xbee::DEFAULT_BAUD)]
    baud: u32,

    /// Receive attempts allowed after the first one times out
    #[arg(short, long, default_value_t = xbee::DEFAULT_NUMBER_OF_RETRIES)]
    retries: usize,

    /// Upper bound on a single serial read, in milliseconds
    #[arg(long, default_value_t = xbee::DEFAULT_READ_TIMEOUT.as_millis() as u64)]
    read_timeout_ms: u64,

    /// How long to wait for each reply, in milliseconds
    #[arg(long, default_value_t = xbee::DEFAULT_RECEIVE_TIMEOUT.as_millis() as u64)]
    receive_timeout_ms: u64,

    /// Silence that ends discovery, in milliseconds
    #[arg(long, default_value_t = xbee::DEFAULT_DISCOVERY_TIMEOUT.as_millis() as u64)]
    discovery_timeout_ms: u64,

    /// Ask every discovered device for its hardware and firmware versions
    #[arg(long)]
    versions: bool,

    /// Skip reading the coordinator's own identity
    #[arg(long)]
    no_identify: bool,

    /// After scanning, print unsolicited traffic for this many seconds
    #[arg(long, default_value_t = 0)]
    listen: u64,
}

impl Args {
    fn config(&self) -> CoordinatorConfig {
        CoordinatorConfig {
            number_of_retries: self.retries,
            read_timeout: Duration::from_millis(self.read_timeout_ms),
            receive_timeout: Duration::from_millis(self.receive_timeout_ms),
            discovery_timeout: Duration::from_millis(self.discovery_timeout_ms),
            query_remote_versions: self.versions,
            ..Default::default()
        }
    }
}

fn print_topology(coordinator: Option<&Device>, devices: &[Device]) {
    if let Some(coordinator) = coordinator {
        println!("coordinator  {}", coordinator);
    }
    println!("{} device(s) found", devices.len());
    for device in devices {
        println!("  {}", device);
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    pretty_env_logger::init();

    let args = Args::parse();
    let coordinator = xbee::open_tty(&args.port, args.baud, args.config())
        .with_context(|| format!("opening {}", args.port))?;
    let (handle, worker) = CoordinatorHandle::spawn(coordinator);

    let identity = if args.no_identify {
        None
    } else {
        Some(handle.identify().await.context("identifying coordinator")?)
    };

    let devices = handle.scan_devices().await.context("scanning")?;
    print_topology(identity.as_ref(), &devices);

    let deadline = Instant::now() + Duration::from_secs(args.listen);
    while Instant::now() < deadline {
        match handle.receive_any().await? {
            Some(packet) => println!(
                "{} from {:?}: {:02x?}",
                packet.frame_type, packet.source, packet.data
            ),
            None => trace!("nothing received"),
        }
    }

    if args.listen > 0 {
        let devices = handle.connected_devices().await?;
        print_topology(None, &devices);
    }

    drop(handle);
    worker.await?;
    Ok(())
}
