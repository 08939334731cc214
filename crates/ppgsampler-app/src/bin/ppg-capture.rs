use anyhow::{Context, Result};
use clap::Parser;
use ppgsampler_app::capture::CaptureSession;
use ppgsampler_app::logging::init_logging;
use ppgsampler_core::config::BAUD_RATE;
use ppgsampler_core::{SerialConfig, SerialEvent, SerialService};
use std::path::PathBuf;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "ppg-capture")]
#[command(about = "Record PPG sampler collections from a serial port into CSV files")]
struct Args {
    /// Serial port of the sampler (e.g. /dev/ttyACM0 or COM3)
    #[arg(short, long, required_unless_present = "list")]
    port: Option<String>,

    /// Baud rate
    #[arg(short, long, default_value_t = BAUD_RATE)]
    baud: u32,

    /// Output directory [default: <local data dir>/ppgsampler]
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// List available serial ports and exit
    #[arg(long)]
    list: bool,

    /// Log level when RUST_LOG is not set
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn default_output_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("ppgsampler")
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args.log_level)?;

    if args.list {
        for port in SerialService::list_ports() {
            println!("{}", port.label());
        }
        return Ok(());
    }

    let port_name = args.port.context("no serial port given")?;
    let dir = args.output.unwrap_or_else(default_output_dir);
    let mut session = CaptureSession::create(&dir)?;

    let service = SerialService::open(SerialConfig {
        port_name: port_name.clone(),
        baud_rate: args.baud,
        ..Default::default()
    })
    .with_context(|| format!("opening {port_name}"))?;
    // Boards that gate on DTR start streaming once it is raised.
    service.set_dtr(true)?;

    for event in service.events().iter() {
        match event {
            SerialEvent::Opened(name) => {
                info!("connected to {name} at {} baud", service.config().baud_rate)
            }
            SerialEvent::Rx(data) => {
                if let Err(e) = session.ingest(&data) {
                    service.close();
                    return Err(e);
                }
            }
            SerialEvent::Error(e) => warn!("serial error: {e}"),
            SerialEvent::Closed => break,
        }
    }

    let name = session.name().to_string();
    let saved = session.finish()?;
    info!("serial link closed, {saved} collections of {name} saved to {}", dir.display());
    Ok(())
}
