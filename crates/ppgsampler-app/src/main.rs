use anyhow::{Context, Result};
use ppgsampler_app::logging::init_logging;
use ppgsampler_core::{IioInput, MonotonicClock, Sampler, SamplerConfig, SerialConfig, SerialLink};
use tracing::info;

/// IIO ADC the two PPG sensors are wired to.
const IIO_DEVICE: &str = "/sys/bus/iio/devices/iio:device0";
const CHANNEL_A_INDEX: u8 = 0;
const CHANNEL_B_INDEX: u8 = 1;

/// USB gadget serial port presented to the host.
const SERIAL_PORT: &str = "/dev/ttyGS0";
/// The gadget driver has no modem lines, so readiness is just "port opens".
const REQUIRE_DSR: bool = false;

fn main() -> Result<()> {
    init_logging("info")?;

    let config = SamplerConfig::default();
    let link = SerialLink::new(SerialConfig {
        port_name: SERIAL_PORT.to_string(),
        ..Default::default()
    })
    .require_dsr(REQUIRE_DSR);
    let input = IioInput::new(IIO_DEVICE, CHANNEL_A_INDEX, CHANNEL_B_INDEX);

    info!("waiting for {}", link.config().port_name);
    let sampler = Sampler::new(input, MonotonicClock::new(), link, config);
    match sampler.run() {
        Ok(never) => match never {},
        Err(e) => Err(e).context("sampler failed to start"),
    }
}
