use crate::error::Result;
use crate::hal::LineSink;
use crossbeam_channel::{unbounded, Receiver, Sender};
use log::{debug, info, warn};
use serialport::{SerialPort, SerialPortInfo};
use std::io::{Read, Write};
use std::time::Duration;

const READ_TIMEOUT: Duration = Duration::from_millis(50);
const WRITE_TIMEOUT: Duration = Duration::from_secs(1);
/// Pause after a read that returned nothing without waiting out the timeout.
const IDLE_SLEEP: Duration = Duration::from_millis(5);

#[derive(Debug, Clone)]
pub struct PortInfo {
    pub port_name: String,
    pub port_type: String,
    pub vid: Option<u16>,
    pub pid: Option<u16>,
    pub serial_number: Option<String>,
    pub manufacturer: Option<String>,
    pub product: Option<String>,
}

impl From<SerialPortInfo> for PortInfo {
    fn from(info: SerialPortInfo) -> Self {
        let (port_type, vid, pid, serial_number, manufacturer, product) = match &info.port_type {
            serialport::SerialPortType::UsbPort(usb) => (
                "USB".to_string(),
                Some(usb.vid),
                Some(usb.pid),
                usb.serial_number.clone(),
                usb.manufacturer.clone(),
                usb.product.clone(),
            ),
            serialport::SerialPortType::PciPort => ("PCI".to_string(), None, None, None, None, None),
            serialport::SerialPortType::BluetoothPort => ("Bluetooth".to_string(), None, None, None, None, None),
            serialport::SerialPortType::Unknown => ("Unknown".to_string(), None, None, None, None, None),
        };
        Self {
            port_name: info.port_name,
            port_type,
            vid,
            pid,
            serial_number,
            manufacturer,
            product,
        }
    }
}

impl PortInfo {
    pub fn label(&self) -> String {
        match (self.vid, self.pid) {
            (Some(vid), Some(pid)) => format!("{} ({:04X}:{:04X})", self.port_name, vid, pid),
            _ => format!("{} ({})", self.port_name, self.port_type),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LineEnding {
    LF,
    CR,
    CRLF,
}

impl LineEnding {
    pub fn as_bytes(&self) -> &'static [u8] {
        match self {
            LineEnding::LF => b"\n",
            LineEnding::CR => b"\r",
            LineEnding::CRLF => b"\r\n",
        }
    }
}

#[derive(Debug, Clone)]
pub struct SerialConfig {
    pub port_name: String,
    pub baud_rate: u32,
    pub data_bits: serialport::DataBits,
    pub parity: serialport::Parity,
    pub stop_bits: serialport::StopBits,
    pub flow_control: serialport::FlowControl,
    pub line_ending: LineEnding,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port_name: String::new(),
            baud_rate: crate::config::BAUD_RATE,
            data_bits: serialport::DataBits::Eight,
            parity: serialport::Parity::None,
            stop_bits: serialport::StopBits::One,
            flow_control: serialport::FlowControl::None,
            line_ending: LineEnding::LF,
        }
    }
}

impl SerialConfig {
    fn open(&self, timeout: Duration) -> Result<Box<dyn SerialPort>> {
        let port = serialport::new(&self.port_name, self.baud_rate)
            .data_bits(self.data_bits)
            .parity(self.parity)
            .stop_bits(self.stop_bits)
            .flow_control(self.flow_control)
            .timeout(timeout)
            .open()?;
        Ok(port)
    }
}

/// Sampler-side output over a serial port.
///
/// The port is opened lazily by [`LineSink::is_ready`], so the startup gate
/// keeps polling until the device node exists. With `require_dsr` the peer
/// must also hold DTR (seen here as DSR), which is how a USB CDC host
/// signals that a terminal has the port open.
pub struct SerialLink {
    cfg: SerialConfig,
    require_dsr: bool,
    port: Option<Box<dyn SerialPort>>,
    last_open_error: Option<String>,
}

impl SerialLink {
    pub fn new(cfg: SerialConfig) -> Self {
        Self {
            cfg,
            require_dsr: false,
            port: None,
            last_open_error: None,
        }
    }

    pub fn require_dsr(mut self, require: bool) -> Self {
        self.require_dsr = require;
        self
    }

    pub fn config(&self) -> &SerialConfig {
        &self.cfg
    }

    fn port(&mut self) -> Result<&mut Box<dyn SerialPort>> {
        let port = match self.port.take() {
            Some(port) => port,
            None => {
                let port = self.cfg.open(WRITE_TIMEOUT)?;
                info!("opened {} at {} baud", self.cfg.port_name, self.cfg.baud_rate);
                self.last_open_error = None;
                port
            }
        };
        Ok(self.port.insert(port))
    }
}

impl LineSink for SerialLink {
    fn is_ready(&mut self) -> bool {
        if let Err(e) = self.port().map(|_| ()) {
            let msg = e.to_string();
            if self.last_open_error.as_deref() != Some(msg.as_str()) {
                debug!("cannot open {} yet: {msg}", self.cfg.port_name);
                self.last_open_error = Some(msg);
            }
            return false;
        }
        if !self.require_dsr {
            return true;
        }
        self.port
            .as_mut()
            .is_some_and(|port| port.read_data_set_ready().unwrap_or(false))
    }

    /// Writes one line. On failure the port is dropped, so the next
    /// `is_ready` reopens it.
    fn write_line(&mut self, line: &str) -> Result<()> {
        let ending = self.cfg.line_ending.as_bytes();
        let port = self.port()?;
        let written = port
            .write_all(line.as_bytes())
            .and_then(|()| port.write_all(ending))
            .and_then(|()| port.flush());
        if let Err(e) = written {
            warn!("write to {} failed, closing: {e}", self.cfg.port_name);
            self.port = None;
            return Err(e.into());
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub enum SerialEvent {
    Rx(Vec<u8>),
    Opened(String),
    Closed,
    Error(String),
}

enum Command {
    SetDtr(bool),
    Close,
}

#[derive(Debug, PartialEq, Eq)]
enum Pump {
    Data,
    Idle,
    Failed,
}

/// One read on the reader thread. Data goes out as `Rx`; a hard error is
/// published as `Error` then `Closed`.
fn pump<R: Read + ?Sized>(port: &mut R, buf: &mut [u8], tx_evt: &Sender<SerialEvent>) -> Pump {
    match port.read(buf) {
        Ok(0) => Pump::Idle,
        Ok(n) => {
            let _ = tx_evt.send(SerialEvent::Rx(buf[..n].to_vec()));
            Pump::Data
        }
        Err(e) if e.kind() == std::io::ErrorKind::TimedOut => Pump::Idle,
        Err(e) => {
            warn!("serial read failed: {e}");
            let _ = tx_evt.send(SerialEvent::Error(e.to_string()));
            let _ = tx_evt.send(SerialEvent::Closed);
            Pump::Failed
        }
    }
}

/// Host-side reader: a background thread drains the port and publishes
/// [`SerialEvent`]s on a channel.
pub struct SerialService {
    cfg: SerialConfig,
    tx_cmd: Sender<Command>,
    rx_evt: Receiver<SerialEvent>,
}

impl SerialService {
    pub fn list_ports() -> Vec<PortInfo> {
        serialport::available_ports()
            .unwrap_or_default()
            .into_iter()
            .map(PortInfo::from)
            .collect()
    }

    pub fn open(cfg: SerialConfig) -> Result<Self> {
        let mut port = cfg.open(READ_TIMEOUT)?;
        let (tx_cmd, rx_cmd) = unbounded::<Command>();
        let (tx_evt, rx_evt) = unbounded::<SerialEvent>();
        let port_name = cfg.port_name.clone();

        std::thread::Builder::new()
            .name("serial-rx".into())
            .spawn(move || {
                let _ = tx_evt.send(SerialEvent::Opened(port_name));
                let mut buf = [0u8; 4096];
                loop {
                    let step = pump(&mut port, &mut buf, &tx_evt);
                    if step == Pump::Failed {
                        return;
                    }
                    while let Ok(cmd) = rx_cmd.try_recv() {
                        match cmd {
                            Command::SetDtr(state) => {
                                if let Err(e) = port.write_data_terminal_ready(state) {
                                    let _ = tx_evt.send(SerialEvent::Error(e.to_string()));
                                }
                            }
                            Command::Close => {
                                let _ = tx_evt.send(SerialEvent::Closed);
                                return;
                            }
                        }
                    }
                    if step == Pump::Idle {
                        std::thread::sleep(IDLE_SLEEP);
                    }
                }
            })?;

        Ok(Self { cfg, tx_cmd, rx_evt })
    }

    pub fn set_dtr(&self, state: bool) -> Result<()> {
        self.tx_cmd
            .send(Command::SetDtr(state))
            .map_err(|_| std::io::Error::from(std::io::ErrorKind::BrokenPipe).into())
    }

    pub fn close(&self) {
        let _ = self.tx_cmd.send(Command::Close);
    }

    pub fn events(&self) -> &Receiver<SerialEvent> {
        &self.rx_evt
    }

    pub fn config(&self) -> &SerialConfig {
        &self.cfg
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_endings() {
        assert_eq!(LineEnding::LF.as_bytes(), b"\n");
        assert_eq!(LineEnding::CRLF.as_bytes(), b"\r\n");
    }

    #[test]
    fn default_config_is_115200_8n1() {
        let cfg = SerialConfig::default();
        assert_eq!(cfg.baud_rate, 115_200);
        assert_eq!(cfg.data_bits, serialport::DataBits::Eight);
        assert_eq!(cfg.parity, serialport::Parity::None);
        assert_eq!(cfg.stop_bits, serialport::StopBits::One);
    }

    #[test]
    fn missing_port_is_not_ready() {
        let mut link = SerialLink::new(SerialConfig {
            port_name: "/dev/ppgsampler-does-not-exist".into(),
            ..Default::default()
        });
        assert!(!link.is_ready());
        assert!(!link.is_ready());
        assert!(link.write_line("START_DATA_COLLECTION").is_err());
    }

    struct FailingPort(std::io::ErrorKind);

    impl Read for FailingPort {
        fn read(&mut self, _: &mut [u8]) -> std::io::Result<usize> {
            Err(self.0.into())
        }
    }

    #[test]
    fn reader_idles_on_empty_and_timed_out_reads() {
        let (tx, rx) = unbounded();
        let mut buf = [0u8; 16];

        let mut empty: &[u8] = &[];
        assert_eq!(pump(&mut empty, &mut buf, &tx), Pump::Idle);
        let mut slow = FailingPort(std::io::ErrorKind::TimedOut);
        assert_eq!(pump(&mut slow, &mut buf, &tx), Pump::Idle);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn reader_forwards_data_and_reports_hard_errors() {
        let (tx, rx) = unbounded();
        let mut buf = [0u8; 16];

        let mut data: &[u8] = b"0,1,2\n";
        assert_eq!(pump(&mut data, &mut buf, &tx), Pump::Data);
        assert!(matches!(rx.try_recv(), Ok(SerialEvent::Rx(bytes)) if bytes == b"0,1,2\n"));

        let mut gone = FailingPort(std::io::ErrorKind::BrokenPipe);
        assert_eq!(pump(&mut gone, &mut buf, &tx), Pump::Failed);
        assert!(matches!(rx.try_recv(), Ok(SerialEvent::Error(_))));
        assert!(matches!(rx.try_recv(), Ok(SerialEvent::Closed)));
    }

    #[test]
    fn port_label_prefers_usb_ids() {
        let usb = PortInfo {
            port_name: "/dev/ttyACM0".into(),
            port_type: "USB".into(),
            vid: Some(0x2341),
            pid: Some(0x804f),
            serial_number: None,
            manufacturer: None,
            product: None,
        };
        assert_eq!(usb.label(), "/dev/ttyACM0 (2341:804F)");
        let pci = PortInfo { vid: None, pid: None, port_type: "PCI".into(), ..usb };
        assert_eq!(pci.label(), "/dev/ttyACM0 (PCI)");
    }
}
