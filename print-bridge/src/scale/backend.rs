//! Serial port access behind a small trait so acquisition can run against
//! fakes in tests

use shared::models::{ScaleConfig, ScaleParity};
use std::io::{self, Read};
use std::time::Duration;

/// Blocking read timeout; bounds how long a reader takes to notice a stop
pub const READ_TIMEOUT: Duration = Duration::from_millis(200);

/// An open serial port
pub trait SerialLink: Send {
    /// Blocking read; `TimedOut` / `WouldBlock` mean no data yet
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Cheap I/O round trip used by the health check
    fn probe(&self) -> io::Result<()>;

    /// Second handle to the same port (reader and monitor each own one)
    fn try_clone(&self) -> io::Result<Box<dyn SerialLink>>;
}

/// Port discovery and opening
pub trait SerialBackend: Send + Sync {
    fn available_ports(&self) -> io::Result<Vec<String>>;

    fn open(&self, config: &ScaleConfig, port_name: &str) -> io::Result<Box<dyn SerialLink>>;
}

/// Backend over the OS serial ports
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemSerial;

impl SerialBackend for SystemSerial {
    fn available_ports(&self) -> io::Result<Vec<String>> {
        let ports = serialport::available_ports()?;
        Ok(ports.into_iter().map(|p| p.port_name).collect())
    }

    fn open(&self, config: &ScaleConfig, port_name: &str) -> io::Result<Box<dyn SerialLink>> {
        let port = serialport::new(port_name, config.baud_rate)
            .data_bits(data_bits(config.data_bits))
            .parity(match config.parity {
                ScaleParity::None => serialport::Parity::None,
                ScaleParity::Odd => serialport::Parity::Odd,
                ScaleParity::Even => serialport::Parity::Even,
            })
            .stop_bits(if config.stop_bits >= 2 {
                serialport::StopBits::Two
            } else {
                serialport::StopBits::One
            })
            .timeout(READ_TIMEOUT)
            .open()?;
        Ok(Box::new(SystemLink { port }))
    }
}

fn data_bits(bits: u8) -> serialport::DataBits {
    match bits {
        5 => serialport::DataBits::Five,
        6 => serialport::DataBits::Six,
        7 => serialport::DataBits::Seven,
        _ => serialport::DataBits::Eight,
    }
}

struct SystemLink {
    port: Box<dyn serialport::SerialPort>,
}

impl SerialLink for SystemLink {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.port.read(buf)
    }

    fn probe(&self) -> io::Result<()> {
        self.port.bytes_to_read()?;
        Ok(())
    }

    fn try_clone(&self) -> io::Result<Box<dyn SerialLink>> {
        let port = self.port.try_clone()?;
        Ok(Box::new(SystemLink { port }))
    }
}

/// True for errors that only mean "nothing to read yet"
pub fn is_idle(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted
    )
}
