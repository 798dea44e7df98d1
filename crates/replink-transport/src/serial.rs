use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serialport::{ClearBuffer, SerialPort};
use tracing::{debug, info};

use crate::error::{Result, TransportError};
use crate::link::ByteLink;

/// Default serial device path.
pub const DEFAULT_DEVICE_PATH: &str = "/dev/ttyUSB0";

/// Default baud rate, matching the controller firmware's configured speed.
pub const DEFAULT_BAUD_RATE: u32 = 38_400;

/// Read timeout on the underlying port.
///
/// Reads are availability-driven, so this only bounds the pathological case
/// of the RX buffer draining between the availability check and the read.
const PORT_READ_TIMEOUT: Duration = Duration::from_millis(10);

/// Serial device configuration.
#[derive(Debug, Clone)]
pub struct SerialConfig {
    /// Device path, e.g. `/dev/ttyUSB0`.
    pub path: PathBuf,
    /// Baud rate. The stock firmware runs at 38400; some board variants are
    /// flashed for faster links.
    pub baud_rate: u32,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_DEVICE_PATH),
            baud_rate: DEFAULT_BAUD_RATE,
        }
    }
}

impl SerialConfig {
    /// Configuration for a specific device path at the default baud rate.
    pub fn for_path(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            baud_rate: DEFAULT_BAUD_RATE,
        }
    }
}

/// An open serial connection to the controller board.
///
/// The port is owned exclusively: the driver never opens a second link to the
/// same device while one is alive, and dropping the link releases the port.
pub struct SerialLink {
    port: Box<dyn SerialPort>,
    path: PathBuf,
}

impl SerialLink {
    /// Open the serial device described by `config`.
    pub fn open(config: &SerialConfig) -> Result<Self> {
        let port = serialport::new(config.path.to_string_lossy(), config.baud_rate)
            .timeout(PORT_READ_TIMEOUT)
            .open()
            .map_err(|e| TransportError::Open {
                path: config.path.clone(),
                source: e,
            })?;

        info!(path = ?config.path, baud = config.baud_rate, "opened serial link");

        Ok(Self {
            port,
            path: config.path.clone(),
        })
    }

    /// The device path this link is connected to.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Read for SerialLink {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.port.read(buf)
    }
}

impl Write for SerialLink {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.port.write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.port.flush()
    }
}

impl ByteLink for SerialLink {
    fn available(&mut self) -> Result<usize> {
        Ok(self.port.bytes_to_read().map_err(TransportError::Control)? as usize)
    }

    fn discard_input(&mut self) -> Result<()> {
        debug!(path = ?self.path, "discarding serial input buffer");
        self.port
            .clear(ClearBuffer::Input)
            .map_err(TransportError::Control)
    }
}

impl std::fmt::Debug for SerialLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialLink").field("path", &self.path).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_matches_firmware() {
        let config = SerialConfig::default();
        assert_eq!(config.path, PathBuf::from("/dev/ttyUSB0"));
        assert_eq!(config.baud_rate, 38_400);
    }

    #[test]
    fn for_path_keeps_default_baud() {
        let config = SerialConfig::for_path("/dev/ttyACM3");
        assert_eq!(config.path, PathBuf::from("/dev/ttyACM3"));
        assert_eq!(config.baud_rate, DEFAULT_BAUD_RATE);
    }

    #[test]
    fn open_missing_device_reports_path() {
        let config = SerialConfig::for_path("/dev/replink-does-not-exist");
        let err = SerialLink::open(&config).unwrap_err();
        assert!(matches!(err, TransportError::Open { .. }));
        assert!(err.to_string().contains("replink-does-not-exist"));
    }
}
