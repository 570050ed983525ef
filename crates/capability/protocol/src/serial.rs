//! 串口参数校验

use crate::error::ProtocolError;
use domain::{FlowControl, Parity, StopBits};

pub const MIN_BAUD_RATE: u32 = 1200;
pub const MAX_BAUD_RATE: u32 = 115_200;

/// 串口打开参数。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerialSettings {
    pub port_name: String,
    pub baud_rate: u32,
    pub data_bits: u8,
    pub stop_bits: StopBits,
    pub parity: Parity,
    pub flow_control: FlowControl,
}

impl SerialSettings {
    /// 9600 8N1、无流控。
    pub fn new(port_name: impl Into<String>) -> Self {
        Self {
            port_name: port_name.into(),
            baud_rate: 9600,
            data_bits: 8,
            stop_bits: StopBits::One,
            parity: Parity::None,
            flow_control: FlowControl::None,
        }
    }

    /// 校验底层驱动可支持的组合。
    pub fn validate(&self) -> Result<(), ProtocolError> {
        if self.port_name.trim().is_empty() {
            return Err(ProtocolError::SerialConfig("port name is required".to_string()));
        }
        if !(MIN_BAUD_RATE..=MAX_BAUD_RATE).contains(&self.baud_rate) {
            return Err(ProtocolError::SerialConfig(format!(
                "baud rate {} outside {MIN_BAUD_RATE}-{MAX_BAUD_RATE}",
                self.baud_rate
            )));
        }
        if !(7..=8).contains(&self.data_bits) {
            return Err(ProtocolError::SerialConfig(format!(
                "data bits must be 7 or 8, got {}",
                self.data_bits
            )));
        }
        if self.stop_bits == StopBits::OnePointFive {
            return Err(ProtocolError::SerialConfig(
                "1.5 stop bits are not supported".to_string(),
            ));
        }
        if matches!(self.parity, Parity::Mark | Parity::Space) {
            return Err(ProtocolError::SerialConfig(format!(
                "parity {} is not supported",
                self.parity
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        SerialSettings::new("/dev/ttyUSB0").validate().expect("valid");
    }

    #[test]
    fn rejects_unsupported_combinations() {
        let mut settings = SerialSettings::new("/dev/ttyUSB0");
        settings.stop_bits = StopBits::OnePointFive;
        assert!(settings.validate().is_err());

        let mut settings = SerialSettings::new("/dev/ttyUSB0");
        settings.parity = Parity::Mark;
        assert!(settings.validate().is_err());

        let mut settings = SerialSettings::new("/dev/ttyUSB0");
        settings.baud_rate = 300;
        assert!(settings.validate().is_err());

        let mut settings = SerialSettings::new("/dev/ttyUSB0");
        settings.data_bits = 6;
        assert!(settings.validate().is_err());

        assert!(SerialSettings::new("  ").validate().is_err());
    }
}
