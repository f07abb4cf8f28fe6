//! Typed UART parameters and device attribute records.
//!
//! The vendor API encodes everything as small integers; the enums here carry
//! those exact wire values as their discriminants.

use core::fmt;

use crate::error::{Error, Result, Status};

/// Word length, encoded 0..=3 for 5..=8 data bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataBits {
    Five = 0x00,
    Six = 0x01,
    Seven = 0x02,
    Eight = 0x03,
}

impl DataBits {
    /// Maps a literal bit count to the wire encoding. Counts outside 5..=8
    /// are rejected here, before anything reaches the native layer.
    pub fn from_count(bits: u8) -> Result<DataBits> {
        match bits {
            5 => Ok(DataBits::Five),
            6 => Ok(DataBits::Six),
            7 => Ok(DataBits::Seven),
            8 => Ok(DataBits::Eight),
            _ => Err(Error::InvalidDataBits(bits)),
        }
    }

    pub fn count(self) -> u8 {
        self as u8 + 5
    }

    pub(crate) fn from_raw(raw: u8) -> Result<DataBits> {
        match raw {
            0x00 => Ok(DataBits::Five),
            0x01 => Ok(DataBits::Six),
            0x02 => Ok(DataBits::Seven),
            0x03 => Ok(DataBits::Eight),
            _ => Err(Error::Api(Status::INVALID_PARAMETER)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Parity {
    None = 0x00,
    Odd = 0x01,
    Even = 0x02,
    Mark = 0x03,
    Space = 0x04,
}

impl Parity {
    pub(crate) fn from_raw(raw: u8) -> Result<Parity> {
        match raw {
            0x00 => Ok(Parity::None),
            0x01 => Ok(Parity::Odd),
            0x02 => Ok(Parity::Even),
            0x03 => Ok(Parity::Mark),
            0x04 => Ok(Parity::Space),
            _ => Err(Error::Api(Status::INVALID_PARAMETER)),
        }
    }
}

/// Stop bit length. `Short` is 1 stop bit, `Long` is 1.5 or 2 depending on
/// the word length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopBits {
    Short = 0x00,
    Long = 0x01,
}

impl StopBits {
    pub(crate) fn from_raw(raw: u8) -> Result<StopBits> {
        match raw {
            0x00 => Ok(StopBits::Short),
            0x01 => Ok(StopBits::Long),
            _ => Err(Error::Api(Status::INVALID_PARAMETER)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowControl {
    None = 0x00,
    RtsCts = 0x01,
}

impl FlowControl {
    pub(crate) fn from_raw(raw: u8) -> Result<FlowControl> {
        match raw {
            0x00 => Ok(FlowControl::None),
            0x01 => Ok(FlowControl::RtsCts),
            _ => Err(Error::Api(Status::INVALID_PARAMETER)),
        }
    }
}

/// Full UART line configuration as accepted by `HidUart_SetUartConfig`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UartConfig {
    pub baud_rate: u32,
    pub data_bits: DataBits,
    pub parity: Parity,
    pub stop_bits: StopBits,
    pub flow_control: FlowControl,
}

impl Default for UartConfig {
    /// 115200 8N1, no flow control.
    fn default() -> UartConfig {
        UartConfig {
            baud_rate: 115_200,
            data_bits: DataBits::Eight,
            parity: Parity::None,
            stop_bits: StopBits::Short,
            flow_control: FlowControl::None,
        }
    }
}

/// FIFO occupancy and line status reported by `HidUart_GetUartStatus`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UartStatus {
    pub tx_fifo: u16,
    pub rx_fifo: u16,
    /// Parity/overrun error flags accumulated since the last query.
    pub line_errors: u8,
    /// Non-zero while a line break is being received.
    pub line_break: u8,
}

/// Selector for the descriptor string queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StringOption {
    Vid = 0x01,
    Pid = 0x02,
    Path = 0x03,
    SerialNumber = 0x04,
    Manufacturer = 0x05,
    Product = 0x06,
}

/// USB attributes of one device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Attributes {
    pub vid: u16,
    pub pid: u16,
    pub release: u16,
}

/// Bridge part number and firmware version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartNumber {
    pub part: u8,
    pub version: u8,
}

/// Version of the vendor library or of its HID transport library.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LibraryVersion {
    pub major: u8,
    pub minor: u8,
    pub release: bool,
}

impl fmt::Display for LibraryVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.release as u8)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_bits_accepts_5_through_8() {
        assert_eq!(DataBits::from_count(5).unwrap(), DataBits::Five);
        assert_eq!(DataBits::from_count(6).unwrap(), DataBits::Six);
        assert_eq!(DataBits::from_count(7).unwrap(), DataBits::Seven);
        assert_eq!(DataBits::from_count(8).unwrap(), DataBits::Eight);
    }

    #[test]
    fn data_bits_rejects_out_of_range_counts() {
        for bits in [0, 4, 9, 255] {
            match DataBits::from_count(bits) {
                Err(Error::InvalidDataBits(b)) => assert_eq!(b, bits),
                other => panic!("expected InvalidDataBits, got {:?}", other),
            }
        }
    }

    #[test]
    fn data_bits_round_trips_through_the_wire_encoding() {
        for bits in 5..=8 {
            let encoded = DataBits::from_count(bits).unwrap();
            assert_eq!(encoded.count(), bits);
            assert_eq!(DataBits::from_raw(encoded as u8).unwrap(), encoded);
        }
    }

    #[test]
    fn wire_values_match_the_vendor_header() {
        assert_eq!(DataBits::Eight as u8, 0x03);
        assert_eq!(Parity::Space as u8, 0x04);
        assert_eq!(StopBits::Long as u8, 0x01);
        assert_eq!(FlowControl::RtsCts as u8, 0x01);
        assert_eq!(StringOption::SerialNumber as u8, 0x04);
        assert_eq!(StringOption::Product as u8, 0x06);
    }

    #[test]
    fn library_version_formats_as_three_fields() {
        let version = LibraryVersion {
            major: 6,
            minor: 7,
            release: true,
        };
        assert_eq!(version.to_string(), "6.7.1");
    }
}
