use core::fmt;
use std::os::raw::c_int;

pub type Result<T, E = Error> = core::result::Result<T, E>;

/// Status word returned by every vendor entry point. Zero is success.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Status(pub u8);

impl Status {
    pub const SUCCESS: Status = Status(0x00);
    pub const DEVICE_NOT_FOUND: Status = Status(0x01);
    pub const INVALID_HANDLE: Status = Status(0x02);
    pub const INVALID_DEVICE_OBJECT: Status = Status(0x03);
    pub const INVALID_PARAMETER: Status = Status(0x04);
    pub const INVALID_REQUEST_LENGTH: Status = Status(0x05);
    pub const READ_ERROR: Status = Status(0x10);
    pub const WRITE_ERROR: Status = Status(0x11);
    pub const READ_TIMED_OUT: Status = Status(0x12);
    pub const WRITE_TIMED_OUT: Status = Status(0x13);
    pub const DEVICE_IO_FAILED: Status = Status(0x14);
    pub const DEVICE_ACCESS_ERROR: Status = Status(0x15);
    pub const DEVICE_NOT_SUPPORTED: Status = Status(0x16);
    pub const UNKNOWN_ERROR: Status = Status(0xFF);

    pub(crate) fn from_native(code: c_int) -> Status {
        Status(code as u8)
    }

    /// Symbolic name from the vendor header, if the code is documented.
    pub fn name(self) -> Option<&'static str> {
        match self.0 {
            0x00 => Some("HID_UART_SUCCESS"),
            0x01 => Some("HID_UART_DEVICE_NOT_FOUND"),
            0x02 => Some("HID_UART_INVALID_HANDLE"),
            0x03 => Some("HID_UART_INVALID_DEVICE_OBJECT"),
            0x04 => Some("HID_UART_INVALID_PARAMETER"),
            0x05 => Some("HID_UART_INVALID_REQUEST_LENGTH"),
            0x10 => Some("HID_UART_READ_ERROR"),
            0x11 => Some("HID_UART_WRITE_ERROR"),
            0x12 => Some("HID_UART_READ_TIMED_OUT"),
            0x13 => Some("HID_UART_WRITE_TIMED_OUT"),
            0x14 => Some("HID_UART_DEVICE_IO_FAILED"),
            0x15 => Some("HID_UART_DEVICE_ACCESS_ERROR"),
            0x16 => Some("HID_UART_DEVICE_NOT_SUPPORTED"),
            0xFF => Some("HID_UART_UNKNOWN_ERROR"),
            _ => None,
        }
    }

    /// Treats any non-zero status as a hard failure.
    pub(crate) fn check(self) -> Result<()> {
        if self == Status::SUCCESS {
            Ok(())
        } else {
            Err(Error::Api(self))
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "{} (0x{:02X})", name, self.0),
            None => write!(f, "unknown status 0x{:02X}", self.0),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Hard failure reported by the vendor library.
    #[error("{0}")]
    Api(Status),
    /// The vendor artifact could not be loaded, or an export is missing.
    #[error("vendor library unavailable: {0}")]
    Library(#[from] libloading::Error),
    /// Data bit counts outside 5..=8 are rejected before the native call.
    #[error("invalid data bit count {0}, expected 5-8")]
    InvalidDataBits(u8),
    /// A descriptor string returned by the device was not valid UTF-8.
    #[error("device string is not valid UTF-8: {0}")]
    InvalidString(#[from] core::str::Utf8Error),
}

impl Error {
    /// The native status carried by this error, if it is an API failure.
    pub fn status(&self) -> Option<Status> {
        match self {
            Error::Api(status) => Some(*status),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn documented_codes_have_names() {
        for &(code, name) in &[
            (0x00, "HID_UART_SUCCESS"),
            (0x01, "HID_UART_DEVICE_NOT_FOUND"),
            (0x02, "HID_UART_INVALID_HANDLE"),
            (0x03, "HID_UART_INVALID_DEVICE_OBJECT"),
            (0x04, "HID_UART_INVALID_PARAMETER"),
            (0x05, "HID_UART_INVALID_REQUEST_LENGTH"),
            (0x10, "HID_UART_READ_ERROR"),
            (0x11, "HID_UART_WRITE_ERROR"),
            (0x12, "HID_UART_READ_TIMED_OUT"),
            (0x13, "HID_UART_WRITE_TIMED_OUT"),
            (0x14, "HID_UART_DEVICE_IO_FAILED"),
            (0x15, "HID_UART_DEVICE_ACCESS_ERROR"),
            (0x16, "HID_UART_DEVICE_NOT_SUPPORTED"),
            (0xFF, "HID_UART_UNKNOWN_ERROR"),
        ] {
            assert_eq!(Status(code).name(), Some(name));
        }
    }

    #[test]
    fn undocumented_code_displays_raw_value() {
        assert_eq!(Status(0x42).name(), None);
        assert_eq!(Status(0x42).to_string(), "unknown status 0x42");
    }

    #[test]
    fn check_preserves_the_code() {
        assert!(Status::SUCCESS.check().is_ok());

        let err = Status::DEVICE_IO_FAILED.check().unwrap_err();
        assert_eq!(err.status(), Some(Status::DEVICE_IO_FAILED));
        assert_eq!(err.to_string(), "HID_UART_DEVICE_IO_FAILED (0x14)");
    }

    #[test]
    fn validation_errors_carry_no_status() {
        assert_eq!(Error::InvalidDataBits(9).status(), None);
    }
}
