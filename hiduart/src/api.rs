//! The native surface as a trait, so the vendor library and the in-memory
//! mock are interchangeable behind [`HidUart`](crate::HidUart) and the
//! discovery free functions.

use std::os::raw::{c_char, c_int, c_void};

use crate::error::{Result, Status};
use crate::ffi;

pub use crate::ffi::DEVICE_STRING_LEN;

/// Opaque token for one opened device session. Zero is the closed state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Handle(pub(crate) usize);

impl Handle {
    pub(crate) const CLOSED: Handle = Handle(0);

    pub(crate) fn is_open(self) -> bool {
        self.0 != 0
    }

    fn raw(self) -> ffi::RawHandle {
        self.0 as *mut c_void
    }
}

/// One method per vendor entry point. Implementations mirror the C contract:
/// every call reports a [`Status`] and writes its results through `&mut`
/// out-parameters.
///
/// Status interpretation (success, soft timeout, hard failure) is the
/// caller's job; implementations only transport codes.
pub trait HidUartApi {
    fn get_num_devices(&self, count: &mut u32, vid: u16, pid: u16) -> Status;
    fn get_attributes(
        &self,
        index: u32,
        vid: u16,
        pid: u16,
        dev_vid: &mut u16,
        dev_pid: &mut u16,
        dev_release: &mut u16,
    ) -> Status;
    fn get_string(
        &self,
        index: u32,
        vid: u16,
        pid: u16,
        buf: &mut [u8; DEVICE_STRING_LEN],
        option: u32,
    ) -> Status;
    fn get_library_version(&self, major: &mut u8, minor: &mut u8, release: &mut bool) -> Status;
    fn get_hid_library_version(&self, major: &mut u8, minor: &mut u8, release: &mut bool)
        -> Status;

    fn open(&self, handle: &mut Handle, index: u32, vid: u16, pid: u16) -> Status;
    fn close(&self, handle: Handle) -> Status;
    fn is_opened(&self, handle: Handle, opened: &mut bool) -> Status;
    fn get_opened_attributes(
        &self,
        handle: Handle,
        dev_vid: &mut u16,
        dev_pid: &mut u16,
        dev_release: &mut u16,
    ) -> Status;
    fn get_part_number(&self, handle: Handle, part: &mut u8, version: &mut u8) -> Status;
    fn get_opened_string(
        &self,
        handle: Handle,
        buf: &mut [u8; DEVICE_STRING_LEN],
        option: u32,
    ) -> Status;

    fn set_uart_enable(&self, handle: Handle, enable: bool) -> Status;
    fn get_uart_enable(&self, handle: Handle, enabled: &mut bool) -> Status;
    fn flush_buffers(&self, handle: Handle, flush_tx: bool, flush_rx: bool) -> Status;
    fn cancel_io(&self, handle: Handle) -> Status;
    fn read(&self, handle: Handle, buf: &mut [u8], count: &mut u32) -> Status;
    fn write(&self, handle: Handle, data: &[u8], count: &mut u32) -> Status;
    fn set_timeouts(&self, handle: Handle, read_ms: u32, write_ms: u32) -> Status;
    fn get_timeouts(&self, handle: Handle, read_ms: &mut u32, write_ms: &mut u32) -> Status;
    fn set_uart_config(
        &self,
        handle: Handle,
        baud_rate: u32,
        data_bits: u8,
        parity: u8,
        stop_bits: u8,
        flow_control: u8,
    ) -> Status;
    fn get_uart_config(
        &self,
        handle: Handle,
        baud_rate: &mut u32,
        data_bits: &mut u8,
        parity: &mut u8,
        stop_bits: &mut u8,
        flow_control: &mut u8,
    ) -> Status;
    fn get_uart_status(
        &self,
        handle: Handle,
        tx_fifo: &mut u16,
        rx_fifo: &mut u16,
        line_errors: &mut u8,
        line_break: &mut u8,
    ) -> Status;
    fn start_break(&self, handle: Handle, duration_ms: u8) -> Status;
    fn stop_break(&self, handle: Handle) -> Status;
    fn reset(&self, handle: Handle) -> Status;
    fn read_latch(&self, handle: Handle, latch: &mut u16) -> Status;
    fn write_latch(&self, handle: Handle, latch: u16, mask: u16) -> Status;
}

/// Decodes a NUL-terminated device string out of the fixed C buffer.
pub(crate) fn decode_device_string(buf: &[u8; DEVICE_STRING_LEN]) -> Result<String> {
    let len = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
    let text = core::str::from_utf8(&buf[..len])?;
    Ok(text.to_owned())
}

/// The process-wide vendor library. [`load`](VendorLib::load) is the single
/// initialization point; afterwards the value is a free-to-copy handle onto
/// the loaded API.
#[derive(Clone, Copy)]
pub struct VendorLib {
    api: &'static ffi::Api,
}

impl VendorLib {
    /// Resolves and loads the platform artifact if this is the first call.
    /// A missing artifact fails here, not inside a later device call.
    pub fn load() -> Result<VendorLib> {
        Ok(VendorLib { api: ffi::api()? })
    }
}

impl HidUartApi for VendorLib {
    fn get_num_devices(&self, count: &mut u32, vid: u16, pid: u16) -> Status {
        Status::from_native(unsafe { (self.api.get_num_devices)(count, vid, pid) })
    }

    fn get_attributes(
        &self,
        index: u32,
        vid: u16,
        pid: u16,
        dev_vid: &mut u16,
        dev_pid: &mut u16,
        dev_release: &mut u16,
    ) -> Status {
        Status::from_native(unsafe {
            (self.api.get_attributes)(index, vid, pid, dev_vid, dev_pid, dev_release)
        })
    }

    fn get_string(
        &self,
        index: u32,
        vid: u16,
        pid: u16,
        buf: &mut [u8; DEVICE_STRING_LEN],
        option: u32,
    ) -> Status {
        Status::from_native(unsafe {
            (self.api.get_string)(index, vid, pid, buf.as_mut_ptr() as *mut c_char, option)
        })
    }

    fn get_library_version(&self, major: &mut u8, minor: &mut u8, release: &mut bool) -> Status {
        let mut raw_release: c_int = 0;
        let status = Status::from_native(unsafe {
            (self.api.get_library_version)(major, minor, &mut raw_release)
        });
        *release = raw_release != 0;
        status
    }

    fn get_hid_library_version(
        &self,
        major: &mut u8,
        minor: &mut u8,
        release: &mut bool,
    ) -> Status {
        let mut raw_release: c_int = 0;
        let status = Status::from_native(unsafe {
            (self.api.get_hid_library_version)(major, minor, &mut raw_release)
        });
        *release = raw_release != 0;
        status
    }

    fn open(&self, handle: &mut Handle, index: u32, vid: u16, pid: u16) -> Status {
        let mut raw: ffi::RawHandle = core::ptr::null_mut();
        let status =
            Status::from_native(unsafe { (self.api.open)(&mut raw, index, vid, pid) });
        *handle = Handle(raw as usize);
        status
    }

    fn close(&self, handle: Handle) -> Status {
        Status::from_native(unsafe { (self.api.close)(handle.raw()) })
    }

    fn is_opened(&self, handle: Handle, opened: &mut bool) -> Status {
        let mut raw: c_int = 0;
        let status = Status::from_native(unsafe { (self.api.is_opened)(handle.raw(), &mut raw) });
        *opened = raw != 0;
        status
    }

    fn get_opened_attributes(
        &self,
        handle: Handle,
        dev_vid: &mut u16,
        dev_pid: &mut u16,
        dev_release: &mut u16,
    ) -> Status {
        Status::from_native(unsafe {
            (self.api.get_opened_attributes)(handle.raw(), dev_vid, dev_pid, dev_release)
        })
    }

    fn get_part_number(&self, handle: Handle, part: &mut u8, version: &mut u8) -> Status {
        Status::from_native(unsafe { (self.api.get_part_number)(handle.raw(), part, version) })
    }

    fn get_opened_string(
        &self,
        handle: Handle,
        buf: &mut [u8; DEVICE_STRING_LEN],
        option: u32,
    ) -> Status {
        Status::from_native(unsafe {
            (self.api.get_opened_string)(handle.raw(), buf.as_mut_ptr() as *mut c_char, option)
        })
    }

    fn set_uart_enable(&self, handle: Handle, enable: bool) -> Status {
        Status::from_native(unsafe { (self.api.set_uart_enable)(handle.raw(), enable as c_int) })
    }

    fn get_uart_enable(&self, handle: Handle, enabled: &mut bool) -> Status {
        let mut raw: c_int = 0;
        let status =
            Status::from_native(unsafe { (self.api.get_uart_enable)(handle.raw(), &mut raw) });
        *enabled = raw != 0;
        status
    }

    fn flush_buffers(&self, handle: Handle, flush_tx: bool, flush_rx: bool) -> Status {
        Status::from_native(unsafe {
            (self.api.flush_buffers)(handle.raw(), flush_tx as c_int, flush_rx as c_int)
        })
    }

    fn cancel_io(&self, handle: Handle) -> Status {
        Status::from_native(unsafe { (self.api.cancel_io)(handle.raw()) })
    }

    fn read(&self, handle: Handle, buf: &mut [u8], count: &mut u32) -> Status {
        Status::from_native(unsafe {
            (self.api.read)(handle.raw(), buf.as_mut_ptr(), buf.len() as u32, count)
        })
    }

    fn write(&self, handle: Handle, data: &[u8], count: &mut u32) -> Status {
        Status::from_native(unsafe {
            (self.api.write)(handle.raw(), data.as_ptr(), data.len() as u32, count)
        })
    }

    fn set_timeouts(&self, handle: Handle, read_ms: u32, write_ms: u32) -> Status {
        Status::from_native(unsafe { (self.api.set_timeouts)(handle.raw(), read_ms, write_ms) })
    }

    fn get_timeouts(&self, handle: Handle, read_ms: &mut u32, write_ms: &mut u32) -> Status {
        Status::from_native(unsafe { (self.api.get_timeouts)(handle.raw(), read_ms, write_ms) })
    }

    fn set_uart_config(
        &self,
        handle: Handle,
        baud_rate: u32,
        data_bits: u8,
        parity: u8,
        stop_bits: u8,
        flow_control: u8,
    ) -> Status {
        Status::from_native(unsafe {
            (self.api.set_uart_config)(
                handle.raw(),
                baud_rate,
                data_bits,
                parity,
                stop_bits,
                flow_control,
            )
        })
    }

    fn get_uart_config(
        &self,
        handle: Handle,
        baud_rate: &mut u32,
        data_bits: &mut u8,
        parity: &mut u8,
        stop_bits: &mut u8,
        flow_control: &mut u8,
    ) -> Status {
        Status::from_native(unsafe {
            (self.api.get_uart_config)(
                handle.raw(),
                baud_rate,
                data_bits,
                parity,
                stop_bits,
                flow_control,
            )
        })
    }

    fn get_uart_status(
        &self,
        handle: Handle,
        tx_fifo: &mut u16,
        rx_fifo: &mut u16,
        line_errors: &mut u8,
        line_break: &mut u8,
    ) -> Status {
        Status::from_native(unsafe {
            (self.api.get_uart_status)(handle.raw(), tx_fifo, rx_fifo, line_errors, line_break)
        })
    }

    fn start_break(&self, handle: Handle, duration_ms: u8) -> Status {
        Status::from_native(unsafe { (self.api.start_break)(handle.raw(), duration_ms) })
    }

    fn stop_break(&self, handle: Handle) -> Status {
        Status::from_native(unsafe { (self.api.stop_break)(handle.raw()) })
    }

    fn reset(&self, handle: Handle) -> Status {
        Status::from_native(unsafe { (self.api.reset)(handle.raw()) })
    }

    fn read_latch(&self, handle: Handle, latch: &mut u16) -> Status {
        Status::from_native(unsafe { (self.api.read_latch)(handle.raw(), latch) })
    }

    fn write_latch(&self, handle: Handle, latch: u16, mask: u16) -> Status {
        Status::from_native(unsafe { (self.api.write_latch)(handle.raw(), latch, mask) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_string_stops_at_the_terminator() {
        let mut buf = [0u8; DEVICE_STRING_LEN];
        buf[..5].copy_from_slice(b"CP211");
        assert_eq!(decode_device_string(&buf).unwrap(), "CP211");
    }

    #[test]
    fn unterminated_device_string_uses_the_whole_buffer() {
        let buf = [b'x'; DEVICE_STRING_LEN];
        assert_eq!(decode_device_string(&buf).unwrap().len(), DEVICE_STRING_LEN);
    }

    #[test]
    fn invalid_utf8_is_rejected() {
        let mut buf = [0u8; DEVICE_STRING_LEN];
        buf[0] = 0xFF;
        buf[1] = 0xFE;
        assert!(matches!(
            decode_device_string(&buf),
            Err(crate::Error::InvalidString(_))
        ));
    }
}
