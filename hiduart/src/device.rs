//! The `HidUart` handle object: one opened CP211x session.

use std::time::Duration;

use crate::api::{decode_device_string, Handle, HidUartApi, DEVICE_STRING_LEN};
use crate::config::{
    Attributes, DataBits, FlowControl, Parity, PartNumber, StopBits, StringOption, UartConfig,
    UartStatus,
};
use crate::error::{Error, Result, Status};

/// Outcome of a bounded read or write. A timeout is a normal result, not an
/// error: it reports however many bytes moved before the deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transfer {
    /// The full requested amount was transferred.
    Complete(usize),
    /// The configured timeout expired first; the count may be zero.
    TimedOut(usize),
}

impl Transfer {
    pub fn bytes(self) -> usize {
        match self {
            Transfer::Complete(n) | Transfer::TimedOut(n) => n,
        }
    }

    pub fn timed_out(self) -> bool {
        matches!(self, Transfer::TimedOut(_))
    }
}

/// One CP211x device session over a [`HidUartApi`] implementation.
///
/// The wrapper is a two-state machine: `Closed` (fresh, after [`close`], or
/// after [`reset`]) and `Open`. Calling an open-only operation while closed
/// fails with `HID_UART_INVALID_HANDLE` before anything reaches the native
/// layer, so a released handle can never be used.
///
/// [`close`]: HidUart::close
/// [`reset`]: HidUart::reset
pub struct HidUart<A: HidUartApi> {
    api: A,
    handle: Handle,
}

impl<A: HidUartApi> HidUart<A> {
    /// A closed device object. Nothing touches the hardware until `open`.
    pub fn new(api: A) -> HidUart<A> {
        HidUart {
            api,
            handle: Handle::CLOSED,
        }
    }

    fn opened(&self) -> Result<Handle> {
        if self.handle.is_open() {
            Ok(self.handle)
        } else {
            Err(Error::Api(Status::INVALID_HANDLE))
        }
    }

    /// Opens the `index`th device matching `vid`/`pid`.
    ///
    /// The vendor requires an enumeration pass before each open, so the
    /// device count is re-queried first. An index at or past the count
    /// fails with `HID_UART_DEVICE_NOT_FOUND`.
    pub fn open(&mut self, index: u32, vid: u16, pid: u16) -> Result<()> {
        self.close()?;

        let mut count = 0;
        self.api.get_num_devices(&mut count, vid, pid).check()?;

        let mut handle = Handle::CLOSED;
        self.api.open(&mut handle, index, vid, pid).check()?;
        self.handle = handle;
        log::debug!("opened device {} ({:04x}:{:04x})", index, vid, pid);
        Ok(())
    }

    /// Releases the native handle. Idempotent: closing an already-closed
    /// device is a no-op.
    pub fn close(&mut self) -> Result<()> {
        if self.handle.is_open() {
            let status = self.api.close(self.handle);
            // The handle is dead from here on, whatever close reported.
            self.handle = Handle::CLOSED;
            status.check()?;
            log::debug!("device closed");
        }
        Ok(())
    }

    /// Asks the native layer whether this exact handle counts as open.
    pub fn is_opened(&self) -> Result<bool> {
        if !self.handle.is_open() {
            return Ok(false);
        }
        let mut opened = false;
        self.api.is_opened(self.handle, &mut opened).check()?;
        Ok(opened)
    }

    pub fn attributes(&self) -> Result<Attributes> {
        let handle = self.opened()?;
        let (mut vid, mut pid, mut release) = (0, 0, 0);
        self.api
            .get_opened_attributes(handle, &mut vid, &mut pid, &mut release)
            .check()?;
        Ok(Attributes { vid, pid, release })
    }

    pub fn part_number(&self) -> Result<PartNumber> {
        let handle = self.opened()?;
        let (mut part, mut version) = (0, 0);
        self.api
            .get_part_number(handle, &mut part, &mut version)
            .check()?;
        Ok(PartNumber { part, version })
    }

    /// Reads one of the device descriptor strings.
    pub fn device_string(&self, option: StringOption) -> Result<String> {
        let handle = self.opened()?;
        let mut buf = [0u8; DEVICE_STRING_LEN];
        self.api
            .get_opened_string(handle, &mut buf, option as u32)
            .check()?;
        decode_device_string(&buf)
    }

    /// Enables or disables the UART side of the bridge.
    pub fn set_uart_enable(&mut self, enable: bool) -> Result<()> {
        let handle = self.opened()?;
        self.api.set_uart_enable(handle, enable).check()
    }

    pub fn uart_enable(&self) -> Result<bool> {
        let handle = self.opened()?;
        let mut enabled = false;
        self.api.get_uart_enable(handle, &mut enabled).check()?;
        Ok(enabled)
    }

    /// Discards buffered bytes in the selected directions.
    pub fn flush_buffers(&mut self, flush_tx: bool, flush_rx: bool) -> Result<()> {
        let handle = self.opened()?;
        self.api.flush_buffers(handle, flush_tx, flush_rx).check()
    }

    /// Aborts any in-flight read or write on this handle.
    pub fn cancel_io(&mut self) -> Result<()> {
        let handle = self.opened()?;
        self.api.cancel_io(handle).check()
    }

    /// Reads up to `buf.len()` bytes, blocking at most the configured read
    /// timeout. A timeout is reported as [`Transfer::TimedOut`] with the
    /// partial count; every other non-success status is an error.
    pub fn read(&mut self, buf: &mut [u8]) -> Result<Transfer> {
        let handle = self.opened()?;
        let mut count = 0;
        match self.api.read(handle, buf, &mut count) {
            Status::SUCCESS => Ok(Transfer::Complete(count as usize)),
            Status::READ_TIMED_OUT => Ok(Transfer::TimedOut(count as usize)),
            status => Err(Error::Api(status)),
        }
    }

    /// Writes `data`, blocking at most the configured write timeout. Same
    /// timeout contract as [`read`](HidUart::read).
    pub fn write(&mut self, data: &[u8]) -> Result<Transfer> {
        let handle = self.opened()?;
        let mut count = 0;
        match self.api.write(handle, data, &mut count) {
            Status::SUCCESS => Ok(Transfer::Complete(count as usize)),
            Status::WRITE_TIMED_OUT => Ok(Transfer::TimedOut(count as usize)),
            status => Err(Error::Api(status)),
        }
    }

    /// Sets the per-handle timeouts applied to subsequent reads and writes.
    /// Durations are truncated to whole milliseconds.
    pub fn set_timeouts(&mut self, read: Duration, write: Duration) -> Result<()> {
        let handle = self.opened()?;
        self.api
            .set_timeouts(handle, read.as_millis() as u32, write.as_millis() as u32)
            .check()
    }

    pub fn timeouts(&self) -> Result<(Duration, Duration)> {
        let handle = self.opened()?;
        let (mut read_ms, mut write_ms) = (0, 0);
        self.api
            .get_timeouts(handle, &mut read_ms, &mut write_ms)
            .check()?;
        Ok((
            Duration::from_millis(read_ms.into()),
            Duration::from_millis(write_ms.into()),
        ))
    }

    pub fn set_uart_config(&mut self, config: &UartConfig) -> Result<()> {
        let handle = self.opened()?;
        self.api
            .set_uart_config(
                handle,
                config.baud_rate,
                config.data_bits as u8,
                config.parity as u8,
                config.stop_bits as u8,
                config.flow_control as u8,
            )
            .check()
    }

    pub fn uart_config(&self) -> Result<UartConfig> {
        let handle = self.opened()?;
        let mut baud_rate = 0;
        let (mut data_bits, mut parity, mut stop_bits, mut flow_control) = (0, 0, 0, 0);
        self.api
            .get_uart_config(
                handle,
                &mut baud_rate,
                &mut data_bits,
                &mut parity,
                &mut stop_bits,
                &mut flow_control,
            )
            .check()?;
        Ok(UartConfig {
            baud_rate,
            data_bits: DataBits::from_raw(data_bits)?,
            parity: Parity::from_raw(parity)?,
            stop_bits: StopBits::from_raw(stop_bits)?,
            flow_control: FlowControl::from_raw(flow_control)?,
        })
    }

    pub fn uart_status(&self) -> Result<UartStatus> {
        let handle = self.opened()?;
        let (mut tx_fifo, mut rx_fifo) = (0, 0);
        let (mut line_errors, mut line_break) = (0, 0);
        self.api
            .get_uart_status(
                handle,
                &mut tx_fifo,
                &mut rx_fifo,
                &mut line_errors,
                &mut line_break,
            )
            .check()?;
        Ok(UartStatus {
            tx_fifo,
            rx_fifo,
            line_errors,
            line_break,
        })
    }

    /// Asserts a line break for `duration_ms` milliseconds; 0 holds the
    /// break until [`stop_break`](HidUart::stop_break).
    pub fn start_break(&mut self, duration_ms: u8) -> Result<()> {
        let handle = self.opened()?;
        self.api.start_break(handle, duration_ms).check()
    }

    pub fn stop_break(&mut self) -> Result<()> {
        let handle = self.opened()?;
        self.api.stop_break(handle).check()
    }

    /// Resets the device. The handle is closed and zeroed whether or not
    /// the reset itself succeeded; a reset failure is still reported.
    pub fn reset(&mut self) -> Result<()> {
        let handle = self.opened()?;
        let status = self.api.reset(handle);
        let _ = self.api.close(handle);
        self.handle = Handle::CLOSED;
        log::debug!("device reset, handle released");
        status.check()
    }

    /// Current GPIO latch value, one bit per pin.
    pub fn read_latch(&self) -> Result<u16> {
        let handle = self.opened()?;
        let mut latch = 0;
        self.api.read_latch(handle, &mut latch).check()?;
        Ok(latch)
    }

    /// Drives the masked GPIO bits to the corresponding bits of `value`;
    /// unmasked pins keep their current state.
    pub fn write_latch(&mut self, value: u16, mask: u16) -> Result<()> {
        let handle = self.opened()?;
        self.api.write_latch(handle, value, mask).check()
    }
}

impl<A: HidUartApi> Drop for HidUart<A> {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockChip, MockDevice};
    use crate::{PID, VID};

    fn chip_with_device() -> (MockChip, usize) {
        let chip = MockChip::new();
        let slot = chip.attach(MockDevice::default());
        (chip, slot)
    }

    fn opened_device(chip: &MockChip) -> HidUart<MockChip> {
        let mut dev = HidUart::new(chip.clone());
        dev.open(0, VID, PID).unwrap();
        dev
    }

    #[test]
    fn open_past_last_index_is_device_not_found() {
        let (chip, _) = chip_with_device();
        let mut dev = HidUart::new(chip);

        let err = dev.open(1, VID, PID).unwrap_err();
        assert_eq!(err.status(), Some(Status::DEVICE_NOT_FOUND));
        assert!(!dev.is_opened().unwrap());
    }

    #[test]
    fn open_valid_index_reports_opened() {
        let (chip, _) = chip_with_device();
        let dev = opened_device(&chip);

        assert!(dev.is_opened().unwrap());
        let attrs = dev.attributes().unwrap();
        assert_eq!((attrs.vid, attrs.pid), (VID, PID));
    }

    #[test]
    fn close_is_idempotent() {
        let (chip, _) = chip_with_device();
        let mut dev = opened_device(&chip);

        dev.close().unwrap();
        dev.close().unwrap();
        assert!(!dev.is_opened().unwrap());
        assert_eq!(chip.open_sessions(), 0);
    }

    #[test]
    fn reset_leaves_the_handle_closed() {
        let (chip, _) = chip_with_device();
        let mut dev = opened_device(&chip);

        dev.reset().unwrap();
        assert!(!dev.is_opened().unwrap());
        // Close after reset must also be a no-op.
        dev.close().unwrap();
    }

    #[test]
    fn drop_releases_the_session() {
        let (chip, _) = chip_with_device();
        {
            let _dev = opened_device(&chip);
            assert_eq!(chip.open_sessions(), 1);
        }
        assert_eq!(chip.open_sessions(), 0);
    }

    #[test]
    fn closed_handle_is_guarded_without_a_native_call() {
        let (chip, _) = chip_with_device();
        // Would poison the next native call if one were made.
        chip.fail_next(Status::DEVICE_IO_FAILED);
        let mut dev = HidUart::new(chip.clone());

        let err = dev.read_latch().unwrap_err();
        assert_eq!(err.status(), Some(Status::INVALID_HANDLE));
        let err = dev.write_latch(0, 0xFFFF).unwrap_err();
        assert_eq!(err.status(), Some(Status::INVALID_HANDLE));
        let err = dev.attributes().unwrap_err();
        assert_eq!(err.status(), Some(Status::INVALID_HANDLE));

        // The forced failure is still pending: no call went through.
        let mut count = 0;
        assert_eq!(
            chip.get_num_devices(&mut count, VID, PID),
            Status::DEVICE_IO_FAILED
        );
    }

    #[test]
    fn write_latch_touches_only_masked_bits() {
        let (chip, slot) = chip_with_device();
        chip.set_latch(slot, 0x00FF);
        let mut dev = opened_device(&chip);

        // Clear bit 2 only.
        dev.write_latch(0, 0x0004).unwrap();
        assert_eq!(dev.read_latch().unwrap(), 0x00FB);

        // Set it back; nothing else moves.
        dev.write_latch(0x0004, 0x0004).unwrap();
        assert_eq!(dev.read_latch().unwrap(), 0x00FF);
    }

    #[test]
    fn read_timeout_is_a_soft_outcome() {
        let (chip, _) = chip_with_device();
        chip.queue_rx(b"abc");
        let mut dev = opened_device(&chip);

        let mut buf = [0u8; 8];
        let transfer = dev.read(&mut buf).unwrap();
        assert_eq!(transfer, Transfer::TimedOut(3));
        assert_eq!(&buf[..transfer.bytes()], b"abc");

        // Nothing left: timeout with zero bytes, still not an error.
        let transfer = dev.read(&mut buf).unwrap();
        assert_eq!(transfer, Transfer::TimedOut(0));
    }

    #[test]
    fn full_read_completes() {
        let (chip, _) = chip_with_device();
        chip.queue_rx(b"abcdef");
        let mut dev = opened_device(&chip);

        let mut buf = [0u8; 4];
        assert_eq!(dev.read(&mut buf).unwrap(), Transfer::Complete(4));
        assert_eq!(&buf, b"abcd");
    }

    #[test]
    fn write_timeout_reports_partial_count() {
        let (chip, _) = chip_with_device();
        chip.limit_writes(2);
        let mut dev = opened_device(&chip);

        let transfer = dev.write(b"hello").unwrap();
        assert_eq!(transfer, Transfer::TimedOut(2));
        assert!(transfer.timed_out());
        assert_eq!(chip.written(), b"he");
    }

    #[test]
    fn hard_read_failure_raises() {
        let (chip, _) = chip_with_device();
        let mut dev = opened_device(&chip);

        chip.fail_next(Status::DEVICE_IO_FAILED);
        let mut buf = [0u8; 4];
        let err = dev.read(&mut buf).unwrap_err();
        assert_eq!(err.status(), Some(Status::DEVICE_IO_FAILED));
    }

    #[test]
    fn uart_config_round_trips() {
        let (chip, _) = chip_with_device();
        let mut dev = opened_device(&chip);

        let config = UartConfig {
            baud_rate: 9600,
            data_bits: DataBits::Seven,
            parity: Parity::Even,
            stop_bits: StopBits::Long,
            flow_control: FlowControl::RtsCts,
        };
        dev.set_uart_config(&config).unwrap();
        assert_eq!(dev.uart_config().unwrap(), config);
    }

    #[test]
    fn timeouts_round_trip() {
        let (chip, _) = chip_with_device();
        let mut dev = opened_device(&chip);

        dev.set_timeouts(Duration::from_millis(250), Duration::from_secs(1))
            .unwrap();
        assert_eq!(
            dev.timeouts().unwrap(),
            (Duration::from_millis(250), Duration::from_millis(1000))
        );
    }

    #[test]
    fn uart_enable_round_trips() {
        let (chip, _) = chip_with_device();
        let mut dev = opened_device(&chip);

        assert!(!dev.uart_enable().unwrap());
        dev.set_uart_enable(true).unwrap();
        assert!(dev.uart_enable().unwrap());
    }

    #[test]
    fn break_state_shows_in_uart_status() {
        let (chip, _) = chip_with_device();
        let mut dev = opened_device(&chip);

        dev.start_break(0).unwrap();
        assert_eq!(dev.uart_status().unwrap().line_break, 0x01);
        dev.stop_break().unwrap();
        assert_eq!(dev.uart_status().unwrap().line_break, 0x00);
    }

    #[test]
    fn device_strings_decode() {
        let (chip, _) = chip_with_device();
        let dev = opened_device(&chip);

        assert_eq!(dev.device_string(StringOption::SerialNumber).unwrap(), "0001");
        assert_eq!(
            dev.device_string(StringOption::Product).unwrap(),
            "CP2110 HID UART Bridge"
        );
    }

    #[test]
    fn reopen_replaces_the_old_session() {
        let (chip, _) = chip_with_device();
        let mut dev = opened_device(&chip);

        dev.open(0, VID, PID).unwrap();
        assert_eq!(chip.open_sessions(), 1);
    }
}
