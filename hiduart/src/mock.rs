//! In-memory stand-in for the vendor library.
//!
//! [`MockChip`] implements [`HidUartApi`] over a table of simulated devices,
//! so device logic and the demo flows can be exercised without the vendor
//! artifact or any attached hardware. Clones share state: hand one clone to
//! [`HidUart`](crate::HidUart) and keep another for seeding and assertions.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::api::{Handle, HidUartApi, DEVICE_STRING_LEN};
use crate::error::Status;

/// One simulated CP211x bridge attached to the mock host.
#[derive(Debug, Clone)]
pub struct MockDevice {
    pub vid: u16,
    pub pid: u16,
    pub release: u16,
    pub serial: String,
    pub manufacturer: String,
    pub product: String,
    pub path: String,
    pub latch: u16,
    pub uart_enabled: bool,
    pub baud_rate: u32,
    pub data_bits: u8,
    pub parity: u8,
    pub stop_bits: u8,
    pub flow_control: u8,
    pub read_timeout_ms: u32,
    pub write_timeout_ms: u32,
    pub tx_fifo: u16,
    pub rx_fifo: u16,
    pub line_errors: u8,
    pub line_break: u8,
    /// Simulates the device being held open by another process: attribute
    /// probes and opens fail with `DEVICE_ACCESS_ERROR`.
    pub locked: bool,
}

impl Default for MockDevice {
    fn default() -> MockDevice {
        MockDevice {
            vid: crate::VID,
            pid: crate::PID,
            release: 0x0100,
            serial: "0001".into(),
            manufacturer: "Silicon Laboratories".into(),
            product: "CP2110 HID UART Bridge".into(),
            path: "mock/0".into(),
            latch: 0x0000,
            uart_enabled: false,
            baud_rate: 115_200,
            data_bits: 0x03,
            parity: 0x00,
            stop_bits: 0x00,
            flow_control: 0x00,
            read_timeout_ms: 1000,
            write_timeout_ms: 1000,
            tx_fifo: 0,
            rx_fifo: 0,
            line_errors: 0,
            line_break: 0,
            locked: false,
        }
    }
}

#[derive(Debug, Default)]
struct MockState {
    devices: Vec<MockDevice>,
    /// Live sessions, keyed by the nonzero handle value given out at open.
    sessions: HashMap<usize, usize>,
    last_handle: usize,
    /// Bytes the simulated peer has sent, consumed by `read`.
    rx: Vec<u8>,
    /// Bytes captured from `write`.
    tx: Vec<u8>,
    /// Cap on bytes accepted per `write` call; the remainder "times out".
    write_limit: Option<usize>,
    /// One-shot status injected into the next call.
    fail_next: Option<Status>,
    library_version: (u8, u8, bool),
    hid_library_version: (u8, u8, bool),
}

/// The simulated native layer.
#[derive(Debug, Clone, Default)]
pub struct MockChip {
    state: Rc<RefCell<MockState>>,
}

impl MockChip {
    pub fn new() -> MockChip {
        let chip = MockChip::default();
        {
            let mut state = chip.state.borrow_mut();
            state.library_version = (6, 7, true);
            state.hid_library_version = (1, 0, true);
        }
        chip
    }

    /// Attaches a device and returns its slot index.
    pub fn attach(&self, device: MockDevice) -> usize {
        let mut state = self.state.borrow_mut();
        state.devices.push(device);
        state.devices.len() - 1
    }

    pub fn latch(&self, slot: usize) -> u16 {
        self.state.borrow().devices[slot].latch
    }

    pub fn set_latch(&self, slot: usize, value: u16) {
        self.state.borrow_mut().devices[slot].latch = value;
    }

    pub fn lock(&self, slot: usize, locked: bool) {
        self.state.borrow_mut().devices[slot].locked = locked;
    }

    /// Queues bytes for subsequent `read` calls.
    pub fn queue_rx(&self, bytes: &[u8]) {
        self.state.borrow_mut().rx.extend_from_slice(bytes);
    }

    /// Everything written so far.
    pub fn written(&self) -> Vec<u8> {
        self.state.borrow().tx.clone()
    }

    /// Caps how many bytes each `write` accepts before reporting a timeout.
    pub fn limit_writes(&self, max: usize) {
        self.state.borrow_mut().write_limit = Some(max);
    }

    /// Forces the next call to return `status` without touching any state.
    pub fn fail_next(&self, status: Status) {
        self.state.borrow_mut().fail_next = Some(status);
    }

    pub fn open_sessions(&self) -> usize {
        self.state.borrow().sessions.len()
    }

    fn forced(&self) -> Option<Status> {
        self.state.borrow_mut().fail_next.take()
    }
}

fn nth_matching(state: &MockState, index: u32, vid: u16, pid: u16) -> Option<usize> {
    state
        .devices
        .iter()
        .enumerate()
        .filter(|(_, d)| d.vid == vid && d.pid == pid)
        .map(|(slot, _)| slot)
        .nth(index as usize)
}

fn session_slot(state: &MockState, handle: Handle) -> Option<usize> {
    state.sessions.get(&handle.0).copied()
}

fn fill_string(buf: &mut [u8; DEVICE_STRING_LEN], text: &str) {
    let len = text.len().min(DEVICE_STRING_LEN - 1);
    buf[..len].copy_from_slice(&text.as_bytes()[..len]);
    buf[len] = 0;
}

fn string_for(device: &MockDevice, option: u32) -> Option<String> {
    match option {
        0x01 => Some(format!("{:04X}", device.vid)),
        0x02 => Some(format!("{:04X}", device.pid)),
        0x03 => Some(device.path.clone()),
        0x04 => Some(device.serial.clone()),
        0x05 => Some(device.manufacturer.clone()),
        0x06 => Some(device.product.clone()),
        _ => None,
    }
}

impl HidUartApi for MockChip {
    fn get_num_devices(&self, count: &mut u32, vid: u16, pid: u16) -> Status {
        if let Some(status) = self.forced() {
            return status;
        }
        let state = self.state.borrow();
        *count = state
            .devices
            .iter()
            .filter(|d| d.vid == vid && d.pid == pid)
            .count() as u32;
        Status::SUCCESS
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
        if let Some(status) = self.forced() {
            return status;
        }
        let state = self.state.borrow();
        let slot = match nth_matching(&state, index, vid, pid) {
            Some(slot) => slot,
            None => return Status::DEVICE_NOT_FOUND,
        };
        let device = &state.devices[slot];
        if device.locked {
            return Status::DEVICE_ACCESS_ERROR;
        }
        *dev_vid = device.vid;
        *dev_pid = device.pid;
        *dev_release = device.release;
        Status::SUCCESS
    }

    fn get_string(
        &self,
        index: u32,
        vid: u16,
        pid: u16,
        buf: &mut [u8; DEVICE_STRING_LEN],
        option: u32,
    ) -> Status {
        if let Some(status) = self.forced() {
            return status;
        }
        let state = self.state.borrow();
        let slot = match nth_matching(&state, index, vid, pid) {
            Some(slot) => slot,
            None => return Status::DEVICE_NOT_FOUND,
        };
        match string_for(&state.devices[slot], option) {
            Some(text) => {
                fill_string(buf, &text);
                Status::SUCCESS
            }
            None => Status::INVALID_PARAMETER,
        }
    }

    fn get_library_version(&self, major: &mut u8, minor: &mut u8, release: &mut bool) -> Status {
        if let Some(status) = self.forced() {
            return status;
        }
        let (maj, min, rel) = self.state.borrow().library_version;
        *major = maj;
        *minor = min;
        *release = rel;
        Status::SUCCESS
    }

    fn get_hid_library_version(
        &self,
        major: &mut u8,
        minor: &mut u8,
        release: &mut bool,
    ) -> Status {
        if let Some(status) = self.forced() {
            return status;
        }
        let (maj, min, rel) = self.state.borrow().hid_library_version;
        *major = maj;
        *minor = min;
        *release = rel;
        Status::SUCCESS
    }

    fn open(&self, handle: &mut Handle, index: u32, vid: u16, pid: u16) -> Status {
        if let Some(status) = self.forced() {
            return status;
        }
        let mut state = self.state.borrow_mut();
        let slot = match nth_matching(&state, index, vid, pid) {
            Some(slot) => slot,
            None => return Status::DEVICE_NOT_FOUND,
        };
        if state.devices[slot].locked {
            return Status::DEVICE_ACCESS_ERROR;
        }
        state.last_handle += 1;
        let value = state.last_handle;
        state.sessions.insert(value, slot);
        *handle = Handle(value);
        Status::SUCCESS
    }

    fn close(&self, handle: Handle) -> Status {
        if let Some(status) = self.forced() {
            return status;
        }
        match self.state.borrow_mut().sessions.remove(&handle.0) {
            Some(_) => Status::SUCCESS,
            None => Status::INVALID_HANDLE,
        }
    }

    fn is_opened(&self, handle: Handle, opened: &mut bool) -> Status {
        if let Some(status) = self.forced() {
            return status;
        }
        *opened = self.state.borrow().sessions.contains_key(&handle.0);
        Status::SUCCESS
    }

    fn get_opened_attributes(
        &self,
        handle: Handle,
        dev_vid: &mut u16,
        dev_pid: &mut u16,
        dev_release: &mut u16,
    ) -> Status {
        if let Some(status) = self.forced() {
            return status;
        }
        let state = self.state.borrow();
        match session_slot(&state, handle) {
            Some(slot) => {
                let device = &state.devices[slot];
                *dev_vid = device.vid;
                *dev_pid = device.pid;
                *dev_release = device.release;
                Status::SUCCESS
            }
            None => Status::INVALID_HANDLE,
        }
    }

    fn get_part_number(&self, handle: Handle, part: &mut u8, version: &mut u8) -> Status {
        if let Some(status) = self.forced() {
            return status;
        }
        let state = self.state.borrow();
        match session_slot(&state, handle) {
            Some(_) => {
                // CP2110, firmware 1.
                *part = 0x0A;
                *version = 0x01;
                Status::SUCCESS
            }
            None => Status::INVALID_HANDLE,
        }
    }

    fn get_opened_string(
        &self,
        handle: Handle,
        buf: &mut [u8; DEVICE_STRING_LEN],
        option: u32,
    ) -> Status {
        if let Some(status) = self.forced() {
            return status;
        }
        let state = self.state.borrow();
        let slot = match session_slot(&state, handle) {
            Some(slot) => slot,
            None => return Status::INVALID_HANDLE,
        };
        match string_for(&state.devices[slot], option) {
            Some(text) => {
                fill_string(buf, &text);
                Status::SUCCESS
            }
            None => Status::INVALID_PARAMETER,
        }
    }

    fn set_uart_enable(&self, handle: Handle, enable: bool) -> Status {
        if let Some(status) = self.forced() {
            return status;
        }
        let mut state = self.state.borrow_mut();
        match session_slot(&state, handle) {
            Some(slot) => {
                state.devices[slot].uart_enabled = enable;
                Status::SUCCESS
            }
            None => Status::INVALID_HANDLE,
        }
    }

    fn get_uart_enable(&self, handle: Handle, enabled: &mut bool) -> Status {
        if let Some(status) = self.forced() {
            return status;
        }
        let state = self.state.borrow();
        match session_slot(&state, handle) {
            Some(slot) => {
                *enabled = state.devices[slot].uart_enabled;
                Status::SUCCESS
            }
            None => Status::INVALID_HANDLE,
        }
    }

    fn flush_buffers(&self, handle: Handle, flush_tx: bool, flush_rx: bool) -> Status {
        if let Some(status) = self.forced() {
            return status;
        }
        let mut state = self.state.borrow_mut();
        if session_slot(&state, handle).is_none() {
            return Status::INVALID_HANDLE;
        }
        if flush_tx {
            state.tx.clear();
        }
        if flush_rx {
            state.rx.clear();
        }
        Status::SUCCESS
    }

    fn cancel_io(&self, handle: Handle) -> Status {
        if let Some(status) = self.forced() {
            return status;
        }
        let state = self.state.borrow();
        match session_slot(&state, handle) {
            Some(_) => Status::SUCCESS,
            None => Status::INVALID_HANDLE,
        }
    }

    fn read(&self, handle: Handle, buf: &mut [u8], count: &mut u32) -> Status {
        if let Some(status) = self.forced() {
            return status;
        }
        let mut state = self.state.borrow_mut();
        if session_slot(&state, handle).is_none() {
            return Status::INVALID_HANDLE;
        }
        let n = buf.len().min(state.rx.len());
        buf[..n].copy_from_slice(&state.rx[..n]);
        state.rx.drain(..n);
        *count = n as u32;
        if n < buf.len() {
            // Too few bytes arrived before the deadline.
            Status::READ_TIMED_OUT
        } else {
            Status::SUCCESS
        }
    }

    fn write(&self, handle: Handle, data: &[u8], count: &mut u32) -> Status {
        if let Some(status) = self.forced() {
            return status;
        }
        let mut state = self.state.borrow_mut();
        if session_slot(&state, handle).is_none() {
            return Status::INVALID_HANDLE;
        }
        let n = match state.write_limit {
            Some(limit) => data.len().min(limit),
            None => data.len(),
        };
        state.tx.extend_from_slice(&data[..n]);
        *count = n as u32;
        if n < data.len() {
            Status::WRITE_TIMED_OUT
        } else {
            Status::SUCCESS
        }
    }

    fn set_timeouts(&self, handle: Handle, read_ms: u32, write_ms: u32) -> Status {
        if let Some(status) = self.forced() {
            return status;
        }
        let mut state = self.state.borrow_mut();
        match session_slot(&state, handle) {
            Some(slot) => {
                state.devices[slot].read_timeout_ms = read_ms;
                state.devices[slot].write_timeout_ms = write_ms;
                Status::SUCCESS
            }
            None => Status::INVALID_HANDLE,
        }
    }

    fn get_timeouts(&self, handle: Handle, read_ms: &mut u32, write_ms: &mut u32) -> Status {
        if let Some(status) = self.forced() {
            return status;
        }
        let state = self.state.borrow();
        match session_slot(&state, handle) {
            Some(slot) => {
                *read_ms = state.devices[slot].read_timeout_ms;
                *write_ms = state.devices[slot].write_timeout_ms;
                Status::SUCCESS
            }
            None => Status::INVALID_HANDLE,
        }
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
        if let Some(status) = self.forced() {
            return status;
        }
        let mut state = self.state.borrow_mut();
        match session_slot(&state, handle) {
            Some(slot) => {
                let device = &mut state.devices[slot];
                device.baud_rate = baud_rate;
                device.data_bits = data_bits;
                device.parity = parity;
                device.stop_bits = stop_bits;
                device.flow_control = flow_control;
                Status::SUCCESS
            }
            None => Status::INVALID_HANDLE,
        }
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
        if let Some(status) = self.forced() {
            return status;
        }
        let state = self.state.borrow();
        match session_slot(&state, handle) {
            Some(slot) => {
                let device = &state.devices[slot];
                *baud_rate = device.baud_rate;
                *data_bits = device.data_bits;
                *parity = device.parity;
                *stop_bits = device.stop_bits;
                *flow_control = device.flow_control;
                Status::SUCCESS
            }
            None => Status::INVALID_HANDLE,
        }
    }

    fn get_uart_status(
        &self,
        handle: Handle,
        tx_fifo: &mut u16,
        rx_fifo: &mut u16,
        line_errors: &mut u8,
        line_break: &mut u8,
    ) -> Status {
        if let Some(status) = self.forced() {
            return status;
        }
        let state = self.state.borrow();
        match session_slot(&state, handle) {
            Some(slot) => {
                let device = &state.devices[slot];
                *tx_fifo = device.tx_fifo;
                *rx_fifo = device.rx_fifo;
                *line_errors = device.line_errors;
                *line_break = device.line_break;
                Status::SUCCESS
            }
            None => Status::INVALID_HANDLE,
        }
    }

    fn start_break(&self, handle: Handle, _duration_ms: u8) -> Status {
        if let Some(status) = self.forced() {
            return status;
        }
        let mut state = self.state.borrow_mut();
        match session_slot(&state, handle) {
            Some(slot) => {
                state.devices[slot].line_break = 0x01;
                Status::SUCCESS
            }
            None => Status::INVALID_HANDLE,
        }
    }

    fn stop_break(&self, handle: Handle) -> Status {
        if let Some(status) = self.forced() {
            return status;
        }
        let mut state = self.state.borrow_mut();
        match session_slot(&state, handle) {
            Some(slot) => {
                state.devices[slot].line_break = 0x00;
                Status::SUCCESS
            }
            None => Status::INVALID_HANDLE,
        }
    }

    fn reset(&self, handle: Handle) -> Status {
        if let Some(status) = self.forced() {
            return status;
        }
        // The device drops off the bus; its session dies with it.
        match self.state.borrow_mut().sessions.remove(&handle.0) {
            Some(_) => Status::SUCCESS,
            None => Status::INVALID_HANDLE,
        }
    }

    fn read_latch(&self, handle: Handle, latch: &mut u16) -> Status {
        if let Some(status) = self.forced() {
            return status;
        }
        let state = self.state.borrow();
        match session_slot(&state, handle) {
            Some(slot) => {
                *latch = state.devices[slot].latch;
                Status::SUCCESS
            }
            None => Status::INVALID_HANDLE,
        }
    }

    fn write_latch(&self, handle: Handle, latch: u16, mask: u16) -> Status {
        if let Some(status) = self.forced() {
            return status;
        }
        let mut state = self.state.borrow_mut();
        match session_slot(&state, handle) {
            Some(slot) => {
                let device = &mut state.devices[slot];
                device.latch = (device.latch & !mask) | (latch & mask);
                Status::SUCCESS
            }
            None => Status::INVALID_HANDLE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_masked_bits_change() {
        let chip = MockChip::new();
        let slot = chip.attach(MockDevice {
            latch: 0b1010_1010,
            ..MockDevice::default()
        });

        let mut handle = Handle::CLOSED;
        assert_eq!(
            chip.open(&mut handle, 0, crate::VID, crate::PID),
            Status::SUCCESS
        );
        assert_eq!(chip.write_latch(handle, 0b0101, 0b0011), Status::SUCCESS);
        assert_eq!(chip.latch(slot), 0b1010_1001);
    }

    #[test]
    fn forced_status_is_one_shot() {
        let chip = MockChip::new();
        chip.attach(MockDevice::default());
        chip.fail_next(Status::DEVICE_IO_FAILED);

        let mut count = 0;
        assert_eq!(
            chip.get_num_devices(&mut count, crate::VID, crate::PID),
            Status::DEVICE_IO_FAILED
        );
        assert_eq!(
            chip.get_num_devices(&mut count, crate::VID, crate::PID),
            Status::SUCCESS
        );
        assert_eq!(count, 1);
    }

    #[test]
    fn vid_pid_filter_applies() {
        let chip = MockChip::new();
        chip.attach(MockDevice::default());
        chip.attach(MockDevice {
            vid: 0x1234,
            pid: 0x5678,
            ..MockDevice::default()
        });

        let mut count = 0;
        chip.get_num_devices(&mut count, crate::VID, crate::PID);
        assert_eq!(count, 1);
        chip.get_num_devices(&mut count, 0x1234, 0x5678);
        assert_eq!(count, 1);
        chip.get_num_devices(&mut count, 0x1234, 0x0000);
        assert_eq!(count, 0);
    }
}
