//! Raw binding to the vendor `SLABHIDtoUART` dynamic library.
//!
//! Everything pointer-shaped stays inside this module: the rest of the crate
//! talks to [`crate::HidUartApi`], which deals only in fixed-width integers,
//! slices and the opaque [`crate::Handle`] token.
//!
//! The library is resolved and loaded at most once per process. The vendor
//! declares its entry points `WINAPI` on Windows and plain C elsewhere,
//! which is exactly the `extern "system"` convention.

use libloading::Library;
use once_cell::sync::OnceCell;
use std::os::raw::{c_char, c_int, c_void};

use crate::error::Result;

/// Opaque device token as passed over the C boundary.
pub(crate) type RawHandle = *mut c_void;

/// Descriptor string calls require a caller-supplied 512 byte buffer.
pub const DEVICE_STRING_LEN: usize = 512;

type GetNumDevicesFn = unsafe extern "system" fn(*mut u32, u16, u16) -> c_int;
type GetAttributesFn =
    unsafe extern "system" fn(u32, u16, u16, *mut u16, *mut u16, *mut u16) -> c_int;
type GetStringFn = unsafe extern "system" fn(u32, u16, u16, *mut c_char, u32) -> c_int;
type GetLibraryVersionFn = unsafe extern "system" fn(*mut u8, *mut u8, *mut c_int) -> c_int;
type OpenFn = unsafe extern "system" fn(*mut RawHandle, u32, u16, u16) -> c_int;
type CloseFn = unsafe extern "system" fn(RawHandle) -> c_int;
type IsOpenedFn = unsafe extern "system" fn(RawHandle, *mut c_int) -> c_int;
type GetOpenedAttributesFn =
    unsafe extern "system" fn(RawHandle, *mut u16, *mut u16, *mut u16) -> c_int;
type GetPartNumberFn = unsafe extern "system" fn(RawHandle, *mut u8, *mut u8) -> c_int;
type GetOpenedStringFn = unsafe extern "system" fn(RawHandle, *mut c_char, u32) -> c_int;
type SetUartEnableFn = unsafe extern "system" fn(RawHandle, c_int) -> c_int;
type GetUartEnableFn = unsafe extern "system" fn(RawHandle, *mut c_int) -> c_int;
type FlushBuffersFn = unsafe extern "system" fn(RawHandle, c_int, c_int) -> c_int;
type CancelIoFn = unsafe extern "system" fn(RawHandle) -> c_int;
type ReadFn = unsafe extern "system" fn(RawHandle, *mut u8, u32, *mut u32) -> c_int;
type WriteFn = unsafe extern "system" fn(RawHandle, *const u8, u32, *mut u32) -> c_int;
type SetTimeoutsFn = unsafe extern "system" fn(RawHandle, u32, u32) -> c_int;
type GetTimeoutsFn = unsafe extern "system" fn(RawHandle, *mut u32, *mut u32) -> c_int;
type SetUartConfigFn = unsafe extern "system" fn(RawHandle, u32, u8, u8, u8, u8) -> c_int;
type GetUartConfigFn =
    unsafe extern "system" fn(RawHandle, *mut u32, *mut u8, *mut u8, *mut u8, *mut u8) -> c_int;
type GetUartStatusFn =
    unsafe extern "system" fn(RawHandle, *mut u16, *mut u16, *mut u8, *mut u8) -> c_int;
type StartBreakFn = unsafe extern "system" fn(RawHandle, u8) -> c_int;
type StopBreakFn = unsafe extern "system" fn(RawHandle) -> c_int;
type ResetFn = unsafe extern "system" fn(RawHandle) -> c_int;
type ReadLatchFn = unsafe extern "system" fn(RawHandle, *mut u16) -> c_int;
type WriteLatchFn = unsafe extern "system" fn(RawHandle, u16, u16) -> c_int;

/// Every `HidUart_*` export, resolved once and held for the process lifetime.
pub(crate) struct Api {
    pub get_num_devices: GetNumDevicesFn,
    pub get_attributes: GetAttributesFn,
    pub get_string: GetStringFn,
    pub get_library_version: GetLibraryVersionFn,
    pub get_hid_library_version: GetLibraryVersionFn,
    pub open: OpenFn,
    pub close: CloseFn,
    pub is_opened: IsOpenedFn,
    pub get_opened_attributes: GetOpenedAttributesFn,
    pub get_part_number: GetPartNumberFn,
    pub get_opened_string: GetOpenedStringFn,
    pub set_uart_enable: SetUartEnableFn,
    pub get_uart_enable: GetUartEnableFn,
    pub flush_buffers: FlushBuffersFn,
    pub cancel_io: CancelIoFn,
    pub read: ReadFn,
    pub write: WriteFn,
    pub set_timeouts: SetTimeoutsFn,
    pub get_timeouts: GetTimeoutsFn,
    pub set_uart_config: SetUartConfigFn,
    pub get_uart_config: GetUartConfigFn,
    pub get_uart_status: GetUartStatusFn,
    pub start_break: StartBreakFn,
    pub stop_break: StopBreakFn,
    pub reset: ResetFn,
    pub read_latch: ReadLatchFn,
    pub write_latch: WriteLatchFn,
    /// Keeps the vendor artifacts mapped; symbols above point into them.
    _uart: Library,
    _support: Vec<Library>,
}

static API: OnceCell<Api> = OnceCell::new();

/// Loads the platform artifact on first call; later calls are free.
pub(crate) fn api() -> Result<&'static Api> {
    API.get_or_try_init(Api::load)
}

macro_rules! resolve {
    ($lib:expr, $name:literal) => {{
        // Copy the fn pointer out so the symbol borrow ends here; the
        // library itself is kept alive by the Api struct.
        let symbol = $lib.get($name)?;
        *symbol
    }};
}

impl Api {
    fn load() -> Result<Api> {
        let (uart, support) = open_libraries()?;
        log::debug!("vendor HID-to-UART library loaded");
        unsafe {
            Ok(Api {
                get_num_devices: resolve!(uart, b"HidUart_GetNumDevices\0"),
                get_attributes: resolve!(uart, b"HidUart_GetAttributes\0"),
                get_string: resolve!(uart, b"HidUart_GetString\0"),
                get_library_version: resolve!(uart, b"HidUart_GetLibraryVersion\0"),
                get_hid_library_version: resolve!(uart, b"HidUart_GetHidLibraryVersion\0"),
                open: resolve!(uart, b"HidUart_Open\0"),
                close: resolve!(uart, b"HidUart_Close\0"),
                is_opened: resolve!(uart, b"HidUart_IsOpened\0"),
                get_opened_attributes: resolve!(uart, b"HidUart_GetOpenedAttributes\0"),
                get_part_number: resolve!(uart, b"HidUart_GetPartNumber\0"),
                get_opened_string: resolve!(uart, b"HidUart_GetOpenedString\0"),
                set_uart_enable: resolve!(uart, b"HidUart_SetUartEnable\0"),
                get_uart_enable: resolve!(uart, b"HidUart_GetUartEnable\0"),
                flush_buffers: resolve!(uart, b"HidUart_FlushBuffers\0"),
                cancel_io: resolve!(uart, b"HidUart_CancelIo\0"),
                read: resolve!(uart, b"HidUart_Read\0"),
                write: resolve!(uart, b"HidUart_Write\0"),
                set_timeouts: resolve!(uart, b"HidUart_SetTimeouts\0"),
                get_timeouts: resolve!(uart, b"HidUart_GetTimeouts\0"),
                set_uart_config: resolve!(uart, b"HidUart_SetUartConfig\0"),
                get_uart_config: resolve!(uart, b"HidUart_GetUartConfig\0"),
                get_uart_status: resolve!(uart, b"HidUart_GetUartStatus\0"),
                start_break: resolve!(uart, b"HidUart_StartBreak\0"),
                stop_break: resolve!(uart, b"HidUart_StopBreak\0"),
                reset: resolve!(uart, b"HidUart_Reset\0"),
                read_latch: resolve!(uart, b"HidUart_ReadLatch\0"),
                write_latch: resolve!(uart, b"HidUart_WriteLatch\0"),
                _uart: uart,
                _support: support,
            })
        }
    }
}

#[cfg(windows)]
fn open_libraries() -> Result<(Library, Vec<Library>)> {
    let uart = unsafe { Library::new("SLABHIDtoUART.dll")? };
    Ok((uart, Vec::new()))
}

#[cfg(target_os = "macos")]
fn open_libraries() -> Result<(Library, Vec<Library>)> {
    let uart = unsafe { Library::new("libSLABHIDtoUART.dylib")? };
    Ok((uart, Vec::new()))
}

// The UART library depends on symbols from the HID transport library, so
// that one must be resident with global visibility before the UART artifact
// is resolved. Both are tried by soname and relative to the working
// directory, matching how the vendor ships them.
#[cfg(all(unix, not(target_os = "macos")))]
fn open_libraries() -> Result<(Library, Vec<Library>)> {
    use libloading::os::unix::{Library as UnixLibrary, RTLD_GLOBAL, RTLD_NOW};

    fn open_either(soname: &str, relative: &str, flags: c_int) -> Result<Library> {
        match unsafe { UnixLibrary::open(Some(soname), flags) } {
            Ok(lib) => Ok(lib.into()),
            Err(_) => Ok(unsafe { UnixLibrary::open(Some(relative), flags)? }.into()),
        }
    }

    let hid = open_either(
        "libslabhiddevice.so.1.0",
        "./libslabhiddevice.so.1.0",
        RTLD_NOW | RTLD_GLOBAL,
    )?;
    let uart = open_either(
        "libslabhidtouart.so.1.0",
        "./libslabhidtouart.so.1.0",
        RTLD_NOW,
    )?;
    Ok((uart, vec![hid]))
}
