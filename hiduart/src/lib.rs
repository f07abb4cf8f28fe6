//! Bindings to the Silicon Labs CP211x HID-to-UART interface library.
//!
//! CP2110/CP2114 bridge chips are driven through a closed-source vendor
//! library (`SLABHIDtoUART`). This crate loads that library at runtime,
//! wraps its status-code convention in proper `Result`s, and exposes device
//! enumeration, UART configuration, read/write, break signaling and GPIO
//! latch access behind a typed API. Read and write timeouts are normal
//! outcomes carrying a byte count, not errors — see [`Transfer`].
//!
//! The native surface is the [`HidUartApi`] trait: [`VendorLib`] is the real
//! library, [`mock::MockChip`] a simulated one for tests and development.
//!
//! ```no_run
//! use hiduart::{HidUart, StringOption, UartConfig, VendorLib};
//!
//! fn main() -> hiduart::Result<()> {
//!     let lib = VendorLib::load()?;
//!     let count = hiduart::get_num_devices(&lib, hiduart::VID, hiduart::PID)?;
//!     println!("{} devices attached", count);
//!
//!     let mut dev = HidUart::new(lib);
//!     dev.open(0, hiduart::VID, hiduart::PID)?;
//!     println!("serial: {}", dev.device_string(StringOption::SerialNumber)?);
//!
//!     dev.set_uart_config(&UartConfig::default())?;
//!     dev.write_latch(0x0004, 0x0004)?;
//!     println!("latch: {:#06x}", dev.read_latch()?);
//!     dev.close()
//! }
//! ```

mod api;
mod config;
mod device;
mod discovery;
mod error;
mod ffi;
pub mod mock;

pub use api::{Handle, HidUartApi, VendorLib, DEVICE_STRING_LEN};
pub use config::{
    Attributes, DataBits, FlowControl, LibraryVersion, Parity, PartNumber, StopBits, StringOption,
    UartConfig, UartStatus,
};
pub use device::{HidUart, Transfer};
pub use discovery::{
    get_attributes, get_num_devices, get_string, hid_library_version, is_device_opened,
    library_version,
};
pub use error::{Error, Result, Status};

/// Default USB vendor ID of the CP211x bridges.
pub const VID: u16 = 0x10C4;
/// Default USB product ID of the CP2110.
pub const PID: u16 = 0xEA80;
