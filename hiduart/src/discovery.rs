//! Device discovery and library queries that need no open handle.

use crate::api::{decode_device_string, HidUartApi, DEVICE_STRING_LEN};
use crate::config::{Attributes, LibraryVersion, StringOption};
use crate::error::{Error, Result, Status};

/// Number of attached devices matching the VID/PID pair.
pub fn get_num_devices<A: HidUartApi>(api: &A, vid: u16, pid: u16) -> Result<u32> {
    let mut count = 0;
    api.get_num_devices(&mut count, vid, pid).check()?;
    Ok(count)
}

/// USB attributes of the `index`th matching device. An index at or past the
/// device count surfaces the native `HID_UART_DEVICE_NOT_FOUND`.
pub fn get_attributes<A: HidUartApi>(
    api: &A,
    index: u32,
    vid: u16,
    pid: u16,
) -> Result<Attributes> {
    let (mut dev_vid, mut dev_pid, mut dev_release) = (0, 0, 0);
    api.get_attributes(index, vid, pid, &mut dev_vid, &mut dev_pid, &mut dev_release)
        .check()?;
    Ok(Attributes {
        vid: dev_vid,
        pid: dev_pid,
        release: dev_release,
    })
}

/// Descriptor string of the `index`th matching device.
pub fn get_string<A: HidUartApi>(
    api: &A,
    index: u32,
    vid: u16,
    pid: u16,
    option: StringOption,
) -> Result<String> {
    let mut buf = [0u8; DEVICE_STRING_LEN];
    api.get_string(index, vid, pid, &mut buf, option as u32)
        .check()?;
    decode_device_string(&buf)
}

/// Version of the HID-to-UART bridge library.
pub fn library_version<A: HidUartApi>(api: &A) -> Result<LibraryVersion> {
    let (mut major, mut minor, mut release) = (0, 0, false);
    api.get_library_version(&mut major, &mut minor, &mut release)
        .check()?;
    Ok(LibraryVersion {
        major,
        minor,
        release,
    })
}

/// Version of the underlying HID device-enumeration library.
pub fn hid_library_version<A: HidUartApi>(api: &A) -> Result<LibraryVersion> {
    let (mut major, mut minor, mut release) = (0, 0, false);
    api.get_hid_library_version(&mut major, &mut minor, &mut release)
        .check()?;
    Ok(LibraryVersion {
        major,
        minor,
        release,
    })
}

/// Whether the `index`th matching device is already held open by another
/// process.
///
/// The vendor API has no direct query, so this probes the device's
/// attributes: exactly `HID_UART_DEVICE_ACCESS_ERROR` means an exclusive
/// lock elsewhere. Success or any other failure counts as "not locked".
pub fn is_device_opened<A: HidUartApi>(api: &A, index: u32, vid: u16, pid: u16) -> bool {
    matches!(
        get_attributes(api, index, vid, pid),
        Err(Error::Api(Status::DEVICE_ACCESS_ERROR))
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockChip, MockDevice};
    use crate::{PID, VID};

    #[test]
    fn single_attached_device_scenario() {
        let chip = MockChip::new();
        chip.attach(MockDevice {
            release: 0x0123,
            ..MockDevice::default()
        });

        assert_eq!(get_num_devices(&chip, VID, PID).unwrap(), 1);
        assert_eq!(
            get_attributes(&chip, 0, VID, PID).unwrap(),
            Attributes {
                vid: VID,
                pid: PID,
                release: 0x0123,
            }
        );
    }

    #[test]
    fn attributes_out_of_range_is_device_not_found() {
        let chip = MockChip::new();
        chip.attach(MockDevice::default());

        let err = get_attributes(&chip, 1, VID, PID).unwrap_err();
        assert_eq!(err.status(), Some(Status::DEVICE_NOT_FOUND));
    }

    #[test]
    fn strings_decode_per_option() {
        let chip = MockChip::new();
        chip.attach(MockDevice {
            serial: "S123".into(),
            manufacturer: "Acme".into(),
            ..MockDevice::default()
        });

        assert_eq!(
            get_string(&chip, 0, VID, PID, StringOption::SerialNumber).unwrap(),
            "S123"
        );
        assert_eq!(
            get_string(&chip, 0, VID, PID, StringOption::Manufacturer).unwrap(),
            "Acme"
        );
        assert_eq!(
            get_string(&chip, 0, VID, PID, StringOption::Vid).unwrap(),
            "10C4"
        );
    }

    #[test]
    fn versions_format_as_strings() {
        let chip = MockChip::new();
        assert_eq!(library_version(&chip).unwrap().to_string(), "6.7.1");
        assert_eq!(hid_library_version(&chip).unwrap().to_string(), "1.0.1");
    }

    #[test]
    fn locked_device_reads_as_opened_elsewhere() {
        let chip = MockChip::new();
        let slot = chip.attach(MockDevice::default());

        assert!(!is_device_opened(&chip, 0, VID, PID));
        chip.lock(slot, true);
        assert!(is_device_opened(&chip, 0, VID, PID));
        // Missing device is "not locked", not an error.
        assert!(!is_device_opened(&chip, 5, VID, PID));
    }
}
