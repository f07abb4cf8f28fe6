use colored::Colorize;
use hiduart::{
    get_num_devices, hid_library_version, library_version, Error, HidUart, HidUartApi, Status,
    StringOption, VendorLib,
};
use std::io::{self, BufRead, Write};
use structopt::StructOpt;

#[derive(Debug, StructOpt)]
#[structopt(name = "hiduart", about = "CP211x HID-to-UART power control demo")]
struct Opt {
    /// Index of the device to open.
    #[structopt(default_value = "0")]
    index: u32,

    #[structopt(short = "v", name = "vid", long = "vid", parse(try_from_str = parse_hex_16))]
    vid: Option<u16>,
    #[structopt(short = "p", name = "pid", long = "pid", parse(try_from_str = parse_hex_16))]
    pid: Option<u16>,

    /// GPIO bit driven by the power commands (0-15).
    #[structopt(long = "power-pin", default_value = "2")]
    power_pin: u8,
}

fn main() {
    pretty_env_logger::init();

    let args = Opt::from_args();
    let code = run(&args);
    if code == 0 {
        println!("\n{}\n", "========== PASS ==========".green().bold());
    } else {
        println!("\n{}\n", "========== FAIL ==========".red().bold());
    }
    std::process::exit(code);
}

fn run(args: &Opt) -> i32 {
    let vid = args.vid.unwrap_or(hiduart::VID);
    let pid = args.pid.unwrap_or(hiduart::PID);
    if args.power_pin > 15 {
        eprintln!("power pin {} out of range, the latch has 16 bits", args.power_pin);
        return 1;
    }
    let mask = 1u16 << args.power_pin;

    let lib = match VendorLib::load() {
        Ok(lib) => lib,
        Err(e) => {
            eprintln!("{} {}", "Vendor library error:".red(), e);
            return 1;
        }
    };
    match library_version(&lib) {
        Ok(version) => log::debug!("bridge library {}", version),
        Err(e) => log::warn!("bridge library version query failed: {}", e),
    }
    match hid_library_version(&lib) {
        Ok(version) => log::debug!("HID library {}", version),
        Err(e) => log::warn!("HID library version query failed: {}", e),
    }

    let count = match get_num_devices(&lib, vid, pid) {
        Ok(count) => count,
        Err(e) => {
            eprintln!("{} {}", "Device error:".red(), e);
            return 1;
        }
    };
    log::debug!("{} matching devices for {:04x}:{:04x}", count, vid, pid);

    if !preflight_invalid_index(lib, count, vid, pid) {
        return 1;
    }
    if count == 0 {
        println!("no devices matching {:04X}:{:04X} attached", vid, pid);
        return 0;
    }

    let mut dev = HidUart::new(lib);
    let result = session(&mut dev, args.index, vid, pid, mask);
    // The handle must be released on every exit path.
    let _ = dev.close();

    match result {
        Ok(()) => 0,
        Err(e) => {
            eprintln!("{} {}", "Device error:".red(), e);
            1
        }
    }
}

/// Opening one past the last valid index must fail with exactly
/// `HID_UART_DEVICE_NOT_FOUND`. Anything else, including an unexpected
/// success, fails the run.
fn preflight_invalid_index(lib: VendorLib, count: u32, vid: u16, pid: u16) -> bool {
    let mut probe = HidUart::new(lib);
    match probe.open(count, vid, pid) {
        Err(Error::Api(Status::DEVICE_NOT_FOUND)) => true,
        Ok(()) => {
            eprintln!(
                "{} index {} should not have opened",
                "Enumeration anomaly:".red(),
                count
            );
            let _ = probe.close();
            false
        }
        Err(e) => {
            eprintln!("{} {}", "Enumeration anomaly:".red(), e);
            false
        }
    }
}

fn session(dev: &mut HidUart<VendorLib>, index: u32, vid: u16, pid: u16, mask: u16) -> hiduart::Result<()> {
    dev.open(index, vid, pid)?;
    print_dashboard(dev);

    match prompt_choice() {
        1 => power_off(dev, mask),
        2 => power_on(dev, mask),
        _ => power_cycle(dev, mask),
    }
}

/// Prompts until the user enters 1, 2 or 3.
fn prompt_choice() -> u8 {
    let stdin = io::stdin();
    loop {
        println!("\n{}", "Please select an action:".cyan().bold());
        println!("  {} - {}", "1".yellow(), "Power OFF".red());
        println!("  {} - {}", "2".yellow(), "Power ON".green());
        println!("  {} - {}", "3".yellow(), "Power Cycle".blue());
        print!("{} ", "Enter your choice (1/2/3):".cyan().bold());
        io::stdout().flush().expect("couldn't flush stdout");

        let mut line = String::new();
        let read = stdin
            .lock()
            .read_line(&mut line)
            .expect("couldn't read stdin");
        if read == 0 {
            eprintln!("stdin closed");
            std::process::exit(1);
        }
        match line.trim() {
            "1" => return 1,
            "2" => return 2,
            "3" => return 3,
            _ => println!("{}", "Invalid input. Please enter 1, 2, or 3.".red()),
        }
    }
}

fn power_off<A: HidUartApi>(dev: &mut HidUart<A>, mask: u16) -> hiduart::Result<()> {
    println!("\n{}\n", "======== Executing Power Off ========".blue().bold());
    dev.write_latch(0, mask)?;
    report_latch(dev, "after power off");
    Ok(())
}

fn power_on<A: HidUartApi>(dev: &mut HidUart<A>, mask: u16) -> hiduart::Result<()> {
    println!("\n{}\n", "======== Executing Power On =========".blue().bold());
    dev.write_latch(mask, mask)?;
    report_latch(dev, "after power on");
    Ok(())
}

fn power_cycle<A: HidUartApi>(dev: &mut HidUart<A>, mask: u16) -> hiduart::Result<()> {
    println!("\n{}\n", "======== Executing Power Cycle ======".blue().bold());
    power_off(dev, mask)?;
    power_on(dev, mask)
}

/// Reads back the latch and renders the per-pin table. A failing readback
/// is reported but does not fail the power sequence: the write went through.
fn report_latch<A: HidUartApi>(dev: &HidUart<A>, context: &str) {
    match dev.read_latch() {
        Ok(latch) => {
            println!("  {} {:#06X} ({:#018b})", "Latch state:".yellow(), latch, latch);
            println!("  {} [ {} ]", "GPIO pins:  ".yellow(), latch_table(latch));
        }
        Err(e) => println!("could not fetch GPIO state {}: {}", context, e),
    }
}

fn latch_table(latch: u16) -> String {
    (0..8)
        .map(|pin| {
            let state = if latch & (1 << pin) != 0 {
                "ON".green()
            } else {
                "OFF".red()
            };
            format!("GPIO{}: {}", pin, state)
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn print_dashboard<A: HidUartApi>(dev: &HidUart<A>) {
    println!("\n{}", "========== HID Device Information ==========".cyan().bold());
    row("Serial Number", dev.device_string(StringOption::SerialNumber));
    row("Manufacturer", dev.device_string(StringOption::Manufacturer));
    row("Product", dev.device_string(StringOption::Product));
    row(
        "Part Number",
        dev.part_number()
            .map(|p| format!("{} (version {})", p.part, p.version)),
    );
    row(
        "Attributes",
        dev.attributes().map(|a| {
            format!(
                "VID {:#06X}  PID {:#06X}  Release {:#06X}",
                a.vid, a.pid, a.release
            )
        }),
    );
    row(
        "UART Config",
        dev.uart_config().map(|c| {
            format!(
                "baud={}, dataBits={}, parity={:?}, stopBits={:?}, flowControl={:?}",
                c.baud_rate,
                c.data_bits.count(),
                c.parity,
                c.stop_bits,
                c.flow_control
            )
        }),
    );
    row(
        "UART Status",
        dev.uart_status().map(|s| {
            format!(
                "TX FIFO={}  RX FIFO={}  errors {:#04X}  break {:#04X}",
                s.tx_fifo, s.rx_fifo, s.line_errors, s.line_break
            )
        }),
    );
    row(
        "GPIO Latch",
        dev.read_latch()
            .map(|latch| format!("{:#06X}  [ {} ]", latch, latch_table(latch))),
    );
    println!("{}", "============================================".cyan().bold());
}

/// One dashboard line; a failing query shows inline instead of aborting.
fn row(label: &str, value: hiduart::Result<String>) {
    match value {
        Ok(value) => println!("  {:<16}: {}", label.bold(), value.green()),
        Err(e) => println!("  {:<16}: {}", label.bold(), format!("<error: {}>", e).red()),
    }
}

fn parse_hex_16(input: &str) -> Result<u16, std::num::ParseIntError> {
    if let Some(hex) = input.strip_prefix("0x") {
        u16::from_str_radix(hex, 16)
    } else {
        input.parse::<u16>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hiduart::mock::{MockChip, MockDevice};

    #[test]
    fn parses_hex_and_decimal_ids() {
        assert_eq!(parse_hex_16("0x10C4").unwrap(), 0x10C4);
        assert_eq!(parse_hex_16("4292").unwrap(), 4292);
        assert!(parse_hex_16("0xZZ").is_err());
    }

    fn powered_device(latch: u16) -> (MockChip, usize, HidUart<MockChip>) {
        let chip = MockChip::new();
        let slot = chip.attach(MockDevice {
            latch,
            ..MockDevice::default()
        });
        let mut dev = HidUart::new(chip.clone());
        dev.open(0, hiduart::VID, hiduart::PID).unwrap();
        (chip, slot, dev)
    }

    #[test]
    fn power_off_clears_only_the_power_bit() {
        let (chip, slot, mut dev) = powered_device(0x00FF);
        power_off(&mut dev, 0x0004).unwrap();
        assert_eq!(chip.latch(slot), 0x00FB);
    }

    #[test]
    fn power_cycle_ends_with_the_bit_set() {
        let (chip, slot, mut dev) = powered_device(0x0000);
        power_cycle(&mut dev, 0x0004).unwrap();
        assert_eq!(chip.latch(slot), 0x0004);
    }

    #[test]
    fn power_cycle_surfaces_a_write_failure() {
        let (chip, _, mut dev) = powered_device(0x0000);
        chip.fail_next(Status::DEVICE_IO_FAILED);
        let err = power_cycle(&mut dev, 0x0004).unwrap_err();
        assert_eq!(err.status(), Some(Status::DEVICE_IO_FAILED));
    }
}
