//! USB LED CLI tool
//!
//! Drives a 32 LED addressable strip through a vendor-defined HID interface.
//! Each LED update is packed into four bytes and up to 16 updates are sent in
//! a single 64 byte output report.

use std::error::Error;
use std::fmt::{self, Display, Formatter};
use std::io;
use std::num::ParseIntError;
use std::process;
use std::str::FromStr;

use clap::{crate_description, crate_name, crate_version, Arg, ArgAction, ArgMatches, Command, ValueEnum};
use hidapi::HidApi;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use crate::buffer::CommandBuffer;
use crate::packet::{LedPowerState, LedUpdateRequest, LED_COUNT};
use crate::response::{decode, ResponseOutcome};
use crate::session::{DeviceSession, SessionError, MAX_REPORT_LEN, PRODUCT_ID, VENDOR_ID};
use crate::transport::HidTransport;

mod buffer;
mod packet;
mod response;
mod session;
mod transport;

/// LEDs lit by the `demo` subcommand.
const DEMO_LEDS: [LedArg; 5] = [
    LedArg { index: 0, state: LedPowerState::On, color: Rgb { r: 0xff, g: 0x00, b: 0x00 } },
    LedArg { index: 1, state: LedPowerState::Blinking, color: Rgb { r: 0x00, g: 0xff, b: 0x00 } },
    LedArg { index: 3, state: LedPowerState::Blinking, color: Rgb { r: 0x80, g: 0x80, b: 0x00 } },
    LedArg { index: 29, state: LedPowerState::Blinking, color: Rgb { r: 0x80, g: 0x00, b: 0x80 } },
    LedArg { index: 31, state: LedPowerState::On, color: Rgb { r: 0x00, g: 0x00, b: 0xff } },
];

/// RGB color.
#[derive(Default, PartialEq, Eq, Debug, Copy, Clone)]
struct Rgb {
    r: u8,
    g: u8,
    b: u8,
}

impl FromStr for Rgb {
    type Err = ();

    fn from_str(s: &str) -> Result<Rgb, ()> {
        let chars = if s.starts_with("0x") && s.len() == 8 {
            &s[2..]
        } else {
            return Err(());
        };

        match u32::from_str_radix(chars, 16) {
            Ok(mut color) => {
                let b = (color & 0xff) as u8;
                color >>= 8;
                let g = (color & 0xff) as u8;
                color >>= 8;
                let r = color as u8;
                Ok(Rgb { r, g, b })
            },
            Err(_) => Err(()),
        }
    }
}

impl Display for Rgb {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

/// Read timeout in milliseconds.
#[derive(PartialEq, Eq, Debug, Copy, Clone)]
struct Duration(u16);

impl Default for Duration {
    fn default() -> Self {
        Self(100)
    }
}

impl FromStr for Duration {
    type Err = ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Duration(u16::from_str(s)?))
    }
}

impl Display for Duration {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Single LED update in CLI format `INDEX:STATE:0xRRGGBB`.
#[derive(PartialEq, Eq, Debug, Copy, Clone)]
struct LedArg {
    index: i64,
    state: LedPowerState,
    color: Rgb,
}

impl LedArg {
    fn off(index: i64) -> Self {
        Self { index, state: LedPowerState::Off, color: Rgb::default() }
    }
}

impl FromStr for LedArg {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut fields = s.split(':');
        let (index, state, color) = match (fields.next(), fields.next(), fields.next(), fields.next()) {
            (Some(index), Some(state), Some(color), None) => (index, state, color),
            _ => return Err(format!("LED '{s}' does not match format INDEX:STATE:0xRRGGBB")),
        };

        let index = i64::from_str(index).map_err(|err| format!("invalid LED index '{index}': {err}"))?;
        let state = <LedPowerState as ValueEnum>::from_str(state, true)
            .map_err(|_| format!("invalid LED state '{state}', expected off, on or blinking"))?;
        let color = Rgb::from_str(color)
            .map_err(|_| format!("color '{color}' does not match format 0xRRGGBB"))?;

        Ok(Self { index, state, color })
    }
}

impl Display for LedArg {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let state = self.state.to_possible_value().map(|value| value.get_name().to_owned());
        write!(f, "{}:{}:{}", self.index, state.unwrap_or_default(), self.color)
    }
}

impl From<LedArg> for LedUpdateRequest {
    fn from(led: LedArg) -> Self {
        let Rgb { r, g, b } = led.color;
        LedUpdateRequest::new(led.index, led.state, r.into(), g.into(), b.into())
    }
}

/// LED update config.
#[derive(Default, Debug)]
struct Config {
    leds: Vec<LedArg>,
    read_response: bool,
    timeout: Duration,
    verbose: bool,
}

impl Config {
    fn from_cli(matches: &ArgMatches) -> Result<Self, Box<dyn Error>> {
        let mut config = Config::default();

        // Global options are only propagated down to the subcommand.
        let options = match matches.subcommand() {
            Some((_, submatches)) => submatches,
            None => matches,
        };

        config.read_response = options.get_flag("response");
        config.verbose = options.get_flag("verbose");
        replace_from_str(&mut config.timeout, options, "timeout");

        config.leds = match matches.subcommand_name() {
            Some("demo") => DEMO_LEDS.to_vec(),
            Some("off") => (0..LED_COUNT as i64).map(LedArg::off).collect(),
            _ => matches
                .get_many::<String>("led")
                .into_iter()
                .flatten()
                .map(|led| LedArg::from_str(led))
                .collect::<Result<_, _>>()?,
        };

        if config.leds.is_empty() {
            return Err("no LEDs specified, use --led or a subcommand".into());
        }

        Ok(config)
    }

    /// LED updates in the order they will be sent.
    fn requests(&self) -> Vec<LedUpdateRequest> {
        self.leds.iter().copied().map(LedUpdateRequest::from).collect()
    }
}

impl Display for Config {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", crate_name!())?;

        for led in &self.leds {
            write!(f, " \\\n  --led {}", led)?;
        }

        // Timeout is irrelevant without reading a response.
        if !self.read_response {
            return Ok(());
        }

        write!(f, " \\\n  --response")?;

        if self.timeout != Duration::default() {
            write!(f, " \\\n  --timeout {}", self.timeout)?;
        }

        Ok(())
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(io::stderr)
        .init();

    let config = match Config::from_cli(&cli()) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("\x1b[31mError:\x1b[0m {err}");
            process::exit(2);
        },
    };

    // Print CLI example to reapply the same LED state.
    if config.verbose {
        println!("To reapply this config, you can run the following command:\n\n{}\n", config);
    }

    match write_config(&config) {
        Ok(outcome) => {
            println!("\x1b[32mSuccessfully applied changes.\x1b[0m");
            if let Some(outcome) = outcome {
                println!("{}", decode(outcome));
            }
        },
        Err(err) => {
            eprintln!("\x1b[31mError:\x1b[0m {err}");
            process::exit(1);
        },
    }
}

/// Write a config to the LED device.
fn write_config(config: &Config) -> Result<Option<ResponseOutcome>, Box<dyn Error>> {
    let api = HidApi::new().map_err(|err| format!("unable to access HID: {err}"))?;

    println!("Opening device VID:0x{:04x} PID:0x{:04x}...", VENDOR_ID, PRODUCT_ID);
    let mut session = DeviceSession::open(&api, VENDOR_ID, PRODUCT_ID)?;
    println!("Device opened successfully!");

    // The session is dropped and the device released on error.
    let outcome = apply(&mut session, config)?;
    session.close();
    debug!(state = ?session.state(), "LED update finished");

    Ok(outcome)
}

/// Send all LED updates and optionally read the device's response.
fn apply<T: HidTransport>(
    session: &mut DeviceSession<T>,
    config: &Config,
) -> Result<Option<ResponseOutcome>, SessionError> {
    for buffer in CommandBuffer::batches(&config.requests()) {
        session.send(buffer)?;
    }

    if !config.read_response {
        return Ok(None);
    }

    session.receive(MAX_REPORT_LEN, config.timeout.0.into()).map(Some)
}

/// Get clap CLI parameters.
fn cli() -> ArgMatches {
    command().get_matches()
}

/// Get clap CLI definition.
fn command() -> Command {
    Command::new(crate_name!())
        .version(crate_version!())
        .about(crate_description!())
        .subcommand(Command::new("demo").about("Light a sample LED pattern"))
        .subcommand(Command::new("off").about("Turn off all LEDs"))
        .arg(
            Arg::new("led")
                .help("LED update [format: INDEX:STATE:0xRRGGBB, STATE: off, on, blinking]")
                .long("led")
                .short('l')
                .action(ArgAction::Append),
        )
        .arg(
            Arg::new("response")
                .help("Read the device's status code after sending")
                .long("response")
                .short('r')
                .global(true)
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("timeout")
                .help("Response timeout in milliseconds")
                .long("timeout")
                .short('t')
                .global(true),
        )
        .arg(
            Arg::new("verbose")
                .help("Print a command to reapply this configuration")
                .long("verbose")
                .short('v')
                .global(true)
                .action(ArgAction::SetTrue),
        )
}

/// Convert a CLI option from the parameter string.
#[inline]
fn cli_from_str<T>(matches: &ArgMatches, name: &str) -> Option<Result<T, <T as FromStr>::Err>>
where
    T: FromStr,
{
    matches.get_one::<String>(name).map(|value| T::from_str(value))
}

/// Replace config value with the CLI parameter if it is present.
#[inline]
fn replace_from_str<T: FromStr>(option: &mut T, matches: &ArgMatches, name: &str) {
    if let Some(Ok(value)) = cli_from_str(matches, name) {
        *option = value;
    }
}
