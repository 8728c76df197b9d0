//! LED command packet encoding.
//!
//! Every LED update is sent as four bytes:
//!
//! ```text
//! byte 0: 1 ss iiiii   (marker bit, power state, LED index)
//! byte 1: red
//! byte 2: green
//! byte 3: blue
//! ```

use std::fmt::{self, Display, Formatter};

use clap::ValueEnum;

/// Size of a single encoded LED packet.
pub const PACKET_LEN: usize = 4;

/// Number of LEDs addressable by the 5-bit index field.
pub const LED_COUNT: usize = 32;

/// Marker bit set on every LED command header.
const HEADER_MARKER: u8 = 0x80;

const INDEX_MASK: i64 = 0x1f;
const STATE_MASK: i64 = 0x03;
const COLOR_MASK: i64 = 0xff;
const STATE_SHIFT: u8 = 5;

/// LED power state.
#[derive(ValueEnum, Default, PartialEq, Eq, Debug, Copy, Clone)]
pub enum LedPowerState {
    #[default]
    Off,
    On,
    Blinking,
}

impl LedPowerState {
    /// Raw 2-bit wire value.
    pub const fn bits(self) -> u8 {
        match self {
            Self::Off => 0,
            Self::On => 1,
            Self::Blinking => 2,
        }
    }
}

impl From<LedPowerState> for i64 {
    fn from(state: LedPowerState) -> Self {
        state.bits() as i64
    }
}

/// Desired state of a single LED.
///
/// Fields are deliberately wider than their wire representation, the encoder
/// keeps only the bits that fit.
#[derive(Default, PartialEq, Eq, Debug, Copy, Clone)]
pub struct LedUpdateRequest {
    pub index: i64,
    pub state: LedPowerState,
    pub red: i64,
    pub green: i64,
    pub blue: i64,
}

impl LedUpdateRequest {
    pub fn new(index: i64, state: LedPowerState, red: i64, green: i64, blue: i64) -> Self {
        Self { index, state, red, green, blue }
    }

    /// Encode this request into its wire packet.
    pub fn encode(&self) -> EncodedPacket {
        encode(self.index, self.state, self.red, self.green, self.blue)
    }
}

/// A single 4-byte LED packet.
#[derive(PartialEq, Eq, Debug, Copy, Clone)]
pub struct EncodedPacket([u8; PACKET_LEN]);

impl EncodedPacket {
    pub fn header(&self) -> u8 {
        self.0[0]
    }

    /// LED index stored in the low five header bits.
    pub fn index(&self) -> u8 {
        self.header() & INDEX_MASK as u8
    }

    /// Power state stored in header bits 5 and 6.
    ///
    /// This is the raw value, including the reserved state `3`.
    pub fn state_bits(&self) -> u8 {
        (self.header() >> STATE_SHIFT) & STATE_MASK as u8
    }

    pub fn rgb(&self) -> (u8, u8, u8) {
        (self.0[1], self.0[2], self.0[3])
    }

    pub fn as_bytes(&self) -> &[u8; PACKET_LEN] {
        &self.0
    }
}

impl Display for EncodedPacket {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{:02x} {:02x} {:02x} {:02x}", self.0[0], self.0[1], self.0[2], self.0[3])
    }
}

/// Encode one LED update.
///
/// This never fails, values outside of their field width are truncated to
/// their low bits. The state accepts raw integers so the reserved state `3`
/// can still be put on the wire.
pub fn encode(
    index: i64,
    state: impl Into<i64>,
    red: i64,
    green: i64,
    blue: i64,
) -> EncodedPacket {
    let index = (index & INDEX_MASK) as u8;
    let state = (state.into() & STATE_MASK) as u8;

    let header = HEADER_MARKER | (state << STATE_SHIFT) | index;

    EncodedPacket([
        header,
        (red & COLOR_MASK) as u8,
        (green & COLOR_MASK) as u8,
        (blue & COLOR_MASK) as u8,
    ])
}
