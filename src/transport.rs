//! HID transport abstraction.

use hidapi::{HidDevice, HidError};

/// Raw report I/O on an open HID device.
///
/// The device is released when the transport is dropped.
pub trait HidTransport {
    /// Write an output report, including its leading report ID.
    fn write(&self, data: &[u8]) -> Result<usize, HidError>;

    /// Read an input report, returning `0` if nothing arrived before the timeout.
    fn read_timeout(&self, buf: &mut [u8], timeout_ms: i32) -> Result<usize, HidError>;
}

impl HidTransport for HidDevice {
    fn write(&self, data: &[u8]) -> Result<usize, HidError> {
        HidDevice::write(self, data)
    }

    fn read_timeout(&self, buf: &mut [u8], timeout_ms: i32) -> Result<usize, HidError> {
        HidDevice::read_timeout(self, buf, timeout_ms)
    }
}
