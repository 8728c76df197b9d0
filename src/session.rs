//! Scoped access to the LED device.

use bytes::{BufMut, BytesMut};
use hidapi::{HidApi, HidDevice, HidError};
use tracing::{debug, info, warn};

use crate::buffer::CommandBuffer;
use crate::response::ResponseOutcome;
use crate::transport::HidTransport;

/// USB vendor ID of the LED device.
pub const VENDOR_ID: u16 = 0x4c4f;

/// USB product ID of the LED device.
pub const PRODUCT_ID: u16 = 0x494c;

/// Report ID prepended to every output report.
pub const REPORT_ID: u8 = 0x00;

/// Maximum report payload, excluding the report ID.
pub const MAX_REPORT_LEN: usize = 64;

#[derive(thiserror::Error, Debug)]
pub enum SessionError {
    #[error("unable to open device {vendor_id:04x}:{product_id:04x}: {source}")]
    DeviceNotFound {
        vendor_id: u16,
        product_id: u16,
        #[source]
        source: HidError,
    },
    #[error("unable to write report: {0}")]
    WriteError(#[source] HidError),
    #[error("unable to read report: {0}")]
    ReadError(#[source] HidError),
    #[error("report of {len} bytes exceeds the {max} byte limit")]
    BufferTooLarge { len: usize, max: usize },
    #[error("device session is closed")]
    Closed,
}

#[derive(PartialEq, Eq, Debug, Copy, Clone)]
pub enum SessionState {
    Open,
    Closed,
}

/// Open handle to the LED device.
///
/// The handle is released exactly once, either by [`DeviceSession::close`] or
/// when the session is dropped.
pub struct DeviceSession<T: HidTransport = HidDevice> {
    handle: Option<T>,
}

impl DeviceSession<HidDevice> {
    pub fn open(api: &HidApi, vendor_id: u16, product_id: u16) -> Result<Self, SessionError> {
        let device = api
            .open(vendor_id, product_id)
            .map_err(|source| SessionError::DeviceNotFound { vendor_id, product_id, source })?;

        info!(vendor_id, product_id, "opened LED device");

        Ok(Self::from_transport(device))
    }
}

impl<T: HidTransport> DeviceSession<T> {
    /// Wrap an already opened transport.
    pub fn from_transport(transport: T) -> Self {
        Self { handle: Some(transport) }
    }

    pub fn state(&self) -> SessionState {
        match self.handle {
            Some(_) => SessionState::Open,
            None => SessionState::Closed,
        }
    }

    /// Send all packets of a buffer as one output report.
    pub fn send(&mut self, buffer: CommandBuffer) -> Result<(), SessionError> {
        let device = self.handle.as_ref().ok_or(SessionError::Closed)?;

        if buffer.len() > MAX_REPORT_LEN {
            warn!(len = buffer.len(), "refusing to send oversized report");
            return Err(SessionError::BufferTooLarge { len: buffer.len(), max: MAX_REPORT_LEN });
        }

        let mut report = BytesMut::with_capacity(buffer.len() + 1);
        report.put_u8(REPORT_ID);
        report.put_slice(buffer.as_bytes());

        let written = device.write(&report).map_err(SessionError::WriteError)?;
        debug!(len = report.len(), written, "report written");

        Ok(())
    }

    /// Wait for a status report from the device.
    pub fn receive(
        &mut self,
        max_bytes: usize,
        timeout_ms: i32,
    ) -> Result<ResponseOutcome, SessionError> {
        let device = self.handle.as_ref().ok_or(SessionError::Closed)?;

        let mut report = vec![0; max_bytes];
        let read = device.read_timeout(&mut report, timeout_ms).map_err(SessionError::ReadError)?;
        debug!(read, timeout_ms, "report read");

        Ok(ResponseOutcome::from_report(&report[..read]))
    }

    /// Release the device handle.
    ///
    /// Closing an already closed session does nothing.
    pub fn close(&mut self) {
        if self.handle.take().is_some() {
            info!("closed LED device");
        }
    }
}

impl<T: HidTransport> Drop for DeviceSession<T> {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::cell::{Cell, RefCell};
    use std::collections::VecDeque;
    use std::rc::Rc;

    use super::*;
    use crate::packet::{LedPowerState, LedUpdateRequest};

    /// In-memory HID device.
    #[derive(Default)]
    pub(crate) struct MockTransport {
        pub writes: Rc<RefCell<Vec<Vec<u8>>>>,
        pub reads: Rc<RefCell<VecDeque<Vec<u8>>>>,
        pub releases: Rc<Cell<usize>>,
        pub fail_writes: bool,
    }

    impl HidTransport for MockTransport {
        fn write(&self, data: &[u8]) -> Result<usize, HidError> {
            if self.fail_writes {
                return Err(HidError::HidApiError { message: "device unplugged".into() });
            }

            self.writes.borrow_mut().push(data.to_vec());
            Ok(data.len())
        }

        fn read_timeout(&self, buf: &mut [u8], _timeout_ms: i32) -> Result<usize, HidError> {
            match self.reads.borrow_mut().pop_front() {
                Some(report) => {
                    let len = report.len().min(buf.len());
                    buf[..len].copy_from_slice(&report[..len]);
                    Ok(len)
                },
                None => Ok(0),
            }
        }
    }

    impl Drop for MockTransport {
        fn drop(&mut self) {
            self.releases.set(self.releases.get() + 1);
        }
    }

    fn requests(count: i64) -> Vec<LedUpdateRequest> {
        (0..count).map(|i| LedUpdateRequest::new(i, LedPowerState::On, 0, 0, 255)).collect()
    }

    #[test]
    fn send_prepends_report_id() {
        let mock = MockTransport::default();
        let writes = mock.writes.clone();
        let mut session = DeviceSession::from_transport(mock);

        session.send(CommandBuffer::build(&requests(2))).unwrap();

        let writes = writes.borrow();
        assert_eq!(writes.len(), 1);
        assert_eq!(writes[0], vec![0x00, 0xa0, 0x00, 0x00, 0xff, 0xa1, 0x00, 0x00, 0xff]);
    }

    #[test]
    fn full_report_is_sent() {
        let mock = MockTransport::default();
        let writes = mock.writes.clone();
        let mut session = DeviceSession::from_transport(mock);

        session.send(CommandBuffer::build(&requests(16))).unwrap();

        assert_eq!(writes.borrow()[0].len(), MAX_REPORT_LEN + 1);
    }

    #[test]
    fn oversized_buffer_is_rejected() {
        let mock = MockTransport::default();
        let writes = mock.writes.clone();
        let mut session = DeviceSession::from_transport(mock);

        let result = session.send(CommandBuffer::build(&requests(17)));

        assert!(matches!(result, Err(SessionError::BufferTooLarge { len: 68, max: 64 })));
        assert!(writes.borrow().is_empty());
        assert_eq!(session.state(), SessionState::Open);
    }

    #[test]
    fn write_failure_is_surfaced() {
        let mut mock = MockTransport::default();
        mock.fail_writes = true;
        let mut session = DeviceSession::from_transport(mock);

        let result = session.send(CommandBuffer::build(&requests(1)));

        assert!(matches!(result, Err(SessionError::WriteError(_))));
    }

    #[test]
    fn receive_returns_first_byte() {
        let mock = MockTransport::default();
        mock.reads.borrow_mut().push_back(vec![0x2a, 0x01, 0x02]);
        let mut session = DeviceSession::from_transport(mock);

        let outcome = session.receive(MAX_REPORT_LEN, 100).unwrap();

        assert_eq!(outcome, ResponseOutcome::StatusCode(0x2a));
    }

    #[test]
    fn receive_without_data_times_out() {
        let mut session = DeviceSession::from_transport(MockTransport::default());

        let outcome = session.receive(MAX_REPORT_LEN, 100).unwrap();

        assert_eq!(outcome, ResponseOutcome::Timeout);
    }

    #[test]
    fn zero_status_is_not_timeout() {
        let mock = MockTransport::default();
        mock.reads.borrow_mut().push_back(vec![0x00; MAX_REPORT_LEN]);
        let mut session = DeviceSession::from_transport(mock);

        assert_eq!(session.receive(MAX_REPORT_LEN, 100).unwrap(), ResponseOutcome::StatusCode(0));
    }

    #[test]
    fn double_close_is_noop() {
        let mock = MockTransport::default();
        let releases = mock.releases.clone();
        let mut session = DeviceSession::from_transport(mock);

        session.close();
        session.close();

        assert_eq!(session.state(), SessionState::Closed);
        drop(session);
        assert_eq!(releases.get(), 1);
    }

    #[test]
    fn drop_releases_handle() {
        let mock = MockTransport::default();
        let releases = mock.releases.clone();

        {
            let _session = DeviceSession::from_transport(mock);
        }

        assert_eq!(releases.get(), 1);
    }

    #[test]
    fn io_after_close_fails() {
        let mut session = DeviceSession::from_transport(MockTransport::default());
        session.close();

        assert!(matches!(session.send(CommandBuffer::build(&[])), Err(SessionError::Closed)));
        assert!(matches!(session.receive(MAX_REPORT_LEN, 100), Err(SessionError::Closed)));
    }
}
