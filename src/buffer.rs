//! Report assembly from LED packets.

use bytes::{BufMut, Bytes, BytesMut};
use tracing::debug;

use crate::packet::{LedUpdateRequest, PACKET_LEN};
use crate::session::MAX_REPORT_LEN;

/// Maximum number of LED packets fitting into a single report.
pub const PACKETS_PER_REPORT: usize = MAX_REPORT_LEN / PACKET_LEN;

/// Concatenated LED packets, ready to be handed to a device session.
#[derive(PartialEq, Eq, Debug, Clone)]
pub struct CommandBuffer(Bytes);

impl CommandBuffer {
    /// Encode all requests in order.
    ///
    /// The result is not limited to a single report, oversized buffers are
    /// rejected by the session when sending.
    pub fn build(requests: &[LedUpdateRequest]) -> Self {
        let mut buf = BytesMut::with_capacity(requests.len() * PACKET_LEN);

        for request in requests {
            let packet = request.encode();
            debug!(
                index = packet.index(),
                state = packet.state_bits(),
                rgb = ?packet.rgb(),
                packet = %packet,
                "encoded LED packet"
            );
            buf.put_slice(packet.as_bytes());
        }

        Self(buf.freeze())
    }

    /// Split requests into buffers which each fit into a single report.
    pub fn batches(requests: &[LedUpdateRequest]) -> Vec<Self> {
        requests.chunks(PACKETS_PER_REPORT).map(Self::build).collect()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}
