use crate::dns::close_pool::{ClosePool, Registration};
use crate::dns::packet::{self, HEADER_LEN};
use bytes::Bytes;
use ferrous_forward_domain::ForwardError;
use tokio_util::sync::CancellationToken;

/// One in-flight forwarded query.
///
/// The packet is immutable once created. Every socket or request opened on
/// behalf of this query is registered in its [`ClosePool`].
#[derive(Debug)]
pub struct ForwardQuery {
    packet: Bytes,
    txid: u16,
    pool: ClosePool,
    done: CancellationToken,
}

impl ForwardQuery {
    pub fn new(packet: impl Into<Bytes>) -> Result<Self, ForwardError> {
        let packet = packet.into();
        if packet.len() < HEADER_LEN {
            return Err(ForwardError::MalformedPacket(format!(
                "query of {} bytes is shorter than a DNS header",
                packet.len()
            )));
        }
        let txid = packet::transaction_id(&packet)?;
        Ok(Self {
            packet,
            txid,
            pool: ClosePool::new(),
            done: CancellationToken::new(),
        })
    }

    pub fn packet(&self) -> &[u8] {
        &self.packet
    }

    pub fn txid(&self) -> u16 {
        self.txid
    }

    pub fn pool(&self) -> &ClosePool {
        &self.pool
    }

    pub fn is_finished(&self) -> bool {
        self.done.is_cancelled()
    }

    pub async fn finished(&self) {
        self.done.cancelled().await
    }

    /// Marks the query done and closes everything still open for it.
    pub fn finish(&self) {
        self.done.cancel();
        self.pool.close();
    }

    /// Opens a pool entry for one socket or request. The returned token is
    /// cancelled when the pool closes, the query finishes, or the
    /// registration is dropped.
    pub(crate) fn register(&self) -> (CancellationToken, Registration) {
        let token = self.done.child_token();
        let registration = self.pool.add(token.clone());
        (token, registration)
    }
}
