//! DNS over UDP (RFC 1035 §4.2.1).
//!
//! The socket is expected to be connected to the server. Responses are read
//! into a buffer one byte larger than the configured cap so an oversized
//! datagram is detected instead of silently cut.

use crate::dns::packet;
use ferrous_forward_domain::ForwardError;
use std::net::SocketAddr;
use tokio::net::UdpSocket;
use tracing::debug;

/// Outcome of one UDP exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UdpReply {
    Answer(Vec<u8>),
    /// The server set TC or the datagram exceeded the cap. Retry over TCP.
    Truncated,
}

pub async fn exchange(
    socket: &UdpSocket,
    server: SocketAddr,
    query: &[u8],
    max_response_bytes: usize,
) -> Result<UdpReply, ForwardError> {
    let bytes_sent = socket
        .send(query)
        .await
        .map_err(|e| ForwardError::transport(server, format!("UDP send failed: {}", e)))?;

    debug!(server = %server, bytes_sent, "UDP query sent");

    let mut recv_buf = vec![0u8; max_response_bytes + 1];
    let bytes_received = socket
        .recv(&mut recv_buf)
        .await
        .map_err(|e| ForwardError::transport(server, format!("UDP receive failed: {}", e)))?;
    recv_buf.truncate(bytes_received);

    debug!(server = %server, bytes_received, "UDP response received");

    validate_response(query, &recv_buf)?;

    if bytes_received > max_response_bytes {
        debug!(
            server = %server,
            bytes_received,
            max_response_bytes,
            "UDP response exceeds cap, treating as truncated"
        );
        return Ok(UdpReply::Truncated);
    }

    if packet::is_truncated(&recv_buf) {
        return Ok(UdpReply::Truncated);
    }

    Ok(UdpReply::Answer(recv_buf))
}

/// Rejects responses too short to carry a header, then checks the txid.
pub(crate) fn validate_response(query: &[u8], response: &[u8]) -> Result<(), ForwardError> {
    if response.len() < packet::HEADER_LEN {
        return Err(ForwardError::MalformedPacket(format!(
            "response of {} bytes is shorter than a DNS header",
            response.len()
        )));
    }
    let expected = packet::transaction_id(query)?;
    let got = packet::transaction_id(response)?;
    if expected != got {
        return Err(ForwardError::TransactionMismatch { expected, got });
    }
    Ok(())
}

#[cfg(test)]
#[path = "udp_test.rs"]
mod tests;
