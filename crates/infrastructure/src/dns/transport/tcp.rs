//! DNS over TCP (RFC 1035 §4.2.2): every message carries a 2-byte
//! big-endian length prefix.

use super::udp::validate_response;
use ferrous_forward_domain::ForwardError;
use std::net::SocketAddr;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::debug;

pub const MAX_TCP_MESSAGE_SIZE: usize = 65535;

/// Sends one framed query on `stream` and reads back one framed response.
pub async fn exchange<S>(
    stream: &mut S,
    server: SocketAddr,
    query: &[u8],
) -> Result<Vec<u8>, ForwardError>
where
    S: AsyncReadExt + AsyncWriteExt + Unpin,
{
    send_with_length_prefix(stream, server, query).await?;

    debug!(server = %server, message_len = query.len(), "TCP query sent");

    let response = read_with_length_prefix(stream, server).await?;

    debug!(server = %server, response_len = response.len(), "TCP response received");

    validate_response(query, &response)?;
    Ok(response)
}

pub(crate) async fn send_with_length_prefix<S>(
    stream: &mut S,
    server: SocketAddr,
    message_bytes: &[u8],
) -> Result<(), ForwardError>
where
    S: AsyncWriteExt + Unpin,
{
    let length = u16::try_from(message_bytes.len()).map_err(|_| {
        ForwardError::transport(
            server,
            format!("Message too large for TCP: {} bytes", message_bytes.len()),
        )
    })?;

    let mut framed = Vec::with_capacity(2 + message_bytes.len());
    framed.extend_from_slice(&length.to_be_bytes());
    framed.extend_from_slice(message_bytes);

    stream
        .write_all(&framed)
        .await
        .map_err(|e| ForwardError::transport(server, format!("Failed to write DNS message: {}", e)))?;
    stream
        .flush()
        .await
        .map_err(|e| ForwardError::transport(server, format!("Failed to flush stream: {}", e)))?;

    Ok(())
}

pub(crate) async fn read_with_length_prefix<S>(
    stream: &mut S,
    server: SocketAddr,
) -> Result<Vec<u8>, ForwardError>
where
    S: AsyncReadExt + Unpin,
{
    let mut len_buf = [0u8; 2];
    stream.read_exact(&mut len_buf).await.map_err(|e| {
        ForwardError::transport(server, format!("Failed to read response length: {}", e))
    })?;

    let response_len = u16::from_be_bytes(len_buf) as usize;
    if response_len == 0 {
        return Err(ForwardError::MalformedPacket(
            "zero-length TCP response".to_string(),
        ));
    }

    let mut response = vec![0u8; response_len];
    stream.read_exact(&mut response).await.map_err(|e| {
        ForwardError::transport(server, format!("Failed to read response body: {}", e))
    })?;

    Ok(response)
}
