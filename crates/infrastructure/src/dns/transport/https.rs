//! DNS-over-HTTPS transport (RFC 8484).
//!
//! Queries are sent as HTTP POST requests with `application/dns-message`
//! content type. The request body is the raw DNS wire format message, and the
//! response body contains the raw DNS wire format response.
//!
//! ```text
//! POST /dns-query HTTP/2
//! Content-Type: application/dns-message
//! Accept: application/dns-message
//!
//! <raw DNS message bytes>
//! ```

use super::tcp::MAX_TCP_MESSAGE_SIZE;
use super::udp::validate_response;
use ferrous_forward_domain::ForwardError;
use tracing::debug;

/// Expected content type for DNS-over-HTTPS responses (RFC 8484 §4.2.1)
pub const DNS_MESSAGE_CONTENT_TYPE: &str = "application/dns-message";

/// Maximum DoH response body accepted, the same ceiling as a TCP frame.
pub const MAX_DOH_RESPONSE_BYTES: usize = MAX_TCP_MESSAGE_SIZE;

pub async fn exchange(
    client: &reqwest::Client,
    url: &str,
    query: &[u8],
) -> Result<Vec<u8>, ForwardError> {
    debug!(url = %url, message_len = query.len(), "Sending DoH query");

    let mut response = client
        .post(url)
        .header("Content-Type", DNS_MESSAGE_CONTENT_TYPE)
        .header("Accept", DNS_MESSAGE_CONTENT_TYPE)
        .body(query.to_vec())
        .send()
        .await
        .map_err(|e| ForwardError::transport(url, format!("DoH request failed: {}", e)))?;

    let status = response.status();
    if !status.is_success() {
        return Err(ForwardError::transport(
            url,
            format!(
                "HTTP {}: {}",
                status.as_u16(),
                status.canonical_reason().unwrap_or("Unknown")
            ),
        ));
    }

    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    if !is_dns_message(content_type) {
        return Err(ForwardError::transport(
            url,
            format!("unexpected content type {:?}", content_type),
        ));
    }

    let mut body = Vec::new();
    while let Some(chunk) = response
        .chunk()
        .await
        .map_err(|e| ForwardError::transport(url, format!("Failed to read DoH response: {}", e)))?
    {
        if body.len() + chunk.len() > MAX_DOH_RESPONSE_BYTES {
            return Err(ForwardError::transport(
                url,
                format!("response body exceeds {} bytes", MAX_DOH_RESPONSE_BYTES),
            ));
        }
        body.extend_from_slice(&chunk);
    }

    debug!(url = %url, response_len = body.len(), "DoH response received");

    validate_response(query, &body)?;
    Ok(body)
}

fn is_dns_message(content_type: &str) -> bool {
    content_type
        .split(';')
        .next()
        .is_some_and(|media| media.trim().eq_ignore_ascii_case(DNS_MESSAGE_CONTENT_TYPE))
}
