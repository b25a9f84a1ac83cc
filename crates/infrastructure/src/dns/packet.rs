//! Raw DNS packet inspection.
//!
//! Everything here works directly on wire-format bytes without building a
//! message tree. Upstream-controlled bytes flow through these functions, so
//! every read is bounds-checked and malformed input degrades to a sentinel or
//! a no-op instead of panicking.

use ferrous_forward_domain::ForwardError;

pub const HEADER_LEN: usize = 12;
pub const TYPE_OPT: u16 = 41;

pub const RCODE_NOERROR: u8 = 0;
pub const RCODE_SERVFAIL: u8 = 2;
pub const RCODE_NXDOMAIN: u8 = 3;
pub const RCODE_REFUSED: u8 = 5;

const FLAG_QR: u16 = 0x8000;
const FLAG_OPCODE: u16 = 0x7800;
const FLAG_TC: u16 = 0x0200;
const FLAG_RD: u16 = 0x0100;
const FLAG_RA: u16 = 0x0080;

/// type(2) + class(2) + ttl(4) + rdlength(2)
const RR_FIXED_LEN: usize = 10;

pub fn transaction_id(packet: &[u8]) -> Result<u16, ForwardError> {
    match packet {
        [hi, lo, ..] => Ok(u16::from_be_bytes([*hi, *lo])),
        _ => Err(ForwardError::MalformedPacket(format!(
            "{} bytes is too short for a transaction id",
            packet.len()
        ))),
    }
}

/// Returns the 4-bit RCODE of `packet`.
///
/// Packets too short to hold a header report [`RCODE_REFUSED`]. That value is
/// a sentinel for "no trustworthy code", not an answer observed from a server.
pub fn response_code(packet: &[u8]) -> u8 {
    if packet.len() < HEADER_LEN {
        return RCODE_REFUSED;
    }
    packet[3] & 0x0F
}

pub fn is_truncated(packet: &[u8]) -> bool {
    flags(packet).is_some_and(|f| f & FLAG_TC != 0)
}

pub fn set_truncated(packet: &mut [u8]) {
    if let Some(f) = flags(packet) {
        packet[2..4].copy_from_slice(&(f | FLAG_TC).to_be_bytes());
    }
}

/// Lowers the UDP payload size advertised by an OPT record to `max_size`.
///
/// No-op when there is no OPT record, when it already advertises `max_size`
/// or less, or when any part of the packet up to and including the OPT record
/// cannot be walked.
pub fn clamp_edns_size(packet: &mut [u8], max_size: u16) {
    let Some(offset) = opt_payload_size_offset(packet) else {
        return;
    };
    let advertised = u16::from_be_bytes([packet[offset], packet[offset + 1]]);
    if advertised > max_size {
        packet[offset..offset + 2].copy_from_slice(&max_size.to_be_bytes());
    }
}

/// Decodes the first question's name, e.g. `"example.com."`.
pub fn question_name(packet: &[u8]) -> Option<String> {
    if packet.len() < HEADER_LEN || u16_at(packet, 4)? == 0 {
        return None;
    }

    let mut name = String::new();
    let mut pos = HEADER_LEN;
    loop {
        let len = *packet.get(pos)? as usize;
        if len == 0 {
            break;
        }
        // queries are never compressed
        if len & 0xC0 != 0 {
            return None;
        }
        let label = packet.get(pos + 1..pos + 1 + len)?;
        name.push_str(&String::from_utf8_lossy(label));
        name.push('.');
        pos += 1 + len;
    }

    if name.is_empty() {
        name.push('.');
    }
    Some(name)
}

/// Builds a SERVFAIL answer to `query` carrying its id and question section.
pub fn servfail_response(query: &[u8]) -> Option<Vec<u8>> {
    let query_flags = flags(query)?;
    if query.len() < HEADER_LEN {
        return None;
    }

    let mut end = HEADER_LEN;
    for _ in 0..u16_at(query, 4)? {
        end = skip_question(query, end)?;
    }

    let mut response = query[..end].to_vec();
    let response_flags =
        FLAG_QR | (query_flags & (FLAG_OPCODE | FLAG_RD)) | FLAG_RA | u16::from(RCODE_SERVFAIL);
    response[2..4].copy_from_slice(&response_flags.to_be_bytes());
    // ANCOUNT, NSCOUNT, ARCOUNT
    response[6..HEADER_LEN].fill(0);
    Some(response)
}

fn flags(packet: &[u8]) -> Option<u16> {
    u16_at(packet, 2)
}

fn u16_at(packet: &[u8], pos: usize) -> Option<u16> {
    let bytes = packet.get(pos..pos.checked_add(2)?)?;
    Some(u16::from_be_bytes([bytes[0], bytes[1]]))
}

/// Returns the offset just past the (possibly compressed) name at `pos`.
fn skip_name(packet: &[u8], mut pos: usize) -> Option<usize> {
    loop {
        let len = *packet.get(pos)?;
        match len & 0xC0 {
            0x00 if len == 0 => return Some(pos + 1),
            0x00 => pos = pos.checked_add(1 + len as usize)?,
            0xC0 => {
                packet.get(pos + 1)?;
                return Some(pos + 2);
            }
            // 0x40 / 0x80 label types are obsolete or reserved
            _ => return None,
        }
    }
}

fn skip_question(packet: &[u8], pos: usize) -> Option<usize> {
    let end = skip_name(packet, pos)?.checked_add(4)?;
    (end <= packet.len()).then_some(end)
}

fn skip_record(packet: &[u8], pos: usize) -> Option<usize> {
    let fixed = skip_name(packet, pos)?;
    let rdlength = u16_at(packet, fixed.checked_add(8)?)? as usize;
    let end = fixed.checked_add(RR_FIXED_LEN + rdlength)?;
    (end <= packet.len()).then_some(end)
}

/// Offset of the CLASS field (the UDP payload size) of the first OPT record
/// in the additional section.
fn opt_payload_size_offset(packet: &[u8]) -> Option<usize> {
    if packet.len() < HEADER_LEN {
        return None;
    }
    let qdcount = u16_at(packet, 4)?;
    let ancount = u16_at(packet, 6)?;
    let nscount = u16_at(packet, 8)?;
    let arcount = u16_at(packet, 10)?;

    let mut pos = HEADER_LEN;
    for _ in 0..qdcount {
        pos = skip_question(packet, pos)?;
    }
    for _ in 0..u32::from(ancount) + u32::from(nscount) {
        pos = skip_record(packet, pos)?;
    }
    for _ in 0..arcount {
        let type_pos = skip_name(packet, pos)?;
        let next = skip_record(packet, pos)?;
        if u16_at(packet, type_pos)? == TYPE_OPT {
            return Some(type_pos + 2);
        }
        pos = next;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    const MAX: u16 = 4095;

    fn google_query_with_opt(options: &[u8]) -> Vec<u8> {
        let mut packet = vec![
            0xaf, 0x66, 0x01, 0x20, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x01,
        ];
        packet.extend_from_slice(&[
            0x06, b'g', b'o', b'o', b'g', b'l', b'e', 0x03, b'c', b'o', b'm', 0x00, 0x00, 0x01,
            0x00, 0x01,
        ]);
        packet.extend_from_slice(&[0x00, 0x00, 0x29, 0x10, 0x00, 0x00, 0x00, 0x80, 0x00]);
        packet.extend_from_slice(&(options.len() as u16).to_be_bytes());
        packet.extend_from_slice(options);
        packet
    }

    #[test]
    fn test_transaction_id() {
        assert_eq!(transaction_id(&[0xC4, 0xFE, 0x81]).unwrap(), 0xC4FE);
        assert!(transaction_id(&[0xC4]).is_err());
        assert!(transaction_id(&[]).is_err());
    }

    #[test]
    fn test_response_code_table() {
        let cases: [(&[u8], u8); 5] = [
            (&[], RCODE_REFUSED),
            (&[0, 0, 0, 0, 0, 0, 0, 0, 0, 0], RCODE_REFUSED),
            (
                &[0xC4, 0xFE, 0x81, 0xA0, 0x00, 0x01, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01],
                RCODE_NOERROR,
            ),
            (
                &[0xee, 0xa1, 0x81, 0x05, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x01],
                RCODE_REFUSED,
            ),
            (
                &[0x34, 0xf4, 0x81, 0x83, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x00, 0x01],
                RCODE_NXDOMAIN,
            ),
        ];
        for (packet, want) in cases {
            assert_eq!(response_code(packet), want, "packet {:02x?}", packet);
        }
    }

    #[test]
    fn test_truncation_flag() {
        let mut packet = [0x12, 0x34, 0x81, 0x80, 0, 0, 0, 0, 0, 0, 0, 0];
        assert!(!is_truncated(&packet));
        set_truncated(&mut packet);
        assert!(is_truncated(&packet));
        assert_eq!(packet[2], 0x83);

        let mut short = [0x12, 0x34, 0x81];
        set_truncated(&mut short);
        assert_eq!(short, [0x12, 0x34, 0x81]);
        assert!(!is_truncated(&short));
    }

    #[test]
    fn test_clamp_empty_opt() {
        let mut packet = google_query_with_opt(&[]);
        clamp_edns_size(&mut packet, MAX);
        assert_eq!(&packet[31..33], &MAX.to_be_bytes());
    }

    #[test]
    fn test_clamp_opt_with_cookie() {
        let cookie = [
            0x00, 0x0a, 0x00, 0x08, 0x62, 0x18, 0x1a, 0xcb, 0x19, 0xd7, 0xee, 0x23,
        ];
        let mut packet = google_query_with_opt(&cookie);
        let before = packet.clone();
        clamp_edns_size(&mut packet, MAX);
        assert_eq!(&packet[31..33], &MAX.to_be_bytes());
        assert_eq!(&packet[33..], &before[33..], "only the size field may change");
    }

    #[test]
    fn test_clamp_leaves_smaller_size_alone() {
        let mut packet = google_query_with_opt(&[]);
        packet[31..33].copy_from_slice(&1232u16.to_be_bytes());
        let before = packet.clone();
        clamp_edns_size(&mut packet, MAX);
        assert_eq!(packet, before);
    }

    #[test]
    fn test_clamp_skips_compressed_answers() {
        let mut packet = google_query_with_opt(&[]);
        // ANCOUNT = 1
        packet[7] = 0x01;
        let opt = packet.split_off(28);
        packet.extend_from_slice(&[
            0xC0, 0x0C, 0x00, 0x01, 0x00, 0x01, 0x00, 0x00, 0x01, 0x2c, 0x00, 0x04, 142, 250,
            80, 46,
        ]);
        packet.extend_from_slice(&opt);
        clamp_edns_size(&mut packet, 1232);
        assert_eq!(&packet[28 + 16 + 3..28 + 16 + 5], &1232u16.to_be_bytes());
    }

    #[test]
    fn test_clamp_ignores_truncated_opt() {
        let mut packet = google_query_with_opt(&[]);
        packet.truncate(packet.len() - 1);
        let before = packet.clone();
        clamp_edns_size(&mut packet, MAX);
        assert_eq!(packet, before);
    }

    #[test]
    fn test_clamp_header_only() {
        let mut packet = vec![0x12, 0x34, 0x01, 0x20, 0, 0, 0, 0, 0, 0, 0, 0];
        clamp_edns_size(&mut packet, MAX);
        assert_eq!(packet, vec![0x12, 0x34, 0x01, 0x20, 0, 0, 0, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn test_question_name() {
        let packet = google_query_with_opt(&[]);
        assert_eq!(question_name(&packet).as_deref(), Some("google.com."));
        assert_eq!(question_name(&packet[..15]), None);
    }

    #[test]
    fn test_servfail_response_keeps_question() {
        let query = google_query_with_opt(&[]);
        let response = servfail_response(&query).unwrap();
        assert_eq!(response.len(), 28);
        assert_eq!(transaction_id(&response).unwrap(), 0xaf66);
        assert_eq!(response_code(&response), RCODE_SERVFAIL);
        assert_eq!(response[2] & 0x80, 0x80, "QR must be set");
        assert_eq!(response[2] & 0x01, 0x01, "RD must be copied");
        assert_eq!(&response[4..6], &[0x00, 0x01]);
        assert_eq!(&response[6..12], &[0; 6]);
        assert_eq!(&response[12..], &query[12..28]);
    }

    #[test]
    fn test_servfail_response_rejects_garbage() {
        assert!(servfail_response(&[0x01, 0x02, 0x03]).is_none());
        let mut query = google_query_with_opt(&[]);
        query.truncate(20);
        assert!(servfail_response(&query).is_none());
    }
}
