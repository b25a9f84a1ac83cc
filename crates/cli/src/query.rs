use hickory_proto::op::{Message, MessageType, OpCode, Query};
use hickory_proto::rr::{DNSClass, Name, RecordType};
use hickory_proto::serialize::binary::{BinEncodable, BinEncoder};
use std::str::FromStr;

/// Builds a recursive query for `domain` with a random transaction ID.
pub fn build_query(domain: &str, record_type: RecordType) -> anyhow::Result<Vec<u8>> {
    let name = Name::from_str(domain)?;

    let mut query = Query::new();
    query.set_name(name);
    query.set_query_type(record_type);
    query.set_query_class(DNSClass::IN);

    let mut message = Message::new(fastrand::u16(..), MessageType::Query, OpCode::Query);
    message.metadata.recursion_desired = true;
    message.add_query(query);

    let mut buf = Vec::with_capacity(512);
    let mut encoder = BinEncoder::new(&mut buf);
    message.emit(&mut encoder)?;
    Ok(buf)
}

pub fn parse_record_type(s: &str) -> Result<RecordType, String> {
    RecordType::from_str(&s.to_ascii_uppercase()).map_err(|e| format!("{}: {}", s, e))
}
