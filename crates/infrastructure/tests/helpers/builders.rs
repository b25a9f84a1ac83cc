#![allow(dead_code)]
use ferrous_forward_domain::{ResolverAndDelay, ResolverSpec};
use hickory_proto::op::{Message, MessageType, OpCode, Query};
use hickory_proto::rr::{DNSClass, Name, RecordType};
use hickory_proto::serialize::binary::{BinEncodable, BinEncoder};
use std::net::Ipv4Addr;
use std::str::FromStr;
use std::time::Duration;

pub struct ResolverBuilder;

impl ResolverBuilder {
    pub fn parse(inputs: &[&str]) -> Vec<ResolverSpec> {
        inputs.iter().map(|s| s.parse().unwrap()).collect()
    }

    pub fn immediate(resolver: ResolverSpec) -> ResolverAndDelay {
        ResolverAndDelay::immediate(resolver)
    }

    pub fn delayed(resolver: ResolverSpec, millis: u64) -> ResolverAndDelay {
        ResolverAndDelay::delayed(resolver, Duration::from_millis(millis))
    }

    /// Renders a plan as `resolver+delay` strings.
    pub fn describe(plan: &[ResolverAndDelay]) -> Vec<String> {
        plan.iter().map(|rr| rr.to_string()).collect()
    }
}

pub struct PacketBuilder;

impl PacketBuilder {
    /// A recursive query with one question, no EDNS.
    pub fn query(id: u16, domain: &str, record_type: RecordType) -> Vec<u8> {
        let mut query = Query::new();
        query.set_name(Name::from_str(domain).unwrap());
        query.set_query_type(record_type);
        query.set_query_class(DNSClass::IN);

        let mut message = Message::new(id, MessageType::Query, OpCode::Query);
        message.metadata.recursion_desired = true;
        message.add_query(query);

        let mut buf = Vec::with_capacity(512);
        let mut encoder = BinEncoder::new(&mut buf);
        message.emit(&mut encoder).unwrap();
        buf
    }

    pub fn a_query(id: u16, domain: &str) -> Vec<u8> {
        Self::query(id, domain, RecordType::A)
    }

    /// Appends an OPT record advertising `udp_size` to a message.
    pub fn with_edns(mut packet: Vec<u8>, udp_size: u16) -> Vec<u8> {
        packet.push(0x00);
        packet.extend_from_slice(&41u16.to_be_bytes());
        packet.extend_from_slice(&udp_size.to_be_bytes());
        packet.extend_from_slice(&[0, 0, 0, 0, 0, 0]);
        let arcount = u16::from_be_bytes([packet[10], packet[11]]) + 1;
        packet[10..12].copy_from_slice(&arcount.to_be_bytes());
        packet
    }

    /// Response echoing `query`'s header and question with one A record per
    /// address. Answer names are compressed pointers to the question.
    pub fn a_response(query: &[u8], addrs: &[Ipv4Addr]) -> Vec<u8> {
        let question_end = Self::question_end(query);
        let mut response = query[..question_end].to_vec();
        response[2] = 0x80 | (query[2] & 0x01);
        response[3] = 0x80;
        response[6..8].copy_from_slice(&(addrs.len() as u16).to_be_bytes());
        response[8..12].copy_from_slice(&[0, 0, 0, 0]);

        for addr in addrs {
            response.extend_from_slice(&[0xC0, 0x0C, 0x00, 0x01, 0x00, 0x01]);
            response.extend_from_slice(&300u32.to_be_bytes());
            response.extend_from_slice(&[0x00, 0x04]);
            response.extend_from_slice(&addr.octets());
        }
        response
    }

    /// Response whose answers repeat the full owner name on every record,
    /// so `count` records easily exceed a UDP cap.
    pub fn uncompressed_a_response(query: &[u8], domain: &str, count: u8) -> Vec<u8> {
        let question_end = Self::question_end(query);
        let mut response = query[..question_end].to_vec();
        response[2] = 0x80 | (query[2] & 0x01);
        response[3] = 0x80;
        response[6..8].copy_from_slice(&(count as u16).to_be_bytes());
        response[8..12].copy_from_slice(&[0, 0, 0, 0]);

        let owner = Self::encode_name(domain);
        for i in 0..count {
            response.extend_from_slice(&owner);
            response.extend_from_slice(&[0x00, 0x01, 0x00, 0x01]);
            response.extend_from_slice(&300u32.to_be_bytes());
            response.extend_from_slice(&[0x00, 0x04, 127, 0, 0, i]);
        }
        response
    }

    pub fn with_rcode(mut packet: Vec<u8>, rcode: u8) -> Vec<u8> {
        packet[3] = (packet[3] & 0xF0) | (rcode & 0x0F);
        packet
    }

    pub fn with_truncated(mut packet: Vec<u8>) -> Vec<u8> {
        packet[2] |= 0x02;
        packet
    }

    pub fn with_txid(mut packet: Vec<u8>, id: u16) -> Vec<u8> {
        packet[..2].copy_from_slice(&id.to_be_bytes());
        packet
    }

    pub fn encode_name(domain: &str) -> Vec<u8> {
        let mut out = Vec::with_capacity(domain.len() + 2);
        for label in domain.trim_end_matches('.').split('.') {
            out.push(label.len() as u8);
            out.extend_from_slice(label.as_bytes());
        }
        out.push(0);
        out
    }

    /// Offset just past the (single, uncompressed) question of a query.
    fn question_end(query: &[u8]) -> usize {
        let mut pos = 12;
        while query[pos] != 0 {
            pos += 1 + query[pos] as usize;
        }
        pos + 1 + 4
    }
}
