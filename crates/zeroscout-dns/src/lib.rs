//! DNS wire-format codec for mDNS (RFC 1035 framing with RFC 6762
//! extensions).
//!
//! This crate is the pluggable codec boundary of the discovery client:
//! `decode` turns a raw datagram into a list of resource records, and the
//! encoder side produces multicast query packets (plus a response builder
//! used for tests and in-process record injection). The record types are
//! limited to what DNS-SD resolution needs — PTR, SRV, TXT, A and AAAA —
//! with everything else carried through opaquely.
//!
//! mDNS details handled here:
//! - the cache-flush bit is masked off the record class and surfaced
//!   separately,
//! - TTLs above `i32::MAX` are clamped to 0,
//! - compressed names are followed with pointer and hop guards so a
//!   malformed packet yields a `DecodeError`, never a panic.

pub mod decode;
pub mod encode;
mod name;
pub mod record;

pub use decode::{decode, DecodeError};
pub use encode::{query, EncodeError, ResponseBuilder};
pub use record::{
    Message, Question, QuestionType, RecordClass, RecordData, RecordType, ResourceRecord,
};
