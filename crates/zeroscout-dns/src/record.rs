//! Resource record and message types produced by the codec.

use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr};

/// Resource record TYPE values (RFC 1035, RFC 2782, RFC 3596).
///
/// Only the types DNS-SD resolution needs are first-class; everything else
/// is carried as `Other`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordType {
    /// IPv4 host address.
    A,
    /// Domain name pointer (service type to instance name in DNS-SD).
    Ptr,
    /// Key/value metadata strings.
    Txt,
    /// IPv6 host address.
    Aaaa,
    /// Service location (instance name to host and port).
    Srv,
    /// Any other record type, carried through undecoded.
    Other(u16),
}

impl RecordType {
    pub fn from_u16(value: u16) -> Self {
        match value {
            1 => RecordType::A,
            12 => RecordType::Ptr,
            16 => RecordType::Txt,
            28 => RecordType::Aaaa,
            33 => RecordType::Srv,
            other => RecordType::Other(other),
        }
    }

    pub fn as_u16(self) -> u16 {
        match self {
            RecordType::A => 1,
            RecordType::Ptr => 12,
            RecordType::Txt => 16,
            RecordType::Aaaa => 28,
            RecordType::Srv => 33,
            RecordType::Other(other) => other,
        }
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordType::A => write!(f, "A"),
            RecordType::Ptr => write!(f, "PTR"),
            RecordType::Txt => write!(f, "TXT"),
            RecordType::Aaaa => write!(f, "AAAA"),
            RecordType::Srv => write!(f, "SRV"),
            RecordType::Other(v) => write!(f, "TYPE{}", v),
        }
    }
}

/// Record CLASS values (RFC 1035). mDNS uses IN exclusively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordClass {
    In,
    Cs,
    Ch,
    Hs,
}

impl RecordClass {
    pub fn from_u16(value: u16) -> Option<Self> {
        match value {
            1 => Some(RecordClass::In),
            2 => Some(RecordClass::Cs),
            3 => Some(RecordClass::Ch),
            4 => Some(RecordClass::Hs),
            _ => None,
        }
    }

    pub fn as_u16(self) -> u16 {
        match self {
            RecordClass::In => 1,
            RecordClass::Cs => 2,
            RecordClass::Ch => 3,
            RecordClass::Hs => 4,
        }
    }
}

/// Decoded type-specific record payload.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RecordData {
    A(Ipv4Addr),
    Aaaa(Ipv6Addr),
    /// Target name, e.g. the instance name a service-type PTR points at.
    Ptr(String),
    Srv {
        priority: u16,
        weight: u16,
        port: u16,
        target: String,
    },
    /// The raw character-strings of a TXT record, one entry per string.
    Txt(Vec<String>),
    /// Undecoded payload of a record type outside the DNS-SD set.
    Other {
        rtype: u16,
        payload: Vec<u8>,
    },
}

impl RecordData {
    pub fn rtype(&self) -> RecordType {
        match self {
            RecordData::A(..) => RecordType::A,
            RecordData::Aaaa(..) => RecordType::Aaaa,
            RecordData::Ptr(..) => RecordType::Ptr,
            RecordData::Srv { .. } => RecordType::Srv,
            RecordData::Txt(..) => RecordType::Txt,
            RecordData::Other { rtype, .. } => RecordType::Other(*rtype),
        }
    }
}

/// A single resource record as it appeared on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceRecord {
    /// Owner name in FQDN form with a trailing dot.
    pub name: String,
    pub class: RecordClass,
    /// mDNS cache-flush bit (top bit of the wire class).
    pub cache_flush: bool,
    /// Remaining lifetime in seconds; 0 is a goodbye.
    pub ttl: u32,
    pub data: RecordData,
}

impl ResourceRecord {
    /// Convenience constructor for class-IN records.
    pub fn new(name: impl Into<String>, ttl: u32, data: RecordData) -> Self {
        Self {
            name: name.into(),
            class: RecordClass::In,
            cache_flush: false,
            ttl,
            data,
        }
    }

    /// Same record with the mDNS cache-flush bit set.
    pub fn with_cache_flush(mut self) -> Self {
        self.cache_flush = true;
        self
    }

    pub fn rtype(&self) -> RecordType {
        self.data.rtype()
    }
}

/// Question QTYPE values the client sends or surfaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QuestionType {
    A,
    Ptr,
    Txt,
    Aaaa,
    Srv,
    Any,
    Other(u16),
}

impl QuestionType {
    pub fn from_u16(value: u16) -> Self {
        match value {
            1 => QuestionType::A,
            12 => QuestionType::Ptr,
            16 => QuestionType::Txt,
            28 => QuestionType::Aaaa,
            33 => QuestionType::Srv,
            255 => QuestionType::Any,
            other => QuestionType::Other(other),
        }
    }

    pub fn as_u16(self) -> u16 {
        match self {
            QuestionType::A => 1,
            QuestionType::Ptr => 12,
            QuestionType::Txt => 16,
            QuestionType::Aaaa => 28,
            QuestionType::Srv => 33,
            QuestionType::Any => 255,
            QuestionType::Other(other) => other,
        }
    }
}

/// A question section entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    pub name: String,
    pub qtype: QuestionType,
}

impl Question {
    pub fn new(name: impl Into<String>, qtype: QuestionType) -> Self {
        Self {
            name: name.into(),
            qtype,
        }
    }
}

/// A decoded DNS message.
///
/// Answer, authority and additional records are flattened into `records`;
/// a DNS-SD client treats them uniformly (SRV and address records for an
/// announced instance routinely arrive in the additional section).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub id: u16,
    pub is_response: bool,
    pub questions: Vec<Question>,
    pub records: Vec<ResourceRecord>,
}
