//! Packet encoding: multicast queries and (for tests and in-process
//! injection) response packets.

use crate::name::write_name;
use crate::record::{Question, RecordData, ResourceRecord};
use thiserror::Error;

/// Errors raised while encoding a packet.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EncodeError {
    #[error("DNS label '{0}' exceeds 63 bytes")]
    LabelTooLong(String),

    #[error("name '{0}' exceeds 255 bytes")]
    NameTooLong(String),
}

const FLAG_RESPONSE: u16 = 0x8000;
const FLAG_AUTHORITATIVE: u16 = 0x0400;
const CLASS_IN: u16 = 1;
const CACHE_FLUSH: u16 = 0x8000;

fn write_header(buf: &mut Vec<u8>, id: u16, flags: u16, questions: u16, answers: u16) {
    buf.extend_from_slice(&id.to_be_bytes());
    buf.extend_from_slice(&flags.to_be_bytes());
    buf.extend_from_slice(&questions.to_be_bytes());
    buf.extend_from_slice(&answers.to_be_bytes());
    buf.extend_from_slice(&0u16.to_be_bytes());
    buf.extend_from_slice(&0u16.to_be_bytes());
}

/// Encodes a standard multicast query. mDNS one-shot queries carry id 0;
/// responses are matched through the cache, not the id.
pub fn query(id: u16, questions: &[Question]) -> Result<Vec<u8>, EncodeError> {
    let mut buf = Vec::with_capacity(512);
    write_header(&mut buf, id, 0, questions.len() as u16, 0);
    for question in questions {
        write_name(&mut buf, &question.name)?;
        buf.extend_from_slice(&question.qtype.as_u16().to_be_bytes());
        buf.extend_from_slice(&CLASS_IN.to_be_bytes());
    }
    Ok(buf)
}

/// Builds an authoritative response packet from resource records.
///
/// Names are written uncompressed, which keeps the builder simple and is
/// always valid on the wire.
pub struct ResponseBuilder {
    id: u16,
    records: Vec<ResourceRecord>,
}

impl ResponseBuilder {
    pub fn new(id: u16) -> Self {
        Self {
            id,
            records: Vec::new(),
        }
    }

    /// Appends an answer record.
    pub fn answer(mut self, record: ResourceRecord) -> Self {
        self.records.push(record);
        self
    }

    pub fn build(self) -> Result<Vec<u8>, EncodeError> {
        let mut buf = Vec::with_capacity(512);
        write_header(
            &mut buf,
            self.id,
            FLAG_RESPONSE | FLAG_AUTHORITATIVE,
            0,
            self.records.len() as u16,
        );
        for record in &self.records {
            write_record(&mut buf, record)?;
        }
        Ok(buf)
    }
}

fn write_record(buf: &mut Vec<u8>, record: &ResourceRecord) -> Result<(), EncodeError> {
    write_name(buf, &record.name)?;
    buf.extend_from_slice(&record.rtype().as_u16().to_be_bytes());
    let mut class = record.class.as_u16();
    if record.cache_flush {
        class |= CACHE_FLUSH;
    }
    buf.extend_from_slice(&class.to_be_bytes());
    buf.extend_from_slice(&record.ttl.to_be_bytes());

    // rdata length is backpatched once the payload is written.
    let size_offset = buf.len();
    buf.extend_from_slice(&0u16.to_be_bytes());
    let data_offset = buf.len();
    write_rdata(buf, &record.data)?;
    let rdlen = (buf.len() - data_offset) as u16;
    buf[size_offset..size_offset + 2].copy_from_slice(&rdlen.to_be_bytes());
    Ok(())
}

fn write_rdata(buf: &mut Vec<u8>, data: &RecordData) -> Result<(), EncodeError> {
    match data {
        RecordData::A(addr) => buf.extend_from_slice(&addr.octets()),
        RecordData::Aaaa(addr) => buf.extend_from_slice(&addr.octets()),
        RecordData::Ptr(target) => write_name(buf, target)?,
        RecordData::Srv {
            priority,
            weight,
            port,
            target,
        } => {
            buf.extend_from_slice(&priority.to_be_bytes());
            buf.extend_from_slice(&weight.to_be_bytes());
            buf.extend_from_slice(&port.to_be_bytes());
            write_name(buf, target)?;
        }
        RecordData::Txt(strings) => {
            if strings.is_empty() {
                // An empty TXT record still carries one zero-length string.
                buf.push(0);
            }
            for s in strings {
                let bytes = s.as_bytes();
                let len = bytes.len().min(255);
                buf.push(len as u8);
                buf.extend_from_slice(&bytes[..len]);
            }
        }
        RecordData::Other { payload, .. } => buf.extend_from_slice(payload),
    }
    Ok(())
}
