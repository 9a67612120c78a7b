//! Datagram decoding: raw bytes to a `Message`.

use crate::name::read_name;
use crate::record::{
    Message, Question, QuestionType, RecordClass, RecordData, RecordType, ResourceRecord,
};
use thiserror::Error;

mod flag {
    pub const RESPONSE: u16 = 0b1000_0000_0000_0000;
    pub const RESERVED_MASK: u16 = 0b0000_0000_0111_0000;
    pub const CLASS_MASK: u16 = 0x7fff;
    pub const CACHE_FLUSH: u16 = 0x8000;
}

/// Errors raised while decoding a packet. All of them mean the datagram is
/// dropped by the receive loop; none are fatal to the client.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("packet shorter than the 12-byte header")]
    HeaderTooShort,

    #[error("packet truncated mid-record")]
    UnexpectedEof,

    #[error("reserved header flags are set")]
    ReservedBitsSet,

    #[error("compression pointer out of bounds or looping")]
    BadPointer,

    #[error("unknown label tag bits")]
    UnknownLabelFormat,

    #[error("name label is not valid UTF-8")]
    LabelNotUtf8,

    #[error("unknown record class {0}")]
    UnknownClass(u16),

    #[error("rdata length does not match the record type")]
    WrongRdataLength,
}

fn read_u16(data: &[u8], offset: usize) -> Result<u16, DecodeError> {
    let bytes: [u8; 2] = data
        .get(offset..offset + 2)
        .ok_or(DecodeError::UnexpectedEof)?
        .try_into()
        .unwrap();
    Ok(u16::from_be_bytes(bytes))
}

fn read_u32(data: &[u8], offset: usize) -> Result<u32, DecodeError> {
    let bytes: [u8; 4] = data
        .get(offset..offset + 4)
        .ok_or(DecodeError::UnexpectedEof)?
        .try_into()
        .unwrap();
    Ok(u32::from_be_bytes(bytes))
}

/// Decodes one DNS datagram.
///
/// Answer, authority and additional records are surfaced together in
/// `Message::records`. Unknown record types decode into
/// `RecordData::Other`; malformed input yields a `DecodeError`.
pub fn decode(data: &[u8]) -> Result<Message, DecodeError> {
    if data.len() < 12 {
        return Err(DecodeError::HeaderTooShort);
    }
    let id = read_u16(data, 0)?;
    let flags = read_u16(data, 2)?;
    if flags & flag::RESERVED_MASK != 0 {
        return Err(DecodeError::ReservedBitsSet);
    }
    let is_response = flags & flag::RESPONSE != 0;
    let questions_count = read_u16(data, 4)?;
    let answers = read_u16(data, 6)?;
    let nameservers = read_u16(data, 8)?;
    let additional = read_u16(data, 10)?;

    let mut offset = 12;

    let mut questions = Vec::with_capacity(questions_count as usize);
    for _ in 0..questions_count {
        let (name, consumed) = read_name(data, offset)?;
        offset += consumed;
        let qtype = read_u16(data, offset)?;
        let qclass = read_u16(data, offset + 2)?;
        offset += 4;
        // The QU bit shares the class field's top bit; a client only needs
        // the question name and type, so the class is validated and dropped.
        RecordClass::from_u16(qclass & flag::CLASS_MASK)
            .ok_or(DecodeError::UnknownClass(qclass & flag::CLASS_MASK))?;
        questions.push(Question::new(name, QuestionType::from_u16(qtype)));
    }

    let record_count = answers as usize + nameservers as usize + additional as usize;
    let mut records = Vec::with_capacity(record_count);
    for _ in 0..record_count {
        records.push(read_record(data, &mut offset)?);
    }

    Ok(Message {
        id,
        is_response,
        questions,
        records,
    })
}

fn read_record(data: &[u8], offset: &mut usize) -> Result<ResourceRecord, DecodeError> {
    let (name, consumed) = read_name(data, *offset)?;
    *offset += consumed;

    let rtype = read_u16(data, *offset)?;
    let class_raw = read_u16(data, *offset + 2)?;
    let mut ttl = read_u32(data, *offset + 4)?;
    let rdlen = read_u16(data, *offset + 8)? as usize;
    *offset += 10;

    // RFC 2181 §8: TTLs with the top bit set are treated as zero.
    if ttl > i32::MAX as u32 {
        ttl = 0;
    }

    let cache_flush = class_raw & flag::CACHE_FLUSH != 0;
    let class = RecordClass::from_u16(class_raw & flag::CLASS_MASK)
        .ok_or(DecodeError::UnknownClass(class_raw & flag::CLASS_MASK))?;

    if *offset + rdlen > data.len() {
        return Err(DecodeError::UnexpectedEof);
    }
    let rdata = read_rdata(rtype, data, *offset, rdlen)?;
    *offset += rdlen;

    Ok(ResourceRecord {
        name,
        class,
        cache_flush,
        ttl,
        data: rdata,
    })
}

fn read_rdata(
    rtype: u16,
    packet: &[u8],
    start: usize,
    len: usize,
) -> Result<RecordData, DecodeError> {
    match RecordType::from_u16(rtype) {
        RecordType::A => {
            if len != 4 {
                return Err(DecodeError::WrongRdataLength);
            }
            let octets: [u8; 4] = packet[start..start + 4].try_into().unwrap();
            Ok(RecordData::A(octets.into()))
        }
        RecordType::Aaaa => {
            if len != 16 {
                return Err(DecodeError::WrongRdataLength);
            }
            let octets: [u8; 16] = packet[start..start + 16].try_into().unwrap();
            Ok(RecordData::Aaaa(octets.into()))
        }
        RecordType::Ptr => {
            let (target, _) = read_name(packet, start)?;
            Ok(RecordData::Ptr(target))
        }
        RecordType::Srv => {
            if len < 7 {
                return Err(DecodeError::WrongRdataLength);
            }
            let priority = read_u16(packet, start)?;
            let weight = read_u16(packet, start + 2)?;
            let port = read_u16(packet, start + 4)?;
            let (target, _) = read_name(packet, start + 6)?;
            Ok(RecordData::Srv {
                priority,
                weight,
                port,
                target,
            })
        }
        RecordType::Txt => {
            let mut strings = Vec::new();
            let mut pos = start;
            let end = start + len;
            while pos < end {
                let slen = packet[pos] as usize;
                pos += 1;
                if pos + slen > end {
                    return Err(DecodeError::WrongRdataLength);
                }
                strings.push(String::from_utf8_lossy(&packet[pos..pos + slen]).into_owned());
                pos += slen;
            }
            Ok(RecordData::Txt(strings))
        }
        RecordType::Other(other) => Ok(RecordData::Other {
            rtype: other,
            payload: packet[start..start + len].to_vec(),
        }),
    }
}
