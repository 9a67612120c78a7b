//! DNS name label encoding and compressed-name scanning.

use crate::decode::DecodeError;
use crate::encode::EncodeError;

/// Compression pointers a single name may follow before the packet is
/// declared malformed.
const MAX_POINTER_HOPS: usize = 16;

/// Reads a (possibly compressed) name starting at `offset` within `packet`.
///
/// Returns the name in FQDN form with a trailing dot and the number of
/// bytes the name occupies at `offset` (pointers count as two bytes at the
/// site of the jump, not the pointed-to labels).
pub(crate) fn read_name(packet: &[u8], offset: usize) -> Result<(String, usize), DecodeError> {
    let mut name = String::new();
    let mut pos = offset;
    let mut consumed = None;
    let mut hops = 0;

    loop {
        let byte = *packet.get(pos).ok_or(DecodeError::UnexpectedEof)?;

        if byte == 0 {
            if consumed.is_none() {
                consumed = Some(pos + 1 - offset);
            }
            if name.is_empty() {
                name.push('.');
            }
            return Ok((name, consumed.unwrap()));
        } else if byte & 0b1100_0000 == 0b1100_0000 {
            let hi = byte;
            let lo = *packet.get(pos + 1).ok_or(DecodeError::UnexpectedEof)?;
            let target = (u16::from_be_bytes([hi, lo]) & 0b0011_1111_1111_1111) as usize;
            if target >= packet.len() {
                return Err(DecodeError::BadPointer);
            }
            hops += 1;
            if hops > MAX_POINTER_HOPS {
                return Err(DecodeError::BadPointer);
            }
            if consumed.is_none() {
                consumed = Some(pos + 2 - offset);
            }
            pos = target;
        } else if byte & 0b1100_0000 == 0 {
            let len = byte as usize;
            let start = pos + 1;
            let end = start + len;
            if end > packet.len() {
                return Err(DecodeError::UnexpectedEof);
            }
            let label = std::str::from_utf8(&packet[start..end])
                .map_err(|_| DecodeError::LabelNotUtf8)?;
            name.push_str(label);
            name.push('.');
            pos = end;
        } else {
            return Err(DecodeError::UnknownLabelFormat);
        }
    }
}

/// Appends `name` to `buf` as uncompressed length-prefixed labels.
///
/// Accepts names with or without a trailing dot; empty labels are skipped,
/// so "host.local." and "host.local" encode identically.
pub(crate) fn write_name(buf: &mut Vec<u8>, name: &str) -> Result<(), EncodeError> {
    let start = buf.len();
    for label in name.split('.').filter(|l| !l.is_empty()) {
        if label.len() > 63 {
            return Err(EncodeError::LabelTooLong(label.to_string()));
        }
        buf.push(label.len() as u8);
        buf.extend_from_slice(label.as_bytes());
    }
    buf.push(0);
    if buf.len() - start > 255 {
        return Err(EncodeError::NameTooLong(name.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_name_round_trips() {
        let mut buf = Vec::new();
        write_name(&mut buf, "_http._tcp.local.").unwrap();
        let (name, consumed) = read_name(&buf, 0).unwrap();
        assert_eq!(name, "_http._tcp.local.");
        assert_eq!(consumed, buf.len());
    }

    #[test]
    fn trailing_dot_is_optional_on_encode() {
        let mut with_dot = Vec::new();
        let mut without = Vec::new();
        write_name(&mut with_dot, "host.local.").unwrap();
        write_name(&mut without, "host.local").unwrap();
        assert_eq!(with_dot, without);
    }

    #[test]
    fn follows_compression_pointer() {
        // "local." at offset 0, then "host" + pointer to offset 0.
        let mut packet = Vec::new();
        write_name(&mut packet, "local.").unwrap();
        let host_at = packet.len();
        packet.push(4);
        packet.extend_from_slice(b"host");
        packet.extend_from_slice(&[0xC0, 0x00]);

        let (name, consumed) = read_name(&packet, host_at).unwrap();
        assert_eq!(name, "host.local.");
        assert_eq!(consumed, 7);
    }

    #[test]
    fn self_referential_pointer_errors() {
        // A pointer that loops back to itself must not hang or recurse.
        let packet = [0xC0, 0x00];
        assert!(matches!(
            read_name(&packet, 0),
            Err(DecodeError::BadPointer)
        ));
    }

    #[test]
    fn pointer_past_end_errors() {
        let packet = [0xC0, 0x7F];
        assert!(matches!(
            read_name(&packet, 0),
            Err(DecodeError::BadPointer)
        ));
    }

    #[test]
    fn truncated_label_errors() {
        // Length byte says 17 bytes but only 3 follow.
        let packet = [0x11, b'a', b'b', b'c'];
        assert!(matches!(
            read_name(&packet, 0),
            Err(DecodeError::UnexpectedEof)
        ));
    }

    #[test]
    fn oversized_label_rejected_on_encode() {
        let label = "x".repeat(64);
        let mut buf = Vec::new();
        assert!(matches!(
            write_name(&mut buf, &label),
            Err(EncodeError::LabelTooLong(_))
        ));
    }
}
