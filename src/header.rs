//! ASCII `KEY=VALUE` frame header codec (`SPEC_FULL.md` §3, §4.2, §6.3).
//!
//! Grounded on `original_source/cis_interface/communication/communication.h`'s
//! `comm_head_t`, `comm_send_multipart_header` and `parse_comm_header`. The
//! source's header is a fixed C struct formatted into a preallocated buffer;
//! here it is a plain value type with an explicit `encode`/`decode` pair, since
//! there is no buffer-reuse concern in safe Rust.

use crate::error::CommError;

/// Serializer kind carried in the header on first-use sends. Tag values match
/// `SPEC_FULL.md` §3's documented 4-way scheme (see `DESIGN.md`'s Open
/// Question resolution for why this diverges from the source's inconsistent
/// 3-tag encoding).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SerializerTag {
    Direct = 0,
    Format = 1,
    Array = 2,
    AsciiTableFamily = 3,
}

impl SerializerTag {
    fn to_u8(self) -> u8 {
        self as u8
    }

    fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(SerializerTag::Direct),
            1 => Some(SerializerTag::Format),
            2 => Some(SerializerTag::Array),
            3 => Some(SerializerTag::AsciiTableFamily),
            _ => None,
        }
    }
}

/// A single frame header. Values, not references: built fresh per send,
/// parsed fresh per recv (`SPEC_FULL.md` §3, "Lifecycle").
#[derive(Debug, Clone, Default)]
pub struct Header {
    pub size: usize,
    pub multipart: bool,
    pub address: Option<String>,
    pub id: String,
    pub request_id: Option<String>,
    pub response_address: Option<String>,
    pub serializer_type: Option<SerializerTag>,
    pub format_str: Option<String>,
    pub as_array: bool,
    /// Populated by `decode`: offset of the body within the decoded frame.
    pub bodybeg: usize,
    /// Populated by `decode`: length of the inline body tail, if any.
    pub bodysiz: usize,
}

impl Default for SerializerTag {
    fn default() -> Self {
        SerializerTag::Direct
    }
}

const DELIM: &str = "--\n";

impl Header {
    pub fn new(size: usize, id: String) -> Self {
        Header {
            size,
            id,
            ..Default::default()
        }
    }

    /// Render the header as the ASCII `KEY=VALUE` block described in
    /// `SPEC_FULL.md` §6.3, terminated by the `--` delimiter line.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = String::new();
        out.push_str(&format!("size={}\n", self.size));
        out.push_str(&format!("multipart={}\n", self.multipart as u8));
        out.push_str(&format!("id={}\n", self.id));
        if let Some(addr) = &self.address {
            out.push_str(&format!("address={}\n", addr));
        }
        if let Some(rid) = &self.request_id {
            out.push_str(&format!("request_id={}\n", rid));
        }
        if let Some(resp) = &self.response_address {
            out.push_str(&format!("response_address={}\n", resp));
        }
        if let Some(tag) = self.serializer_type {
            out.push_str(&format!("serializer_type={}\n", tag.to_u8()));
        }
        if let Some(fmt) = &self.format_str {
            out.push_str(&format!("format_str={}\n", fmt));
        }
        if self.as_array {
            out.push_str("as_array=1\n");
        }
        out.push_str(DELIM);
        out.into_bytes()
    }

    /// Parse a header + trailing body out of a raw frame. `bodybeg`/`bodysiz`
    /// describe the inline tail after the delimiter (which may be empty for a
    /// multipart header sent ahead of an ephemeral chunk stream).
    pub fn decode(frame: &[u8]) -> Result<Self, CommError> {
        let delim = DELIM.as_bytes();
        let delim_pos = frame
            .windows(delim.len())
            .position(|w| w == delim)
            .ok_or_else(|| CommError::HeaderParseFailure("missing header delimiter".to_string()))?;
        let header_text = std::str::from_utf8(&frame[..delim_pos]).map_err(|e| {
            CommError::HeaderParseFailure(format!("header is not valid utf-8: {e}"))
        })?;
        let bodybeg = delim_pos + delim.len();
        let bodysiz = frame.len() - bodybeg;

        let mut header = Header {
            bodybeg,
            bodysiz,
            ..Default::default()
        };
        let mut size_set = false;
        for line in header_text.lines() {
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            match key {
                "size" => {
                    header.size = value.parse().map_err(|_| {
                        CommError::HeaderParseFailure(format!("bad size field: {value:?}"))
                    })?;
                    size_set = true;
                }
                "multipart" => header.multipart = value == "1",
                "id" => header.id = value.to_string(),
                "address" => header.address = Some(value.to_string()),
                "request_id" => header.request_id = Some(value.to_string()),
                "response_address" => header.response_address = Some(value.to_string()),
                "serializer_type" => {
                    let tag: u8 = value.parse().map_err(|_| {
                        CommError::HeaderParseFailure(format!(
                            "bad serializer_type field: {value:?}"
                        ))
                    })?;
                    header.serializer_type = Some(SerializerTag::from_u8(tag).ok_or_else(|| {
                        CommError::HeaderParseFailure(format!("unknown serializer_type: {tag}"))
                    })?);
                }
                "format_str" => header.format_str = Some(value.to_string()),
                "as_array" => header.as_array = value == "1",
                _ => {}
            }
        }
        if !size_set {
            return Err(CommError::HeaderParseFailure(
                "header missing required `size` field".to_string(),
            ));
        }
        Ok(header)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_basic_fields() {
        let mut h = Header::new(42, "123".to_string());
        h.multipart = true;
        h.address = Some("chunk-addr".to_string());
        h.serializer_type = Some(SerializerTag::Format);
        h.format_str = Some("%d %f".to_string());

        let mut frame = h.encode();
        frame.extend_from_slice(b"");
        let decoded = Header::decode(&frame).unwrap();
        assert_eq!(decoded.size, 42);
        assert!(decoded.multipart);
        assert_eq!(decoded.address.as_deref(), Some("chunk-addr"));
        assert_eq!(decoded.serializer_type, Some(SerializerTag::Format));
        assert_eq!(decoded.format_str.as_deref(), Some("%d %f"));
    }

    #[test]
    fn inline_tail_is_recoverable() {
        let h = Header::new(5, "1".to_string());
        let mut frame = h.encode();
        frame.extend_from_slice(b"hello");
        let decoded = Header::decode(&frame).unwrap();
        assert_eq!(decoded.bodysiz, 5);
        assert_eq!(&frame[decoded.bodybeg..], b"hello");
    }

    #[test]
    fn binary_inline_tail_is_not_parsed_as_utf8() {
        let h = Header::new(4, "1".to_string());
        let mut frame = h.encode();
        frame.extend_from_slice(&[0xff, 0x00, 0xfe, 0x80]);
        let decoded = Header::decode(&frame).unwrap();
        assert_eq!(decoded.bodysiz, 4);
        assert_eq!(&frame[decoded.bodybeg..], &[0xff, 0x00, 0xfe, 0x80]);
    }

    #[test]
    fn rejects_missing_delimiter() {
        assert!(Header::decode(b"size=1\n").is_err());
    }

    #[test]
    fn rejects_missing_size() {
        let frame = b"id=1\n--\n".to_vec();
        assert!(Header::decode(&frame).is_err());
    }
}
