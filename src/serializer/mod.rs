//! Serializer negotiation (`SPEC_FULL.md` §4.4, §6.2).
//!
//! Grounded on `original_source/cis_interface/communication/AsciiTableComm.h`
//! (`update_serializer`, `simplify_formats`, `at_update`) and
//! `communication.h`'s serializer-type dispatch in `comm_recv_multipart`.
//!
//! The source aliases `serializer.info` with `endpoint.handle` for the table
//! family and frees them in a careful zero-then-free order. Re-architected per
//! `SPEC_FULL.md` §9 ("Cyclic ownership"): the serializer owns its `info`
//! outright as a tagged variant, and the endpoint owns the serializer — no
//! aliasing pointers, release is an ordinary recursive drop.

use crate::header::SerializerTag;

/// Per-endpoint serializer state. `Direct` carries no format information;
/// `Format`/`Array` carry a scanf-style format string; the ascii-table family
/// additionally tracks the table's logical address (its own endpoint name,
/// adopted on first recv per `SPEC_FULL.md` §4.4).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Serializer {
    Uninitialized,
    Direct,
    Format(String),
    Array(String),
    AsciiTable { format_str: String, table_address: Option<String> },
    AsciiTableArray { format_str: String, table_address: Option<String> },
}

impl Default for Serializer {
    fn default() -> Self {
        Serializer::Uninitialized
    }
}

impl Serializer {
    pub fn is_uninitialized(&self) -> bool {
        matches!(self, Serializer::Uninitialized)
    }

    pub fn tag(&self) -> Option<SerializerTag> {
        match self {
            Serializer::Uninitialized => None,
            Serializer::Direct => Some(SerializerTag::Direct),
            Serializer::Format(_) => Some(SerializerTag::Format),
            Serializer::Array(_) => Some(SerializerTag::Array),
            Serializer::AsciiTable { .. } | Serializer::AsciiTableArray { .. } => {
                Some(SerializerTag::AsciiTableFamily)
            }
        }
    }

    pub fn as_array_flag(&self) -> bool {
        matches!(self, Serializer::Array(_) | Serializer::AsciiTableArray { .. })
    }

    pub fn format_str(&self) -> Option<&str> {
        match self {
            Serializer::Format(f) | Serializer::Array(f) => Some(f),
            Serializer::AsciiTable { format_str, .. }
            | Serializer::AsciiTableArray { format_str, .. } => Some(format_str),
            _ => None,
        }
    }

    /// Adopt a type/format pulled from a peer's header on first recv
    /// (`update_serializer` in the source). `table_address` is filled in
    /// separately once the owning endpoint's own name is known to the caller.
    pub fn adopt(&mut self, tag: SerializerTag, format_str: Option<String>, as_array: bool) {
        *self = match tag {
            SerializerTag::Direct => Serializer::Direct,
            SerializerTag::Format => Serializer::Format(format_str.unwrap_or_default()),
            SerializerTag::Array => Serializer::Array(format_str.unwrap_or_default()),
            SerializerTag::AsciiTableFamily => {
                let format_str = format_str.unwrap_or_default();
                if as_array {
                    Serializer::AsciiTableArray {
                        format_str,
                        table_address: None,
                    }
                } else {
                    Serializer::AsciiTable {
                        format_str,
                        table_address: None,
                    }
                }
            }
        };
    }

    /// For the table family: adopt the endpoint's own name as the table's
    /// logical address, then simplify the recovered format string in place
    /// (`at_update` + `simplify_formats` in the source).
    pub fn adopt_table_address(&mut self, name: &str) {
        match self {
            Serializer::AsciiTable { table_address, format_str }
            | Serializer::AsciiTableArray { table_address, format_str } => {
                *table_address = Some(name.to_string());
                *format_str = simplify_table_formats(format_str);
            }
            Serializer::Format(format_str) => {
                *format_str = simplify_formats(format_str);
            }
            _ => {}
        }
    }
}

/// Strip width/precision/length modifiers from scanf-style format fragments,
/// e.g. `%10.3f` -> `%f`, `%ld` -> `%d`. Grounded on the source's
/// `simplify_formats`, which performs the equivalent in-place C-string scan.
pub fn simplify_formats(fmt: &str) -> String {
    let mut out = String::with_capacity(fmt.len());
    let mut chars = fmt.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }
        out.push('%');
        // Skip flags, width, precision, and length modifiers; keep the
        // terminating conversion specifier untouched.
        while let Some(&next) = chars.peek() {
            if next.is_ascii_digit() || matches!(next, '.' | '-' | '+' | ' ' | '#' | '0') {
                chars.next();
            } else {
                break;
            }
        }
        while let Some(&next) = chars.peek() {
            if matches!(next, 'l' | 'h' | 'L' | 'q' | 'j' | 'z' | 't') {
                chars.next();
            } else {
                break;
            }
        }
        if let Some(conv) = chars.next() {
            out.push(conv);
        }
    }
    out
}

/// Ascii-table variant of `simplify_formats` (`SPEC_FULL.md` §6.2): strips
/// width/precision/length modifiers exactly like the plain serializer does,
/// then additionally strips a leading column-delimiter token (an empty field
/// ahead of the first specifier, e.g. a format string carried as
/// `",%d,%s"`) and trims surrounding whitespace from each remaining field
/// specifier, matching how a table row is re-tokenised on every parse.
pub fn simplify_table_formats(fmt: &str) -> String {
    let modifiers_stripped = simplify_formats(fmt);
    let mut fields: Vec<&str> = modifiers_stripped.split(',').map(str::trim).collect();
    if fields.len() > 1 && fields.first() == Some(&"") {
        fields.remove(0);
    }
    fields.join(",")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simplify_strips_width_and_precision() {
        assert_eq!(simplify_formats("%10.3f"), "%f");
        assert_eq!(simplify_formats("%-5d, %s"), "%d, %s");
    }

    #[test]
    fn simplify_strips_length_modifiers() {
        assert_eq!(simplify_formats("%ld %lf"), "%d %f");
    }

    #[test]
    fn simplify_is_noop_on_plain_formats() {
        assert_eq!(simplify_formats("%d %s %f"), "%d %s %f");
    }

    #[test]
    fn table_formats_strip_leading_delimiter_and_whitespace() {
        assert_eq!(simplify_table_formats(" , %10.3f , %ld "), "%f,%d");
        assert_eq!(simplify_table_formats("%d,%s"), "%d,%s");
    }

    #[test]
    fn adopt_table_address_uses_table_simplification() {
        let mut s = Serializer::AsciiTable {
            format_str: " , %10.3f , %ld ".to_string(),
            table_address: None,
        };
        s.adopt_table_address("my-table");
        match s {
            Serializer::AsciiTable { format_str, table_address } => {
                assert_eq!(format_str, "%f,%d");
                assert_eq!(table_address.as_deref(), Some("my-table"));
            }
            _ => panic!("expected AsciiTable"),
        }
    }

    #[test]
    fn adopt_picks_table_family_by_as_array() {
        let mut s = Serializer::Uninitialized;
        s.adopt(SerializerTag::AsciiTableFamily, Some("%d".to_string()), true);
        assert!(matches!(s, Serializer::AsciiTableArray { .. }));
        let mut s2 = Serializer::Uninitialized;
        s2.adopt(SerializerTag::AsciiTableFamily, Some("%d".to_string()), false);
        assert!(matches!(s2, Serializer::AsciiTable { .. }));
    }
}
