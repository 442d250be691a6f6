//! The variadic convenience layer (`SPEC_FULL.md` §4.9, §9 "Variadic
//! serialise/deserialise").
//!
//! The source takes a C va_list straight through to a format-string
//! `sprintf`/`sscanf` pair. There is no va_list equivalent in Rust; this
//! module re-architects the same convenience as a typed `Value` enum and a
//! `serialize`/`deserialize` pair operating on slices, per the Design Notes.

use crate::endpoint::Endpoint;
use crate::error::{CommError, CommResult};
use crate::framing;
use crate::serializer::Serializer;

/// A single tagged argument to `vsend`/`vrecv`. `Bytes` is the only variant
/// a `Direct` serializer accepts; the others are formatted against the
/// endpoint's negotiated format string.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int(i64),
    Float(f64),
    Str(String),
    Bytes(Vec<u8>),
}

/// `vsend` (§4.9): format `args` against `ep`'s serializer and forward the
/// result through framed `send`. Returns the number of arguments the
/// serializer actually consumed.
pub async fn vsend(ep: &mut Endpoint, args: &[Value]) -> CommResult<usize> {
    let (bytes, consumed) = serialize(ep.active_serializer()?, args)?;
    framing::send(ep, &bytes).await?;
    Ok(consumed)
}

/// `vrecv` (§4.9): framed `recv` with realloc permitted, then deserialise the
/// body against `ep`'s (by now negotiated) serializer. Returns `None` on
/// EOF rather than an empty argument list, so callers can't mistake one for
/// the other.
pub async fn vrecv(ep: &mut Endpoint) -> CommResult<Option<Vec<Value>>> {
    match framing::recv(ep).await? {
        crate::error::RecvOutcome::Eof => Ok(None),
        crate::error::RecvOutcome::Data(bytes) => {
            deserialize(ep.active_serializer()?, &bytes).map(Some)
        }
    }
}

/// Scan a scanf-style format string for its conversion specifiers, in
/// order, skipping flags/width/precision/length modifiers the same way
/// `serializer::simplify_formats` does.
fn specifiers(fmt: &str) -> Vec<char> {
    let mut out = Vec::new();
    let mut chars = fmt.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '%' {
            continue;
        }
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
            if conv != '%' {
                out.push(conv);
            }
        }
    }
    out
}

fn format_value(spec: char, value: &Value) -> CommResult<String> {
    match (spec, value) {
        ('d' | 'i' | 'u', Value::Int(n)) => Ok(n.to_string()),
        ('d' | 'i' | 'u', Value::Float(n)) => Ok((*n as i64).to_string()),
        ('f' | 'e' | 'g', Value::Float(n)) => Ok(n.to_string()),
        ('f' | 'e' | 'g', Value::Int(n)) => Ok((*n as f64).to_string()),
        ('s', Value::Str(s)) => Ok(s.clone()),
        ('s', Value::Bytes(b)) => Ok(String::from_utf8_lossy(b).into_owned()),
        _ => Err(CommError::SerializerFailure(format!(
            "argument {value:?} doesn't match format specifier %{spec}"
        ))),
    }
}

fn parse_token(spec: char, token: &str) -> CommResult<Value> {
    match spec {
        'd' | 'i' | 'u' => token
            .parse::<i64>()
            .map(Value::Int)
            .map_err(|_| CommError::SerializerFailure(format!("token {token:?} is not an integer"))),
        'f' | 'e' | 'g' => token
            .parse::<f64>()
            .map(Value::Float)
            .map_err(|_| CommError::SerializerFailure(format!("token {token:?} is not a float"))),
        's' => Ok(Value::Str(token.to_string())),
        other => Err(CommError::SerializerFailure(format!(
            "unsupported format specifier %{other}"
        ))),
    }
}

/// `serialize(serializer, buf, args)` (§4.9): returns the encoded bytes and
/// how many of `args` were consumed.
pub fn serialize(serializer: &Serializer, args: &[Value]) -> CommResult<(Vec<u8>, usize)> {
    match serializer {
        Serializer::Uninitialized | Serializer::Direct => {
            let Some(Value::Bytes(bytes)) = args.first() else {
                return Err(CommError::SerializerFailure(
                    "a direct serializer requires a single Bytes argument".to_string(),
                ));
            };
            Ok((bytes.clone(), 1))
        }
        Serializer::Format(fmt) | Serializer::Array(fmt) => {
            let specs = specifiers(fmt);
            if args.len() < specs.len() {
                return Err(CommError::SerializerFailure(format!(
                    "format {fmt:?} needs {} arguments, got {}",
                    specs.len(),
                    args.len()
                )));
            }
            let mut fields = Vec::with_capacity(specs.len());
            for (spec, value) in specs.iter().zip(args.iter()) {
                fields.push(format_value(*spec, value)?);
            }
            Ok((fields.join(" ").into_bytes(), specs.len()))
        }
        Serializer::AsciiTable { format_str, .. } | Serializer::AsciiTableArray { format_str, .. } => {
            let specs = specifiers(format_str);
            if args.len() < specs.len() {
                return Err(CommError::SerializerFailure(format!(
                    "table format {format_str:?} needs {} arguments, got {}",
                    specs.len(),
                    args.len()
                )));
            }
            let mut fields = Vec::with_capacity(specs.len());
            for (spec, value) in specs.iter().zip(args.iter()) {
                fields.push(format_value(*spec, value)?);
            }
            Ok((fields.join(",").into_bytes(), specs.len()))
        }
    }
}

/// `deserialize(serializer, buf, bytes, out_args)` (§4.9): the inverse of
/// `serialize`.
pub fn deserialize(serializer: &Serializer, bytes: &[u8]) -> CommResult<Vec<Value>> {
    match serializer {
        Serializer::Uninitialized | Serializer::Direct => Ok(vec![Value::Bytes(bytes.to_vec())]),
        Serializer::Format(fmt) | Serializer::Array(fmt) => {
            let text = std::str::from_utf8(bytes)
                .map_err(|e| CommError::SerializerFailure(format!("payload is not valid utf-8: {e}")))?;
            parse_row(fmt, text, text.split_whitespace())
        }
        Serializer::AsciiTable { format_str, .. } | Serializer::AsciiTableArray { format_str, .. } => {
            let text = std::str::from_utf8(bytes)
                .map_err(|e| CommError::SerializerFailure(format!("payload is not valid utf-8: {e}")))?;
            parse_row(format_str, text, text.split(','))
        }
    }
}

fn parse_row<'a>(
    fmt: &str,
    text: &str,
    tokens: impl Iterator<Item = &'a str>,
) -> CommResult<Vec<Value>> {
    let specs = specifiers(fmt);
    let tokens: Vec<&str> = tokens.map(str::trim).collect();
    if tokens.len() < specs.len() {
        return Err(CommError::SerializerFailure(format!(
            "row {text:?} has {} fields, format {fmt:?} expects {}",
            tokens.len(),
            specs.len()
        )));
    }
    specs
        .into_iter()
        .zip(tokens)
        .map(|(spec, token)| parse_token(spec, token))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direct_serializer_passes_bytes_through() {
        let (bytes, consumed) = serialize(&Serializer::Direct, &[Value::Bytes(b"hi".to_vec())]).unwrap();
        assert_eq!(bytes, b"hi");
        assert_eq!(consumed, 1);
    }

    #[test]
    fn format_serializer_round_trips_mixed_types() {
        let serializer = Serializer::Format("%d %f %s".to_string());
        let args = vec![Value::Int(7), Value::Float(1.5), Value::Str("ok".to_string())];
        let (bytes, consumed) = serialize(&serializer, &args).unwrap();
        assert_eq!(consumed, 3);
        let decoded = deserialize(&serializer, &bytes).unwrap();
        assert_eq!(decoded, vec![Value::Int(7), Value::Float(1.5), Value::Str("ok".to_string())]);
    }

    #[test]
    fn table_serializer_uses_comma_fields() {
        let serializer = Serializer::AsciiTable {
            format_str: "%d,%d".to_string(),
            table_address: None,
        };
        let args = vec![Value::Int(1), Value::Int(2)];
        let (bytes, _) = serialize(&serializer, &args).unwrap();
        assert_eq!(bytes, b"1,2");
        let decoded = deserialize(&serializer, &bytes).unwrap();
        assert_eq!(decoded, vec![Value::Int(1), Value::Int(2)]);
    }

    #[test]
    fn missing_arguments_are_rejected() {
        let serializer = Serializer::Format("%d %d".to_string());
        assert!(serialize(&serializer, &[Value::Int(1)]).is_err());
    }
}
