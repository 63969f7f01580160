//! Tnetstring codec: `<decimal-length>":"<payload><type-tag>`.
//!
//! Supported tags: `,` string, `#` integer, `^` float, `!` boolean,
//! `~` null, `}` dict, `]` list. See spec §4.1.

use crate::error::{Mongrel2Error, Result};
use bytes::{BufMut, Bytes, BytesMut};
use indexmap::IndexMap;
use num_bigint::BigInt;
use std::str::FromStr;

/// A decoded tnetstring value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    String(Bytes),
    Int(BigInt),
    Float(f64),
    Bool(bool),
    Null,
    Dict(IndexMap<String, Value>),
    List(Vec<Value>),
}

impl Value {
    pub fn as_str(&self) -> Option<&[u8]> {
        match self {
            Value::String(b) => Some(b.as_ref()),
            _ => None,
        }
    }

    pub fn as_dict(&self) -> Option<&IndexMap<String, Value>> {
        match self {
            Value::Dict(d) => Some(d),
            _ => None,
        }
    }
}

fn err(msg: impl Into<String>) -> Mongrel2Error {
    Mongrel2Error::TNetstring(msg.into())
}

/// Decode one tnetstring from the front of `input`, returning the value and
/// whatever bytes follow it.
pub fn decode(input: &[u8]) -> Result<(Value, &[u8])> {
    let colon = input
        .iter()
        .position(|&b| b == b':')
        .ok_or_else(|| err("missing length prefix"))?;
    let len_digits = &input[..colon];
    if len_digits.is_empty() || !len_digits.iter().all(u8::is_ascii_digit) {
        return Err(err("non-numeric length prefix"));
    }
    let len: usize = std::str::from_utf8(len_digits)
        .unwrap()
        .parse()
        .map_err(|_| err("length prefix overflow"))?;

    let rest = &input[colon + 1..];
    if rest.len() < len + 1 {
        return Err(err("payload shorter than declared length"));
    }
    let payload = &rest[..len];
    let tag = rest[len];
    let remainder = &rest[len + 1..];

    let value = match tag {
        b',' => Value::String(Bytes::copy_from_slice(payload)),
        b'#' => {
            let s = std::str::from_utf8(payload).map_err(|_| err("integer not utf8"))?;
            let n = BigInt::from_str(s).map_err(|_| err("malformed integer"))?;
            Value::Int(n)
        }
        b'^' => {
            let s = std::str::from_utf8(payload).map_err(|_| err("float not utf8"))?;
            let f: f64 = s.parse().map_err(|_| err("malformed float"))?;
            Value::Float(f)
        }
        b'!' => match payload {
            b"true" => Value::Bool(true),
            b"false" => Value::Bool(false),
            _ => return Err(err("malformed boolean")),
        },
        b'~' => {
            if !payload.is_empty() {
                return Err(err("null payload must be empty"));
            }
            Value::Null
        }
        b'}' => {
            let mut dict = IndexMap::new();
            let mut cursor = payload;
            while !cursor.is_empty() {
                let (key, after_key) = decode(cursor)?;
                let key = match key {
                    Value::String(b) => String::from_utf8(b.to_vec())
                        .map_err(|_| err("dict key not utf8"))?,
                    _ => return Err(err("dict key must be a string")),
                };
                let (value, after_value) = decode(after_key)?;
                // last-wins on duplicate keys (spec §4.1, §9).
                dict.insert(key, value);
                cursor = after_value;
            }
            Value::Dict(dict)
        }
        b']' => {
            let mut items = Vec::new();
            let mut cursor = payload;
            while !cursor.is_empty() {
                let (value, after) = decode(cursor)?;
                items.push(value);
                cursor = after;
            }
            Value::List(items)
        }
        other => return Err(err(format!("unknown type tag {:?}", other as char))),
    };

    Ok((value, remainder))
}

/// Encode one value as a tnetstring, appended to `out`.
pub fn encode(value: &Value, out: &mut BytesMut) {
    let mut payload = BytesMut::new();
    let tag: u8 = match value {
        Value::String(b) => {
            payload.put_slice(b);
            b','
        }
        Value::Int(n) => {
            payload.put_slice(n.to_string().as_bytes());
            b'#'
        }
        Value::Float(f) => {
            payload.put_slice(format!("{}", f).as_bytes());
            b'^'
        }
        Value::Bool(b) => {
            payload.put_slice(if *b { b"true" } else { b"false" });
            b'!'
        }
        Value::Null => b'~',
        Value::Dict(dict) => {
            for (k, v) in dict {
                encode(&Value::String(Bytes::copy_from_slice(k.as_bytes())), &mut payload);
                encode(v, &mut payload);
            }
            b'}'
        }
        Value::List(items) => {
            for item in items {
                encode(item, &mut payload);
            }
            b']'
        }
    };
    out.put_slice(payload.len().to_string().as_bytes());
    out.put_u8(b':');
    out.put_slice(&payload);
    out.put_u8(tag);
}

pub fn encode_to_bytes(value: &Value) -> Bytes {
    let mut buf = BytesMut::new();
    encode(value, &mut buf);
    buf.freeze()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(v: Value) {
        let encoded = encode_to_bytes(&v);
        let (decoded, remainder) = decode(&encoded).expect("decode");
        assert!(remainder.is_empty());
        assert_eq!(decoded, v);
    }

    #[test]
    fn roundtrips_every_tag() {
        roundtrip(Value::String(Bytes::from_static(b"hello")));
        roundtrip(Value::Int(BigInt::from(42)));
        roundtrip(Value::Int(BigInt::from_str("123456789012345678901234567890").unwrap()));
        roundtrip(Value::Float(3.5));
        roundtrip(Value::Bool(true));
        roundtrip(Value::Bool(false));
        roundtrip(Value::Null);
        roundtrip(Value::List(vec![Value::Int(BigInt::from(1)), Value::Int(BigInt::from(2))]));

        let mut dict = IndexMap::new();
        dict.insert("PATH".to_string(), Value::String(Bytes::from_static(b"/")));
        roundtrip(Value::Dict(dict));
    }

    #[test]
    fn decode_example_from_spec() {
        // headers = {"PATH":"/"}, body empty.
        let input = b"11:4:PATH,1:/,}0:,";
        let (headers, rest) = decode(input).expect("decode headers");
        let dict = headers.as_dict().expect("dict");
        assert_eq!(dict.get("PATH").unwrap().as_str(), Some(b"/".as_ref()));
        let (body, rest2) = decode(rest).expect("decode body");
        assert_eq!(body.as_str(), Some(b"".as_ref()));
        assert!(rest2.is_empty());
    }

    #[test]
    fn duplicate_dict_keys_last_wins() {
        // {"a":1,"a":2}
        let input = b"16:1:a,1:1#1:a,1:2#}";
        let (v, _) = decode(input).expect("decode");
        let dict = v.as_dict().unwrap();
        assert_eq!(dict.len(), 1);
        assert_eq!(dict.get("a").unwrap(), &Value::Int(BigInt::from(2)));
    }

    #[test]
    fn malformed_length_prefix_errors() {
        assert!(decode(b"x:abc,").is_err());
    }

    #[test]
    fn short_payload_errors() {
        assert!(decode(b"10:abc,").is_err());
    }

    #[test]
    fn wrong_type_tag_errors() {
        assert!(decode(b"3:abc?").is_err());
    }
}
