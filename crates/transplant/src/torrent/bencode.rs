//! Strict bencode decoder and canonical encoder.
//!
//! The decoder rejects trailing data, leading zeros, negative zero and
//! nesting deeper than [`MAX_DEPTH`]. Dictionaries are held in a
//! [`BTreeMap`] so encoding always emits keys in sorted order.

use std::collections::BTreeMap;
use std::ops::Range;

use super::error::TorrentError;

/// Maximum nesting of lists and dictionaries accepted by the decoder.
pub const MAX_DEPTH: usize = 64;

pub type Dict = BTreeMap<Vec<u8>, Value>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Int(i64),
    Bytes(Vec<u8>),
    List(Vec<Value>),
    Dict(Dict),
}

impl Value {
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        self.as_bytes().and_then(|b| std::str::from_utf8(b).ok())
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(l) => Some(l),
            _ => None,
        }
    }

    pub fn as_dict(&self) -> Option<&Dict> {
        match self {
            Value::Dict(d) => Some(d),
            _ => None,
        }
    }

    /// Dictionary lookup by UTF-8 key. Returns `None` for non-dictionaries.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.as_dict().and_then(|d| d.get(key.as_bytes()))
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Bytes(s.as_bytes().to_vec())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Bytes(s.into_bytes())
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

/// Decode a complete bencoded document.
pub fn parse(data: &[u8]) -> Result<Value, TorrentError> {
    let mut decoder = Decoder::new(data);
    let value = decoder.value(0)?;
    decoder.finish()?;
    Ok(value)
}

/// Decode a top-level dictionary, also returning the byte range every value
/// occupied in `data`. Used to hash the `info` dictionary exactly as written.
pub fn parse_dict_with_spans(
    data: &[u8],
) -> Result<(Dict, BTreeMap<Vec<u8>, Range<usize>>), TorrentError> {
    let mut decoder = Decoder::new(data);
    if decoder.peek()? != b'd' {
        return Err(TorrentError::malformed("top level is not a dictionary"));
    }
    decoder.pos += 1;

    let mut dict = Dict::new();
    let mut spans = BTreeMap::new();
    loop {
        if decoder.peek()? == b'e' {
            decoder.pos += 1;
            break;
        }
        let key = decoder.raw_bytes()?;
        let start = decoder.pos;
        let value = decoder.value(1)?;
        let end = decoder.pos;
        if dict.contains_key(&key) {
            return Err(TorrentError::malformed(format!(
                "duplicate dictionary key '{}'",
                String::from_utf8_lossy(&key)
            )));
        }
        spans.insert(key.clone(), start..end);
        dict.insert(key, value);
    }
    decoder.finish()?;
    Ok((dict, spans))
}

pub fn encode(value: &Value) -> Vec<u8> {
    let mut out = Vec::new();
    encode_into(value, &mut out);
    out
}

pub fn encode_into(value: &Value, out: &mut Vec<u8>) {
    match value {
        Value::Int(i) => {
            out.push(b'i');
            out.extend_from_slice(i.to_string().as_bytes());
            out.push(b'e');
        }
        Value::Bytes(b) => encode_bytes(b, out),
        Value::List(items) => {
            out.push(b'l');
            for item in items {
                encode_into(item, out);
            }
            out.push(b'e');
        }
        Value::Dict(entries) => {
            out.push(b'd');
            for (key, item) in entries {
                encode_bytes(key, out);
                encode_into(item, out);
            }
            out.push(b'e');
        }
    }
}

fn encode_bytes(bytes: &[u8], out: &mut Vec<u8>) {
    out.extend_from_slice(bytes.len().to_string().as_bytes());
    out.push(b':');
    out.extend_from_slice(bytes);
}

struct Decoder<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Decoder<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn peek(&self) -> Result<u8, TorrentError> {
        self.data
            .get(self.pos)
            .copied()
            .ok_or_else(|| TorrentError::malformed(format!("unexpected end of data at {}", self.pos)))
    }

    fn finish(&self) -> Result<(), TorrentError> {
        if self.pos != self.data.len() {
            return Err(TorrentError::malformed(format!(
                "{} trailing bytes after value",
                self.data.len() - self.pos
            )));
        }
        Ok(())
    }

    fn value(&mut self, depth: usize) -> Result<Value, TorrentError> {
        if depth > MAX_DEPTH {
            return Err(TorrentError::malformed("nesting too deep"));
        }
        match self.peek()? {
            b'i' => self.int().map(Value::Int),
            b'l' => {
                self.pos += 1;
                let mut items = Vec::new();
                while self.peek()? != b'e' {
                    items.push(self.value(depth + 1)?);
                }
                self.pos += 1;
                Ok(Value::List(items))
            }
            b'd' => {
                self.pos += 1;
                let mut entries = Dict::new();
                while self.peek()? != b'e' {
                    let key = self.raw_bytes()?;
                    let value = self.value(depth + 1)?;
                    if entries.insert(key.clone(), value).is_some() {
                        return Err(TorrentError::malformed(format!(
                            "duplicate dictionary key '{}'",
                            String::from_utf8_lossy(&key)
                        )));
                    }
                }
                self.pos += 1;
                Ok(Value::Dict(entries))
            }
            b'0'..=b'9' => self.raw_bytes().map(Value::Bytes),
            other => Err(TorrentError::malformed(format!(
                "unexpected byte 0x{:02x} at {}",
                other, self.pos
            ))),
        }
    }

    /// Reads digits up to `terminator`, leaving `pos` after it.
    fn digits_until(&mut self, terminator: u8) -> Result<&'a str, TorrentError> {
        let data = self.data;
        let start = self.pos;
        let len = data[start..]
            .iter()
            .position(|&b| b == terminator)
            .ok_or_else(|| TorrentError::malformed(format!("unterminated number at {}", start)))?;
        self.pos = start + len + 1;
        std::str::from_utf8(&data[start..start + len])
            .map_err(|_| TorrentError::malformed(format!("invalid number at {}", start)))
    }

    fn int(&mut self) -> Result<i64, TorrentError> {
        let at = self.pos;
        self.pos += 1;
        let text = self.digits_until(b'e')?;
        let digits = text.strip_prefix('-').unwrap_or(text);
        let valid = !digits.is_empty()
            && digits.bytes().all(|b| b.is_ascii_digit())
            && !(digits.len() > 1 && digits.starts_with('0'))
            && text != "-0";
        if !valid {
            return Err(TorrentError::malformed(format!(
                "invalid integer '{}' at {}",
                text, at
            )));
        }
        text.parse::<i64>()
            .map_err(|_| TorrentError::malformed(format!("integer out of range at {}", at)))
    }

    fn raw_bytes(&mut self) -> Result<Vec<u8>, TorrentError> {
        let at = self.pos;
        if !self.peek()?.is_ascii_digit() {
            return Err(TorrentError::malformed(format!(
                "expected byte string at {}",
                at
            )));
        }
        let text = self.digits_until(b':')?;
        if !text.bytes().all(|b| b.is_ascii_digit()) || (text.len() > 1 && text.starts_with('0'))
        {
            return Err(TorrentError::malformed(format!(
                "invalid string length '{}' at {}",
                text, at
            )));
        }
        let len: usize = text
            .parse()
            .map_err(|_| TorrentError::malformed(format!("string length out of range at {}", at)))?;
        let end = self
            .pos
            .checked_add(len)
            .filter(|&end| end <= self.data.len())
            .ok_or_else(|| TorrentError::malformed(format!("string at {} runs past end", at)))?;
        let bytes = self.data[self.pos..end].to_vec();
        self.pos = end;
        Ok(bytes)
    }
}
