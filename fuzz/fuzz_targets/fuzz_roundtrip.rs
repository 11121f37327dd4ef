#![no_main]

use arbitrary::{Arbitrary, Unstructured};
use jsontext::{DecodeOptions, Decoder, EncodeOptions, Encoder, Token};
use libfuzzer_sys::fuzz_target;
use serde_json::{Map, Value};

/// An arbitrary JSON value, generated the same way the teacher parser
/// crate's fuzz target builds one, minus its custom `fuzz_mutator!`/`SmallRng`
/// corpus-mutation machinery — this target relies on libFuzzer's own mutator
/// plus `arbitrary`'s structured generation instead.
#[derive(Debug)]
struct ArbitraryValue(Value);

impl<'a> Arbitrary<'a> for ArbitraryValue {
    fn arbitrary(u: &mut Unstructured<'a>) -> arbitrary::Result<Self> {
        let node_type = u.choose_index(21)?;
        let value = match node_type {
            0 => Value::Null,
            1 => Value::Bool(u.arbitrary()?),
            2 => {
                let n: f64 = u.arbitrary()?;
                if !n.is_finite() {
                    return Err(arbitrary::Error::IncorrectFormat);
                }
                Value::Number(serde_json::Number::from_f64(n).ok_or(arbitrary::Error::IncorrectFormat)?)
            }
            3..=10 => Value::String(u.arbitrary()?),
            11..=15 => {
                let elems: Vec<ArbitraryValue> = u.arbitrary()?;
                Value::Array(elems.into_iter().map(|v| v.0).collect())
            }
            16..=20 => {
                let members: Vec<(String, ArbitraryValue)> = u.arbitrary()?;
                Value::Object(Map::from_iter(members.into_iter().map(|(k, v)| (k, v.0))))
            }
            _ => return Err(arbitrary::Error::IncorrectFormat),
        };
        Ok(ArbitraryValue(value))
    }
}

/// Split a UTF-8 string into boundary-safe chunks using a deterministic seed,
/// so the harness drives the decoder's resumable lexer across arbitrary feed
/// boundaries instead of always handing it one complete document.
fn split_into_safe_chunks(serialized: &str, split_seed: u64) -> Vec<&str> {
    let mut chunks = Vec::new();
    let len = serialized.len();
    if len == 0 {
        return chunks;
    }
    let mut start = 0;
    while start < len {
        let remaining = len - start;
        let mut size = (split_seed as usize % remaining) + 1;
        while start + size < len && !serialized.is_char_boundary(start + size) {
            size += 1;
        }
        chunks.push(&serialized[start..start + size]);
        start += size;
    }
    chunks
}

struct ChunkedReader<'a> {
    remaining: std::vec::IntoIter<&'a [u8]>,
    current: &'a [u8],
}

impl<'a> ChunkedReader<'a> {
    fn new(chunks: Vec<&'a str>) -> Self {
        let bytes: Vec<&'a [u8]> = chunks.into_iter().map(str::as_bytes).collect();
        Self {
            remaining: bytes.into_iter(),
            current: &[],
        }
    }
}

impl<'a> std::io::Read for ChunkedReader<'a> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        loop {
            if !self.current.is_empty() {
                let n = self.current.len().min(buf.len());
                buf[..n].copy_from_slice(&self.current[..n]);
                self.current = &self.current[n..];
                return Ok(n);
            }
            match self.remaining.next() {
                Some(chunk) => self.current = chunk,
                None => return Ok(0),
            }
        }
    }
}

fn decode_all<R: std::io::Read>(source: R) -> Option<Vec<Token>> {
    let mut dec = Decoder::new(source, DecodeOptions::default());
    let mut tokens = Vec::new();
    loop {
        match dec.read_token() {
            Ok(Some(tok)) => tokens.push(tok),
            Ok(None) => return Some(tokens),
            Err(_) => return None,
        }
    }
}

fuzz_target!(|data: &[u8]| {
    if data.len() < 4 {
        return;
    }
    let split_seed = u32::from_le_bytes(data[..4].try_into().unwrap()) as u64;
    let rest = &data[4..];

    // Branch one: feed the raw fuzz bytes straight to the decoder. Most of
    // these are not valid JSON at all; the only property under test is that
    // malformed input is rejected with an error, never a panic.
    let _ = decode_all(rest);

    // Branch two: build a well-formed value, decode it chunked at arbitrary
    // UTF-8-safe boundaries, re-encode it, and confirm the token stream
    // survives the round trip.
    let mut u = Unstructured::new(rest);
    let Ok(value) = ArbitraryValue::arbitrary(&mut u) else {
        return;
    };
    let Ok(serialized) = serde_json::to_string(&value.0) else {
        return;
    };
    let chunks = split_into_safe_chunks(&serialized, split_seed);
    let Some(tokens) = decode_all(ChunkedReader::new(chunks)) else {
        panic!("decoder rejected output produced by serde_json from an arbitrary value");
    };

    let mut out = Vec::new();
    {
        let mut enc = Encoder::new(&mut out, EncodeOptions::default());
        for t in &tokens {
            enc.write_token(t).expect("re-encoding a just-decoded token stream must not fail");
        }
        enc.flush().expect("flush against an in-memory Vec sink must not fail");
    }
    let Some(tokens2) = decode_all(out.as_slice()) else {
        panic!("decoder rejected its own encoder's output");
    };
    assert_eq!(tokens.len(), tokens2.len(), "round trip through encode/decode changed the token count");
});
