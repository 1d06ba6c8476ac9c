//! Minimal Solidity ABI codec for the contract's view functions.
//!
//! Covers exactly what the getters need: `uint256` and `string` arguments,
//! and `address`/`bool`/`uint256`/`int256`/`bytes32`/`string` outputs laid
//! out with the standard head/tail encoding.

use ledgergate_core::error::{LedgerGateError, Result};
use ledgergate_core::hash::keccak256;

const WORD: usize = 32;

/// Call argument.
#[derive(Debug, Clone)]
pub enum Arg<'a> {
    Uint(u64),
    Str(&'a str),
}

/// First four bytes of the Keccak of the canonical signature.
pub fn selector(signature: &str) -> [u8; 4] {
    let h = keccak256(signature.as_bytes());
    [h[0], h[1], h[2], h[3]]
}

/// Selector followed by the encoded arguments.
pub fn encode_call(signature: &str, args: &[Arg<'_>]) -> Vec<u8> {
    let mut head = Vec::with_capacity(args.len() * WORD);
    let mut tail = Vec::new();
    let head_len = args.len() * WORD;

    for arg in args {
        match arg {
            Arg::Uint(v) => head.extend_from_slice(&uint_word(*v)),
            Arg::Str(s) => {
                head.extend_from_slice(&uint_word((head_len + tail.len()) as u64));
                tail.extend_from_slice(&uint_word(s.len() as u64));
                tail.extend_from_slice(s.as_bytes());
                let pad = (WORD - s.len() % WORD) % WORD;
                tail.extend(std::iter::repeat(0u8).take(pad));
            }
        }
    }

    let mut out = selector(signature).to_vec();
    out.extend_from_slice(&head);
    out.extend_from_slice(&tail);
    out
}

fn uint_word(v: u64) -> [u8; WORD] {
    let mut w = [0u8; WORD];
    w[WORD - 8..].copy_from_slice(&v.to_be_bytes());
    w
}

fn malformed(what: &str) -> LedgerGateError {
    LedgerGateError::UpstreamUnavailable(format!("malformed abi output: {what}"))
}

/// Positional reader over a call's return data.
pub struct Decoder<'a> {
    data: &'a [u8],
}

impl<'a> Decoder<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data }
    }

    fn word_at(&self, offset: usize) -> Result<&'a [u8]> {
        let end = offset.checked_add(WORD).ok_or_else(|| malformed("offset overflow"))?;
        self.data.get(offset..end).ok_or_else(|| malformed("short output"))
    }

    fn word(&self, index: usize) -> Result<&'a [u8]> {
        self.word_at(index * WORD)
    }

    fn usize_at(&self, offset: usize) -> Result<usize> {
        let w = self.word_at(offset)?;
        if w[..WORD - 8].iter().any(|b| *b != 0) {
            return Err(malformed("length does not fit"));
        }
        let mut be = [0u8; 8];
        be.copy_from_slice(&w[WORD - 8..]);
        usize::try_from(u64::from_be_bytes(be)).map_err(|_| malformed("length does not fit"))
    }

    pub fn uint(&self, index: usize) -> Result<u64> {
        let w = self.word(index)?;
        if w[..WORD - 8].iter().any(|b| *b != 0) {
            return Err(malformed("uint256 exceeds u64"));
        }
        let mut be = [0u8; 8];
        be.copy_from_slice(&w[WORD - 8..]);
        Ok(u64::from_be_bytes(be))
    }

    pub fn int(&self, index: usize) -> Result<i64> {
        let w = self.word(index)?;
        let negative = w[WORD - 8] & 0x80 != 0;
        let fill = if negative { 0xff } else { 0x00 };
        if w[..WORD - 8].iter().any(|b| *b != fill) {
            return Err(malformed("int256 exceeds i64"));
        }
        let mut be = [0u8; 8];
        be.copy_from_slice(&w[WORD - 8..]);
        Ok(i64::from_be_bytes(be))
    }

    pub fn bool(&self, index: usize) -> Result<bool> {
        match self.uint(index)? {
            0 => Ok(false),
            1 => Ok(true),
            _ => Err(malformed("bool out of range")),
        }
    }

    pub fn address(&self, index: usize) -> Result<String> {
        let w = self.word(index)?;
        if w[..12].iter().any(|b| *b != 0) {
            return Err(malformed("dirty address word"));
        }
        Ok(format!("0x{}", hex::encode(&w[12..])))
    }

    pub fn bytes32(&self, index: usize) -> Result<[u8; 32]> {
        let mut out = [0u8; 32];
        out.copy_from_slice(self.word(index)?);
        Ok(out)
    }

    /// Dynamic `string` whose head sits at `index`.
    pub fn string(&self, index: usize) -> Result<String> {
        let offset = self.usize_at(index * WORD)?;
        let len = self.usize_at(offset)?;
        let start = offset + WORD;
        let end = start.checked_add(len).ok_or_else(|| malformed("string overflow"))?;
        let bytes = self.data.get(start..end).ok_or_else(|| malformed("short string"))?;
        String::from_utf8(bytes.to_vec()).map_err(|_| malformed("string is not utf-8"))
    }
}
