// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Document key encoding and decoding.
//!
//! A document key is a sequence of typed components terminated by
//! [`GROUP_END`]. A sub-document key extends a document key with further
//! components addressing a nested field. Stored records append the write time:
//!
//! `[doc key components][GROUP_END][subkey components][HYBRID_TIME][encoded time:12]`
//!
//! Every encoding is order-preserving, so byte order on encoded keys matches
//! component order, and all versions of one logical key are contiguous with
//! the newest first.

use crate::time::{DocHybridTime, EncodedDocHybridTime, ENCODED_DOC_HT_SIZE};

use super::StorageError;

/// Terminates the components of a document key.
pub const GROUP_END: u8 = b'!';
/// Precedes an encoded time, in keys and in values written by transactions.
pub const HYBRID_TIME: u8 = b'#';
/// Appending this to a logical key sorts past every version of that key but
/// before its nested sub-keys.
pub const PAST_HYBRID_TIME: u8 = HYBRID_TIME + 1;
/// Precedes the intent type set in intent keys.
pub const INTENT_TYPE_SET: u8 = b'%';
/// Appending this to a logical key sorts past all of its intents.
pub const GREATER_THAN_INTENT_TYPE: u8 = b'&';
/// Tag of a 64-bit signed integer component.
pub const INT64: u8 = b'I';
/// Tag of a byte string component.
pub const STRING: u8 = b'S';
/// First byte of transaction metadata and reverse index keys in the intents space.
pub const TRANSACTION_ID: u8 = b'x';
/// Sorts after every tag byte.
pub const MAX_BYTE: u8 = 0xff;

/// Size of the `[HYBRID_TIME][encoded time]` suffix of a stored key.
pub const TIME_SUFFIX_SIZE: usize = 1 + ENCODED_DOC_HT_SIZE;

const INT64_SIGN_BIT: u64 = 1 << 63;

/// One typed component of a document or sub-document key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum KeyComponent {
    Int64(i64),
    String(Vec<u8>),
}

impl KeyComponent {
    pub fn string(bytes: impl AsRef<[u8]>) -> Self {
        Self::String(bytes.as_ref().to_vec())
    }

    /// Appends the order-preserving encoding of this component.
    ///
    /// Integers flip the sign bit so negative values sort first. Strings escape
    /// `0x00` as `0x00 0x01` and terminate with `0x00 0x00`.
    pub fn encode_into(&self, out: &mut Vec<u8>) {
        match self {
            Self::Int64(v) => {
                out.push(INT64);
                out.extend_from_slice(&((*v as u64) ^ INT64_SIGN_BIT).to_be_bytes());
            }
            Self::String(bytes) => {
                out.push(STRING);
                for &b in bytes {
                    out.push(b);
                    if b == 0 {
                        out.push(1);
                    }
                }
                out.extend_from_slice(&[0, 0]);
            }
        }
    }

    /// Decodes one component from the front of `bytes`, returning it with the
    /// number of bytes consumed.
    pub fn decode(bytes: &[u8]) -> Result<(Self, usize), StorageError> {
        match bytes.first() {
            Some(&INT64) => {
                let raw: [u8; 8] = bytes
                    .get(1..9)
                    .and_then(|s| s.try_into().ok())
                    .ok_or_else(|| {
                        StorageError::InvalidKeyEncoding("truncated int64 component".to_string())
                    })?;
                let v = (u64::from_be_bytes(raw) ^ INT64_SIGN_BIT) as i64;
                Ok((Self::Int64(v), 9))
            }
            Some(&STRING) => {
                let mut decoded = Vec::new();
                let mut i = 1;
                while i < bytes.len() {
                    let b = bytes[i];
                    if b != 0 {
                        decoded.push(b);
                        i += 1;
                        continue;
                    }
                    match bytes.get(i + 1) {
                        Some(0) => return Ok((Self::String(decoded), i + 2)),
                        Some(1) => {
                            decoded.push(0);
                            i += 2;
                        }
                        _ => {
                            return Err(StorageError::InvalidKeyEncoding(format!(
                                "bad string escape at offset {}",
                                i
                            )))
                        }
                    }
                }
                Err(StorageError::InvalidKeyEncoding(
                    "unterminated string component".to_string(),
                ))
            }
            Some(&tag) => Err(StorageError::InvalidKeyEncoding(format!(
                "unknown component tag 0x{:02x}",
                tag
            ))),
            None => Err(StorageError::InvalidKeyEncoding(
                "empty key component".to_string(),
            )),
        }
    }
}

impl From<i64> for KeyComponent {
    fn from(v: i64) -> Self {
        Self::Int64(v)
    }
}

impl From<&str> for KeyComponent {
    fn from(s: &str) -> Self {
        Self::string(s)
    }
}

impl std::fmt::Display for KeyComponent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Int64(v) => write!(f, "{}", v),
            Self::String(bytes) => write!(f, "\"{}\"", String::from_utf8_lossy(bytes)),
        }
    }
}

/// Identifies one document (row).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct DocKey {
    components: Vec<KeyComponent>,
}

impl DocKey {
    pub fn new(components: Vec<KeyComponent>) -> Self {
        Self { components }
    }

    pub fn components(&self) -> &[KeyComponent] {
        &self.components
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        self.encode_into(&mut out);
        out
    }

    pub fn encode_into(&self, out: &mut Vec<u8>) {
        for component in &self.components {
            component.encode_into(out);
        }
        out.push(GROUP_END);
    }

    /// Decodes a document key from the front of `bytes`.
    pub fn decode(bytes: &[u8]) -> Result<(Self, usize), StorageError> {
        let mut components = Vec::new();
        let mut pos = 0;
        loop {
            match bytes.get(pos) {
                Some(&GROUP_END) => return Ok((Self { components }, pos + 1)),
                Some(_) => {
                    let (component, used) = KeyComponent::decode(&bytes[pos..])?;
                    components.push(component);
                    pos += used;
                }
                None => {
                    return Err(StorageError::InvalidKeyEncoding(
                        "doc key is missing its group end".to_string(),
                    ))
                }
            }
        }
    }
}

impl std::fmt::Display for DocKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "DocKey([")?;
        for (i, component) in self.components.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", component)?;
        }
        write!(f, "])")
    }
}

/// A document key plus the path of a nested field inside the document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct SubDocKey {
    doc_key: DocKey,
    subkeys: Vec<KeyComponent>,
}

impl SubDocKey {
    pub fn new(doc_key: DocKey, subkeys: Vec<KeyComponent>) -> Self {
        Self { doc_key, subkeys }
    }

    pub fn doc_key(&self) -> &DocKey {
        &self.doc_key
    }

    pub fn subkeys(&self) -> &[KeyComponent] {
        &self.subkeys
    }

    /// Encodes the logical key, without a time suffix.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = self.doc_key.encode();
        for subkey in &self.subkeys {
            subkey.encode_into(&mut out);
        }
        out
    }

    /// Encodes the stored form of a record written at `time`.
    pub fn encode_with_time(&self, time: &DocHybridTime) -> Vec<u8> {
        let mut out = self.encode();
        append_time_suffix(&mut out, &time.encode());
        out
    }

    /// Fully decodes an encoded sub-document key with an optional time suffix.
    pub fn decode(bytes: &[u8]) -> Result<(Self, Option<DocHybridTime>), StorageError> {
        let (doc_key, mut pos) = DocKey::decode(bytes)?;
        let mut subkeys = Vec::new();
        while pos < bytes.len() {
            if bytes[pos] == HYBRID_TIME {
                let time = EncodedDocHybridTime::from_slice(&bytes[pos + 1..])?;
                return Ok((Self { doc_key, subkeys }, Some(time.decode())));
            }
            let (subkey, used) = KeyComponent::decode(&bytes[pos..])?;
            subkeys.push(subkey);
            pos += used;
        }
        Ok((Self { doc_key, subkeys }, None))
    }
}

impl std::fmt::Display for SubDocKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SubDocKey({}, [", self.doc_key)?;
        for (i, subkey) in self.subkeys.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", subkey)?;
        }
        write!(f, "])")
    }
}

/// Appends `[HYBRID_TIME][time]` to a logical key.
#[inline]
pub fn append_time_suffix(out: &mut Vec<u8>, time: &EncodedDocHybridTime) {
    out.push(HYBRID_TIME);
    out.extend_from_slice(time.as_slice());
}

/// Splits a stored key into its logical key and encoded write time.
///
/// Only the suffix is inspected, so this works for any stored key regardless of
/// how its logical part is encoded.
#[inline]
pub fn split_time_suffix(key: &[u8]) -> Result<(&[u8], EncodedDocHybridTime), StorageError> {
    let logical_len = key.len().checked_sub(TIME_SUFFIX_SIZE).ok_or_else(|| {
        StorageError::Corruption(format!(
            "key too short for a time suffix: {}",
            hex(key)
        ))
    })?;
    if key[logical_len] != HYBRID_TIME {
        return Err(StorageError::Corruption(format!(
            "key has no hybrid time marker: {}",
            hex(key)
        )));
    }
    let time = EncodedDocHybridTime::from_slice(&key[logical_len + 1..])?;
    Ok((&key[..logical_len], time))
}

/// Returns the logical part of a stored key.
#[inline]
pub fn strip_time_suffix(key: &[u8]) -> Result<&[u8], StorageError> {
    split_time_suffix(key).map(|(logical, _)| logical)
}

/// Returns the length of the document key at the front of `key`.
pub fn doc_key_encoded_size(key: &[u8]) -> Result<usize, StorageError> {
    DocKey::decode(key).map(|(_, size)| size)
}

/// Returns true if `key` fully decodes as a sub-document key carrying a time suffix.
pub fn has_time_suffix(key: &[u8]) -> bool {
    matches!(SubDocKey::decode(key), Ok((_, Some(_))))
}

/// Renders a key for logs: decoded when possible, escaped bytes otherwise.
pub fn debug_key_to_string(key: &[u8]) -> String {
    match SubDocKey::decode(key) {
        Ok((sub_doc_key, Some(time))) => format!("{}; {}", sub_doc_key, time),
        Ok((sub_doc_key, None)) => sub_doc_key.to_string(),
        Err(_) => hex(key),
    }
}

pub(crate) fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| std::ascii::escape_default(*b).to_string()).collect()
}
