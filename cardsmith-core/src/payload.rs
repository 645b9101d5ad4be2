//! # Payloads
//!
//! Image bytes are the heavy part of any state. Records never embed them - they carry a
//! reference string, resolved by whichever container holds the bytes (the history side-table,
//! an autosave record's payload map, an archive's `images/` directory, a page's table).
//!
//! Keys are content addressed: the BLAKE3 hash of the encoded bytes, so identical images
//! collapse onto a single entry no matter how many layers or snapshots use them.

use std::sync::Arc;

use base64::Engine;

/// Prefix accepted inline in place of a key, for records written by older versions.
const DATA_URL_PREFIX: &str = "data:";

#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Debug, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct PayloadKey(String);
impl PayloadKey {
    /// Wrap an arbitrary key. Content keys should come from [`Self::of_bytes`].
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }
    /// Content key of some encoded bytes.
    #[must_use]
    pub fn of_bytes(bytes: &[u8]) -> Self {
        Self(blake3::hash(bytes).to_hex().to_string())
    }
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}
impl std::borrow::Borrow<str> for PayloadKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}
impl std::fmt::Display for PayloadKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Content key -> bytes.
pub type PayloadTable = hashbrown::HashMap<PayloadKey, Arc<[u8]>>;

/// Anything that can turn a record's image reference into bytes.
pub trait PayloadSource {
    fn payload(&self, reference: &str) -> Option<Arc<[u8]>>;
}
impl PayloadSource for PayloadTable {
    fn payload(&self, reference: &str) -> Option<Arc<[u8]>> {
        self.get(reference).cloned()
    }
}
impl<S: PayloadSource + ?Sized> PayloadSource for &S {
    fn payload(&self, reference: &str) -> Option<Arc<[u8]>> {
        (**self).payload(reference)
    }
}

#[derive(thiserror::Error, Debug)]
pub enum DataUrlError {
    #[error("data url is not base64 encoded")]
    NotBase64,
    #[error(transparent)]
    Base64(#[from] base64::DecodeError),
}

/// Whether a record reference is an inline `data:` url rather than a key or path.
#[must_use]
pub fn is_data_url(reference: &str) -> bool {
    reference.starts_with(DATA_URL_PREFIX)
}

/// Decode an inline `data:<mime>;base64,<data>` reference.
pub fn decode_data_url(reference: &str) -> Result<Vec<u8>, DataUrlError> {
    let body = reference
        .strip_prefix(DATA_URL_PREFIX)
        .ok_or(DataUrlError::NotBase64)?;
    let (header, data) = body.split_once(',').ok_or(DataUrlError::NotBase64)?;
    if !header.ends_with(";base64") {
        return Err(DataUrlError::NotBase64);
    }
    Ok(decode_base64(data)?)
}

#[must_use]
pub fn encode_base64(bytes: &[u8]) -> String {
    base64::engine::general_purpose::STANDARD.encode(bytes)
}

pub fn decode_base64(text: &str) -> Result<Vec<u8>, base64::DecodeError> {
    base64::engine::general_purpose::STANDARD.decode(text.trim())
}

#[cfg(test)]
mod test {
    use super::*;
    #[test]
    fn content_keys_collapse() {
        let a = PayloadKey::of_bytes(b"same bytes");
        let b = PayloadKey::of_bytes(b"same bytes");
        let c = PayloadKey::of_bytes(b"other bytes");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.as_str().len(), 64);
    }
    #[test]
    fn table_lookup_by_str() {
        let mut table = PayloadTable::new();
        table.insert(PayloadKey::new("img-1"), Arc::from(&b"abc"[..]));
        assert_eq!(table.payload("img-1").as_deref(), Some(&b"abc"[..]));
        assert!(table.payload("img-2").is_none());
    }
    #[test]
    fn data_urls() {
        let url = format!("data:image/png;base64,{}", encode_base64(b"\x89PNG"));
        assert!(is_data_url(&url));
        assert_eq!(decode_data_url(&url).unwrap(), b"\x89PNG");
        assert!(matches!(
            decode_data_url("data:text/plain,hello"),
            Err(DataUrlError::NotBase64)
        ));
        assert!(decode_data_url("data:image/png;base64,!!!").is_err());
    }
}
