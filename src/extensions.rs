//! Extension storage shared by every schema-bearing record.
//!
//! A record owns exactly one [`ExtensionStore`]. Decoding fills it with the
//! payload keys the record's schema did not claim; encoding merges it back on
//! top of the schema fields. The store is plain mutable data and carries no
//! synchronization of its own.

use serde::{Deserializer, Serializer};
use serde_json::{Map, Value};

use crate::error::CodecError;

/// Keyed bag of extension values plus the bytes a record was decoded from.
#[derive(Debug, Clone, Default)]
pub struct ExtensionStore {
    fields: Map<String, Value>,
    raw_bytes: Vec<u8>,
    extension_raw_bytes: Vec<u8>,
}

impl ExtensionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.fields.remove(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    pub fn fields_mut(&mut self) -> &mut Map<String, Value> {
        &mut self.fields
    }

    /// Exact bytes of the whole record as received; empty for records built in memory.
    pub fn raw_bytes(&self) -> &[u8] {
        &self.raw_bytes
    }

    /// Serialized form of the extension subset captured at decode time.
    pub fn extension_raw_bytes(&self) -> &[u8] {
        &self.extension_raw_bytes
    }

    pub(crate) fn set_raw_bytes(&mut self, bytes: &[u8]) {
        self.raw_bytes = bytes.to_vec();
    }

    pub(crate) fn replace_fields(&mut self, fields: Map<String, Value>, raw: Vec<u8>) {
        self.fields = fields;
        self.extension_raw_bytes = raw;
    }
}

/// Raw bytes are provenance, not value: two stores are equal when their fields are.
impl PartialEq for ExtensionStore {
    fn eq(&self, other: &Self) -> bool {
        self.fields == other.fields
    }
}

/// Capability shared by records that carry an [`ExtensionStore`].
///
/// `serialize_schema`/`deserialize_schema` are the record's plain schema
/// encoding with the store left out. The record's public `Serialize` and
/// `Deserialize` impls route through [`crate::codec`], which reaches back into
/// these two methods, never into the public impls, so the two never recurse.
pub trait Extensible: Sized {
    fn extension_store(&self) -> &ExtensionStore;

    fn extension_store_mut(&mut self) -> &mut ExtensionStore;

    fn serialize_schema<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer;

    fn deserialize_schema<'de, D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>;

    /// Rejects records whose schema fields cannot be encoded together.
    fn validate(&self) -> Result<(), CodecError> {
        Ok(())
    }

    fn set_extension(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.extension_store_mut().set(key, value);
    }

    fn extension(&self, key: &str) -> Option<&Value> {
        self.extension_store().get(key)
    }

    fn remove_extension(&mut self, key: &str) -> Option<Value> {
        self.extension_store_mut().remove(key)
    }

    fn extensions(&self) -> &Map<String, Value> {
        self.extension_store().fields()
    }

    fn raw_bytes(&self) -> &[u8] {
        self.extension_store().raw_bytes()
    }

    fn extension_raw_bytes(&self) -> &[u8] {
        self.extension_store().extension_raw_bytes()
    }
}
