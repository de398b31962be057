//! Extension-preserving JSON codec.
//!
//! Decoding splits a payload into the fields the target record's schema claims
//! and everything else, which lands in the record's [`ExtensionStore`].
//! Encoding serializes the schema fields and merges the stored extensions on
//! top; an extension whose name matches a schema field replaces that field's
//! value in the output.
//!
//! [`ExtensionStore`]: crate::extensions::ExtensionStore

use serde::de::Error as _;
use serde::ser::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::value::RawValue;
use serde_json::{Map, Value};

use crate::error::CodecError;
use crate::extensions::Extensible;
use crate::known_fields;

/// Schema-only view of a record: serializes without its extensions.
struct SchemaRef<'a, T>(&'a T);

impl<T: Extensible> Serialize for SchemaRef<'_, T> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.0.serialize_schema(serializer)
    }
}

/// Schema-only decode target: fills known fields and leaves the store empty.
struct SchemaOwned<T>(T);

impl<'de, T: Extensible> Deserialize<'de> for SchemaOwned<T> {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        T::deserialize_schema(deserializer).map(SchemaOwned)
    }
}

/// Decode `bytes` into `T`, keeping unclaimed keys as extensions.
pub fn decode_with_extensions<T>(bytes: &[u8]) -> Result<T, CodecError>
where
    T: Extensible,
{
    let SchemaOwned(mut record) =
        serde_json::from_slice::<SchemaOwned<T>>(bytes).map_err(CodecError::malformed::<T>)?;
    let all_fields = serde_json::from_slice::<Map<String, Value>>(bytes)
        .map_err(|source| CodecError::FieldMap { source })?;

    let known = known_fields::resolve(&SchemaRef(&record));
    let extensions: Map<String, Value> = all_fields
        .into_iter()
        .filter(|(key, _)| !known.contains(key))
        .collect();

    let store = record.extension_store_mut();
    store.set_raw_bytes(bytes);
    if !extensions.is_empty() {
        let raw = match serde_json::to_vec(&extensions) {
            Ok(raw) => raw,
            Err(source) => {
                let error = CodecError::ExtensionEncode(source);
                tracing::warn!(
                    record = std::any::type_name::<T>(),
                    %error,
                    "extension raw bytes left empty"
                );
                Vec::new()
            }
        };
        store.replace_fields(extensions, raw);
    }

    Ok(record)
}

/// Serialize `value` and merge `extensions` into the resulting object.
///
/// With no extensions the base encoding is returned as is. On a key present in
/// both, the extension value is written.
pub fn encode_with_extensions<T>(
    value: &T,
    extensions: &Map<String, Value>,
) -> Result<Vec<u8>, CodecError>
where
    T: Serialize + ?Sized,
{
    merged_bytes(value, extensions).map_err(CodecError::encode::<T>)
}

/// Encode a record's schema fields together with its own stored extensions.
pub fn encode_record<T>(record: &T) -> Result<Vec<u8>, CodecError>
where
    T: Extensible,
{
    record.validate()?;
    merged_bytes(&SchemaRef(record), record.extensions()).map_err(CodecError::encode::<T>)
}

/// `Serialize` body shared by every extensible record.
pub fn serialize_record<T, S>(record: &T, serializer: S) -> Result<S::Ok, S::Error>
where
    T: Extensible,
    S: Serializer,
{
    record.validate().map_err(S::Error::custom)?;
    let extensions = record.extensions();
    if extensions.is_empty() {
        return record.serialize_schema(serializer);
    }
    merged_value(&SchemaRef(record), extensions)
        .map_err(S::Error::custom)?
        .serialize(serializer)
}

/// `Deserialize` body shared by every extensible record.
///
/// The record decodes from its own exact slice of the input so that its raw
/// bytes match what was received.
pub fn deserialize_record<'de, T, D>(deserializer: D) -> Result<T, D::Error>
where
    T: Extensible,
    D: Deserializer<'de>,
{
    let raw = Box::<RawValue>::deserialize(deserializer)?;
    decode_with_extensions(raw.get().as_bytes()).map_err(D::Error::custom)
}

fn merged_bytes<T>(value: &T, extensions: &Map<String, Value>) -> Result<Vec<u8>, serde_json::Error>
where
    T: Serialize + ?Sized,
{
    if extensions.is_empty() {
        return serde_json::to_vec(value);
    }
    serde_json::to_vec(&merged_value(value, extensions)?)
}

fn merged_value<T>(value: &T, extensions: &Map<String, Value>) -> Result<Value, serde_json::Error>
where
    T: Serialize + ?Sized,
{
    match serde_json::to_value(value)? {
        Value::Object(mut base) => {
            for (key, value) in extensions {
                base.insert(key.clone(), value.clone());
            }
            Ok(Value::Object(base))
        }
        _ => Err(<serde_json::Error as serde::ser::Error>::custom(
            "extensions can only be merged into a JSON object",
        )),
    }
}

/// Public `Serialize`/`Deserialize` impls that route through this codec.
macro_rules! record_serde {
    ($($record:ty),+ $(,)?) => {$(
        impl ::serde::Serialize for $record {
            fn serialize<S>(&self, serializer: S) -> ::std::result::Result<S::Ok, S::Error>
            where
                S: ::serde::Serializer,
            {
                $crate::codec::serialize_record(self, serializer)
            }
        }

        impl<'de> ::serde::Deserialize<'de> for $record {
            fn deserialize<D>(deserializer: D) -> ::std::result::Result<Self, D::Error>
            where
                D: ::serde::Deserializer<'de>,
            {
                $crate::codec::deserialize_record(deserializer)
            }
        }
    )+};
}

/// Wires a record derived with `#[serde(remote = "Self")]` and an
/// `extension_store` field into [`Extensible`] and the codec-backed serde impls.
macro_rules! extensible_record {
    ($($record:ty),+ $(,)?) => {$(
        impl $crate::extensions::Extensible for $record {
            fn extension_store(&self) -> &$crate::extensions::ExtensionStore {
                &self.extension_store
            }

            fn extension_store_mut(&mut self) -> &mut $crate::extensions::ExtensionStore {
                &mut self.extension_store
            }

            fn serialize_schema<S>(&self, serializer: S) -> ::std::result::Result<S::Ok, S::Error>
            where
                S: ::serde::Serializer,
            {
                <$record>::serialize(self, serializer)
            }

            fn deserialize_schema<'de, D>(deserializer: D) -> ::std::result::Result<Self, D::Error>
            where
                D: ::serde::Deserializer<'de>,
            {
                <$record>::deserialize(deserializer)
            }
        }

        $crate::codec::record_serde!($record);
    )+};
}

pub(crate) use extensible_record;
pub(crate) use record_serde;

#[cfg(test)]
mod tests {
    use super::{decode_with_extensions, encode_record, encode_with_extensions};
    use crate::error::CodecError;
    use crate::extensions::{ExtensionStore, Extensible};
    use serde::{Deserialize, Serialize};
    use serde_json::{json, Map, Value};

    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
    #[serde(remote = "Self")]
    struct Probe {
        name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        note: Option<String>,
        #[serde(skip)]
        extension_store: ExtensionStore,
    }

    super::extensible_record!(Probe);

    #[test]
    fn decode_splits_known_and_extension_fields() {
        let bytes = br#"{"name":"a","vendor":{"x":1},"flag":true}"#;
        let probe: Probe = decode_with_extensions(bytes).expect("decode probe");

        assert_eq!(probe.name, "a");
        assert_eq!(probe.extensions().len(), 2);
        assert_eq!(probe.extension("vendor"), Some(&json!({"x": 1})));
        assert_eq!(probe.extension("flag"), Some(&json!(true)));
        assert_eq!(probe.raw_bytes(), bytes);

        let ext: Value = serde_json::from_slice(probe.extension_raw_bytes()).expect("ext bytes");
        assert_eq!(ext, json!({"vendor": {"x": 1}, "flag": true}));
    }

    #[test]
    fn decode_without_extensions_leaves_store_empty() {
        let probe: Probe = decode_with_extensions(br#"{"name":"a","note":"n"}"#).expect("decode");
        assert!(probe.extensions().is_empty());
        assert!(probe.extension_raw_bytes().is_empty());
        assert!(!probe.raw_bytes().is_empty());
    }

    #[test]
    fn decode_rejects_wrong_known_field_shape() {
        let error = decode_with_extensions::<Probe>(br#"{"name":7}"#).unwrap_err();
        assert!(matches!(error, CodecError::MalformedPayload { .. }));
    }

    #[test]
    fn decode_rejects_invalid_json() {
        let error = decode_with_extensions::<Probe>(b"{not json").unwrap_err();
        assert!(matches!(error, CodecError::MalformedPayload { .. }));
    }

    #[test]
    fn decode_rejects_non_object_payload() {
        // A derived struct also accepts a positional array; the field map does not.
        let error = decode_with_extensions::<Probe>(br#"["a","n"]"#).unwrap_err();
        assert!(matches!(error, CodecError::FieldMap { .. }));
    }

    #[test]
    fn encode_fast_path_matches_plain_serialization() {
        let bytes = encode_with_extensions(&json!({"a": 1}), &Map::new()).expect("encode");
        assert_eq!(bytes, br#"{"a":1}"#);
    }

    #[test]
    fn encode_merges_extensions_with_precedence() {
        let mut extensions = Map::new();
        extensions.insert("a".to_owned(), json!("ext"));
        extensions.insert("b".to_owned(), json!(2));

        let bytes = encode_with_extensions(&json!({"a": 1}), &extensions).expect("encode");
        let value: Value = serde_json::from_slice(&bytes).expect("valid json");
        assert_eq!(value, json!({"a": "ext", "b": 2}));
    }

    #[test]
    fn encode_rejects_extensions_on_non_object() {
        let mut extensions = Map::new();
        extensions.insert("a".to_owned(), json!(1));

        let error = encode_with_extensions(&json!([1, 2]), &extensions).unwrap_err();
        assert!(matches!(error, CodecError::Encode { .. }));
    }

    #[test]
    fn record_round_trips_through_serde() {
        let mut probe = Probe {
            name: "n".to_owned(),
            ..Probe::default()
        };
        probe.set_extension("trace", json!({"span": "s1"}));

        let encoded = encode_record(&probe).expect("encode");
        let via_serde = serde_json::to_vec(&probe).expect("serde encode");
        assert_eq!(
            serde_json::from_slice::<Value>(&encoded).expect("json"),
            serde_json::from_slice::<Value>(&via_serde).expect("json")
        );

        let decoded: Probe = serde_json::from_slice(&encoded).expect("decode");
        assert_eq!(decoded, probe);
    }
}
