//! Converter Registry
//!
//! Resolves the persisted tag of a value or type and dispatches encode/decode
//! by tag.
//!
//! ## Resolution Order
//! ```text
//!            Value
//!              │
//!   ┌──────────┼─────────────────────┐
//!   ▼          ▼                     ▼
//! built-in   List(items)          Object
//! (kv.*)     kv.list<tag(items[0])>  │
//!                                 ┌──┴───────────┐
//!                                 ▼              ▼
//!                            CodecTable   external converter
//!                            (register)   (with_converter)
//! ```
//!
//! ## Lifecycle
//! The registry is never persisted. Every process must rebuild the same
//! bindings at startup before reading rows written by an earlier process;
//! [`ConverterRegistry::manifest`] lists them for verification.

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::codec::{self, BuiltinType};
use crate::converter::{validate_user_tag, CodecTable, ObjectCodec, ObjectConverter};
use crate::error::{KvError, Result};
use crate::value::{Object, TypeDescriptor, TypeKind, Value};

/// What a persisted tag maps back to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoredType {
    Builtin(BuiltinType),
    Object(TypeDescriptor),
    List(Box<StoredType>),

    /// Tag with no binding in this process
    Unknown(String),
}

impl StoredType {
    pub fn is_unknown(&self) -> bool {
        matches!(self, StoredType::Unknown(_))
    }
}

impl fmt::Display for StoredType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoredType::Builtin(ty) => write!(f, "{}", ty.type_name()),
            StoredType::Object(desc) => write!(f, "{}", desc.name),
            StoredType::List(element) => write!(f, "List<{}>", element),
            StoredType::Unknown(tag) => write!(f, "unknown ({})", tag),
        }
    }
}

/// Tag ↔ type bindings plus dispatch
pub struct ConverterRegistry {
    /// User codecs registered in this process
    table: RwLock<CodecTable>,

    /// Consulted after `table` for object values and tags
    external: Option<Arc<dyn ObjectConverter>>,
}

impl Default for ConverterRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ConverterRegistry {
    /// Registry with built-ins only
    pub fn new() -> Self {
        Self {
            table: RwLock::new(CodecTable::new()),
            external: None,
        }
    }

    /// Install an external object converter
    pub fn with_converter(mut self, converter: Arc<dyn ObjectConverter>) -> Self {
        self.external = Some(converter);
        self
    }

    // =========================================================================
    // Registration
    // =========================================================================

    /// Bind `tag` to `T`, encoded with bincode
    pub fn register<T>(&self, tag: &str) -> Result<()>
    where
        T: Object + Serialize + DeserializeOwned,
    {
        self.register_codec(tag, ObjectCodec::bincode::<T>())
    }

    /// Bind `tag` to `T` with a custom encode/decode pair
    pub fn register_with<T: Object>(
        &self,
        tag: &str,
        encode: fn(&T) -> Result<Vec<u8>>,
        decode: fn(&[u8]) -> Result<T>,
    ) -> Result<()> {
        self.register_codec(tag, ObjectCodec::new::<T>(encode, decode))
    }

    fn register_codec(&self, tag: &str, codec: ObjectCodec) -> Result<()> {
        let type_name = codec.descriptor().name;
        self.table.write().insert(tag, codec)?;
        tracing::debug!(tag, type_name, "registered converter tag");
        Ok(())
    }

    /// Registered (tag, type name) pairs, sorted by tag
    pub fn manifest(&self) -> Vec<(String, &'static str)> {
        self.table.read().bindings()
    }

    // =========================================================================
    // Tag Resolution
    // =========================================================================

    /// Tag for a runtime value
    pub fn tag_for(&self, value: &Value) -> Result<String> {
        let table = self.table.read();
        self.resolve_tag(&table, value)
    }

    /// Tag for a declared type, `None` if nothing binds it
    pub fn tag_for_type(&self, kind: TypeKind) -> Option<String> {
        match kind {
            TypeKind::Builtin(ty) => Some(ty.tag().to_string()),
            TypeKind::Object(desc) => {
                if let Some(tag) = self.table.read().tag_for_type(desc.id) {
                    return Some(tag);
                }
                let tag = self.external.as_ref()?.tag_for_type(desc.id)?;
                match checked_external_tag(tag) {
                    Ok(tag) => Some(tag),
                    Err(e) => {
                        tracing::warn!(
                            type_name = desc.name,
                            error = %e,
                            "ignoring external converter tag"
                        );
                        None
                    }
                }
            }
        }
    }

    /// What a persisted tag maps back to
    pub fn type_for(&self, tag: &str) -> StoredType {
        let table = self.table.read();
        self.resolve_type(&table, tag)
            .unwrap_or_else(|| StoredType::Unknown(tag.to_string()))
    }

    fn resolve_tag(&self, table: &CodecTable, value: &Value) -> Result<String> {
        if let Some(ty) = BuiltinType::of(value) {
            return Ok(ty.tag().to_string());
        }

        match value {
            Value::List(items) => {
                let first = items.first().ok_or_else(|| {
                    KvError::InvalidArgument("cannot store an empty list".to_string())
                })?;
                if matches!(first, Value::List(_)) {
                    return Err(KvError::InvalidArgument(
                        "nested lists are not supported".to_string(),
                    ));
                }
                Ok(codec::list_tag(&self.resolve_tag(table, first)?))
            }
            Value::Object(object) => {
                let object: &dyn Object = &**object;
                if let Some(tag) = table.tag_for(object) {
                    return Ok(tag);
                }
                match self.external.as_ref().and_then(|external| external.tag_for(object)) {
                    Some(tag) => checked_external_tag(tag),
                    None => Err(KvError::UnmappedType(object.object_type_name().to_string())),
                }
            }
            _ => Err(KvError::UnmappedType(value.type_name())),
        }
    }

    fn resolve_type(&self, table: &CodecTable, tag: &str) -> Option<StoredType> {
        if let Some(ty) = BuiltinType::from_tag(tag) {
            return Some(StoredType::Builtin(ty));
        }
        if let Some(element) = codec::split_list_tag(tag) {
            if codec::split_list_tag(element).is_some() {
                return None;
            }
            let element = self.resolve_type(table, element)?;
            return Some(StoredType::List(Box::new(element)));
        }
        if let Some(desc) = table.type_for(tag) {
            return Some(StoredType::Object(desc));
        }
        if codec::is_reserved(tag) {
            return None;
        }
        self.external.as_ref()?.type_for(tag).map(StoredType::Object)
    }

    // =========================================================================
    // Encoding
    // =========================================================================

    /// Resolve the tag and encode the value in one step
    ///
    /// Both happen under the same read guard, so a concurrent registration
    /// cannot land between them.
    pub fn encode(&self, value: &Value) -> Result<(String, Vec<u8>)> {
        let table = self.table.read();
        let tag = self.resolve_tag(&table, value)?;

        let payload = match value {
            Value::List(items) => {
                // resolve_tag only yields list tags for lists
                let element_tag = codec::split_list_tag(&tag).unwrap_or_default();
                self.encode_list(&table, items, element_tag)?
            }
            single => self.encode_single(&table, single)?,
        };

        tracing::trace!(tag = %tag, bytes = payload.len(), "encoded value");
        Ok((tag, payload))
    }

    /// Shorthand for `encode(value).1`
    pub fn serialize(&self, value: &Value) -> Result<Vec<u8>> {
        self.encode(value).map(|(_, payload)| payload)
    }

    fn encode_list(&self, table: &CodecTable, items: &[Value], element_tag: &str) -> Result<Vec<u8>> {
        let mut encoded = Vec::with_capacity(items.len());
        for (index, item) in items.iter().enumerate() {
            let tag = self.resolve_tag(table, item)?;
            if tag != element_tag {
                return Err(KvError::InvalidArgument(format!(
                    "list element {} has tag `{}`, expected `{}`",
                    index, tag, element_tag
                )));
            }
            encoded.push(self.encode_single(table, item)?);
        }
        codec::encode_frames(encoded.iter().map(Vec::as_slice))
    }

    fn encode_single(&self, table: &CodecTable, value: &Value) -> Result<Vec<u8>> {
        match value {
            Value::Object(object) => self.encode_object(table, &**object),
            Value::List(_) => Err(KvError::InvalidArgument(
                "nested lists are not supported".to_string(),
            )),
            builtin => codec::encode(builtin),
        }
    }

    fn encode_object(&self, table: &CodecTable, object: &dyn Object) -> Result<Vec<u8>> {
        if table.tag_for(object).is_some() {
            return table.serialize(object);
        }
        match &self.external {
            Some(external) if external.tag_for(object).is_some() => external.serialize(object),
            _ => Err(KvError::UnmappedType(object.object_type_name().to_string())),
        }
    }

    // =========================================================================
    // Decoding
    // =========================================================================

    /// Decode a payload persisted under `tag`
    pub fn decode(&self, payload: &[u8], tag: &str) -> Result<Value> {
        let table = self.table.read();
        tracing::trace!(tag, bytes = payload.len(), "decoding value");

        match codec::split_list_tag(tag) {
            Some(element_tag) => {
                if codec::split_list_tag(element_tag).is_some() {
                    return Err(KvError::Decode(format!("nested list tag `{}`", tag)));
                }
                let items = codec::decode_frames(payload)?
                    .into_iter()
                    .map(|element| self.decode_single(&table, element, element_tag))
                    .collect::<Result<Vec<_>>>()?;
                Ok(Value::List(items))
            }
            None => self.decode_single(&table, payload, tag),
        }
    }

    /// Alias of [`decode`](Self::decode) matching the converter vocabulary
    pub fn deserialize(&self, payload: &[u8], tag: &str) -> Result<Value> {
        self.decode(payload, tag)
    }

    fn decode_single(&self, table: &CodecTable, payload: &[u8], tag: &str) -> Result<Value> {
        if let Some(ty) = BuiltinType::from_tag(tag) {
            return codec::decode(ty, payload);
        }
        if table.contains_tag(tag) {
            return table.deserialize(payload, tag).map(Value::Object);
        }
        match &self.external {
            Some(external) if !codec::is_reserved(tag) && external.type_for(tag).is_some() => {
                external.deserialize(payload, tag).map(Value::Object)
            }
            _ => Err(KvError::Decode(format!("unknown tag `{}`", tag))),
        }
    }
}

/// External converters share the user tag namespace
fn checked_external_tag(tag: String) -> Result<String> {
    validate_user_tag(&tag).map_err(|e| {
        KvError::Configuration(format!("external converter returned an invalid tag: {}", e))
    })?;
    Ok(tag)
}
