//! Object converters
//!
//! Bridges user-defined [`Object`] types to bytes.
//!
//! ## Pieces
//! - [`ObjectConverter`]: the pluggable SPI the registry calls for anything that
//!   is not a built-in. Implement it to plug in an external serializer.
//! - [`ObjectCodec`]: one encode/decode function pair bound to one type.
//! - [`CodecTable`]: the registry's own open table of `tag → ObjectCodec`,
//!   itself an `ObjectConverter`.

use std::any::TypeId;
use std::collections::HashMap;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::codec;
use crate::error::{KvError, Result};
use crate::value::{Object, TypeDescriptor};

// =============================================================================
// Converter SPI
// =============================================================================

/// Converts user objects to bytes and back.
///
/// The core never constructs user types itself; it only routes tags and bytes
/// through this trait.
pub trait ObjectConverter: Send + Sync {
    /// Serialize an object this converter has a tag for
    fn serialize(&self, object: &dyn Object) -> Result<Vec<u8>>;

    /// Rebuild the object stored under `tag`
    fn deserialize(&self, bytes: &[u8], tag: &str) -> Result<Box<dyn Object>>;

    /// Tag for a runtime object, `None` if this converter does not handle it
    fn tag_for(&self, object: &dyn Object) -> Option<String>;

    /// Tag for a declared type, `None` if this converter does not handle it
    fn tag_for_type(&self, type_id: TypeId) -> Option<String>;

    /// Type bound to `tag`, `None` if unknown
    fn type_for(&self, tag: &str) -> Option<TypeDescriptor>;
}

/// Reject tags a user may not bind
pub fn validate_user_tag(tag: &str) -> Result<()> {
    if tag.is_empty() {
        return Err(KvError::Configuration("tag must not be empty".to_string()));
    }
    if codec::is_reserved(tag) {
        return Err(KvError::Configuration(format!(
            "tag `{}` uses the reserved `{}` namespace",
            tag,
            codec::RESERVED_PREFIX
        )));
    }
    Ok(())
}

// =============================================================================
// Object Codec
// =============================================================================

type EncodeFn = Box<dyn Fn(&dyn Object) -> Result<Vec<u8>> + Send + Sync>;
type DecodeFn = Box<dyn Fn(&[u8]) -> Result<Box<dyn Object>> + Send + Sync>;

/// Encode/decode function pair bound to one user type
pub struct ObjectCodec {
    descriptor: TypeDescriptor,
    encode: EncodeFn,
    decode: DecodeFn,
}

impl ObjectCodec {
    /// Codec backed by bincode over the type's serde implementation
    pub fn bincode<T>() -> Self
    where
        T: Object + Serialize + DeserializeOwned,
    {
        Self::new::<T>(
            |value| bincode::serialize(value).map_err(|e| KvError::Serialization(e.to_string())),
            |bytes| {
                bincode::deserialize(bytes).map_err(|e| {
                    KvError::Decode(format!("{}: {}", std::any::type_name::<T>(), e))
                })
            },
        )
    }

    /// Codec from a caller-supplied function pair
    pub fn new<T: Object>(
        encode: fn(&T) -> Result<Vec<u8>>,
        decode: fn(&[u8]) -> Result<T>,
    ) -> Self {
        let descriptor = TypeDescriptor::of::<T>();
        Self {
            descriptor,
            encode: Box::new(move |object: &dyn Object| {
                let value = object.downcast_ref::<T>().ok_or_else(|| {
                    KvError::TypeMismatch {
                        expected: descriptor.name.to_string(),
                        found: object.object_type_name().to_string(),
                    }
                })?;
                encode(value)
            }),
            decode: Box::new(move |bytes: &[u8]| {
                decode(bytes).map(|value| Box::new(value) as Box<dyn Object>)
            }),
        }
    }

    pub fn descriptor(&self) -> TypeDescriptor {
        self.descriptor
    }

    pub fn encode(&self, object: &dyn Object) -> Result<Vec<u8>> {
        (self.encode)(object)
    }

    pub fn decode(&self, bytes: &[u8]) -> Result<Box<dyn Object>> {
        (self.decode)(bytes)
    }
}

// =============================================================================
// Codec Table
// =============================================================================

/// Open table of user codecs, keyed both ways
#[derive(Default)]
pub struct CodecTable {
    by_tag: HashMap<String, ObjectCodec>,
    by_type: HashMap<TypeId, String>,
}

impl CodecTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `tag` to the codec's type.
    ///
    /// Additive only: re-binding the same tag to the same type is a no-op,
    /// any other collision is a `Configuration` error.
    pub fn insert(&mut self, tag: &str, codec: ObjectCodec) -> Result<()> {
        validate_user_tag(tag)?;
        let descriptor = codec.descriptor();

        if let Some(existing) = self.by_tag.get(tag) {
            if existing.descriptor() == descriptor {
                return Ok(());
            }
            return Err(KvError::Configuration(format!(
                "tag `{}` is already bound to `{}`, cannot rebind to `{}`",
                tag,
                existing.descriptor().name,
                descriptor.name
            )));
        }

        if let Some(other_tag) = self.by_type.get(&descriptor.id) {
            return Err(KvError::Configuration(format!(
                "type `{}` is already bound to tag `{}`",
                descriptor.name, other_tag
            )));
        }

        self.by_type.insert(descriptor.id, tag.to_string());
        self.by_tag.insert(tag.to_string(), codec);
        Ok(())
    }

    pub fn contains_tag(&self, tag: &str) -> bool {
        self.by_tag.contains_key(tag)
    }

    pub fn len(&self) -> usize {
        self.by_tag.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_tag.is_empty()
    }

    /// (tag, type name) pairs sorted by tag
    pub fn bindings(&self) -> Vec<(String, &'static str)> {
        let mut bindings: Vec<_> = self
            .by_tag
            .iter()
            .map(|(tag, codec)| (tag.clone(), codec.descriptor().name))
            .collect();
        bindings.sort();
        bindings
    }
}

impl ObjectConverter for CodecTable {
    fn serialize(&self, object: &dyn Object) -> Result<Vec<u8>> {
        let tag = self
            .tag_for(object)
            .ok_or_else(|| KvError::UnmappedType(object.object_type_name().to_string()))?;
        // tag_for only returns tags present in by_tag
        match self.by_tag.get(&tag) {
            Some(codec) => codec.encode(object),
            None => Err(KvError::UnmappedType(object.object_type_name().to_string())),
        }
    }

    fn deserialize(&self, bytes: &[u8], tag: &str) -> Result<Box<dyn Object>> {
        match self.by_tag.get(tag) {
            Some(codec) => codec.decode(bytes),
            None => Err(KvError::Decode(format!("unknown tag `{}`", tag))),
        }
    }

    fn tag_for(&self, object: &dyn Object) -> Option<String> {
        self.tag_for_type(object.concrete_type_id())
    }

    fn tag_for_type(&self, type_id: TypeId) -> Option<String> {
        self.by_type.get(&type_id).cloned()
    }

    fn type_for(&self, tag: &str) -> Option<TypeDescriptor> {
        self.by_tag.get(tag).map(ObjectCodec::descriptor)
    }
}
