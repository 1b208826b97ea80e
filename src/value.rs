//! Value Module
//!
//! The in-memory shape of everything the store can hold.
//!
//! ## Layers
//! ```text
//! ┌──────────────────────────────┐
//! │ Storable (i32, String, Gist) │   typed caller-facing values
//! └──────────────┬───────────────┘
//!                │ into_value / from_value
//! ┌──────────────▼───────────────┐
//! │            Value             │   closed set of built-ins
//! │  + List(Vec<Value>)          │   homogeneous lists
//! │  + Object(Box<dyn Object>)   │   converter-backed user types
//! └──────────────────────────────┘
//! ```

use std::any::{Any, TypeId};
use std::fmt;

use crate::codec::BuiltinType;
use crate::error::{KvError, Result};

// =============================================================================
// Object Trait
// =============================================================================

/// Type-erasure helpers for [`Object`]; implemented for every `'static` type.
pub trait AsAny: Any + Send + Sync {
    fn as_any(&self) -> &dyn Any;

    fn into_any(self: Box<Self>) -> Box<dyn Any + Send + Sync>;

    /// Rust type name of the concrete value, for error messages
    fn object_type_name(&self) -> &'static str;
}

impl<T: Any + Send + Sync> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any + Send + Sync> {
        self
    }

    fn object_type_name(&self) -> &'static str {
        std::any::type_name::<T>()
    }
}

/// A user-defined type that a converter can turn into bytes.
///
/// Opting in is a one-liner:
///
/// ```
/// #[derive(Debug)]
/// struct Gist { id: String }
///
/// impl typedkv::Object for Gist {}
/// ```
///
/// The type still needs a tag, either through
/// [`ConverterRegistry::register`](crate::registry::ConverterRegistry::register)
/// or an external [`ObjectConverter`](crate::converter::ObjectConverter).
pub trait Object: AsAny + fmt::Debug {}

impl dyn Object {
    /// `TypeId` of the concrete type behind the trait object
    pub fn concrete_type_id(&self) -> TypeId {
        self.as_any().type_id()
    }

    pub fn downcast_ref<T: Object>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }
}

// =============================================================================
// Type Descriptors
// =============================================================================

/// Runtime type descriptor for a user object type
#[derive(Debug, Clone, Copy)]
pub struct TypeDescriptor {
    pub id: TypeId,
    pub name: &'static str,
}

impl TypeDescriptor {
    pub fn of<T: 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }
}

impl PartialEq for TypeDescriptor {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeDescriptor {}

/// The declared type a caller asks for (queries, typed reads)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeKind {
    Builtin(BuiltinType),
    Object(TypeDescriptor),
}

impl TypeKind {
    pub fn name(&self) -> &'static str {
        match self {
            TypeKind::Builtin(ty) => ty.type_name(),
            TypeKind::Object(desc) => desc.name,
        }
    }
}

// =============================================================================
// Value
// =============================================================================

/// A dynamically typed value
#[derive(Debug)]
pub enum Value {
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Bool(bool),
    Byte(u8),
    Char(char),
    String(String),
    IntArray(Vec<i32>),
    LongArray(Vec<i64>),
    FloatArray(Vec<f32>),
    DoubleArray(Vec<f64>),
    CharArray(Vec<char>),
    StringArray(Vec<String>),

    /// Homogeneous list; every element resolves to the same tag
    List(Vec<Value>),

    /// Converter-backed user object
    Object(Box<dyn Object>),
}

impl Value {
    /// Human-readable name of the runtime type
    pub fn type_name(&self) -> String {
        match self {
            Value::List(items) => match items.first() {
                Some(first) => format!("List<{}>", first.type_name()),
                None => "List<?>".to_string(),
            },
            Value::Object(object) => (**object).object_type_name().to_string(),
            other => BuiltinType::of(other)
                .map(|ty| ty.type_name().to_string())
                .unwrap_or_else(|| "unknown".to_string()),
        }
    }
}

// =============================================================================
// Storable
// =============================================================================

/// Conversion between a Rust type and [`Value`]
pub trait Storable: Sized + 'static {
    /// The declared type, used to resolve a tag without an instance
    fn kind() -> TypeKind;

    fn into_value(self) -> Value;

    fn from_value(value: Value) -> Result<Self>;
}

fn mismatch(expected: &str, found: &Value) -> KvError {
    KvError::TypeMismatch {
        expected: expected.to_string(),
        found: found.type_name(),
    }
}

macro_rules! builtin_storable {
    ($ty:ty, $variant:ident) => {
        impl Storable for $ty {
            fn kind() -> TypeKind {
                TypeKind::Builtin(BuiltinType::$variant)
            }

            fn into_value(self) -> Value {
                Value::$variant(self)
            }

            fn from_value(value: Value) -> Result<Self> {
                match value {
                    Value::$variant(v) => Ok(v),
                    other => Err(mismatch(BuiltinType::$variant.type_name(), &other)),
                }
            }
        }
    };
}

builtin_storable!(i32, Int);
builtin_storable!(i64, Long);
builtin_storable!(f32, Float);
builtin_storable!(f64, Double);
builtin_storable!(bool, Bool);
builtin_storable!(u8, Byte);
builtin_storable!(char, Char);
builtin_storable!(String, String);
builtin_storable!(Vec<i32>, IntArray);
builtin_storable!(Vec<i64>, LongArray);
builtin_storable!(Vec<f32>, FloatArray);
builtin_storable!(Vec<f64>, DoubleArray);
builtin_storable!(Vec<char>, CharArray);
builtin_storable!(Vec<String>, StringArray);

impl<T: Object> Storable for T {
    fn kind() -> TypeKind {
        TypeKind::Object(TypeDescriptor::of::<T>())
    }

    fn into_value(self) -> Value {
        Value::Object(Box::new(self))
    }

    fn from_value(value: Value) -> Result<Self> {
        let expected = std::any::type_name::<T>();
        match value {
            Value::Object(object) => {
                let found = (*object).object_type_name();
                object
                    .into_any()
                    .downcast::<T>()
                    .map(|boxed| *boxed)
                    .map_err(|_| KvError::TypeMismatch {
                        expected: expected.to_string(),
                        found: found.to_string(),
                    })
            }
            other => Err(mismatch(expected, &other)),
        }
    }
}
