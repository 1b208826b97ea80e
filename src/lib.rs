//! # typedkv
//!
//! An embedded typed key-value store with:
//! - Exact binary codecs for built-in scalars, arrays and strings
//! - Stable persisted tags for user-defined types
//! - Homogeneous lists under composite `kv.list<...>` tags
//! - Prefix / substring / type-filtered queries
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    Store / Query                             │
//! │        (typed CRUD, fluent scan builder, dispatch lock)      │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//!          ┌────────────┴────────────┐
//!          │                         │
//!          ▼                         ▼
//!   ┌──────────────────┐      ┌─────────────┐
//!   │ConverterRegistry │      │   Engine    │
//!   │ (tag ↔ type)     │      │ (row store) │
//!   └────────┬─────────┘      └──────┬──────┘
//!            │                       │
//!     ┌──────┴───────┐        ┌──────┴──────┐
//!     ▼              ▼        ▼             ▼
//! ┌────────┐  ┌────────────┐ ┌──────────┐ ┌───────────┐
//! │ Codec  │  │ Converters │ │ Memory   │ │ LogEngine │
//! │ (kv.*) │  │ (user/SPI) │ │ Engine   │ │ (row log) │
//! └────────┘  └────────────┘ └──────────┘ └───────────┘
//! ```
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//! use serde::{Deserialize, Serialize};
//! use typedkv::{ConverterRegistry, MemoryEngine, Object, Store};
//!
//! #[derive(Debug, PartialEq, Serialize, Deserialize)]
//! struct Gist { id: String }
//! impl Object for Gist {}
//!
//! let registry = Arc::new(ConverterRegistry::new());
//! registry.register::<Gist>("gist").unwrap();
//!
//! let store = Store::new(Arc::new(MemoryEngine::new()), registry);
//! store.set("gist-1", Gist { id: "1".into() }).unwrap();
//! assert_eq!(store.get::<Gist>("gist-1").unwrap(), Some(Gist { id: "1".into() }));
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod value;
pub mod codec;
pub mod converter;
pub mod registry;
pub mod record;
pub mod log;
pub mod engine;
pub mod store;
pub mod query;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{KvError, Result};
pub use config::{Config, SyncStrategy};
pub use value::{Object, Storable, TypeDescriptor, TypeKind, Value};
pub use codec::BuiltinType;
pub use converter::ObjectConverter;
pub use registry::{ConverterRegistry, StoredType};
pub use record::ValueRecord;
pub use engine::{Engine, KeyPredicate, LogEngine, MemoryEngine, Row};
pub use store::{Entry, Store};
pub use query::QuerySpec;

// =============================================================================
// Version Info
// =============================================================================

/// Current version of typedkv
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
