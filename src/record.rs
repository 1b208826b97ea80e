//! Value record
//!
//! The immutable envelope written for every key: `{tag, payload, expire_at}`.

use std::time::{Duration, SystemTime};

use crate::error::{KvError, Result};

/// Tagged payload ready to hand to an engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValueRecord {
    tag: String,
    payload: Vec<u8>,
    expire_at: Option<SystemTime>,
}

impl ValueRecord {
    /// Build a record, rejecting an empty tag
    pub fn new(tag: impl Into<String>, payload: Vec<u8>) -> Result<Self> {
        let tag = tag.into();
        if tag.is_empty() {
            return Err(KvError::InvalidArgument(
                "record tag must not be empty".to_string(),
            ));
        }
        Ok(Self {
            tag,
            payload,
            expire_at: None,
        })
    }

    /// Same record with an absolute expiry
    pub fn with_expiry(mut self, at: SystemTime) -> Self {
        self.expire_at = Some(at);
        self
    }

    /// Same record expiring `max_age` from now
    pub fn with_max_age(self, max_age: Duration) -> Self {
        self.with_expiry(SystemTime::now() + max_age)
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn expire_at(&self) -> Option<SystemTime> {
        self.expire_at
    }

    /// Advisory only; nothing in the crate purges expired rows
    pub fn is_expired_at(&self, now: SystemTime) -> bool {
        matches!(self.expire_at, Some(at) if at <= now)
    }

    pub fn into_parts(self) -> (String, Vec<u8>) {
        (self.tag, self.payload)
    }
}
