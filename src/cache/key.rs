//! Cache key derivation
//!
//! A key is the operation identity followed by one `#`-prefixed segment per
//! argument, each segment being the argument's `Display` rendering (absent
//! arguments render as an empty segment). Two different values with the same
//! rendering map to the same key.
//!
//! Separators and escapes inside the operation identity are escaped with `\`,
//! so an identity never reads as an argument segment: `a#1` with no arguments
//! and `a` called with `1` get distinct keys.

use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};

const SEGMENT_SEPARATOR: char = '#';
const ESCAPE: char = '\\';

/// Stable identifier for a logical operation
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OperationId(String);

impl OperationId {
    /// Use a registered constant name as the identity
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Derive the identity from a signature string, hashed once
    pub fn from_signature(signature: &str) -> Self {
        let mut hasher = DefaultHasher::new();
        signature.hash(&mut hasher);
        Self(format!("{:x}", hasher.finish()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for OperationId {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for OperationId {
    fn from(name: String) -> Self {
        Self::new(name)
    }
}

/// Ordered argument list of one call, already rendered to text
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallArgs {
    segments: Vec<Option<String>>,
}

impl CallArgs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a present argument
    pub fn arg(mut self, value: impl fmt::Display) -> Self {
        self.segments.push(Some(value.to_string()));
        self
    }

    /// Append an argument that may be absent
    pub fn opt_arg<T: fmt::Display>(mut self, value: Option<T>) -> Self {
        self.segments.push(value.map(|v| v.to_string()));
        self
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }
}

impl<T: fmt::Display> FromIterator<T> for CallArgs {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self {
            segments: iter.into_iter().map(|v| Some(v.to_string())).collect(),
        }
    }
}

impl From<Vec<Option<String>>> for CallArgs {
    fn from(segments: Vec<Option<String>>) -> Self {
        Self { segments }
    }
}

/// Derived cache key
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Derives cache keys from call identity
#[derive(Debug, Clone, Copy, Default)]
pub struct KeyGenerator;

impl KeyGenerator {
    pub fn generate(&self, operation: &OperationId, args: &CallArgs) -> CacheKey {
        generate_key(operation, args)
    }
}

/// Build the key for `operation` called with `args`
pub fn generate_key(operation: &OperationId, args: &CallArgs) -> CacheKey {
    let capacity = operation.as_str().len()
        + args
            .segments
            .iter()
            .map(|s| 1 + s.as_ref().map_or(0, String::len))
            .sum::<usize>();

    let mut key = String::with_capacity(capacity);
    for c in operation.as_str().chars() {
        if c == SEGMENT_SEPARATOR || c == ESCAPE {
            key.push(ESCAPE);
        }
        key.push(c);
    }
    for segment in &args.segments {
        key.push(SEGMENT_SEPARATOR);
        if let Some(text) = segment {
            key.push_str(text);
        }
    }

    CacheKey(key)
}
