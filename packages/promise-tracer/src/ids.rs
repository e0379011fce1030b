//! Identifier types issued by the tracer.
//!
//! All ids are newtypes so that call, promise and argument ids cannot be
//! mixed up at a call site. Counters live in the session's
//! [`IdentityRegistry`](crate::registry::IdentityRegistry), never in statics.

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Identifier of a single function invocation.
///
/// Issued from a strictly increasing per-session counter. `0` is reserved
/// for "no call" (a null target, or no enclosing call on the stack).
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CallId(pub u64);

/// Identifier of a promise.
///
/// Positive ids are issued lazily when a promise is first observed (looked
/// up or forced); negative ids are issued when a promise is created while a
/// session is open. `0` means "not a promise" or "no promise".
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PromiseId(pub i64);

/// Identifier of one argument instance, unique across the whole session.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArgumentId(pub u64);

/// Content-addressed identifier of a function body.
///
/// Two functions with identical definition text always share a `FunctionId`.
#[derive(Clone, PartialEq, Eq, Hash, Debug, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FunctionId(String);

impl CallId {
    pub const INVALID: CallId = CallId(0);

    pub fn raw(&self) -> u64 {
        self.0
    }

    pub fn from_raw(value: u64) -> Self {
        CallId(value)
    }

    pub fn is_valid(&self) -> bool {
        *self != Self::INVALID
    }
}

impl PromiseId {
    pub const INVALID: PromiseId = PromiseId(0);

    pub fn raw(&self) -> i64 {
        self.0
    }

    pub fn from_raw(value: i64) -> Self {
        PromiseId(value)
    }

    pub fn is_valid(&self) -> bool {
        *self != Self::INVALID
    }

    /// True for ids issued at promise creation time.
    pub fn is_negative(&self) -> bool {
        self.0 < 0
    }
}

impl ArgumentId {
    pub fn raw(&self) -> u64 {
        self.0
    }

    pub fn from_raw(value: u64) -> Self {
        ArgumentId(value)
    }
}

impl FunctionId {
    /// Hash a function definition into its id (hex-encoded SHA-256).
    pub fn from_definition(definition: &str) -> Self {
        let digest = Sha256::digest(definition.as_bytes());
        FunctionId(hex::encode(digest))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CallId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for PromiseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for FunctionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_function_id_is_content_addressed() {
        let a = FunctionId::from_definition("function(x) x + 1");
        let b = FunctionId::from_definition("function(x) x + 1");
        let c = FunctionId::from_definition("function(x) x + 2");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.as_str().len(), 64);
    }

    #[test]
    fn test_sentinels() {
        assert!(!CallId::INVALID.is_valid());
        assert!(CallId::from_raw(3).is_valid());
        assert!(!PromiseId::INVALID.is_valid());
        assert!(PromiseId::from_raw(-2).is_negative());
        assert!(!PromiseId::from_raw(2).is_negative());
    }

    #[test]
    fn test_ids_serialize_transparently() {
        let json = serde_json::to_string(&PromiseId::from_raw(-7)).unwrap();
        assert_eq!(json, "-7");
        let json = serde_json::to_string(&CallId::from_raw(12)).unwrap();
        assert_eq!(json, "12");
    }
}
