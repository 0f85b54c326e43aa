//! Per-request retry accounting.
//!
//! The [`RetryLedger`] maps a [`RequestIdentity`] to the number of retries already spent on
//! it. An entry is created on the first retried failure, incremented before every further
//! retry and removed when the logical request reaches a terminal outcome.
//!
//! Identities are derived from the request shape alone, so two concurrent requests with the
//! same method, path and query parameters share one entry. Clients that need independent
//! accounting for such requests can opt into per-call identities with
//! [`ClientBuilder::isolate_retry_accounting`](crate::ClientBuilder::isolate_retry_accounting).

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use http::Method;
use parking_lot::Mutex;

/// Key under which retry state of a logical request is tracked.
///
/// ```
/// use pmo_client::RequestIdentity;
/// use http::Method;
/// use std::collections::BTreeMap;
///
/// let mut params = BTreeMap::new();
/// params.insert("status".to_string(), "open".to_string());
/// params.insert("page".to_string(), "2".to_string());
///
/// let identity = RequestIdentity::new(&Method::GET, "/raid/risks", &params);
/// assert_eq!(identity.as_str(), r#"GET/raid/risks{"page":"2","status":"open"}"#);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestIdentity(String);

impl RequestIdentity {
    /// Derives the identity of `method path?params`.
    ///
    /// Parameters are serialized in key order, so insertion order never matters.
    pub fn new(method: &Method, path: &str, params: &BTreeMap<String, String>) -> Self {
        // A string-keyed map of strings always serializes.
        let params = serde_json::to_string(params).unwrap_or_default();
        Self(format!("{}{}{}", method, path, params))
    }

    /// Makes the identity unique to one call.
    pub(crate) fn with_sequence(self, sequence: u64) -> Self {
        Self(format!("{}#{}", self.0, sequence))
    }

    /// The identity as a string key.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RequestIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Table of retries spent per [`RequestIdentity`].
///
/// Every operation takes the lock for a single read-modify-write and never holds it across
/// an await point.
#[derive(Debug, Default)]
pub struct RetryLedger {
    entries: Mutex<HashMap<RequestIdentity, u32>>,
}

impl RetryLedger {
    /// Creates an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the retries spent on `identity`, or `None` if it has no entry.
    pub fn get(&self, identity: &RequestIdentity) -> Option<u32> {
        self.entries.lock().get(identity).copied()
    }

    /// Records one more retry for `identity`, creating the entry at zero first if needed.
    ///
    /// Returns the updated count.
    pub fn increment(&self, identity: &RequestIdentity) -> u32 {
        let mut entries = self.entries.lock();
        let count = entries.entry(identity.clone()).or_insert(0);
        *count = count.saturating_add(1);
        *count
    }

    /// Removes the entry for `identity`, returning its last count.
    pub fn clear(&self, identity: &RequestIdentity) -> Option<u32> {
        self.entries.lock().remove(identity)
    }

    /// Number of identities currently holding retry state.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Returns `true` if no identity holds retry state.
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}
