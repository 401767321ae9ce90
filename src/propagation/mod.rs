//! Context propagation across process boundaries.
//!
//! Propagation serializes a span context into carrier headers on the way out
//! and restores it on the way in, so a downstream service can continue the
//! caller's trace. Carriers are abstracted behind [`Injector`] and
//! [`Extractor`] so the same propagator works for HTTP headers, message
//! metadata, or a plain `HashMap` in tests.

use std::collections::HashMap;

mod trace_context;

pub use trace_context::TraceContextPropagator;

/// Injector provides an interface for adding fields into an outgoing carrier.
pub trait Injector {
    /// Add a key and value to the carrier.
    fn set(&mut self, key: &str, value: String);
}

/// Extractor provides an interface for reading fields from an incoming
/// carrier.
pub trait Extractor {
    /// Get a value for a key from the carrier.
    fn get(&self, key: &str) -> Option<&str>;

    /// Collect all the keys in the carrier.
    fn keys(&self) -> Vec<&str>;
}

impl<S: std::hash::BuildHasher> Injector for HashMap<String, String, S> {
    /// Set a key and value in the HashMap.
    fn set(&mut self, key: &str, value: String) {
        self.insert(key.to_lowercase(), value);
    }
}

impl<S: std::hash::BuildHasher> Extractor for HashMap<String, String, S> {
    /// Get a value for a key from the HashMap.
    fn get(&self, key: &str) -> Option<&str> {
        self.get(&key.to_lowercase()).map(|v| v.as_str())
    }

    /// Collect all the keys from the HashMap.
    fn keys(&self) -> Vec<&str> {
        self.keys().map(|k| k.as_str()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_map_get() {
        let mut carrier = HashMap::new();
        carrier.set("HeaderName", "value".to_string());
        assert_eq!(
            Extractor::get(&carrier, "HEADERNAME"),
            Some("value"),
            "case insensitive extraction"
        );
    }

    #[test]
    fn hash_map_keys() {
        let mut carrier = HashMap::new();
        carrier.set("HeaderName1", "value1".to_string());
        carrier.set("HeaderName2", "value2".to_string());

        let mut keys = Extractor::keys(&carrier);
        keys.sort_unstable();
        assert_eq!(keys, vec!["headername1", "headername2"]);
    }
}
