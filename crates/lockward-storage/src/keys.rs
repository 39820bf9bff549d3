//! Storage key builders.
//!
//! Centralising key construction keeps lock records and throttle counters
//! for the same resource apart, and keeps separate namespaces from
//! colliding on a shared backend.

/// Storage key for the lock record of `resource`.
pub fn lock_key(namespace: &str, resource: &str) -> String {
    format!("{namespace}:lock:{resource}")
}

/// Storage key for the throttle counter of `resource`.
pub fn throttle_key(namespace: &str, resource: &str) -> String {
    format!("{namespace}:throttle:{resource}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lock_key() {
        assert_eq!(lock_key("lockward", "invoice:42"), "lockward:lock:invoice:42");
    }

    #[test]
    fn test_lock_and_throttle_keys_differ() {
        assert_ne!(lock_key("ns", "r"), throttle_key("ns", "r"));
    }
}
