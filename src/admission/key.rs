//! History key generation.

/// A key that identifies one request history: a resource and the caller
/// accessing it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HistoryKey {
    /// The protected resource, e.g. a request path
    pub resource: String,
    /// The caller identity token
    pub caller: String,
}

impl HistoryKey {
    /// Create a new history key.
    pub fn new(resource: &str, caller: &str) -> Self {
        Self {
            resource: resource.to_string(),
            caller: caller.to_string(),
        }
    }
}

impl std::fmt::Display for HistoryKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.resource, self.caller)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_history_key_display() {
        let key = HistoryKey::new("/api/orders", "client-token");
        assert_eq!(key.to_string(), "/api/orders:client-token");
    }

    #[test]
    fn test_keys_differ_when_split_differs() {
        // "a:b" + "c" and "a" + "b:c" render the same but must stay distinct.
        let key1 = HistoryKey::new("a:b", "c");
        let key2 = HistoryKey::new("a", "b:c");

        assert_eq!(key1.to_string(), key2.to_string());
        assert_ne!(key1, key2);
    }
}
