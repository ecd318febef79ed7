//! Swap tools excluded from quotes for the rest of a session.

use std::collections::BTreeSet;

/// Set of denied router tools. Grows only.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Denylist {
    tools: BTreeSet<String>,
}

impl Denylist {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `tool`; returns whether it was new.
    pub fn insert(&mut self, tool: impl Into<String>) -> bool {
        self.tools.insert(tool.into())
    }

    pub fn contains(&self, tool: &str) -> bool {
        self.tools.contains(tool)
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Tools in sorted order, as sent to the router.
    pub fn to_vec(&self) -> Vec<String> {
        self.tools.iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_is_monotonic() {
        let mut denylist = Denylist::new();
        assert!(denylist.insert("paraswap"));
        assert!(!denylist.insert("paraswap"));
        assert!(denylist.insert("odos"));

        assert_eq!(denylist.len(), 2);
        assert!(denylist.contains("paraswap"));
        assert_eq!(denylist.to_vec(), vec!["odos".to_string(), "paraswap".to_string()]);
    }

    #[test]
    fn test_empty() {
        let denylist = Denylist::default();
        assert!(denylist.is_empty());
        assert!(!denylist.contains("paraswap"));
    }
}
