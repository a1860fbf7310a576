//! Keyword → category tables

/// Keywords (any of) and the label they assign
pub type CategoryRule = (&'static [&'static str], &'static str);

/// Label for descriptions no rule matches
pub const FALLBACK_CATEGORY: &str = "Otro";

/// Ordered rule table; evaluated top to bottom on the upper-cased description
#[derive(Debug, Clone, Copy)]
pub struct CategoryTable {
    rules: &'static [CategoryRule],
    fallback: &'static str,
}

impl CategoryTable {
    pub const fn new(rules: &'static [CategoryRule]) -> Self {
        Self {
            rules,
            fallback: FALLBACK_CATEGORY,
        }
    }

    pub const fn with_fallback(self, fallback: &'static str) -> Self {
        Self {
            rules: self.rules,
            fallback,
        }
    }

    /// First matching rule's label, or the fallback
    pub fn categorize(&self, description: &str) -> &'static str {
        self.lookup(description).unwrap_or(self.fallback)
    }

    /// First matching rule's label, if any
    pub fn lookup(&self, description: &str) -> Option<&'static str> {
        let upper = description.to_uppercase();
        self.rules
            .iter()
            .find(|(keywords, _)| keywords.iter().any(|k| upper.contains(k)))
            .map(|(_, label)| *label)
    }
}
