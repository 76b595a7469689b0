use std::fmt;

/// A qualified XML name: a `(prefix, local, uri)` triple.
///
/// Equality and hashing consider the local name and namespace URI only; the
/// prefix is cosmetic and preserved for serialization.
#[derive(Debug, Clone, Eq)]
pub struct Name {
    local: String,
    prefix: Option<String>,
    uri: Option<String>,
}

// a custom hasher that ignores the prefix
impl std::hash::Hash for Name {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.local.hash(state);
        self.uri.hash(state);
    }
}

// and partial eq that ignores the prefix
impl PartialEq for Name {
    fn eq(&self, other: &Self) -> bool {
        self.local == other.local && self.uri == other.uri
    }
}

impl Name {
    pub fn new(local: impl Into<String>, uri: Option<String>, prefix: Option<String>) -> Self {
        Name {
            local: local.into(),
            prefix,
            uri,
        }
    }

    /// A name without prefix or namespace.
    pub fn local(local: impl Into<String>) -> Self {
        Name {
            local: local.into(),
            prefix: None,
            uri: None,
        }
    }

    /// A prefixed name whose URI has already been resolved.
    pub fn prefixed(prefix: impl Into<String>, local: impl Into<String>, uri: impl Into<String>) -> Self {
        Name {
            local: local.into(),
            prefix: Some(prefix.into()),
            uri: Some(uri.into()),
        }
    }

    /// A name in a namespace, without a prefix.
    pub fn namespaced(local: impl Into<String>, uri: impl Into<String>) -> Self {
        Name {
            local: local.into(),
            prefix: None,
            uri: Some(uri.into()),
        }
    }

    /// Split `foo` or `ns:foo` into (prefix, local).
    pub fn split_prefix(full: &str) -> (Option<&str>, &str) {
        match full.split_once(':') {
            Some((prefix, local)) => (Some(prefix), local),
            None => (None, full),
        }
    }

    #[inline]
    pub fn local_name(&self) -> &str {
        &self.local
    }

    #[inline]
    pub fn prefix(&self) -> Option<&str> {
        self.prefix.as_deref()
    }

    #[inline]
    pub fn uri(&self) -> Option<&str> {
        self.uri.as_deref()
    }

    pub fn with_uri(self, uri: Option<&str>) -> Self {
        Name {
            local: self.local,
            prefix: self.prefix,
            uri: uri.map(|u| u.to_string()),
        }
    }

    /// The name as written in a document: `local` or `prefix:local`.
    pub fn full_name(&self) -> String {
        match &self.prefix {
            Some(prefix) if !prefix.is_empty() => format!("{}:{}", prefix, self.local),
            _ => self.local.clone(),
        }
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.full_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_eq_ignores_prefix() {
        let a = Name::prefixed("a", "item", "http://example.com");
        let b = Name::prefixed("b", "item", "http://example.com");
        assert_eq!(a, b);
    }

    #[test]
    fn test_neq_different_uri() {
        let a = Name::namespaced("item", "http://example.com/1");
        let b = Name::namespaced("item", "http://example.com/2");
        assert_ne!(a, b);
    }

    #[test]
    fn test_split_prefix() {
        assert_eq!(Name::split_prefix("xsl:template"), (Some("xsl"), "template"));
        assert_eq!(Name::split_prefix("template"), (None, "template"));
    }
}
