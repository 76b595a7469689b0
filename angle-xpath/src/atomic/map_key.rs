use ordered_float::OrderedFloat;

use super::atomic_core::Atomic;

/// A hashable identity for atomic values, used by `distinct-values`,
/// `for-each-group` and `xsl:merge`.
///
/// Numbers collapse into one key space regardless of integer or decimal
/// storage; untyped data keys like the equivalent string.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MapKey {
    Number(OrderedFloat<f64>),
    String(String),
    Boolean(bool),
    Date(String),
    Bytes(Vec<u8>),
}

impl Atomic {
    pub fn map_key(&self) -> MapKey {
        match self {
            Atomic::Integer(i) => MapKey::Number(OrderedFloat(*i as f64)),
            Atomic::Decimal(d) => MapKey::Number(OrderedFloat(*d)),
            Atomic::Untyped(s) | Atomic::String(s) => MapKey::String(s.to_string()),
            Atomic::Boolean(b) => MapKey::Boolean(*b),
            Atomic::Date(_) | Atomic::DateTime(_) => MapKey::Date(self.string_value()),
            Atomic::Binary(b) => MapKey::Bytes(b.to_vec()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numbers_unify() {
        assert_eq!(Atomic::Integer(2).map_key(), Atomic::Decimal(2.0).map_key());
    }

    #[test]
    fn test_untyped_keys_as_string() {
        assert_eq!(
            Atomic::Untyped("a".into()).map_key(),
            Atomic::from("a").map_key()
        );
    }
}
