use angle_name::{Name, XS_NAMESPACE};

use crate::error::{Error, Result};

/// The XDM type lattice.
///
/// `Untyped` is the top, `Any` sits above atomics and nodes, and the atomic
/// branch refines `decimal ⊃ integer` and `dateTime ⊃ date`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum XdmType {
    Untyped,
    Any,
    Atomic,
    Node,
    Boolean,
    String,
    Decimal,
    Integer,
    DateTime,
    Date,
    Binary,
}

impl XdmType {
    /// The supertype one step up the lattice; `None` at the top.
    pub fn parent(&self) -> Option<XdmType> {
        match self {
            XdmType::Untyped => None,
            XdmType::Any => Some(XdmType::Untyped),
            XdmType::Atomic | XdmType::Node => Some(XdmType::Any),
            XdmType::Boolean
            | XdmType::String
            | XdmType::Decimal
            | XdmType::DateTime
            | XdmType::Binary => Some(XdmType::Atomic),
            XdmType::Integer => Some(XdmType::Decimal),
            XdmType::Date => Some(XdmType::DateTime),
        }
    }

    /// Walk the lattice upward from `self` looking for `target`.
    pub fn is_subtype_of(&self, target: XdmType) -> bool {
        let mut current = Some(*self);
        while let Some(t) = current {
            if t == target {
                return true;
            }
            current = t.parent();
        }
        false
    }

    /// Resolve a type name in a `cast as` / `instance of` position. The `xs`
    /// prefix (or none) is accepted; anything else is a compile error.
    pub fn by_name(name: &Name) -> Result<XdmType> {
        if let Some(uri) = name.uri() {
            if uri != XS_NAMESPACE {
                return Err(Error::Compile(format!(
                    "unknown type namespace {:?}",
                    uri
                )));
            }
        }
        match name.local_name() {
            "untyped" | "untypedAtomic" => Ok(XdmType::Untyped),
            "item" | "any" => Ok(XdmType::Any),
            "anyAtomicType" => Ok(XdmType::Atomic),
            "node" => Ok(XdmType::Node),
            "boolean" => Ok(XdmType::Boolean),
            "string" => Ok(XdmType::String),
            "decimal" | "double" | "float" | "number" => Ok(XdmType::Decimal),
            "integer" | "int" | "long" => Ok(XdmType::Integer),
            "dateTime" => Ok(XdmType::DateTime),
            "date" => Ok(XdmType::Date),
            "base64Binary" | "hexBinary" => Ok(XdmType::Binary),
            other => Err(Error::Compile(format!("unknown type name {:?}", other))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lattice() {
        assert!(XdmType::Integer.is_subtype_of(XdmType::Decimal));
        assert!(XdmType::Integer.is_subtype_of(XdmType::Atomic));
        assert!(XdmType::Date.is_subtype_of(XdmType::DateTime));
        assert!(XdmType::Node.is_subtype_of(XdmType::Any));
        assert!(XdmType::String.is_subtype_of(XdmType::Untyped));
        assert!(!XdmType::Decimal.is_subtype_of(XdmType::Integer));
        assert!(!XdmType::String.is_subtype_of(XdmType::Node));
    }

    #[test]
    fn test_by_name() {
        assert_eq!(
            XdmType::by_name(&Name::local("integer")).unwrap(),
            XdmType::Integer
        );
        assert_eq!(
            XdmType::by_name(&Name::prefixed("xs", "date", XS_NAMESPACE)).unwrap(),
            XdmType::Date
        );
        assert!(XdmType::by_name(&Name::local("no-such-type")).is_err());
    }
}
