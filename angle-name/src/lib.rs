//! Qualified names and namespace scoping for Angle.

mod name;
mod namespaces;

pub use name::Name;
pub use namespaces::{
    NamespaceStack, Namespaces, FN_NAMESPACE, XMLNS_NAMESPACE, XML_NAMESPACE, XSLT_NAMESPACE,
    XS_NAMESPACE,
};
