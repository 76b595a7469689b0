//! The built-in function set, resolved per (local name, namespace URI).
//!
//! The default library covers the core boolean, node, string, numeric,
//! sequence and date functions. Opt-in groups (`file:*`, `http:*`,
//! `crypto:*`, `binary:*`, `archive:*`, `process:*`) are disabled until the
//! host enables them; enabling mutates only this library instance, which is
//! cloned per run.

mod archive;
mod binary;
mod crypto;
mod datetime;
mod file;
mod general;
mod http;
mod numeric;
mod process;
mod sequences;
mod strings;

use ahash::{HashMap, HashMapExt};
use angle_name::{Name, FN_NAMESPACE};

use crate::context::Context;
use crate::error::{Error, Result};
use crate::evaluator::Evaluator;
use crate::sequence::Sequence;

pub const FILE_NAMESPACE: &str = "http://expath.org/ns/file";
pub const HTTP_NAMESPACE: &str = "http://expath.org/ns/http-client";
pub const CRYPTO_NAMESPACE: &str = "http://expath.org/ns/crypto";
pub const BINARY_NAMESPACE: &str = "http://expath.org/ns/binary";
pub const ARCHIVE_NAMESPACE: &str = "http://expath.org/ns/archive";
pub const PROCESS_NAMESPACE: &str = "http://expath.org/ns/process";

/// A built-in implementation: evaluated arguments in, sequence out.
pub type FunctionImpl = fn(&mut Evaluator, &Context, &[Sequence]) -> Result<Sequence>;

#[derive(Debug, Clone, Copy)]
struct Entry {
    min_arity: usize,
    /// `None` means variadic (`concat`).
    max_arity: Option<usize>,
    implementation: FunctionImpl,
}

/// Opt-in groups of side-effecting built-ins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FunctionGroup {
    File,
    Http,
    Crypto,
    Binary,
    Archive,
    Process,
}

impl FunctionGroup {
    pub fn prefix(&self) -> &'static str {
        match self {
            FunctionGroup::File => "file",
            FunctionGroup::Http => "http",
            FunctionGroup::Crypto => "crypto",
            FunctionGroup::Binary => "binary",
            FunctionGroup::Archive => "archive",
            FunctionGroup::Process => "process",
        }
    }

    pub fn uri(&self) -> &'static str {
        match self {
            FunctionGroup::File => FILE_NAMESPACE,
            FunctionGroup::Http => HTTP_NAMESPACE,
            FunctionGroup::Crypto => CRYPTO_NAMESPACE,
            FunctionGroup::Binary => BINARY_NAMESPACE,
            FunctionGroup::Archive => ARCHIVE_NAMESPACE,
            FunctionGroup::Process => PROCESS_NAMESPACE,
        }
    }

    pub fn by_name(name: &str) -> Option<FunctionGroup> {
        Some(match name {
            "file" => FunctionGroup::File,
            "http" => FunctionGroup::Http,
            "crypto" => FunctionGroup::Crypto,
            "binary" => FunctionGroup::Binary,
            "archive" => FunctionGroup::Archive,
            "process" => FunctionGroup::Process,
            _ => return None,
        })
    }
}

/// Function registry keyed by (local name, namespace URI).
#[derive(Debug, Clone)]
pub struct FunctionLibrary {
    functions: HashMap<(String, String), Vec<Entry>>,
}

impl FunctionLibrary {
    pub fn empty() -> Self {
        FunctionLibrary {
            functions: HashMap::new(),
        }
    }

    /// The default set: core functions only, no opt-in groups.
    pub fn default_library() -> Self {
        let mut library = Self::empty();
        general::register(&mut library);
        strings::register(&mut library);
        numeric::register(&mut library);
        sequences::register(&mut library);
        datetime::register(&mut library);
        library
    }

    /// Insert an opt-in group's entries.
    pub fn enable(&mut self, group: FunctionGroup) {
        match group {
            FunctionGroup::File => file::register(self),
            FunctionGroup::Http => http::register(self),
            FunctionGroup::Crypto => crypto::register(self),
            FunctionGroup::Binary => binary::register(self),
            FunctionGroup::Archive => archive::register(self),
            FunctionGroup::Process => process::register(self),
        }
    }

    pub(crate) fn register(
        &mut self,
        uri: &str,
        local: &str,
        min_arity: usize,
        max_arity: Option<usize>,
        implementation: FunctionImpl,
    ) {
        self.functions
            .entry((local.to_string(), uri.to_string()))
            .or_default()
            .push(Entry {
                min_arity,
                max_arity,
                implementation,
            });
    }

    /// Register under the function namespace.
    pub(crate) fn register_fn(
        &mut self,
        local: &str,
        min_arity: usize,
        max_arity: Option<usize>,
        implementation: FunctionImpl,
    ) {
        self.register(FN_NAMESPACE, local, min_arity, max_arity, implementation);
    }

    pub fn resolve(&self, name: &Name, arity: usize) -> Result<FunctionImpl> {
        let key = (
            name.local_name().to_string(),
            name.uri().unwrap_or_default().to_string(),
        );
        let entries = self.functions.get(&key).ok_or_else(|| {
            Error::undefined(format!("unknown function {}()", name))
        })?;
        entries
            .iter()
            .find(|entry| {
                arity >= entry.min_arity
                    && entry.max_arity.map(|max| arity <= max).unwrap_or(true)
            })
            .map(|entry| entry.implementation)
            .ok_or_else(|| {
                Error::arity(format!(
                    "function {}() does not take {} arguments",
                    name, arity
                ))
            })
    }

    pub fn contains(&self, name: &Name) -> bool {
        let key = (
            name.local_name().to_string(),
            name.uri().unwrap_or_default().to_string(),
        );
        self.functions.contains_key(&key)
    }
}

impl Default for FunctionLibrary {
    fn default() -> Self {
        Self::default_library()
    }
}

// --- argument helpers shared by the implementations

/// String value of an optional argument, falling back to the context item.
pub(crate) fn string_or_context(
    evaluator: &Evaluator,
    context: &Context,
    args: &[Sequence],
    index: usize,
) -> Result<String> {
    match args.get(index) {
        Some(sequence) => sequence.string_value(evaluator.forest),
        None => Ok(context.item.string_value(evaluator.forest)),
    }
}

pub(crate) fn string_arg(
    evaluator: &Evaluator,
    args: &[Sequence],
    index: usize,
) -> Result<String> {
    args[index].string_value(evaluator.forest)
}

pub(crate) fn number_arg(evaluator: &Evaluator, args: &[Sequence], index: usize) -> Result<f64> {
    args[index].atomized_one(evaluator.forest)?.to_number()
}

pub(crate) fn node_or_context(
    context: &Context,
    args: &[Sequence],
    index: usize,
) -> Result<Option<angle_xml::Node>> {
    match args.get(index) {
        Some(sequence) => Ok(match sequence.option()? {
            Some(item) => Some(item.to_node()?),
            None => None,
        }),
        None => Ok(Some(context.node()?)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_by_qualified_name() {
        let library = FunctionLibrary::default_library();
        let name = Name::namespaced("count", FN_NAMESPACE);
        assert!(library.resolve(&name, 1).is_ok());
        let err = library.resolve(&name, 4).unwrap_err();
        assert_eq!(err.cause(), Some(crate::EvaluationCause::Arity));
        let unknown = Name::namespaced("no-such-fn", FN_NAMESPACE);
        assert_eq!(
            library.resolve(&unknown, 0).unwrap_err().cause(),
            Some(crate::EvaluationCause::Undefined)
        );
    }

    #[test]
    fn test_groups_are_opt_in() {
        let mut library = FunctionLibrary::default_library();
        let read = Name::namespaced("read", FILE_NAMESPACE);
        assert!(!library.contains(&read));
        library.enable(FunctionGroup::File);
        assert!(library.contains(&read));
    }
}
