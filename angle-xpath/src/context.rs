use ahash::{HashMap, HashMapExt};
use angle_name::{Name, Namespaces};

use crate::atomic::Atomic;
use crate::cancel::Cancellation;
use crate::error::{Error, Result};
use crate::functions::FunctionLibrary;
use crate::sequence::{Item, Sequence};

/// The dynamic focus of an evaluation step: context item, 1-based position
/// and size.
#[derive(Debug, Clone)]
pub struct Context {
    pub item: Item,
    pub position: usize,
    pub size: usize,
}

impl Context {
    pub fn new(item: impl Into<Item>) -> Self {
        Context {
            item: item.into(),
            position: 1,
            size: 1,
        }
    }

    pub fn with_focus(item: impl Into<Item>, position: usize, size: usize) -> Self {
        Context {
            item: item.into(),
            position,
            size,
        }
    }

    pub fn node(&self) -> Result<angle_xml::Node> {
        self.item.to_node()
    }
}

/// Grouping state exposed by `current-group()`, `current-grouping-key()`,
/// `current-merge-group()` and `current-merge-key()`.
#[derive(Debug, Clone, Default)]
pub struct GroupState {
    pub current_group: Sequence,
    pub current_grouping_key: Option<Atomic>,
    pub merge_groups: HashMap<String, Sequence>,
    pub current_merge_key: Option<Atomic>,
    pub is_merge: bool,
}

/// Stacked scopes binding variable names, plus the function registry,
/// namespace bindings and the cancellation token.
///
/// Sub-scopes are pushed at instruction boundaries and discarded on exit;
/// lookup walks from the innermost frame outward; `define` writes to the top
/// frame.
#[derive(Debug)]
pub struct Environment {
    frames: Vec<HashMap<Name, Sequence>>,
    pub functions: FunctionLibrary,
    pub namespaces: Namespaces,
    pub cancellation: Cancellation,
    group_stack: Vec<GroupState>,
}

impl Environment {
    pub fn new() -> Self {
        Environment {
            frames: vec![HashMap::new()],
            functions: FunctionLibrary::default_library(),
            namespaces: Namespaces::default(),
            cancellation: Cancellation::new(),
            group_stack: Vec::new(),
        }
    }

    pub fn push_scope(&mut self) {
        self.frames.push(HashMap::new());
    }

    pub fn pop_scope(&mut self) {
        debug_assert!(self.frames.len() > 1);
        self.frames.pop();
    }

    /// Bind a variable in the current scope.
    pub fn define(&mut self, name: Name, value: Sequence) {
        self.frames.last_mut().unwrap().insert(name, value);
    }

    pub fn lookup(&self, name: &Name) -> Result<&Sequence> {
        for frame in self.frames.iter().rev() {
            if let Some(value) = frame.get(name) {
                return Ok(value);
            }
        }
        Err(Error::undefined(format!("variable ${} is not bound", name)))
    }

    pub fn is_defined(&self, name: &Name) -> bool {
        self.frames.iter().rev().any(|frame| frame.contains_key(name))
    }

    pub fn push_group(&mut self, state: GroupState) {
        self.group_stack.push(state);
    }

    pub fn pop_group(&mut self) {
        self.group_stack.pop();
    }

    pub fn current_group(&self) -> Option<&GroupState> {
        self.group_stack.last()
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scoped_lookup() {
        let mut env = Environment::new();
        env.define(Name::local("x"), Sequence::singleton(1i64));
        env.push_scope();
        env.define(Name::local("x"), Sequence::singleton(2i64));
        assert_eq!(
            env.lookup(&Name::local("x")).unwrap(),
            &Sequence::singleton(2i64)
        );
        env.pop_scope();
        assert_eq!(
            env.lookup(&Name::local("x")).unwrap(),
            &Sequence::singleton(1i64)
        );
    }

    #[test]
    fn test_unbound_variable() {
        let env = Environment::new();
        let err = env.lookup(&Name::local("nope")).unwrap_err();
        assert_eq!(err.cause(), Some(crate::EvaluationCause::Undefined));
    }
}
