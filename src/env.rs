// ABOUTME: Scoped environment mapping names to variable, builtin, and function entries

use crate::types::{ParamType, Type};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

/// `-1` means unbounded for either bound.
pub const UNBOUNDED: i32 = -1;

#[derive(Debug, Clone)]
pub struct VariableEntry<V> {
    pub ty: Type,
    pub storage: V,
}

#[derive(Debug, Clone)]
pub struct FunctionEntry<F> {
    pub params: Vec<ParamType>,
    pub return_type: Type,
    pub handle: F,
}

#[derive(Debug, Clone)]
pub enum EnvEntry<V, F> {
    Variable(VariableEntry<V>),
    Builtin {
        arity_min: i32,
        arity_max: i32,
        docstring: Option<String>,
    },
    Function {
        entry: FunctionEntry<F>,
        docstring: Option<String>,
    },
}

impl<V, F> EnvEntry<V, F> {
    pub fn arity(&self) -> (i32, i32) {
        match self {
            EnvEntry::Variable(_) => (0, 0),
            EnvEntry::Builtin {
                arity_min,
                arity_max,
                ..
            } => (*arity_min, *arity_max),
            EnvEntry::Function { entry, .. } => {
                let n = entry.params.len() as i32;
                (n, n)
            }
        }
    }

    pub fn docstring(&self) -> Option<&str> {
        match self {
            EnvEntry::Variable(_) => None,
            EnvEntry::Builtin { docstring, .. } | EnvEntry::Function { docstring, .. } => {
                docstring.as_deref()
            }
        }
    }
}

/// A separate-chaining name table with a parent link. The REPL keeps one
/// persistent environment; compilation nests a child per function body whose
/// bindings vanish when the frame is torn down.
#[derive(Debug)]
pub struct Environment<V, F> {
    bindings: RefCell<HashMap<String, EnvEntry<V, F>>>,
    parent: Option<Rc<Environment<V, F>>>,
}

impl<V: Clone, F: Clone> Environment<V, F> {
    pub fn new() -> Rc<Self> {
        Rc::new(Self {
            bindings: RefCell::new(HashMap::new()),
            parent: None,
        })
    }

    pub fn with_parent(parent: Rc<Environment<V, F>>) -> Rc<Self> {
        Rc::new(Self {
            bindings: RefCell::new(HashMap::new()),
            parent: Some(parent),
        })
    }

    pub fn insert_variable(&self, name: impl Into<String>, ty: Type, storage: V) {
        self.bindings.borrow_mut().insert(
            name.into(),
            EnvEntry::Variable(VariableEntry { ty, storage }),
        );
    }

    pub fn insert_builtin(
        &self,
        name: impl Into<String>,
        arity_min: i32,
        arity_max: i32,
        docstring: Option<String>,
    ) {
        self.bindings.borrow_mut().insert(
            name.into(),
            EnvEntry::Builtin {
                arity_min,
                arity_max,
                docstring,
            },
        );
    }

    pub fn insert_function(
        &self,
        name: impl Into<String>,
        params: Vec<ParamType>,
        return_type: Type,
        handle: F,
        docstring: Option<String>,
    ) {
        self.bindings.borrow_mut().insert(
            name.into(),
            EnvEntry::Function {
                entry: FunctionEntry {
                    params,
                    return_type,
                    handle,
                },
                docstring,
            },
        );
    }

    /// Innermost-first lookup; definitions in a child frame never reach
    /// outward to overwrite a shadowed binding in a parent frame.
    pub fn lookup(&self, name: &str) -> Option<EnvEntry<V, F>> {
        if let Some(entry) = self.bindings.borrow().get(name) {
            return Some(entry.clone());
        }
        self.parent.as_ref().and_then(|p| p.lookup(name))
    }

    pub fn contains_local(&self, name: &str) -> bool {
        self.bindings.borrow().contains_key(name)
    }

    pub fn free(&self) {
        self.bindings.borrow_mut().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn define_and_lookup_variable() {
        let env: Rc<Environment<i64, ()>> = Environment::new();
        env.insert_variable("x", Type::Int, 42);
        match env.lookup("x") {
            Some(EnvEntry::Variable(v)) => assert_eq!(v.storage, 42),
            _ => panic!("expected variable entry"),
        }
    }

    #[test]
    fn unbound_symbol_is_none() {
        let env: Rc<Environment<i64, ()>> = Environment::new();
        assert!(env.lookup("nope").is_none());
    }

    #[test]
    fn child_shadows_parent() {
        let parent: Rc<Environment<i64, ()>> = Environment::new();
        parent.insert_variable("x", Type::Int, 1);
        let child = Environment::with_parent(parent);
        child.insert_variable("x", Type::Int, 2);
        match child.lookup("x") {
            Some(EnvEntry::Variable(v)) => assert_eq!(v.storage, 2),
            _ => panic!("expected variable entry"),
        }
    }

    #[test]
    fn child_sees_parent_bindings() {
        let parent: Rc<Environment<i64, ()>> = Environment::new();
        parent.insert_variable("x", Type::Int, 7);
        let child = Environment::with_parent(parent);
        match child.lookup("x") {
            Some(EnvEntry::Variable(v)) => assert_eq!(v.storage, 7),
            _ => panic!("expected variable entry"),
        }
    }

    #[test]
    fn defining_in_child_does_not_alter_parent() {
        let parent: Rc<Environment<i64, ()>> = Environment::new();
        parent.insert_variable("x", Type::Int, 1);
        let child = Environment::with_parent(Rc::clone(&parent));
        child.insert_variable("x", Type::Int, 2);
        match parent.lookup("x") {
            Some(EnvEntry::Variable(v)) => assert_eq!(v.storage, 1),
            _ => panic!("expected variable entry"),
        }
    }

    #[test]
    fn function_entry_reports_exact_arity() {
        let env: Rc<Environment<i64, &'static str>> = Environment::new();
        env.insert_function(
            "add",
            vec![ParamType::required("a", Type::Int), ParamType::required("b", Type::Int)],
            Type::Int,
            "add_handle",
            None,
        );
        let entry = env.lookup("add").unwrap();
        assert_eq!(entry.arity(), (2, 2));
    }

    #[test]
    fn builtin_arity_may_be_unbounded() {
        let env: Rc<Environment<i64, ()>> = Environment::new();
        env.insert_builtin("+", 0, UNBOUNDED, Some("sum its arguments".to_string()));
        let entry = env.lookup("+").unwrap();
        assert_eq!(entry.arity(), (0, UNBOUNDED));
        assert_eq!(entry.docstring(), Some("sum its arguments"));
    }

    #[test]
    fn insert_replaces_existing_entry_in_place() {
        let env: Rc<Environment<i64, ()>> = Environment::new();
        env.insert_variable("x", Type::Int, 1);
        env.insert_variable("x", Type::Float, 2);
        match env.lookup("x") {
            Some(EnvEntry::Variable(v)) => {
                assert_eq!(v.ty, Type::Float);
                assert_eq!(v.storage, 2);
            }
            _ => panic!("expected variable entry"),
        }
    }
}
