// skema-core - Environment for lexical scoping
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Environment for variable bindings with lexical scoping.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use skema_parser::{Datum, Symbol};

use crate::error::{Error, Result};

/// A lexical environment for variable bindings.
///
/// Environments form a chain through parent references, enabling lexical
/// scoping. Each environment has its own bindings map and optionally a parent
/// environment for outer scope lookup. `Env` is a cheap handle: clones share
/// one frame, so a closure and the machine can both hold (and mutate) the
/// same scope.
///
/// # Examples
///
/// ```
/// use skema_core::Env;
/// use skema_parser::{Datum, Symbol};
///
/// // Create a global environment
/// let env = Env::new();
///
/// // Define a binding
/// env.define(Symbol::new("x"), Datum::integer(42));
///
/// // Look up the binding
/// assert_eq!(env.get(&Symbol::new("x")).unwrap(), Datum::integer(42));
///
/// // Create a child environment that inherits parent bindings
/// let child = env.child();
/// assert_eq!(child.get(&Symbol::new("x")).unwrap(), Datum::integer(42));
///
/// // Child can shadow parent bindings
/// child.define(Symbol::new("x"), Datum::integer(100));
/// assert_eq!(child.get(&Symbol::new("x")).unwrap(), Datum::integer(100));
/// assert_eq!(env.get(&Symbol::new("x")).unwrap(), Datum::integer(42));
/// ```
#[derive(Debug, Clone)]
pub struct Env {
    inner: Rc<RefCell<EnvInner>>,
}

#[derive(Debug)]
struct EnvInner {
    bindings: HashMap<Symbol, Datum>,
    parent: Option<Env>,
}

impl Env {
    /// Create a new global environment with no parent.
    pub fn new() -> Self {
        Env {
            inner: Rc::new(RefCell::new(EnvInner {
                bindings: HashMap::new(),
                parent: None,
            })),
        }
    }

    /// Create a child environment with this environment as parent.
    #[must_use]
    pub fn child(&self) -> Self {
        Env {
            inner: Rc::new(RefCell::new(EnvInner {
                bindings: HashMap::new(),
                parent: Some(self.clone()),
            })),
        }
    }

    /// Define a binding in this environment (not parent).
    pub fn define(&self, sym: Symbol, val: Datum) {
        self.inner.borrow_mut().bindings.insert(sym, val);
    }

    /// Look up a symbol in this environment or parent chain.
    /// Uses iterative traversal to avoid stack overflow on deep environments.
    pub fn get(&self, sym: &Symbol) -> Result<Datum> {
        let mut current = self.clone();
        loop {
            let inner = current.inner.borrow();
            if let Some(val) = inner.bindings.get(sym) {
                return Ok(val.clone());
            }
            let parent = inner.parent.clone();
            drop(inner);
            match parent {
                Some(p) => current = p,
                None => return Err(Error::UnboundVariable(sym.clone())),
            }
        }
    }

    /// Set a binding, looking up the chain to find where it's defined.
    /// Returns an error if the symbol is not defined anywhere; assignment
    /// never creates a binding.
    pub fn set(&self, sym: &Symbol, val: Datum) -> Result<()> {
        let mut current = self.clone();
        loop {
            {
                let inner = current.inner.borrow();
                if inner.bindings.contains_key(sym) {
                    drop(inner);
                    current.inner.borrow_mut().bindings.insert(sym.clone(), val);
                    return Ok(());
                }
            }
            let parent = current.inner.borrow().parent.clone();
            match parent {
                Some(p) => current = p,
                None => return Err(Error::UnboundVariable(sym.clone())),
            }
        }
    }

    /// Check if a symbol is defined in this environment or parent chain.
    #[must_use]
    pub fn is_defined(&self, sym: &Symbol) -> bool {
        let mut current = self.clone();
        loop {
            let inner = current.inner.borrow();
            if inner.bindings.contains_key(sym) {
                return true;
            }
            let parent = inner.parent.clone();
            drop(inner);
            match parent {
                Some(p) => current = p,
                None => return false,
            }
        }
    }

    /// Allocate a child frame binding each parameter to its argument. A
    /// variadic tail parameter receives the remaining arguments as a proper
    /// list. Arity agreement is the caller's contract; extra arguments
    /// without a variadic tail are ignored here.
    #[must_use]
    pub fn extend(&self, params: &[Symbol], variadic: Option<&Symbol>, args: &[Datum]) -> Env {
        let child = self.child();
        for (param, arg) in params.iter().zip(args) {
            child.define(param.clone(), arg.clone());
        }
        if let Some(tail) = variadic {
            let rest = args.get(params.len()..).unwrap_or_default();
            child.define(tail.clone(), Datum::list(rest.to_vec()));
        }
        child
    }

    /// Whether two handles name the same environment frame.
    #[must_use]
    pub fn ptr_eq(&self, other: &Env) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Default for Env {
    fn default() -> Self {
        Self::new()
    }
}
