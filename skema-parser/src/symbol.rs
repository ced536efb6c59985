// skema-parser - Symbol type with interning
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Scheme identifiers.
//!
//! # Interning
//!
//! Symbols are interned using a global string interner, meaning that two
//! symbols spelled the same way share the same underlying storage. This
//! provides several benefits:
//!
//! - **O(1) equality**: Comparing symbols is a pointer comparison, not string comparison
//! - **O(1) hashing**: Hash is computed from the pointer address
//! - **Memory efficiency**: Identical symbols share storage
//!
//! The contract is string equality: two symbols are equal exactly when their
//! names are equal. The pointer comparisons are an artifact of interning, not
//! part of the interface.
//!
//! # Memory Behaviour
//!
//! **Important**: Interned symbols are never deallocated. The global interner
//! maintains strong references (`Arc`) to every name created during the
//! program's lifetime, so memory usage grows monotonically with unique
//! symbols. This is intentional: symbols are reused heavily and the overhead
//! is modest for typical programs.
//!
//! # Thread Safety
//!
//! The interner is protected by a `Mutex`, making symbol creation
//! thread-safe. Symbol comparison and hashing are lock-free after creation.

use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Mutex, OnceLock};

/// An interned Scheme identifier.
#[derive(Clone)]
pub struct Symbol {
    inner: Arc<str>,
}

/// Global symbol interner
static SYMBOL_INTERNER: OnceLock<Mutex<HashMap<String, Arc<str>>>> = OnceLock::new();

fn get_interner() -> &'static Mutex<HashMap<String, Arc<str>>> {
    SYMBOL_INTERNER.get_or_init(|| Mutex::new(HashMap::new()))
}

impl Symbol {
    /// Create a symbol, interning its name.
    pub fn new(name: &str) -> Self {
        let mut interner = get_interner().lock().expect(
            "Symbol interner mutex poisoned: another thread panicked while holding the lock",
        );
        if let Some(existing) = interner.get(name) {
            Symbol {
                inner: Arc::clone(existing),
            }
        } else {
            let interned: Arc<str> = Arc::from(name);
            interner.insert(name.to_string(), Arc::clone(&interned));
            Symbol { inner: interned }
        }
    }

    /// Get the name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.inner
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.inner)
    }
}

impl fmt::Debug for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Symbol({})", self)
    }
}

impl PartialEq for Symbol {
    fn eq(&self, other: &Self) -> bool {
        // Due to interning, pointer comparison is sufficient
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for Symbol {}

impl Hash for Symbol {
    fn hash<H: Hasher>(&self, state: &mut H) {
        // Use pointer hash for interned symbols
        Arc::as_ptr(&self.inner).hash(state);
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_symbol() {
        let sym = Symbol::new("lambda");
        assert_eq!(sym.name(), "lambda");
        assert_eq!(format!("{}", sym), "lambda");
    }

    #[test]
    fn test_interning() {
        let sym1 = Symbol::new("cons");
        let sym2 = Symbol::new("cons");
        assert_eq!(sym1, sym2);
        // Interned symbols share the same Arc
        assert!(Arc::ptr_eq(&sym1.inner, &sym2.inner));
    }

    #[test]
    fn test_equality() {
        let sym1 = Symbol::new("car");
        let sym2 = Symbol::new("car");
        let sym3 = Symbol::new("cdr");

        assert_eq!(sym1, sym2);
        assert_ne!(sym1, sym3);
    }

    #[test]
    fn test_unusual_names() {
        // Vertical-bar identifiers can hold any characters
        let sym = Symbol::new("two words");
        assert_eq!(sym.name(), "two words");

        let empty = Symbol::new("");
        assert_eq!(empty.name(), "");
    }

    #[test]
    fn test_hash_consistency() {
        use std::collections::HashMap;

        let mut map = HashMap::new();
        map.insert(Symbol::new("x"), 1);
        map.insert(Symbol::new("y"), 2);

        assert_eq!(map.get(&Symbol::new("x")), Some(&1));
        assert_eq!(map.get(&Symbol::new("y")), Some(&2));
        assert_eq!(map.get(&Symbol::new("z")), None);
    }
}
