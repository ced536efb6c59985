// skema-parser - Datum types for Skema
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Core value type for Skema.
//!
//! `Datum` is the central enum representing all Scheme values: the universal
//! currency between the parser, the compiler, and the virtual machine. Datums
//! are reference counted; pair cells are mutable through interior mutability
//! so that `set-car!`/`set-cdr!` semantics and the circular structures
//! first-class continuations build are expressible.

use std::any::Any;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use im::Vector;

use crate::lexer::{is_dot_subsequent, is_initial, is_sign_subsequent, is_subsequent};
use crate::symbol::Symbol;

// ============================================================================
// CustomType - for Embedding Arbitrary Rust Types
// ============================================================================

/// Trait for embedding opaque Rust objects as datums.
///
/// The virtual machine uses this to place a captured call frame inside a
/// `nuate` instruction datum; hosts may use it to thread their own objects
/// through Scheme data. Custom datums are opaque to Scheme code.
pub trait CustomType: fmt::Debug {
    /// Returns the type name for display and error messages.
    fn type_name(&self) -> &'static str;

    /// Returns a reference to the underlying value as `Any` for downcasting.
    fn as_any(&self) -> &dyn Any;

    /// Display the custom value.
    /// Default implementation shows `#<type-name>`.
    fn display(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#<{}>", self.type_name())
    }
}

/// Wrapper for custom objects that implements the necessary traits.
#[derive(Clone)]
pub struct DatumCustom {
    inner: Rc<dyn CustomType>,
}

impl DatumCustom {
    /// Create a new custom value wrapper.
    pub fn new<T: CustomType + 'static>(value: T) -> Self {
        DatumCustom {
            inner: Rc::new(value),
        }
    }

    /// Get the type name of the wrapped value.
    #[inline]
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        self.inner.type_name()
    }

    /// Attempt to downcast to a specific type.
    #[inline]
    #[must_use]
    pub fn downcast_ref<T: 'static>(&self) -> Option<&T> {
        self.inner.as_any().downcast_ref::<T>()
    }
}

impl fmt::Debug for DatumCustom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DatumCustom({:?})", &*self.inner)
    }
}

impl fmt::Display for DatumCustom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.inner.display(f)
    }
}

impl PartialEq for DatumCustom {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for DatumCustom {}

// ============================================================================
// Numbers
// ============================================================================

/// A Scheme number: an exact integer, an exact rational, or an inexact real.
///
/// Rationals are kept in lowest terms with a positive denominator; a reduced
/// denominator of 1 collapses to `Integer`. There is no numeric tower beyond
/// this.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Number {
    Integer(i64),
    Rational(i64, i64),
    Real(f64),
}

fn gcd(mut a: u64, mut b: u64) -> u64 {
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a
}

impl Number {
    /// Create a rational, reducing to lowest terms.
    ///
    /// The denominator must be nonzero.
    pub fn rational(numerator: i64, denominator: i64) -> Number {
        debug_assert!(denominator != 0, "rational with zero denominator");
        let (mut n, mut d) = if denominator < 0 {
            (-numerator, -denominator)
        } else {
            (numerator, denominator)
        };
        let g = gcd(n.unsigned_abs(), d.unsigned_abs());
        if g > 1 {
            n /= g as i64;
            d /= g as i64;
        }
        if d == 1 {
            Number::Integer(n)
        } else {
            Number::Rational(n, d)
        }
    }

    /// Parse decimal numeric text: optional sign, digits, optional `.digits`,
    /// optional `/digits`. Returns `None` for a zero denominator, overflow,
    /// or text that matches no decimal number.
    pub fn parse(text: &str) -> Option<Number> {
        if let Some(slash) = text.find('/') {
            let n: i64 = text[..slash].parse().ok()?;
            let d: i64 = text[slash + 1..].parse().ok()?;
            if d == 0 {
                return None;
            }
            Some(Number::rational(n, d))
        } else if text.contains('.') {
            text.parse::<f64>().ok().map(Number::Real)
        } else {
            text.parse::<i64>().ok().map(Number::Integer)
        }
    }
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Number::Integer(n) => write!(f, "{}", n),
            Number::Rational(n, d) => write!(f, "{}/{}", n, d),
            Number::Real(r) => {
                if r.is_nan() {
                    write!(f, "+nan.0")
                } else if r.is_infinite() {
                    write!(f, "{}inf.0", if *r < 0.0 { "-" } else { "+" })
                } else {
                    let s = format!("{}", r);
                    // A real must re-read as a real, not an integer
                    if s.contains('.') || s.contains('e') || s.contains('E') {
                        write!(f, "{}", s)
                    } else {
                        write!(f, "{}.0", s)
                    }
                }
            }
        }
    }
}

// ============================================================================
// Pairs
// ============================================================================

/// A mutable cons cell, shared by reference.
///
/// Pairs form the spine of all lists. Both fields are mutable in place, which
/// is what lets `set-car!`/`set-cdr!` work and lets continuation capture
/// build circular structure.
#[derive(Clone)]
pub struct Pair {
    inner: Rc<RefCell<PairCell>>,
}

struct PairCell {
    car: Datum,
    cdr: Datum,
}

impl Pair {
    pub fn new(car: Datum, cdr: Datum) -> Self {
        Pair {
            inner: Rc::new(RefCell::new(PairCell { car, cdr })),
        }
    }

    #[must_use]
    pub fn car(&self) -> Datum {
        self.inner.borrow().car.clone()
    }

    #[must_use]
    pub fn cdr(&self) -> Datum {
        self.inner.borrow().cdr.clone()
    }

    pub fn set_car(&self, car: Datum) {
        self.inner.borrow_mut().car = car;
    }

    pub fn set_cdr(&self, cdr: Datum) {
        self.inner.borrow_mut().cdr = cdr;
    }

    /// Whether two handles name the same cell.
    #[must_use]
    pub fn ptr_eq(&self, other: &Pair) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl PartialEq for Pair {
    fn eq(&self, other: &Self) -> bool {
        // Identity first, then structure. Comparing cyclic structure recurses
        // forever; parsed datums are always acyclic.
        self.ptr_eq(other) || (self.car() == other.car() && self.cdr() == other.cdr())
    }
}

// ============================================================================
// Closures
// ============================================================================

/// A procedure: captured environment, body expression, and parameter list.
///
/// The environment is held through a type-erased `Rc<dyn Any>` so this crate
/// stays independent of the environment implementation; the VM downcasts it
/// on application. Continuations are closures whose `captured_frame` is set.
pub struct Closure {
    env: Rc<dyn Any>,
    body: Datum,
    params: Vec<Symbol>,
    variadic: Option<Symbol>,
    captured_frame: RefCell<Option<DatumCustom>>,
}

impl Closure {
    pub fn new(env: Rc<dyn Any>, body: Datum, params: Vec<Symbol>, variadic: Option<Symbol>) -> Self {
        Closure {
            env,
            body,
            params,
            variadic,
            captured_frame: RefCell::new(None),
        }
    }

    /// Create a continuation closure holding a captured call frame.
    pub fn with_frame(
        env: Rc<dyn Any>,
        body: Datum,
        params: Vec<Symbol>,
        variadic: Option<Symbol>,
        frame: DatumCustom,
    ) -> Self {
        Closure {
            env,
            body,
            params,
            variadic,
            captured_frame: RefCell::new(Some(frame)),
        }
    }

    #[must_use]
    pub fn env(&self) -> &Rc<dyn Any> {
        &self.env
    }

    #[must_use]
    pub fn body(&self) -> &Datum {
        &self.body
    }

    #[must_use]
    pub fn params(&self) -> &[Symbol] {
        &self.params
    }

    #[must_use]
    pub fn variadic(&self) -> Option<&Symbol> {
        self.variadic.as_ref()
    }

    /// The captured call frame, if this closure is a continuation.
    #[must_use]
    pub fn captured_frame(&self) -> Option<DatumCustom> {
        self.captured_frame.borrow().clone()
    }

    /// Drop the captured frame. Used by the explicit continuation-release
    /// cycle break; afterwards the closure no longer keeps the frame alive.
    pub fn clear_captured_frame(&self) {
        self.captured_frame.borrow_mut().take();
    }
}

impl fmt::Debug for Closure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#<procedure>")
    }
}

// ============================================================================
// Datum
// ============================================================================

/// The core value type for Skema.
///
/// All Scheme values are represented by this enum. Cloning a datum is cheap:
/// compound variants hold reference-counted handles, so clones share
/// structure. A proper list is a chain of pairs ending in `Null`; an improper
/// list ends in any other non-pair datum.
#[derive(Clone)]
pub enum Datum {
    /// The empty list
    Null,
    /// The unspecified value, produced by operations with no useful result
    Unspecified,
    /// Boolean true or false
    Boolean(bool),
    /// Exact integer, exact rational, or inexact real
    Number(Number),
    /// Unicode character
    Character(char),
    /// Immutable string
    String(Rc<str>),
    /// Interned identifier
    Symbol(Symbol),
    /// Mutable cons cell
    Pair(Pair),
    /// Fixed-length sequence of datums
    Vector(Vector<Datum>),
    /// Procedure (or continuation)
    Closure(Rc<Closure>),
    /// Opaque embedded Rust object
    Custom(DatumCustom),
}

impl Datum {
    pub fn symbol(name: &str) -> Datum {
        Datum::Symbol(Symbol::new(name))
    }

    pub fn string(s: impl Into<Rc<str>>) -> Datum {
        Datum::String(s.into())
    }

    pub fn boolean(b: bool) -> Datum {
        Datum::Boolean(b)
    }

    pub fn integer(n: i64) -> Datum {
        Datum::Number(Number::Integer(n))
    }

    pub fn rational(n: i64, d: i64) -> Datum {
        Datum::Number(Number::rational(n, d))
    }

    pub fn real(r: f64) -> Datum {
        Datum::Number(Number::Real(r))
    }

    pub fn character(c: char) -> Datum {
        Datum::Character(c)
    }

    /// Allocate a fresh pair.
    pub fn cons(car: Datum, cdr: Datum) -> Datum {
        Datum::Pair(Pair::new(car, cdr))
    }

    /// Build a proper list from the items.
    pub fn list(items: Vec<Datum>) -> Datum {
        Self::improper_list(items, Datum::Null)
    }

    /// Build a chain of fresh pairs over the items, ending in `tail`.
    /// With no items this is `tail` itself.
    pub fn improper_list(items: Vec<Datum>, tail: Datum) -> Datum {
        items
            .into_iter()
            .rev()
            .fold(tail, |rest, item| Datum::cons(item, rest))
    }

    pub fn vector(items: Vec<Datum>) -> Datum {
        Datum::Vector(items.into_iter().collect())
    }

    pub fn closure(closure: Closure) -> Datum {
        Datum::Closure(Rc::new(closure))
    }

    pub fn custom<T: CustomType + 'static>(value: T) -> Datum {
        Datum::Custom(DatumCustom::new(value))
    }

    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Datum::Null)
    }

    /// Scheme truthiness: only the boolean false is false.
    #[must_use]
    pub fn is_false(&self) -> bool {
        matches!(self, Datum::Boolean(false))
    }

    #[must_use]
    pub fn as_symbol(&self) -> Option<&Symbol> {
        match self {
            Datum::Symbol(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_pair(&self) -> Option<&Pair> {
        match self {
            Datum::Pair(p) => Some(p),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_closure(&self) -> Option<&Rc<Closure>> {
        match self {
            Datum::Closure(c) => Some(c),
            _ => None,
        }
    }

    /// Type name for error messages.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Datum::Null => "null",
            Datum::Unspecified => "unspecified",
            Datum::Boolean(_) => "boolean",
            Datum::Number(_) => "number",
            Datum::Character(_) => "character",
            Datum::String(_) => "string",
            Datum::Symbol(_) => "symbol",
            Datum::Pair(_) => "pair",
            Datum::Vector(_) => "vector",
            Datum::Closure(_) => "procedure",
            Datum::Custom(c) => c.type_name(),
        }
    }
}

impl PartialEq for Datum {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Datum::Null, Datum::Null) => true,
            (Datum::Unspecified, Datum::Unspecified) => true,
            (Datum::Boolean(a), Datum::Boolean(b)) => a == b,
            (Datum::Number(a), Datum::Number(b)) => a == b,
            (Datum::Character(a), Datum::Character(b)) => a == b,
            (Datum::String(a), Datum::String(b)) => a == b,
            (Datum::Symbol(a), Datum::Symbol(b)) => a == b,
            (Datum::Pair(a), Datum::Pair(b)) => a == b,
            (Datum::Vector(a), Datum::Vector(b)) => a == b,
            // Procedures and opaque objects compare by identity
            (Datum::Closure(a), Datum::Closure(b)) => Rc::ptr_eq(a, b),
            (Datum::Custom(a), Datum::Custom(b)) => a == b,
            _ => false,
        }
    }
}

// ============================================================================
// Printer
// ============================================================================

/// Write an identifier, falling back to `|…|` form when the name would not
/// re-lex as the same identifier.
pub(crate) fn write_identifier(f: &mut fmt::Formatter<'_>, name: &str) -> fmt::Result {
    if plain_identifier(name) {
        write!(f, "{}", name)
    } else {
        write!(f, "|")?;
        for c in name.chars() {
            match c {
                '|' => write!(f, "\\|")?,
                '\\' => write!(f, "\\x5c;")?,
                '\u{7}' => write!(f, "\\a")?,
                '\u{8}' => write!(f, "\\b")?,
                '\t' => write!(f, "\\t")?,
                '\n' => write!(f, "\\n")?,
                '\r' => write!(f, "\\r")?,
                c if c.is_control() => write!(f, "\\x{:x};", c as u32)?,
                c => write!(f, "{}", c)?,
            }
        }
        write!(f, "|")
    }
}

/// Whether the name re-lexes as a single bare identifier. Mirrors the lexer's
/// identifier rules exactly.
fn plain_identifier(name: &str) -> bool {
    let chars: Vec<char> = name.chars().collect();
    let Some(&first) = chars.first() else {
        return false;
    };
    if Number::parse(name).is_some() {
        return false;
    }
    match first {
        c if is_initial(c) => chars[1..].iter().all(|&c| is_subsequent(c)),
        '+' | '-' => match chars.get(1) {
            None => true,
            Some(&second) if is_sign_subsequent(second) => {
                chars[2..].iter().all(|&c| is_subsequent(c))
            }
            Some('.') => match chars.get(2) {
                Some(&third) if is_dot_subsequent(third) => {
                    chars[3..].iter().all(|&c| is_subsequent(c))
                }
                _ => false,
            },
            Some(_) => false,
        },
        '.' => match chars.get(1) {
            Some(&second) if is_dot_subsequent(second) => {
                chars[2..].iter().all(|&c| is_subsequent(c))
            }
            _ => false,
        },
        _ => false,
    }
}

/// Write a string literal with its delimiting quotes and escapes.
pub(crate) fn write_string_literal(f: &mut fmt::Formatter<'_>, s: &str) -> fmt::Result {
    write!(f, "\"")?;
    for c in s.chars() {
        match c {
            '"' => write!(f, "\\\"")?,
            '\\' => write!(f, "\\\\")?,
            '\u{7}' => write!(f, "\\a")?,
            '\u{8}' => write!(f, "\\b")?,
            '\t' => write!(f, "\\t")?,
            '\n' => write!(f, "\\n")?,
            '\r' => write!(f, "\\r")?,
            c if c.is_control() => write!(f, "\\x{:x};", c as u32)?,
            c => write!(f, "{}", c)?,
        }
    }
    write!(f, "\"")
}

/// Write a character in `#\…` external syntax.
pub(crate) fn write_character(f: &mut fmt::Formatter<'_>, c: char) -> fmt::Result {
    match c {
        '\u{7}' => write!(f, "#\\alarm"),
        '\u{8}' => write!(f, "#\\backspace"),
        '\u{7f}' => write!(f, "#\\delete"),
        '\u{1b}' => write!(f, "#\\escape"),
        '\n' => write!(f, "#\\newline"),
        '\0' => write!(f, "#\\null"),
        '\r' => write!(f, "#\\return"),
        ' ' => write!(f, "#\\space"),
        '\t' => write!(f, "#\\tab"),
        c if c.is_control() => write!(f, "#\\x{:x}", c as u32),
        c => write!(f, "#\\{}", c),
    }
}

impl fmt::Display for Datum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Datum::Null => write!(f, "()"),
            Datum::Unspecified => write!(f, "#<unspecified>"),
            Datum::Boolean(true) => write!(f, "#t"),
            Datum::Boolean(false) => write!(f, "#f"),
            Datum::Number(n) => write!(f, "{}", n),
            Datum::Character(c) => write_character(f, *c),
            Datum::String(s) => write_string_literal(f, s),
            Datum::Symbol(s) => write_identifier(f, s.name()),
            Datum::Pair(pair) => {
                write!(f, "({}", pair.car())?;
                let mut rest = pair.cdr();
                loop {
                    match rest {
                        Datum::Null => break,
                        Datum::Pair(p) => {
                            write!(f, " {}", p.car())?;
                            rest = p.cdr();
                        }
                        tail => {
                            write!(f, " . {}", tail)?;
                            break;
                        }
                    }
                }
                write!(f, ")")
            }
            Datum::Vector(items) => {
                write!(f, "#(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, ")")
            }
            Datum::Closure(_) => write!(f, "#<procedure>"),
            Datum::Custom(c) => write!(f, "{}", c),
        }
    }
}

impl fmt::Debug for Datum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self)
    }
}

// ============================================================================
// Tests
// ============================================================================
