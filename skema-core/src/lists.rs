// skema-core - Pair and list operations
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Fallible pair and list operations shared by the parser pipeline and the
//! virtual machine. Construction helpers live on [`Datum`]; everything here
//! that touches an existing pair reports a `TypeError` when handed the wrong
//! shape.

use skema_parser::Datum;

use crate::error::{Error, Result};

/// Allocate a fresh pair.
pub fn cons(car: Datum, cdr: Datum) -> Datum {
    Datum::cons(car, cdr)
}

/// Build a proper list.
pub fn list(items: Vec<Datum>) -> Datum {
    Datum::list(items)
}

/// The car of a pair.
pub fn car(datum: &Datum) -> Result<Datum> {
    match datum {
        Datum::Pair(pair) => Ok(pair.car()),
        other => Err(Error::type_error_in("car", "pair", other.type_name())),
    }
}

/// The cdr of a pair.
pub fn cdr(datum: &Datum) -> Result<Datum> {
    match datum {
        Datum::Pair(pair) => Ok(pair.cdr()),
        other => Err(Error::type_error_in("cdr", "pair", other.type_name())),
    }
}

/// Replace the car of a pair in place.
pub fn set_car(datum: &Datum, car: Datum) -> Result<()> {
    match datum {
        Datum::Pair(pair) => {
            pair.set_car(car);
            Ok(())
        }
        other => Err(Error::type_error_in("set-car!", "pair", other.type_name())),
    }
}

/// Replace the cdr of a pair in place.
pub fn set_cdr(datum: &Datum, cdr: Datum) -> Result<()> {
    match datum {
        Datum::Pair(pair) => {
            pair.set_cdr(cdr);
            Ok(())
        }
        other => Err(Error::type_error_in("set-cdr!", "pair", other.type_name())),
    }
}

/// Whether the datum is the empty list.
pub fn is_null(datum: &Datum) -> bool {
    datum.is_null()
}

/// Append two lists. The first must be proper; its spine is copied into
/// fresh pairs, so the result shares no cells with it. The second becomes
/// the tail unchanged — appending onto the empty list returns it as-is.
pub fn append(a: &Datum, b: &Datum) -> Result<Datum> {
    let items = to_vec(a)?;
    Ok(Datum::improper_list(items, b.clone()))
}

/// Collect a proper list into a vector of its elements.
pub fn to_vec(datum: &Datum) -> Result<Vec<Datum>> {
    let mut items = Vec::new();
    let mut rest = datum.clone();
    loop {
        match rest {
            Datum::Null => return Ok(items),
            Datum::Pair(pair) => {
                items.push(pair.car());
                rest = pair.cdr();
            }
            other => {
                return Err(Error::type_error_in(
                    "list traversal",
                    "proper list",
                    other.type_name(),
                ));
            }
        }
    }
}

/// Length of a proper list.
pub fn length(datum: &Datum) -> Result<usize> {
    let mut count = 0;
    let mut rest = datum.clone();
    loop {
        match rest {
            Datum::Null => return Ok(count),
            Datum::Pair(pair) => {
                count += 1;
                rest = pair.cdr();
            }
            other => {
                return Err(Error::type_error_in(
                    "length",
                    "proper list",
                    other.type_name(),
                ));
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
