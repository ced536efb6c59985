// skema-core - Property-based tests for list operations
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Property-based tests for the `append` laws:
//! - `append(null, x)` is `x` itself
//! - `append(x, null)` equals `x` structurally without sharing its cells
//! - `append` preserves total length

use proptest::prelude::*;

use skema_core::lists::{append, car, length, set_car, to_vec};
use skema_parser::Datum;

fn arb_items() -> impl Strategy<Value = Vec<Datum>> {
    prop::collection::vec(
        prop_oneof![
            any::<i64>().prop_map(Datum::integer),
            any::<bool>().prop_map(Datum::boolean),
            "[a-z]{1,5}".prop_map(|s| Datum::symbol(&s)),
        ],
        0..8,
    )
}

proptest! {
    #[test]
    fn append_null_left_is_identity(items in arb_items()) {
        let x = Datum::list(items);
        let joined = append(&Datum::Null, &x).unwrap();
        prop_assert_eq!(&joined, &x);
        // The second list is returned unchanged, sharing its cells
        if let (Datum::Pair(a), Datum::Pair(b)) = (&joined, &x) {
            prop_assert!(a.ptr_eq(b));
        }
    }

    #[test]
    fn append_null_right_copies_without_sharing(items in arb_items()) {
        let x = Datum::list(items.clone());
        let joined = append(&x, &Datum::Null).unwrap();
        prop_assert_eq!(&joined, &x);
        if !items.is_empty() {
            // Mutating the copy leaves the original alone
            set_car(&joined, Datum::symbol("clobbered")).unwrap();
            prop_assert_eq!(car(&x).unwrap(), items[0].clone());
        }
    }

    #[test]
    fn append_preserves_total_length(a in arb_items(), b in arb_items()) {
        let total = a.len() + b.len();
        let joined = append(&Datum::list(a), &Datum::list(b)).unwrap();
        prop_assert_eq!(length(&joined).unwrap(), total);
    }

    #[test]
    fn append_concatenates_elements(a in arb_items(), b in arb_items()) {
        let joined = append(&Datum::list(a.clone()), &Datum::list(b.clone())).unwrap();
        let mut expected = a;
        expected.extend(b);
        prop_assert_eq!(to_vec(&joined).unwrap(), expected);
    }
}
