// skema-core - Environments and list operations for the Skema Scheme system
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! # skema-core
//!
//! The pieces the parser pipeline and the virtual machine share: lexical
//! environments, pair/list operations, and their error type.

pub mod env;
pub mod error;
pub mod lists;

pub use env::Env;
pub use error::{Error, Result};
