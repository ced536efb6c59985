// skema-vm - Heap-based virtual machine for the Skema Scheme system
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! # skema-vm
//!
//! The heap-based register machine that executes compiled instruction datums,
//! in the style of Dybvig's dissertation. Call frames live on the heap so
//! `conti`/`nuate` can capture and re-enter the control stack first-class.

pub mod frame;
pub mod machine;

pub use frame::{CallFrame, FrameHandle};
pub use machine::{Result, RuntimeError, Step, Vm, release_continuation};
