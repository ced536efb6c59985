// skema-vm - Call frames for the heap-based machine
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Heap-allocated call frames.
//!
//! A frame is the saved context of a pending call: the expression to resume,
//! the environment and value rib to restore, and the next frame down. Frames
//! chain through `next` to form the control stack, and live on the heap
//! because `conti` takes them first-class: a captured frame must survive its
//! original owner returning past it.

use std::any::Any;
use std::fmt;
use std::rc::Rc;

use skema_core::Env;
use skema_parser::{CustomType, Datum, Vector};

/// A saved return context.
#[derive(Debug, Clone)]
pub struct CallFrame {
    ret: Datum,
    env: Env,
    rib: Vector<Datum>,
    next: Option<Rc<CallFrame>>,
}

impl CallFrame {
    pub fn new(ret: Datum, env: Env, rib: Vector<Datum>, next: Option<Rc<CallFrame>>) -> Self {
        CallFrame {
            ret,
            env,
            rib,
            next,
        }
    }

    /// The expression to resume after `return`.
    #[must_use]
    pub fn ret(&self) -> &Datum {
        &self.ret
    }

    /// The environment at the call site.
    #[must_use]
    pub fn env(&self) -> &Env {
        &self.env
    }

    /// The argument rib being built at the call site.
    #[must_use]
    pub fn rib(&self) -> &Vector<Datum> {
        &self.rib
    }

    /// The frame below this one, if any.
    #[must_use]
    pub fn next(&self) -> Option<&Rc<CallFrame>> {
        self.next.as_ref()
    }

    /// Number of frames in the chain from here down.
    #[must_use]
    pub fn depth(&self) -> usize {
        let mut count = 1;
        let mut current = self.next.clone();
        while let Some(frame) = current {
            count += 1;
            current = frame.next.clone();
        }
        count
    }
}

/// A call frame embedded in a datum, as the `s` operand of `nuate`.
///
/// The frame reference is strong on purpose: keeping the captured control
/// context alive is the continuation's whole job. `None` captures an empty
/// control stack.
pub struct FrameHandle {
    frame: Option<Rc<CallFrame>>,
}

impl FrameHandle {
    pub fn new(frame: Option<Rc<CallFrame>>) -> Self {
        FrameHandle { frame }
    }

    #[must_use]
    pub fn frame(&self) -> Option<&Rc<CallFrame>> {
        self.frame.as_ref()
    }
}

impl CustomType for FrameHandle {
    fn type_name(&self) -> &'static str {
        "call-frame"
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl fmt::Debug for FrameHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.frame {
            Some(frame) => write!(f, "FrameHandle(depth={})", frame.depth()),
            None => write!(f, "FrameHandle(empty)"),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
