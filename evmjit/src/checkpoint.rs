//! Abort checkpoints.
//!
//! Every call into generated code runs inside [`capture`], which records a
//! checkpoint on a per-thread LIFO stack. Generated code aborts by calling
//! [`jit_abort`] with the handle stored in its runtime block; control comes
//! back out of the matching `capture` without any status being threaded
//! through the frames in between. Nothing between the checkpoint and the
//! abort gets a chance to clean up, so generated code must not own
//! resources other than memory held by the engine.

use std::any::Any;
use std::cell::RefCell;
use std::ffi::c_void;
use std::marker::PhantomData;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::trace;

use crate::error::{JitError, JitResult};

thread_local! {
    static ACTIVE_CHECKPOINTS: RefCell<Vec<usize>> = const { RefCell::new(Vec::new()) };
}

static NEXT_CHECKPOINT_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug)]
pub struct Checkpoint {
    id: u64,
    depth: usize,
    _not_send: PhantomData<*const ()>,
}

impl Checkpoint {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn handle(&self) -> *const c_void {
        (self as *const Self).cast()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Completion<T> {
    Returned(T),
    Aborted(i32),
}

struct AbortSignal {
    checkpoint: usize,
    code: i32,
}

struct ActiveFrame {
    handle: usize,
}

impl Drop for ActiveFrame {
    fn drop(&mut self) {
        ACTIVE_CHECKPOINTS.with(|stack| {
            let popped = stack.borrow_mut().pop();
            debug_assert_eq!(popped, Some(self.handle), "checkpoint stack lost LIFO order");
        });
    }
}

pub fn depth() -> usize {
    ACTIVE_CHECKPOINTS.with(|stack| stack.borrow().len())
}

/// Runs `f` under a fresh checkpoint.
///
/// Returns `Aborted(code)` when `f` (or anything it calls) aborts to this
/// checkpoint. Panics that are not aborts pass through unchanged. The
/// checkpoint is popped on every path before this returns.
pub fn capture<T, F>(max_depth: usize, f: F) -> JitResult<Completion<T>>
where
    F: FnOnce(&Checkpoint) -> T,
{
    let depth = depth();
    if depth >= max_depth {
        return Err(JitError::CallDepthExceeded { limit: max_depth });
    }

    let checkpoint = Box::new(Checkpoint {
        id: NEXT_CHECKPOINT_ID.fetch_add(1, Ordering::Relaxed),
        depth,
        _not_send: PhantomData,
    });
    let handle = checkpoint.handle() as usize;
    ACTIVE_CHECKPOINTS.with(|stack| stack.borrow_mut().push(handle));
    let frame = ActiveFrame { handle };
    trace!(id = checkpoint.id, depth, "checkpoint captured");

    let result = panic::catch_unwind(AssertUnwindSafe(|| f(&checkpoint)));
    drop(frame);

    match result {
        Ok(value) => Ok(Completion::Returned(value)),
        Err(payload) => match payload.downcast::<AbortSignal>() {
            Ok(signal) if signal.checkpoint == handle => {
                trace!(id = checkpoint.id, code = signal.code, "resumed at checkpoint");
                Ok(Completion::Aborted(signal.code))
            }
            Ok(signal) => panic::resume_unwind(signal),
            Err(payload) => panic::resume_unwind(payload),
        },
    }
}

/// Unwinds to the checkpoint identified by `handle`.
///
/// # Panics
///
/// If `handle` is not the innermost live checkpoint of this thread. Generated
/// code only ever reads the handle out of its own runtime block, so anything
/// else is a code generation bug.
pub fn abort_to(handle: usize, code: i32) -> ! {
    let innermost = ACTIVE_CHECKPOINTS.with(|stack| stack.borrow().last().copied());
    assert!(
        innermost == Some(handle),
        "abort with status {code} raised against checkpoint {handle:#x}, which is not the innermost live checkpoint"
    );
    trace!(code, "aborting to checkpoint");
    let signal: Box<dyn Any + Send> = Box::new(AbortSignal {
        checkpoint: handle,
        code,
    });
    panic::resume_unwind(signal)
}

pub extern "C-unwind" fn jit_abort(checkpoint: *const c_void, code: i32) -> ! {
    abort_to(checkpoint as usize, code)
}
