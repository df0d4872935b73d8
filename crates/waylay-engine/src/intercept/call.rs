//! Per-invocation orchestration
//!
//! An [`InterceptedCall`] is built by the installed wrapper every time the
//! wrapped method is dispatched. It owns a fresh handler and drives it:
//!
//! ```text
//! invoke
//! ├─ around ─────────────────────────────┐
//! │    run                               │  Err ─► on_exception
//! │    ├─ before                         │
//! │    ├─ original method  (finished)    │
//! │    └─ after        (only on Ok)      │
//! ├─ run never called ─► RunNotCalled ───┘
//! └─ ensure (always, last)
//! ```

use std::cell::{Cell, RefCell};
use std::fmt;

use super::callbacks::{Callbacks, Stage};
use super::options::Options;
use crate::dispatch::{Block, Frame, Method};
use crate::error::{CallError, CallResult, HookResult};
use crate::runtime::Runtime;
use crate::value::Value;

/// Progress of an intercepted call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallState {
    /// Built, `invoke` not yet entered
    Created,
    /// Inside `around`, wrapped method not yet started
    AroundRunning,
    /// Wrapped method executing
    OriginalRunning,
    /// Wrapped method returned or raised; `after` and the rest of `around`
    /// may still be running
    Finished,
    /// `ensure` has run
    CallbacksComplete,
}

/// Sets the finished flag when the wrapped method exits, on every path
struct FinishGuard<'c> {
    finished: &'c Cell<bool>,
    state: &'c Cell<CallState>,
}

impl Drop for FinishGuard<'_> {
    fn drop(&mut self) {
        self.finished.set(true);
        self.state.set(CallState::Finished);
    }
}

/// State and driver for one intercepted invocation
pub struct InterceptedCall<'a> {
    runtime: &'a Runtime,
    frame: &'a Frame,
    original: &'a Method,
    options: &'a Options,
    handler: Box<dyn Callbacks>,
    returned: RefCell<Option<Value>>,
    raised: RefCell<Option<CallError>>,
    run_outcome: RefCell<Option<CallResult>>,
    run_called: Cell<bool>,
    finished: Cell<bool>,
    stage: Cell<Option<Stage>>,
    state: Cell<CallState>,
}

impl<'a> InterceptedCall<'a> {
    /// Prepare a call of `original` with the given frame and handler
    pub fn new(
        runtime: &'a Runtime,
        frame: &'a Frame,
        original: &'a Method,
        handler: Box<dyn Callbacks>,
        options: &'a Options,
    ) -> Self {
        Self {
            runtime,
            frame,
            original,
            options,
            handler,
            returned: RefCell::new(None),
            raised: RefCell::new(None),
            run_outcome: RefCell::new(None),
            run_called: Cell::new(false),
            finished: Cell::new(false),
            stage: Cell::new(None),
            state: Cell::new(CallState::Created),
        }
    }

    // ========================================================================
    // Orchestration
    // ========================================================================

    /// Drive the handler through the full lifecycle.
    ///
    /// Returns the wrapped method's return value, or the first error raised
    /// inside `around`, unchanged. An error raised by `on_exception` or
    /// `ensure` replaces the in-flight outcome.
    pub fn invoke(self) -> CallResult {
        self.state.set(CallState::AroundRunning);

        let outcome = self.hook(Stage::Around).and_then(|()| {
            if self.run_called.get() {
                Ok(self.returned.borrow().clone().unwrap_or_default())
            } else {
                Err(CallError::RunNotCalled {
                    method: self.frame.method_name().to_string(),
                })
            }
        });

        let outcome = match outcome {
            Ok(value) => Ok(value),
            Err(err) => {
                log::trace!(target: "waylay::call", "`{}` raised: {}", self.method_name(), err);
                *self.raised.borrow_mut() = Some(err.clone());
                self.hook(Stage::OnException).and(Err(err))
            }
        };

        let ensured = self.hook(Stage::Ensure);
        self.state.set(CallState::CallbacksComplete);
        ensured.and(outcome)
    }

    /// Run `before`, the wrapped method, and (if it returned) `after`.
    ///
    /// Meant to be called exactly once from `around`. A second call does not
    /// invoke the wrapped method again; it warns and returns the first outcome.
    pub fn run(&self) -> CallResult {
        if self.run_called.replace(true) {
            self.runtime.warn(&format!(
                "`run` called more than once for `{}`; the wrapped method runs only once",
                self.method_name()
            ));
            return match &*self.run_outcome.borrow() {
                Some(outcome) => outcome.clone(),
                None => Err(CallError::runtime(format!(
                    "`run` re-entered while `{}` was still running",
                    self.method_name()
                ))),
            };
        }

        let outcome = self.run_once();
        *self.run_outcome.borrow_mut() = Some(outcome.clone());
        outcome
    }

    fn run_once(&self) -> CallResult {
        self.hook(Stage::Before)?;

        self.state.set(CallState::OriginalRunning);
        let result = {
            let _finish = FinishGuard {
                finished: &self.finished,
                state: &self.state,
            };
            (self.original)(self.runtime, self.frame)
        };
        let value = result?;
        *self.returned.borrow_mut() = Some(value.clone());

        self.hook(Stage::After)?;
        Ok(value)
    }

    fn hook(&self, stage: Stage) -> HookResult {
        let previous = self.stage.replace(Some(stage));
        log::trace!(target: "waylay::call", "{} `{}`", stage, self.method_name());
        let result = match stage {
            Stage::Before => self.handler.before(self),
            Stage::After => self.handler.after(self),
            Stage::Around => self.handler.around(self),
            Stage::OnException => self.handler.on_exception(self),
            Stage::Ensure => self.handler.ensure(self),
        };
        self.stage.set(previous);
        result
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    /// Runtime the call was dispatched on
    pub fn runtime(&self) -> &Runtime {
        self.runtime
    }

    /// Object (or class, for static calls) the method was called on
    pub fn receiver(&self) -> &Value {
        self.frame.receiver()
    }

    /// Name the method was called by
    pub fn method_name(&self) -> &str {
        self.frame.method_name()
    }

    /// Positional arguments, as passed by the caller
    pub fn arguments(&self) -> &[Value] {
        self.frame.args()
    }

    /// The caller's block, if any
    pub fn block(&self) -> Option<&Block> {
        self.frame.block()
    }

    /// Options given when the interceptor was installed
    pub fn options(&self) -> &Options {
        self.options
    }

    /// Value returned by the wrapped method.
    ///
    /// Before the wrapped method has finished this warns and returns `None`.
    pub fn return_value(&self) -> Option<Value> {
        self.warn_if_unfinished("return_value");
        self.returned.borrow().clone()
    }

    /// Error raised inside `around`.
    ///
    /// Before the wrapped method has finished this warns; the value is `None`
    /// until the error has been caught by the orchestrator.
    pub fn raised_error(&self) -> Option<CallError> {
        self.warn_if_unfinished("raised_error");
        self.raised.borrow().clone()
    }

    /// Whether `run` has been called
    pub fn was_run(&self) -> bool {
        self.run_called.get()
    }

    /// Whether the wrapped method has returned or raised
    pub fn is_finished(&self) -> bool {
        self.finished.get()
    }

    /// Hook currently executing, if any
    pub fn current_stage(&self) -> Option<Stage> {
        self.stage.get()
    }

    /// Lifecycle position
    pub fn state(&self) -> CallState {
        self.state.get()
    }

    fn warn_if_unfinished(&self, accessor: &str) {
        if self.finished.get() || !self.runtime.config().warn_on_early_access {
            return;
        }
        let location = match self.stage.get() {
            Some(stage) => format!("`{}`", stage),
            None => "outside any callback".to_string(),
        };
        self.runtime.warn(&format!(
            "accessing `{}` of `{}` from {}, where it is not yet set",
            accessor,
            self.method_name(),
            location
        ));
    }
}

impl fmt::Debug for InterceptedCall<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InterceptedCall")
            .field("method_name", &self.method_name())
            .field("state", &self.state.get())
            .field("stage", &self.stage.get())
            .field("run_called", &self.run_called.get())
            .field("finished", &self.finished.get())
            .finish()
    }
}
