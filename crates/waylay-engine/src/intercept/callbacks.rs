//! Lifecycle hooks
//!
//! A [`Callbacks`] implementation is constructed fresh for every intercepted
//! invocation. Each hook receives the [`InterceptedCall`] driving it, which
//! exposes the receiver, arguments, block, options and (once the wrapped
//! method has finished) its return value or raised error.

use std::fmt;
use std::sync::Arc;

use super::call::InterceptedCall;
use crate::error::HookResult;

/// The five lifecycle hooks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// Runs inside `run`, before the wrapped method
    Before,
    /// Runs inside `run`, after the wrapped method returned normally
    After,
    /// Surrounds `before`, the wrapped method and `after`
    Around,
    /// Runs once when anything inside `around` failed
    OnException,
    /// Runs last, on every path
    Ensure,
}

impl Stage {
    /// Hook name as written in handler code
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Before => "before",
            Stage::After => "after",
            Stage::Around => "around",
            Stage::OnException => "on_exception",
            Stage::Ensure => "ensure",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Handler for one intercepted invocation
///
/// Every hook defaults to doing nothing, except [`around`](Callbacks::around)
/// which calls [`InterceptedCall::run`]. An `around` override must call `run`
/// exactly once; returning without calling it fails the call with
/// [`CallError::RunNotCalled`](crate::CallError::RunNotCalled).
///
/// ```ignore
/// #[derive(Default)]
/// struct StageManager;
///
/// impl Callbacks for StageManager {
///     fn before(&self, call: &InterceptedCall<'_>) -> HookResult {
///         println!("ENTER {}", call.method_name());
///         Ok(())
///     }
/// }
/// ```
pub trait Callbacks {
    /// Runs before the wrapped method
    fn before(&self, _call: &InterceptedCall<'_>) -> HookResult {
        Ok(())
    }

    /// Runs after the wrapped method, only if it did not raise
    fn after(&self, _call: &InterceptedCall<'_>) -> HookResult {
        Ok(())
    }

    /// Surrounds the whole `before` / method / `after` sequence
    fn around(&self, call: &InterceptedCall<'_>) -> HookResult {
        call.run().map(drop)
    }

    /// Runs when the wrapped method or a hook raised
    fn on_exception(&self, _call: &InterceptedCall<'_>) -> HookResult {
        Ok(())
    }

    /// Runs last on every path
    fn ensure(&self, _call: &InterceptedCall<'_>) -> HookResult {
        Ok(())
    }
}

/// Handler that overrides nothing
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopCallbacks;

impl Callbacks for NoopCallbacks {}

type HookFn = Arc<dyn Fn(&InterceptedCall<'_>) -> HookResult + Send + Sync>;

/// Handler assembled from closures.
///
/// Hooks left unset behave like the [`Callbacks`] defaults.
///
/// ```ignore
/// let hooks = Hooks::new()
///     .before(|call| {
///         println!("ENTER {}", call.method_name());
///         Ok(())
///     })
///     .ensure(|_call| Ok(()));
/// ```
#[derive(Clone, Default)]
pub struct Hooks {
    before: Option<HookFn>,
    after: Option<HookFn>,
    around: Option<HookFn>,
    on_exception: Option<HookFn>,
    ensure: Option<HookFn>,
}

impl Hooks {
    /// No hooks set
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the `before` hook
    pub fn before<F>(mut self, f: F) -> Self
    where
        F: Fn(&InterceptedCall<'_>) -> HookResult + Send + Sync + 'static,
    {
        self.before = Some(Arc::new(f));
        self
    }

    /// Set the `after` hook
    pub fn after<F>(mut self, f: F) -> Self
    where
        F: Fn(&InterceptedCall<'_>) -> HookResult + Send + Sync + 'static,
    {
        self.after = Some(Arc::new(f));
        self
    }

    /// Set the `around` hook; it must call `run`
    pub fn around<F>(mut self, f: F) -> Self
    where
        F: Fn(&InterceptedCall<'_>) -> HookResult + Send + Sync + 'static,
    {
        self.around = Some(Arc::new(f));
        self
    }

    /// Set the `on_exception` hook
    pub fn on_exception<F>(mut self, f: F) -> Self
    where
        F: Fn(&InterceptedCall<'_>) -> HookResult + Send + Sync + 'static,
    {
        self.on_exception = Some(Arc::new(f));
        self
    }

    /// Set the `ensure` hook
    pub fn ensure<F>(mut self, f: F) -> Self
    where
        F: Fn(&InterceptedCall<'_>) -> HookResult + Send + Sync + 'static,
    {
        self.ensure = Some(Arc::new(f));
        self
    }

    /// Stages that have a closure set
    pub fn stages(&self) -> Vec<Stage> {
        [
            (Stage::Before, self.before.is_some()),
            (Stage::After, self.after.is_some()),
            (Stage::Around, self.around.is_some()),
            (Stage::OnException, self.on_exception.is_some()),
            (Stage::Ensure, self.ensure.is_some()),
        ]
        .into_iter()
        .filter_map(|(stage, set)| set.then_some(stage))
        .collect()
    }
}

impl Callbacks for Hooks {
    fn before(&self, call: &InterceptedCall<'_>) -> HookResult {
        match &self.before {
            Some(f) => f(call),
            None => Ok(()),
        }
    }

    fn after(&self, call: &InterceptedCall<'_>) -> HookResult {
        match &self.after {
            Some(f) => f(call),
            None => Ok(()),
        }
    }

    fn around(&self, call: &InterceptedCall<'_>) -> HookResult {
        match &self.around {
            Some(f) => f(call),
            None => call.run().map(drop),
        }
    }

    fn on_exception(&self, call: &InterceptedCall<'_>) -> HookResult {
        match &self.on_exception {
            Some(f) => f(call),
            None => Ok(()),
        }
    }

    fn ensure(&self, call: &InterceptedCall<'_>) -> HookResult {
        match &self.ensure {
            Some(f) => f(call),
            None => Ok(()),
        }
    }
}

impl fmt::Debug for Hooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hooks").field("stages", &self.stages()).finish()
    }
}
