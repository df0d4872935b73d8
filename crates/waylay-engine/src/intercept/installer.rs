//! Interceptor installation
//!
//! Installing wraps the method currently reachable from a [`Target`] in a new
//! method stored directly on the target's table. The wrapper keeps the
//! previous entry and hands it to a fresh [`InterceptedCall`] on every
//! dispatch, so installing twice stacks two layers, the newest outermost.

use std::fmt;
use std::sync::Arc;

use super::call::InterceptedCall;
use super::callbacks::{Callbacks, Hooks};
use super::options::Options;
use crate::dispatch::{Frame, Method};
use crate::error::InstallError;
use crate::object::{ClassId, Target};
use crate::runtime::Runtime;

/// Builds one handler per intercepted invocation
pub type HandlerFactory = Arc<dyn Fn() -> Box<dyn Callbacks> + Send + Sync>;

/// Factory for a `Default`-constructible handler type
pub fn handler<H>() -> HandlerFactory
where
    H: Callbacks + Default + 'static,
{
    Arc::new(|| Box::new(H::default()) as Box<dyn Callbacks>)
}

/// Factory from a constructor closure
pub fn factory<H, F>(make: F) -> HandlerFactory
where
    H: Callbacks + 'static,
    F: Fn() -> H + Send + Sync + 'static,
{
    Arc::new(move || Box::new(make()) as Box<dyn Callbacks>)
}

/// Factory that hands out a clone of the same closure set
pub fn hooks(hooks: Hooks) -> HandlerFactory {
    Arc::new(move || Box::new(hooks.clone()) as Box<dyn Callbacks>)
}

/// Record of one installed interceptor layer
#[derive(Clone)]
pub struct Registration {
    target: Target,
    method: String,
    options: Arc<Options>,
    sequence: u64,
    original: Method,
    original_owner: ClassId,
}

impl Registration {
    /// Table the wrapper was installed into
    pub fn target(&self) -> Target {
        self.target
    }

    /// Wrapped method name
    pub fn method(&self) -> &str {
        &self.method
    }

    /// Options every hook of this layer sees
    pub fn options(&self) -> &Options {
        &self.options
    }

    /// Installation order on the owning runtime, starting at 1
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// The dispatch entry this layer wraps
    pub fn original(&self) -> &Method {
        &self.original
    }

    /// Class whose table held the wrapped entry
    pub fn original_owner(&self) -> ClassId {
        self.original_owner
    }
}

impl fmt::Debug for Registration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration")
            .field("target", &self.target)
            .field("method", &self.method)
            .field("options", &self.options)
            .field("sequence", &self.sequence)
            .field("original_owner", &self.original_owner)
            .finish()
    }
}

/// Installs one handler type on methods of a runtime
///
/// ```ignore
/// let installer = Installer::new(&runtime, handler::<StageManager>());
/// installer.install(Target::instance_methods(romeo), &["speak"], Options::new())?;
/// ```
pub struct Installer<'rt> {
    runtime: &'rt Runtime,
    factory: HandlerFactory,
}

impl<'rt> Installer<'rt> {
    /// Installer for an arbitrary handler factory
    pub fn new(runtime: &'rt Runtime, factory: HandlerFactory) -> Self {
        Self { runtime, factory }
    }

    /// Installer for a `Default`-constructible handler type
    pub fn for_handler<H>(runtime: &'rt Runtime) -> Self
    where
        H: Callbacks + Default + 'static,
    {
        Self::new(runtime, handler::<H>())
    }

    /// Installer for a closure-configured handler
    pub fn for_hooks(runtime: &'rt Runtime, hooks_config: Hooks) -> Self {
        Self::new(runtime, hooks(hooks_config))
    }

    /// Wrap each named method of `target`.
    ///
    /// Every name is checked first; if any is missing nothing is installed.
    pub fn install(
        &self,
        target: Target,
        methods: &[&str],
        options: Options,
    ) -> Result<Vec<Registration>, InstallError> {
        let runtime = self.runtime;
        runtime.check_class(target.class)?;

        if let Some(missing) = methods
            .iter()
            .find(|name| runtime.resolve(target, name).is_none())
        {
            return Err(InstallError::MethodNotFound {
                target: runtime.describe_target(target),
                method: missing.to_string(),
            });
        }

        let options = Arc::new(options);
        let mut registrations = Vec::with_capacity(methods.len());
        for &name in methods {
            // Resolve again per name: a repeated name wraps the layer just installed.
            let (original_owner, original) =
                runtime
                    .resolve(target, name)
                    .ok_or_else(|| InstallError::MethodNotFound {
                        target: runtime.describe_target(target),
                        method: name.to_string(),
                    })?;

            let wrapper = wrap(
                original.clone(),
                original_owner,
                self.factory.clone(),
                options.clone(),
            );
            runtime.set_entry(target, name, wrapper)?;

            let registration = Registration {
                target,
                method: name.to_string(),
                options: options.clone(),
                sequence: runtime.next_sequence(),
                original,
                original_owner,
            };
            log::debug!(
                target: "waylay::install",
                "installed interceptor #{} on {}#{}",
                registration.sequence,
                runtime.describe_target(target),
                name
            );
            runtime.record_registration(registration.clone());
            registrations.push(registration);
        }
        Ok(registrations)
    }
}

fn wrap(
    original: Method,
    original_owner: ClassId,
    factory: HandlerFactory,
    options: Arc<Options>,
) -> Method {
    Arc::new(move |runtime: &Runtime, frame: &Frame| {
        // The wrapped body must see its own class as owner so `super` resolves past it.
        let frame = frame.rebind(original_owner);
        InterceptedCall::new(runtime, &frame, &original, factory(), &options).invoke()
    })
}
