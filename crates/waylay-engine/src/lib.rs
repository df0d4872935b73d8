//! Waylay Engine
//!
//! A small dynamic object runtime with transparent method interception:
//! - **Objects**: classes with instance and static method tables, single
//!   inheritance, dynamic [`Value`]s (`object`, `value` modules)
//! - **Dispatch**: one trampoline resolving methods by name (`runtime`,
//!   `dispatch` modules)
//! - **Interception**: before / after / around / on_exception / ensure hooks
//!   wrapped around existing methods (`intercept` module)
//! - **Diagnostics**: swappable warning sink (`diagnostics` module)
//!
//! # Example
//!
//! ```rust,ignore
//! use waylay_engine::{ClassDefinition, Hooks, Installer, Options, Runtime, Target, Value};
//!
//! let runtime = Runtime::new();
//! let romeo = runtime.define_class(
//!     ClassDefinition::new("Romeo")
//!         .method("speak", |_rt, _frame| Ok(Value::from("I AM A ROMEO"))),
//! );
//!
//! let hooks = Hooks::new().before(|call| {
//!     println!("ENTER {}", call.method_name());
//!     Ok(())
//! });
//! Installer::for_hooks(&runtime, hooks)
//!     .install(Target::instance_methods(romeo), &["speak"], Options::new())?;
//!
//! let said = runtime.call(&runtime.instantiate(romeo), "speak", vec![])?;
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

// ============================================================================
// Core Modules
// ============================================================================

/// Runtime configuration
pub mod config;

/// Warning sinks
pub mod diagnostics;

/// Method bodies, blocks and call frames
pub mod dispatch;

/// Error types
pub mod error;

/// Method interception
pub mod intercept;

/// Object model and class system
pub mod object;

/// Class registry and dispatch trampoline
pub mod runtime;

/// Dynamic values
pub mod value;

// ============================================================================
// Re-exports
// ============================================================================

pub use config::RuntimeConfig;
pub use diagnostics::{set_warning_sink, warning_sink, LogSink, MemorySink, StderrSink, WarningSink};
pub use dispatch::{block, Block, Frame, Method};
pub use error::{CallError, CallResult, ConfigError, HookResult, InstallError, OptionsError};
pub use intercept::{
    CallState, Callbacks, HandlerFactory, Hooks, InterceptedCall, Installer, NoopCallbacks, Options,
    Registration, Stage,
};
pub use object::{Class, ClassDefinition, ClassId, Object, ObjectRef, Side, Target};
pub use runtime::{Runtime, RuntimeBuilder};
pub use value::{Exception, Value};
