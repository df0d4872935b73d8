//! Method interception
//!
//! - [`Callbacks`] / [`Hooks`]: the five lifecycle hooks
//! - [`InterceptedCall`]: per-invocation state and orchestration
//! - [`Installer`]: wraps named methods of a [`Target`](crate::Target)
//! - [`Options`]: install-time settings passed to every hook

mod call;
mod callbacks;
mod installer;
mod options;

pub use call::{CallState, InterceptedCall};
pub use callbacks::{Callbacks, Hooks, NoopCallbacks, Stage};
pub use installer::{factory, handler, hooks, HandlerFactory, Installer, Registration};
pub use options::Options;
