//! Method bodies, blocks, and call frames

use std::fmt;
use std::sync::Arc;

use crate::error::{CallError, CallResult};
use crate::object::{ClassId, Side};
use crate::runtime::Runtime;
use crate::value::{Exception, Value};

/// A method body stored in a method table.
///
/// Wrapped methods are themselves `Method`s, so interception layers stack by
/// plain composition.
pub type Method = Arc<dyn Fn(&Runtime, &Frame) -> CallResult + Send + Sync>;

/// A caller-supplied continuation, forwarded unchanged to the method body
pub type Block = Arc<dyn Fn(&Runtime, &[Value]) -> CallResult + Send + Sync>;

/// Wrap a closure as a [`Block`]
pub fn block<F>(body: F) -> Block
where
    F: Fn(&Runtime, &[Value]) -> CallResult + Send + Sync + 'static,
{
    Arc::new(body)
}

/// One dispatched call
#[derive(Clone)]
pub struct Frame {
    pub(crate) receiver: Value,
    pub(crate) method_name: Arc<str>,
    pub(crate) owner: ClassId,
    pub(crate) side: Side,
    pub(crate) args: Vec<Value>,
    pub(crate) block: Option<Block>,
}

impl Frame {
    /// The object (or class, for static calls) the method was called on
    pub fn receiver(&self) -> &Value {
        &self.receiver
    }

    /// Name the method was called by
    pub fn method_name(&self) -> &str {
        &self.method_name
    }

    /// Class whose table held the method body being run
    pub fn owner(&self) -> ClassId {
        self.owner
    }

    /// Instance or static dispatch
    pub fn side(&self) -> Side {
        self.side
    }

    /// Positional arguments
    pub fn args(&self) -> &[Value] {
        &self.args
    }

    /// Positional argument by index
    pub fn arg(&self, index: usize) -> Option<&Value> {
        self.args.get(index)
    }

    /// Positional argument by index, or `default` when it was not passed
    pub fn arg_or(&self, index: usize, default: impl Into<Value>) -> Value {
        self.args.get(index).cloned().unwrap_or_else(|| default.into())
    }

    /// The caller's block, if any
    pub fn block(&self) -> Option<&Block> {
        self.block.as_ref()
    }

    /// Invoke the caller's block.
    ///
    /// Raises `LocalJumpError` when the caller passed no block.
    pub fn yield_block(&self, runtime: &Runtime, args: &[Value]) -> CallResult {
        match &self.block {
            Some(block) => block(runtime, args),
            None => Err(CallError::Raised(Exception::new(
                "LocalJumpError",
                "no block given (yield)",
            ))),
        }
    }

    /// Call the parent class's implementation with the same arguments and block
    pub fn call_super(&self, runtime: &Runtime) -> CallResult {
        runtime.call_super(self, self.args.clone(), self.block.clone())
    }

    /// Same call, attributed to a different owning class
    pub(crate) fn rebind(&self, owner: ClassId) -> Frame {
        Frame {
            owner,
            ..self.clone()
        }
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frame")
            .field("receiver", &self.receiver)
            .field("method_name", &self.method_name)
            .field("owner", &self.owner)
            .field("side", &self.side)
            .field("args", &self.args)
            .field("block", &self.block.is_some())
            .finish()
    }
}
