//! Runtime: class registry and dispatch trampoline
//!
//! Every call goes through [`Runtime::call_with_block`], which resolves the
//! method by walking the receiver's class chain and invokes whatever entry
//! it finds. Installed interceptors are ordinary entries, so the trampoline
//! has no knowledge of them.

use std::cell::Cell;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::config::RuntimeConfig;
use crate::diagnostics::{self, WarningSink};
use crate::dispatch::{Block, Frame, Method};
use crate::error::{CallError, CallResult, InstallError};
use crate::intercept::Registration;
use crate::object::{Class, ClassDefinition, ClassId, Object, Side, Target};
use crate::value::Value;

thread_local! {
    /// Nested dispatches on the current thread
    static CALL_DEPTH: Cell<usize> = const { Cell::new(0) };
}

/// Decrements the current thread's dispatch depth on drop
struct DepthGuard;

impl DepthGuard {
    fn enter(limit: usize) -> Result<Self, CallError> {
        let current = CALL_DEPTH.with(|depth| depth.get()) + 1;
        if current > limit {
            return Err(CallError::StackOverflow { depth: limit });
        }
        CALL_DEPTH.with(|depth| depth.set(current));
        Ok(Self)
    }
}

impl Drop for DepthGuard {
    fn drop(&mut self) {
        CALL_DEPTH.with(|depth| depth.set(depth.get().saturating_sub(1)));
    }
}

/// Builder for a [`Runtime`]
#[derive(Default)]
pub struct RuntimeBuilder {
    config: RuntimeConfig,
    sink: Option<Arc<dyn WarningSink>>,
}

impl RuntimeBuilder {
    /// Use the given configuration
    pub fn config(mut self, config: RuntimeConfig) -> Self {
        self.config = config;
        self
    }

    /// Send this runtime's warnings to `sink` instead of the process-wide one
    pub fn warning_sink(mut self, sink: Arc<dyn WarningSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Build the runtime
    pub fn build(self) -> Runtime {
        Runtime {
            classes: RwLock::new(Vec::new()),
            registrations: RwLock::new(Vec::new()),
            config: self.config,
            sink: self.sink,
            next_sequence: AtomicU64::new(1),
        }
    }
}

/// Class registry plus dispatch
///
/// A runtime may be shared between threads. Call depth is tracked per
/// thread, so concurrent dispatches do not count against each other.
pub struct Runtime {
    classes: RwLock<Vec<Class>>,
    registrations: RwLock<Vec<Registration>>,
    config: RuntimeConfig,
    sink: Option<Arc<dyn WarningSink>>,
    next_sequence: AtomicU64,
}

impl Runtime {
    /// Runtime with default configuration and the process-wide warning sink
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// Start building a runtime
    pub fn builder() -> RuntimeBuilder {
        RuntimeBuilder::default()
    }

    /// Active configuration
    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    // ========================================================================
    // Class registry
    // ========================================================================

    /// Register a new class
    pub fn define_class(&self, def: ClassDefinition) -> ClassId {
        let mut classes = self.classes.write();
        let id = ClassId(classes.len());
        log::debug!(target: "waylay::define", "class {} ({})", def.name, id.index());
        classes.push(Class {
            id,
            name: def.name,
            parent: def.parent,
            instance_methods: def.instance_methods,
            static_methods: def.static_methods,
        });
        id
    }

    /// Add or replace an instance method.
    ///
    /// Replacing a method discards any interceptors installed on it in this
    /// class.
    pub fn define_method<F>(&self, class: ClassId, name: &str, body: F) -> Result<(), InstallError>
    where
        F: Fn(&Runtime, &Frame) -> CallResult + Send + Sync + 'static,
    {
        self.redefine(Target::instance_methods(class), name, Arc::new(body))
    }

    /// Add or replace a static method, discarding its interceptors
    pub fn define_static_method<F>(
        &self,
        class: ClassId,
        name: &str,
        body: F,
    ) -> Result<(), InstallError>
    where
        F: Fn(&Runtime, &Frame) -> CallResult + Send + Sync + 'static,
    {
        self.redefine(Target::static_methods(class), name, Arc::new(body))
    }

    fn redefine(&self, target: Target, name: &str, method: Method) -> Result<(), InstallError> {
        self.set_entry(target, name, method)?;
        self.registrations
            .write()
            .retain(|r| !(r.target() == target && r.method() == name));
        Ok(())
    }

    /// Class name by id
    pub fn class_name(&self, class: ClassId) -> Option<String> {
        self.classes.read().get(class.0).map(|c| c.name.clone())
    }

    /// Look up a class by name; the most recently defined wins
    pub fn find_class(&self, name: &str) -> Option<ClassId> {
        self.classes
            .read()
            .iter()
            .rev()
            .find(|c| c.name == name)
            .map(|c| c.id)
    }

    /// Parent of a class
    pub fn parent_of(&self, class: ClassId) -> Option<ClassId> {
        self.classes.read().get(class.0).and_then(|c| c.parent)
    }

    /// Whether `class` is `ancestor` or inherits from it
    pub fn is_subclass_of(&self, class: ClassId, ancestor: ClassId) -> bool {
        let mut current = Some(class);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.parent_of(id);
        }
        false
    }

    /// Number of registered classes
    pub fn class_count(&self) -> usize {
        self.classes.read().len()
    }

    /// Create an instance of `class`
    pub fn instantiate(&self, class: ClassId) -> Value {
        Value::Object(Arc::new(Object::new(class)))
    }

    pub(crate) fn check_class(&self, class: ClassId) -> Result<(), InstallError> {
        if class.0 < self.classes.read().len() {
            Ok(())
        } else {
            Err(InstallError::UnknownClass(class.0))
        }
    }

    pub(crate) fn set_entry(
        &self,
        target: Target,
        name: &str,
        method: Method,
    ) -> Result<(), InstallError> {
        let mut classes = self.classes.write();
        let class = classes
            .get_mut(target.class.0)
            .ok_or(InstallError::UnknownClass(target.class.0))?;
        class.table_mut(target.side).insert(name, method);
        Ok(())
    }

    // ========================================================================
    // Lookup
    // ========================================================================

    /// Table a receiver dispatches through
    pub fn dispatch_target(&self, receiver: &Value) -> Option<Target> {
        match receiver {
            Value::Object(obj) => Some(Target::instance_methods(obj.class_id())),
            Value::Class(id) => Some(Target::static_methods(*id)),
            _ => None,
        }
    }

    /// Find the entry for `name`, walking up from `target.class`.
    ///
    /// Returns the class whose table held the entry along with the entry.
    pub fn resolve(&self, target: Target, name: &str) -> Option<(ClassId, Method)> {
        let classes = self.classes.read();
        let mut current = Some(target.class);
        while let Some(id) = current {
            let class = classes.get(id.0)?;
            if let Some(method) = class.table(target.side).get(name) {
                return Some((id, method.clone()));
            }
            current = class.parent;
        }
        None
    }

    /// Whether `name` is reachable from `target`
    pub fn method_defined(&self, target: Target, name: &str) -> bool {
        self.resolve(target, name).is_some()
    }

    /// Whether calling `name` on `receiver` would find a method
    pub fn responds_to(&self, receiver: &Value, name: &str) -> bool {
        self.dispatch_target(receiver)
            .is_some_and(|target| self.method_defined(target, name))
    }

    // ========================================================================
    // Dispatch
    // ========================================================================

    /// Call `name` on `receiver`
    pub fn call(&self, receiver: &Value, name: &str, args: Vec<Value>) -> CallResult {
        self.call_with_block(receiver, name, args, None)
    }

    /// Call `name` on `receiver`, passing a block
    pub fn call_with_block(
        &self,
        receiver: &Value,
        name: &str,
        args: Vec<Value>,
        block: Option<Block>,
    ) -> CallResult {
        let resolved = self
            .dispatch_target(receiver)
            .and_then(|target| self.resolve(target, name).map(|found| (target.side, found)));
        let Some((side, (owner, method))) = resolved else {
            return Err(CallError::NoMethod {
                method: name.to_string(),
                receiver: self.describe_receiver(receiver),
            });
        };

        log::trace!(target: "waylay::dispatch", "{}#{}", self.describe_receiver(receiver), name);
        let frame = Frame {
            receiver: receiver.clone(),
            method_name: Arc::from(name),
            owner,
            side,
            args,
            block,
        };
        self.invoke(&method, &frame)
    }

    /// Call the implementation above `frame.owner()` in the class chain
    pub fn call_super(&self, frame: &Frame, args: Vec<Value>, block: Option<Block>) -> CallResult {
        let found = self.parent_of(frame.owner).and_then(|parent| {
            self.resolve(
                Target {
                    class: parent,
                    side: frame.side,
                },
                frame.method_name(),
            )
        });
        let Some((owner, method)) = found else {
            return Err(CallError::NoMethod {
                method: format!("super: {}", frame.method_name()),
                receiver: self.describe_receiver(frame.receiver()),
            });
        };

        let frame = Frame {
            receiver: frame.receiver.clone(),
            method_name: frame.method_name.clone(),
            owner,
            side: frame.side,
            args,
            block,
        };
        self.invoke(&method, &frame)
    }

    fn invoke(&self, method: &Method, frame: &Frame) -> CallResult {
        let _depth = DepthGuard::enter(self.config.max_call_depth)?;
        method(self, frame)
    }

    // ========================================================================
    // Interceptor records
    // ========================================================================

    pub(crate) fn next_sequence(&self) -> u64 {
        self.next_sequence.fetch_add(1, Ordering::Relaxed)
    }

    pub(crate) fn record_registration(&self, registration: Registration) {
        self.registrations.write().push(registration);
    }

    /// Every interceptor layer installed on this runtime, oldest first
    pub fn registrations(&self) -> Vec<Registration> {
        self.registrations.read().clone()
    }

    /// Interceptor layers installed directly on one method, oldest first
    pub fn registrations_for(&self, target: Target, name: &str) -> Vec<Registration> {
        self.registrations
            .read()
            .iter()
            .filter(|r| r.target() == target && r.method() == name)
            .cloned()
            .collect()
    }

    // ========================================================================
    // Diagnostics
    // ========================================================================

    /// Send a warning to this runtime's sink, or the process-wide one
    pub fn warn(&self, message: &str) {
        match &self.sink {
            Some(sink) => sink.warn(message),
            None => diagnostics::warn(message),
        }
    }

    /// Human-readable name of a method table
    pub fn describe_target(&self, target: Target) -> String {
        let name = self
            .class_name(target.class)
            .unwrap_or_else(|| format!("<class {}>", target.class.index()));
        match target.side {
            Side::Instance => name,
            Side::Static => format!("{} (static)", name),
        }
    }

    /// Human-readable description of a receiver
    pub fn describe_receiver(&self, receiver: &Value) -> String {
        let class_name = |id: ClassId| {
            self.class_name(id)
                .unwrap_or_else(|| format!("<class {}>", id.index()))
        };
        match receiver {
            Value::Object(obj) => format!("an instance of {}", class_name(obj.class_id())),
            Value::Class(id) => format!("class {}", class_name(*id)),
            other => format!("{} {}", other.type_name(), other.inspect()),
        }
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name_of(_rt: &Runtime, _frame: &Frame) -> CallResult {
        Ok(Value::from("ROMEO"))
    }

    #[test]
    fn test_instance_and_static_tables_are_separate() {
        let rt = Runtime::new();
        let romeo = rt.define_class(
            ClassDefinition::new("Romeo")
                .method("name", name_of)
                .static_method("species", |_rt, _frame| Ok(Value::from("human"))),
        );
        let obj = rt.instantiate(romeo);

        assert_eq!(rt.call(&obj, "name", vec![]).unwrap(), Value::from("ROMEO"));
        assert_eq!(
            rt.call(&Value::Class(romeo), "species", vec![]).unwrap(),
            Value::from("human")
        );
        assert!(!rt.responds_to(&obj, "species"));
        assert!(!rt.responds_to(&Value::Class(romeo), "name"));
    }

    #[test]
    fn test_lookup_walks_parent_chain() {
        let rt = Runtime::new();
        let actor = rt.define_class(ClassDefinition::new("Actor").method("name", name_of));
        let romeo = rt.define_class(ClassDefinition::new("Romeo").parent(actor));

        let (owner, _) = rt.resolve(Target::instance_methods(romeo), "name").unwrap();
        assert_eq!(owner, actor);
        assert!(rt.is_subclass_of(romeo, actor));
        assert!(!rt.is_subclass_of(actor, romeo));
        assert_eq!(rt.find_class("Romeo"), Some(romeo));
    }

    #[test]
    fn test_no_method_error() {
        let rt = Runtime::new();
        let romeo = rt.define_class(ClassDefinition::new("Romeo"));
        let err = rt.call(&rt.instantiate(romeo), "kill_banquo", vec![]).unwrap_err();
        assert_eq!(
            err.to_string(),
            "undefined method `kill_banquo` for an instance of Romeo"
        );

        let err = rt.call(&Value::Int(3), "succ", vec![]).unwrap_err();
        assert!(matches!(err, CallError::NoMethod { .. }));
    }

    #[test]
    fn test_call_super_skips_own_class() {
        let rt = Runtime::new();
        let drogo = rt.define_class(ClassDefinition::new("Drogo").method("name", |_rt, _f| {
            Ok(Value::from("Drogo"))
        }));
        let frodo = rt.define_class(ClassDefinition::new("Frodo").parent(drogo).method(
            "name",
            |rt, frame| {
                let inherited = frame.call_super(rt)?;
                Ok(Value::from(format!("{} > Frodo", inherited)))
            },
        ));
        let result = rt.call(&rt.instantiate(frodo), "name", vec![]).unwrap();
        assert_eq!(result, Value::from("Drogo > Frodo"));
    }

    #[test]
    fn test_depth_limit() {
        let config = RuntimeConfig {
            max_call_depth: 16,
            ..RuntimeConfig::default()
        };
        let rt = Runtime::builder().config(config).build();
        let looper = rt.define_class(ClassDefinition::new("Looper").method("spin", |rt, frame| {
            rt.call(frame.receiver(), "spin", vec![])
        }));
        let err = rt.call(&rt.instantiate(looper), "spin", vec![]).unwrap_err();
        assert!(matches!(err, CallError::StackOverflow { depth: 16 }));
        // Guards unwound: a fresh call starts from zero again.
        let err = rt.call(&rt.instantiate(looper), "spin", vec![]).unwrap_err();
        assert!(matches!(err, CallError::StackOverflow { depth: 16 }));
    }

    #[test]
    fn test_depth_is_counted_per_thread() {
        use std::sync::Barrier;

        let config = RuntimeConfig {
            max_call_depth: 4,
            ..RuntimeConfig::default()
        };
        let rt = Runtime::builder().config(config).build();
        let barrier = Arc::new(Barrier::new(2));
        let waiting = barrier.clone();
        let sleeper = rt.define_class(
            ClassDefinition::new("Sleeper")
                .method("descend", move |rt, frame| {
                    let remaining = frame.arg_or(0, 0).as_int().unwrap_or(0);
                    if remaining == 0 {
                        waiting.wait();
                        waiting.wait();
                        return Ok(Value::Null);
                    }
                    rt.call(frame.receiver(), "descend", vec![Value::Int(remaining - 1)])
                })
                .method("name", name_of),
        );
        let obj = rt.instantiate(sleeper);

        std::thread::scope(|scope| {
            let deep = scope.spawn(|| rt.call(&obj, "descend", vec![Value::Int(3)]));
            // The other thread now holds the full depth budget.
            barrier.wait();
            let shallow = rt.call(&obj, "name", vec![]);
            barrier.wait();

            assert_eq!(shallow.unwrap(), Value::from("ROMEO"));
            assert!(deep.join().unwrap().is_ok());
        });
    }

    #[test]
    fn test_redefining_a_method_replaces_it() {
        let rt = Runtime::new();
        let romeo = rt.define_class(ClassDefinition::new("Romeo").method("name", name_of));
        rt.define_method(romeo, "name", |_rt, _f| Ok(Value::from("MONTAGUE")))
            .unwrap();
        let name = rt.call(&rt.instantiate(romeo), "name", vec![]).unwrap();
        assert_eq!(name, Value::from("MONTAGUE"));
    }
}
