//! Object model and class system
//!
//! Classes hold two method tables: one for instance dispatch and one for
//! static (class-level) dispatch. Both are looked up through the parent
//! chain, so a subclass sees everything installed on its ancestors.

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use crate::dispatch::Method;
use crate::value::Value;

/// Class identifier (index into the runtime's class registry)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClassId(pub(crate) usize);

impl ClassId {
    /// Registry index of this class
    pub fn index(self) -> usize {
        self.0
    }
}

/// Shared handle to an object instance
pub type ObjectRef = Arc<Object>;

/// Object instance
pub struct Object {
    class_id: ClassId,
    fields: RwLock<FxHashMap<String, Value>>,
}

impl Object {
    /// Create a new object with no fields set
    pub fn new(class_id: ClassId) -> Self {
        Self {
            class_id,
            fields: RwLock::new(FxHashMap::default()),
        }
    }

    /// Class of this object
    pub fn class_id(&self) -> ClassId {
        self.class_id
    }

    /// Get a field value; unset fields read as `None`
    pub fn get_field(&self, name: &str) -> Option<Value> {
        self.fields.read().get(name).cloned()
    }

    /// Set a field value, returning the previous one
    pub fn set_field(&self, name: impl Into<String>, value: Value) -> Option<Value> {
        self.fields.write().insert(name.into(), value)
    }

    /// Get number of set fields
    pub fn field_count(&self) -> usize {
        self.fields.read().len()
    }
}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Object")
            .field("class_id", &self.class_id)
            .field("fields", &self.field_count())
            .finish()
    }
}

/// Which method table a call dispatches through
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    /// Methods called on instances of the class
    Instance,
    /// Methods called on the class itself
    Static,
}

/// A (class, side) pair naming one method table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Target {
    /// Class owning the table
    pub class: ClassId,
    /// Instance or static table
    pub side: Side,
}

impl Target {
    /// Target the instance methods of `class`
    pub fn instance_methods(class: ClassId) -> Self {
        Self {
            class,
            side: Side::Instance,
        }
    }

    /// Target the static methods of `class`
    pub fn static_methods(class: ClassId) -> Self {
        Self {
            class,
            side: Side::Static,
        }
    }
}

/// Name-keyed method table
#[derive(Clone, Default)]
pub struct MethodTable {
    entries: FxHashMap<String, Method>,
}

impl MethodTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a method by name
    pub fn get(&self, name: &str) -> Option<&Method> {
        self.entries.get(name)
    }

    /// Insert or replace a method, returning the previous entry
    pub fn insert(&mut self, name: impl Into<String>, method: Method) -> Option<Method> {
        self.entries.insert(name.into(), method)
    }

    /// Check if a method is defined directly in this table
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Method names, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.entries.keys().cloned().collect();
        names.sort();
        names
    }

    /// Get number of methods
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the table is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Debug for MethodTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.names()).finish()
    }
}

/// Class definition metadata
#[derive(Debug, Clone)]
pub struct Class {
    /// Class ID (unique identifier)
    pub id: ClassId,
    /// Class name
    pub name: String,
    /// Parent class ID (None for root classes)
    pub parent: Option<ClassId>,
    /// Instance method table
    pub instance_methods: MethodTable,
    /// Static method table
    pub static_methods: MethodTable,
}

impl Class {
    /// Method table for one side
    pub fn table(&self, side: Side) -> &MethodTable {
        match side {
            Side::Instance => &self.instance_methods,
            Side::Static => &self.static_methods,
        }
    }

    /// Mutable method table for one side
    pub fn table_mut(&mut self, side: Side) -> &mut MethodTable {
        match side {
            Side::Instance => &mut self.instance_methods,
            Side::Static => &mut self.static_methods,
        }
    }
}

/// Builder for a new class
///
/// ```ignore
/// let romeo = runtime.define_class(
///     ClassDefinition::new("Romeo")
///         .method("speak", |_rt, _frame| Ok(Value::from("I AM ROMEO"))),
/// );
/// ```
#[derive(Clone)]
pub struct ClassDefinition {
    pub(crate) name: String,
    pub(crate) parent: Option<ClassId>,
    pub(crate) instance_methods: MethodTable,
    pub(crate) static_methods: MethodTable,
}

impl ClassDefinition {
    /// Start a root class definition
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parent: None,
            instance_methods: MethodTable::new(),
            static_methods: MethodTable::new(),
        }
    }

    /// Set the parent class
    pub fn parent(mut self, parent: ClassId) -> Self {
        self.parent = Some(parent);
        self
    }

    /// Add an instance method
    pub fn method<F>(mut self, name: &str, body: F) -> Self
    where
        F: Fn(&crate::Runtime, &crate::Frame) -> crate::CallResult + Send + Sync + 'static,
    {
        self.instance_methods.insert(name, Arc::new(body));
        self
    }

    /// Add a static method
    pub fn static_method<F>(mut self, name: &str, body: F) -> Self
    where
        F: Fn(&crate::Runtime, &crate::Frame) -> crate::CallResult + Send + Sync + 'static,
    {
        self.static_methods.insert(name, Arc::new(body));
        self
    }
}

impl fmt::Debug for ClassDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassDefinition")
            .field("name", &self.name)
            .field("parent", &self.parent)
            .field("instance_methods", &self.instance_methods)
            .field("static_methods", &self.static_methods)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_fields() {
        let obj = Object::new(ClassId(0));
        assert_eq!(obj.get_field("name"), None);
        assert_eq!(obj.set_field("name", Value::from("ROMEO")), None);
        assert_eq!(obj.get_field("name"), Some(Value::from("ROMEO")));
        assert_eq!(obj.field_count(), 1);
    }

    #[test]
    fn test_definition_collects_methods() {
        let def = ClassDefinition::new("Romeo")
            .method("speak", |_rt, _frame| Ok(Value::Null))
            .static_method("create", |_rt, _frame| Ok(Value::Null));
        assert!(def.instance_methods.contains("speak"));
        assert!(!def.instance_methods.contains("create"));
        assert!(def.static_methods.contains("create"));
    }

    fn noop(_rt: &crate::Runtime, _frame: &crate::Frame) -> crate::CallResult {
        Ok(Value::Null)
    }

    #[test]
    fn test_method_table_names_sorted() {
        let mut table = MethodTable::new();
        table.insert("wax_poetic", Arc::new(noop));
        table.insert("speak", Arc::new(noop));
        assert_eq!(table.names(), vec!["speak".to_string(), "wax_poetic".to_string()]);
        assert_eq!(table.len(), 2);
    }
}
