//! Shared fixtures for integration tests

#![allow(dead_code)]

use std::sync::Arc;

use parking_lot::Mutex;
use waylay_engine::{ClassDefinition, ClassId, Frame, Runtime, Value};

pub const LINE: &str = "What light through yonder window breaks?";

/// Records scenes in the order hooks and methods run
#[derive(Clone, Default)]
pub struct Audience(Arc<Mutex<Vec<String>>>);

impl Audience {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn remember(&self, scene: impl Into<String>) {
        self.0.lock().push(scene.into());
    }

    pub fn recall(&self) -> Vec<String> {
        self.0.lock().clone()
    }

    /// True if `scenes` appear in this order, not necessarily adjacent
    pub fn recalls_in_order(&self, scenes: &[&str]) -> bool {
        let memories = self.recall();
        let mut pending = scenes.iter().peekable();
        for memory in &memories {
            if pending.peek().is_some_and(|scene| **scene == memory.as_str()) {
                pending.next();
            }
        }
        pending.peek().is_none()
    }

    pub fn count(&self, scene: &str) -> usize {
        self.recall().iter().filter(|m| m.as_str() == scene).count()
    }
}

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// `Romeo#wax_poetic(remembered_lines = true)`: recites `LINE`, raises when
/// `remembered_lines` is false
pub fn define_romeo(runtime: &Runtime, audience: &Audience) -> ClassId {
    let audience = audience.clone();
    runtime.define_class(ClassDefinition::new("Romeo").method(
        "wax_poetic",
        move |_rt: &Runtime, frame: &Frame| {
            if frame.arg_or(0, true) == Value::Bool(false) {
                return Err(waylay_engine::CallError::runtime(
                    "THERE WAS A FARMER HAD A DOG AND ROME-O WAS HIS NAME-O",
                ));
            }
            audience.remember(LINE);
            Ok(Value::from(LINE))
        },
    ))
}
