use std::collections::HashMap;

use crate::runtime::value::ObjectHolder;

/// A scope: names bound to values.
///
/// Method calls run in a fresh closure seeded with `self`; an instance's
/// field map is a closure owned by the instance.
pub type Closure = HashMap<String, ObjectHolder>;

/// Execution environment handed to every statement. It owns the output
/// sink used by `print` and by `__str__` dispatch.
pub trait Context {
    fn output(&mut self) -> &mut String;
}

/// Context writing into a caller-provided buffer.
pub struct SimpleContext<'a> {
    output: &'a mut String,
}

impl<'a> SimpleContext<'a> {
    pub fn new(output: &'a mut String) -> Self {
        Self { output }
    }
}

impl Context for SimpleContext<'_> {
    fn output(&mut self) -> &mut String {
        self.output
    }
}

/// Scratch context whose captured output backs `str(...)`.
#[derive(Debug, Default)]
pub struct DummyContext {
    pub output: String,
}

impl DummyContext {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Context for DummyContext {
    fn output(&mut self) -> &mut String {
        &mut self.output
    }
}
