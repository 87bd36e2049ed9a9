use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::runtime::class::{self, Class, ClassInstance, STR_METHOD};
use crate::runtime::error::RuntimeError;
use crate::runtime::execution::Context;

pub type ObjectRef = Rc<RefCell<Object>>;

/// A runtime value. The `None` value is represented by an empty
/// [`ObjectHolder`], not by a variant here.
pub enum Object {
    Number(i32),
    String(String),
    Bool(bool),
    Class(Rc<Class>),
    Instance(ClassInstance),
}

impl Object {
    pub fn type_name(&self) -> &'static str {
        match self {
            Object::Number(_) => "Number",
            Object::String(_) => "String",
            Object::Bool(_) => "Bool",
            Object::Class(_) => "Class",
            Object::Instance(_) => "ClassInstance",
        }
    }
}

impl fmt::Debug for Object {
    // Shallow on purpose: instance field maps may point back at the
    // instance itself.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Object({})", self.type_name())
    }
}

/// Shared, possibly-empty handle to a runtime object.
///
/// An empty holder is the `None` value. Cloning a holder shares the
/// referent; instances reached through `self` alias the caller's storage.
#[derive(Clone, Default)]
pub struct ObjectHolder {
    data: Option<ObjectRef>,
}

impl fmt::Debug for ObjectHolder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.data {
            Some(object) => write!(f, "{:?}", object.borrow()),
            None => write!(f, "None"),
        }
    }
}

impl ObjectHolder {
    /// Takes ownership of a freshly created object.
    pub fn own(object: Object) -> Self {
        Self {
            data: Some(Rc::new(RefCell::new(object))),
        }
    }

    /// Wraps an object whose storage lives elsewhere. Dropping the holder
    /// never destroys the referent while other handles remain.
    pub fn share(object: ObjectRef) -> Self {
        Self { data: Some(object) }
    }

    pub fn none() -> Self {
        Self { data: None }
    }

    pub fn number(value: i32) -> Self {
        Self::own(Object::Number(value))
    }

    pub fn string(value: impl Into<String>) -> Self {
        Self::own(Object::String(value.into()))
    }

    pub fn boolean(value: bool) -> Self {
        Self::own(Object::Bool(value))
    }

    pub fn get(&self) -> Option<&ObjectRef> {
        self.data.as_ref()
    }

    pub fn is_none(&self) -> bool {
        self.data.is_none()
    }

    pub fn type_name(&self) -> &'static str {
        match &self.data {
            Some(object) => object.borrow().type_name(),
            None => "None",
        }
    }

    pub fn as_number(&self) -> Option<i32> {
        let object = self.data.as_ref()?;
        match &*object.borrow() {
            Object::Number(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        let object = self.data.as_ref()?;
        match &*object.borrow() {
            Object::Bool(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_string(&self) -> Option<String> {
        let object = self.data.as_ref()?;
        match &*object.borrow() {
            Object::String(value) => Some(value.clone()),
            _ => None,
        }
    }

    pub fn as_class(&self) -> Option<Rc<Class>> {
        let object = self.data.as_ref()?;
        match &*object.borrow() {
            Object::Class(class) => Some(class.clone()),
            _ => None,
        }
    }

    /// The underlying reference when the holder wraps a class instance.
    pub fn instance_ref(&self) -> Option<ObjectRef> {
        let object = self.data.as_ref()?;
        if matches!(&*object.borrow(), Object::Instance(_)) {
            Some(object.clone())
        } else {
            None
        }
    }

    /// Runs `f` over the instance payload when the holder wraps one.
    pub fn with_instance<R>(&self, f: impl FnOnce(&ClassInstance) -> R) -> Option<R> {
        let object = self.data.as_ref()?;
        let borrow = object.borrow();
        match &*borrow {
            Object::Instance(instance) => Some(f(instance)),
            _ => None,
        }
    }

    pub fn with_instance_mut<R>(&self, f: impl FnOnce(&mut ClassInstance) -> R) -> Option<R> {
        let object = self.data.as_ref()?;
        let mut borrow = object.borrow_mut();
        match &mut *borrow {
            Object::Instance(instance) => Some(f(instance)),
            _ => None,
        }
    }

    /// Renders the value the way `print` shows it. A class instance with a
    /// zero-argument `__str__` delegates to it; anything the dispatched
    /// method prints goes through `context`.
    pub fn to_output(&self, context: &mut dyn Context) -> Result<String, RuntimeError> {
        let Some(object) = self.data.as_ref() else {
            return Ok("None".to_string());
        };

        // The borrow must end before `__str__` runs: the method body may
        // touch the same cell through `self`.
        let rendered = {
            let borrow = object.borrow();
            match &*borrow {
                Object::Number(value) => Some(value.to_string()),
                Object::String(value) => Some(value.clone()),
                Object::Bool(value) => Some(if *value { "True" } else { "False" }.to_string()),
                Object::Class(class) => Some(format!("Class {}", class.name())),
                Object::Instance(instance) => {
                    if instance.has_method(STR_METHOD, 0) {
                        None
                    } else {
                        Some(format!("<{} object>", instance.class().name()))
                    }
                }
            }
        };
        if let Some(text) = rendered {
            return Ok(text);
        }

        let result = class::call_method(object, STR_METHOD, Vec::new(), context)?;
        result.to_output(context)
    }
}

/// Truthiness of a value: `Bool` by value, `Number` when nonzero, `String`
/// when non-empty. Everything else, including `None`, classes, and class
/// instances, is false.
pub fn is_true(object: &ObjectHolder) -> bool {
    let Some(data) = object.get() else {
        return false;
    };
    match &*data.borrow() {
        Object::Bool(value) => *value,
        Object::Number(value) => *value != 0,
        Object::String(value) => !value.is_empty(),
        Object::Class(_) | Object::Instance(_) => false,
    }
}
