use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use crate::runtime::error::RuntimeError;
use crate::runtime::execution::{Closure, Context};
use crate::runtime::value::{Object, ObjectHolder, ObjectRef};
use crate::statement::{Flow, Statement};

pub(crate) const INIT_METHOD: &str = "__init__";
pub(crate) const STR_METHOD: &str = "__str__";
pub(crate) const ADD_METHOD: &str = "__add__";
pub(crate) const EQ_METHOD: &str = "__eq__";
pub(crate) const LT_METHOD: &str = "__lt__";
pub(crate) const SELF_NAME: &str = "self";

/// A named method body with its formal parameter list. `self` is implicit
/// and bound at call time.
#[derive(Debug)]
pub struct Method {
    pub name: String,
    pub formal_params: Vec<String>,
    pub body: Rc<Statement>,
}

/// A class definition: the ordered method list, an optional parent, and a
/// flattened name index built at construction (own methods override
/// inherited ones on collision).
pub struct Class {
    name: String,
    methods: Vec<Rc<Method>>,
    parent: Option<Rc<Class>>,
    method_index: HashMap<String, Rc<Method>>,
}

impl Class {
    pub fn new(name: impl Into<String>, methods: Vec<Method>, parent: Option<Rc<Class>>) -> Self {
        let methods: Vec<Rc<Method>> = methods.into_iter().map(Rc::new).collect();
        let mut method_index = HashMap::new();
        if let Some(parent) = &parent {
            for (name, method) in &parent.method_index {
                method_index.insert(name.clone(), method.clone());
            }
        }
        for method in &methods {
            method_index.insert(method.name.clone(), method.clone());
        }
        Self {
            name: name.into(),
            methods,
            parent,
            method_index,
        }
    }

    /// Resolves `name` through the flattened index.
    pub fn get_method(&self, name: &str) -> Option<&Rc<Method>> {
        self.method_index.get(name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn methods(&self) -> &[Rc<Method>] {
        &self.methods
    }

    pub fn parent(&self) -> Option<&Rc<Class>> {
        self.parent.as_ref()
    }
}

impl fmt::Debug for Class {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Class").field("name", &self.name).finish()
    }
}

/// An instance of a class: a reference to the definition plus the mutable
/// field map.
#[derive(Debug)]
pub struct ClassInstance {
    class: Rc<Class>,
    fields: Closure,
}

impl ClassInstance {
    pub fn new(class: Rc<Class>) -> Self {
        Self {
            class,
            fields: Closure::new(),
        }
    }

    pub fn class(&self) -> &Rc<Class> {
        &self.class
    }

    pub fn fields(&self) -> &Closure {
        &self.fields
    }

    pub fn fields_mut(&mut self) -> &mut Closure {
        &mut self.fields
    }

    /// True when the class resolves `method` to a body expecting exactly
    /// `arity` arguments beyond `self`.
    pub fn has_method(&self, method: &str, arity: usize) -> bool {
        self.class
            .get_method(method)
            .is_some_and(|resolved| resolved.formal_params.len() == arity)
    }
}

/// Dispatches `method` on `receiver` by name and arity.
///
/// The callee sees the receiver through a shared `self` binding, so field
/// mutations it performs are visible to the caller.
pub fn call_method(
    receiver: &ObjectRef,
    method: &str,
    args: Vec<ObjectHolder>,
    context: &mut dyn Context,
) -> Result<ObjectHolder, RuntimeError> {
    // The receiver borrow must end before the body runs; the body reaches
    // the same cell through `self`.
    let resolved = {
        let borrow = receiver.borrow();
        let Object::Instance(instance) = &*borrow else {
            return Err(RuntimeError::NotAnInstance {
                type_name: borrow.type_name(),
            });
        };
        match instance.class().get_method(method) {
            Some(resolved) if resolved.formal_params.len() == args.len() => resolved.clone(),
            _ => {
                return Err(RuntimeError::MethodNotImplemented {
                    method: method.to_string(),
                    arity: args.len(),
                    class: instance.class().name().to_string(),
                });
            }
        }
    };

    let mut closure = Closure::new();
    closure.insert(SELF_NAME.to_string(), ObjectHolder::share(receiver.clone()));
    for (param, value) in resolved.formal_params.iter().zip(args) {
        closure.insert(param.clone(), value);
    }

    match resolved.body.execute(&mut closure, context)? {
        Flow::Value(value) | Flow::Return(value) => Ok(value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::execution::DummyContext;

    fn method(name: &str, params: &[&str], body: Statement) -> Method {
        Method {
            name: name.to_string(),
            formal_params: params.iter().map(|param| param.to_string()).collect(),
            body: Rc::new(Statement::MethodBody {
                body: Box::new(body),
            }),
        }
    }

    fn returning(value: i32) -> Statement {
        Statement::Return {
            statement: Box::new(Statement::number(value)),
        }
    }

    #[test]
    fn child_methods_override_parent_methods() {
        let parent = Rc::new(Class::new(
            "A",
            vec![method("f", &[], returning(1)), method("g", &[], returning(10))],
            None,
        ));
        let child = Rc::new(Class::new(
            "B",
            vec![method("f", &[], returning(2))],
            Some(parent.clone()),
        ));

        let f = child.get_method("f").expect("f must resolve");
        let g = child.get_method("g").expect("g must resolve");
        assert!(Rc::ptr_eq(f, &child.methods()[0]));
        assert!(Rc::ptr_eq(g, &parent.methods()[1]));
        assert!(child.get_method("missing").is_none());
    }

    #[test]
    fn flattening_spans_deep_parent_chains() {
        let a = Rc::new(Class::new("A", vec![method("f", &[], returning(1))], None));
        let b = Rc::new(Class::new("B", Vec::new(), Some(a)));
        let c = Rc::new(Class::new("C", Vec::new(), Some(b)));

        assert!(c.get_method("f").is_some());
    }

    #[test]
    fn has_method_checks_arity() {
        let class = Rc::new(Class::new(
            "C",
            vec![method("f", &["x"], returning(0))],
            None,
        ));
        let instance = ClassInstance::new(class);

        assert!(instance.has_method("f", 1));
        assert!(!instance.has_method("f", 0));
        assert!(!instance.has_method("missing", 0));
    }

    #[test]
    fn call_binds_self_and_parameters() {
        // def echo(x): return x
        let class = Rc::new(Class::new(
            "C",
            vec![method(
                "echo",
                &["x"],
                Statement::Return {
                    statement: Box::new(Statement::variable("x")),
                },
            )],
            None,
        ));
        let holder = ObjectHolder::own(Object::Instance(ClassInstance::new(class)));
        let receiver = holder.instance_ref().expect("holder wraps an instance");

        let mut context = DummyContext::new();
        let result = call_method(
            &receiver,
            "echo",
            vec![ObjectHolder::number(5)],
            &mut context,
        )
        .expect("call should succeed");
        assert_eq!(result.as_number(), Some(5));
    }

    #[test]
    fn call_rejects_wrong_arity_with_not_implemented() {
        let class = Rc::new(Class::new(
            "C",
            vec![method("f", &["x"], returning(0))],
            None,
        ));
        let holder = ObjectHolder::own(Object::Instance(ClassInstance::new(class)));
        let receiver = holder.instance_ref().expect("holder wraps an instance");

        let mut context = DummyContext::new();
        let err = call_method(&receiver, "f", Vec::new(), &mut context)
            .expect_err("expected arity mismatch");
        assert_eq!(
            err,
            RuntimeError::MethodNotImplemented {
                method: "f".to_string(),
                arity: 0,
                class: "C".to_string(),
            }
        );
    }

    #[test]
    fn method_without_return_produces_none() {
        let class = Rc::new(Class::new(
            "C",
            vec![method("f", &[], Statement::number(5))],
            None,
        ));
        let holder = ObjectHolder::own(Object::Instance(ClassInstance::new(class)));
        let receiver = holder.instance_ref().expect("holder wraps an instance");

        let mut context = DummyContext::new();
        let result =
            call_method(&receiver, "f", Vec::new(), &mut context).expect("call should succeed");
        assert!(result.is_none());
    }
}
