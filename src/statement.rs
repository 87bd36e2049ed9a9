//! The statement tree and its tree-walking evaluator.
//!
//! Every node is a [`Statement`]; expressions are statements that yield a
//! value. `return` travels as a dedicated control-flow variant instead of
//! host unwinding: every statement boundary propagates [`Flow::Return`]
//! upward until the enclosing [`Statement::MethodBody`] converts it.

use std::rc::Rc;

use crate::runtime::class::{self, ADD_METHOD, Class, ClassInstance, INIT_METHOD};
use crate::runtime::compare;
use crate::runtime::error::RuntimeError;
use crate::runtime::execution::{Closure, Context, DummyContext, SimpleContext};
use crate::runtime::value::{Object, ObjectHolder, is_true};

/// Result of executing one statement: either a plain value or a `return`
/// travelling up to the enclosing method body.
#[derive(Debug)]
pub enum Flow {
    Value(ObjectHolder),
    Return(ObjectHolder),
}

pub type ExecResult = Result<Flow, RuntimeError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    Add,
    Sub,
    Mult,
    Div,
}

impl BinaryOperator {
    fn name(self) -> &'static str {
        match self {
            BinaryOperator::Add => "add",
            BinaryOperator::Sub => "sub",
            BinaryOperator::Mult => "mult",
            BinaryOperator::Div => "div",
        }
    }
}

/// Comparison selector for [`Statement::Comparison`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparator {
    Equal,
    NotEqual,
    Less,
    Greater,
    LessOrEqual,
    GreaterOrEqual,
}

#[derive(Debug)]
pub enum Statement {
    /// Literal or other pre-built value.
    Constant { value: ObjectHolder },
    Assignment {
        var: String,
        rhs: Box<Statement>,
    },
    /// Dotted access: the head resolves in the closure, every further name
    /// descends into instance fields.
    VariableValue { dotted_ids: Vec<String> },
    Print { args: Vec<Statement> },
    MethodCall {
        object: Box<Statement>,
        method: String,
        args: Vec<Statement>,
    },
    /// Instantiation site. The node owns the instance; executing it shares
    /// that same storage, after dispatching `__init__` when one matches.
    NewInstance {
        instance: ObjectHolder,
        args: Vec<Statement>,
    },
    Stringify { argument: Box<Statement> },
    BinaryOp {
        op: BinaryOperator,
        lhs: Box<Statement>,
        rhs: Box<Statement>,
    },
    Or {
        lhs: Box<Statement>,
        rhs: Box<Statement>,
    },
    And {
        lhs: Box<Statement>,
        rhs: Box<Statement>,
    },
    Not { argument: Box<Statement> },
    Comparison {
        cmp: Comparator,
        lhs: Box<Statement>,
        rhs: Box<Statement>,
    },
    Compound { statements: Vec<Statement> },
    Return { statement: Box<Statement> },
    ClassDefinition { class: ObjectHolder },
    FieldAssignment {
        object: Box<Statement>,
        field_name: String,
        rhs: Box<Statement>,
    },
    IfElse {
        condition: Box<Statement>,
        if_body: Box<Statement>,
        else_body: Option<Box<Statement>>,
    },
    /// Root of a method body: the boundary that turns [`Flow::Return`]
    /// into the method's value.
    MethodBody { body: Box<Statement> },
}

/// Evaluates a sub-statement to a value, propagating a travelling `return`
/// past the current statement.
macro_rules! eval {
    ($stmt:expr, $closure:expr, $context:expr) => {
        match $stmt.execute($closure, $context)? {
            Flow::Value(value) => value,
            Flow::Return(value) => return Ok(Flow::Return(value)),
        }
    };
}

impl Statement {
    pub fn constant(value: ObjectHolder) -> Self {
        Self::Constant { value }
    }

    pub fn number(value: i32) -> Self {
        Self::constant(ObjectHolder::number(value))
    }

    pub fn string(value: impl Into<String>) -> Self {
        Self::constant(ObjectHolder::string(value))
    }

    pub fn boolean(value: bool) -> Self {
        Self::constant(ObjectHolder::boolean(value))
    }

    pub fn none() -> Self {
        Self::constant(ObjectHolder::none())
    }

    pub fn variable(name: impl Into<String>) -> Self {
        Self::VariableValue {
            dotted_ids: vec![name.into()],
        }
    }

    pub fn class_definition(class: Rc<Class>) -> Self {
        Self::ClassDefinition {
            class: ObjectHolder::own(Object::Class(class)),
        }
    }

    pub fn new_instance(class: Rc<Class>, args: Vec<Statement>) -> Self {
        Self::NewInstance {
            instance: ObjectHolder::own(Object::Instance(ClassInstance::new(class))),
            args,
        }
    }

    /// Evaluates the statement in `closure`, writing output through
    /// `context`.
    pub fn execute(&self, closure: &mut Closure, context: &mut dyn Context) -> ExecResult {
        match self {
            Statement::Constant { value } => Ok(Flow::Value(value.clone())),

            Statement::Assignment { var, rhs } => {
                let value = eval!(rhs, closure, context);
                closure.insert(var.clone(), value.clone());
                Ok(Flow::Value(value))
            }

            Statement::VariableValue { dotted_ids } => {
                Ok(Flow::Value(lookup_dotted(dotted_ids, closure)?))
            }

            Statement::Print { args } => {
                let mut result = ObjectHolder::none();
                let mut first = true;
                for arg in args {
                    if !first {
                        context.output().push(' ');
                    }
                    first = false;
                    let value = eval!(arg, closure, context);
                    let text = value.to_output(context)?;
                    context.output().push_str(&text);
                    result = value;
                }
                context.output().push('\n');
                Ok(Flow::Value(result))
            }

            Statement::MethodCall {
                object,
                method,
                args,
            } => {
                let receiver = eval!(object, closure, context);
                if receiver.is_none() {
                    return Ok(Flow::Value(ObjectHolder::none()));
                }
                let Some(receiver_ref) = receiver.instance_ref() else {
                    return Err(RuntimeError::NotAnInstance {
                        type_name: receiver.type_name(),
                    });
                };
                let mut arg_values = Vec::with_capacity(args.len());
                for arg in args {
                    arg_values.push(eval!(arg, closure, context));
                }
                let result = class::call_method(&receiver_ref, method, arg_values, context)?;
                Ok(Flow::Value(result))
            }

            Statement::NewInstance { instance, args } => {
                let mut arg_values = Vec::with_capacity(args.len());
                for arg in args {
                    arg_values.push(eval!(arg, closure, context));
                }
                let receiver = instance.instance_ref().ok_or(RuntimeError::NotAnInstance {
                    type_name: instance.type_name(),
                })?;
                let has_init = instance
                    .with_instance(|inner| inner.has_method(INIT_METHOD, arg_values.len()))
                    .unwrap_or(false);
                if has_init {
                    class::call_method(&receiver, INIT_METHOD, arg_values, context)?;
                }
                Ok(Flow::Value(instance.clone()))
            }

            Statement::Stringify { argument } => {
                let value = eval!(argument, closure, context);
                // Side prints of a dispatched __str__ land in the scratch
                // buffer, not the program output.
                let mut dummy = DummyContext::new();
                let text = value.to_output(&mut dummy)?;
                Ok(Flow::Value(ObjectHolder::string(text)))
            }

            Statement::BinaryOp { op, lhs, rhs } => {
                let lhs_value = eval!(lhs, closure, context);
                let rhs_value = eval!(rhs, closure, context);
                Ok(Flow::Value(execute_binary_op(
                    *op, &lhs_value, &rhs_value, context,
                )?))
            }

            // `and`/`or` always evaluate both operands.
            Statement::Or { lhs, rhs } => {
                let lhs_value = eval!(lhs, closure, context);
                let rhs_value = eval!(rhs, closure, context);
                require_operands("or", &lhs_value, &rhs_value)?;
                Ok(Flow::Value(ObjectHolder::boolean(
                    is_true(&lhs_value) || is_true(&rhs_value),
                )))
            }

            Statement::And { lhs, rhs } => {
                let lhs_value = eval!(lhs, closure, context);
                let rhs_value = eval!(rhs, closure, context);
                require_operands("and", &lhs_value, &rhs_value)?;
                Ok(Flow::Value(ObjectHolder::boolean(
                    is_true(&lhs_value) && is_true(&rhs_value),
                )))
            }

            Statement::Not { argument } => {
                let value = eval!(argument, closure, context);
                if value.is_none() {
                    return Err(RuntimeError::NullOperands { operation: "not" });
                }
                Ok(Flow::Value(ObjectHolder::boolean(!is_true(&value))))
            }

            Statement::Comparison { cmp, lhs, rhs } => {
                let lhs_value = eval!(lhs, closure, context);
                let rhs_value = eval!(rhs, closure, context);
                let result = match cmp {
                    Comparator::Equal => compare::equal(&lhs_value, &rhs_value, context)?,
                    Comparator::NotEqual => compare::not_equal(&lhs_value, &rhs_value, context)?,
                    Comparator::Less => compare::less(&lhs_value, &rhs_value, context)?,
                    Comparator::Greater => compare::greater(&lhs_value, &rhs_value, context)?,
                    Comparator::LessOrEqual => {
                        compare::less_or_equal(&lhs_value, &rhs_value, context)?
                    }
                    Comparator::GreaterOrEqual => {
                        compare::greater_or_equal(&lhs_value, &rhs_value, context)?
                    }
                };
                Ok(Flow::Value(ObjectHolder::boolean(result)))
            }

            Statement::Compound { statements } => {
                for statement in statements {
                    eval!(statement, closure, context);
                }
                Ok(Flow::Value(ObjectHolder::none()))
            }

            Statement::Return { statement } => {
                let value = eval!(statement, closure, context);
                Ok(Flow::Return(value))
            }

            Statement::ClassDefinition { class } => {
                let definition = class.as_class().ok_or(RuntimeError::NotAClass {
                    type_name: class.type_name(),
                })?;
                closure.insert(definition.name().to_string(), class.clone());
                Ok(Flow::Value(ObjectHolder::none()))
            }

            Statement::FieldAssignment {
                object,
                field_name,
                rhs,
            } => {
                let target = eval!(object, closure, context);
                let value = eval!(rhs, closure, context);
                target
                    .with_instance_mut(|instance| {
                        instance
                            .fields_mut()
                            .insert(field_name.clone(), value.clone());
                    })
                    .ok_or(RuntimeError::NotAnInstance {
                        type_name: target.type_name(),
                    })?;
                Ok(Flow::Value(value))
            }

            Statement::IfElse {
                condition,
                if_body,
                else_body,
            } => {
                let condition_value = eval!(condition, closure, context);
                if is_true(&condition_value) {
                    if_body.execute(closure, context)
                } else if let Some(else_body) = else_body {
                    else_body.execute(closure, context)
                } else {
                    Ok(Flow::Value(ObjectHolder::none()))
                }
            }

            Statement::MethodBody { body } => match body.execute(closure, context)? {
                Flow::Return(value) => Ok(Flow::Value(value)),
                Flow::Value(_) => Ok(Flow::Value(ObjectHolder::none())),
            },
        }
    }
}

fn lookup_dotted(dotted_ids: &[String], closure: &Closure) -> Result<ObjectHolder, RuntimeError> {
    let (first, rest) = dotted_ids
        .split_first()
        .ok_or(RuntimeError::EmptyVariablePath)?;
    let mut current = closure
        .get(first)
        .cloned()
        .ok_or_else(|| RuntimeError::InvalidArgumentName {
            name: first.clone(),
        })?;
    for name in rest {
        let field = current
            .with_instance(|instance| instance.fields().get(name).cloned())
            .ok_or(RuntimeError::NotAnInstance {
                type_name: current.type_name(),
            })?;
        current = field.ok_or_else(|| RuntimeError::InvalidArgumentName { name: name.clone() })?;
    }
    Ok(current)
}

fn execute_binary_op(
    op: BinaryOperator,
    lhs: &ObjectHolder,
    rhs: &ObjectHolder,
    context: &mut dyn Context,
) -> Result<ObjectHolder, RuntimeError> {
    require_operands(op.name(), lhs, rhs)?;

    if let (Some(left), Some(right)) = (lhs.as_number(), rhs.as_number()) {
        return numeric_op(op, left, right);
    }

    if op == BinaryOperator::Add {
        if let (Some(left), Some(right)) = (lhs.as_string(), rhs.as_string()) {
            return Ok(ObjectHolder::string(left + &right));
        }
        if let Some(receiver) = lhs.instance_ref() {
            let has_add = lhs
                .with_instance(|instance| instance.has_method(ADD_METHOD, 1))
                .unwrap_or(false);
            if has_add {
                return class::call_method(&receiver, ADD_METHOD, vec![rhs.clone()], context);
            }
        }
    }

    Err(RuntimeError::WrongOperandTypes {
        operation: op.name(),
        lhs: lhs.type_name(),
        rhs: rhs.type_name(),
    })
}

fn numeric_op(op: BinaryOperator, lhs: i32, rhs: i32) -> Result<ObjectHolder, RuntimeError> {
    let result = match op {
        BinaryOperator::Add => lhs.checked_add(rhs),
        BinaryOperator::Sub => lhs.checked_sub(rhs),
        BinaryOperator::Mult => lhs.checked_mul(rhs),
        BinaryOperator::Div => {
            if rhs == 0 {
                return Err(RuntimeError::DivisionByZero);
            }
            lhs.checked_div(rhs)
        }
    };
    result
        .map(ObjectHolder::number)
        .ok_or(RuntimeError::IntegerOverflow {
            operation: op.name(),
        })
}

fn require_operands(
    operation: &'static str,
    lhs: &ObjectHolder,
    rhs: &ObjectHolder,
) -> Result<(), RuntimeError> {
    if lhs.is_none() || rhs.is_none() {
        return Err(RuntimeError::NullOperands { operation });
    }
    Ok(())
}

/// Executes a program (its root `Compound`) against a fresh closure,
/// collecting everything it prints into `output`.
pub fn execute_program(program: &Statement, output: &mut String) -> Result<(), RuntimeError> {
    let mut closure = Closure::new();
    let mut context = SimpleContext::new(output);
    match program.execute(&mut closure, &mut context)? {
        Flow::Value(_) => Ok(()),
        Flow::Return(_) => Err(RuntimeError::ReturnOutsideMethod),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::class::Method;

    fn run(program: Statement) -> Result<String, RuntimeError> {
        let mut output = String::new();
        execute_program(&program, &mut output)?;
        Ok(output)
    }

    fn eval_value(statement: &Statement) -> Result<ObjectHolder, RuntimeError> {
        let mut closure = Closure::new();
        let mut context = DummyContext::new();
        match statement.execute(&mut closure, &mut context)? {
            Flow::Value(value) | Flow::Return(value) => Ok(value),
        }
    }

    fn method(name: &str, params: &[&str], statements: Vec<Statement>) -> Method {
        Method {
            name: name.to_string(),
            formal_params: params.iter().map(|param| param.to_string()).collect(),
            body: Rc::new(Statement::MethodBody {
                body: Box::new(Statement::Compound { statements }),
            }),
        }
    }

    fn assign(var: &str, rhs: Statement) -> Statement {
        Statement::Assignment {
            var: var.to_string(),
            rhs: Box::new(rhs),
        }
    }

    fn print(args: Vec<Statement>) -> Statement {
        Statement::Print { args }
    }

    fn binary(op: BinaryOperator, lhs: Statement, rhs: Statement) -> Statement {
        Statement::BinaryOp {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }

    fn compound(statements: Vec<Statement>) -> Statement {
        Statement::Compound { statements }
    }

    #[test]
    fn assignment_binds_in_the_closure() {
        let program = compound(vec![
            assign("x", Statement::number(3)),
            print(vec![Statement::variable("x")]),
        ]);
        assert_eq!(run(program).unwrap(), "3\n");
    }

    #[test]
    fn print_separates_arguments_and_renders_none() {
        let program = print(vec![
            Statement::number(1),
            Statement::string("two"),
            Statement::boolean(false),
            Statement::none(),
        ]);
        assert_eq!(run(program).unwrap(), "1 two False None\n");
    }

    #[test]
    fn empty_print_emits_a_bare_newline() {
        assert_eq!(run(print(Vec::new())).unwrap(), "\n");
    }

    #[test]
    fn print_evaluates_arguments_left_to_right() {
        // The second argument reads the binding created by the first.
        let program = print(vec![
            assign("x", Statement::number(9)),
            Statement::variable("x"),
        ]);
        assert_eq!(run(program).unwrap(), "9 9\n");
    }

    #[test]
    fn arithmetic_covers_all_operators() {
        for (op, expected) in [
            (BinaryOperator::Add, 14),
            (BinaryOperator::Sub, 10),
            (BinaryOperator::Mult, 24),
            (BinaryOperator::Div, 6),
        ] {
            let result =
                eval_value(&binary(op, Statement::number(12), Statement::number(2))).unwrap();
            assert_eq!(result.as_number(), Some(expected));
        }
    }

    #[test]
    fn division_truncates_toward_zero() {
        let result = eval_value(&binary(
            BinaryOperator::Div,
            Statement::number(7),
            Statement::number(2),
        ))
        .unwrap();
        assert_eq!(result.as_number(), Some(3));
    }

    #[test]
    fn division_by_zero_fails() {
        let err = eval_value(&binary(
            BinaryOperator::Div,
            Statement::number(1),
            Statement::number(0),
        ))
        .expect_err("expected division failure");
        assert_eq!(err, RuntimeError::DivisionByZero);
    }

    #[test]
    fn arithmetic_overflow_fails() {
        let err = eval_value(&binary(
            BinaryOperator::Add,
            Statement::number(i32::MAX),
            Statement::number(1),
        ))
        .expect_err("expected overflow failure");
        assert_eq!(err, RuntimeError::IntegerOverflow { operation: "add" });
    }

    #[test]
    fn add_concatenates_strings() {
        let result = eval_value(&binary(
            BinaryOperator::Add,
            Statement::string("a"),
            Statement::string("b"),
        ))
        .unwrap();
        assert_eq!(result.as_string(), Some("ab".to_string()));
    }

    #[test]
    fn sub_rejects_strings() {
        let err = eval_value(&binary(
            BinaryOperator::Sub,
            Statement::string("a"),
            Statement::string("b"),
        ))
        .expect_err("expected type failure");
        assert_eq!(
            err,
            RuntimeError::WrongOperandTypes {
                operation: "sub",
                lhs: "String",
                rhs: "String",
            }
        );
    }

    #[test]
    fn null_operands_fail_for_arithmetic_and_logic() {
        let err = eval_value(&binary(
            BinaryOperator::Add,
            Statement::none(),
            Statement::number(1),
        ))
        .expect_err("expected null operand failure");
        assert_eq!(err, RuntimeError::NullOperands { operation: "add" });

        let err = eval_value(&Statement::Not {
            argument: Box::new(Statement::none()),
        })
        .expect_err("expected null operand failure");
        assert_eq!(err, RuntimeError::NullOperands { operation: "not" });
    }

    #[test]
    fn add_falls_back_to_the_dunder_method() {
        // class Acc:            (hand-built)
        //   def __add__(step):
        //     return self.total + step
        let class = Rc::new(Class::new(
            "Acc",
            vec![method(
                "__add__",
                &["step"],
                vec![Statement::Return {
                    statement: Box::new(binary(
                        BinaryOperator::Add,
                        Statement::VariableValue {
                            dotted_ids: vec!["self".to_string(), "total".to_string()],
                        },
                        Statement::variable("step"),
                    )),
                }],
            )],
            None,
        ));
        let program = compound(vec![
            Statement::class_definition(class.clone()),
            assign("acc", Statement::new_instance(class.clone(), Vec::new())),
            Statement::FieldAssignment {
                object: Box::new(Statement::variable("acc")),
                field_name: "total".to_string(),
                rhs: Box::new(Statement::number(10)),
            },
            print(vec![binary(
                BinaryOperator::Add,
                Statement::variable("acc"),
                Statement::number(4),
            )]),
        ]);
        assert_eq!(run(program).unwrap(), "14\n");
    }

    #[test]
    fn logical_operators_evaluate_both_sides() {
        let mut closure = Closure::new();
        let mut context = DummyContext::new();
        // x = 0 is falsy, yet y = 1 must still execute.
        let statement = Statement::And {
            lhs: Box::new(assign("x", Statement::number(0))),
            rhs: Box::new(assign("y", Statement::number(1))),
        };
        let flow = statement.execute(&mut closure, &mut context).unwrap();
        let Flow::Value(value) = flow else {
            panic!("and must yield a value");
        };
        assert_eq!(value.as_bool(), Some(false));
        assert!(closure.contains_key("y"));

        let statement = Statement::Or {
            lhs: Box::new(assign("a", Statement::number(1))),
            rhs: Box::new(assign("b", Statement::number(2))),
        };
        let flow = statement.execute(&mut closure, &mut context).unwrap();
        let Flow::Value(value) = flow else {
            panic!("or must yield a value");
        };
        assert_eq!(value.as_bool(), Some(true));
        assert!(closure.contains_key("b"));
    }

    #[test]
    fn double_negation_matches_truthiness() {
        for (value, expected) in [
            (Statement::number(0), false),
            (Statement::number(7), true),
            (Statement::string(""), false),
            (Statement::string("x"), true),
            (Statement::boolean(true), true),
        ] {
            let result = eval_value(&Statement::Not {
                argument: Box::new(Statement::Not {
                    argument: Box::new(value),
                }),
            })
            .unwrap();
            assert_eq!(result.as_bool(), Some(expected));
        }
    }

    #[test]
    fn comparison_yields_bool() {
        let result = eval_value(&Statement::Comparison {
            cmp: Comparator::LessOrEqual,
            lhs: Box::new(Statement::number(2)),
            rhs: Box::new(Statement::number(2)),
        })
        .unwrap();
        assert_eq!(result.as_bool(), Some(true));

        let result = eval_value(&Statement::Comparison {
            cmp: Comparator::NotEqual,
            lhs: Box::new(Statement::string("a")),
            rhs: Box::new(Statement::string("b")),
        })
        .unwrap();
        assert_eq!(result.as_bool(), Some(true));
    }

    #[test]
    fn dotted_access_resolves_through_field_maps() {
        let inner = Rc::new(Class::new("Inner", Vec::new(), None));
        let outer = Rc::new(Class::new("Outer", Vec::new(), None));
        let program = compound(vec![
            assign("inner", Statement::new_instance(inner, Vec::new())),
            Statement::FieldAssignment {
                object: Box::new(Statement::variable("inner")),
                field_name: "value".to_string(),
                rhs: Box::new(Statement::number(11)),
            },
            assign("outer", Statement::new_instance(outer, Vec::new())),
            Statement::FieldAssignment {
                object: Box::new(Statement::variable("outer")),
                field_name: "inner".to_string(),
                rhs: Box::new(Statement::variable("inner")),
            },
            print(vec![Statement::VariableValue {
                dotted_ids: vec![
                    "outer".to_string(),
                    "inner".to_string(),
                    "value".to_string(),
                ],
            }]),
        ]);
        assert_eq!(run(program).unwrap(), "11\n");
    }

    #[test]
    fn missing_names_fail_resolution() {
        let err = run(print(vec![Statement::variable("missing")]))
            .expect_err("expected name resolution failure");
        assert_eq!(
            err,
            RuntimeError::InvalidArgumentName {
                name: "missing".to_string()
            }
        );

        let err = eval_value(&Statement::VariableValue {
            dotted_ids: Vec::new(),
        })
        .expect_err("expected empty path failure");
        assert_eq!(err, RuntimeError::EmptyVariablePath);
    }

    #[test]
    fn dotted_access_requires_instances_along_the_chain() {
        let program = compound(vec![
            assign("x", Statement::number(1)),
            print(vec![Statement::VariableValue {
                dotted_ids: vec!["x".to_string(), "field".to_string()],
            }]),
        ]);
        let err = run(program).expect_err("expected instance failure");
        assert_eq!(err, RuntimeError::NotAnInstance { type_name: "Number" });
    }

    #[test]
    fn class_definition_binds_the_class_name() {
        let class = Rc::new(Class::new("Widget", Vec::new(), None));
        let program = compound(vec![
            Statement::class_definition(class),
            print(vec![Statement::variable("Widget")]),
        ]);
        assert_eq!(run(program).unwrap(), "Class Widget\n");
    }

    #[test]
    fn new_instance_dispatches_matching_init() {
        // class P:
        //   def __init__(v):
        //     self.v = v
        let class = Rc::new(Class::new(
            "P",
            vec![method(
                "__init__",
                &["v"],
                vec![Statement::FieldAssignment {
                    object: Box::new(Statement::variable("self")),
                    field_name: "v".to_string(),
                    rhs: Box::new(Statement::variable("v")),
                }],
            )],
            None,
        ));
        let program = compound(vec![
            assign(
                "p",
                Statement::new_instance(class.clone(), vec![Statement::number(10)]),
            ),
            print(vec![Statement::VariableValue {
                dotted_ids: vec!["p".to_string(), "v".to_string()],
            }]),
        ]);
        assert_eq!(run(program).unwrap(), "10\n");

        // Arity mismatch skips __init__ entirely.
        let program = compound(vec![
            assign("p", Statement::new_instance(class, Vec::new())),
            print(vec![Statement::variable("p")]),
        ]);
        assert_eq!(run(program).unwrap(), "<P object>\n");
    }

    #[test]
    fn method_calls_mutate_through_shared_self() {
        // class Counter:
        //   def bump():
        //     self.count = self.count + 1
        let class = Rc::new(Class::new(
            "Counter",
            vec![
                method(
                    "__init__",
                    &[],
                    vec![Statement::FieldAssignment {
                        object: Box::new(Statement::variable("self")),
                        field_name: "count".to_string(),
                        rhs: Box::new(Statement::number(0)),
                    }],
                ),
                method(
                    "bump",
                    &[],
                    vec![Statement::FieldAssignment {
                        object: Box::new(Statement::variable("self")),
                        field_name: "count".to_string(),
                        rhs: Box::new(binary(
                            BinaryOperator::Add,
                            Statement::VariableValue {
                                dotted_ids: vec!["self".to_string(), "count".to_string()],
                            },
                            Statement::number(1),
                        )),
                    }],
                ),
            ],
            None,
        ));
        let bump = || Statement::MethodCall {
            object: Box::new(Statement::variable("c")),
            method: "bump".to_string(),
            args: Vec::new(),
        };
        let program = compound(vec![
            assign("c", Statement::new_instance(class, Vec::new())),
            bump(),
            bump(),
            print(vec![Statement::VariableValue {
                dotted_ids: vec!["c".to_string(), "count".to_string()],
            }]),
        ]);
        assert_eq!(run(program).unwrap(), "2\n");
    }

    #[test]
    fn method_call_on_none_receiver_yields_none() {
        let program = print(vec![Statement::MethodCall {
            object: Box::new(Statement::none()),
            method: "anything".to_string(),
            args: Vec::new(),
        }]);
        assert_eq!(run(program).unwrap(), "None\n");
    }

    #[test]
    fn method_call_on_plain_value_fails() {
        let statement = Statement::MethodCall {
            object: Box::new(Statement::number(1)),
            method: "f".to_string(),
            args: Vec::new(),
        };
        let err = eval_value(&statement).expect_err("expected instance failure");
        assert_eq!(err, RuntimeError::NotAnInstance { type_name: "Number" });
    }

    #[test]
    fn return_unwinds_to_the_enclosing_method_body() {
        // def pick():
        //   if True:
        //     return 42
        //   return 0
        let class = Rc::new(Class::new(
            "C",
            vec![method(
                "pick",
                &[],
                vec![
                    Statement::IfElse {
                        condition: Box::new(Statement::boolean(true)),
                        if_body: Box::new(compound(vec![Statement::Return {
                            statement: Box::new(Statement::number(42)),
                        }])),
                        else_body: None,
                    },
                    Statement::Return {
                        statement: Box::new(Statement::number(0)),
                    },
                ],
            )],
            None,
        ));
        let program = print(vec![Statement::MethodCall {
            object: Box::new(Statement::new_instance(class, Vec::new())),
            method: "pick".to_string(),
            args: Vec::new(),
        }]);
        assert_eq!(run(program).unwrap(), "42\n");
    }

    #[test]
    fn side_effects_before_return_stay_visible() {
        // def stamp():
        //   self.mark = 1
        //   return 5
        //   self.mark = 2     (unreachable)
        let class = Rc::new(Class::new(
            "C",
            vec![method(
                "stamp",
                &[],
                vec![
                    Statement::FieldAssignment {
                        object: Box::new(Statement::variable("self")),
                        field_name: "mark".to_string(),
                        rhs: Box::new(Statement::number(1)),
                    },
                    Statement::Return {
                        statement: Box::new(Statement::number(5)),
                    },
                    Statement::FieldAssignment {
                        object: Box::new(Statement::variable("self")),
                        field_name: "mark".to_string(),
                        rhs: Box::new(Statement::number(2)),
                    },
                ],
            )],
            None,
        ));
        let program = compound(vec![
            assign("c", Statement::new_instance(class, Vec::new())),
            print(vec![Statement::MethodCall {
                object: Box::new(Statement::variable("c")),
                method: "stamp".to_string(),
                args: Vec::new(),
            }]),
            print(vec![Statement::VariableValue {
                dotted_ids: vec!["c".to_string(), "mark".to_string()],
            }]),
        ]);
        assert_eq!(run(program).unwrap(), "5\n1\n");
    }

    #[test]
    fn top_level_return_is_rejected() {
        let program = compound(vec![Statement::Return {
            statement: Box::new(Statement::number(1)),
        }]);
        let err = run(program).expect_err("expected top-level return failure");
        assert_eq!(err, RuntimeError::ReturnOutsideMethod);
    }

    #[test]
    fn compound_aborts_on_the_first_failure() {
        let program = compound(vec![
            assign("x", Statement::number(1)),
            print(vec![Statement::variable("missing")]),
            assign("y", Statement::number(2)),
        ]);
        let err = run(program).expect_err("expected failure");
        assert_eq!(
            err,
            RuntimeError::InvalidArgumentName {
                name: "missing".to_string()
            }
        );
    }

    #[test]
    fn stringify_round_trips_with_print() {
        let subjects = [
            Statement::number(17),
            Statement::string("txt"),
            Statement::boolean(false),
            Statement::none(),
        ];
        for subject in subjects {
            let direct = run(print(vec![clone_constant(&subject)])).unwrap();
            let via_str = run(print(vec![Statement::Stringify {
                argument: Box::new(subject),
            }]))
            .unwrap();
            assert_eq!(direct, via_str);
        }
    }

    fn clone_constant(statement: &Statement) -> Statement {
        match statement {
            Statement::Constant { value } => Statement::Constant {
                value: value.clone(),
            },
            _ => panic!("helper only clones constants"),
        }
    }

    #[test]
    fn stringify_dispatches_str_into_a_buffer() {
        // class Tagged:
        //   def __str__():
        //     return "tag"
        let class = Rc::new(Class::new(
            "Tagged",
            vec![method(
                "__str__",
                &[],
                vec![Statement::Return {
                    statement: Box::new(Statement::string("tag")),
                }],
            )],
            None,
        ));
        let program = print(vec![Statement::Stringify {
            argument: Box::new(Statement::new_instance(class, Vec::new())),
        }]);
        assert_eq!(run(program).unwrap(), "tag\n");
    }

    #[test]
    fn if_else_follows_truthiness() {
        let branch = |condition| {
            compound(vec![Statement::IfElse {
                condition: Box::new(condition),
                if_body: Box::new(print(vec![Statement::string("then")])),
                else_body: Some(Box::new(print(vec![Statement::string("else")]))),
            }])
        };
        assert_eq!(run(branch(Statement::number(3))).unwrap(), "then\n");
        assert_eq!(run(branch(Statement::string(""))).unwrap(), "else\n");
        assert_eq!(run(branch(Statement::none())).unwrap(), "else\n");

        let without_else = Statement::IfElse {
            condition: Box::new(Statement::boolean(false)),
            if_body: Box::new(print(vec![Statement::string("then")])),
            else_body: None,
        };
        assert_eq!(run(compound(vec![without_else])).unwrap(), "");
    }

    #[test]
    fn instantiation_site_shares_one_instance() {
        // Executing the same NewInstance node twice hands out the same
        // storage; the second __init__ call re-runs on it.
        let class = Rc::new(Class::new("C", Vec::new(), None));
        let site = Statement::new_instance(class, Vec::new());
        let first = eval_value(&site).unwrap();
        let second = eval_value(&site).unwrap();
        let (Some(first_ref), Some(second_ref)) = (first.instance_ref(), second.instance_ref())
        else {
            panic!("instantiation must yield instances");
        };
        assert!(Rc::ptr_eq(&first_ref, &second_ref));
    }

    #[test]
    fn field_cycles_do_not_break_printing() {
        let class = Rc::new(Class::new("Node", Vec::new(), None));
        let program = compound(vec![
            assign("n", Statement::new_instance(class, Vec::new())),
            Statement::FieldAssignment {
                object: Box::new(Statement::variable("n")),
                field_name: "next".to_string(),
                rhs: Box::new(Statement::variable("n")),
            },
            print(vec![Statement::VariableValue {
                dotted_ids: vec!["n".to_string(), "next".to_string(), "next".to_string()],
            }]),
        ]);
        assert_eq!(run(program).unwrap(), "<Node object>\n");
    }
}
