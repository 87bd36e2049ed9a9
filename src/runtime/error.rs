use thiserror::Error;

/// Errors produced while evaluating the statement tree.
///
/// All of these are fatal to the current evaluation: they propagate through
/// every statement, past method bodies, and out of the top-level call.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RuntimeError {
    #[error("Invalid argument name '{name}'")]
    InvalidArgumentName { name: String },
    #[error("No arguments specified for a variable access")]
    EmptyVariablePath,
    #[error("Expected a class instance, got {type_name}")]
    NotAnInstance { type_name: &'static str },
    #[error("Expected a class definition, got {type_name}")]
    NotAClass { type_name: &'static str },
    #[error("Not implemented: method '{method}' with {arity} argument(s) on class '{class}'")]
    MethodNotImplemented {
        method: String,
        arity: usize,
        class: String,
    },
    #[error("Wrong operand types for {operation}: {lhs} and {rhs}")]
    WrongOperandTypes {
        operation: &'static str,
        lhs: &'static str,
        rhs: &'static str,
    },
    #[error("Null operands are not supported for {operation}")]
    NullOperands { operation: &'static str },
    #[error("Division by zero")]
    DivisionByZero,
    #[error("Integer overflow in {operation}")]
    IntegerOverflow { operation: &'static str },
    #[error("Cannot compare {lhs} and {rhs} for {relation}")]
    NotComparable {
        relation: &'static str,
        lhs: &'static str,
        rhs: &'static str,
    },
    #[error("Comparison method '{method}' must produce a Bool")]
    NonBoolComparison { method: &'static str },
    #[error("Return outside of a method body")]
    ReturnOutsideMethod,
}
