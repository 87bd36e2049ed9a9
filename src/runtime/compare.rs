use crate::runtime::class::{EQ_METHOD, LT_METHOD, call_method};
use crate::runtime::error::RuntimeError;
use crate::runtime::execution::Context;
use crate::runtime::value::ObjectHolder;

/// Value equality. `Number`, `String`, and `Bool` compare by value, two
/// `None` values are equal, and a class instance may define `__eq__`.
pub fn equal(
    lhs: &ObjectHolder,
    rhs: &ObjectHolder,
    context: &mut dyn Context,
) -> Result<bool, RuntimeError> {
    if let (Some(left), Some(right)) = (lhs.as_number(), rhs.as_number()) {
        return Ok(left == right);
    }
    if let (Some(left), Some(right)) = (lhs.as_string(), rhs.as_string()) {
        return Ok(left == right);
    }
    if let (Some(left), Some(right)) = (lhs.as_bool(), rhs.as_bool()) {
        return Ok(left == right);
    }
    if lhs.is_none() && rhs.is_none() {
        return Ok(true);
    }
    if let Some(result) = dispatch(lhs, rhs, EQ_METHOD, context)? {
        return Ok(result);
    }
    Err(RuntimeError::NotComparable {
        relation: "equality",
        lhs: lhs.type_name(),
        rhs: rhs.type_name(),
    })
}

/// Natural ordering. Defined for `Number`, `String`, and `Bool` pairs;
/// a class instance may define `__lt__`.
pub fn less(
    lhs: &ObjectHolder,
    rhs: &ObjectHolder,
    context: &mut dyn Context,
) -> Result<bool, RuntimeError> {
    if let (Some(left), Some(right)) = (lhs.as_number(), rhs.as_number()) {
        return Ok(left < right);
    }
    if let (Some(left), Some(right)) = (lhs.as_string(), rhs.as_string()) {
        return Ok(left < right);
    }
    if let (Some(left), Some(right)) = (lhs.as_bool(), rhs.as_bool()) {
        return Ok(!left && right);
    }
    if let Some(result) = dispatch(lhs, rhs, LT_METHOD, context)? {
        return Ok(result);
    }
    Err(RuntimeError::NotComparable {
        relation: "less",
        lhs: lhs.type_name(),
        rhs: rhs.type_name(),
    })
}

pub fn not_equal(
    lhs: &ObjectHolder,
    rhs: &ObjectHolder,
    context: &mut dyn Context,
) -> Result<bool, RuntimeError> {
    Ok(!equal(lhs, rhs, context)?)
}

pub fn greater(
    lhs: &ObjectHolder,
    rhs: &ObjectHolder,
    context: &mut dyn Context,
) -> Result<bool, RuntimeError> {
    Ok(!less(lhs, rhs, context)? && !equal(lhs, rhs, context)?)
}

pub fn less_or_equal(
    lhs: &ObjectHolder,
    rhs: &ObjectHolder,
    context: &mut dyn Context,
) -> Result<bool, RuntimeError> {
    Ok(!greater(lhs, rhs, context)?)
}

pub fn greater_or_equal(
    lhs: &ObjectHolder,
    rhs: &ObjectHolder,
    context: &mut dyn Context,
) -> Result<bool, RuntimeError> {
    Ok(!less(lhs, rhs, context)?)
}

/// Arity-1 dunder dispatch on the left operand. `Ok(None)` means the
/// operand is not an instance or has no matching method.
fn dispatch(
    lhs: &ObjectHolder,
    rhs: &ObjectHolder,
    method: &'static str,
    context: &mut dyn Context,
) -> Result<Option<bool>, RuntimeError> {
    let Some(receiver) = lhs.instance_ref() else {
        return Ok(None);
    };
    let has_method = lhs
        .with_instance(|instance| instance.has_method(method, 1))
        .unwrap_or(false);
    if !has_method {
        return Ok(None);
    }
    let result = call_method(&receiver, method, vec![rhs.clone()], context)?;
    match result.as_bool() {
        Some(value) => Ok(Some(value)),
        None => Err(RuntimeError::NonBoolComparison { method }),
    }
}
