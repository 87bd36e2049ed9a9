//! Runtime object model shared by the statement evaluator.
//!
//! Backend-agnostic pieces: the polymorphic value (`value`), classes and
//! method dispatch (`class`), comparison semantics (`compare`), execution
//! contexts and scopes (`execution`), and typed errors (`error`).
pub mod class;
pub mod compare;
pub mod error;
pub mod execution;
pub mod value;
