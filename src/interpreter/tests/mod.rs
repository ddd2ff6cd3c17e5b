//! Tests for the interpreter
//!
//! Organized by component, bottom-up

mod helpers;

mod command_tests;
mod evaluator_tests;
mod resolver_tests;
mod risk_tests;
