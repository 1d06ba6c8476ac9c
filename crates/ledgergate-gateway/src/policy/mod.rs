//! Policy layer: typed rules, their evaluation, and resolution of the
//! policy governing a (contract, resource) pair.

pub mod checks;
pub mod document;
pub mod evaluator;
pub mod resolver;
pub mod rules;

pub use evaluator::{check_rules, evaluate, ValueSource};
pub use resolver::PolicyResolver;
pub use rules::{BoolCondition, IntCondition, PolicyRule, RuleCondition, StringCondition};
