//! Request checks: turn query-string values into policy rules.

use std::collections::HashMap;

use serde::Deserialize;

use ledgergate_core::error::{LedgerGateError, Result};

use super::rules::{BoolCondition, IntCondition, PolicyRule, StringCondition};
use crate::config::schema::CheckConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoolCheck {
    Equal,
    NotEqual,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntCheck {
    LessThan,
    LessOrEqual,
    GreaterThan,
    GreaterOrEqual,
    EqualTo,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StringCheck {
    Contains,
    IsContainedIn,
    DoesNotContain,
    IsNotContainedIn,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListCheck {
    AllContainedIn,
}

/// Build the rule for `check` from the request's query parameters.
pub fn build_rule(check: &CheckConfig, query: &HashMap<String, String>) -> Result<PolicyRule> {
    let raw = query
        .get(&check.query)
        .ok_or_else(|| LedgerGateError::BadRequest(format!("missing query parameter '{}'", check.query)))?;
    let invalid = |want: &str| {
        LedgerGateError::BadRequest(format!("query parameter '{}' must be {want}", check.query))
    };
    let param = check.policy_param();

    if let Some(kind) = check.bool {
        let requested = if raw.eq_ignore_ascii_case("true") {
            true
        } else if raw.eq_ignore_ascii_case("false") {
            false
        } else {
            return Err(invalid("a boolean"));
        };
        let condition = match kind {
            BoolCheck::Equal => BoolCondition::Equal(requested),
            BoolCheck::NotEqual => BoolCondition::NotEqual(requested),
        };
        return Ok(PolicyRule::bool(param, condition));
    }

    if let Some(kind) = check.int {
        let requested: i64 = raw.trim().parse().map_err(|_| invalid("an integer"))?;
        let condition = match kind {
            IntCheck::LessThan => IntCondition::LessThan(requested),
            IntCheck::LessOrEqual => IntCondition::LessOrEqual(requested),
            IntCheck::GreaterThan => IntCondition::GreaterThan(requested),
            IntCheck::GreaterOrEqual => IntCondition::GreaterOrEqual(requested),
            IntCheck::EqualTo => IntCondition::EqualTo(requested),
        };
        return Ok(PolicyRule::int(param, condition));
    }

    if let Some(kind) = check.string {
        let requested = raw.clone();
        let condition = match kind {
            StringCheck::Contains => StringCondition::Contains(requested),
            StringCheck::IsContainedIn => StringCondition::IsContainedIn(requested),
            StringCheck::DoesNotContain => StringCondition::DoesNotContain(requested),
            StringCheck::IsNotContainedIn => StringCondition::IsNotContainedIn(requested),
        };
        return Ok(PolicyRule::string(param, condition));
    }

    match check.list {
        Some(ListCheck::AllContainedIn) => {
            let items = raw.split(',').map(str::to_string).collect();
            Ok(PolicyRule::string(param, StringCondition::AllContainedIn(items)))
        }
        // Config validation guarantees one kind is set.
        None => Err(LedgerGateError::Internal(format!(
            "check on '{}' has no condition",
            check.query
        ))),
    }
}

/// Rules for every check of a resource, in configuration order.
pub fn build_rules(checks: &[CheckConfig], query: &HashMap<String, String>) -> Result<Vec<PolicyRule>> {
    checks.iter().map(|c| build_rule(c, query)).collect()
}
