//! Rule evaluation over a policy value source.

use async_trait::async_trait;

use ledgergate_core::error::{LedgerGateError, Result};

use super::rules::{PolicyRule, RuleCondition};

/// Where rule parameters are read from: an off-chain document or an OCP.
#[async_trait]
pub trait ValueSource: Send + Sync {
    async fn bool_value(&self, name: &str) -> Result<bool>;
    async fn int_value(&self, name: &str) -> Result<i64>;
    async fn string_value(&self, name: &str) -> Result<String>;
}

/// Evaluate one rule. A value that cannot be read counts as not respected.
pub async fn evaluate(rule: &PolicyRule, source: &dyn ValueSource) -> bool {
    let name = rule.parameter.as_str();
    let outcome = match &rule.condition {
        RuleCondition::Bool(c) => source.bool_value(name).await.map(|v| c.holds(v)),
        RuleCondition::Int(c) => source.int_value(name).await.map(|v| c.holds(v)),
        RuleCondition::Str(c) => source.string_value(name).await.map(|v| c.holds(&v)),
    };

    match outcome {
        Ok(respected) => respected,
        Err(e) => {
            tracing::debug!(parameter = name, error = %e, "policy value unavailable");
            false
        }
    }
}

/// Evaluate `rules` in order, failing on the first one not respected.
pub async fn check_rules(resource: &str, rules: &[PolicyRule], source: &dyn ValueSource) -> Result<()> {
    for rule in rules {
        if !evaluate(rule, source).await {
            return Err(LedgerGateError::PolicyRuleViolation {
                resource: resource.to_string(),
                parameter: rule.parameter.clone(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::policy::rules::{BoolCondition, IntCondition, StringCondition};

    struct Fixed(HashMap<&'static str, serde_json::Value>);

    impl Fixed {
        fn get(&self, name: &str) -> Result<&serde_json::Value> {
            self.0
                .get(name)
                .ok_or_else(|| LedgerGateError::Internal(format!("no {name}")))
        }
    }

    #[async_trait]
    impl ValueSource for Fixed {
        async fn bool_value(&self, name: &str) -> Result<bool> {
            self.get(name)?
                .as_bool()
                .ok_or_else(|| LedgerGateError::Internal("not a bool".into()))
        }
        async fn int_value(&self, name: &str) -> Result<i64> {
            self.get(name)?
                .as_i64()
                .ok_or_else(|| LedgerGateError::Internal("not an int".into()))
        }
        async fn string_value(&self, name: &str) -> Result<String> {
            self.get(name)?
                .as_str()
                .map(str::to_string)
                .ok_or_else(|| LedgerGateError::Internal("not a string".into()))
        }
    }

    fn source() -> Fixed {
        Fixed(HashMap::from([
            ("max_items", serde_json::json!(10)),
            ("devices", serde_json::json!("dev1,dev2")),
            ("raw", serde_json::json!(true)),
        ]))
    }

    #[tokio::test]
    async fn missing_or_mistyped_values_fail_closed() {
        let src = source();
        assert!(!evaluate(&PolicyRule::int("absent", IntCondition::LessThan(0)), &src).await);
        assert!(!evaluate(&PolicyRule::bool("max_items", BoolCondition::Equal(true)), &src).await);
        assert!(evaluate(&PolicyRule::bool("raw", BoolCondition::Equal(true)), &src).await);
    }

    #[tokio::test]
    async fn first_violation_is_reported() {
        let src = source();
        let rules = [
            PolicyRule::string("devices", StringCondition::ContainsItem("dev1".into())),
            PolicyRule::int("max_items", IntCondition::LessOrEqual(11)),
            PolicyRule::bool("raw", BoolCondition::Equal(false)),
        ];
        assert_eq!(
            check_rules("temperature", &rules, &src).await,
            Err(LedgerGateError::PolicyRuleViolation {
                resource: "temperature".into(),
                parameter: "max_items".into(),
            })
        );
        assert!(check_rules("temperature", &rules[..1], &src).await.is_ok());
    }
}
