//! Typed policy rules.
//!
//! A rule pairs a policy parameter name with a predicate over that
//! parameter's value. Comparisons read as `requested OP policy`: the value
//! carried by the rule is what the caller asked for, the argument to
//! `holds` is what the policy allows.

/// A named-parameter predicate checked against a resolved policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyRule {
    pub parameter: String,
    pub condition: RuleCondition,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleCondition {
    Bool(BoolCondition),
    Int(IntCondition),
    Str(StringCondition),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoolCondition {
    Equal(bool),
    NotEqual(bool),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntCondition {
    LessThan(i64),
    LessOrEqual(i64),
    GreaterThan(i64),
    GreaterOrEqual(i64),
    EqualTo(i64),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StringCondition {
    /// Requested value contains the policy value.
    Contains(String),
    /// Policy value contains the requested value.
    IsContainedIn(String),
    DoesNotContain(String),
    IsNotContainedIn(String),
    /// Every requested item appears in the policy's comma-separated list.
    AllContainedIn(Vec<String>),
    /// A single item appears in the policy's comma-separated list.
    ContainsItem(String),
}

impl PolicyRule {
    pub fn bool(parameter: impl Into<String>, condition: BoolCondition) -> Self {
        Self {
            parameter: parameter.into(),
            condition: RuleCondition::Bool(condition),
        }
    }

    pub fn int(parameter: impl Into<String>, condition: IntCondition) -> Self {
        Self {
            parameter: parameter.into(),
            condition: RuleCondition::Int(condition),
        }
    }

    pub fn string(parameter: impl Into<String>, condition: StringCondition) -> Self {
        Self {
            parameter: parameter.into(),
            condition: RuleCondition::Str(condition),
        }
    }
}

impl BoolCondition {
    pub fn holds(&self, policy: bool) -> bool {
        match *self {
            Self::Equal(requested) => requested == policy,
            Self::NotEqual(requested) => requested != policy,
        }
    }
}

impl IntCondition {
    pub fn holds(&self, policy: i64) -> bool {
        match *self {
            Self::LessThan(requested) => requested < policy,
            Self::LessOrEqual(requested) => requested <= policy,
            Self::GreaterThan(requested) => requested > policy,
            Self::GreaterOrEqual(requested) => requested >= policy,
            Self::EqualTo(requested) => requested == policy,
        }
    }
}

impl StringCondition {
    pub fn holds(&self, policy: &str) -> bool {
        match self {
            Self::Contains(requested) => requested.contains(policy),
            Self::IsContainedIn(requested) => policy.contains(requested.as_str()),
            Self::DoesNotContain(requested) => !requested.contains(policy),
            Self::IsNotContainedIn(requested) => !policy.contains(requested.as_str()),
            Self::AllContainedIn(requested) => {
                requested.iter().all(|item| list_contains(policy, item))
            }
            Self::ContainsItem(item) => list_contains(policy, item),
        }
    }
}

fn list_contains(list: &str, item: &str) -> bool {
    list.split(',').any(|allowed| allowed == item)
}
