//! ORM-style lookups (`field__suffix=value`) and their clause translation.
//!
//! # Invariants
//! - Unsupported suffixes fail at parse time, for any value.
//! - Every supported suffix maps to exactly one clause shape.

use super::clause::{Clause, RangeBound};
use crate::error::{CoreError, CoreResult};
use serde_json::Value;

/// Suffixes with no search-engine translation.
pub const UNSUPPORTED_LOOKUPS: &[&str] = &[
    "iexact",
    "contains",
    "icontains",
    "istartswith",
    "endswith",
    "iendswith",
    "year",
    "month",
    "day",
    "hour",
    "minute",
    "second",
    "search",
    "iregex",
];

const LOOKUP_SEPARATOR: &str = "__";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupOp {
    Exact,
    Gt,
    Gte,
    Lt,
    Lte,
    In,
    StartsWith,
    Range,
    IsNull,
    Regex,
}

impl LookupOp {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Exact => "exact",
            Self::Gt => "gt",
            Self::Gte => "gte",
            Self::Lt => "lt",
            Self::Lte => "lte",
            Self::In => "in",
            Self::StartsWith => "startswith",
            Self::Range => "range",
            Self::IsNull => "isnull",
            Self::Regex => "regex",
        }
    }

    fn parse(suffix: &str) -> Option<Self> {
        match suffix {
            "exact" => Some(Self::Exact),
            "gt" => Some(Self::Gt),
            "gte" => Some(Self::Gte),
            "lt" => Some(Self::Lt),
            "lte" => Some(Self::Lte),
            "in" => Some(Self::In),
            "startswith" => Some(Self::StartsWith),
            "range" => Some(Self::Range),
            "isnull" => Some(Self::IsNull),
            "regex" => Some(Self::Regex),
            _ => None,
        }
    }
}

/// One parsed lookup. `field` uses dotted paths (`owner__id` becomes `owner.id`).
#[derive(Debug, Clone, PartialEq)]
pub struct Lookup {
    pub field: String,
    pub op: LookupOp,
    pub value: Value,
}

impl Lookup {
    /// Parses `key` (`field[__relation]*[__suffix]`) and validates `value`.
    pub fn parse(key: &str, value: Value) -> CoreResult<Self> {
        let mut parts = key.split(LOOKUP_SEPARATOR).collect::<Vec<_>>();
        let mut op = LookupOp::Exact;
        if parts.len() > 1 {
            let suffix = parts[parts.len() - 1];
            if let Some(parsed) = LookupOp::parse(suffix) {
                op = parsed;
                parts.pop();
            } else if UNSUPPORTED_LOOKUPS.contains(&suffix) {
                parts.pop();
                return Err(CoreError::UnsupportedLookup {
                    field: parts.join("."),
                    lookup: suffix.to_string(),
                });
            }
        }

        let field = parts.join(".");
        if parts.iter().any(|part| part.trim().is_empty()) {
            return Err(invalid(key, op, "field name must not be empty"));
        }

        validate_value(&field, op, &value)?;
        Ok(Self { field, op, value })
    }

    /// Translates the lookup into its search-engine clause.
    pub fn to_clause(&self) -> Clause {
        let field = self.field.clone();
        match self.op {
            // `field=None` means "has no value", as `isnull=True` does.
            LookupOp::Exact if self.value.is_null() => Clause::Exists { field }.negate(),
            LookupOp::Exact => Clause::Term {
                field,
                value: self.value.clone(),
            },
            LookupOp::Gt => Clause::range(field, [(RangeBound::Gt, self.value.clone())]),
            LookupOp::Gte => Clause::range(field, [(RangeBound::Gte, self.value.clone())]),
            LookupOp::Lt => Clause::range(field, [(RangeBound::Lt, self.value.clone())]),
            LookupOp::Lte => Clause::range(field, [(RangeBound::Lte, self.value.clone())]),
            LookupOp::In => Clause::Terms {
                field,
                values: self.value.as_array().cloned().unwrap_or_default(),
            },
            LookupOp::StartsWith => Clause::Prefix {
                field,
                value: self.value.clone(),
            },
            LookupOp::Range => {
                let bounds = self.value.as_array().cloned().unwrap_or_default();
                let lower = bounds.first().cloned().unwrap_or(Value::Null);
                let upper = bounds.get(1).cloned().unwrap_or(Value::Null);
                Clause::range(field, [(RangeBound::Gte, lower), (RangeBound::Lte, upper)])
            }
            LookupOp::IsNull => {
                let exists = Clause::Exists { field };
                if self.value.as_bool().unwrap_or(false) {
                    exists.negate()
                } else {
                    exists
                }
            }
            LookupOp::Regex => Clause::Regexp {
                field,
                value: self.value.clone(),
            },
        }
    }
}

fn validate_value(field: &str, op: LookupOp, value: &Value) -> CoreResult<()> {
    match op {
        LookupOp::Exact => Ok(()),
        LookupOp::Gt | LookupOp::Gte | LookupOp::Lt | LookupOp::Lte => match value {
            Value::Number(_) | Value::String(_) => Ok(()),
            _ => Err(invalid(field, op, "expected a number or string")),
        },
        LookupOp::In => match value {
            Value::Array(_) => Ok(()),
            _ => Err(invalid(field, op, "expected a list of values")),
        },
        LookupOp::Range => match value {
            Value::Array(bounds) if bounds.len() == 2 => Ok(()),
            _ => Err(invalid(field, op, "expected a [lower, upper] pair")),
        },
        LookupOp::IsNull => match value {
            Value::Bool(_) => Ok(()),
            _ => Err(invalid(field, op, "expected true or false")),
        },
        LookupOp::StartsWith | LookupOp::Regex => match value {
            Value::String(_) => Ok(()),
            _ => Err(invalid(field, op, "expected a string")),
        },
    }
}

fn invalid(field: &str, op: LookupOp, message: &str) -> CoreError {
    CoreError::InvalidLookupValue {
        field: field.to_string(),
        lookup: op.as_str().to_string(),
        message: message.to_string(),
    }
}
