//! Resource filters.
//!
//! A filter is written `Type=<type>;Name=<attribute path>;Value=<regex>`,
//! optionally followed by `;Operator=SubString|ExactMatch` (default
//! `ExactMatch`). Keys are case-insensitive. Filters of the same type are
//! combined with `AND` or `OR`; a type without filters keeps every resource.

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use crate::body::values_at;
use crate::error::ConfigError;

/// How filters of one type are combined.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FilterOperator {
    /// Every filter must match.
    And,
    /// At least one filter must match.
    #[default]
    Or,
}

impl FromStr for FilterOperator {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "and" => Ok(Self::And),
            "or" => Ok(Self::Or),
            other => Err(ConfigError::validation(
                format!("unknown filter operator '{other}', expected AND or OR"),
                "filter_operator",
            )),
        }
    }
}

impl fmt::Display for FilterOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::And => write!(f, "AND"),
            Self::Or => write!(f, "OR"),
        }
    }
}

/// How a filter value is compared with attribute values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchMode {
    /// The pattern must match the whole value.
    ExactMatch,
    /// The pattern may match anywhere in the value.
    SubString,
}

/// One parsed filter expression.
#[derive(Debug, Clone)]
pub struct Filter {
    /// Resource type the filter applies to.
    pub resource_type: String,
    /// Dotted attribute path.
    pub attribute: String,
    /// Compiled value pattern.
    pattern: Regex,
    /// Comparison mode.
    pub mode: MatchMode,
}

impl Filter {
    /// Parses a filter expression.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidFilter`] if a key is missing or unknown,
    /// or if the value is not a valid regular expression.
    pub fn parse(expression: &str) -> Result<Self, ConfigError> {
        let invalid = |message: String| ConfigError::InvalidFilter {
            expression: expression.to_string(),
            message,
        };

        let mut resource_type = None;
        let mut attribute = None;
        let mut value = None;
        let mut mode = MatchMode::ExactMatch;

        for part in expression.split(';').filter(|p| !p.trim().is_empty()) {
            let (key, val) = part
                .split_once('=')
                .ok_or_else(|| invalid(format!("'{part}' is not a key=value pair")))?;

            match key.trim().to_ascii_lowercase().as_str() {
                "type" => resource_type = Some(val.trim().to_ascii_lowercase()),
                "name" => attribute = Some(val.trim().to_string()),
                "value" => value = Some(val.to_string()),
                "operator" => {
                    mode = match val.trim().to_ascii_lowercase().as_str() {
                        "substring" => MatchMode::SubString,
                        "exactmatch" => MatchMode::ExactMatch,
                        other => return Err(invalid(format!("unknown operator '{other}'"))),
                    };
                }
                other => return Err(invalid(format!("unknown key '{other}'"))),
            }
        }

        let resource_type = resource_type.ok_or_else(|| invalid("missing Type".to_string()))?;
        let attribute = attribute.ok_or_else(|| invalid("missing Name".to_string()))?;
        let value = value.ok_or_else(|| invalid("missing Value".to_string()))?;

        let source = match mode {
            MatchMode::ExactMatch => format!("^(?:{value})$"),
            MatchMode::SubString => value,
        };
        let pattern = Regex::new(&source).map_err(|e| invalid(e.to_string()))?;

        Ok(Self {
            resource_type,
            attribute,
            pattern,
            mode,
        })
    }

    /// Returns true if any value at the attribute path matches.
    #[must_use]
    pub fn matches(&self, body: &Value) -> bool {
        values_at(body, &self.attribute)
            .into_iter()
            .flat_map(|v| match v {
                Value::Array(items) => items.iter().collect::<Vec<_>>(),
                other => vec![other],
            })
            .filter_map(|v| match v {
                Value::String(s) => Some(s.clone()),
                Value::Number(n) => Some(n.to_string()),
                Value::Bool(b) => Some(b.to_string()),
                _ => None,
            })
            .any(|s| self.pattern.is_match(&s))
    }
}

/// Every filter of a run, grouped by type.
#[derive(Debug, Clone, Default)]
pub struct FilterSet {
    filters: HashMap<String, Vec<Filter>>,
    operator: FilterOperator,
}

impl FilterSet {
    /// Parses a list of expressions.
    ///
    /// # Errors
    ///
    /// Returns the first expression that fails to parse.
    pub fn parse<S: AsRef<str>>(expressions: &[S], operator: FilterOperator) -> Result<Self, ConfigError> {
        let mut filters: HashMap<String, Vec<Filter>> = HashMap::new();
        for expression in expressions {
            let filter = Filter::parse(expression.as_ref())?;
            filters.entry(filter.resource_type.clone()).or_default().push(filter);
        }
        Ok(Self { filters, operator })
    }

    /// Returns true if the body of a `resource_type` resource is kept.
    #[must_use]
    pub fn is_match(&self, resource_type: &str, body: &Value) -> bool {
        let Some(filters) = self.filters.get(resource_type) else {
            return true;
        };
        match self.operator {
            FilterOperator::And => filters.iter().all(|f| f.matches(body)),
            FilterOperator::Or => filters.iter().any(|f| f.matches(body)),
        }
    }
}
