//! Scan filter expressions.
//!
//! Only the predicates the sweep needs are modelled: a numeric less-than
//! comparison, an attribute-absence check, and their conjunction. Filters can
//! be evaluated locally (in-memory table) or rendered into the placeholder
//! syntax remote stores expect.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use stagger_core::Record;

/// A boolean predicate over a record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterExpression {
    /// `attribute < value`. Missing or non-numeric attributes never match.
    LessThan { attribute: String, value: i64 },
    /// True iff the attribute is not present, whatever value it would hold.
    AttributeNotExists { attribute: String },
    And(Box<FilterExpression>, Box<FilterExpression>),
}

/// A filter in `expression` + placeholder-map form.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RenderedFilter {
    pub expression: String,
    /// `#name` placeholder → attribute name.
    pub attribute_names: BTreeMap<String, String>,
    /// `:value` placeholder → literal.
    pub attribute_values: BTreeMap<String, JsonValue>,
}

impl FilterExpression {
    pub fn less_than(attribute: impl Into<String>, value: i64) -> Self {
        Self::LessThan {
            attribute: attribute.into(),
            value,
        }
    }

    pub fn attribute_not_exists(attribute: impl Into<String>) -> Self {
        Self::AttributeNotExists {
            attribute: attribute.into(),
        }
    }

    pub fn and(self, other: FilterExpression) -> Self {
        Self::And(Box::new(self), Box::new(other))
    }

    pub fn matches(&self, record: &Record) -> bool {
        match self {
            Self::LessThan { attribute, value } => {
                record.integer(attribute).is_some_and(|v| v < *value)
            }
            Self::AttributeNotExists { attribute } => !record.contains(attribute),
            Self::And(left, right) => left.matches(record) && right.matches(record),
        }
    }

    /// Render with generated `#nN` / `:vN` placeholders.
    ///
    /// The same attribute name always maps to the same placeholder.
    pub fn render(&self) -> RenderedFilter {
        let mut out = RenderedFilter::default();
        let expression = self.render_into(&mut out);
        RenderedFilter { expression, ..out }
    }

    fn render_into(&self, out: &mut RenderedFilter) -> String {
        match self {
            Self::LessThan { attribute, value } => {
                let name = name_placeholder(out, attribute);
                let placeholder = format!(":v{}", out.attribute_values.len());
                out.attribute_values
                    .insert(placeholder.clone(), JsonValue::from(*value));
                format!("{name} < {placeholder}")
            }
            Self::AttributeNotExists { attribute } => {
                let name = name_placeholder(out, attribute);
                format!("attribute_not_exists({name})")
            }
            Self::And(left, right) => {
                let left = left.render_into(out);
                let right = right.render_into(out);
                format!("{left} AND {right}")
            }
        }
    }
}

fn name_placeholder(out: &mut RenderedFilter, attribute: &str) -> String {
    if let Some((placeholder, _)) = out
        .attribute_names
        .iter()
        .find(|(_, name)| name.as_str() == attribute)
    {
        return placeholder.clone();
    }
    let placeholder = format!("#n{}", out.attribute_names.len());
    out.attribute_names
        .insert(placeholder.clone(), attribute.to_string());
    placeholder
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn eligibility(cutoff: i64) -> FilterExpression {
        FilterExpression::less_than("reportTime", cutoff)
            .and(FilterExpression::attribute_not_exists("ttl"))
    }

    fn record(value: JsonValue) -> Record {
        Record::try_from(value).unwrap()
    }

    #[test]
    fn matches_old_untagged_records_only() {
        let filter = eligibility(1_000);

        assert!(filter.matches(&record(json!({"reportTime": 999}))));
        assert!(!filter.matches(&record(json!({"reportTime": 1_000}))));
        assert!(!filter.matches(&record(json!({"reportTime": 10, "ttl": 5}))));
        assert!(!filter.matches(&record(json!({"id": "no-report-time"}))));
    }

    #[test]
    fn absence_is_literal_not_falsy() {
        let filter = eligibility(1_000);
        assert!(!filter.matches(&record(json!({"reportTime": 10, "ttl": 0}))));
        assert!(!filter.matches(&record(json!({"reportTime": 10, "ttl": null}))));
    }

    #[test]
    fn renders_placeholder_form() {
        let rendered = eligibility(1_700_000_000_000).render();

        assert_eq!(
            rendered.expression,
            "#n0 < :v0 AND attribute_not_exists(#n1)"
        );
        assert_eq!(rendered.attribute_names["#n0"], "reportTime");
        assert_eq!(rendered.attribute_names["#n1"], "ttl");
        assert_eq!(rendered.attribute_values[":v0"], json!(1_700_000_000_000_i64));
    }

    #[test]
    fn repeated_attributes_share_a_placeholder() {
        let rendered = FilterExpression::less_than("a", 5)
            .and(FilterExpression::attribute_not_exists("a"))
            .render();

        assert_eq!(rendered.expression, "#n0 < :v0 AND attribute_not_exists(#n0)");
        assert_eq!(rendered.attribute_names.len(), 1);
    }
}
