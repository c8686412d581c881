//! Wire types for the row-window query protocol.
//!
//! Field names follow the grid's server-side row model request/response shape
//! (`startRow`, `rowGroups`, `filterModel`, ...). Filter conditions are a sum
//! type tagged by `filterType`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A record returned to the grid: column name to JSON value.
pub type Row = serde_json::Map<String, serde_json::Value>;

/// Filters keyed by field. A `BTreeMap` pins iteration to field-name order.
pub type FilterModel = BTreeMap<String, ColumnFilter>;

/// A scalar carried by the protocol (group keys, set-filter values).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl Scalar {
    pub fn is_null(&self) -> bool {
        matches!(self, Scalar::Null)
    }

    /// Convert a row value back into a scalar. Nested values become their JSON text.
    pub fn from_json(value: &serde_json::Value) -> Self {
        use serde_json::Value;
        match value {
            Value::Null => Scalar::Null,
            Value::Bool(b) => Scalar::Bool(*b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => Scalar::Int(i),
                None => n.as_f64().map(Scalar::Float).unwrap_or(Scalar::Null),
            },
            Value::String(s) => Scalar::Text(s.clone()),
            other => Scalar::Text(other.to_string()),
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Null => write!(f, "null"),
            Scalar::Bool(b) => write!(f, "{}", b),
            Scalar::Int(i) => write!(f, "{}", i),
            Scalar::Float(v) => write!(f, "{}", v),
            Scalar::Text(s) => write!(f, "{:?}", s),
        }
    }
}

impl From<&str> for Scalar {
    fn from(value: &str) -> Self {
        Scalar::Text(value.to_string())
    }
}

impl From<String> for Scalar {
    fn from(value: String) -> Self {
        Scalar::Text(value)
    }
}

impl From<i64> for Scalar {
    fn from(value: i64) -> Self {
        Scalar::Int(value)
    }
}

/// One level of the grouping hierarchy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RowGroupCol {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub field: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agg_func: Option<String>,
}

impl RowGroupCol {
    pub fn new(field: impl Into<String>) -> Self {
        let field = field.into();
        Self {
            id: Some(field.clone()),
            display_name: field.clone(),
            field,
            agg_func: None,
        }
    }

    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = display_name.into();
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn is_descending(&self) -> bool {
        matches!(self, SortDirection::Desc)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SortDirection::Asc => "asc",
            SortDirection::Desc => "desc",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SortModelItem {
    pub col_id: String,
    pub sort: SortDirection,
}

impl SortModelItem {
    pub fn new(col_id: impl Into<String>, sort: SortDirection) -> Self {
        Self {
            col_id: col_id.into(),
            sort,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogicalOperator {
    And,
    Or,
}

impl LogicalOperator {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogicalOperator::And => "AND",
            LogicalOperator::Or => "OR",
        }
    }
}

/// A filter on one column, tagged by `filterType`.
///
/// Any `filterType` other than `text`, `number` or `set` deserializes to
/// `Unsupported`, which the translator turns into a predicate matching nothing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "filterType", rename_all = "lowercase")]
pub enum ColumnFilter {
    Text(Conditions<TextCondition>),
    Number(Conditions<NumberCondition>),
    Set(SetCondition),
    #[serde(other)]
    Unsupported,
}

/// Either one condition or two conditions of the same kind joined by an operator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Conditions<C> {
    Combined {
        operator: LogicalOperator,
        condition1: C,
        condition2: C,
    },
    Single(C),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TextOperator {
    Contains,
    NotContains,
    Equals,
    NotEqual,
    StartsWith,
    EndsWith,
    #[serde(other)]
    Unsupported,
}

impl TextOperator {
    pub fn as_str(&self) -> &'static str {
        match self {
            TextOperator::Contains => "contains",
            TextOperator::NotContains => "notContains",
            TextOperator::Equals => "equals",
            TextOperator::NotEqual => "notEqual",
            TextOperator::StartsWith => "startsWith",
            TextOperator::EndsWith => "endsWith",
            TextOperator::Unsupported => "unsupported",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextCondition {
    #[serde(rename = "type")]
    pub operator: TextOperator,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,
}

impl TextCondition {
    pub fn new(operator: TextOperator, filter: impl Into<String>) -> Self {
        Self {
            operator,
            filter: Some(filter.into()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NumberOperator {
    Equals,
    NotEqual,
    GreaterThan,
    GreaterThanOrEqual,
    LessThan,
    LessThanOrEqual,
    InRange,
    #[serde(other)]
    Unsupported,
}

impl NumberOperator {
    pub fn as_str(&self) -> &'static str {
        match self {
            NumberOperator::Equals => "equals",
            NumberOperator::NotEqual => "notEqual",
            NumberOperator::GreaterThan => "greaterThan",
            NumberOperator::GreaterThanOrEqual => "greaterThanOrEqual",
            NumberOperator::LessThan => "lessThan",
            NumberOperator::LessThanOrEqual => "lessThanOrEqual",
            NumberOperator::InRange => "inRange",
            NumberOperator::Unsupported => "unsupported",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NumberCondition {
    #[serde(rename = "type")]
    pub operator: NumberOperator,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<f64>,
    /// Upper bound for `inRange`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter_to: Option<f64>,
}

impl NumberCondition {
    pub fn new(operator: NumberOperator, filter: f64) -> Self {
        Self {
            operator,
            filter: Some(filter),
            filter_to: None,
        }
    }

    pub fn in_range(low: f64, high: f64) -> Self {
        Self {
            operator: NumberOperator::InRange,
            filter: Some(low),
            filter_to: Some(high),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetCondition {
    #[serde(default)]
    pub values: Option<Vec<Scalar>>,
}

/// A request for one window of rows at the current drill level.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RowsRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_row: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_row: Option<i64>,
    #[serde(default, alias = "rowGroupCols")]
    pub row_groups: Vec<RowGroupCol>,
    #[serde(default)]
    pub group_keys: Vec<Scalar>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort_model: Option<Vec<SortModelItem>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter_model: Option<FilterModel>,
    /// Fields to return. All fields when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub columns: Option<Vec<String>>,
}

impl RowsRequest {
    pub fn sort_items(&self) -> &[SortModelItem] {
        self.sort_model.as_deref().unwrap_or(&[])
    }

    /// Builds the single-level grouping request used to list a column's distinct values.
    pub fn distinct(field: &str, end_row: Option<i64>) -> Self {
        Self {
            start_row: Some(0),
            end_row,
            row_groups: vec![RowGroupCol::new(field)],
            columns: Some(vec![field.to_string()]),
            ..Default::default()
        }
    }
}

/// One page of rows. `last_row` is present only when the page reaches the end of the set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RowsResponse {
    pub rows: Vec<Row>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_row: Option<usize>,
}
