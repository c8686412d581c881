//! Translation of a row request into an ordered list of query stages.
//!
//! Stage order is fixed: one `Match` per filtered field (field-name order),
//! one multi-key `Sort`, one `Match` per expanded group level, then, when the
//! request stops above the leaf level, a `Group` on the next row-group field
//! followed by a `Sort` on the collapsed key.
//!
//! Predicates here are store-agnostic; the store compiles them.

use crate::error::{GridError, GridResult};
use crate::model::{
    ColumnFilter, Conditions, LogicalOperator, NumberCondition, NumberOperator, RowsRequest,
    Scalar, SetCondition, SortModelItem, TextCondition, TextOperator,
};
use std::fmt;
use tracing::warn;

/// Column holding the key of a collapsed group record.
pub const GROUP_ID: &str = "_id";

#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// Case-insensitive literal match for `contains`, `startsWith`, `endsWith`
    /// and their negations; exact comparison for `equals` / `notEqual`.
    Text {
        field: String,
        operator: TextOperator,
        term: String,
    },
    /// Single-bound numeric comparison (any number operator except `inRange`).
    Compare {
        field: String,
        operator: NumberOperator,
        value: f64,
    },
    /// `low <= field <= high`
    Range { field: String, low: f64, high: f64 },
    InSet { field: String, values: Vec<Scalar> },
    /// Group-path narrowing: `field == key`, with the key coerced to the column type.
    KeyEquals { field: String, key: Scalar },
    And(Box<Predicate>, Box<Predicate>),
    Or(Box<Predicate>, Box<Predicate>),
    /// Matches no row. Stands in for filters that cannot be interpreted.
    Nothing,
}

impl Predicate {
    pub fn combine(operator: LogicalOperator, left: Predicate, right: Predicate) -> Predicate {
        match operator {
            LogicalOperator::And => Predicate::And(Box::new(left), Box::new(right)),
            LogicalOperator::Or => Predicate::Or(Box::new(left), Box::new(right)),
        }
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Predicate::Text {
                field,
                operator,
                term,
            } => write!(f, "{} {} {:?}", field, operator.as_str(), term),
            Predicate::Compare {
                field,
                operator,
                value,
            } => write!(f, "{} {} {}", field, operator.as_str(), value),
            Predicate::Range { field, low, high } => {
                write!(f, "{} <= {} <= {}", low, field, high)
            }
            Predicate::InSet { field, values } => {
                let values: Vec<String> = values.iter().map(|v| v.to_string()).collect();
                write!(f, "{} in [{}]", field, values.join(", "))
            }
            Predicate::KeyEquals { field, key } => write!(f, "{} == {}", field, key),
            Predicate::And(left, right) => write!(f, "({} AND {})", left, right),
            Predicate::Or(left, right) => write!(f, "({} OR {})", left, right),
            Predicate::Nothing => write!(f, "false"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortKey {
    pub field: String,
    pub descending: bool,
}

impl From<&SortModelItem> for SortKey {
    fn from(item: &SortModelItem) -> Self {
        SortKey {
            field: item.col_id.clone(),
            descending: item.sort.is_descending(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stage {
    Match(Predicate),
    /// Keys in precedence order.
    Sort(Vec<SortKey>),
    /// Collapse to one record per distinct value of `field`, keyed under [`GROUP_ID`].
    Group { field: String },
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Match(predicate) => write!(f, "match {}", predicate),
            Stage::Sort(keys) => {
                let keys: Vec<String> = keys
                    .iter()
                    .map(|k| format!("{} {}", k.field, if k.descending { "desc" } else { "asc" }))
                    .collect();
                write!(f, "sort {}", keys.join(", "))
            }
            Stage::Group { field } => write!(f, "group by {} as {}", field, GROUP_ID),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Pipeline {
    pub stages: Vec<Stage>,
    /// Field collapsed by the `Group` stage, if the request is above the leaf level.
    pub group_field: Option<String>,
}

impl Pipeline {
    pub fn is_grouped(&self) -> bool {
        self.group_field.is_some()
    }
}

impl fmt::Display for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stages: Vec<String> = self.stages.iter().map(|s| s.to_string()).collect();
        write!(f, "[{}]", stages.join(" | "))
    }
}

/// Build the stage list for a request. Does not look at the window.
pub fn translate(request: &RowsRequest) -> GridResult<Pipeline> {
    let depth = request.group_keys.len();
    if depth > request.row_groups.len() {
        return Err(GridError::validation(format!(
            "{} group keys given for {} row group columns",
            depth,
            request.row_groups.len()
        )));
    }

    let mut stages = Vec::new();

    if let Some(filters) = &request.filter_model {
        for (field, filter) in filters {
            stages.push(Stage::Match(filter_predicate(field, filter)?));
        }
    }

    let sort_keys: Vec<SortKey> = request.sort_items().iter().map(SortKey::from).collect();
    if !sort_keys.is_empty() {
        stages.push(Stage::Sort(sort_keys));
    }

    for (group, key) in request.row_groups.iter().zip(&request.group_keys) {
        stages.push(Stage::Match(Predicate::KeyEquals {
            field: group.field.clone(),
            key: key.clone(),
        }));
    }

    let group_field = request.row_groups.get(depth).map(|g| g.field.clone());
    if let Some(field) = &group_field {
        stages.push(Stage::Group {
            field: field.clone(),
        });
        let descending = request
            .sort_items()
            .last()
            .map(|item| item.sort.is_descending())
            .unwrap_or(false);
        stages.push(Stage::Sort(vec![SortKey {
            field: GROUP_ID.to_string(),
            descending,
        }]));
    }

    Ok(Pipeline {
        stages,
        group_field,
    })
}

fn filter_predicate(field: &str, filter: &ColumnFilter) -> GridResult<Predicate> {
    match filter {
        ColumnFilter::Text(conditions) => {
            conditions_predicate(field, conditions, text_predicate)
        }
        ColumnFilter::Number(conditions) => {
            conditions_predicate(field, conditions, number_predicate)
        }
        ColumnFilter::Set(condition) => set_predicate(field, condition),
        ColumnFilter::Unsupported => {
            warn!(field, "unsupported filter type, no rows will match");
            Ok(Predicate::Nothing)
        }
    }
}

fn conditions_predicate<C>(
    field: &str,
    conditions: &Conditions<C>,
    single: fn(&str, &C) -> GridResult<Predicate>,
) -> GridResult<Predicate> {
    match conditions {
        Conditions::Single(condition) => single(field, condition),
        Conditions::Combined {
            operator,
            condition1,
            condition2,
        } => Ok(Predicate::combine(
            *operator,
            single(field, condition1)?,
            single(field, condition2)?,
        )),
    }
}

fn text_predicate(field: &str, condition: &TextCondition) -> GridResult<Predicate> {
    if condition.operator == TextOperator::Unsupported {
        warn!(field, "unsupported text filter operator, no rows will match");
        return Ok(Predicate::Nothing);
    }
    let term = condition.filter.clone().ok_or_else(|| {
        GridError::validation(format!(
            "text filter '{}' on {} has no filter value",
            condition.operator.as_str(),
            field
        ))
    })?;
    Ok(Predicate::Text {
        field: field.to_string(),
        operator: condition.operator,
        term,
    })
}

fn number_predicate(field: &str, condition: &NumberCondition) -> GridResult<Predicate> {
    let missing = |operand: &str| {
        GridError::validation(format!(
            "number filter '{}' on {} has no {}",
            condition.operator.as_str(),
            field,
            operand
        ))
    };
    match condition.operator {
        NumberOperator::Unsupported => {
            warn!(field, "unsupported number filter operator, no rows will match");
            Ok(Predicate::Nothing)
        }
        NumberOperator::InRange => Ok(Predicate::Range {
            field: field.to_string(),
            low: condition.filter.ok_or_else(|| missing("filter"))?,
            high: condition.filter_to.ok_or_else(|| missing("filterTo"))?,
        }),
        operator => Ok(Predicate::Compare {
            field: field.to_string(),
            operator,
            value: condition.filter.ok_or_else(|| missing("filter"))?,
        }),
    }
}

fn set_predicate(field: &str, condition: &SetCondition) -> GridResult<Predicate> {
    let values = condition
        .values
        .clone()
        .ok_or_else(|| GridError::validation(format!("set filter on {} has no values", field)))?;
    Ok(Predicate::InSet {
        field: field.to_string(),
        values,
    })
}
