//! Query execution over a polars lazy frame.
//!
//! [`RowStore`] is the seam between the translator and the engine: it runs a
//! stage list and returns one window of rows. [`FrameStore`] compiles stages
//! to `LazyFrame` operations, so nothing is materialized beyond the window.

use crate::error::{GridError, GridResult};
use crate::model::{NumberOperator, Row, Scalar, TextOperator};
use crate::pipeline::{Predicate, SortKey, Stage, GROUP_ID};
use polars::prelude::*;
use serde_json::Value;
use tracing::debug;

/// Executes stage lists. Implementations hold an immutable dataset and may be
/// shared between threads.
pub trait RowStore: Send + Sync {
    /// Number of rows in the unfiltered dataset.
    fn row_count(&self) -> GridResult<usize>;

    /// Run `stages`, then skip `skip` rows and return at most `limit`.
    fn aggregate(&self, stages: &[Stage], skip: usize, limit: usize) -> GridResult<Vec<Row>>;
}

#[derive(Clone)]
pub struct FrameStore {
    lf: LazyFrame,
    schema: SchemaRef,
}

impl FrameStore {
    pub fn new(lf: LazyFrame) -> GridResult<Self> {
        let schema = lf.clone().collect_schema()?;
        Ok(Self { lf, schema })
    }

    pub fn from_dataframe(df: DataFrame) -> GridResult<Self> {
        Self::new(df.lazy())
    }

    pub fn schema(&self) -> &SchemaRef {
        &self.schema
    }

    /// Field names in dataset order.
    pub fn fields(&self) -> Vec<String> {
        self.schema.iter_names().map(|name| name.to_string()).collect()
    }

    fn apply_stage(&self, lf: LazyFrame, stage: &Stage) -> LazyFrame {
        match stage {
            Stage::Match(predicate) => lf.filter(self.predicate_expr(predicate)),
            Stage::Sort(keys) => sort_frame(lf, keys),
            Stage::Group { field } => {
                lf.select([col(field.as_str()).unique_stable().alias(GROUP_ID)])
            }
        }
    }

    /// Compile a predicate against this store's schema.
    pub fn predicate_expr(&self, predicate: &Predicate) -> Expr {
        match predicate {
            Predicate::Text {
                field,
                operator,
                term,
            } => text_expr(field, *operator, term),
            Predicate::Compare {
                field,
                operator,
                value,
            } => {
                let value = self.number_lit(field, *value);
                let column = col(field.as_str());
                match operator {
                    NumberOperator::Equals => column.eq(value),
                    NumberOperator::NotEqual => column.neq(value).fill_null(lit(true)),
                    NumberOperator::GreaterThan => column.gt(value),
                    NumberOperator::GreaterThanOrEqual => column.gt_eq(value),
                    NumberOperator::LessThan => column.lt(value),
                    NumberOperator::LessThanOrEqual => column.lt_eq(value),
                    NumberOperator::InRange | NumberOperator::Unsupported => lit(false),
                }
            }
            Predicate::Range { field, low, high } => col(field.as_str())
                .gt_eq(self.number_lit(field, *low))
                .and(col(field.as_str()).lt_eq(self.number_lit(field, *high))),
            Predicate::InSet { field, values } => values
                .iter()
                .map(|value| self.scalar_eq(field, value))
                .reduce(|acc, expr| acc.or(expr))
                .unwrap_or_else(|| lit(false)),
            Predicate::KeyEquals { field, key } => self.scalar_eq(field, key),
            Predicate::And(left, right) => self.predicate_expr(left).and(self.predicate_expr(right)),
            Predicate::Or(left, right) => self.predicate_expr(left).or(self.predicate_expr(right)),
            Predicate::Nothing => lit(false),
        }
    }

    /// Integral bounds on integer columns stay integers.
    fn number_lit(&self, field: &str, value: f64) -> Expr {
        match self.schema.get(field) {
            Some(dtype) if dtype.is_integer() && value.fract() == 0.0 => lit(value as i64),
            _ => lit(value),
        }
    }

    /// `field == value`, with the value coerced to the column's type.
    /// Group keys usually arrive as strings, whatever the column type.
    fn scalar_eq(&self, field: &str, value: &Scalar) -> Expr {
        let column = col(field);
        let dtype = self.schema.get(field);
        let value_lit = match (value, dtype) {
            (Scalar::Null, _) => return column.is_null(),
            (Scalar::Text(s), Some(dtype)) => match dtype {
                DataType::Float32 | DataType::Float64 => s
                    .trim()
                    .parse::<f64>()
                    .map(lit)
                    .unwrap_or_else(|_| lit(s.as_str())),
                DataType::Int8 | DataType::Int16 | DataType::Int32 | DataType::Int64 => s
                    .trim()
                    .parse::<i64>()
                    .map(lit)
                    .unwrap_or_else(|_| lit(s.as_str())),
                DataType::UInt8 | DataType::UInt16 | DataType::UInt32 | DataType::UInt64 => s
                    .trim()
                    .parse::<u64>()
                    .map(lit)
                    .unwrap_or_else(|_| lit(s.as_str())),
                DataType::Boolean => s
                    .trim()
                    .parse::<bool>()
                    .map(lit)
                    .unwrap_or_else(|_| lit(s.as_str())),
                _ => lit(s.as_str()),
            },
            (Scalar::Text(s), None) => lit(s.as_str()),
            (Scalar::Int(i), Some(DataType::String)) => lit(i.to_string()),
            (Scalar::Int(i), _) => lit(*i),
            (Scalar::Float(f), Some(DataType::String)) => lit(f.to_string()),
            (Scalar::Float(f), _) => self.number_lit(field, *f),
            (Scalar::Bool(b), Some(DataType::String)) => lit(b.to_string()),
            (Scalar::Bool(b), _) => lit(*b),
        };
        column.eq(value_lit)
    }
}

impl RowStore for FrameStore {
    fn row_count(&self) -> GridResult<usize> {
        let df = self
            .lf
            .clone()
            .select([len().alias("count")])
            .collect()?;
        match df.column("count")?.get(0)? {
            AnyValue::UInt32(n) => Ok(n as usize),
            AnyValue::UInt64(n) => Ok(n as usize),
            other => Err(GridError::query(format!(
                "unexpected row count value: {}",
                other
            ))),
        }
    }

    fn aggregate(&self, stages: &[Stage], skip: usize, limit: usize) -> GridResult<Vec<Row>> {
        let offset = i64::try_from(skip)
            .map_err(|_| GridError::validation(format!("startRow {} is too large", skip)))?;
        let length = IdxSize::try_from(limit).unwrap_or(IdxSize::MAX);

        let lf = stages
            .iter()
            .fold(self.lf.clone(), |lf, stage| self.apply_stage(lf, stage));
        let df = lf.slice(offset, length).collect()?;
        debug!(skip, limit, returned = df.height(), "collected window");
        dataframe_rows(&df)
    }
}

fn sort_frame(lf: LazyFrame, keys: &[SortKey]) -> LazyFrame {
    if keys.is_empty() {
        return lf;
    }
    // Nulls order as the smallest value: first ascending, last descending
    let options = SortMultipleOptions {
        descending: keys.iter().map(|k| k.descending).collect(),
        nulls_last: keys.iter().map(|k| k.descending).collect(),
        maintain_order: true,
        ..Default::default()
    };
    lf.sort_by_exprs(
        keys.iter()
            .map(|k| col(k.field.as_str()))
            .collect::<Vec<_>>(),
        options,
    )
}

fn text_expr(field: &str, operator: TextOperator, term: &str) -> Expr {
    let value = col(field).cast(DataType::String);
    let escaped = regex::escape(term);
    let matches = |pattern: String| value.clone().str().contains(lit(pattern), false);
    match operator {
        TextOperator::Contains => matches(format!("(?i){}", escaped)),
        TextOperator::NotContains => matches(format!("(?i){}", escaped))
            .not()
            .fill_null(lit(true)),
        TextOperator::StartsWith => matches(format!("(?i)^{}", escaped)),
        TextOperator::EndsWith => matches(format!("(?i){}$", escaped)),
        TextOperator::Equals => value.clone().eq(lit(term)),
        TextOperator::NotEqual => value.clone().neq(lit(term)).fill_null(lit(true)),
        TextOperator::Unsupported => lit(false),
    }
}

/// Convert a collected frame into protocol rows, one map per record.
pub fn dataframe_rows(df: &DataFrame) -> GridResult<Vec<Row>> {
    let columns = df.get_columns();
    let mut rows = Vec::with_capacity(df.height());
    for index in 0..df.height() {
        let mut row = Row::new();
        for column in columns {
            let value = column.get(index)?;
            row.insert(column.name().to_string(), any_value_to_json(&value));
        }
        rows.push(row);
    }
    Ok(rows)
}

fn any_value_to_json(value: &AnyValue) -> Value {
    match value {
        AnyValue::Null => Value::Null,
        AnyValue::Boolean(b) => Value::Bool(*b),
        AnyValue::String(s) => Value::String(s.to_string()),
        AnyValue::StringOwned(s) => Value::String(s.to_string()),
        AnyValue::Int8(v) => Value::from(*v),
        AnyValue::Int16(v) => Value::from(*v),
        AnyValue::Int32(v) => Value::from(*v),
        AnyValue::Int64(v) => Value::from(*v),
        AnyValue::UInt8(v) => Value::from(*v),
        AnyValue::UInt16(v) => Value::from(*v),
        AnyValue::UInt32(v) => Value::from(*v),
        AnyValue::UInt64(v) => Value::from(*v),
        AnyValue::Float32(v) => float_to_json(f64::from(*v)),
        AnyValue::Float64(v) => float_to_json(*v),
        other => Value::String(other.str_value().to_string()),
    }
}

fn float_to_json(value: f64) -> Value {
    serde_json::Number::from_f64(value)
        .map(Value::Number)
        .unwrap_or(Value::Null)
}
