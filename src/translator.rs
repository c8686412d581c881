//! Executes row requests: translate, resolve the window, run, re-shape.

use crate::error::{GridError, GridResult};
use crate::model::{Row, RowsRequest, RowsResponse, Scalar};
use crate::pipeline::{translate, Pipeline, GROUP_ID};
use crate::store::RowStore;
use tracing::{debug, info};

/// Half-open row range `[start, end)` relative to the filtered, ordered result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub start: usize,
    pub end: usize,
}

impl Window {
    /// Defaults: `startRow` 0, `endRow` the store's row count (only asked for when absent).
    pub fn resolve<F>(start_row: Option<i64>, end_row: Option<i64>, row_count: F) -> GridResult<Self>
    where
        F: FnOnce() -> GridResult<usize>,
    {
        let start = non_negative("startRow", start_row.unwrap_or(0))?;
        let end = match end_row {
            Some(end) => non_negative("endRow", end)?,
            None => row_count()?,
        };
        Ok(Window { start, end })
    }

    pub fn limit(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    /// `lastRow` given how many rows a fetch of `limit() + 1` produced. Fewer than
    /// `limit() + 1` means the set ends inside (or exactly at the end of) the window.
    pub fn last_row(&self, fetched: usize) -> Option<usize> {
        (fetched <= self.limit()).then(|| self.start + fetched)
    }
}

fn non_negative(name: &str, value: i64) -> GridResult<usize> {
    usize::try_from(value)
        .map_err(|_| GridError::validation(format!("{} must not be negative, got {}", name, value)))
}

pub struct Translator<S> {
    store: S,
    max_window_rows: usize,
    log_pipelines: bool,
}

impl<S: RowStore> Translator<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            max_window_rows: 0,
            log_pipelines: false,
        }
    }

    /// Reject windows wider than `max` rows. 0 means unlimited.
    pub fn with_max_window_rows(mut self, max: usize) -> Self {
        self.max_window_rows = max;
        self
    }

    /// Log every translated pipeline at info level instead of debug.
    pub fn with_pipeline_logging(mut self, enabled: bool) -> Self {
        self.log_pipelines = enabled;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn get_rows(&self, request: &RowsRequest) -> GridResult<RowsResponse> {
        let pipeline = translate(request)?;
        let window = Window::resolve(request.start_row, request.end_row, || {
            self.store.row_count()
        })?;
        self.log_pipeline(&pipeline, &window);

        let limit = window.limit();
        if limit == 0 {
            return Ok(RowsResponse {
                rows: Vec::new(),
                last_row: None,
            });
        }

        // The cap bounds the leaf rows a page carries, not the window asked for.
        // Group-level pages hold only keys and are not capped.
        let capped =
            !pipeline.is_grouped() && self.max_window_rows > 0 && limit > self.max_window_rows;
        let fetch = if capped { self.max_window_rows } else { limit };

        // One row past the window tells a page that ends the set from a full page.
        let mut rows = self
            .store
            .aggregate(&pipeline.stages, window.start, fetch.saturating_add(1))?;
        if capped && rows.len() > self.max_window_rows {
            return Err(GridError::validation(format!(
                "window of {} rows exceeds the maximum of {}",
                limit, self.max_window_rows
            )));
        }
        let last_row = window.last_row(rows.len());
        rows.truncate(limit);
        let rows = rows
            .into_iter()
            .map(|row| reshape_row(row, &pipeline, request.columns.as_deref()))
            .collect();

        Ok(RowsResponse { rows, last_row })
    }

    /// Distinct values of `field`, ascending, via a one-level group request.
    pub fn distinct_values(&self, field: &str) -> GridResult<Vec<Scalar>> {
        let response = self.get_rows(&RowsRequest::distinct(field, None))?;
        Ok(response
            .rows
            .iter()
            .map(|row| row.get(field).map(Scalar::from_json).unwrap_or(Scalar::Null))
            .collect())
    }

    fn log_pipeline(&self, pipeline: &Pipeline, window: &Window) {
        if self.log_pipelines {
            info!(start = window.start, end = window.end, "pipeline {}", pipeline);
        } else {
            debug!(start = window.start, end = window.end, "pipeline {}", pipeline);
        }
    }
}

/// Moves the collapsed key back under its field name, then applies the column projection.
fn reshape_row(mut row: Row, pipeline: &Pipeline, columns: Option<&[String]>) -> Row {
    if let Some(field) = &pipeline.group_field {
        if let Some(key) = row.remove(GROUP_ID) {
            row.insert(field.clone(), key);
        }
    }
    match columns {
        Some(columns) => {
            let group_field = pipeline.group_field.as_deref();
            row.into_iter()
                .filter(|(name, _)| {
                    Some(name.as_str()) == group_field || columns.iter().any(|c| c == name)
                })
                .collect()
        }
        None => row,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{RowGroupCol, SortDirection, SortModelItem};
    use crate::pipeline::Stage;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Serves `total` numbered rows and records how often it is queried.
    struct CountingStore {
        total: usize,
        aggregates: AtomicUsize,
        counts: AtomicUsize,
    }

    impl CountingStore {
        fn new(total: usize) -> Self {
            Self {
                total,
                aggregates: AtomicUsize::new(0),
                counts: AtomicUsize::new(0),
            }
        }
    }

    impl RowStore for CountingStore {
        fn row_count(&self) -> GridResult<usize> {
            self.counts.fetch_add(1, Ordering::SeqCst);
            Ok(self.total)
        }

        fn aggregate(&self, stages: &[Stage], skip: usize, limit: usize) -> GridResult<Vec<Row>> {
            self.aggregates.fetch_add(1, Ordering::SeqCst);
            let grouped = stages.iter().any(|s| matches!(s, Stage::Group { .. }));
            Ok((skip..self.total)
                .take(limit)
                .map(|i| {
                    let value = if grouped {
                        json!({ GROUP_ID: format!("key{}", i) })
                    } else {
                        json!({ "id": i, "name": format!("row{}", i) })
                    };
                    match value {
                        serde_json::Value::Object(row) => row,
                        _ => unreachable!(),
                    }
                })
                .collect())
        }
    }

    fn window(start: i64, end: i64) -> RowsRequest {
        RowsRequest {
            start_row: Some(start),
            end_row: Some(end),
            ..Default::default()
        }
    }

    #[test]
    fn test_last_row_at_end_of_set() {
        let translator = Translator::new(CountingStore::new(8617));

        let page = translator.get_rows(&window(8615, 8617)).unwrap();
        assert_eq!(page.rows.len(), 2);
        assert_eq!(page.last_row, Some(8617));

        let page = translator.get_rows(&window(8500, 8600)).unwrap();
        assert_eq!(page.rows.len(), 100);
        assert_eq!(page.last_row, None);

        let page = translator.get_rows(&window(8600, 8700)).unwrap();
        assert_eq!(page.rows.len(), 17);
        assert_eq!(page.last_row, Some(8617));

        let page = translator.get_rows(&window(0, 100)).unwrap();
        assert_eq!(page.rows.len(), 100);
        assert_eq!(page.last_row, None);
    }

    #[test]
    fn test_empty_window_skips_store() {
        let translator = Translator::new(CountingStore::new(10));

        let page = translator.get_rows(&window(5, 5)).unwrap();
        assert!(page.rows.is_empty());
        assert_eq!(page.last_row, None);

        let page = translator.get_rows(&window(7, 3)).unwrap();
        assert!(page.rows.is_empty());
        assert_eq!(page.last_row, None);

        assert_eq!(translator.store().aggregates.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_absent_end_row_uses_row_count() {
        let translator = Translator::new(CountingStore::new(12));

        let page = translator.get_rows(&RowsRequest::default()).unwrap();
        assert_eq!(page.rows.len(), 12);
        assert_eq!(page.last_row, Some(12));
        assert_eq!(translator.store().counts.load(Ordering::SeqCst), 1);

        translator.get_rows(&window(0, 5)).unwrap();
        assert_eq!(translator.store().counts.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_negative_window_rejected() {
        let translator = Translator::new(CountingStore::new(10));
        assert!(matches!(
            translator.get_rows(&window(-1, 5)),
            Err(GridError::Validation(_))
        ));
        assert!(matches!(
            translator.get_rows(&window(0, -5)),
            Err(GridError::Validation(_))
        ));
    }

    #[test]
    fn test_max_window_rows() {
        let translator = Translator::new(CountingStore::new(1000)).with_max_window_rows(100);
        assert!(translator.get_rows(&window(0, 100)).is_ok());
        assert!(matches!(
            translator.get_rows(&window(0, 101)),
            Err(GridError::Validation(_))
        ));
    }

    #[test]
    fn test_wide_window_over_short_tail_passes_cap() {
        let translator = Translator::new(CountingStore::new(1000)).with_max_window_rows(100);

        let page = translator.get_rows(&window(990, 5000)).unwrap();

        assert_eq!(page.rows.len(), 10);
        assert_eq!(page.last_row, Some(1000));
    }

    #[test]
    fn test_group_level_ignores_window_cap() {
        let translator = Translator::new(CountingStore::new(3)).with_max_window_rows(2);
        assert!(translator.get_rows(&window(0, 3)).is_err());

        let request = RowsRequest {
            row_groups: vec![RowGroupCol::new("country")],
            ..window(0, 3)
        };
        assert_eq!(translator.get_rows(&request).unwrap().rows.len(), 3);
        assert_eq!(translator.distinct_values("sport").unwrap().len(), 3);
    }

    #[test]
    fn test_group_key_moved_to_field_name() {
        let translator = Translator::new(CountingStore::new(3));
        let request = RowsRequest {
            row_groups: vec![RowGroupCol::new("country")],
            sort_model: Some(vec![SortModelItem::new("country", SortDirection::Asc)]),
            ..window(0, 10)
        };

        let page = translator.get_rows(&request).unwrap();

        assert_eq!(
            serde_json::to_value(&page.rows).unwrap(),
            json!([{"country": "key0"}, {"country": "key1"}, {"country": "key2"}])
        );
        assert_eq!(page.last_row, Some(3));
    }

    #[test]
    fn test_column_projection() {
        let translator = Translator::new(CountingStore::new(2));
        let request = RowsRequest {
            columns: Some(vec!["name".to_string()]),
            ..window(0, 2)
        };

        let page = translator.get_rows(&request).unwrap();

        assert_eq!(
            serde_json::to_value(&page.rows).unwrap(),
            json!([{"name": "row0"}, {"name": "row1"}])
        );
    }

    #[test]
    fn test_distinct_values() {
        let translator = Translator::new(CountingStore::new(2));
        assert_eq!(
            translator.distinct_values("sport").unwrap(),
            vec![Scalar::from("key0"), Scalar::from("key1")]
        );
    }

    #[test]
    fn test_window_last_row() {
        let window = Window { start: 8615, end: 8617 };
        assert_eq!(window.limit(), 2);
        assert_eq!(window.last_row(3), None);
        assert_eq!(window.last_row(2), Some(8617));
        assert_eq!(window.last_row(1), Some(8616));
    }
}
