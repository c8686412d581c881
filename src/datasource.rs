//! Client side of the row protocol: turns grid state into requests.

use crate::error::{GridError, GridResult};
use crate::model::{
    FilterModel, Row, RowGroupCol, RowsRequest, RowsResponse, Scalar, SortModelItem,
};
use crate::store::RowStore;
use crate::translator::Translator;
use std::sync::Arc;
use tracing::{debug, error};

/// Column id the grid gives its generated group column. Never a data field.
pub const AUTO_GROUP_COLUMN: &str = "ag-Grid-AutoColumn";

/// Delivers one request to a translator and brings the page back.
pub trait Transport {
    fn send(&self, request: &RowsRequest) -> GridResult<RowsResponse>;
}

impl<T: Transport + ?Sized> Transport for Arc<T> {
    fn send(&self, request: &RowsRequest) -> GridResult<RowsResponse> {
        (**self).send(request)
    }
}

/// Calls a translator in the same process.
pub struct LocalTransport<S> {
    translator: Arc<Translator<S>>,
}

impl<S: RowStore> LocalTransport<S> {
    pub fn new(translator: Arc<Translator<S>>) -> Self {
        Self { translator }
    }
}

impl<S: RowStore> Transport for LocalTransport<S> {
    fn send(&self, request: &RowsRequest) -> GridResult<RowsResponse> {
        self.translator.get_rows(request)
    }
}

/// Grid state for one block load.
#[derive(Debug, Clone, Default)]
pub struct GetRowsParams {
    pub start_row: Option<usize>,
    pub end_row: Option<usize>,
    pub row_group_cols: Vec<RowGroupCol>,
    pub group_keys: Vec<Scalar>,
    pub sort_model: Vec<SortModelItem>,
    pub filter_model: FilterModel,
    /// Column ids in grid order, possibly including [`AUTO_GROUP_COLUMN`].
    pub grid_columns: Vec<String>,
}

/// Row-count hint handed to the grid with a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowCount {
    /// Total rows at this level; the grid stops requesting blocks past it.
    Known(usize),
    /// More rows may follow; keep scrolling.
    Unknown,
}

impl From<Option<usize>> for RowCount {
    fn from(last_row: Option<usize>) -> Self {
        match last_row {
            Some(n) => RowCount::Known(n),
            None => RowCount::Unknown,
        }
    }
}

/// Receives the outcome of [`ServerSideDatasource::get_rows`]. Exactly one method is called.
pub trait RowsCallback {
    fn success(&mut self, rows: Vec<Row>, row_count: RowCount);
    /// The fetch failed; rows already shown stay as they are.
    fn fail(&mut self, error: &GridError);
}

pub struct ServerSideDatasource<T> {
    transport: T,
    dataset_size: Option<usize>,
}

impl<T: Transport> ServerSideDatasource<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            dataset_size: None,
        }
    }

    /// Default `endRow` when the grid leaves it open. Without it the server uses its row count.
    pub fn with_dataset_size(mut self, size: usize) -> Self {
        self.dataset_size = Some(size);
        self
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Assemble the request for the grid's current state.
    pub fn build_request(&self, params: &GetRowsParams) -> RowsRequest {
        let columns: Vec<String> = params
            .grid_columns
            .iter()
            .filter(|id| id.as_str() != AUTO_GROUP_COLUMN)
            .cloned()
            .collect();
        RowsRequest {
            start_row: Some(params.start_row.unwrap_or(0) as i64),
            end_row: params.end_row.or(self.dataset_size).map(|end| end as i64),
            row_groups: params.row_group_cols.clone(),
            group_keys: params.group_keys.clone(),
            sort_model: (!params.sort_model.is_empty()).then(|| params.sort_model.clone()),
            filter_model: (!params.filter_model.is_empty()).then(|| params.filter_model.clone()),
            columns: (!columns.is_empty()).then_some(columns),
        }
    }

    /// Load one block for the grid and report it through `callback`.
    pub fn get_rows<C: RowsCallback + ?Sized>(&self, params: &GetRowsParams, callback: &mut C) {
        let request = self.build_request(params);
        match self.fetch_row_window(&request) {
            Ok(page) => callback.success(page.rows, RowCount::from(page.last_row)),
            Err(e) => {
                error!(error = %e, "row request failed");
                callback.fail(&e);
            }
        }
    }

    pub fn fetch_row_window(&self, request: &RowsRequest) -> GridResult<RowsResponse> {
        debug!(
            start = ?request.start_row,
            end = ?request.end_row,
            depth = request.group_keys.len(),
            "fetching row window"
        );
        self.transport.send(request)
    }

    /// Distinct values of `field` in ascending order, e.g. to populate a set filter.
    pub fn fetch_distinct_column_values(&self, field: &str) -> GridResult<Vec<Scalar>> {
        let request = RowsRequest::distinct(field, self.dataset_size.map(|size| size as i64));
        let page = self.fetch_row_window(&request)?;
        Ok(page
            .rows
            .iter()
            .map(|row| row.get(field).map(Scalar::from_json).unwrap_or(Scalar::Null))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ColumnFilter, SetCondition, SortDirection};
    use serde_json::json;
    use std::cell::RefCell;

    /// Records requests and answers with a canned page or error.
    struct RecordingTransport {
        requests: RefCell<Vec<RowsRequest>>,
        response: GridResult<RowsResponse>,
    }

    impl RecordingTransport {
        fn answering(response: GridResult<RowsResponse>) -> Self {
            Self {
                requests: RefCell::new(Vec::new()),
                response,
            }
        }
    }

    impl Transport for RecordingTransport {
        fn send(&self, request: &RowsRequest) -> GridResult<RowsResponse> {
            self.requests.borrow_mut().push(request.clone());
            self.response.clone()
        }
    }

    #[derive(Default)]
    struct Outcome {
        rows: Option<(Vec<Row>, RowCount)>,
        failed: Option<GridError>,
    }

    impl RowsCallback for Outcome {
        fn success(&mut self, rows: Vec<Row>, row_count: RowCount) {
            self.rows = Some((rows, row_count));
        }

        fn fail(&mut self, error: &GridError) {
            self.failed = Some(error.clone());
        }
    }

    fn page(values: &[&str], field: &str, last_row: Option<usize>) -> RowsResponse {
        RowsResponse {
            rows: values
                .iter()
                .map(|v| {
                    let mut row = Row::new();
                    row.insert(field.to_string(), json!(v));
                    row
                })
                .collect(),
            last_row,
        }
    }

    #[test]
    fn test_build_request_defaults_and_visible_columns() {
        let datasource =
            ServerSideDatasource::new(RecordingTransport::answering(Ok(RowsResponse::default())))
                .with_dataset_size(8617);
        let mut filter_model = FilterModel::new();
        filter_model.insert(
            "sport".to_string(),
            ColumnFilter::Set(SetCondition {
                values: Some(vec!["Rowing".into()]),
            }),
        );
        let params = GetRowsParams {
            row_group_cols: vec![RowGroupCol::new("country")],
            sort_model: vec![SortModelItem::new("athlete", SortDirection::Asc)],
            filter_model,
            grid_columns: vec![
                AUTO_GROUP_COLUMN.to_string(),
                "athlete".to_string(),
                "country".to_string(),
            ],
            ..Default::default()
        };

        let request = datasource.build_request(&params);

        assert_eq!(request.start_row, Some(0));
        assert_eq!(request.end_row, Some(8617));
        assert_eq!(
            request.columns,
            Some(vec!["athlete".to_string(), "country".to_string()])
        );
        assert_eq!(request.row_groups[0].field, "country");
        assert!(request.group_keys.is_empty());
        assert_eq!(request.sort_items().len(), 1);
        assert!(request.filter_model.is_some());
    }

    #[test]
    fn test_build_request_leaves_open_end_without_dataset_size() {
        let datasource =
            ServerSideDatasource::new(RecordingTransport::answering(Ok(RowsResponse::default())));
        let request = datasource.build_request(&GetRowsParams {
            start_row: Some(100),
            ..Default::default()
        });
        assert_eq!(request.start_row, Some(100));
        assert_eq!(request.end_row, None);
        assert_eq!(request.sort_model, None);
        assert_eq!(request.filter_model, None);
        assert_eq!(request.columns, None);
    }

    #[test]
    fn test_get_rows_reports_row_count() {
        let datasource = ServerSideDatasource::new(RecordingTransport::answering(Ok(page(
            &["Sumner"],
            "athlete",
            Some(8617),
        ))));
        let mut outcome = Outcome::default();

        datasource.get_rows(
            &GetRowsParams {
                start_row: Some(8616),
                end_row: Some(8617),
                ..Default::default()
            },
            &mut outcome,
        );

        let (rows, count) = outcome.rows.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(count, RowCount::Known(8617));
        assert!(outcome.failed.is_none());
    }

    #[test]
    fn test_get_rows_failure_calls_fail() {
        let datasource = ServerSideDatasource::new(RecordingTransport::answering(Err(
            GridError::transport("connection refused"),
        )));
        let mut outcome = Outcome::default();

        datasource.get_rows(&GetRowsParams::default(), &mut outcome);

        assert!(outcome.rows.is_none());
        assert_eq!(
            outcome.failed,
            Some(GridError::transport("connection refused"))
        );
    }

    #[test]
    fn test_fetch_distinct_column_values() {
        let datasource = ServerSideDatasource::new(RecordingTransport::answering(Ok(page(
            &["Archery", "Athletics", "Badminton"],
            "sport",
            Some(3),
        ))))
        .with_dataset_size(8617);

        let values = datasource.fetch_distinct_column_values("sport").unwrap();

        assert_eq!(
            values,
            vec![
                Scalar::from("Archery"),
                Scalar::from("Athletics"),
                Scalar::from("Badminton")
            ]
        );
        let sent = datasource.transport().requests.borrow();
        assert_eq!(sent[0].row_groups, vec![RowGroupCol::new("sport")]);
        assert!(sent[0].group_keys.is_empty());
        assert_eq!(sent[0].start_row, Some(0));
        assert_eq!(sent[0].end_row, Some(8617));
    }

    #[test]
    fn test_row_count_from_last_row() {
        assert_eq!(RowCount::from(Some(5)), RowCount::Known(5));
        assert_eq!(RowCount::from(None), RowCount::Unknown);
    }
}
