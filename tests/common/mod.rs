#![allow(dead_code)]

use gridrows::{FrameStore, RowsRequest, Translator};
use polars::prelude::*;
use serde_json::Value;

/// A handful of olympic winners, enough to exercise every filter kind.
pub fn winners_frame() -> DataFrame {
    df!(
        "athlete" => [
            "Michael Phelps",
            "Natalie Coughlin",
            "Aleksey Nemov",
            "Alicia Coutts",
            "Missy Franklin",
            "Ryan Lochte",
            "Cindy Klassen",
            "Sumner",
            "Ole Einar Bjørndalen",
            "Libby Lenton-Trickett",
        ],
        "age" => [23i64, 25, 24, 24, 17, 27, 26, 19, 28, 20],
        "country" => [
            "United States",
            "United States",
            "Russia",
            "Australia",
            "United States",
            "United States",
            "Canada",
            "Belarus",
            "Norway",
            "Australia",
        ],
        "year" => [2008i64, 2008, 2000, 2012, 2012, 2012, 2006, 2004, 2002, 2008],
        "sport" => [
            "Swimming",
            "Swimming",
            "Gymnastics",
            "Swimming",
            "Swimming",
            "Swimming",
            "Speed Skating",
            "Rowing",
            "Biathlon",
            "Swimming",
        ],
        "gold" => [8i64, 1, 2, 0, 4, 2, 1, 0, 4, 1],
        "total" => [8i64, 6, 6, 5, 5, 5, 5, 1, 5, 3]
    )
    .unwrap()
}

pub fn winners() -> Translator<FrameStore> {
    Translator::new(FrameStore::from_dataframe(winners_frame()).unwrap())
}

/// `count` numbered rows, `id` 0 through `count - 1`.
pub fn numbered(count: usize) -> Translator<FrameStore> {
    let df = df!(
        "id" => (0..count as i64).collect::<Vec<i64>>(),
        "bucket" => (0..count as i64).map(|i| i % 7).collect::<Vec<i64>>()
    )
    .unwrap();
    Translator::new(FrameStore::from_dataframe(df).unwrap())
}

pub fn request(value: Value) -> RowsRequest {
    serde_json::from_value(value).unwrap()
}

/// Values of `field` across `rows`, as display strings.
pub fn column(rows: &[gridrows::model::Row], field: &str) -> Vec<String> {
    rows.iter()
        .map(|row| match &row[field] {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
        .collect()
}
