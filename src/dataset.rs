use std::{
    collections::HashSet,
    fs::File,
    io::{BufWriter, Write},
    path::Path,
};

use serde::Serialize;
use thiserror::Error;

use crate::report::{BatchSummary, Metadata, ReportRow};

pub const URL_COLUMN_CANDIDATES: [&str; 4] = ["url", "website", "domain", "site"];

#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("no URL column found; expected one of url, website, domain or site")]
    MissingUrlColumn,
    #[error("column {0:?} not found in input")]
    UnknownColumn(String),
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Addresses to check plus whatever else the input table carried.
#[derive(Debug, Clone)]
pub struct InputDataset {
    pub url_column: String,
    pub addresses: Vec<String>,
    pub metadata: Metadata,
    pub rows: usize,
}

pub fn read_input(path: &Path, url_column: Option<&str>) -> Result<InputDataset, DatasetError> {
    let file = File::open(path)?;
    parse_input(file, url_column)
}

pub fn parse_input<R: std::io::Read>(
    reader: R,
    url_column: Option<&str>,
) -> Result<InputDataset, DatasetError> {
    let mut reader = csv::ReaderBuilder::new().flexible(true).from_reader(reader);
    let headers: Vec<String> = reader.headers()?.iter().map(|h| h.to_string()).collect();

    let url_index = match url_column {
        Some(name) => headers
            .iter()
            .position(|h| h.trim().eq_ignore_ascii_case(name.trim()))
            .ok_or_else(|| DatasetError::UnknownColumn(name.to_string()))?,
        None => infer_url_column(&headers).ok_or(DatasetError::MissingUrlColumn)?,
    };

    let metadata_indices: Vec<usize> = (0..headers.len()).filter(|i| *i != url_index).collect();
    let mut metadata = Metadata::new(
        metadata_indices
            .iter()
            .map(|i| headers[*i].clone())
            .collect(),
    );

    let mut seen = HashSet::new();
    let mut addresses = Vec::new();
    let mut rows = 0;

    for record in reader.records() {
        let record = record?;
        rows += 1;
        let address = record.get(url_index).unwrap_or("").trim();
        if address.is_empty() {
            continue;
        }
        if seen.insert(address.to_string()) {
            addresses.push(address.to_string());
        }
        let values = metadata_indices
            .iter()
            .map(|i| record.get(*i).unwrap_or("").to_string())
            .collect();
        metadata.insert(address, values);
    }

    tracing::info!(
        target: "dataset",
        rows,
        unique = addresses.len(),
        column = %headers[url_index],
        "input loaded"
    );

    Ok(InputDataset {
        url_column: headers[url_index].clone(),
        addresses,
        metadata,
        rows,
    })
}

/// First header that names a URL-ish column, compared case-insensitively.
pub fn infer_url_column(headers: &[String]) -> Option<usize> {
    headers.iter().position(|header| {
        let header = header.trim();
        URL_COLUMN_CANDIDATES
            .iter()
            .any(|candidate| header.eq_ignore_ascii_case(candidate))
    })
}

pub fn write_csv<W: Write>(
    writer: W,
    headers: &[String],
    rows: &[ReportRow],
) -> Result<(), DatasetError> {
    let mut writer = csv::Writer::from_writer(writer);
    writer.write_record(headers)?;
    for row in rows {
        writer.write_record(row.record())?;
    }
    writer.flush()?;
    Ok(())
}

#[derive(Serialize)]
struct JsonReport<'a> {
    summary: &'a BatchSummary,
    results: &'a [ReportRow],
}

pub fn write_json<W: Write>(
    mut writer: W,
    rows: &[ReportRow],
    summary: &BatchSummary,
) -> Result<(), DatasetError> {
    let report = JsonReport {
        summary,
        results: rows,
    };
    serde_json::to_writer_pretty(&mut writer, &report)?;
    writer.flush()?;
    Ok(())
}

/// Writes `rows` to `path`, picking JSON for a `.json` extension and CSV otherwise.
pub fn write_report(
    path: &Path,
    headers: &[String],
    rows: &[ReportRow],
    summary: &BatchSummary,
) -> Result<(), DatasetError> {
    let file = BufWriter::new(File::create(path)?);
    let is_json = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

    if is_json {
        write_json(file, rows, summary)
    } else {
        write_csv(file, headers, rows)
    }
}
