//! Dataset I/O for the command line.
//!
//! - **Delimiter resolution**: extension-based auto-detection (`.csv` → comma,
//!   `.tsv` → tab) with manual override support.
//! - **Typing**: CSV cells are typed on read (empty → null, numeric → number,
//!   `true`/`false` → boolean, anything else → string).
//! - **JSON**: `.json` paths hold either an array of records or a
//!   `{headers, columnTypes, rows}` document.
//! - **stdin/stdout**: the `-` path convention routes through standard streams.

use std::{
    fs::File,
    io::{BufReader, BufWriter, Read, Write},
    path::Path,
};

use anyhow::{Context, Result, anyhow};
use csv::QuoteStyle;
use log::debug;
use serde::Deserialize;
use serde_json::{Map, Value as JsonValue};

use crate::{
    data::Value,
    dataset::{Dataset, DatasetDocument},
};

pub const DEFAULT_CSV_DELIMITER: u8 = b',';
pub const DEFAULT_TSV_DELIMITER: u8 = b'\t';

pub fn is_dash(path: &Path) -> bool {
    path == Path::new("-")
}

pub fn is_json(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
}

pub fn resolve_input_delimiter(path: &Path, provided: Option<u8>) -> u8 {
    provided.unwrap_or_else(|| match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("tsv") => DEFAULT_TSV_DELIMITER,
        _ => DEFAULT_CSV_DELIMITER,
    })
}

pub fn resolve_output_delimiter(path: Option<&Path>, provided: Option<u8>, fallback: u8) -> u8 {
    if let Some(delim) = provided {
        return delim;
    }
    if let Some(path) = path {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("tsv") => return DEFAULT_TSV_DELIMITER,
            Some(ext) if ext.eq_ignore_ascii_case("csv") => return DEFAULT_CSV_DELIMITER,
            _ => {}
        }
    }
    fallback
}

pub fn open_csv_reader<R>(reader: R, delimiter: u8) -> csv::Reader<R>
where
    R: Read,
{
    let mut builder = csv::ReaderBuilder::new();
    builder
        .has_headers(true)
        .delimiter(delimiter)
        .double_quote(true)
        .flexible(false);
    builder.from_reader(reader)
}

fn open_input(path: &Path) -> Result<Box<dyn Read>> {
    Ok(if is_dash(path) {
        Box::new(std::io::stdin().lock())
    } else {
        Box::new(BufReader::new(
            File::open(path).with_context(|| format!("Opening input file {path:?}"))?,
        ))
    })
}

pub fn open_output(path: Option<&Path>) -> Result<Box<dyn Write>> {
    Ok(match path {
        Some(p) if !is_dash(p) => Box::new(BufWriter::new(
            File::create(p).with_context(|| format!("Creating output file {p:?}"))?,
        )),
        _ => Box::new(std::io::stdout()),
    })
}

pub fn open_csv_writer<W: Write>(writer: W, delimiter: u8) -> csv::Writer<W> {
    let mut builder = csv::WriterBuilder::new();
    builder
        .delimiter(delimiter)
        .quote_style(QuoteStyle::Necessary)
        .double_quote(true);
    builder.from_writer(writer)
}

/// Reads a CSV stream into a typed dataset.
pub fn read_csv<R: Read>(reader: R, delimiter: u8) -> Result<Dataset> {
    let mut reader = open_csv_reader(reader, delimiter);
    let headers = reader
        .headers()
        .context("Reading CSV headers")?
        .iter()
        .map(|h| h.trim().to_string())
        .collect::<Vec<_>>();
    let mut rows = Vec::new();
    for (idx, record) in reader.records().enumerate() {
        let record = record.with_context(|| format!("Reading CSV row {}", idx + 2))?;
        rows.push(record.iter().map(Value::from_raw).collect::<Vec<_>>());
    }
    debug!("Read {} row(s) across {} column(s)", rows.len(), headers.len());
    Dataset::new(headers, rows).map_err(|err| anyhow!(err))
}

#[derive(Deserialize)]
#[serde(untagged)]
enum JsonInput {
    Records(Vec<Map<String, JsonValue>>),
    Document(DatasetDocument),
}

pub fn read_json<R: Read>(reader: R) -> Result<Dataset> {
    let input: JsonInput = serde_json::from_reader(reader).context("Parsing JSON dataset")?;
    let dataset = match input {
        JsonInput::Records(records) => Dataset::from_records(records, None),
        JsonInput::Document(document) => Dataset::from_document(document),
    };
    dataset.map_err(|err| anyhow!(err))
}

/// Loads a dataset from a CSV/TSV file, a JSON file, or `-` (CSV on stdin).
pub fn read_dataset(path: &Path, delimiter: Option<u8>) -> Result<Dataset> {
    let input = open_input(path)?;
    if is_json(path) {
        read_json(input).with_context(|| format!("Loading dataset from {path:?}"))
    } else {
        read_csv(input, resolve_input_delimiter(path, delimiter))
            .with_context(|| format!("Loading dataset from {path:?}"))
    }
}

pub fn write_csv<W: Write>(dataset: &Dataset, writer: W, delimiter: u8) -> Result<()> {
    let mut writer = open_csv_writer(writer, delimiter);
    writer
        .write_record(dataset.headers())
        .context("Writing CSV headers")?;
    for row in dataset.rows() {
        writer
            .write_record(row.iter().map(|value| value.as_display().into_owned()))
            .context("Writing CSV row")?;
    }
    writer.flush().context("Flushing CSV output")?;
    Ok(())
}

/// Writes the dataset to `path` (stdout when `None` or `-`). `.json` paths get a JSON document.
pub fn write_dataset(dataset: &Dataset, path: Option<&Path>, delimiter: Option<u8>) -> Result<()> {
    let mut output = open_output(path)?;
    if path.is_some_and(is_json) {
        serde_json::to_writer_pretty(&mut output, &dataset.to_document())
            .context("Writing JSON dataset")?;
        writeln!(output)?;
        output.flush().context("Flushing JSON output")?;
        return Ok(());
    }
    let delimiter = resolve_output_delimiter(path, delimiter, DEFAULT_CSV_DELIMITER);
    write_csv(dataset, output, delimiter)
}
