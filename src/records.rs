//! Input rows and their NDJSON loaders.
//!
//! Field names are snake_case; the column headers of the source spreadsheets
//! (`Seguradora`, `Produto`, `Receita`, ...) are accepted as aliases so an
//! exported sheet can be fed in after a plain row-to-JSON conversion.

use std::io::BufRead;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::info;

use crate::error::{InputError, Result};
use crate::types::Period;

/// One month of one insurer/product/segment book.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    #[serde(alias = "Seguradora")]
    pub insurer: String,
    #[serde(alias = "Produto")]
    pub product: String,
    #[serde(alias = "Segmento")]
    pub segment: String,
    /// Nullable flag; booleans and strings are both normalised to a label.
    #[serde(alias = "Novo Produto?", default, deserialize_with = "optional_label")]
    pub is_new_product: Option<String>,
    #[serde(alias = "Referência", alias = "reference")]
    pub reference_month: Period,
    /// Premium earned (≥ 0).
    #[serde(alias = "Receita")]
    pub revenue: f64,
    /// Claims paid (≥ 0).
    #[serde(alias = "Despesa")]
    pub expense: f64,
    /// Whole counts; sheet floats such as `120.0` are truncated.
    #[serde(alias = "OS", deserialize_with = "count")]
    pub service_orders: u64,
    #[serde(alias = "Itens", deserialize_with = "count")]
    pub items: u64,
}

/// One step of a product's tiered markup policy.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PolicyRow {
    pub product: String,
    /// Volume floor (items) from which this tier applies.
    pub items_threshold: u64,
    pub target_markup: f64,
}

/// Policy rows as they arrive from the upload, before type coercion.
#[derive(Debug, Deserialize)]
struct RawPolicyRow {
    #[serde(alias = "Produto")]
    product: Value,
    #[serde(alias = "Itens", alias = "items")]
    items_threshold: Value,
    #[serde(alias = "Markup Política")]
    target_markup: f64,
}

fn optional_label<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) if s.trim().is_empty() => None,
        Some(Value::String(s)) => Some(s),
        Some(Value::Bool(b)) => Some(b.to_string()),
        Some(Value::Number(n)) => Some(n.to_string()),
        Some(other) => {
            return Err(serde::de::Error::custom(format!("expected a flag, got {other}")));
        }
    })
}

fn count<'de, D>(deserializer: D) -> std::result::Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    to_count(Value::deserialize(deserializer)?).map_err(serde::de::Error::custom)
}

/// Non-negative integer from a JSON number or numeric text. Floats are
/// truncated toward zero, the same as an integer cast of the sheet value.
fn to_count(value: Value) -> std::result::Result<u64, String> {
    match value {
        Value::Number(n) => {
            if let Some(v) = n.as_u64() {
                return Ok(v);
            }
            match n.as_f64() {
                Some(f) if f.is_finite() && f >= 0.0 => Ok(f.trunc() as u64),
                _ => Err(format!("{n} is not a non-negative integer")),
            }
        }
        Value::String(s) => s.trim().parse::<u64>().map_err(|e| format!("`{s}`: {e}")),
        other => Err(format!("expected a number, got {other}")),
    }
}

/// Parse one JSON object per non-blank line. Line numbers in errors are 1-based.
pub fn read_ndjson<T: DeserializeOwned, R: BufRead>(reader: R) -> Result<Vec<(usize, T)>> {
    let mut rows = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let row = serde_json::from_str(&line)
            .map_err(|source| InputError::Parse { line: idx + 1, source })?;
        rows.push((idx + 1, row));
    }
    Ok(rows)
}

fn check_measure(line: usize, field: &'static str, value: f64) -> Result<()> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(InputError::InvalidMeasure { line, field, value })
    }
}

/// Load and validate the primary records table.
pub fn load_records<R: BufRead>(reader: R) -> Result<Vec<Record>> {
    let rows: Vec<(usize, Record)> = read_ndjson(reader)?;
    let mut records = Vec::with_capacity(rows.len());
    for (line, record) in rows {
        check_measure(line, "revenue", record.revenue)?;
        check_measure(line, "expense", record.expense)?;
        records.push(record);
    }
    info!(records = records.len(), "loaded records");
    Ok(records)
}

fn coerce_product(line: usize, value: Value) -> Result<String> {
    match value {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        other => Err(InputError::Coercion {
            line,
            field: "product",
            reason: format!("expected text, got {other}"),
        }),
    }
}

fn coerce_threshold(line: usize, value: Value) -> Result<u64> {
    to_count(value).map_err(|reason| InputError::Coercion { line, field: "items_threshold", reason })
}

/// Load the policy table, coercing product to text and thresholds to integers.
pub fn load_policy<R: BufRead>(reader: R) -> Result<Vec<PolicyRow>> {
    let rows: Vec<(usize, RawPolicyRow)> = read_ndjson(reader)?;
    let mut policy = Vec::with_capacity(rows.len());
    for (line, raw) in rows {
        if !raw.target_markup.is_finite() {
            return Err(InputError::InvalidMeasure {
                line,
                field: "target_markup",
                value: raw.target_markup,
            });
        }
        policy.push(PolicyRow {
            product: coerce_product(line, raw.product)?,
            items_threshold: coerce_threshold(line, raw.items_threshold)?,
            target_markup: raw.target_markup,
        });
    }
    info!(rows = policy.len(), "loaded policy table");
    Ok(policy)
}
