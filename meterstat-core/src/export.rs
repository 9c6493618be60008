//! Decoding of raw interval export bodies into rows.

use crate::MeterstatError;

const BOM: char = '\u{feff}';

/// Split an export body into rows of trimmed cells.
///
/// A leading UTF-8 byte order mark is dropped and rows may have differing
/// widths (sentinel rows are shorter than data rows). Blank lines are skipped.
///
/// # Errors
/// Returns `Parse` if the body is not well-formed CSV (e.g. an unterminated
/// quoted field).
pub fn decode_export(body: &str) -> Result<Vec<Vec<String>>, MeterstatError> {
    let body = body.strip_prefix(BOM).unwrap_or(body);
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(body.as_bytes());

    let mut rows = Vec::new();
    for (idx, record) in reader.records().enumerate() {
        let record = record.map_err(|e| MeterstatError::parse(Some(idx), e.to_string()))?;
        if record.iter().all(str::is_empty) {
            continue;
        }
        rows.push(record.iter().map(str::to_string).collect());
    }
    Ok(rows)
}
