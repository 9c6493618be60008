//! Staged parsing of interval export rows.
//!
//! The whole batch is validated into a [`ParsedExport`] before anything
//! touches the store, so a malformed row can never leave a half-applied merge.

use std::collections::BTreeMap;

use chrono::{DateTime, LocalResult, NaiveDate, NaiveTime, TimeZone, Timelike, Utc};
use chrono_tz::Tz;

use meterstat_core::{BucketWidth, DataPoint, MeterstatError, StreamCode, StreamKind};

const NMI: &str = "Nmi";
const STREAM_ID: &str = "Stream ID";
const LOCAL_TIME: &str = "LOCAL TIME";
const DATE_TIME: &str = "Date/Time";
const TOTAL_FOR_PERIOD: &str = "Total for Period";

/// Column of the stream code in a `Stream ID` row.
const STREAM_CODE_COLUMN: usize = 2;

/// Data points keyed by the UTC instant of their local interval start.
pub type PointMap = BTreeMap<DateTime<Utc>, DataPoint>;

/// Fully validated content of one export batch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedExport {
    /// Grid consumption points.
    pub consumption: PointMap,
    /// Solar feed-in points.
    pub feed_in: PointMap,
    /// Data rows skipped for lack of a known stream.
    pub skipped_rows: usize,
    /// Newest date among rows that produced at least one point.
    pub latest_date: Option<NaiveDate>,
    /// Non-fatal issues (unknown streams, nonexistent local times).
    pub warnings: Vec<MeterstatError>,
}

impl ParsedExport {
    /// Points for one stream.
    #[must_use]
    pub const fn points(&self, kind: StreamKind) -> &PointMap {
        match kind {
            StreamKind::Consumption => &self.consumption,
            StreamKind::FeedIn => &self.feed_in,
        }
    }

    fn points_mut(&mut self, kind: StreamKind) -> &mut PointMap {
        match kind {
            StreamKind::Consumption => &mut self.consumption,
            StreamKind::FeedIn => &mut self.feed_in,
        }
    }
}

enum Section {
    None,
    Known(StreamKind),
    Skipped,
}

/// Parse decoded export rows.
///
/// Rows are classified by their first cell: `Nmi`, `LOCAL TIME` and
/// `Total for Period` are ignored, `Stream ID` selects the stream of the rows
/// that follow, `Date/Time` sets the time columns, and anything else is a data
/// row `YYYYMMDD,v1,v2,...` aligned to the latest time header.
///
/// Local times are resolved in `tz`: nonexistent times (DST gaps) are skipped
/// with a warning and ambiguous ones take the earlier instant. Empty cells are
/// missing values.
///
/// # Errors
/// Returns `Parse` with the offending row index for a malformed date, time
/// header or value, or for a data row wider than its time header.
pub fn parse_export(
    rows: &[Vec<String>],
    tz: Tz,
    width: BucketWidth,
) -> Result<ParsedExport, MeterstatError> {
    let mut out = ParsedExport::default();
    let mut section = Section::None;
    let mut columns: Vec<NaiveTime> = Vec::new();

    for (idx, row) in rows.iter().enumerate() {
        let Some(first) = row.first().map(|c| c.trim()) else {
            continue;
        };
        match first {
            NMI | LOCAL_TIME | TOTAL_FOR_PERIOD => {}
            STREAM_ID => {
                let code = row.get(STREAM_CODE_COLUMN).map_or("", |c| c.trim());
                section = match StreamCode::parse(code) {
                    StreamCode::Known(kind) => Section::Known(kind),
                    StreamCode::Unknown(code) => {
                        out.warnings.push(MeterstatError::Data(format!(
                            "unknown stream code '{code}' at row {idx}; its rows are skipped"
                        )));
                        Section::Skipped
                    }
                };
            }
            DATE_TIME => {
                columns = row[1..]
                    .iter()
                    .map(|c| parse_time(c, idx, width))
                    .collect::<Result<_, _>>()?;
            }
            _ => match section {
                Section::Known(kind) => parse_data_row(&mut out, kind, row, idx, &columns, tz)?,
                Section::None => {
                    if out.skipped_rows == 0 {
                        out.warnings.push(MeterstatError::Data(format!(
                            "data row {idx} precedes any stream id; skipped"
                        )));
                    }
                    out.skipped_rows += 1;
                }
                Section::Skipped => out.skipped_rows += 1,
            },
        }
    }
    Ok(out)
}

fn parse_time(cell: &str, idx: usize, width: BucketWidth) -> Result<NaiveTime, MeterstatError> {
    let t = NaiveTime::parse_from_str(cell.trim(), "%H:%M")
        .map_err(|e| MeterstatError::parse(Some(idx), format!("bad time header '{cell}': {e}")))?;
    let minutes = i64::from(t.hour()) * 60 + i64::from(t.minute());
    if minutes % width.minutes() != 0 {
        return Err(MeterstatError::parse(
            Some(idx),
            format!(
                "time header '{cell}' is not aligned to {} minute intervals",
                width.minutes()
            ),
        ));
    }
    Ok(t)
}

fn parse_data_row(
    out: &mut ParsedExport,
    kind: StreamKind,
    row: &[String],
    idx: usize,
    columns: &[NaiveTime],
    tz: Tz,
) -> Result<(), MeterstatError> {
    let date = NaiveDate::parse_from_str(row[0].trim(), "%Y%m%d")
        .map_err(|e| MeterstatError::parse(Some(idx), format!("bad date '{}': {e}", row[0])))?;
    let cells = &row[1..];
    if cells.len() > columns.len() {
        return Err(MeterstatError::parse(
            Some(idx),
            format!(
                "row has {} values but the time header has {} columns",
                cells.len(),
                columns.len()
            ),
        ));
    }

    let mut stored = false;
    for (cell, &time) in cells.iter().zip(columns) {
        let cell = cell.trim();
        if cell.is_empty() {
            continue;
        }
        let value: f64 = cell
            .parse()
            .map_err(|e| MeterstatError::parse(Some(idx), format!("bad value '{cell}': {e}")))?;
        if !value.is_finite() {
            return Err(MeterstatError::parse(
                Some(idx),
                format!("non-finite value '{cell}'"),
            ));
        }

        let instant = match tz.from_local_datetime(&date.and_time(time)) {
            LocalResult::Single(t) | LocalResult::Ambiguous(t, _) => t.with_timezone(&Utc),
            LocalResult::None => {
                out.warnings.push(MeterstatError::Data(format!(
                    "local time {date} {time} does not exist in {tz}; skipped"
                )));
                continue;
            }
        };
        out.points_mut(kind)
            .insert(instant, DataPoint { date, time, value });
        stored = true;
    }

    if stored {
        out.latest_date = out.latest_date.max(Some(date));
    }
    Ok(())
}
