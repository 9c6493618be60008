//! CSV interval export bodies in the portal's layout.

use chrono::NaiveDate;

/// Five-minute slots in a day.
pub const SLOTS_PER_DAY: usize = 288;

/// `Date/Time` header with one `HH:MM` column per five-minute slot.
#[must_use]
pub fn full_day_header() -> String {
    let mut out = String::from("Date/Time");
    for slot in 0..SLOTS_PER_DAY {
        out.push_str(&format!(",{:02}:{:02}", slot / 12, (slot % 12) * 5));
    }
    out
}

/// Builder for an export body.
///
/// ```
/// use chrono::NaiveDate;
/// use meterstat_mock::fixtures::export::ExportBuilder;
///
/// let day = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
/// let body = ExportBuilder::new("3120000000")
///     .stream("E1")
///     .constant_day(day, 0.1)
///     .build();
/// assert!(body.contains("20240501,0.1,"));
/// ```
#[derive(Debug, Clone)]
pub struct ExportBuilder {
    nmi: String,
    lines: Vec<String>,
    bom: bool,
}

impl ExportBuilder {
    /// Start a body for meter `nmi`.
    #[must_use]
    pub fn new(nmi: &str) -> Self {
        Self {
            nmi: nmi.to_string(),
            lines: vec![format!("Nmi,{nmi}")],
            bom: false,
        }
    }

    /// Prefix the body with a UTF-8 byte order mark.
    #[must_use]
    pub fn with_bom(mut self) -> Self {
        self.bom = true;
        self
    }

    /// Open a stream section (`E1`, `B1`, or anything else) with its local
    /// time marker and a full-day time header.
    #[must_use]
    pub fn stream(mut self, code: &str) -> Self {
        self.lines.push(format!("Stream ID,{},{code}", self.nmi));
        self.lines.push("LOCAL TIME,AEST".to_string());
        self.lines.push(full_day_header());
        self
    }

    /// Data row for `date`; `value(slot)` gives slot values, `None` leaves
    /// the cell empty.
    #[must_use]
    pub fn day(mut self, date: NaiveDate, value: impl Fn(usize) -> Option<f64>) -> Self {
        let mut line = date.format("%Y%m%d").to_string();
        for slot in 0..SLOTS_PER_DAY {
            line.push(',');
            if let Some(v) = value(slot) {
                line.push_str(&v.to_string());
            }
        }
        self.lines.push(line);
        self
    }

    /// Data row for `date` with every slot equal to `value`.
    #[must_use]
    pub fn constant_day(self, date: NaiveDate, value: f64) -> Self {
        self.day(date, |_| Some(value))
    }

    /// `Total for Period` trailer.
    #[must_use]
    pub fn total(mut self, value: f64) -> Self {
        self.lines.push(format!("Total for Period,{value}"));
        self
    }

    /// Append a verbatim line.
    #[must_use]
    pub fn raw(mut self, line: &str) -> Self {
        self.lines.push(line.to_string());
        self
    }

    /// Render the body.
    #[must_use]
    pub fn build(self) -> String {
        let mut out = String::new();
        if self.bom {
            out.push('\u{feff}');
        }
        out.push_str(&self.lines.join("\r\n"));
        out.push_str("\r\n");
        out
    }
}
