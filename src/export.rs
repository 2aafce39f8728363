//! CSV and Excel (SpreadsheetML 2003) document builders.
//!
//! Only the document text is produced here; writing it somewhere is up to
//! the caller (see [`crate::file::write_export`]).

use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::date;
use crate::error::{Error, Result};
use crate::tree::{number_text, Value};

pub const DEFAULT_SHEET_NAME: &str = "Sheet1";
pub const DEFAULT_EXCEL_DATE_FORMAT: &str = "DD/MM/YYYY";

const CHAR_WIDTH: u32 = 7;
const PADDING: u32 = 16;
const MIN_WIDTH: u32 = 50;
const MAX_WIDTH: u32 = 400;
const DEFAULT_WIDTH: u32 = 100;
const MAX_SHEET_NAME: usize = 31;

static ISO_DATE_PREFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}").expect("static regex"));
static UPPERCASE: Lazy<Regex> = Lazy::new(|| Regex::new(r"([A-Z])").expect("static regex"));
static SHEET_FORBIDDEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[:\\/?*\[\]]").expect("static regex"));

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnFormat {
    Date,
    DateTime,
    Currency,
    Number,
    Percent,
    Boolean,
}

impl std::str::FromStr for ColumnFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "date" => Ok(ColumnFormat::Date),
            "datetime" => Ok(ColumnFormat::DateTime),
            "currency" => Ok(ColumnFormat::Currency),
            "number" => Ok(ColumnFormat::Number),
            "percent" => Ok(ColumnFormat::Percent),
            "boolean" => Ok(ColumnFormat::Boolean),
            other => Err(Error::InvalidArgument {
                reason: format!("unknown column format `{other}`"),
            }),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    pub header: Option<String>,
    /// Dotted path into each record.
    pub key: String,
    /// Excel column width in points; computed from the data when absent.
    pub width: Option<u32>,
    pub format: Option<ColumnFormat>,
}

impl Column {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            header: None,
            key: key.into(),
            width: None,
            format: None,
        }
    }

    pub fn with_header(mut self, header: impl Into<String>) -> Self {
        self.header = Some(header.into());
        self
    }

    pub fn with_width(mut self, width: u32) -> Self {
        self.width = Some(width);
        self
    }

    pub fn with_format(mut self, format: ColumnFormat) -> Self {
        self.format = Some(format);
        self
    }

    /// Header text, falling back to the key.
    pub fn title(&self) -> &str {
        self.header.as_deref().unwrap_or(&self.key)
    }
}

/// `createdAt` → `Created At`, `first_name` → `First name`.
pub fn format_header(key: &str) -> String {
    let spaced = UPPERCASE.replace_all(key, " $1");
    let spaced = spaced.replace(['_', '-'], " ");
    let mut chars = spaced.chars();
    let capitalized = match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    };
    capitalized.trim().to_string()
}

/// Columns for every leaf of the first record. Nested objects are flattened
/// into dotted keys; arrays and dates stay single columns.
pub fn auto_detect_columns(records: &[Value]) -> Vec<Column> {
    let mut columns = Vec::new();
    let Some(Value::Object(first)) = records.first() else {
        return columns;
    };
    let mut visited = HashSet::from([first.id()]);
    // (key prefix, remaining entries) per open object, depth first
    let mut stack = vec![(String::new(), first.entries().into_iter())];

    while let Some((prefix, entries)) = stack.last_mut() {
        let Some((key, value)) = entries.next() else {
            stack.pop();
            continue;
        };
        let full_key = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{prefix}.{key}")
        };
        match value {
            Value::Object(nested) => {
                if visited.insert(nested.id()) {
                    stack.push((full_key, nested.entries().into_iter()));
                }
            }
            _ => columns.push(Column::new(full_key).with_header(format_header(&key))),
        }
    }
    debug!(count = columns.len(), "detected export columns");
    columns
}

fn lookup(record: &Value, key: &str) -> Option<Value> {
    record.resolve_path(key)
}

fn leaf_text(value: &Value) -> String {
    match value.text() {
        Some(text) => text,
        None if value.is_composite() => value.to_json().to_string(),
        None => String::new(),
    }
}

/// Text for composite values and scalars alike. Array items are joined with
/// `", "`; nested composites inside them are written as JSON.
fn display_text(value: &Value) -> String {
    match value {
        Value::Array(items) => items
            .items()
            .iter()
            .map(leaf_text)
            .collect::<Vec<_>>()
            .join(", "),
        other => leaf_text(other),
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => *n != 0.0 && !n.is_nan(),
        Value::String(s) => !s.is_empty(),
        _ => true,
    }
}

fn yes_no(value: &Value) -> String {
    let text = if is_truthy(value) { "Yes" } else { "No" };
    text.to_string()
}

fn group_thousands(digits: &str) -> String {
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

/// en-US grouping with between `min_frac` and `max_frac` decimals.
fn format_grouped(n: f64, min_frac: usize, max_frac: usize) -> String {
    let fixed = format!("{:.*}", max_frac, n.abs());
    let (int_part, frac_part) = fixed.split_once('.').unwrap_or((fixed.as_str(), ""));
    let mut frac = frac_part.trim_end_matches('0').to_string();
    while frac.len() < min_frac {
        frac.push('0');
    }
    let mut out = group_thousands(int_part);
    if !frac.is_empty() {
        out.push('.');
        out.push_str(&frac);
    }
    out
}

pub fn format_number(n: f64) -> String {
    if !n.is_finite() {
        return number_text(n);
    }
    let sign = if n < 0.0 { "-" } else { "" };
    format!("{sign}{}", format_grouped(n, 0, 3))
}

pub fn format_currency(n: f64) -> String {
    if !n.is_finite() {
        return number_text(n);
    }
    let sign = if n < 0.0 { "-" } else { "" };
    format!("{sign}${}", format_grouped(n, 2, 2))
}

fn format_percent(n: f64) -> String {
    format!("{:.2}%", n * 100.0)
}

fn format_date_like(value: &Value, pattern: &str) -> Option<String> {
    match value {
        Value::Date(d) => Some(date::format_datetime(d, pattern)),
        Value::String(s) if ISO_DATE_PREFIX.is_match(s) => {
            date::parse_date(s, None).map(|d| date::format_datetime(&d, pattern))
        }
        _ => None,
    }
}

/// CSV cell text for `value` under an optional column format.
///
/// Formats only apply to values of the matching kind; anything else is
/// written as plain text.
pub fn format_value(value: Option<&Value>, format: Option<ColumnFormat>, date_format: &str) -> String {
    let Some(value) = value else {
        return String::new();
    };
    if matches!(value, Value::Null) {
        return String::new();
    }
    let formatted = match (format, value) {
        (Some(ColumnFormat::Date), v) => format_date_like(v, date_format),
        (Some(ColumnFormat::DateTime), v) => {
            format_date_like(v, &format!("{date_format} HH:mm:ss"))
        }
        (Some(ColumnFormat::Currency), Value::Number(n)) => Some(format_currency(*n)),
        (Some(ColumnFormat::Number), Value::Number(n)) => Some(format_number(*n)),
        (Some(ColumnFormat::Percent), Value::Number(n)) => Some(format_percent(*n)),
        (Some(ColumnFormat::Boolean), v) => Some(yes_no(v)),
        _ => None,
    };
    formatted.unwrap_or_else(|| display_text(value))
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CellType {
    Number,
    String,
}

impl CellType {
    fn as_str(self) -> &'static str {
        match self {
            CellType::Number => "Number",
            CellType::String => "String",
        }
    }
}

/// Cell type and text for one Excel cell.
pub fn excel_cell(
    value: Option<&Value>,
    format: Option<ColumnFormat>,
    date_format: &str,
) -> (CellType, String) {
    let text = |s: String| (CellType::String, s);
    match value {
        None | Some(Value::Null) => text(String::new()),
        Some(Value::Number(n)) if format == Some(ColumnFormat::Percent) => text(format_percent(*n)),
        Some(Value::Number(n)) => (CellType::Number, number_text(*n)),
        Some(v @ Value::Bool(_)) => text(yes_no(v)),
        Some(Value::Date(d)) => text(date::format_datetime(d, date_format)),
        Some(v @ Value::String(_)) if format == Some(ColumnFormat::Date) => text(
            format_date_like(v, date_format).unwrap_or_else(|| display_text(v)),
        ),
        Some(v) => text(display_text(v)),
    }
}

/// Fills in missing widths from the longest header or cell text.
pub fn calculate_widths(records: &[Value], columns: &[Column], date_format: &str) -> Vec<Column> {
    columns
        .iter()
        .map(|col| {
            if col.width.is_some() {
                return col.clone();
            }
            let longest = records
                .iter()
                .map(|r| {
                    let (_, text) = excel_cell(lookup(r, &col.key).as_ref(), col.format, date_format);
                    text.chars().count()
                })
                .fold(col.title().chars().count(), usize::max);
            let width = (longest as u32)
                .saturating_mul(CHAR_WIDTH)
                .saturating_add(PADDING)
                .clamp(MIN_WIDTH, MAX_WIDTH);
            col.clone().with_width(width)
        })
        .collect()
}

/// Quotes a cell when it holds the delimiter, a quote or a line break.
pub fn escape_csv(value: &str, delimiter: &str) -> String {
    let needs_quotes = (!delimiter.is_empty() && value.contains(delimiter))
        || value.contains(',')
        || value.contains('"')
        || value.contains('\n')
        || value.contains('\r');
    if needs_quotes {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

pub fn escape_xml(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

/// Drops characters Excel forbids in sheet names and caps the length.
pub fn sanitize_sheet_name(name: &str) -> String {
    let cleaned: String = SHEET_FORBIDDEN
        .replace_all(name, "")
        .chars()
        .take(MAX_SHEET_NAME)
        .collect();
    if cleaned.is_empty() {
        DEFAULT_SHEET_NAME.to_string()
    } else {
        cleaned
    }
}

#[derive(Clone, Debug)]
pub struct CsvOptions {
    /// Auto-detected from the first record when `None`.
    pub columns: Option<Vec<Column>>,
    pub delimiter: String,
    pub include_header: bool,
    pub date_format: String,
}

impl Default for CsvOptions {
    fn default() -> Self {
        Self {
            columns: None,
            delimiter: ",".into(),
            include_header: true,
            date_format: date::DEFAULT_DATE_FORMAT.into(),
        }
    }
}

fn ensure_records(records: &[Value]) -> Result<()> {
    if records.is_empty() {
        warn!("no data to export");
        return Err(Error::EmptyExport);
    }
    Ok(())
}

/// Builds a CSV document; every row, header included, ends with `\n`.
pub fn to_csv(records: &[Value], options: &CsvOptions) -> Result<String> {
    ensure_records(records)?;
    if options.delimiter.is_empty() {
        return Err(Error::InvalidArgument {
            reason: "csv delimiter must not be empty".into(),
        });
    }
    let columns = options
        .columns
        .clone()
        .unwrap_or_else(|| auto_detect_columns(records));
    let delimiter = options.delimiter.as_str();
    let mut out = String::new();

    if options.include_header {
        let header: Vec<String> = columns
            .iter()
            .map(|c| escape_csv(c.title(), delimiter))
            .collect();
        out.push_str(&header.join(delimiter));
        out.push('\n');
    }
    for record in records {
        let row: Vec<String> = columns
            .iter()
            .map(|c| {
                let value = lookup(record, &c.key);
                escape_csv(
                    &format_value(value.as_ref(), c.format, &options.date_format),
                    delimiter,
                )
            })
            .collect();
        out.push_str(&row.join(delimiter));
        out.push('\n');
    }
    debug!(rows = records.len(), columns = columns.len(), "built csv");
    Ok(out)
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HeaderStyle {
    pub bold: bool,
    pub background: String,
    pub color: String,
}

impl Default for HeaderStyle {
    fn default() -> Self {
        Self {
            bold: true,
            background: "#4472C4".into(),
            color: "#FFFFFF".into(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct ExcelOptions {
    pub sheet_name: String,
    pub columns: Option<Vec<Column>>,
    /// Merged title row above the header.
    pub title: Option<String>,
    /// Adds an "Exported at" row with the local time.
    pub include_timestamp: bool,
    pub header_style: HeaderStyle,
    pub date_format: String,
}

impl Default for ExcelOptions {
    fn default() -> Self {
        Self {
            sheet_name: DEFAULT_SHEET_NAME.into(),
            columns: None,
            title: None,
            include_timestamp: false,
            header_style: HeaderStyle::default(),
            date_format: DEFAULT_EXCEL_DATE_FORMAT.into(),
        }
    }
}

fn merged_row(style: &str, merge_across: usize, text: &str, height: Option<u32>) -> String {
    let height = height.map(|h| format!(" ss:Height=\"{h}\"")).unwrap_or_default();
    format!(
        "<Row{height}>\n<Cell ss:StyleID=\"{style}\" ss:MergeAcross=\"{merge_across}\">\
         <Data ss:Type=\"String\">{}</Data></Cell>\n</Row>\n",
        escape_xml(text)
    )
}

fn styles(header: &HeaderStyle) -> String {
    let bold = if header.bold { " ss:Bold=\"1\"" } else { "" };
    format!(
        r##"  <Styles>
    <Style ss:ID="Default">
      <Font ss:FontName="Arial" ss:Size="10"/>
    </Style>
    <Style ss:ID="title">
      <Font ss:FontName="Arial" ss:Size="16" ss:Bold="1"/>
      <Alignment ss:Horizontal="Center" ss:Vertical="Center"/>
    </Style>
    <Style ss:ID="timestamp">
      <Font ss:FontName="Arial" ss:Size="9" ss:Italic="1"/>
      <Alignment ss:Horizontal="Right"/>
    </Style>
    <Style ss:ID="header">
      <Font ss:FontName="Arial" ss:Size="10"{bold} ss:Color="{color}"/>
      <Interior ss:Color="{background}" ss:Pattern="Solid"/>
      <Alignment ss:Horizontal="Center" ss:Vertical="Center"/>
      <Borders>
        <Border ss:Position="Bottom" ss:LineStyle="Continuous" ss:Weight="1"/>
      </Borders>
    </Style>
    <Style ss:ID="data">
      <Font ss:FontName="Arial" ss:Size="10"/>
      <Alignment ss:Vertical="Center"/>
      <Borders>
        <Border ss:Position="Bottom" ss:LineStyle="Continuous" ss:Weight="1" ss:Color="#CCCCCC"/>
      </Borders>
    </Style>
  </Styles>
"##,
        color = escape_xml(&header.color),
        background = escape_xml(&header.background),
    )
}

/// Builds a SpreadsheetML 2003 workbook with one sheet.
pub fn to_excel_xml(records: &[Value], options: &ExcelOptions) -> Result<String> {
    ensure_records(records)?;
    let columns = options
        .columns
        .clone()
        .unwrap_or_else(|| auto_detect_columns(records));
    let columns = calculate_widths(records, &columns, &options.date_format);
    let merge_across = columns.len().saturating_sub(1);

    let mut rows = String::new();
    if let Some(title) = &options.title {
        rows.push_str(&merged_row("title", merge_across, title, Some(30)));
    }
    if options.include_timestamp {
        let stamp = date::now(date::DEFAULT_DATETIME_FORMAT);
        rows.push_str(&merged_row(
            "timestamp",
            merge_across,
            &format!("Exported at: {stamp}"),
            None,
        ));
    }
    if options.title.is_some() || options.include_timestamp {
        rows.push_str("<Row></Row>\n");
    }

    rows.push_str("<Row ss:Height=\"25\">\n");
    for col in &columns {
        rows.push_str(&format!(
            "<Cell ss:StyleID=\"header\"><Data ss:Type=\"String\">{}</Data></Cell>\n",
            escape_xml(col.title())
        ));
    }
    rows.push_str("</Row>\n");

    for record in records {
        rows.push_str("<Row>\n");
        for col in &columns {
            let value = lookup(record, &col.key);
            let (kind, text) = excel_cell(value.as_ref(), col.format, &options.date_format);
            rows.push_str(&format!(
                "<Cell ss:StyleID=\"data\"><Data ss:Type=\"{}\">{}</Data></Cell>\n",
                kind.as_str(),
                escape_xml(&text)
            ));
        }
        rows.push_str("</Row>\n");
    }

    let widths: String = columns
        .iter()
        .map(|c| format!("<Column ss:Width=\"{}\"/>\n", c.width.unwrap_or(DEFAULT_WIDTH)))
        .collect();

    let mut xml = String::from(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
         <?mso-application progid=\"Excel.Sheet\"?>\n\
         <Workbook xmlns=\"urn:schemas-microsoft-com:office:spreadsheet\"\n    \
         xmlns:ss=\"urn:schemas-microsoft-com:office:spreadsheet\">\n",
    );
    xml.push_str(&styles(&options.header_style));
    xml.push_str(&format!(
        "  <Worksheet ss:Name=\"{}\">\n<Table>\n",
        escape_xml(&sanitize_sheet_name(&options.sheet_name))
    ));
    xml.push_str(&widths);
    xml.push_str(&rows);
    xml.push_str("</Table>\n  </Worksheet>\n</Workbook>\n");

    debug!(rows = records.len(), columns = columns.len(), "built excel workbook");
    Ok(xml)
}
