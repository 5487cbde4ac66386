//! Rendering engine output: text tables, spreadsheets, delimited files and
//! bar charts.

use rust_xlsxwriter::{Format, Workbook, XlsxError};
use serde::Serialize;

use std::{
    fmt::Display,
    fs::File,
    io::Write,
    path::Path,
    str::FromStr,
};

use crate::{
    finance::{DailyRevenue, ProfitLine, RevenueSummary},
    store::Entry,
    Error, InventoryEntry, Money, PurchaseRecord, Result, SaleRecord,
};

/// A record that can be shown as one row of a table or delimited file.
///
/// `HEADERS` must name the fields in the order serde serializes them, since
/// delimited export writes them as the header row.
pub trait Row: Serialize {
    const HEADERS: &'static [&'static str];

    fn cells(&self) -> Vec<String>;
}

impl Row for PurchaseRecord {
    const HEADERS: &'static [&'static str] = <Self as Entry>::COLUMNS;

    fn cells(&self) -> Vec<String> {
        vec![
            self.id.to_string(),
            self.product.clone(),
            self.quantity.to_string(),
            self.unit_price.to_string(),
            self.purchase_date.to_string(),
            self.expiration_date.to_string(),
        ]
    }
}

impl Row for SaleRecord {
    const HEADERS: &'static [&'static str] = <Self as Entry>::COLUMNS;

    fn cells(&self) -> Vec<String> {
        vec![
            self.id.to_string(),
            self.product.clone(),
            self.quantity.to_string(),
            self.unit_price.to_string(),
            self.sale_date.to_string(),
        ]
    }
}

impl Row for InventoryEntry {
    const HEADERS: &'static [&'static str] = <Self as Entry>::COLUMNS;

    fn cells(&self) -> Vec<String> {
        vec![
            self.product.clone(),
            self.quantity.to_string(),
            self.expiration_date.to_string(),
        ]
    }
}

impl Row for RevenueSummary {
    const HEADERS: &'static [&'static str] = &["start_date", "end_date", "total_revenue"];

    fn cells(&self) -> Vec<String> {
        vec![
            self.start_date.to_string(),
            self.end_date.to_string(),
            self.total_revenue.to_string(),
        ]
    }
}

impl Row for DailyRevenue {
    const HEADERS: &'static [&'static str] = &["date", "revenue"];

    fn cells(&self) -> Vec<String> {
        vec![self.date.to_string(), self.revenue.to_string()]
    }
}

impl Row for ProfitLine {
    const HEADERS: &'static [&'static str] = &["product", "date", "profit"];

    fn cells(&self) -> Vec<String> {
        vec![
            self.product.clone(),
            self.date.to_string(),
            self.profit.to_string(),
        ]
    }
}

/// An aligned text table.
///
/// Columns whose every cell is a number are right-aligned; everything else
/// is left-aligned.
///
/// To get a printable version of the table, use its [`Display`] implementation.
#[derive(Debug, Default)]
pub struct Table {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
    footer: Option<Vec<String>>,
}

impl Table {
    #[must_use]
    pub fn new(headers: &[&str]) -> Self {
        Self {
            headers: headers.iter().map(ToString::to_string).collect(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn from_rows<R: Row>(rows: &[R]) -> Self {
        let mut table = Self::new(R::HEADERS);
        for row in rows {
            table.push(row.cells());
        }
        table
    }

    pub fn push(&mut self, cells: Vec<String>) {
        self.rows.push(cells);
    }

    /// Sets a final row, shown below a separator line.
    #[must_use]
    pub fn with_footer(mut self, cells: Vec<String>) -> Self {
        self.footer = Some(cells);
        self
    }

    fn widths(&self) -> Vec<usize> {
        let mut widths: Vec<usize> = self.headers.iter().map(String::len).collect();
        for row in self.rows.iter().chain(&self.footer) {
            for (i, cell) in row.iter().enumerate() {
                if i < widths.len() {
                    widths[i] = widths[i].max(cell.chars().count());
                }
            }
        }
        widths
    }

    fn numeric(&self, column: usize) -> bool {
        !self.rows.is_empty()
            && self
                .rows
                .iter()
                .filter_map(|row| row.get(column))
                .all(|cell| cell.parse::<f64>().is_ok())
    }

    fn write_row(
        &self,
        f: &mut std::fmt::Formatter<'_>,
        cells: &[String],
        widths: &[usize],
    ) -> std::fmt::Result {
        let mut line = String::new();
        for (i, width) in widths.iter().enumerate() {
            let cell = cells.get(i).map_or("", String::as_str);
            if i > 0 {
                line.push_str("  ");
            }
            if self.numeric(i) {
                line.push_str(&format!("{cell:>width$}"));
            } else {
                line.push_str(&format!("{cell:<width$}"));
            }
        }
        writeln!(f, "{}", line.trim_end())
    }
}

impl Display for Table {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let widths = self.widths();
        let length = widths.iter().sum::<usize>() + 2 * widths.len().saturating_sub(1);
        self.write_row(f, &self.headers, &widths)?;
        writeln!(f, "{:-<length$}", "")?;
        if self.rows.is_empty() {
            writeln!(f, "(no records)")?;
        }
        for row in &self.rows {
            self.write_row(f, row, &widths)?;
        }
        if let Some(footer) = &self.footer {
            writeln!(f, "{:-<length$}", "")?;
            self.write_row(f, footer, &widths)?;
        }
        Ok(())
    }
}

/// The file formats records can be exported to.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum ExportFormat {
    /// An Excel workbook with a single sheet.
    #[default]
    Xlsx,
    Csv,
    Tsv,
}

impl ExportFormat {
    #[must_use]
    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Xlsx => "xlsx",
            ExportFormat::Csv => "csv",
            ExportFormat::Tsv => "tsv",
        }
    }

    /// The field separator, for the delimited text formats.
    #[must_use]
    pub fn delimiter(self) -> Option<u8> {
        match self {
            ExportFormat::Xlsx => None,
            ExportFormat::Csv => Some(b','),
            ExportFormat::Tsv => Some(b'\t'),
        }
    }
}

impl Display for ExportFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "xlsx" => Ok(ExportFormat::Xlsx),
            "csv" => Ok(ExportFormat::Csv),
            "tsv" => Ok(ExportFormat::Tsv),
            other => Err(format!(
                "unknown export format {other:?} (expected xlsx, csv or tsv)"
            )),
        }
    }
}

/// Writes `rows` as a delimited file with one header row.
///
/// The header is written even when there are no rows.
///
/// # Errors
///
/// Returns any error from serializing the rows or writing to `wtr`.
pub fn write_delimited<R: Row, W: Write>(
    wtr: W,
    rows: &[R],
    delimiter: u8,
) -> csv::Result<()> {
    let mut wtr = csv::WriterBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .from_writer(wtr);
    wtr.write_record(R::HEADERS)?;
    for row in rows {
        wtr.serialize(row)?;
    }
    wtr.flush()?;
    Ok(())
}

/// Writes `rows` to a workbook at `path`: a bold header row, then one row
/// per record.
///
/// Cells holding a number (ids, quantities, amounts) are stored as numbers so
/// the spreadsheet can sum them. Everything else, dates included, is text.
///
/// # Errors
///
/// Returns [`Error::Spreadsheet`] if the workbook cannot be built or saved.
pub fn write_xlsx<R: Row>(path: &Path, rows: &[R]) -> Result<()> {
    let failed = |source| Error::Spreadsheet {
        path: path.to_path_buf(),
        source,
    };
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    let bold = Format::new().set_bold();
    for (col, header) in R::HEADERS.iter().enumerate() {
        sheet
            .write_string_with_format(0, column(col).map_err(failed)?, *header, &bold)
            .map_err(failed)?;
    }
    for (i, record) in rows.iter().enumerate() {
        let row = u32::try_from(i + 1).map_err(|_| failed(XlsxError::RowColumnLimitError))?;
        for (col, cell) in record.cells().iter().enumerate() {
            let col = column(col).map_err(failed)?;
            let written = match number(cell) {
                Some(n) => sheet.write_number(row, col, n),
                None => sheet.write_string(row, col, cell),
            };
            written.map_err(failed)?;
        }
    }
    workbook.save(path).map_err(failed)
}

fn column(index: usize) -> std::result::Result<u16, XlsxError> {
    u16::try_from(index).map_err(|_| XlsxError::RowColumnLimitError)
}

/// Reads a cell as a plain decimal number. Product names such as `NaN` or
/// `1e3` stay text.
fn number(cell: &str) -> Option<f64> {
    let digits = cell.strip_prefix('-').unwrap_or(cell);
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit() || c == '.') {
        return None;
    }
    cell.parse().ok()
}

/// Exports `rows` to the file at `path` in `format`, replacing the file if
/// it exists.
///
/// # Errors
///
/// Returns [`Error::Io`] if a delimited file cannot be created or written,
/// or [`Error::Spreadsheet`] if a workbook cannot be saved.
pub fn export<R: Row>(path: impl AsRef<Path>, rows: &[R], format: ExportFormat) -> Result<()> {
    let path = path.as_ref();
    match format.delimiter() {
        Some(delimiter) => {
            let file = File::create(path).map_err(|e| Error::io(path, e))?;
            write_delimited(file, rows, delimiter).map_err(|e| Error::from_csv(path, e))?;
        }
        None => write_xlsx(path, rows)?,
    }
    tracing::info!(path = %path.display(), rows = rows.len(), %format, "exported");
    Ok(())
}

/// A horizontal bar chart of money amounts, drawn with text.
///
/// Bars are scaled so the largest amount fills [`BarChart::WIDTH`] columns.
/// Negative amounts are drawn with `-` instead of `#`.
#[derive(Debug)]
pub struct BarChart {
    title: String,
    bars: Vec<(String, Money)>,
}

impl BarChart {
    pub const WIDTH: usize = 40;

    #[must_use]
    pub fn new(title: impl Into<String>, bars: Vec<(String, Money)>) -> Self {
        Self {
            title: title.into(),
            bars,
        }
    }

    /// Revenue per day, as a time series.
    #[must_use]
    pub fn daily_revenue(title: impl Into<String>, days: &[DailyRevenue]) -> Self {
        Self::new(
            title,
            days.iter().map(|d| (d.date.to_string(), d.revenue)).collect(),
        )
    }

    fn bar_length(&self, amount: Money) -> usize {
        let max = self
            .bars
            .iter()
            .map(|(_, m)| m.cents().unsigned_abs())
            .max()
            .unwrap_or(0);
        if max == 0 {
            return 0;
        }
        let scaled =
            u128::from(amount.cents().unsigned_abs()) * Self::WIDTH as u128 / u128::from(max);
        usize::try_from(scaled).unwrap_or(Self::WIDTH)
    }
}

impl Display for BarChart {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "{}", self.title)?;
        let width = self
            .bars
            .iter()
            .map(|(label, _)| label.chars().count())
            .max()
            .unwrap_or(0);
        for (label, amount) in &self.bars {
            let mark = if amount.is_negative() { "-" } else { "#" };
            let bar = mark.repeat(self.bar_length(*amount));
            writeln!(
                f,
                "{label:width$} |{bar:<bar_width$} {amount:>12}",
                bar_width = Self::WIDTH
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    fn date(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    fn lines() -> Vec<ProfitLine> {
        vec![
            ProfitLine {
                product: "milk".into(),
                date: date("2024-01-10"),
                profit: Money::from_cents(450),
            },
            ProfitLine {
                product: "sourdough bread".into(),
                date: date("2024-01-05"),
                profit: Money::from_cents(-1200),
            },
        ]
    }

    #[test]
    fn table_display_fn_aligns_columns() {
        let table = Table::from_rows(&lines()).with_footer(vec![
            "Total".into(),
            String::new(),
            Money::from_cents(-750).to_string(),
        ]);
        let expected = "\
product          date        profit
-----------------------------------
milk             2024-01-10    4.50
sourdough bread  2024-01-05  -12.00
-----------------------------------
Total                         -7.50
";
        assert_eq!(table.to_string(), expected);
    }

    #[test]
    fn table_display_fn_marks_empty_tables() {
        let table = Table::from_rows::<InventoryEntry>(&[]);
        assert_eq!(
            table.to_string(),
            format!(
                "product  quantity  expiration_date\n{}\n(no records)\n",
                "-".repeat(34)
            )
        );
    }

    #[test]
    fn write_delimited_fn_writes_header_and_rows() {
        let mut out = Vec::new();
        write_delimited(&mut out, &lines(), b',').unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "product,date,profit\nmilk,2024-01-10,4.50\nsourdough bread,2024-01-05,-12.00\n"
        );

        let mut out = Vec::new();
        write_delimited::<ProfitLine, _>(&mut out, &[], b'\t').unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "product\tdate\tprofit\n");
    }

    #[test]
    fn export_fn_writes_file_readable_as_log() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("inventory_data.csv");
        let stock = vec![InventoryEntry {
            product: "bread".into(),
            quantity: 6,
            expiration_date: date("2024-03-01"),
        }];
        export(&path, &stock, ExportFormat::Csv).unwrap();
        let mut rdr = csv::Reader::from_path(&path).unwrap();
        let back: Vec<InventoryEntry> = rdr
            .deserialize()
            .collect::<csv::Result<_>>()
            .unwrap();
        assert_eq!(back, stock);
    }

    #[test]
    fn export_format_from_str_fn_accepts_known_formats() {
        assert_eq!("csv".parse::<ExportFormat>().unwrap(), ExportFormat::Csv);
        assert_eq!("TSV".parse::<ExportFormat>().unwrap(), ExportFormat::Tsv);
        assert_eq!("xlsx".parse::<ExportFormat>().unwrap(), ExportFormat::Xlsx);
        assert_eq!(ExportFormat::default(), ExportFormat::Xlsx);
        assert!("ods".parse::<ExportFormat>().is_err());
    }

    #[test]
    fn bar_chart_display_fn_scales_bars_to_largest_amount() {
        let chart = BarChart::new(
            "Profit per product",
            vec![
                ("milk".into(), Money::from_cents(400)),
                ("eggs".into(), Money::from_cents(-200)),
                ("tea".into(), Money::ZERO),
            ],
        );
        let rendered = chart.to_string();
        let rows: Vec<&str> = rendered.lines().collect();
        assert_eq!(rows[0], "Profit per product");
        assert_eq!(rows[1], format!("milk |{}         4.00", "#".repeat(40)));
        assert_eq!(
            rows[2],
            format!("eggs |{}{}        -2.00", "-".repeat(20), " ".repeat(20))
        );
        assert_eq!(rows[3], format!("tea  |{}         0.00", " ".repeat(40)));
    }

    #[test]
    fn export_fn_writes_workbook_with_header_and_typed_cells() {
        use calamine::{open_workbook, Data, Reader, Xlsx};

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("profit_data.xlsx");
        export(&path, &lines(), ExportFormat::Xlsx).unwrap();

        let mut workbook: Xlsx<_> = open_workbook(&path).unwrap();
        let range = workbook.worksheet_range("Sheet1").unwrap();
        let rows: Vec<Vec<Data>> = range.rows().map(<[Data]>::to_vec).collect();
        let text = |s: &str| Data::String(s.into());
        assert_eq!(
            rows,
            vec![
                vec![text("product"), text("date"), text("profit")],
                vec![text("milk"), text("2024-01-10"), Data::Float(4.5)],
                vec![text("sourdough bread"), text("2024-01-05"), Data::Float(-12.0)],
            ]
        );
    }

    #[test]
    fn export_fn_writes_header_only_workbook_for_no_rows() {
        use calamine::{open_workbook, Data, Reader, Xlsx};

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sold_data.xlsx");
        export::<SaleRecord>(&path, &[], ExportFormat::Xlsx).unwrap();

        let mut workbook: Xlsx<_> = open_workbook(&path).unwrap();
        let range = workbook.worksheet_range("Sheet1").unwrap();
        assert_eq!(range.height(), 1);
        let header: Vec<String> = range
            .rows()
            .next()
            .unwrap()
            .iter()
            .map(Data::to_string)
            .collect();
        assert_eq!(header, SaleRecord::COLUMNS);
    }

    #[test]
    fn number_fn_keeps_names_that_only_look_numeric_as_text() {
        assert_eq!(number("4.50"), Some(4.5));
        assert_eq!(number("-12.00"), Some(-12.0));
        assert_eq!(number("42"), Some(42.0));
        for cell in ["NaN", "inf", "1e3", "2024-01-10", "", "-"] {
            assert_eq!(number(cell), None, "{cell:?}");
        }
    }
}
