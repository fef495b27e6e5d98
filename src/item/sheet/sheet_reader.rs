use std::{
    cell::RefCell,
    io::{Cursor, Read, Seek},
};

use calamine::{
    open_workbook_auto, open_workbook_auto_from_rs, Data, DataType, Range, Reader, Sheets,
};
use serde_json::{Map, Number, Value};

use crate::{
    core::{
        item::{BinarySource, Row},
        options::{ConversionOptions, RangeSpec},
    },
    error::NodeError,
};

/// A spreadsheet row reader producing [`Row`] values from one sheet of a
/// workbook.
///
/// The workbook is loaded, converted, and dropped inside
/// [`SheetRowReaderBuilder::from_source`]; the reader itself only holds the
/// extracted rows.
pub struct SheetRowReader {
    rows: RefCell<std::vec::IntoIter<Row>>,
}

impl SheetRowReader {
    /// Returns the next extracted row, or `None` once the sheet is
    /// exhausted.
    pub fn read(&self) -> Result<Option<Row>, NodeError> {
        Ok(self.rows.borrow_mut().next())
    }

    pub fn read_all(&self) -> Result<Vec<Row>, NodeError> {
        let mut rows = Vec::new();
        while let Some(row) = self.read()? {
            rows.push(row);
        }
        Ok(rows)
    }
}

/// A builder for configuring spreadsheet row reading.
#[derive(Debug, Clone)]
pub struct SheetRowReaderBuilder {
    sheet_name: Option<String>,
    range: Option<RangeSpec>,
    header_row: bool,
    include_empty_cells: bool,
    read_as_string: bool,
    raw_data: bool,
    max_row_count: i64,
}

impl Default for SheetRowReaderBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl SheetRowReaderBuilder {
    pub fn new() -> Self {
        Self {
            sheet_name: None,
            range: None,
            header_row: true,
            include_empty_cells: false,
            read_as_string: false,
            raw_data: false,
            max_row_count: -1,
        }
    }

    pub fn from_options(options: &ConversionOptions) -> Self {
        Self {
            sheet_name: options.sheet_name.clone(),
            range: options.range.clone(),
            header_row: options.header_row,
            include_empty_cells: options.include_empty_cells,
            read_as_string: options.read_as_string,
            raw_data: options.raw_data,
            max_row_count: options.max_row_count,
        }
    }

    pub fn sheet_name(mut self, name: impl Into<String>) -> Self {
        self.sheet_name = Some(name.into());
        self
    }

    pub fn range(mut self, range: RangeSpec) -> Self {
        self.range = Some(range);
        self
    }

    pub fn header_row(mut self, yes: bool) -> Self {
        self.header_row = yes;
        self
    }

    pub fn include_empty_cells(mut self, yes: bool) -> Self {
        self.include_empty_cells = yes;
        self
    }

    pub fn read_as_string(mut self, yes: bool) -> Self {
        self.read_as_string = yes;
        self
    }

    pub fn raw_data(mut self, yes: bool) -> Self {
        self.raw_data = yes;
        self
    }

    pub fn max_row_count(mut self, count: i64) -> Self {
        self.max_row_count = count;
        self
    }

    /// Loads the workbook behind a binary payload and extracts its rows.
    ///
    /// Fails with [`NodeError::EmptyWorkbook`] when the workbook has zero
    /// sheets and with [`NodeError::SheetNotFound`] when a requested sheet
    /// name is absent. A sheet without data rows yields a reader with zero
    /// rows, not an error.
    pub fn from_source(self, source: &BinarySource) -> Result<SheetRowReader, NodeError> {
        match source {
            BinarySource::Memory(buf) => {
                let sheets = open_workbook_auto_from_rs(Cursor::new(buf.as_slice()))
                    .map_err(|error| NodeError::Parse(error.to_string()))?;
                self.extract(sheets)
            }
            BinarySource::File(path) => {
                let sheets = open_workbook_auto(path)
                    .map_err(|error| NodeError::Parse(error.to_string()))?;
                self.extract(sheets)
            }
        }
    }

    fn extract<RS: Read + Seek>(self, mut sheets: Sheets<RS>) -> Result<SheetRowReader, NodeError> {
        let sheet_names = sheets.sheet_names().to_vec();
        let target = select_sheet(&sheet_names, self.sheet_name.as_deref())?;

        let grid = sheets
            .worksheet_range(&target)
            .map_err(|error| NodeError::Parse(error.to_string()))?;

        let grid = match &self.range {
            Some(RangeSpec::Cells(expr)) => {
                let (start, end) = parse_a1_range(expr)?;
                grid.range(start, end)
            }
            _ => grid,
        };
        let skip_rows = match &self.range {
            Some(RangeSpec::StartRow(row)) => *row as usize,
            _ => 0,
        };

        let rows = self.grid_to_rows(&grid, skip_rows);
        Ok(SheetRowReader {
            rows: RefCell::new(rows.into_iter()),
        })
    }

    fn grid_to_rows(&self, grid: &Range<Data>, skip_rows: usize) -> Vec<Row> {
        let mut data_rows = grid
            .rows()
            .skip(skip_rows)
            .filter(|cells| cells.iter().any(|cell| !matches!(cell, Data::Empty)));

        let headers: Option<Vec<String>> = if self.header_row {
            match data_rows.next() {
                Some(cells) => Some(
                    cells
                        .iter()
                        .enumerate()
                        .map(|(index, cell)| header_name(cell, index))
                        .collect(),
                ),
                None => return Vec::new(),
            }
        } else {
            None
        };

        let mut rows = Vec::new();
        for cells in data_rows {
            if self.max_row_count > -1 && rows.len() as i64 >= self.max_row_count {
                break;
            }
            let row = match &headers {
                Some(headers) => {
                    let mut map = Map::new();
                    for (header, cell) in headers.iter().zip(cells.iter()) {
                        if matches!(cell, Data::Empty) {
                            if self.include_empty_cells {
                                map.insert(header.clone(), Value::String(String::new()));
                            }
                            continue;
                        }
                        map.insert(header.clone(), self.cell_value(cell));
                    }
                    Row::Keyed(map)
                }
                None => Row::Positional(
                    cells
                        .iter()
                        .map(|cell| {
                            if matches!(cell, Data::Empty) && self.include_empty_cells {
                                Value::String(String::new())
                            } else {
                                self.cell_value(cell)
                            }
                        })
                        .collect(),
                ),
            };
            rows.push(row);
        }
        rows
    }

    /// Converts one cell into a JSON value.
    ///
    /// Default coercion keeps native number/bool/string types and renders
    /// date cells as ISO-8601 text. `raw_data` keeps the underlying Excel
    /// serial number instead, `read_as_string` stringifies everything.
    fn cell_value(&self, cell: &Data) -> Value {
        if self.read_as_string {
            return Value::String(cell.to_string());
        }
        match cell {
            Data::Empty => Value::Null,
            Data::Int(value) => Value::Number((*value).into()),
            Data::Float(value) => float_number(*value),
            Data::String(text) => Value::String(text.clone()),
            Data::Bool(flag) => Value::Bool(*flag),
            Data::DateTime(stamp) => {
                if self.raw_data {
                    Number::from_f64(stamp.as_f64()).map_or(Value::Null, Value::Number)
                } else {
                    match cell.as_datetime() {
                        Some(datetime) => {
                            Value::String(datetime.format("%Y-%m-%dT%H:%M:%S").to_string())
                        }
                        None => Number::from_f64(stamp.as_f64())
                            .map_or(Value::Null, Value::Number),
                    }
                }
            }
            Data::DateTimeIso(text) | Data::DurationIso(text) => Value::String(text.clone()),
            Data::Error(error) => Value::String(format!("{error:?}")),
        }
    }
}

/// Converts a cell's float into a JSON number, keeping whole values as
/// integers. Spreadsheet binaries store every number as f64, so without
/// this a written `42` would come back as `42.0` and no longer compare
/// equal to the record it was serialized from.
fn float_number(value: f64) -> Value {
    const I64_RANGE: f64 = 9_007_199_254_740_992.0; // 2^53, exact in f64
    if value.fract() == 0.0 && value.abs() < I64_RANGE {
        Value::Number((value as i64).into())
    } else {
        Number::from_f64(value).map_or(Value::Null, Value::Number)
    }
}

/// Picks the target sheet: a requested name must exist, otherwise the
/// first sheet in declared order is used.
pub(crate) fn select_sheet(
    sheet_names: &[String],
    requested: Option<&str>,
) -> Result<String, NodeError> {
    if sheet_names.is_empty() {
        return Err(NodeError::EmptyWorkbook);
    }
    match requested {
        Some(name) => {
            if sheet_names.iter().any(|candidate| candidate == name) {
                Ok(name.to_string())
            } else {
                Err(NodeError::SheetNotFound(name.to_string()))
            }
        }
        None => Ok(sheet_names[0].clone()),
    }
}

/// Parses an A1-style rectangle like `A2:D10` into zero-based
/// `(row, column)` corner coordinates.
fn parse_a1_range(expr: &str) -> Result<((u32, u32), (u32, u32)), NodeError> {
    let (start, end) = expr
        .split_once(':')
        .ok_or_else(|| NodeError::Parse(format!("Invalid range expression '{expr}'")))?;
    Ok((parse_a1_cell(start.trim())?, parse_a1_cell(end.trim())?))
}

fn parse_a1_cell(cell: &str) -> Result<(u32, u32), NodeError> {
    let letters: String = cell
        .chars()
        .take_while(|c| c.is_ascii_alphabetic())
        .collect();
    let digits = &cell[letters.len()..];
    if letters.is_empty() || digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(NodeError::Parse(format!("Invalid cell reference '{cell}'")));
    }

    let mut column: u32 = 0;
    for c in letters.chars() {
        column = column * 26 + (c.to_ascii_uppercase() as u32 - 'A' as u32 + 1);
    }
    let row: u32 = digits
        .parse()
        .map_err(|_| NodeError::Parse(format!("Invalid cell reference '{cell}'")))?;
    if row == 0 {
        return Err(NodeError::Parse(format!("Invalid cell reference '{cell}'")));
    }
    Ok((row - 1, column - 1))
}

/// Column name for a header cell; empty header cells get their column
/// letter so data below them is not lost.
fn header_name(cell: &Data, index: usize) -> String {
    match cell {
        Data::Empty => column_letter(index),
        other => other.to_string(),
    }
}

fn column_letter(mut index: usize) -> String {
    let mut letters = Vec::new();
    loop {
        letters.push(b'A' + (index % 26) as u8);
        if index < 26 {
            break;
        }
        index = index / 26 - 1;
    }
    letters.reverse();
    String::from_utf8(letters).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_sheet_workbook_is_rejected() {
        let result = select_sheet(&[], None);
        assert!(matches!(result, Err(NodeError::EmptyWorkbook)));

        // Other options cannot rescue a workbook without sheets.
        let result = select_sheet(&[], Some("Sheet1"));
        assert!(matches!(result, Err(NodeError::EmptyWorkbook)));
    }

    #[test]
    fn missing_sheet_name_is_reported_verbatim() {
        let names = vec!["Data".to_string(), "Summary".to_string()];
        let error = select_sheet(&names, Some("Quarterly")).unwrap_err();

        assert!(matches!(error, NodeError::SheetNotFound(_)));
        assert!(error.to_string().contains("Quarterly"));
    }

    #[test]
    fn first_sheet_is_the_default_target() {
        let names = vec!["First".to_string(), "Second".to_string()];
        assert_eq!(select_sheet(&names, None).unwrap(), "First");
        assert_eq!(select_sheet(&names, Some("Second")).unwrap(), "Second");
    }

    #[test]
    fn a1_rectangles_parse_to_zero_based_corners() {
        assert_eq!(parse_a1_range("A1:B2").unwrap(), ((0, 0), (1, 1)));
        assert_eq!(parse_a1_range("A2:D10").unwrap(), ((1, 0), (9, 3)));
        assert_eq!(parse_a1_range("AA1:AB3").unwrap(), ((0, 26), (2, 27)));
    }

    #[test]
    fn malformed_ranges_are_parse_errors() {
        assert!(parse_a1_range("A1").is_err());
        assert!(parse_a1_range("A0:B2").is_err());
        assert!(parse_a1_range("1A:B2").is_err());
        assert!(parse_a1_range(":B2").is_err());
    }

    #[test]
    fn column_letters_follow_spreadsheet_order() {
        assert_eq!(column_letter(0), "A");
        assert_eq!(column_letter(25), "Z");
        assert_eq!(column_letter(26), "AA");
        assert_eq!(column_letter(27), "AB");
    }

    #[test]
    fn string_mode_stringifies_every_cell() {
        let builder = SheetRowReaderBuilder::new().read_as_string(true);
        assert_eq!(builder.cell_value(&Data::Int(42)), Value::String("42".into()));
        assert_eq!(
            builder.cell_value(&Data::Bool(true)),
            Value::String("true".into())
        );
    }

    #[test]
    fn whole_floats_come_back_as_integers() {
        let builder = SheetRowReaderBuilder::new();
        assert_eq!(
            builder.cell_value(&Data::Float(42.0)),
            Value::Number(42.into())
        );
        assert_eq!(
            builder.cell_value(&Data::Float(-7.0)),
            Value::Number((-7).into())
        );
        // Fractional values stay floats.
        assert_eq!(
            builder.cell_value(&Data::Float(2.5)),
            Value::Number(Number::from_f64(2.5).unwrap())
        );
    }

    #[test]
    fn default_coercion_keeps_native_types() {
        let builder = SheetRowReaderBuilder::new();
        assert_eq!(builder.cell_value(&Data::Int(42)), Value::Number(42.into()));
        assert_eq!(builder.cell_value(&Data::Bool(false)), Value::Bool(false));
        assert_eq!(
            builder.cell_value(&Data::String("x".into())),
            Value::String("x".into())
        );
        assert_eq!(builder.cell_value(&Data::Empty), Value::Null);
    }
}
