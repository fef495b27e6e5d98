use rust_xlsxwriter::Workbook;
use serde_json::{Map, Value};

use crate::{core::options::ConversionOptions, error::NodeError, item::collect_columns};

/// Serializes a batch of JSON records into one XLSX payload with a single
/// worksheet.
pub struct SheetBatchWriter {
    sheet_name: Option<String>,
    header_row: bool,
}

impl SheetBatchWriter {
    pub fn from_options(options: &ConversionOptions) -> Self {
        Self {
            sheet_name: options.sheet_name.clone(),
            header_row: options.header_row,
        }
    }

    pub fn write_batch(&self, records: &[&Map<String, Value>]) -> Result<Vec<u8>, NodeError> {
        let columns = collect_columns(records);

        let mut workbook = Workbook::new();
        let worksheet = workbook.add_worksheet();
        if let Some(name) = &self.sheet_name {
            worksheet
                .set_name(name)
                .map_err(|error| NodeError::Serialize(error.to_string()))?;
        }

        let mut row_index: u32 = 0;
        if self.header_row {
            for (col_index, column) in columns.iter().enumerate() {
                worksheet
                    .write(row_index, col_index as u16, column)
                    .map_err(|error| NodeError::Serialize(error.to_string()))?;
            }
            row_index += 1;
        }

        for record in records {
            for (col_index, column) in columns.iter().enumerate() {
                let Some(value) = record.get(column) else {
                    continue;
                };
                write_cell(worksheet, row_index, col_index as u16, value)?;
            }
            row_index += 1;
        }

        workbook
            .save_to_buffer()
            .map_err(|error| NodeError::Serialize(error.to_string()))
    }
}

fn write_cell(
    worksheet: &mut rust_xlsxwriter::Worksheet,
    row: u32,
    col: u16,
    value: &Value,
) -> Result<(), NodeError> {
    let result = match value {
        Value::Null => return Ok(()),
        Value::String(text) => worksheet.write(row, col, text.as_str()),
        Value::Number(number) => match number.as_f64() {
            Some(float) => worksheet.write(row, col, float),
            None => worksheet.write(row, col, number.to_string()),
        },
        Value::Bool(flag) => worksheet.write(row, col, *flag),
        // Nested values have no cell representation; keep them as JSON
        // text.
        other => {
            let text =
                serde_json::to_string(other).map_err(|error| NodeError::Serialize(error.to_string()))?;
            worksheet.write(row, col, text)
        }
    };
    result
        .map(|_| ())
        .map_err(|error| NodeError::Serialize(error.to_string()))
}
