use csv::WriterBuilder;
use serde_json::{Map, Value};

use crate::{core::options::ConversionOptions, error::NodeError, item::collect_columns};

/// Serializes a batch of JSON records into one CSV payload.
///
/// The column set is the union of the records' keys in first-seen order.
pub struct CsvBatchWriter {
    delimiter: u8,
    header_row: bool,
}

impl CsvBatchWriter {
    pub fn from_options(options: &ConversionOptions) -> Self {
        Self {
            delimiter: options.delimiter_byte(),
            header_row: options.header_row,
        }
    }

    pub fn write_batch(&self, records: &[&Map<String, Value>]) -> Result<Vec<u8>, NodeError> {
        let columns = collect_columns(records);
        // Without a single column there is nothing to emit; the csv
        // writer rejects zero-field records.
        if columns.is_empty() {
            return Ok(Vec::new());
        }

        let mut wtr = WriterBuilder::new()
            .delimiter(self.delimiter)
            .has_headers(false)
            .flexible(false)
            .from_writer(vec![]);

        if self.header_row {
            wtr.write_record(&columns)
                .map_err(|error| NodeError::Serialize(error.to_string()))?;
        }

        for record in records {
            let fields: Result<Vec<String>, NodeError> = columns
                .iter()
                .map(|column| match record.get(column) {
                    Some(value) => field_text(value),
                    None => Ok(String::new()),
                })
                .collect();
            wtr.write_record(fields?)
                .map_err(|error| NodeError::Serialize(error.to_string()))?;
        }

        wtr.into_inner()
            .map_err(|error| NodeError::Serialize(error.to_string()))
    }
}

fn field_text(value: &Value) -> Result<String, NodeError> {
    match value {
        Value::Null => Ok(String::new()),
        Value::String(text) => Ok(text.clone()),
        Value::Number(number) => Ok(number.to_string()),
        Value::Bool(flag) => Ok(flag.to_string()),
        // Nested values have no tabular shape; keep them as JSON text.
        other => serde_json::to_string(other)
            .map_err(|error| NodeError::Serialize(error.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected an object"),
        }
    }

    #[test]
    fn batch_becomes_one_csv_payload_with_headers() -> Result<(), NodeError> {
        let first = record(json!({"city": "Boston", "pop": 4628910}));
        let second = record(json!({"city": "Concord", "pop": 42695}));

        let writer = CsvBatchWriter::from_options(&ConversionOptions::default());
        let bytes = writer.write_batch(&[&first, &second])?;

        assert_eq!(
            String::from_utf8(bytes).unwrap(),
            "city,pop\nBoston,4628910\nConcord,42695\n"
        );
        Ok(())
    }

    #[test]
    fn late_columns_are_appended_and_backfilled_empty() -> Result<(), NodeError> {
        let first = record(json!({"a": 1}));
        let second = record(json!({"a": 2, "b": "x"}));

        let writer = CsvBatchWriter::from_options(&ConversionOptions::default());
        let bytes = writer.write_batch(&[&first, &second])?;

        assert_eq!(String::from_utf8(bytes).unwrap(), "a,b\n1,\n2,x\n");
        Ok(())
    }

    #[test]
    fn header_row_can_be_disabled() -> Result<(), NodeError> {
        let first = record(json!({"a": true, "b": Value::Null}));

        let options = ConversionOptions {
            header_row: false,
            ..ConversionOptions::default()
        };
        let writer = CsvBatchWriter::from_options(&options);
        let bytes = writer.write_batch(&[&first])?;

        assert_eq!(String::from_utf8(bytes).unwrap(), "true,\n");
        Ok(())
    }
}
