use log::{debug, error};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{
    core::{
        item::{BinaryData, InputItem, OutputItem, PairedItem, Row},
        options::{ConversionOptions, FileFormat, ResolvedFormat},
    },
    error::NodeError,
};

/// Direction of one node run: extract rows from binary files, or
/// serialize the batch's records into one binary file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Operation {
    FromFile,
    ToFile,
}

/// The tabular-file conversion node.
///
/// Options are resolved once up front and stay immutable for the run.
/// Items are processed strictly in order, one at a time; each item's
/// conversion is self-contained and the only cross-item aggregation point
/// is the write direction, which consumes the batch read-only.
///
/// # Examples
///
/// ```
/// use rowfile::core::{
///     item::{BinaryData, InputItem},
///     node::{Operation, TabularFileNode},
///     options::ConversionOptions,
/// };
///
/// let csv = b"city,pop\nBoston,4628910".to_vec();
/// let item = InputItem::default()
///     .with_binary("data", BinaryData::from_bytes(csv, "text/csv"));
///
/// let node = TabularFileNode::new(ConversionOptions::default());
/// let output = node.run(Operation::FromFile, &[item]).unwrap();
///
/// assert_eq!(output.len(), 1);
/// assert_eq!(output[0].json["city"], "Boston");
/// ```
pub struct TabularFileNode {
    options: ConversionOptions,
    continue_on_fail: bool,
}

impl TabularFileNode {
    pub fn new(options: ConversionOptions) -> Self {
        Self {
            options,
            continue_on_fail: false,
        }
    }

    /// When enabled, a failing item becomes an error record instead of
    /// aborting the run.
    pub fn continue_on_fail(mut self, yes: bool) -> Self {
        self.continue_on_fail = yes;
        self
    }

    pub fn options(&self) -> &ConversionOptions {
        &self.options
    }

    pub fn run(&self, operation: Operation, items: &[InputItem]) -> Result<Vec<OutputItem>, NodeError> {
        match operation {
            Operation::FromFile => self.from_file(items),
            Operation::ToFile => self.to_file(items),
        }
    }

    /// Read direction: one input item yields zero or more row records.
    ///
    /// A failing item contributes zero real rows. With continue-on-fail it
    /// contributes one error record tagged with its index; otherwise the
    /// run aborts with the failure attributed to that index.
    pub fn from_file(&self, items: &[InputItem]) -> Result<Vec<OutputItem>, NodeError> {
        debug!("Start reading batch of {} items", items.len());

        let mut output = Vec::new();
        for (index, item) in items.iter().enumerate() {
            match self.extract_item(item) {
                Ok(rows) => {
                    output.extend(
                        rows.into_iter()
                            .map(|row| OutputItem::from_row(row, index)),
                    );
                }
                Err(err) => {
                    if self.continue_on_fail {
                        error!("Error occured during item {} conversion: {}", index, err);
                        output.push(OutputItem::error(
                            err.to_string(),
                            PairedItem::Single(index),
                        ));
                    } else {
                        return Err(err.for_item(index));
                    }
                }
            }
        }

        debug!("End reading batch: {} output items", output.len());
        Ok(output)
    }

    /// Write direction: the whole batch is one unit of work producing a
    /// single binary output item, all-or-nothing.
    pub fn to_file(&self, items: &[InputItem]) -> Result<Vec<OutputItem>, NodeError> {
        debug!("Start writing batch of {} items", items.len());

        // An empty batch has no item span to pair an output against.
        if items.is_empty() {
            return Ok(Vec::new());
        }

        let paired_item = PairedItem::Batch {
            first: 0,
            last: items.len().saturating_sub(1),
        };
        match self.serialize_batch(items, paired_item) {
            Ok(item) => Ok(vec![item]),
            Err(err) => {
                if self.continue_on_fail {
                    error!("Error occured during batch serialization: {}", err);
                    Ok(vec![OutputItem::error(err.to_string(), paired_item)])
                } else {
                    Err(err)
                }
            }
        }
    }

    fn extract_item(&self, item: &InputItem) -> Result<Vec<Row>, NodeError> {
        let property = &self.options.binary_property_name;
        let binary = item
            .binary(property)
            .ok_or_else(|| NodeError::MissingBinaryProperty(property.clone()))?;

        match self.options.file_format.detect(binary) {
            ResolvedFormat::Csv => self.extract_csv(binary),
            ResolvedFormat::Xlsx => self.extract_sheet(binary),
        }
    }

    #[cfg(feature = "csv")]
    fn extract_csv(&self, binary: &BinaryData) -> Result<Vec<Row>, NodeError> {
        use crate::item::csv::csv_reader::CsvRowReaderBuilder;

        // Scoped acquisition: the stream lives for this call only and is
        // released on every exit path, including an early stop at the row
        // cap.
        let stream = binary.data.reader()?;
        let reader = CsvRowReaderBuilder::from_options(&self.options).from_reader(stream)?;
        reader.read_all()
    }

    #[cfg(not(feature = "csv"))]
    fn extract_csv(&self, _binary: &BinaryData) -> Result<Vec<Row>, NodeError> {
        Err(NodeError::UnsupportedFormat("csv".to_string()))
    }

    #[cfg(feature = "xlsx")]
    fn extract_sheet(&self, binary: &BinaryData) -> Result<Vec<Row>, NodeError> {
        use crate::item::sheet::sheet_reader::SheetRowReaderBuilder;

        let reader = SheetRowReaderBuilder::from_options(&self.options).from_source(&binary.data)?;
        reader.read_all()
    }

    #[cfg(not(feature = "xlsx"))]
    fn extract_sheet(&self, _binary: &BinaryData) -> Result<Vec<Row>, NodeError> {
        Err(NodeError::UnsupportedFormat("xlsx".to_string()))
    }

    fn serialize_batch(
        &self,
        items: &[InputItem],
        paired_item: PairedItem,
    ) -> Result<OutputItem, NodeError> {
        let records: Vec<&Map<String, Value>> = items.iter().map(|item| &item.json).collect();

        // The write direction needs a concrete target; without a hint the
        // spreadsheet binary is the richer default.
        let (bytes, mime_type, extension) = match self.options.file_format {
            FileFormat::Csv => (self.serialize_csv(&records)?, "text/csv", "csv"),
            FileFormat::Xlsx | FileFormat::Autodetect => (
                self.serialize_sheet(&records)?,
                "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
                "xlsx",
            ),
        };

        let property = self.options.binary_property_name.clone();
        let data = BinaryData::from_bytes(bytes, mime_type)
            .with_extension(extension)
            .with_file_name(format!("{property}.{extension}"));
        Ok(OutputItem::from_binary(property, data, paired_item))
    }

    #[cfg(feature = "csv")]
    fn serialize_csv(&self, records: &[&Map<String, Value>]) -> Result<Vec<u8>, NodeError> {
        use crate::item::csv::csv_writer::CsvBatchWriter;

        CsvBatchWriter::from_options(&self.options).write_batch(records)
    }

    #[cfg(not(feature = "csv"))]
    fn serialize_csv(&self, _records: &[&Map<String, Value>]) -> Result<Vec<u8>, NodeError> {
        Err(NodeError::UnsupportedFormat("csv".to_string()))
    }

    #[cfg(feature = "xlsx")]
    fn serialize_sheet(&self, records: &[&Map<String, Value>]) -> Result<Vec<u8>, NodeError> {
        use crate::item::sheet::sheet_writer::SheetBatchWriter;

        SheetBatchWriter::from_options(&self.options).write_batch(records)
    }

    #[cfg(not(feature = "xlsx"))]
    fn serialize_sheet(&self, _records: &[&Map<String, Value>]) -> Result<Vec<u8>, NodeError> {
        Err(NodeError::UnsupportedFormat("xlsx".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn node() -> TabularFileNode {
        TabularFileNode::new(ConversionOptions::default())
    }

    #[test]
    fn missing_binary_property_aborts_by_default() {
        let items = vec![InputItem::default()];

        let result = node().from_file(&items);

        match result {
            Err(NodeError::Item { index, source }) => {
                assert_eq!(index, 0);
                assert!(matches!(*source, NodeError::MissingBinaryProperty(_)));
            }
            other => panic!("expected an item-attributed error, got {other:?}"),
        }
    }

    #[test]
    fn missing_binary_property_becomes_an_error_record_when_tolerated() {
        let items = vec![InputItem::default()];

        let output = node().continue_on_fail(true).from_file(&items).unwrap();

        assert_eq!(output.len(), 1);
        assert!(output[0].is_error());
        assert_eq!(output[0].paired_item, PairedItem::Single(0));
        assert!(output[0].json["error"]
            .as_str()
            .unwrap()
            .contains("binary property"));
    }

    #[cfg(feature = "csv")]
    #[test]
    fn csv_items_map_to_one_output_per_row() {
        let csv = b"city,pop\nBoston,4628910\nConcord,42695".to_vec();
        let items = vec![
            InputItem::default().with_binary("data", BinaryData::from_bytes(csv, "text/csv")),
        ];

        let output = node().from_file(&items).unwrap();

        assert_eq!(output.len(), 2);
        assert_eq!(output[0].json["city"], json!("Boston"));
        assert_eq!(output[0].paired_item, PairedItem::Single(0));
        assert_eq!(output[1].paired_item, PairedItem::Single(0));
    }

    #[cfg(feature = "csv")]
    #[test]
    fn write_direction_produces_one_batch_tagged_binary() {
        let options = ConversionOptions {
            file_format: FileFormat::Csv,
            ..ConversionOptions::default()
        };
        let items = vec![
            InputItem::from_json(json!({"a": 1}).as_object().unwrap().clone()),
            InputItem::from_json(json!({"a": 2}).as_object().unwrap().clone()),
            InputItem::from_json(json!({"a": 3}).as_object().unwrap().clone()),
        ];

        let output = TabularFileNode::new(options).to_file(&items).unwrap();

        assert_eq!(output.len(), 1);
        assert_eq!(output[0].paired_item, PairedItem::Batch { first: 0, last: 2 });
        let binary = output[0].binary.get("data").expect("binary output");
        assert_eq!(binary.mime_type, "text/csv");
        assert_eq!(binary.file_extension.as_deref(), Some("csv"));
        let bytes = binary.data.bytes().unwrap();
        assert_eq!(String::from_utf8_lossy(&bytes), "a\n1\n2\n3\n");
    }

    #[test]
    fn empty_batch_write_produces_no_output() {
        let output = node().to_file(&[]).unwrap();

        assert!(output.is_empty());
    }

    #[cfg(feature = "xlsx")]
    #[test]
    fn unparseable_spreadsheet_aborts_with_item_context() {
        let garbage = vec![0u8; 16];
        let items = vec![
            InputItem::default().with_binary(
                "data",
                BinaryData::from_bytes(garbage, "application/octet-stream"),
            ),
        ];

        let result = node().from_file(&items);

        assert!(matches!(result, Err(NodeError::Item { index: 0, .. })));
    }
}
