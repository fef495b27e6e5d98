use std::{borrow::Cow, collections::HashMap, fs::File, io::Read, path::PathBuf};

use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::NodeError;

/// Source of a binary payload attached to an item.
///
/// Payloads either live in memory or are referenced on disk. Both forms
/// expose buffered access for parsers that need `Seek` (spreadsheet
/// binaries) and streaming access for parsers that read forward only (CSV).
#[derive(Debug, Clone)]
pub enum BinarySource {
    Memory(Vec<u8>),
    File(PathBuf),
}

impl BinarySource {
    /// Returns the whole payload as a byte slice, reading the file into
    /// memory when the source is an on-disk reference.
    pub fn bytes(&self) -> Result<Cow<'_, [u8]>, NodeError> {
        match self {
            BinarySource::Memory(buf) => Ok(Cow::Borrowed(buf)),
            BinarySource::File(path) => Ok(Cow::Owned(std::fs::read(path)?)),
        }
    }

    /// Returns a forward-only reader over the payload.
    ///
    /// The caller owns the reader and must drop it as soon as parsing is
    /// done, so file descriptors and buffers are released promptly.
    pub fn reader(&self) -> Result<Box<dyn Read + Send + '_>, NodeError> {
        match self {
            BinarySource::Memory(buf) => Ok(Box::new(buf.as_slice())),
            BinarySource::File(path) => Ok(Box::new(File::open(path)?)),
        }
    }
}

/// A binary payload plus the metadata used for format detection.
#[derive(Debug, Clone)]
pub struct BinaryData {
    pub data: BinarySource,
    pub mime_type: String,
    pub file_extension: Option<String>,
    pub file_name: Option<String>,
}

impl BinaryData {
    pub fn from_bytes(bytes: Vec<u8>, mime_type: impl Into<String>) -> Self {
        Self {
            data: BinarySource::Memory(bytes),
            mime_type: mime_type.into(),
            file_extension: None,
            file_name: None,
        }
    }

    pub fn from_path(path: impl Into<PathBuf>, mime_type: impl Into<String>) -> Self {
        let path = path.into();
        let file_extension = path
            .extension()
            .map(|ext| ext.to_string_lossy().into_owned());
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned());
        Self {
            data: BinarySource::File(path),
            mime_type: mime_type.into(),
            file_extension,
            file_name,
        }
    }

    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.file_extension = Some(extension.into());
        self
    }

    pub fn with_file_name(mut self, name: impl Into<String>) -> Self {
        self.file_name = Some(name.into());
        self
    }
}

/// One unit of the node's input batch: a JSON record plus named binary
/// properties. The item's position in the batch is its index.
#[derive(Debug, Clone, Default)]
pub struct InputItem {
    pub json: Map<String, Value>,
    pub binary: HashMap<String, BinaryData>,
}

impl InputItem {
    pub fn from_json(json: Map<String, Value>) -> Self {
        Self {
            json,
            binary: HashMap::new(),
        }
    }

    pub fn with_binary(mut self, property: impl Into<String>, data: BinaryData) -> Self {
        self.binary.insert(property.into(), data);
        self
    }

    pub fn binary(&self, property: &str) -> Option<&BinaryData> {
        self.binary.get(property)
    }
}

/// One logical record extracted from tabular input.
///
/// Keyed rows map column names to values (header row enabled); positional
/// rows are plain ordered sequences (header row disabled). Downstream
/// mapping matches on the variant, so neither shape can be mishandled
/// silently.
#[derive(Debug, Clone, PartialEq)]
pub enum Row {
    Keyed(Map<String, Value>),
    Positional(Vec<Value>),
}

/// Identifies which input item(s) an output item was derived from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum PairedItem {
    /// Derived from a single input item.
    Single(usize),
    /// Derived from the whole input batch (write direction).
    Batch { first: usize, last: usize },
}

/// One unit of the node's output batch. Created during extraction or
/// serialization, never mutated afterwards.
#[derive(Debug, Clone)]
pub struct OutputItem {
    pub json: Map<String, Value>,
    pub binary: HashMap<String, BinaryData>,
    pub paired_item: PairedItem,
}

impl OutputItem {
    /// Maps an extracted row to an output item tagged with its source
    /// index. Keyed rows contribute their fields directly; positional rows
    /// are wrapped under a single `row` field.
    pub fn from_row(row: Row, index: usize) -> Self {
        let json = match row {
            Row::Keyed(map) => map,
            Row::Positional(values) => {
                let mut map = Map::new();
                map.insert("row".to_string(), Value::Array(values));
                map
            }
        };
        Self {
            json,
            binary: HashMap::new(),
            paired_item: PairedItem::Single(index),
        }
    }

    /// Builds an error record carrying the failure message under an
    /// `error` field.
    pub fn error(message: impl Into<String>, paired_item: PairedItem) -> Self {
        let mut json = Map::new();
        json.insert("error".to_string(), Value::String(message.into()));
        Self {
            json,
            binary: HashMap::new(),
            paired_item,
        }
    }

    pub fn from_binary(
        property: impl Into<String>,
        data: BinaryData,
        paired_item: PairedItem,
    ) -> Self {
        let mut binary = HashMap::new();
        binary.insert(property.into(), data);
        Self {
            json: Map::new(),
            binary,
            paired_item,
        }
    }

    /// True when this item records a failure instead of a row.
    pub fn is_error(&self) -> bool {
        self.json.contains_key("error")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn keyed_row_fields_become_the_output_record() {
        let mut map = Map::new();
        map.insert("name".to_string(), json!("Boston"));
        map.insert("pop".to_string(), json!(4628910));

        let item = OutputItem::from_row(Row::Keyed(map.clone()), 3);

        assert_eq!(item.json, map);
        assert_eq!(item.paired_item, PairedItem::Single(3));
        assert!(!item.is_error());
    }

    #[test]
    fn positional_row_is_wrapped_under_a_row_field() {
        let row = Row::Positional(vec![json!("a"), json!(1)]);

        let item = OutputItem::from_row(row, 0);

        assert_eq!(item.json.get("row"), Some(&json!(["a", 1])));
        assert_eq!(item.json.len(), 1);
    }

    #[test]
    fn error_record_carries_the_message() {
        let item = OutputItem::error("boom", PairedItem::Single(1));

        assert!(item.is_error());
        assert_eq!(item.json.get("error"), Some(&json!("boom")));
    }

    #[test]
    fn memory_source_streams_without_copying_metadata() {
        let source = BinarySource::Memory(b"a,b\n1,2".to_vec());
        let mut content = String::new();
        source
            .reader()
            .unwrap()
            .read_to_string(&mut content)
            .unwrap();
        assert_eq!(content, "a,b\n1,2");
    }
}
