use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{core::item::BinaryData, error::NodeError};

/// Declared file format of an item's binary payload.
///
/// `Autodetect` defers to MIME type and file extension; the other variants
/// force the matching parse path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FileFormat {
    #[default]
    Autodetect,
    Csv,
    Xlsx,
}

/// Format a payload actually gets routed to. Detection is total: it always
/// resolves to one of the two parse paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolvedFormat {
    Csv,
    Xlsx,
}

impl FileFormat {
    /// Resolves the concrete parse path for a payload.
    ///
    /// An explicit hint wins. With `Autodetect`, a `text/csv` MIME type or
    /// `text/plain` with a `csv` extension resolves to CSV; everything else
    /// falls back to the spreadsheet-binary path.
    pub fn detect(self, binary: &BinaryData) -> ResolvedFormat {
        match self {
            FileFormat::Csv => ResolvedFormat::Csv,
            FileFormat::Xlsx => ResolvedFormat::Xlsx,
            FileFormat::Autodetect => {
                let extension = binary.file_extension.as_deref().unwrap_or_default();
                if binary.mime_type == "text/csv"
                    || (binary.mime_type == "text/plain" && extension.eq_ignore_ascii_case("csv"))
                {
                    ResolvedFormat::Csv
                } else {
                    ResolvedFormat::Xlsx
                }
            }
        }
    }
}

/// Row/range restriction for spreadsheet input: a bare integer is the
/// starting row index, a string is an A1-style rectangle like `A2:D10`.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum RangeSpec {
    StartRow(u32),
    Cells(String),
}

/// Configuration for one conversion run.
///
/// Every field has a default, so any subset of options (including none)
/// deserializes without error. Resolved once per run, never re-read inside
/// extraction loops.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ConversionOptions {
    /// Guides or overrides format detection.
    pub file_format: FileFormat,
    /// Name of the binary property read from (or written to) each item.
    pub binary_property_name: String,
    /// CSV field separator; only the first byte is used.
    pub delimiter: String,
    /// First line to parse in CSV input (1-based).
    pub from_line: u64,
    /// Cap on extracted rows, -1 = unbounded.
    pub max_row_count: i64,
    /// Retain empty values instead of dropping them.
    pub include_empty_cells: bool,
    /// Treat the first row as field names rather than data.
    pub header_row: bool,
    /// Target sheet for spreadsheet input; first sheet when absent.
    pub sheet_name: Option<String>,
    /// Row/range restriction for spreadsheet input.
    pub range: Option<RangeSpec>,
    /// Force string-mode parsing of spreadsheet cells.
    pub read_as_string: bool,
    /// Disable value coercion (dates stay as raw serial numbers).
    pub raw_data: bool,
    /// Honor a UTF-8 byte-order mark at the start of CSV input.
    #[serde(rename = "enableBOM")]
    pub enable_bom: bool,
}

impl Default for ConversionOptions {
    fn default() -> Self {
        Self {
            file_format: FileFormat::Autodetect,
            binary_property_name: "data".to_string(),
            delimiter: ",".to_string(),
            from_line: 1,
            max_row_count: -1,
            include_empty_cells: false,
            header_row: true,
            sheet_name: None,
            range: None,
            read_as_string: false,
            raw_data: false,
            enable_bom: false,
        }
    }
}

impl ConversionOptions {
    /// Builds options from a JSON parameter blob, applying defaults for
    /// every omitted field.
    pub fn from_value(value: Value) -> Result<Self, NodeError> {
        serde_json::from_value(value).map_err(|error| NodeError::Parse(error.to_string()))
    }

    pub(crate) fn delimiter_byte(&self) -> u8 {
        self.delimiter.as_bytes().first().copied().unwrap_or(b',')
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn csv_binary(mime: &str, extension: Option<&str>) -> BinaryData {
        let mut binary = BinaryData::from_bytes(Vec::new(), mime);
        if let Some(extension) = extension {
            binary = binary.with_extension(extension);
        }
        binary
    }

    #[test]
    fn autodetect_resolves_csv_mime_to_csv() {
        let binary = csv_binary("text/csv", None);
        assert_eq!(FileFormat::Autodetect.detect(&binary), ResolvedFormat::Csv);
    }

    #[test]
    fn autodetect_resolves_plain_text_with_csv_extension_to_csv() {
        let binary = csv_binary("text/plain", Some("csv"));
        assert_eq!(FileFormat::Autodetect.detect(&binary), ResolvedFormat::Csv);
    }

    #[test]
    fn autodetect_defaults_to_spreadsheet_binary() {
        let binary = csv_binary("application/octet-stream", Some("xlsx"));
        assert_eq!(FileFormat::Autodetect.detect(&binary), ResolvedFormat::Xlsx);

        let binary = csv_binary("text/plain", None);
        assert_eq!(FileFormat::Autodetect.detect(&binary), ResolvedFormat::Xlsx);
    }

    #[test]
    fn explicit_hint_wins_over_metadata() {
        let binary = csv_binary("text/csv", Some("csv"));
        assert_eq!(FileFormat::Xlsx.detect(&binary), ResolvedFormat::Xlsx);
        let binary = csv_binary("application/octet-stream", None);
        assert_eq!(FileFormat::Csv.detect(&binary), ResolvedFormat::Csv);
    }

    #[test]
    fn omitted_options_fall_back_to_defaults() {
        let options = ConversionOptions::from_value(json!({})).unwrap();
        assert_eq!(options, ConversionOptions::default());
        assert_eq!(options.binary_property_name, "data");
        assert_eq!(options.delimiter_byte(), b',');
        assert_eq!(options.max_row_count, -1);
        assert!(options.header_row);
    }

    #[test]
    fn range_accepts_integer_or_cell_expression() {
        let options = ConversionOptions::from_value(json!({ "range": 4 })).unwrap();
        assert_eq!(options.range, Some(RangeSpec::StartRow(4)));

        let options = ConversionOptions::from_value(json!({ "range": "A2:D10" })).unwrap();
        assert_eq!(options.range, Some(RangeSpec::Cells("A2:D10".to_string())));
    }

    #[test]
    fn camel_case_parameters_map_onto_fields() {
        let options = ConversionOptions::from_value(json!({
            "fileFormat": "csv",
            "delimiter": ";",
            "fromLine": 3,
            "maxRowCount": 10,
            "includeEmptyCells": true,
            "headerRow": false,
            "enableBOM": true,
        }))
        .unwrap();

        assert_eq!(options.file_format, FileFormat::Csv);
        assert_eq!(options.delimiter_byte(), b';');
        assert_eq!(options.from_line, 3);
        assert_eq!(options.max_row_count, 10);
        assert!(options.include_empty_cells);
        assert!(!options.header_row);
        assert!(options.enable_bom);
    }
}
