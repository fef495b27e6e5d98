use thiserror::Error;

#[derive(Error, Debug)]
/// Node error
pub enum NodeError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse tabular input: {0}")]
    Parse(String),

    #[error("Workbook does not contain any sheets")]
    EmptyWorkbook,

    #[error("Sheet '{0}' was not found in the workbook")]
    SheetNotFound(String),

    #[error("Item has no binary property '{0}'")]
    MissingBinaryProperty(String),

    #[error("Failed to serialize rows: {0}")]
    Serialize(String),

    #[error("File format '{0}' is not enabled in this build")]
    UnsupportedFormat(String),

    #[error("Cloud API request failed: {0}")]
    Http(String),

    #[error("Item {index}: {source}")]
    Item {
        index: usize,
        source: Box<NodeError>,
    },
}

impl NodeError {
    /// Attributes an error to the input item it occurred on.
    pub fn for_item(self, index: usize) -> Self {
        NodeError::Item {
            index,
            source: Box::new(self),
        }
    }
}
