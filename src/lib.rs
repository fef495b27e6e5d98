#![cfg_attr(docsrs, feature(doc_cfg))]

/*!
 # Rowfile

 A toolkit for converting tabular files (CSV and XLSX-family spreadsheet
 binaries) to row records and back inside workflow pipelines. It is the
 kind of node a workflow-automation platform drops between a file source
 and the rest of a pipeline: binary payloads go in, traceable row records
 come out, or a batch of records goes in and one file comes out.

 ## Core Concepts

 - **InputItem:** One unit of the node's input batch, carrying a JSON
   record and/or named binary payloads. Its position in the batch is its
   index.
 - **TabularFileNode:** The conversion engine. In the read direction it
   detects each payload's format, extracts rows, and emits one output
   item per row; in the write direction it serializes the whole batch
   into a single binary payload.
 - **Row:** One extracted record, either keyed (header row names the
   columns) or positional (plain ordered values).
 - **OutputItem:** An immutable output record tagged with the input
   index (or index range) it was derived from.

 ## Features

 The crate is modular, allowing you to enable only the formats you need:

| **Feature** | **Description**                                           |
|-------------|-----------------------------------------------------------|
| csv         | Enables the CSV row reader and batch writer               |
| xlsx        | Enables the spreadsheet-binary row reader and batch writer |
| cloud       | Enables the cloud plan/usage REST client                  |
| full        | Enables all available features                            |

 ## Getting Started

 Make sure you activated the suitable features on Cargo.toml:

```toml
[dependencies]
rowfile = { version = "<version>", features = ["<full|csv|xlsx|cloud>"] }
```

 Then:

```rust
use rowfile::core::{
    item::{BinaryData, InputItem, PairedItem},
    node::{Operation, TabularFileNode},
    options::ConversionOptions,
};
use serde_json::json;

fn main() -> Result<(), rowfile::NodeError> {
    let csv = "city,pop
Boston,4628910
Concord,42695";

    let item = InputItem::default()
        .with_binary("data", BinaryData::from_bytes(csv.into(), "text/csv"));

    let node = TabularFileNode::new(ConversionOptions::default());
    let output = node.run(Operation::FromFile, &[item])?;

    assert_eq!(output.len(), 2);
    assert_eq!(output[0].json["city"], json!("Boston"));
    assert_eq!(output[1].paired_item, PairedItem::Single(0));

    Ok(())
}
```

 ## License

 Licensed under either of the Apache License, Version 2.0 or the MIT
 license, at your option.

 */

/// Core module: items, options, and the conversion node
pub mod core;

/// Error types for conversion and cloud operations
pub mod error;

#[doc(inline)]
pub use error::*;

/// Set of format-specific row readers / batch writers
pub mod item;

#[cfg(feature = "cloud")]
/// Cloud plan/usage REST accessors
pub mod cloud;
