#[cfg(feature = "csv")]
/// This module provides the CSV row reader and batch writer.
pub mod csv;

#[cfg(feature = "xlsx")]
/// This module provides the spreadsheet-binary row reader and batch writer.
pub mod sheet;

#[cfg(any(feature = "csv", feature = "xlsx"))]
/// Union of record keys, keeping the order in which columns first appear
/// across the batch.
pub(crate) fn collect_columns(
    records: &[&serde_json::Map<String, serde_json::Value>],
) -> Vec<String> {
    let mut columns: Vec<String> = Vec::new();
    for record in records {
        for key in record.keys() {
            if !columns.iter().any(|column| column == key) {
                columns.push(key.clone());
            }
        }
    }
    columns
}

#[cfg(test)]
#[cfg(any(feature = "csv", feature = "xlsx"))]
mod tests {
    use super::collect_columns;
    use serde_json::json;

    #[test]
    fn columns_keep_first_seen_order() {
        let first = json!({"b": 1, "a": 2});
        let second = json!({"a": 3, "c": 4});
        let records = [first.as_object().unwrap(), second.as_object().unwrap()];

        assert_eq!(collect_columns(&records), vec!["b", "a", "c"]);
    }
}
