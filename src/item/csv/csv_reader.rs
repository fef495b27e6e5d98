use csv::{ReaderBuilder, StringRecordsIntoIter, Trim};
use serde_json::{Map, Value};
use std::{
    cell::{Cell, RefCell},
    io::{self, Read},
};

use crate::{
    core::{item::Row, options::ConversionOptions},
    error::NodeError,
};

/// A CSV row reader producing [`Row`] values.
///
/// Rows are pulled lazily from the underlying reader, so input is never
/// buffered beyond what the parser needs. When `header_row` is enabled the
/// first parsed line names the columns and every record becomes a keyed
/// row; otherwise records stay positional.
///
/// Dropping the reader releases the underlying stream; callers hitting the
/// row cap should drop it promptly instead of draining the rest of the
/// input.
///
/// # Examples
///
/// ```
/// use rowfile::item::csv::csv_reader::CsvRowReaderBuilder;
/// use rowfile::core::item::Row;
///
/// let data = "city,pop\nBoston,4628910\nConcord,42695";
/// let reader = CsvRowReaderBuilder::new()
///     .header_row(true)
///     .from_reader(data.as_bytes())
///     .unwrap();
///
/// let rows = reader.read_all().unwrap();
/// assert_eq!(rows.len(), 2);
/// match &rows[0] {
///     Row::Keyed(map) => assert_eq!(map["city"], "Boston"),
///     Row::Positional(_) => unreachable!(),
/// }
/// ```
pub struct CsvRowReader<R> {
    /// Iterator over the CSV records.
    ///
    /// Uses `RefCell` so rows can be pulled through a `&self` receiver,
    /// keeping `read` usable from iteration helpers.
    records: RefCell<StringRecordsIntoIter<io::Chain<io::Cursor<Vec<u8>>, R>>>,
    headers: Option<Vec<String>>,
    include_empty_cells: bool,
    max_row_count: i64,
    read_count: Cell<i64>,
}

impl<R: Read> CsvRowReader<R> {
    /// Reads the next row, or `None` once the input is exhausted or the
    /// configured row cap is reached.
    pub fn read(&self) -> Result<Option<Row>, NodeError> {
        if self.max_row_count > -1 && self.read_count.get() >= self.max_row_count {
            return Ok(None);
        }

        let Some(result) = self.records.borrow_mut().next() else {
            return Ok(None);
        };
        let record = result.map_err(|error| NodeError::Parse(error.to_string()))?;

        let row = match &self.headers {
            Some(headers) => {
                let mut map = Map::new();
                for (header, field) in headers.iter().zip(record.iter()) {
                    // Empty-string entries are dropped from keyed rows
                    // unless empty cells are requested. Positional rows are
                    // never filtered.
                    if field.is_empty() && !self.include_empty_cells {
                        continue;
                    }
                    map.insert(header.clone(), Value::String(field.to_string()));
                }
                Row::Keyed(map)
            }
            None => Row::Positional(
                record
                    .iter()
                    .map(|field| Value::String(field.to_string()))
                    .collect(),
            ),
        };

        self.read_count.set(self.read_count.get() + 1);
        Ok(Some(row))
    }

    /// Reads every remaining row into a vector.
    pub fn read_all(&self) -> Result<Vec<Row>, NodeError> {
        let mut rows = Vec::new();
        while let Some(row) = self.read()? {
            rows.push(row);
        }
        Ok(rows)
    }
}

/// A builder for configuring CSV row reading.
#[derive(Debug, Clone)]
pub struct CsvRowReaderBuilder {
    delimiter: u8,
    header_row: bool,
    from_line: u64,
    max_row_count: i64,
    include_empty_cells: bool,
    enable_bom: bool,
}

impl Default for CsvRowReaderBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl CsvRowReaderBuilder {
    pub fn new() -> Self {
        Self {
            delimiter: b',',
            header_row: true,
            from_line: 1,
            max_row_count: -1,
            include_empty_cells: false,
            enable_bom: false,
        }
    }

    /// Copies the CSV-relevant settings out of resolved conversion
    /// options.
    pub fn from_options(options: &ConversionOptions) -> Self {
        Self {
            delimiter: options.delimiter_byte(),
            header_row: options.header_row,
            from_line: options.from_line,
            max_row_count: options.max_row_count,
            include_empty_cells: options.include_empty_cells,
            enable_bom: options.enable_bom,
        }
    }

    pub fn delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    pub fn header_row(mut self, yes: bool) -> Self {
        self.header_row = yes;
        self
    }

    /// First line to parse (1-based). Lines before it are skipped; when a
    /// header row is enabled it is taken from this line.
    pub fn from_line(mut self, line: u64) -> Self {
        self.from_line = line.max(1);
        self
    }

    pub fn max_row_count(mut self, count: i64) -> Self {
        self.max_row_count = count;
        self
    }

    pub fn include_empty_cells(mut self, yes: bool) -> Self {
        self.include_empty_cells = yes;
        self
    }

    pub fn enable_bom(mut self, yes: bool) -> Self {
        self.enable_bom = yes;
        self
    }

    /// Creates a `CsvRowReader` from any `Read` source.
    ///
    /// Skips lines before `from_line`, then captures the header row when
    /// enabled. Fails with [`NodeError::Parse`] when the skipped or header
    /// records are malformed.
    pub fn from_reader<R: Read>(self, mut rdr: R) -> Result<CsvRowReader<R>, NodeError> {
        // Peek the first bytes so an optional UTF-8 byte-order mark can be
        // stripped before the parser sees it.
        let mut head = [0u8; 3];
        let mut filled = 0;
        while filled < head.len() {
            let n = rdr.read(&mut head[filled..])?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        let held_back = if self.enable_bom && filled == 3 && head == [0xEF, 0xBB, 0xBF] {
            Vec::new()
        } else {
            head[..filled].to_vec()
        };

        let rdr = ReaderBuilder::new()
            .trim(Trim::All)
            .delimiter(self.delimiter)
            .has_headers(false)
            .flexible(false) // strict parsing surfaces formatting errors
            .from_reader(io::Cursor::new(held_back).chain(rdr));

        let mut records = rdr.into_records();

        for _ in 1..self.from_line {
            match records.next() {
                Some(Ok(_)) => {}
                Some(Err(error)) => return Err(NodeError::Parse(error.to_string())),
                None => break,
            }
        }

        let headers = if self.header_row {
            match records.next() {
                Some(Ok(record)) => {
                    Some(record.iter().map(|field| field.to_string()).collect())
                }
                Some(Err(error)) => return Err(NodeError::Parse(error.to_string())),
                None => Some(Vec::new()),
            }
        } else {
            None
        };

        Ok(CsvRowReader {
            records: RefCell::new(records),
            headers,
            include_empty_cells: self.include_empty_cells,
            max_row_count: self.max_row_count,
            read_count: Cell::new(0),
        })
    }
}
