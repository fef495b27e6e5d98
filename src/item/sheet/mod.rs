pub mod sheet_reader;
pub mod sheet_writer;
