pub mod csv;
pub mod writer;

pub use writer::CsvSink;
