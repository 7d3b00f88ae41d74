// src/process/mod.rs
pub mod csv_reader;
pub mod record_set;
pub mod transform;

pub use csv_reader::parse_csv;
pub use record_set::{concat, Cell, RecordSet};
pub use transform::{filter_rows, process_data, TransformRules};
