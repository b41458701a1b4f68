//! Reading and writing the long-format source tables with polars.

pub mod columns;
pub mod error;
pub mod frame;
pub mod io;

pub use error::TableError;
pub use frame::{field_from_frame, field_to_frame, TableLayout};
pub use io::{read_table, read_table_as, read_table_in_extent, scan_table, write_csv, write_parquet, TableFormat};
