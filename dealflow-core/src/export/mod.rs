pub mod csv;

pub use csv::{board_to_csv, export_csv};
