//! Terminal output for the command line.

pub mod tables;

pub use tables::{
    TableBuilder, create_batch_table, create_staged_table, create_suggestions_table,
    create_summary_table, create_uncrawled_table, format_notice,
};
