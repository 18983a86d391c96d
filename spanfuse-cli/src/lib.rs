pub mod args;
pub mod commands;
pub mod context;
pub mod handlers;
pub mod output;

pub use context::{CliContext, LogOverrides, OutputFormat};
pub use output::{
    CliColors, format_error, format_info, format_success, format_warning, output_error,
    print_report, print_set_summary,
};
