// src/cli/mod.rs
//
// Command-line interface module

mod args;
mod output;

pub use args::{print_presets, AnalyzeArgs, Cli, Command, ToneArgs};
pub use output::{
    format_column, format_json_event, format_json_summary, format_metadata, format_summary,
    PeakHistogram, RunSummary,
};
