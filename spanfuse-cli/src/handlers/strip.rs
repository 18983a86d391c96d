//! `strip` handler

use crate::args::StripArgs;
use crate::context::{CliContext, OutputFormat};
use crate::output::{format_success, format_warning};
use serde_json::json;
use spanfuse::strip::strip_path;

pub fn handle_strip(args: StripArgs, ctx: &CliContext) -> spanfuse::Result<()> {
    let files = strip_path(&args.path, &ctx.config.output)?;

    if ctx.output_format == OutputFormat::Json {
        let summary = json!({
            "action": "strip",
            "files": files.iter().map(|p| p.display().to_string()).collect::<Vec<_>>(),
        });
        println!(
            "{}",
            serde_json::to_string_pretty(&summary).unwrap_or_else(|_| "{}".to_string())
        );
    } else if files.is_empty() {
        println!(
            "{}",
            format_warning(&format!("No .json files in {}", args.path.display()))
        );
    } else {
        for file in &files {
            println!("{}", format_success(&format!("stripped {}", file.display())));
        }
    }
    Ok(())
}
