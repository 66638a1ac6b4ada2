//! Print the OpenAPI document as JSON, or write it to a file.

use std::io::Write as _;
use std::path::PathBuf;

use clap::Parser;
use songsmith::ApiDoc;
use utoipa::OpenApi;

#[derive(Debug, Parser)]
#[command(about = "Export the songsmith OpenAPI document")]
struct Args {
    /// Write to this file instead of standard output.
    #[arg(short, long)]
    output: Option<PathBuf>,
}

fn main() -> std::io::Result<()> {
    let args = Args::parse();
    let json = ApiDoc::openapi()
        .to_pretty_json()
        .map_err(std::io::Error::other)?;
    match args.output {
        Some(path) => std::fs::write(path, format!("{json}\n")),
        None => writeln!(std::io::stdout().lock(), "{json}"),
    }
}
