//! Luapre CLI - entry point for the `luapre` binary.
//!
//! Parses the command line with clap, assembles a [`Config`], and runs one
//! [`Session`]. All errors surface here, already formatted as diagnostics,
//! and exit the process with a non-zero status.

use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use luapre_drv::{Config, Session};

/// Luapre - a preprocessor for Lua
///
/// Expands `!`-sigil metacode embedded in Lua source files: meta lines,
/// `!( … )` blocks and `!!( … )` inline code run at preprocess time, and
/// their output replaces them in the generated file.
#[derive(Parser, Debug)]
#[command(name = "luapre")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "A preprocessor for Lua", long_about = None)]
struct Cli {
    /// Load PATH as Lua source; it must evaluate to a message handler
    /// callback
    #[arg(long, value_name = "PATH")]
    handler: Option<PathBuf>,

    /// Interleave --[[@N]] line annotations in the output
    #[arg(long)]
    linenumbers: bool,

    /// Output file extension; input paths ending in it are rejected
    #[arg(long, value_name = "EXT", default_value = "lua")]
    outputextension: String,

    /// Write a serialized processing report to PATH after the session
    #[arg(long, value_name = "PATH")]
    saveinfo: Option<PathBuf>,

    /// Suppress non-error chatter on stdout
    #[arg(long)]
    silent: bool,

    /// Keep intermediate metaprogram files and escape newlines in
    /// serialized strings for readability
    #[arg(long)]
    debug: bool,

    /// Files to process, in order
    #[arg(required = true, value_name = "PATH")]
    paths: Vec<PathBuf>,
}

fn main() {
    if let Err(e) = run() {
        eprintln!("{e}");
        std::process::exit(1);
    }
}

fn run() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = Config {
        paths: cli.paths,
        handler: cli.handler,
        line_numbers: cli.linenumbers,
        output_extension: cli.outputextension,
        save_info: cli.saveinfo,
        silent: cli.silent,
        debug: cli.debug,
    };

    let mut session = Session::new(config)?;
    session.run()?;
    Ok(())
}
