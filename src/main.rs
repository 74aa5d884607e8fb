use std::fs;
use std::io;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;
use log::debug;
use simplelog::{Config as LogConfig, LevelFilter, SimpleLogger};

mod lang;

use lang::runtime::Runtime;

/// Run a sef program
#[derive(Parser)]
#[command(version, about)]
struct Opt {
    /// Show debug output
    #[arg(short, long)]
    debug: bool,
    /// Path to the program to run
    program: PathBuf,
}

fn init_logging(debug: bool) -> Result<()> {
    let filter = if debug {
        LevelFilter::Debug
    } else {
        LevelFilter::Warn
    };

    match SimpleLogger::init(filter, LogConfig::default()) {
        Ok(_) => Ok(()),
        Err(e) => bail!("Failed to init logger: {}", e),
    }
}

fn main() -> Result<()> {
    let opts = Opt::parse();
    init_logging(opts.debug)?;

    let source = fs::read_to_string(&opts.program)
        .with_context(|| format!("Failed to read '{}'", opts.program.display()))?;
    debug!("read {} bytes from '{}'", source.len(), opts.program.display());

    let stdout = io::stdout();
    let mut sink = stdout.lock();
    let stdin = io::stdin();
    let mut input = stdin.lock();

    let mut runtime = Runtime::new(&mut sink, &mut input);
    runtime.run(&source)?;

    Ok(())
}
