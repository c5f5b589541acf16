//! jackc — compile Jack classes to VM code.
//!
//! `jackc Main.jack` writes `Main.vm`; `jackc dir/` compiles every `.jack`
//! file in `dir`. A class that fails to compile is reported and skipped.

use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use jackc::config::{default_config_path, load_config, Config};
use jackc::driver::compile_path;

#[derive(Parser, Debug)]
#[command(name = "jackc", version, about = "Compile Jack classes to stack-machine VM code")]
struct Cli {
    /// A .jack file, or a directory of .jack files
    path: PathBuf,

    /// Also write an XxxT.xml token listing per source
    #[arg(long)]
    tokens: bool,

    /// Also write an Xxx.xml parse tree per source
    #[arg(long)]
    tree: bool,

    /// Write outputs to DIR instead of beside the sources
    #[arg(long, value_name = "DIR")]
    out_dir: Option<PathBuf>,

    /// Config file (default: ~/.jackc/config.yaml)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log every compiled class and subroutine
    #[arg(short, long)]
    verbose: bool,
}

fn init_logging(verbose: bool) {
    let fallback = if verbose { "jackc=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load(cli: &Cli) -> anyhow::Result<Config> {
    let mut config = match &cli.config {
        Some(path) => {
            if !path.exists() {
                anyhow::bail!("config file {} does not exist", path.display());
            }
            load_config(path)?
        }
        None => match default_config_path() {
            Some(path) => load_config(&path)?,
            None => Config::default(),
        },
    };

    if cli.tokens {
        config.emit_tokens = true;
    }
    if cli.tree {
        config.emit_tree = true;
    }
    if let Some(dir) = &cli.out_dir {
        config.output_dir = Some(dir.clone());
    }
    Ok(config)
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = match load(&cli) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("jackc: {e:#}");
            std::process::exit(2);
        }
    };

    let report = match compile_path(&cli.path, &config) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("jackc: {e:#}");
            std::process::exit(2);
        }
    };

    for out in &report.compiled {
        println!("File created : {}", out.display());
    }
    for (source, message) in &report.failed {
        eprintln!("{}: {message}", source.display());
    }

    if !report.is_success() {
        std::process::exit(1);
    }
}
