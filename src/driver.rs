//! Driver — finds `.jack` sources, compiles each class, writes the outputs.
//!
//! Units are independent: a unit that fails to compile is reported and
//! skipped, and nothing is written for it.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use tracing::{error, info};

use crate::config::Config;
use crate::jack::xml::tokens_to_xml;
use crate::jack::Compiler;
use crate::vm;

/// Source file extension.
pub const SOURCE_EXTENSION: &str = "jack";

/// Outcome of compiling a file or directory.
#[derive(Debug, Default)]
pub struct Report {
    /// VM files written, in compile order.
    pub compiled: Vec<PathBuf>,
    /// Sources that failed, with the rendered error.
    pub failed: Vec<(PathBuf, String)>,
}

impl Report {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

fn is_jack_file(path: &Path) -> bool {
    path.is_file() && path.extension().is_some_and(|ext| ext == SOURCE_EXTENSION)
}

/// A single `.jack` file, or every `.jack` file directly inside a directory,
/// sorted by name.
pub fn discover_sources(path: &Path) -> anyhow::Result<Vec<PathBuf>> {
    if path.is_dir() {
        let mut sources = Vec::new();
        let entries =
            fs::read_dir(path).with_context(|| format!("failed to list {}", path.display()))?;
        for entry in entries {
            let entry_path = entry?.path();
            if is_jack_file(&entry_path) {
                sources.push(entry_path);
            }
        }
        if sources.is_empty() {
            bail!("no .{SOURCE_EXTENSION} files in {}", path.display());
        }
        sources.sort();
        return Ok(sources);
    }

    if !path.exists() {
        bail!("{} does not exist", path.display());
    }
    if !is_jack_file(path) {
        bail!("{} is not a .{SOURCE_EXTENSION} file", path.display());
    }
    Ok(vec![path.to_path_buf()])
}

/// Where the output for `source` goes: `Xxx.jack` → `Xxx<suffix>` beside
/// the source, or inside `config.output_dir`.
fn derived_path(source: &Path, config: &Config, suffix: &str) -> PathBuf {
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let dir = match &config.output_dir {
        Some(dir) => dir.clone(),
        None => source.parent().map(Path::to_path_buf).unwrap_or_default(),
    };
    dir.join(format!("{stem}{suffix}"))
}

pub fn output_path(source: &Path, config: &Config) -> PathBuf {
    derived_path(source, config, &format!(".{}", config.output_extension))
}

pub fn tokens_path(source: &Path, config: &Config) -> PathBuf {
    derived_path(source, config, "T.xml")
}

pub fn tree_path(source: &Path, config: &Config) -> PathBuf {
    derived_path(source, config, ".xml")
}

/// Compile one source file and write its VM code. Returns the output path.
pub fn compile_file(source: &Path, config: &Config) -> anyhow::Result<PathBuf> {
    let text = fs::read_to_string(source)
        .with_context(|| format!("failed to read {}", source.display()))?;
    let tokens =
        Compiler::tokenize(&text).with_context(|| format!("in {}", source.display()))?;

    if let Some(dir) = &config.output_dir {
        fs::create_dir_all(dir).with_context(|| format!("failed to create {}", dir.display()))?;
    }

    if config.emit_tokens {
        let xml_path = tokens_path(source, config);
        fs::write(&xml_path, tokens_to_xml(&tokens))
            .with_context(|| format!("failed to write {}", xml_path.display()))?;
        info!(output = %xml_path.display(), "wrote token listing");
    }

    let (instructions, tree) = if config.emit_tree {
        let (instructions, xml) = Compiler::compile_tokens_with_tree(tokens)
            .with_context(|| format!("in {}", source.display()))?;
        (instructions, Some(xml))
    } else {
        let instructions =
            Compiler::compile_tokens(tokens).with_context(|| format!("in {}", source.display()))?;
        (instructions, None)
    };

    if let Some(xml) = tree {
        let xml_path = tree_path(source, config);
        fs::write(&xml_path, xml)
            .with_context(|| format!("failed to write {}", xml_path.display()))?;
        info!(output = %xml_path.display(), "wrote parse tree");
    }

    let out = output_path(source, config);
    fs::write(&out, vm::render(&instructions))
        .with_context(|| format!("failed to write {}", out.display()))?;
    info!(
        output = %out.display(),
        instructions = instructions.len(),
        "wrote vm code"
    );
    Ok(out)
}

/// Compile a file or a directory of files, continuing past failed units.
pub fn compile_path(path: &Path, config: &Config) -> anyhow::Result<Report> {
    let mut report = Report::default();
    for source in discover_sources(path)? {
        match compile_file(&source, config) {
            Ok(out) => report.compiled.push(out),
            Err(e) => {
                let message = format!("{e:#}");
                error!(source = %source.display(), error = %message, "compilation failed");
                report.failed.push((source, message));
            }
        }
    }
    Ok(report)
}
