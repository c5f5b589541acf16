//! Driver integration tests — real files in temp directories.

use std::fs;
use std::path::Path;

use jackc::config::{load_config, Config};
use jackc::driver::{compile_path, discover_sources};
use jackc::vm::parse_program;
use tempfile::TempDir;

const MAIN: &str = "class Main {
    function void main() {
        do Output.printInt(Counter.next());
        return;
    }
}
";

const COUNTER: &str = "class Counter {
    static int n;
    function int next() {
        let n = n + 1;
        return n;
    }
}
";

fn write(dir: &Path, name: &str, text: &str) {
    fs::write(dir.join(name), text).unwrap();
}

fn project() -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "Main.jack", MAIN);
    write(dir.path(), "Counter.jack", COUNTER);
    write(dir.path(), "notes.txt", "not a source");
    dir
}

#[test]
fn directory_compiles_every_class() {
    let dir = project();
    let report = compile_path(dir.path(), &Config::default()).unwrap();

    assert!(report.is_success());
    assert_eq!(
        report.compiled,
        vec![dir.path().join("Counter.vm"), dir.path().join("Main.vm")]
    );

    let main_vm = fs::read_to_string(dir.path().join("Main.vm")).unwrap();
    assert!(main_vm.starts_with("function Main.main 0\n"));
    assert!(main_vm.contains("call Counter.next 0\n"));
    assert!(parse_program(&main_vm).is_ok());
    assert!(!dir.path().join("notes.vm").exists());
}

#[test]
fn single_file_writes_beside_source() {
    let dir = project();
    let source = dir.path().join("Counter.jack");
    let report = compile_path(&source, &Config::default()).unwrap();

    assert_eq!(report.compiled, vec![dir.path().join("Counter.vm")]);
    assert!(!dir.path().join("Main.vm").exists());
    let text = fs::read_to_string(dir.path().join("Counter.vm")).unwrap();
    assert_eq!(
        text,
        "function Counter.next 0\n\
         push static 0\n\
         push constant 1\n\
         add\n\
         pop static 0\n\
         push static 0\n\
         return\n"
    );
}

#[test]
fn failing_unit_is_skipped_and_others_still_compile() {
    let dir = project();
    write(dir.path(), "Broken.jack", "class Broken { function void f() { let = 1; } }");

    let report = compile_path(dir.path(), &Config::default()).unwrap();

    assert!(!report.is_success());
    assert_eq!(report.compiled.len(), 2);
    assert_eq!(report.failed.len(), 1);
    let (source, message) = &report.failed[0];
    assert_eq!(source, &dir.path().join("Broken.jack"));
    assert!(message.contains("Structural"), "{message}");
    assert!(!dir.path().join("Broken.vm").exists());
}

#[test]
fn token_listing_written_on_request() {
    let dir = project();
    let config = Config {
        emit_tokens: true,
        ..Config::default()
    };
    compile_path(&dir.path().join("Main.jack"), &config).unwrap();

    let xml = fs::read_to_string(dir.path().join("MainT.xml")).unwrap();
    assert!(xml.starts_with("<tokens>\n"));
    assert!(xml.contains("<keyword> class </keyword>"));
    assert!(xml.contains("<identifier> Main </identifier>"));
    assert!(xml.trim_end().ends_with("</tokens>"));
}

#[test]
fn parse_tree_written_on_request() {
    let dir = project();
    let config = Config {
        emit_tree: true,
        ..Config::default()
    };
    let report = compile_path(dir.path(), &config).unwrap();
    assert!(report.is_success());

    let xml = fs::read_to_string(dir.path().join("Counter.xml")).unwrap();
    assert!(xml.starts_with("<class>\n  <keyword> class </keyword>\n"));
    assert!(xml.contains("<classVarDec>"));
    assert!(xml.contains("<letStatement>"));
    assert!(xml.ends_with("</class>\n"));
    assert!(dir.path().join("Main.xml").is_file());
    assert!(!dir.path().join("MainT.xml").exists());

    // The tree is a side output; the VM code is unchanged.
    let vm = fs::read_to_string(dir.path().join("Counter.vm")).unwrap();
    assert!(vm.starts_with("function Counter.next 0\n"));
}

#[test]
fn no_parse_tree_by_default() {
    let dir = project();
    compile_path(dir.path(), &Config::default()).unwrap();
    assert!(!dir.path().join("Main.xml").exists());
}

#[test]
fn output_dir_is_created() {
    let dir = project();
    let out = dir.path().join("build").join("vm");
    let config = Config {
        output_dir: Some(out.clone()),
        ..Config::default()
    };
    let report = compile_path(dir.path(), &config).unwrap();

    assert!(report.is_success());
    assert!(out.join("Main.vm").is_file());
    assert!(out.join("Counter.vm").is_file());
    assert!(!dir.path().join("Main.vm").exists());
}

#[test]
fn discovery_errors() {
    let empty = tempfile::tempdir().unwrap();
    assert!(discover_sources(empty.path()).is_err());
    assert!(discover_sources(&empty.path().join("Missing.jack")).is_err());

    write(empty.path(), "readme.md", "# hi");
    assert!(discover_sources(&empty.path().join("readme.md")).is_err());
}

#[test]
fn config_file_drives_compile() {
    let dir = project();
    let config_path = dir.path().join("config.yaml");
    write(dir.path(), "config.yaml", "output_extension: code\nemit_tokens: true\n");

    let config = load_config(&config_path).unwrap();
    let report = compile_path(&dir.path().join("Main.jack"), &config).unwrap();

    assert_eq!(report.compiled, vec![dir.path().join("Main.code")]);
    assert!(dir.path().join("MainT.xml").is_file());
}
