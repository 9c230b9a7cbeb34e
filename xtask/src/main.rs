use std::env;
use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};

use atlas_schema::{document_schema, Document};
use jsonschema::JSONSchema;

const FIXTURE_GLOB: &str = "integration_tests/tests/fixtures/*.json";

fn main() -> Result<(), Box<dyn Error>> {
    let mut args = env::args().skip(1);
    match args.next().as_deref() {
        Some("schema") => write_schema(args.next().map(PathBuf::from)),
        Some("validate-fixtures") => validate_fixtures(),
        Some("help") | None => {
            print_usage();
            Ok(())
        }
        Some(cmd) => {
            eprintln!("Unknown xtask '{cmd}'.");
            print_usage();
            std::process::exit(1);
        }
    }
}

fn print_usage() {
    eprintln!("Usage: cargo xtask schema [OUTPUT]");
    eprintln!("       cargo xtask validate-fixtures");
    eprintln!("       cargo xtask help");
}

fn schema_value() -> Result<serde_json::Value, Box<dyn Error>> {
    Ok(serde_json::to_value(document_schema())?)
}

fn write_schema(output: Option<PathBuf>) -> Result<(), Box<dyn Error>> {
    let output = output.unwrap_or_else(|| Path::new("target").join("atlas_document.schema.json"));
    if let Some(parent) = output.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(&output, serde_json::to_string_pretty(&schema_value()?)?)?;
    println!("Wrote document schema to {}", output.display());
    Ok(())
}

fn validate_fixtures() -> Result<(), Box<dyn Error>> {
    let schema = schema_value()?;
    let compiled =
        JSONSchema::compile(&schema).map_err(|err| format!("schema does not compile: {err}"))?;

    let mut checked = 0usize;
    let mut failures = Vec::new();
    for entry in glob::glob(FIXTURE_GLOB)? {
        let path = entry?;
        let text = fs::read_to_string(&path)?;
        let instance: serde_json::Value = serde_json::from_str(&text)?;
        checked += 1;

        if let Err(errors) = compiled.validate(&instance) {
            for error in errors {
                failures.push(format!(
                    "{}: {} at {}",
                    path.display(),
                    error,
                    error.instance_path
                ));
            }
            continue;
        }
        if let Err(err) = Document::parse_str(&text) {
            failures.push(format!("{}: {err}", path.display()));
        }
    }

    if checked == 0 {
        return Err(format!("no fixtures matched {FIXTURE_GLOB}").into());
    }
    if !failures.is_empty() {
        for failure in &failures {
            eprintln!("{failure}");
        }
        return Err(format!("{} problems across {checked} fixtures", failures.len()).into());
    }
    println!("Validated {checked} fixtures");
    Ok(())
}
