//! Minimal CLI: schema → (describe | order | check)
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use rayon::prelude::*;
use serde::Serialize;
use serde_json::Value;
use tracing_subscriber::EnvFilter;

use crate::convert::{ConvertOptions, DEFAULT_MODEL_TITLE, DEFAULT_ROOT_TITLE, Model};
use crate::path_de::from_str_with_path;

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

/// build typed models from JSON Schema documents; describe them or check instances against them
#[derive(Parser, Debug)]
pub struct CommandLineInterface {
    /// more logging (-v info, -vv debug, -vvv trace); RUST_LOG wins when set
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// convert and print the schema re-derived from the built model
    Describe(DescribeOut),
    /// print the order named definitions are built in
    Order(OrderOut),
    /// validate JSON documents against the built model
    Check(CheckIn),
}

#[derive(Args, Debug, Clone)]
struct SchemaSettings {
    /// JSON Schema document to convert
    #[arg(long, short)]
    schema: PathBuf,

    /// display name for untitled composite models
    #[arg(long, default_value = DEFAULT_MODEL_TITLE)]
    model_title: String,

    /// display name for an untitled property-less root
    #[arg(long, default_value = DEFAULT_ROOT_TITLE)]
    root_title: String,
}

#[derive(Args, Debug, Clone)]
struct InputSettings {
    /// treat input as newline-delimited JSON (NDJSON)
    #[arg(long, default_value_t = false)]
    ndjson: bool,

    /// JSON Pointer to select a subnode in each document (e.g. /data/items/0/payload)
    #[arg(long)]
    json_pointer: Option<String>,

    /// One or more inputs. May be literal paths or quoted glob patterns
    #[arg(long, short, num_args = 1.., required = true)]
    input: Vec<String>,
}

#[derive(clap::Parser, Debug)]
struct DescribeOut {
    #[command(flatten)]
    schema_settings: SchemaSettings,

    /// output .json file (stdout if omitted)
    #[arg(short, long)]
    out: Option<PathBuf>,
}

#[derive(clap::Parser, Debug)]
struct OrderOut {
    #[command(flatten)]
    schema_settings: SchemaSettings,
}

#[derive(clap::Parser, Debug)]
struct CheckIn {
    #[command(flatten)]
    schema_settings: SchemaSettings,

    #[command(flatten)]
    input_settings: InputSettings,

    /// print a JSON report instead of one line per document
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Serialize)]
struct CheckReport {
    document: String,
    ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

impl SchemaSettings {
    fn load(&self) -> Result<Value> {
        let source = std::fs::read_to_string(&self.schema)
            .with_context(|| format!("failed to read schema {}", self.schema.display()))?;
        from_str_with_path::<Value>(&source)
            .with_context(|| format!("failed to parse schema {}", self.schema.display()))
    }

    fn options(&self) -> ConvertOptions {
        ConvertOptions {
            model_title: self.model_title.clone(),
            root_title: self.root_title.clone(),
        }
    }

    fn model(&self) -> Result<Model> {
        let schema = self.load()?;
        let model = crate::convert::convert_with_options(&schema, &self.options())
            .with_context(|| format!("failed to convert {}", self.schema.display()))?;
        tracing::info!(root = model.name(), models = model.arena().len(), "schema converted");
        Ok(model)
    }
}

impl InputSettings {
    /// Every document in one input file, labelled for reporting.
    fn documents(&self, path: &Path) -> Result<Vec<(String, Value)>> {
        let source = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let label = path.display().to_string();

        let chunks: Vec<(String, &str)> = if self.ndjson {
            source
                .lines()
                .enumerate()
                .filter(|(_, line)| !line.trim().is_empty())
                .map(|(i, line)| (format!("{label}:{}", i + 1), line))
                .collect()
        } else {
            vec![(label, source.as_str())]
        };

        let mut out = Vec::with_capacity(chunks.len());
        for (label, chunk) in chunks {
            let value = from_str_with_path::<Value>(chunk)
                .with_context(|| format!("failed to parse JSON ({label})"))?;
            let value = match self.json_pointer.as_deref() {
                None => value,
                Some(pointer) => match value.pointer(pointer) {
                    Some(node) => node.clone(),
                    None => bail!("JSON pointer {pointer} selects nothing in {label}"),
                },
            };
            out.push((label, value));
        }
        Ok(out)
    }
}

impl CommandLineInterface {
    pub fn load() -> Self {
        Self::parse()
    }

    pub fn init_tracing(&self) {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| match self.verbose {
            0 => EnvFilter::new("warn"),
            1 => EnvFilter::new("info"),
            2 => EnvFilter::new("debug"),
            _ => EnvFilter::new("trace"),
        });
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }

    pub fn run(&self) -> Result<ExitCode> {
        match &self.cmd {
            Command::Describe(target) => {
                let model = target.schema_settings.model()?;
                let schema_src = serde_json::to_string_pretty(&model.describe())?;
                if let Some(out) = target.out.as_ref() {
                    if let Some(parent) = out.parent() {
                        std::fs::create_dir_all(parent)?;
                    }
                    std::fs::write(out, &schema_src)
                        .with_context(|| format!("failed to write {}", out.display()))?;
                } else {
                    println!("{schema_src}");
                }
                Ok(ExitCode::SUCCESS)
            }
            Command::Order(target) => {
                let schema = target.schema_settings.load()?;
                for name in crate::convert::definition_order(&schema)? {
                    println!("{name}");
                }
                Ok(ExitCode::SUCCESS)
            }
            Command::Check(target) => {
                let model = target.schema_settings.model()?;
                let paths = resolve_file_path_patterns(&target.input_settings.input)?;

                let reports: Vec<CheckReport> = paths
                    .par_iter()
                    .map(|path| -> Result<Vec<CheckReport>> {
                        let docs = target.input_settings.documents(path)?;
                        Ok(docs
                            .into_iter()
                            .map(|(label, doc)| check_one(&model, label, &doc))
                            .collect())
                    })
                    .collect::<Result<Vec<_>>>()?
                    .into_iter()
                    .flatten()
                    .collect();

                if target.json {
                    println!("{}", serde_json::to_string_pretty(&reports)?);
                } else {
                    for report in &reports {
                        match &report.error {
                            None => println!("{} {}", "✔".green(), report.document),
                            Some(error) => {
                                println!("{} {}: {}", "✘".red(), report.document, error)
                            }
                        }
                    }
                }

                let failed = reports.iter().filter(|r| !r.ok).count();
                tracing::info!(documents = reports.len(), failed, "check finished");
                Ok(if failed == 0 { ExitCode::SUCCESS } else { ExitCode::FAILURE })
            }
        }
    }
}

// ————————————————————————————————————————————————————————————————————————————
// INTERNAL HELPERS
// ————————————————————————————————————————————————————————————————————————————

fn check_one(model: &Model, document: String, instance: &Value) -> CheckReport {
    match model.validate(instance) {
        Ok(_) => CheckReport { document, ok: true, error: None },
        Err(error) => CheckReport { document, ok: false, error: Some(error.to_string()) },
    }
}

fn has_glob_chars(s: &str) -> bool {
    // Minimal glob detection for the `glob` crate syntax.
    s.bytes().any(|b| matches!(b, b'*' | b'?' | b'[' | b'{'))
}

fn resolve_file_path_patterns<I>(patterns: I) -> Result<Vec<PathBuf>>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    let mut out = Vec::<PathBuf>::new();
    for raw in patterns {
        let pattern = raw.as_ref();
        if !has_glob_chars(pattern) {
            out.push(PathBuf::from(pattern));
            continue;
        }
        let before = out.len();
        for entry in glob::glob(pattern).with_context(|| format!("bad glob pattern {pattern}"))? {
            out.push(entry?);
        }
        if out.len() == before {
            bail!("glob pattern matched no files: {pattern}");
        }
    }
    Ok(out)
}
