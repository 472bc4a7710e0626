//! ommx - Inspect, validate and evaluate optimization instances
//!
//! This tool reads `ommx.v1.Instance` messages in the protobuf binary format,
//! checks them, evaluates them at a given assignment, fixes variables to
//! produce reduced instances and prints the schema they are written in.

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use ommx_core::io;
use ommx_core::schema::{self, SchemaPrinter};
use ommx_core::{Equality, EvaluationConfig, Instance, State, ValidationConfig};
use prost::Message;
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info, trace, warn, Level};
use tracing_subscriber::EnvFilter;
use walkdir::WalkDir;

/// Inspect, validate and evaluate optimization instances
#[derive(Parser, Debug)]
#[command(name = "ommx")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print a summary of an instance
    Inspect {
        /// Instance file
        file: PathBuf,
    },

    /// Decode and validate one instance or every instance under a directory
    Validate {
        #[command(flatten)]
        input: InputMode,

        /// Do not report references to undeclared decision variables
        #[arg(long)]
        no_check_references: bool,

        /// Report enum values the schema does not define
        #[arg(long)]
        reject_unknown_enums: bool,
    },

    /// Decode and re-encode an instance, checking the bytes are unchanged
    Roundtrip {
        /// Instance file
        file: PathBuf,
    },

    /// Evaluate objective and constraints at an assignment
    Evaluate {
        /// Instance file
        file: PathBuf,

        /// Value of one decision variable, as ID=VALUE
        #[arg(short, long = "assign", value_name = "ID=VALUE", value_parser = parse_assignment)]
        assignments: Vec<(u64, f64)>,

        /// Absolute tolerance of the feasibility check
        #[arg(long, default_value = "1e-6")]
        atol: f64,
    },

    /// Fix decision variables and write the reduced instance
    Substitute {
        /// Instance file
        file: PathBuf,

        /// Value of one decision variable, as ID=VALUE
        #[arg(short, long = "assign", value_name = "ID=VALUE", value_parser = parse_assignment)]
        assignments: Vec<(u64, f64)>,

        /// Output file
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Print the .proto schema or write it under a directory
    Schema {
        /// Output directory; the file is written to DIR/ommx/v1/ommx.proto
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[derive(Args, Debug)]
#[group(required = true, multiple = false)]
struct InputMode {
    /// Path to a single instance file
    #[arg(short, long)]
    file: Option<PathBuf>,

    /// Path to a directory of instance files (*.ommx, *.pb)
    #[arg(short, long)]
    directory: Option<PathBuf>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(level.into()))
        .with_target(false)
        .init();

    match cli.command {
        Command::Inspect { file } => {
            let data = read_file(&file)?;
            let instance = decode_instance(&file, &data)?;
            print!("{}", summarize(&instance, &data));
            Ok(())
        }
        Command::Validate {
            input,
            no_check_references,
            reject_unknown_enums,
        } => {
            let config = ValidationConfig::new()
                .check_references(!no_check_references)
                .reject_unknown_enums(reject_unknown_enums);
            if let Some(file) = input.file {
                validate_file(&file, &config)?;
                println!("{}: ok", file.display());
                Ok(())
            } else if let Some(directory) = input.directory {
                validate_directory(&directory, &config)
            } else {
                bail!("Either --file or --directory must be specified")
            }
        }
        Command::Roundtrip { file } => {
            let data = read_file(&file)?;
            let report = roundtrip(&file, &data)?;
            println!("input:  {}", report.input_digest);
            println!("output: {}", report.output_digest);
            if !report.identical() {
                bail!("{}: re-encoded bytes differ from the input", file.display());
            }
            println!("identical");
            Ok(())
        }
        Command::Evaluate {
            file,
            assignments,
            atol,
        } => {
            let data = read_file(&file)?;
            let instance = decode_instance(&file, &data)?;
            print!("{}", evaluate(&instance, assignments, atol)?);
            Ok(())
        }
        Command::Substitute {
            file,
            assignments,
            output,
        } => {
            let substituted = substitute(&file, &output, assignments)?;
            println!("Substituted {} variable(s), wrote {}", substituted, output.display());
            Ok(())
        }
        Command::Schema { output, force } => match output {
            Some(directory) => {
                let path = write_schema(&directory, force)?;
                println!("Wrote {}", path.display());
                Ok(())
            }
            None => {
                print!("{}", schema::proto_source());
                Ok(())
            }
        },
    }
}

/// Parse `ID=VALUE` for `--assign`
fn parse_assignment(s: &str) -> std::result::Result<(u64, f64), String> {
    let (id, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected ID=VALUE, got '{}'", s))?;
    let id = id
        .trim()
        .parse::<u64>()
        .map_err(|e| format!("invalid id '{}': {}", id, e))?;
    let value = value
        .trim()
        .parse::<f64>()
        .map_err(|e| format!("invalid value '{}': {}", value, e))?;
    Ok((id, value))
}

/// Full blake3 digest of `data` as hex
fn digest(data: &[u8]) -> String {
    blake3::hash(data).to_hex().to_string()
}

fn read_file(path: &Path) -> Result<Vec<u8>> {
    trace!("Reading {}", path.display());
    let data = fs::read(path)
        .with_context(|| format!("Failed to read input file: {}", path.display()))?;
    trace!("Read {} bytes from {}", data.len(), path.display());
    Ok(data)
}

fn decode_instance(path: &Path, data: &[u8]) -> Result<Instance> {
    Instance::decode(data).with_context(|| format!("Failed to decode instance: {}", path.display()))
}

/// Human readable summary printed by `inspect`
fn summarize(instance: &Instance, data: &[u8]) -> String {
    let mut out = String::new();
    let mut line = |s: String| {
        out.push_str(&s);
        out.push('\n');
    };

    line(format!("digest:      {}", digest(data)));
    line(format!("size:        {} bytes", data.len()));
    if let Some(description) = &instance.description {
        if let Some(name) = &description.name {
            line(format!("name:        {}", name));
        }
        if let Some(text) = &description.description {
            line(format!("description: {}", text));
        }
        if !description.authors.is_empty() {
            line(format!("authors:     {}", description.authors.join(", ")));
        }
        if let Some(created_by) = &description.created_by {
            line(format!("created by:  {}", created_by));
        }
    }
    line(format!(
        "sense:       {} ({})",
        instance.sense().as_str_name(),
        instance.sense
    ));

    line(format!("variables:   {}", instance.decision_variables.len()));
    for (kind, count) in instance.decision_variable_counts() {
        line(format!("  {:<22} {}", kind.as_str_name(), count));
    }

    let mut by_equality: BTreeMap<Equality, usize> = BTreeMap::new();
    for constraint in &instance.constraints {
        *by_equality.entry(constraint.equality()).or_insert(0) += 1;
    }
    line(format!("constraints: {}", instance.constraints.len()));
    for (equality, count) in by_equality {
        line(format!("  {:<37} {}", equality.as_str_name(), count));
    }

    let objective = instance.objective();
    let kind = objective
        .kind()
        .map_or_else(|| "none".to_string(), |kind| kind.to_string());
    line(format!(
        "objective:   {} (degree {})",
        kind,
        objective.degree()
    ));
    line(format!("unknown fields: {}", instance.unknown_field_count()));
    out
}

fn validate_file(path: &Path, config: &ValidationConfig) -> Result<()> {
    let data = read_file(path)?;
    let instance = decode_instance(path, &data)?;
    let issues = instance.validation_issues(config);
    if let Some(first) = issues.first() {
        for issue in &issues {
            warn!("{}: {}", path.display(), issue);
        }
        bail!(
            "{}: {} validation issue(s), first: {}",
            path.display(),
            issues.len(),
            first
        );
    }
    debug!("{} is valid", path.display());
    Ok(())
}

/// True for files `validate --directory` picks up
fn is_instance_file(path: &Path) -> bool {
    let hidden = path
        .file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.starts_with('.'))
        .unwrap_or(false);
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase);
    !hidden && matches!(extension.as_deref(), Some("ommx") | Some("pb"))
}

fn validate_directory(directory: &Path, config: &ValidationConfig) -> Result<()> {
    if !directory.exists() {
        bail!("Directory does not exist: {}", directory.display());
    }
    if !directory.is_dir() {
        bail!("Path is not a directory: {}", directory.display());
    }

    info!("Scanning directory: {}", directory.display());

    let mut checked = 0;
    let mut failed = 0;

    for entry in WalkDir::new(directory)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let path = entry.path();
        if !path.is_file() || !is_instance_file(path) {
            trace!("Skipping {}", path.display());
            continue;
        }

        checked += 1;
        match validate_file(path, config) {
            Ok(()) => println!("{}: ok", path.display()),
            Err(e) => {
                // Keep going so every failing file is reported
                println!("{}: FAILED: {:#}", path.display(), e);
                failed += 1;
            }
        }
    }

    info!("Validated {} files, {} failed", checked, failed);

    if failed > 0 {
        bail!("{} of {} files failed validation", failed, checked);
    }
    Ok(())
}

struct RoundtripReport {
    input_digest: String,
    output_digest: String,
}

impl RoundtripReport {
    fn identical(&self) -> bool {
        self.input_digest == self.output_digest
    }
}

fn roundtrip(path: &Path, data: &[u8]) -> Result<RoundtripReport> {
    let instance = decode_instance(path, data)?;
    let encoded = instance.encode_to_vec();
    debug!(
        "Re-encoded {}: {} -> {} bytes",
        path.display(),
        data.len(),
        encoded.len()
    );
    Ok(RoundtripReport {
        input_digest: digest(data),
        output_digest: digest(&encoded),
    })
}

/// Report printed by `evaluate`
fn evaluate(instance: &Instance, assignments: Vec<(u64, f64)>, atol: f64) -> Result<String> {
    let state: State = assignments.into_iter().collect();
    let evaluation = instance
        .evaluate(&state, &EvaluationConfig::new().atol(atol))
        .context("Failed to evaluate instance")?;

    let mut out = format!("objective: {}\n", evaluation.objective);
    for constraint in &evaluation.constraints {
        out.push_str(&format!(
            "constraint {}: {} = {} ({})\n",
            constraint.id,
            Equality::try_from(constraint.equality)
                .map(|e| e.as_str_name())
                .unwrap_or("UNKNOWN"),
            constraint.value,
            if constraint.feasible { "satisfied" } else { "violated" }
        ));
    }
    out.push_str(&format!("feasible: {}\n", evaluation.is_feasible()));
    Ok(out)
}

/// Fix the assigned variables of the instance in `input` and write the
/// result to `output`; returns how many ids were substituted
fn substitute(input: &Path, output: &Path, assignments: Vec<(u64, f64)>) -> Result<usize> {
    let mut instance: Instance = io::read_message(input)
        .with_context(|| format!("Failed to load instance: {}", input.display()))?;
    let state: State = assignments.into_iter().collect();
    let substituted = instance
        .partial_evaluate(&state)
        .context("Failed to substitute decision variables")?;
    io::write_message(output, &instance)
        .with_context(|| format!("Failed to write instance: {}", output.display()))?;
    info!("Substituted {:?} into {}", substituted, input.display());
    Ok(substituted.len())
}

/// Write the schema to `directory/ommx/v1/ommx.proto`
fn write_schema(directory: &Path, force: bool) -> Result<PathBuf> {
    let output_path = directory.join(schema::FILE_NAME);

    if let Some(parent) = output_path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }

    if output_path.exists() && !force {
        bail!(
            "File already exists: {} (use --force to overwrite)",
            output_path.display()
        );
    }

    let content = SchemaPrinter::new().print(&schema::file_descriptor_proto());
    let mut file = fs::File::create(&output_path)
        .with_context(|| format!("Failed to create file: {}", output_path.display()))?;
    file.write_all(content.as_bytes())
        .with_context(|| format!("Failed to write file: {}", output_path.display()))?;

    Ok(output_path)
}
