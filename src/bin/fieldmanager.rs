//! fieldmanager - typed merges and field ownership from the command line.
//!
//! Objects are read as YAML or JSON. Without `--schema` or `--openapi`
//! every object is treated as untyped.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use fieldmanager::fieldpath::{APIVersion, ManagerId, Operation};
use fieldmanager::merge::{
    extract_owned, join_managed_fields, split_managed_fields, Request, Updater,
};
use fieldmanager::openapi::OpenAPIDocument;
use fieldmanager::schema::{GroupVersionKind, Schema, SchemaRegistry};
use fieldmanager::typed::{deduced_parseable_type, ParseableType, TypedValue};
use fieldmanager::value::Value;

type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

#[derive(Debug, Parser)]
#[command(name = "fieldmanager", version, about = "Typed merges and field ownership for Kubernetes-style objects")]
struct Cli {
    /// Schema in the native YAML format
    #[arg(short, long, global = true, conflicts_with = "openapi")]
    schema: Option<PathBuf>,

    /// Swagger 2.0 or OpenAPI 3 document (JSON or YAML)
    #[arg(long, global = true)]
    openapi: Option<PathBuf>,

    /// Name of the type in the schema to use
    #[arg(short, long, global = true, conflicts_with = "gvk")]
    type_name: Option<String>,

    /// Kind to look the type up by, as group/version/Kind or version/Kind
    #[arg(long, global = true)]
    gvk: Option<GroupVersionKind>,

    /// Output location, `-` for stdout
    #[arg(short, long, global = true, default_value = "-")]
    output: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List all types in the schema
    ListTypes,
    /// List the kinds the schema maps onto types
    ListKinds,
    /// Validate a YAML/JSON file against the type
    Validate { file: PathBuf },
    /// Print the FieldsV1 encoding of the fields a file sets
    Fieldset { file: PathBuf },
    /// Merge RHS over LHS
    Merge { lhs: PathBuf, rhs: PathBuf },
    /// List the fields that differ between LHS and RHS
    Compare { lhs: PathBuf, rhs: PathBuf },
    /// Print the part of an object a manager owns
    Extract {
        object: PathBuf,
        #[arg(long)]
        manager: String,
        #[arg(long, value_enum, default_value_t = OperationArg::Apply)]
        operation: OperationArg,
    },
    /// Apply a configuration to a live object
    Apply {
        live: PathBuf,
        config: PathBuf,
        #[arg(long)]
        manager: String,
        #[arg(long)]
        force: bool,
        /// Reject changes to fields other managers own
        #[arg(long)]
        detect_conflicts: bool,
        #[arg(long)]
        time: Option<DateTime<Utc>>,
    },
    /// Write a new object over a live object
    Update {
        live: PathBuf,
        new: PathBuf,
        #[arg(long)]
        manager: String,
        #[arg(long)]
        time: Option<DateTime<Utc>>,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OperationArg {
    Apply,
    Update,
}

impl From<OperationArg> for Operation {
    fn from(op: OperationArg) -> Self {
        match op {
            OperationArg::Apply => Operation::Apply,
            OperationArg::Update => Operation::Update,
        }
    }
}

fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

fn run(cli: Cli) -> CliResult<()> {
    let registry = load_registry(&cli)?;

    let mut output: Box<dyn Write> = if cli.output == "-" {
        Box::new(io::stdout())
    } else {
        Box::new(
            fs::File::create(&cli.output)
                .map_err(|e| format!("failed to create output file {:?}: {}", cli.output, e))?,
        )
    };

    match &cli.command {
        Command::ListTypes => {
            let registry = registry.as_ref().ok_or("list-types needs --schema or --openapi")?;
            writeln!(output, "Types in schema:")?;
            for name in registry.schema().type_names() {
                writeln!(output, "  - {}", name)?;
            }
        }
        Command::ListKinds => {
            let registry = registry.as_ref().ok_or("list-kinds needs --openapi")?;
            for (gvk, type_name) in registry.kinds() {
                writeln!(output, "{}\t{}", gvk, type_name)?;
            }
        }
        Command::Validate { file } => {
            let pt = parseable_type(registry.as_ref(), &cli)?;
            pt.from_value(read_value(file)?)?;
            writeln!(output, "Validation successful")?;
        }
        Command::Fieldset { file } => {
            let pt = parseable_type(registry.as_ref(), &cli)?;
            let set = pt.from_value(read_value(file)?)?.to_field_set()?;
            output.write_all(&set.to_json())?;
            writeln!(output)?;
        }
        Command::Merge { lhs, rhs } => {
            let pt = parseable_type(registry.as_ref(), &cli)?;
            let lhs = pt.from_value(read_value(lhs)?)?;
            let rhs = pt.from_value(read_value(rhs)?)?;
            write_value(&mut output, lhs.merge(&rhs)?.as_value())?;
        }
        Command::Compare { lhs, rhs } => {
            let pt = parseable_type(registry.as_ref(), &cli)?;
            let lhs = pt.from_value(read_value(lhs)?)?;
            let rhs = pt.from_value(read_value(rhs)?)?;
            let comparison = lhs.compare(&rhs)?;
            if comparison.is_same() {
                writeln!(output, "Objects are identical")?;
            } else {
                write!(output, "{}", comparison)?;
            }
        }
        Command::Extract {
            object,
            manager,
            operation,
        } => {
            let pt = parseable_type(registry.as_ref(), &cli)?;
            let (object, managers) = split_managed_fields(read_value(object)?)?;
            let id = ManagerId::new(manager.as_str(), Operation::from(*operation));
            let object = pt.from_value(object)?;
            let extracted = extract_owned(&object, &managers, &id)
                .ok_or_else(|| format!("no managed fields recorded for {}", id))?;
            write_value(&mut output, extracted.as_value())?;
        }
        Command::Apply {
            live,
            config,
            manager,
            force,
            detect_conflicts,
            time,
        } => {
            let pt = parseable_type(registry.as_ref(), &cli)?;
            let (live, managers) = split_managed_fields(read_value(live)?)?;
            let (config, _) = split_managed_fields(read_value(config)?)?;
            let live = pt.from_value(live)?;
            let config = pt.from_value(config)?;

            let req = request(manager, &live, *time).with_force(*force);
            let updater = Updater::builder().detect_conflicts(*detect_conflicts).build();
            let result = updater.apply(&live, &config, &managers, &req)?;
            write_value(
                &mut output,
                &join_managed_fields(result.object.into_value(), &result.managers)?,
            )?;
        }
        Command::Update {
            live,
            new,
            manager,
            time,
        } => {
            let pt = parseable_type(registry.as_ref(), &cli)?;
            let (live, managers) = split_managed_fields(read_value(live)?)?;
            let (new, _) = split_managed_fields(read_value(new)?)?;
            let live = pt.from_value(live)?;
            let new = pt.from_value(new)?;

            let req = request(manager, &live, *time);
            let result = Updater::default().update(&live, &new, &managers, &req)?;
            write_value(
                &mut output,
                &join_managed_fields(result.object.into_value(), &result.managers)?,
            )?;
        }
    }

    Ok(())
}

fn load_registry(cli: &Cli) -> CliResult<Option<SchemaRegistry>> {
    if let Some(path) = &cli.schema {
        let schema = Schema::from_yaml(&read_file(path)?)?;
        debug!(types = schema.type_names().len(), "loaded schema");
        return Ok(Some(SchemaRegistry::new(schema)));
    }
    if let Some(path) = &cli.openapi {
        let doc = OpenAPIDocument::from_yaml(&read_file(path)?)?;
        let registry = SchemaRegistry::from_openapi(&doc)?;
        debug!(
            types = registry.schema().type_names().len(),
            kinds = registry.kinds().len(),
            "loaded OpenAPI document"
        );
        return Ok(Some(registry));
    }
    Ok(None)
}

/// The type objects are read as: `--gvk`, then `--type-name`, then the
/// first type of the schema. Without a schema, the deduced type.
fn parseable_type<'r>(registry: Option<&'r SchemaRegistry>, cli: &Cli) -> CliResult<ParseableType<'r>> {
    let Some(registry) = registry else {
        return Ok(deduced_parseable_type());
    };
    if let Some(gvk) = &cli.gvk {
        return registry
            .parseable_type_for(gvk)
            .ok_or_else(|| format!("kind {} not found in schema", gvk).into());
    }
    let type_name = match &cli.type_name {
        Some(name) => name.as_str(),
        None => registry
            .schema()
            .type_names()
            .first()
            .map(String::as_str)
            .ok_or("no types found in schema")?,
    };
    registry
        .parseable_type(type_name)
        .ok_or_else(|| format!("type {:?} not found in schema", type_name).into())
}

/// The request for a write: the version is taken from the live object's
/// `apiVersion`, the time defaults to now.
fn request(manager: &str, live: &TypedValue<'_>, time: Option<DateTime<Utc>>) -> Request {
    let api_version = live
        .as_value()
        .as_map()
        .and_then(|m| m.get("apiVersion"))
        .and_then(Value::as_str)
        .map(APIVersion::from)
        .unwrap_or_default();
    Request::new(manager, api_version, time.unwrap_or_else(Utc::now))
}

fn read_file(path: &Path) -> CliResult<String> {
    fs::read_to_string(path).map_err(|e| format!("failed to read {:?}: {}", path, e).into())
}

fn read_value(path: &Path) -> CliResult<Value> {
    Ok(Value::from_yaml(&read_file(path)?)?)
}

fn write_value(output: &mut dyn Write, value: &Value) -> CliResult<()> {
    write!(output, "{}", value.to_yaml()?)?;
    Ok(())
}
