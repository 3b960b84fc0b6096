//! JSON:API protocol CLI
//!
//! Runs the request parser and document serializer over JSON files, for
//! inspecting what a request would do before wiring up a transport.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use jsonapi_core::{
    error_objects, parse_request, serialize, Action, KeyFormat, Primary, ResourceGraph,
    ResourceInstance, SchemaRegistry, SerializeOptions,
};
use serde_json::{json, Value};

#[derive(Parser)]
#[command(name = "jsonapi-core")]
#[command(about = "Parse JSON:API requests and serialize JSON:API documents")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse raw request parameters into operations and errors
    Parse {
        /// JSON file with the raw request parameters
        params: PathBuf,

        /// JSON file describing the resource schemas
        #[arg(long)]
        registry: PathBuf,

        /// Action to parse for (e.g. index, show, create, update, destroy)
        #[arg(long)]
        action: String,

        /// Primary resource type (canonical name)
        #[arg(long = "type")]
        resource_type: String,

        /// Wire key format: underscored, camelized, or dasherized
        #[arg(long, default_value = "underscored")]
        key_format: String,

        /// Output file (stdout if not specified)
        #[arg(long)]
        output: Option<PathBuf>,

        /// Pretty-print JSON output
        #[arg(long)]
        pretty: bool,
    },

    /// Serialize resolved resources into a JSON:API document
    Serialize {
        /// JSON file with `primary` and `related` resource instances, plus
        /// optional `fields` and `include`
        data: PathBuf,

        /// JSON file describing the resource schemas
        #[arg(long)]
        registry: PathBuf,

        /// Treat the primary data as a single resource instead of a collection
        #[arg(long)]
        single: bool,

        /// Base URL for self/resource hrefs
        #[arg(long, default_value = "")]
        base_url: String,

        /// Wire key format: underscored, camelized, or dasherized
        #[arg(long, default_value = "underscored")]
        key_format: String,

        /// Output file (stdout if not specified)
        #[arg(long)]
        output: Option<PathBuf>,

        /// Pretty-print JSON output
        #[arg(long)]
        pretty: bool,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Parse {
            params,
            registry,
            action,
            resource_type,
            key_format,
            output,
            pretty,
        } => run_parse(
            &params,
            &registry,
            &action,
            &resource_type,
            &key_format,
            output,
            pretty,
        ),

        Commands::Serialize {
            data,
            registry,
            single,
            base_url,
            key_format,
            output,
            pretty,
        } => run_serialize(&data, &registry, single, &base_url, &key_format, output, pretty),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(code) => ExitCode::from(code),
    }
}

fn run_parse(
    params_path: &Path,
    registry_path: &Path,
    action: &str,
    resource_type: &str,
    key_format: &str,
    output: Option<PathBuf>,
    pretty: bool,
) -> Result<(), u8> {
    let registry = load_registry(registry_path)?;
    let key_format = parse_key_format(key_format)?;

    let Some(action) = Action::parse(action) else {
        eprintln!("Error: unknown action: {}", action);
        return Err(2);
    };

    let params = load_json(params_path)?;
    let Some(params) = params.as_object() else {
        eprintln!("Error: {} must contain a JSON object", params_path.display());
        return Err(2);
    };

    let parsed = parse_request(action, params, resource_type, &registry, key_format);

    let result = json!({
        "valid": parsed.is_valid(),
        "fields": parsed.fields,
        "include": parsed.include,
        "filters": parsed.filters,
        "sort": parsed.sort,
        "operations": parsed.operations,
        "errors": error_objects(&parsed.errors),
    });
    write_result(&result, output, pretty)?;

    if parsed.is_valid() {
        Ok(())
    } else {
        Err(1)
    }
}

fn run_serialize(
    data_path: &Path,
    registry_path: &Path,
    single: bool,
    base_url: &str,
    key_format: &str,
    output: Option<PathBuf>,
    pretty: bool,
) -> Result<(), u8> {
    let registry = load_registry(registry_path)?;
    let key_format = parse_key_format(key_format)?;

    let data = load_json(data_path)?;
    let primary = load_resources(&data, "primary", data_path)?;
    let related = load_resources(&data, "related", data_path)?;

    if single && primary.len() != 1 {
        eprintln!(
            "Error: --single requires exactly one primary resource, found {}",
            primary.len()
        );
        return Err(2);
    }

    let fields: std::collections::BTreeMap<String, Vec<String>> = match data.get("fields") {
        Some(value) => serde_json::from_value(value.clone()).map_err(|e| {
            eprintln!("Error: invalid fields member: {}", e);
            2u8
        })?,
        None => Default::default(),
    };
    let include: Vec<String> = match data.get("include") {
        Some(value) => serde_json::from_value(value.clone()).map_err(|e| {
            eprintln!("Error: invalid include member: {}", e);
            2u8
        })?,
        None => Vec::new(),
    };

    let mut graph = ResourceGraph::new();
    for resource in primary.iter().chain(related.iter()) {
        graph.insert(resource.clone());
    }

    let options = SerializeOptions {
        fields: &fields,
        include: &include,
        key_format,
        base_url,
    };
    let source = if single {
        Primary::Single(&primary[0])
    } else {
        Primary::Many(&primary)
    };

    let document = serialize(source, &graph, &registry, &options);
    write_result(&document, output, pretty)
}

fn load_registry(path: &Path) -> Result<SchemaRegistry, u8> {
    let value = load_json(path)?;
    SchemaRegistry::from_json(value).map_err(|e| {
        eprintln!("Error: invalid registry {}: {}", path.display(), e);
        2u8
    })
}

fn load_resources(data: &Value, member: &str, path: &Path) -> Result<Vec<ResourceInstance>, u8> {
    match data.get(member) {
        None => Ok(Vec::new()),
        Some(value) => serde_json::from_value(value.clone()).map_err(|e| {
            eprintln!(
                "Error: invalid {} member in {}: {}",
                member,
                path.display(),
                e
            );
            2u8
        }),
    }
}

fn parse_key_format(name: &str) -> Result<KeyFormat, u8> {
    KeyFormat::parse(name).ok_or_else(|| {
        eprintln!("Error: unknown key format: {}", name);
        2u8
    })
}

fn load_json(path: &Path) -> Result<Value, u8> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        eprintln!("Error: cannot read {}: {}", path.display(), e);
        3u8
    })?;
    serde_json::from_str(&content).map_err(|e| {
        eprintln!("Error: invalid JSON in {}: {}", path.display(), e);
        2u8
    })
}

fn write_result(value: &Value, output: Option<PathBuf>, pretty: bool) -> Result<(), u8> {
    let json_output = if pretty {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    }
    .map_err(|e| {
        eprintln!("Error serializing output: {}", e);
        2u8
    })?;

    match output {
        Some(path) => std::fs::write(&path, &json_output).map_err(|e| {
            eprintln!("Error writing to {}: {}", path.display(), e);
            3u8
        }),
        None => {
            println!("{}", json_output);
            Ok(())
        }
    }
}
