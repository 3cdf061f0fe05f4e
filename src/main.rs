//! Command-line interface for xsd-grammar

#[cfg(feature = "cli")]
use clap::{Parser, Subcommand};

#[cfg(feature = "cli")]
use std::path::{Path, PathBuf};

#[cfg(feature = "cli")]
use tracing_subscriber::EnvFilter;

#[cfg(feature = "cli")]
use xsd_grammar::compiler::CompiledSchema;
#[cfg(feature = "cli")]
use xsd_grammar::exports::GrammarSummary;
#[cfg(feature = "cli")]
use xsd_grammar::loader::{LoaderOptions, SchemaLoader};
#[cfg(feature = "cli")]
use xsd_grammar::loaders::FileResolver;

#[cfg(feature = "cli")]
#[derive(Parser, Debug)]
#[command(name = "xsdc")]
#[command(author, version, about = "XML Schema grammar checker", long_about = None)]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[cfg(feature = "cli")]
#[derive(Subcommand, Debug)]
enum Commands {
    /// Load, check and compile a schema
    Check {
        /// Path to the XSD schema file
        #[arg(value_name = "SCHEMA")]
        schema: PathBuf,

        /// Skip imports whose document cannot be found
        #[arg(long)]
        allow_missing_imports: bool,

        /// Print the compiled grammar as JSON
        #[arg(short, long)]
        json: bool,
    },
}

#[cfg(feature = "cli")]
fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let ok = match cli.command {
        Commands::Check {
            schema,
            allow_missing_imports,
            json,
        } => cmd_check(&schema, allow_missing_imports, json),
    };

    if !ok {
        std::process::exit(1);
    }
}

#[cfg(feature = "cli")]
fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[cfg(feature = "cli")]
fn cmd_check(schema_path: &Path, allow_missing_imports: bool, json: bool) -> bool {
    let base_dir = match schema_path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let location = match schema_path.file_name() {
        Some(name) => name.to_string_lossy().into_owned(),
        None => {
            eprintln!("Error: '{}' is not a file path", schema_path.display());
            return false;
        }
    };

    let resolver = match FileResolver::new(&base_dir) {
        Ok(resolver) => resolver,
        Err(e) => {
            eprintln!("Error: {}", e);
            return false;
        }
    };
    let options = LoaderOptions::new().with_allow_missing_import_locations(allow_missing_imports);
    let mut loader = SchemaLoader::new(resolver).with_options(options);

    let compiled = match loader.load(&location) {
        Ok(compiled) => compiled,
        Err(e) => {
            if e.errors().is_empty() {
                eprintln!("Error: {}", e);
            } else {
                for error in e.errors() {
                    println!("{}: {}", error.kind, error.message);
                }
            }
            return false;
        }
    };

    if json {
        match GrammarSummary::from_schema(&compiled).to_json() {
            Ok(text) => println!("{}", text),
            Err(e) => {
                eprintln!("Error: {}", e);
                return false;
            }
        }
    } else {
        print_summary(&compiled);
    }
    true
}

#[cfg(feature = "cli")]
fn print_summary(schema: &CompiledSchema) {
    println!("Schema: {}", schema.system_id);
    if !schema.target_namespace.is_empty() {
        println!("Target namespace: {}", schema.target_namespace);
    }
    println!("  Global elements:   {}", schema.elements.len());
    println!("  Named types:       {}", schema.types.len());
    println!("  Global attributes: {}", schema.attributes.len());
    println!("  Notations:         {}", schema.notations.len());
    println!(
        "  Substitution groups: {}",
        schema
            .substitution_groups
            .values()
            .filter(|members| !members.is_empty())
            .count()
    );
    println!("OK");
}

#[cfg(not(feature = "cli"))]
fn main() {
    eprintln!("CLI feature not enabled. Rebuild with --features cli");
    std::process::exit(1);
}
