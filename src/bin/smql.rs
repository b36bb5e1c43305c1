//! smql: compile SMQL queries from the command line
//!
//! # Usage
//!
//! ```bash
//! # Show the SQL and bindings for a query
//! smql compile -s schema.json -m Person '{"givenname=": "Peter"}'
//!
//! # Show the parsed conditions and predicate tree
//! smql explain -s schema.json -m Person '{"articles.title~": "rust"}'
//!
//! # Execute against a database
//! smql run -s schema.json -m Person '{"limit:": 10}' --database-url postgres://localhost/app
//! ```

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand, ValueEnum};
use colored::*;
use smql::grammar::{FUNCTIONS, RULES};
use smql::prelude::*;
use std::collections::HashMap;
use std::io::Read;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "smql")]
#[command(version)]
#[command(about = "Compile SMQL JSON queries into parameterized SQL", long_about = None)]
#[command(after_help = "EXAMPLES:
    smql compile -s schema.json -m Person '{\"givenname=\": \"Peter\"}'
    smql explain -s schema.toml -m Person '{\"articles=>\": {\"title~\": \"rust\"}}'
    smql run -s schema.json -m Person '{\"order:\": \"surname\", \"limit:\": 10}'")]
struct Cli {
    /// Configuration file (defaults to $SMQL_CONFIG or the user config dir)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct QueryArgs {
    /// Schema file (.json or .toml)
    #[arg(short, long)]
    schema: PathBuf,

    /// Root model name
    #[arg(short, long)]
    model: String,

    /// Query JSON, `@file` to read a file, or `-` for stdin
    query: String,
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a query and print SQL with bindings
    Compile {
        #[command(flatten)]
        args: QueryArgs,

        /// Print the whole plan as JSON
        #[arg(long)]
        json: bool,

        /// Rewrite placeholders positionally for this database URL scheme
        #[arg(long)]
        positional: Option<String>,
    },
    /// Show parsed conditions and the normalized predicate tree
    Explain {
        #[command(flatten)]
        args: QueryArgs,
    },
    /// Show the operator reference
    Operators,
    /// Compile and execute a query
    Run {
        #[command(flatten)]
        args: QueryArgs,

        /// Database connection URL
        #[arg(long, env = "SMQL_DATABASE_URL")]
        database_url: Option<String>,

        /// Output format
        #[arg(short, long, value_enum, default_value = "table")]
        format: OutputFormat,
    },
}

fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_env("SMQL_LOG")
        .unwrap_or_else(|_| EnvFilter::new(if verbose { "smql=debug" } else { "warn" }));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = dispatch(&cli).await {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        if let Some(err) = e.downcast_ref::<SmqlError>() {
            eprintln!(
                "{} {}",
                format!("[{}]", err.kind()).dimmed(),
                err.data().to_string().dimmed()
            );
        }
        std::process::exit(1);
    }
}

async fn dispatch(cli: &Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => SmqlConfig::load(path)?,
        None => SmqlConfig::discover()?,
    };

    match &cli.command {
        Commands::Compile {
            args,
            json,
            positional,
        } => compile_query(args, &config, *json, positional.as_deref()),
        Commands::Explain { args } => explain_query(args, &config),
        Commands::Operators => {
            show_operators();
            Ok(())
        }
        Commands::Run {
            args,
            database_url,
            format,
        } => {
            let url = database_url
                .clone()
                .or_else(|| config.database_url.clone());
            run_query(args, &config, url, format).await
        }
    }
}

fn read_query(input: &str) -> Result<serde_json::Value> {
    let text = if input == "-" {
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf)?;
        buf
    } else if let Some(path) = input.strip_prefix('@') {
        std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path))?
    } else {
        input.to_string()
    };
    serde_json::from_str(&text).context("Query is not valid JSON")
}

fn load(args: &QueryArgs) -> Result<(Schema, serde_json::Value)> {
    let schema = Schema::load(&args.schema)
        .with_context(|| format!("Failed to load schema {}", args.schema.display()))?;
    let query = read_query(&args.query)?;
    Ok((schema, query))
}

fn compile_query(
    args: &QueryArgs,
    config: &SmqlConfig,
    json: bool,
    positional: Option<&str>,
) -> Result<()> {
    let (schema, query) = load(args)?;
    let plan = smql::compile(&schema, &args.model, &query, config)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&plan)?);
        return Ok(());
    }

    println!("{}", "Generated SQL:".green().bold());
    match positional {
        Some(url) => {
            let style = smql::engine::Placeholder::for_url(url);
            let (sql, values) = smql::engine::to_positional(&plan, style);
            println!("{}", sql.white());
            print_values(values.iter().enumerate().map(|(i, v)| (format!("${}", i + 1), v)));
        }
        None => {
            println!("{}", plan.to_sql().white());
            print_values(plan.bindings.iter().map(|(n, v)| (format!(":{}", n), v)));
        }
    }

    if !plan.includes.is_empty() {
        println!();
        println!("{}", "Includes:".cyan());
        for path in plan.includes.paths() {
            println!("  {}", path.yellow());
        }
    }
    Ok(())
}

fn print_values<'a>(values: impl Iterator<Item = (String, &'a BindValue)>) {
    let values: Vec<_> = values.collect();
    if values.is_empty() {
        return;
    }
    println!();
    println!("{}", "Bindings:".cyan());
    for (name, value) in values {
        println!("  {} = {}", name, value.to_string().yellow());
    }
}

fn explain_query(args: &QueryArgs, config: &SmqlConfig) -> Result<()> {
    let (schema, query) = load(args)?;

    println!("{}", "SMQL Query Explanation".cyan().bold());
    println!();
    println!("{} {}", "Model:".dimmed(), args.model.white());
    println!("{} {}", "Query:".dimmed(), query.to_string().yellow());
    println!();

    let conditions = smql::parse(&schema, &args.model, &query)?;
    println!("{}", "Conditions:".green().bold());
    for condition in &conditions {
        println!("  • {}", condition.name().cyan());
    }

    let plan = smql::compile(&schema, &args.model, &query, config)?;
    println!();
    println!("{}", "Predicate tree:".green().bold());
    if plan.predicate.is_empty() {
        println!("  {}", "(none)".dimmed());
    } else {
        for line in plan.predicate.pretty().lines() {
            println!("  {}", line.white());
        }
    }

    if !plan.joins.is_empty() {
        println!();
        println!("{}", "Joins:".green().bold());
        for join in &plan.joins {
            println!("  {}", join.white());
        }
    }

    println!();
    println!("{}", "Generated SQL:".green().bold());
    println!("  {}", plan.to_sql().white());
    Ok(())
}

async fn run_query(
    args: &QueryArgs,
    config: &SmqlConfig,
    database_url: Option<String>,
    format: &OutputFormat,
) -> Result<()> {
    let Some(url) = database_url else {
        bail!("No database URL. Use --database-url or set SMQL_DATABASE_URL");
    };
    let (schema, query) = load(args)?;
    let plan = smql::compile(&schema, &args.model, &query, config)?;

    let db = SmqlDb::connect(&url).await?;
    let results = db.fetch_all(&plan).await?;
    format_output(&results, format);
    Ok(())
}

fn format_output(results: &[HashMap<String, serde_json::Value>], format: &OutputFormat) {
    if results.is_empty() {
        println!("{}", "(no results)".dimmed());
        return;
    }

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(results).unwrap_or_default());
        }
        OutputFormat::Table => {
            let mut columns: Vec<&String> = results[0].keys().collect();
            columns.sort();

            let mut widths: HashMap<&String, usize> = columns.iter().map(|c| (*c, c.len())).collect();
            for row in results {
                for (col, val) in row {
                    let len = val_to_string(val).len();
                    if let Some(w) = widths.get_mut(col) {
                        *w = (*w).max(len);
                    }
                }
            }

            let header: Vec<String> = columns
                .iter()
                .map(|c| format!("{:width$}", c, width = widths[*c]))
                .collect();
            println!("{}", header.join(" │ ").white().bold());

            let sep: Vec<String> = columns.iter().map(|c| "─".repeat(widths[*c])).collect();
            println!("{}", sep.join("─┼─").dimmed());

            for row in results {
                let cells: Vec<String> = columns
                    .iter()
                    .map(|c| {
                        let val = row.get(*c).map(val_to_string).unwrap_or_default();
                        format!("{:width$}", val, width = widths[*c])
                    })
                    .collect();
                println!("{}", cells.join(" │ "));
            }

            println!();
            println!("{} row(s) returned", results.len().to_string().cyan());
        }
    }
}

fn val_to_string(val: &serde_json::Value) -> String {
    match val {
        serde_json::Value::Null => "NULL".to_string(),
        serde_json::Value::Bool(b) => b.to_string(),
        serde_json::Value::Number(n) => n.to_string(),
        serde_json::Value::String(s) => s.clone(),
        _ => val.to_string(),
    }
}

fn show_operators() {
    println!("{}", "SMQL Operator Reference".cyan().bold());
    println!();
    println!(
        "{:8} {:20} {:28} {}",
        "Operator".white().bold(),
        "Rule".white().bold(),
        "Accepts".white().bold(),
        "Meaning".white().bold()
    );
    println!("{}", "─".repeat(96).dimmed());

    for rule in RULES {
        let shapes: Vec<&str> = rule.shapes.iter().map(|s| s.name()).collect();
        let operator = if rule.operator.is_empty() { "(none)" } else { rule.operator };
        println!(
            "{:8} {:20} {:28} {}",
            operator.cyan().bold(),
            rule.name.yellow(),
            shapes.join(", ").white(),
            rule.description.dimmed()
        );
    }

    println!();
    println!("{}", "Functions (key `<name>:`)".cyan().bold());
    for function in FUNCTIONS {
        let shapes: Vec<&str> = function.shapes.iter().map(|s| s.name()).collect();
        println!("  {:8} {}", function.kind.name().yellow(), shapes.join(", ").white());
    }
}
