//! sqltrans: translate SQL between dialects
//!
//! # Usage
//!
//! ```bash
//! # Translate a query
//! sqltrans 'SELECT `id` FROM `users` LIMIT 10, 5' --from mysql --to postgres
//!
//! # Read from stdin
//! cat dump.sql | sqltrans - --from mysql --to sqlite
//!
//! # Show the route a translation takes
//! sqltrans route mysql postgres
//! ```

use std::io::Read;
use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand, ValueEnum};
use colored::*;
use serde::Serialize;
use sqltrans::dialects;
use sqltrans::prelude::*;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "sqltrans")]
#[command(version)]
#[command(about = "Rule-based SQL dialect translator", long_about = None)]
#[command(after_help = "EXAMPLES:
    sqltrans 'SELECT IFNULL(a, 0) FROM t LIMIT 5, 10' --from mysql --to ansi
    sqltrans - --from ansi --to sqlite < schema.sql
    sqltrans route mysql postgres")]
struct Cli {
    /// SQL to translate, or '-' to read stdin
    sql: Option<String>,

    /// Source dialect
    #[arg(short, long, env = "SQLTRANS_FROM")]
    from: Option<String>,

    /// Target dialect
    #[arg(short, long, env = "SQLTRANS_TO")]
    to: Option<String>,

    /// Output format
    #[arg(long, value_enum, default_value = "text")]
    format: OutputFormat,

    /// Config file (defaults to ./sqltrans.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the shortest route between two dialects
    Route { from: String, to: String },
    /// List registered dialects and translations
    Dialects,
    /// Print the parsed tree of each statement
    Explain {
        sql: String,
        /// Dialect to parse with
        #[arg(short, long, default_value = dialects::ANSI)]
        from: String,
    },
}

#[derive(Serialize)]
struct TranslationOutput<'a> {
    from: &'a str,
    to: &'a str,
    route: Vec<String>,
    statements: Vec<String>,
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = run(&cli) {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "sqltrans=debug" } else { "sqltrans=warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: &Cli) -> anyhow::Result<()> {
    let config = match &cli.config {
        Some(path) => TransConfig::from_path(path)?,
        None => TransConfig::load()?,
    };
    let translator = Translator::with_config(&config);
    dialects::register_builtin(&translator)?;

    match &cli.command {
        Some(Commands::Route { from, to }) => show_route(&translator, from, to),
        Some(Commands::Dialects) => {
            show_dialects(&translator);
            Ok(())
        }
        Some(Commands::Explain { sql, from }) => explain(&translator, sql, from),
        None => match &cli.sql {
            Some(sql) => {
                let from = cli
                    .from
                    .clone()
                    .or(config.default_source.clone())
                    .context("no source dialect; pass --from or set default_source")?;
                let to = cli
                    .to
                    .clone()
                    .or(config.default_target.clone())
                    .context("no target dialect; pass --to or set default_target")?;
                let sql = read_input(sql)?;
                translate(&translator, &sql, &from, &to, cli)
            }
            None => {
                println!("{}", "sqltrans: SQL dialect translator".cyan().bold());
                println!();
                println!("Usage: sqltrans <SQL> --from <DIALECT> --to <DIALECT>");
                println!();
                println!("Try: sqltrans --help");
                Ok(())
            }
        },
    }
}

fn read_input(sql: &str) -> anyhow::Result<String> {
    if sql != "-" {
        return Ok(sql.to_string());
    }
    let mut buf = String::new();
    std::io::stdin()
        .read_to_string(&mut buf)
        .context("failed to read stdin")?;
    Ok(buf)
}

fn translate(translator: &Translator, sql: &str, from: &str, to: &str, cli: &Cli) -> anyhow::Result<()> {
    let translation = translator.find_translation(from, to)?;
    let statements = translator.translate(sql, from, to, Some(translation.as_ref()))?;
    let route: Vec<String> = translation
        .hops()
        .iter()
        .map(|(s, t)| format!("{} -> {}", s, t))
        .collect();

    match cli.format {
        OutputFormat::Json => {
            let output = TranslationOutput {
                from,
                to,
                route,
                statements,
            };
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Text => {
            if cli.verbose {
                eprintln!("{} {}", "Input:".dimmed(), sql.trim_end().yellow());
                eprintln!("{} {}", "Route:".dimmed(), route.join(", ").cyan());
            }
            println!("{}", statements.concat());
        }
    }
    Ok(())
}

fn show_route(translator: &Translator, from: &str, to: &str) -> anyhow::Result<()> {
    let Some(route) = translator.find_route(from, to) else {
        bail!(TransError::not_found(from, to));
    };
    println!("{} {} {} {}", "Route:".green().bold(), from.cyan(), "→".dimmed(), to.cyan());
    if route.is_empty() {
        println!("  {}", "(same dialect, nothing to do)".dimmed());
    }
    for (i, (src, tgt)) in route.iter().enumerate() {
        println!("  {}. {} → {}", i + 1, src.yellow(), tgt.yellow());
    }
    Ok(())
}

fn show_dialects(translator: &Translator) {
    println!("{}", "Dialects:".green().bold());
    for dialect in translator.dialects() {
        println!("  • {}", dialect.cyan());
    }
    println!();
    println!("{}", "Translations:".green().bold());
    for (src, tgt) in translator.routes() {
        println!("  {} → {}", src.yellow(), tgt.yellow());
    }
}

fn explain(translator: &Translator, sql: &str, from: &str) -> anyhow::Result<()> {
    let trees = translator.parser(from).parse(sql)?;
    println!("{} {}", "Dialect:".dimmed(), from.cyan());
    for (i, tree) in trees.iter().enumerate() {
        println!();
        println!("{} {}", format!("Statement {}:", i + 1).green().bold(), tree.to_string().trim_end().white());
        print!("{}", tree.outline());
    }
    Ok(())
}
