//! sqlrest: run SQL-shaped statements against a PostgREST API.
//!
//! # Usage
//!
//! ```bash
//! # Run a query
//! sqlrest "SELECT * FROM calls WHERE company_id = ? LIMIT 10" --bind 5
//!
//! # Show the client calls only
//! sqlrest "DELETE FROM calls WHERE id IN (?, ?)" --bind 1,2 --dry-run
//!
//! # Inspect how a statement is understood
//! sqlrest explain "UPDATE calls SET status = ? WHERE id = ?" --bind done,7
//! ```

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use colored::*;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use sqlrest::ast::{Columns, Direction, Statement};
use sqlrest::prelude::*;

#[derive(Parser)]
#[command(name = "sqlrest")]
#[command(version)]
#[command(about = "Run SQL-shaped statements against a PostgREST API", long_about = None)]
#[command(after_help = "EXAMPLES:
    sqlrest 'SELECT * FROM calls WHERE company_id = ? LIMIT 10' --bind 5
    sqlrest 'UPDATE calls SET status = ? WHERE id = ?' --bind done,7 --dry-run
    sqlrest explain 'SELECT id FROM calls WHERE phone_number LIKE ?' --bind %912%")]
struct Cli {
    /// The statement to run
    statement: Option<String>,

    /// Don't send anything, just show the client calls
    #[arg(short, long)]
    dry_run: bool,

    /// Positional parameters for `?` markers
    #[arg(short, long, value_delimiter = ',', global = true)]
    bind: Vec<String>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    format: OutputFormat,

    /// Path to a sqlrest.toml file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Service base URL
    #[arg(long, env = "SQLREST_URL")]
    url: Option<String>,

    /// Service API key
    #[arg(long, env = "SQLREST_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse a statement and show its AST and client calls
    Explain {
        /// The statement to explain
        statement: String,
    },
    /// Show the accepted statement grammar
    Grammar,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let outcome = match &cli.command {
        Some(Commands::Explain { statement }) => {
            explain(statement, &bindings(&cli.bind));
            Ok(())
        }
        Some(Commands::Grammar) => {
            show_grammar();
            Ok(())
        }
        None => match &cli.statement {
            Some(statement) => run(statement, &cli).await,
            None => {
                println!("{}", "sqlrest".cyan().bold());
                println!();
                println!("Usage: sqlrest <STATEMENT> [OPTIONS]");
                println!();
                println!("Try: sqlrest --help");
                Ok(())
            }
        },
    };

    if let Err(e) = outcome {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

fn init_tracing(verbose: bool) {
    let fallback = if verbose { "sqlrest=debug" } else { "sqlrest=info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback)),
        )
        .with_writer(std::io::stderr)
        .init();
}

async fn run(statement: &str, cli: &Cli) -> anyhow::Result<()> {
    let params = bindings(&cli.bind);

    if cli.verbose {
        println!("{} {}", "Statement:".dimmed(), statement.yellow());
    }

    if cli.dry_run {
        let plan = sqlrest::translate(statement, &params)?;
        print_plan(&plan);
        print_bindings(&params);
        return Ok(());
    }

    let config = resolve_config(cli)?;
    if cli.verbose {
        println!("{} {}", "Service:".dimmed(), config.url);
    }
    let store = Store::connect(config)?;

    match sqlrest::classify(statement) {
        StatementKind::Select => {
            let rows: Vec<Row> = store.query_all(statement, &params).await?;
            format_output(&rows, &cli.format);
        }
        StatementKind::Unsupported => {
            store.execute(statement, &params).await?;
            println!("{} statement skipped (not INSERT/UPDATE/DELETE/SELECT)", "-".dimmed());
        }
        _ => {
            let outcome = store.execute(statement, &params).await?;
            match cli.format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&outcome)?),
                OutputFormat::Table => {
                    println!("{} {} rows affected", "✓".green(), outcome.rows_affected);
                    if let Some(id) = outcome.last_id {
                        println!("  {} {}", "id:".dimmed(), id.to_string().cyan());
                    }
                }
            }
        }
    }

    Ok(())
}

fn resolve_config(cli: &Cli) -> anyhow::Result<StoreConfig> {
    if let Some(path) = &cli.config {
        return StoreConfig::load(path)
            .with_context(|| format!("failed to load {}", path.display()));
    }
    if let (Some(url), Some(key)) = (&cli.url, &cli.api_key) {
        return Ok(StoreConfig::builder().url(url).api_key(key).build()?);
    }
    StoreConfig::discover()
        .context("no configuration found; pass --config, --url/--api-key or create sqlrest.toml")
}

/// Numbers, booleans and `null` are typed; anything else is a string.
fn bindings(raw: &[String]) -> Vec<Value> {
    raw.iter()
        .map(|b| {
            if b.eq_ignore_ascii_case("null") {
                Value::Null
            } else if let Ok(n) = b.parse::<i64>() {
                Value::Int(n)
            } else if let Ok(f) = b.parse::<f64>() {
                Value::Float(f)
            } else if b == "true" {
                Value::Bool(true)
            } else if b == "false" {
                Value::Bool(false)
            } else {
                Value::String(b.clone())
            }
        })
        .collect()
}

fn print_plan(plan: &Plan) {
    if plan.is_noop() {
        println!("{}", "(no-op: statement kind is not translated)".dimmed());
        return;
    }
    println!("{} {}", "Client calls:".green().bold(), plan.kind.to_string().cyan());
    for call in &plan.calls {
        println!("  .{}", call.to_string().white());
    }
}

fn print_bindings(params: &[Value]) {
    if params.is_empty() {
        return;
    }
    println!();
    println!("{}", "Bindings:".cyan());
    for (i, value) in params.iter().enumerate() {
        println!("  ?{} = {}", i + 1, value.to_json().to_string().yellow());
    }
}

fn format_output(rows: &[Row], format: &OutputFormat) {
    if rows.is_empty() {
        println!("{}", "(no results)".dimmed());
        return;
    }

    match format {
        OutputFormat::Json => match serde_json::to_string_pretty(rows) {
            Ok(text) => println!("{}", text),
            Err(e) => eprintln!("{} {}", "Error:".red().bold(), e),
        },
        OutputFormat::Table => {
            let (header, grid) = text_grid(rows);
            let widths: Vec<usize> = header
                .iter()
                .enumerate()
                .map(|(i, name)| {
                    grid.iter()
                        .map(|line| line[i].chars().count())
                        .fold(name.chars().count(), usize::max)
                })
                .collect();

            println!("{}", pad_line(&header, &widths, " | ").white().bold());
            let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
            println!("{}", rule.join("-+-").dimmed());
            for line in &grid {
                println!("{}", pad_line(line, &widths, " | "));
            }

            println!();
            println!("{} row(s) returned", rows.len().to_string().cyan());
        }
    }
}

/// Column names from the first row, and every row rendered as text in
/// that column order. Missing keys render empty.
fn text_grid(rows: &[Row]) -> (Vec<String>, Vec<Vec<String>>) {
    let header: Vec<String> = rows[0].keys().cloned().collect();
    let grid: Vec<Vec<String>> = rows
        .iter()
        .map(|row| {
            header
                .iter()
                .map(|column| match row.get(column) {
                    None => String::new(),
                    Some(serde_json::Value::Null) => "NULL".to_string(),
                    Some(serde_json::Value::String(s)) => s.clone(),
                    Some(other) => other.to_string(),
                })
                .collect::<Vec<String>>()
        })
        .collect();
    (header, grid)
}

fn pad_line(cells: &[String], widths: &[usize], sep: &str) -> String {
    cells
        .iter()
        .zip(widths)
        .map(|(text, width)| format!("{:<width$}", text, width = *width))
        .collect::<Vec<_>>()
        .join(sep)
}

fn explain(statement: &str, params: &[Value]) {
    println!("{}", "Statement Explanation".cyan().bold());
    println!();
    println!("{} {}", "Statement:".dimmed(), statement.yellow());
    println!();

    let kind = sqlrest::classify(statement);
    if kind == StatementKind::Unsupported {
        println!("{} {}", "Kind:".dimmed(), kind.to_string().cyan());
        println!("{}", "Executed as a no-op; nothing is sent.".dimmed());
        return;
    }

    let parsed = match sqlrest::parse(statement) {
        Ok(parsed) => parsed,
        Err(e) => {
            eprintln!("{} {}", "Parse Error:".red().bold(), e);
            return;
        }
    };

    println!("{}", "Parsed Structure:".green().bold());
    println!("  {} {}", "Kind:".dimmed(), parsed.kind().to_string().cyan());
    println!("  {} {}", "Table:".dimmed(), parsed.table().white());
    println!(
        "  {} {}",
        "Placeholders:".dimmed(),
        parsed.placeholder_count().to_string().white()
    );

    match &parsed {
        Statement::Insert(insert) => {
            println!("  {}", "Values:".dimmed());
            for (column, slot) in insert.columns.iter().zip(&insert.values) {
                println!("    • {} = {}", column.white(), slot.to_string().yellow());
            }
        }
        Statement::Update(update) => {
            println!("  {}", "Set:".dimmed());
            for a in &update.assignments {
                println!("    • {} = {}", a.column.white(), a.value.to_string().yellow());
            }
            print_predicates(&update.predicates);
        }
        Statement::Delete(delete) => print_predicates(&delete.predicates),
        Statement::Select(select) => {
            let projection = match &select.columns {
                Columns::Star => "*".to_string(),
                Columns::Named(names) => names.join(", "),
            };
            println!("  {} {}", "Columns:".dimmed(), projection.white());
            print_predicates(&select.predicates);
            if let Some(order) = &select.order_by {
                let arrow = match order.direction {
                    Direction::Asc => "↑",
                    Direction::Desc => "↓",
                };
                println!("  {} {} {}", "Order:".dimmed(), order.column.white(), arrow);
            }
            if let Some(n) = select.limit {
                println!("  {} {}", "Limit:".dimmed(), n);
            }
            if let Some(n) = select.offset {
                println!("  {} {}", "Offset:".dimmed(), n);
            }
        }
    }

    println!();
    if params.len() < parsed.placeholder_count() {
        println!(
            "{}",
            format!(
                "Pass {} value(s) with --bind to see the client calls.",
                parsed.placeholder_count()
            )
            .yellow()
        );
        return;
    }
    match Translator::default().plan(&parsed, params) {
        Ok(plan) => print_plan(&plan),
        Err(e) => eprintln!("{} {}", "Translation Error:".red().bold(), e),
    }
}

fn print_predicates(predicates: &[sqlrest::ast::Predicate]) {
    if predicates.is_empty() {
        return;
    }
    println!("  {}", "Where:".dimmed());
    for p in predicates {
        println!("    [{}]", p.to_string().white());
    }
}

fn show_grammar() {
    println!("{}", "Accepted Statements".cyan().bold());
    println!();

    let forms = [
        ("INSERT", "INSERT INTO t (c1, c2) VALUES (?, ?)", "from(t).insert(row).select(id)"),
        ("UPDATE", "UPDATE t SET c1 = ? WHERE c2 = ?", "from(t).update(row).eq(..)"),
        ("DELETE", "DELETE FROM t WHERE c = ?", "from(t).delete().eq(..)"),
        ("SELECT", "SELECT * FROM t WHERE ... ORDER BY c DESC LIMIT n OFFSET m", "from(t).select(*)..."),
    ];
    for (kind, form, calls) in forms {
        println!("{:8} {:60} {}", kind.cyan().bold(), form.white(), calls.dimmed());
    }

    println!();
    println!("{}", "Predicates (joined with AND only)".cyan().bold());
    println!();

    let predicates = [
        ("c = ?", "eq(c, v)"),
        ("c LIKE ?", "ilike(c, v with % -> *)"),
        ("c > ?  c >= ?", "gt / gte"),
        ("c < ?  c <= ?", "lt / lte"),
        ("c IN (?, ?)", "in(c, [..])"),
    ];
    for (form, call) in predicates {
        println!("  {:20} {}", form.white(), call.dimmed());
    }

    println!();
    println!(
        "{}",
        "Not supported: OR, parentheses, joins, subqueries, GROUP BY, expressions.".yellow()
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(value: serde_json::Value) -> Row {
        match value {
            serde_json::Value::Object(map) => map,
            other => panic!("not an object: {}", other),
        }
    }

    #[test]
    fn test_text_grid_follows_first_row_columns() {
        let rows = vec![
            row(json!({"id": 1, "name": "ada", "score": null})),
            row(json!({"id": 22, "name": "bo"})),
        ];
        let (header, grid) = text_grid(&rows);
        assert_eq!(header, vec!["id", "name", "score"]);
        assert_eq!(grid[0], vec!["1", "ada", "NULL"]);
        assert_eq!(grid[1], vec!["22", "bo", ""]);
    }

    #[test]
    fn test_pad_line() {
        let cells = vec!["id".to_string(), "x".to_string()];
        assert_eq!(pad_line(&cells, &[4, 2], " | "), "id   | x ");
    }

    #[test]
    fn test_bindings_are_typed() {
        let raw: Vec<String> = ["7", "1.5", "true", "NULL", "done"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(
            bindings(&raw),
            vec![
                Value::Int(7),
                Value::Float(1.5),
                Value::Bool(true),
                Value::Null,
                Value::String("done".into()),
            ]
        );
    }
}
