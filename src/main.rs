use std::fs;
use std::path::PathBuf;

use anyhow::Context as _;
use clap::Parser;

use dilemma::Context;

/// Evaluate a dilemma expression against an optional JSON context.
#[derive(Parser)]
#[command(name = "dilemma")]
#[command(about = "Evaluate an expression, e.g. \"2 + 3 * 4\" or \"'admin' in user.roles\"")]
#[command(version)]
struct Cli {
    /// The expression to evaluate
    expression: String,

    /// Context as an inline JSON object, e.g. '{"user": {"age": 32}}'
    #[arg(short, long, conflicts_with = "context_file")]
    context: Option<String>,

    /// Read the JSON context from a file
    #[arg(long)]
    context_file: Option<PathBuf>,

    /// Show the expression and result type alongside the result
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let json = match (&cli.context, &cli.context_file) {
        (Some(inline), _) => {
            serde_json::from_str(inline).context("--context is not valid JSON")?
        }
        (None, Some(path)) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            serde_json::from_str(&text)
                .with_context(|| format!("{} is not valid JSON", path.display()))?
        }
        (None, None) => serde_json::json!({}),
    };
    let context = Context::from_json(json)?;

    let result = dilemma::evaluate(&cli.expression, &context)?;

    if cli.verbose {
        println!("Expression: {}", cli.expression);
        println!("Result: {}", result);
        println!("Type: {}", result.kind_name());
    } else {
        println!("{}", result);
    }

    Ok(())
}
