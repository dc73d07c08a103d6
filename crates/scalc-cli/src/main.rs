//! scalc CLI - exact decimal formula evaluation

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use scalc_formula::{
    Context as Variables, FormulaEngine, FormulaOptions, FunctionTable, Single, Value,
};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "scalc")]
#[command(author, version, about = "Formula evaluator with exact decimal arithmetic")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate a formula and print the result
    Eval {
        /// Formula text
        formula: String,

        /// JSON file holding the context object
        #[arg(short, long)]
        context: Option<PathBuf>,

        /// Set a variable; the value is read as JSON, or taken as a string
        #[arg(short = 'v', long = "var", value_name = "NAME=VALUE")]
        vars: Vec<String>,

        /// Legacy semantics: `+` concatenates strings
        #[arg(long)]
        legacy: bool,

        /// Always use the interpreter
        #[arg(long)]
        no_compile: bool,

        /// JSON options file (numericMode, constants, tokenRx, ...)
        #[arg(short, long)]
        options: Option<PathBuf>,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Parse a formula and list what it references
    Check {
        /// Formula text
        formula: String,

        /// JSON options file
        #[arg(short, long)]
        options: Option<PathBuf>,
    },

    /// Rewrite relaxed literal text as strict JSON
    Normalize {
        /// Text to normalize (default: stdin)
        text: Option<String>,

        /// Marker put in front of bare values
        #[arg(short, long, default_value = "")]
        marker: String,

        /// Keep `name(...)` values whole
        #[arg(short, long)]
        wrap: bool,

        /// Parse the result and pretty-print it
        #[arg(short, long)]
        pretty: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Eval {
            formula,
            context,
            vars,
            legacy,
            no_compile,
            options,
            json,
        } => {
            let mut options = load_options(options.as_deref())?;
            if legacy {
                options.numeric_mode = false;
            }
            if no_compile {
                options.compile = false;
            }
            let ctx = load_context(context.as_deref(), &vars)?;
            eval(&formula, options, &ctx, json)
        }
        Commands::Check { formula, options } => check(&formula, load_options(options.as_deref())?),
        Commands::Normalize {
            text,
            marker,
            wrap,
            pretty,
        } => normalize(text, &marker, wrap, pretty),
    }
}

fn load_options(path: Option<&Path>) -> Result<FormulaOptions> {
    let Some(path) = path else {
        return Ok(FormulaOptions::default());
    };
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read options '{}'", path.display()))?;
    FormulaOptions::from_json_str(&text)
        .with_context(|| format!("Invalid options in '{}'", path.display()))
}

fn load_context(path: Option<&Path>, vars: &[String]) -> Result<Variables> {
    let mut ctx = match path {
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("Failed to read context '{}'", path.display()))?;
            let json: serde_json::Value = serde_json::from_str(&text)
                .with_context(|| format!("Invalid JSON in '{}'", path.display()))?;
            Variables::from_json(json)
                .with_context(|| format!("Invalid context in '{}'", path.display()))?
        }
        None => Variables::new(),
    };

    for var in vars {
        let (name, raw) = var
            .split_once('=')
            .ok_or_else(|| anyhow!("Expected NAME=VALUE, got '{}'", var))?;
        let value = match serde_json::from_str::<serde_json::Value>(raw) {
            Ok(json) => Value::from(json),
            Err(_) => Value::from(raw),
        };
        ctx.insert(name.trim(), value);
    }
    Ok(ctx)
}

fn engine(options: FormulaOptions) -> Result<FormulaEngine> {
    FormulaEngine::from_options(options, FunctionTable::with_builtins())
        .context("Failed to configure formula engine")
}

fn eval(formula: &str, options: FormulaOptions, ctx: &Variables, json: bool) -> Result<()> {
    let expr = engine(options)?
        .parse(formula)
        .with_context(|| format!("Failed to parse '{}'", formula))?;
    let value = expr.evaluate(ctx).context("Evaluation failed")?;

    let mut stdout = io::stdout().lock();
    if json {
        let text = serde_json::to_string_pretty(&value.to_json())?;
        writeln!(stdout, "{}", text)?;
    } else {
        writeln!(stdout, "{}", value)?;
    }
    Ok(())
}

fn check(formula: &str, options: FormulaOptions) -> Result<()> {
    let expr = engine(options)?
        .parse(formula)
        .with_context(|| format!("Failed to parse '{}'", formula))?;

    let mut stdout = io::stdout().lock();
    let references = expr.references();
    if references.is_empty() {
        writeln!(stdout, "References: none")?;
    } else {
        writeln!(stdout, "References: {}", references.join(", "))?;
    }

    match expr.single() {
        Some(Single::Reference(name)) => writeln!(stdout, "Single reference: {}", name)?,
        Some(Single::Value(value)) => writeln!(stdout, "Single value: {}", value)?,
        Some(Single::Tree(_)) => writeln!(stdout, "Single literal")?,
        None => {}
    }

    match expr.plan() {
        Some(plan) if plan.is_constant() => eprintln!("Plan: folded to a constant"),
        Some(plan) => eprintln!("Plan: {} instructions", plan.len()),
        None => eprintln!("Plan: none (interpreted)"),
    }
    Ok(())
}

fn normalize(text: Option<String>, marker: &str, wrap: bool, pretty: bool) -> Result<()> {
    let text = match text {
        Some(text) => text,
        None => io::read_to_string(io::stdin()).context("Failed to read stdin")?,
    };

    let mut stdout = io::stdout().lock();
    if pretty {
        let json = scalc_jsonx::parse_relaxed(&text, marker, wrap)
            .context("Normalized text is not valid JSON")?;
        writeln!(stdout, "{}", serde_json::to_string_pretty(&json)?)?;
    } else {
        writeln!(stdout, "{}", scalc_jsonx::normalize(&text, marker, wrap))?;
    }
    Ok(())
}
