use std::fs::{File, read_to_string};
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use taskassign::{MilpModel, Problem, SolverOptions, write_lp};
use tracing_subscriber::EnvFilter;

/// Assign resources to tasks at minimum cost.
#[derive(Parser)]
struct Args {
    /// Problem file, JSON when it ends in `.json`, YAML otherwise.
    input: PathBuf,
    /// Stop the solver after this many seconds.
    #[arg(long)]
    time_limit: Option<f64>,
    /// Show the solver's own log.
    #[arg(long)]
    verbose: bool,
    /// Print the outcome as JSON instead of YAML.
    #[arg(long)]
    json: bool,
    /// Also write the built model in LP format.
    #[arg(long)]
    write_lp: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let buf = read_to_string(&args.input)
        .with_context(|| format!("reading {}", args.input.display()))?;
    let problem = if args.input.extension().is_some_and(|ext| ext == "json") {
        Problem::from_json_str(&buf)?
    } else {
        Problem::from_yaml_str(&buf)?
    };

    if let Some(path) = &args.write_lp {
        let model = MilpModel::build(&problem)?;
        let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
        let mut out = BufWriter::new(file);
        write_lp(&model, &mut out)?;
        out.flush()?;
    }

    let options = SolverOptions {
        time_limit: args
            .time_limit
            .map(Duration::try_from_secs_f64)
            .transpose()
            .context("invalid --time-limit")?,
        verbose: args.verbose,
    };
    let outcome = problem.solve(&options)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else {
        println!("{}", serde_yaml::to_string(&outcome)?);
    }
    Ok(())
}
