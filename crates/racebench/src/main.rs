use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use clap_verbosity_flag::{InfoLevel, Verbosity};
use itertools::Itertools;
use mimalloc::MiMalloc;
use racebench_harness::{
    build_record, read_table, run_build_commands, Grammar, StoreWriter,
};
use racebench_report::render_reports;
use racebench_schemas::HarnessConfig;
use tracing::info;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::EnvFilter;

// Use mimalloc for better performance. Per M-MIMALLOC-APPS, this can provide
// up to 25% performance improvement for allocation-heavy workloads.
#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

/// Drive a trace analyzer across a benchmark corpus and turn the collected
/// measurements into comparison tables and charts.
#[derive(Parser)]
#[command(author, version, about)]
struct Cli {
    #[command(flatten)]
    verbose: Verbosity<InfoLevel>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the analyzer and run every configured variant over the corpus
    ///
    /// Each trace yields one complete row in the result store; rows are
    /// flushed as they finish, so an aborted batch keeps its completed
    /// traces and can be resumed with --append.
    Run {
        /// Path to the harness configuration file
        config: PathBuf,

        /// Append to an existing store instead of starting fresh
        #[arg(long)]
        append: bool,

        /// Skip the analyzer build step and use the existing binary
        #[arg(long)]
        skip_build: bool,
    },
    /// Render the configured report manifest from an existing store
    Report {
        /// Path to the harness configuration file
        config: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize structured logging. Output goes to stderr so generated
    // artifacts stay clean. Default to warn, allowlist our crates.
    const CRATES: &[&str] = &[
        "racebench",
        "racebench_harness",
        "racebench_report",
        "racebench_schemas",
    ];
    let level = cli.verbose.tracing_level_filter();
    let allowlist = CRATES.iter().map(|c| format!("{c}={level}")).join(",");
    let filter = EnvFilter::new(format!("warn,{allowlist}"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_span_events(FmtSpan::ENTER | FmtSpan::CLOSE)
        .init();

    match cli.command {
        Commands::Run {
            config,
            append,
            skip_build,
        } => run(&config, append, skip_build),
        Commands::Report { config } => report(&config),
    }
}

fn run(config_path: &Path, append: bool, skip_build: bool) -> Result<()> {
    let config = HarnessConfig::load(config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;
    let grammar = Grammar::compile(&config.field_defs())
        .context("compiling extraction grammar")?;

    // Fail on a grammar drift before spending hours on real invocations.
    if let Some(sample_path) = &config.golden_sample {
        let sample = fs::read_to_string(sample_path).with_context(|| {
            format!("reading golden sample {}", sample_path.display())
        })?;
        let fields: Vec<String> = config
            .variants
            .iter()
            .flat_map(|v| v.fields.iter().cloned())
            .unique()
            .collect();
        grammar
            .validate_sample(&sample, &fields)
            .context("validating grammar against the golden sample")?;
        info!(fields = fields.len(), "golden sample validated");
    }

    if !skip_build {
        let commands: Vec<Vec<String>> = config
            .analyzer
            .build
            .iter()
            .map(|template| config.substitute_params(template))
            .collect();
        run_build_commands(&commands, &config.analyzer.dir)
            .context("building the analyzer")?;
    }

    fs::create_dir_all(&config.output_dir).with_context(|| {
        format!("creating output dir {}", config.output_dir.display())
    })?;
    let schema = config.schema()?;
    let store_path = config.store_path();
    let mut writer = if append {
        StoreWriter::append_to(&store_path, &schema)
    } else {
        StoreWriter::create(&store_path, &schema)
    }
    .with_context(|| format!("opening store {}", store_path.display()))?;

    let traces = config.corpus.trace_refs();
    for (index, trace) in traces.iter().enumerate() {
        info!(
            trace = %trace.name,
            progress = format!("{}/{}", index + 1, traces.len()),
            "running trace"
        );
        let record = build_record(
            trace,
            &config.variants,
            &config.analyzer,
            &config.params,
            &grammar,
        )
        .with_context(|| format!("running trace {}", trace.name))?;
        writer.append(&record)?;
    }
    info!(traces = traces.len(), store = %store_path.display(), "batch done");
    Ok(())
}

fn report(config_path: &Path) -> Result<()> {
    let config = HarnessConfig::load(config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;
    let schema = config.schema()?;
    let store_path = config.store_path();
    let table = read_table(&store_path, &schema)
        .with_context(|| format!("reading store {}", store_path.display()))?;
    render_reports(&config.reports, &table, &config.output_dir)
        .context("rendering reports")?;
    info!(reports = config.reports.len(), "report pass done");
    Ok(())
}
