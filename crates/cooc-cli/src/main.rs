use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use cooc_core::{TruthFunction, Window};
use cooc_store::{CorpusKind, CorpusSpec, Experimenter, IndexOptions, RunParameters};

#[derive(Parser)]
#[command(name = "cooc", about = "Co-occurrence, PMI and relation features for target terms")]
struct Cli {
    /// Experiment directory (defaults to $COOC_EXPERIMENT_DIR)
    #[arg(long, global = true)]
    dir: Option<PathBuf>,

    /// Enable verbose debug output
    #[arg(long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Add a corpus to the experiment's document index
    Index {
        /// Corpus directory; its name identifies the corpus
        corpus: PathBuf,

        #[command(flatten)]
        options: IndexArgs,
    },

    /// Run the pipeline, skipping tasks already completed
    Run(RunArgs),

    /// List completed tasks
    Tasks,

    /// List indexed corpora
    Corpora,
}

#[derive(Args)]
struct IndexArgs {
    /// Corpus layout: text or jsonl
    #[arg(long, default_value = "text")]
    kind: CorpusKind,

    /// Newline-separated stop words
    #[arg(long)]
    stop_file: Option<PathBuf>,

    /// Documents buffered between index writes
    #[arg(long, default_value_t = cooc_core::DEFAULT_SYNC_FREQUENCY)]
    sync_frequency: usize,
}

impl IndexArgs {
    fn to_options(&self) -> IndexOptions {
        IndexOptions {
            kind: self.kind,
            stop_file: self.stop_file.clone(),
            sync_frequency: self.sync_frequency,
        }
    }
}

#[derive(Args)]
struct RunArgs {
    /// TOML file describing the run; flags below override it
    #[arg(long)]
    config: Option<PathBuf>,

    /// Target list, one term per line
    #[arg(long)]
    targets: Option<PathBuf>,

    /// Synonym file of `synonym:target` lines
    #[arg(long)]
    synonyms: Option<PathBuf>,

    /// Co-occurrence window, a positive integer or `inf`
    #[arg(long)]
    window: Option<Window>,

    /// Co-occurrence counts must exceed this to get a PMI
    #[arg(long)]
    pmi_threshold: Option<u64>,

    /// Target pairs must share more than this many context words
    #[arg(long)]
    relation_threshold: Option<u64>,

    /// Key/value store of ground-truth scores per target pair
    #[arg(long)]
    truth_store: Option<PathBuf>,

    /// One of 2_way_mild, 2_way_strong, 3_way_mild, 3_way_strong, 5_way
    #[arg(long)]
    truth_function: Option<TruthFunction>,

    /// Documents counted between aggregator flushes
    #[arg(long)]
    flush_interval: Option<usize>,

    /// Corpus directories to index before running
    #[arg(long = "corpus")]
    corpora: Vec<PathBuf>,

    #[command(flatten)]
    index: IndexArgs,
}

impl RunArgs {
    fn to_parameters(&self) -> Result<RunParameters> {
        let mut params = match (&self.config, &self.targets) {
            (Some(path), _) => RunParameters::load(path)
                .with_context(|| format!("failed to load run config {}", path.display()))?,
            (None, Some(targets)) => RunParameters::new(targets),
            (None, None) => bail!("either --config or --targets is required"),
        };
        if let Some(targets) = &self.targets {
            params.targets = targets.clone();
        }
        if let Some(synonyms) = &self.synonyms {
            params.synonyms = Some(synonyms.clone());
        }
        if let Some(window) = self.window {
            params.window = window;
        }
        if let Some(threshold) = self.pmi_threshold {
            params.pmi_threshold = threshold;
        }
        if let Some(threshold) = self.relation_threshold {
            params.relation_threshold = threshold;
        }
        if let Some(store) = &self.truth_store {
            params.truth_store = Some(store.clone());
        }
        if let Some(function) = self.truth_function {
            params.truth_function = Some(function);
        }
        if let Some(interval) = self.flush_interval {
            params.flush_interval = interval;
        }
        for path in &self.corpora {
            params.corpora.push(CorpusSpec {
                path: path.clone(),
                options: self.index.to_options(),
            });
        }
        Ok(params)
    }
}

fn experiment_dir(cli: &Cli) -> Result<PathBuf> {
    if let Some(dir) = &cli.dir {
        return Ok(dir.clone());
    }
    match std::env::var("COOC_EXPERIMENT_DIR") {
        Ok(dir) if !dir.is_empty() => Ok(PathBuf::from(dir)),
        _ => bail!("no experiment directory: pass --dir or set COOC_EXPERIMENT_DIR"),
    }
}

fn open_experiment(cli: &Cli) -> Result<Experimenter> {
    let dir = experiment_dir(cli)?;
    Experimenter::open_or_create(&dir)
        .with_context(|| format!("failed to open experiment {}", dir.display()))
}

fn init_tracing(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env().add_directive(tracing::Level::WARN.into())
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match &cli.command {
        Commands::Index { corpus, options } => cmd_index(&cli, corpus, options),
        Commands::Run(args) => cmd_run(&cli, args),
        Commands::Tasks => cmd_tasks(&cli),
        Commands::Corpora => cmd_corpora(&cli),
    }
}

fn cmd_index(cli: &Cli, corpus: &Path, options: &IndexArgs) -> Result<()> {
    let mut exp = open_experiment(cli)?;
    let summary = exp
        .index(corpus, &options.to_options())
        .with_context(|| format!("failed to index {}", corpus.display()))?;
    match summary {
        Some(summary) => println!(
            "indexed {} documents ({} words). total words: {}",
            summary.documents, summary.words, summary.total_words
        ),
        None => println!("already indexed: {}", corpus.display()),
    }
    Ok(())
}

fn cmd_run(cli: &Cli, args: &RunArgs) -> Result<()> {
    let params = args.to_parameters()?;
    let mut exp = open_experiment(cli)?;
    let report = exp.run(&params).context("run failed")?;

    for record in &report.executed {
        println!("executed {record}");
    }
    for record in &report.skipped {
        println!("cached   {record}");
    }
    println!(
        "done. {} executed, {} cached. features: {}",
        report.executed.len(),
        report.skipped.len(),
        report.features.display()
    );
    Ok(())
}

fn cmd_tasks(cli: &Cli) -> Result<()> {
    let exp = open_experiment(cli)?;
    let records = exp.show_performed_experiments();
    if records.is_empty() {
        println!("no completed tasks");
    }
    for record in records {
        println!("{record}");
    }
    Ok(())
}

fn cmd_corpora(cli: &Cli) -> Result<()> {
    let exp = open_experiment(cli)?;
    let corpora = exp.show_index();
    if corpora.is_empty() {
        println!("no indexed corpora");
    }
    for (name, descriptor) in corpora {
        let stop_file = descriptor
            .stop_file
            .as_ref()
            .map_or_else(|| "-".to_string(), |p| p.display().to_string());
        println!("{name}\t{}\t{stop_file}", descriptor.kind);
    }
    Ok(())
}
