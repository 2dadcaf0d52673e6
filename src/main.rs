use std::io::{self, IsTerminal, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tokio::io::BufReader;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

use peek::discovery::{Completion, Discovery};
use peek::persist::pending_path;
use peek::rule::RuleSet;
use peek::scheduler::Partitions;
use peek::settings::{Overrides, Settings};
use peek::store::FactStore;

#[derive(Parser)]
#[command(name = "peek", version, about = "peek discovery framework")]
struct Cli {
    /// Clear values matching the given patterns instead of adding data points
    #[arg(short = 'c', long)]
    clear: bool,
    /// Debug output
    #[arg(short = 'd', long)]
    debug: bool,
    /// List state (default if there is no input)
    #[arg(short = 'l', long)]
    list: bool,
    /// Dry run, show matching rules for input
    #[arg(short = 'n', long)]
    dry_run: bool,
    /// Added data points override old values
    #[arg(short = 'o', long = "override")]
    override_existing: bool,
    /// Load rules from PATH (defaults to /usr/share/peek)
    #[arg(short = 'r', long, value_name = "PATH")]
    rules: Option<PathBuf>,
    /// Use PATH to persist state (defaults to $HOME/.peek)
    #[arg(short = 's', long, value_name = "PATH")]
    state: Option<PathBuf>,
    /// Maximum number of resolvers running at once
    #[arg(short = 'j', long, value_name = "N")]
    jobs: Option<usize>,
    /// Configuration file
    #[arg(long, value_name = "PATH", env = "PEEK_CONFIG")]
    config: Option<PathBuf>,
    /// Data points to add, or patterns to clear with -c
    #[arg(value_name = "DATA POINT")]
    data: Vec<String>,
}

impl Cli {
    fn overrides(&self) -> Overrides {
        Overrides {
            rules: self.rules.clone(),
            state: self.state.clone(),
            max_resolvers: self.jobs,
            override_existing: self.override_existing,
            dry_run: self.dry_run,
        }
    }
}

fn init_tracing(debug: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if debug { "debug" } else { "warn" }));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn list(facts: &FactStore) -> io::Result<()> {
    let mut out = io::stdout().lock();
    write!(out, "{facts}")?;
    out.flush()
}

fn save(settings: &Settings, resume: bool, partitions: &Partitions) -> bool {
    debug!(state = %settings.state.display(), "saving state");
    let mut saved = true;
    if let Err(e) = partitions.resolved.save(&settings.state) {
        error!(error = %e, "unable to save data points");
        saved = false;
    }
    // without rules nothing gets queued, and the pending file stays untouched
    if resume {
        if let Err(e) = partitions.queued.save_or_remove(&pending_path(&settings.state)) {
            error!(error = %e, "unable to save unresolved data points");
            saved = false;
        }
    }
    saved
}

async fn run(cli: Cli, settings: Settings) -> peek::Result<ExitCode> {
    let streaming = !io::stdin().is_terminal();
    let has_input = !cli.data.is_empty() || streaming;
    // facts left unresolved by an earlier run are picked up whenever rules run
    let resume = has_input && !settings.dry_run;

    let mut facts = FactStore::new();
    debug!(state = %settings.state.display(), "loading state");
    let loaded = facts.load(&settings.state, settings.load_policy)?;
    debug!(loaded, "loaded state");
    let mut pending = FactStore::new();
    if resume {
        let resumed = pending.load(&pending_path(&settings.state), settings.load_policy)?;
        if resumed > 0 {
            info!(resumed, "resuming unresolved values");
        }
    }

    let data = if cli.clear {
        for pattern in &cli.data {
            let removed = facts.clear_matching(pattern);
            info!(pattern = %pattern, removed, "cleared values");
        }
        Vec::new()
    } else {
        cli.data
    };

    if cli.list || !has_input {
        debug!("listing values");
        if let Err(e) = list(&facts) {
            error!(error = %e, "unable to list values");
        }
    }

    let rules = if has_input {
        RuleSet::load(&settings.rules)
    } else {
        RuleSet::new()
    };

    let mut discovery = Discovery::new(rules, facts, settings.scheduler_options(), io::stdout());
    let outcome = async {
        for fact in pending.iter().chain(data.iter().map(String::as_str)) {
            discovery.submit(fact)?;
        }
        let input = streaming.then(|| BufReader::new(tokio::io::stdin()));
        discovery.run(input).await
    }
    .await;

    // whatever was learned is kept, even when discovery failed
    let saved = save(&settings, resume, &discovery.into_partitions());
    let completion = outcome?;
    if !saved {
        return Ok(ExitCode::FAILURE);
    }
    Ok(match completion {
        Completion::Finished => ExitCode::SUCCESS,
        Completion::Interrupted => ExitCode::from(130),
    })
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.debug);
    let settings = match Settings::load(cli.config.as_deref(), &cli.overrides()) {
        Ok(settings) => settings,
        Err(e) => {
            error!(error = %e, "unable to configure");
            return ExitCode::FAILURE;
        }
    };
    debug!(?settings, "configured");
    match run(cli, settings).await {
        Ok(code) => code,
        Err(e) => {
            error!(error = %e, "discovery failed");
            ExitCode::FAILURE
        }
    }
}
