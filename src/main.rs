//! viewkit - replay a navigation script against a demo site.

use clap::Parser;
use futures::executor::LocalPool;
use std::fmt;
use std::io::{self, Write};
use std::path::PathBuf;
use std::rc::Rc;
use std::str::FromStr;
use thiserror::Error;
use tracing::info;
use viewkit::clock::VirtualClock;
use viewkit::config::{self, ConfigError};
use viewkit::history::MemoryHistory;
use viewkit::loader::{DirLoader, Loader};
use viewkit::logging::{self, LoggingError};
use viewkit::site::{SiteError, SiteManifest};
use viewkit::toolkit::{Services, Settings, Toolkit};
use viewkit::viewport::{NavigationResult, OpenOptions, Viewport, ViewportOptions};

/// Render a viewkit site headlessly and replay navigation steps against it
#[derive(Parser, Debug)]
#[command(name = "viewkit")]
#[command(version)]
#[command(about = "Replay navigation steps against a viewkit site manifest")]
pub struct Args {
    /// Path to the site manifest (TOML)
    pub site: PathBuf,

    /// Steps to run in order: open:/path, reload:/path, back, back:/path
    pub steps: Vec<Step>,

    /// Directory holding `<locator>.json` data files (defaults to the manifest's directory)
    #[arg(long)]
    pub data: Option<PathBuf>,

    /// Path to configuration file
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Default transition descriptor, e.g. "fade" or "slide:up"
    #[arg(long)]
    pub transition: Option<String>,

    /// Do not write history entries for navigations
    #[arg(long)]
    pub no_history: bool,

    /// Fail every data load as if connectivity were down
    #[arg(long)]
    pub offline: bool,

    /// Origin of the simulated browser location
    #[arg(long, default_value = "https://viewkit.local")]
    pub origin: String,
}

/// One scripted navigation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    Open(String),
    Reload(String),
    Back(Option<String>),
}

impl FromStr for Step {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        if raw == "back" {
            return Ok(Step::Back(None));
        }
        let (verb, path) = raw
            .split_once(':')
            .ok_or_else(|| format!("expected VERB:/path, got '{raw}'"))?;
        if !path.starts_with('/') {
            return Err(format!("path must start with '/': '{path}'"));
        }
        match verb {
            "open" => Ok(Step::Open(path.to_string())),
            "reload" => Ok(Step::Reload(path.to_string())),
            "back" => Ok(Step::Back(Some(path.to_string()))),
            other => Err(format!("unknown step '{other}'")),
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::Open(path) => write!(f, "open:{path}"),
            Step::Reload(path) => write!(f, "reload:{path}"),
            Step::Back(None) => write!(f, "back"),
            Step::Back(Some(path)) => write!(f, "back:{path}"),
        }
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Logging(#[from] LoggingError),

    #[error(transparent)]
    Site(#[from] SiteError),

    #[error("failed to write output: {0}")]
    Io(#[from] io::Error),

    #[error("{failed} of {total} steps failed")]
    StepsFailed { failed: usize, total: usize },
}

fn resolve_config(args: &Args) -> Result<config::ResolvedConfig, AppError> {
    let config_file = config::load_config_with_precedence(args.config.clone())?;
    let merged = config::merge_config(config_file);
    let with_env = config::apply_env_overrides(merged);
    let history_override = if args.no_history { Some(false) } else { None };
    Ok(config::apply_cli_overrides(
        with_env,
        args.transition.clone(),
        history_override,
    ))
}

/// Headless session: document, toolkit and a top-level viewport in `<main class="viewport">`.
pub struct Session {
    pool: LocalPool,
    toolkit: Toolkit,
    viewport: Viewport,
}

impl Session {
    pub fn new(manifest: &SiteManifest, loader: Rc<dyn Loader>, settings: Settings, origin: &str) -> Result<Self, AppError> {
        let registry = manifest.registry()?;
        let pool = LocalPool::new();
        let toolkit = Toolkit::new(
            registry,
            Services {
                loader,
                clock: Rc::new(VirtualClock::new()),
                history: Rc::new(MemoryHistory::new(origin, "/")),
            },
            settings,
            pool.spawner(),
        );
        let document = toolkit.document();
        let container = document.element("main", &["viewport"]);
        document.append_child(document.body(), container);
        let viewport = Viewport::new(
            &toolkit,
            container,
            ViewportOptions {
                routes: manifest.route_nodes(),
                top_level: true,
            },
        );
        Ok(Self {
            pool,
            toolkit,
            viewport,
        })
    }

    pub fn run(&mut self, step: &Step) -> NavigationResult {
        let navigation = match step {
            Step::Open(path) => self.viewport.open(path, OpenOptions::default()),
            Step::Reload(path) => self.viewport.open(path, OpenOptions::reload()),
            Step::Back(target) => self.viewport.back(target.as_deref(), OpenOptions::default()),
        };
        let result = self.pool.run_until(navigation);
        // Pop-driven navigations are spawned; let them settle.
        self.pool.run_until_stalled();
        result
    }

    pub fn container_html(&self) -> String {
        self.toolkit.document().to_html(self.viewport.container())
    }

    pub fn history_line(&self) -> String {
        let history = self.toolkit.history();
        format!(
            "history: length={} location={}",
            history.length(),
            history.location().relative()
        )
    }

    /// Run every step, reporting each to `out`. Returns the number of failed steps.
    pub fn replay(&mut self, steps: &[Step], out: &mut impl Write) -> io::Result<usize> {
        let mut failed = 0;
        for step in steps {
            writeln!(out, "== {step}")?;
            match self.run(step) {
                Ok(view) => writeln!(out, "ok {} ({})", view.id(), view.type_name().unwrap_or("-"))?,
                Err(e) => {
                    failed += 1;
                    writeln!(out, "error {}: {e}", e.status())?;
                }
            }
            writeln!(out, "{}", self.container_html())?;
            writeln!(out, "{}", self.history_line())?;
        }
        Ok(failed)
    }
}

fn main() -> Result<(), AppError> {
    let args = Args::parse();

    // Defaults → Config File → Env Vars → CLI Args
    let config = resolve_config(&args)?;
    logging::init(&config.log_file_path)?;
    info!(config = ?config, site = %args.site.display(), "configuration resolved");

    let manifest = SiteManifest::load(&args.site)?;
    let data_dir = args.data.clone().unwrap_or_else(|| {
        args.site
            .parent()
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."))
    });
    let mut loader = DirLoader::new(data_dir);
    if args.offline {
        loader = loader.offline();
    }

    let mut session = Session::new(&manifest, Rc::new(loader), config.settings(), &args.origin)?;
    let stdout = io::stdout();
    let mut out = stdout.lock();
    let failed = session.replay(&args.steps, &mut out)?;
    out.flush()?;

    if failed > 0 {
        return Err(AppError::StepsFailed {
            failed,
            total: args.steps.len(),
        });
    }
    Ok(())
}
