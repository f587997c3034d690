use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};

use crate::config::{self, Config};
use crate::data::{BackendClient, FileSource, MockSource, PostSource, SessionSource};
use crate::export;
use crate::filter::{FeedFilterEngine, TypeFilter};
use crate::logging;
use crate::post::Post;
use crate::ui;

/// Session id that resolves to the backend's most recent capture.
pub const LATEST_SESSION: &str = "latest";

#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub verbosity: u8,
    pub config_file: Option<PathBuf>,
    pub input: Option<PathBuf>,
    pub session: Option<String>,
    pub demo: bool,
    pub list_sessions: bool,
    pub export_dir: Option<PathBuf>,
    pub search: Option<String>,
    pub type_filter: Option<TypeFilter>,
}

pub fn run(options: RunOptions) -> Result<()> {
    let cfg = config::load(config::LoadOptions {
        config_file: options.config_file.clone(),
        env_prefix: None,
    })
    .context("load config")?;

    let log_path = match logging::init(options.verbosity, None) {
        Ok(path) => path,
        Err(err) => {
            eprintln!("warning: logging disabled: {err:#}");
            None
        }
    };
    let config_path = options.config_file.clone().or_else(config::default_path);
    tracing::info!(
        version = crate::VERSION,
        config = %friendly_path(config_path.as_ref()),
        log = %friendly_path(log_path.as_ref()),
        "starting"
    );

    if options.list_sessions {
        return print_sessions(&cfg);
    }

    let source = select_source(&options, &cfg)?;

    if let Some(dir) = options.export_dir.as_deref() {
        let source = source.context("--export needs a posts file, --session or --demo")?;
        let posts = source
            .load()
            .with_context(|| format!("load {}", source.describe()))?;
        return export_headless(posts, &options, dir);
    }

    let (posts, status_message, source_label) = match &source {
        Some(source) => match source.load() {
            Ok(posts) => {
                let message = format!("Loaded {} posts", posts.len());
                (posts, message, source.describe())
            }
            Err(err) => {
                tracing::error!(error = %format!("{err:#}"), "initial load failed");
                (Vec::new(), format!("Load failed: {err:#}"), source.describe())
            }
        },
        None => (
            Vec::new(),
            "Press i to import a JSON file.".to_string(),
            "no source".to_string(),
        ),
    };

    let mut model = ui::Model::new(ui::Options {
        status_message,
        posts,
        source,
        source_label,
        config: cfg,
        probe_media: true,
    });
    if let Some(term) = options.search.as_deref() {
        model.apply_search(term);
    }
    if let Some(filter) = options.type_filter {
        model.apply_type_filter(filter);
    }
    model.run()?;
    tracing::info!("exiting");
    Ok(())
}

fn select_source(options: &RunOptions, cfg: &Config) -> Result<Option<Arc<dyn PostSource>>> {
    if let Some(path) = options.input.as_ref() {
        return Ok(Some(Arc::new(FileSource::new(path.clone()))));
    }
    if let Some(session) = options.session.as_deref() {
        let client = BackendClient::new(&cfg.backend).context("backend client")?;
        let source = if session == LATEST_SESSION {
            SessionSource::latest(client).context("resolve latest session")?
        } else {
            SessionSource::new(client, session)
        };
        return Ok(Some(Arc::new(source)));
    }
    if options.demo {
        return Ok(Some(Arc::new(MockSource::demo())));
    }
    Ok(None)
}

/// Applies the command-line filters and writes the working set without
/// starting the terminal UI.
fn export_headless(posts: Vec<Post>, options: &RunOptions, dir: &Path) -> Result<()> {
    let mut engine = FeedFilterEngine::new(posts);
    if let Some(term) = options.search.as_deref() {
        engine.set_search(term);
    }
    if let Some(filter) = options.type_filter {
        engine.set_type_filter(filter);
    }
    let working = engine.working_set();
    let today = chrono::Local::now().date_naive();
    let path = export::export_working_set(&working, dir, today)?;
    println!("Exported {} posts to {}", working.len(), path.display());
    Ok(())
}

fn print_sessions(cfg: &Config) -> Result<()> {
    let client = BackendClient::new(&cfg.backend).context("backend client")?;
    let sessions = client.list_sessions().context("list sessions")?;
    if sessions.is_empty() {
        println!("No saved sessions at {}", client.base_url());
        return Ok(());
    }
    for session in sessions {
        println!("{}\t{}", session.session_id, session.timestamp);
    }
    Ok(())
}

fn friendly_path(path: Option<&PathBuf>) -> String {
    let Some(path) = path else {
        return "-".to_string();
    };
    if let Some(home) = dirs::home_dir() {
        if let Ok(stripped) = path.strip_prefix(&home) {
            let mut display = String::from("~");
            if !stripped.as_os_str().is_empty() {
                display.push_str(&format!("/{}", stripped.display()));
            }
            return display;
        }
    }
    path.display().to_string()
}
