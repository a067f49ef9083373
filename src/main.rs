//! Ultrawide - window layout engine command line
//!
//! Lists windows, applies stored layout configurations, computes auto-align
//! layouts and captures the current arrangement into a configuration.

use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::{signal, sync::broadcast};
use tracing::{debug, error, info, instrument, warn};
use ultrawide::{
    config::{ConfigStore, ConfigStoreConfig},
    logging::{init_logging, LogConfig},
    platform::{system_display_provider, system_window_system},
    services::{ApplyReport, EngineConfig, LayoutEngine},
    Result, UltrawideError,
};

#[derive(Parser, Debug)]
#[command(name = "ultrawide", version, about = "Apply named window layouts to running windows")]
struct Cli {
    /// Print machine-readable JSON instead of text
    #[arg(long, global = true)]
    json: bool,

    /// Directory holding configs/ and settings/
    #[arg(long, global = true, value_name = "DIR")]
    config_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List live top-level windows
    Windows,
    /// List stored configurations
    Configs,
    /// Apply a stored configuration
    Apply {
        name: String,
        /// Keep running and reapply when matching windows change
        #[arg(long)]
        watch: bool,
        /// Reset the applied configuration when exiting
        #[arg(long)]
        reset_on_exit: bool,
    },
    /// Pick the stored configuration that best fits the open windows
    Detect,
    /// Compute an auto-align layout
    Align {
        /// Number of windows; defaults to the number of --title values
        #[arg(long)]
        count: Option<usize>,
        /// Preset index, cycling over the presets that fit
        #[arg(long, default_value_t = 0)]
        preset: usize,
        /// Window titles in slot order
        #[arg(long = "title")]
        titles: Vec<String>,
        /// Apply the layout to the titled windows
        #[arg(long, requires = "titles")]
        apply: bool,
        /// Store the layout as a configuration with this name
        #[arg(long, requires = "titles", value_name = "NAME")]
        save: Option<String>,
    },
    /// Save the current state of matching windows as a configuration
    Capture {
        name: String,
        #[arg(long = "title", required = true)]
        titles: Vec<String>,
    },
}

struct UltrawideApp {
    cli: Cli,
    store: ConfigStore,
    engine: Arc<LayoutEngine>,
    shutdown_tx: broadcast::Sender<()>,
}

impl UltrawideApp {
    #[instrument(skip_all)]
    fn new(cli: Cli) -> Result<Self> {
        let store = match &cli.config_dir {
            Some(dir) => ConfigStore::at(dir),
            None => ConfigStore::new(ConfigStoreConfig::default()),
        };
        store.initialize()?;

        let settings = store.load_settings()?;
        let mut engine_config = EngineConfig::from(&settings);
        engine_config.layout = store.load_layout_config()?;
        debug!("Using configuration directory {}", store.base_dir().display());

        let engine = LayoutEngine::new(
            system_window_system(),
            system_display_provider(),
            engine_config,
        )?;

        let (shutdown_tx, _) = broadcast::channel(1);

        Ok(Self {
            cli,
            store,
            engine,
            shutdown_tx,
        })
    }

    async fn run(&self) -> Result<()> {
        match &self.cli.command {
            Command::Windows => {
                let windows = self.engine.list_windows()?;
                self.print(&windows, || {
                    windows
                        .iter()
                        .map(|w| format!("{}  {:<40}  {}", w.handle, w.title, w.frame))
                        .collect::<Vec<_>>()
                        .join("\n")
                })
            }
            Command::Configs => {
                let names = self.store.list_configurations()?;
                self.print(&names, || names.join("\n"))
            }
            Command::Apply {
                name,
                watch,
                reset_on_exit,
            } => self.apply(name, *watch, *reset_on_exit).await,
            Command::Detect => {
                let configurations = self.store.load_all()?;
                let best = self
                    .engine
                    .detect_best_configuration(&configurations)?
                    .map(|config| config.name.clone());
                self.print(&best, || best.clone().unwrap_or_else(|| "(none)".into()))
            }
            Command::Align {
                count,
                preset,
                titles,
                apply,
                save,
            } => self.align(*count, *preset, titles, *apply, save.as_deref()).await,
            Command::Capture { name, titles } => {
                let configuration = self.engine.capture(name, titles)?;
                let path = self.store.save_configuration(&configuration)?;
                self.print(&configuration, || {
                    format!(
                        "Saved {} entr(ies) to {}",
                        configuration.entries.len(),
                        path.display()
                    )
                })
            }
        }
    }

    async fn apply(&self, name: &str, watch: bool, reset_on_exit: bool) -> Result<()> {
        let loaded = self.store.load_configuration(name)?;
        for warning in &loaded.warnings {
            warn!("{}: {}", name, warning);
        }

        let report = self.engine.apply_configuration(loaded.configuration).await?;
        self.print(&report, || describe_apply(&report))?;

        if watch {
            self.engine.enable_auto_reapply().await;
            info!("Watching windows for '{}', press Ctrl+C to stop", name);
            self.wait_for_shutdown().await;
        }

        if reset_on_exit {
            let reset = self.engine.reset().await?;
            self.print(&reset, || {
                format!("Reset: restored {} window(s)", reset.restore.restored.len())
            })?;
        }

        Ok(())
    }

    async fn align(
        &self,
        count: Option<usize>,
        preset: usize,
        titles: &[String],
        apply: bool,
        save: Option<&str>,
    ) -> Result<()> {
        let alignment = if titles.is_empty() {
            let count = count.ok_or_else(|| {
                UltrawideError::ValidationError("Pass --count or at least one --title".into())
            })?;
            self.engine.auto_align(count, preset)?
        } else {
            if count.is_some_and(|count| count != titles.len()) {
                warn!("--count ignored, using the {} given titles", titles.len());
            }
            self.engine.auto_align_titles(titles, preset)?
        };

        self.print(&alignment, || {
            let mut lines = vec![format!(
                "Preset {}/{}: {}",
                alignment.preset_number, alignment.preset_count, alignment.label
            )];
            for slot in &alignment.slots {
                lines.push(format!(
                    "  {:<30} {}  aot={} titlebar={}",
                    slot.title.as_deref().unwrap_or("-"),
                    slot.rect,
                    slot.always_on_top,
                    slot.titlebar
                ));
            }
            lines.join("\n")
        })?;

        if apply || save.is_some() {
            let configuration = self
                .engine
                .alignment_configuration(save.unwrap_or("auto-align"), &alignment)?;
            if save.is_some() {
                self.store.save_configuration(&configuration)?;
            }
            if apply {
                let report = self.engine.apply_configuration(configuration).await?;
                self.print(&report, || describe_apply(&report))?;
            }
        }

        Ok(())
    }

    async fn wait_for_shutdown(&self) {
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let shutdown_tx = self.shutdown_tx.clone();
        tokio::spawn(async move {
            if let Err(e) = Self::setup_signal_handlers(shutdown_tx).await {
                error!("Failed to setup signal handlers: {}", e);
            }
        });

        if shutdown_rx.recv().await.is_err() {
            warn!("Shutdown channel closed");
        }
        info!("Shutdown signal received");
    }

    async fn setup_signal_handlers(shutdown_tx: broadcast::Sender<()>) -> Result<()> {
        #[cfg(unix)]
        {
            let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())?;
            tokio::select! {
                res = signal::ctrl_c() => {
                    match res {
                        Ok(_) => info!("Received SIGINT (Ctrl+C)"),
                        Err(e) => warn!("Failed to listen for Ctrl+C: {}", e),
                    }
                }
                _ = sigterm.recv() => {
                    info!("Received SIGTERM");
                }
            }
        }

        #[cfg(not(unix))]
        {
            match signal::ctrl_c().await {
                Ok(_) => info!("Received Ctrl+C"),
                Err(e) => warn!("Failed to listen for Ctrl+C: {}", e),
            }
        }

        if shutdown_tx.send(()).is_err() {
            warn!("Failed to send shutdown signal - no receivers");
        }

        Ok(())
    }

    async fn shutdown(&self) {
        self.engine.shutdown().await;
        info!("Ultrawide shutdown complete");
    }

    fn print<T: Serialize>(&self, value: &T, text: impl FnOnce() -> String) -> Result<()> {
        if self.cli.json {
            println!("{}", serde_json::to_string_pretty(value)?);
        } else {
            println!("{}", text());
        }
        Ok(())
    }
}

fn describe_apply(report: &ApplyReport) -> String {
    let mut lines = vec![format!("Applied '{}'", report.report.configuration)];
    for result in &report.report.results {
        for window in &result.windows {
            let status = match window.first_failure() {
                None => "ok".to_string(),
                Some((operation, reason)) => format!("{} failed: {}", operation, reason),
            };
            lines.push(format!("  {:<24} {}  {}", result.entry, window.handle, status));
        }
    }
    for entry in &report.report.unmatched {
        lines.push(format!("  {:<24} no matching window", entry));
    }
    if !report.released.restored.is_empty() {
        lines.push(format!(
            "  restored {} window(s) from the previous configuration",
            report.released.restored.len()
        ));
    }
    lines.join("\n")
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_config = LogConfig::from_env();
    init_logging(&log_config).map_err(|e| {
        UltrawideError::ConfigurationError(format!("Failed to initialize logging: {}", e))
    })?;

    let app = match UltrawideApp::new(cli) {
        Ok(app) => app,
        Err(e) => {
            error!("Failed to initialize Ultrawide: {:#}", e);
            return Err(e);
        }
    };

    let result = app.run().await;
    app.shutdown().await;

    if let Err(e) = &result {
        error!("{:#}", e);
    }
    result
}
