//! Terminal host for the parking widget core.
//!
//! # Responsibility
//! - Save, delete and show the parking note against a local data directory.
//! - Run the live scheduler (`watch`) and print every widget render.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use parkwidget_core::schedule::{run_alarm_dispatch, QueuedAlarmFacility, TokioAlarmFacility};
use parkwidget_core::{
    init_logging, Clock, FloorSide, InstanceId, ParkingLocation, RefreshReason, RenderError,
    RenderTarget, SurfaceVariant, SystemClock, TimeLine, WidgetConfig, WidgetRuntime, WidgetView,
};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

const DEFAULT_DATA_DIR: &str = ".parkwidget";

#[derive(Parser)]
#[command(name = "parkwidget", version, about = "Parking location widget from the terminal")]
struct Cli {
    /// Directory holding the note stores, `widget.toml` and logs
    #[arg(long, short = 'd')]
    data_dir: Option<PathBuf>,

    /// Override the configured log level
    #[arg(long)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the saved location as each widget shows it
    Show,

    /// Save a parking location and refresh the widgets
    Save {
        /// Floor number (0-99)
        floor: u32,
        /// Optional area, e.g. "A구역"
        area: Option<String>,
        /// Parked above ground instead of underground
        #[arg(long)]
        above: bool,
    },

    /// Delete the saved location and refresh the widgets
    Delete,

    /// Keep the timers running and print renders until Ctrl-C
    Watch {
        /// Override the periodic refresh interval
        #[arg(long)]
        interval_minutes: Option<u64>,
    },
}

/// Terminal stand-in for the home screen: one instance per variant.
struct TerminalTarget {
    live: bool,
    latest: Mutex<BTreeMap<SurfaceVariant, WidgetView>>,
}

impl TerminalTarget {
    fn new(live: bool) -> Self {
        Self {
            live,
            latest: Mutex::new(BTreeMap::new()),
        }
    }

    fn print_latest(&self) {
        let latest = self.latest.lock().unwrap_or_else(PoisonError::into_inner);
        for (variant, view) in latest.iter() {
            println!("{}", format_view(*variant, view));
        }
    }
}

impl RenderTarget for TerminalTarget {
    fn active_instances(&self, variant: SurfaceVariant) -> Result<Vec<InstanceId>, RenderError> {
        Ok(vec![instance_id(variant)])
    }

    fn push(
        &self,
        variant: SurfaceVariant,
        _instance: InstanceId,
        view: &WidgetView,
    ) -> Result<(), RenderError> {
        if self.live {
            println!(
                "[{}] {}",
                chrono::Local::now().format("%H:%M:%S"),
                format_view(variant, view)
            );
        }
        self.latest
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(variant, view.clone());
        Ok(())
    }
}

fn instance_id(variant: SurfaceVariant) -> InstanceId {
    match variant {
        SurfaceVariant::Wide => 1,
        SurfaceVariant::Medium => 2,
        SurfaceVariant::Square => 3,
    }
}

fn format_view(variant: SurfaceVariant, view: &WidgetView) -> String {
    match &view.time_line {
        TimeLine::Hidden => format!("{:<6} | {}", variant.as_str(), view.display_text),
        TimeLine::Text(line) => {
            format!("{:<6} | {} | {}", variant.as_str(), view.display_text, line)
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let data_dir = resolve_data_dir(cli.data_dir)?;
    let mut config = WidgetConfig::load_from_dir(&data_dir)
        .with_context(|| format!("loading config from {}", data_dir.display()))?;
    if let Some(level) = cli.log_level {
        config.log_level = Some(level);
    }
    if let Err(err) = init_logging(config.effective_log_level(), data_dir.join("logs")) {
        eprintln!("warning: logging disabled: {err}");
    }

    match cli.command {
        Commands::Show => run_once(&data_dir, &config, |runtime| {
            runtime
                .refresh_handle()
                .trigger_now(RefreshReason::Manual)
                .context("refresh failed")?;
            Ok(())
        }),
        Commands::Save { floor, area, above } => {
            let side = if above {
                FloorSide::AboveGround
            } else {
                FloorSide::Underground
            };
            let location = ParkingLocation::new(side, floor, area.unwrap_or_default())?;
            run_once(&data_dir, &config, |runtime| {
                let outcome = runtime
                    .service()
                    .save_location(&location, SystemClock.now_ms())?;
                println!("saved: {}", outcome.note.text.unwrap_or_default());
                Ok(())
            })
        }
        Commands::Delete => run_once(&data_dir, &config, |runtime| {
            runtime.service().delete_note()?;
            println!("deleted");
            Ok(())
        }),
        Commands::Watch { interval_minutes } => {
            if let Some(minutes) = interval_minutes {
                config.periodic_interval_minutes = minutes;
            }
            watch(&data_dir, &config)
        }
    }
}

fn resolve_data_dir(arg: Option<PathBuf>) -> Result<PathBuf> {
    let dir = arg.unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR));
    if dir.is_absolute() {
        return Ok(dir);
    }
    Ok(std::env::current_dir()
        .context("resolving current directory")?
        .join(dir))
}

/// Runs one command against a short-lived runtime, then prints every widget.
fn run_once(
    data_dir: &Path,
    config: &WidgetConfig,
    command: impl FnOnce(&WidgetRuntime) -> Result<()>,
) -> Result<()> {
    let target = Arc::new(TerminalTarget::new(false));
    // Timers are not kept alive past this process; registrations are dropped.
    let runtime = WidgetRuntime::start(
        data_dir,
        config,
        target.clone(),
        Arc::new(QueuedAlarmFacility::new()),
        Arc::new(SystemClock),
    )?;

    let result = command(&runtime);
    runtime.shutdown();
    result?;

    target.print_latest();
    Ok(())
}

fn watch(data_dir: &Path, config: &WidgetConfig) -> Result<()> {
    let tokio_runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("starting tokio runtime")?;
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let (alarms, fired_rx) =
        TokioAlarmFacility::new(tokio_runtime.handle().clone(), clock.clone());

    let runtime = WidgetRuntime::start(
        data_dir,
        config,
        Arc::new(TerminalTarget::new(true)),
        Arc::new(alarms),
        clock,
    )?;
    println!(
        "watching {} (every {} min and at midnight); Ctrl-C to stop",
        data_dir.display(),
        config.periodic_interval_minutes
    );

    let scheduler = runtime.scheduler();
    let result = tokio_runtime.block_on(async move {
        let dispatch = tokio::spawn(run_alarm_dispatch(scheduler, fired_rx));
        let signal = tokio::signal::ctrl_c().await;
        dispatch.abort();
        signal
    });

    runtime.shutdown();
    result.context("waiting for Ctrl-C")?;
    log::info!("event=watch_stop module=cli status=ok");
    Ok(())
}
