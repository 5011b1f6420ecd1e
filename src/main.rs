//! Ride Control Computer: main entry point.
//!
//! Hexagonal architecture with a single-threaded fixed-rate control loop.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  RoboClawMotorController   GpioControlPanel   GpioTheming      │
//! │  MockMotorController       MockControlPanel   MockTheming      │
//! │  LogStatusSink             JsonLinesSink                       │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │              RideService (pure logic)                  │    │
//! │  │  FSM · Safety · Watchdog                               │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! │                                                                │
//! │  ControlLoop · FixedRateTimer                                  │
//! └────────────────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::LevelFilter;

use rcc::adapters::{
    GpioControlPanel, GpioThemingController, JsonLinesSink, LogStatusSink, MockControlPanel,
    MockMotorController, MockThemingController, PanelLines, RoboClawMotorController,
};
use rcc::app::{ControlLoop, ControlPanel, MotorController, RideService, StatusSink, ThemingController};
use rcc::config::RideConfig;
use rcc::drivers::roboclaw::{self, RoboClaw};
use rcc::drivers::serial;
use rcc::drivers::sysfs_gpio::{Direction, SysfsPin};
use rcc::pins;
use rcc::timer::FixedRateTimer;

/// Ride control computer: sequences the ride and halts it on any fault.
#[derive(Parser, Debug)]
#[command(name = "rcc")]
#[command(version)]
#[command(about = "Safety-governed ride sequencing for the REC coaster")]
struct Args {
    /// Drive the real motor controller, console and show lines instead of
    /// the simulation.
    #[arg(long)]
    hardware: bool,

    /// Ride configuration TOML.  Defaults apply when omitted.
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Serial port for the RoboClaw.  Repeat to try several in order.
    #[arg(long = "serial-port", value_name = "TTY")]
    serial_ports: Vec<PathBuf>,

    /// Write one JSON status line per tick to this file.
    #[arg(long, value_name = "FILE")]
    status_json: Option<PathBuf>,

    /// Enable verbose logging (DEBUG level).
    #[arg(short, long)]
    verbose: bool,

    /// Output logs in JSON format.
    #[arg(long)]
    json: bool,

    /// Stop after this many ticks.
    #[arg(long, value_name = "N")]
    max_ticks: Option<u64>,
}

type Motor = Box<dyn MotorController>;
type Panel = Box<dyn ControlPanel>;
type Theming = Box<dyn ThemingController>;

fn main() -> Result<()> {
    let args = Args::parse();
    setup_tracing(&args);

    info!("Ride Control Computer v{} starting", env!("CARGO_PKG_VERSION"));

    // ── 1. Configuration ──────────────────────────────────────
    let config = match &args.config {
        Some(path) => {
            info!("Loading ride config from {}", path.display());
            RideConfig::load(path).with_context(|| format!("loading {}", path.display()))?
        }
        None => {
            info!("No config file given, using defaults");
            RideConfig::default()
        }
    };
    let service = RideService::new(config.clone()).context("invalid ride configuration")?;

    // ── 2. Adapters ───────────────────────────────────────────
    let (motor, panel, theming) = if args.hardware {
        hardware_adapters(&args)?
    } else {
        simulated_adapters(&config)
    };

    let mut sinks: Vec<Box<dyn StatusSink>> =
        vec![Box::new(LogStatusSink::new(config.telemetry_interval_ticks))];
    if let Some(path) = &args.status_json {
        let sink = JsonLinesSink::create(path)
            .with_context(|| format!("creating status feed {}", path.display()))?;
        info!("Status feed: {}", path.display());
        sinks.push(Box::new(sink));
    }

    // ── 3. Shutdown signal ────────────────────────────────────
    let stop = Arc::new(AtomicBool::new(false));
    {
        let stop = Arc::clone(&stop);
        ctrlc::set_handler(move || {
            info!("Received shutdown signal");
            stop.store(true, Ordering::SeqCst);
        })
        .context("installing signal handler")?;
    }

    // ── 4. Control loop ───────────────────────────────────────
    let timer = FixedRateTimer::new(&config);
    let mut control = ControlLoop::new(service, timer, motor, panel, theming, sinks)
        .with_max_ticks(args.max_ticks);
    let report = control.run(&stop);

    if let Some(last) = report.last {
        info!(
            "Final state {:?} after {} ticks (fault: {})",
            last.state, report.ticks, last.fault
        );
    }
    info!("Ride Control Computer shutdown complete");
    Ok(())
}

fn setup_tracing(args: &Args) {
    let level = if args.verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    };

    let filter = EnvFilter::from_default_env().add_directive(level.into());

    if args.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .compact()
            .init();
    }
}

// ── Adapter composition ───────────────────────────────────────

fn simulated_adapters(config: &RideConfig) -> (Motor, Panel, Theming) {
    info!("Simulation mode: mock motor, scripted console, recording show");
    let wait = u32::try_from(config.ticks_for(2_000)).unwrap_or(u32::MAX);
    (
        Box::new(MockMotorController::new().with_period(config.tick_period())),
        Box::new(MockControlPanel::demo(wait)),
        Box::new(MockThemingController::new()),
    )
}

fn hardware_adapters(args: &Args) -> Result<(Motor, Panel, Theming)> {
    info!("Hardware mode");

    let candidates = if args.serial_ports.is_empty() {
        serial::default_candidates()
    } else {
        args.serial_ports.clone()
    };
    let (path, port) = serial::open_first(&candidates, roboclaw::BAUD_RATE)
        .context("no RoboClaw serial port could be opened")?;
    let mut motor =
        RoboClawMotorController::new(RoboClaw::new(port, roboclaw::DEFAULT_ADDRESS));
    motor
        .initialise()
        .with_context(|| format!("RoboClaw on {} did not answer", path.display()))?;

    let input = |line: u32| {
        SysfsPin::open(line, Direction::In).with_context(|| format!("console input gpio{line}"))
    };
    let panel = GpioControlPanel::new(PanelLines {
        dispatch: input(pins::DISPATCH_GPIO)?,
        estop: input(pins::ESTOP_GPIO)?,
        key_armed: input(pins::KEY_ARMED_GPIO)?,
        restraints: input(pins::RESTRAINTS_GPIO)?,
        reset: input(pins::RESET_GPIO)?,
        stop: input(pins::STOP_GPIO)?,
        maintenance: input(pins::MAINTENANCE_GPIO)?,
    });

    let output = |line: u32| {
        SysfsPin::open(line, Direction::Out).with_context(|| format!("show output gpio{line}"))
    };
    let theming =
        GpioThemingController::new(output(pins::SHOW_ENABLE_GPIO)?, output(pins::SHOW_FX_GPIO)?)
            .context("driving show lines low")?;

    Ok((Box::new(motor), Box::new(panel), Box::new(theming)))
}
