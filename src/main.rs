#![forbid(unsafe_code)]
mod edid;
mod event_loop;
mod hardware;
mod monitor;
mod screen;
mod screens_controller;
mod screens_model;
mod sensor;
mod storage;

use anyhow::Context;
use clap::{Parser, Subcommand};
use event_loop::{DisplayState, EventLoop};
use hardware::Backend;
use screen::{FormFactor, Location, OutputId, Point, Resolution, Screen};
use sensor::Accelerometer;
use std::path::PathBuf;
use std::time::Duration;
use storage::{ConfigStorage, StoredOptions};

#[derive(Parser)]
#[command(author, version, about, arg_required_else_help(true))]
struct Args {
    /// Method to use for querying and setting the output configuration.
    #[arg(long, env = "DISPLAY_SYNC_CONTROLLER")]
    controller: Backend,
    /// JSON file with remembered per-display options.
    #[arg(long, env = "DISPLAY_SYNC_CONFIG_FILE")]
    config_file: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the connected outputs and their decoded identities.
    List,
    /// Change settings of one output.
    Set(SetArgs),
    /// Remember the current options of every identified display.
    Save,
    /// Follow hardware changes, restoring remembered options of hotplugged displays.
    Watch {
        /// Polling interval in milliseconds.
        #[arg(long, default_value_t = 2000)]
        poll_interval: u64,
        /// IIO accelerometer directory; the first one found when omitted.
        #[arg(long)]
        accelerometer: Option<PathBuf>,
    },
}

#[derive(clap::Args)]
struct SetArgs {
    /// Connector name, e.g. HDMI-1.
    output: String,
    #[arg(long)]
    used: Option<bool>,
    /// Device pixel ratio.
    #[arg(long)]
    scale: Option<f64>,
    #[arg(long, conflicts_with = "size")]
    mode_index: Option<usize>,
    /// Resolution as WIDTHxHEIGHT.
    #[arg(long)]
    size: Option<Resolution>,
    #[arg(long, value_enum)]
    form_factor: Option<FormFactor>,
    /// Top-left corner as X,Y.
    #[arg(long, allow_hyphen_values = true)]
    position: Option<Point>,
    /// Make this the active screen.
    #[arg(long)]
    activate: bool,
}

fn describe(screen: &Screen) -> String {
    let geometry = screen.geometry();
    let mut description = format!(
        "{} ({:?}): {} {}x{}+{}+{} @ {}.{:03} Hz, scale {}, {:?}, power {:?}",
        screen.output_id(),
        screen.location(),
        if screen.used() { "used" } else { "unused" },
        geometry.size.width,
        geometry.size.height,
        geometry.top_left.x,
        geometry.top_left.y,
        screen.refresh_rate_millihz() / 1000,
        screen.refresh_rate_millihz() % 1000,
        screen.scale(),
        screen.form_factor(),
        screen.power_mode(),
    );
    if screen.is_active() {
        description.push_str(", active");
    }
    if screen.location() == Location::Internal {
        description.push_str(&format!(
            "\n    orientation {:?} (native {:?}, sensor {})",
            screen.current_orientation(),
            screen.native_orientation(),
            if screen.orientation_sensor_enabled() { "on" } else { "off" }
        ));
    }
    if let Some(identity) = screen.identity() {
        description.push_str(&format!(
            "\n    id {}, EDID {}.{}, made week {} of {}",
            identity.display_id(),
            identity.version.version,
            identity.version.revision,
            identity.manufacture_week,
            identity.manufacture_year
        ));
        if let Some(name) = identity.monitor_name() {
            description.push_str(&format!(", name {name:?}"));
        }
        if let Some(serial) = identity.serial_text() {
            description.push_str(&format!(", serial {serial:?}"));
        }
        let (width_mm, height_mm) = screen.physical_size_mm();
        description.push_str(&format!(
            ", {width_mm}x{height_mm} mm ({}x{} cm per EDID)",
            identity.physical_size.width_cm, identity.physical_size.height_cm
        ));
        if identity.extension_count > 0 {
            description.push_str(&format!(", {} extension block(s)", identity.extension_count));
        }
    }
    for (i, mode) in screen.available_modes().iter().enumerate() {
        let marker = if i == screen.current_mode_index() { '*' } else { ' ' };
        description.push_str(&format!(
            "\n  {marker} #{i} {}x{} @ {}.{:03} Hz",
            mode.resolution.width,
            mode.resolution.height,
            mode.refresh_rate_millihz / 1000,
            mode.refresh_rate_millihz % 1000
        ));
    }
    description
}

fn list(state: &DisplayState<Backend>) {
    for screen in state.model.screens() {
        println!("{}", describe(screen));
    }
}

fn set(state: &mut DisplayState<Backend>, args: SetArgs) -> anyhow::Result<()> {
    let output_id = OutputId::new(args.output);
    let screen = state
        .model
        .screen_mut(&output_id)
        .with_context(|| format!("no connected output named {output_id}"))?;

    if let Some(used) = args.used {
        screen.set_used(used);
    }
    if let Some(scale) = args.scale {
        screen.set_scale(scale)?;
    }
    if let Some(index) = args.mode_index {
        screen.set_current_mode_index(index)?;
    }
    if let Some(size) = args.size {
        screen.set_size(size)?;
    }
    if let Some(form_factor) = args.form_factor {
        screen.set_form_factor(form_factor);
    }
    if args.activate {
        state.model.activate(&output_id)?;
    }
    state.process_notifications()?;

    if let Some(position) = args.position {
        let mut config = state
            .controller
            .get_configuration(&state.model, &output_id)
            .with_context(|| format!("{output_id} disappeared"))?;
        config.top_left = position;
        state.controller.set_configuration(&output_id, &config)?;
    }

    state.sync_from_hardware()?;
    if let Some(screen) = state.model.screen(&output_id) {
        println!("{}", describe(screen));
    }
    Ok(())
}

fn save(state: &DisplayState<Backend>, storage: &mut ConfigStorage) -> anyhow::Result<()> {
    for screen in state.model.screens() {
        let Some(identity) = screen.identity() else {
            log::info!("{}: no EDID identity, not saved", screen.output_id());
            continue;
        };
        let Some(config) = state
            .controller
            .get_configuration(&state.model, screen.output_id())
        else {
            continue;
        };
        let display_id = identity.display_id();
        storage.save(
            &display_id,
            StoredOptions::from_config(&config, screen.available_modes()),
        )?;
        println!("{}: saved as {display_id}", screen.output_id());
    }
    Ok(())
}

fn watch(
    mut state: DisplayState<Backend>,
    storage: Option<ConfigStorage>,
    backend: Backend,
    accelerometer: Option<Accelerometer>,
    interval: Duration,
) -> anyhow::Result<()> {
    state.set_storage(storage);
    state.model.subscribe(|event| {
        log::info!(
            "{}: {} = {:?} ({:?})",
            event.output_id,
            event.change.field_name(),
            event.change,
            event.origin
        );
    });

    let (mut event_loop, sender) = EventLoop::new()?;
    state.sync_from_hardware()?;
    match &accelerometer {
        Some(accelerometer) => log::info!("Orientation from {}", accelerometer.device().display()),
        None => log::info!("No accelerometer, orientation stays fixed"),
    }
    monitor::spawn(backend, accelerometer, interval, sender)
        .context("unable to start monitor thread")?;

    event_loop.run(&mut state)?;
    Ok(())
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let args = Args::parse();
    let storage = args
        .config_file
        .as_deref()
        .map(ConfigStorage::open)
        .transpose()?;

    let mut state = DisplayState::new(args.controller);

    match args.command {
        Command::List => {
            state.sync_from_hardware()?;
            log::trace!("screens = {:?}", state.model.screens());
            list(&state);
        }
        Command::Set(set_args) => {
            state.sync_from_hardware()?;
            set(&mut state, set_args)?;
        }
        Command::Save => {
            let mut storage = storage.context("--config-file is required to save")?;
            state.sync_from_hardware()?;
            save(&state, &mut storage)?;
        }
        Command::Watch {
            poll_interval,
            accelerometer,
        } => watch(
            state,
            storage,
            args.controller,
            accelerometer.map(Accelerometer::new).or_else(Accelerometer::find),
            Duration::from_millis(poll_interval),
        )?,
    }

    Ok(())
}
