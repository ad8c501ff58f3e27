use crate::edid::{self, DisplayIdentity};
use crate::hardware::OutputConfiguration;
use crate::screens_controller::ConfigError;
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::fmt;
use std::rc::Rc;
use std::str::FromStr;

/// Connector name as reported by the hardware, e.g. `eDP-1`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub(crate) struct OutputId(String);

impl OutputId {
    pub(crate) fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub(crate) fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OutputId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub(crate) struct Resolution {
    pub(crate) width: u32,
    pub(crate) height: u32,
}

impl FromStr for Resolution {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (width, height) = s
            .split_once('x')
            .ok_or_else(|| format!("expected WIDTHxHEIGHT, got {s:?}"))?;
        Ok(Resolution {
            width: width.parse().map_err(|err| format!("bad width: {err}"))?,
            height: height.parse().map_err(|err| format!("bad height: {err}"))?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub(crate) struct Mode {
    pub(crate) resolution: Resolution,
    pub(crate) refresh_rate_millihz: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct Point {
    pub(crate) x: i32,
    pub(crate) y: i32,
}

impl FromStr for Point {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (x, y) = s
            .split_once(',')
            .ok_or_else(|| format!("expected X,Y, got {s:?}"))?;
        Ok(Point {
            x: x.trim().parse().map_err(|err| format!("bad x: {err}"))?,
            y: y.trim().parse().map_err(|err| format!("bad y: {err}"))?,
        })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct Rect {
    pub(crate) top_left: Point,
    pub(crate) size: Resolution,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum Location {
    Internal,
    External,
}

impl Location {
    pub(crate) fn from_output_name(name: &str) -> Location {
        if name.starts_with("eDP-") || name.starts_with("LVDS-") || name.starts_with("DSI-") {
            Location::Internal
        } else {
            Location::External
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub(crate) enum FormFactor {
    Unknown,
    Phone,
    Tablet,
    Monitor,
    Tv,
    Projector,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum PowerMode {
    On,
    Standby,
    Suspend,
    Off,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Orientation {
    Landscape,
    Portrait,
    InvertedLandscape,
    InvertedPortrait,
}

/// Raw reading of a tilt sensor: which edge of the device points up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum OrientationReading {
    TopUp,
    TopDown,
    LeftUp,
    RightUp,
    FaceUp,
    FaceDown,
    Undefined,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Origin {
    /// Requested through one of the screen's mutators.
    Software,
    /// Observed in a hardware snapshot or sensor reading.
    Hardware,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum ScreenChange {
    Used(bool),
    Scale(f64),
    FormFactor(FormFactor),
    CurrentModeIndex(usize),
    AvailableModes(Vec<Mode>),
    PowerMode(PowerMode),
    Geometry(Rect),
    RefreshRate(u32),
    Orientation(Orientation),
    Active(bool),
    Identity(Option<DisplayIdentity>),
}

impl ScreenChange {
    pub(crate) fn field_name(&self) -> &'static str {
        match self {
            ScreenChange::Used(_) => "used",
            ScreenChange::Scale(_) => "scale",
            ScreenChange::FormFactor(_) => "form_factor",
            ScreenChange::CurrentModeIndex(_) => "current_mode_index",
            ScreenChange::AvailableModes(_) => "available_modes",
            ScreenChange::PowerMode(_) => "power_mode",
            ScreenChange::Geometry(_) => "geometry",
            ScreenChange::RefreshRate(_) => "refresh_rate",
            ScreenChange::Orientation(_) => "orientation",
            ScreenChange::Active(_) => "active",
            ScreenChange::Identity(_) => "identity",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ScreenEvent {
    pub(crate) output_id: OutputId,
    pub(crate) change: ScreenChange,
    pub(crate) origin: Origin,
}

/// Queue shared by every screen of a model. `Rc` keeps screens on the thread
/// that owns the model.
#[derive(Debug, Clone, Default)]
pub(crate) struct NotificationQueue(Rc<RefCell<VecDeque<ScreenEvent>>>);

impl NotificationQueue {
    fn push(&self, event: ScreenEvent) {
        self.0.borrow_mut().push_back(event);
    }

    pub(crate) fn pop(&self) -> Option<ScreenEvent> {
        self.0.borrow_mut().pop_front()
    }

    #[cfg(test)]
    pub(crate) fn drain(&self) -> Vec<ScreenEvent> {
        self.0.borrow_mut().drain(..).collect()
    }
}

fn scale_eq(a: f64, b: f64) -> bool {
    (a - b).abs() * 100_000.0 <= a.abs().min(b.abs())
}

#[derive(Debug)]
pub(crate) struct Screen {
    output_id: OutputId,
    location: Location,
    used: bool,
    geometry: Rect,
    available_modes: Vec<Mode>,
    current_mode_index: usize,
    refresh_rate_millihz: u32,
    scale: f64,
    form_factor: FormFactor,
    power_mode: PowerMode,
    physical_size_mm: (u32, u32),
    native_orientation: Orientation,
    current_orientation: Orientation,
    orientation_sensor_enabled: bool,
    active: bool,
    edid: Option<Vec<u8>>,
    identity: Option<DisplayIdentity>,
    notifications: NotificationQueue,
}

impl Screen {
    pub(crate) fn new(snapshot: &OutputConfiguration, notifications: NotificationQueue) -> Self {
        let location = Location::from_output_name(snapshot.id.as_str());
        let mut screen = Screen {
            output_id: snapshot.id.clone(),
            location,
            used: false,
            geometry: Rect::default(),
            available_modes: Vec::new(),
            current_mode_index: 0,
            refresh_rate_millihz: 0,
            scale: 1.0,
            form_factor: FormFactor::Unknown,
            power_mode: PowerMode::On,
            physical_size_mm: (0, 0),
            native_orientation: Orientation::Landscape,
            current_orientation: Orientation::Landscape,
            orientation_sensor_enabled: location == Location::Internal,
            active: false,
            edid: None,
            identity: None,
            // Nobody can observe a screen under construction.
            notifications: NotificationQueue::default(),
        };
        screen.absorb_hardware_snapshot(snapshot);
        screen.notifications = notifications;

        screen.native_orientation = if screen.geometry.size.width >= screen.geometry.size.height {
            Orientation::Landscape
        } else {
            Orientation::Portrait
        };
        screen.current_orientation = screen.native_orientation;
        log::debug!(
            "{}: geometry = {:?}, native orientation = {:?}",
            screen.output_id,
            screen.geometry,
            screen.native_orientation
        );

        screen
    }

    pub(crate) fn output_id(&self) -> &OutputId {
        &self.output_id
    }

    pub(crate) fn location(&self) -> Location {
        self.location
    }

    pub(crate) fn used(&self) -> bool {
        self.used
    }

    pub(crate) fn geometry(&self) -> Rect {
        self.geometry
    }

    pub(crate) fn available_modes(&self) -> &[Mode] {
        &self.available_modes
    }

    pub(crate) fn current_mode_index(&self) -> usize {
        self.current_mode_index
    }

    pub(crate) fn refresh_rate_millihz(&self) -> u32 {
        self.refresh_rate_millihz
    }

    pub(crate) fn scale(&self) -> f64 {
        self.scale
    }

    pub(crate) fn form_factor(&self) -> FormFactor {
        self.form_factor
    }

    pub(crate) fn power_mode(&self) -> PowerMode {
        self.power_mode
    }

    pub(crate) fn physical_size_mm(&self) -> (u32, u32) {
        self.physical_size_mm
    }

    pub(crate) fn native_orientation(&self) -> Orientation {
        self.native_orientation
    }

    pub(crate) fn current_orientation(&self) -> Orientation {
        self.current_orientation
    }

    pub(crate) fn orientation_sensor_enabled(&self) -> bool {
        self.orientation_sensor_enabled
    }

    pub(crate) fn is_active(&self) -> bool {
        self.active
    }

    pub(crate) fn identity(&self) -> Option<&DisplayIdentity> {
        self.identity.as_ref()
    }

    fn notify(&self, change: ScreenChange, origin: Origin) {
        self.notifications.push(ScreenEvent {
            output_id: self.output_id.clone(),
            change,
            origin,
        });
    }

    pub(crate) fn set_used(&mut self, used: bool) {
        if self.used == used {
            return;
        }
        self.used = used;
        self.notify(ScreenChange::Used(used), Origin::Software);
    }

    pub(crate) fn set_scale(&mut self, scale: f64) -> Result<(), ConfigError> {
        if !(scale.is_finite() && scale > 0.0) {
            return Err(ConfigError::InvalidConfiguration(format!(
                "scale of {} must be positive, got {scale}",
                self.output_id
            )));
        }
        if scale_eq(self.scale, scale) {
            return Ok(());
        }
        self.scale = scale;
        self.notify(ScreenChange::Scale(scale), Origin::Software);
        Ok(())
    }

    pub(crate) fn set_form_factor(&mut self, form_factor: FormFactor) {
        if self.form_factor == form_factor {
            return;
        }
        self.form_factor = form_factor;
        self.notify(ScreenChange::FormFactor(form_factor), Origin::Software);
    }

    /// Geometry and refresh rate follow once the hardware confirms the mode.
    pub(crate) fn set_current_mode_index(&mut self, index: usize) -> Result<(), ConfigError> {
        if index >= self.available_modes.len() {
            return Err(ConfigError::InvalidConfiguration(format!(
                "mode index {index} out of range for {} ({} modes)",
                self.output_id,
                self.available_modes.len()
            )));
        }
        if self.current_mode_index == index {
            return Ok(());
        }
        self.current_mode_index = index;
        self.notify(ScreenChange::CurrentModeIndex(index), Origin::Software);
        Ok(())
    }

    pub(crate) fn set_size(&mut self, resolution: Resolution) -> Result<(), ConfigError> {
        let index = self
            .available_modes
            .iter()
            .position(|mode| mode.resolution == resolution)
            .ok_or_else(|| {
                ConfigError::InvalidConfiguration(format!(
                    "{} has no {}x{} mode",
                    self.output_id, resolution.width, resolution.height
                ))
            })?;
        self.set_current_mode_index(index)
    }

    pub(crate) fn set_active(&mut self, active: bool) {
        if self.active == active {
            return;
        }
        self.active = active;
        self.notify(ScreenChange::Active(active), Origin::Software);
    }

    pub(crate) fn absorb_hardware_snapshot(&mut self, snapshot: &OutputConfiguration) {
        debug_assert_eq!(snapshot.id, self.output_id);

        if self.used != snapshot.used {
            self.used = snapshot.used;
            self.notify(ScreenChange::Used(self.used), Origin::Hardware);
        }

        if self.available_modes != snapshot.modes {
            self.available_modes = snapshot.modes.clone();
            self.notify(
                ScreenChange::AvailableModes(self.available_modes.clone()),
                Origin::Hardware,
            );
        }

        if self.current_mode_index != snapshot.current_mode_index {
            self.current_mode_index = snapshot.current_mode_index;
            self.notify(
                ScreenChange::CurrentModeIndex(self.current_mode_index),
                Origin::Hardware,
            );
        }

        if self.power_mode != snapshot.power_mode {
            self.power_mode = snapshot.power_mode;
            self.notify(ScreenChange::PowerMode(self.power_mode), Origin::Hardware);
        }

        let current_mode = snapshot.current_mode();
        let geometry = Rect {
            top_left: snapshot.top_left,
            size: current_mode.map(|mode| mode.resolution).unwrap_or_default(),
        };
        if self.geometry != geometry {
            self.geometry = geometry;
            self.notify(ScreenChange::Geometry(geometry), Origin::Hardware);
        }

        let refresh_rate_millihz = current_mode.map_or(0, |mode| mode.refresh_rate_millihz);
        if self.refresh_rate_millihz != refresh_rate_millihz {
            self.refresh_rate_millihz = refresh_rate_millihz;
            self.notify(
                ScreenChange::RefreshRate(refresh_rate_millihz),
                Origin::Hardware,
            );
        }

        if self.form_factor != snapshot.form_factor {
            self.form_factor = snapshot.form_factor;
            self.notify(ScreenChange::FormFactor(self.form_factor), Origin::Hardware);
        }

        if !scale_eq(self.scale, snapshot.scale) {
            self.scale = snapshot.scale;
            self.notify(ScreenChange::Scale(self.scale), Origin::Hardware);
        }

        self.physical_size_mm = snapshot.physical_size_mm;

        if self.edid != snapshot.edid {
            self.edid = snapshot.edid.clone();
            let identity = self.edid.as_deref().and_then(|bytes| {
                edid::decode(bytes)
                    .inspect_err(|err| log::warn!("{}: ignoring EDID: {err}", self.output_id))
                    .ok()
            });
            if self.identity != identity {
                self.identity = identity;
                self.notify(ScreenChange::Identity(self.identity.clone()), Origin::Hardware);
            }
        }
    }

    pub(crate) fn handle_orientation_reading(&mut self, reading: OrientationReading) {
        if !self.orientation_sensor_enabled {
            log::debug!("{}: sensor off, dropping {reading:?}", self.output_id);
            return;
        }

        let landscape = self.native_orientation == Orientation::Landscape;
        let orientation = match reading {
            OrientationReading::LeftUp if landscape => Orientation::InvertedPortrait,
            OrientationReading::LeftUp => Orientation::Landscape,
            OrientationReading::TopUp if landscape => Orientation::Landscape,
            OrientationReading::TopUp => Orientation::Portrait,
            OrientationReading::RightUp if landscape => Orientation::Portrait,
            OrientationReading::RightUp => Orientation::InvertedLandscape,
            OrientationReading::TopDown if landscape => Orientation::InvertedLandscape,
            OrientationReading::TopDown => Orientation::InvertedPortrait,
            OrientationReading::FaceUp
            | OrientationReading::FaceDown
            | OrientationReading::Undefined => {
                log::warn!("{}: unknown orientation {reading:?}", self.output_id);
                return;
            }
        };

        if self.current_orientation != orientation {
            self.current_orientation = orientation;
            self.notify(ScreenChange::Orientation(orientation), Origin::Hardware);
        }
        log::debug!("{}: orientation = {orientation:?}", self.output_id);
    }

    /// Only the built-in panel follows the orientation sensor, and only while lit.
    pub(crate) fn on_display_power_state_changed(&mut self, on: bool) {
        if self.location != Location::Internal {
            return;
        }
        log::debug!("{}: orientation sensor enabled = {on}", self.output_id);
        self.orientation_sensor_enabled = on;
    }
}
