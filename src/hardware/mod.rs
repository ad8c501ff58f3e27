use crate::screen::{FormFactor, Mode, OutputId, Point, PowerMode};
use crate::screens_controller::ConfigError;
use std::io;
use std::process::ExitStatus;
use thiserror::Error;

#[cfg(feature = "randr")]
mod randr;
#[cfg(feature = "sway")]
mod sway;
mod utils;
#[cfg(feature = "xrandr")]
mod xrandr;

/// Largest coordinate the X11 and DRM layers can address.
const MAX_COORDINATE: i64 = i16::MAX as i64;
const MIN_COORDINATE: i64 = i16::MIN as i64;

/// What the hardware reports for, or is asked to do with, a single output.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct OutputConfiguration {
    pub(crate) id: OutputId,
    pub(crate) connected: bool,
    pub(crate) used: bool,
    pub(crate) top_left: Point,
    pub(crate) current_mode_index: usize,
    pub(crate) modes: Vec<Mode>,
    pub(crate) power_mode: PowerMode,
    pub(crate) scale: f64,
    pub(crate) form_factor: FormFactor,
    pub(crate) physical_size_mm: (u32, u32),
    pub(crate) edid: Option<Vec<u8>>,
}

impl OutputConfiguration {
    pub(crate) fn current_mode(&self) -> Option<&Mode> {
        self.modes.get(self.current_mode_index)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct DisplayConfiguration {
    pub(crate) outputs: Vec<OutputConfiguration>,
}

impl DisplayConfiguration {
    pub(crate) fn output(&self, id: &OutputId) -> Option<&OutputConfiguration> {
        self.outputs.iter().find(|output| output.id == *id)
    }

    pub(crate) fn output_mut(&mut self, id: &OutputId) -> Option<&mut OutputConfiguration> {
        self.outputs.iter_mut().find(|output| output.id == *id)
    }

    /// Overlapping outputs are accepted, mirroring relies on it.
    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        for output in &self.outputs {
            let invalid = |reason: String| {
                Err(ConfigError::InvalidConfiguration(format!(
                    "{}: {reason}",
                    output.id
                )))
            };

            if !output.modes.is_empty() && output.current_mode_index >= output.modes.len() {
                return invalid(format!(
                    "mode index {} out of range ({} modes)",
                    output.current_mode_index,
                    output.modes.len()
                ));
            }
            if !(output.scale.is_finite() && output.scale > 0.0) {
                return invalid(format!("scale must be positive, got {}", output.scale));
            }
            if !output.used {
                continue;
            }
            if !output.connected {
                return invalid("cannot use a disconnected output".to_string());
            }
            let Some(mode) = output.current_mode() else {
                return invalid("cannot use an output without modes".to_string());
            };

            let left = i64::from(output.top_left.x);
            let top = i64::from(output.top_left.y);
            let right = left + i64::from(mode.resolution.width);
            let bottom = top + i64::from(mode.resolution.height);
            if left < MIN_COORDINATE
                || top < MIN_COORDINATE
                || right > MAX_COORDINATE
                || bottom > MAX_COORDINATE
            {
                return invalid(format!(
                    "extent ({left}, {top})..({right}, {bottom}) is out of addressable range"
                ));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Error)]
pub(crate) enum HardwareError {
    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },
    #[error("{program} exited with {status}: {stderr}")]
    CommandFailed {
        program: String,
        status: ExitStatus,
        stderr: String,
    },
    #[error("unable to parse {what}: {reason}")]
    Parse { what: &'static str, reason: String },
    #[error("{0}")]
    Unsupported(String),
    #[cfg(test)]
    #[error("rejected: {0}")]
    Rejected(String),
    #[cfg(feature = "randr")]
    #[error(transparent)]
    X11Connect(#[from] x11rb::errors::ConnectError),
    #[cfg(feature = "randr")]
    #[error(transparent)]
    X11Connection(#[from] x11rb::errors::ConnectionError),
    #[cfg(feature = "randr")]
    #[error(transparent)]
    X11Reply(#[from] x11rb::errors::ReplyError),
}

/// Source of truth for the display configuration.
pub(crate) trait DisplayHardware {
    fn read_configuration(&self) -> Result<DisplayConfiguration, HardwareError>;

    /// Applies the whole configuration at once.
    fn submit_configuration(
        &mut self,
        configuration: &DisplayConfiguration,
    ) -> Result<(), HardwareError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub(crate) enum Backend {
    #[cfg(feature = "xrandr")]
    Xrandr,
    #[cfg(feature = "sway")]
    Sway,
    #[cfg(feature = "randr")]
    Randr,
}

impl DisplayHardware for Backend {
    fn read_configuration(&self) -> Result<DisplayConfiguration, HardwareError> {
        match *self {
            #[cfg(feature = "xrandr")]
            Backend::Xrandr => xrandr::read_configuration(),
            #[cfg(feature = "sway")]
            Backend::Sway => sway::read_configuration(),
            #[cfg(feature = "randr")]
            Backend::Randr => randr::read_configuration(),
        }
    }

    fn submit_configuration(
        &mut self,
        configuration: &DisplayConfiguration,
    ) -> Result<(), HardwareError> {
        match *self {
            #[cfg(feature = "xrandr")]
            Backend::Xrandr => xrandr::submit_configuration(configuration),
            #[cfg(feature = "sway")]
            Backend::Sway => sway::submit_configuration(configuration),
            #[cfg(feature = "randr")]
            Backend::Randr => randr::submit_configuration(configuration),
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::screen::Resolution;

    /// Connected, used output with a 1080p and a 720p mode, the former current.
    pub(crate) fn output(name: &str) -> OutputConfiguration {
        OutputConfiguration {
            id: OutputId::new(name),
            connected: true,
            used: true,
            top_left: Point::default(),
            current_mode_index: 0,
            modes: vec![
                Mode {
                    resolution: Resolution {
                        width: 1920,
                        height: 1080,
                    },
                    refresh_rate_millihz: 60000,
                },
                Mode {
                    resolution: Resolution {
                        width: 1280,
                        height: 720,
                    },
                    refresh_rate_millihz: 60000,
                },
            ],
            power_mode: PowerMode::On,
            scale: 1.0,
            form_factor: FormFactor::Monitor,
            physical_size_mm: (510, 290),
            edid: None,
        }
    }

    /// Applies every accepted submission to its own state.
    #[derive(Debug, Default)]
    pub(crate) struct FakeHardware {
        pub(crate) configuration: DisplayConfiguration,
        pub(crate) submissions: Vec<DisplayConfiguration>,
        pub(crate) reject_with: Option<String>,
        pub(crate) unavailable: bool,
    }

    impl FakeHardware {
        pub(crate) fn with_outputs(outputs: Vec<OutputConfiguration>) -> Self {
            Self {
                configuration: DisplayConfiguration { outputs },
                ..Default::default()
            }
        }
    }

    impl DisplayHardware for FakeHardware {
        fn read_configuration(&self) -> Result<DisplayConfiguration, HardwareError> {
            if self.unavailable {
                return Err(HardwareError::Unsupported("unplugged".to_string()));
            }
            Ok(self.configuration.clone())
        }

        fn submit_configuration(
            &mut self,
            configuration: &DisplayConfiguration,
        ) -> Result<(), HardwareError> {
            if let Some(reason) = &self.reject_with {
                return Err(HardwareError::Rejected(reason.clone()));
            }
            self.submissions.push(configuration.clone());
            self.configuration = configuration.clone();
            Ok(())
        }
    }
}
