use crate::hardware::{DisplayConfiguration, DisplayHardware, HardwareError, OutputConfiguration};
use crate::screen::{FormFactor, OutputId, Point, PowerMode, ScreenChange, ScreenEvent, Origin};
use crate::screens_model::ScreensModel;
use thiserror::Error;

#[derive(Debug, Error)]
pub(crate) enum ConfigError {
    #[error("unknown output {0}")]
    UnknownOutput(OutputId),
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
    #[error("configuration rejected by hardware")]
    RejectedByHardware(#[source] HardwareError),
    #[error("hardware configuration unavailable")]
    HardwareUnavailable(#[source] HardwareError),
}

/// Per-output settings a client may request.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Config {
    pub(crate) used: bool,
    pub(crate) top_left: Point,
    pub(crate) current_mode_index: usize,
    pub(crate) power_mode: PowerMode,
    pub(crate) scale: f64,
    pub(crate) form_factor: FormFactor,
}

impl Config {
    fn apply_to(&self, output: &mut OutputConfiguration) {
        output.used = self.used;
        output.top_left = self.top_left;
        output.current_mode_index = self.current_mode_index;
        output.power_mode = self.power_mode;
        output.scale = self.scale;
        output.form_factor = self.form_factor;
    }
}

impl ScreenChange {
    /// Copies a change of a hardware-backed field into `output`.
    fn apply_to(&self, output: &mut OutputConfiguration) -> bool {
        match *self {
            ScreenChange::Used(used) => output.used = used,
            ScreenChange::Scale(scale) => output.scale = scale,
            ScreenChange::FormFactor(form_factor) => output.form_factor = form_factor,
            ScreenChange::CurrentModeIndex(index) => output.current_mode_index = index,
            _ => return false,
        }
        true
    }
}

/// Pushes software changes of the model down to the hardware.
pub(crate) struct ScreensController<H> {
    hardware: H,
}

impl<H: DisplayHardware> ScreensController<H> {
    pub(crate) fn new(hardware: H) -> Self {
        Self { hardware }
    }

    #[cfg(test)]
    pub(crate) fn hardware(&self) -> &H {
        &self.hardware
    }

    #[cfg(test)]
    pub(crate) fn hardware_mut(&mut self) -> &mut H {
        &mut self.hardware
    }

    pub(crate) fn read_hardware(&self) -> Result<DisplayConfiguration, ConfigError> {
        self.hardware
            .read_configuration()
            .map_err(ConfigError::HardwareUnavailable)
    }

    /// Current settings of a screen, as the model sees them.
    pub(crate) fn get_configuration(&self, model: &ScreensModel, output_id: &OutputId) -> Option<Config> {
        model.screen(output_id).map(|screen| Config {
            used: screen.used(),
            top_left: screen.geometry().top_left,
            current_mode_index: screen.current_mode_index(),
            power_mode: screen.power_mode(),
            scale: screen.scale(),
            form_factor: screen.form_factor(),
        })
    }

    pub(crate) fn configuration(&self, model: &ScreensModel) -> Vec<(OutputId, Config)> {
        model
            .screens()
            .iter()
            .filter_map(|screen| {
                let output_id = screen.output_id();
                self.get_configuration(model, output_id)
                    .map(|config| (output_id.clone(), config))
            })
            .collect()
    }

    pub(crate) fn set_configuration(
        &mut self,
        output_id: &OutputId,
        config: &Config,
    ) -> Result<(), ConfigError> {
        self.set_configuration_bulk(&[(output_id.clone(), config.clone())])
    }

    /// Applies every entry in one hardware submission; on failure nothing is applied.
    /// Disconnected outputs are unknown, as they are to the model.
    pub(crate) fn set_configuration_bulk(
        &mut self,
        configs: &[(OutputId, Config)],
    ) -> Result<(), ConfigError> {
        let mut configuration = self.read_hardware()?;
        for (output_id, config) in configs {
            let output = configuration
                .output_mut(output_id)
                .filter(|output| output.connected)
                .ok_or_else(|| ConfigError::UnknownOutput(output_id.clone()))?;
            config.apply_to(output);
        }
        self.submit(&configuration)
    }

    /// Mirrors a software-originated change of `used`, `scale`, `form_factor` or
    /// `current_mode_index` to the hardware.
    pub(crate) fn handle_notification(&mut self, event: &ScreenEvent) -> Result<(), ConfigError> {
        if event.origin == Origin::Hardware {
            log::trace!("{}: {} reported by hardware", event.output_id, event.change.field_name());
            return Ok(());
        }

        let mut configuration = self.read_hardware()?;
        let Some(output) = configuration
            .output_mut(&event.output_id)
            .filter(|output| output.connected)
        else {
            log::debug!(
                "{} is gone, dropping its {} change",
                event.output_id,
                event.change.field_name()
            );
            return Ok(());
        };
        if !event.change.apply_to(output) {
            return Ok(());
        }

        log::debug!("{}: submitting {:?}", event.output_id, event.change);
        self.submit(&configuration)
    }

    fn submit(&mut self, configuration: &DisplayConfiguration) -> Result<(), ConfigError> {
        configuration.validate()?;
        log::trace!("configuration = {configuration:?}");
        self.hardware
            .submit_configuration(configuration)
            .map_err(ConfigError::RejectedByHardware)
    }
}
