use crate::hardware::{DisplayConfiguration, HardwareError, OutputConfiguration};
use crate::screen::{FormFactor, Mode, OutputId, Point, PowerMode, Resolution};

use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct RpcOutput<'a> {
    name: &'a str,
    active: bool,
    #[serde(default)]
    power: Option<bool>,
    #[serde(default)]
    dpms: Option<bool>,
    /// Absent or -1 for disabled outputs.
    #[serde(default)]
    scale: Option<f64>,
    rect: RpcRect,
    modes: Vec<RpcMode>,
    #[serde(default)]
    current_mode: Option<RpcMode>,
}

#[derive(Debug, Deserialize)]
struct RpcRect {
    x: i32,
    y: i32,
}

#[derive(Debug, Deserialize)]
struct RpcMode {
    width: u32,
    height: u32,
    refresh: u32,
}

impl From<&RpcMode> for Mode {
    fn from(rpc_mode: &RpcMode) -> Self {
        Mode {
            resolution: Resolution {
                width: rpc_mode.width,
                height: rpc_mode.height,
            },
            refresh_rate_millihz: rpc_mode.refresh,
        }
    }
}

impl RpcOutput<'_> {
    fn into_configuration(self) -> OutputConfiguration {
        let modes: Vec<Mode> = self.modes.iter().map(Mode::from).collect();
        let current_mode_index = self
            .current_mode
            .as_ref()
            .map(Mode::from)
            .and_then(|current| modes.iter().position(|mode| *mode == current))
            .unwrap_or(0);
        let powered = self.power.or(self.dpms).unwrap_or(true);

        OutputConfiguration {
            id: OutputId::new(self.name),
            // Sway does not return disconnected outputs
            connected: true,
            used: self.active,
            top_left: Point {
                x: self.rect.x,
                y: self.rect.y,
            },
            current_mode_index,
            modes,
            power_mode: if powered { PowerMode::On } else { PowerMode::Off },
            scale: self.scale.filter(|scale| *scale > 0.0).unwrap_or(1.0),
            form_factor: FormFactor::Monitor,
            physical_size_mm: (0, 0),
            edid: None,
        }
    }
}

pub(super) fn parse(swaymsg_output: &[u8]) -> Result<DisplayConfiguration, HardwareError> {
    let rpc_outputs: Vec<RpcOutput> =
        serde_json::from_slice(swaymsg_output).map_err(|err| HardwareError::Parse {
            what: "output of swaymsg -t get_outputs",
            reason: err.to_string(),
        })?;

    Ok(DisplayConfiguration {
        outputs: rpc_outputs
            .into_iter()
            .map(RpcOutput::into_configuration)
            .collect(),
    })
}
