use super::utils::{run, stdout_utf8};
use crate::hardware::{DisplayConfiguration, HardwareError};
use crate::screen::{FormFactor, Mode, Point, PowerMode};
use std::process;

mod parsing;

struct Xrandr {
    command: process::Command,
}

impl Xrandr {
    fn new() -> Self {
        let command = process::Command::new("xrandr");
        Self { command }
    }

    fn verbose(mut self) -> Self {
        self.command.arg("--verbose");
        self
    }

    fn output(mut self, output_name: &str) -> Self {
        self.command.arg("--output").arg(output_name);
        self
    }

    fn mode(mut self, mode: &Mode) -> Self {
        let refresh_rate = mode.refresh_rate_millihz;
        self.command
            .arg("--mode")
            .arg(format!(
                "{}x{}",
                mode.resolution.width, mode.resolution.height
            ))
            .arg("--rate")
            .arg(format!(
                "{}.{:02}",
                refresh_rate / 1000,
                refresh_rate % 1000 / 10
            ));
        self
    }

    fn pos(mut self, top_left: Point) -> Self {
        self.command
            .arg("--pos")
            .arg(format!("{}x{}", top_left.x, top_left.y));
        self
    }

    /// xrandr scales the framebuffer, the inverse of the device pixel ratio.
    fn scale(mut self, scale: f64) -> Self {
        let factor = 1.0 / scale;
        self.command
            .arg("--scale")
            .arg(format!("{factor}x{factor}"));
        self
    }

    fn off(mut self) -> Self {
        self.command.arg("--off");
        self
    }

    fn command(self) -> process::Command {
        self.command
    }
}

pub(super) fn read_configuration() -> Result<DisplayConfiguration, HardwareError> {
    let output = run(Xrandr::new().verbose().command())?;
    parsing::parse(&stdout_utf8(output, "xrandr output")?)
}

fn build_command(configuration: &DisplayConfiguration) -> Result<process::Command, HardwareError> {
    let mut xrandr = Xrandr::new();

    for output in &configuration.outputs {
        if !output.connected && !output.used {
            continue;
        }
        if output.used && output.power_mode != PowerMode::On {
            return Err(HardwareError::Unsupported(format!(
                "xrandr cannot set power mode {:?} of {}",
                output.power_mode, output.id
            )));
        }
        if output.used && output.form_factor != FormFactor::Monitor {
            return Err(HardwareError::Unsupported(format!(
                "xrandr cannot set form factor {:?} of {}",
                output.form_factor, output.id
            )));
        }

        xrandr = xrandr.output(output.id.as_str());
        xrandr = match output.current_mode() {
            Some(mode) if output.used => xrandr
                .mode(mode)
                .pos(output.top_left)
                .scale(output.scale),
            _ => xrandr.off(),
        };
    }

    Ok(xrandr.command())
}

pub(super) fn submit_configuration(
    configuration: &DisplayConfiguration,
) -> Result<(), HardwareError> {
    run(build_command(configuration)?)?;
    Ok(())
}
