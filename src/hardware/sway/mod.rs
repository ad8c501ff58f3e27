use std::fmt::Write;
use std::process;

use crate::hardware::{DisplayConfiguration, HardwareError, OutputConfiguration};
use crate::screen::{FormFactor, PowerMode};

use super::utils::run;

mod parsing;

struct Swaymsg {
    command: process::Command,
    messages: Vec<String>,
}

impl Swaymsg {
    fn new() -> Self {
        Self {
            command: process::Command::new("swaymsg"),
            messages: Vec::new(),
        }
    }

    fn get_outputs(mut self) -> Self {
        self.command.arg("-t").arg("get_outputs");
        self
    }

    fn disable(mut self, output_name: &str) -> Self {
        self.messages.push(format!("output \"{output_name}\" disable"));
        self
    }

    fn enable(mut self, output: &OutputConfiguration) -> Self {
        let mut msg = format!(
            "output \"{}\" enable position {} {} scale {}",
            output.id, output.top_left.x, output.top_left.y, output.scale
        );
        if let Some(mode) = output.current_mode() {
            let refresh_rate = mode.refresh_rate_millihz;
            write!(
                &mut msg,
                " mode {}x{}@{}.{:03}Hz",
                mode.resolution.width,
                mode.resolution.height,
                refresh_rate / 1000,
                refresh_rate % 1000
            )
            .expect("unable to append to msg");
        }
        let power = if output.power_mode == PowerMode::On {
            "on"
        } else {
            "off"
        };
        write!(&mut msg, " power {power}").expect("unable to append to msg");
        self.messages.push(msg);
        self
    }

    /// Sway runs `;`-separated commands as one batch.
    fn command(mut self) -> process::Command {
        if !self.messages.is_empty() {
            self.command.arg(self.messages.join("; "));
        }
        self.command
    }
}

pub(super) fn read_configuration() -> Result<DisplayConfiguration, HardwareError> {
    parsing::parse(&run(Swaymsg::new().get_outputs().command())?.stdout)
}

fn build_command(configuration: &DisplayConfiguration) -> Result<process::Command, HardwareError> {
    let mut swaymsg = Swaymsg::new();

    for output in configuration.outputs.iter().filter(|output| output.connected) {
        swaymsg = if !output.used {
            swaymsg.disable(output.id.as_str())
        } else if output.form_factor == FormFactor::Monitor {
            swaymsg.enable(output)
        } else {
            return Err(HardwareError::Unsupported(format!(
                "sway cannot set form factor {:?} of {}",
                output.form_factor, output.id
            )));
        };
    }

    Ok(swaymsg.command())
}

pub(super) fn submit_configuration(
    configuration: &DisplayConfiguration,
) -> Result<(), HardwareError> {
    run(build_command(configuration)?)?;
    Ok(())
}
