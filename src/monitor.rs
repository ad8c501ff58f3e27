use crate::event_loop::HardwareEvent;
use crate::hardware::{DisplayConfiguration, DisplayHardware, OutputConfiguration};
use crate::screen::{Location, OrientationReading, PowerMode};
use crate::sensor::Accelerometer;
use calloop::channel::Sender;
use std::sync::mpsc::SendError;
use std::time::Duration;
use std::{io, thread};

/// What the previous poll saw.
#[derive(Debug, Default)]
struct Observed {
    configuration: Option<DisplayConfiguration>,
    internal_powered: Option<bool>,
    reading: Option<OrientationReading>,
}

fn internal_output(configuration: &DisplayConfiguration) -> Option<&OutputConfiguration> {
    configuration.outputs.iter().find(|output| {
        output.connected && Location::from_output_name(output.id.as_str()) == Location::Internal
    })
}

/// Polls `hardware` and the accelerometer on their own thread, reporting
/// changes only. The thread ends once the receiving event loop is gone.
pub(crate) fn spawn<H>(
    hardware: H,
    accelerometer: Option<Accelerometer>,
    interval: Duration,
    sender: Sender<HardwareEvent>,
) -> io::Result<thread::JoinHandle<()>>
where
    H: DisplayHardware + Send + 'static,
{
    thread::Builder::new()
        .name("display-monitor".to_string())
        .spawn(move || {
            let mut observed = Observed::default();
            while poll(&hardware, accelerometer.as_ref(), &mut observed, &sender).is_ok() {
                thread::sleep(interval);
            }
            log::debug!("Event loop is gone, stopping monitor");
        })
}

fn poll<H: DisplayHardware>(
    hardware: &H,
    accelerometer: Option<&Accelerometer>,
    observed: &mut Observed,
    sender: &Sender<HardwareEvent>,
) -> Result<(), SendError<HardwareEvent>> {
    match hardware.read_configuration() {
        Ok(configuration) if observed.configuration.as_ref() != Some(&configuration) => {
            log::debug!("Display configuration changed");
            let internal_powered = internal_output(&configuration)
                .map(|output| output.used && output.power_mode == PowerMode::On);
            sender.send(HardwareEvent::ConfigurationChanged(configuration.clone()))?;
            observed.configuration = Some(configuration);

            if observed.internal_powered != internal_powered {
                observed.internal_powered = internal_powered;
                if let Some(on) = internal_powered {
                    sender.send(HardwareEvent::DisplayPowerStateChanged { on })?;
                }
            }
        }
        Ok(_) => {}
        Err(err) => log::warn!("Unable to read display configuration: {err}"),
    }

    let Some(accelerometer) = accelerometer else {
        return Ok(());
    };
    match accelerometer.read() {
        Ok(reading) if observed.reading != Some(reading) => {
            observed.reading = Some(reading);
            let output_id = observed
                .configuration
                .as_ref()
                .and_then(internal_output)
                .map(|output| output.id.clone());
            if let Some(output_id) = output_id {
                sender.send(HardwareEvent::OrientationReading { output_id, reading })?;
            }
        }
        Ok(_) => {}
        Err(err) => log::warn!(
            "Unable to read accelerometer {}: {err}",
            accelerometer.device().display()
        ),
    }
    Ok(())
}
