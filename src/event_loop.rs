use crate::hardware::{DisplayConfiguration, DisplayHardware};
use crate::screen::{OrientationReading, OutputId};
use crate::screens_controller::{ConfigError, ScreensController};
use crate::screens_model::ScreensModel;
use crate::storage::ConfigStorage;
use calloop::channel::{self, Channel, Sender};
use calloop::{EventLoop as CalLoop, LoopSignal};

/// Something the hardware side observed, marshaled to the model thread.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum HardwareEvent {
    ConfigurationChanged(DisplayConfiguration),
    OrientationReading {
        output_id: OutputId,
        reading: OrientationReading,
    },
    DisplayPowerStateChanged {
        on: bool,
    },
}

/// Everything owned by the model thread.
pub(crate) struct DisplayState<H> {
    pub(crate) model: ScreensModel,
    pub(crate) controller: ScreensController<H>,
    storage: Option<ConfigStorage>,
}

impl<H: DisplayHardware> DisplayState<H> {
    pub(crate) fn new(hardware: H) -> Self {
        Self {
            model: ScreensModel::new(),
            controller: ScreensController::new(hardware),
            storage: None,
        }
    }

    /// Remembered options are applied to outputs connected from now on.
    pub(crate) fn set_storage(&mut self, storage: Option<ConfigStorage>) {
        self.storage = storage;
    }

    pub(crate) fn sync_from_hardware(&mut self) -> Result<(), ConfigError> {
        let configuration = self.controller.read_hardware()?;
        self.absorb(&configuration)
    }

    fn absorb(&mut self, configuration: &DisplayConfiguration) -> Result<(), ConfigError> {
        let changes = self.model.absorb_configuration(configuration);
        let result = self.process_notifications();
        for output_id in &changes.added {
            self.restore_stored_options(output_id);
        }
        result
    }

    fn restore_stored_options(&mut self, output_id: &OutputId) {
        let Some(storage) = &self.storage else {
            return;
        };
        let Some(screen) = self.model.screen(output_id) else {
            return;
        };
        let Some(identity) = screen.identity() else {
            log::debug!("{output_id}: no EDID identity, nothing to restore");
            return;
        };
        let display_id = identity.display_id();
        let Some(options) = storage.load(&display_id) else {
            return;
        };
        let Some(config) = options.to_config(screen.available_modes()) else {
            log::warn!("{output_id}: remembered mode of {display_id} is no longer offered");
            return;
        };

        match self.controller.set_configuration(output_id, &config) {
            Ok(()) => log::info!("{output_id}: restored options of {display_id}"),
            Err(err) => log::warn!("{output_id}: unable to restore options of {display_id}: {err}"),
        }
    }

    pub(crate) fn handle_event(&mut self, event: HardwareEvent) -> Result<(), ConfigError> {
        log::trace!("event = {event:?}");
        match event {
            HardwareEvent::ConfigurationChanged(configuration) => return self.absorb(&configuration),
            HardwareEvent::OrientationReading { output_id, reading } => {
                match self.model.screen_mut(&output_id) {
                    Some(screen) => screen.handle_orientation_reading(reading),
                    None => log::debug!("{output_id}: orientation reading for unknown screen"),
                }
            }
            HardwareEvent::DisplayPowerStateChanged { on } => {
                for screen in self.model.screens_mut() {
                    screen.on_display_power_state_changed(on);
                }
            }
        }
        self.process_notifications()
    }

    /// Drains the notification queue. A rejected change leaves the model ahead of
    /// the hardware, so the model is resynchronized before the first error is returned.
    pub(crate) fn process_notifications(&mut self) -> Result<(), ConfigError> {
        let mut first_error = None;

        while let Some(event) = self.model.next_notification() {
            log::debug!(
                "{}: {} changed ({:?})",
                event.output_id,
                event.change.field_name(),
                event.origin
            );
            self.model.notify_observers(&event);
            if let Err(err) = self.controller.handle_notification(&event) {
                log::warn!(
                    "{}: unable to apply {} change: {err}",
                    event.output_id,
                    event.change.field_name()
                );
                first_error.get_or_insert(err);
            }
        }

        let Some(err) = first_error else {
            return Ok(());
        };
        match self.controller.read_hardware() {
            Ok(configuration) => {
                self.model.absorb_configuration(&configuration);
                // Hardware-origin only, nothing is submitted.
                if let Err(resync_err) = self.process_notifications() {
                    log::error!("Resynchronization failed: {resync_err}");
                }
            }
            Err(resync_err) => log::error!("Unable to resynchronize: {resync_err}"),
        }
        Err(err)
    }
}

/// Model thread loop, fed by a channel of [`HardwareEvent`]s.
pub(crate) struct EventLoop<H: 'static> {
    event_loop: CalLoop<'static, DisplayState<H>>,
}

impl<H: DisplayHardware + 'static> EventLoop<H> {
    pub(crate) fn new() -> Result<(Self, Sender<HardwareEvent>), calloop::Error> {
        let event_loop = CalLoop::try_new()?;
        let (sender, channel): (Sender<HardwareEvent>, Channel<HardwareEvent>) = channel::channel();

        let signal: LoopSignal = event_loop.get_signal();
        event_loop
            .handle()
            .insert_source(channel, move |event, _, state: &mut DisplayState<H>| match event {
                channel::Event::Msg(event) => {
                    if let Err(err) = state.handle_event(event) {
                        log::warn!("Hardware event left the model resynchronized: {err}");
                    }
                }
                channel::Event::Closed => {
                    log::debug!("Hardware event channel closed");
                    signal.stop();
                }
            })
            .map_err(|err| err.error)?;

        Ok((Self { event_loop }, sender))
    }

    #[cfg(test)]
    pub(crate) fn dispatch(
        &mut self,
        timeout: Option<std::time::Duration>,
        state: &mut DisplayState<H>,
    ) -> Result<(), calloop::Error> {
        self.event_loop.dispatch(timeout, state)
    }

    /// Runs until every sender is dropped.
    pub(crate) fn run(&mut self, state: &mut DisplayState<H>) -> Result<(), calloop::Error> {
        log::debug!("Starting event loop");
        self.event_loop.run(None, state, |_| {})
    }
}
