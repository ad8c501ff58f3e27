use crate::hardware::DisplayConfiguration;
use crate::screen::{NotificationQueue, OutputId, Screen, ScreenEvent};
use crate::screens_controller::ConfigError;

/// Outputs that appeared or disappeared during one absorb.
#[derive(Debug, Default, PartialEq, Eq)]
pub(crate) struct ModelChanges {
    pub(crate) added: Vec<OutputId>,
    pub(crate) removed: Vec<OutputId>,
}

type Observer = Box<dyn FnMut(&ScreenEvent)>;

/// The connected screens, in hardware order.
pub(crate) struct ScreensModel {
    screens: Vec<Screen>,
    notifications: NotificationQueue,
    observers: Vec<Observer>,
}

impl ScreensModel {
    pub(crate) fn new() -> Self {
        Self {
            screens: Vec::new(),
            notifications: NotificationQueue::default(),
            observers: Vec::new(),
        }
    }

    pub(crate) fn screens(&self) -> &[Screen] {
        &self.screens
    }

    pub(crate) fn screens_mut(&mut self) -> impl Iterator<Item = &mut Screen> {
        self.screens.iter_mut()
    }

    pub(crate) fn screen(&self, output_id: &OutputId) -> Option<&Screen> {
        self.screens
            .iter()
            .find(|screen| screen.output_id() == output_id)
    }

    pub(crate) fn screen_mut(&mut self, output_id: &OutputId) -> Option<&mut Screen> {
        self.screens
            .iter_mut()
            .find(|screen| screen.output_id() == output_id)
    }

    /// Reconciles the screen set with a hardware snapshot. Connected outputs get
    /// a screen, everything else loses it.
    pub(crate) fn absorb_configuration(&mut self, configuration: &DisplayConfiguration) -> ModelChanges {
        let mut changes = ModelChanges::default();

        self.screens.retain(|screen| {
            let connected = configuration
                .output(screen.output_id())
                .is_some_and(|output| output.connected);
            if !connected {
                log::info!("{} disconnected", screen.output_id());
                changes.removed.push(screen.output_id().clone());
            }
            connected
        });

        for output in configuration.outputs.iter().filter(|output| output.connected) {
            match self
                .screens
                .iter_mut()
                .find(|screen| *screen.output_id() == output.id)
            {
                Some(screen) => screen.absorb_hardware_snapshot(output),
                None => {
                    log::info!("{} connected", output.id);
                    self.screens
                        .push(Screen::new(output, self.notifications.clone()));
                    changes.added.push(output.id.clone());
                }
            }
        }

        changes
    }

    /// Makes `output_id` the only active screen.
    pub(crate) fn activate(&mut self, output_id: &OutputId) -> Result<(), ConfigError> {
        if self.screen(output_id).is_none() {
            return Err(ConfigError::UnknownOutput(output_id.clone()));
        }
        for screen in &mut self.screens {
            if screen.output_id() != output_id {
                screen.set_active(false);
            }
        }
        if let Some(screen) = self.screen_mut(output_id) {
            screen.set_active(true);
        }
        Ok(())
    }

    pub(crate) fn next_notification(&mut self) -> Option<ScreenEvent> {
        self.notifications.pop()
    }

    pub(crate) fn subscribe(&mut self, observer: impl FnMut(&ScreenEvent) + 'static) {
        self.observers.push(Box::new(observer));
    }

    pub(crate) fn notify_observers(&mut self, event: &ScreenEvent) {
        for observer in &mut self.observers {
            observer(event);
        }
    }
}
