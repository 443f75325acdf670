use chrono::{DateTime, Local};

use crate::model::{ApplicationState, FlagKey, FlagUpdate, Location};
use crate::render::{render, ScheduleTable};

/// Raw state of the five settings checkboxes. Clicks write here directly;
/// the next refresh overwrites whatever the server disagrees with.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SettingsControls {
    pub updates: bool,
    pub office: bool,
    pub telegram: bool,
    pub slack: bool,
    pub slack_status: bool,
}

impl SettingsControls {
    pub fn apply(&mut self, state: &ApplicationState) {
        self.updates = state.updates_enabled;
        self.office = state.location == Location::Office;
        self.telegram = state.telegram_enabled;
        self.slack = state.slack_enabled;
        self.slack_status = state.slack_status_enabled;
    }

    pub fn control_mut(&mut self, key: FlagKey) -> &mut bool {
        match key {
            FlagKey::UpdatesEnabled => &mut self.updates,
            FlagKey::Location => &mut self.office,
            FlagKey::TelegramEnabled => &mut self.telegram,
            FlagKey::SlackEnabled => &mut self.slack,
            FlagKey::SlackStatusEnabled => &mut self.slack_status,
        }
    }

    /// The update the control for `key` currently asks for.
    pub fn update_for(&self, key: FlagKey) -> FlagUpdate {
        match key {
            FlagKey::UpdatesEnabled => FlagUpdate::Updates(self.updates),
            FlagKey::Location => FlagUpdate::Location(if self.office {
                Location::Office
            } else {
                Location::Home
            }),
            FlagKey::TelegramEnabled => FlagUpdate::Telegram(self.telegram),
            FlagKey::SlackEnabled => FlagUpdate::Slack(self.slack),
            FlagKey::SlackStatusEnabled => FlagUpdate::SlackStatus(self.slack_status),
        }
    }

    pub fn describe(&self, key: FlagKey) -> String {
        match self.update_for(key) {
            FlagUpdate::Location(location) => location.to_string(),
            FlagUpdate::Updates(on)
            | FlagUpdate::Telegram(on)
            | FlagUpdate::Slack(on)
            | FlagUpdate::SlackStatus(on) => (if on { "on" } else { "off" }).to_string(),
        }
    }
}

/// Everything on screen that a refresh or a user action touches.
#[derive(Debug, Clone, Default)]
pub struct UiHandles {
    pub settings: SettingsControls,
    pub table: ScheduleTable,
    pub new_time: String,
    pub new_action: String,
    /// Blocking message the user has to dismiss.
    pub notice: Option<String>,
    /// Non-blocking line for transport problems.
    pub status: Option<String>,
    pub last_refresh: Option<DateTime<Local>>,
}

impl UiHandles {
    /// Replaces every bound control with the fetched state.
    pub fn show_state(&mut self, state: &ApplicationState) {
        self.settings.apply(state);
        render(&mut self.table, &state.schedule);
        self.status = None;
        self.last_refresh = Some(Local::now());
    }

    pub fn clear_inputs(&mut self) {
        self.new_time.clear();
        self.new_action.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(location: Location) -> ApplicationState {
        ApplicationState {
            updates_enabled: true,
            location,
            telegram_enabled: false,
            slack_enabled: true,
            slack_status_enabled: false,
            schedule: Vec::new(),
        }
    }

    #[test]
    fn location_checkbox_means_office() {
        let mut controls = SettingsControls::default();

        controls.apply(&state(Location::Office));
        assert!(controls.office);
        assert_eq!(
            controls.update_for(FlagKey::Location),
            FlagUpdate::Location(Location::Office)
        );

        *controls.control_mut(FlagKey::Location) = false;
        assert_eq!(
            controls.update_for(FlagKey::Location),
            FlagUpdate::Location(Location::Home)
        );
    }

    #[test]
    fn show_state_overwrites_raw_clicks_and_status() {
        let mut ui = UiHandles {
            status: Some("Server unreachable".into()),
            ..UiHandles::default()
        };
        *ui.settings.control_mut(FlagKey::TelegramEnabled) = true;

        ui.show_state(&state(Location::Home));

        assert!(!ui.settings.telegram);
        assert!(ui.settings.slack);
        assert!(ui.status.is_none());
        assert!(ui.last_refresh.is_some());
    }
}
