use anyhow::Result;
use log::{debug, info, warn};
use parking_lot::Mutex;
use std::sync::Arc;

use crate::api::{Ack, StateApi};
use crate::model::{ApplicationState, EntryId, FlagKey, FlagUpdate, NewEntry};
use crate::render::RowIntent;
use crate::ui::UiHandles;

pub const MISSING_FIELDS_NOTICE: &str = "Please enter both time and action.";

/// Sends user intent to the server and then re-reads the whole state from
/// it. Nothing is applied locally ahead of the server's answer, and every
/// mutation is followed by a refresh whether or not the server accepted it.
pub struct ClientStateStore<A> {
    api: Arc<A>,
    ui: Arc<Mutex<UiHandles>>,
}

impl<A> Clone for ClientStateStore<A> {
    fn clone(&self) -> Self {
        Self {
            api: self.api.clone(),
            ui: self.ui.clone(),
        }
    }
}

impl<A: StateApi> ClientStateStore<A> {
    pub fn new(api: A, ui: Arc<Mutex<UiHandles>>) -> Self {
        Self {
            api: Arc::new(api),
            ui,
        }
    }

    pub fn ui(&self) -> &Arc<Mutex<UiHandles>> {
        &self.ui
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    /// On failure the UI keeps the last values it showed.
    pub async fn fetch_state(&self) -> Option<ApplicationState> {
        match self.api.fetch_state().await {
            Ok(state) => {
                self.ui.lock().show_state(&state);
                debug!("Refreshed {} schedule entries", state.schedule.len());
                Some(state)
            }
            Err(e) => {
                warn!("Failed to fetch state: {e:#}");
                self.ui.lock().status = Some(format!("Could not refresh: {e}"));
                None
            }
        }
    }

    pub async fn set_flag(&self, update: FlagUpdate) {
        let outcome = self.api.set_flag(update).await;
        self.report(&format!("update {}", update.key().as_str()), outcome);
        self.fetch_state().await;
    }

    /// Sends whatever the bound control for `key` currently shows.
    pub async fn apply_control(&self, key: FlagKey) {
        let update = self.ui.lock().settings.update_for(key);
        self.set_flag(update).await;
    }

    /// Checks the bound input fields without sending anything, raising the
    /// notice when one of them is blank.
    pub fn validate_inputs(&self) -> bool {
        let mut ui = self.ui.lock();
        if is_blank(&ui.new_time) || is_blank(&ui.new_action) {
            ui.notice = Some(MISSING_FIELDS_NOTICE.to_string());
            return false;
        }
        true
    }

    /// Blank fields raise a notice and send nothing.
    pub async fn add_entry(&self, time: &str, action: &str) {
        if is_blank(time) || is_blank(action) {
            info!("Not adding an entry without both time and action");
            self.ui.lock().notice = Some(MISSING_FIELDS_NOTICE.to_string());
            return;
        }
        let (time, action) = (time.trim(), action.trim());

        let outcome = self
            .api
            .add_entry(NewEntry {
                time: time.to_string(),
                action: action.to_string(),
            })
            .await;

        if self.report("add entry", outcome) {
            self.ui.lock().clear_inputs();
        }
        self.fetch_state().await;
    }

    pub async fn add_from_inputs(&self) {
        let (time, action) = {
            let ui = self.ui.lock();
            (ui.new_time.clone(), ui.new_action.clone())
        };
        self.add_entry(&time, &action).await;
    }

    pub async fn toggle_entry(&self, id: EntryId) {
        let outcome = self.api.toggle_entry(id).await;
        self.report(&format!("toggle entry {id}"), outcome);
        self.fetch_state().await;
    }

    pub async fn remove_entry(&self, id: EntryId) {
        let outcome = self.api.remove_entry(id).await;
        self.report(&format!("remove entry {id}"), outcome);
        self.fetch_state().await;
    }

    pub async fn dispatch(&self, intent: RowIntent) {
        match intent {
            RowIntent::Toggle(id) => self.toggle_entry(id).await,
            RowIntent::Remove(id) => self.remove_entry(id).await,
        }
    }

    /// Logs how a mutation went and returns whether the server answered.
    fn report(&self, what: &str, outcome: Result<Ack>) -> bool {
        match outcome {
            Ok(Ack::Accepted) => {
                debug!("Server accepted: {what}");
                true
            }
            Ok(Ack::Rejected(status)) => {
                warn!("Server refused to {what} (status {status})");
                true
            }
            Err(e) => {
                warn!("Could not {what}: {e:#}");
                self.ui.lock().status = Some(format!("Could not {what}: {e}"));
                false
            }
        }
    }
}

fn is_blank(field: &str) -> bool {
    field.trim().is_empty()
}
