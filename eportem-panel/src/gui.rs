use anyhow::{Context, Result};
use eframe::{egui, Frame};
use log::info;
use parking_lot::Mutex;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Runtime;

use crate::api::HttpApi;
use crate::config::Config;
use crate::model::FlagKey;
use crate::render::{RowControl, RowIntent};
use crate::store::ClientStateStore;
use crate::ui::UiHandles;

pub struct PanelGui {
    store: ClientStateStore<HttpApi>,
    runtime: Runtime,
}

/// What the user did during one frame; dispatched after the UI lock is released.
#[derive(Default)]
struct FrameActions {
    flags: Vec<FlagKey>,
    rows: Vec<RowIntent>,
    add: bool,
    refresh: bool,
}

impl PanelGui {
    pub fn new(
        cc: &eframe::CreationContext<'_>,
        store: ClientStateStore<HttpApi>,
        runtime: Runtime,
    ) -> Self {
        let gui = Self { store, runtime };

        let store = gui.store.clone();
        gui.spawn(&cc.egui_ctx, async move {
            store.fetch_state().await;
        });
        gui
    }

    /// Runs `task` off the UI thread and repaints once it is done.
    fn spawn<F>(&self, ctx: &egui::Context, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let ctx = ctx.clone();
        self.runtime.spawn(async move {
            task.await;
            ctx.request_repaint();
        });
    }

    fn draw(&self, ctx: &egui::Context, ui_state: &mut UiHandles) -> FrameActions {
        let mut actions = FrameActions::default();
        let blocked = ui_state.notice.is_some();

        egui::CentralPanel::default().show(ctx, |ui| {
            ui.add_enabled_ui(!blocked, |ui| {
                ui.heading("ePortem");
                ui.label(format!("Server: {}", self.store.api().base_url()));
                ui.separator();

                ui.strong("Settings");
                for key in FlagKey::ALL {
                    if ui
                        .checkbox(ui_state.settings.control_mut(key), key.label())
                        .changed()
                    {
                        actions.flags.push(key);
                    }
                }
                ui.separator();

                ui.strong("Schedule");
                egui::Grid::new("schedule")
                    .num_columns(4)
                    .striped(true)
                    .show(ui, |ui| {
                        ui.label("Time");
                        ui.label("Action");
                        ui.label("Enabled");
                        ui.label("");
                        ui.end_row();

                        for index in 0..ui_state.table.len() {
                            let row = &ui_state.table.rows()[index];
                            ui.label(row.time.as_str());
                            ui.label(row.action.as_str());

                            let clicked = ui_state
                                .table
                                .enabled_mut(index)
                                .is_some_and(|enabled| ui.checkbox(enabled, "").changed());
                            if clicked {
                                actions
                                    .rows
                                    .extend(ui_state.table.activate(index, RowControl::Enabled));
                            }
                            if ui.button("Remove").clicked() {
                                actions
                                    .rows
                                    .extend(ui_state.table.activate(index, RowControl::Remove));
                            }
                            ui.end_row();
                        }
                    });

                ui.horizontal(|ui| {
                    ui.add(
                        egui::TextEdit::singleline(&mut ui_state.new_time)
                            .hint_text("09:00")
                            .desired_width(60.0),
                    );
                    ui.add(
                        egui::TextEdit::singleline(&mut ui_state.new_action)
                            .hint_text("start_day")
                            .desired_width(160.0),
                    );
                    if ui.button("Add").clicked() {
                        actions.add = true;
                    }
                });
                ui.separator();

                ui.horizontal(|ui| {
                    if ui.button("Refresh").clicked() {
                        actions.refresh = true;
                    }
                    match ui_state.last_refresh {
                        Some(at) => ui.label(format!("Last refreshed {}", at.format("%H:%M:%S"))),
                        None => ui.label("Not loaded yet"),
                    };
                });

                if let Some(status) = &ui_state.status {
                    ui.colored_label(egui::Color32::LIGHT_RED, status.as_str());
                }
            });
        });

        if let Some(message) = ui_state.notice.clone() {
            egui::Window::new("Notice")
                .collapsible(false)
                .resizable(false)
                .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
                .show(ctx, |ui| {
                    ui.label(message);
                    if ui.button("OK").clicked() {
                        ui_state.notice = None;
                    }
                });
        }

        actions
    }
}

impl eframe::App for PanelGui {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut Frame) {
        let actions = {
            let mut ui_state = self.store.ui().lock();
            self.draw(ctx, &mut ui_state)
        };

        for key in actions.flags {
            let store = self.store.clone();
            self.spawn(ctx, async move { store.apply_control(key).await });
        }

        for intent in actions.rows {
            let store = self.store.clone();
            self.spawn(ctx, async move { store.dispatch(intent).await });
        }

        // The blank-field notice has to appear before anything is sent.
        if actions.add && self.store.validate_inputs() {
            let store = self.store.clone();
            self.spawn(ctx, async move { store.add_from_inputs().await });
        }

        if actions.refresh {
            let store = self.store.clone();
            self.spawn(ctx, async move {
                store.fetch_state().await;
            });
        }

        ctx.request_repaint_after(Duration::from_secs(1));
    }
}

pub fn run_gui_app(config: Config) -> Result<()> {
    let runtime = Runtime::new().context("Failed to create Tokio runtime")?;
    let api = HttpApi::new(&config)?;
    let store = ClientStateStore::new(api, Arc::new(Mutex::new(UiHandles::default())));

    info!("Opening panel for {}", config.server_url);

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([420.0, 560.0])
            .with_min_inner_size([360.0, 320.0]),
        ..Default::default()
    };

    eframe::run_native(
        "ePortem Panel",
        options,
        Box::new(move |cc| Ok(Box::new(PanelGui::new(cc, store, runtime)))),
    )
    .map_err(|e| anyhow::anyhow!("Failed to start GUI: {}", e))?;

    Ok(())
}
