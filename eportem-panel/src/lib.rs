pub mod api;
pub mod config;
pub mod gui;
pub mod model;
pub mod render;
pub mod store;
pub mod ui;
