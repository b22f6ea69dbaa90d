pub mod blinker;
pub mod models;
pub mod settings;
