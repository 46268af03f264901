pub mod alarm;
pub mod game;
pub mod models;
pub mod settings;
