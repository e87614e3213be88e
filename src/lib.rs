pub mod commands;
pub mod config;
pub mod gateway;
pub mod player;

/// Process-wide state handed to every event.
pub struct Data {
    pub config: config::Config,
    pub dispatcher: commands::Dispatcher,
}

pub type Error = Box<dyn std::error::Error + Send + Sync>;
