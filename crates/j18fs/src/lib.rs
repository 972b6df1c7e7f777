pub mod api;
pub mod config;
pub mod host;
pub mod notify;
pub mod status;

pub use config::Config;
pub use config::ConfigError;
pub use config::LogLevel;
pub use host::FilamentWidget;
pub use host::MessageRouter;
pub use notify::NotificationDispatcher;
pub use notify::NotificationEvent;
pub use status::SensorReading;
pub use status::StatusFetcher;
