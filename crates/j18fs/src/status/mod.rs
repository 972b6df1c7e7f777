mod fetcher;
mod sensor;

pub use fetcher::compose_message;
pub use fetcher::status_url;
pub use fetcher::FetchError;
pub use fetcher::StatusFetcher;
pub use fetcher::FAILURE_MESSAGE;
pub use sensor::SensorChannel;
pub use sensor::SensorReading;
pub use sensor::StatusResponse;
