mod dispatcher;
mod event;
mod renderer;

pub use dispatcher::NotificationDispatcher;
pub use event::is_status_broadcast;
pub use event::EventKind;
pub use event::NotificationEvent;
pub use event::Severity;
pub use renderer::create_renderer;
pub use renderer::strip_markup;
pub use renderer::LogRenderer;
pub use renderer::Persistence;
pub use renderer::Popup;
pub use renderer::PopupRenderer;
pub use renderer::RenderError;

#[cfg(feature = "desktop")]
pub use renderer::DesktopRenderer;

#[cfg(test)]
pub(crate) use renderer::RecordingRenderer;
