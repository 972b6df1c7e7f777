use std::sync::Arc;

use tracing::info;

use super::event::Severity;
use crate::config::PopupConfig;
use crate::config::RendererKind;

/// How long a popup stays on screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Persistence {
    /// Dismissed by the renderer after its timeout
    AutoHide,
    /// Stays until the user dismisses it
    Sticky,
}

impl Persistence {
    pub fn from_auto_hide(auto_hide: bool) -> Self {
        if auto_hide {
            Persistence::AutoHide
        } else {
            Persistence::Sticky
        }
    }
}

/// A popup ready to be shown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Popup {
    pub title: String,
    pub body: String,
    pub style: Severity,
    pub persistence: Persistence,
}

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("renderer backend failed: {0}")]
    Backend(String),

    #[error("renderer '{0}' is not available in this build")]
    Unavailable(&'static str),
}

/// Trait for whatever shows popups to the user
///
/// Stacking and dismissal of overlapping popups are the renderer's business.
pub trait PopupRenderer: Send + Sync {
    fn render(&self, popup: &Popup) -> Result<(), RenderError>;
}

/// Build the renderer selected in configuration
pub fn create_renderer(config: &PopupConfig) -> Result<Arc<dyn PopupRenderer>, RenderError> {
    match config.renderer {
        RendererKind::Log => Ok(Arc::new(LogRenderer)),
        #[cfg(feature = "desktop")]
        RendererKind::Desktop => Ok(Arc::new(DesktopRenderer::new(config.auto_hide_ms))),
        #[cfg(not(feature = "desktop"))]
        RendererKind::Desktop => Err(RenderError::Unavailable("desktop")),
    }
}

/// Writes popups to the log.
#[derive(Debug, Default)]
pub struct LogRenderer;

impl PopupRenderer for LogRenderer {
    fn render(&self, popup: &Popup) -> Result<(), RenderError> {
        info!(
            title = %popup.title,
            style = %popup.style,
            sticky = popup.persistence == Persistence::Sticky,
            "{}",
            strip_markup(&popup.body).replace('\n', " | ")
        );
        Ok(())
    }
}

/// Drop `<...>` tags from a popup body. A `<` not closed by `>` before the
/// next `<` is kept as text.
pub fn strip_markup(body: &str) -> String {
    let mut out = String::with_capacity(body.len());
    let mut rest = body;
    while let Some(start) = rest.find('<') {
        out.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        match after.find(['<', '>']) {
            Some(end) if after[end..].starts_with('>') => rest = &after[end + 1..],
            _ => {
                out.push('<');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

/// Desktop notifications through the platform notification service.
#[cfg(feature = "desktop")]
pub struct DesktopRenderer {
    auto_hide_ms: u32,
}

#[cfg(feature = "desktop")]
impl DesktopRenderer {
    pub fn new(auto_hide_ms: u32) -> Self {
        Self { auto_hide_ms }
    }
}

#[cfg(feature = "desktop")]
impl PopupRenderer for DesktopRenderer {
    fn render(&self, popup: &Popup) -> Result<(), RenderError> {
        use notify_rust::Notification;
        use notify_rust::Timeout;

        let timeout = match popup.persistence {
            Persistence::Sticky => Timeout::Never,
            Persistence::AutoHide => Timeout::Milliseconds(self.auto_hide_ms),
        };

        let mut builder = Notification::new();
        builder
            .summary(&popup.title)
            .body(&popup.body)
            .appname("j18fs")
            .timeout(timeout);

        #[cfg(all(unix, not(target_os = "macos")))]
        {
            use notify_rust::Urgency;
            let urgency = match popup.style {
                Severity::Error => Urgency::Critical,
                Severity::Notice => Urgency::Low,
                _ => Urgency::Normal,
            };
            builder.urgency(urgency);
        }

        // show() talks to the notification daemon synchronously
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                runtime.spawn_blocking(move || {
                    if let Err(e) = builder.show() {
                        tracing::warn!("Desktop notification failed: {}", e);
                    }
                });
                Ok(())
            }
            Err(_) => {
                builder
                    .show()
                    .map_err(|e| RenderError::Backend(e.to_string()))?;
                Ok(())
            }
        }
    }
}

/// Renderer that records popups for assertions
#[cfg(test)]
#[derive(Debug, Default)]
pub struct RecordingRenderer {
    pub popups: std::sync::Mutex<Vec<Popup>>,
}

#[cfg(test)]
impl RecordingRenderer {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn rendered(&self) -> Vec<Popup> {
        self.popups.lock().unwrap().clone()
    }
}

#[cfg(test)]
impl PopupRenderer for RecordingRenderer {
    fn render(&self, popup: &Popup) -> Result<(), RenderError> {
        self.popups.lock().unwrap().push(popup.clone());
        Ok(())
    }
}
