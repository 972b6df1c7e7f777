use std::sync::Arc;

use serde_json::Value;
use tracing::debug;
use tracing::trace;
use tracing::warn;

use super::event::is_status_broadcast;
use super::event::EventKind;
use super::event::NotificationEvent;
use super::renderer::Persistence;
use super::renderer::Popup;
use super::renderer::PopupRenderer;
use crate::host::PluginMessageHandler;

/// Filters notification events down to this widget's popups and renders them.
///
/// The host's plugin message channel is shared by every plugin, so events from
/// other plugins and non-popup payloads are expected traffic, not errors.
pub struct NotificationDispatcher {
    identity: String,
    display_name: String,
    renderer: Arc<dyn PopupRenderer>,
}

impl NotificationDispatcher {
    pub fn new(
        identity: impl Into<String>,
        display_name: impl Into<String>,
        renderer: Arc<dyn PopupRenderer>,
    ) -> Self {
        Self {
            identity: identity.into(),
            display_name: display_name.into(),
            renderer,
        }
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    /// Render `event` if it is a popup addressed to this widget.
    pub fn handle(&self, event: NotificationEvent) {
        if event.origin_plugin != self.identity {
            trace!("Ignoring message from {}", event.origin_plugin);
            return;
        }

        if let EventKind::Other(kind) = &event.kind {
            trace!("[{}] Ignoring non-popup message (type {:?})", self.identity, kind);
            return;
        }

        let popup = Popup {
            title: self.display_name.clone(),
            body: event.message,
            style: event.severity,
            persistence: Persistence::from_auto_hide(event.auto_hide),
        };

        debug!(
            "[{}] Rendering {} popup ({:?})",
            self.identity, popup.style, popup.persistence
        );

        if let Err(e) = self.renderer.render(&popup) {
            warn!("[{}] Failed to render popup: {}", self.identity, e);
        }
    }
}

impl PluginMessageHandler for NotificationDispatcher {
    fn on_plugin_message(&self, plugin: &str, payload: &Value) {
        if plugin == self.identity && is_status_broadcast(payload) {
            debug!("[{}] Status broadcast: {}", self.identity, payload);
        }

        self.handle(NotificationEvent::from_push(plugin, payload));
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::notify::event::Severity;
    use crate::notify::renderer::RecordingRenderer;

    const IDENTITY: &str = "Julia2018FilamentSensor";

    fn dispatcher(renderer: Arc<RecordingRenderer>) -> NotificationDispatcher {
        NotificationDispatcher::new(IDENTITY, "Julia 2018 Filament Sensor", renderer)
    }

    fn popup_event(origin: &str) -> NotificationEvent {
        NotificationEvent {
            origin_plugin: origin.to_string(),
            kind: EventKind::Popup,
            message: "X".to_string(),
            severity: Severity::Info,
            auto_hide: false,
        }
    }

    #[test]
    fn test_renders_matching_popup() {
        let renderer = RecordingRenderer::new();
        dispatcher(renderer.clone()).handle(popup_event(IDENTITY));

        let rendered = renderer.rendered();
        assert_eq!(rendered.len(), 1);
        assert_eq!(rendered[0].title, "Julia 2018 Filament Sensor");
        assert_eq!(rendered[0].body, "X");
        assert_eq!(rendered[0].style, Severity::Info);
        assert_eq!(rendered[0].persistence, Persistence::Sticky);
    }

    #[test]
    fn test_ignores_other_origin() {
        let renderer = RecordingRenderer::new();
        let dispatcher = dispatcher(renderer.clone());

        dispatcher.handle(popup_event("SomeOtherPlugin"));
        dispatcher.handle(popup_event("julia2018filamentsensor"));
        dispatcher.handle(NotificationEvent {
            kind: EventKind::Other("status".to_string()),
            ..popup_event("SomeOtherPlugin")
        });

        assert!(renderer.rendered().is_empty());
    }

    #[test]
    fn test_ignores_non_popup_kind() {
        let renderer = RecordingRenderer::new();
        let dispatcher = dispatcher(renderer.clone());

        dispatcher.handle(NotificationEvent {
            kind: EventKind::Other("info".to_string()),
            ..popup_event(IDENTITY)
        });
        dispatcher.handle(NotificationEvent {
            kind: EventKind::Other(String::new()),
            ..popup_event(IDENTITY)
        });

        assert!(renderer.rendered().is_empty());
    }

    #[test]
    fn test_auto_hide_maps_to_persistence() {
        let renderer = RecordingRenderer::new();
        dispatcher(renderer.clone()).handle(NotificationEvent {
            auto_hide: true,
            ..popup_event(IDENTITY)
        });

        assert_eq!(renderer.rendered()[0].persistence, Persistence::AutoHide);
    }

    #[test]
    fn test_plugin_message_defaults() {
        let renderer = RecordingRenderer::new();
        dispatcher(renderer.clone())
            .on_plugin_message(IDENTITY, &json!({"type": "popup", "msg": "Settings saved!"}));

        let rendered = renderer.rendered();
        assert_eq!(rendered.len(), 1);
        assert_eq!(rendered[0].body, "Settings saved!");
        assert_eq!(rendered[0].style, Severity::Info);
        assert_eq!(rendered[0].persistence, Persistence::AutoHide);
    }

    #[test]
    fn test_plugin_message_status_broadcast_is_dropped() {
        let renderer = RecordingRenderer::new();
        dispatcher(renderer.clone()).on_plugin_message(
            IDENTITY,
            &json!({"filament": "0", "filament2": "-1", "active_tool": 0}),
        );

        assert!(renderer.rendered().is_empty());
    }

    #[test]
    fn test_plugin_message_from_other_plugin() {
        let renderer = RecordingRenderer::new();
        dispatcher(renderer.clone())
            .on_plugin_message("softwareupdate", &json!({"type": "popup", "msg": "Update"}));

        assert!(renderer.rendered().is_empty());
    }
}
