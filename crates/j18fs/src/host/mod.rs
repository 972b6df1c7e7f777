//! Everything the host application provides or expects: its settings tree,
//! the plugin message channel, and the widget lifecycle it drives.

mod router;
mod settings;
mod socket;
mod widget;

pub use router::MessageRouter;
pub use router::PluginMessage;
pub use router::PluginMessageHandler;
pub use router::PluginMessageReceiver;
pub use router::PluginMessageSender;
pub use router::Subscription;
pub use settings::HostSettings;
pub use settings::PinMode;
pub use settings::PluginSettings;
pub use socket::parse_frame;
pub use socket::run_push_socket;
pub use socket::socket_url;
pub use socket::PushClient;
pub use socket::SocketError;
#[cfg(feature = "push_socket")]
pub use socket::WebSocketPushClient;
pub use widget::FilamentWidget;
pub use widget::Registration;
pub use widget::ANCHORS;
pub use widget::DEPENDENCIES;
