use std::sync::Arc;
use std::sync::Mutex;
use std::sync::OnceLock;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::info;
use tracing::warn;
use url::Url;

use super::router::MessageRouter;
use super::router::Subscription;
use super::settings::HostSettings;
use super::settings::PluginSettings;
use crate::config::WidgetConfig;
use crate::notify::NotificationDispatcher;
use crate::notify::PopupRenderer;
use crate::status::FetchError;
use crate::status::StatusFetcher;

/// Host services the widget asks to be handed at construction.
pub const DEPENDENCIES: &[&str] = &["settingsViewModel"];

/// Settings-page anchors the widget binds to.
pub const ANCHORS: &[&str] = &["#settings_j18fs"];

/// What the widget declares to the host when it registers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registration {
    pub identity: String,
    pub dependencies: Vec<String>,
    pub anchors: Vec<String>,
}

/// Filament sensor status widget.
///
/// Constructed once with everything the host provides, then driven through
/// `register`, `on_before_binding` and `teardown`.
pub struct FilamentWidget {
    registration: Registration,
    host_settings: Arc<HostSettings>,
    dispatcher: Arc<NotificationDispatcher>,
    fetcher: Arc<StatusFetcher>,
    /// Captured at bind time, read-only afterwards
    plugin_settings: OnceLock<Arc<PluginSettings>>,
    subscription: Mutex<Option<Subscription>>,
    poller: Mutex<Option<JoinHandle<()>>>,
}

impl FilamentWidget {
    pub fn new(
        config: &WidgetConfig,
        base_url: &Url,
        host_settings: Arc<HostSettings>,
        renderer: Arc<dyn PopupRenderer>,
        client: reqwest::Client,
    ) -> Result<Self, FetchError> {
        let dispatcher = Arc::new(NotificationDispatcher::new(
            config.identity.clone(),
            config.display_name.clone(),
            renderer,
        ));
        let fetcher = Arc::new(StatusFetcher::new(client, base_url, dispatcher.clone())?);

        Ok(Self {
            registration: Registration {
                identity: config.identity.clone(),
                dependencies: DEPENDENCIES.iter().map(|s| s.to_string()).collect(),
                anchors: ANCHORS.iter().map(|s| s.to_string()).collect(),
            },
            host_settings,
            dispatcher,
            fetcher,
            plugin_settings: OnceLock::new(),
            subscription: Mutex::new(None),
            poller: Mutex::new(None),
        })
    }

    pub fn identity(&self) -> &str {
        &self.registration.identity
    }

    pub fn registration(&self) -> &Registration {
        &self.registration
    }

    pub fn dispatcher(&self) -> &Arc<NotificationDispatcher> {
        &self.dispatcher
    }

    /// Plugin settings captured by `on_before_binding`
    pub fn plugin_settings(&self) -> Option<Arc<PluginSettings>> {
        self.plugin_settings.get().cloned()
    }

    /// Subscribe the dispatcher to pushed plugin messages.
    pub fn register(&self, router: &MessageRouter) {
        let subscription = router.subscribe(self.dispatcher.clone());
        if let Ok(mut slot) = self.subscription.lock() {
            // Replacing an older subscription drops it, which unsubscribes
            *slot = Some(subscription);
        }
        info!(
            "[{}] Registered (dependencies: {:?}, anchors: {:?})",
            self.identity(),
            self.registration.dependencies,
            self.registration.anchors
        );
    }

    /// Capture the plugin's host settings, then fetch status once.
    pub async fn on_before_binding(&self) {
        info!(
            "[{}] Binding, status endpoint {}",
            self.identity(),
            self.fetcher.status_url()
        );

        let settings = match self.host_settings.plugin_settings(self.identity()) {
            Ok(settings) => settings,
            Err(e) => {
                warn!(
                    "[{}] Invalid plugin settings, using defaults: {}",
                    self.identity(),
                    e
                );
                PluginSettings::default()
            }
        };

        if !settings.has_pin() {
            info!("[{}] Sensor 1 pin not configured", self.identity());
        }
        if !settings.has_pin2() {
            info!("[{}] Sensor 2 pin not configured", self.identity());
        }

        info!(
            "[{}] Pin numbering: {}",
            self.identity(),
            settings.mode.as_str()
        );

        if self.plugin_settings.set(Arc::new(settings)).is_err() {
            warn!("[{}] Already bound, keeping first settings", self.identity());
        }

        self.fetcher.fetch_status().await;
    }

    /// Fetch status now
    pub async fn refresh(&self) {
        self.fetcher.fetch_status().await;
    }

    /// Fetch status in the background; overlapping refreshes are not coalesced.
    pub fn spawn_refresh(&self) -> JoinHandle<()> {
        let fetcher = self.fetcher.clone();
        tokio::spawn(async move { fetcher.fetch_status().await })
    }

    /// Fetch status every `period`, starting one period from now.
    pub fn start_polling(&self, period: Duration) {
        let fetcher = self.fetcher.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                fetcher.fetch_status().await;
            }
        });

        if let Ok(mut slot) = self.poller.lock() {
            if let Some(previous) = slot.replace(handle) {
                previous.abort();
            }
        }
        info!("[{}] Polling status every {:?}", self.identity(), period);
    }

    /// Unsubscribe from the router and stop polling.
    pub fn teardown(&self) {
        if let Ok(mut slot) = self.subscription.lock() {
            if let Some(subscription) = slot.take() {
                subscription.unsubscribe();
            }
        }
        if let Ok(mut slot) = self.poller.lock() {
            if let Some(handle) = slot.take() {
                handle.abort();
            }
        }
        info!("[{}] Torn down", self.identity());
    }
}

impl Drop for FilamentWidget {
    fn drop(&mut self) {
        if let Ok(mut slot) = self.poller.lock() {
            if let Some(handle) = slot.take() {
                handle.abort();
            }
        }
    }
}
