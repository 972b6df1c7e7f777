use std::sync::Arc;

use strum::IntoEnumIterator;
use tracing::debug;
use tracing::warn;
use url::Url;

use super::sensor::SensorChannel;
use super::sensor::StatusResponse;
use crate::notify::NotificationDispatcher;
use crate::notify::NotificationEvent;

/// Message shown when the status query fails for any reason.
pub const FAILURE_MESSAGE: &str = "Error";

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("status request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("invalid status URL: {0}")]
    Url(#[from] url::ParseError),
}

/// Build `<base>/plugin/<identity>/status`, keeping any path prefix on `base`.
pub fn status_url(base: &Url, identity: &str) -> Result<Url, FetchError> {
    let mut base = base.clone();
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    Ok(base.join(&format!("plugin/{}/status", identity))?)
}

/// Two-line summary of both sensor channels.
pub fn compose_message(response: &StatusResponse) -> String {
    SensorChannel::iter()
        .map(|channel| format!("{}: {}", channel.title(), response.reading(channel)))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Queries the host for sensor state and hands the result to the dispatcher.
///
/// Every call is a single attempt. Calls are independent, so overlapping
/// fetches each produce their own popup.
pub struct StatusFetcher {
    client: reqwest::Client,
    status_url: Url,
    dispatcher: Arc<NotificationDispatcher>,
}

impl StatusFetcher {
    pub fn new(
        client: reqwest::Client,
        base_url: &Url,
        dispatcher: Arc<NotificationDispatcher>,
    ) -> Result<Self, FetchError> {
        let status_url = status_url(base_url, dispatcher.identity())?;
        Ok(Self {
            client,
            status_url,
            dispatcher,
        })
    }

    pub fn status_url(&self) -> &Url {
        &self.status_url
    }

    /// Fetch sensor state and show it. Never fails; errors become an "Error" popup.
    pub async fn fetch_status(&self) {
        let identity = self.dispatcher.identity();

        let message = match self.query().await {
            Ok(response) => {
                for channel in SensorChannel::iter() {
                    debug!(
                        "[{}] {} = {}",
                        identity,
                        channel.key(),
                        response.reading(channel)
                    );
                }
                if let Some(tool) = response.active_tool() {
                    debug!("[{}] Active tool: {}", identity, tool);
                }
                compose_message(&response)
            }
            Err(e) => {
                warn!("[{}] Status query to {} failed: {}", identity, self.status_url, e);
                FAILURE_MESSAGE.to_string()
            }
        };

        self.dispatcher
            .handle(NotificationEvent::sticky_info(identity, message));
    }

    /// Issue the status request and decode the body
    pub async fn query(&self) -> Result<StatusResponse, FetchError> {
        debug!("Querying sensor status: {}", self.status_url);

        let response = self
            .client
            .get(self.status_url.clone())
            .send()
            .await?
            .error_for_status()?;

        Ok(response.json::<StatusResponse>().await?)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;
    use std::sync::atomic::Ordering;

    use axum::extract::State;
    use axum::http::StatusCode;
    use axum::routing::get;
    use axum::Json;
    use axum::Router;
    use serde_json::json;
    use tokio::net::TcpListener;

    use super::*;
    use crate::notify::Persistence;
    use crate::notify::RecordingRenderer;
    use crate::notify::Severity;

    const IDENTITY: &str = "Julia2018FilamentSensor";
    const STATUS_PATH: &str = "/plugin/Julia2018FilamentSensor/status";

    async fn serve(router: Router) -> Url {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        Url::parse(&format!("http://{}", addr)).unwrap()
    }

    fn fetcher(base: &Url, renderer: Arc<RecordingRenderer>) -> StatusFetcher {
        let dispatcher = Arc::new(NotificationDispatcher::new(
            IDENTITY,
            "Julia 2018 Filament Sensor",
            renderer,
        ));
        StatusFetcher::new(reqwest::Client::new(), base, dispatcher).unwrap()
    }

    fn response(value: serde_json::Value) -> StatusResponse {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_compose_message_all_codes() {
        let message = compose_message(&response(json!({"filament": "-1", "filament2": "0"})));
        insta::assert_snapshot!(message, @r"
        Filament 1: Sensor not used
        Filament 2: No filament detected
        ");
    }

    #[test]
    fn test_compose_message_missing_channel_is_error() {
        let message = compose_message(&response(json!({"filament": "1"})));
        assert_eq!(message, "Filament 1: Filament detected\nFilament 2: Error");
    }

    #[test]
    fn test_compose_message_empty_response() {
        let message = compose_message(&StatusResponse::default());
        insta::assert_snapshot!(message, @r"
        Filament 1: Error
        Filament 2: Error
        ");
    }

    #[test]
    fn test_status_url() {
        let base = Url::parse("http://octopi.local").unwrap();
        assert_eq!(
            status_url(&base, IDENTITY).unwrap().as_str(),
            "http://octopi.local/plugin/Julia2018FilamentSensor/status"
        );

        let prefixed = Url::parse("http://proxy.lan/octoprint").unwrap();
        assert_eq!(
            status_url(&prefixed, IDENTITY).unwrap().as_str(),
            "http://proxy.lan/octoprint/plugin/Julia2018FilamentSensor/status"
        );
    }

    #[tokio::test]
    async fn test_fetch_status_success() {
        let router = Router::new().route(
            STATUS_PATH,
            get(|| async { Json(json!({"filament": "1", "filament2": "-1", "active_tool": 0})) }),
        );
        let base = serve(router).await;
        let renderer = RecordingRenderer::new();

        fetcher(&base, renderer.clone()).fetch_status().await;

        let rendered = renderer.rendered();
        assert_eq!(rendered.len(), 1);
        assert_eq!(
            rendered[0].body,
            "Filament 1: Filament detected\nFilament 2: Sensor not used"
        );
        assert_eq!(rendered[0].style, Severity::Info);
        assert_eq!(rendered[0].persistence, Persistence::Sticky);
    }

    #[tokio::test]
    async fn test_fetch_status_partial_response() {
        let router = Router::new().route(STATUS_PATH, get(|| async { Json(json!({"filament": "1"})) }));
        let base = serve(router).await;
        let renderer = RecordingRenderer::new();

        fetcher(&base, renderer.clone()).fetch_status().await;

        assert_eq!(
            renderer.rendered()[0].body,
            "Filament 1: Filament detected\nFilament 2: Error"
        );
    }

    #[tokio::test]
    async fn test_fetch_status_transport_failure() {
        // Bind and immediately release a port so nothing is listening on it
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let base = Url::parse(&format!("http://{}", addr)).unwrap();
        let renderer = RecordingRenderer::new();

        fetcher(&base, renderer.clone()).fetch_status().await;

        let rendered = renderer.rendered();
        assert_eq!(rendered.len(), 1);
        assert_eq!(rendered[0].body, "Error");
        assert_eq!(rendered[0].style, Severity::Info);
        assert_eq!(rendered[0].persistence, Persistence::Sticky);
    }

    #[tokio::test]
    async fn test_fetch_status_http_error() {
        let router = Router::new().route(
            STATUS_PATH,
            get(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "boom") }),
        );
        let base = serve(router).await;
        let renderer = RecordingRenderer::new();

        fetcher(&base, renderer.clone()).fetch_status().await;

        assert_eq!(renderer.rendered()[0].body, "Error");
    }

    #[tokio::test]
    async fn test_fetch_status_not_json() {
        let router = Router::new().route(STATUS_PATH, get(|| async { "<html>login</html>" }));
        let base = serve(router).await;
        let renderer = RecordingRenderer::new();

        fetcher(&base, renderer.clone()).fetch_status().await;

        assert_eq!(renderer.rendered()[0].body, "Error");
    }

    #[tokio::test]
    async fn test_fetch_status_array_body() {
        let router = Router::new().route(STATUS_PATH, get(|| async { Json(json!(["1", "0"])) }));
        let base = serve(router).await;
        let renderer = RecordingRenderer::new();

        fetcher(&base, renderer.clone()).fetch_status().await;

        let rendered = renderer.rendered();
        assert_eq!(rendered.len(), 1);
        assert_eq!(rendered[0].body, "Error");
    }

    async fn counted_status(State(hits): State<Arc<AtomicUsize>>) -> (StatusCode, Json<serde_json::Value>) {
        // Alternates 500 and success, starting with 500
        let n = hits.fetch_add(1, Ordering::SeqCst);
        if n % 2 == 0 {
            (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({})))
        } else {
            (StatusCode::OK, Json(json!({"filament": "1", "filament2": "1"})))
        }
    }

    #[tokio::test]
    async fn test_fetch_status_is_single_attempt() {
        let hits = Arc::new(AtomicUsize::new(0));
        let router = Router::new()
            .route(STATUS_PATH, get(counted_status))
            .with_state(hits.clone());
        let base = serve(router).await;
        let renderer = RecordingRenderer::new();
        let fetcher = fetcher(&base, renderer.clone());

        fetcher.fetch_status().await;
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(renderer.rendered()[0].body, "Error");

        fetcher.fetch_status().await;
        assert_eq!(hits.load(Ordering::SeqCst), 2);
        assert_eq!(
            renderer.rendered()[1].body,
            "Filament 1: Filament detected\nFilament 2: Filament detected"
        );
    }

    #[tokio::test]
    async fn test_query_returns_raw_response() {
        let router = Router::new().route(
            STATUS_PATH,
            get(|| async { Json(json!({"filament": 1, "filament2": "0"})) }),
        );
        let base = serve(router).await;

        let response = fetcher(&base, RecordingRenderer::new()).query().await.unwrap();
        assert_eq!(response.reading(SensorChannel::Filament1).label(), "Error");
        assert_eq!(
            response.reading(SensorChannel::Filament2).label(),
            "No filament detected"
        );
    }
}
