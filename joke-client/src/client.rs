use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use joke_limit::FixedWindow;
use joke_limit::Reservoir;
use joke_limit::Strategy;
use opentelemetry::KeyValue;
use opentelemetry::global;
use opentelemetry::metrics::Counter;
use reqwest::header;
use tower::BoxError;
use tower::ServiceBuilder;
use tower::ServiceExt;
use tower::util::BoxCloneSyncService;
use url::Url;

use crate::config::AdmissionConfig;
use crate::config::ClientConfig;
use crate::config::DEFAULT_BASE_URL;
use crate::config::DEFAULT_TIMEOUT;
use crate::config::DEFAULT_USER_AGENT;
use crate::error::ConfigError;
use crate::error::JokeError;
use crate::http::JokeApiService;
use crate::joke::Joke;
use crate::joke::JokeResponse;
use crate::layer::AdmissionLayer;
use crate::options::FetchOptions;
use crate::scheduler::Scheduler;

type JokeService = BoxCloneSyncService<reqwest::Request, JokeResponse, BoxError>;

/// How a client decides whether a request may go out.
#[derive(Debug, Clone)]
enum Admission {
    /// Ask the strategy, fail with `AdmissionDenied` when it refuses.
    Immediate(Arc<dyn Strategy>),
    /// Queue behind a single worker that waits on the reservoir.
    Scheduled(Arc<Reservoir>),
}

/// A client for the JokeAPI.
///
/// Each client owns its admission budget; clones share it. There is no
/// process-wide instance: construct one with [`JokeClient::builder`] or
/// [`JokeClient::from_config`] and pass it where it is needed.
///
/// Every fetch resolves to exactly one of a [`JokeResponse`] or a
/// [`JokeError`]. Nothing is retried.
#[derive(Clone)]
pub struct JokeClient {
    base_url: Url,
    timeout: Duration,
    http: reqwest::Client,
    service: JokeService,
    limiter: Arc<dyn Strategy>,
    scheduler: Option<Scheduler<reqwest::Request, JokeResponse>>,
    requests: Counter<u64>,
}

impl fmt::Debug for JokeClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JokeClient")
            .field("base_url", &self.base_url.as_str())
            .field("timeout", &self.timeout)
            .field("limiter", &self.limiter)
            .field("scheduler", &self.scheduler)
            .finish()
    }
}

impl JokeClient {
    pub fn builder() -> JokeClientBuilder {
        JokeClientBuilder::default()
    }

    /// A client with every setting at its default.
    pub fn new() -> Result<Self, ConfigError> {
        Self::builder().build()
    }

    /// Builds a client from deserialized settings.
    ///
    /// A scheduled configuration spawns a worker, so it must be used from
    /// within a Tokio runtime.
    pub fn from_config(config: &ClientConfig) -> Result<Self, ConfigError> {
        let builder = JokeClient::builder()
            .with_base_url(&config.base_url)
            .with_timeout(config.timeout())
            .with_user_agent(&config.user_agent);

        let builder = match config.admission {
            AdmissionConfig::FixedWindow {
                capacity,
                window_ms,
            } => builder.with_fixed_window(capacity, Duration::from_millis(window_ms)),
            AdmissionConfig::Scheduled {
                capacity,
                window_ms,
                min_spacing_ms,
            } => builder.with_scheduler(
                capacity,
                Duration::from_millis(window_ms),
                Duration::from_millis(min_spacing_ms),
            ),
        };

        builder.build()
    }

    /// Fetches jokes matching `options`.
    ///
    /// The request is admitted before anything is sent. The whole exchange,
    /// including any time spent queued, must fit in the call's time budget:
    /// `options.timeout`, or the client default. When the budget runs out
    /// the in-flight request is dropped and the call fails with
    /// [`JokeError::Timeout`]. An admitted request that times out has still
    /// used up its admission.
    pub async fn fetch(&self, options: &FetchOptions) -> Result<JokeResponse, JokeError> {
        let url = options.to_url(&self.base_url);
        let budget = options.timeout.unwrap_or(self.timeout);
        let request = self.http.get(url.clone()).build()?;

        let outcome = match tokio::time::timeout(budget, self.service.clone().oneshot(request)).await
        {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(err)) => Err(JokeError::from(err)),
            Err(_) => Err(JokeError::Timeout { budget }),
        };

        let kind = match &outcome {
            Ok(_) => "success",
            Err(err) => {
                tracing::warn!(%url, error = %err, "JokeAPI request failed");
                err.kind()
            }
        };
        self.requests.add(1, &[KeyValue::new("outcome", kind)]);

        outcome
    }

    /// One joke from any category.
    pub async fn random(&self) -> Result<Joke, JokeError> {
        self.fetch_one(&FetchOptions::new()).await
    }

    /// One joke that carries none of the sensitive flags.
    pub async fn safe(&self) -> Result<Joke, JokeError> {
        self.fetch_one(&FetchOptions::safe()).await
    }

    /// Up to `amount` jokes from any category, in the order served.
    pub async fn batch(&self, amount: u8) -> Result<Vec<Joke>, JokeError> {
        let options = FetchOptions::new().with_amount(amount);
        Ok(self.fetch(&options).await?.into_jokes())
    }

    /// Fetches and formats jokes, one per paragraph.
    pub async fn fetch_text(&self, options: &FetchOptions) -> Result<String, JokeError> {
        let response = self.fetch(options).await?;
        Ok(response
            .jokes()
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("\n\n"))
    }

    /// Admissions available right now.
    pub fn remaining(&self) -> usize {
        self.limiter.remaining()
    }

    /// Requests waiting in the scheduler. Always 0 without one.
    pub fn queued(&self) -> usize {
        self.scheduler.as_ref().map_or(0, Scheduler::queued)
    }

    /// Requests in flight through the scheduler. Always 0 without one.
    pub fn running(&self) -> usize {
        self.scheduler.as_ref().map_or(0, Scheduler::running)
    }

    /// Stops the scheduler, if this client has one. See [`Scheduler::stop`].
    pub fn shutdown(&self) {
        if let Some(scheduler) = &self.scheduler {
            scheduler.stop();
        }
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn fetch_one(&self, options: &FetchOptions) -> Result<Joke, JokeError> {
        match self.fetch(options).await? {
            JokeResponse::One(joke) => Ok(joke),
            JokeResponse::Many(jokes) => jokes
                .into_iter()
                .next()
                .ok_or_else(|| JokeError::transport("JokeAPI returned an empty batch")),
        }
    }
}

/// Builder for [`JokeClient`].
#[derive(Debug, Clone)]
pub struct JokeClientBuilder {
    base_url: String,
    timeout: Duration,
    user_agent: String,
    admission: Admission,
}

impl Default for JokeClientBuilder {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            admission: Admission::Immediate(Arc::new(FixedWindow::new(
                10,
                Duration::from_secs(60),
            ))),
        }
    }
}

impl JokeClientBuilder {
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Default time budget for each call.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Admit at most `capacity` requests per `window`, failing fast beyond.
    pub fn with_fixed_window(self, capacity: usize, window: Duration) -> Self {
        self.with_strategy(Arc::new(FixedWindow::new(capacity, window)))
    }

    /// Admit through any strategy, failing fast when it refuses.
    pub fn with_strategy(mut self, strategy: Arc<dyn Strategy>) -> Self {
        self.admission = Admission::Immediate(strategy);
        self
    }

    /// Queue requests and run them one at a time, `capacity` per `window`,
    /// at least `min_spacing` apart.
    pub fn with_scheduler(self, capacity: usize, window: Duration, min_spacing: Duration) -> Self {
        self.with_reservoir(Arc::new(Reservoir::new(capacity, window, min_spacing)))
    }

    /// Queue requests behind an existing reservoir.
    pub fn with_reservoir(mut self, reservoir: Arc<Reservoir>) -> Self {
        self.admission = Admission::Scheduled(reservoir);
        self
    }

    /// Builds the client.
    ///
    /// With a scheduler configured this spawns its worker task.
    ///
    /// # Panics
    ///
    /// Panics if a scheduler is configured and this is called outside of a
    /// Tokio runtime.
    pub fn build(self) -> Result<JokeClient, ConfigError> {
        let base_url = Url::parse(&self.base_url).map_err(|source| ConfigError::InvalidBaseUrl {
            url: self.base_url.clone(),
            source,
        })?;
        if base_url.cannot_be_a_base() {
            return Err(ConfigError::OpaqueBaseUrl(self.base_url));
        }

        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::ACCEPT,
            header::HeaderValue::from_static("application/json"),
        );
        let http = reqwest::Client::builder()
            .user_agent(self.user_agent)
            .default_headers(headers)
            .build()?;

        let api = JokeApiService::new(http.clone());

        let limiter: Arc<dyn Strategy>;
        let service: JokeService;
        let mut scheduler = None;
        match self.admission {
            Admission::Immediate(strategy) => {
                let svc = ServiceBuilder::new()
                    .layer(AdmissionLayer::new(Arc::clone(&strategy)).with_fail_fast(true))
                    .service(api);
                service = BoxCloneSyncService::new(svc);
                limiter = strategy;
            }
            Admission::Scheduled(reservoir) => {
                let svc = ServiceBuilder::new()
                    .layer(AdmissionLayer::new(Arc::clone(&reservoir)))
                    .service(api);
                let queue = Scheduler::new(svc);
                service = BoxCloneSyncService::new(queue.clone());
                limiter = reservoir;
                scheduler = Some(queue);
            }
        }

        Ok(JokeClient {
            base_url,
            timeout: self.timeout,
            http,
            service,
            limiter,
            scheduler,
            requests: global::meter("joke_client").u64_counter("requests").build(),
        })
    }
}
