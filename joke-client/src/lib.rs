//! # joke-client
//!
//! `joke-client` is a rate limited client for the public
//! [JokeAPI](https://v2.jokeapi.dev), assembled from [Tower](https://github.com/tower-rs/tower)
//! services.
//!
//! ## The Request Path
//!
//! 1. **Building**: [`FetchOptions`] become `GET <base>/joke/<categories>?<query>`.
//!    Options that are not set never show up in the query.
//! 2. **Admission**: every request passes a [`joke_limit::Strategy`] before any
//!    I/O. Two modes are available:
//!    - *fail fast* ([`JokeClientBuilder::with_fixed_window`]): a refused
//!      request fails at once with [`JokeError::AdmissionDenied`], carrying
//!      the time until the budget refills.
//!    - *scheduled* ([`JokeClientBuilder::with_scheduler`]): requests queue in
//!      a FIFO [`Scheduler`] and run one at a time as the reservoir allows.
//! 3. **Execution**: the call, including any queueing, is bounded by a time
//!    budget and abandoned with [`JokeError::Timeout`] when it runs out.
//! 4. **Classification**: the answer becomes a [`JokeResponse`], or a
//!    [`JokeError::Transport`] for a bad status or body, or a
//!    [`JokeError::Domain`] when the service reports an error itself.
//!
//! ## Example
//!
//! ```rust,no_run
//! use joke_client::{Category, FetchOptions, JokeClient};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let client = JokeClient::new()?;
//!
//! let options = FetchOptions::safe().with_categories([Category::Programming, Category::Pun]);
//! for joke in client.fetch(&options).await?.jokes() {
//!     println!("{joke}");
//! }
//! # Ok(())
//! # }
//! ```

mod classify;
mod client;
mod config;
mod error;
mod http;
mod joke;
mod layer;
mod options;
mod scheduler;
mod service;


pub use classify::classify;
pub use client::JokeClient;
pub use client::JokeClientBuilder;
pub use config::AdmissionConfig;
pub use config::ClientConfig;
pub use config::DEFAULT_BASE_URL;
pub use config::DEFAULT_TIMEOUT;
pub use config::DEFAULT_USER_AGENT;
pub use error::ConfigError;
pub use error::JokeError;
pub use http::JokeApiService;
pub use joke::Category;
pub use joke::Flag;
pub use joke::Flags;
pub use joke::Joke;
pub use joke::JokeBody;
pub use joke::JokeResponse;
pub use joke::JokeType;
pub use joke::Language;
pub use layer::AdmissionLayer;
pub use options::FetchOptions;
pub use options::MAX_AMOUNT;
pub use scheduler::ResponseFuture;
pub use scheduler::Scheduler;
pub use service::AdmissionService;
