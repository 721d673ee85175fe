use std::future::Future;
use std::pin::Pin;
use std::task::Context;
use std::task::Poll;

use tower::BoxError;
use tower::Service;

use crate::classify::classify;
use crate::error::JokeError;
use crate::joke::JokeResponse;

type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;

/// The outbound call: sends a prepared request and classifies the answer.
///
/// Reading the body is part of the call, so a time budget wrapped around
/// this service covers the whole exchange.
#[derive(Clone, Debug)]
pub struct JokeApiService {
    client: reqwest::Client,
}

impl JokeApiService {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl Service<reqwest::Request> for JokeApiService {
    type Response = JokeResponse;
    type Error = BoxError;
    type Future = BoxFuture<Result<JokeResponse, BoxError>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: reqwest::Request) -> Self::Future {
        let client = self.client.clone();

        Box::pin(async move {
            tracing::debug!(url = %request.url(), "sending JokeAPI request");
            let response = client.execute(request).await.map_err(JokeError::from)?;
            let status = response.status();
            let body = response.bytes().await.map_err(JokeError::from)?;
            Ok(classify(status, &body)?)
        })
    }
}
