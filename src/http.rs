//! Racing HTTP requests with [`reqwest`].
//!
//! [`HttpExecutor`] sends a [`reqwest::Request`] through a [`reqwest::Client`].
//! The free functions [`between`] and [`first_then_start`] race requests
//! through a default client, which is the quickest way to hedge a request
//! across a handful of mirrors.
//!
//! A response counts as a success as soon as its headers arrive, whatever its
//! status code. Only transport failures count as errors.

use core::future::Future;
use core::pin::Pin;
use core::time::Duration;

use futures_lite::future;
use reqwest::{Client, Request, Response};

use crate::{AggregateError, CancelToken, Executor, RaceError, Racer, StagedRacer};

/// An error produced while sending one HTTP request.
#[derive(thiserror::Error, Debug)]
pub enum HttpError {
    /// The request has a streaming body and cannot be sent more than once.
    #[error("request body cannot be cloned")]
    Unclonable,

    /// The token passed to [`HttpExecutor`] was cancelled mid-request.
    ///
    /// Races never report this: they drop in-flight requests when they cancel
    /// their token. It only shows up when the executor is driven directly with
    /// a token the caller owns.
    #[error("request was cancelled")]
    Cancelled,

    /// The request failed in transit.
    #[error(transparent)]
    Transport(#[from] reqwest::Error),
}

/// Sends requests through a [`reqwest::Client`].
///
/// The client is cheap to clone and pools its connections, so one executor
/// can serve any number of races.
#[derive(Debug, Clone, Default)]
pub struct HttpExecutor {
    client: Client,
}

impl HttpExecutor {
    /// Create an executor sending requests through `client`.
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// The underlying client.
    pub fn client(&self) -> &Client {
        &self.client
    }
}

impl From<Client> for HttpExecutor {
    fn from(client: Client) -> Self {
        Self::new(client)
    }
}

type ResponseFuture = Pin<Box<dyn Future<Output = Result<Response, HttpError>> + Send>>;

impl Executor<Request> for HttpExecutor {
    type Response = Response;
    type Error = HttpError;
    type Future = ResponseFuture;

    fn execute(&self, request: &Request, token: CancelToken) -> Self::Future {
        let client = self.client.clone();
        let request = request.try_clone();
        Box::pin(async move {
            let Some(request) = request else {
                return Err(HttpError::Unclonable);
            };
            let send = async { client.execute(request).await.map_err(HttpError::from) };
            let cancelled = async {
                token.cancelled().await;
                Err::<Response, _>(HttpError::Cancelled)
            };
            future::or(send, cancelled).await
        })
    }
}

/// Send every request at once and return the first response.
///
/// If `timeout` is set and elapses before any response arrives the race fails
/// with [`RaceError::Timeout`].
///
/// # Example
///
/// ```no_run
/// use reqwest::{Method, Request, Url};
/// use std::time::Duration;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let mirrors = [
///     Request::new(Method::GET, Url::parse("https://mirror-a.example/pkg.tar")?),
///     Request::new(Method::GET, Url::parse("https://mirror-b.example/pkg.tar")?),
/// ];
/// let response = request_race::between(&mirrors, Some(Duration::from_secs(5))).await?;
/// println!("served by {}", response.url());
/// # Ok(())
/// # }
/// ```
pub async fn between(
    requests: &[Request],
    timeout: Option<Duration>,
) -> Result<Response, RaceError<HttpError>> {
    let mut racer = Racer::new(HttpExecutor::default());
    if let Some(timeout) = timeout {
        racer = racer.timeout(timeout);
    }
    racer.between(requests).await
}

/// Send `primary`, and only send `secondaries` if it has not responded within
/// `warm_up` or has failed.
pub async fn first_then_start(
    primary: &Request,
    warm_up: Duration,
    secondaries: &[Request],
) -> Result<Response, AggregateError<HttpError>> {
    let racer = StagedRacer::new(HttpExecutor::default(), warm_up);
    racer.first_then_start(primary, secondaries).await
}
