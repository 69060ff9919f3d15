//! Races over real HTTP servers.

#![cfg(feature = "http")]

use std::net::TcpListener;
use std::time::Duration;

use request_race::{CancelToken, Executor, HttpError, HttpExecutor, Racer};
use reqwest::{Method, Request, Url};
use wiremock::matchers::method;
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn server(body: &str, delay: Duration) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(body)
                .set_delay(delay),
        )
        .mount(&server)
        .await;
    server
}

fn get(url: &str) -> Request {
    Request::new(Method::GET, Url::parse(url).unwrap())
}

/// An address nothing listens on, so connecting to it is refused.
fn unreachable() -> Request {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    get(&format!("http://{addr}/"))
}

#[tokio::test]
async fn slow_and_fast() {
    let slow = server("slow", Duration::from_secs(1)).await;
    let fast = server("fast", Duration::from_millis(1)).await;

    let res = request_race::between(&[get(&slow.uri()), get(&fast.uri())], None)
        .await
        .unwrap();
    assert_eq!(res.text().await.unwrap(), "fast");
}

#[tokio::test]
async fn unreachable_and_reachable_host() {
    let hello = server("hello", Duration::from_millis(200)).await;

    let res = request_race::between(&[unreachable(), get(&hello.uri())], None)
        .await
        .unwrap();
    assert_eq!(res.text().await.unwrap(), "hello");
}

#[tokio::test]
async fn failure_and_timeout() {
    let hello = server("hello", Duration::from_secs(2)).await;

    let requests = [get(&hello.uri()), unreachable()];
    let err = request_race::between(&requests, Some(Duration::from_millis(200)))
        .await
        .unwrap_err();
    assert!(err.is_timeout());
}

#[tokio::test]
async fn all_unreachable() {
    let racer = Racer::new(HttpExecutor::default());
    let requests = [unreachable(), unreachable()];

    let err = racer.between(&requests).await.unwrap_err();
    let errors = err.aggregate().unwrap();
    assert_eq!(errors.len(), 2);
    assert!(errors.iter().all(|e| matches!(e, HttpError::Transport(_))));
}

#[tokio::test]
async fn staged_response_from_secondary() {
    let slow = server("slow", Duration::from_secs(2)).await;
    let fast = server("fast", Duration::from_millis(1)).await;

    let res = request_race::first_then_start(
        &get(&slow.uri()),
        Duration::from_millis(50),
        &[get(&fast.uri())],
    )
    .await
    .unwrap();
    assert_eq!(res.text().await.unwrap(), "fast");
}

#[tokio::test]
async fn staged_response_from_primary() {
    let primary = server("primary", Duration::from_millis(100)).await;
    let secondary = server("secondary", Duration::from_secs(2)).await;

    let res = request_race::first_then_start(
        &get(&primary.uri()),
        Duration::from_millis(10),
        &[get(&secondary.uri())],
    )
    .await
    .unwrap();
    assert_eq!(res.text().await.unwrap(), "primary");
}

#[tokio::test]
async fn staged_primary_error_starts_secondary_early() {
    let hello = server("hello", Duration::from_millis(50)).await;

    // The warm-up would take a minute, but the failing primary cuts it short.
    let res = request_race::first_then_start(
        &unreachable(),
        Duration::from_secs(60),
        &[get(&hello.uri())],
    )
    .await
    .unwrap();
    assert_eq!(res.text().await.unwrap(), "hello");
}

#[tokio::test]
async fn staged_all_unreachable() {
    let errs = request_race::first_then_start(
        &unreachable(),
        Duration::from_secs(60),
        &[unreachable()],
    )
    .await
    .unwrap_err();
    assert_eq!(errs.len(), 2);
}

#[tokio::test]
async fn executor_stops_on_caller_cancellation() {
    let slow = server("slow", Duration::from_secs(2)).await;
    let executor = HttpExecutor::default();
    let token = CancelToken::new();

    let request = executor.execute(&get(&slow.uri()), token.clone());
    token.cancel();

    let err = request.await.unwrap_err();
    assert!(matches!(err, HttpError::Cancelled));
}
