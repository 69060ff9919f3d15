//! Race redundant requests and keep the first successful response.
//!
//! When several endpoints can serve the same request (mirrors, replicas,
//! fallback hosts), sending it to all of them and taking whichever answers
//! first cuts the tail latency of the slowest one. This crate provides the
//! coordination for that and nothing else: the transport is supplied by an
//! [`Executor`].
//!
//! # Operations
//!
//! - [`Racer`]: send every request at once, return the first success.
//! - [`StagedRacer`]: give one primary request a head start, and only send the
//!   others if it turns out slow or failed.
//!
//! | Name          | Returns on      | Fails with                               |
//! | ---           | ---             | ---                                      |
//! | `Racer`       | first `Ok`      | [`AggregateError`] or [`TimeoutError`]   |
//! | `StagedRacer` | first `Ok`      | [`AggregateError`]                       |
//!
//! Every race call gets its own [`CancelToken`]. It is cancelled as soon as the
//! call resolves or is dropped, and every request still in flight is dropped
//! with it. Nothing is retried.
//!
//! # Examples
//!
//! ```rust
//! use async_io::Timer;
//! use request_race::{CancelToken, Racer};
//! use futures_lite::future::block_on;
//! use std::io::{Error, ErrorKind};
//! use std::time::Duration;
//!
//! // Simulate three mirrors: one is down, two answer after a delay.
//! let racer = Racer::new(|mirror: &(&'static str, u64), _token: CancelToken| {
//!     let (name, delay) = *mirror;
//!     async move {
//!         if delay == 0 {
//!             return Err(Error::new(ErrorKind::ConnectionRefused, name));
//!         }
//!         Timer::after(Duration::from_millis(delay)).await;
//!         Ok(name)
//!     }
//! });
//!
//! block_on(async {
//!     let mirrors = [("down", 0), ("slow", 200), ("fast", 20)];
//!     assert_eq!(racer.between(&mirrors).await.unwrap(), "fast");
//! })
//! ```
//!
//! # Features
//!
//! - `http` (default): [`HttpExecutor`] and the [`between`] and
//!   [`first_then_start`] shortcuts, built on `reqwest`.
//! - `rustls`: enable TLS for `http` through `rustls`.

#![deny(missing_debug_implementations, nonstandard_style)]
#![warn(missing_docs, unreachable_pub)]

mod cancel;
mod error;
mod executor;
mod racer;
mod staged;
mod utils;

#[cfg(feature = "http")]
pub mod http;

pub use cancel::{CancelToken, Cancelled};
pub use error::{AggregateError, RaceError, TimeoutError};
pub use executor::Executor;
pub use racer::{Race, Racer};
pub use staged::{Staged, StagedRacer};

#[cfg(feature = "http")]
pub use http::{between, first_then_start, HttpError, HttpExecutor};
