//! Asterisk Manager Interface (AMI) client for Rust
//!
//! This crate provides an async client for the Asterisk Manager Interface:
//! a persistent TCP (optionally TLS) session carrying asynchronous actions,
//! their correlated responses, and unsolicited events on one byte stream.
//!
//! # Architecture
//!
//! The library uses a split reader/writer design:
//! - [`AmiClient`] (Clone + Send): submit actions from any task
//! - [`AmiStreams`]: events and asynchronous errors from the background
//!   reader task
//!
//! Each submitted action gets a private [`ResponseHandle`] that yields the
//! one matching response; concurrent submissions never observe each other's
//! replies.
//!
//! # Examples
//!
//! ```rust,no_run
//! use asterisk_ami_tokio::{AmiClient, ConnectOptions, Params};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), asterisk_ami_tokio::AmiError> {
//!     let (client, mut streams) =
//!         AmiClient::connect("127.0.0.1:5038", ConnectOptions::new()).await?;
//!     client.run();
//!     client.login("admin", "secret").await?;
//!
//!     let mut handle = client
//!         .action(Params::from([("Action".to_string(), "Ping".to_string())]))
//!         .await?;
//!     if let Some(response) = handle.recv().await {
//!         println!("status: {}", response.status());
//!     }
//!
//!     while let Some(event) = streams.events.recv().await {
//!         println!("event: {}", event.id());
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Reconnection
//!
//! Network failures (connection reset/aborted/refused, end-of-stream) are
//! pushed onto [`AmiStreams::net_errors`] and the reader parks. The
//! application decides when to call [`AmiClient::reconnect`], which replaces
//! the transport, resumes the reader, and silently replays the stored login:
//!
//! ```rust,no_run
//! # async fn example(
//! #     client: asterisk_ami_tokio::AmiClient,
//! #     mut streams: asterisk_ami_tokio::AmiStreams,
//! # ) {
//! while let Some(err) = streams.net_errors.recv().await {
//!     eprintln!("network error: {err}, reconnecting");
//!     while client.reconnect().await.is_err() {
//!         tokio::time::sleep(std::time::Duration::from_secs(1)).await;
//!     }
//! }
//! # }
//! ```
//!
//! # Event descriptors
//!
//! Known event kinds can be registered explicitly in an [`EventRegistry`];
//! the session core only ever hands the raw identifier and header map across
//! that boundary:
//!
//! ```rust
//! use asterisk_ami_tokio::EventRegistry;
//!
//! let registry = EventRegistry::with_builtin();
//! assert!(registry.lookup("PeerStatus").is_some());
//! ```

pub mod constants;

mod action;
mod client;
mod error;
mod event;
mod pending;
mod protocol;
mod response;
mod transport;

pub use action::Params;
pub use client::{AmiClient, AmiStreams, ConnectOptions};
pub use constants::DEFAULT_AMI_PORT;
pub use error::{AmiError, AmiResult};
pub use event::{AmiEvent, EventDescriptor, EventRegistry, FieldDescriptor, PEER_STATUS_FIELDS};
pub use pending::ResponseHandle;
pub use response::AmiResponse;
