//! # pmo-client - A resilient client for the project-governance API
//!
//! `pmo-client` issues every request the governance dashboard makes against its
//! project-management API. It retries transient failures with bounded exponential backoff,
//! validates payloads against caller-supplied schemas and reports every failure as one of
//! exactly three error shapes.
//!
//! ## Quick Start
//!
//! ```no_run
//! use pmo_client::{Client, RequestOptions};
//! use serde::{Deserialize, Serialize};
//! use std::time::Duration;
//!
//! #[derive(Serialize)]
//! struct CreateProject {
//!     name: String,
//!     budget: f64,
//! }
//!
//! #[derive(Deserialize)]
//! struct Project {
//!     id: String,
//!     name: String,
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Up to 3 retries, waiting 1s, 2s, then 4s
//!     let client = Client::builder()
//!         .base_url("https://pmo.example.com/api")?
//!         .timeout(Duration::from_secs(15))
//!         .credential("my-token")
//!         .max_retries(3)
//!         .retry_base_delay(Duration::from_secs(1))
//!         .build()?;
//!
//!     let projects = client.get::<Vec<Project>>("/projects", RequestOptions::new()).await?;
//!     println!("{} projects in {:?}", projects.len(), projects.latency);
//!
//!     let new_project = CreateProject {
//!         name: "Data centre migration".to_string(),
//!         budget: 250_000.0,
//!     };
//!     let created = client
//!         .post::<_, Project>("/projects", &new_project, RequestOptions::new())
//!         .await?;
//!     println!("Created project {}", created.data.id);
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Error Handling
//!
//! A request ends in a [`Response`] or in exactly one [`Error`]:
//!
//! ```no_run
//! use pmo_client::{Client, Error, RequestOptions};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! # let client = Client::builder().base_url("https://pmo.example.com/api")?.build()?;
//! match client.get::<serde_json::Value>("/projects/PRJ-404", RequestOptions::new()).await {
//!     Ok(response) => println!("Found: {}", response.data),
//!     Err(Error::Network { is_retryable, .. }) => {
//!         eprintln!("Offline (gave up after retries: {})", is_retryable);
//!     }
//!     Err(Error::Api { status, message, .. }) => eprintln!("{}: {}", status, message),
//!     Err(Error::Validation { details, .. }) => {
//!         for violation in details {
//!             eprintln!("{}", violation);
//!         }
//!     }
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Retries
//!
//! A failure is retried when no response arrived (except on timeout) or when the server
//! answered 5xx, as long as the retry budget is not spent. 4xx answers and schema violations
//! are final. Retry accounting lives in a per-client [`RetryLedger`] keyed by
//! [`RequestIdentity`] (method, path and query parameters).
//!
//! ## Validation
//!
//! The `*_validated` methods narrow the payload with a [`Schema`]:
//!
//! ```no_run
//! use pmo_client::{Client, RequestOptions};
//! use pmo_client::validate::{FieldKind, ObjectSchema};
//! use serde_json::json;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! # let client = Client::builder().base_url("https://pmo.example.com/api")?.build()?;
//! let schema = ObjectSchema::new()
//!     .field("id", FieldKind::String)
//!     .field("severity", FieldKind::Integer)
//!     .optional("owner", FieldKind::String);
//!
//! let issue = client
//!     .post_validated("/raid/issues", &json!({ "title": "Late vendor" }), &schema, RequestOptions::new())
//!     .await?;
//! println!("{}", issue.data["id"]);
//! # Ok(())
//! # }
//! ```

mod client;
mod error;
pub mod ledger;
mod request;
mod response;
pub mod retry;
pub mod transport;
pub mod validate;

pub use client::{
    Client, ClientBuilder, ClientConfig, DEFAULT_TIMEOUT, ENV_BASE_URL, ENV_MAX_RETRIES,
    ENV_RETRY_DELAY_MS, ENV_TIMEOUT_MS, ENV_TOKEN,
};
pub use error::{BoxError, ConfigError, Error, Result, REQUEST_BUILD_CODE};
pub use ledger::{RequestIdentity, RetryLedger};
pub use request::RequestOptions;
pub use response::Response;
pub use retry::{RetryDecision, RetryPolicy};
pub use validate::{Schema, Violation};
