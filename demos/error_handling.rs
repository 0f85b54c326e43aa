//! Example demonstrating how to branch on the three error shapes.
//!
//! This example shows how to:
//! - Tell an offline client apart from a server rejection
//! - Read the server's detail and raw body from an API error
//! - List the offending fields of a validation error
//! - Inspect when an error happened and what caused it
//!
//! Run with: `PMO_API_BASE_URL=http://localhost:8080/api cargo run --example error_handling`

use pmo_client::{Client, Error, RequestOptions, ENV_BASE_URL};
use serde::Deserialize;
use std::error::Error as _;
use std::time::Duration;

#[derive(Debug, Deserialize)]
#[allow(dead_code)]
struct Project {
    id: String,
    name: String,
}

fn report(err: &Error) {
    match err {
        Error::Network {
            message,
            is_retryable,
            code,
            ..
        } => {
            println!("Network error (offline?)");
            println!("  Message: {}", message);
            println!("  Code: {:?}", code);
            println!("  Transient, retries exhausted: {}", is_retryable);
        }
        Error::Api {
            status,
            detail,
            body,
            ..
        } => {
            println!("API error");
            println!("  Status: {}", status);
            println!("  Is client error (4xx): {}", status.is_client_error());
            println!("  Detail: {:?}", detail);
            println!("  Raw body: {}", body.chars().take(200).collect::<String>());
        }
        Error::Validation { field, details, .. } => {
            println!("Validation error");
            println!("  First offending field: {:?}", field);
            for violation in details {
                println!("  - {}", violation);
            }
        }
    }

    println!("  At: {}", err.timestamp());
    if let Some(cause) = err.source() {
        println!("  Caused by: {}", cause);
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter("pmo_client=info")
        .init();

    let base_url =
        std::env::var(ENV_BASE_URL).unwrap_or_else(|_| "http://localhost:8080/api".to_string());

    let client = Client::builder()
        .base_url(&base_url)?
        .max_retries(2)
        .retry_base_delay(Duration::from_millis(200))
        .build()?;

    println!("=== Example 1: Unknown project (4xx, never retried) ===");
    if let Err(e) = client
        .get::<Project>("/projects/UNKNOWN", RequestOptions::new())
        .await
    {
        report(&e);
    }
    println!();

    println!("=== Example 2: Payload with the wrong shape ===");
    #[derive(Debug, Deserialize)]
    #[allow(dead_code)]
    struct WrongShape {
        nonexistent_field: String,
    }

    if let Err(e) = client
        .get::<Vec<WrongShape>>("/projects", RequestOptions::new())
        .await
    {
        report(&e);
    }
    println!();

    println!("=== Example 3: Nothing listening (retried, then network error) ===");
    client.set_base_url("http://127.0.0.1:9")?;
    if let Err(e) = client
        .get::<Vec<Project>>("/projects", RequestOptions::new())
        .await
    {
        println!("Retry eligible: {}", e.is_retry_eligible());
        report(&e);
    }
    println!();

    println!("=== Example 4: Per-request timeout (terminal) ===");
    client.set_base_url(&base_url)?;
    let options = RequestOptions::new().with_timeout(Duration::from_millis(1));
    if let Err(e) = client.get::<Vec<Project>>("/projects", options).await {
        report(&e);
    }

    Ok(())
}
