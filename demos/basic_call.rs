//! Basic example demonstrating simple GET and POST requests.
//!
//! This example shows how to:
//! - Configure a client from `PMO_API_*` environment variables
//! - Fetch the project list with a query parameter
//! - Create a project
//! - Read response metadata such as latency and attempt count
//!
//! Run with: `PMO_API_BASE_URL=http://localhost:8080/api cargo run --example basic_call`

use pmo_client::{ClientBuilder, RequestOptions};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
#[allow(dead_code)]
struct Project {
    id: String,
    name: String,
    budget: f64,
}

#[derive(Debug, Serialize)]
struct NewProject {
    name: String,
    budget: f64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter("pmo_client=debug,basic_call=info")
        .init();

    // Reads PMO_API_BASE_URL, and optionally PMO_API_TOKEN, PMO_API_TIMEOUT_MS,
    // PMO_API_MAX_RETRIES and PMO_API_RETRY_DELAY_MS
    let client = ClientBuilder::from_env()?.build()?;
    println!("Using {:?}", client.config());

    println!("=== GET Request Example ===");
    let options = RequestOptions::new().with_query_param("status", "active");
    let response = client.get::<Vec<Project>>("/projects", options).await?;

    for project in response.iter() {
        println!("{}: {} (budget {})", project.id, project.name, project.budget);
    }
    println!("Request latency: {:?}", response.latency);
    println!("Attempts: {}", response.attempts);
    println!();

    println!("=== POST Request Example ===");
    let new_project = NewProject {
        name: "Data centre migration".to_string(),
        budget: 250_000.0,
    };

    let response = client
        .post::<_, Project>("/projects", &new_project, RequestOptions::new())
        .await?;

    println!("Created project {}", response.data.id);
    println!("Status code: {}", response.status);
    println!("Content-Type: {:?}", response.header("content-type"));
    println!("Was retried: {}", response.was_retried());

    Ok(())
}
