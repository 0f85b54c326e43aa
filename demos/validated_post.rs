//! Example demonstrating schema-validated requests.
//!
//! This example shows how to:
//! - Declare the expected shape of a payload with `ObjectSchema`
//! - Validate a created RAID issue and read the narrowed value
//! - Combine a shape check with typed deserialization via `Typed`
//! - Attach a bearer token and swap it at runtime
//!
//! Run with: `PMO_API_BASE_URL=http://localhost:8080/api cargo run --example validated_post`

use pmo_client::validate::{FieldKind, ObjectSchema, Typed};
use pmo_client::{Client, Error, RequestOptions, ENV_BASE_URL};
use serde::Deserialize;
use serde_json::json;

#[derive(Debug, Deserialize)]
#[allow(dead_code)]
struct Issue {
    id: String,
    title: String,
    severity: u8,
    owner: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter("pmo_client=debug,validated_post=info")
        .init();

    let base_url =
        std::env::var(ENV_BASE_URL).unwrap_or_else(|_| "http://localhost:8080/api".to_string());

    let client = Client::builder()
        .base_url(base_url)?
        .credential("dev-token")
        .build()?;

    let issue_schema = ObjectSchema::new()
        .field("id", FieldKind::String)
        .field("title", FieldKind::String)
        .field("severity", FieldKind::Integer)
        .optional("owner", FieldKind::String);

    println!("=== Validated POST ===");
    let new_issue = json!({ "title": "Vendor delay", "severity": 3 });
    match client
        .post_validated("/raid/issues", &new_issue, &issue_schema, RequestOptions::new())
        .await
    {
        Ok(response) => {
            println!("Created issue {}", response.data["id"]);
            println!("Attempts: {}", response.attempts);
        }
        Err(Error::Validation { details, .. }) => {
            println!("Server returned an unexpected shape:");
            for violation in details {
                println!("  - {}", violation);
            }
        }
        Err(e) => println!("Request failed: {}", e),
    }
    println!();

    println!("=== Shape check, then typed list ===");
    client.set_credential(Some("rotated-token".to_string()));

    let issues = Typed::<Vec<Issue>>::with_shape(FieldKind::array_of(issue_schema));
    let response = client
        .get_validated("/raid/issues", &issues, RequestOptions::new())
        .await?;

    for issue in response.iter() {
        println!("{} [sev {}] {} ({:?})", issue.id, issue.severity, issue.title, issue.owner);
    }

    Ok(())
}
