//! Create a resource in raw mode, then follow its `Location` header.
//!
//! Run:
//! `cargo run --example create_and_follow`
//!
//! Required env vars:
//! - `SLUMBER_BASE_URL`: API whose collection answers `POST` with a `Location`
//!
//! Optional env vars:
//! - `SLUMBER_TOKEN`: bearer token
//! - `SLUMBER_COLLECTION` (defaults to `notes`)

use serde_json::json;
use slumber::{Api, Auth};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let base_url = std::env::var("SLUMBER_BASE_URL")?;
    let collection = std::env::var("SLUMBER_COLLECTION").unwrap_or_else(|_| "notes".to_owned());

    let mut builder = Api::builder().base_url(base_url);
    if let Ok(token) = std::env::var("SLUMBER_TOKEN") {
        builder = builder.auth(Auth::Bearer(token));
    }
    let api = builder.build()?;

    let notes = api.child(&collection)?.as_raw();
    let created = notes.post(Some(json!({"title": "hello"})), None, &[])?;
    let Some(response) = created.response() else {
        return Err("raw mode always carries the response".into());
    };
    println!("{} {}", response.status(), notes.url());

    let fetched = notes.follow_location(response, &[])?;
    println!("{:?}", fetched.decoded());
    Ok(())
}
