//! Fetch one resource by id with query parameters.
//!
//! Run:
//! `cargo run --example get_resource`
//!
//! Optional env vars:
//! - `SLUMBER_BASE_URL` (defaults to `https://jsonplaceholder.typicode.com`)
//! - `SLUMBER_POST_ID` (defaults to `1`)

use slumber::Api;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let base_url = std::env::var("SLUMBER_BASE_URL")
        .unwrap_or_else(|_| "https://jsonplaceholder.typicode.com".to_owned());
    let post_id = std::env::var("SLUMBER_POST_ID").unwrap_or_else(|_| "1".to_owned());

    let api = Api::builder().base_url(base_url).append_slash(false).build()?;
    let post = api.child("posts")?.id(&post_id);
    println!("GET {}", post.url());

    let outcome = post.get(&[])?;
    match outcome.value() {
        Some(value) => println!("{}", serde_json::to_string_pretty(value)?),
        None => println!("{:?}", outcome.decoded()),
    }

    let comments = api.path(&format!("posts/{post_id}/comments"))?;
    let listing = comments.get(&[("_limit", "3")])?;
    println!("{}", serde_json::to_string_pretty(&listing.value())?);
    Ok(())
}
