use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::{Args, Parser};
use serde_json::Value;
use slumber::{Api, Auth, Body, Outcome, Resource, Response, Upload};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(
    name = "slumber-cli",
    version,
    about = "Send requests to a REST API by resource path"
)]
struct Cli {
    /// Base URL of the API.
    #[arg(long, env = "SLUMBER_BASE_URL")]
    base_url: String,

    /// Serialization format for request bodies and the accept header.
    #[arg(long, default_value = "json")]
    format: String,

    /// Do not append a trailing slash to resource URLs.
    #[arg(long)]
    no_append_slash: bool,

    /// Bearer token sent in the Authorization header.
    #[arg(long, env = "SLUMBER_TOKEN", conflicts_with = "username")]
    token: Option<String>,

    /// Username for HTTP basic authentication.
    #[arg(long, requires = "password")]
    username: Option<String>,

    /// Password for HTTP basic authentication.
    #[arg(long, requires = "username")]
    password: Option<String>,

    /// Print the status line and response headers before the body.
    #[arg(long, short = 'i')]
    include: bool,

    /// Emit compact JSON instead of pretty-printed output.
    #[arg(long)]
    compact: bool,

    #[command(flatten)]
    request: RequestArgs,
}

#[derive(Debug, Args)]
struct RequestArgs {
    /// HTTP method (GET, POST, PUT, PATCH, DELETE, HEAD, OPTIONS).
    method: String,

    /// Resource path below the base URL (for example: users/42/posts).
    path: String,

    /// Query parameter in form key=value. Repeat as needed.
    #[arg(long = "query", value_name = "KEY=VALUE")]
    query: Vec<String>,

    /// File upload in form field=path. Repeat as needed.
    #[arg(long = "file", value_name = "FIELD=PATH")]
    file: Vec<String>,

    #[command(flatten)]
    body: BodyInput,
}

#[derive(Debug, Args)]
struct BodyInput {
    /// Request body, written in the --format serialization.
    #[arg(long, conflicts_with = "body_file")]
    body: Option<String>,

    /// Path to a file holding the request body, in the --format serialization.
    #[arg(long, value_name = "PATH")]
    body_file: Option<PathBuf>,
}

/// Entry point for the CLI.
///
/// Parses command-line arguments, builds the API, resolves the resource path,
/// sends the request and prints the result.
fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging();

    let api = build_api(&cli)?;
    let resource = api
        .path(&cli.request.path)
        .with_context(|| format!("invalid resource path '{}'", cli.request.path))?
        .as_raw();

    let outcome = send_request(&resource, &cli.request).with_context(|| {
        format!(
            "request failed: {} {}",
            cli.request.method,
            resource.url()
        )
    })?;

    if let Some(outcome) = outcome {
        print_outcome(&outcome, cli.include, cli.compact)?;
    }
    Ok(())
}

/// Installs a stderr subscriber filtered by `RUST_LOG`, `warn` by default.
fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn build_api(cli: &Cli) -> Result<Api> {
    let mut builder = Api::builder()
        .base_url(&cli.base_url)
        .format(&cli.format)
        .append_slash(!cli.no_append_slash);

    if let Some(token) = &cli.token {
        builder = builder.auth(Auth::Bearer(token.clone()));
    } else if let (Some(username), Some(password)) = (&cli.username, &cli.password) {
        builder = builder.auth(Auth::Basic {
            username: username.clone(),
            password: password.clone(),
        });
    }

    builder
        .build()
        .with_context(|| format!("failed to create client with base URL '{}'", cli.base_url))
}

/// Dispatches to the verb named by `args.method`.
///
/// Returns `None` for `DELETE`, which only reports success on stdout.
fn send_request(resource: &Resource, args: &RequestArgs) -> Result<Option<Outcome>> {
    let method = args.method.to_ascii_uppercase();
    let query = args
        .query
        .iter()
        .map(|item| split_pair(item, "--query"))
        .collect::<Result<Vec<_>>>()?;
    let body = read_body(resource, &args.body)?;
    let files = read_uploads(&args.file)?;

    let outcome = match method.as_str() {
        "GET" => resource.get(&query)?,
        "HEAD" => resource.head(&query)?,
        "OPTIONS" => resource.options(&query)?,
        "POST" => resource.post(body, files, &query)?,
        "PUT" => resource.put(body, files, &query)?,
        "PATCH" => resource.patch(body, files, &query)?,
        "DELETE" => {
            let deleted = resource.delete(&query)?;
            println!("{}", if deleted { "deleted" } else { "not deleted" });
            return Ok(None);
        }
        _ => bail!("unsupported HTTP method '{}'", args.method),
    };
    Ok(Some(outcome))
}

/// Splits a repeated `key=value` flag argument, borrowing both halves.
fn split_pair<'a>(item: &'a str, flag: &str) -> Result<(&'a str, &'a str)> {
    match item.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key, value)),
        Some(_) => bail!("invalid {flag} value '{item}': empty key"),
        None => bail!("invalid {flag} value '{item}': expected key=value"),
    }
}

fn read_uploads(values: &[String]) -> Result<Option<Vec<Upload>>> {
    if values.is_empty() {
        return Ok(None);
    }
    values
        .iter()
        .map(|item| {
            let (field, path) = split_pair(item, "--file")?;
            Upload::from_path(field, path).with_context(|| format!("failed to read --file '{path}'"))
        })
        .collect::<Result<Vec<_>>>()
        .map(Some)
}

/// Decodes `--body` or `--body-file` with the codec the resource sends with,
/// so a YAML API takes YAML input.
fn read_body(resource: &Resource, input: &BodyInput) -> Result<Option<Value>> {
    let (raw, origin) = match (&input.body, &input.body_file) {
        (Some(text), _) => (text.clone().into_bytes(), "--body".to_owned()),
        (None, Some(path)) => {
            let bytes = fs::read(path)
                .with_context(|| format!("failed to read --body-file '{}'", path.display()))?;
            (bytes, format!("--body-file '{}'", path.display()))
        }
        (None, None) => return Ok(None),
    };
    let codec = resource.serializer().get_serializer(Some(resource.format()), None)?;
    let value = codec
        .loads(&raw)
        .with_context(|| format!("failed to parse {origin} as {}", codec.key()))?;
    Ok(Some(value))
}

fn print_outcome(outcome: &Outcome, include: bool, compact: bool) -> Result<()> {
    if let Some(response) = outcome.response().filter(|_| include) {
        print_head(response);
    }

    match outcome.decoded() {
        Some(Body::Value(value)) => print_json(value, compact),
        Some(Body::Raw(bytes)) if !bytes.is_empty() => {
            println!("{}", String::from_utf8_lossy(bytes));
            Ok(())
        }
        _ => Ok(()),
    }
}

fn print_head(response: &Response) {
    println!("{}", response.status());
    for (name, value) in response.headers() {
        println!("{}: {}", name, value.to_str().unwrap_or("<binary>"));
    }
    println!();
}

/// Prints a JSON value either compact or pretty-formatted.
fn print_json(value: &Value, compact: bool) -> Result<()> {
    let rendered = if compact {
        serde_json::to_string(value)
    } else {
        serde_json::to_string_pretty(value)
    };
    println!("{}", rendered.context("Failed to render JSON")?);
    Ok(())
}
