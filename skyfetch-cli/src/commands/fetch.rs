//! Fetch command - issue a request through the middleware.

use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

use clap::Args;
use skyfetch::{CacheConfig, Client, RequestBody, RequestOptions, Response, ResponseBody};
use tracing::debug;

use super::{start_client, ResponseKind, TargetArg};
use crate::error::CliError;

/// Arguments for the fetch command.
#[derive(Debug, Args)]
pub struct FetchArgs {
    /// URL to fetch
    pub url: String,

    /// Query parameter as key=value (repeatable, order is kept)
    #[arg(short, long = "query", value_name = "KEY=VALUE")]
    pub query: Vec<String>,

    /// Send a POST with this body instead of a GET
    #[arg(long, value_name = "BODY")]
    pub post: Option<String>,

    /// Treat the POST body as JSON
    #[arg(long, requires = "post")]
    pub json_body: bool,

    /// Cache the response for this many seconds (0 disables caching)
    #[arg(short, long, default_value_t = 0)]
    pub expires_in: u64,

    /// Preferred cache backends, in order
    #[arg(short, long = "target", value_enum)]
    pub targets: Vec<TargetArg>,

    /// Retries for 429/5xx responses (defaults to the configured value)
    #[arg(short, long)]
    pub retries: Option<u32>,

    /// Abort the whole request after this many milliseconds
    #[arg(long, value_name = "MS")]
    pub timeout_ms: Option<u64>,

    /// Declared response shape
    #[arg(long = "as", value_enum, default_value = "json")]
    pub response_kind: ResponseKind,

    /// Issue the request this many times (shows caching at work)
    #[arg(long, default_value_t = 1)]
    pub repeat: u32,

    /// Write the body to a file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Print request statistics when done
    #[arg(long)]
    pub stats: bool,
}

/// Splits `key=value`; a missing `=` yields an empty value.
pub fn parse_query(pair: &str) -> Result<(String, String), CliError> {
    let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
    if key.is_empty() {
        return Err(CliError::Usage(format!("Invalid query parameter '{}'", pair)));
    }
    Ok((key.to_string(), value.to_string()))
}

fn options(args: &FetchArgs) -> RequestOptions {
    let mut options = RequestOptions::new().with_response_type(args.response_kind.into());
    if args.expires_in > 0 {
        let targets = args.targets.iter().copied().map(Into::into);
        options = options.with_cache(CacheConfig::expires_in(args.expires_in).with_targets(targets));
    }
    if let Some(retries) = args.retries {
        options = options.with_retries(retries);
    }
    if let Some(ms) = args.timeout_ms {
        options = options.with_timeout(Duration::from_millis(ms));
    }
    options
}

fn body(args: &FetchArgs) -> Result<Option<RequestBody>, CliError> {
    let Some(raw) = &args.post else {
        return Ok(None);
    };
    if args.json_body {
        let value = serde_json::from_str(raw)
            .map_err(|e| CliError::Usage(format!("POST body is not valid JSON: {}", e)))?;
        Ok(Some(RequestBody::Json(value)))
    } else {
        Ok(Some(RequestBody::Text(raw.clone())))
    }
}

async fn fetch_once(client: &Client, args: &FetchArgs, query: &[(String, String)]) -> Result<Response, CliError> {
    let options = options(args);
    let response = match body(args)? {
        Some(body) => client.post(&args.url, body, options).await?,
        None => {
            let query: Vec<(&str, &str)> = query.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect();
            client.get(&args.url, &query, options).await?
        }
    };
    Ok(response)
}

fn write_body(response: &Response, output: Option<&PathBuf>) -> Result<(), CliError> {
    let bytes = match &response.body {
        ResponseBody::Json(value) => serde_json::to_vec_pretty(value)
            .map_err(|e| CliError::Output(std::io::Error::other(e)))?,
        ResponseBody::Text(text) => text.as_bytes().to_vec(),
        ResponseBody::Bytes(bytes) => bytes.to_vec(),
    };

    match output {
        Some(path) => {
            std::fs::write(path, &bytes)?;
            eprintln!("Wrote {} bytes to {}", bytes.len(), path.display());
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(&bytes)?;
            stdout.write_all(b"\n")?;
        }
    }
    Ok(())
}

/// Run the fetch command.
pub async fn run(args: FetchArgs) -> Result<(), CliError> {
    let query = args
        .query
        .iter()
        .map(|pair| parse_query(pair))
        .collect::<Result<Vec<_>, _>>()?;

    let client = start_client().await?;
    debug!(url = %args.url, params = query.len(), repeat = args.repeat, "Starting fetch");
    let mut last = None;
    for attempt in 1..=args.repeat.max(1) {
        let response = fetch_once(&client, &args, &query).await;
        match &response {
            Ok(r) => eprintln!(
                "[{}] {} {} ({} bytes{})",
                attempt,
                r.status,
                r.status_text,
                r.body.len(),
                if r.from_cache() { ", cached" } else { "" }
            ),
            Err(e) => eprintln!("[{}] {}", attempt, e),
        }
        last = Some(response);
    }

    if args.stats {
        eprintln!();
        eprintln!("{}", client.stats());
    }
    client.shutdown().await;

    match last {
        Some(Ok(response)) => write_body(&response, args.output.as_ref()),
        Some(Err(e)) => Err(e),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_query() {
        assert_eq!(parse_query("z=12").unwrap(), ("z".into(), "12".into()));
        assert_eq!(parse_query("bbox=1,2=3").unwrap(), ("bbox".into(), "1,2=3".into()));
        assert_eq!(parse_query("flag").unwrap(), ("flag".into(), String::new()));
        assert!(parse_query("=x").is_err());
    }
}
