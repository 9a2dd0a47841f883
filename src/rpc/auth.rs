//! HTTP basic authentication for the node's JSON-RPC endpoint.

use anyhow::{Context, Result};
use base64::{engine::general_purpose::STANDARD as BASE64_STANDARD, Engine as _};
use jsonrpsee::http_client::{HeaderMap, HeaderValue};

const AUTHORIZATION: &str = "Authorization";

pub(crate) fn basic_auth_headers(user: &str, password: &str) -> Result<HeaderMap> {
    let encoded = BASE64_STANDARD.encode(format!("{user}:{password}"));
    let mut value = HeaderValue::from_str(&format!("Basic {encoded}"))
        .context("rpc credentials are not a valid header value")?;
    value.set_sensitive(true);

    let mut headers = HeaderMap::new();
    headers.insert(AUTHORIZATION, value);
    Ok(headers)
}
