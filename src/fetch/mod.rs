mod basic;
mod client;

pub use basic::BasicClient;
pub use client::HttpClient;

use crate::error::FetchError;
use crate::parser::error_message;
use reqwest::header::{CONTENT_TYPE, HeaderValue};
use reqwest::{Method, Request, Url};
use serde::Serialize;
use tracing::debug;

/// GETs `url` and returns the body of a successful response.
pub async fn fetch_bytes<C: HttpClient + ?Sized>(
    client: &C,
    url: Url,
) -> Result<Vec<u8>, FetchError> {
    execute(client, Request::new(Method::GET, url)).await
}

/// POSTs `body` as JSON to `url` and returns the body of a successful response.
pub async fn post_json<C, T>(client: &C, url: Url, body: &T) -> Result<Vec<u8>, FetchError>
where
    C: HttpClient + ?Sized,
    T: Serialize + ?Sized,
{
    let mut req = Request::new(Method::POST, url);
    req.headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    *req.body_mut() = Some(serde_json::to_vec(body)?.into());
    execute(client, req).await
}

async fn execute<C: HttpClient + ?Sized>(client: &C, req: Request) -> Result<Vec<u8>, FetchError> {
    let method = req.method().clone();
    let url = req.url().clone();

    let resp = client.execute(req).await?;
    let status = resp.status();
    let bytes = resp.bytes().await?.to_vec();
    debug!(%method, %url, status = status.as_u16(), bytes = bytes.len(), "Backend responded");

    if !status.is_success() {
        return Err(FetchError::Status {
            status: status.as_u16(),
            message: error_message(&bytes),
        });
    }
    Ok(bytes)
}
