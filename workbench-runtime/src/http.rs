use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue};
use reqwest::{StatusCode, Url};

use crate::error::{Result, WorkbenchError};
use crate::util::http_client;

pub fn build_url(base: &str, path: &str) -> Result<Url> {
    let base_url =
        Url::parse(base).map_err(|err| WorkbenchError::Http(format!("Invalid base URL: {err}")))?;
    base_url
        .join(path)
        .map_err(|err| WorkbenchError::Http(format!("Invalid path '{path}': {err}")))
}

pub fn bearer_headers(token: Option<&str>) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
    if let Some(token) = token {
        let value = HeaderValue::from_str(&format!("Bearer {token}"))
            .map_err(|_| WorkbenchError::Http("Invalid auth token".into()))?;
        headers.insert(AUTHORIZATION, value);
    }
    Ok(headers)
}

/// GET a URL and return (status, body text). Non-2xx is an error.
pub async fn get_text(url: Url, headers: HeaderMap) -> Result<(StatusCode, String)> {
    let client = http_client()?;
    let response = client
        .get(url)
        .headers(headers)
        .send()
        .await
        .map_err(|err| WorkbenchError::Http(format!("HTTP request failed: {err}")))?;
    let status = response.status();
    let text = response
        .text()
        .await
        .map_err(|err| WorkbenchError::Http(format!("Failed to read response body: {err}")))?;

    if !status.is_success() {
        return Err(WorkbenchError::Http(format!("HTTP {status}: {text}")));
    }

    Ok((status, text))
}
