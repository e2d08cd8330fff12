use once_cell::sync::OnceCell;
use reqwest::Client;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::DEFAULT_HTTP_TIMEOUT_SECS;
use crate::error::{Result, WorkbenchError};

static HTTP_CLIENT: OnceCell<Client> = OnceCell::new();

pub fn http_client() -> Result<&'static Client> {
    HTTP_CLIENT.get_or_try_init(|| {
        Client::builder()
            .timeout(Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS))
            .build()
            .map_err(|err| WorkbenchError::Http(format!("Failed to build HTTP client: {err}")))
    })
}

/// Seconds since the Unix epoch.
pub fn now_ts() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
