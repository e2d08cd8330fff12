//! Source-host project importer.
//!
//! Pulls a Rust project out of a GitHub-style hosting API: repository
//! metadata for the default branch, a recursive tree listing, then the
//! file bodies (raw endpoint for bulk download, contents endpoint with
//! base64 for single blobs). Imported trees are filtered down to the
//! files a contract project actually needs before download.

use std::sync::atomic::{AtomicI64, Ordering};

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::config::WorkbenchConfig;
use crate::error::{Result, WorkbenchError};
use crate::http::{bearer_headers, build_url, get_text};
use crate::util::http_client;
use crate::workspace::ProjectFile;

const DEFAULT_API_BASE: &str = "https://api.github.com";
const DEFAULT_RAW_BASE: &str = "https://raw.githubusercontent.com";

/// Extensions worth importing into a workspace. Everything else in the
/// repository (images, CI config, lockfiles for other ecosystems) is
/// noise for a contract build.
const PROJECT_EXTENSIONS: &[&str] = &["rs", "toml", "md", "txt", "lock", "gitignore"];

#[derive(Debug, Deserialize)]
pub struct RepoInfo {
    pub name: String,
    pub default_branch: String,
}

#[derive(Debug, Deserialize)]
pub struct TreeEntry {
    pub path: String,
    #[serde(rename = "type")]
    pub entry_type: String,
    pub sha: String,
}

#[derive(Debug, Deserialize)]
pub struct RepoTree {
    pub tree: Vec<TreeEntry>,
    #[serde(default)]
    pub truncated: bool,
}

#[derive(Debug, Deserialize)]
struct BlobContent {
    content: String,
    encoding: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ImportStage {
    Validating,
    FetchingTree,
    Downloading,
    Complete,
    Failed,
}

#[derive(Clone, Debug, Serialize)]
pub struct ImportProgress {
    pub stage: ImportStage,
    pub message: String,
    pub progress_pct: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub files_total: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub files_downloaded: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_file: Option<String>,
}

impl ImportProgress {
    fn new(stage: ImportStage, message: impl Into<String>, progress_pct: u8) -> Self {
        Self {
            stage,
            message: message.into(),
            progress_pct,
            files_total: None,
            files_downloaded: None,
            current_file: None,
        }
    }
}

/// Client for one source-host API. Rate-limit counters come back on
/// every API response and are tracked so callers can back off before
/// the host starts returning 403s.
pub struct SourceHostClient {
    api_base: String,
    raw_base: String,
    token: Option<String>,
    rate_limit_remaining: AtomicI64,
    rate_limit_reset: AtomicI64,
}

impl SourceHostClient {
    pub fn new() -> Self {
        Self::with_bases(
            DEFAULT_API_BASE,
            DEFAULT_RAW_BASE,
            WorkbenchConfig::load().source_host_token.clone(),
        )
    }

    pub fn with_bases(
        api_base: impl Into<String>,
        raw_base: impl Into<String>,
        token: Option<String>,
    ) -> Self {
        Self {
            api_base: api_base.into(),
            raw_base: raw_base.into(),
            token,
            rate_limit_remaining: AtomicI64::new(-1),
            rate_limit_reset: AtomicI64::new(-1),
        }
    }

    /// Remaining API quota and its reset timestamp (unix seconds), if a
    /// response has reported them yet.
    pub fn rate_limit_status(&self) -> (Option<i64>, Option<i64>) {
        let read = |cell: &AtomicI64| {
            let value = cell.load(Ordering::Relaxed);
            (value >= 0).then_some(value)
        };
        (
            read(&self.rate_limit_remaining),
            read(&self.rate_limit_reset),
        )
    }

    pub async fn repo(&self, owner: &str, repo: &str) -> Result<RepoInfo> {
        let url = build_url(&self.api_base, &format!("/repos/{owner}/{repo}"))?;
        self.get_api(url).await
    }

    pub async fn default_branch(&self, owner: &str, repo: &str) -> Result<String> {
        Ok(self.repo(owner, repo).await?.default_branch)
    }

    pub async fn tree(&self, owner: &str, repo: &str, branch: &str) -> Result<RepoTree> {
        let mut url = build_url(
            &self.api_base,
            &format!("/repos/{owner}/{repo}/git/trees/{branch}"),
        )?;
        url.query_pairs_mut().append_pair("recursive", "1");
        self.get_api(url).await
    }

    /// Fetch a single file through the contents endpoint and decode its
    /// base64 body.
    pub async fn blob_content(
        &self,
        owner: &str,
        repo: &str,
        path: &str,
        reference: Option<&str>,
    ) -> Result<String> {
        let mut url = build_url(
            &self.api_base,
            &format!("/repos/{owner}/{repo}/contents/{path}"),
        )?;
        if let Some(reference) = reference {
            url.query_pairs_mut().append_pair("ref", reference);
        }
        let blob: BlobContent = self.get_api(url).await?;
        if blob.encoding != "base64" {
            return Err(WorkbenchError::Http(format!(
                "Unexpected blob encoding: {}",
                blob.encoding
            )));
        }
        let compact: String = blob.content.split_whitespace().collect();
        let bytes = BASE64
            .decode(compact)
            .map_err(|err| WorkbenchError::Http(format!("Invalid base64 blob: {err}")))?;
        String::from_utf8(bytes)
            .map_err(|_| WorkbenchError::Http("Blob content is not valid UTF-8".into()))
    }

    /// Fetch a file body from the raw endpoint. Faster than the
    /// contents endpoint for bulk downloads and skips base64.
    pub async fn raw_file(
        &self,
        owner: &str,
        repo: &str,
        branch: &str,
        path: &str,
    ) -> Result<String> {
        let url = build_url(&self.raw_base, &format!("/{owner}/{repo}/{branch}/{path}"))?;
        let (_, body) = get_text(url, bearer_headers(None)?).await?;
        Ok(body)
    }

    /// Download a full project: resolve the branch, list the tree,
    /// filter to project files, fetch each body. Individual file
    /// failures are logged and skipped; an empty result is an error.
    pub async fn import_project(
        &self,
        owner: &str,
        repo: &str,
        branch: Option<&str>,
        mut on_progress: impl FnMut(ImportProgress),
    ) -> Result<Vec<ProjectFile>> {
        let run = async {
            on_progress(ImportProgress::new(
                ImportStage::Validating,
                format!("Checking repository {owner}/{repo}..."),
                10,
            ));
            let target_branch = match branch {
                Some(branch) => branch.to_string(),
                None => self.default_branch(owner, repo).await?,
            };

            on_progress(ImportProgress::new(
                ImportStage::FetchingTree,
                "Fetching repository structure...",
                30,
            ));
            let tree = self.tree(owner, repo, &target_branch).await?;
            let entries = filter_project_entries(&tree);
            validate_project_tree(&entries)?;

            let total = entries.len();
            let mut files = Vec::with_capacity(total);
            for (index, entry) in entries.iter().enumerate() {
                let mut progress = ImportProgress::new(
                    ImportStage::Downloading,
                    format!("Downloading {}...", entry.path),
                    (50 + index * 40 / total) as u8,
                );
                progress.files_total = Some(total);
                progress.files_downloaded = Some(files.len());
                progress.current_file = Some(entry.path.clone());
                on_progress(progress);

                match self
                    .raw_file(owner, repo, &target_branch, &entry.path)
                    .await
                {
                    Ok(content) => files.push(ProjectFile {
                        path: entry.path.clone(),
                        content,
                    }),
                    Err(err) => warn!("skipping {}: {err}", entry.path),
                }
            }

            if files.is_empty() {
                return Err(WorkbenchError::Http(
                    "Failed to download any files from repository".into(),
                ));
            }

            let mut done = ImportProgress::new(
                ImportStage::Complete,
                format!("Loaded {} files from {owner}/{repo}", files.len()),
                100,
            );
            done.files_total = Some(total);
            done.files_downloaded = Some(files.len());
            on_progress(done);
            Ok(files)
        };

        let outcome = run.await;
        match outcome {
            Ok(files) => Ok(files),
            Err(err) => {
                on_progress(ImportProgress::new(ImportStage::Failed, err.to_string(), 0));
                Err(err)
            }
        }
    }

    async fn get_api<T: serde::de::DeserializeOwned>(&self, url: reqwest::Url) -> Result<T> {
        let response = http_client()?
            .get(url)
            .headers(bearer_headers(self.token.as_deref())?)
            .send()
            .await
            .map_err(|err| WorkbenchError::Http(format!("HTTP request failed: {err}")))?;

        for (header, cell) in [
            ("x-ratelimit-remaining", &self.rate_limit_remaining),
            ("x-ratelimit-reset", &self.rate_limit_reset),
        ] {
            if let Some(value) = response
                .headers()
                .get(header)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<i64>().ok())
            {
                cell.store(value, Ordering::Relaxed);
            }
        }

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(WorkbenchError::NotFound("Repository not found".into()));
        }
        if status == reqwest::StatusCode::FORBIDDEN {
            return Err(WorkbenchError::Http(
                "Rate limit exceeded. Please try again later.".into(),
            ));
        }
        if !status.is_success() {
            return Err(WorkbenchError::Http(format!(
                "Source host returned HTTP {status}"
            )));
        }
        response
            .json()
            .await
            .map_err(|err| WorkbenchError::Http(format!("Invalid response JSON: {err}")))
    }
}

impl Default for SourceHostClient {
    fn default() -> Self {
        Self::new()
    }
}

fn project_extension(path: &str) -> Option<&str> {
    path.rsplit('.').next()
}

/// Keep only blobs whose extension a contract project can use.
pub fn filter_project_entries(tree: &RepoTree) -> Vec<&TreeEntry> {
    tree.tree
        .iter()
        .filter(|entry| entry.entry_type == "blob")
        .filter(|entry| {
            project_extension(&entry.path)
                .map(|ext| PROJECT_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
                .unwrap_or(false)
        })
        .collect()
}

/// A usable project needs Rust sources and a root manifest.
pub fn validate_project_tree(entries: &[&TreeEntry]) -> Result<()> {
    if !entries.iter().any(|entry| entry.path.ends_with(".rs")) {
        return Err(WorkbenchError::Validation(
            "No Rust files found in repository".into(),
        ));
    }
    if !entries.iter().any(|entry| entry.path == "Cargo.toml") {
        return Err(WorkbenchError::Validation(
            "No Cargo.toml found in repository".into(),
        ));
    }
    Ok(())
}
