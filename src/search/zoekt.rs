//! Client for the zoekt-webserver JSON search API.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::backends::{KeywordBackend, KeywordOptions};
use crate::config::ZoektConfig;
use crate::models::{KeywordMatch, KeywordResult, LineMatch};

pub struct ZoektClient {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl ZoektClient {
    pub fn new(client: reqwest::Client, config: &ZoektConfig) -> Self {
        Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }
}

#[derive(Serialize)]
struct SearchRequest<'a> {
    #[serde(rename = "Q")]
    q: &'a str,
    #[serde(rename = "Opts")]
    opts: SearchOpts,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct SearchOpts {
    max_doc_display_count: usize,
    num_context_lines: usize,
    whole: bool,
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(rename = "Result")]
    result: Option<ResultBody>,
}

#[derive(Deserialize)]
struct ResultBody {
    #[serde(rename = "Files", default)]
    files: Option<Vec<FileMatch>>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct FileMatch {
    file_name: String,
    #[serde(default)]
    repository: String,
    #[serde(default)]
    line_matches: Option<Vec<WireLineMatch>>,
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct WireLineMatch {
    #[serde(default)]
    line: Option<String>,
    #[serde(default)]
    line_number: usize,
    #[serde(default)]
    before: Option<String>,
    #[serde(default)]
    after: Option<String>,
}

#[async_trait]
impl KeywordBackend for ZoektClient {
    async fn search(&self, query: &str, opts: KeywordOptions) -> Result<KeywordResult> {
        let url = format!("{}/api/search", self.base_url);
        let req = SearchRequest {
            q: query,
            opts: SearchOpts {
                max_doc_display_count: opts.max_docs,
                num_context_lines: opts.context_lines,
                whole: opts.whole,
            },
        };

        let resp = self
            .client
            .post(&url)
            .timeout(self.timeout)
            .json(&req)
            .send()
            .await
            .context("Failed to call zoekt search API")?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("zoekt search API returned {status}: {body}");
        }

        let body: SearchResponse = resp
            .json()
            .await
            .context("Failed to parse zoekt search response")?;

        let files = body
            .result
            .and_then(|r| r.files)
            .unwrap_or_default()
            .into_iter()
            .map(decode_file)
            .collect();

        Ok(KeywordResult { files })
    }
}

fn decode_file(file: FileMatch) -> KeywordMatch {
    KeywordMatch {
        file_name: file.file_name,
        repository: file.repository,
        line_matches: file
            .line_matches
            .unwrap_or_default()
            .into_iter()
            .map(|lm| LineMatch {
                line_number: lm.line_number,
                line: lm.line.map(|l| decode(&l)).unwrap_or_default(),
                before: lm.before.map(|b| decode(&b)).filter(|b| !b.is_empty()),
                after: lm.after.map(|a| decode(&a)).filter(|a| !a.is_empty()),
            })
            .collect(),
        content: file.content.map(|c| decode(&c)),
    }
}

/// Byte fields arrive base64 encoded; undecodable input is kept verbatim.
fn decode(field: &str) -> String {
    match STANDARD.decode(field) {
        Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
        Err(_) => field.to_string(),
    }
}
