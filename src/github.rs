//! GitHub REST adapter
//!
//! Pull-request mode: the diff comes from the pulls endpoint with the diff
//! media type, revisions are the PR's base and head shas, and file content
//! is served through the contents endpoint with the raw media type.

use std::time::Duration;

use reqwest::blocking::{Client, Response};

use crate::{
   error::{Result, VigilError},
   provider::ContentProvider,
};

const API_BASE: &str = "https://api.github.com";

pub struct GithubClient {
   client:   Client,
   token:    Option<String>,
   api_base: String,
}

impl GithubClient {
   pub fn new(token: Option<String>) -> Result<Self> {
      let client = Client::builder()
         .timeout(Duration::from_secs(30))
         .connect_timeout(Duration::from_secs(10))
         .user_agent(concat!("vigil/", env!("CARGO_PKG_VERSION")))
         .build()?;
      Ok(Self { client, token, api_base: API_BASE.to_string() })
   }

   /// Point the client at a different API host (GitHub Enterprise, tests)
   pub fn with_api_base(mut self, base: &str) -> Self {
      self.api_base = base.trim_end_matches('/').to_string();
      self
   }

   fn get(&self, url: &str, accept: &str) -> Result<Response> {
      let mut request = self
         .client
         .get(url)
         .header("accept", accept)
         .header("x-github-api-version", "2022-11-28");
      if let Some(token) = &self.token {
         request = request.header("authorization", format!("Bearer {token}"));
      }
      Ok(request.send()?)
   }

   /// Unified diff of a pull request
   pub fn pr_diff(&self, owner: &str, repo: &str, number: u64) -> Result<String> {
      let url = format!("{}/repos/{owner}/{repo}/pulls/{number}", self.api_base);
      let response = self.get(&url, "application/vnd.github.v3.diff")?;
      let status = response.status();
      let body = response.text()?;
      if !status.is_success() {
         return Err(VigilError::GithubError { status: status.as_u16(), body });
      }
      Ok(body)
   }

   /// The (base sha, head sha) pair a pull request compares
   pub fn pr_refs(&self, owner: &str, repo: &str, number: u64) -> Result<(String, String)> {
      let url = format!("{}/repos/{owner}/{repo}/pulls/{number}", self.api_base);
      let response = self.get(&url, "application/vnd.github+json")?;
      let status = response.status();
      let body = response.text()?;
      if !status.is_success() {
         return Err(VigilError::GithubError { status: status.as_u16(), body });
      }

      let value: serde_json::Value = serde_json::from_str(&body)?;
      let sha = |side: &str| {
         value[side]["sha"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| VigilError::Other(format!("PR response missing {side}.sha")))
      };
      Ok((sha("base")?, sha("head")?))
   }
}

/// Content provider backed by the GitHub contents API
pub struct GithubContentProvider {
   client: GithubClient,
   owner:  String,
   repo:   String,
}

impl GithubContentProvider {
   pub fn new(client: GithubClient, owner: &str, repo: &str) -> Self {
      Self { client, owner: owner.to_string(), repo: repo.to_string() }
   }
}

impl ContentProvider for GithubContentProvider {
   fn fetch(&self, revision: &str, path: &str) -> Result<Option<String>> {
      let url = format!(
         "{}/repos/{}/{}/contents/{path}?ref={revision}",
         self.client.api_base, self.owner, self.repo
      );
      let response = self.client.get(&url, "application/vnd.github.raw")?;
      let status = response.status();

      // Absence is a value, not an error
      if status.as_u16() == 404 {
         return Ok(None);
      }

      let body = response.text()?;
      if !status.is_success() {
         return Err(VigilError::GithubError { status: status.as_u16(), body });
      }
      Ok(Some(body))
   }
}
