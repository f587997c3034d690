use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use reqwest::blocking::Client as HttpClient;
use reqwest::header::USER_AGENT;
use reqwest::StatusCode;
use serde::Deserialize;
use thiserror::Error;
use url::Url;

use crate::config::BackendConfig;
use crate::import::{self, ImportError};
use crate::post::{Post, PostType};

/// Anything that can hand the viewer a collection of posts.
pub trait PostSource: Send + Sync {
    /// Short label shown in the status line.
    fn describe(&self) -> String;
    fn load(&self) -> Result<Vec<Post>>;
}

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("session {0} not found")]
    SessionNotFound(String),
    #[error("backend returned {status} for {url}")]
    Status { status: StatusCode, url: String },
    #[error("invalid backend url: {0}")]
    BaseUrl(#[from] url::ParseError),
    #[error(transparent)]
    Import(#[from] ImportError),
}

pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl PostSource for FileSource {
    fn describe(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }

    fn load(&self) -> Result<Vec<Post>> {
        let bytes = fs::read(&self.path)
            .with_context(|| format!("read posts file {}", self.path.display()))?;
        let posts = import::decode_payload(&bytes)
            .with_context(|| format!("decode posts file {}", self.path.display()))?;
        tracing::info!(path = %self.path.display(), count = posts.len(), "loaded posts file");
        Ok(posts)
    }
}

/// One saved capture session as listed by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SessionSummary {
    pub session_id: String,
    #[serde(default)]
    pub filename: String,
    #[serde(default)]
    pub timestamp: String,
}

#[derive(Debug, Deserialize)]
struct SessionList {
    #[serde(default)]
    sessions: Vec<SessionSummary>,
}

/// Read-only client for the capture backend's saved sessions.
#[derive(Clone)]
pub struct BackendClient {
    http: HttpClient,
    base_url: Url,
    user_agent: String,
}

impl BackendClient {
    pub fn new(cfg: &BackendConfig) -> Result<Self> {
        let mut base = cfg.base_url.trim().to_string();
        if !base.ends_with('/') {
            base.push('/');
        }
        let base_url = Url::parse(&base).map_err(SourceError::from)?;
        let http = HttpClient::builder()
            .timeout(cfg.timeout)
            .build()
            .context("backend: build http client")?;
        Ok(Self {
            http,
            base_url,
            user_agent: format!("post-reel/{}", crate::VERSION),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn list_sessions(&self) -> Result<Vec<SessionSummary>> {
        let url = self.base_url.join("sessions").map_err(SourceError::from)?;
        let resp = self.get(url)?;
        let list: SessionList = resp.json().context("backend: decode session list")?;
        Ok(list.sessions)
    }

    pub fn session_posts(&self, session_id: &str) -> Result<Vec<Post>> {
        let encoded =
            percent_encoding::utf8_percent_encode(session_id, percent_encoding::NON_ALPHANUMERIC)
                .to_string();
        let url = self
            .base_url
            .join(&format!("session/{encoded}"))
            .map_err(SourceError::from)?;
        let resp = match self.get(url) {
            Err(err) => match err.downcast_ref::<SourceError>() {
                Some(SourceError::Status { status, .. }) if *status == StatusCode::NOT_FOUND => {
                    return Err(SourceError::SessionNotFound(session_id.to_string()).into());
                }
                _ => return Err(err),
            },
            Ok(resp) => resp,
        };
        let bytes = resp.bytes().context("backend: session body")?;
        let posts = import::decode_payload(&bytes).map_err(SourceError::from)?;
        Ok(posts)
    }

    fn get(&self, url: Url) -> Result<reqwest::blocking::Response> {
        tracing::debug!(%url, "backend request");
        let resp = self
            .http
            .get(url.clone())
            .header(USER_AGENT, &self.user_agent)
            .send()
            .with_context(|| format!("backend: request {url}"))?;
        if resp.status().is_success() {
            Ok(resp)
        } else {
            Err(SourceError::Status {
                status: resp.status(),
                url: url.to_string(),
            }
            .into())
        }
    }
}

pub struct SessionSource {
    client: BackendClient,
    session_id: String,
}

impl SessionSource {
    pub fn new(client: BackendClient, session_id: impl Into<String>) -> Self {
        Self {
            client,
            session_id: session_id.into(),
        }
    }

    /// Resolves the most recent session when no id is given.
    pub fn latest(client: BackendClient) -> Result<Self> {
        let sessions = client.list_sessions()?;
        let first = sessions
            .into_iter()
            .next()
            .context("backend has no saved sessions")?;
        Ok(Self::new(client, first.session_id))
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }
}

impl PostSource for SessionSource {
    fn describe(&self) -> String {
        format!("session {}", self.session_id)
    }

    fn load(&self) -> Result<Vec<Post>> {
        let posts = self
            .client
            .session_posts(&self.session_id)
            .with_context(|| format!("load session {}", self.session_id))?;
        tracing::info!(session = %self.session_id, count = posts.len(), "loaded session");
        Ok(posts)
    }
}

/// In-memory posts for demo mode and tests.
#[derive(Default)]
pub struct MockSource {
    posts: Vec<Post>,
}

impl MockSource {
    pub fn new(posts: Vec<Post>) -> Self {
        Self { posts }
    }

    pub fn demo() -> Self {
        Self::new(demo_posts())
    }
}

impl PostSource for MockSource {
    fn describe(&self) -> String {
        "demo feed".into()
    }

    fn load(&self) -> Result<Vec<Post>> {
        Ok(self.posts.clone())
    }
}

fn demo_posts() -> Vec<Post> {
    let mut welcome = Post::new(1, "Welcome to post-reel. Scroll with j/k, swipe media with h/l.");
    welcome.timestamp = Some("2024-03-04T09:30:00".into());
    welcome.author_name = Some("Post Reel".into());
    welcome.engagement.insert("reactions".into(), "42".into());
    welcome.engagement.insert("comments".into(), "7".into());

    let mut gallery = Post::new(2, "A gallery post with two images and a clip.");
    gallery.timestamp = Some("2024-03-03T18:05:00".into());
    gallery.post_type = PostType::Image;
    gallery.profile_identifier = Some("https://www.linkedin.com/in/jane-doe-4b1a2c9/".into());
    gallery.media_references = vec![
        "https://picsum.photos/seed/reel-1/800/600".into(),
        "https://picsum.photos/seed/reel-2/800/600".into(),
        "blob:https://www.linkedin.com/3f2a".into(),
    ];
    gallery.engagement.insert("shares".into(), "3".into());

    let mut article = Post::new(3, "Notes on building a terminal feed viewer.");
    article.post_type = PostType::Article;
    article.permalink = Some("https://www.example.com/notes".into());

    vec![welcome, gallery, article]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn file_source_decodes_enveloped_payload() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"posts":[{{"post_number":4,"content":"hi","post_type":"video"}}]}}"#
        )
        .unwrap();
        let posts = FileSource::new(file.path()).load().unwrap();
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].sequence_number, 4);
        assert_eq!(posts[0].post_type, PostType::Video);
    }

    #[test]
    fn file_source_reports_shape_errors() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"items":[]}}"#).unwrap();
        let err = FileSource::new(file.path()).load().unwrap_err();
        let import = err.downcast_ref::<ImportError>();
        assert!(matches!(import, Some(ImportError::UnrecognizedShape)));
    }

    #[test]
    fn missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(FileSource::new(dir.path().join("nope.json")).load().is_err());
    }

    #[test]
    fn backend_base_url_gets_trailing_slash() {
        let client = BackendClient::new(&BackendConfig {
            base_url: "http://localhost:9000/api".into(),
            ..BackendConfig::default()
        })
        .unwrap();
        assert_eq!(
            client.base_url().join("sessions").unwrap().as_str(),
            "http://localhost:9000/api/sessions"
        );
    }

    #[test]
    fn invalid_backend_url_is_rejected() {
        let result = BackendClient::new(&BackendConfig {
            base_url: "not a url".into(),
            ..BackendConfig::default()
        });
        assert!(result.is_err());
    }

    #[test]
    fn mock_source_serves_demo_posts() {
        let source = MockSource::demo();
        let posts = source.load().unwrap();
        assert_eq!(posts.len(), 3);
        assert!(posts.iter().any(|post| !post.media_references.is_empty()));
    }
}
