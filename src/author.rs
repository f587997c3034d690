use once_cell::sync::Lazy;
use percent_encoding::percent_decode_str;
use regex::Regex;
use url::Url;

use crate::config::AuthorConfig;
use crate::post::Post;

static PROFILE_SLUG: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)linkedin\.com/(?:in|company)/([^/?#]+)").expect("profile slug pattern")
});

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Author {
    pub name: String,
    pub initials: String,
    /// Explicit avatar, normalized to an absolute https URL.
    pub avatar_url: Option<String>,
    pub placeholder_avatar_url: String,
}

impl Author {
    pub fn avatar_chain(&self) -> AvatarChain {
        AvatarChain::new(self)
    }
}

#[derive(Debug, Clone)]
pub struct AuthorResolver {
    placeholder_name: String,
    avatar_service: String,
}

impl Default for AuthorResolver {
    fn default() -> Self {
        Self::new(&AuthorConfig::default())
    }
}

impl AuthorResolver {
    pub fn new(cfg: &AuthorConfig) -> Self {
        Self {
            placeholder_name: cfg.placeholder_name.clone(),
            avatar_service: cfg.avatar_service.clone(),
        }
    }

    pub fn resolve(&self, post: &Post) -> Author {
        let name = post
            .author_name
            .clone()
            .or_else(|| post.profile_identifier.as_deref().and_then(name_from_profile))
            .unwrap_or_else(|| self.placeholder_name.clone());
        let initials = initials(&name);
        let avatar_url = post
            .author_avatar
            .as_deref()
            .filter(|raw| !raw.trim_start().to_ascii_lowercase().starts_with("data:"))
            .and_then(normalize_avatar_url);
        let placeholder_avatar_url = self.placeholder_avatar(&initials);
        Author {
            name,
            initials,
            avatar_url,
            placeholder_avatar_url,
        }
    }

    fn placeholder_avatar(&self, initials: &str) -> String {
        match Url::parse(&self.avatar_service) {
            Ok(mut url) => {
                url.query_pairs_mut()
                    .append_pair("name", initials)
                    .append_pair("background", "random");
                url.to_string()
            }
            Err(_) => format!("{}?name={}", self.avatar_service, initials),
        }
    }
}

/// Display name derived from a profile URL slug such as `jane-q-doe-4b1a2c`.
pub fn name_from_profile(profile: &str) -> Option<String> {
    let caps = PROFILE_SLUG.captures(profile)?;
    let slug = percent_decode_str(caps.get(1)?.as_str())
        .decode_utf8_lossy()
        .into_owned();
    let mut words: Vec<&str> = slug
        .split(['-', '_', '.', ' '])
        .filter(|word| !word.is_empty())
        .collect();
    // Trailing disambiguation tokens ("4b1a2c", "123456") are not part of the name.
    while words.len() > 1 && words.last().is_some_and(|word| is_disambiguator(word)) {
        words.pop();
    }
    if words.is_empty() {
        return None;
    }
    Some(
        words
            .into_iter()
            .map(title_case)
            .collect::<Vec<_>>()
            .join(" "),
    )
}

fn is_disambiguator(word: &str) -> bool {
    word.len() >= 4
        && word.chars().any(|c| c.is_ascii_digit())
        && word.chars().all(|c| c.is_ascii_hexdigit())
}

fn title_case(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(char::to_lowercase))
            .collect(),
        None => String::new(),
    }
}

pub fn initials(name: &str) -> String {
    let letters: String = name
        .split_whitespace()
        .filter_map(|word| word.chars().find(|c| c.is_alphanumeric()))
        .take(2)
        .flat_map(char::to_uppercase)
        .collect();
    if letters.is_empty() {
        "?".into()
    } else {
        letters
    }
}

pub fn normalize_avatar_url(raw: &str) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    let candidate = if let Some(rest) = raw.strip_prefix("//") {
        format!("https://{rest}")
    } else if let Some(rest) = raw.strip_prefix("http://") {
        format!("https://{rest}")
    } else if raw.starts_with("https://") {
        raw.to_string()
    } else if raw.contains("://") {
        return None;
    } else {
        format!("https://{}", raw.trim_start_matches('/'))
    };
    let url = Url::parse(&candidate).ok()?;
    url.host_str()?;
    Some(url.to_string())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AvatarStep {
    Primary(String),
    Placeholder(String),
    InitialsBadge(String),
}

/// Three-step avatar fallback. A load error moves one step down; a
/// successful load pins the current step.
#[derive(Debug, Clone)]
pub struct AvatarChain {
    step: AvatarStep,
    placeholder: String,
    initials: String,
    settled: bool,
}

impl AvatarChain {
    pub fn new(author: &Author) -> Self {
        let step = match &author.avatar_url {
            Some(url) => AvatarStep::Primary(url.clone()),
            None => AvatarStep::Placeholder(author.placeholder_avatar_url.clone()),
        };
        Self {
            step,
            placeholder: author.placeholder_avatar_url.clone(),
            initials: author.initials.clone(),
            settled: false,
        }
    }

    pub fn current(&self) -> &AvatarStep {
        &self.step
    }

    pub fn url(&self) -> Option<&str> {
        match &self.step {
            AvatarStep::Primary(url) | AvatarStep::Placeholder(url) => Some(url),
            AvatarStep::InitialsBadge(_) => None,
        }
    }

    pub fn on_loaded(&mut self) {
        self.settled = true;
    }

    pub fn on_load_error(&mut self) -> &AvatarStep {
        if self.settled {
            return &self.step;
        }
        self.step = match &self.step {
            AvatarStep::Primary(_) => AvatarStep::Placeholder(self.placeholder.clone()),
            AvatarStep::Placeholder(_) | AvatarStep::InitialsBadge(_) => {
                self.settled = true;
                AvatarStep::InitialsBadge(self.initials.clone())
            }
        };
        &self.step
    }
}
