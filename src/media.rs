//! Classification of a post's raw media references into displayable
//! content items.
//!
//! Everything here is a pure function of the post and the [`MediaPolicy`].
//! The substring heuristics are provider specific and live in the policy so
//! they can be swapped from configuration.

use crate::config::{self, MediaConfig};
use crate::post::Post;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaKind {
    Image,
    Video,
}

impl MediaKind {
    pub fn label(self) -> &'static str {
        match self {
            MediaKind::Image => "image",
            MediaKind::Video => "video",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Availability {
    /// Session-scoped handle from the capture browser; never resolvable later.
    LocalUnavailableTransient,
    /// A remote reference that failed to load, most likely behind auth.
    RemotePossiblyRestricted,
    Displayable,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaItem {
    pub source_url: String,
    pub kind: MediaKind,
    pub availability: Availability,
    display_url: Option<String>,
    transient: bool,
}

impl MediaItem {
    fn displayable(
        source_url: String,
        kind: MediaKind,
        display_url: String,
        transient: bool,
    ) -> Self {
        Self {
            source_url,
            kind,
            availability: Availability::Displayable,
            display_url: Some(display_url),
            transient,
        }
    }

    fn unavailable_transient(source_url: String, kind: MediaKind) -> Self {
        Self {
            source_url,
            kind,
            availability: Availability::LocalUnavailableTransient,
            display_url: None,
            transient: true,
        }
    }

    pub fn is_transient(&self) -> bool {
        self.transient
    }

    /// Set exactly when `availability` is [`Availability::Displayable`].
    pub fn display_url(&self) -> Option<&str> {
        self.display_url.as_deref()
    }

    /// Copy of this item as seen after the surface failed to load it.
    pub fn as_failed(&self) -> Self {
        let availability = if self.transient {
            Availability::LocalUnavailableTransient
        } else {
            Availability::RemotePossiblyRestricted
        };
        Self {
            source_url: self.source_url.clone(),
            kind: self.kind,
            availability,
            display_url: None,
            transient: self.transient,
        }
    }

    /// URL for the "view original" escape hatch. Transient handles have none.
    pub fn original_url(&self) -> Option<&str> {
        if self.transient {
            None
        } else {
            Some(self.source_url.as_str())
        }
    }
}

/// Replaceable predicate set used to classify references.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaPolicy {
    pub video_markers: Vec<String>,
    pub avatar_markers: Vec<String>,
    pub transient_schemes: Vec<String>,
    pub local_asset_base: String,
}

impl Default for MediaPolicy {
    fn default() -> Self {
        Self::from_config(&MediaConfig::default())
    }
}

impl MediaPolicy {
    pub fn from_config(cfg: &MediaConfig) -> Self {
        let lower = |items: &[String]| -> Vec<String> {
            items.iter().map(|item| item.to_ascii_lowercase()).collect()
        };
        Self {
            video_markers: lower(&cfg.video_markers),
            avatar_markers: lower(&cfg.avatar_markers),
            transient_schemes: if cfg.transient_schemes.is_empty() {
                config::default_transient_schemes()
            } else {
                lower(&cfg.transient_schemes)
            },
            local_asset_base: cfg.local_asset_base.clone(),
        }
    }

    pub fn is_transient(&self, reference: &str) -> bool {
        let lowered = reference.trim().to_ascii_lowercase();
        self.transient_schemes
            .iter()
            .any(|scheme| lowered.starts_with(scheme.as_str()))
    }

    pub fn classify(&self, reference: &str) -> MediaKind {
        if self.is_transient(reference) {
            return MediaKind::Video;
        }
        let lowered = reference.to_ascii_lowercase();
        let path = strip_query(&lowered);
        let is_video = self.video_markers.iter().any(|marker| {
            if marker.starts_with('.') {
                path.ends_with(marker.as_str()) || lowered.contains(&format!("{marker}?"))
            } else {
                lowered.contains(marker.as_str())
            }
        });
        if is_video {
            MediaKind::Video
        } else {
            MediaKind::Image
        }
    }

    pub fn is_avatar(&self, reference: &str) -> bool {
        let lowered = reference.to_ascii_lowercase();
        self.avatar_markers
            .iter()
            .any(|marker| lowered.contains(marker.as_str()))
    }

    /// Location of a cached copy written by the capture backend, which
    /// stores paths as `media_<session>/<file>` and serves them from
    /// `<base>/<session>/<file>`.
    pub fn local_asset_url(&self, cached_path: &str) -> String {
        let trimmed = cached_path.trim().trim_start_matches('/');
        let relative = match trimmed.split_once('/') {
            Some((dir, file)) => match dir.strip_prefix("media_") {
                Some(session) => format!("{session}/{file}"),
                None => trimmed.to_string(),
            },
            None => trimmed.to_string(),
        };
        let base = self.local_asset_base.trim_end_matches('/');
        format!("{base}/{relative}")
    }
}

fn strip_query(url: &str) -> &str {
    let end = url.find(['?', '#']).unwrap_or(url.len());
    &url[..end]
}

/// Content media for a post, in reference order, with avatar artifacts
/// removed. Cached paths are looked up by raw reference index.
pub fn resolve(post: &Post, policy: &MediaPolicy) -> Vec<MediaItem> {
    post.media_references
        .iter()
        .enumerate()
        .filter_map(|(raw_index, reference)| {
            let reference = reference.trim();
            if reference.is_empty() || policy.is_avatar(reference) {
                return None;
            }
            let kind = policy.classify(reference);
            let transient = policy.is_transient(reference);
            let item = match post.local_path(raw_index) {
                Some(cached) => MediaItem::displayable(
                    reference.to_string(),
                    kind,
                    policy.local_asset_url(cached),
                    transient,
                ),
                None if transient => MediaItem::unavailable_transient(reference.to_string(), kind),
                None => MediaItem::displayable(
                    reference.to_string(),
                    kind,
                    reference.to_string(),
                    false,
                ),
            };
            Some(item)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn post_with(media: &[&str]) -> Post {
        let mut post = Post::new(1, "content");
        post.media_references = media.iter().map(|m| m.to_string()).collect();
        post
    }

    #[test]
    fn classifies_video_markers() {
        let policy = MediaPolicy::default();
        assert_eq!(policy.classify("https://cdn.example.com/clip.MP4"), MediaKind::Video);
        assert_eq!(policy.classify("https://cdn.example.com/a.webm?token=1"), MediaKind::Video);
        assert_eq!(policy.classify("https://dms.example.com/playlist/vid/video-hd"), MediaKind::Video);
        assert_eq!(policy.classify("blob:https://www.example.com/uuid"), MediaKind::Video);
        assert_eq!(policy.classify("https://cdn.example.com/photo.jpg"), MediaKind::Image);
    }

    #[test]
    fn transient_reference_without_cache_is_unavailable() {
        let policy = MediaPolicy::default();
        let items = resolve(&post_with(&["blob:https://www.example.com/abc"]), &policy);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].availability, Availability::LocalUnavailableTransient);
        assert_eq!(items[0].display_url(), None);
        assert_eq!(items[0].original_url(), None);
    }

    #[test]
    fn cached_path_rewrites_display_url() {
        let policy = MediaPolicy::default();
        let mut post = post_with(&["https://cdn.example.com/a.jpg", "blob:https://x/1"]);
        post.local_media_paths = vec![String::new(), "media_s42/post_1_media_2_ab.mp4".into()];
        let items = resolve(&post, &policy);
        assert_eq!(items[0].display_url(), Some("https://cdn.example.com/a.jpg"));
        assert_eq!(items[1].availability, Availability::Displayable);
        assert_eq!(
            items[1].display_url(),
            Some("http://127.0.0.1:8000/media/s42/post_1_media_2_ab.mp4")
        );
    }

    #[test]
    fn avatar_artifacts_are_not_content() {
        let policy = MediaPolicy::default();
        let post = post_with(&[
            "https://media.example.com/dms/image/profile-displayphoto-shrink_100_100/0/1",
            "https://media.example.com/dms/image/feedshare-shrink_800/0/2",
            "",
        ]);
        let items = resolve(&post, &policy);
        assert_eq!(items.len(), 1);
        assert!(items[0].source_url.contains("feedshare"));
    }

    #[test]
    fn display_url_present_iff_displayable() {
        let policy = MediaPolicy::default();
        let post = post_with(&["a.jpg", "blob:x", "b.mp4"]);
        for item in resolve(&post, &policy) {
            assert_eq!(
                item.display_url().is_some(),
                item.availability == Availability::Displayable
            );
            let failed = item.as_failed();
            assert!(failed.display_url().is_none());
            assert_ne!(failed.availability, Availability::Displayable);
        }
    }

    #[test]
    fn empty_reference_list_yields_nothing() {
        let policy = MediaPolicy::default();
        assert!(resolve(&post_with(&[]), &policy).is_empty());
    }

    #[test]
    fn policy_markers_are_replaceable() {
        let policy = MediaPolicy::from_config(&MediaConfig {
            avatar_markers: vec!["AVATAR".into()],
            ..MediaConfig::default()
        });
        assert!(policy.is_avatar("https://x/avatar/1.png"));
        assert!(!policy.is_avatar("https://x/profile-photo/1.png"));
    }
}
