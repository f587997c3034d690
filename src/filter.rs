use std::cmp::Ordering;
use std::fmt;

use chrono::{DateTime, Utc};

use crate::post::{Post, PostType};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TypeFilter {
    #[default]
    All,
    Only(PostType),
}

impl TypeFilter {
    pub fn from_key(key: &str) -> Option<Self> {
        if key.trim().eq_ignore_ascii_case("all") {
            return Some(TypeFilter::All);
        }
        PostType::from_key(key).map(TypeFilter::Only)
    }

    pub fn matches(self, post: &Post) -> bool {
        match self {
            TypeFilter::All => true,
            TypeFilter::Only(kind) => post.post_type == kind,
        }
    }

    /// Next entry in the selector order: all, text, image, video, article, repost.
    pub fn cycle(self) -> Self {
        match self {
            TypeFilter::All => TypeFilter::Only(PostType::ALL[0]),
            TypeFilter::Only(kind) => {
                let position = PostType::ALL.iter().position(|k| *k == kind).unwrap_or(0);
                match PostType::ALL.get(position + 1) {
                    Some(next) => TypeFilter::Only(*next),
                    None => TypeFilter::All,
                }
            }
        }
    }
}

impl fmt::Display for TypeFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeFilter::All => f.write_str("all"),
            TypeFilter::Only(kind) => write!(f, "{kind}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ViewMode {
    #[default]
    Single,
    Grid,
}

impl ViewMode {
    pub fn toggle(self) -> Self {
        match self {
            ViewMode::Single => ViewMode::Grid,
            ViewMode::Grid => ViewMode::Single,
        }
    }
}

/// Owns the source collection and produces the ordered working set.
/// Every change recomputes the whole set.
#[derive(Debug, Default)]
pub struct FeedFilterEngine {
    source: Vec<Post>,
    search: String,
    type_filter: TypeFilter,
    working: Vec<usize>,
}

impl FeedFilterEngine {
    pub fn new(posts: Vec<Post>) -> Self {
        let mut engine = Self {
            source: posts,
            ..Self::default()
        };
        engine.recompute();
        engine
    }

    pub fn set_source(&mut self, posts: Vec<Post>) {
        self.source = posts;
        self.recompute();
    }

    pub fn set_search(&mut self, term: impl Into<String>) {
        self.search = term.into();
        self.recompute();
    }

    pub fn set_type_filter(&mut self, filter: TypeFilter) {
        self.type_filter = filter;
        self.recompute();
    }

    pub fn search(&self) -> &str {
        &self.search
    }

    pub fn type_filter(&self) -> TypeFilter {
        self.type_filter
    }

    pub fn source_len(&self) -> usize {
        self.source.len()
    }

    pub fn len(&self) -> usize {
        self.working.len()
    }

    pub fn is_empty(&self) -> bool {
        self.working.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Post> {
        self.working.get(index).map(|source| &self.source[*source])
    }

    pub fn working_set(&self) -> Vec<&Post> {
        self.working.iter().map(|index| &self.source[*index]).collect()
    }

    fn recompute(&mut self) {
        let needle = self.search.trim().to_lowercase();
        let keys: Vec<Option<DateTime<Utc>>> =
            self.source.iter().map(Post::parsed_timestamp).collect();

        let mut order: Vec<usize> = (0..self.source.len()).collect();
        // Stable: equal and undated posts keep their input order.
        order.sort_by(|a, b| newest_first(keys[*a], keys[*b]));

        self.working = order
            .into_iter()
            .filter(|index| {
                let post = &self.source[*index];
                self.type_filter.matches(post)
                    && (needle.is_empty() || post.content.to_lowercase().contains(&needle))
            })
            .collect();
        tracing::debug!(
            search = %self.search,
            type_filter = %self.type_filter,
            total = self.source.len(),
            matched = self.working.len(),
            "working set recomputed"
        );
    }
}

/// Dated posts first, newest to oldest; undated posts after them.
fn newest_first(a: Option<DateTime<Utc>>, b: Option<DateTime<Utc>>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => b.cmp(&a),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Page bookkeeping for the grid view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pager {
    page_size: usize,
    current: usize,
}

const PAGE_WINDOW: usize = 5;

impl Pager {
    pub fn new(page_size: usize) -> Self {
        Self {
            page_size: page_size.max(1),
            current: 1,
        }
    }

    pub fn reset(&mut self) {
        self.current = 1;
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// 1-based current page.
    pub fn current(&self) -> usize {
        self.current
    }

    pub fn total_pages(&self, items: usize) -> usize {
        items.div_ceil(self.page_size)
    }

    pub fn range(&self, items: usize) -> std::ops::Range<usize> {
        let start = ((self.current - 1) * self.page_size).min(items);
        let end = (start + self.page_size).min(items);
        start..end
    }

    pub fn next(&mut self, items: usize) -> bool {
        if self.current < self.total_pages(items) {
            self.current += 1;
            true
        } else {
            false
        }
    }

    pub fn previous(&mut self) -> bool {
        if self.current > 1 {
            self.current -= 1;
            true
        } else {
            false
        }
    }

    pub fn go_to(&mut self, page: usize, items: usize) {
        self.current = page.clamp(1, self.total_pages(items).max(1));
    }

    /// Page numbers for the page strip, at most five, windowed around the
    /// current page.
    pub fn window(&self, items: usize) -> Vec<usize> {
        let total = self.total_pages(items);
        if total <= PAGE_WINDOW {
            return (1..=total).collect();
        }
        let first = if self.current <= 3 {
            1
        } else if self.current >= total - 2 {
            total - (PAGE_WINDOW - 1)
        } else {
            self.current - 2
        };
        (first..first + PAGE_WINDOW).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn post(seq: i64, ts: Option<&str>, kind: PostType, content: &str) -> Post {
        let mut post = Post::new(seq, content);
        post.timestamp = ts.map(String::from);
        post.post_type = kind;
        post
    }

    fn sequence(engine: &FeedFilterEngine) -> Vec<i64> {
        engine
            .working_set()
            .iter()
            .map(|post| post.sequence_number)
            .collect()
    }

    #[test]
    fn sorts_newest_first_and_filters_by_type() {
        let mut first = post(1, Some("2024-01-01"), PostType::Image, "one");
        first.media_references = vec!["a.jpg".into()];
        let second = post(2, Some("2024-02-01"), PostType::Text, "two");
        let mut engine = FeedFilterEngine::new(vec![first, second]);
        assert_eq!(sequence(&engine), vec![2, 1]);
        engine.set_type_filter(TypeFilter::Only(PostType::Image));
        assert_eq!(sequence(&engine), vec![1]);
    }

    #[test]
    fn undated_posts_keep_input_order_after_dated_ones() {
        let posts = vec![
            post(1, None, PostType::Text, "a"),
            post(2, Some("2024-01-01"), PostType::Text, "b"),
            post(3, None, PostType::Text, "c"),
            post(4, Some("2024-01-01"), PostType::Text, "d"),
            post(5, Some("not a date"), PostType::Text, "e"),
        ];
        let mut engine = FeedFilterEngine::new(posts);
        assert_eq!(sequence(&engine), vec![2, 4, 1, 3, 5]);
        engine.set_search("");
        assert_eq!(sequence(&engine), vec![2, 4, 1, 3, 5]);
    }

    #[test]
    fn type_then_all_restores_order() {
        let posts = vec![
            post(1, Some("2024-03-01"), PostType::Video, "launch video"),
            post(2, Some("2024-05-01"), PostType::Text, "launch notes"),
            post(3, None, PostType::Image, "launch photo"),
            post(4, Some("2024-04-01"), PostType::Article, "other"),
        ];
        let mut engine = FeedFilterEngine::new(posts);
        engine.set_search("LAUNCH");
        let before = sequence(&engine);
        engine.set_type_filter(TypeFilter::Only(PostType::Video));
        assert_eq!(sequence(&engine), vec![1]);
        engine.set_type_filter(TypeFilter::All);
        assert_eq!(sequence(&engine), before);
        assert_eq!(before, vec![2, 1, 3]);
    }

    #[test]
    fn search_is_case_insensitive_substring() {
        let posts = vec![
            post(1, None, PostType::Text, "Rust in Production"),
            post(2, None, PostType::Text, "Gardening"),
        ];
        let mut engine = FeedFilterEngine::new(posts);
        engine.set_search("rust IN");
        assert_eq!(sequence(&engine), vec![1]);
        engine.set_search("zzz");
        assert!(engine.is_empty());
    }

    #[test]
    fn replacing_source_recomputes() {
        let mut engine = FeedFilterEngine::new(vec![post(1, None, PostType::Text, "a")]);
        engine.set_type_filter(TypeFilter::Only(PostType::Text));
        engine.set_source(vec![
            post(7, None, PostType::Image, "x"),
            post(8, None, PostType::Text, "y"),
        ]);
        assert_eq!(sequence(&engine), vec![8]);
    }

    #[test]
    fn type_filter_cycles_through_all_types() {
        let mut filter = TypeFilter::All;
        let mut seen = Vec::new();
        for _ in 0..6 {
            filter = filter.cycle();
            seen.push(filter.to_string());
        }
        assert_eq!(seen, ["text", "image", "video", "article", "repost", "all"]);
        assert_eq!(TypeFilter::from_key("ALL"), Some(TypeFilter::All));
        assert_eq!(
            TypeFilter::from_key("video"),
            Some(TypeFilter::Only(PostType::Video))
        );
    }

    #[test]
    fn pager_windows_page_numbers() {
        let mut pager = Pager::new(6);
        let items = 60;
        assert_eq!(pager.total_pages(items), 10);
        assert_eq!(pager.window(items), vec![1, 2, 3, 4, 5]);
        pager.go_to(6, items);
        assert_eq!(pager.window(items), vec![4, 5, 6, 7, 8]);
        pager.go_to(9, items);
        assert_eq!(pager.window(items), vec![6, 7, 8, 9, 10]);
        assert_eq!(pager.range(items), 48..54);
        assert!(pager.next(items));
        assert!(!pager.next(items));
        assert_eq!(pager.range(items), 54..60);
    }

    #[test]
    fn pager_handles_small_sets() {
        let mut pager = Pager::new(6);
        assert_eq!(pager.window(4), vec![1]);
        assert_eq!(pager.range(4), 0..4);
        assert!(!pager.previous());
        assert_eq!(pager.window(0), Vec::<usize>::new());
        assert_eq!(pager.range(0), 0..0);
    }
}
