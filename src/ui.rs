use std::io::{self, Stdout};
use std::path::PathBuf;
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};

use anyhow::{anyhow, bail, Context, Result};
use crossterm::event::{
    self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEventKind, MouseButton,
    MouseEvent, MouseEventKind,
};
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, window_size, EnterAlternateScreen, LeaveAlternateScreen,
};
use crossterm::ExecutableCommand;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph};
use ratatui::{Frame, Terminal};
use textwrap::{wrap, Options as WrapOptions};
use unicode_width::UnicodeWidthStr;

use crate::author::{AuthorResolver, AvatarChain, AvatarStep};
use crate::carousel::{self, CarouselController, CarouselKey, MediaView, GRADIENT_COUNT};
use crate::config::Config;
use crate::data::{FileSource, PostSource};
use crate::export;
use crate::filter::{FeedFilterEngine, Pager, TypeFilter, ViewMode};
use crate::gesture::SwipeTracker;
use crate::media::{self, Availability, MediaKind, MediaPolicy};
use crate::navigator::{NavigatorConfig, ScrollSyncNavigator};
use crate::post::{self, Post, ENGAGEMENT_KEYS};
use crate::probe::{self, Prober, Slot};

const TICK_RATE: Duration = Duration::from_millis(120);
const ANIMATION_FRAME: Duration = Duration::from_millis(16);
const WHEEL_STEP: isize = 3;
const GRID_COLUMNS: usize = 3;
const MAX_CAROUSEL_DOTS: usize = 12;
const SECTION_CHROME_ROWS: usize = 4;

const GRADIENT_COLORS: [Color; GRADIENT_COUNT] = [
    Color::Rgb(88, 91, 192),
    Color::Rgb(176, 82, 121),
    Color::Rgb(52, 132, 120),
    Color::Rgb(190, 120, 60),
    Color::Rgb(70, 110, 170),
    Color::Rgb(120, 80, 160),
];

#[derive(Clone, Copy)]
struct Palette {
    bg: Color,
    panel_bg: Color,
    focused_bg: Color,
    border_idle: Color,
    border_focused: Color,
    text_primary: Color,
    text_secondary: Color,
    accent: Color,
    success: Color,
    error: Color,
}

impl Palette {
    fn for_theme(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "light" => Self {
                bg: Color::Rgb(239, 241, 245),
                panel_bg: Color::Rgb(230, 233, 239),
                focused_bg: Color::Rgb(204, 208, 218),
                border_idle: Color::Rgb(188, 192, 204),
                border_focused: Color::Rgb(30, 102, 245),
                text_primary: Color::Rgb(76, 79, 105),
                text_secondary: Color::Rgb(108, 111, 133),
                accent: Color::Rgb(30, 102, 245),
                success: Color::Rgb(64, 160, 43),
                error: Color::Rgb(210, 15, 57),
            },
            other => {
                if other != "default" && other != "dark" {
                    tracing::warn!(theme = other, "unknown theme, using default");
                }
                Self {
                    bg: Color::Rgb(30, 30, 46),
                    panel_bg: Color::Rgb(24, 24, 36),
                    focused_bg: Color::Rgb(49, 50, 68),
                    border_idle: Color::Rgb(49, 50, 68),
                    border_focused: Color::Rgb(137, 180, 250),
                    text_primary: Color::Rgb(205, 214, 244),
                    text_secondary: Color::Rgb(166, 173, 200),
                    accent: Color::Rgb(137, 180, 250),
                    success: Color::Rgb(166, 227, 161),
                    error: Color::Rgb(243, 139, 168),
                }
            }
        }
    }
}

#[derive(Clone, Copy)]
struct CellMetrics {
    width: f64,
    height: f64,
}

/// Pixel size of one terminal cell. Terminals that do not report pixel
/// dimensions get a typical 8x16 cell.
fn terminal_cell_metrics() -> CellMetrics {
    static METRICS: OnceLock<CellMetrics> = OnceLock::new();
    *METRICS.get_or_init(|| {
        let fallback = CellMetrics {
            width: 8.0,
            height: 16.0,
        };
        window_size().ok().map_or(fallback, |size| {
            let columns = size.columns.max(1) as f64;
            let rows = size.rows.max(1) as f64;
            let width = if size.width > 0 {
                f64::from(size.width) / columns
            } else {
                fallback.width
            };
            let height = if size.height > 0 {
                f64::from(size.height) / rows
            } else {
                fallback.height
            };
            CellMetrics { width, height }
        })
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Focus {
    Feed,
    Media,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InputKind {
    Search,
    Import,
}

#[derive(Debug, Clone)]
struct Input {
    kind: InputKind,
    buffer: String,
    previous: String,
}

pub struct Options {
    pub status_message: String,
    pub posts: Vec<Post>,
    pub source: Option<Arc<dyn PostSource>>,
    pub source_label: String,
    pub config: Config,
    pub probe_media: bool,
}

pub struct Model {
    status_message: String,
    source: Option<Arc<dyn PostSource>>,
    source_label: String,
    feed: FeedFilterEngine,
    policy: MediaPolicy,
    authors: AuthorResolver,
    navigator: ScrollSyncNavigator,
    carousel: CarouselController,
    avatar: Option<(i64, AvatarChain)>,
    swipe: SwipeTracker,
    prober: Option<Prober>,
    view_mode: ViewMode,
    pager: Pager,
    grid_selected: usize,
    focus: Focus,
    input: Option<Input>,
    export_dir: PathBuf,
    palette: Palette,
    section_height: usize,
    feed_area: Rect,
    needs_redraw: bool,
}

impl Model {
    pub fn new(opts: Options) -> Self {
        let cfg = opts.config;
        let prober = if opts.probe_media {
            match Prober::new(probe::Config::from_media(&cfg.media)) {
                Ok(prober) => Some(prober),
                Err(err) => {
                    tracing::warn!(error = %err, "media probing disabled");
                    None
                }
            }
        } else {
            None
        };

        let mut navigator = ScrollSyncNavigator::new(NavigatorConfig {
            scroll_debounce: cfg.ui.scroll_debounce,
            controls_quiet_period: cfg.ui.controls_quiet_period,
        });
        let feed = FeedFilterEngine::new(opts.posts);
        navigator.rebind(feed.len(), 0);

        let mut model = Self {
            status_message: opts.status_message,
            source: opts.source,
            source_label: opts.source_label,
            feed,
            policy: MediaPolicy::from_config(&cfg.media),
            authors: AuthorResolver::new(&cfg.author),
            navigator,
            carousel: CarouselController::new(cfg.ui.carousel_interval),
            avatar: None,
            swipe: SwipeTracker::new(cfg.ui.swipe_threshold_px),
            prober,
            view_mode: ViewMode::Single,
            pager: Pager::new(cfg.ui.page_size),
            grid_selected: 0,
            focus: Focus::Feed,
            input: None,
            export_dir: cfg
                .export
                .directory
                .clone()
                .unwrap_or_else(|| PathBuf::from(".")),
            palette: Palette::for_theme(&cfg.ui.theme),
            section_height: 0,
            feed_area: Rect::default(),
            needs_redraw: true,
        };
        model.sync_active(Instant::now());
        model
    }

    pub fn apply_search(&mut self, term: &str) {
        self.feed.set_search(term);
        self.reset_working_set(Instant::now());
    }

    pub fn apply_type_filter(&mut self, filter: TypeFilter) {
        self.feed.set_type_filter(filter);
        self.reset_working_set(Instant::now());
    }

    pub fn run(&mut self) -> Result<()> {
        let mut stdout = io::stdout();
        enable_raw_mode()?;
        stdout.execute(EnterAlternateScreen)?;
        stdout.execute(EnableMouseCapture)?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;
        terminal.clear()?;

        let result = self.event_loop(&mut terminal);
        self.teardown();

        disable_raw_mode()?;
        terminal.backend_mut().execute(DisableMouseCapture)?;
        terminal.backend_mut().execute(LeaveAlternateScreen)?;
        terminal.show_cursor()?;

        result
    }

    fn event_loop(&mut self, terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
        let mut last_tick = Instant::now();

        loop {
            self.advance(Instant::now());

            let size = terminal.size()?;
            self.sync_viewport(size);

            if self.needs_redraw {
                terminal.draw(|frame| self.draw(frame))?;
                self.needs_redraw = false;
            }

            let timeout = if self.navigator.is_scrolling() {
                ANIMATION_FRAME
            } else {
                TICK_RATE
                    .checked_sub(last_tick.elapsed())
                    .unwrap_or(ANIMATION_FRAME)
            };

            if event::poll(timeout)? {
                match event::read()? {
                    Event::Key(key) if key.kind == KeyEventKind::Press => {
                        match self.handle_key(key.code) {
                            Ok(true) => break,
                            Ok(false) => {}
                            Err(err) => {
                                tracing::warn!(error = %err, "key action failed");
                                self.status_message = format!("Error: {err:#}");
                                self.mark_dirty();
                            }
                        }
                    }
                    Event::Mouse(mouse) => {
                        if let Err(err) = self.handle_mouse(mouse) {
                            self.status_message = format!("Error: {err:#}");
                            self.mark_dirty();
                        }
                    }
                    Event::Resize(_, _) => self.mark_dirty(),
                    _ => {}
                }
            }

            if last_tick.elapsed() >= TICK_RATE {
                last_tick = Instant::now();
            }
        }

        Ok(())
    }

    fn teardown(&mut self) {
        self.carousel.dispose();
        self.navigator.dispose();
        self.prober = None;
    }

    fn mark_dirty(&mut self) {
        self.needs_redraw = true;
    }

    /// Polls every owned timer and the probe results.
    fn advance(&mut self, now: Instant) {
        if self.navigator.tick(now) {
            self.sync_active(now);
            self.mark_dirty();
        }
        if self.carousel.tick(now) {
            self.mark_dirty();
        }
        if self.drain_probes() {
            self.mark_dirty();
        }
    }

    fn sync_viewport(&mut self, full: Rect) {
        let (_, feed, _) = screen_layout(full);
        self.feed_area = feed;
        let height = feed.height as usize;
        if height != self.section_height {
            self.section_height = height;
            self.navigator.resize(height);
            self.mark_dirty();
        }
    }

    fn active_index(&self) -> Option<usize> {
        if self.feed.is_empty() {
            return None;
        }
        match self.view_mode {
            ViewMode::Single => Some(self.navigator.current_index()),
            ViewMode::Grid => {
                let range = self.pager.range(self.feed.len());
                if range.is_empty() {
                    None
                } else {
                    Some(range.start + self.grid_selected.min(range.len() - 1))
                }
            }
        }
    }

    /// Points the carousel and avatar chain at whichever post is active.
    fn sync_active(&mut self, now: Instant) {
        let Some(index) = self.active_index() else {
            self.carousel.unmount();
            self.avatar = None;
            self.swipe.cancel();
            return;
        };
        let Some(post) = self.feed.get(index) else {
            return;
        };
        let sequence_number = post.sequence_number;
        let items = media::resolve(post, &self.policy);
        let author = self.authors.resolve(post);

        self.carousel.mount(sequence_number, items, now);
        if self.avatar.as_ref().map(|(owner, _)| *owner) != Some(sequence_number) {
            self.avatar = Some((sequence_number, author.avatar_chain()));
            self.request_avatar_probe();
        }
        self.request_media_probes();
    }

    fn request_media_probes(&mut self) {
        let (Some(prober), Some(owner)) = (self.prober.as_mut(), self.carousel.owner()) else {
            return;
        };
        for (index, item) in self.carousel.items().iter().enumerate() {
            if let Some(url) = item.display_url() {
                prober.request(probe::Request {
                    sequence_number: owner,
                    slot: Slot::Media(index),
                    url: url.to_string(),
                });
            }
        }
    }

    fn request_avatar_probe(&mut self) {
        let (Some(prober), Some((owner, chain))) = (self.prober.as_mut(), self.avatar.as_ref())
        else {
            return;
        };
        if let Some(url) = chain.url() {
            prober.request(probe::Request {
                sequence_number: *owner,
                slot: Slot::Avatar,
                url: url.to_string(),
            });
        }
    }

    fn drain_probes(&mut self) -> bool {
        let outcomes = match &self.prober {
            Some(prober) => prober.drain(),
            None => return false,
        };
        let mut changed = false;
        for outcome in outcomes {
            match outcome.slot {
                Slot::Media(index) => {
                    changed |= if outcome.result.is_ok() {
                        self.carousel.mark_loaded(outcome.sequence_number, index)
                    } else {
                        self.carousel.mark_errored(outcome.sequence_number, index)
                    };
                }
                Slot::Avatar => {
                    let Some((owner, chain)) = self.avatar.as_mut() else {
                        continue;
                    };
                    if *owner != outcome.sequence_number || chain.url() != Some(outcome.url.as_str()) {
                        continue;
                    }
                    if outcome.result.is_ok() {
                        chain.on_loaded();
                    } else {
                        chain.on_load_error();
                        self.request_avatar_probe();
                    }
                    changed = true;
                }
            }
        }
        changed
    }

    /// The working set changed: every binding starts over at the first post.
    fn reset_working_set(&mut self, now: Instant) {
        self.navigator.rebind(self.feed.len(), self.section_height);
        self.pager.reset();
        self.grid_selected = 0;
        self.sync_active(now);
        self.mark_dirty();
    }

    fn handle_key(&mut self, code: KeyCode) -> Result<bool> {
        if self.input.is_some() {
            return self.handle_input_key(code);
        }
        let now = Instant::now();

        match code {
            KeyCode::Char('q') | KeyCode::Esc => return Ok(true),
            KeyCode::Char('j') | KeyCode::Down | KeyCode::PageDown => self.step_post(1, now),
            KeyCode::Char('k') | KeyCode::Up | KeyCode::PageUp => self.step_post(-1, now),
            KeyCode::Home => match self.view_mode {
                ViewMode::Single => {
                    self.navigator.first_post(now);
                }
                ViewMode::Grid => self.grid_selected = 0,
            },
            KeyCode::End => match self.view_mode {
                ViewMode::Single => {
                    self.navigator.last_post(now);
                }
                ViewMode::Grid => {
                    self.grid_selected = self.pager.range(self.feed.len()).len().saturating_sub(1)
                }
            },
            KeyCode::Tab => {
                self.focus = match self.focus {
                    Focus::Feed => Focus::Media,
                    Focus::Media => Focus::Feed,
                };
            }
            KeyCode::Left if self.focus == Focus::Media => {
                self.carousel.handle_key(CarouselKey::Previous, now);
            }
            KeyCode::Right if self.focus == Focus::Media => {
                self.carousel.handle_key(CarouselKey::Next, now);
            }
            KeyCode::Char('h') => {
                self.carousel.previous(now);
            }
            KeyCode::Char('l') => {
                self.carousel.next(now);
            }
            KeyCode::Char(digit @ '1'..='9') => {
                let index = digit as usize - '1' as usize;
                if !self.carousel.jump_to(index, now) && !self.carousel.is_empty() {
                    self.status_message = format!("Only {} media items", self.carousel.len());
                }
            }
            KeyCode::Char('/') => self.begin_input(InputKind::Search),
            KeyCode::Char('i') => self.begin_input(InputKind::Import),
            KeyCode::Char('r') => self.reload_source(now)?,
            KeyCode::Char('t') => {
                let next = self.feed.type_filter().cycle();
                self.feed.set_type_filter(next);
                self.status_message = format!("Type filter: {next}");
                self.reset_working_set(now);
            }
            KeyCode::Char('g') => {
                self.view_mode = self.view_mode.toggle();
                self.reset_working_set(now);
            }
            KeyCode::Char('n') if self.view_mode == ViewMode::Grid => {
                if self.pager.next(self.feed.len()) {
                    self.grid_selected = 0;
                    self.sync_active(now);
                }
            }
            KeyCode::Char('p') if self.view_mode == ViewMode::Grid => {
                if self.pager.previous() {
                    self.grid_selected = 0;
                    self.sync_active(now);
                }
            }
            KeyCode::Enter if self.view_mode == ViewMode::Grid => self.open_in_single(now),
            KeyCode::Char('e') => self.export_working_set()?,
            KeyCode::Char('o') => self.open_permalink()?,
            KeyCode::Char('v') => self.open_original_media()?,
            KeyCode::Char('y') => self.copy_permalink()?,
            _ => return Ok(false),
        }

        self.sync_active(now);
        self.mark_dirty();
        Ok(false)
    }

    fn step_post(&mut self, delta: isize, now: Instant) {
        match self.view_mode {
            ViewMode::Single => {
                if delta > 0 {
                    self.navigator.next_post(now);
                } else {
                    self.navigator.previous_post(now);
                }
            }
            ViewMode::Grid => {
                let on_page = self.pager.range(self.feed.len()).len();
                if on_page == 0 {
                    return;
                }
                self.grid_selected = self
                    .grid_selected
                    .saturating_add_signed(delta)
                    .min(on_page - 1);
            }
        }
    }

    fn open_in_single(&mut self, now: Instant) {
        let Some(target) = self.active_index() else {
            return;
        };
        self.view_mode = ViewMode::Single;
        self.reset_working_set(now);
        self.navigator.scroll_to_post(target, now);
    }

    fn begin_input(&mut self, kind: InputKind) {
        let previous = match kind {
            InputKind::Search => self.feed.search().to_string(),
            InputKind::Import => String::new(),
        };
        self.input = Some(Input {
            kind,
            buffer: previous.clone(),
            previous,
        });
    }

    fn handle_input_key(&mut self, code: KeyCode) -> Result<bool> {
        let now = Instant::now();
        let Some(input) = self.input.as_mut() else {
            return Ok(false);
        };
        let kind = input.kind;
        match code {
            KeyCode::Esc => {
                let previous = input.previous.clone();
                self.input = None;
                if kind == InputKind::Search && self.feed.search() != previous {
                    self.feed.set_search(previous);
                    self.reset_working_set(now);
                }
            }
            KeyCode::Enter => {
                let buffer = input.buffer.clone();
                self.input = None;
                if kind == InputKind::Import && !buffer.trim().is_empty() {
                    self.import_file(expand_home(buffer.trim()), now);
                }
            }
            KeyCode::Backspace => {
                input.buffer.pop();
                if kind == InputKind::Search {
                    let term = input.buffer.clone();
                    self.feed.set_search(term);
                    self.reset_working_set(now);
                }
            }
            KeyCode::Char(ch) => {
                input.buffer.push(ch);
                if kind == InputKind::Search {
                    let term = input.buffer.clone();
                    self.feed.set_search(term);
                    self.reset_working_set(now);
                }
            }
            _ => {}
        }
        self.mark_dirty();
        Ok(false)
    }

    /// Loads a JSON file. A failed import leaves the current feed untouched.
    fn import_file(&mut self, path: PathBuf, now: Instant) {
        let source = FileSource::new(path);
        match source.load() {
            Ok(posts) => {
                let count = posts.len();
                self.feed.set_source(posts);
                self.source_label = source.describe();
                self.source = Some(Arc::new(source));
                self.status_message = format!("Imported {count} posts");
                self.reset_working_set(now);
            }
            Err(err) => {
                tracing::warn!(error = %format!("{err:#}"), "import failed");
                self.status_message = format!("Import failed: {err:#}");
            }
        }
    }

    fn reload_source(&mut self, now: Instant) -> Result<()> {
        let Some(source) = self.source.clone() else {
            bail!("nothing to reload");
        };
        let posts = source
            .load()
            .with_context(|| format!("reload {}", source.describe()))?;
        self.status_message = format!("Reloaded {} posts", posts.len());
        self.feed.set_source(posts);
        self.reset_working_set(now);
        Ok(())
    }

    fn export_working_set(&mut self) -> Result<()> {
        let working = self.feed.working_set();
        if working.is_empty() {
            bail!("nothing to export");
        }
        let today = chrono::Local::now().date_naive();
        let path = export::export_working_set(&working, &self.export_dir, today)?;
        self.status_message = format!("Exported {} posts to {}", working.len(), path.display());
        Ok(())
    }

    fn active_post(&self) -> Option<&Post> {
        self.active_index().and_then(|index| self.feed.get(index))
    }

    fn active_permalink(&self) -> Result<String> {
        let post = self.active_post().context("no post selected")?;
        post.permalink
            .clone()
            .ok_or_else(|| anyhow!("post {} has no permalink", post.sequence_number))
    }

    fn open_permalink(&mut self) -> Result<()> {
        let url = self.active_permalink()?;
        webbrowser::open(&url).with_context(|| format!("open {url}"))?;
        self.status_message = "Opened post in your browser.".into();
        Ok(())
    }

    fn open_original_media(&mut self) -> Result<()> {
        let Some(view) = self.carousel.active_view() else {
            bail!("post has no media");
        };
        let Some(url) = view.item.original_url() else {
            self.status_message = "Session-only media has no original to open.".into();
            return Ok(());
        };
        webbrowser::open(url).with_context(|| format!("open {url}"))?;
        self.status_message = "Opened original media in your browser.".into();
        Ok(())
    }

    fn copy_permalink(&mut self) -> Result<()> {
        let url = self.active_permalink()?;
        let mut clipboard =
            arboard::Clipboard::new().map_err(|err| anyhow!("create clipboard: {err}"))?;
        clipboard
            .set_text(url)
            .map_err(|err| anyhow!("copy permalink: {err}"))?;
        self.status_message = "Permalink copied to clipboard.".into();
        Ok(())
    }

    fn handle_mouse(&mut self, event: MouseEvent) -> Result<()> {
        if self.input.is_some() {
            return Ok(());
        }
        let now = Instant::now();
        match event.kind {
            MouseEventKind::ScrollDown => self.scroll_feed(WHEEL_STEP, now),
            MouseEventKind::ScrollUp => self.scroll_feed(-WHEEL_STEP, now),
            MouseEventKind::Down(MouseButton::Left) => {
                if self.hits_active_media(event.column, event.row) {
                    let (x, y) = cell_to_pixels(event.column, event.row);
                    self.swipe.begin(x, y);
                } else {
                    self.swipe.cancel();
                }
            }
            MouseEventKind::Up(MouseButton::Left) => {
                let (x, y) = cell_to_pixels(event.column, event.row);
                if let Some(swipe) = self.swipe.end(x, y) {
                    if self.carousel.handle_swipe(swipe, now) {
                        self.mark_dirty();
                    }
                }
            }
            _ => {}
        }
        Ok(())
    }

    /// Swipes only start on the media rows of the post the carousel is showing.
    fn hits_active_media(&self, column: u16, row: u16) -> bool {
        if self.view_mode != ViewMode::Single || self.carousel.is_empty() {
            return false;
        }
        let area = self.feed_area;
        if column < area.x || column >= area.right() || row < area.y || row >= area.bottom() {
            return false;
        }
        let current = self.navigator.current_index();
        let Some((_, offset)) = self
            .navigator
            .visible_sections()
            .into_iter()
            .find(|(index, _)| *index == current)
        else {
            return false;
        };
        let (first, rows) = media_row_span(self.section_height);
        let top = area.y as isize + offset + first as isize;
        let row = row as isize;
        row >= top && row < top + rows as isize
    }

    fn scroll_feed(&mut self, delta: isize, now: Instant) {
        match self.view_mode {
            ViewMode::Single => self.navigator.scroll_by(delta, now),
            ViewMode::Grid => self.step_post(delta.signum(), now),
        }
        self.sync_active(now);
        self.mark_dirty();
    }

    fn draw(&self, frame: &mut Frame<'_>) {
        let full = frame.size();
        let palette = self.palette;
        frame.render_widget(Block::default().style(Style::default().bg(palette.bg)), full);

        let (status_area, feed_area, footer_area) = screen_layout(full);

        let status_line = Paragraph::new(self.status_text()).style(
            Style::default()
                .fg(palette.text_primary)
                .bg(palette.focused_bg)
                .add_modifier(Modifier::BOLD),
        );
        frame.render_widget(status_line, status_area);

        if self.feed.is_empty() {
            self.draw_empty(frame, feed_area);
        } else {
            match self.view_mode {
                ViewMode::Single => self.draw_single(frame, feed_area),
                ViewMode::Grid => self.draw_grid(frame, feed_area),
            }
        }

        let footer = Paragraph::new(self.footer_text())
            .style(
                Style::default()
                    .fg(palette.text_secondary)
                    .bg(palette.panel_bg)
                    .add_modifier(Modifier::ITALIC),
            )
            .alignment(Alignment::Center);
        frame.render_widget(footer, footer_area);
    }

    fn status_text(&self) -> String {
        let mut parts = vec![
            self.source_label.clone(),
            format!("{}/{} posts", self.feed.len(), self.feed.source_len()),
            format!("type: {}", self.feed.type_filter()),
        ];
        if !self.feed.search().is_empty() {
            parts.push(format!("search: \"{}\"", self.feed.search()));
        }
        if self.view_mode == ViewMode::Grid {
            parts.push("grid".into());
        }
        if self.focus == Focus::Media {
            parts.push("[media]".into());
        }
        let head = parts.join(" · ");
        if self.status_message.is_empty() {
            head
        } else {
            format!("{head}  {}", self.status_message)
        }
    }

    fn footer_text(&self) -> String {
        if let Some(input) = &self.input {
            let label = match input.kind {
                InputKind::Search => "Search",
                InputKind::Import => "Import JSON file",
            };
            return format!("{label}: {}▏  (Enter to confirm, Esc to cancel)", input.buffer);
        }
        let mut hints = vec!["j/k posts", "h/l media", "/ search", "t type", "g grid"];
        if self.view_mode == ViewMode::Grid {
            hints.push("n/p page");
            hints.push("Enter open");
        }
        hints.extend(["e export", "o open", "y copy"]);
        let has_original = self
            .carousel
            .active_view()
            .is_some_and(|view| view.item.original_url().is_some());
        if has_original {
            hints.push("v original");
        }
        hints.push("q quit");
        hints.join(" · ")
    }

    fn draw_empty(&self, frame: &mut Frame<'_>, area: Rect) {
        let message = if self.feed.source_len() == 0 {
            "No posts loaded. Press i to import a JSON file."
        } else {
            "No posts match the current search and type filter."
        };
        let top = area.height / 2;
        let rect = Rect {
            y: area.y + top,
            height: 1u16.min(area.height.saturating_sub(top)),
            ..area
        };
        frame.render_widget(
            Paragraph::new(message)
                .alignment(Alignment::Center)
                .style(Style::default().fg(self.palette.text_secondary)),
            rect,
        );
    }

    fn draw_single(&self, frame: &mut Frame<'_>, area: Rect) {
        let section = self.section_height.max(1) as isize;
        for (index, offset) in self.navigator.visible_sections() {
            let skip = (-offset).max(0);
            let top = area.y as isize + offset.max(0);
            let visible = (section - skip).min(area.bottom() as isize - top);
            if visible <= 0 {
                continue;
            }
            let rect = Rect {
                x: area.x,
                y: top as u16,
                width: area.width,
                height: visible as u16,
            };
            let lines = self.section_lines(index, area.width as usize, section as usize);
            frame.render_widget(
                Paragraph::new(lines)
                    .scroll((skip as u16, 0))
                    .style(Style::default().bg(self.palette.bg)),
                rect,
            );
        }
    }

    /// One full-height post section as pre-laid-out lines.
    fn section_lines(&self, index: usize, width: usize, height: usize) -> Vec<Line<'static>> {
        let Some(post) = self.feed.get(index) else {
            return Vec::new();
        };
        let palette = self.palette;
        let is_active = index == self.navigator.current_index();

        let (_, media_rows) = media_row_span(height);
        let body_rows = height.saturating_sub(SECTION_CHROME_ROWS);
        let content_rows = body_rows.saturating_sub(media_rows + 1);

        let mut lines = Vec::with_capacity(height);
        lines.push(self.header_line(post, index, is_active, width));
        lines.push(Line::default());
        lines.extend(self.media_lines(post, is_active, width, media_rows));
        lines.push(Line::default());
        lines.extend(content_lines(
            &post.content,
            width.saturating_sub(2),
            content_rows,
            Style::default().fg(palette.text_primary),
        ));
        while lines.len() < height.saturating_sub(2) {
            lines.push(Line::default());
        }
        lines.push(Line::from(Span::styled(
            format!(" {}", engagement_summary(post)),
            Style::default().fg(palette.text_secondary),
        )));
        lines.push(Line::from(Span::styled(
            "─".repeat(width),
            Style::default().fg(palette.border_idle),
        )));
        lines.truncate(height);
        lines
    }

    fn header_line(&self, post: &Post, index: usize, is_active: bool, width: usize) -> Line<'static> {
        let palette = self.palette;
        let author = self.authors.resolve(post);
        let step = match &self.avatar {
            Some((owner, chain)) if *owner == post.sequence_number => chain.current().clone(),
            _ => author.avatar_chain().current().clone(),
        };
        let badge_bg = match step {
            AvatarStep::Primary(_) => palette.accent,
            AvatarStep::Placeholder(_) => palette.text_secondary,
            AvatarStep::InitialsBadge(_) => {
                GRADIENT_COLORS[carousel::fallback_gradient(post.sequence_number)]
            }
        };

        let mut meta = Vec::new();
        if let Some(raw) = post.timestamp.as_deref() {
            meta.push(post::format_timestamp(raw));
        }
        meta.push(post.post_type.to_string());
        let mut spans = vec![
            Span::raw(" "),
            Span::styled(
                format!(" {} ", author.initials),
                Style::default()
                    .fg(palette.bg)
                    .bg(badge_bg)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::raw(" "),
            Span::styled(
                truncate_to_width(&author.name, width / 2),
                Style::default()
                    .fg(palette.text_primary)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::styled(
                format!("  {}", meta.join(" · ")),
                Style::default().fg(palette.text_secondary),
            ),
        ];
        if is_active && self.navigator.controls_visible() {
            spans.push(Span::styled(
                format!("  ▲▼ {}/{}", index + 1, self.feed.len()),
                Style::default().fg(palette.accent),
            ));
        }
        Line::from(spans)
    }

    fn media_lines(&self, post: &Post, is_active: bool, width: usize, rows: usize) -> Vec<Line<'static>> {
        if rows == 0 {
            return Vec::new();
        }
        let palette = self.palette;
        let live = is_active && self.carousel.owner() == Some(post.sequence_number);
        let (view, total, loaded, controls) = if live {
            let view = self.carousel.active_view();
            let loaded = view
                .as_ref()
                .is_some_and(|view| self.carousel.is_loaded(view.index));
            let controls = self.carousel.shows_controls()
                && self.navigator.controls_visible()
                && !self.navigator.is_scrolling();
            (view, self.carousel.len(), loaded, controls)
        } else {
            let items = media::resolve(post, &self.policy);
            let view = items.first().map(|item| MediaView {
                index: 0,
                item: item.clone(),
                errored: false,
            });
            (view, items.len(), false, false)
        };

        let (bg, body) = match &view {
            None => (
                GRADIENT_COLORS[carousel::fallback_gradient(post.sequence_number)],
                vec![(
                    post.post_type.key().to_uppercase(),
                    Style::default().fg(Color::White).add_modifier(Modifier::BOLD),
                )],
            ),
            Some(view) => (
                if live && self.focus == Focus::Media {
                    palette.focused_bg
                } else {
                    palette.panel_bg
                },
                self.media_body(view, total, loaded, live, width),
            ),
        };

        let mut body = body;
        if controls {
            body.push((String::new(), Style::default()));
            body.push((
                carousel_dots(self.carousel.active_index(), total),
                Style::default().fg(palette.accent),
            ));
        }
        body.truncate(rows);
        let top_pad = (rows - body.len()) / 2;
        let mut lines = Vec::with_capacity(rows);
        for row in 0..rows {
            let (text, style) = match row.checked_sub(top_pad).and_then(|i| body.get(i)) {
                Some((text, style)) => (text.clone(), *style),
                None => (String::new(), Style::default()),
            };
            lines.push(centered_line(&text, width, style.bg(bg), bg));
        }
        lines
    }

    fn media_body(
        &self,
        view: &MediaView,
        total: usize,
        loaded: bool,
        live: bool,
        width: usize,
    ) -> Vec<(String, Style)> {
        let palette = self.palette;
        let icon = match view.item.kind {
            MediaKind::Image => "▣",
            MediaKind::Video => "▶",
        };
        let mut body = vec![(
            format!("{icon} {} {}/{}", view.item.kind.label(), view.index + 1, total),
            Style::default()
                .fg(palette.text_primary)
                .add_modifier(Modifier::BOLD),
        )];
        let inner = width.saturating_sub(4);
        match view.item.availability {
            Availability::Displayable => {
                if let Some(url) = view.item.display_url() {
                    body.push((
                        truncate_to_width(url, inner),
                        Style::default().fg(palette.text_secondary),
                    ));
                }
                if live && loaded {
                    body.push(("✓ reachable".into(), Style::default().fg(palette.success)));
                } else if live && self.prober.is_some() {
                    body.push(("… checking".into(), Style::default().fg(palette.text_secondary)));
                }
            }
            Availability::RemotePossiblyRestricted => {
                body.push((
                    "Media unavailable. The source may require sign-in.".into(),
                    Style::default().fg(palette.error),
                ));
                if view.item.original_url().is_some() {
                    body.push((
                        "press v to view original".into(),
                        Style::default().fg(palette.accent),
                    ));
                }
            }
            Availability::LocalUnavailableTransient => {
                body.push((
                    format!(
                        "This {} was captured in a browser session and cannot be shown here.",
                        view.item.kind.label()
                    ),
                    Style::default().fg(palette.error),
                ));
            }
        }
        for (text, _) in body.iter_mut() {
            *text = truncate_to_width(text, inner);
        }
        body
    }

    fn draw_grid(&self, frame: &mut Frame<'_>, area: Rect) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(0), Constraint::Length(1)])
            .split(area);
        let total = self.feed.len();
        let range = self.pager.range(total);
        let columns = GRID_COLUMNS.min(self.pager.page_size()).max(1);
        let rows = self.pager.page_size().div_ceil(columns).max(1);

        let row_areas = Layout::default()
            .direction(Direction::Vertical)
            .constraints(vec![Constraint::Ratio(1, rows as u32); rows])
            .split(chunks[0]);
        let selected = self.active_index();
        for (slot, index) in range.enumerate() {
            let Some(row_area) = row_areas.get(slot / columns) else {
                break;
            };
            let cells = Layout::default()
                .direction(Direction::Horizontal)
                .constraints(vec![Constraint::Ratio(1, columns as u32); columns])
                .split(*row_area);
            self.draw_card(frame, cells[slot % columns], index, selected == Some(index));
        }

        frame.render_widget(
            Paragraph::new(self.page_strip(total)).alignment(Alignment::Center),
            chunks[1],
        );
    }

    fn draw_card(&self, frame: &mut Frame<'_>, area: Rect, index: usize, selected: bool) {
        let Some(post) = self.feed.get(index) else {
            return;
        };
        let palette = self.palette;
        let author = self.authors.resolve(post);
        let border = if selected {
            palette.border_focused
        } else {
            palette.border_idle
        };
        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(border))
            .title(Span::styled(
                format!(" {} ", author.name),
                Style::default()
                    .fg(palette.text_primary)
                    .add_modifier(Modifier::BOLD),
            ));

        let inner_width = area.width.saturating_sub(2) as usize;
        let inner_height = area.height.saturating_sub(2) as usize;
        let mut meta = Vec::new();
        if let Some(raw) = post.timestamp.as_deref() {
            meta.push(post::format_timestamp(raw));
        }
        meta.push(post.post_type.to_string());

        let media_count = media::resolve(post, &self.policy).len();
        let media_label = if media_count == 0 {
            Span::styled(
                format!(" {} ", post.post_type.key().to_uppercase()),
                Style::default()
                    .fg(Color::White)
                    .bg(GRADIENT_COLORS[carousel::fallback_gradient(post.sequence_number)]),
            )
        } else {
            Span::styled(
                format!("▣ {media_count} media"),
                Style::default().fg(palette.accent),
            )
        };

        let mut lines = vec![
            Line::from(Span::styled(
                truncate_to_width(&meta.join(" · "), inner_width),
                Style::default().fg(palette.text_secondary),
            )),
            Line::from(media_label),
        ];
        let content_rows = inner_height.saturating_sub(lines.len() + 1);
        lines.extend(content_lines(
            &post.content,
            inner_width,
            content_rows,
            Style::default().fg(palette.text_primary),
        ));
        while lines.len() < inner_height.saturating_sub(1) {
            lines.push(Line::default());
        }
        lines.push(Line::from(Span::styled(
            truncate_to_width(&engagement_summary(post), inner_width),
            Style::default().fg(palette.text_secondary),
        )));

        let bg = if selected {
            palette.focused_bg
        } else {
            palette.panel_bg
        };
        frame.render_widget(
            Paragraph::new(lines)
                .block(block)
                .style(Style::default().bg(bg)),
            area,
        );
    }

    fn page_strip(&self, total: usize) -> Line<'static> {
        let palette = self.palette;
        let current = self.pager.current();
        let pages = self.pager.total_pages(total);
        let mut spans = vec![Span::styled(
            "‹ ",
            Style::default().fg(palette.text_secondary),
        )];
        for page in self.pager.window(total) {
            let style = if page == current {
                Style::default()
                    .fg(palette.bg)
                    .bg(palette.accent)
                    .add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(palette.text_primary)
            };
            spans.push(Span::styled(format!(" {page} "), style));
        }
        spans.push(Span::styled(
            format!(" ›   page {current}/{pages}"),
            Style::default().fg(palette.text_secondary),
        ));
        Line::from(spans)
    }
}

fn screen_layout(full: Rect) -> (Rect, Rect, Rect) {
    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Min(0),
            Constraint::Length(1),
        ])
        .split(full);
    (layout[0], layout[1], layout[2])
}

/// First row and row count of the media block inside a post section.
fn media_row_span(section_height: usize) -> (usize, usize) {
    let body_rows = section_height.saturating_sub(SECTION_CHROME_ROWS);
    let media_rows = if body_rows >= 8 {
        body_rows * 3 / 5
    } else {
        body_rows / 2
    };
    (2, media_rows)
}

fn cell_to_pixels(column: u16, row: u16) -> (f64, f64) {
    let metrics = terminal_cell_metrics();
    (
        f64::from(column) * metrics.width,
        f64::from(row) * metrics.height,
    )
}

fn expand_home(raw: &str) -> PathBuf {
    match raw.strip_prefix("~/") {
        Some(rest) => dirs::home_dir()
            .map(|home| home.join(rest))
            .unwrap_or_else(|| PathBuf::from(raw)),
        None => PathBuf::from(raw),
    }
}

fn truncate_to_width(text: &str, width: usize) -> String {
    if text.width() <= width {
        return text.to_string();
    }
    if width == 0 {
        return String::new();
    }
    let mut out = String::new();
    let mut used = 0;
    for ch in text.chars() {
        let w = unicode_width::UnicodeWidthChar::width(ch).unwrap_or(0);
        if used + w + 1 > width {
            break;
        }
        out.push(ch);
        used += w;
    }
    out.push('…');
    out
}

fn centered_line(text: &str, width: usize, style: Style, bg: Color) -> Line<'static> {
    let text_width = text.width().min(width);
    let left = (width - text_width) / 2;
    let right = width - text_width - left;
    let fill = Style::default().bg(bg);
    Line::from(vec![
        Span::styled(" ".repeat(left), fill),
        Span::styled(text.to_string(), style),
        Span::styled(" ".repeat(right), fill),
    ])
}

/// Wrapped post body limited to `rows`; overflow ends in an ellipsis.
fn content_lines(content: &str, width: usize, rows: usize, style: Style) -> Vec<Line<'static>> {
    if rows == 0 || width == 0 {
        return Vec::new();
    }
    let wrapped: Vec<String> = content
        .lines()
        .flat_map(|paragraph| {
            if paragraph.trim().is_empty() {
                vec![String::new()]
            } else {
                wrap(paragraph, WrapOptions::new(width))
                    .into_iter()
                    .map(|line| line.into_owned())
                    .collect()
            }
        })
        .collect();
    let overflow = wrapped.len() > rows;
    let mut lines: Vec<Line<'static>> = wrapped
        .into_iter()
        .take(rows)
        .map(|line| Line::from(Span::styled(format!(" {line}"), style)))
        .collect();
    if overflow {
        if let Some(last) = lines.last_mut() {
            let text: String = last.spans.iter().map(|span| span.content.as_ref()).collect();
            *last = Line::from(Span::styled(
                truncate_to_width(&format!("{}…", text.trim_end()), width + 1),
                style,
            ));
        }
    }
    lines
}

fn engagement_summary(post: &Post) -> String {
    ENGAGEMENT_KEYS
        .iter()
        .filter_map(|key| {
            post.engagement_metric(key)
                .map(|value| format!("{value} {key}"))
        })
        .collect::<Vec<_>>()
        .join(" · ")
}

fn carousel_dots(active: usize, total: usize) -> String {
    if total > MAX_CAROUSEL_DOTS {
        return format!("◀  {}/{}  ▶", active + 1, total);
    }
    let dots: Vec<&str> = (0..total)
        .map(|index| if index == active { "●" } else { "○" })
        .collect();
    format!("◀  {}  ▶", dots.join(" "))
}
