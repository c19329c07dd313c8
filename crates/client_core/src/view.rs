//! Pure projection of session state into displayable structures.
//!
//! Nothing here performs I/O or mutates state; the controller re-renders after
//! every transition.

use shared::domain::StoryId;

use crate::{
    locale::Locale,
    session::{Activity, ChapterPane, Illustration, SessionState},
    settings::GenerationFlow,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RenderContext {
    pub locale: Locale,
    pub flow: GenerationFlow,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionView {
    pub story_badge: String,
    pub status: String,
    pub full_text: String,
    pub illustration_prompt: String,
    pub chapters: ChapterList,
    pub illustration: IllustrationView,
    pub listing: Vec<ListingItem>,
    pub controls: ControlFlags,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChapterList {
    /// Text shown instead of chapters: empty, in progress, or failed.
    Placeholder(String),
    Items(Vec<ChapterItem>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChapterItem {
    pub index: u32,
    pub badge: String,
    pub title: String,
    pub body: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IllustrationView {
    /// Set only once an image is ready to show.
    pub image_url: Option<String>,
    /// Progress or failure text; `None` when the hint is hidden.
    pub hint: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingItem {
    pub id: StoryId,
    pub title: String,
    pub created_at: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ControlFlags {
    pub generate: bool,
    pub outline: bool,
    pub next: bool,
    pub illustrate: bool,
    /// Applies to every export format.
    pub download: bool,
    pub delete: bool,
}

pub fn render(state: &SessionState, busy: bool, ctx: RenderContext) -> SessionView {
    let catalog = ctx.locale.catalog();
    let story = &state.story;
    let has_id = story.has_id();

    SessionView {
        story_badge: format!(
            "story_id: {}",
            story.id().map(StoryId::as_str).unwrap_or("-")
        ),
        status: status_text(&state.activity, ctx.locale),
        full_text: story.full_text().to_string(),
        illustration_prompt: story
            .illustration_prompt()
            .unwrap_or(catalog.none_yet)
            .to_string(),
        chapters: render_chapters(state, ctx.locale),
        illustration: render_illustration(&state.illustration, ctx.locale),
        listing: state
            .listing
            .iter()
            .map(|item| ListingItem {
                id: item.id.clone(),
                title: escape_html(&item.title),
                created_at: item.created_at.clone(),
            })
            .collect(),
        controls: ControlFlags {
            generate: !busy,
            outline: !busy && ctx.flow == GenerationFlow::OutlineFirst,
            next: has_id && !busy,
            illustrate: has_id && !busy,
            download: has_id,
            delete: !busy,
        },
    }
}

fn status_text(activity: &Activity, locale: Locale) -> String {
    let catalog = locale.catalog();
    match activity {
        Activity::Idle => "",
        Activity::GeneratingOutline => catalog.generating_outline,
        Activity::OutlineReady => catalog.outline_ready,
        Activity::GeneratingStory => catalog.generating_story,
        Activity::StoryReady => catalog.story_ready,
        Activity::Loading => catalog.loading,
        Activity::AdvancingChapter => catalog.advancing,
        Activity::Illustrating => catalog.illustrating,
        Activity::Deleting => catalog.deleting,
        Activity::Deleted => catalog.deleted,
        Activity::Failed(message) => message.as_str(),
    }
    .to_string()
}

fn render_chapters(state: &SessionState, locale: Locale) -> ChapterList {
    let catalog = locale.catalog();
    match &state.chapter_pane {
        ChapterPane::Loading => ChapterList::Placeholder(catalog.loading.to_string()),
        ChapterPane::Advancing => ChapterList::Placeholder(catalog.advancing.to_string()),
        ChapterPane::Failed(message) => ChapterList::Placeholder(message.clone()),
        ChapterPane::List if state.story.chapters().is_empty() => {
            ChapterList::Placeholder(catalog.none_yet.to_string())
        }
        ChapterPane::List => {
            let mut chapters: Vec<_> = state.story.chapters().iter().collect();
            // Stable: equal indexes keep the order the service returned.
            chapters.sort_by_key(|chapter| chapter.index);
            ChapterList::Items(
                chapters
                    .into_iter()
                    .map(|chapter| ChapterItem {
                        index: chapter.index,
                        badge: format!("Chapter {}", chapter.index),
                        title: escape_html(&chapter.title),
                        body: escape_html(&chapter.text),
                    })
                    .collect(),
            )
        }
    }
}

fn render_illustration(illustration: &Illustration, locale: Locale) -> IllustrationView {
    match illustration {
        Illustration::Hidden => IllustrationView::default(),
        Illustration::Pending => IllustrationView {
            image_url: None,
            hint: Some(locale.catalog().illustrating.to_string()),
        },
        Illustration::Ready { url } => IllustrationView {
            image_url: Some(url.clone()),
            hint: None,
        },
        Illustration::Failed(message) => IllustrationView {
            image_url: None,
            hint: Some(message.clone()),
        },
    }
}

pub fn escape_html(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            other => escaped.push(other),
        }
    }
    escaped
}

#[cfg(test)]
#[path = "tests/view_tests.rs"]
mod tests;
