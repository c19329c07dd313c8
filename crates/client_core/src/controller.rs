//! Action controller: the only writer of session, roster and form state.
//!
//! Session-mutating actions are single-flight. An action started while another
//! one holds the busy flag returns [`ActionOutcome::Busy`] without touching
//! state or the network. Every failure is converted into a display update here
//! and never propagates further.

use std::{
    future::Future,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};

use shared::domain::{CharacterEntry, ExportFormat, StoryId};
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info, warn};
use url::Url;

use crate::{
    error::GatewayError,
    form::StoryForm,
    gateway::SessionGateway,
    locale::Locale,
    presets::{self, seed_default_roster},
    roster::{EntryHandle, RosterStore},
    session::{Activity, BusyFlag, ChapterPane, Illustration, SessionState, StorySession},
    settings::{ClientSettings, GenerationFlow},
    view::{self, RenderContext, SessionView},
};

const VIEW_CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionOutcome {
    Completed,
    /// The failure has already been written to the display state.
    Failed,
    Busy,
    /// Preconditions not met (no story id, wrong flow); nothing happened.
    Unavailable,
    Cancelled,
    /// Finished after a newer change to the same data; the result was dropped.
    Superseded,
}

/// Asks the user to approve an irreversible action.
pub trait Confirm: Send + Sync {
    fn confirm(&self, prompt: &str) -> bool;
}

impl<F> Confirm for F
where
    F: Fn(&str) -> bool + Send + Sync,
{
    fn confirm(&self, prompt: &str) -> bool {
        self(prompt)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ControllerOptions {
    pub flow: GenerationFlow,
    pub locale: Locale,
}

impl From<&ClientSettings> for ControllerOptions {
    fn from(settings: &ClientSettings) -> Self {
        Self {
            flow: settings.flow,
            locale: settings.locale,
        }
    }
}

struct ControllerState {
    session: SessionState,
    roster: RosterStore,
    form: StoryForm,
    /// Bumped whenever the listing changes; older list responses are dropped.
    listing_generation: u64,
}

pub struct ActionController {
    gateway: Arc<dyn SessionGateway>,
    options: ControllerOptions,
    busy: BusyFlag,
    inner: Mutex<ControllerState>,
    views: broadcast::Sender<SessionView>,
    cache_bust_seq: AtomicU64,
}

impl ActionController {
    pub fn new(gateway: Arc<dyn SessionGateway>, options: ControllerOptions) -> Self {
        let mut roster = RosterStore::new();
        seed_default_roster(&mut roster);
        let (views, _) = broadcast::channel(VIEW_CHANNEL_CAPACITY);
        Self {
            gateway,
            options,
            busy: BusyFlag::new(),
            inner: Mutex::new(ControllerState {
                session: SessionState::default(),
                roster,
                form: StoryForm::default(),
                listing_generation: 0,
            }),
            views,
            cache_bust_seq: AtomicU64::new(0),
        }
    }

    pub fn options(&self) -> ControllerOptions {
        self.options
    }

    pub fn is_busy(&self) -> bool {
        self.busy.is_busy()
    }

    pub fn subscribe_views(&self) -> broadcast::Receiver<SessionView> {
        self.views.subscribe()
    }

    pub async fn current_view(&self) -> SessionView {
        let inner = self.inner.lock().await;
        view::render(&inner.session, self.busy.is_busy(), self.render_context())
    }

    pub async fn session(&self) -> StorySession {
        self.inner.lock().await.session.story.clone()
    }

    pub async fn form(&self) -> StoryForm {
        self.inner.lock().await.form.clone()
    }

    pub async fn update_form(&self, edit: impl FnOnce(&mut StoryForm) + Send) {
        {
            let mut inner = self.inner.lock().await;
            edit(&mut inner.form);
        }
        self.publish().await;
    }

    pub async fn add_character(
        &self,
        name: impl Into<String> + Send,
        traits: impl Into<String> + Send,
    ) -> EntryHandle {
        self.inner.lock().await.roster.add(name, traits)
    }

    pub async fn remove_character(&self, handle: EntryHandle) -> bool {
        self.inner.lock().await.roster.remove(handle)
    }

    pub async fn update_character(
        &self,
        handle: EntryHandle,
        name: impl Into<String> + Send,
        traits: impl Into<String> + Send,
    ) -> bool {
        self.inner.lock().await.roster.update(handle, name, traits)
    }

    pub async fn clear_characters(&self) {
        self.inner.lock().await.roster.clear();
    }

    pub async fn characters(&self) -> Vec<(EntryHandle, CharacterEntry)> {
        let inner = self.inner.lock().await;
        inner
            .roster
            .rows()
            .map(|(handle, entry)| (handle, entry.clone()))
            .collect()
    }

    /// Returns `false` for an unknown preset key.
    pub async fn apply_preset(&self, key: &str) -> bool {
        let Some(preset) = presets::find(key) else {
            debug!(preset = key, "unknown preset ignored");
            return false;
        };
        {
            let mut inner = self.inner.lock().await;
            let ControllerState { roster, form, .. } = &mut *inner;
            preset.apply(form, roster);
        }
        info!(preset = preset.key, "applied preset");
        self.publish().await;
        true
    }

    pub async fn generate_outline(&self) -> ActionOutcome {
        self.single_flight("generate_outline", self.run_generate_outline())
            .await
    }

    pub async fn generate(&self) -> ActionOutcome {
        self.single_flight("generate", self.run_generate()).await
    }

    pub async fn open_session(&self, story_id: StoryId) -> ActionOutcome {
        self.single_flight("open_session", self.run_open_session(story_id))
            .await
    }

    pub async fn reload(&self) -> ActionOutcome {
        self.single_flight("reload", self.run_reload()).await
    }

    pub async fn advance_chapter(&self) -> ActionOutcome {
        self.single_flight("advance_chapter", self.run_advance_chapter())
            .await
    }

    pub async fn illustrate(&self) -> ActionOutcome {
        self.single_flight("illustrate", self.run_illustrate()).await
    }

    pub async fn delete_session(&self, story_id: StoryId, confirm: &dyn Confirm) -> ActionOutcome {
        self.single_flight("delete_session", self.run_delete(story_id, confirm))
            .await
    }

    /// Export locator for the current story; `None` until a story id is committed.
    pub async fn download(&self, format: ExportFormat) -> Option<String> {
        let inner = self.inner.lock().await;
        let Some(story_id) = inner.session.story.id() else {
            debug!(%format, "download unavailable without a story");
            return None;
        };
        let url = self.gateway.download_url(story_id, format);
        info!(%story_id, %format, %url, "download requested");
        Some(url)
    }

    /// Reloads the story index without taking the busy flag. A response that
    /// resolves after a delete or a newer refresh is discarded.
    pub async fn refresh_listing(&self) -> ActionOutcome {
        let generation = self.inner.lock().await.listing_generation;
        let outcome = match self.gateway.list_sessions().await {
            Ok(items) => {
                let mut inner = self.inner.lock().await;
                if inner.listing_generation != generation {
                    debug!(stories = items.len(), "discarding stale story listing");
                    return ActionOutcome::Superseded;
                }
                info!(stories = items.len(), "story listing refreshed");
                inner.session.listing = items;
                inner.listing_generation += 1;
                ActionOutcome::Completed
            }
            Err(err) if self.busy.is_busy() => {
                // The status line belongs to the action in flight.
                warn!(error = %err, "story listing refresh failed");
                ActionOutcome::Failed
            }
            Err(err) => {
                self.record_failure("refresh_listing", &err, |session, message| {
                    session.activity = Activity::Failed(message);
                })
                .await;
                ActionOutcome::Failed
            }
        };
        self.publish().await;
        outcome
    }

    async fn single_flight(
        &self,
        action: &'static str,
        run: impl Future<Output = ActionOutcome>,
    ) -> ActionOutcome {
        let Some(guard) = self.busy.try_acquire() else {
            debug!(action, "dropped while another action is in flight");
            return ActionOutcome::Busy;
        };
        let outcome = run.await;
        drop(guard);

        if outcome != ActionOutcome::Unavailable && outcome != ActionOutcome::Cancelled {
            self.publish().await;
        }
        debug!(action, ?outcome, "action finished");
        outcome
    }

    async fn run_generate_outline(&self) -> ActionOutcome {
        if self.options.flow != GenerationFlow::OutlineFirst {
            return ActionOutcome::Unavailable;
        }

        let request = {
            let mut inner = self.inner.lock().await;
            let characters = inner.roster.snapshot();
            let request = inner
                .form
                .parameters(characters, self.options.flow)
                .outline_request();
            inner.session.activity = Activity::GeneratingOutline;
            request
        };
        self.publish().await;

        match self.gateway.generate_outline(&request).await {
            Ok(outline) => {
                let mut inner = self.inner.lock().await;
                inner.form.outline = outline;
                inner.session.activity = Activity::OutlineReady;
                info!("outline ready");
                ActionOutcome::Completed
            }
            Err(err) => {
                self.record_failure("generate_outline", &err, |session, message| {
                    session.activity = Activity::Failed(message);
                })
                .await;
                ActionOutcome::Failed
            }
        }
    }

    async fn run_generate(&self) -> ActionOutcome {
        let params = {
            let mut inner = self.inner.lock().await;
            let characters = inner.roster.snapshot();
            let params = inner.form.parameters(characters, self.options.flow);
            inner.session.start_new_session();
            inner.session.activity = Activity::GeneratingStory;
            inner.session.chapter_pane = ChapterPane::Loading;
            params
        };
        self.publish().await;
        info!(
            characters = params.characters.len(),
            with_outline = params.outline.is_some(),
            "generating story"
        );

        let generated = match self.gateway.generate_story(&params).await {
            Ok(generated) => generated,
            Err(err) => {
                self.record_failure("generate", &err, |session, message| {
                    session.activity = Activity::Failed(message);
                    session.chapter_pane = ChapterPane::List;
                })
                .await;
                return ActionOutcome::Failed;
            }
        };

        let story_id = generated.story_id.clone();
        {
            let mut inner = self.inner.lock().await;
            if let Err(err) = inner.session.story.commit_identity(generated.story_id) {
                warn!(error = %err, "service returned an unusable story id");
                inner.session.activity = Activity::Failed(err.to_string());
                inner.session.chapter_pane = ChapterPane::List;
                return ActionOutcome::Failed;
            }
            inner.session.story.set_full_text(generated.text);
            inner
                .session
                .story
                .set_illustration_prompt(generated.illustration_prompt);
        }
        info!(%story_id, "story generated");
        self.publish().await;

        self.refresh_chapters(&story_id, Activity::StoryReady).await
    }

    async fn run_open_session(&self, story_id: StoryId) -> ActionOutcome {
        {
            let mut inner = self.inner.lock().await;
            let mut fresh = StorySession::default();
            if let Err(err) = fresh.commit_identity(story_id.clone()) {
                warn!(error = %err, "refusing to open story");
                inner.session.activity = Activity::Failed(err.to_string());
                return ActionOutcome::Failed;
            }
            inner.session.start_new_session();
            inner.session.story = fresh;
            inner.session.activity = Activity::Loading;
            inner.session.chapter_pane = ChapterPane::Loading;
        }
        info!(%story_id, "opening story");
        self.publish().await;

        self.refresh_chapters(&story_id, Activity::Idle).await
    }

    async fn run_reload(&self) -> ActionOutcome {
        let Some(story_id) = self.committed_id().await else {
            return ActionOutcome::Unavailable;
        };
        self.inner.lock().await.session.chapter_pane = ChapterPane::Loading;
        self.publish().await;

        self.refresh_chapters(&story_id, Activity::Idle).await
    }

    async fn run_advance_chapter(&self) -> ActionOutcome {
        let (story_id, direction) = {
            let mut inner = self.inner.lock().await;
            let Some(story_id) = inner.session.story.id().cloned() else {
                return ActionOutcome::Unavailable;
            };
            inner.session.activity = Activity::AdvancingChapter;
            inner.session.chapter_pane = ChapterPane::Advancing;
            (story_id, inner.form.user_direction.clone())
        };
        self.publish().await;
        info!(%story_id, "requesting next chapter");

        if let Err(err) = self.gateway.advance_chapter(&story_id, &direction).await {
            self.record_failure("advance_chapter", &err, |session, message| {
                session.activity = Activity::Idle;
                session.chapter_pane = ChapterPane::Failed(message);
            })
            .await;
            return ActionOutcome::Failed;
        }

        self.refresh_chapters(&story_id, Activity::Idle).await
    }

    async fn run_illustrate(&self) -> ActionOutcome {
        let (story_id, aspect_ratio) = {
            let mut inner = self.inner.lock().await;
            let Some(story_id) = inner.session.story.id().cloned() else {
                return ActionOutcome::Unavailable;
            };
            inner.session.activity = Activity::Illustrating;
            inner.session.illustration = Illustration::Pending;
            (story_id, inner.form.aspect_ratio)
        };
        self.publish().await;
        info!(%story_id, %aspect_ratio, "requesting illustration");

        match self
            .gateway
            .generate_illustration(&story_id, aspect_ratio)
            .await
        {
            Ok(image_url) => {
                let url = self.cache_busted(&image_url);
                let mut inner = self.inner.lock().await;
                if inner.session.story.id() != Some(&story_id) {
                    debug!(%story_id, "illustration arrived for a story that is no longer open");
                    return ActionOutcome::Failed;
                }
                inner.session.activity = Activity::Idle;
                inner.session.illustration = Illustration::Ready { url };
                ActionOutcome::Completed
            }
            Err(err) => {
                self.record_failure("illustrate", &err, |session, message| {
                    session.activity = Activity::Idle;
                    session.illustration = Illustration::Failed(message);
                })
                .await;
                ActionOutcome::Failed
            }
        }
    }

    async fn run_delete(&self, story_id: StoryId, confirm: &dyn Confirm) -> ActionOutcome {
        let prompt = format!(
            "{} ({story_id})",
            self.options.locale.catalog().confirm_delete
        );
        if !confirm.confirm(&prompt) {
            debug!(%story_id, "delete cancelled");
            return ActionOutcome::Cancelled;
        }

        self.inner.lock().await.session.activity = Activity::Deleting;
        self.publish().await;
        info!(%story_id, "deleting story");

        match self.gateway.delete_session(&story_id).await {
            Ok(()) => {
                let mut inner = self.inner.lock().await;
                inner.session.remove_listing_entry(&story_id);
                inner.listing_generation += 1;
                inner.session.activity = Activity::Deleted;
                ActionOutcome::Completed
            }
            Err(err) => {
                self.record_failure("delete_session", &err, |session, message| {
                    session.activity = Activity::Failed(message);
                })
                .await;
                ActionOutcome::Failed
            }
        }
    }

    /// Replaces the chapter list with the service's full list for `story_id`.
    /// Results for a story that is no longer the open one are discarded.
    async fn refresh_chapters(&self, story_id: &StoryId, settled: Activity) -> ActionOutcome {
        let result = self.gateway.fetch_session(story_id).await;
        let mut inner = self.inner.lock().await;
        if inner.session.story.id() != Some(story_id) {
            debug!(%story_id, "discarding chapters for a story that is no longer open");
            return ActionOutcome::Failed;
        }

        match result {
            Ok(response) => {
                debug!(%story_id, chapters = response.chapters.len(), "chapters refreshed");
                inner.session.story.set_full_text(response.story.full_text);
                inner.session.story.replace_chapters(response.chapters);
                inner.session.chapter_pane = ChapterPane::List;
                inner.session.activity = settled;
                ActionOutcome::Completed
            }
            Err(err) => {
                let message = err.display_message(self.options.locale);
                warn!(%story_id, error = %err, "failed to fetch story");
                inner.session.chapter_pane = ChapterPane::Failed(message.clone());
                inner.session.activity = Activity::Failed(message);
                ActionOutcome::Failed
            }
        }
    }

    async fn record_failure(
        &self,
        action: &'static str,
        err: &GatewayError,
        apply: impl FnOnce(&mut SessionState, String),
    ) {
        warn!(action, error = %err, status = ?err.status(), "action failed");
        let message = err.display_message(self.options.locale);
        let mut inner = self.inner.lock().await;
        apply(&mut inner.session, message);
    }

    async fn committed_id(&self) -> Option<StoryId> {
        self.inner.lock().await.session.story.id().cloned()
    }

    fn cache_busted(&self, link: &str) -> String {
        let seq = self.cache_bust_seq.fetch_add(1, Ordering::Relaxed);
        let token = format!("{}{seq}", chrono::Utc::now().timestamp_millis());
        match Url::parse(link) {
            Ok(mut url) => {
                url.query_pairs_mut().append_pair("t", &token);
                url.into()
            }
            // Relative link: the token still has to land before any fragment.
            Err(_) => {
                let (base, fragment) = link
                    .split_once('#')
                    .map_or((link, None), |(base, fragment)| (base, Some(fragment)));
                let separator = if base.contains('?') { '&' } else { '?' };
                match fragment {
                    Some(fragment) => format!("{base}{separator}t={token}#{fragment}"),
                    None => format!("{base}{separator}t={token}"),
                }
            }
        }
    }

    fn render_context(&self) -> RenderContext {
        RenderContext {
            locale: self.options.locale,
            flow: self.options.flow,
        }
    }

    async fn publish(&self) {
        let view = self.current_view().await;
        // No subscribers is fine; views are also available on demand.
        let _ = self.views.send(view);
    }
}

#[cfg(test)]
#[path = "tests/controller_tests.rs"]
mod tests;
