use std::{collections::VecDeque, sync::Mutex as StdMutex};

use async_trait::async_trait;
use shared::{
    domain::{AspectRatio, Chapter},
    protocol::{
        GenerateResponse, OutlineRequest, StoryParameters, StoryRecord, StoryResponse,
        StorySummary,
    },
};
use tokio::sync::Notify;

use super::*;
use crate::{
    error::GatewayResult,
    view::{ChapterItem, ChapterList},
};

#[derive(Default)]
struct Script {
    outline: VecDeque<GatewayResult<String>>,
    generate: VecDeque<GatewayResult<GenerateResponse>>,
    fetch: VecDeque<GatewayResult<StoryResponse>>,
    advance: VecDeque<GatewayResult<()>>,
    illustrate: VecDeque<GatewayResult<String>>,
    list: VecDeque<GatewayResult<Vec<StorySummary>>>,
    delete: VecDeque<GatewayResult<()>>,
}

#[derive(Default)]
struct ScriptedGateway {
    script: StdMutex<Script>,
    calls: StdMutex<Vec<String>>,
    last_params: StdMutex<Option<StoryParameters>>,
    last_outline: StdMutex<Option<OutlineRequest>>,
    generate_gate: Option<Arc<Notify>>,
    list_gate: Option<Arc<Notify>>,
}

fn unscripted<T>() -> GatewayResult<T> {
    Err(GatewayError::rejected(500, Some("unscripted call".into())))
}

impl ScriptedGateway {
    fn gated(gate: Arc<Notify>) -> Self {
        Self {
            generate_gate: Some(gate),
            ..Self::default()
        }
    }

    fn script(&self, edit: impl FnOnce(&mut Script)) {
        edit(&mut self.script.lock().unwrap());
    }

    fn record(&self, call: impl Into<String>) {
        self.calls.lock().unwrap().push(call.into());
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl SessionGateway for ScriptedGateway {
    async fn generate_outline(&self, request: &OutlineRequest) -> GatewayResult<String> {
        self.record("outline");
        *self.last_outline.lock().unwrap() = Some(request.clone());
        let next = self.script.lock().unwrap().outline.pop_front();
        next.unwrap_or_else(unscripted)
    }

    async fn generate_story(&self, params: &StoryParameters) -> GatewayResult<GenerateResponse> {
        self.record("generate");
        *self.last_params.lock().unwrap() = Some(params.clone());
        if let Some(gate) = &self.generate_gate {
            gate.notified().await;
        }
        let next = self.script.lock().unwrap().generate.pop_front();
        next.unwrap_or_else(unscripted)
    }

    async fn fetch_session(&self, story_id: &StoryId) -> GatewayResult<StoryResponse> {
        self.record(format!("fetch {story_id}"));
        let next = self.script.lock().unwrap().fetch.pop_front();
        next.unwrap_or_else(unscripted)
    }

    async fn advance_chapter(
        &self,
        story_id: &StoryId,
        user_direction: &str,
    ) -> GatewayResult<()> {
        self.record(format!("next {story_id} {user_direction}"));
        let next = self.script.lock().unwrap().advance.pop_front();
        next.unwrap_or_else(unscripted)
    }

    async fn generate_illustration(
        &self,
        story_id: &StoryId,
        aspect_ratio: AspectRatio,
    ) -> GatewayResult<String> {
        self.record(format!("illustrate {story_id} {aspect_ratio}"));
        let next = self.script.lock().unwrap().illustrate.pop_front();
        next.unwrap_or_else(unscripted)
    }

    async fn list_sessions(&self) -> GatewayResult<Vec<StorySummary>> {
        self.record("list");
        if let Some(gate) = &self.list_gate {
            gate.notified().await;
        }
        let next = self.script.lock().unwrap().list.pop_front();
        next.unwrap_or_else(unscripted)
    }

    async fn delete_session(&self, story_id: &StoryId) -> GatewayResult<()> {
        self.record(format!("delete {story_id}"));
        let next = self.script.lock().unwrap().delete.pop_front();
        next.unwrap_or_else(unscripted)
    }

    fn download_url(&self, story_id: &StoryId, format: ExportFormat) -> String {
        format!("http://stories.test/download/{story_id}.{}", format.extension())
    }
}

fn generated(id: &str) -> GenerateResponse {
    GenerateResponse {
        story_id: StoryId::new(id),
        text: "full text".into(),
        title: Some("T".into()),
        illustration_prompt: Some("a fox under the moon".into()),
    }
}

fn chapter(index: u32, title: &str, text: &str) -> Chapter {
    Chapter {
        index,
        title: title.into(),
        text: text.into(),
    }
}

fn story(chapters: Vec<Chapter>) -> StoryResponse {
    StoryResponse {
        story: StoryRecord {
            full_text: "full text".into(),
            title: Some("T".into()),
            illustration_prompt: None,
        },
        chapters,
    }
}

fn summary(id: &str, title: &str) -> StorySummary {
    StorySummary {
        id: StoryId::new(id),
        title: title.into(),
        created_at: "2024-01-01T00:00:00".into(),
    }
}

fn controller_with(gateway: Arc<ScriptedGateway>, flow: GenerationFlow) -> ActionController {
    ActionController::new(
        gateway,
        ControllerOptions {
            flow,
            locale: Locale::En,
        },
    )
}

async fn open_story(controller: &ActionController, gateway: &ScriptedGateway, id: &str) {
    gateway.script(|s| s.fetch.push_back(Ok(story(vec![chapter(1, "T", "body")]))));
    assert_eq!(
        controller.open_session(StoryId::new(id)).await,
        ActionOutcome::Completed
    );
}

#[tokio::test]
async fn generate_commits_identity_and_renders_single_chapter() {
    let gateway = Arc::new(ScriptedGateway::default());
    gateway.script(|s| {
        s.generate.push_back(Ok(generated("s1")));
        s.fetch.push_back(Ok(story(vec![chapter(1, "T", "body")])));
    });
    let controller = controller_with(gateway.clone(), GenerationFlow::Direct);

    assert_eq!(controller.generate().await, ActionOutcome::Completed);

    let view = controller.current_view().await;
    assert_eq!(view.story_badge, "story_id: s1");
    assert_eq!(view.full_text, "full text");
    assert_eq!(view.illustration_prompt, "a fox under the moon");
    assert_eq!(view.status, "Story ready");
    assert_eq!(
        view.chapters,
        ChapterList::Items(vec![ChapterItem {
            index: 1,
            badge: "Chapter 1".into(),
            title: "T".into(),
            body: "body".into(),
        }])
    );
    assert!(view.controls.next);
    assert!(view.controls.illustrate);
    assert!(view.controls.download);
    assert_eq!(gateway.calls(), vec!["generate", "fetch s1"]);
}

#[tokio::test]
async fn generate_sends_roster_snapshot_without_blank_rows() {
    let gateway = Arc::new(ScriptedGateway::default());
    gateway.script(|s| {
        s.generate.push_back(Ok(generated("s1")));
        s.fetch.push_back(Ok(story(Vec::new())));
    });
    let controller = controller_with(gateway.clone(), GenerationFlow::Direct);
    controller.clear_characters().await;
    controller.add_character("  Ann ", "brave").await;
    controller.add_character("   ", "ignored").await;

    controller.generate().await;

    let params = gateway.last_params.lock().unwrap().clone().expect("params");
    assert_eq!(params.characters, vec![CharacterEntry::new("Ann", "brave")]);
    assert_eq!(params.outline, None);
    assert_eq!(controller.characters().await.len(), 2);
}

#[tokio::test]
async fn generate_failure_reports_rejection_and_leaves_no_identity() {
    let gateway = Arc::new(ScriptedGateway::default());
    gateway.script(|s| {
        s.generate
            .push_back(Err(GatewayError::rejected(400, Some("bad input".into()))))
    });
    let controller = controller_with(gateway.clone(), GenerationFlow::Direct);

    assert_eq!(controller.generate().await, ActionOutcome::Failed);

    let view = controller.current_view().await;
    assert_eq!(view.status, "bad input");
    assert_eq!(view.story_badge, "story_id: -");
    assert!(!view.controls.next);
    assert!(!view.controls.download);
    assert!(view.controls.generate);
    assert!(!controller.is_busy());
}

#[tokio::test]
async fn new_generation_discards_previous_chapters_before_resolving() {
    let gate = Arc::new(Notify::new());
    let gateway = Arc::new(ScriptedGateway::gated(gate.clone()));
    let controller = Arc::new(controller_with(gateway.clone(), GenerationFlow::Direct));
    open_story(&controller, &gateway, "old").await;

    gateway.script(|s| {
        s.generate.push_back(Ok(generated("new")));
        s.fetch.push_back(Ok(story(vec![chapter(1, "fresh", "x")])));
    });
    let mut views = controller.subscribe_views();
    let task = {
        let controller = controller.clone();
        tokio::spawn(async move { controller.generate().await })
    };

    let pending = views.recv().await.expect("view while generating");
    assert_eq!(pending.story_badge, "story_id: -");
    assert_eq!(pending.full_text, "");
    assert_eq!(pending.chapters, ChapterList::Placeholder("(loading...)".into()));
    assert!(!pending.controls.next);

    gate.notify_one();
    assert_eq!(task.await.expect("join"), ActionOutcome::Completed);
    assert_eq!(
        controller.session().await.id(),
        Some(&StoryId::new("new"))
    );
}

#[tokio::test]
async fn actions_are_dropped_while_another_is_in_flight() {
    let gate = Arc::new(Notify::new());
    let gateway = Arc::new(ScriptedGateway::gated(gate.clone()));
    gateway.script(|s| {
        s.generate.push_back(Ok(generated("s1")));
        s.fetch.push_back(Ok(story(Vec::new())));
    });
    let controller = Arc::new(controller_with(gateway.clone(), GenerationFlow::OutlineFirst));

    let task = {
        let controller = controller.clone();
        tokio::spawn(async move { controller.generate().await })
    };
    while gateway.calls().is_empty() {
        tokio::task::yield_now().await;
    }
    assert!(controller.is_busy());

    let view = controller.current_view().await;
    assert!(!view.controls.generate);
    assert!(!view.controls.outline);
    assert!(!view.controls.delete);

    assert_eq!(controller.generate().await, ActionOutcome::Busy);
    assert_eq!(controller.generate_outline().await, ActionOutcome::Busy);
    assert_eq!(controller.advance_chapter().await, ActionOutcome::Busy);
    assert_eq!(controller.illustrate().await, ActionOutcome::Busy);
    assert_eq!(controller.reload().await, ActionOutcome::Busy);
    assert_eq!(
        controller.open_session(StoryId::new("s9")).await,
        ActionOutcome::Busy
    );
    assert_eq!(
        controller
            .delete_session(StoryId::new("s9"), &|_: &str| true)
            .await,
        ActionOutcome::Busy
    );
    assert_eq!(gateway.calls(), vec!["generate"]);

    gate.notify_one();
    assert_eq!(task.await.expect("join"), ActionOutcome::Completed);
    assert!(!controller.is_busy());
}

#[tokio::test]
async fn advance_shows_exactly_the_fetched_chapter_list() {
    let gateway = Arc::new(ScriptedGateway::default());
    let controller = controller_with(gateway.clone(), GenerationFlow::Direct);
    open_story(&controller, &gateway, "s1").await;
    controller
        .update_form(|form| form.user_direction = "go north".into())
        .await;

    gateway.script(|s| {
        s.advance.push_back(Ok(()));
        s.fetch.push_back(Ok(story(vec![
            chapter(2, "Two", "b"),
            chapter(1, "One", "a"),
        ])));
    });
    assert_eq!(controller.advance_chapter().await, ActionOutcome::Completed);

    let ChapterList::Items(items) = controller.current_view().await.chapters else {
        panic!("expected chapters");
    };
    let titles: Vec<_> = items.iter().map(|item| item.title.as_str()).collect();
    assert_eq!(titles, vec!["One", "Two"]);
    assert_eq!(controller.session().await.chapters().len(), 2);
    assert!(gateway.calls().contains(&"next s1 go north".to_string()));
}

#[tokio::test]
async fn advance_failure_shows_message_in_chapter_area() {
    let gateway = Arc::new(ScriptedGateway::default());
    let controller = controller_with(gateway.clone(), GenerationFlow::Direct);
    open_story(&controller, &gateway, "s1").await;
    gateway.script(|s| {
        s.advance
            .push_back(Err(GatewayError::rejected(500, Some("model overloaded".into()))))
    });

    assert_eq!(controller.advance_chapter().await, ActionOutcome::Failed);

    let view = controller.current_view().await;
    assert_eq!(
        view.chapters,
        ChapterList::Placeholder("model overloaded".into())
    );
    assert_eq!(view.story_badge, "story_id: s1");
    assert!(view.controls.next);
}

#[tokio::test]
async fn actions_needing_a_story_are_unavailable_without_one() {
    let gateway = Arc::new(ScriptedGateway::default());
    let controller = controller_with(gateway.clone(), GenerationFlow::Direct);

    assert_eq!(controller.advance_chapter().await, ActionOutcome::Unavailable);
    assert_eq!(controller.illustrate().await, ActionOutcome::Unavailable);
    assert_eq!(controller.reload().await, ActionOutcome::Unavailable);
    assert_eq!(controller.generate_outline().await, ActionOutcome::Unavailable);
    assert_eq!(controller.download(ExportFormat::Pdf).await, None);
    assert!(gateway.calls().is_empty());
}

#[tokio::test]
async fn download_locator_follows_committed_identity() {
    let gateway = Arc::new(ScriptedGateway::default());
    let controller = controller_with(gateway.clone(), GenerationFlow::Direct);
    open_story(&controller, &gateway, "s1").await;

    assert_eq!(
        controller.download(ExportFormat::Md).await.as_deref(),
        Some("http://stories.test/download/s1.md")
    );
    assert_eq!(
        controller.download(ExportFormat::Pdf).await.as_deref(),
        Some("http://stories.test/download/s1.pdf")
    );
}

#[tokio::test]
async fn reload_twice_yields_identical_views() {
    let gateway = Arc::new(ScriptedGateway::default());
    let controller = controller_with(gateway.clone(), GenerationFlow::Direct);
    open_story(&controller, &gateway, "s1").await;
    gateway.script(|s| {
        s.fetch.push_back(Ok(story(vec![chapter(1, "T", "body")])));
        s.fetch.push_back(Ok(story(vec![chapter(1, "T", "body")])));
    });

    assert_eq!(controller.reload().await, ActionOutcome::Completed);
    let first = controller.current_view().await;
    assert_eq!(controller.reload().await, ActionOutcome::Completed);
    assert_eq!(controller.current_view().await, first);
}

#[tokio::test]
async fn open_session_rejects_blank_id_without_touching_state() {
    let gateway = Arc::new(ScriptedGateway::default());
    let controller = controller_with(gateway.clone(), GenerationFlow::Direct);
    open_story(&controller, &gateway, "s1").await;

    assert_eq!(
        controller.open_session(StoryId::new("  ")).await,
        ActionOutcome::Failed
    );
    assert_eq!(controller.session().await.id(), Some(&StoryId::new("s1")));
    assert_eq!(gateway.calls(), vec!["fetch s1"]);
}

#[tokio::test]
async fn illustration_url_is_cache_busted_per_request() {
    let gateway = Arc::new(ScriptedGateway::default());
    let controller = controller_with(gateway.clone(), GenerationFlow::Direct);
    open_story(&controller, &gateway, "s1").await;
    controller
        .update_form(|form| form.aspect_ratio = AspectRatio::Wide)
        .await;
    gateway.script(|s| {
        s.illustrate.push_back(Ok("http://img.test/s1.png".into()));
        s.illustrate.push_back(Ok("http://img.test/s1.png?v=2".into()));
    });

    assert_eq!(controller.illustrate().await, ActionOutcome::Completed);
    let first = controller
        .current_view()
        .await
        .illustration
        .image_url
        .expect("image");
    assert!(first.starts_with("http://img.test/s1.png?t="));

    controller.illustrate().await;
    let second = controller
        .current_view()
        .await
        .illustration
        .image_url
        .expect("image");
    assert!(second.starts_with("http://img.test/s1.png?v=2&t="));
    assert!(gateway.calls().contains(&"illustrate s1 16:9".to_string()));
}

#[tokio::test]
async fn cache_bust_token_goes_before_the_fragment() {
    let gateway = Arc::new(ScriptedGateway::default());
    let controller = controller_with(gateway.clone(), GenerationFlow::Direct);
    open_story(&controller, &gateway, "s1").await;
    gateway.script(|s| {
        s.illustrate
            .push_back(Ok("http://img.test/s1.png#frame".into()))
    });

    assert_eq!(controller.illustrate().await, ActionOutcome::Completed);

    let url = controller
        .current_view()
        .await
        .illustration
        .image_url
        .expect("image");
    let parsed = url::Url::parse(&url).expect("absolute url");
    assert_eq!(parsed.fragment(), Some("frame"));
    assert!(parsed.query_pairs().any(|(key, value)| key == "t" && !value.is_empty()));
}

#[tokio::test]
async fn illustration_failure_keeps_image_hidden() {
    let gateway = Arc::new(ScriptedGateway::default());
    let controller = controller_with(gateway.clone(), GenerationFlow::Direct);
    open_story(&controller, &gateway, "s1").await;
    gateway.script(|s| {
        s.illustrate
            .push_back(Err(GatewayError::rejected(502, None)))
    });

    assert_eq!(controller.illustrate().await, ActionOutcome::Failed);

    let view = controller.current_view().await;
    assert_eq!(view.illustration.image_url, None);
    assert_eq!(view.illustration.hint.as_deref(), Some("Error 502"));
}

#[tokio::test]
async fn outline_fills_form_and_is_sent_with_generation() {
    let gateway = Arc::new(ScriptedGateway::default());
    gateway.script(|s| {
        s.outline.push_back(Ok("1. start\n2. end".into()));
        s.generate.push_back(Ok(generated("s1")));
        s.fetch.push_back(Ok(story(Vec::new())));
    });
    let controller = controller_with(gateway.clone(), GenerationFlow::OutlineFirst);
    controller
        .update_form(|form| form.idea = "lost kite".into())
        .await;

    assert_eq!(controller.generate_outline().await, ActionOutcome::Completed);
    assert_eq!(controller.form().await.outline, "1. start\n2. end");
    assert_eq!(
        controller.current_view().await.status,
        "Outline ready ✓ (editable)"
    );
    let request = gateway.last_outline.lock().unwrap().clone().expect("outline");
    assert_eq!(request.idea, "lost kite");

    controller.generate().await;
    let params = gateway.last_params.lock().unwrap().clone().expect("params");
    assert_eq!(params.outline.as_deref(), Some("1. start\n2. end"));
}

#[tokio::test]
async fn delete_removes_only_matching_listing_entry() {
    let gateway = Arc::new(ScriptedGateway::default());
    gateway.script(|s| {
        s.list
            .push_back(Ok(vec![summary("s1", "one"), summary("s2", "two")]));
        s.delete.push_back(Ok(()));
    });
    let controller = controller_with(gateway.clone(), GenerationFlow::Direct);
    open_story(&controller, &gateway, "s2").await;
    assert_eq!(controller.refresh_listing().await, ActionOutcome::Completed);

    let prompts = StdMutex::new(Vec::new());
    let confirm = |prompt: &str| {
        prompts.lock().unwrap().push(prompt.to_string());
        true
    };
    assert_eq!(
        controller.delete_session(StoryId::new("s1"), &confirm).await,
        ActionOutcome::Completed
    );

    let view = controller.current_view().await;
    let ids: Vec<_> = view.listing.iter().map(|item| item.id.as_str()).collect();
    assert_eq!(ids, vec!["s2"]);
    assert_eq!(view.status, "Deleted");
    assert_eq!(view.story_badge, "story_id: s2");
    assert_eq!(
        prompts.lock().unwrap().as_slice(),
        ["Delete this story permanently? (s1)"]
    );
}

#[tokio::test]
async fn listing_fetched_before_a_delete_does_not_restore_the_entry() {
    let gate = Arc::new(Notify::new());
    let gateway = Arc::new(ScriptedGateway {
        list_gate: Some(gate.clone()),
        ..ScriptedGateway::default()
    });
    gateway.script(|s| {
        s.list
            .push_back(Ok(vec![summary("s1", "one"), summary("s2", "two")]));
        s.list
            .push_back(Ok(vec![summary("s1", "one"), summary("s2", "two")]));
        s.delete.push_back(Ok(()));
    });
    let controller = Arc::new(controller_with(gateway.clone(), GenerationFlow::Direct));
    gate.notify_one();
    assert_eq!(controller.refresh_listing().await, ActionOutcome::Completed);

    let pending = {
        let controller = controller.clone();
        tokio::spawn(async move { controller.refresh_listing().await })
    };
    while gateway.calls().len() < 2 {
        tokio::task::yield_now().await;
    }
    assert_eq!(
        controller
            .delete_session(StoryId::new("s1"), &|_: &str| true)
            .await,
        ActionOutcome::Completed
    );

    gate.notify_one();
    assert_eq!(pending.await.expect("join"), ActionOutcome::Superseded);

    let view = controller.current_view().await;
    let ids: Vec<_> = view.listing.iter().map(|item| item.id.as_str()).collect();
    assert_eq!(ids, vec!["s2"]);
    assert_eq!(view.status, "Deleted");
}

#[tokio::test]
async fn failed_listing_refresh_keeps_status_of_running_action() {
    let gate = Arc::new(Notify::new());
    let gateway = Arc::new(ScriptedGateway::gated(gate.clone()));
    gateway.script(|s| {
        s.generate.push_back(Ok(generated("s1")));
        s.fetch.push_back(Ok(story(Vec::new())));
        s.list
            .push_back(Err(GatewayError::rejected(500, Some("db down".into()))));
    });
    let controller = Arc::new(controller_with(gateway.clone(), GenerationFlow::Direct));

    let task = {
        let controller = controller.clone();
        tokio::spawn(async move { controller.generate().await })
    };
    while gateway.calls().is_empty() {
        tokio::task::yield_now().await;
    }

    assert_eq!(controller.refresh_listing().await, ActionOutcome::Failed);
    assert_eq!(controller.current_view().await.status, "Generating...");

    gate.notify_one();
    assert_eq!(task.await.expect("join"), ActionOutcome::Completed);
}

#[tokio::test]
async fn declined_delete_sends_nothing() {
    let gateway = Arc::new(ScriptedGateway::default());
    let controller = controller_with(gateway.clone(), GenerationFlow::Direct);

    assert_eq!(
        controller
            .delete_session(StoryId::new("s1"), &|_: &str| false)
            .await,
        ActionOutcome::Cancelled
    );
    assert!(gateway.calls().is_empty());
    assert!(!controller.is_busy());
}

#[tokio::test]
async fn failed_delete_keeps_listing() {
    let gateway = Arc::new(ScriptedGateway::default());
    gateway.script(|s| {
        s.list.push_back(Ok(vec![summary("s1", "one")]));
        s.delete
            .push_back(Err(GatewayError::rejected(404, Some("not found".into()))));
    });
    let controller = controller_with(gateway.clone(), GenerationFlow::Direct);
    controller.refresh_listing().await;

    assert_eq!(
        controller
            .delete_session(StoryId::new("s1"), &|_: &str| true)
            .await,
        ActionOutcome::Failed
    );
    let view = controller.current_view().await;
    assert_eq!(view.listing.len(), 1);
    assert_eq!(view.status, "not found");
}

#[tokio::test]
async fn apply_preset_replaces_form_and_roster() {
    let gateway = Arc::new(ScriptedGateway::default());
    let controller = controller_with(gateway, GenerationFlow::Direct);
    controller
        .update_form(|form| form.outline = "stale".into())
        .await;

    assert!(controller.apply_preset("Mystery").await);
    assert!(!controller.apply_preset("unknown").await);

    let form = controller.form().await;
    assert_eq!(form.genre, "detective");
    assert_eq!(form.outline, "");
    let names: Vec<_> = controller
        .characters()
        .await
        .into_iter()
        .map(|(_, entry)| entry.name)
        .collect();
    assert_eq!(names, vec!["เรย์", "มิน"]);
}

#[tokio::test]
async fn fresh_controller_starts_with_default_characters() {
    let controller = controller_with(Arc::new(ScriptedGateway::default()), GenerationFlow::Direct);
    let names: Vec<_> = controller
        .characters()
        .await
        .into_iter()
        .map(|(_, entry)| entry.name)
        .collect();
    assert_eq!(names, vec!["มะลิ", "ต้นน้ำ"]);
}
