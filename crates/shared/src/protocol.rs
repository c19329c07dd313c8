use serde::{Deserialize, Serialize};

use crate::domain::{null_as_default, AspectRatio, Chapter, CharacterEntry, ExportFormat, StoryId};

/// Every field is a recognized generation option; nothing else is sent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoryParameters {
    pub genre: String,
    pub tone: String,
    pub age: String,
    pub length: String,
    pub setting: String,
    pub theme: String,
    pub relationships: String,
    pub idea: String,
    pub characters: Vec<CharacterEntry>,
    pub want_illustration_prompt: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outline: Option<String>,
}

impl StoryParameters {
    pub fn outline_request(&self) -> OutlineRequest {
        OutlineRequest {
            idea: self.idea.clone(),
            genre: self.genre.clone(),
            tone: self.tone.clone(),
            age: self.age.clone(),
            length: self.length.clone(),
            setting: self.setting.clone(),
            theme: self.theme.clone(),
            characters: self.characters.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutlineRequest {
    pub idea: String,
    pub genre: String,
    pub tone: String,
    pub age: String,
    pub length: String,
    pub setting: String,
    pub theme: String,
    pub characters: Vec<CharacterEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OutlineResponse {
    #[serde(default, deserialize_with = "null_as_default")]
    pub outline: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerateResponse {
    pub story_id: StoryId,
    #[serde(default, deserialize_with = "null_as_default")]
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub illustration_prompt: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoryRecord {
    #[serde(default, deserialize_with = "null_as_default")]
    pub full_text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub illustration_prompt: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoryResponse {
    #[serde(default, deserialize_with = "null_as_default")]
    pub story: StoryRecord,
    #[serde(default, deserialize_with = "null_as_default")]
    pub chapters: Vec<Chapter>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NextChapterRequest {
    pub story_id: StoryId,
    pub user_direction: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IllustrateRequest {
    pub story_id: StoryId,
    pub aspect_ratio: AspectRatio,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IllustrateResponse {
    pub image_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorySummary {
    pub id: StoryId,
    #[serde(default, deserialize_with = "null_as_default")]
    pub title: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub created_at: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StoryListResponse {
    #[serde(default, deserialize_with = "null_as_default")]
    pub items: Vec<StorySummary>,
}

/// Final path segment of a story's export resource, e.g. `12.pdf`.
pub fn download_file_name(story_id: &StoryId, format: ExportFormat) -> String {
    format!("{story_id}.{}", format.extension())
}
