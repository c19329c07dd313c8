use shared::{
    domain::{AspectRatio, CharacterEntry},
    protocol::StoryParameters,
};

use crate::settings::GenerationFlow;

/// Free-form fields the user edits alongside the roster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoryForm {
    pub genre: String,
    pub tone: String,
    pub age: String,
    pub length: String,
    pub setting: String,
    pub theme: String,
    pub relationships: String,
    pub idea: String,
    pub want_illustration_prompt: bool,
    /// Editable outline draft; only sent in the outline-first flow.
    pub outline: String,
    pub user_direction: String,
    pub aspect_ratio: AspectRatio,
}

impl Default for StoryForm {
    fn default() -> Self {
        Self {
            genre: "fantasy".into(),
            tone: "warm".into(),
            age: "kids".into(),
            length: "short".into(),
            setting: "หมู่บ้านเล็กๆใกล้ป่า".into(),
            theme: "มิตรภาพและความพยายาม".into(),
            relationships: String::new(),
            idea: String::new(),
            want_illustration_prompt: true,
            outline: String::new(),
            user_direction: String::new(),
            aspect_ratio: AspectRatio::default(),
        }
    }
}

impl StoryForm {
    /// Builds the request body from the form and a roster snapshot taken at submission.
    pub fn parameters(&self, characters: Vec<CharacterEntry>, flow: GenerationFlow) -> StoryParameters {
        let outline = match flow {
            GenerationFlow::OutlineFirst => {
                Some(self.outline.trim()).filter(|outline| !outline.is_empty())
            }
            GenerationFlow::Direct => None,
        };

        StoryParameters {
            genre: self.genre.clone(),
            tone: self.tone.clone(),
            age: self.age.clone(),
            length: self.length.clone(),
            setting: self.setting.clone(),
            theme: self.theme.clone(),
            relationships: self.relationships.clone(),
            idea: self.idea.clone(),
            characters,
            want_illustration_prompt: self.want_illustration_prompt,
            outline: outline.map(str::to_string),
        }
    }
}
