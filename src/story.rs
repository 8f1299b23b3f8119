use reqwest::header::{AUTHORIZATION, USER_AGENT};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::{debug, info, warn};

use crate::error::{require_file, Error, Result};

const COMPLETIONS_URL: &str = "https://api.openai.com/v1/chat/completions";

/// Story lines plus the prompts for the images that illustrate them
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoryScript {
    #[serde(default)]
    pub story: Vec<String>,
    #[serde(default)]
    pub image_prompts: Vec<String>,
}

impl StoryScript {
    pub fn load(path: &Path) -> Result<Self> {
        require_file("story JSON", path)?;
        let data = fs::read_to_string(path)?;
        let script: StoryScript = serde_json::from_str(&data)?;
        if script.lines().next().is_none() {
            return Err(Error::Validation(format!(
                "'story' missing or empty in {}",
                path.display()
            )));
        }
        Ok(script)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Trimmed, non-blank story lines
    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.story.iter().map(|l| l.trim()).filter(|l| !l.is_empty())
    }

    /// The story as one line of narration
    pub fn narration_text(&self) -> String {
        self.lines().collect::<Vec<_>>().join(" ")
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    content: String,
}

fn story_prompt(topic: &str) -> String {
    format!(
        r#"You are a creative writer and visual imagination expert.
Using the theme: {topic}, write a short story with a MAXIMUM of 6 lines.
Each line must be a full, meaningful sentence (English only, family-friendly).
Then create exactly 5 self-contained image prompts that illustrate the key moments
of the story. Each image prompt should describe the scene vividly, including
subjects, environment, mood, lighting, composition, and style.

Return ONLY valid JSON (no markdown, no commentary) using this format:
{{
  "story": ["line 1", "line 2", "line 3", "line 4", "line 5", "line 6"],
  "image_prompts": ["prompt 1", "prompt 2", "prompt 3", "prompt 4", "prompt 5"]
}}
Use double quotes for everything and ensure valid JSON only."#
    )
}

/// Parses a model reply, falling back to the outermost `{...}` span when the
/// model wraps the JSON in extra text.
pub fn extract_json(text: &str) -> Result<StoryScript> {
    let text = text.trim();
    match serde_json::from_str(text) {
        Ok(script) => Ok(script),
        Err(first) => {
            let (Some(start), Some(end)) = (text.find('{'), text.rfind('}')) else {
                return Err(first.into());
            };
            if end <= start {
                return Err(first.into());
            }
            debug!("Reply is not bare JSON; retrying on the outermost braces");
            Ok(serde_json::from_str(&text[start..=end])?)
        }
    }
}

/// Asks the language model for a story about `topic`.
pub async fn generate_story(topic: &str, api_key: &str, model: &str) -> anyhow::Result<StoryScript> {
    info!("Requesting story for topic '{}' from {}", topic, model);
    let request = ChatRequest {
        model,
        messages: vec![ChatMessage {
            role: "user",
            content: story_prompt(topic),
        }],
        max_tokens: 700,
        temperature: 0.6,
    };

    let client = reqwest::Client::new();
    let res: ChatResponse = client
        .post(COMPLETIONS_URL)
        .header(USER_AGENT, "storyreel/0.1")
        .header(AUTHORIZATION, format!("Bearer {}", api_key))
        .json(&request)
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;

    let reply = res
        .choices
        .into_iter()
        .next()
        .map(|c| c.message.content)
        .ok_or_else(|| anyhow::anyhow!("language model returned no choices"))?;

    let script = extract_json(&reply)?;
    if script.lines().next().is_none() {
        anyhow::bail!("language model returned an empty story");
    }
    if script.image_prompts.len() != 5 {
        warn!("Expected 5 image prompts, got {}", script.image_prompts.len());
    }
    info!(
        "Story has {} lines and {} image prompts",
        script.story.len(),
        script.image_prompts.len()
    );
    Ok(script)
}
