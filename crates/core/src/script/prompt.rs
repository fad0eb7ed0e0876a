use std::sync::LazyLock;

use regex::{Captures, Regex};

pub static SYSTEM_INSTRUCTION: &str =
    "You are a professional YouTube script writer who creates engaging, SEO-optimized content.";

static SCRIPT_PROMPT: &str = r#"
Write a complete YouTube video script about "{topic}" for {audience}.

REQUIREMENTS:
- Tone: {tone}
- Length: 8-12 minutes of narration (1200-1800 words)
- Open with a hook that lands in the first 15 seconds
- Use clear sections with spoken transitions between them
- End with a call to action

STRUCTURE:
1. HOOK (0-15 seconds): grab attention immediately
2. INTRODUCTION (15-30 seconds): what the viewer will learn
3. MAIN CONTENT (6-10 minutes): 3-5 key points with examples
4. CONCLUSION (1-2 minutes): recap and call to action

STYLE:
- Talk to the viewer directly ("you")
- Ask the viewer questions
- Include surprising facts or numbers where they help
- Change pace every 30-60 seconds to keep attention

TARGET AUDIENCE: {audience}
TOPIC: {topic}

Write only the narration, ready to be read aloud.
"#;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Tone {
    #[default]
    Engaging,
    Educational,
    Funny,
}

impl Tone {
    /// Unknown labels fall back to [`Tone::Engaging`].
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_lowercase().as_str() {
            "educational" => Tone::Educational,
            "funny" => Tone::Funny,
            _ => Tone::Engaging,
        }
    }

    pub fn instruction(self) -> &'static str {
        match self {
            Tone::Engaging => {
                "Use an enthusiastic, captivating tone with strong hooks and emotional appeals."
            }
            Tone::Educational => {
                "Use a clear, informative tone with step-by-step explanations and examples."
            }
            Tone::Funny => {
                "Use humor, jokes, and entertaining asides while keeping the content informative."
            }
        }
    }
}

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{(topic|audience|tone)\}").expect("placeholder pattern is valid"));

/// Substitute `{topic}`, `{audience}` and `{tone}` in one pass, so braces
/// inside the substituted values are left alone.
pub(crate) fn fill_placeholders(template: &str, topic: &str, audience: &str, tone: &str) -> String {
    PLACEHOLDER
        .replace_all(template, |caps: &Captures| match &caps[1] {
            "topic" => topic,
            "audience" => audience,
            _ => tone,
        })
        .into_owned()
}

/// Everything a text provider needs to write one script.
#[derive(Debug, Clone, PartialEq)]
pub struct ScriptPrompt {
    pub system: String,
    pub user: String,
    pub topic: String,
    pub audience: String,
    pub tone: Tone,
}

impl ScriptPrompt {
    pub fn build(topic: &str, audience: &str, tone: &str) -> Self {
        let tone = Tone::from_label(tone);
        let user = fill_placeholders(SCRIPT_PROMPT, topic, audience, tone.instruction());

        Self {
            system: SYSTEM_INSTRUCTION.to_string(),
            user,
            topic: topic.to_string(),
            audience: audience.to_string(),
            tone,
        }
    }
}
