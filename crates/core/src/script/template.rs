use async_trait::async_trait;

use crate::chain::TerminalFallback;

use super::prompt::{ScriptPrompt, fill_placeholders};

static TEMPLATE: &str = r#"[HOOK]
What if everything you thought you knew about {topic} was only half the story? Stick around, because by the end of this video you will see {topic} in a completely different way.

[INTRODUCTION]
Hey everyone, and welcome back to the channel! Today we are diving deep into {topic}, and this one is made especially for {audience}.
In this video you will learn:
- What {topic} really is and why it matters
- The most common mistakes people make with it
- Practical tips you can use today
- Where {topic} is heading next
- How to get started right away
If that sounds useful, hit the like button so more {audience} can find this video.

[MAIN CONTENT]
First, let's get the basics straight.
Point 1: Understanding {topic}. Before anything else, it helps to know where {topic} comes from and what problem it solves. Most {audience} run into it long before they put a name to it, so a clear picture of the fundamentals makes everything that follows easier.
Point 2: Why {topic} matters to {audience}. This is where things get practical. The people who get the most out of {topic} are the ones who connect it to their everyday goals instead of treating it as theory.
Now, point 3: Common mistakes. The biggest one is trying to do everything at once. Start small, pay attention to what works, and build on it one step at a time.
Point 4: Practical tips. Set aside a little time each week for {topic}, keep notes on what you try, and compare your results. Small, consistent habits beat big bursts of effort every single time.
Next, point 5: What comes next. {topic} keeps changing, and staying curious is the best way to keep up. Follow the people who do it well and learn from their experiments.

[CONCLUSION]
So let's recap. We covered what {topic} is, why it matters for {audience}, the mistakes to avoid, and the habits that actually move the needle.
Finally, remember that the best time to start is today. Pick one idea from this video and try it this week.

[CALL TO ACTION]
If this helped you, subscribe and turn on notifications so you never miss a video. Tell me in the comments what you want to learn about {topic} next. Thanks for watching, and I will see you in the next one!
"#;

/// Deterministic script written from the topic and audience alone.
pub fn render_template(topic: &str, audience: &str) -> String {
    fill_placeholders(TEMPLATE, topic, audience, "")
}

/// Last resort for the script stage. Never fails and never returns empty text.
pub struct TemplateFallback;

#[async_trait]
impl TerminalFallback<ScriptPrompt, String> for TemplateFallback {
    fn name(&self) -> &str {
        "template"
    }

    async fn produce(&self, prompt: &ScriptPrompt) -> String {
        render_template(&prompt.topic, &prompt.audience)
    }
}
