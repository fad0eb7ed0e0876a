use crate::{
    batch::BatchOutcome,
    types::{ScriptResult, VideoAsset},
};

/// Format seconds as MM:SS timestamp
pub fn format_timestamp(seconds: f64) -> String {
    let mins = (seconds / 60.0) as u32;
    let secs = (seconds % 60.0) as u32;
    format!("{:02}:{:02}", mins, secs)
}

/// Format script sections with their start times
pub fn format_sections(script: &ScriptResult) -> String {
    script
        .sections
        .iter()
        .map(|section| {
            let preview: String = section.content.chars().take(72).collect();
            let ellipsis = if section.content.chars().count() > 72 { "…" } else { "" };
            format!(
                "[{}] ({} words) {}{}",
                format_timestamp(section.start_seconds),
                section.word_count,
                preview,
                ellipsis
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn format_asset_readable(asset: &VideoAsset) -> String {
    let mut output = String::new();
    output.push_str(&format!("# {}\n\n", asset.topic));
    output.push_str(&format!(
        "**Id:** {} | **Status:** {} | **Audience:** {} | **Tone:** {}\n\n",
        asset.id, asset.status, asset.audience, asset.tone
    ));

    if let Some(error) = &asset.error {
        output.push_str(&format!("**Error:** {}\n\n", error));
    }

    if let Some(script) = &asset.script {
        output.push_str(&format!(
            "## Script\n\n{} words, ~{:.1} minutes, written by {}\n\n",
            script.word_count, script.estimated_minutes, script.provider
        ));
        output.push_str(&format_sections(script));
        output.push_str("\n\n");
    }

    let passed_over: Vec<&String> = asset
        .script
        .iter()
        .flat_map(|script| &script.recovered_failures)
        .chain(&asset.voice_failures)
        .collect();
    if !passed_over.is_empty() {
        output.push_str("## Providers passed over\n\n");
        for note in passed_over {
            output.push_str(&format!("• {}\n", note));
        }
        output.push('\n');
    }

    output.push_str("## Artifacts\n\n");
    for (label, path) in [
        ("Audio", &asset.audio_file),
        ("Video", &asset.video_file),
        ("Thumbnail", &asset.thumbnail_file),
    ] {
        if let Some(path) = path {
            output.push_str(&format!("• {}: {}\n", label, path.display()));
        }
    }
    if let Some(provider) = &asset.voice_provider {
        output.push_str(&format!("• Voice: {}\n", provider));
    }
    if let Some(at) = asset.scheduled_at {
        output.push_str(&format!("• Scheduled: {}\n", at.to_rfc3339()));
    }
    if let Some(upload) = &asset.upload {
        output.push_str(&format!("• Uploaded: {}\n", upload.url));
    }

    output
}

/// One line per asset, for listings
pub fn format_asset_line(asset: &VideoAsset) -> String {
    format!(
        "{}  {:<18}  {}  {}",
        asset.id,
        asset.status.as_str(),
        asset.created_at.format("%Y-%m-%d %H:%M"),
        asset.topic
    )
}

pub fn format_batch_outcome(index: usize, outcome: &BatchOutcome) -> String {
    match outcome {
        BatchOutcome::Scheduled {
            asset,
            scheduled_at,
        } => format!(
            "{:>3}. {} → {} ({})",
            index + 1,
            asset.topic,
            scheduled_at.format("%Y-%m-%d %H:%M UTC"),
            asset.id
        ),
        BatchOutcome::Failed { error, item } => {
            format!("{:>3}. {} failed: {}", index + 1, item.topic, error)
        }
    }
}
