use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::{orchestrator::Orchestrator, types::VideoAsset};

fn default_audience() -> String {
    "general".to_string()
}

fn default_tone() -> String {
    "engaging".to_string()
}

/// One requested video.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchItem {
    pub topic: String,
    #[serde(default = "default_audience")]
    pub audience: String,
    #[serde(default = "default_tone")]
    pub tone: String,
}

impl BatchItem {
    pub fn new(topic: &str) -> Self {
        Self {
            topic: topic.to_string(),
            audience: default_audience(),
            tone: default_tone(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum BatchOutcome {
    Scheduled {
        asset: Box<VideoAsset>,
        scheduled_at: DateTime<Utc>,
    },
    Failed {
        error: String,
        item: BatchItem,
    },
}

impl BatchOutcome {
    pub fn is_scheduled(&self) -> bool {
        matches!(self, BatchOutcome::Scheduled { .. })
    }
}

/// Slot for the item at `index`. Failed items still consume their slot.
///
/// `None` when the slot is past the last representable date.
pub fn slot_for(base: DateTime<Utc>, index: usize, hours_apart: u32) -> Option<DateTime<Utc>> {
    let hours = i64::try_from(index)
        .ok()?
        .checked_mul(i64::from(hours_apart))?;
    base.checked_add_signed(TimeDelta::try_hours(hours)?)
}

pub struct BatchScheduler {
    orchestrator: Orchestrator,
    item_delay: Duration,
}

impl BatchScheduler {
    pub fn new(orchestrator: Orchestrator, item_delay: Duration) -> Self {
        Self {
            orchestrator,
            item_delay,
        }
    }

    pub fn orchestrator(&self) -> &Orchestrator {
        &self.orchestrator
    }

    pub async fn run_batch(&self, items: &[BatchItem], hours_apart: u32) -> Vec<BatchOutcome> {
        self.run_batch_from(items, hours_apart, Utc::now()).await
    }

    /// Run every item in order. Slots start one hour after `now`.
    pub async fn run_batch_from(
        &self,
        items: &[BatchItem],
        hours_apart: u32,
        now: DateTime<Utc>,
    ) -> Vec<BatchOutcome> {
        let base = now.checked_add_signed(TimeDelta::hours(1));
        let mut outcomes = Vec::with_capacity(items.len());

        for (index, item) in items.iter().enumerate() {
            if index > 0 && !self.item_delay.is_zero() {
                tokio::time::sleep(self.item_delay).await;
            }

            info!(index, total = items.len(), topic = %item.topic, "batch item");
            let Some(scheduled_at) = base.and_then(|base| slot_for(base, index, hours_apart)) else {
                let error = format!(
                    "item {} cannot be scheduled {} hours apart: date out of range",
                    index + 1,
                    hours_apart
                );
                warn!(index, topic = %item.topic, %error, "batch item skipped");
                outcomes.push(BatchOutcome::Failed {
                    error,
                    item: item.clone(),
                });
                continue;
            };

            let result = match self
                .orchestrator
                .run_pipeline(&item.topic, &item.audience, &item.tone)
                .await
            {
                Ok(mut asset) => self
                    .orchestrator
                    .publish(&mut asset, scheduled_at)
                    .await
                    .map(|()| asset),
                Err(e) => Err(e),
            };

            outcomes.push(match result {
                Ok(asset) => BatchOutcome::Scheduled {
                    asset: Box::new(asset),
                    scheduled_at,
                },
                Err(e) => {
                    warn!(index, topic = %item.topic, error = %e, "batch item failed");
                    BatchOutcome::Failed {
                        error: e.to_string(),
                        item: item.clone(),
                    }
                }
            });
        }

        let succeeded = outcomes.iter().filter(|o| o.is_scheduled()).count();
        info!("batch finished: {}/{} succeeded", succeeded, outcomes.len());
        outcomes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn items_default_audience_and_tone() {
        let items: Vec<BatchItem> = serde_json::from_str(
            r#"[{"topic": "Cats"}, {"topic": "Dogs", "audience": "kids", "tone": "funny"}]"#,
        )
        .unwrap();

        assert_eq!(items[0], BatchItem::new("Cats"));
        assert_eq!(items[1].audience, "kids");
        assert_eq!(items[1].tone, "funny");
    }

    #[test]
    fn slots_are_spaced_by_index() {
        let base = DateTime::parse_from_rfc3339("2026-01-01T10:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(slot_for(base, 0, 24), Some(base));
        assert_eq!(slot_for(base, 2, 24), Some(base + TimeDelta::hours(48)));
        assert_eq!(slot_for(base, 3, 6), Some(base + TimeDelta::hours(18)));
    }

    #[test]
    fn unrepresentable_slots_are_none() {
        let base = DateTime::parse_from_rfc3339("2026-01-01T10:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(slot_for(base, 0, u32::MAX), Some(base));
        assert_eq!(slot_for(base, 1, u32::MAX), None);
        assert_eq!(slot_for(base, usize::MAX, 24), None);
    }

    #[test]
    fn failed_outcome_serializes_with_item() {
        let outcome = BatchOutcome::Failed {
            error: "boom".into(),
            item: BatchItem::new("Cats"),
        };
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["outcome"], "failed");
        assert_eq!(json["item"]["topic"], "Cats");
        assert_eq!(json["error"], "boom");
    }
}
