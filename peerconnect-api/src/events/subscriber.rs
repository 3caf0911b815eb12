use std::sync::Arc;

use futures_lite::StreamExt;
use lapin::options::BasicAckOptions;

use peerconnect_shared::types::event::{payloads, routing_keys, Event};
use peerconnect_shared::AppResult;

use crate::services::achievements::AchievementService;
use crate::AppState;

const RECOMPUTE_QUEUE: &str = "peerconnect-api.achievements.recompute";
const RECOMPUTE_PREFETCH: u16 = 8;

/// Consumes achievement recompute requests raised by session transitions.
pub async fn listen_achievement_recompute(state: Arc<AppState>) -> anyhow::Result<()> {
    let Some(rabbitmq) = state.events.client() else {
        tracing::warn!("event bus disabled, recompute consumer not started");
        return Ok(());
    };

    let mut consumer = rabbitmq
        .subscribe(RECOMPUTE_QUEUE, &[routing_keys::ACHIEVEMENTS_RECOMPUTE], RECOMPUTE_PREFETCH)
        .await?;

    tracing::info!(
        auto_award = state.config.auto_award_achievements,
        "listening for achievements.recompute events"
    );

    while let Some(delivery) = consumer.next().await {
        match delivery {
            Ok(delivery) => {
                match serde_json::from_slice::<Event<payloads::AchievementsRecompute>>(&delivery.data) {
                    Ok(event) => {
                        let data = &event.data;
                        if let Err(e) =
                            handle_recompute(&state.achievements, state.config.auto_award_achievements, data)
                        {
                            tracing::error!(
                                error = %e,
                                user_id = %data.user_id,
                                session_id = %data.session_id,
                                "achievement recompute failed"
                            );
                        }
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "failed to deserialize achievements.recompute event");
                    }
                }
                let _ = delivery.ack(BasicAckOptions::default()).await;
            }
            Err(e) => {
                tracing::error!(error = %e, "consumer error");
            }
        }
    }

    Ok(())
}

/// Returns how many achievements were newly awarded. Progress is only
/// turned into awards when `auto_award` is on.
pub fn handle_recompute(
    achievements: &AchievementService,
    auto_award: bool,
    data: &payloads::AchievementsRecompute,
) -> AppResult<usize> {
    if !auto_award {
        tracing::debug!(user_id = %data.user_id, session_id = %data.session_id, "auto-award disabled, skipping");
        return Ok(0);
    }

    let awarded = achievements.sync_earned(data.user_id)?;
    if !awarded.is_empty() {
        tracing::info!(user_id = %data.user_id, count = awarded.len(), "achievements auto-awarded");
    }
    Ok(awarded.len())
}
