use serde::Serialize;
use uuid::Uuid;

use peerconnect_shared::clients::rabbitmq::RabbitMQClient;
use peerconnect_shared::types::event::{payloads, routing_keys, Event};

use crate::models::{ChatMessage, PeerSession, SessionReview};
use crate::services::lifecycle::TransitionOutcome;

pub const SOURCE: &str = "peerconnect-api";
const PREVIEW_CHARS: usize = 100;

/// Publishes domain events. A disabled publisher drops them, which keeps
/// request handling independent of the bus.
#[derive(Clone)]
pub struct EventPublisher {
    rabbitmq: Option<RabbitMQClient>,
}

impl EventPublisher {
    pub fn new(rabbitmq: RabbitMQClient) -> Self {
        Self { rabbitmq: Some(rabbitmq) }
    }

    pub fn disabled() -> Self {
        Self { rabbitmq: None }
    }

    pub fn client(&self) -> Option<&RabbitMQClient> {
        self.rabbitmq.as_ref()
    }

    async fn publish<T: Serialize>(&self, routing_key: &str, event: Event<T>) {
        let Some(rabbitmq) = &self.rabbitmq else {
            tracing::debug!(routing_key = %routing_key, "event bus disabled, dropping event");
            return;
        };
        if let Err(e) = rabbitmq.publish(routing_key, &event).await {
            tracing::error!(error = %e, routing_key = %routing_key, "failed to publish event");
        }
    }
}

fn preview(body: &str) -> String {
    body.chars().take(PREVIEW_CHARS).collect()
}

pub async fn publish_session_created(events: &EventPublisher, session: &PeerSession, requester: Uuid) {
    let event = Event::new(
        SOURCE,
        routing_keys::SESSION_CREATED,
        payloads::SessionCreated {
            session_id: session.id,
            mentor_id: session.mentor_id,
            learner_id: session.learner_id,
            skill_id: session.skill_id,
        },
    )
    .with_user(requester);

    events.publish(routing_keys::SESSION_CREATED, event).await;
}

/// Announces the transition, then asks for an achievement recompute for
/// each participant.
pub async fn publish_status_changed(events: &EventPublisher, outcome: &TransitionOutcome, changed_by: Uuid) {
    let session = &outcome.session;
    let event = Event::new(
        SOURCE,
        routing_keys::SESSION_STATUS_CHANGED,
        payloads::SessionStatusChanged {
            session_id: session.id,
            mentor_id: session.mentor_id,
            learner_id: session.learner_id,
            from_status: outcome.from.as_str().to_string(),
            to_status: session.status.as_str().to_string(),
            changed_by,
            points_awarded: outcome.points_awarded,
        },
    )
    .with_user(changed_by)
    .with_correlation(session.id);

    events.publish(routing_keys::SESSION_STATUS_CHANGED, event).await;

    for user_id in outcome.recompute_for() {
        let event = Event::new(
            SOURCE,
            routing_keys::ACHIEVEMENTS_RECOMPUTE,
            payloads::AchievementsRecompute {
                user_id,
                session_id: session.id,
            },
        )
        .with_user(user_id)
        .with_correlation(session.id);

        events.publish(routing_keys::ACHIEVEMENTS_RECOMPUTE, event).await;
    }
}

pub async fn publish_review_submitted(events: &EventPublisher, review: &SessionReview) {
    let event = Event::new(
        SOURCE,
        routing_keys::REVIEW_SUBMITTED,
        payloads::ReviewSubmitted {
            review_id: review.id,
            session_id: review.session_id,
            reviewer_id: review.reviewer_id,
            reviewee_id: review.reviewee_id,
            rating: review.rating,
        },
    )
    .with_user(review.reviewer_id);

    events.publish(routing_keys::REVIEW_SUBMITTED, event).await;
}

pub async fn publish_message_sent(events: &EventPublisher, message: &ChatMessage) {
    let event = Event::new(
        SOURCE,
        routing_keys::CHAT_MESSAGE_SENT,
        payloads::ChatMessageSent {
            message_id: message.id,
            session_id: message.session_id,
            sender_id: message.sender_id,
            message_type: message.message_type.as_str().to_string(),
            content_preview: preview(&message.message),
        },
    )
    .with_user(message.sender_id);

    events.publish(routing_keys::CHAT_MESSAGE_SENT, event).await;
}
