use lapin::options::{
    BasicConsumeOptions, BasicPublishOptions, BasicQosOptions, ExchangeDeclareOptions,
    QueueBindOptions, QueueDeclareOptions,
};
use lapin::types::FieldTable;
use lapin::{BasicProperties, Channel, Connection, ConnectionProperties, Consumer, ExchangeKind};
use serde::Serialize;
use std::sync::Arc;

use crate::types::Event;

pub const EXCHANGE_NAME: &str = "peerconnect.events";

const PERSISTENT: u8 = 2;

#[derive(Debug, thiserror::Error)]
pub enum BusError {
    #[error("failed to encode event: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("amqp error: {0}")]
    Amqp(#[from] lapin::Error),
}

/// Domain event bus on the `peerconnect.events` topic exchange.
#[derive(Clone)]
pub struct RabbitMQClient {
    connection: Arc<Connection>,
    channel: Channel,
}

impl RabbitMQClient {
    pub async fn connect(url: &str) -> Result<Self, BusError> {
        let connection = Connection::connect(url, ConnectionProperties::default()).await?;
        let channel = connection.create_channel().await?;

        channel
            .exchange_declare(
                EXCHANGE_NAME,
                ExchangeKind::Topic,
                ExchangeDeclareOptions {
                    durable: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await?;

        tracing::info!(exchange = EXCHANGE_NAME, "connected to RabbitMQ");
        Ok(Self {
            connection: Arc::new(connection),
            channel,
        })
    }

    /// Publishes `event` as persistent JSON and waits for the broker confirm.
    pub async fn publish<T: Serialize>(&self, routing_key: &str, event: &Event<T>) -> Result<(), BusError> {
        let payload = serde_json::to_vec(event)?;

        self.channel
            .basic_publish(
                EXCHANGE_NAME,
                routing_key,
                BasicPublishOptions::default(),
                &payload,
                BasicProperties::default()
                    .with_content_type("application/json".into())
                    .with_message_id(event.id.to_string().into())
                    .with_delivery_mode(PERSISTENT),
            )
            .await?
            .await?;

        tracing::debug!(routing_key = %routing_key, event_id = %event.id, "event published");
        Ok(())
    }

    /// Declares a durable queue bound to `routing_keys` and consumes it with at
    /// most `prefetch` unacked deliveries in flight.
    pub async fn subscribe(
        &self,
        queue_name: &str,
        routing_keys: &[&str],
        prefetch: u16,
    ) -> Result<Consumer, BusError> {
        let channel = self.connection.create_channel().await?;
        channel.basic_qos(prefetch, BasicQosOptions::default()).await?;

        channel
            .queue_declare(
                queue_name,
                QueueDeclareOptions {
                    durable: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await?;

        for key in routing_keys {
            channel
                .queue_bind(
                    queue_name,
                    EXCHANGE_NAME,
                    key,
                    QueueBindOptions::default(),
                    FieldTable::default(),
                )
                .await?;
        }

        let consumer = channel
            .basic_consume(
                queue_name,
                &format!("{queue_name}.consumer"),
                BasicConsumeOptions::default(),
                FieldTable::default(),
            )
            .await?;

        tracing::info!(queue = %queue_name, bindings = ?routing_keys, prefetch, "subscribed to RabbitMQ queue");
        Ok(consumer)
    }

    pub fn is_connected(&self) -> bool {
        self.connection.status().connected() && self.channel.status().connected()
    }
}
