//! AMQP listener loop.
//!
//! Consumes the plugin's job queue one message at a time, dispatches to
//! the plugin's [`JobHandler`], publishes the completion, and acks. A
//! broker failure tears down the session and is followed by a
//! fixed-delay reconnect, so the worker survives broker restarts.

use std::time::Duration;

use futures::StreamExt;
use lapin::message::Delivery;
use lapin::options::{
    BasicAckOptions, BasicConsumeOptions, BasicNackOptions, BasicPublishOptions, BasicQosOptions,
    QueueDeclareOptions,
};
use lapin::types::FieldTable;
use lapin::{BasicProperties, Channel, Connection, ConnectionProperties};
use sqlx::PgPool;

use crate::handler::JobHandler;
use crate::message::{DispatcherMessage, PluginCompletion};

/// Reconnection delay after a broker failure.
const RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// Queue the dispatcher consumes completion reports from.
const DISPATCHER_QUEUE: &str = "dispatcher";

/// Prefix of the per-plugin job queues.
const QUEUE_PREFIX: &str = "dispatcher_";

/// Run the job consume loop indefinitely.
///
/// This function never returns under normal operation. It reconnects
/// with a fixed delay if the broker connection drops.
pub async fn run<H: JobHandler>(amqp_url: &str, pool: &PgPool, handler: &H) {
    let queue = format!("{QUEUE_PREFIX}{}", handler.plugin_name());

    loop {
        tracing::info!(queue = %queue, "Connecting to message broker");

        match Connection::connect(amqp_url, ConnectionProperties::default()).await {
            Ok(connection) => {
                tracing::info!("Broker connection established");
                if let Err(e) = run_session(&connection, &queue, pool, handler).await {
                    tracing::error!(error = %e, "Broker session failed");
                }
                tracing::warn!("Broker session ended, reconnecting");
            }
            Err(e) => {
                tracing::error!(error = %e, "Broker connection failed");
            }
        }

        tokio::time::sleep(RECONNECT_DELAY).await;
    }
}

/// Drive a single broker session: declare the queues, then consume jobs
/// until the stream ends or a channel operation fails.
async fn run_session<H: JobHandler>(
    connection: &Connection,
    queue: &str,
    pool: &PgPool,
    handler: &H,
) -> Result<(), lapin::Error> {
    let channel = connection.create_channel().await?;

    // One unacked job at a time; the handler blocks for the whole tool run.
    channel.basic_qos(1, BasicQosOptions::default()).await?;

    channel
        .queue_declare(queue, QueueDeclareOptions::default(), FieldTable::default())
        .await?;
    channel
        .queue_declare(
            DISPATCHER_QUEUE,
            QueueDeclareOptions::default(),
            FieldTable::default(),
        )
        .await?;

    let mut consumer = channel
        .basic_consume(
            queue,
            "",
            BasicConsumeOptions::default(),
            FieldTable::default(),
        )
        .await?;

    tracing::info!(queue = %queue, "Waiting for jobs");

    while let Some(delivery) = consumer.next().await {
        handle_delivery(&channel, pool, handler, delivery?).await?;
    }

    Ok(())
}

/// Decode and dispatch one delivery, then ack or nack it.
///
/// Payloads that do not decode as a job message are dropped without
/// requeue; there is nothing to retry in a deterministic decode.
async fn handle_delivery<H: JobHandler>(
    channel: &Channel,
    pool: &PgPool,
    handler: &H,
    delivery: Delivery,
) -> Result<(), lapin::Error> {
    let message: DispatcherMessage = match serde_json::from_slice(&delivery.data) {
        Ok(message) => message,
        Err(e) => {
            tracing::warn!(error = %e, "Discarding undecodable job message");
            return delivery
                .nack(BasicNackOptions {
                    requeue: false,
                    ..Default::default()
                })
                .await;
        }
    };

    tracing::info!(
        analysis_id = %message.analysis_id,
        organization_id = %message.organization_id,
        "Job received",
    );

    match handler.handle(pool, &message).await {
        Ok(outcome) => {
            let completion = PluginCompletion {
                analysis_id: message.analysis_id,
                plugin: handler.plugin_name().to_string(),
                version: handler.plugin_version().to_string(),
                status: outcome.status,
                result: outcome.result,
            };
            publish_completion(channel, &completion).await?;
            delivery.ack(BasicAckOptions::default()).await?;
            tracing::info!(
                analysis_id = %message.analysis_id,
                status = %completion.status,
                "Job completed",
            );
        }
        Err(e) => {
            // First failure goes back on the queue; a redelivered job is
            // dropped so one poison job cannot loop forever.
            let requeue = !delivery.redelivered;
            tracing::error!(
                error = %e,
                analysis_id = %message.analysis_id,
                requeue,
                "Job failed",
            );
            delivery
                .nack(BasicNackOptions {
                    requeue,
                    ..Default::default()
                })
                .await?;
        }
    }

    Ok(())
}

/// Publish a completion report to the dispatcher's queue.
async fn publish_completion(
    channel: &Channel,
    completion: &PluginCompletion,
) -> Result<(), lapin::Error> {
    let payload =
        serde_json::to_vec(completion).expect("PluginCompletion is always serialisable");
    channel
        .basic_publish(
            "",
            DISPATCHER_QUEUE,
            BasicPublishOptions::default(),
            &payload,
            BasicProperties::default(),
        )
        .await?
        .await?;
    Ok(())
}
