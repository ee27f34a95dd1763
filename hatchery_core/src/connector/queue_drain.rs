use super::{HarvestContext, QueueDrainSource};
use crate::models::Action;
use crate::naming::log_prefix;
use crate::storage::{FileRef, ObjectSource};
use crate::{Error, Result};
use futures_util::StreamExt;

/// Drain a notification queue: copy every referenced object into the sink
/// and acknowledge the message only after all of its copies succeeded.
///
/// Stops on an empty receive, after `max_pulls` receives, or on the first
/// error. A failed copy leaves its message on the queue for redelivery.
#[tracing::instrument(
    level = "info",
    name = "hatchery.queue_drain.run",
    skip_all,
    fields(action_id = %action.id, request_id = %ctx.request_id)
)]
pub async fn run(
    ctx: &HarvestContext,
    action: &Action,
    source: &dyn QueueDrainSource,
) -> Result<()> {
    let now = ctx.clock.now();
    let dir = log_prefix(
        action.prefix.as_deref(),
        action.partition.unwrap_or_default(),
        now,
    );

    let mut pulls: u64 = 0;
    loop {
        if source.max_pulls().is_some_and(|max| pulls >= max) {
            tracing::info!(pulls, "pull limit reached");
            break;
        }

        let batch = ctx
            .guard(source.queue().receive(source.max_messages()))
            .await?;
        pulls += 1;
        if batch.is_empty() {
            tracing::debug!(pulls, "queue drained");
            break;
        }
        tracing::debug!(pulls, messages = batch.len(), "received batch");

        for msg in &batch {
            let files = source.decode(msg)?;
            for file in &files {
                let key = format!("{dir}{}", file.path);
                copy_object(ctx, source.objects(), file, &action.bucket, &key).await?;
            }
            ctx.guard(source.queue().delete(&msg.receipt_handle)).await?;
            tracing::debug!(files = files.len(), "message acknowledged");
        }
    }
    Ok(())
}

async fn copy_object(
    ctx: &HarvestContext,
    objects: &dyn ObjectSource,
    file: &FileRef,
    bucket: &str,
    key: &str,
) -> Result<()> {
    let mut stream = ctx.guard(objects.get(&file.bucket, &file.path)).await?;
    let mut writer = ctx.guard(ctx.sink.new_writer(bucket, key)).await?;
    let mut copied = 0usize;
    loop {
        let next = ctx.guard(async { Ok::<_, Error>(stream.next().await) }).await?;
        let Some(chunk) = next else { break };
        let chunk = chunk?;
        copied += chunk.len();
        ctx.guard(writer.write(&chunk)).await?;
    }
    ctx.guard(writer.close()).await?;
    tracing::info!(object = %key, bytes = copied, "object copied");
    Ok(())
}
