use super::{HarvestContext, PageRequest, PollingSource};
use crate::models::Action;
use crate::naming::log_prefix;
use crate::{Error, Result};
use flate2::Compression;
use flate2::write::GzEncoder;
use std::io::Write;

/// Drive a polling connector until the provider reports no next cursor,
/// `max_pages` is reached, or the first error.
///
/// Every page is persisted as its own gzip object before the cursor
/// advances, so a failure mid-run leaves the earlier pages in place.
#[tracing::instrument(
    level = "info",
    name = "hatchery.polling.run",
    skip_all,
    fields(action_id = %action.id, request_id = %ctx.request_id)
)]
pub async fn run(ctx: &HarvestContext, action: &Action, source: &dyn PollingSource) -> Result<()> {
    let now = ctx.clock.now();
    let window = chrono::Duration::from_std(source.window())
        .map_err(|e| Error::InvalidInput(format!("action {}: window out of range: {e}", action.id)))?;
    let start = now.checked_sub_signed(window).ok_or_else(|| {
        Error::InvalidInput(format!("action {}: window reaches before the calendar", action.id))
    })?;
    let dir = log_prefix(
        action.prefix.as_deref(),
        action.partition.unwrap_or_default(),
        now,
    );

    let mut cursor: Option<String> = None;
    let mut seq: u64 = 0;
    loop {
        if source.max_pages().is_some_and(|max| seq >= max) {
            tracing::info!(seq, "page limit reached");
            break;
        }

        let page = PageRequest {
            now,
            start,
            seq,
            cursor: cursor.clone(),
        };
        let req = source.build_request(&page)?;
        let context = format!("{} {}", req.method, req.url);
        let resp = ctx.guard(ctx.http.send(req)).await?;
        if !resp.is_success() {
            return Err(Error::upstream(context, resp.status, resp.body_snippet()));
        }

        let next = source.decode(&resp.body)?;
        let key = format!("{dir}{}", source.object_name(&page));
        let framed = gzip(&resp.body)?;
        persist(ctx, &action.bucket, &key, &framed).await?;
        tracing::info!(seq, object = %key, bytes = resp.body.len(), "page stored");

        match next {
            Some(c) if !c.is_empty() => {
                cursor = Some(c);
                seq += 1;
            }
            _ => break,
        }
    }
    Ok(())
}

fn gzip(payload: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(payload)
        .map_err(|e| Error::backend("gzip page", e))?;
    encoder.finish().map_err(|e| Error::backend("gzip page", e))
}

async fn persist(ctx: &HarvestContext, bucket: &str, key: &str, data: &[u8]) -> Result<()> {
    let mut writer = ctx.guard(ctx.sink.new_writer(bucket, key)).await?;
    ctx.guard(writer.write(data)).await?;
    ctx.guard(writer.close()).await
}
