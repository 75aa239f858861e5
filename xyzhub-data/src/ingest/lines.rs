//! GeoJSON-Lines adapter: one JSON value per non-blank line.

use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use xyzhub_core::ChunkSize;

use super::{BatchSink, Batcher, IngestError, drain};

/// Stream newline-delimited JSON from `reader` into `sink`.
///
/// `input` labels errors. Blank lines are skipped but still counted for
/// line numbers.
///
/// # Errors
/// Returns [`IngestError::Read`] on I/O failure, [`IngestError::Line`] for
/// the first line that is not valid JSON, and any error raised by the sink.
/// On failure the sink is aborted rather than finished.
pub async fn stream_lines<R, S>(
    reader: R,
    input: &str,
    size: ChunkSize,
    mut sink: S,
) -> Result<S::Summary, IngestError>
where
    R: AsyncBufRead + Unpin + Send,
    S: BatchSink<Value>,
{
    let mut batcher = Batcher::new(size);
    match feed_lines(reader, input, &mut batcher, &mut sink).await {
        Ok(()) => drain(batcher, sink).await,
        Err(error) => Err(sink.abort(error).await),
    }
}

async fn feed_lines<R, S>(
    reader: R,
    input: &str,
    batcher: &mut Batcher<Value>,
    sink: &mut S,
) -> Result<(), IngestError>
where
    R: AsyncBufRead + Unpin + Send,
    S: BatchSink<Value>,
{
    let mut lines = reader.lines();
    let mut line_number = 0_u64;
    while let Some(line) = lines
        .next_line()
        .await
        .map_err(|source| IngestError::Read {
            input: input.to_owned(),
            source,
        })?
    {
        line_number += 1;
        if line.trim().is_empty() {
            continue;
        }
        let value = serde_json::from_str(&line).map_err(|source| IngestError::Line {
            input: input.to_owned(),
            line: line_number,
            source,
        })?;
        if let Some(batch) = batcher.push(value) {
            sink.accept(batch).await?;
        }
    }
    Ok(())
}
