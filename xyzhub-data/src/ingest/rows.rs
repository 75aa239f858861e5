//! CSV adapter delivering header-keyed rows.

use csv_async::{AsyncReaderBuilder, StringRecord};
use tokio::io::AsyncRead;
use xyzhub_core::ChunkSize;

use super::{BatchSink, Batcher, IngestError, drain};

/// One CSV record paired with the header names, in column order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CsvRow {
    fields: Vec<(String, String)>,
}

impl CsvRow {
    /// Build a row from `(header, value)` pairs.
    #[must_use]
    pub const fn new(fields: Vec<(String, String)>) -> Self {
        Self { fields }
    }

    /// Value of the first column named `header`.
    #[must_use]
    pub fn get(&self, header: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(name, _)| name == header)
            .map(|(_, value)| value.as_str())
    }

    /// Header names in column order.
    pub fn headers(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(name, _)| name.as_str())
    }

    /// `(header, value)` pairs in column order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_str()))
    }

    /// Number of columns.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether the row has no columns.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl FromIterator<(String, String)> for CsvRow {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

/// Stream CSV records from `reader` into `sink`.
///
/// The first record is the header row. Records with a different number of
/// fields than the header abort the read.
///
/// # Errors
/// Returns [`IngestError::Csv`] for the first undecodable record and any
/// error raised by the sink. On failure the sink is aborted rather than
/// finished.
pub async fn stream_csv_rows<R, S>(
    reader: R,
    input: &str,
    size: ChunkSize,
    mut sink: S,
) -> Result<S::Summary, IngestError>
where
    R: AsyncRead + Unpin + Send,
    S: BatchSink<CsvRow>,
{
    let mut batcher = Batcher::new(size);
    match feed_rows(reader, input, &mut batcher, &mut sink).await {
        Ok(()) => drain(batcher, sink).await,
        Err(error) => Err(sink.abort(error).await),
    }
}

async fn feed_rows<R, S>(
    reader: R,
    input: &str,
    batcher: &mut Batcher<CsvRow>,
    sink: &mut S,
) -> Result<(), IngestError>
where
    R: AsyncRead + Unpin + Send,
    S: BatchSink<CsvRow>,
{
    let csv_error = |record: u64, source: csv_async::Error| IngestError::Csv {
        input: input.to_owned(),
        record,
        source,
    };
    let mut rdr = AsyncReaderBuilder::new()
        .has_headers(true)
        .create_reader(reader);
    let headers: Vec<String> = rdr
        .headers()
        .await
        .map_err(|source| csv_error(0, source))?
        .iter()
        .map(|header| header.trim().to_owned())
        .collect();

    let mut record = StringRecord::new();
    let mut count = 0_u64;
    loop {
        let more = rdr
            .read_record(&mut record)
            .await
            .map_err(|source| csv_error(count + 1, source))?;
        if !more {
            return Ok(());
        }
        count += 1;
        let row = headers
            .iter()
            .cloned()
            .zip(record.iter().map(str::to_owned))
            .collect();
        if let Some(batch) = batcher.push(row) {
            sink.accept(batch).await?;
        }
    }
}
