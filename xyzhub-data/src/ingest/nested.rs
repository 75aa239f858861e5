//! Incremental extraction of the top-level `features` array from a single
//! JSON document.
//!
//! [`FeatureArrayScanner`] is a byte-level state machine. It tracks string
//! and escape state so brackets inside strings are ignored, follows object
//! nesting only far enough to recognise the `features` key of the root
//! object, and then slices out each array element as raw bytes. Elements
//! are parsed by the caller, so memory use is bounded by the largest single
//! feature rather than the document.

use serde_json::Value;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};
use xyzhub_core::ChunkSize;

use super::{BatchSink, Batcher, IngestError, drain};

const READ_BUFFER: usize = 64 * 1024;
const FEATURES_KEY: &[u8] = b"features";

/// Structural problems found while scanning a document.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScanError {
    /// The document is not a JSON object.
    #[error("expected a JSON object at byte {offset}")]
    NotAnObject {
        /// Zero-based byte offset.
        offset: u64,
    },
    /// A closing bracket had no matching opening bracket.
    #[error("unbalanced closing bracket at byte {offset}")]
    Unbalanced {
        /// Zero-based byte offset.
        offset: u64,
    },
    /// The root object has no `features` array.
    #[error("document has no top-level `features` array")]
    MissingFeatures,
    /// Input ended inside the `features` array.
    #[error("input ended inside the `features` array")]
    Truncated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Seeking,
    InArray,
    Done,
}

/// Byte-level scanner yielding the raw elements of the root object's
/// `features` array.
///
/// # Examples
/// ```
/// use xyzhub_data::ingest::FeatureArrayScanner;
///
/// let mut scanner = FeatureArrayScanner::new();
/// let mut elements = Vec::new();
/// scanner.feed(br#"{"bbox":[0,1],"features":[{"a":"]"},"#, &mut elements)?;
/// scanner.feed(br#" {"b":2}]}"#, &mut elements)?;
/// scanner.finish()?;
/// assert_eq!(elements, vec![br#"{"a":"]"}"#.to_vec(), br#"{"b":2}"#.to_vec()]);
/// # Ok::<(), xyzhub_data::ingest::ScanError>(())
/// ```
#[derive(Debug, Clone)]
pub struct FeatureArrayScanner {
    phase: Phase,
    offset: u64,
    in_string: bool,
    escaped: bool,
    // Seeking state.
    depth: usize,
    started: bool,
    expect_key: bool,
    key: Option<Vec<u8>>,
    last_key: Option<Vec<u8>>,
    value_is_features: bool,
    // Element state.
    element: Vec<u8>,
    element_depth: usize,
}

impl Default for FeatureArrayScanner {
    fn default() -> Self {
        Self::new()
    }
}

impl FeatureArrayScanner {
    /// A scanner positioned before the document.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            phase: Phase::Seeking,
            offset: 0,
            in_string: false,
            escaped: false,
            depth: 0,
            started: false,
            expect_key: false,
            key: None,
            last_key: None,
            value_is_features: false,
            element: Vec::new(),
            element_depth: 0,
        }
    }

    /// Whether the closing bracket of the `features` array has been seen.
    #[must_use]
    pub fn is_done(&self) -> bool {
        self.phase == Phase::Done
    }

    /// Consume `bytes`, appending each completed element to `out`.
    ///
    /// Bytes after the end of the `features` array are ignored.
    ///
    /// # Errors
    /// Returns [`ScanError`] when the document structure is malformed.
    pub fn feed(&mut self, bytes: &[u8], out: &mut Vec<Vec<u8>>) -> Result<(), ScanError> {
        for &byte in bytes {
            match self.phase {
                Phase::Seeking => self.seek(byte)?,
                Phase::InArray => self.capture(byte, out),
                Phase::Done => return Ok(()),
            }
            self.offset += 1;
        }
        Ok(())
    }

    /// Check the scanner reached the end of the `features` array.
    ///
    /// # Errors
    /// Returns [`ScanError::MissingFeatures`] when no array was found and
    /// [`ScanError::Truncated`] when input stopped inside it.
    pub const fn finish(&self) -> Result<(), ScanError> {
        match self.phase {
            Phase::Seeking => Err(ScanError::MissingFeatures),
            Phase::InArray => Err(ScanError::Truncated),
            Phase::Done => Ok(()),
        }
    }

    /// Returns whether `byte` was consumed as part of a string.
    fn string_byte(&mut self, byte: u8) -> bool {
        if !self.in_string {
            return false;
        }
        if self.escaped {
            self.escaped = false;
        } else if byte == b'\\' {
            self.escaped = true;
        } else if byte == b'"' {
            self.in_string = false;
        }
        true
    }

    fn seek(&mut self, byte: u8) -> Result<(), ScanError> {
        let was_in_string = self.in_string;
        if self.string_byte(byte) {
            if let Some(key) = self.key.as_mut() {
                if self.in_string {
                    key.push(byte);
                } else if was_in_string {
                    self.last_key = self.key.take();
                }
            }
            return Ok(());
        }
        if byte.is_ascii_whitespace() {
            return Ok(());
        }
        if self.depth == 0 && (self.started || byte != b'{') {
            if self.started {
                // Trailing bytes after the root object closed.
                return Ok(());
            }
            return Err(ScanError::NotAnObject {
                offset: self.offset,
            });
        }
        match byte {
            b'"' => {
                self.in_string = true;
                if self.depth == 1 && self.expect_key {
                    self.key = Some(Vec::new());
                    self.expect_key = false;
                }
                self.value_is_features = false;
            }
            b':' if self.depth == 1 => {
                self.value_is_features = self.last_key.as_deref() == Some(FEATURES_KEY);
                self.last_key = None;
            }
            b',' if self.depth == 1 => {
                self.expect_key = true;
                self.value_is_features = false;
            }
            b'[' if self.depth == 1 && self.value_is_features => {
                self.phase = Phase::InArray;
                self.value_is_features = false;
            }
            b'{' | b'[' => {
                self.depth += 1;
                self.started = true;
                self.expect_key = self.depth == 1;
                self.value_is_features = false;
            }
            b'}' | b']' => {
                self.depth = self
                    .depth
                    .checked_sub(1)
                    .ok_or(ScanError::Unbalanced {
                        offset: self.offset,
                    })?;
            }
            _ => self.value_is_features = false,
        }
        Ok(())
    }

    fn capture(&mut self, byte: u8, out: &mut Vec<Vec<u8>>) {
        if self.string_byte(byte) {
            self.element.push(byte);
            return;
        }
        if self.element_depth == 0 {
            match byte {
                b']' => {
                    self.emit(out);
                    self.phase = Phase::Done;
                }
                b',' => self.emit(out),
                b'{' | b'[' => {
                    self.element.push(byte);
                    self.element_depth = 1;
                }
                b'"' => {
                    self.element.push(byte);
                    self.in_string = true;
                }
                _ if byte.is_ascii_whitespace() => {}
                _ => self.element.push(byte),
            }
            return;
        }
        self.element.push(byte);
        match byte {
            b'"' => self.in_string = true,
            b'{' | b'[' => self.element_depth += 1,
            b'}' | b']' => {
                self.element_depth -= 1;
                if self.element_depth == 0 {
                    self.emit(out);
                }
            }
            _ => {}
        }
    }

    fn emit(&mut self, out: &mut Vec<Vec<u8>>) {
        if !self.element.is_empty() {
            out.push(std::mem::take(&mut self.element));
        }
    }
}

/// Stream the elements of the root `features` array in `reader` into `sink`.
///
/// Reading stops at the end of the array.
///
/// # Errors
/// Returns [`IngestError::Read`] on I/O failure, [`IngestError::Scan`] for a
/// malformed or truncated document, [`IngestError::Element`] for an element
/// that is not valid JSON, and any error raised by the sink. On failure the
/// sink is aborted rather than finished.
pub async fn stream_features<R, S>(
    reader: R,
    input: &str,
    size: ChunkSize,
    mut sink: S,
) -> Result<S::Summary, IngestError>
where
    R: AsyncRead + Unpin + Send,
    S: BatchSink<Value>,
{
    let mut batcher = Batcher::new(size);
    match feed_features(reader, input, &mut batcher, &mut sink).await {
        Ok(()) => drain(batcher, sink).await,
        Err(error) => Err(sink.abort(error).await),
    }
}

async fn feed_features<R, S>(
    mut reader: R,
    input: &str,
    batcher: &mut Batcher<Value>,
    sink: &mut S,
) -> Result<(), IngestError>
where
    R: AsyncRead + Unpin + Send,
    S: BatchSink<Value>,
{
    let scan_error = |source| IngestError::Scan {
        input: input.to_owned(),
        source,
    };
    let mut scanner = FeatureArrayScanner::new();
    let mut buffer = vec![0_u8; READ_BUFFER];
    let mut elements = Vec::new();
    let mut index = 0_u64;
    while !scanner.is_done() {
        let read = reader
            .read(&mut buffer)
            .await
            .map_err(|source| IngestError::Read {
                input: input.to_owned(),
                source,
            })?;
        if read == 0 {
            break;
        }
        scanner
            .feed(buffer.get(..read).unwrap_or_default(), &mut elements)
            .map_err(scan_error)?;
        for raw in elements.drain(..) {
            index += 1;
            let value = serde_json::from_slice(&raw).map_err(|source| IngestError::Element {
                input: input.to_owned(),
                index,
                source,
            })?;
            if let Some(batch) = batcher.push(value) {
                sink.accept(batch).await?;
            }
        }
    }
    scanner.finish().map_err(scan_error)
}
