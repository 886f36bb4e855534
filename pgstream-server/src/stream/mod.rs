//! Row stream adapter
//!
//! Turns an ordered stream of product rows into the body of a JSON array:
//!
//! ```text
//! [\n{row},\n{row}\n]
//! ```
//!
//! The body is pull-driven. A row is only requested from the source after
//! the transport has taken the previous chunk, and each row waits out the
//! configured delay before it is emitted, so a slow client slows the cursor
//! down instead of piling rows up in memory.
//!
//! Lifecycle of the source:
//! - exhausted: the closing bracket is emitted and the source is dropped
//! - row error: the source is dropped and the body fails, which aborts the
//!   chunked transfer so the client never sees a closing bracket
//! - client gone: the transport drops the body, which drops the source
//!
//! The source owns its database lease, so in all three cases the lease is
//! returned exactly once, by `Drop`.

use std::io;
use std::time::Duration;

use axum::body::{Body, Bytes};
use futures::stream::{self, BoxStream, Stream, StreamExt};

use crate::db::DbError;
use crate::models::Product;

/// Pause applied before each row is written
pub const DEFAULT_ROW_DELAY: Duration = Duration::from_millis(10);

/// Log a progress line every this many rows
const PROGRESS_EVERY: u64 = 100;

const OPEN_ARRAY: &[u8] = b"[\n";
const ROW_SEPARATOR: &str = ",\n";
const CLOSE_ARRAY: &[u8] = b"\n]";

/// Anything that can be turned into an ordered stream of product rows.
///
/// The returned stream must own whatever resources back it; dropping the
/// stream is how those resources are released.
pub trait RowSource: Send + 'static {
    fn into_rows(self) -> BoxStream<'static, Result<Product, DbError>>;
}

/// Streaming behavior
#[derive(Debug, Clone, Copy)]
pub struct StreamOptions {
    /// Delay awaited before each row (zero disables it)
    pub row_delay: Duration,
}

impl Default for StreamOptions {
    fn default() -> Self {
        Self {
            row_delay: DEFAULT_ROW_DELAY,
        }
    }
}

/// A JSON array of rows that is ready to be sent.
///
/// Constructed only once the first row (or the end of the data) has been
/// read, so failures that happen before any output exist can still be
/// reported as a normal error response.
pub struct JsonArrayStream {
    framer: Framer,
}

impl JsonArrayStream {
    /// Start reading `source` and wait for its first row.
    ///
    /// On error the source has already been dropped.
    pub async fn open<S: RowSource>(source: S, options: StreamOptions) -> Result<Self, DbError> {
        let mut rows = source.into_rows();
        let first = rows.next().await.transpose()?;

        tracing::info!("Starting product stream");

        Ok(Self {
            framer: Framer {
                rows: Some(rows),
                pending: first,
                phase: Phase::Open,
                written: 0,
                row_delay: options.row_delay,
            },
        })
    }

    /// Body chunks, in order. Ends with an `Err` if a row fails.
    pub fn into_chunks(self) -> impl Stream<Item = Result<Bytes, io::Error>> + Send + 'static {
        stream::unfold(self.framer, |mut framer| async move {
            let chunk = framer.next_chunk().await?;
            Some((chunk, framer))
        })
    }

    /// Response body for the chunks.
    pub fn into_body(self) -> Body {
        Body::from_stream(self.into_chunks())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Open,
    Streaming,
    Done,
}

struct Framer {
    rows: Option<BoxStream<'static, Result<Product, DbError>>>,
    pending: Option<Product>,
    phase: Phase,
    written: u64,
    row_delay: Duration,
}

impl Framer {
    async fn next_chunk(&mut self) -> Option<Result<Bytes, io::Error>> {
        match self.phase {
            Phase::Open => {
                self.phase = Phase::Streaming;
                return Some(Ok(Bytes::from_static(OPEN_ARRAY)));
            }
            Phase::Streaming => {}
            Phase::Done => return None,
        }

        let next = match self.pending.take() {
            Some(product) => Some(Ok(product)),
            None => match self.rows.as_mut() {
                Some(rows) => rows.next().await,
                None => None,
            },
        };

        match next {
            Some(Ok(product)) => {
                if !self.row_delay.is_zero() {
                    tokio::time::sleep(self.row_delay).await;
                }
                Some(Ok(self.frame_row(&product)))
            }
            None => {
                self.finish();
                tracing::info!(rows = self.written, "Finished streaming products");
                Some(Ok(Bytes::from_static(CLOSE_ARRAY)))
            }
            Some(Err(e)) => {
                self.finish();
                tracing::error!(rows = self.written, error = %e, "Product stream failed mid-response");
                Some(Err(io::Error::other(e)))
            }
        }
    }

    fn frame_row(&mut self, product: &Product) -> Bytes {
        let json = product.as_json();
        let mut chunk = String::with_capacity(ROW_SEPARATOR.len() + json.len());
        if self.written > 0 {
            chunk.push_str(ROW_SEPARATOR);
        }
        chunk.push_str(json);

        self.written += 1;
        if self.written % PROGRESS_EVERY == 0 {
            tracing::debug!(rows = self.written, "Streaming products");
        }

        Bytes::from(chunk)
    }

    /// Release the source and mark the stream terminal.
    fn finish(&mut self) {
        self.rows = None;
        self.pending = None;
        self.phase = Phase::Done;
    }
}

impl Drop for Framer {
    fn drop(&mut self) {
        if self.phase != Phase::Done {
            tracing::info!(
                rows = self.written,
                "Client disconnected, stopping product stream"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use axum::body::to_bytes;

    /// Counts rows pulled from the source and how many times it was released.
    #[derive(Clone, Default)]
    struct Probe {
        fetched: Arc<AtomicUsize>,
        released: Arc<AtomicUsize>,
    }

    impl Probe {
        fn fetched(&self) -> usize {
            self.fetched.load(Ordering::SeqCst)
        }

        fn released(&self) -> usize {
            self.released.load(Ordering::SeqCst)
        }
    }

    struct Lease(Probe);

    impl Lease {
        fn fetch(&self) {
            self.0.fetched.fetch_add(1, Ordering::SeqCst);
        }
    }

    impl Drop for Lease {
        fn drop(&mut self) {
            self.0.released.fetch_add(1, Ordering::SeqCst);
        }
    }

    /// In-memory rows; `None` entries fail with a database error.
    struct MemorySource {
        rows: Vec<Option<String>>,
        probe: Probe,
    }

    impl MemorySource {
        fn new(rows: Vec<Option<String>>) -> (Self, Probe) {
            let probe = Probe::default();
            let source = Self {
                rows,
                probe: probe.clone(),
            };
            (source, probe)
        }

        fn products(n: usize) -> (Self, Probe) {
            Self::new(
                (1..=n)
                    .map(|id| Some(format!(r#"{{"id":{id},"name":"P{id}"}}"#)))
                    .collect(),
            )
        }
    }

    impl RowSource for MemorySource {
        fn into_rows(self) -> BoxStream<'static, Result<Product, DbError>> {
            let lease = Lease(self.probe);
            stream::iter(self.rows)
                .map(move |row| {
                    lease.fetch();
                    match row {
                        Some(text) => Ok(Product::from_json_text(text)?),
                        None => Err(DbError::Sqlx(sqlx::Error::Protocol(
                            "connection reset".into(),
                        ))),
                    }
                })
                .boxed()
        }
    }

    fn no_delay() -> StreamOptions {
        StreamOptions {
            row_delay: Duration::ZERO,
        }
    }

    async fn body_text(stream: JsonArrayStream) -> String {
        let bytes = to_bytes(stream.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn frames_rows_as_json_array() {
        let (source, probe) = MemorySource::new(vec![
            Some(r#"{"id":1,"name":"A"}"#.into()),
            Some(r#"{"id":2,"name":"B"}"#.into()),
        ]);

        let stream = JsonArrayStream::open(source, no_delay()).await.unwrap();
        let body = body_text(stream).await;

        assert_eq!(body, "[\n{\"id\":1,\"name\":\"A\"},\n{\"id\":2,\"name\":\"B\"}\n]");
        assert_eq!(probe.released(), 1);
    }

    #[tokio::test]
    async fn empty_source_is_empty_array() {
        let (source, probe) = MemorySource::new(vec![]);

        let stream = JsonArrayStream::open(source, no_delay()).await.unwrap();
        let body = body_text(stream).await;

        assert_eq!(body, "[\n\n]");
        let parsed: Vec<serde_json::Value> = serde_json::from_str(&body).unwrap();
        assert!(parsed.is_empty());
        assert_eq!(probe.released(), 1);
    }

    #[tokio::test]
    async fn keeps_source_order() {
        let (source, _) = MemorySource::products(250);

        let stream = JsonArrayStream::open(source, no_delay()).await.unwrap();
        let parsed: Vec<serde_json::Value> =
            serde_json::from_str(&body_text(stream).await).unwrap();

        let ids: Vec<u64> = parsed.iter().map(|v| v["id"].as_u64().unwrap()).collect();
        assert_eq!(ids, (1..=250).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn error_before_first_row_is_reported_up_front() {
        let (source, probe) = MemorySource::new(vec![None]);

        let result = JsonArrayStream::open(source, no_delay()).await;

        assert!(matches!(result, Err(DbError::Sqlx(_))));
        assert_eq!(probe.released(), 1);
    }

    #[tokio::test]
    async fn error_mid_stream_aborts_body_without_closing_bracket() {
        let (source, probe) = MemorySource::new(vec![
            Some(r#"{"id":1}"#.into()),
            Some(r#"{"id":2}"#.into()),
            None,
            Some(r#"{"id":4}"#.into()),
        ]);

        let stream = JsonArrayStream::open(source, no_delay()).await.unwrap();
        let chunks: Vec<Result<Bytes, io::Error>> = stream.into_chunks().collect().await;

        let (last, sent) = chunks.split_last().unwrap();
        assert!(last.is_err());
        let sent: Vec<u8> = sent
            .iter()
            .flat_map(|c| c.as_ref().unwrap().to_vec())
            .collect();
        assert_eq!(sent, b"[\n{\"id\":1},\n{\"id\":2}");
        assert_eq!(probe.fetched(), 3);
        assert_eq!(probe.released(), 1);
    }

    #[tokio::test]
    async fn error_mid_stream_fails_body() {
        let (source, _) = MemorySource::new(vec![Some(r#"{"id":1}"#.into()), None]);

        let stream = JsonArrayStream::open(source, no_delay()).await.unwrap();

        assert!(to_bytes(stream.into_body(), usize::MAX).await.is_err());
    }

    #[tokio::test]
    async fn disconnect_stops_fetching_and_releases_once() {
        let (source, probe) = MemorySource::products(5);

        let stream = JsonArrayStream::open(source, no_delay()).await.unwrap();
        let mut chunks = Box::pin(stream.into_chunks());

        assert_eq!(chunks.next().await.unwrap().unwrap(), &b"[\n"[..]);
        chunks.next().await.unwrap().unwrap();
        chunks.next().await.unwrap().unwrap();
        assert_eq!(probe.released(), 0);

        drop(chunks);

        assert_eq!(probe.fetched(), 2);
        assert_eq!(probe.released(), 1);
    }

    #[tokio::test]
    async fn dropping_unsent_stream_releases_source() {
        let (source, probe) = MemorySource::products(3);

        let stream = JsonArrayStream::open(source, no_delay()).await.unwrap();
        drop(stream);

        assert_eq!(probe.fetched(), 1);
        assert_eq!(probe.released(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn delays_each_row() {
        let (source, _) = MemorySource::products(3);
        let options = StreamOptions {
            row_delay: Duration::from_millis(10),
        };

        let start = tokio::time::Instant::now();
        let stream = JsonArrayStream::open(source, options).await.unwrap();
        let body = body_text(stream).await;

        assert!(start.elapsed() >= Duration::from_millis(30));
        assert!(body.ends_with("\n]"));
    }

    #[tokio::test]
    async fn concurrent_streams_do_not_interleave() {
        let expected = "[\n{\"id\":1,\"name\":\"P1\"},\n{\"id\":2,\"name\":\"P2\"},\n{\"id\":3,\"name\":\"P3\"}\n]";
        let options = StreamOptions {
            row_delay: Duration::from_millis(1),
        };

        let (a, probe_a) = MemorySource::products(3);
        let (b, probe_b) = MemorySource::products(3);

        let (body_a, body_b) = tokio::join!(
            async { body_text(JsonArrayStream::open(a, options).await.unwrap()).await },
            async { body_text(JsonArrayStream::open(b, options).await.unwrap()).await },
        );

        assert_eq!(body_a, expected);
        assert_eq!(body_b, expected);
        assert_eq!(probe_a.released(), 1);
        assert_eq!(probe_b.released(), 1);
    }
}
