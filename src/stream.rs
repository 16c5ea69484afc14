//! Batch conversion: run several requests, emitting results as they finish.
//!
//! Each request is converted by the same [`Converter`] with at most
//! [`crate::config::ConversionConfig::concurrency`] requests in flight.
//! Results arrive in completion order, not submission order; match them
//! up by [`BatchItem::input`].

use crate::config::ConversionRequest;
use crate::convert::Converter;
use crate::error::DocRouteError;
use crate::output::ConversionOutput;
use futures::stream::{self, StreamExt};
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;
use tokio_stream::Stream;
use tracing::{debug, info, warn};

/// Result of one request in a batch.
#[derive(Debug)]
pub struct BatchItem {
    /// The request's input path.
    pub input: PathBuf,
    pub result: Result<ConversionOutput, DocRouteError>,
}

/// A boxed stream of batch results.
pub type BatchStream = Pin<Box<dyn Stream<Item = BatchItem> + Send>>;

/// Convert every request, streaming results as they complete.
///
/// Requests without an input are skipped; they would convert to nothing.
///
/// # Example
/// ```rust,no_run
/// use docroute::{convert_stream, ConversionConfig, ConversionRequest, Converter, LanguageTable, MineruCli};
/// use futures::StreamExt;
/// use std::sync::Arc;
///
/// # #[tokio::main]
/// # async fn main() {
/// let converter = Arc::new(Converter::new(
///     ConversionConfig::default(),
///     Arc::new(LanguageTable::builtin()),
///     Arc::new(MineruCli::default()),
/// ));
/// let requests = vec![ConversionRequest::new("a.pdf"), ConversionRequest::new("b.png")];
/// let mut results = convert_stream(converter, requests);
/// while let Some(item) = results.next().await {
///     match item.result {
///         Ok(out) => println!("{} → {}", item.input.display(), out.markdown_path.display()),
///         Err(e) => eprintln!("{}: {e}", item.input.display()),
///     }
/// }
/// # }
/// ```
pub fn convert_stream(converter: Arc<Converter>, requests: Vec<ConversionRequest>) -> BatchStream {
    let concurrency = converter.config().concurrency.max(1);
    let jobs: Vec<(PathBuf, ConversionRequest)> = requests
        .into_iter()
        .filter_map(|request| match request.input.clone() {
            Some(input) => Some((input, request)),
            None => {
                debug!("Skipping batch request without input");
                None
            }
        })
        .collect();
    info!(
        "Starting batch conversion: {} inputs, concurrency {}",
        jobs.len(),
        concurrency
    );

    let s = stream::iter(jobs.into_iter().map(move |(input, request)| {
        let converter = Arc::clone(&converter);
        async move {
            let result = converter.convert(&request).await.and_then(|out| {
                out.ok_or_else(|| DocRouteError::Internal("Request lost its input".into()))
            });
            if let Err(e) = &result {
                warn!("Batch item {} failed: {}", input.display(), e);
            }
            BatchItem { input, result }
        }
    }))
    .buffer_unordered(concurrency);

    Box::pin(s)
}
