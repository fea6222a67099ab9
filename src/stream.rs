//! The PDF export adapter: a pass-through stream transform.
//!
//! [`PdfExport::transform`] takes a stream of [`FileRecord`]s and yields each
//! one back, writing a PDF beside every materialised HTML file as a side
//! effect.
//!
//! | Record | Yielded item |
//! |--------|--------------|
//! | `Null` | `Ok` with [`PdfStatus::Skipped`] |
//! | `Stream` | `Err(`[`ExportError::UnsupportedInput`]`)`, record dropped |
//! | `Buffer`, [`ForwardMode::Immediate`] | `Ok` with [`PdfStatus::Pending`], right away |
//! | `Buffer`, [`ForwardMode::AfterExport`] | `Ok` with [`PdfStatus::Finished`] |
//!
//! Under [`FailurePolicy::FailFast`](crate::config::FailurePolicy) the first
//! error ends the stream. A conversion failure then arrives as
//! `Err(`[`ExportError::Conversion`]`)` instead of inside the record.
//!
//! Records are converted concurrently and, with `AfterExport`, yielded in
//! completion order.

use crate::browser::{BrowserLauncher, ChromeLauncher, ChromeSettings};
use crate::config::{ExportConfig, ForwardMode};
use crate::error::{ExportError, RenderError};
use crate::output::PdfOutput;
use crate::pipeline::pool::SessionPool;
use crate::pipeline::render;
use crate::record::{Contents, FileRecord};
use futures::stream::{self, BoxStream, StreamExt};
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_stream::Stream;
use tracing::{debug, warn};

/// A boxed stream of forwarded records.
pub type ExportStream = Pin<Box<dyn Stream<Item = Result<ExportedRecord, ExportError>> + Send>>;

/// A record leaving the adapter, with what became of its PDF.
#[derive(Debug)]
pub struct ExportedRecord {
    /// The record exactly as it came in.
    pub record: FileRecord,
    pub pdf: PdfStatus,
}

/// The PDF side effect of one forwarded record.
#[derive(Debug)]
pub enum PdfStatus {
    /// Null record; nothing was rendered.
    Skipped,
    /// Conversion still running in the background.
    Pending(PdfHandle),
    /// Conversion done.
    Finished(Result<PdfOutput, RenderError>),
}

impl PdfStatus {
    /// Wait for the conversion, if there is one.
    pub async fn outcome(self) -> Option<Result<PdfOutput, RenderError>> {
        match self {
            PdfStatus::Skipped => None,
            PdfStatus::Pending(handle) => Some(handle.outcome().await),
            PdfStatus::Finished(result) => Some(result),
        }
    }
}

/// A background conversion. Dropping the handle does not cancel it.
#[derive(Debug)]
pub struct PdfHandle {
    source: PathBuf,
    task: JoinHandle<Result<PdfOutput, RenderError>>,
}

impl PdfHandle {
    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the PDF to be written or to fail.
    pub async fn outcome(self) -> Result<PdfOutput, RenderError> {
        match self.task.await {
            Ok(result) => result,
            Err(e) => Err(RenderError::Aborted {
                path: self.source,
                detail: e.to_string(),
            }),
        }
    }
}

/// The export adapter.
///
/// Cheap to clone; clones share one session pool.
///
/// # Example
/// ```rust,no_run
/// use futures::StreamExt;
/// use sitepdf::{
///     ChromeSettings, ExportConfig, ExportOptions, FileRecord, Length, Margin, PaperFormat,
///     PdfExport,
/// };
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let options = ExportOptions::new(PaperFormat::Letter, Margin::uniform(Length::cm(1.0)));
/// let export = PdfExport::chrome(ExportConfig::builder(options).build()?, ChromeSettings::default());
///
/// let records = futures::stream::iter(vec![FileRecord::read("dist/index.html").await?]);
/// let mut out = export.transform(records);
/// while let Some(item) = out.next().await {
///     let forwarded = item?;
///     if let Some(Err(e)) = forwarded.pdf.outcome().await {
///         eprintln!("{e}");
///     }
/// }
/// export.shutdown().await;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct PdfExport {
    inner: Arc<Inner>,
}

struct Inner {
    config: ExportConfig,
    pool: SessionPool,
}

impl PdfExport {
    pub fn new(config: ExportConfig, launcher: Arc<dyn BrowserLauncher>) -> Self {
        let pool = SessionPool::new(launcher, config.session_strategy, config.max_sessions);
        Self {
            inner: Arc::new(Inner { config, pool }),
        }
    }

    /// Adapter backed by headless Chrome.
    pub fn chrome(config: ExportConfig, settings: ChromeSettings) -> Self {
        Self::new(config, Arc::new(ChromeLauncher::new(settings)))
    }

    pub fn config(&self) -> &ExportConfig {
        &self.inner.config
    }

    /// Browser sessions launched so far.
    pub fn sessions_launched(&self) -> usize {
        self.inner.pool.launched()
    }

    /// Handle a single record according to the configured [`ForwardMode`].
    ///
    /// The failure policy does not apply here: a failed conversion is
    /// returned inside the record.
    pub async fn process(&self, record: FileRecord) -> Result<ExportedRecord, ExportError> {
        let forwarded = self.forward(record, None)?;
        if self.inner.config.forward == ForwardMode::Immediate {
            return Ok(forwarded);
        }
        Ok(ExportedRecord {
            pdf: finish(forwarded.pdf).await,
            record: forwarded.record,
        })
    }

    /// Run the adapter over `input`.
    pub fn transform<S>(&self, input: S) -> ExportStream
    where
        S: Stream<Item = FileRecord> + Send + 'static,
    {
        let input = input.boxed();
        match self.inner.config.forward {
            ForwardMode::AfterExport => self.transform_after_export(input),
            ForwardMode::Immediate => self.transform_immediate(input),
        }
    }

    /// Close idle browser sessions. Sessions still converting are closed
    /// as soon as they finish, and no new ones start.
    pub async fn shutdown(&self) {
        self.inner.pool.shutdown().await;
    }

    fn transform_after_export(&self, input: BoxStream<'static, FileRecord>) -> ExportStream {
        let fail_fast = self.inner.config.is_fail_fast();
        let limit = self.inner.config.max_sessions.unwrap_or(usize::MAX);
        let this = self.clone();

        let s = input
            .map(move |record| {
                let this = this.clone();
                async move {
                    let forwarded = this.forward(record, None)?;
                    let pdf = finish(forwarded.pdf).await;
                    match pdf {
                        PdfStatus::Finished(Err(e)) if fail_fast => Err(ExportError::Conversion(e)),
                        pdf => Ok(ExportedRecord {
                            record: forwarded.record,
                            pdf,
                        }),
                    }
                }
            })
            .buffer_unordered(limit);

        if fail_fast {
            Box::pin(stop_after_error(s))
        } else {
            Box::pin(s)
        }
    }

    fn transform_immediate(&self, input: BoxStream<'static, FileRecord>) -> ExportStream {
        let fail_fast = self.inner.config.is_fail_fast();
        let (tx, failures) = mpsc::unbounded_channel();
        let state = Immediate {
            input,
            export: self.clone(),
            report_to: fail_fast.then_some(tx),
            failures,
            done: false,
        };

        Box::pin(stream::unfold(state, move |mut st| async move {
            if st.done {
                return None;
            }
            // A conversion that already failed in the background stops
            // the stream before anything else is forwarded.
            if let Ok(e) = st.failures.try_recv() {
                st.done = true;
                return Some((Err(ExportError::Conversion(e)), st));
            }

            // While upstream is slow, a failure arriving in the meantime
            // wins over the next record.
            let next = if fail_fast {
                tokio::select! {
                    biased;
                    Some(e) = st.failures.recv() => {
                        st.done = true;
                        return Some((Err(ExportError::Conversion(e)), st));
                    }
                    next = st.input.next() => next,
                }
            } else {
                st.input.next().await
            };

            match next {
                Some(record) => {
                    if let Ok(e) = st.failures.try_recv() {
                        st.done = true;
                        return Some((Err(ExportError::Conversion(e)), st));
                    }
                    let item = st.export.forward(record, st.report_to.clone());
                    if item.is_err() && fail_fast {
                        st.done = true;
                    }
                    Some((item, st))
                }
                None => {
                    st.done = true;
                    // Every running conversion holds a sender; the channel
                    // closes once the last one finishes.
                    st.report_to = None;
                    let late = st.failures.recv().await?;
                    Some((Err(ExportError::Conversion(late)), st))
                }
            }
        }))
    }

    /// Classify a record and, if it qualifies, start its conversion.
    fn forward(
        &self,
        record: FileRecord,
        report_to: Option<mpsc::UnboundedSender<RenderError>>,
    ) -> Result<ExportedRecord, ExportError> {
        let pdf = match record.contents {
            Contents::Null => {
                debug!("Passing through null record {}", record.path.display());
                PdfStatus::Skipped
            }
            Contents::Stream(_) => {
                warn!("Rejecting stream-backed record {}", record.path.display());
                return Err(ExportError::UnsupportedInput { path: record.path });
            }
            Contents::Buffer(_) => PdfStatus::Pending(self.spawn(record.path.clone(), report_to)),
        };
        Ok(ExportedRecord { record, pdf })
    }

    fn spawn(
        &self,
        source: PathBuf,
        report_to: Option<mpsc::UnboundedSender<RenderError>>,
    ) -> PdfHandle {
        let inner = Arc::clone(&self.inner);
        let path = source.clone();
        let task = tokio::spawn(async move {
            let result = render::export_record(&inner.pool, &path, &inner.config).await;
            if let (Err(e), Some(tx)) = (&result, report_to) {
                let _ = tx.send(e.clone());
            }
            result
        });
        PdfHandle { source, task }
    }
}

struct Immediate {
    input: BoxStream<'static, FileRecord>,
    export: PdfExport,
    report_to: Option<mpsc::UnboundedSender<RenderError>>,
    failures: mpsc::UnboundedReceiver<RenderError>,
    done: bool,
}

async fn finish(pdf: PdfStatus) -> PdfStatus {
    match pdf {
        PdfStatus::Pending(handle) => PdfStatus::Finished(handle.outcome().await),
        other => other,
    }
}

/// Yield items up to and including the first error, then drop `s` so
/// nothing behind the error is started.
fn stop_after_error<S, T>(s: S) -> impl Stream<Item = Result<T, ExportError>>
where
    S: Stream<Item = Result<T, ExportError>>,
{
    stream::unfold(Some(Box::pin(s)), |state| async move {
        let mut s = state?;
        let item = s.next().await?;
        let rest = if item.is_err() { None } else { Some(s) };
        Some((item, rest))
    })
}
