//! Run jobs off the caller's thread.
//!
//! A job runs on tokio's blocking pool. Its progress events are forwarded
//! into an unbounded channel exposed as a `Stream`, and a shared
//! [`CancellationToken`] lets the caller stop it between units of work.
//!
//! ```rust,no_run
//! use docshift::{worker, Conversion, ConversionRequest, Engines};
//! use tokio_stream::StreamExt;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let engines = Engines::detect();
//! let request = ConversionRequest::beside_source("report.docx", Conversion::DocxToPdf);
//! let mut job = worker::spawn(engines, request);
//!
//! if let Some(mut events) = job.take_progress() {
//!     while let Some(ev) = events.next().await {
//!         eprintln!("{}/{} {}", ev.current, ev.total, ev.message);
//!     }
//! }
//! let result = job.wait().await?;
//! println!("{:?}", result.outcome);
//! # Ok(())
//! # }
//! ```

use crate::batch::{self, BatchOptions, BatchReport};
use crate::convert;
use crate::engine::Engines;
use crate::error::ConvertError;
use crate::output::OperationResult;
use crate::progress::{CancellationToken, Control, ProgressEvent};
use crate::request::ConversionRequest;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::UnboundedReceiverStream;

/// Progress events of one running job. Ends when the job finishes.
pub type ProgressStream = UnboundedReceiverStream<ProgressEvent>;

/// A job running on the blocking pool.
pub struct JobHandle<T> {
    token: CancellationToken,
    events: Option<ProgressStream>,
    join: JoinHandle<T>,
}

impl<T> JobHandle<T> {
    /// Request cancellation. The job stops at its next unit boundary.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// The progress stream. Returns `None` after the first call.
    pub fn take_progress(&mut self) -> Option<ProgressStream> {
        self.events.take()
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Wait for the job to finish.
    pub async fn wait(self) -> Result<T, ConvertError> {
        self.join
            .await
            .map_err(|e| ConvertError::Internal(format!("worker task failed: {e}")))
    }
}

/// Run `job` on the blocking pool with a fresh [`Control`].
///
/// Must be called from within a tokio runtime.
pub fn spawn_job<T, F>(job: F) -> JobHandle<T>
where
    T: Send + 'static,
    F: FnOnce(&Control) -> T + Send + 'static,
{
    let token = CancellationToken::new();
    let (tx, rx) = mpsc::unbounded_channel();
    let control = Control::new()
        .with_progress(Arc::new(move |current: usize, total: usize, msg: &str| {
            // Receiver gone means nobody is listening; keep working.
            let _ = tx.send(ProgressEvent {
                current,
                total,
                message: msg.to_string(),
            });
        }))
        .with_token(token.clone());

    let join = tokio::task::spawn_blocking(move || job(&control));
    JobHandle {
        token,
        events: Some(UnboundedReceiverStream::new(rx)),
        join,
    }
}

/// Run one conversion request. Fatal errors are folded into the result.
pub fn spawn(engines: Engines, request: ConversionRequest) -> JobHandle<OperationResult> {
    spawn_job(move |control| OperationResult::settle(convert::run(&engines, &request, control)))
}

/// Run a batch into `output_dir`.
pub fn spawn_batch(
    engines: Engines,
    files: Vec<PathBuf>,
    output_dir: PathBuf,
    options: BatchOptions,
) -> JobHandle<BatchReport> {
    spawn_job(move |control| batch::run_batch(&engines, &files, &output_dir, options, control))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_stream::StreamExt;

    #[tokio::test]
    async fn events_arrive_in_order_and_stream_ends() {
        let mut job = spawn_job(|control| {
            for i in 0..=3 {
                control.emit(i, 3, "step");
            }
            42
        });
        let events: Vec<_> = job.take_progress().unwrap().collect().await;
        assert!(job.take_progress().is_none());
        assert_eq!(events.iter().map(|e| e.current).collect::<Vec<_>>(), [0, 1, 2, 3]);
        assert_eq!(job.wait().await.unwrap(), 42);
    }

    #[tokio::test]
    async fn cancel_is_seen_by_the_job() {
        let job = spawn_job(|control| {
            let start = std::time::Instant::now();
            while !control.is_cancelled() {
                if start.elapsed() > std::time::Duration::from_secs(5) {
                    return false;
                }
                std::thread::yield_now();
            }
            true
        });
        job.cancel();
        assert!(job.wait().await.unwrap());
    }
}
