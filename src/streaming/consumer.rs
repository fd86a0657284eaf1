//! Draining an extraction job under backpressure.
//!
//! The data channel of a job is unbounded in size, so it is read one block at
//! a time and each block is forwarded over a capacity-one channel before the
//! next read is issued. A slow client therefore stalls the job's output pipe
//! instead of growing a buffer here. The diagnostic channel is read whenever
//! it has something, so a job blocked on a full data pipe can never deadlock
//! against a full diagnostic pipe.

use super::job::{Channel, ExtractionJob};
use super::types::{DrainOutcome, Message};

use bytes::Bytes;
use log::{debug, error, info, warn};
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::sync::mpsc::{self, error::SendError};

pub const BLOCK_SIZE: usize = 8192;
pub const STATUS_RETRY: Duration = Duration::from_millis(100);

type Forward = Pin<Box<dyn Future<Output = Result<(), SendError<Message>>> + Send>>;

/// Creates the bounded channel the consumer forwards into.
pub fn channel() -> (mpsc::Sender<Message>, mpsc::Receiver<Message>) {
    mpsc::channel(1)
}

/// Drains `job` into `downstream` until the job has finished or the
/// receiving side has gone away.
///
/// Chunks are sent in order, followed by one `Message::Finished` carrying the
/// outcome (unless the receiver was dropped, in which case the job is
/// terminated and `Disconnected` is returned).
pub async fn drain<J: ExtractionJob>(
    job: &mut J,
    data: Channel,
    diag: Channel,
    downstream: mpsc::Sender<Message>,
    request_id: &str,
) -> DrainOutcome {
    let mut data = data;
    let mut diag = diag;
    let mut data_open = true;
    let mut diag_open = true;
    let mut data_buf = vec![0u8; BLOCK_SIZE];
    let mut diag_buf = vec![0u8; BLOCK_SIZE];
    let mut diagnostics = Diagnostics::new(request_id);
    let mut bytes: u64 = 0;
    let mut pending: Option<Forward> = None;

    while data_open || diag_open || pending.is_some() {
        tokio::select! {
            _ = downstream.closed() => {
                return disconnect(job, request_id);
            }
            res = diag.read(&mut diag_buf), if diag_open => match res {
                Ok(0) => {
                    debug!("[{}] Diagnostic channel closed", request_id);
                    diag_open = false;
                }
                Ok(n) => diagnostics.push(&diag_buf[..n]),
                Err(e) => {
                    warn!("[{}] Diagnostic channel read failed: {}", request_id, e);
                    diag_open = false;
                }
            },
            res = data.read(&mut data_buf), if data_open && pending.is_none() => match res {
                Ok(0) => {
                    debug!("[{}] Data channel closed after {} bytes", request_id, bytes);
                    data_open = false;
                }
                Ok(n) => {
                    bytes += n as u64;
                    let chunk = Bytes::copy_from_slice(&data_buf[..n]);
                    let tx = downstream.clone();
                    pending = Some(Box::pin(async move { tx.send(Message::Chunk(chunk)).await }));
                }
                Err(e) => {
                    error!("[{}] Data channel read failed: {}", request_id, e);
                    data_open = false;
                }
            },
            res = forward(&mut pending), if pending.is_some() => {
                pending = None;
                if res.is_err() {
                    return disconnect(job, request_id);
                }
            }
        }
    }

    let status = loop {
        match job.try_status() {
            Ok(Some(status)) => break status,
            Ok(None) => {
                tokio::select! {
                    _ = downstream.closed() => return disconnect(job, request_id),
                    _ = tokio::time::sleep(STATUS_RETRY) => {}
                }
            }
            Err(e) => {
                error!("[{}] Failed to get job status: {}", request_id, e);
                break -1;
            }
        }
    };

    let diagnostics = diagnostics.finish();
    let outcome = match (status, bytes) {
        (0, 0) => DrainOutcome::NoData,
        (0, bytes) => DrainOutcome::Data { bytes },
        (status, bytes) => DrainOutcome::Failure {
            status,
            diagnostics,
            bytes,
        },
    };
    info!("[{}] Extraction finished: {:?}", request_id, outcome);

    if downstream.send(Message::Finished(outcome.clone())).await.is_err() {
        debug!("[{}] Receiver gone before completion was delivered", request_id);
    }
    outcome
}

async fn forward(pending: &mut Option<Forward>) -> Result<(), SendError<Message>> {
    match pending.as_mut() {
        Some(send) => send.await,
        None => std::future::pending().await,
    }
}

fn disconnect<J: ExtractionJob>(job: &mut J, request_id: &str) -> DrainOutcome {
    info!("[{}] Client went away, terminating extraction", request_id);
    if let Err(e) = job.terminate() {
        warn!("[{}] Failed to terminate extraction: {}", request_id, e);
    }
    DrainOutcome::Disconnected
}

/// Collects diagnostic text, logging each complete line as it arrives.
struct Diagnostics<'a> {
    request_id: &'a str,
    text: Vec<u8>,
    logged: usize,
}

impl<'a> Diagnostics<'a> {
    fn new(request_id: &'a str) -> Self {
        Self {
            request_id,
            text: Vec::new(),
            logged: 0,
        }
    }

    fn push(&mut self, chunk: &[u8]) {
        self.text.extend_from_slice(chunk);
        while let Some(pos) = self.text[self.logged..].iter().position(|b| *b == b'\n') {
            let line = &self.text[self.logged..self.logged + pos];
            debug!(
                "[{}] extract: {}",
                self.request_id,
                String::from_utf8_lossy(line).trim_end()
            );
            self.logged += pos + 1;
        }
    }

    fn finish(self) -> String {
        String::from_utf8_lossy(&self.text).trim_end().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::io;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::task::{Context, Poll};
    use tokio::io::{AsyncRead, AsyncWriteExt, ReadBuf};
    use tokio_test::io::Builder;

    struct FakeJob {
        statuses: VecDeque<Option<i32>>,
        polls: usize,
        terminated: Arc<AtomicBool>,
    }

    impl FakeJob {
        fn new(statuses: &[Option<i32>]) -> Self {
            Self {
                statuses: statuses.iter().copied().collect(),
                polls: 0,
                terminated: Arc::new(AtomicBool::new(false)),
            }
        }
    }

    impl ExtractionJob for FakeJob {
        fn take_channels(&mut self) -> Option<(Channel, Channel)> {
            None
        }

        fn try_status(&mut self) -> io::Result<Option<i32>> {
            self.polls += 1;
            Ok(self.statuses.pop_front().unwrap_or(Some(0)))
        }

        fn terminate(&mut self) -> io::Result<()> {
            self.terminated.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    /// Counts how many reads are issued against the inner reader.
    struct CountingReader<R> {
        inner: R,
        reads: Arc<AtomicUsize>,
    }

    impl<R: AsyncRead + Unpin> AsyncRead for CountingReader<R> {
        fn poll_read(
            mut self: Pin<&mut Self>,
            cx: &mut Context<'_>,
            buf: &mut ReadBuf<'_>,
        ) -> Poll<io::Result<()>> {
            let poll = Pin::new(&mut self.inner).poll_read(cx, buf);
            if poll.is_ready() {
                self.reads.fetch_add(1, Ordering::SeqCst);
            }
            poll
        }
    }

    async fn collect(mut rx: mpsc::Receiver<Message>) -> (Vec<u8>, Option<DrainOutcome>) {
        let mut data = Vec::new();
        while let Some(message) = rx.recv().await {
            match message {
                Message::Chunk(chunk) => data.extend_from_slice(&chunk),
                Message::Finished(outcome) => return (data, Some(outcome)),
            }
        }
        (data, None)
    }

    #[tokio::test]
    async fn forwards_all_data_in_order() {
        let data = Builder::new().read(b"first ").read(b"second").build();
        let diag = Builder::new().read(b"INFO starting\n").build();
        let mut job = FakeJob::new(&[Some(0)]);
        let (tx, rx) = channel();

        let collector = tokio::spawn(collect(rx));
        let outcome = drain(&mut job, Box::new(data), Box::new(diag), tx, "t1").await;
        let (bytes, finished) = collector.await.unwrap();

        assert_eq!(bytes, b"first second");
        assert_eq!(outcome, DrainOutcome::Data { bytes: 12 });
        assert_eq!(finished, Some(outcome));
    }

    #[tokio::test]
    async fn success_without_bytes_is_no_data() {
        let data = Builder::new().build();
        let diag = Builder::new().build();
        let mut job = FakeJob::new(&[Some(0)]);
        let (tx, rx) = channel();

        let collector = tokio::spawn(collect(rx));
        let outcome = drain(&mut job, Box::new(data), Box::new(diag), tx, "t2").await;
        assert_eq!(outcome, DrainOutcome::NoData);
        assert_eq!(collector.await.unwrap(), (Vec::new(), Some(DrainOutcome::NoData)));
    }

    #[tokio::test]
    async fn failure_carries_diagnostics() {
        let data = Builder::new().build();
        let diag = Builder::new()
            .read(b"ERROR Invalid timest")
            .read(b"amp: 2012-13-45\n")
            .build();
        let mut job = FakeJob::new(&[Some(1)]);
        let (tx, rx) = channel();

        let collector = tokio::spawn(collect(rx));
        let outcome = drain(&mut job, Box::new(data), Box::new(diag), tx, "t3").await;
        collector.await.unwrap();

        assert_eq!(
            outcome,
            DrainOutcome::Failure {
                status: 1,
                diagnostics: "ERROR Invalid timestamp: 2012-13-45".to_string(),
                bytes: 0,
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn status_is_polled_until_available() {
        let data = Builder::new().read(b"x").build();
        let diag = Builder::new().build();
        let mut job = FakeJob::new(&[None, None, Some(0)]);
        let (tx, rx) = channel();

        let collector = tokio::spawn(collect(rx));
        let outcome = drain(&mut job, Box::new(data), Box::new(diag), tx, "t4").await;
        collector.await.unwrap();

        assert_eq!(outcome, DrainOutcome::Data { bytes: 1 });
        assert_eq!(job.polls, 3);
    }

    #[tokio::test]
    async fn reads_wait_for_credit() {
        let reads = Arc::new(AtomicUsize::new(0));
        let data = CountingReader {
            inner: Builder::new()
                .read(b"one")
                .read(b"two")
                .read(b"three")
                .read(b"four")
                .build(),
            reads: reads.clone(),
        };
        let diag = Builder::new().build();
        let (tx, mut rx) = channel();

        let task = tokio::spawn(async move {
            let mut job = FakeJob::new(&[Some(0)]);
            drain(&mut job, Box::new(data), Box::new(diag), tx, "t5").await
        });

        // one chunk sits in the channel, the next forward waits for room
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(reads.load(Ordering::SeqCst), 2);

        assert_eq!(rx.recv().await, Some(Message::Chunk(Bytes::from_static(b"one"))));
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(reads.load(Ordering::SeqCst), 3);

        let (rest, finished) = collect(rx).await;
        assert_eq!(rest, b"twothreefour");
        assert_eq!(finished, Some(DrainOutcome::Data { bytes: 15 }));
        assert_eq!(task.await.unwrap(), DrainOutcome::Data { bytes: 15 });
    }

    #[tokio::test]
    async fn client_disconnect_terminates_job() {
        let (data, mut data_writer) = tokio::io::duplex(64);
        let (diag, _diag_writer) = tokio::io::duplex(64);
        let mut job = FakeJob::new(&[None]);
        let terminated = job.terminated.clone();
        let (tx, mut rx) = channel();

        data_writer.write_all(b"partial").await.unwrap();
        let task = tokio::spawn(async move {
            drain(&mut job, Box::new(data), Box::new(diag), tx, "t6").await
        });

        assert!(matches!(rx.recv().await, Some(Message::Chunk(_))));
        drop(rx);

        assert_eq!(task.await.unwrap(), DrainOutcome::Disconnected);
        assert!(terminated.load(Ordering::SeqCst));
    }
}
