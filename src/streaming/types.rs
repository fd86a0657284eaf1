use bytes::Bytes;

/// How draining an extraction job ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DrainOutcome {
    /// The job succeeded and produced output.
    Data { bytes: u64 },
    /// The job succeeded without producing any output.
    NoData,
    /// The job exited with a non-zero status.
    Failure {
        status: i32,
        diagnostics: String,
        bytes: u64,
    },
    /// The downstream receiver went away and the job was terminated.
    Disconnected,
}

/// What the consumer hands downstream: data chunks in order, then exactly
/// one `Finished`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    Chunk(Bytes),
    Finished(DrainOutcome),
}
