//! Sink traits implemented by transport adapters.

use async_trait::async_trait;
use stoker_common::SupervisorResult;
use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::stats::ProcessStats;

/// Delivery target for console lines.
///
/// This is the only thing a hub knows about its clients. Any transport
/// that can push one line of text (a WebSocket frame, a Telnet write,
/// an in-memory collector) adapts to it. An `Err` from `deliver`
/// causes the hub to drop the sink.
#[async_trait]
pub trait ConsoleSink: Send {
    async fn deliver(&mut self, line: &str) -> SupervisorResult<()>;
}

/// Delivery target for point-in-time resource samples.
#[async_trait]
pub trait StatsSink: Send {
    async fn deliver(&mut self, sample: &ProcessStats) -> SupervisorResult<()>;
}

/// Console sink that writes newline-terminated lines to any async
/// writer; the adapter used by line-oriented transports.
pub struct WriterSink<W> {
    writer: W,
}

impl<W> WriterSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

#[async_trait]
impl<W> ConsoleSink for WriterSink<W>
where
    W: AsyncWrite + Unpin + Send,
{
    async fn deliver(&mut self, line: &str) -> SupervisorResult<()> {
        self.writer.write_all(line.as_bytes()).await?;
        self.writer.write_all(b"\n").await?;
        self.writer.flush().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn writer_sink_emits_newline_terminated_lines() {
        let mut sink = WriterSink::new(Vec::new());
        sink.deliver("one").await.unwrap();
        sink.deliver("two").await.unwrap();
        assert_eq!(sink.into_inner(), b"one\ntwo\n");
    }
}
