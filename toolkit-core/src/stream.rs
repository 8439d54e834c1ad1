//! A typed, single-producer/single-consumer stream of tool-call chunks with
//! independent close signals for each side.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Metadata carried alongside every chunk's content.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub created_at: DateTime<Utc>,
}

impl Default for ChunkMetadata {
    fn default() -> Self {
        Self { created_at: Utc::now() }
    }
}

/// One unit of a streamed tool result. All chunks on one stream are expected
/// to carry the same concrete `T`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamChunk<T> {
    pub content: T,
    pub metadata: ChunkMetadata,
}

impl<T> StreamChunk<T> {
    pub fn new(content: T) -> Self {
        Self {
            content,
            metadata: ChunkMetadata::default(),
        }
    }
}

/// Default channel capacity applied when a caller doesn't pick one. Bounds
/// buffering so a slow consumer back-pressures the producer.
pub const DEFAULT_STREAM_CAPACITY: usize = 32;

/// Create a new stream of bounded capacity, returning its writer and reader
/// halves. Exactly one producer and one consumer are expected to use them.
pub fn stream<T: Send + 'static>(capacity: usize) -> (StreamWriter<T>, StreamReader<T>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    let recv_closed = Arc::new(AtomicBool::new(false));
    (
        StreamWriter {
            tx: Some(tx),
            recv_closed: recv_closed.clone(),
        },
        StreamReader { rx, recv_closed },
    )
}

/// The send half of a [`stream`]. Dropping it (or calling [`StreamWriter::close_send`])
/// signals end-of-stream to the reader.
pub struct StreamWriter<T> {
    tx: Option<mpsc::Sender<StreamChunk<T>>>,
    recv_closed: Arc<AtomicBool>,
}

impl<T> StreamWriter<T> {
    /// Enqueue a chunk. Returns `true` if the receive side has already
    /// closed, in which case the chunk is discarded rather than sent.
    ///
    /// Calling this after [`StreamWriter::close_send`] is a programmer error
    /// (the sender has been consumed by that call).
    pub async fn send(&self, chunk: StreamChunk<T>) -> bool {
        if self.recv_closed.load(Ordering::Acquire) {
            return true;
        }
        match &self.tx {
            Some(tx) => tx.send(chunk).await.is_err(),
            None => true,
        }
    }

    /// Signal end-of-stream to the receiver. Consumes the writer so this can
    /// only happen once per the type system.
    pub fn close_send(self) {
        drop(self);
    }

    /// Whether the receive side has signalled it is no longer interested.
    pub fn is_recv_closed(&self) -> bool {
        self.recv_closed.load(Ordering::Acquire)
    }
}

/// The receive half of a [`stream`].
pub struct StreamReader<T> {
    rx: mpsc::Receiver<StreamChunk<T>>,
    recv_closed: Arc<AtomicBool>,
}

impl<T> StreamReader<T> {
    /// Block until the next chunk arrives, or return `None` once the writer
    /// has closed the send side and all buffered chunks are drained (EOF).
    pub async fn recv(&mut self) -> Option<StreamChunk<T>> {
        self.rx.recv().await
    }

    /// Unblock senders observing the closed signal. Callers should invoke
    /// this at most once; repeated calls are harmless but not meaningful.
    pub fn close_recv(&self) {
        self.recv_closed.store(true, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn send_then_recv_in_order() {
        let (writer, mut reader) = stream::<i32>(4);
        for i in 0..3 {
            assert!(!writer.send(StreamChunk::new(i)).await);
        }
        writer.close_send();
        assert_eq!(reader.recv().await.unwrap().content, 0);
        assert_eq!(reader.recv().await.unwrap().content, 1);
        assert_eq!(reader.recv().await.unwrap().content, 2);
        assert!(reader.recv().await.is_none());
    }

    #[tokio::test]
    async fn recv_closed_short_circuits_send() {
        let (writer, reader) = stream::<i32>(4);
        reader.close_recv();
        assert!(writer.send(StreamChunk::new(1)).await);
    }

    #[tokio::test]
    async fn dropped_reader_closes_send_without_blocking() {
        let (writer, reader) = stream::<i32>(1);
        drop(reader);
        assert!(writer.send(StreamChunk::new(1)).await);
    }

    #[tokio::test]
    async fn eof_observed_once_per_outstanding_receive() {
        let (writer, mut reader) = stream::<i32>(1);
        writer.close_send();
        assert!(reader.recv().await.is_none());
        assert!(reader.recv().await.is_none());
    }
}
