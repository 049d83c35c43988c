//! Outbound message queues.

use std::io::Write;
use std::sync::Arc;

use crossbeam_channel::{Receiver, Sender, TrySendError};
use parking_lot::Mutex;

use crate::error::QueueError;
use crate::messages::Message;

/// An ordered, thread-safe sink accepting one message at a time.
///
/// Implementations must not block for long: enqueue runs inside container
/// callbacks on the application's threads.
pub trait WriteQueue: Send + Sync {
    fn enqueue(&self, message: Message) -> Result<(), QueueError>;
}

impl<Q: WriteQueue + ?Sized> WriteQueue for Arc<Q> {
    fn enqueue(&self, message: Message) -> Result<(), QueueError> {
        (**self).enqueue(message)
    }
}

/// Keeps every message in memory.
///
/// # Examples
///
/// ```
/// use ferrous_whitebox::{MemoryQueue, Message, ObjectId, WriteQueue};
///
/// let queue = MemoryQueue::new();
/// queue.enqueue(Message::LifetimeScopeEnding { lifetime_scope_id: ObjectId(1) }).unwrap();
/// assert_eq!(queue.len(), 1);
/// assert_eq!(queue.drain().len(), 1);
/// assert!(queue.is_empty());
/// ```
#[derive(Debug, Default)]
pub struct MemoryQueue {
    messages: Mutex<Vec<Message>>,
}

impl MemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of the messages received so far.
    pub fn snapshot(&self) -> Vec<Message> {
        self.messages.lock().clone()
    }

    /// Takes the messages received so far.
    pub fn drain(&self) -> Vec<Message> {
        std::mem::take(&mut *self.messages.lock())
    }

    pub fn len(&self) -> usize {
        self.messages.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl WriteQueue for MemoryQueue {
    fn enqueue(&self, message: Message) -> Result<(), QueueError> {
        self.messages.lock().push(message);
        Ok(())
    }
}

/// Hands messages to a crossbeam channel without blocking.
///
/// A bounded channel that is full rejects the message with
/// [`QueueError::Full`]; a channel whose receivers are gone rejects it with
/// [`QueueError::Closed`].
///
/// ```
/// use ferrous_whitebox::{ChannelQueue, Message, ObjectId, QueueError, WriteQueue};
///
/// let (queue, receiver) = ChannelQueue::bounded(1);
/// let message = Message::LifetimeScopeEnding { lifetime_scope_id: ObjectId(1) };
/// queue.enqueue(message.clone()).unwrap();
/// assert!(matches!(queue.enqueue(message.clone()), Err(QueueError::Full)));
/// assert_eq!(receiver.recv().unwrap(), message);
/// ```
#[derive(Debug, Clone)]
pub struct ChannelQueue {
    sender: Sender<Message>,
}

impl ChannelQueue {
    pub fn new(sender: Sender<Message>) -> Self {
        Self { sender }
    }

    /// A queue over a bounded channel, plus its receiving end.
    pub fn bounded(capacity: usize) -> (Self, Receiver<Message>) {
        let (sender, receiver) = crossbeam_channel::bounded(capacity);
        (Self::new(sender), receiver)
    }

    /// A queue over an unbounded channel, plus its receiving end.
    pub fn unbounded() -> (Self, Receiver<Message>) {
        let (sender, receiver) = crossbeam_channel::unbounded();
        (Self::new(sender), receiver)
    }
}

impl WriteQueue for ChannelQueue {
    fn enqueue(&self, message: Message) -> Result<(), QueueError> {
        self.sender.try_send(message).map_err(|e| match e {
            TrySendError::Full(_) => QueueError::Full,
            TrySendError::Disconnected(_) => QueueError::Closed,
        })
    }
}

/// Writes each message as one line of JSON.
pub struct JsonLinesQueue<W> {
    writer: Mutex<W>,
}

impl<W: Write + Send> JsonLinesQueue<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    /// Recovers the writer.
    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }
}

impl<W: Write + Send> WriteQueue for JsonLinesQueue<W> {
    fn enqueue(&self, message: Message) -> Result<(), QueueError> {
        let mut line = serde_json::to_vec(&message)?;
        line.push(b'\n');
        let mut writer = self.writer.lock();
        writer.write_all(&line)?;
        writer.flush()?;
        Ok(())
    }
}

impl<W> std::fmt::Debug for JsonLinesQueue<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonLinesQueue").finish_non_exhaustive()
    }
}
