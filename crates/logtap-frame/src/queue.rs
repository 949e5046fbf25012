use std::collections::VecDeque;

use crate::codec::Message;

/// FIFO of decoded messages.
///
/// Decouples drain granularity from pull granularity: one receive event
/// may extract many frames, consumers take one message per pull. Not a
/// thread-safety boundary; the whole pipeline is single-owner.
#[derive(Debug, Default)]
pub struct MessageQueue {
    inner: VecDeque<Message>,
}

impl MessageQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueue a message, taking ownership.
    pub fn push(&mut self, message: Message) {
        self.inner.push_back(message);
    }

    /// Dequeue the oldest message, transferring ownership to the caller.
    pub fn pop(&mut self) -> Option<Message> {
        self.inner.pop_front()
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{Decode, FrameBuilder, FrameCodec, WireCodec};

    fn message(counter: u8) -> Message {
        let mut wire = bytes::BytesMut::new();
        FrameBuilder::new()
            .counter(counter)
            .payload(b"m".as_slice())
            .encode(&mut wire)
            .unwrap();
        match WireCodec::new().decode_one(&wire).unwrap() {
            Decode::Frame { message, .. } => message,
            Decode::Incomplete => panic!("frame should be complete"),
        }
    }

    #[test]
    fn preserves_arrival_order() {
        let mut queue = MessageQueue::new();
        for counter in [3u8, 1, 2] {
            queue.push(message(counter));
        }
        assert_eq!(queue.len(), 3);

        let order: Vec<u8> = std::iter::from_fn(|| queue.pop())
            .map(|m| m.counter())
            .collect();
        assert_eq!(order, vec![3, 1, 2]);
        assert!(queue.is_empty());
    }
}
