use async_trait::async_trait;
use serde_json::Value;
#[cfg(test)]
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender, error::TryRecvError};

use crate::error::Error;

/// Minimal transport contract: poll for the next inbound payload, publish an outbound one.
#[async_trait]
pub trait MessageChannel: Send {
    /// Returns `Ok(None)` when nothing is waiting; callers back off and poll again.
    async fn receive(&mut self) -> Result<Option<Value>, Error>;
    async fn produce(&mut self, payload: &Value) -> Result<(), Error>;
}

/// In-process channel backed by unbounded tokio queues, for exercising the worker loop.
#[cfg(test)]
pub struct MemoryChannel {
    inbound: UnboundedReceiver<Value>,
    outbound: UnboundedSender<Value>,
}

/// The far side of a [`MemoryChannel`]: send requests in, read acknowledgements out.
#[cfg(test)]
pub struct MemoryChannelHandle {
    pub requests: UnboundedSender<Value>,
    pub acks: UnboundedReceiver<Value>,
}

#[cfg(test)]
impl MemoryChannel {
    pub fn new() -> (Self, MemoryChannelHandle) {
        let (requests, inbound) = mpsc::unbounded_channel();
        let (outbound, acks) = mpsc::unbounded_channel();
        (
            Self { inbound, outbound },
            MemoryChannelHandle { requests, acks },
        )
    }
}

#[cfg(test)]
#[async_trait]
impl MessageChannel for MemoryChannel {
    async fn receive(&mut self) -> Result<Option<Value>, Error> {
        match self.inbound.try_recv() {
            Ok(payload) => Ok(Some(payload)),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => Ok(None),
        }
    }

    async fn produce(&mut self, payload: &Value) -> Result<(), Error> {
        self.outbound
            .send(payload.clone())
            .map_err(|_| Error::ChannelError("acknowledgement receiver dropped".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_memory_channel_round_trip() {
        let (mut channel, mut handle) = MemoryChannel::new();
        assert_eq!(channel.receive().await.unwrap(), None);

        handle.requests.send(json!({"id": "1"})).unwrap();
        assert_eq!(channel.receive().await.unwrap(), Some(json!({"id": "1"})));

        channel.produce(&json!({"status": "ok"})).await.unwrap();
        assert_eq!(handle.acks.recv().await, Some(json!({"status": "ok"})));
    }

    #[tokio::test]
    async fn test_memory_channel_produce_after_drop() {
        let (mut channel, handle) = MemoryChannel::new();
        drop(handle);
        assert!(channel.receive().await.unwrap().is_none());
        assert!(channel.produce(&json!({})).await.is_err());
    }
}
