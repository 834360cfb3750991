//! Channel manager — owns every channel and routes responses back.

use futures::stream;

use crate::channels::{Channel, IncomingMessage, MessageStream, OutgoingResponse};
use crate::error::ChannelError;

/// Holds the active channels and merges their inbound streams.
#[derive(Default)]
pub struct ChannelManager {
    channels: Vec<Box<dyn Channel>>,
}

impl ChannelManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a channel.
    pub fn add(&mut self, channel: Box<dyn Channel>) {
        tracing::debug!(channel = channel.name(), "Channel registered");
        self.channels.push(channel);
    }

    /// Names of the registered channels.
    pub fn names(&self) -> Vec<&str> {
        self.channels.iter().map(|c| c.name()).collect()
    }

    /// Start every channel and merge their streams into one.
    pub async fn start_all(&self) -> Result<MessageStream, ChannelError> {
        let mut streams = Vec::with_capacity(self.channels.len());
        for channel in &self.channels {
            let stream = channel.start().await?;
            tracing::info!(channel = channel.name(), "Channel started");
            streams.push(stream);
        }
        Ok(Box::pin(stream::select_all(streams)))
    }

    /// Send a response on the channel `msg` arrived on.
    pub async fn respond(
        &self,
        msg: &IncomingMessage,
        response: OutgoingResponse,
    ) -> Result<(), ChannelError> {
        let channel = self
            .channels
            .iter()
            .find(|c| c.name() == msg.channel)
            .ok_or_else(|| ChannelError::UnknownChannel(msg.channel.clone()))?;
        channel.respond(msg, response).await
    }

    /// Check every channel; the first failure wins.
    pub async fn health_check_all(&self) -> Result<(), ChannelError> {
        for channel in &self.channels {
            channel.health_check().await?;
        }
        Ok(())
    }

    /// Shut down every channel, logging failures.
    pub async fn shutdown_all(&self) {
        for channel in &self.channels {
            if let Err(e) = channel.shutdown().await {
                tracing::warn!(channel = channel.name(), "Channel shutdown failed: {e}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use futures::StreamExt;

    use super::*;

    /// Channel that replays fixed messages and records responses.
    struct StubChannel {
        name: &'static str,
        inbound: Vec<&'static str>,
        sent: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl Channel for StubChannel {
        fn name(&self) -> &str {
            self.name
        }

        async fn start(&self) -> Result<MessageStream, ChannelError> {
            let name = self.name;
            let msgs: Vec<IncomingMessage> = self
                .inbound
                .iter()
                .map(|text| IncomingMessage::new(name, "u", *text))
                .collect();
            Ok(Box::pin(stream::iter(msgs)))
        }

        async fn respond(
            &self,
            _msg: &IncomingMessage,
            response: OutgoingResponse,
        ) -> Result<(), ChannelError> {
            self.sent.lock().unwrap().push(response.content);
            Ok(())
        }

        async fn health_check(&self) -> Result<(), ChannelError> {
            Ok(())
        }

        async fn shutdown(&self) -> Result<(), ChannelError> {
            Ok(())
        }
    }

    fn stub(name: &'static str, inbound: Vec<&'static str>) -> (StubChannel, Arc<Mutex<Vec<String>>>) {
        let sent = Arc::new(Mutex::new(Vec::new()));
        (
            StubChannel {
                name,
                inbound,
                sent: Arc::clone(&sent),
            },
            sent,
        )
    }

    #[tokio::test]
    async fn start_all_merges_streams() {
        let mut manager = ChannelManager::new();
        let (a, _) = stub("a", vec!["one", "two"]);
        let (b, _) = stub("b", vec!["three"]);
        manager.add(Box::new(a));
        manager.add(Box::new(b));
        assert_eq!(manager.names(), vec!["a", "b"]);

        let stream = manager.start_all().await.unwrap();
        let mut contents: Vec<String> = stream.map(|m| m.content).collect().await;
        contents.sort();
        assert_eq!(contents, vec!["one", "three", "two"]);
    }

    #[tokio::test]
    async fn respond_routes_by_channel_name() {
        let mut manager = ChannelManager::new();
        let (a, sent_a) = stub("a", vec![]);
        let (b, sent_b) = stub("b", vec![]);
        manager.add(Box::new(a));
        manager.add(Box::new(b));

        let msg = IncomingMessage::new("b", "u", "hi");
        manager
            .respond(&msg, OutgoingResponse::text("reply"))
            .await
            .unwrap();

        assert!(sent_a.lock().unwrap().is_empty());
        assert_eq!(*sent_b.lock().unwrap(), vec!["reply"]);
    }

    #[tokio::test]
    async fn respond_to_unknown_channel_fails() {
        let manager = ChannelManager::new();
        let msg = IncomingMessage::new("sms", "u", "hi");
        let err = manager
            .respond(&msg, OutgoingResponse::text("reply"))
            .await
            .unwrap_err();
        assert!(matches!(err, ChannelError::UnknownChannel(ref c) if c == "sms"));
        assert!(manager.health_check_all().await.is_ok());
    }
}
