//! Best-effort UI notifications on the "updates" topic

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::debug;

use crate::services::rehash::RehashStats;

/// Topic every event is published under
pub const UPDATES_TOPIC: &str = "updates";

const CHANNEL_CAPACITY: usize = 256;

/// What changed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum UpdateEvent {
    /// A playlist was picked up from the hot folder
    M3uFile { filename: String, success: bool },
    /// A program guide was picked up from the hot folder
    EpgFile { filename: String, success: bool },
    /// A rehash run finished
    RehashComplete { stats: RehashStats },
}

/// Envelope delivered to subscribers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateMessage {
    pub topic: String,
    pub data: UpdateEvent,
}

impl UpdateMessage {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// Fan-out of [`UpdateEvent`]s to any number of subscribers
#[derive(Clone)]
pub struct UpdateBroadcaster {
    sender: broadcast::Sender<UpdateMessage>,
}

impl UpdateBroadcaster {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<UpdateMessage> {
        self.sender.subscribe()
    }

    /// Publish without waiting or failing; returns the number of receivers reached
    pub fn publish(&self, event: UpdateEvent) -> usize {
        let message = UpdateMessage {
            topic: UPDATES_TOPIC.to_string(),
            data: event,
        };
        match self.sender.send(message) {
            Ok(receivers) => receivers,
            Err(_) => {
                debug!("No subscribers on '{}', notification dropped", UPDATES_TOPIC);
                0
            }
        }
    }
}

impl Default for UpdateBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_publish_without_subscribers_is_silent() {
        let broadcaster = UpdateBroadcaster::new();
        let reached = broadcaster.publish(UpdateEvent::M3uFile {
            filename: "a.m3u".to_string(),
            success: true,
        });
        assert_eq!(reached, 0);
    }

    #[tokio::test]
    async fn test_subscribers_receive_events() {
        let broadcaster = UpdateBroadcaster::new();
        let mut rx = broadcaster.subscribe();

        broadcaster.publish(UpdateEvent::EpgFile {
            filename: "uk.xml".to_string(),
            success: true,
        });

        let message = rx.recv().await.unwrap();
        assert_eq!(message.topic, UPDATES_TOPIC);
        assert_eq!(
            message.data,
            UpdateEvent::EpgFile {
                filename: "uk.xml".to_string(),
                success: true
            }
        );
    }

    #[test]
    fn test_wire_format() {
        let message = UpdateMessage {
            topic: UPDATES_TOPIC.to_string(),
            data: UpdateEvent::M3uFile {
                filename: "sports.m3u".to_string(),
                success: true,
            },
        };
        let value: serde_json::Value = serde_json::from_str(&message.to_json().unwrap()).unwrap();
        assert_eq!(value["topic"], "updates");
        assert_eq!(value["data"]["type"], "m3u_file");
        assert_eq!(value["data"]["filename"], "sports.m3u");
        assert_eq!(value["data"]["success"], true);
    }
}
