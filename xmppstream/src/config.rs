//! Tuning knobs for connections and protocol layers.

use std::time::Duration;

use serde_derive::{Deserialize, Serialize};

use crate::element::StreamType;

/// `ConnectionConfig` specifies the parameters of a [`Connection`] worker.
///
/// Examples:
///
/// ```rust
/// let c = xmppstream::ConnectionConfig::default();
/// assert_eq!(c.read_chunk_size, 4096);
/// assert_eq!(c.write_retry_interval_ms, 20);
/// assert_eq!(c.connect_timeout_ms, 0);
/// assert!(c.nodelay);
/// ```
///
/// [`Connection`]: struct.Connection.html
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    /// Size of a single socket read while draining readable data
    pub read_chunk_size: usize,
    /// Pause in milliseconds before retrying a write the socket did not fully accept
    pub write_retry_interval_ms: u64,
    /// Time in milliseconds to wait for the TCP connect, `0` waits for the OS
    pub connect_timeout_ms: u64,
    /// Set `TCP_NODELAY` on the socket
    pub nodelay: bool,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        ConnectionConfig {
            read_chunk_size: 4096,
            write_retry_interval_ms: 20,
            connect_timeout_ms: 0,
            nodelay: true,
        }
    }
}

impl ConnectionConfig {
    pub fn read_chunk_size(&self) -> usize {
        self.read_chunk_size.max(1)
    }

    pub fn write_retry_interval(&self) -> Duration {
        Duration::from_millis(self.write_retry_interval_ms.max(1))
    }

    pub fn connect_timeout(&self) -> Option<Duration> {
        match self.connect_timeout_ms {
            0 => None,
            ms => Some(Duration::from_millis(ms)),
        }
    }
}

/// Serialization options of an [`XmppLayer`].
///
/// [`XmppLayer`]: struct.XmppLayer.html
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct XmppLayerConfig {
    pub stream_type: StreamType,
    /// Write `xmlns` on top-level elements even when it equals the stream namespace
    pub explicit_top_level_namespace: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json() {
        let c: ConnectionConfig = serde_json::from_str(r#"{"read_chunk_size": 512}"#).unwrap();
        assert_eq!(c.read_chunk_size, 512);
        assert_eq!(c.write_retry_interval(), Duration::from_millis(20));
        assert_eq!(c.connect_timeout(), None);
    }

    #[test]
    fn test_zero_values_are_clamped() {
        let c = ConnectionConfig {
            read_chunk_size: 0,
            write_retry_interval_ms: 0,
            connect_timeout_ms: 250,
            nodelay: false,
        };
        assert_eq!(c.read_chunk_size(), 1);
        assert_eq!(c.write_retry_interval(), Duration::from_millis(1));
        assert_eq!(c.connect_timeout(), Some(Duration::from_millis(250)));
    }

    #[test]
    fn test_layer_config_json() {
        let c: XmppLayerConfig =
            serde_json::from_str(r#"{"stream_type": "Component"}"#).unwrap();
        assert_eq!(c.stream_type, StreamType::Component);
        assert!(!c.explicit_top_level_namespace);

        let json = serde_json::to_string(&XmppLayerConfig::default()).unwrap();
        assert_eq!(
            json,
            r#"{"stream_type":"Client","explicit_top_level_namespace":false}"#
        );
    }
}
