use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Retry policy for [`ReliableTransport`](crate::ReliableTransport).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportConfig {
    /// How long to wait for an ACK before retransmitting.
    pub ack_timeout: Duration,

    /// Total number of transmissions per message, the first one included.
    /// Zero is treated as one.
    pub max_retries: u32,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            ack_timeout: Duration::from_millis(500),
            max_retries: 3,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_config_default() {
        let config = TransportConfig::default();
        assert_eq!(config.ack_timeout, Duration::from_millis(500));
        assert_eq!(config.max_retries, 3);
    }
}
