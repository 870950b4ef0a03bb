//! Peer reliability scoring.
//!
//! Placeholder: every peer gets the same neutral score. The response shape is
//! the contract a real implementation must keep.

use serde::{Deserialize, Serialize};

pub const NEUTRAL_RELIABILITY: f64 = 0.5;
pub const PEER_STUB_MESSAGE: &str = "Peer scoring not yet implemented";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeerScore {
    /// 0.0 = unreliable, 1.0 = fully reliable
    pub reliability_score: f64,
    pub message: String,
}

/// Score a peer. The request body is accepted but not inspected.
pub fn score_peer(_body: &[u8]) -> PeerScore {
    PeerScore {
        reliability_score: NEUTRAL_RELIABILITY,
        message: PEER_STUB_MESSAGE.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constant_regardless_of_body() {
        let empty = score_peer(b"");
        let junk = score_peer(b"{not json");
        let peer = score_peer(br#"{"peer_id": "abc", "latency_ms": 12}"#);

        assert_eq!(empty.reliability_score, 0.5);
        assert_eq!(empty, junk);
        assert_eq!(empty, peer);
    }
}
