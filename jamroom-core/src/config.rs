use std::time::Duration;

/// The configuration of a room session
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// How many seconds the local player may diverge from the shared record
    /// before a corrective seek is issued
    pub follower_drift_tolerance: f32,
    /// How many seconds the host's player may drift from the last written
    /// record before a new write is issued
    pub host_resync_threshold: f32,
    /// How often the host samples its player into the shared record
    pub host_sync_interval: Duration,
    /// STUN servers used when opening peer connections
    pub ice_servers: Vec<String>,
}

impl SessionConfig {
    /// Returns true if the tolerances are ordered such that followers
    /// don't oscillate around host writes.
    pub fn has_sane_tolerances(&self) -> bool {
        self.host_resync_threshold < self.follower_drift_tolerance
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            // Small enough to feel in sync, large enough to avoid micro-seeking
            follower_drift_tolerance: 2.,
            // Must stay tighter than the follower tolerance
            host_resync_threshold: 1.,
            host_sync_interval: Duration::from_secs(2),
            // Public STUN only. Peers behind symmetric NAT won't connect
            // without a TURN relay, which is not provided here.
            ice_servers: vec![
                "stun:stun.l.google.com:19302".to_string(),
                "stun:stun1.l.google.com:19302".to_string(),
            ],
        }
    }
}
