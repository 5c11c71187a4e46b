//! Registry tuning knobs.

/// Configuration shared by every room the registry spawns.
#[derive(Debug, Clone)]
pub struct RoomConfig {
    /// Capacity of each room actor's command channel. When it fills up,
    /// callers wait (backpressure) instead of growing memory.
    pub command_buffer: usize,

    /// How many times `join` retries when it races a room that is being
    /// evicted. Each retry targets a freshly created room, so this only
    /// needs to cover pathological churn.
    pub join_attempts: usize,
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            command_buffer: 64,
            join_attempts: 8,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_room_config_default() {
        let config = RoomConfig::default();
        assert_eq!(config.command_buffer, 64);
        assert!(config.join_attempts > 1);
    }
}
