use std::env;

/// Upload and retention configuration for the chunked ingest service
#[derive(Debug, Clone)]
pub struct UploadConfig {
    /// Maximum payload size of a single chunk in bytes (default: 4 MiB)
    pub max_chunk_bytes: usize,

    /// Sweep period for the background retention task in seconds (default: 30 min)
    pub sweep_interval_secs: u64,

    /// Idle time before an in-progress upload counts as stale, in seconds (default: 1 h)
    pub stale_after_secs: i64,

    /// Idle time after which even well-progressed uploads are reclaimed, in seconds (default: 2 h)
    pub escalation_after_secs: i64,

    /// Completion percentage above which a stale upload is kept anyway (default: 90)
    pub grace_completion_percent: u8,

    /// Completion percentage above which a stale upload gets the escalation window (default: 50)
    pub escalation_completion_percent: u8,

    /// Absolute lifetime of any in-progress upload in seconds (default: 24 h)
    pub hard_ttl_secs: i64,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_chunk_bytes: 4 * 1024 * 1024, // 4 MiB
            sweep_interval_secs: 30 * 60,
            stale_after_secs: 60 * 60,
            escalation_after_secs: 2 * 60 * 60,
            grace_completion_percent: 90,
            escalation_completion_percent: 50,
            hard_ttl_secs: 24 * 60 * 60,
        }
    }
}

impl UploadConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let default = Self::default();

        Self {
            max_chunk_bytes: env::var("UPLOAD_MAX_CHUNK_BYTES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.max_chunk_bytes),

            sweep_interval_secs: env::var("UPLOAD_SWEEP_INTERVAL_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.sweep_interval_secs),

            stale_after_secs: env::var("UPLOAD_STALE_AFTER_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.stale_after_secs),

            escalation_after_secs: env::var("UPLOAD_ESCALATION_AFTER_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.escalation_after_secs),

            grace_completion_percent: env::var("UPLOAD_GRACE_COMPLETION_PERCENT")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|p| *p <= 100)
                .unwrap_or(default.grace_completion_percent),

            escalation_completion_percent: env::var("UPLOAD_ESCALATION_COMPLETION_PERCENT")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|p| *p <= 100)
                .unwrap_or(default.escalation_completion_percent),

            hard_ttl_secs: env::var("UPLOAD_HARD_TTL_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.hard_ttl_secs),
        }
    }

    /// Create config for development (short sweep period so abandoned
    /// uploads disappear quickly while testing by hand)
    pub fn development() -> Self {
        Self {
            max_chunk_bytes: 4 * 1024 * 1024,
            sweep_interval_secs: 5 * 60,
            stale_after_secs: 60 * 60,
            escalation_after_secs: 2 * 60 * 60,
            grace_completion_percent: 90,
            escalation_completion_percent: 50,
            hard_ttl_secs: 24 * 60 * 60,
        }
    }

    /// Create config for production (environment-driven)
    pub fn production() -> Self {
        Self::from_env()
    }
}
