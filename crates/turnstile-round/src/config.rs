//! Round configuration and the phase state machine.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// RoundConfig
// ---------------------------------------------------------------------------

/// Timing for every round the scheduler runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundConfig {
    /// Warning window between selection and live controls.
    pub prepare_duration: Duration,

    /// Hard cap on how long one requester holds the game.
    pub round_duration: Duration,

    /// How often the active requester gets a `timeUpdate`.
    pub tick_interval: Duration,

    /// How long to wait for the resource to answer `requestFinalScore`
    /// before settling with the last score it pushed.
    pub report_timeout: Duration,
}

impl Default for RoundConfig {
    fn default() -> Self {
        Self {
            prepare_duration: Duration::from_secs(5),
            round_duration: Duration::from_secs(60),
            tick_interval: Duration::from_secs(1),
            report_timeout: Duration::from_secs(5),
        }
    }
}

impl RoundConfig {
    /// Shortest report timeout accepted.
    pub const MIN_REPORT_TIMEOUT: Duration = Duration::from_millis(100);

    /// Longest any single phase or tick may be configured to last.
    pub const MAX_PHASE_DURATION: Duration = Duration::from_secs(24 * 60 * 60);

    /// Replaces values that would stall the rotation.
    ///
    /// A zero tick interval falls back to one second, and the report
    /// timeout is raised to [`Self::MIN_REPORT_TIMEOUT`]. Every duration is
    /// capped at [`Self::MAX_PHASE_DURATION`]. Zero preparation and round
    /// durations are allowed: the phase simply ends on the next turn of the
    /// actor loop.
    pub fn validated(mut self) -> Self {
        if self.tick_interval.is_zero() {
            tracing::warn!("tick interval is zero, using 1s");
            self.tick_interval = Duration::from_secs(1);
        }
        if self.report_timeout < Self::MIN_REPORT_TIMEOUT {
            tracing::warn!(
                report_timeout_ms = self.report_timeout.as_millis() as u64,
                "report timeout below minimum, clamping"
            );
            self.report_timeout = Self::MIN_REPORT_TIMEOUT;
        }
        for (name, value) in [
            ("prepare_duration", &mut self.prepare_duration),
            ("round_duration", &mut self.round_duration),
            ("tick_interval", &mut self.tick_interval),
            ("report_timeout", &mut self.report_timeout),
        ] {
            if *value > Self::MAX_PHASE_DURATION {
                tracing::warn!(setting = name, secs = value.as_secs(), "duration too long, capping");
                *value = Self::MAX_PHASE_DURATION;
            }
        }
        self
    }
}

// ---------------------------------------------------------------------------
// Phase
// ---------------------------------------------------------------------------

/// Where the single round currently stands.
///
/// ```text
/// Idle ──join──→ Preparing ──prepare elapsed──→ Active
///  ↑                 │                            │
///  │                 │ holder left    end turn / round elapsed
///  │                 ↓                            ↓
///  └──queue empty── (settle) ←──report / timeout── Settling
///                    │
///                    └──queue non-empty──→ Preparing (next requester)
/// ```
///
/// - **Idle**: nobody holds the game and nobody is waiting.
/// - **Preparing**: a requester was selected and is about to start.
/// - **Active**: controls are live and the round clock is running.
/// - **Settling**: the round ended and the resource was asked for the
///   final score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Phase {
    Idle,
    Preparing,
    Active,
    Settling,
}

impl Phase {
    /// Returns `true` if no round is in progress.
    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }

    /// Returns `true` while the holder's controls are live.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "Idle"),
            Self::Preparing => write!(f, "Preparing"),
            Self::Active => write!(f, "Active"),
            Self::Settling => write!(f, "Settling"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_values() {
        let cfg = RoundConfig::default();
        assert_eq!(cfg.prepare_duration, Duration::from_secs(5));
        assert_eq!(cfg.round_duration, Duration::from_secs(60));
        assert_eq!(cfg.tick_interval, Duration::from_secs(1));
        assert_eq!(cfg.report_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_validated_replaces_zero_tick_interval() {
        let cfg = RoundConfig {
            tick_interval: Duration::ZERO,
            ..Default::default()
        }
        .validated();
        assert_eq!(cfg.tick_interval, Duration::from_secs(1));
    }

    #[test]
    fn test_validated_clamps_report_timeout() {
        let cfg = RoundConfig {
            report_timeout: Duration::ZERO,
            ..Default::default()
        }
        .validated();
        assert_eq!(cfg.report_timeout, RoundConfig::MIN_REPORT_TIMEOUT);
    }

    #[test]
    fn test_validated_caps_huge_durations() {
        let huge = Duration::from_secs(u64::MAX);
        let cfg = RoundConfig {
            prepare_duration: huge,
            round_duration: huge,
            tick_interval: huge,
            report_timeout: huge,
        }
        .validated();
        assert_eq!(cfg.prepare_duration, RoundConfig::MAX_PHASE_DURATION);
        assert_eq!(cfg.round_duration, RoundConfig::MAX_PHASE_DURATION);
        assert_eq!(cfg.tick_interval, RoundConfig::MAX_PHASE_DURATION);
        assert_eq!(cfg.report_timeout, RoundConfig::MAX_PHASE_DURATION);
    }

    #[test]
    fn test_validated_keeps_zero_prepare_duration() {
        let cfg = RoundConfig {
            prepare_duration: Duration::ZERO,
            ..Default::default()
        }
        .validated();
        assert_eq!(cfg.prepare_duration, Duration::ZERO);
    }

    #[test]
    fn test_phase_predicates() {
        assert!(Phase::Idle.is_idle());
        assert!(!Phase::Settling.is_idle());
        assert!(Phase::Active.is_active());
        assert!(!Phase::Preparing.is_active());
        assert_eq!(Phase::Settling.to_string(), "Settling");
    }
}
