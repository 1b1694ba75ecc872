//! Command payloads
//!
//! Fixed little-endian layouts for the four delegable commands. Parsing
//! is strict: a payload of the wrong length is `InvalidPayload`, never
//! truncated or padded.

use cardash_protocol::app::ErrorCode;

fn exact<const L: usize>(payload: &[u8]) -> Result<[u8; L], ErrorCode> {
    payload.try_into().map_err(|_| ErrorCode::InvalidPayload)
}

/// TIME_SYNC: `[host_time_ms u64]`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TimeSync {
    pub host_time_ms: u64,
}

impl TimeSync {
    pub const LEN: usize = 8;

    pub fn parse(payload: &[u8]) -> Result<Self, ErrorCode> {
        let raw: [u8; Self::LEN] = exact(payload)?;
        Ok(Self {
            host_time_ms: u64::from_le_bytes(raw),
        })
    }

    pub fn to_bytes(&self) -> [u8; Self::LEN] {
        self.host_time_ms.to_le_bytes()
    }
}

/// RUN_EXPERIMENT: `[experiment_id u16][duration_ms u32]`
///
/// A zero duration stops the running experiment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RunExperiment {
    pub experiment_id: u16,
    pub duration_ms: u32,
}

impl RunExperiment {
    pub const LEN: usize = 6;

    pub fn parse(payload: &[u8]) -> Result<Self, ErrorCode> {
        let raw: [u8; Self::LEN] = exact(payload)?;
        Ok(Self {
            experiment_id: u16::from_le_bytes([raw[0], raw[1]]),
            duration_ms: u32::from_le_bytes([raw[2], raw[3], raw[4], raw[5]]),
        })
    }

    pub fn to_bytes(&self) -> [u8; Self::LEN] {
        let id = self.experiment_id.to_le_bytes();
        let d = self.duration_ms.to_le_bytes();
        [id[0], id[1], d[0], d[1], d[2], d[3]]
    }

    pub fn is_stop(&self) -> bool {
        self.duration_ms == 0
    }
}

/// EXPORT_LOG: `[from_index u32][max_entries u16]`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ExportLog {
    pub from_index: u32,
    pub max_entries: u16,
}

impl ExportLog {
    pub const LEN: usize = 6;

    pub fn parse(payload: &[u8]) -> Result<Self, ErrorCode> {
        let raw: [u8; Self::LEN] = exact(payload)?;
        let request = Self {
            from_index: u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]),
            max_entries: u16::from_le_bytes([raw[4], raw[5]]),
        };
        if request.max_entries == 0 {
            return Err(ErrorCode::InvalidPayload);
        }
        Ok(request)
    }

    pub fn to_bytes(&self) -> [u8; Self::LEN] {
        let i = self.from_index.to_le_bytes();
        let m = self.max_entries.to_le_bytes();
        [i[0], i[1], i[2], i[3], m[0], m[1]]
    }
}

/// APPLY_PROFILE: `[profile_id u8]`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ApplyProfile {
    pub profile_id: u8,
}

impl ApplyProfile {
    pub const LEN: usize = 1;

    pub fn parse(payload: &[u8]) -> Result<Self, ErrorCode> {
        let [profile_id]: [u8; Self::LEN] = exact(payload)?;
        Ok(Self { profile_id })
    }
}

/// Maps device uptime onto host wall-clock time after a TIME_SYNC
///
/// Keeps the sync pair rather than a signed offset, so any host time the
/// peer sends (up to `u64::MAX`) is representable. Results saturate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct HostClock {
    /// `(host_time_ms, uptime_ms)` at the last sync
    synced_at: Option<(u64, u64)>,
}

impl HostClock {
    pub const fn new() -> Self {
        Self { synced_at: None }
    }

    /// Record that the host clock read `sync.host_time_ms` at `uptime_ms`
    pub fn sync(&mut self, sync: TimeSync, uptime_ms: u64) {
        self.synced_at = Some((sync.host_time_ms, uptime_ms));
    }

    pub fn is_synced(&self) -> bool {
        self.synced_at.is_some()
    }

    /// Host time for a given uptime; falls back to uptime before the first sync
    ///
    /// Uptimes earlier than the sync point map to the synced host time.
    pub fn now(&self, uptime_ms: u64) -> u64 {
        match self.synced_at {
            Some((host_ms, at_ms)) => host_ms.saturating_add(uptime_ms.saturating_sub(at_ms)),
            None => uptime_ms,
        }
    }
}

/// Experiment run state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Experiment {
    #[default]
    Idle,
    Running { id: u16, until_ms: u64 },
}

impl Experiment {
    /// Apply a RUN_EXPERIMENT request received at `now_ms`
    pub fn apply(&mut self, request: RunExperiment, now_ms: u64) {
        *self = if request.is_stop() {
            Experiment::Idle
        } else {
            Experiment::Running {
                id: request.experiment_id,
                until_ms: now_ms.saturating_add(u64::from(request.duration_ms)),
            }
        };
    }

    pub fn is_running(&self) -> bool {
        matches!(self, Experiment::Running { .. })
    }

    /// Advance time; returns the id of an experiment that just finished
    pub fn tick(&mut self, now_ms: u64) -> Option<u16> {
        match *self {
            Experiment::Running { id, until_ms } if now_ms >= until_ms => {
                *self = Experiment::Idle;
                Some(id)
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_time_sync() {
        let sync = TimeSync::parse(&1_700_000_000_123u64.to_le_bytes()).unwrap();
        assert_eq!(sync.host_time_ms, 1_700_000_000_123);
        assert_eq!(TimeSync::parse(&sync.to_bytes()), Ok(sync));
        assert_eq!(TimeSync::parse(&[0; 7]), Err(ErrorCode::InvalidPayload));
        assert_eq!(TimeSync::parse(&[0; 9]), Err(ErrorCode::InvalidPayload));
    }

    #[test]
    fn test_run_experiment() {
        let run = RunExperiment::parse(&[0x02, 0x01, 0x10, 0x27, 0, 0]).unwrap();
        assert_eq!(run.experiment_id, 0x0102);
        assert_eq!(run.duration_ms, 10_000);
        assert!(!run.is_stop());
        assert_eq!(run.to_bytes(), [0x02, 0x01, 0x10, 0x27, 0, 0]);
        assert!(RunExperiment::parse(&[1, 0, 0, 0, 0, 0]).unwrap().is_stop());
        assert!(RunExperiment::parse(&[]).is_err());
    }

    #[test]
    fn test_export_log() {
        let req = ExportLog {
            from_index: 70_000,
            max_entries: 2000,
        };
        assert_eq!(ExportLog::parse(&req.to_bytes()), Ok(req));
        assert_eq!(
            ExportLog::parse(&[0, 0, 0, 0, 0, 0]),
            Err(ErrorCode::InvalidPayload)
        );
    }

    #[test]
    fn test_apply_profile() {
        assert_eq!(ApplyProfile::parse(&[3]), Ok(ApplyProfile { profile_id: 3 }));
        assert_eq!(ApplyProfile::parse(&[]), Err(ErrorCode::InvalidPayload));
        assert_eq!(ApplyProfile::parse(&[1, 2]), Err(ErrorCode::InvalidPayload));
    }

    #[test]
    fn test_host_clock() {
        let mut clock = HostClock::new();
        assert!(!clock.is_synced());
        assert_eq!(clock.now(500), 500);

        clock.sync(TimeSync { host_time_ms: 10_000 }, 1_000);
        assert!(clock.is_synced());
        assert_eq!(clock.now(1_000), 10_000);
        assert_eq!(clock.now(1_250), 10_250);
        assert_eq!(clock.now(900), 10_000);
    }

    #[test]
    fn test_host_clock_extreme_host_times() {
        let mut clock = HostClock::new();

        let sync = TimeSync::parse(&(1u64 << 63).to_le_bytes()).unwrap();
        clock.sync(sync, 1_000);
        assert_eq!(clock.now(1_000), 1u64 << 63);
        assert_eq!(clock.now(1_500), (1u64 << 63) + 500);

        clock.sync(TimeSync { host_time_ms: u64::MAX }, 0);
        assert_eq!(clock.now(0), u64::MAX);
        assert_eq!(clock.now(u64::MAX), u64::MAX);

        clock.sync(
            TimeSync {
                host_time_ms: i64::MAX as u64,
            },
            0,
        );
        assert_eq!(clock.now(10), i64::MAX as u64 + 10);
    }

    #[test]
    fn test_experiment_lifecycle() {
        let mut exp = Experiment::default();
        assert_eq!(exp.tick(0), None);

        exp.apply(
            RunExperiment {
                experiment_id: 7,
                duration_ms: 100,
            },
            1_000,
        );
        assert!(exp.is_running());
        assert_eq!(exp.tick(1_050), None);
        assert_eq!(exp.tick(1_100), Some(7));
        assert!(!exp.is_running());

        exp.apply(
            RunExperiment {
                experiment_id: 8,
                duration_ms: 100,
            },
            0,
        );
        exp.apply(
            RunExperiment {
                experiment_id: 8,
                duration_ms: 0,
            },
            10,
        );
        assert_eq!(exp, Experiment::Idle);
    }
}
