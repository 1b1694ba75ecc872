//! Inter-task communication channels
//!
//! Defines the static channels used for communication between Embassy tasks.
//! Command handlers run inside the link task's poll and may only signal;
//! the link task picks the requests up after the poll returns.

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use embassy_sync::signal::Signal;
use heapless::Vec;
use portable_atomic::AtomicBool;

use cardash_core::telemetry::MAX_CHANNELS;
use cardash_core::{ExportLog, RunExperiment, TimeSync};

/// Channel capacity for telemetry samples
const SAMPLE_CHANNEL_SIZE: usize = 4;

/// One reading of every configured telemetry channel
#[derive(Debug, Clone)]
pub struct Sample {
    /// Uptime when the sample was taken
    pub uptime_ms: u64,
    pub values: Vec<f32, MAX_CHANNELS>,
}

/// Samples from the telemetry task
pub static SAMPLES: Channel<CriticalSectionRawMutex, Sample, SAMPLE_CHANNEL_SIZE> = Channel::new();

/// Inbound bytes were queued on the RX ring
pub static RX_READY: Signal<CriticalSectionRawMutex, ()> = Signal::new();

/// Outbound bytes were queued on the TX ring
pub static TX_READY: Signal<CriticalSectionRawMutex, ()> = Signal::new();

/// Host clock received
pub static TIME_SYNC: Signal<CriticalSectionRawMutex, TimeSync> = Signal::new();

/// Experiment start/stop request
pub static EXPERIMENT: Signal<CriticalSectionRawMutex, RunExperiment> = Signal::new();

/// Log export request
pub static EXPORT_REQUEST: Signal<CriticalSectionRawMutex, ExportLog> = Signal::new();

/// Profile to apply (id already checked against the profile table)
pub static PROFILE_REQUEST: Signal<CriticalSectionRawMutex, u8> = Signal::new();

/// True while an experiment runs; the telemetry task samples faster
pub static EXPERIMENT_ACTIVE: AtomicBool = AtomicBool::new(false);

/// True while the link task is paging out a log export
pub static EXPORT_ACTIVE: AtomicBool = AtomicBool::new(false);
