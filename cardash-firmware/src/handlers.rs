//! Command handlers
//!
//! Registered with the link at startup. They run inside `Link::poll`, so
//! each one only validates the payload and hands the request to the link
//! task through a signal. The ACK goes out as soon as the handler
//! returns; the work happens after the poll.

use portable_atomic::Ordering;

use cardash_core::{find_profile, ApplyProfile, ExportLog, RunExperiment, TimeSync};
use cardash_protocol::app::ErrorCode;

use crate::channels::{EXPERIMENT, EXPORT_ACTIVE, EXPORT_REQUEST, PROFILE_REQUEST, TIME_SYNC};
use crate::config::PROFILES;

pub fn time_sync(payload: &[u8]) -> Result<(), ErrorCode> {
    TIME_SYNC.signal(TimeSync::parse(payload)?);
    Ok(())
}

pub fn run_experiment(payload: &[u8]) -> Result<(), ErrorCode> {
    EXPERIMENT.signal(RunExperiment::parse(payload)?);
    Ok(())
}

/// One export at a time; a second request while paging is refused
pub fn export_log(payload: &[u8]) -> Result<(), ErrorCode> {
    let request = ExportLog::parse(payload)?;
    if EXPORT_ACTIVE.load(Ordering::Relaxed) || EXPORT_REQUEST.signaled() {
        return Err(ErrorCode::Busy);
    }
    EXPORT_REQUEST.signal(request);
    Ok(())
}

pub fn apply_profile(payload: &[u8]) -> Result<(), ErrorCode> {
    let request = ApplyProfile::parse(payload)?;
    if find_profile(&PROFILES, request.profile_id).is_none() {
        return Err(ErrorCode::Rejected);
    }
    PROFILE_REQUEST.signal(request.profile_id);
    Ok(())
}
