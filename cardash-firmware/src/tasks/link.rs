//! Link task
//!
//! Consumer side of the inbound ring. Runs the protocol endpoint, owns the
//! parameter table and the sample log, and carries out the work command
//! handlers queue up:
//! - TIME_SYNC: align log timestamps with host time
//! - RUN_EXPERIMENT: start/stop a timed run (faster telemetry)
//! - APPLY_PROFILE: load a named parameter set
//! - EXPORT_LOG: page the sample log out as EXPORT_LOG frames

use defmt::*;
use embassy_futures::select::{select3, Either3};
use embassy_time::{Instant, Timer};
use portable_atomic::Ordering;

use cardash_core::telemetry::encode_sample;
use cardash_core::{find_profile, Experiment, ExportLog, HostClock, ParamTable, SampleLog};
use cardash_protocol::{EmitError, Link, MsgType, RingSink, MAX_FRAME_SIZE, MAX_PAYLOAD_SIZE};

use crate::channels::{
    Sample, EXPERIMENT, EXPERIMENT_ACTIVE, EXPORT_ACTIVE, EXPORT_REQUEST, PROFILE_REQUEST,
    RX_READY, SAMPLES, TIME_SYNC, TX_READY,
};
use crate::config::{LOG_CAPACITY, PARAM_COUNT, PROFILES};

/// Housekeeping interval when nothing else wakes the task
const SERVICE_INTERVAL_MS: u64 = 10;

/// State owned by the link task
pub struct LinkResources {
    pub link: &'static mut Link,
    pub params: &'static mut ParamTable<PARAM_COUNT>,
    pub log: &'static mut SampleLog<LOG_CAPACITY>,
    pub sink: RingSink<'static>,
}

/// Link task - polls the endpoint and services queued commands
#[embassy_executor::task]
pub async fn link_task(resources: LinkResources) {
    info!("Link task started");

    let LinkResources {
        link,
        params,
        log,
        mut sink,
    } = resources;

    let mut clock = HostClock::new();
    let mut experiment = Experiment::default();
    let mut export: Option<ExportLog> = None;
    let mut payload = [0u8; MAX_PAYLOAD_SIZE];
    let mut reported_errors = 0;

    loop {
        let mut queued = false;

        match select3(
            RX_READY.wait(),
            SAMPLES.receive(),
            Timer::after_millis(SERVICE_INTERVAL_MS),
        )
        .await
        {
            Either3::First(()) => {}
            Either3::Second(sample) => {
                queued |= publish_sample(link, &mut sink, log, &clock, &sample, &mut payload);
            }
            Either3::Third(()) => {}
        }

        let summary = link.poll(&mut sink, params);
        if summary.frames > 0 {
            debug!(
                "Link: {} frames, {} replies, {} dropped",
                summary.frames, summary.replies, summary.dropped
            );
        }
        queued |= summary.replies > 0;

        let stats = link.stats();
        if stats.rx_errors() != reported_errors {
            reported_errors = stats.rx_errors();
            warn!(
                "Link errors: {} total, last {:?}",
                reported_errors, stats.last_error
            );
        }

        let uptime_ms = Instant::now().as_millis();

        if let Some(sync) = TIME_SYNC.try_take() {
            clock.sync(sync, uptime_ms);
            info!("Host time synced: {} ms", sync.host_time_ms);
        }

        if let Some(request) = EXPERIMENT.try_take() {
            experiment.apply(request, uptime_ms);
            if request.is_stop() {
                info!("Experiment stopped");
            } else {
                info!(
                    "Experiment {} running for {} ms",
                    request.experiment_id, request.duration_ms
                );
            }
        }
        if let Some(id) = experiment.tick(uptime_ms) {
            info!("Experiment {} finished", id);
        }
        EXPERIMENT_ACTIVE.store(experiment.is_running(), Ordering::Relaxed);

        if let Some(id) = PROFILE_REQUEST.try_take() {
            apply_profile(params, id);
        }

        if let Some(request) = EXPORT_REQUEST.try_take() {
            debug!(
                "Export from {} (max {})",
                request.from_index, request.max_entries
            );
            export = Some(request);
        }
        if let Some(request) = export {
            let (next, sent) = page_export(link, &mut sink, log, request, &mut payload);
            export = next;
            queued |= sent;
        }
        EXPORT_ACTIVE.store(export.is_some(), Ordering::Relaxed);

        if queued {
            TX_READY.signal(());
        }
    }
}

/// Log a sample and send it as a TELEMETRY frame
///
/// Returns true if a frame was queued.
fn publish_sample(
    link: &mut Link,
    sink: &mut RingSink<'static>,
    log: &mut SampleLog<LOG_CAPACITY>,
    clock: &HostClock,
    sample: &Sample,
    payload: &mut [u8; MAX_PAYLOAD_SIZE],
) -> bool {
    log.push(clock.now(sample.uptime_ms), &sample.values);

    let len = match encode_sample(&sample.values, payload) {
        Ok(len) => len,
        Err(e) => {
            warn!("Telemetry encode failed: {:?}", e);
            return false;
        }
    };
    match link.send_telemetry(sink, &payload[..len]) {
        Ok(seq) => {
            trace!("Telemetry seq {}", seq);
            true
        }
        Err(EmitError::WouldBlock) => {
            trace!("TX ring full, telemetry dropped");
            false
        }
        Err(e) => {
            warn!("Telemetry send failed: {:?}", e);
            false
        }
    }
}

fn apply_profile(params: &mut ParamTable<PARAM_COUNT>, id: u8) {
    let Some(profile) = find_profile(&PROFILES, id) else {
        warn!("Profile {} vanished", id);
        return;
    };
    match params.apply_profile(profile) {
        Ok(count) => info!("Profile '{}' applied ({} params)", profile.name, count),
        Err(e) => warn!("Profile '{}' rejected: {:?}", profile.name, e),
    }
}

/// Send the next page of a log export
///
/// Paging stops after an empty page or once `max_entries` records went
/// out. Returns the remaining request (if any) and whether a frame was
/// queued.
fn page_export(
    link: &mut Link,
    sink: &mut RingSink<'static>,
    log: &SampleLog<LOG_CAPACITY>,
    request: ExportLog,
    payload: &mut [u8; MAX_PAYLOAD_SIZE],
) -> (Option<ExportLog>, bool) {
    // Wait for room so a page never competes with replies
    if sink.tx_free() < MAX_FRAME_SIZE {
        return (Some(request), false);
    }

    let chunk = match log.export(request.from_index, request.max_entries, payload) {
        Ok(chunk) => chunk,
        Err(e) => {
            warn!("Export failed: {:?}", e);
            return (None, false);
        }
    };

    match link.send(sink, MsgType::ExportLog, &payload[..chunk.len]) {
        Ok(_) => {}
        Err(EmitError::WouldBlock) => return (Some(request), false),
        Err(e) => {
            warn!("Export send failed: {:?}", e);
            return (None, false);
        }
    }

    let remaining = request.max_entries - chunk.count;
    if chunk.count == 0 || remaining == 0 {
        debug!("Export complete at index {}", chunk.next_index);
        return (None, true);
    }
    let next = ExportLog {
        from_index: chunk.next_index,
        max_entries: remaining,
    };
    (Some(next), true)
}
