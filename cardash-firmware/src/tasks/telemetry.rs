//! Telemetry sampling task
//!
//! Reads every configured channel once per period and hands the sample to
//! the link task. The period drops to `EXPERIMENT_PERIOD_MS` while an
//! experiment runs.

use defmt::*;
use embassy_rp::adc::{Adc, Async, Channel};
use embassy_time::{Duration, Instant, Ticker};
use heapless::Vec;
use portable_atomic::Ordering;

use crate::channels::{Sample, EXPERIMENT_ACTIVE, SAMPLES};
use crate::config::{Source, EXPERIMENT_PERIOD_MS, TELEMETRY_PERIOD_MS, TELEMETRY_SOURCES};

/// ADC full scale (12-bit)
const ADC_MAX: f32 = 4095.0;

/// ADC reference voltage
const ADC_VREF: f32 = 3.3;

/// VSYS is read through a 1/3 divider
const VSYS_DIVIDER: f32 = 3.0;

/// ADC peripherals used by the samplers
pub struct TelemetryInputs {
    pub adc: Adc<'static, Async>,
    pub vsys: Channel<'static>,
    pub temp_sensor: Channel<'static>,
}

/// Convert a raw reading to volts at the ADC pin
fn adc_to_volts(raw: u16) -> f32 {
    raw as f32 * ADC_VREF / ADC_MAX
}

/// RP2040 datasheet sensor curve: 27 °C at 0.706 V, -1.721 mV/°C
fn sensor_to_celsius(volts: f32) -> f32 {
    27.0 - (volts - 0.706) / 0.001721
}

impl TelemetryInputs {
    async fn read(&mut self, source: Source, uptime_ms: u64) -> f32 {
        match source {
            Source::Vsys => match self.adc.read(&mut self.vsys).await {
                Ok(raw) => adc_to_volts(raw) * VSYS_DIVIDER,
                Err(e) => {
                    warn!("VSYS read failed: {:?}", e);
                    f32::NAN
                }
            },
            Source::CoreTemp => match self.adc.read(&mut self.temp_sensor).await {
                Ok(raw) => sensor_to_celsius(adc_to_volts(raw)),
                Err(e) => {
                    warn!("Temperature read failed: {:?}", e);
                    f32::NAN
                }
            },
            Source::Uptime => uptime_ms as f32 / 1000.0,
        }
    }
}

/// Telemetry task - samples channels and feeds the link task
#[embassy_executor::task]
pub async fn telemetry_task(mut inputs: TelemetryInputs) {
    info!(
        "Telemetry task started ({} channels, {} ms)",
        TELEMETRY_SOURCES.len(),
        TELEMETRY_PERIOD_MS
    );

    let mut fast = false;
    let mut ticker = Ticker::every(Duration::from_millis(TELEMETRY_PERIOD_MS));

    loop {
        ticker.next().await;

        let experiment = EXPERIMENT_ACTIVE.load(Ordering::Relaxed);
        if experiment != fast {
            fast = experiment;
            let period = if fast {
                EXPERIMENT_PERIOD_MS
            } else {
                TELEMETRY_PERIOD_MS
            };
            debug!("Telemetry period {} ms", period);
            ticker = Ticker::every(Duration::from_millis(period));
        }

        let uptime_ms = Instant::now().as_millis();
        let mut values = Vec::new();
        for &source in TELEMETRY_SOURCES.iter() {
            // Cannot fail: build.rs caps the channel count
            let _ = values.push(inputs.read(source, uptime_ms).await);
        }

        if SAMPLES.try_send(Sample { uptime_ms, values }).is_err() {
            trace!("Sample channel full, dropping sample");
        }
    }
}

