//! Telemetry samples and the on-device sample log
//!
//! A TELEMETRY payload is the channel values as packed little-endian
//! `f32`, in dictionary order. The most recent samples are also kept in a
//! fixed-size log that the host can page out with EXPORT_LOG:
//! ```text
//! [from_index u32 LE][count u16 LE][LogRecord (postcard)] * count
//! ```

use cardash_protocol::app::ParamError;
use heapless::HistoryBuffer;
use serde::{Deserialize, Serialize};

/// Upper bound on telemetry channels
pub const MAX_CHANNELS: usize = 16;

/// Bytes per channel in a TELEMETRY payload
pub const CHANNEL_LEN: usize = 4;

const EXPORT_HEADER_LEN: usize = 6;

/// Pack channel values into a TELEMETRY payload
pub fn encode_sample(values: &[f32], out: &mut [u8]) -> Result<usize, ParamError> {
    let len = values.len() * CHANNEL_LEN;
    let out = out.get_mut(..len).ok_or(ParamError::BufferTooSmall)?;
    for (chunk, value) in out.chunks_exact_mut(CHANNEL_LEN).zip(values) {
        chunk.copy_from_slice(&value.to_le_bytes());
    }
    Ok(len)
}

/// Unpack a TELEMETRY payload; a trailing partial channel is ignored
///
/// Host-side decoder for [`encode_sample`].
pub fn decode_sample(payload: &[u8]) -> impl Iterator<Item = f32> + '_ {
    payload
        .chunks_exact(CHANNEL_LEN)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
}

/// One logged sample
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogRecord {
    /// Monotonic record number
    pub index: u32,
    /// Host time if synced, uptime otherwise
    pub timestamp_ms: u64,
    pub values: heapless::Vec<f32, MAX_CHANNELS>,
}

/// Result of one export call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ExportChunk {
    /// Records written
    pub count: u16,
    /// Payload bytes written
    pub len: usize,
    /// Index to request next
    pub next_index: u32,
}

/// Ring of the most recent `N` samples
pub struct SampleLog<const N: usize> {
    records: HistoryBuffer<LogRecord, N>,
    next_index: u32,
}

impl<const N: usize> Default for SampleLog<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> SampleLog<N> {
    pub const fn new() -> Self {
        Self {
            records: HistoryBuffer::new(),
            next_index: 0,
        }
    }

    /// Append a sample, evicting the oldest when full
    ///
    /// Channels past [`MAX_CHANNELS`] are dropped. Returns the record index.
    pub fn push(&mut self, timestamp_ms: u64, values: &[f32]) -> u32 {
        let index = self.next_index;
        let kept = &values[..values.len().min(MAX_CHANNELS)];
        let mut record = LogRecord {
            index,
            timestamp_ms,
            values: heapless::Vec::new(),
        };
        // Cannot fail: `kept` is at most MAX_CHANNELS long
        let _ = record.values.extend_from_slice(kept);
        self.records.write(record);
        self.next_index = self.next_index.wrapping_add(1);
        index
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.len() == 0
    }

    /// Index the next pushed record will get
    pub fn next_index(&self) -> u32 {
        self.next_index
    }

    /// Serialize records with `index >= from_index`, oldest first
    ///
    /// Stops at `max_entries` or when the next record would not fit.
    pub fn export(
        &self,
        from_index: u32,
        max_entries: u16,
        out: &mut [u8],
    ) -> Result<ExportChunk, ParamError> {
        if out.len() < EXPORT_HEADER_LEN {
            return Err(ParamError::BufferTooSmall);
        }

        let mut count: u16 = 0;
        let mut len = EXPORT_HEADER_LEN;
        let mut next_index = from_index;

        for record in self.records.oldest_ordered() {
            if count == max_entries {
                break;
            }
            if record.index < from_index {
                continue;
            }
            match postcard::to_slice(record, &mut out[len..]) {
                Ok(used) => len += used.len(),
                Err(_) => break,
            }
            count += 1;
            next_index = record.index.wrapping_add(1);
        }

        out[..4].copy_from_slice(&from_index.to_le_bytes());
        out[4..6].copy_from_slice(&count.to_le_bytes());
        Ok(ExportChunk {
            count,
            len,
            next_index,
        })
    }
}

/// Iterates the records in an EXPORT_LOG payload
///
/// Host-side decoder for [`SampleLog::export`].
pub struct ExportReader<'a> {
    from_index: u32,
    remaining: u16,
    rest: &'a [u8],
}

impl<'a> ExportReader<'a> {
    pub fn new(payload: &'a [u8]) -> Option<Self> {
        if payload.len() < EXPORT_HEADER_LEN {
            return None;
        }
        Some(Self {
            from_index: u32::from_le_bytes([payload[0], payload[1], payload[2], payload[3]]),
            remaining: u16::from_le_bytes([payload[4], payload[5]]),
            rest: &payload[EXPORT_HEADER_LEN..],
        })
    }

    pub fn from_index(&self) -> u32 {
        self.from_index
    }
}

impl Iterator for ExportReader<'_> {
    type Item = LogRecord;

    fn next(&mut self) -> Option<LogRecord> {
        if self.remaining == 0 {
            return None;
        }
        let (record, rest) = postcard::take_from_bytes(self.rest).ok()?;
        self.rest = rest;
        self.remaining -= 1;
        Some(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_encoding() {
        let mut buf = [0u8; 32];
        let n = encode_sample(&[12.5, -1.0, 0.25], &mut buf).unwrap();
        assert_eq!(n, 12);
        let values: Vec<f32> = decode_sample(&buf[..n]).collect();
        assert_eq!(values, [12.5, -1.0, 0.25]);

        let mut small = [0u8; 7];
        assert_eq!(
            encode_sample(&[1.0, 2.0], &mut small),
            Err(ParamError::BufferTooSmall)
        );
    }

    #[test]
    fn test_log_evicts_oldest() {
        let mut log: SampleLog<4> = SampleLog::new();
        for i in 0..6u64 {
            log.push(i * 10, &[i as f32]);
        }
        assert_eq!(log.len(), 4);
        assert_eq!(log.next_index(), 6);

        let mut buf = [0u8; 256];
        let chunk = log.export(0, 100, &mut buf).unwrap();
        assert_eq!(chunk.count, 4);
        assert_eq!(chunk.next_index, 6);

        let indices: Vec<u32> = ExportReader::new(&buf[..chunk.len])
            .unwrap()
            .map(|r| r.index)
            .collect();
        assert_eq!(indices, [2, 3, 4, 5]);
    }

    #[test]
    fn test_export_pages() {
        let mut log: SampleLog<16> = SampleLog::new();
        for i in 0..10u64 {
            log.push(1_000 + i, &[i as f32, 2.0 * i as f32]);
        }

        let mut buf = [0u8; 256];
        let first = log.export(3, 4, &mut buf).unwrap();
        assert_eq!(first.count, 4);
        assert_eq!(first.next_index, 7);

        let reader = ExportReader::new(&buf[..first.len]).unwrap();
        assert_eq!(reader.from_index(), 3);
        let records: Vec<LogRecord> = reader.collect();
        assert_eq!(records[0].index, 3);
        assert_eq!(records[0].timestamp_ms, 1_003);
        assert_eq!(&records[0].values[..], &[3.0, 6.0]);

        let second = log.export(first.next_index, 100, &mut buf).unwrap();
        assert_eq!(second.count, 3);
        assert_eq!(second.next_index, 10);

        let done = log.export(second.next_index, 100, &mut buf).unwrap();
        assert_eq!(done.count, 0);
        assert_eq!(done.next_index, 10);
    }

    #[test]
    fn test_export_stops_when_full() {
        let mut log: SampleLog<8> = SampleLog::new();
        for i in 0..8u64 {
            log.push(i, &[1.0; MAX_CHANNELS]);
        }
        // Each record is well over 64 bytes
        let mut buf = [0u8; 150];
        let chunk = log.export(0, 100, &mut buf).unwrap();
        assert!(chunk.count >= 1 && chunk.count < 8);
        assert_eq!(
            ExportReader::new(&buf[..chunk.len]).unwrap().count(),
            chunk.count as usize
        );

        assert_eq!(log.export(0, 1, &mut [0u8; 4]), Err(ParamError::BufferTooSmall));
    }

    #[test]
    fn test_push_truncates_channels() {
        let mut log: SampleLog<2> = SampleLog::new();
        log.push(0, &[0.0; MAX_CHANNELS + 4]);
        let mut buf = [0u8; 128];
        let chunk = log.export(0, 1, &mut buf).unwrap();
        let record = ExportReader::new(&buf[..chunk.len]).unwrap().next().unwrap();
        assert_eq!(record.values.len(), MAX_CHANNELS);
    }
}
