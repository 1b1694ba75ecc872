//! Single-producer/single-consumer byte rings
//!
//! The UART interrupt (or DMA completion) writes inbound bytes; the link
//! task reads them. `heapless::spsc::Queue` keeps one atomic cursor per
//! side, so the two halves can live in different execution contexts
//! without a lock. The same structure carries outbound frames from the
//! link task to the transmitter.

use heapless::spsc::{Consumer, Producer, Queue};

use cardash_hal::{ByteSink, WouldBlock};

use crate::config::{RX_RING_SIZE, TX_RING_SIZE};

/// Inbound ring (interrupt → link task)
pub type RxRing = Queue<u8, RX_RING_SIZE>;

/// Outbound ring (link task → transmitter)
pub type TxRing = Queue<u8, TX_RING_SIZE>;

/// Writing half of a byte ring
pub struct RingProducer<'a, const N: usize> {
    inner: Producer<'a, u8, N>,
    overruns: u32,
}

impl<'a, const N: usize> RingProducer<'a, N> {
    /// Wrap a heapless producer
    pub fn new(inner: Producer<'a, u8, N>) -> Self {
        Self { inner, overruns: 0 }
    }

    /// Bytes that can be pushed before the ring is full
    pub fn free(&self) -> usize {
        self.inner.capacity() - self.inner.len()
    }

    /// Push as many bytes as fit
    ///
    /// Returns the number accepted. The rest are dropped and counted as
    /// overruns; the assembler resynchronises on the next delimiter.
    pub fn push_slice(&mut self, bytes: &[u8]) -> usize {
        for (i, &byte) in bytes.iter().enumerate() {
            if self.inner.enqueue(byte).is_err() {
                let dropped = (bytes.len() - i) as u32;
                self.overruns = self.overruns.wrapping_add(dropped);
                return i;
            }
        }
        bytes.len()
    }

    /// Bytes dropped because the ring was full
    pub fn overruns(&self) -> u32 {
        self.overruns
    }
}

/// Reading half of a byte ring
pub struct RingConsumer<'a, const N: usize> {
    inner: Consumer<'a, u8, N>,
}

impl<'a, const N: usize> RingConsumer<'a, N> {
    /// Wrap a heapless consumer
    pub fn new(inner: Consumer<'a, u8, N>) -> Self {
        Self { inner }
    }

    /// Bytes waiting to be read
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Returns true if nothing is waiting
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Pop one byte
    pub fn pop(&mut self) -> Option<u8> {
        self.inner.dequeue()
    }

    /// Move up to `buf.len()` bytes out of the ring
    pub fn read_into(&mut self, buf: &mut [u8]) -> usize {
        let mut n = 0;
        while n < buf.len() {
            match self.inner.dequeue() {
                Some(byte) => {
                    buf[n] = byte;
                    n += 1;
                }
                None => break,
            }
        }
        n
    }
}

/// Split a queue into its wrapped halves
pub fn split<const N: usize>(
    queue: &mut Queue<u8, N>,
) -> (RingProducer<'_, N>, RingConsumer<'_, N>) {
    let (producer, consumer) = queue.split();
    (RingProducer::new(producer), RingConsumer::new(consumer))
}

/// [`ByteSink`] over an inbound consumer and an outbound producer
///
/// This is what the link task hands to [`crate::Link::poll`] on the
/// device: reads drain what the UART interrupt queued, writes queue
/// whole frames for the transmitter.
pub struct RingSink<'a> {
    rx: RingConsumer<'a, RX_RING_SIZE>,
    tx: RingProducer<'a, TX_RING_SIZE>,
}

impl<'a> RingSink<'a> {
    /// Combine the link-side halves of both rings
    pub fn new(rx: RingConsumer<'a, RX_RING_SIZE>, tx: RingProducer<'a, TX_RING_SIZE>) -> Self {
        Self { rx, tx }
    }

    /// Inbound bytes not yet read
    pub fn rx_pending(&self) -> usize {
        self.rx.len()
    }

    /// Outbound space left
    pub fn tx_free(&self) -> usize {
        self.tx.free()
    }
}

impl ByteSink for RingSink<'_> {
    fn read_available(&mut self, buf: &mut [u8]) -> usize {
        self.rx.read_into(buf)
    }

    fn write(&mut self, bytes: &[u8]) -> Result<(), WouldBlock> {
        if bytes.len() > self.tx.free() {
            return Err(WouldBlock);
        }
        self.tx.push_slice(bytes);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_and_read() {
        let mut queue: Queue<u8, 8> = Queue::new();
        let (mut producer, mut consumer) = split(&mut queue);

        assert_eq!(producer.free(), 7);
        assert_eq!(producer.push_slice(&[1, 2, 3]), 3);
        assert_eq!(consumer.len(), 3);
        assert_eq!(consumer.pop(), Some(1));

        let mut buf = [0u8; 8];
        assert_eq!(consumer.read_into(&mut buf), 2);
        assert_eq!(&buf[..2], &[2, 3]);
        assert!(consumer.is_empty());
        assert_eq!(consumer.pop(), None);
    }

    #[test]
    fn test_overrun_counts_dropped_bytes() {
        let mut queue: Queue<u8, 4> = Queue::new();
        let (mut producer, _consumer) = split(&mut queue);

        assert_eq!(producer.push_slice(&[1, 2, 3, 4, 5]), 3);
        assert_eq!(producer.overruns(), 2);
        assert_eq!(producer.free(), 0);
    }

    #[test]
    fn test_wraparound() {
        let mut queue: Queue<u8, 4> = Queue::new();
        let (mut producer, mut consumer) = split(&mut queue);
        let mut buf = [0u8; 4];

        for round in 0u8..10 {
            assert_eq!(producer.push_slice(&[round, round + 1]), 2);
            assert_eq!(consumer.read_into(&mut buf), 2);
            assert_eq!(&buf[..2], &[round, round + 1]);
        }
    }

    #[test]
    fn test_ring_sink() {
        let mut rx_queue = RxRing::new();
        let mut tx_queue = TxRing::new();
        let (mut isr, rx) = split(&mut rx_queue);
        let (tx, mut uart) = split(&mut tx_queue);
        let mut sink = RingSink::new(rx, tx);

        isr.push_slice(&[9, 8, 7]);
        assert_eq!(sink.rx_pending(), 3);
        let mut buf = [0u8; 2];
        assert_eq!(sink.read_available(&mut buf), 2);
        assert_eq!(sink.read_available(&mut buf), 1);
        assert_eq!(sink.read_available(&mut buf), 0);

        assert_eq!(sink.write(&[1, 2, 3, 0]), Ok(()));
        assert_eq!(uart.len(), 4);
        assert_eq!(uart.pop(), Some(1));
    }

    #[test]
    fn test_ring_sink_write_is_all_or_nothing() {
        let mut rx_queue = RxRing::new();
        let mut tx_queue = TxRing::new();
        let (_isr, rx) = split(&mut rx_queue);
        let (tx, uart) = split(&mut tx_queue);
        let mut sink = RingSink::new(rx, tx);

        let big = [0x55u8; TX_RING_SIZE - 10];
        assert_eq!(sink.write(&big), Ok(()));
        assert_eq!(sink.write(&[1u8; 20]), Err(WouldBlock));
        assert_eq!(uart.len(), big.len());
        assert_eq!(sink.tx_free(), 9);
    }
}
