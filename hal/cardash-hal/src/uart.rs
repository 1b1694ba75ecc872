//! UART serial communication abstractions
//!
//! The protocol layer sees the serial link as a [`ByteSink`]: a buffered,
//! non-blocking byte stream. Interrupt/DMA plumbing lives behind it.

use core::fmt;

/// Transmit side is full; the caller should retry later
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct WouldBlock;

impl fmt::Display for WouldBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("transmit buffer full")
    }
}

/// Buffered, non-blocking byte stream
///
/// Neither method may block or suspend. Inbound bytes arrive in arbitrary
/// chunks; a single call may return part of a frame or several frames.
pub trait ByteSink {
    /// Copy up to `buf.len()` already-received bytes into `buf`
    ///
    /// Returns the number of bytes copied; `0` means nothing is pending.
    fn read_available(&mut self, buf: &mut [u8]) -> usize;

    /// Queue `bytes` for transmission
    ///
    /// All-or-nothing: either every byte is queued or none is and
    /// [`WouldBlock`] is returned.
    fn write(&mut self, bytes: &[u8]) -> Result<(), WouldBlock>;
}

impl<T: ByteSink + ?Sized> ByteSink for &mut T {
    fn read_available(&mut self, buf: &mut [u8]) -> usize {
        (**self).read_available(buf)
    }

    fn write(&mut self, bytes: &[u8]) -> Result<(), WouldBlock> {
        (**self).write(bytes)
    }
}

/// UART configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct UartConfig {
    /// Baud rate in bits per second
    pub baudrate: u32,
    /// Number of data bits (typically 8)
    pub data_bits: DataBits,
    /// Parity mode
    pub parity: Parity,
    /// Number of stop bits
    pub stop_bits: StopBits,
}

impl Default for UartConfig {
    fn default() -> Self {
        Self {
            baudrate: 115200,
            data_bits: DataBits::Eight,
            parity: Parity::None,
            stop_bits: StopBits::One,
        }
    }
}

/// Number of data bits per frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DataBits {
    Seven,
    Eight,
}

/// Parity mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Parity {
    None,
    Even,
    Odd,
}

/// Number of stop bits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StopBits {
    One,
    Two,
}
