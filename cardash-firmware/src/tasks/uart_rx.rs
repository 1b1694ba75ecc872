//! UART receive task
//!
//! Producer side of the inbound ring. Bytes go onto the ring as they
//! arrive; framing happens in the link task.

use defmt::*;
use embassy_rp::uart::BufferedUartRx;
use embedded_io_async::Read;

use cardash_protocol::config::RX_RING_SIZE;
use cardash_protocol::RingProducer;

use crate::channels::RX_READY;

/// Buffer size for UART receive
const RX_BUF_SIZE: usize = 64;

/// UART RX task - moves received bytes onto the inbound ring
#[embassy_executor::task]
pub async fn uart_rx_task(mut rx: BufferedUartRx, mut ring: RingProducer<'static, RX_RING_SIZE>) {
    info!("UART RX task started");

    let mut buf = [0u8; RX_BUF_SIZE];
    let mut reported_overruns = 0;

    loop {
        match rx.read(&mut buf).await {
            Ok(n) if n > 0 => {
                trace!("RX: {} bytes", n);
                ring.push_slice(&buf[..n]);
                RX_READY.signal(());

                if ring.overruns() != reported_overruns {
                    reported_overruns = ring.overruns();
                    warn!("RX ring full, {} bytes dropped so far", reported_overruns);
                }
            }
            Ok(_) => {
                // No bytes read, continue
            }
            Err(e) => {
                warn!("UART read error: {:?}", e);
            }
        }
    }
}
