//! UART transmit task
//!
//! Consumer side of the outbound ring. The link task queues whole
//! encoded frames and signals; this task writes them out.

use defmt::*;
use embassy_rp::uart::BufferedUartTx;
use embedded_io_async::Write;

use cardash_protocol::config::TX_RING_SIZE;
use cardash_protocol::RingConsumer;

use crate::channels::TX_READY;

/// Bytes moved per UART write
const TX_BUF_SIZE: usize = 64;

/// UART TX task - drains the outbound ring to the wire
#[embassy_executor::task]
pub async fn uart_tx_task(mut tx: BufferedUartTx, mut ring: RingConsumer<'static, TX_RING_SIZE>) {
    info!("UART TX task started");

    let mut buf = [0u8; TX_BUF_SIZE];

    loop {
        TX_READY.wait().await;

        loop {
            let n = ring.read_into(&mut buf);
            if n == 0 {
                break;
            }
            if let Err(e) = tx.write_all(&buf[..n]).await {
                warn!("UART write error: {:?}", e);
            }
        }
        trace!("TX ring drained");
    }
}
