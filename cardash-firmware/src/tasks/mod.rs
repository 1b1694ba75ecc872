//! Embassy async tasks
//!
//! Each task runs independently and communicates via channels/signals.

pub mod link;
pub mod telemetry;
pub mod uart_rx;
pub mod uart_tx;

pub use link::{link_task, LinkResources};
pub use telemetry::{telemetry_task, TelemetryInputs};
pub use uart_rx::uart_rx_task;
pub use uart_tx::uart_tx_task;
