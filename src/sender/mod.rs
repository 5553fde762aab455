// Sender side: telemetry state shared between the detection thread and the
// broadcast scheduler, plus the transports the scheduler drives.

pub mod buffer;
pub mod detection;
pub mod scheduler;
pub mod transport;
