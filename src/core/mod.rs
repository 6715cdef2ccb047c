/// Host-side implementations of the engine capabilities
///
/// - `SerialTransport`: a `serialport` handle with idle-line framing
/// - `SystemClock`: `Instant`-based time and blocking delays
pub mod clock;
pub mod serial;

pub use clock::SystemClock;
pub use serial::{compute_gap, SerialSettings, SerialTransport};
