//! rtu-slave: Modbus RTU slave engine for a single device
//!
//! The engine (`api::modbus::SlaveEngine`) validates incoming RTU frames,
//! serves reads and writes against a fixed map of holding registers and
//! coils, and answers over a half-duplex link. It only talks to hardware
//! through the `Transport` and `Clock` traits, so it runs the same against a
//! serial port (`core::SerialTransport`) or a test double.
//!
//! The frame codec, the register/coil store and the watchdog live in
//! `protocol`; the `cli` module holds the configuration file format and the
//! binary's serial host loop.

pub mod api;
#[doc(hidden)]
pub mod cli;
pub mod core;
pub mod protocol;

pub use api::*;
