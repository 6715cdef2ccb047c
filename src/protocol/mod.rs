pub mod modbus;
pub mod store;
pub mod watchdog;
