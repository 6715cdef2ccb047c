pub mod crc;
pub mod exception;
pub mod frame;
pub mod response;
mod slave_coils;
mod slave_holdings;

pub use exception::{ExceptionCode, FunctionCode};
pub use frame::{validate, Frame, FrameRejection, MAX_FRAME_LEN};
pub use response::PendingResponse;
pub use slave_coils::{read_coils, write_multiple_coils, write_single_coil};
pub use slave_holdings::{read_registers, write_multiple_registers, write_single_register};

use crate::protocol::store::{CoilFile, RegisterFile};

/// Offset of the first data byte of a multi-write request
/// (address, function, start, count, byte count).
pub(crate) const DATA_OFFSET: usize = 7;

/// Result of running one validated frame through its handler.
#[derive(Debug, Clone)]
pub struct Dispatched {
    pub response: PendingResponse,
    /// Set when a single-register write went through.
    pub register_written: Option<u16>,
}

/// Decode the two header words every supported request starts with: start
/// address (or single address) and count (or single value).
pub(crate) fn read_header(frame: &Frame<'_>) -> Result<(usize, usize), ExceptionCode> {
    match (frame.word(2), frame.word(4)) {
        (Some(first), Some(second)) => Ok((first as usize, second as usize)),
        _ => Err(ExceptionCode::IllegalDataValue),
    }
}

/// Bounds shared by every multi-slot request: `count` must lie in
/// `1..=capacity`, otherwise the request is an illegal data value. A range
/// running past the end is answered with `out_of_range`, which differs
/// between coil reads and everything else.
pub(crate) fn check_range(
    start: usize,
    count: usize,
    capacity: usize,
    out_of_range: ExceptionCode,
) -> Result<(), ExceptionCode> {
    if count < 1 || count > capacity {
        return Err(ExceptionCode::IllegalDataValue);
    }
    if start + count - 1 >= capacity {
        return Err(out_of_range);
    }
    Ok(())
}

/// Route a validated frame to its handler and build the reply.
///
/// Handler failures become exception replies here, so every dispatched frame
/// is answered.
pub fn dispatch(
    frame: &Frame<'_>,
    registers: &mut RegisterFile,
    coils: &mut CoilFile,
) -> Dispatched {
    let function = frame.function();
    let mut register_written = None;

    let result = match FunctionCode::try_from(function) {
        Ok(FunctionCode::ReadCoils | FunctionCode::ReadDiscreteInputs) => read_coils(frame, coils),
        Ok(FunctionCode::ReadHoldingRegisters | FunctionCode::ReadInputRegisters) => {
            read_registers(frame, registers)
        }
        Ok(FunctionCode::WriteSingleRegister) => {
            write_single_register(frame, registers).map(|(response, id)| {
                register_written = Some(id);
                response
            })
        }
        Ok(FunctionCode::WriteMultipleRegisters) => write_multiple_registers(frame, registers),
        Ok(FunctionCode::WriteSingleCoil) => write_single_coil(frame, coils),
        Ok(FunctionCode::WriteMultipleCoils) => write_multiple_coils(frame, coils),
        Err(_) => Err(ExceptionCode::IllegalFunction),
    };

    let response = result.unwrap_or_else(|code| {
        log::info!("Function 0x{function:02x} answered with exception {code}");
        PendingResponse::exception(function, code)
    });

    Dispatched {
        response,
        register_written,
    }
}
