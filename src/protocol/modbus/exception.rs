use num_enum::{IntoPrimitive, TryFromPrimitive};
use strum::{Display, EnumIter};

/// Function codes this slave answers. Discrete inputs and input registers
/// are served from the coil and register files respectively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum FunctionCode {
    ReadCoils = 0x01,
    ReadDiscreteInputs = 0x02,
    ReadHoldingRegisters = 0x03,
    ReadInputRegisters = 0x04,
    WriteSingleCoil = 0x05,
    WriteSingleRegister = 0x06,
    WriteMultipleCoils = 0x0F,
    WriteMultipleRegisters = 0x10,
}

/// Modbus exception codes carried in the second byte of an exception reply.
///
/// Only the first three are produced by the handlers; the rest belong to the
/// protocol vocabulary and stay available for callers building their own
/// responses.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Display, EnumIter, IntoPrimitive, TryFromPrimitive,
)]
#[repr(u8)]
pub enum ExceptionCode {
    IllegalFunction = 0x01,
    IllegalDataAddress = 0x02,
    IllegalDataValue = 0x03,
    SlaveDeviceFailure = 0x04,
    Acknowledge = 0x05,
    SlaveDeviceBusy = 0x06,
}

impl std::error::Error for ExceptionCode {}

/// Build the exception PDU (function byte with the high bit set, then the code).
pub fn exception_pdu(function: u8, code: ExceptionCode) -> [u8; 2] {
    [function | 0x80, code.into()]
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn test_exception_pdu_sets_high_bit() {
        assert_eq!(
            exception_pdu(0x05, ExceptionCode::IllegalDataAddress),
            [0x85, 0x02]
        );
        // Unknown function codes are echoed the same way
        assert_eq!(exception_pdu(0x2B, ExceptionCode::IllegalFunction), [0xAB, 0x01]);
    }

    #[test]
    fn test_exception_codes_are_contiguous() {
        let codes: Vec<u8> = ExceptionCode::iter().map(u8::from).collect();
        assert_eq!(codes, vec![1, 2, 3, 4, 5, 6]);
        assert_eq!(
            ExceptionCode::try_from(0x06).ok(),
            Some(ExceptionCode::SlaveDeviceBusy)
        );
        assert!(ExceptionCode::try_from(0x07).is_err());
    }

    #[test]
    fn test_function_code_lookup() {
        assert_eq!(
            FunctionCode::try_from(0x10).ok(),
            Some(FunctionCode::WriteMultipleRegisters)
        );
        assert!(FunctionCode::try_from(0x08).is_err());
        assert!(FunctionCode::try_from(0x00).is_err());
    }
}
