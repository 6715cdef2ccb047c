mod common;

use anyhow::Result;
use rmodbus::{client::ModbusRequest, ErrorKind, ModbusProto};

use common::Harness;

fn master(unit: u8) -> ModbusRequest {
    ModbusRequest::new(unit, ModbusProto::Rtu)
}

#[test]
fn test_get_holdings() -> Result<()> {
    let mut harness = Harness::new();
    for (id, value) in [(4, 2345u16), (5, 4723), (6, 193)] {
        harness.engine.set_register(id, value);
    }

    let mut request = master(1);
    let mut raw = Vec::new();
    request.generate_get_holdings(4, 3, &mut raw)?;
    let response = harness.request(&raw).unwrap();

    let mut values = Vec::new();
    request.parse_u16(&response, &mut values)?;
    assert_eq!(values, vec![2345, 4723, 193]);
    Ok(())
}

#[test]
fn test_set_holding_and_bulk() -> Result<()> {
    let mut harness = Harness::new();

    let mut request = master(1);
    let mut raw = Vec::new();
    request.generate_set_holding(10, 1234, &mut raw)?;
    let response = harness.request(&raw).unwrap();
    request.parse_ok(&response)?;
    assert_eq!(harness.engine.get_register(10), 1234);

    let mut request = master(1);
    let mut raw = Vec::new();
    request.generate_set_holdings_bulk(14, &[7, 8, 9], &mut raw)?;
    let response = harness.request(&raw).unwrap();
    request.parse_ok(&response)?;
    assert_eq!(
        (14..17).map(|id| harness.engine.get_register(id)).collect::<Vec<_>>(),
        vec![7, 8, 9]
    );
    Ok(())
}

#[test]
fn test_read_only_register_rejected() -> Result<()> {
    let mut harness = Harness::new();

    let mut request = master(1);
    let mut raw = Vec::new();
    request.generate_set_holding(13, 1, &mut raw)?;
    let response = harness.request(&raw).unwrap();
    assert_eq!(
        request.parse_ok(&response).err().unwrap(),
        ErrorKind::IllegalDataAddress
    );

    // Bulk write stops at 28 but keeps 26 and 27
    let mut request = master(1);
    let mut raw = Vec::new();
    request.generate_set_holdings_bulk(26, &[1, 2, 3], &mut raw)?;
    let response = harness.request(&raw).unwrap();
    assert_eq!(
        request.parse_ok(&response).err().unwrap(),
        ErrorKind::IllegalDataAddress
    );
    assert_eq!(harness.engine.get_register(26), 1);
    assert_eq!(harness.engine.get_register(27), 2);
    assert_eq!(harness.engine.get_register(28), 0);
    Ok(())
}

#[test]
fn test_coils_round_trip() -> Result<()> {
    let mut harness = Harness::new();
    let coils = [
        true, true, true, false, true, true, false, true, true, false, true,
    ];

    // 9..=19 are all writable
    let mut request = master(1);
    let mut raw = Vec::new();
    request.generate_set_coils_bulk(9, &coils, &mut raw)?;
    let response = harness.request(&raw).unwrap();
    request.parse_ok(&response)?;

    let mut request = master(1);
    let mut raw = Vec::new();
    request.generate_get_coils(9, coils.len() as u16, &mut raw)?;
    let response = harness.request(&raw).unwrap();
    let mut result = Vec::new();
    request.parse_bool(&response, &mut result)?;
    assert_eq!(result, coils);
    Ok(())
}

#[test]
fn test_set_coil() -> Result<()> {
    let mut harness = Harness::new();

    let mut request = master(1);
    let mut raw = Vec::new();
    request.generate_set_coil(43, true, &mut raw)?;
    let response = harness.request(&raw).unwrap();
    request.parse_ok(&response)?;
    assert!(harness.engine.get_coil(43));

    let mut request = master(1);
    let mut raw = Vec::new();
    request.generate_set_coil(37, true, &mut raw)?;
    let response = harness.request(&raw).unwrap();
    assert_eq!(
        request.parse_ok(&response).err().unwrap(),
        ErrorKind::IllegalDataAddress
    );
    assert!(!harness.engine.get_coil(37));
    Ok(())
}

#[test]
fn test_coil_read_past_map_is_illegal_value() -> Result<()> {
    let mut harness = Harness::new();

    let mut request = master(1);
    let mut raw = Vec::new();
    request.generate_get_coils(40, 5, &mut raw)?;
    let response = harness.request(&raw).unwrap();
    assert_eq!(
        request.parse_ok(&response).err().unwrap(),
        ErrorKind::IllegalDataValue
    );
    Ok(())
}

#[test]
fn test_requests_for_other_units_ignored() -> Result<()> {
    let mut harness = Harness::new();

    let mut request = master(2);
    let mut raw = Vec::new();
    request.generate_get_holdings(0, 1, &mut raw)?;
    assert_eq!(harness.request(&raw), None);
    Ok(())
}
