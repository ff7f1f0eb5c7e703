//! Set-then-query round trips against an echoing mock, for every driver that can both
//! program and read back its setpoints.

use dcps::adapters::MockTransport;
use dcps::instrument::{
    AimTtiPlp, Bk9115, GenericScpi, It6500c, Keithley2400, KeysightE364xA, PowerSupply,
    RigolDl3000,
};
use std::time::Duration;

const VALUES: [f64; 5] = [0.0, -1.5, 5.0, 1.234_567_890_123, 3.3e-7];

fn check_round_trip(name: &str, mut driver: Box<dyn PowerSupply>, mock: MockTransport) {
    driver.attach(Box::new(mock)).unwrap();
    for v in VALUES {
        driver.set_voltage(v, None, Some(Duration::ZERO)).unwrap();
        assert_eq!(driver.query_voltage(None).unwrap(), Some(v), "{} voltage {}", name, v);
        driver.set_current(v, None, Some(Duration::ZERO)).unwrap();
        assert_eq!(driver.query_current(None).unwrap(), Some(v), "{} current {}", name, v);
    }
}

#[test]
fn scpi_drivers_round_trip() {
    let drivers: Vec<(&str, Box<dyn PowerSupply>)> = vec![
        ("generic", Box::new(GenericScpi::new("TCPIP0::10.0.0.1::5025::SOCKET"))),
        ("bk9115", Box::new(Bk9115::new("TCPIP0::10.0.0.2::5025::SOCKET"))),
        ("rigol", Box::new(RigolDl3000::new("TCPIP0::10.0.0.3::5025::SOCKET"))),
        ("it6500c", Box::new(It6500c::new("TCPIP0::10.0.0.4::5025::SOCKET"))),
        ("k2400", Box::new(Keithley2400::new("TCPIP0::10.0.0.5::5025::SOCKET"))),
    ];
    for (name, driver) in drivers {
        check_round_trip(name, driver, MockTransport::new().echo_last_value());
    }
}

#[test]
fn kiss488_driver_round_trip() {
    let psu = KeysightE364xA::new("TCPIP0::10.0.0.6::23::SOCKET");
    check_round_trip("e364xa", Box::new(psu), MockTransport::new().echo_last_value());
}

#[test]
fn decorated_replies_round_trip() {
    // The PL-P answers `V1?` with `V1 <value>`.
    let mock = MockTransport::new().echo_with(|verb, value| format!("{} {}", verb, value));
    let psu = AimTtiPlp::new("TCPIP0::10.0.0.7::9221::SOCKET");
    check_round_trip("aim tti", Box::new(psu), mock);
}

#[test]
fn round_trip_on_other_channel() {
    let mock = MockTransport::new().echo_with(|verb, value| format!("{} {}", verb, value));
    let mut psu = AimTtiPlp::new("TCPIP0::10.0.0.7::9221::SOCKET");
    psu.attach(Box::new(mock.clone())).unwrap();
    psu.set_voltage(12.25, Some(3), Some(Duration::ZERO)).unwrap();
    assert_eq!(psu.query_voltage(None).unwrap(), Some(12.25));
    assert_eq!(mock.writes(), vec!["V3 12.25", "V3?"]);
}
