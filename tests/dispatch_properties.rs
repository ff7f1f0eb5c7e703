//! Dispatch behaviour shared by every driver, checked end to end against the mock
//! transport.

use dcps::adapters::{MockTransport, WireEvent};
use dcps::instrument::{
    DriverKind, GenericScpi, Keithley2182, Keithley622x, KoradKa, PowerSupply,
};
use dcps::scpi::{parse_bool, resolve, Capability, DriverProfile, SCPI_BASE};
use dcps::DcpsError;
use std::time::Duration;

fn attach<D: PowerSupply>(mut driver: D) -> (D, MockTransport) {
    let mock = MockTransport::new();
    driver.attach(Box::new(mock.clone())).unwrap();
    mock.clear_events();
    (driver, mock)
}

#[test]
fn override_entries_take_precedence() {
    for kind in DriverKind::ALL {
        let profile = kind.profile();
        for key in profile.overrides.keys() {
            let resolved = resolve(&SCPI_BASE, Some(&profile.overrides), key).unwrap();
            assert_eq!(
                Some(resolved),
                profile.overrides.get(key),
                "{} override for '{}'",
                kind,
                key
            );
        }
    }
}

#[test]
fn base_entries_fill_the_gaps() {
    for kind in DriverKind::ALL {
        let profile = kind.profile();
        for key in SCPI_BASE.keys().filter(|k| profile.overrides.get(k).is_none()) {
            let resolved = resolve(&SCPI_BASE, Some(&profile.overrides), key).unwrap();
            assert_eq!(Some(resolved), SCPI_BASE.get(key), "{} fallback for '{}'", kind, key);
        }
    }
}

#[test]
fn unknown_key_is_an_error() {
    let profile = DriverKind::Generic.profile();
    let err = resolve(&SCPI_BASE, Some(&profile.overrides), "setFluxCapacitor").unwrap_err();
    assert!(matches!(err, DcpsError::UnknownCommand(key) if key == "setFluxCapacitor"));
}

#[test]
fn valid_channel_becomes_current() {
    let (mut psu, mock) = attach(GenericScpi::with_channels("TCPIP0::10.0.0.1::5025::SOCKET", 3).unwrap());
    for ch in 1..=3 {
        psu.set_channel(ch).unwrap();
        assert_eq!(psu.channel(), ch);
    }
    mock.clear_events();
    psu.set_channel(2).unwrap();
    psu.set_voltage(1.0, None, Some(Duration::ZERO)).unwrap();
    assert_eq!(
        mock.writes(),
        vec!["INSTrument:NSELect 2", "SOURce:VOLTage:LEVel:IMMediate:AMPLitude 1.0"]
    );
}

#[test]
fn invalid_channel_transmits_nothing() {
    let (mut psu, mock) = attach(GenericScpi::with_channels("TCPIP0::10.0.0.1::5025::SOCKET", 3).unwrap());
    for ch in [0u8, 4, 255] {
        assert!(matches!(
            psu.set_channel(ch),
            Err(DcpsError::InvalidChannel { max: 3, .. })
        ));
        assert!(psu.set_voltage(5.0, Some(ch), None).is_err());
        assert!(psu.measure_current(Some(ch)).is_err());
    }
    assert!(mock.events().is_empty());
    assert_eq!(psu.channel(), 1);
}

#[test]
fn boolean_tokens() {
    for token in ["ON", "1", "YES", "on", " 1\n"] {
        assert!(parse_bool(token), "{:?}", token);
    }
    for token in ["OFF", "0", "NO", "", "MAYBE", "2"] {
        assert!(!parse_bool(token), "{:?}", token);
    }
}

#[test]
fn range_helper_auto_and_bounded() {
    let (mut psu, mock) = attach(GenericScpi::new("TCPIP0::10.0.0.1::5025::SOCKET"));
    psu.set_voltage_range(None, None, Some(Duration::ZERO)).unwrap();
    assert_eq!(mock.writes(), vec!["SOURce1:VOLTage:RANGe:AUTO ON"]);

    mock.clear_events();
    psu.set_measure_current_range(Some(0.012_5), None, Some(Duration::ZERO))
        .unwrap();
    assert_eq!(
        mock.writes(),
        vec!["SENSe1:CURRent:RANGe:AUTO OFF", "SENSe1:CURRent:RANGe 0.0125"]
    );
}

#[test]
fn absent_capabilities_are_silent() {
    let (mut source, mock) = attach(Keithley622x::new("TCPIP0::10.0.0.9::5025::SOCKET"));
    source.set_voltage(5.0, None, None).unwrap();
    assert_eq!(source.query_voltage(None).unwrap(), None);
    assert_eq!(source.measure_power(None).unwrap(), None);
    source.set_function("VOLT", None, None).unwrap();
    let power = source.measure_power(None).unwrap();
    assert!(source.profile().legacy_value(power).is_nan());

    let (mut meter, meter_mock) = attach(Keithley2182::new("TCPIP0::10.0.0.7::5025::SOCKET"));
    meter.output_on(Some(2), None).unwrap();
    meter.set_current(0.1, None, None).unwrap();
    assert_eq!(meter.query_current_protection(Some(1)).unwrap(), None);
    let power = meter.measure_power(None).unwrap();
    assert_eq!(
        meter.profile().legacy_value(power),
        dcps::instrument::keithley2182::NAN_2182
    );

    assert!(mock.events().is_empty());
    assert!(meter_mock.events().is_empty());
}

#[test]
fn capability_set_matches_behaviour() {
    let korad = KoradKa::profile();
    assert!(!korad.capabilities.supports(Capability::Input));
    assert!(korad.capabilities.supports(Capability::Output));

    let (mut psu, mock) = attach(KoradKa::new("ASRL1::INSTR"));
    psu.input_on(None, None).unwrap();
    assert_eq!(psu.is_input_on(None).unwrap(), None);
    assert!(mock.events().is_empty());
}

#[test]
fn single_channel_output_on() {
    let (mut psu, mock) = attach(GenericScpi::new("TCPIP0::10.0.0.1::5025::SOCKET"));
    psu.output_on(None, None).unwrap();
    assert_eq!(
        mock.events(),
        vec![
            WireEvent::Write("OUTPut:STATe ON".into()),
            WireEvent::Settle(GenericScpi::profile().wait),
        ]
    );
}

#[test]
fn three_channel_set_voltage() {
    let (mut psu, mock) = attach(GenericScpi::with_channels("TCPIP0::10.0.0.1::5025::SOCKET", 3).unwrap());
    psu.set_voltage(5.0, Some(2), None).unwrap();
    assert_eq!(
        mock.writes(),
        vec!["INSTrument:NSELect 2", "SOURce:VOLTage:LEVel:IMMediate:AMPLitude 5.0"]
    );
}

#[test]
fn custom_profile_prefix_rules() {
    let profile = DriverProfile::new("Prefixed").prefix(":");
    let (mut psu, mock) = attach(GenericScpi::with_profile(profile, "TCPIP0::10.0.0.1::5025::SOCKET"));
    psu.rst(Some(Duration::ZERO)).unwrap();
    psu.beeper_off().unwrap();
    assert_eq!(mock.writes(), vec!["*RST", ":SYSTem:BEEPer:STATe OFF"]);
}

#[test]
fn reply_that_is_not_a_number() {
    let (mut psu, mock) = attach(GenericScpi::new("TCPIP0::10.0.0.1::5025::SOCKET"));
    mock.push_reply("-222,\"Data out of range\"");
    let err = psu.measure_voltage(None).unwrap_err();
    assert!(matches!(err, DcpsError::Parse { .. }));
}

#[test]
fn timeout_propagates() {
    let (mut psu, mock) = attach(GenericScpi::new("TCPIP0::10.0.0.1::5025::SOCKET"));
    mock.push_timeout();
    assert!(psu.idn().unwrap_err().is_timeout());
}
