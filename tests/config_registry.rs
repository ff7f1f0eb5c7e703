//! Configuration file to running driver.

use dcps::adapters::MockTransport;
use dcps::config::DcpsConfig;
use dcps::instrument::{registry, DriverKind};
use figment::providers::{Format, Toml};
use figment::Figment;
use std::io::Write;
use std::time::Duration;
use tempfile::NamedTempFile;

const BENCH: &str = r#"
[instruments.supply]
driver = "generic"
resource = "TCPIP0::10.0.0.1::5025::SOCKET"
channels = 2
wait = "10ms"

[instruments.smu]
driver = "keithley2400"
resource = "TCPIP0::10.0.0.2::1234::SOCKET"
gpib_address = 17
query_delay = "5ms"

[instruments.plp]
driver = "aim_tti_plp"
resource = "TCPIP0::10.0.0.3::INSTR"
warn_on_rewrite = false
"#;

fn load() -> DcpsConfig {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(BENCH.as_bytes()).unwrap();
    DcpsConfig::from_figment(Figment::from(Toml::file(file.path()))).unwrap()
}

#[test]
fn configured_supply_uses_its_settings() {
    let config = load();
    assert_eq!(config.instruments.len(), 3);

    let mut supply = registry::build(config.instrument("supply").unwrap()).unwrap();
    let mock = MockTransport::new();
    supply.attach(Box::new(mock.clone())).unwrap();
    supply.output_on_all(None).unwrap();
    assert_eq!(
        mock.writes(),
        vec![
            "INSTrument:NSELect 1",
            "OUTPut:STATe ON",
            "INSTrument:NSELect 2",
            "OUTPut:STATe ON"
        ]
    );
    assert_eq!(mock.settles(), vec![Duration::from_millis(10)]);
}

#[test]
fn configured_gpib_address_reaches_prologix() {
    let config = load();
    let mut smu = registry::build(config.instrument("smu").unwrap()).unwrap();
    let mock = MockTransport::new().with_reply("Prologix GPIB-ETHERNET Controller version 01.06.06.00");
    smu.attach(Box::new(mock.clone())).unwrap();
    assert!(mock.writes().contains(&"++addr 17".to_string()));

    mock.push_reply("KEITHLEY INSTRUMENTS INC.,MODEL 2400,1234567,C30");
    let idn = smu.idn().unwrap();
    assert!(idn.contains("MODEL 2400"));
    assert_eq!(mock.writes().last().unwrap(), "*IDN?\n++read eoi");
    assert_eq!(mock.settles().last(), Some(&Duration::from_millis(5)));
}

#[test]
fn configured_discovery_address_is_rewritten() {
    let config = load();
    let settings = config.instrument("plp").unwrap();
    assert_eq!(settings.driver, DriverKind::AimTtiPlp);
    let plp = registry::build(settings).unwrap();
    assert_eq!(plp.scpi().resource(), "TCPIP::10.0.0.3::9221::SOCKET");
    assert_eq!(plp.scpi().channels(), 3);
}
