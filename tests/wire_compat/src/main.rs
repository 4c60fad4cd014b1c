fn main() {
    println!("Run `cargo test -p wire-compat` to execute hub wire compatibility tests.");
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::PathBuf;

    use hearthlink_protocol::{
        DeviceCatalog, DeviceId, HubCommand, InboundFrame, ProtocolKind, SwitchState,
        heartbeat_record, parse_record,
    };

    /// Loads `fixtures/<name>` as JSON.
    fn load_fixture(name: &str) -> serde_json::Value {
        let path = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
            .join("fixtures")
            .join(name);
        let data = fs::read_to_string(&path)
            .unwrap_or_else(|e| panic!("failed to read fixture {}: {e}", path.display()));
        serde_json::from_str(&data)
            .unwrap_or_else(|e| panic!("failed to parse fixture {}: {e}", path.display()))
    }

    /// Decodes a fixture and checks that encoding it again gives the same JSON.
    fn roundtrip_test<T>(name: &str) -> T
    where
        T: serde::de::DeserializeOwned + serde::Serialize,
    {
        let fixture = load_fixture(name);
        let parsed: T = serde_json::from_value(fixture.clone())
            .unwrap_or_else(|e| panic!("failed to deserialize {name}: {e}"));
        let reencoded = serde_json::to_value(&parsed).unwrap();
        assert_eq!(fixture, reencoded, "roundtrip mismatch for {name}");
        parsed
    }

    /// A fixture rendered as one compact wire record.
    fn record(name: &str) -> String {
        load_fixture(name).to_string()
    }

    // --- Outbound commands ---

    #[test]
    fn identify_matches_hub_handshake() {
        let parsed = roundtrip_test::<HubCommand>("identify.json");
        assert_eq!(parsed, HubCommand::identify());

        let line = HubCommand::identify().encode().unwrap();
        assert!(line.ends_with('\n'));
        let ours: serde_json::Value = serde_json::from_str(line.trim_end()).unwrap();
        assert_eq!(ours, load_fixture("identify.json"));
    }

    #[test]
    fn control_matches_hub_command() {
        let parsed = roundtrip_test::<HubCommand>("control.json");
        assert_eq!(
            parsed,
            HubCommand::control(DeviceId::new("7"), SwitchState::On)
        );

        let off = serde_json::to_value(HubCommand::control("7".into(), SwitchState::Off)).unwrap();
        assert_eq!(off["code"]["state"], "off");
    }

    #[test]
    fn commands_are_single_records() {
        for command in [
            HubCommand::identify(),
            HubCommand::control("lamp".into(), SwitchState::On),
        ] {
            let line = command.encode().unwrap();
            assert_eq!(line.matches('\n').count(), 1, "embedded newline in {line:?}");
        }
    }

    // --- Inbound records ---

    #[test]
    fn heartbeat_tokens() {
        assert_eq!(heartbeat_record(), "HEART\n");
        assert_eq!(parse_record("BEAT").unwrap(), InboundFrame::Heartbeat);
        assert_eq!(parse_record("BEAT\n").unwrap(), InboundFrame::Heartbeat);
    }

    #[test]
    fn update_record_decodes() {
        let InboundFrame::Update(update) = parse_record(&record("update.json")).unwrap() else {
            panic!("expected update frame");
        };
        assert_eq!(update.devices, vec![DeviceId::new("lamp"), DeviceId::new("porch")]);
        assert_eq!(update.values["state"], "off");
        assert_eq!(update.values["timestamp"], 1492352220);
    }

    #[test]
    fn non_update_records_are_not_dispatched() {
        let mut config = load_fixture("update.json");
        config["origin"] = "config".into();
        assert!(matches!(
            parse_record(&config.to_string()).unwrap(),
            InboundFrame::Other { origin: Some(ref o) } if o == "config"
        ));
    }

    // --- Catalog ---

    #[test]
    fn catalog_roundtrip() {
        let catalog = roundtrip_test::<DeviceCatalog>("catalog.json");

        let keys: Vec<&str> = catalog.entries().iter().map(|(k, _)| *k).collect();
        assert_eq!(keys, vec!["lamp", "weather", "clock"]);

        let lamp = catalog.device("lamp").unwrap();
        assert_eq!(lamp.state(), Some("on"));
        assert_eq!(
            ProtocolKind::from_protocol(&lamp.protocol[0]),
            Some(ProtocolKind::Switch)
        );

        let weather = catalog.device("weather").unwrap();
        assert_eq!(weather.number("temperature"), Some(21.5));
        assert_eq!(weather.number("humidity"), Some(40.0));
        assert_eq!(
            ProtocolKind::from_protocol(&weather.protocol[0]),
            Some(ProtocolKind::TemperatureHumiditySensor)
        );

        let clock = catalog.device("clock").unwrap();
        assert_eq!(ProtocolKind::from_protocol(&clock.protocol[0]), None);
    }
}
