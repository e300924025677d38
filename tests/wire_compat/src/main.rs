fn main() {
    println!("Run `cargo test -p wire-compat` to execute wire compatibility tests.");
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::PathBuf;

    use killtrack_protocol::constants::REPORT_KILL_PATH;
    use killtrack_protocol::{
        BufferedKill, CLIENT_VERSION, COMMANDER_MODE, Heartbeat, HeartbeatResponse,
        KeyValidationRequest, KeyValidationResponse, KillReport, PlayerStatus,
        citizen_profile_url,
    };

    /// Returns the path to the fixtures directory.
    fn fixtures_dir() -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("fixtures")
    }

    /// Loads a fixture JSON file and returns it as a `serde_json::Value`.
    fn load_fixture(name: &str) -> serde_json::Value {
        let path = fixtures_dir().join(name);
        let data = fs::read_to_string(&path)
            .unwrap_or_else(|e| panic!("failed to read fixture {}: {e}", path.display()));
        serde_json::from_str(&data)
            .unwrap_or_else(|e| panic!("failed to parse fixture {}: {e}", path.display()))
    }

    /// Normalizes JSON values so that integer-valued floats compare equal.
    fn normalize_value(v: &serde_json::Value) -> serde_json::Value {
        match v {
            serde_json::Value::Number(n) => match n.as_f64() {
                Some(f) => serde_json::json!(f),
                None => v.clone(),
            },
            serde_json::Value::Object(map) => serde_json::Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), normalize_value(v)))
                    .collect(),
            ),
            serde_json::Value::Array(arr) => {
                serde_json::Value::Array(arr.iter().map(normalize_value).collect())
            }
            _ => v.clone(),
        }
    }

    /// Deserializes a fixture into a Rust type, re-serializes it, and compares
    /// the JSON values (order-independent comparison).
    fn roundtrip_test<T>(name: &str) -> T
    where
        T: serde::de::DeserializeOwned + serde::Serialize,
    {
        let fixture = load_fixture(name);
        let parsed: T = serde_json::from_value(fixture.clone())
            .unwrap_or_else(|e| panic!("failed to deserialize {name}: {e}"));
        let reserialized = serde_json::to_value(&parsed)
            .unwrap_or_else(|e| panic!("failed to re-serialize {name}: {e}"));

        assert_eq!(
            normalize_value(&fixture),
            normalize_value(&reserialized),
            "roundtrip mismatch for {name}:\n  fixture: {fixture}\n  rust:    {reserialized}"
        );
        parsed
    }

    #[test]
    fn fixture_kill_report() {
        let report: KillReport = roundtrip_test("kill_report.json");
        assert_eq!(report.client_ver, CLIENT_VERSION);
        assert_eq!(report.rsi_profile, citizen_profile_url(&report.victim));
        assert!(report.anonymize_state.enabled);
    }

    #[test]
    fn fixture_heartbeat() {
        let hb: Heartbeat = roundtrip_test("heartbeat.json");
        assert_eq!(hb, Heartbeat::new("Pilot", "AEGS_Gladius", PlayerStatus::Alive));
        assert_eq!(hb.mode, COMMANDER_MODE);
    }

    #[test]
    fn fixture_key_validation_request() {
        let req: KeyValidationRequest = roundtrip_test("key_validation_request.json");
        assert_eq!(req.player_name, "Pilot");
    }

    #[test]
    fn fixture_key_validation_response() {
        let resp: KeyValidationResponse = roundtrip_test("key_validation_response.json");
        assert_eq!(resp.expires_at.as_deref(), Some("2025-06-30T23:59:59.000000Z"));
        assert!(resp.error.is_none());

        let rejected: KeyValidationResponse = roundtrip_test("key_validation_error.json");
        assert!(rejected.expires_at.is_none());
        assert_eq!(rejected.error.as_deref(), Some("Invalid key"));
    }

    #[test]
    fn fixture_heartbeat_response() {
        let resp: HeartbeatResponse = roundtrip_test("heartbeat_response.json");
        assert_eq!(resp.commanders.len(), 2);
        assert_eq!(resp.commanders[1].status, PlayerStatus::Dead);
    }

    #[test]
    fn fixture_buffered_kills() {
        let buffered: Vec<BufferedKill> = roundtrip_test("buffered_kills.json");
        assert_eq!(buffered.len(), 1);
        assert_eq!(buffered[0].endpoint, REPORT_KILL_PATH);
        assert_eq!(buffered[0].kill_result.killers_ship, "N/A");
    }
}
