#![allow(clippy::unwrap_used)]

use std::path::Path;
use std::time::Duration;

use figment::Jail;
use pretty_assertions::assert_eq;
use secrecy::ExposeSecret;

use proxyhost_config::{
    Config, ConfigError, InstanceEntry, Mode, load_config_from, resolve_key, save_config_to,
};

const SAMPLE: &str = r#"
mode = "profile"
active_profile = "home"

[ports]
http_proxy = 18080
socks5_proxy = 11080

[feed]
batch_ms = 250

[[profiles]]
id = "home"
name = "Home"
main_server_url = "https://home.example.com"

[[instances]]
name = "relay"
server_host = "relay.example.com"
server_port = 443
bind_address = "127.0.0.1:1080"
key = "plaintext-key"
"#;

fn entry() -> InstanceEntry {
    InstanceEntry {
        id: Some("relay-test-instance".into()),
        name: "relay".into(),
        enabled: true,
        use_websocket: false,
        server_host: "relay.example.com".into(),
        server_port: 443,
        bind_address: "127.0.0.1:1080".into(),
        key: None,
        key_env: None,
    }
}

#[test]
fn test_missing_file_yields_defaults() {
    Jail::expect_with(|_jail| {
        let config = load_config_from(Path::new("absent.toml")).map_err(|e| e.to_string())?;

        assert_eq!(config.mode, Mode::Instances);
        assert!(config.instances.is_empty());
        assert_eq!(config.ports.api_server, 3010);
        assert_eq!(config.feed.batch_ms, 100);
        Ok(())
    });
}

#[test]
fn test_file_and_environment_are_merged() {
    Jail::expect_with(|jail| {
        jail.create_file("config.toml", SAMPLE)?;
        jail.set_env("PROXYHOST_FEED__HISTORY", "25");
        jail.set_env("PROXYHOST_PORTS__API_SERVER", "4010");

        let config = load_config_from(Path::new("config.toml")).map_err(|e| e.to_string())?;
        assert_eq!(config.mode, Mode::Profile);
        assert_eq!(config.feed.batch_ms, 250);
        assert_eq!(config.feed.history, 25);

        let set = config.profile_set().map_err(|e| e.to_string())?;
        assert_eq!(set.http_proxy_port, 18080);
        assert_eq!(set.api_server_port, 4010);
        assert_eq!(set.enabled_profile().map(|p| p.name.as_str()), Some("Home"));

        let host = config.host_config().map_err(|e| e.to_string())?;
        assert_eq!(host.ingest.batch_window, Duration::from_millis(250));
        assert_eq!(host.ingest.history_capacity, 25);
        Ok(())
    });
}

#[test]
fn test_instance_id_defaults_to_name() {
    let config: Config = toml::from_str(SAMPLE).unwrap();
    let records = config.instance_records().unwrap();

    assert_eq!(records.len(), 1);
    assert_eq!(records[0].id.as_str(), "relay");
    assert_eq!(records[0].params.key.expose_secret(), "plaintext-key");
}

#[test]
fn test_env_key_wins_over_plaintext() {
    Jail::expect_with(|jail| {
        jail.set_env("RELAY_TEST_KEY", "from-env");
        let mut e = entry();
        e.key_env = Some("RELAY_TEST_KEY".into());
        e.key = Some("from-file".into());

        let key = resolve_key(&e).map_err(|e| e.to_string())?;
        assert_eq!(key.expose_secret(), "from-env");
        Ok(())
    });
}

#[test]
fn test_unset_env_falls_back_to_plaintext() {
    let mut e = entry();
    e.key_env = Some("PROXYHOST_TEST_SURELY_UNSET_KEY".into());
    e.key = Some("from-file".into());

    assert_eq!(resolve_key(&e).unwrap().expose_secret(), "from-file");
}

#[test]
fn test_no_key_anywhere_is_an_error() {
    let err = resolve_key(&entry()).unwrap_err();
    assert!(matches!(err, ConfigError::NoKey { instance } if instance == "relay-test-instance"));
}

#[test]
fn test_validate_reports_bad_selection_in_profile_mode() {
    let mut config: Config = toml::from_str(SAMPLE).unwrap();
    config.active_profile = Some("nowhere".into());
    assert!(matches!(config.validate(), Err(ConfigError::Validation { .. })));
}

#[test]
fn test_validate_rejects_duplicate_instance_ids() {
    let mut config: Config = toml::from_str(SAMPLE).unwrap();
    config.mode = Mode::Instances;
    config.instances.push(config.instances[0].clone());
    assert!(config.validate().is_err());
}

#[test]
fn test_saved_config_loads_back() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("config.toml");
    let config: Config = toml::from_str(SAMPLE).unwrap();

    save_config_to(&config, &path).unwrap();
    let loaded = load_config_from(&path).unwrap();

    assert_eq!(loaded.mode, Mode::Profile);
    assert_eq!(loaded.instances.len(), 1);
    assert_eq!(loaded.profiles[0].main_server_url, "https://home.example.com");
}
