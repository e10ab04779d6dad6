use shutter_config::load_toml;
use rstest::rstest;

fn config_with_device(device: &str) -> String {
    format!(
        r#"
[hub]
name = "main"
host = "127.0.0.1"
port = 1502

[control]
poll_ms = 100
settle_ms = 300

[devices.kitchen]
{device}
"#
    )
}

#[test]
fn accepts_realistic_config() {
    let toml = r#"
[hub]
name = "main"
host = "192.168.1.40"

[control]
poll_ms = 50
settle_ms = 250

[logging]
level = "debug"
rotation = "daily"

[state]
file = "var/state.json"

[devices.living_room]
name = "Living room"
slave = 1
coil_open = 16
coil_close = 17
travel_up = 25
travel_down = 22.5

[devices.garage]
slave = 2
coil_open = 0
coil_close = 1
travel_up = 14
travel_down = 14
"#;

    let cfg = load_toml(toml).expect("parse TOML");
    cfg.validate().expect("valid config should pass");
    assert_eq!(cfg.devices.len(), 2);
    let lr = cfg.device("living_room").expect("device");
    assert_eq!(lr.display_name("living_room"), "Living room");
    assert_eq!(lr.travel_down, 22.5);
    assert_eq!(cfg.state.file.as_deref(), Some("var/state.json"));
}

#[rstest]
#[case("slave = 0\ncoil_open = 1\ncoil_close = 2", "slave must be in [1, 247]")]
#[case("slave = 248\ncoil_open = 1\ncoil_close = 2", "slave must be in [1, 247]")]
#[case("slave = 1\ncoil_open = 5\ncoil_close = 5", "coil_open and coil_close must differ")]
#[case("slave = 1\ncoil_open = 1\ncoil_close = 2\ntravel_up = 0", "travel_up must be > 0")]
#[case("slave = 1\ncoil_open = 1\ncoil_close = 2\ntravel_down = -3.5", "travel_down must be > 0")]
fn rejects_bad_devices(#[case] device: &str, #[case] needle: &str) {
    let cfg = load_toml(&config_with_device(device)).expect("parse TOML");
    let err = cfg.validate().expect_err("should reject");
    assert!(
        format!("{err}").contains(needle),
        "expected '{needle}' in '{err}'"
    );
}

#[rstest]
#[case("[hub]\nname = \"\"\nhost = \"h\"", "hub.name must not be empty")]
#[case("[hub]\nname = \"m\"\nhost = \"h\"\nport = 0", "hub.port must be > 0")]
#[case("[hub]\nname = \"m\"\nhost = \"h\"\ntimeout_ms = 0", "hub.timeout_ms must be >= 1")]
#[case(
    "[hub]\nname = \"m\"\nhost = \"h\"\n[control]\npoll_ms = 0",
    "control.poll_ms must be in"
)]
#[case(
    "[hub]\nname = \"m\"\nhost = \"h\"\n[control]\nsettle_ms = 60000",
    "control.settle_ms must be in"
)]
#[case(
    "[hub]\nname = \"m\"\nhost = \"h\"\n[control]\nsettle_ms = 0",
    "control.settle_ms must be in [1,"
)]
#[case(
    "[hub]\nname = \"m\"\nhost = \"h\"\n[logging]\nrotation = \"weekly\"",
    "logging.rotation must be one of"
)]
fn rejects_bad_hub_and_control(#[case] toml: &str, #[case] needle: &str) {
    let cfg = load_toml(toml).expect("parse TOML");
    let err = cfg.validate().expect_err("should reject");
    assert!(
        format!("{err}").contains(needle),
        "expected '{needle}' in '{err}'"
    );
}

#[test]
fn missing_hub_is_a_parse_error() {
    let err = load_toml("[control]\npoll_ms = 100\n").expect_err("hub is required");
    assert!(err.to_string().contains("hub"));
}

#[test]
fn missing_coils_is_a_parse_error() {
    let err = load_toml(&config_with_device("slave = 1\ncoil_open = 1")).expect_err("coil_close");
    assert!(err.to_string().contains("coil_close"));
}

#[test]
fn loads_from_file_on_disk() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("shutter.toml");
    std::fs::write(
        &path,
        config_with_device("slave = 3\ncoil_open = 7\ncoil_close = 8"),
    )
    .expect("write");
    let text = std::fs::read_to_string(&path).expect("read");
    let cfg = load_toml(&text).expect("parse");
    cfg.validate().expect("valid");
    assert_eq!(cfg.device("kitchen").expect("kitchen").slave, 3);
}
