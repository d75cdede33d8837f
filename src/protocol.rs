use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value};

use crate::types::*;
use crate::{Error, Result};

pub const DEFAULT_BASE_URL: &str = "https://salus-it500.com";

pub const LOGIN_PATH: &str = "/public/login.php";
pub const CONTROL_PATH: &str = "/public/control.php";
pub const DEVICE_VALUES_PATH: &str = "/public/ajax_device_values.php";
pub const SET_PATH: &str = "/includes/set.php";

/// Key whose presence marks a usable device values payload.
const VALIDITY_KEY: &str = "CH1autoOff";
const SETPOINT_KEY: &str = "CH1currentSetPoint";
const ROOM_TEMP_KEY: &str = "CH1currentRoomTemp";
const FROST_KEY: &str = "frost";

static TOKEN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<input[^>]*\sid="token"[^>]*\svalue="([^"]*)""#).expect("token pattern is valid")
});

pub type Form = Vec<(&'static str, String)>;

pub fn login_form(username: &str, password: &str) -> Form {
    vec![
        ("IDemail", username.to_string()),
        ("password", password.to_string()),
        ("login", "Login".to_string()),
        ("keep_logged_in", "1".to_string()),
    ]
}

pub fn control_query(device_id: &str) -> Form {
    vec![("devId", device_id.to_string())]
}

/// `_` is a cache buster; the server ignores its value.
pub fn device_values_query(device_id: &str, token: &str, timestamp_ms: i64) -> Form {
    vec![
        ("devId", device_id.to_string()),
        ("token", token.to_string()),
        ("_", timestamp_ms.to_string()),
    ]
}

/// A write to `/includes/set.php`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Command {
    Off,
    Auto,
    Manual(Temperature),
}

impl Command {
    pub fn action(&self) -> &'static str {
        match self {
            Command::Off => "set_off",
            Command::Auto => "set_auto",
            Command::Manual(_) => "set_manual_temperature",
        }
    }

    pub fn mode(&self) -> OperatingMode {
        match self {
            Command::Off => OperatingMode::Off,
            Command::Auto => OperatingMode::Auto,
            Command::Manual(_) => OperatingMode::Manual,
        }
    }

    pub fn form(&self, token: &str, device_id: &str) -> Form {
        let mut form = vec![("token", token.to_string()), ("devId", device_id.to_string())];
        match self {
            Command::Off => {
                form.push(("auto", "1".to_string()));
                form.push(("auto_setZ1", "1".to_string()));
            }
            Command::Auto => {
                form.push(("auto", "0".to_string()));
                form.push(("auto_setZ1", "1".to_string()));
            }
            Command::Manual(temp) => {
                form.push(("tempUnit", "0".to_string()));
                form.push(("current_tempZ1_set", "1".to_string()));
                form.push(("current_tempZ1", temp.to_salus_string()));
            }
        }
        form
    }
}

/// Pull the session token out of the control page HTML.
pub fn extract_token(html: &str) -> Result<String> {
    TOKEN_RE
        .captures(html)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .filter(|token| !token.is_empty())
        .ok_or(Error::TokenNotFound)
}

/// Fields of one valid device values payload.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub current_temperature: Temperature,
    pub target_temperature: Temperature,
    pub frost_setpoint: Temperature,
    pub flags: Flags,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DeviceValues {
    Valid(Snapshot),
    /// Well-formed JSON without a usable `CH1autoOff`; the device is offline
    /// or the token was not accepted.
    Invalid,
}

pub fn parse_device_values(body: &str) -> Result<DeviceValues> {
    if body.trim().is_empty() {
        return Err(Error::EmptyResponse);
    }
    let parsed: Value = serde_json::from_str(body)?;
    let obj = match parsed {
        Value::Object(map) => map,
        other => {
            return Err(Error::MalformedResponse(format!(
                "expected JSON object, got {}",
                type_name(&other)
            )));
        }
    };

    let valid = match obj.get(VALIDITY_KEY) {
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Number(_)) => true,
        _ => false,
    };
    if !valid {
        return Ok(DeviceValues::Invalid);
    }

    let read_flag = |flag: Flag| parse_flag(obj.get(flag.key()));
    let flags = Flags {
        auto_off: read_flag(Flag::AutoOff),
        manual: read_flag(Flag::Manual),
        schedule_type: read_flag(Flag::ScheduleType),
        heat_on_off_status: read_flag(Flag::HeatOnOffStatus),
        auto_mode: read_flag(Flag::AutoMode),
        heat_on_off: read_flag(Flag::HeatOnOff),
        frost_active: read_flag(Flag::FrostActive),
    };

    Ok(DeviceValues::Valid(Snapshot {
        current_temperature: Temperature::from_celsius(read_number(&obj, ROOM_TEMP_KEY)?),
        target_temperature: Temperature::from_celsius(read_number(&obj, SETPOINT_KEY)?),
        frost_setpoint: Temperature::from_celsius(read_number(&obj, FROST_KEY)?),
        flags,
    }))
}

/// `"1"`/`1` is set, `"0"`/`0` is clear, anything else is unknown.
fn parse_flag(value: Option<&Value>) -> Option<bool> {
    match value? {
        Value::String(s) => match s.trim() {
            "1" => Some(true),
            "0" => Some(false),
            _ => None,
        },
        Value::Number(n) => match n.as_u64() {
            Some(1) => Some(true),
            Some(0) => Some(false),
            _ => None,
        },
        Value::Bool(b) => Some(*b),
        _ => None,
    }
}

/// Missing numbers read as zero, matching the web app.
fn read_number(obj: &Map<String, Value>, key: &str) -> Result<f64> {
    match obj.get(key) {
        None | Some(Value::Null) => Ok(0.0),
        Some(Value::Number(n)) => n
            .as_f64()
            .ok_or_else(|| Error::MalformedResponse(format!("{key}: not a float"))),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(0.0),
        Some(Value::String(s)) => s
            .trim()
            .parse()
            .map_err(|_| Error::MalformedResponse(format!("{key}: not a number: {s:?}"))),
        Some(other) => Err(Error::MalformedResponse(format!(
            "{key}: unexpected {}",
            type_name(other)
        ))),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn value<'a>(form: &'a Form, key: &str) -> Option<&'a str> {
        form.iter().find(|(k, _)| *k == key).map(|(_, v)| v.as_str())
    }

    #[test]
    fn login_form_fields() {
        let form = login_form("a@b.com", "x");
        assert_eq!(value(&form, "IDemail"), Some("a@b.com"));
        assert_eq!(value(&form, "password"), Some("x"));
        assert_eq!(value(&form, "login"), Some("Login"));
        assert_eq!(value(&form, "keep_logged_in"), Some("1"));
    }

    #[test]
    fn command_forms() {
        let off = Command::Off.form("tok", "dev1");
        assert_eq!(value(&off, "token"), Some("tok"));
        assert_eq!(value(&off, "devId"), Some("dev1"));
        assert_eq!(value(&off, "auto"), Some("1"));
        assert_eq!(value(&off, "auto_setZ1"), Some("1"));

        let auto = Command::Auto.form("tok", "dev1");
        assert_eq!(value(&auto, "auto"), Some("0"));
        assert_eq!(value(&auto, "auto_setZ1"), Some("1"));

        let manual = Command::Manual(Temperature::from_celsius(21.5)).form("tok", "dev1");
        assert_eq!(value(&manual, "tempUnit"), Some("0"));
        assert_eq!(value(&manual, "current_tempZ1_set"), Some("1"));
        assert_eq!(value(&manual, "current_tempZ1"), Some("21.5"));
        assert_eq!(value(&manual, "auto"), None);
    }

    #[test]
    fn token_from_control_page() {
        let html = r#"<form><input id="token" type="hidden" value="abc123" /></form>"#;
        assert_eq!(extract_token(html).unwrap(), "abc123");
    }

    #[test]
    fn token_with_reordered_attributes() {
        let html = r#"<input type="hidden" id="token" name="token" value="f00d" >"#;
        assert_eq!(extract_token(html).unwrap(), "f00d");
    }

    #[test]
    fn token_ignores_data_attributes() {
        let html = r#"<input data-id="token" value="decoy"><input type="hidden" id="token" data-value="x" value="real">"#;
        assert_eq!(extract_token(html).unwrap(), "real");
    }

    #[test]
    fn token_missing() {
        assert!(matches!(extract_token("<html>login</html>"), Err(Error::TokenNotFound)));
        let empty = r#"<input id="token" type="hidden" value="" />"#;
        assert!(matches!(extract_token(empty), Err(Error::TokenNotFound)));
    }

    #[test]
    fn parse_auto_snapshot() {
        let body = r#"{"CH1autoOff":"0","CH1heatOnOff":"0","CH1currentSetPoint":"21.0","CH1currentRoomTemp":"19.5"}"#;
        let DeviceValues::Valid(snapshot) = parse_device_values(body).unwrap() else {
            panic!("expected valid payload");
        };
        assert_eq!(snapshot.target_temperature.celsius(), 21.0);
        assert_eq!(snapshot.current_temperature.celsius(), 19.5);
        assert_eq!(snapshot.frost_setpoint.celsius(), 0.0);
        assert_eq!(snapshot.flags.auto_off, Some(false));
        assert_eq!(snapshot.flags.heat_on_off, Some(false));
        assert_eq!(snapshot.flags.manual, None);
    }

    #[test]
    fn empty_auto_off_is_invalid() {
        assert_eq!(parse_device_values(r#"{"CH1autoOff":""}"#).unwrap(), DeviceValues::Invalid);
        assert_eq!(parse_device_values(r#"{"CH1currentRoomTemp":"20"}"#).unwrap(), DeviceValues::Invalid);
    }

    #[test]
    fn empty_and_malformed_bodies() {
        assert!(matches!(parse_device_values(""), Err(Error::EmptyResponse)));
        assert!(matches!(parse_device_values("  \n"), Err(Error::EmptyResponse)));
        assert!(matches!(parse_device_values("<html>"), Err(Error::MalformedResponse(_))));
        assert!(matches!(parse_device_values("[1,2]"), Err(Error::MalformedResponse(_))));
    }

    #[test]
    fn unparseable_temperature_is_malformed() {
        let body = r#"{"CH1autoOff":"1","CH1currentRoomTemp":"warm"}"#;
        assert!(matches!(parse_device_values(body), Err(Error::MalformedResponse(_))));
    }

    #[test]
    fn numeric_fields_accepted() {
        let body = r#"{"CH1autoOff":1,"CH1heatOnOff":1,"CH1currentSetPoint":22.5,"frost":"7.0"}"#;
        let DeviceValues::Valid(snapshot) = parse_device_values(body).unwrap() else {
            panic!("expected valid payload");
        };
        assert_eq!(snapshot.flags.auto_off, Some(true));
        assert_eq!(snapshot.flags.heat_on_off, Some(true));
        assert_eq!(snapshot.target_temperature.celsius(), 22.5);
        assert_eq!(snapshot.frost_setpoint.celsius(), 7.0);
    }

    #[test]
    fn device_values_query_fields() {
        let query = device_values_query("dev1", "tok", 1_700_000_000_000);
        assert_eq!(value(&query, "devId"), Some("dev1"));
        assert_eq!(value(&query, "token"), Some("tok"));
        assert_eq!(value(&query, "_"), Some("1700000000000"));
    }
}
