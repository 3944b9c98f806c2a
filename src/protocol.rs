use serde::Deserialize;
use serde_json::{Map, Value, json};

use crate::types::*;
use crate::{Error, Result};

pub const LOGIN_PATH: &str = "login.cgi";
pub const LOGOUT_PATH: &str = "logout.cgi";
pub const MONITOR_PATH: &str = "getmondata.cgi";
pub const COMMAND_PATH: &str = "command.cgi";

pub const DATA_PATH: &str = "data";
pub const SET_MODE_PATH: &str = "set_mode";
pub const SET_TEMPERATURE_PATH: &str = "set_temperature";

pub const SUCCESS: &str = "0";
pub const ALREADY_LOGGED_IN: &str = "4";
pub const SESSION_INVALIDATED: &str = "-13";

pub const MONITOR_FORM: [(&str, &str); 2] = [("FunctionNo", "2"), ("Argument1", "-1")];

pub const COMMAND_FIELDS: usize = 35;

// Indices into one comma-separated monitoring record.
const CSV_UNIT: usize = 2;
const CSV_POWER: usize = 8;
const CSV_MODE: usize = 9;
const CSV_TEMP: usize = 17;
const CSV_FAN: usize = 18;
const CSV_LOUVER: usize = 20;

/// Status/command encoding used by the controller firmware.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WireFormat {
    /// `getmondata.cgi` CSV records and `command.cgi` positional commands.
    Csv,
    /// `data` JSON array and `set_mode`/`set_temperature` JSON commands.
    #[default]
    Json,
}

impl WireFormat {
    pub fn status_path(&self) -> &'static str {
        match self {
            WireFormat::Csv => MONITOR_PATH,
            WireFormat::Json => DATA_PATH,
        }
    }

    pub fn status_method(&self) -> &'static str {
        match self {
            WireFormat::Csv => "POST",
            WireFormat::Json => "GET",
        }
    }
}

pub fn login_form(username: &str, password: &str, logintime: &str) -> [(&'static str, String); 3] {
    [
        ("username", username.to_string()),
        ("password", password.to_string()),
        ("logintime", logintime.to_string()),
    ]
}

pub fn command_form(command: &Command) -> [(&'static str, String); 2] {
    [("arg1", "0".to_string()), ("arg2", command.to_wire())]
}

/// Decode a status body. A body equal to the session-invalidated sentinel
/// is reported as such rather than as a format error.
pub fn decode_status(format: WireFormat, body: &str) -> Result<Vec<UnitState>> {
    if body.trim() == SESSION_INVALIDATED {
        return Err(Error::SessionInvalidated);
    }
    match format {
        WireFormat::Csv => decode_csv(body),
        WireFormat::Json => decode_json(body),
    }
}

/// Newline-separated records; the first blank line ends the list.
pub fn decode_csv(body: &str) -> Result<Vec<UnitState>> {
    let mut units = Vec::new();
    for line in body.lines() {
        let record = line.trim_end_matches('\r');
        if record.trim().is_empty() {
            break;
        }
        units.push(decode_csv_record(record)?);
    }
    Ok(units)
}

pub fn decode_csv_record(record: &str) -> Result<UnitState> {
    let fields: Vec<&str> = record.split(',').map(str::trim).collect();
    if fields.len() <= CSV_LOUVER {
        return Err(Error::format(
            format!("expected at least {} fields, got {}", CSV_LOUVER + 1, fields.len()),
            record,
        ));
    }

    let identity = parse_unit_address(fields[CSV_UNIT]).ok_or_else(|| {
        Error::format(format!("bad unit address {:?}", fields[CSV_UNIT]), record)
    })?;

    let mode_code: u8 = parse_field(fields[CSV_MODE], "mode", record)?;
    let mode = Mode::from_status_code(mode_code)
        .ok_or_else(|| Error::format(format!("unknown mode code {mode_code}"), record))?;

    let fan_code: u8 = parse_field(fields[CSV_FAN], "fan speed", record)?;
    let fan_speed = FanSpeed::from_code(fan_code)
        .ok_or_else(|| Error::format(format!("unknown fan code {fan_code}"), record))?;

    let tenths: i64 = parse_field(fields[CSV_TEMP], "temperature", record)?;
    let louver: i32 = parse_field(fields[CSV_LOUVER], "louver", record)?;

    Ok(UnitState {
        identity,
        powered: fields[CSV_POWER] == "1",
        mode,
        target_temperature: Temperature::from_tenths(tenths),
        fan_speed,
        louver,
    })
}

/// `"{circuit}-{sub_id}"`, one-based on the wire.
fn parse_unit_address(field: &str) -> Option<UnitIdentity> {
    let (circuit, sub_id) = field.split_once('-')?;
    let circuit: u32 = circuit.trim().parse().ok()?;
    let sub_id: u32 = sub_id.trim().parse().ok()?;
    Some(UnitIdentity::new(
        circuit.checked_sub(1)?,
        sub_id.checked_sub(1)?,
    ))
}

fn parse_field<T: std::str::FromStr>(field: &str, name: &str, record: &str) -> Result<T> {
    field
        .parse()
        .map_err(|_| Error::format(format!("bad {name} field {field:?}"), record))
}

#[derive(Deserialize)]
struct JsonUnit {
    circuit: u32,
    sub_id: u32,
    powered: bool,
    mode: Mode,
    target_temp: f64,
    fan_speed: FanSpeed,
    louver: i32,
}

pub fn decode_json(body: &str) -> Result<Vec<UnitState>> {
    let parsed: Value = serde_json::from_str(body)
        .map_err(|e| Error::format(format!("invalid JSON: {e}"), body))?;
    let Value::Array(records) = parsed else {
        return Err(Error::format("expected a JSON array", body));
    };

    records
        .into_iter()
        .map(|record| -> Result<UnitState> {
            let raw = record.to_string();
            let unit: JsonUnit = serde_json::from_value(record)
                .map_err(|e| Error::format(e.to_string(), raw))?;
            Ok(UnitState {
                identity: UnitIdentity::new(unit.circuit, unit.sub_id),
                powered: unit.powered,
                mode: unit.mode,
                target_temperature: Temperature::from_celsius(unit.target_temp),
                fan_speed: unit.fan_speed,
                louver: unit.louver,
            })
        })
        .collect()
}

/// One positional `command.cgi` command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    fields: [i64; COMMAND_FIELDS],
}

impl Command {
    pub fn fields(&self) -> &[i64] {
        &self.fields
    }

    /// Every field as an escaped-quote token, comma joined, with a literal
    /// `\r\n` terminator (backslashes included), as the web UI submits it.
    pub fn to_wire(&self) -> String {
        let tokens: Vec<String> = self.fields.iter().map(|v| format!(r#"\"{v}\""#)).collect();
        format!(r"{}\r\n", tokens.join(","))
    }
}

fn flag<T>(field: Option<T>) -> i64 {
    i64::from(field.is_some())
}

/// Reject changes the controller cannot represent: `Mode::Off` has no
/// write code (power off instead) and setpoints must be finite.
pub fn validate_change(change: &SettingsChange) -> Result<()> {
    if let Some(mode) = change.mode
        && mode.to_command_code().is_none()
    {
        return Err(Error::InvalidMode(mode));
    }
    if let Some(temp) = change.temperature
        && !temp.celsius().is_finite()
    {
        return Err(Error::InvalidTemperature(temp.celsius()));
    }
    Ok(())
}

/// Layout: `[circuit+1, sub_id+1, power?, power, mode?, mode, fan?, fan,
/// temp?, temp, 0 x 25]`. Unflagged fields keep their device value.
pub fn encode_command(identity: UnitIdentity, change: &SettingsChange) -> Result<Command> {
    validate_change(change)?;
    let mode_code = change.mode.and_then(|m| m.to_command_code()).unwrap_or(0);

    let mut fields = [0i64; COMMAND_FIELDS];
    fields[0] = i64::from(identity.circuit) + 1;
    fields[1] = i64::from(identity.sub_id) + 1;
    fields[2] = flag(change.power);
    fields[3] = i64::from(change.power.unwrap_or(false));
    fields[4] = flag(change.mode);
    fields[5] = i64::from(mode_code);
    fields[6] = flag(change.fan_speed);
    fields[7] = change.fan_speed.map_or(0, |f| i64::from(f.code()));
    fields[8] = flag(change.temperature);
    fields[9] = change.temperature.map_or(0, |t| t.to_half_degrees());

    Ok(Command { fields })
}

/// Pick the JSON endpoint and body for a change. Temperature-only changes
/// go to `set_temperature`, everything else to `set_mode`.
pub fn json_command(
    identity: UnitIdentity,
    change: &SettingsChange,
) -> Result<(&'static str, Value)> {
    validate_change(change)?;
    let temperature_only = change.power.is_none()
        && change.mode.is_none()
        && change.fan_speed.is_none()
        && change.temperature.is_some();

    let mut body = Map::new();
    body.insert("circuit".into(), json!(identity.circuit));
    body.insert("sub_id".into(), json!(identity.sub_id));
    if let Some(on) = change.power {
        body.insert("powered".into(), json!(on));
    }
    if let Some(mode) = change.mode {
        body.insert("mode".into(), json!(mode));
    }
    if let Some(speed) = change.fan_speed {
        body.insert("fan_speed".into(), json!(speed));
    }
    if let Some(temp) = change.temperature {
        body.insert("target_temp".into(), json!(temp.rounded().celsius()));
    }

    let path = if temperature_only {
        SET_TEMPERATURE_PATH
    } else {
        SET_MODE_PATH
    };
    Ok((path, Value::Object(body)))
}

/// `0` is success, `-13` a dropped session, anything else a rejection.
pub fn check_command_response(body: &str) -> Result<()> {
    match body.trim() {
        SUCCESS => Ok(()),
        SESSION_INVALIDATED => Err(Error::SessionInvalidated),
        other => Err(Error::Rejected(other.to_string())),
    }
}
