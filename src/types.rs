use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::{Error, Result};

pub const MIN_SETPOINT_C: f64 = 5.0;
pub const MAX_SETPOINT_C: f64 = 34.5;
pub const TEMPERATURE_UNIT: &str = "\u{00b0}C";
pub const DEFAULT_NAME: &str = "Salus Thermostat";

/// Temperature in Celsius, the only unit the iT500 web API speaks.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Temperature(f64);

impl Temperature {
    pub fn from_celsius(c: f64) -> Self {
        Self(c)
    }

    /// Validate a requested set-point against the thermostat's range and
    /// snap it to the 0.5 degree resolution the device stores.
    pub fn setpoint(c: f64) -> Result<Self> {
        if !c.is_finite() || !(MIN_SETPOINT_C..=MAX_SETPOINT_C).contains(&c) {
            return Err(Error::InvalidTemperature(c));
        }
        Ok(Self(c).rounded())
    }

    pub fn celsius(&self) -> f64 {
        self.0
    }

    /// Round to the thermostat's 0.5 degree resolution.
    pub fn rounded(&self) -> Self {
        Self((self.0 * 2.0).round() / 2.0)
    }

    /// Form value for `current_tempZ1`.
    pub fn to_salus_string(&self) -> String {
        format!("{:.1}", self.rounded().0)
    }
}

impl fmt::Display for Temperature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.1}{TEMPERATURE_UNIT}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum OperatingMode {
    Off,
    Auto,
    Manual,
    #[default]
    Unknown,
}

impl OperatingMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperatingMode::Off => "OFF",
            OperatingMode::Auto => "AUTO",
            OperatingMode::Manual => "MANUAL",
            OperatingMode::Unknown => "UNKNOWN",
        }
    }

    /// Mode implied by the device flags, checked in priority order.
    /// `None` when no rule matches.
    pub fn from_flags(flags: &Flags) -> Option<Self> {
        match (flags.auto_off, flags.heat_on_off) {
            (Some(true), Some(true)) => return Some(OperatingMode::Off),
            (Some(false), Some(false)) => return Some(OperatingMode::Auto),
            _ => {}
        }
        if flags.auto_mode == Some(true) && flags.manual == Some(true) {
            return Some(OperatingMode::Manual);
        }
        None
    }
}

impl fmt::Display for OperatingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OperatingMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "off" => Ok(OperatingMode::Off),
            "auto" | "schedule" => Ok(OperatingMode::Auto),
            "manual" | "heat" | "man" => Ok(OperatingMode::Manual),
            _ => Err(Error::InvalidMode(s.to_string())),
        }
    }
}

/// Raw device flags. `None` means the field was missing or not `"0"`/`"1"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Flags {
    pub auto_off: Option<bool>,
    pub manual: Option<bool>,
    pub schedule_type: Option<bool>,
    pub heat_on_off_status: Option<bool>,
    pub auto_mode: Option<bool>,
    pub heat_on_off: Option<bool>,
    pub frost_active: Option<bool>,
}

impl Flags {
    pub fn get(&self, flag: Flag) -> Option<bool> {
        match flag {
            Flag::AutoOff => self.auto_off,
            Flag::Manual => self.manual,
            Flag::ScheduleType => self.schedule_type,
            Flag::HeatOnOffStatus => self.heat_on_off_status,
            Flag::AutoMode => self.auto_mode,
            Flag::HeatOnOff => self.heat_on_off,
            Flag::FrostActive => self.frost_active,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Flag {
    AutoOff,
    Manual,
    ScheduleType,
    HeatOnOffStatus,
    AutoMode,
    HeatOnOff,
    FrostActive,
}

impl Flag {
    pub const ALL: [Flag; 7] = [
        Flag::AutoOff,
        Flag::Manual,
        Flag::ScheduleType,
        Flag::HeatOnOffStatus,
        Flag::AutoMode,
        Flag::HeatOnOff,
        Flag::FrostActive,
    ];

    /// Field name in the device values payload.
    pub fn key(&self) -> &'static str {
        match self {
            Flag::AutoOff => "CH1autoOff",
            Flag::Manual => "CH1manual",
            Flag::ScheduleType => "CH1schedType",
            Flag::HeatOnOffStatus => "CH1heatOnOffStatus",
            Flag::AutoMode => "CH1autoMode",
            Flag::HeatOnOff => "CH1heatOnOff",
            Flag::FrostActive => "CH1frostActive",
        }
    }
}

/// Last known thermostat state.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DeviceState {
    pub online: bool,
    pub current_temperature: Option<Temperature>,
    pub target_temperature: Option<Temperature>,
    pub frost_setpoint: Option<Temperature>,
    pub flags: Flags,
    pub mode: OperatingMode,
    pub updated_at: Option<DateTime<Utc>>,
}

impl DeviceState {
    /// Whether the boiler relay is currently calling for heat.
    pub fn heating(&self) -> Option<bool> {
        self.flags.heat_on_off_status
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceIdentity {
    pub name: String,
    pub device_id: String,
}

impl DeviceIdentity {
    pub fn new(name: impl Into<String>, device_id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            device_id: device_id.into(),
        }
    }

    /// `<name>_<device id>`, lowercased.
    pub fn unique_id(&self) -> String {
        format!("{}_{}", self.name, self.device_id).to_lowercase()
    }

    /// Unique id with spaces removed, for hosts that need an entity slug.
    pub fn entity_id(&self) -> String {
        self.unique_id().replace(' ', "")
    }
}

/// Events emitted by the diff engine when state changes.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    OnlineChanged { online: bool },
    CurrentTemperatureChanged { temp: Temperature },
    TargetTemperatureChanged { temp: Temperature },
    FrostSetpointChanged { temp: Temperature },
    ModeChanged { mode: OperatingMode },
    HeatingChanged { heating: bool },
    FlagChanged { flag: Flag, value: Option<bool> },
}
