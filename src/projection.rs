//! Read-only views over [`DeviceState`].
//!
//! Each [`FieldView`] pairs a field selector with the metadata a host needs
//! to present it as a sensor. Views never mutate state.

use crate::types::*;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reading<T> {
    pub value: Option<T>,
    /// Set when the thermostat is offline and the value may be out of date.
    pub stale: bool,
}

#[derive(Clone, Copy)]
pub struct FieldView<T> {
    key: &'static str,
    label: &'static str,
    unit: Option<&'static str>,
    select: fn(&DeviceState) -> Option<T>,
}

impl<T> FieldView<T> {
    pub const fn new(
        key: &'static str,
        label: &'static str,
        unit: Option<&'static str>,
        select: fn(&DeviceState) -> Option<T>,
    ) -> Self {
        Self {
            key,
            label,
            unit,
            select,
        }
    }

    pub fn key(&self) -> &'static str {
        self.key
    }

    pub fn label(&self) -> &'static str {
        self.label
    }

    pub fn unit(&self) -> Option<&'static str> {
        self.unit
    }

    pub fn read(&self, state: &DeviceState) -> Reading<T> {
        Reading {
            value: (self.select)(state),
            stale: !state.online,
        }
    }

    /// Display name, e.g. "Hall Current Temperature".
    pub fn name(&self, identity: &DeviceIdentity) -> String {
        format!("{} {}", identity.name, self.label)
    }

    pub fn unique_id(&self, identity: &DeviceIdentity) -> String {
        format!("{}_{}", identity.unique_id(), self.key.to_lowercase())
    }
}

impl<T> std::fmt::Debug for FieldView<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FieldView")
            .field("key", &self.key)
            .field("label", &self.label)
            .field("unit", &self.unit)
            .finish()
    }
}

fn celsius(t: Option<Temperature>) -> Option<f64> {
    t.map(|t| t.celsius())
}

pub const CURRENT_TEMPERATURE: FieldView<f64> = FieldView::new(
    "current_temperature",
    "Current Temperature",
    Some(TEMPERATURE_UNIT),
    |s| celsius(s.current_temperature),
);

pub const TARGET_TEMPERATURE: FieldView<f64> = FieldView::new(
    "target_temperature",
    "Target Temperature",
    Some(TEMPERATURE_UNIT),
    |s| celsius(s.target_temperature),
);

pub const FROST_SETPOINT: FieldView<f64> = FieldView::new(
    "frost",
    "Frost Protection Setpoint",
    Some(TEMPERATURE_UNIT),
    |s| celsius(s.frost_setpoint),
);

pub const OPERATING_MODE: FieldView<OperatingMode> =
    FieldView::new("operation_mode", "Operation Mode", None, |s| Some(s.mode));

pub const ONLINE: FieldView<bool> = FieldView::new("online", "Online", None, |s| Some(s.online));

pub const HEATING: FieldView<bool> = FieldView::new("heating", "Heating", None, |s| s.heating());

pub const AUTO_OFF: FieldView<bool> =
    FieldView::new("CH1autoOff", "Auto Off", None, |s| s.flags.auto_off);
pub const MANUAL: FieldView<bool> = FieldView::new("CH1manual", "Manual", None, |s| s.flags.manual);
pub const SCHEDULE_TYPE: FieldView<bool> =
    FieldView::new("CH1schedType", "Schedule Type", None, |s| s.flags.schedule_type);
pub const HEAT_ON_OFF_STATUS: FieldView<bool> = FieldView::new(
    "CH1heatOnOffStatus",
    "Heat On/Off Status",
    None,
    |s| s.flags.heat_on_off_status,
);
pub const AUTO_MODE: FieldView<bool> =
    FieldView::new("CH1autoMode", "Auto Mode", None, |s| s.flags.auto_mode);
pub const HEAT_ON_OFF: FieldView<bool> =
    FieldView::new("CH1heatOnOff", "Heat On/Off", None, |s| s.flags.heat_on_off);
pub const FROST_ACTIVE: FieldView<bool> =
    FieldView::new("CH1frostActive", "Frost Active", None, |s| s.flags.frost_active);

pub const TEMPERATURE_VIEWS: [FieldView<f64>; 3] =
    [CURRENT_TEMPERATURE, TARGET_TEMPERATURE, FROST_SETPOINT];

pub const BINARY_VIEWS: [FieldView<bool>; 9] = [
    ONLINE,
    HEATING,
    AUTO_OFF,
    MANUAL,
    SCHEDULE_TYPE,
    HEAT_ON_OFF_STATUS,
    AUTO_MODE,
    HEAT_ON_OFF,
    FROST_ACTIVE,
];

#[cfg(test)]
mod tests {
    use super::*;

    fn online_state() -> DeviceState {
        DeviceState {
            online: true,
            current_temperature: Some(Temperature::from_celsius(19.5)),
            target_temperature: Some(Temperature::from_celsius(21.0)),
            flags: Flags {
                auto_off: Some(false),
                heat_on_off_status: Some(true),
                ..Default::default()
            },
            mode: OperatingMode::Auto,
            ..Default::default()
        }
    }

    #[test]
    fn reads_selected_field() {
        let state = online_state();
        assert_eq!(
            CURRENT_TEMPERATURE.read(&state),
            Reading { value: Some(19.5), stale: false }
        );
        assert_eq!(TARGET_TEMPERATURE.read(&state).value, Some(21.0));
        assert_eq!(FROST_SETPOINT.read(&state).value, None);
        assert_eq!(AUTO_OFF.read(&state).value, Some(false));
        assert_eq!(HEATING.read(&state).value, Some(true));
        assert_eq!(OPERATING_MODE.read(&state).value, Some(OperatingMode::Auto));
    }

    #[test]
    fn offline_readings_are_stale() {
        let state = DeviceState {
            online: false,
            ..online_state()
        };
        let reading = CURRENT_TEMPERATURE.read(&state);
        assert_eq!(reading.value, Some(19.5));
        assert!(reading.stale);
        assert_eq!(ONLINE.read(&state).value, Some(false));
    }

    #[test]
    fn names_and_ids() {
        let identity = DeviceIdentity::new("Hall", "STA1");
        assert_eq!(CURRENT_TEMPERATURE.name(&identity), "Hall Current Temperature");
        assert_eq!(CURRENT_TEMPERATURE.unique_id(&identity), "hall_sta1_current_temperature");
        assert_eq!(AUTO_OFF.unique_id(&identity), "hall_sta1_ch1autooff");
        assert_eq!(CURRENT_TEMPERATURE.unit(), Some(TEMPERATURE_UNIT));
        assert_eq!(ONLINE.unit(), None);
    }

    #[test]
    fn binary_views_have_unique_keys() {
        let mut keys: Vec<&str> = BINARY_VIEWS.iter().map(|v| v.key()).collect();
        keys.sort_unstable();
        keys.dedup();
        assert_eq!(keys.len(), BINARY_VIEWS.len());
    }
}
