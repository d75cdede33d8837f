use serde_json::Value;

use crate::types::*;

/// Recursive JSON diff, producing `(path, old, new)` for every changed leaf.
pub(crate) fn diff_json(
    previous: &Value,
    current: &Value,
    path_prefix: &str,
    changes: &mut Vec<(String, Value, Value)>,
) {
    match (previous, current) {
        (Value::Object(prev_map), Value::Object(curr_map)) => {
            for (key, curr_val) in curr_map {
                let path = if path_prefix.is_empty() {
                    key.clone()
                } else {
                    format!("{path_prefix}.{key}")
                };
                match prev_map.get(key) {
                    Some(prev_val) => diff_json(prev_val, curr_val, &path, changes),
                    None => {
                        if curr_val.is_object() {
                            diff_json(&Value::Object(serde_json::Map::new()), curr_val, &path, changes);
                        } else {
                            changes.push((path, Value::Null, curr_val.clone()));
                        }
                    }
                }
            }
            for (key, prev_val) in prev_map {
                if !curr_map.contains_key(key) {
                    let path = if path_prefix.is_empty() {
                        key.clone()
                    } else {
                        format!("{path_prefix}.{key}")
                    };
                    changes.push((path, prev_val.clone(), Value::Null));
                }
            }
        }
        (prev, curr) if prev != curr => {
            changes.push((path_prefix.to_string(), prev.clone(), curr.clone()));
        }
        _ => {}
    }
}

/// Typed events for everything that differs between two states.
pub(crate) fn state_events(previous: &DeviceState, current: &DeviceState) -> Vec<Event> {
    let mut events = Vec::new();

    if previous.online != current.online {
        events.push(Event::OnlineChanged { online: current.online });
    }
    if let Some(temp) = changed(previous.current_temperature, current.current_temperature) {
        events.push(Event::CurrentTemperatureChanged { temp });
    }
    if let Some(temp) = changed(previous.target_temperature, current.target_temperature) {
        events.push(Event::TargetTemperatureChanged { temp });
    }
    if let Some(temp) = changed(previous.frost_setpoint, current.frost_setpoint) {
        events.push(Event::FrostSetpointChanged { temp });
    }
    if previous.mode != current.mode {
        events.push(Event::ModeChanged { mode: current.mode });
    }
    if previous.heating() != current.heating()
        && let Some(heating) = current.heating()
    {
        events.push(Event::HeatingChanged { heating });
    }
    for flag in Flag::ALL {
        let value = current.flags.get(flag);
        if previous.flags.get(flag) != value {
            events.push(Event::FlagChanged { flag, value });
        }
    }

    events
}

fn changed(previous: Option<Temperature>, current: Option<Temperature>) -> Option<Temperature> {
    match (previous, current) {
        (Some(p), Some(c)) if p == c => None,
        (_, c) => c,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn diff_reports_changed_leaves() {
        let prev = json!({"CH1currentRoomTemp": "19.5", "CH1autoOff": "0"});
        let curr = json!({"CH1currentRoomTemp": "20.0", "CH1autoOff": "0"});
        let mut changes = Vec::new();
        diff_json(&prev, &curr, "", &mut changes);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].0, "CH1currentRoomTemp");
        assert_eq!(changes[0].2, json!("20.0"));
    }

    #[test]
    fn diff_reports_added_and_removed_keys() {
        let prev = json!({"a": "1", "gone": "x"});
        let curr = json!({"a": "1", "new": {"inner": 2}});
        let mut changes = Vec::new();
        diff_json(&prev, &curr, "", &mut changes);
        let paths: Vec<&str> = changes.iter().map(|(p, _, _)| p.as_str()).collect();
        assert!(paths.contains(&"new.inner"));
        assert!(paths.contains(&"gone"));
        assert_eq!(paths.len(), 2);
    }

    #[test]
    fn first_state_emits_everything_known() {
        let prev = DeviceState::default();
        let curr = DeviceState {
            online: true,
            current_temperature: Some(Temperature::from_celsius(19.5)),
            target_temperature: Some(Temperature::from_celsius(21.0)),
            mode: OperatingMode::Auto,
            flags: Flags {
                auto_off: Some(false),
                heat_on_off_status: Some(true),
                ..Default::default()
            },
            ..Default::default()
        };
        let events = state_events(&prev, &curr);
        assert!(events.contains(&Event::OnlineChanged { online: true }));
        assert!(events.contains(&Event::ModeChanged { mode: OperatingMode::Auto }));
        assert!(events.contains(&Event::HeatingChanged { heating: true }));
        assert!(events.contains(&Event::FlagChanged { flag: Flag::AutoOff, value: Some(false) }));
        assert!(!events.iter().any(|e| matches!(e, Event::FrostSetpointChanged { .. })));
    }

    #[test]
    fn identical_states_emit_nothing() {
        let state = DeviceState {
            online: true,
            current_temperature: Some(Temperature::from_celsius(20.0)),
            ..Default::default()
        };
        assert!(state_events(&state, &state.clone()).is_empty());
    }

    #[test]
    fn going_offline_keeps_temperatures_quiet() {
        let prev = DeviceState {
            online: true,
            current_temperature: Some(Temperature::from_celsius(20.0)),
            ..Default::default()
        };
        let curr = DeviceState { online: false, ..prev.clone() };
        assert_eq!(state_events(&prev, &curr), vec![Event::OnlineChanged { online: false }]);
    }
}
