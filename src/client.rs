use std::time::Duration;

use chrono::Utc;
use tracing::{debug, error, trace, warn};

use crate::config::{Config, DEFAULT_TIMEOUT_SECS};
use crate::diff::state_events;
use crate::logger::{MessageLogMode, MessageLogger};
use crate::protocol::{
    control_query, device_values_query, extract_token, login_form, parse_device_values, Command,
    DeviceValues, Snapshot, CONTROL_PATH, DEFAULT_BASE_URL, DEVICE_VALUES_PATH, LOGIN_PATH,
    SET_PATH,
};
use crate::types::*;
use crate::{Error, Result};

type EventCallback = Box<dyn Fn(&Event) + Send + Sync>;
type SnapshotCallback = Box<dyn Fn(&DeviceState) + Send + Sync>;

/// Result of one poll. Failures are reported here instead of as `Err` so a
/// polling loop never has to unwind.
#[derive(Debug)]
pub enum PollOutcome {
    /// A valid snapshot replaced the previous state.
    Updated,
    /// The server answered without usable device values.
    Offline,
    Failed(Error),
}

impl PollOutcome {
    pub fn is_updated(&self) -> bool {
        matches!(self, PollOutcome::Updated)
    }
}

#[derive(Debug)]
pub enum CommandOutcome {
    /// The server accepted the write.
    Sent,
    /// Only the local target changed; nothing needed sending.
    LocalOnly,
    Failed(Error),
}

impl CommandOutcome {
    pub fn is_sent(&self) -> bool {
        matches!(self, CommandOutcome::Sent)
    }
}

/// What to do when the device flags match none of the mode rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ModeInference {
    /// Report [`OperatingMode::Unknown`].
    #[default]
    Strict,
    /// Keep whatever mode was known before, as the original web integration did.
    Legacy,
}

struct Session {
    username: String,
    password: String,
    device_id: String,
    token: Option<String>,
}

pub struct SalusClientBuilder {
    username: String,
    password: String,
    device_id: String,
    name: String,
    base_url: String,
    timeout: Duration,
    mode_inference: ModeInference,
    event_callbacks: Vec<EventCallback>,
    snapshot_callbacks: Vec<SnapshotCallback>,
    log_mode: Option<MessageLogMode>,
    log_path: Option<String>,
}

impl SalusClientBuilder {
    pub fn new(
        username: impl Into<String>,
        password: impl Into<String>,
        device_id: impl Into<String>,
    ) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            device_id: device_id.into(),
            name: DEFAULT_NAME.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            mode_inference: ModeInference::default(),
            event_callbacks: Vec::new(),
            snapshot_callbacks: Vec::new(),
            log_mode: None,
            log_path: None,
        }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn mode_inference(mut self, inference: ModeInference) -> Self {
        self.mode_inference = inference;
        self
    }

    pub fn on_event(mut self, f: impl Fn(&Event) + Send + Sync + 'static) -> Self {
        self.event_callbacks.push(Box::new(f));
        self
    }

    pub fn on_snapshot(mut self, f: impl Fn(&DeviceState) + Send + Sync + 'static) -> Self {
        self.snapshot_callbacks.push(Box::new(f));
        self
    }

    pub fn message_log(mut self, mode: MessageLogMode, path: impl Into<String>) -> Self {
        self.log_mode = Some(mode);
        self.log_path = Some(path.into());
        self
    }

    pub fn build(self) -> Result<SalusClient> {
        let http = reqwest::Client::builder()
            .cookie_store(true)
            .timeout(self.timeout)
            .build()?;

        let logger = match (self.log_mode, self.log_path) {
            (Some(mode), Some(path)) => Some(MessageLogger::new(mode, &path)?),
            _ => None,
        };

        Ok(SalusClient {
            http,
            base_url: self.base_url,
            identity: DeviceIdentity::new(self.name, self.device_id.clone()),
            session: Session {
                username: self.username,
                password: self.password,
                device_id: self.device_id,
                token: None,
            },
            state: DeviceState::default(),
            mode_inference: self.mode_inference,
            event_callbacks: self.event_callbacks,
            snapshot_callbacks: self.snapshot_callbacks,
            logger,
        })
    }
}

/// Session with one thermostat on the Salus web service.
///
/// Every mutating call takes `&mut self`, so a single owner cannot interleave
/// a poll with a command. Use [`crate::SharedThermostat`] to share one client
/// between tasks.
pub struct SalusClient {
    http: reqwest::Client,
    base_url: String,
    identity: DeviceIdentity,
    session: Session,
    state: DeviceState,
    mode_inference: ModeInference,
    event_callbacks: Vec<EventCallback>,
    snapshot_callbacks: Vec<SnapshotCallback>,
    logger: Option<MessageLogger>,
}

impl SalusClient {
    pub fn builder(
        username: impl Into<String>,
        password: impl Into<String>,
        device_id: impl Into<String>,
    ) -> SalusClientBuilder {
        SalusClientBuilder::new(username, password, device_id)
    }

    /// Builder preloaded from a validated [`Config`].
    pub fn from_config(config: &Config) -> Result<SalusClientBuilder> {
        config.validate()?;
        let mut builder = SalusClientBuilder::new(&config.username, &config.password, &config.device_id)
            .name(&config.name)
            .timeout(config.timeout());
        if let Some(ref url) = config.base_url {
            builder = builder.base_url(url);
        }
        if config.legacy_mode_inference {
            builder = builder.mode_inference(ModeInference::Legacy);
        }
        Ok(builder)
    }

    pub fn identity(&self) -> &DeviceIdentity {
        &self.identity
    }

    pub fn state(&self) -> &DeviceState {
        &self.state
    }

    pub fn has_token(&self) -> bool {
        self.session.token.is_some()
    }

    /// Log in and fetch the first snapshot. Call once before reading state.
    pub async fn initialize(&mut self) -> PollOutcome {
        debug!(device = %self.session.device_id, "initializing thermostat session");
        self.poll().await
    }

    /// Log in and scrape a fresh session token. No retry is attempted.
    pub async fn authenticate(&mut self) -> Result<()> {
        self.session.token = None;
        match self.fetch_token().await {
            Ok(token) => {
                debug!(device = %self.session.device_id, "session token acquired");
                self.session.token = Some(token);
                Ok(())
            }
            Err(e) => {
                error!(device = %self.session.device_id, error = %e, "authentication failed");
                Err(e)
            }
        }
    }

    /// Fetch device values and replace the state snapshot. On any failure the
    /// device is marked offline and the previous readings are kept.
    pub async fn poll(&mut self) -> PollOutcome {
        match self.fetch_device_values().await {
            Ok(DeviceValues::Valid(snapshot)) => {
                self.apply_snapshot(snapshot);
                PollOutcome::Updated
            }
            Ok(DeviceValues::Invalid) => {
                debug!("request ok, but device values are invalid; dropping token");
                self.session.token = None;
                self.mark_offline();
                PollOutcome::Offline
            }
            Err(e) => {
                warn!(device = %self.session.device_id, error = %e, "poll failed");
                if matches!(e, Error::Status(401 | 403)) {
                    self.session.token = None;
                }
                self.mark_offline();
                PollOutcome::Failed(e)
            }
        }
    }

    // -- Command methods --

    /// Switch operating mode. `Manual` re-sends the last known target
    /// temperature, since the web API has no separate "manual" switch.
    pub async fn set_mode(&mut self, mode: OperatingMode) -> Result<CommandOutcome> {
        let command = match mode {
            OperatingMode::Off => Command::Off,
            OperatingMode::Auto => Command::Auto,
            OperatingMode::Manual => {
                let target = self.state.target_temperature.ok_or_else(|| {
                    Error::InvalidMode("manual mode needs a known target temperature".to_string())
                })?;
                Command::Manual(Temperature::setpoint(target.celsius())?)
            }
            OperatingMode::Unknown => return Err(Error::InvalidMode(mode.to_string())),
        };
        Ok(self.dispatch(command).await)
    }

    /// Update the target temperature. It is only sent to the thermostat in
    /// manual mode; otherwise the schedule owns the set-point.
    pub async fn set_temperature(&mut self, celsius: f64) -> Result<CommandOutcome> {
        let temp = Temperature::setpoint(celsius)?;

        if self.state.mode == OperatingMode::Manual {
            return Ok(self.dispatch(Command::Manual(temp)).await);
        }

        debug!(target = %temp, mode = %self.state.mode, "not in manual mode, set-point kept local");
        let next = DeviceState {
            target_temperature: Some(temp),
            ..self.state.clone()
        };
        self.replace_state(next);
        self.refresh().await;
        Ok(CommandOutcome::LocalOnly)
    }

    pub async fn turn_on(&mut self) -> CommandOutcome {
        self.dispatch(Command::Auto).await
    }

    pub async fn turn_off(&mut self) -> CommandOutcome {
        self.dispatch(Command::Off).await
    }

    /// OFF turns on (AUTO); every other mode, including AUTO, turns off.
    pub async fn toggle(&mut self) -> CommandOutcome {
        if self.state.mode == OperatingMode::Off {
            self.turn_on().await
        } else {
            self.turn_off().await
        }
    }

    // -- Helpers --

    /// Send a command, optimistically apply its mode, then re-poll.
    /// A command that could not authenticate skips the re-poll, so one
    /// call never logs in twice.
    async fn dispatch(&mut self, command: Command) -> CommandOutcome {
        let outcome = match self.send_command(&command).await {
            Ok(()) => {
                debug!(action = command.action(), "command accepted");
                CommandOutcome::Sent
            }
            Err(e) => {
                error!(action = command.action(), error = %e, "command failed");
                CommandOutcome::Failed(e)
            }
        };
        let auth_failed = matches!(&outcome, CommandOutcome::Failed(e) if e.is_auth());

        let mut next = DeviceState {
            mode: command.mode(),
            ..self.state.clone()
        };
        if let Command::Manual(temp) = command {
            next.target_temperature = Some(temp);
        }
        self.replace_state(next);

        if auth_failed {
            self.mark_offline();
        } else {
            self.refresh().await;
        }
        outcome
    }

    async fn refresh(&mut self) {
        let outcome = self.poll().await;
        trace!(?outcome, "follow-up poll");
    }

    async fn ensure_token(&mut self) -> Result<String> {
        if let Some(ref token) = self.session.token {
            return Ok(token.clone());
        }
        self.authenticate().await?;
        self.session.token.clone().ok_or(Error::TokenNotFound)
    }

    async fn fetch_token(&mut self) -> Result<String> {
        let form = login_form(&self.session.username, &self.session.password);
        let login_url = format!("{}{}", self.base_url, LOGIN_PATH);
        debug!(url = %login_url, user = %self.session.username, "logging in");

        let result = self.http.post(&login_url).form(&form).send().await;
        let status = result.as_ref().ok().map(|r| r.status().as_u16());
        if let Some(ref mut logger) = self.logger {
            logger.log_request("POST", LOGIN_PATH, status, Some(&form));
        }
        let resp = result?;
        if !resp.status().is_success() {
            return Err(Error::Auth {
                status: resp.status().as_u16(),
            });
        }

        let query = control_query(&self.session.device_id);
        let control_url = format!("{}{}", self.base_url, CONTROL_PATH);
        let result = self.http.get(&control_url).query(&query).send().await;
        let status = result.as_ref().ok().map(|r| r.status().as_u16());
        if let Some(ref mut logger) = self.logger {
            logger.log_request("GET", CONTROL_PATH, status, Some(&query));
        }
        let resp = result?;
        if !resp.status().is_success() {
            return Err(Error::Auth {
                status: resp.status().as_u16(),
            });
        }

        let html = resp.text().await?;
        extract_token(&html)
    }

    async fn fetch_device_values(&mut self) -> Result<DeviceValues> {
        let token = self.ensure_token().await?;
        let query = device_values_query(
            &self.session.device_id,
            &token,
            Utc::now().timestamp_millis(),
        );
        let url = format!("{}{}", self.base_url, DEVICE_VALUES_PATH);
        trace!(url = %url, "polling device values");

        let resp = self.http.get(&url).query(&query).send().await?;
        let status = resp.status();
        let body = resp.text().await?;

        if let Some(ref mut logger) = self.logger {
            logger.log_poll(status.as_u16(), &body);
        }
        if !status.is_success() {
            return Err(Error::Status(status.as_u16()));
        }

        parse_device_values(&body)
    }

    async fn send_command(&mut self, command: &Command) -> Result<()> {
        let token = self.ensure_token().await?;
        let form = command.form(&token, &self.session.device_id);
        let url = format!("{}{}", self.base_url, SET_PATH);
        debug!(url = %url, action = command.action(), "sending command");

        let result = self.http.post(&url).form(&form).send().await;
        let status = result.as_ref().ok().map(|r| r.status().as_u16());
        if let Some(ref mut logger) = self.logger {
            logger.log_command(command.action(), status, &form);
        }
        let resp = result?;
        let status = resp.status().as_u16();
        if !resp.status().is_success() {
            if matches!(status, 401 | 403) {
                self.session.token = None;
            }
            return Err(Error::Status(status));
        }
        Ok(())
    }

    fn apply_snapshot(&mut self, snapshot: Snapshot) {
        let mode = match OperatingMode::from_flags(&snapshot.flags) {
            Some(mode) => mode,
            None => {
                debug!(flags = ?snapshot.flags, "flags match no mode rule");
                match self.mode_inference {
                    ModeInference::Strict => OperatingMode::Unknown,
                    ModeInference::Legacy => self.state.mode,
                }
            }
        };

        let next = DeviceState {
            online: true,
            current_temperature: Some(snapshot.current_temperature),
            target_temperature: Some(snapshot.target_temperature),
            frost_setpoint: Some(snapshot.frost_setpoint),
            flags: snapshot.flags,
            mode,
            updated_at: Some(Utc::now()),
        };
        debug!(
            mode = %next.mode,
            current = ?next.current_temperature.map(|t| t.celsius()),
            target = ?next.target_temperature.map(|t| t.celsius()),
            "device values updated"
        );
        self.replace_state(next);

        for cb in &self.snapshot_callbacks {
            cb(&self.state);
        }
    }

    fn mark_offline(&mut self) {
        let next = DeviceState {
            online: false,
            ..self.state.clone()
        };
        self.replace_state(next);
    }

    fn replace_state(&mut self, next: DeviceState) {
        let events = state_events(&self.state, &next);
        self.state = next;

        for event in &events {
            for cb in &self.event_callbacks {
                cb(event);
            }
        }
        if !events.is_empty() {
            trace!(count = events.len(), "state events emitted");
        }
    }
}
