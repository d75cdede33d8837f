use std::sync::Arc;

use tokio::sync::{watch, Mutex};

use crate::client::{CommandOutcome, PollOutcome, SalusClient};
use crate::projection::{FieldView, Reading};
use crate::types::*;
use crate::Result;

/// Cloneable handle that serializes every poll and command for one device
/// and publishes each new state to watchers.
#[derive(Clone)]
pub struct SharedThermostat {
    client: Arc<Mutex<SalusClient>>,
    state_tx: Arc<watch::Sender<DeviceState>>,
    identity: DeviceIdentity,
}

impl SharedThermostat {
    pub fn new(client: SalusClient) -> Self {
        let (state_tx, _) = watch::channel(client.state().clone());
        Self {
            identity: client.identity().clone(),
            client: Arc::new(Mutex::new(client)),
            state_tx: Arc::new(state_tx),
        }
    }

    pub fn identity(&self) -> &DeviceIdentity {
        &self.identity
    }

    pub fn subscribe(&self) -> watch::Receiver<DeviceState> {
        self.state_tx.subscribe()
    }

    /// Last published state. Does not wait for an in-flight operation.
    pub fn state(&self) -> DeviceState {
        self.state_tx.borrow().clone()
    }

    pub fn read<T>(&self, view: &FieldView<T>) -> Reading<T> {
        view.read(&self.state_tx.borrow())
    }

    pub async fn initialize(&self) -> PollOutcome {
        let mut client = self.client.lock().await;
        let outcome = client.initialize().await;
        self.publish(&client);
        outcome
    }

    pub async fn poll(&self) -> PollOutcome {
        let mut client = self.client.lock().await;
        let outcome = client.poll().await;
        self.publish(&client);
        outcome
    }

    pub async fn set_mode(&self, mode: OperatingMode) -> Result<CommandOutcome> {
        let mut client = self.client.lock().await;
        let outcome = client.set_mode(mode).await;
        self.publish(&client);
        outcome
    }

    pub async fn set_temperature(&self, celsius: f64) -> Result<CommandOutcome> {
        let mut client = self.client.lock().await;
        let outcome = client.set_temperature(celsius).await;
        self.publish(&client);
        outcome
    }

    pub async fn turn_on(&self) -> CommandOutcome {
        let mut client = self.client.lock().await;
        let outcome = client.turn_on().await;
        self.publish(&client);
        outcome
    }

    pub async fn turn_off(&self) -> CommandOutcome {
        let mut client = self.client.lock().await;
        let outcome = client.turn_off().await;
        self.publish(&client);
        outcome
    }

    pub async fn toggle(&self) -> CommandOutcome {
        let mut client = self.client.lock().await;
        let outcome = client.toggle().await;
        self.publish(&client);
        outcome
    }

    fn publish(&self, client: &SalusClient) {
        self.state_tx.send_if_modified(|current| {
            if *current == *client.state() {
                return false;
            }
            *current = client.state().clone();
            true
        });
    }
}
