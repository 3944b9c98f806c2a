use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

use crate::client::FujitsuClient;
use crate::types::{SettingsChange, UnitIdentity, UnitState};
use crate::{Error, Result};

pub const DEFAULT_SCAN_INTERVAL: Duration = Duration::from_secs(30);

type UpdateCallback = Box<dyn Fn(&[UnitState]) + Send + Sync>;
type UnavailableCallback = Box<dyn Fn(&Error) + Send + Sync>;

/// Polls a client on a fixed interval and keeps the last good snapshot.
/// A failed poll leaves the snapshot alone and marks it unavailable.
pub struct Coordinator {
    client: Arc<FujitsuClient>,
    interval: Duration,
    data: RwLock<Vec<UnitState>>,
    available: AtomicBool,
    update_callbacks: Vec<UpdateCallback>,
    unavailable_callbacks: Vec<UnavailableCallback>,
}

impl Coordinator {
    pub fn new(client: Arc<FujitsuClient>, interval: Duration) -> Self {
        Self {
            client,
            interval,
            data: RwLock::new(Vec::new()),
            available: AtomicBool::new(false),
            update_callbacks: Vec::new(),
            unavailable_callbacks: Vec::new(),
        }
    }

    pub fn on_update(mut self, f: impl Fn(&[UnitState]) + Send + Sync + 'static) -> Self {
        self.update_callbacks.push(Box::new(f));
        self
    }

    pub fn on_unavailable(mut self, f: impl Fn(&Error) + Send + Sync + 'static) -> Self {
        self.unavailable_callbacks.push(Box::new(f));
        self
    }

    pub fn client(&self) -> &Arc<FujitsuClient> {
        &self.client
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    pub async fn data(&self) -> Vec<UnitState> {
        self.data.read().await.clone()
    }

    pub async fn unit(&self, identity: UnitIdentity) -> Option<UnitState> {
        self.data
            .read()
            .await
            .iter()
            .find(|u| u.identity == identity)
            .cloned()
    }

    /// One poll cycle.
    pub async fn refresh(&self) -> Result<()> {
        match self.client.fetch_all().await {
            Ok(units) => {
                *self.data.write().await = units.clone();
                self.available.store(true, Ordering::SeqCst);
                debug!(count = units.len(), "coordinator data updated");
                self.notify(&units);
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "refresh failed, keeping previous data");
                self.available.store(false, Ordering::SeqCst);
                for cb in &self.unavailable_callbacks {
                    cb(&e);
                }
                Err(e)
            }
        }
    }

    /// Poll forever. Failures are reported through `on_unavailable`.
    pub async fn run(&self) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            // already logged and published to callbacks
            let _ = self.refresh().await;
        }
    }

    /// Apply an optimistic change to the cached unit after a successful
    /// command. Returns false if the unit is not in the snapshot.
    pub async fn patch(&self, identity: UnitIdentity, change: &SettingsChange) -> bool {
        let snapshot = {
            let mut data = self.data.write().await;
            let Some(unit) = data.iter_mut().find(|u| u.identity == identity) else {
                return false;
            };
            change.apply_to(unit);
            data.clone()
        };
        self.notify(&snapshot);
        true
    }

    fn notify(&self, units: &[UnitState]) {
        for cb in &self.update_callbacks {
            cb(units);
        }
    }
}

/// Coordinators keyed by host config entry id.
#[derive(Default)]
pub struct Context {
    entries: HashMap<String, Arc<Coordinator>>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, entry_id: impl Into<String>, coordinator: Arc<Coordinator>) {
        self.entries.insert(entry_id.into(), coordinator);
    }

    pub fn get(&self, entry_id: &str) -> Option<Arc<Coordinator>> {
        self.entries.get(entry_id).cloned()
    }

    pub fn remove(&mut self, entry_id: &str) -> Option<Arc<Coordinator>> {
        self.entries.remove(entry_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
