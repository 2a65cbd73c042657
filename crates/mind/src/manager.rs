use std::{
    ops::{Deref, DerefMut},
    sync::Arc,
    time::Duration,
};

use mind_core::Credential;
use mind_rpc::{Connector, MindSession, RpcError, SessionState};
use tokio::{
    runtime::Handle,
    sync::{MappedMutexGuard, Mutex, MutexGuard},
    task::JoinHandle,
    time::sleep,
};
use tracing::{debug, warn};

use crate::{config::ManagerConfig, mind::Mind};

type Slot = Arc<Mutex<Option<Mind>>>;

/// Hands out a lazily connected [`Mind`] and closes it after an idle period.
///
/// Acquiring cancels any pending idle timer; releasing the lease arms a new
/// one. Acquisition takes `&mut self`, so callers share a manager by wrapping
/// it in their own lock.
pub struct MindManager {
    connector: Arc<dyn Connector>,
    credential: Credential,
    config: ManagerConfig,
    slot: Slot,
    timer: Option<IdleTimer>,
}

impl MindManager {
    pub fn new(connector: Arc<dyn Connector>, credential: Credential, config: ManagerConfig) -> Self {
        Self {
            connector,
            credential,
            config,
            slot: Arc::new(Mutex::new(None)),
            timer: None,
        }
    }

    /// Manager for a device on the local network, authenticated by media access key.
    pub fn local(
        connector: Arc<dyn Connector>,
        address: impl Into<String>,
        mak: impl Into<String>,
    ) -> Result<Self, RpcError> {
        Ok(Self::new(
            connector,
            Credential::mak(mak)?,
            ManagerConfig::local(address),
        ))
    }

    /// Manager for the web-facing service, authenticated by account.
    pub fn web(
        connector: Arc<dyn Connector>,
        username: impl Into<String>,
        password: impl Into<String>,
        unit_name: impl Into<String>,
    ) -> Result<Self, RpcError> {
        Ok(Self::new(
            connector,
            Credential::web(username, password, unit_name)?,
            ManagerConfig::web(),
        ))
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    /// Whether an idle timer is waiting to close the session.
    pub fn is_timer_armed(&self) -> bool {
        self.timer.as_ref().is_some_and(|timer| !timer.is_finished())
    }

    /// Whether a ready session is currently held.
    pub async fn is_connected(&self) -> bool {
        self.slot
            .lock()
            .await
            .as_ref()
            .is_some_and(Mind::is_ready)
    }

    /// Returns the held session, connecting a new one if none is usable.
    ///
    /// A held session that has dropped out of the ready state is closed and
    /// replaced. Connection failures propagate and leave nothing held.
    pub async fn acquire(&mut self) -> Result<MindLease<'_>, RpcError> {
        if let Some(timer) = self.timer.take() {
            timer.cancel();
        }

        let mut slot = self.slot.lock().await;
        if let Some(mut stale) = slot.take_if(|mind| !mind.is_ready()) {
            debug!(state = %stale.session().state(), "replacing unusable session");
            stale.close().await;
        }

        if slot.is_none() {
            let session = MindSession::new(
                Arc::clone(&self.connector),
                self.config.session.clone(),
                self.credential.clone(),
            );
            *slot = Some(Mind::connect(session, self.config.level_of_detail).await?);
        }

        let mind = MutexGuard::try_map(slot, Option::as_mut).map_err(|_| {
            RpcError::IllegalState {
                expected: SessionState::Ready,
                actual: SessionState::Disconnected,
            }
        })?;

        Ok(MindLease {
            mind,
            timer: &mut self.timer,
            slot: Arc::clone(&self.slot),
            idle_timeout: self.config.idle_timeout,
        })
    }

    /// Cancels the idle timer and closes the held session, if any.
    pub async fn disconnect(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.cancel();
        }
        let held = self.slot.lock().await.take();
        if let Some(mut mind) = held {
            mind.close().await;
        }
    }
}

impl Drop for MindManager {
    fn drop(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.cancel();
        }
    }
}

/// Exclusive use of the managed [`Mind`]; dropping it starts the idle timer.
pub struct MindLease<'a> {
    mind: MappedMutexGuard<'a, Mind>,
    timer: &'a mut Option<IdleTimer>,
    slot: Slot,
    idle_timeout: Duration,
}

impl Deref for MindLease<'_> {
    type Target = Mind;

    fn deref(&self) -> &Mind {
        &self.mind
    }
}

impl DerefMut for MindLease<'_> {
    fn deref_mut(&mut self) -> &mut Mind {
        &mut self.mind
    }
}

impl Drop for MindLease<'_> {
    fn drop(&mut self) {
        *self.timer = IdleTimer::arm(Arc::clone(&self.slot), self.idle_timeout);
    }
}

/// Background task that closes the held session once `idle_timeout` passes.
#[derive(Debug)]
pub struct IdleTimer {
    task: JoinHandle<()>,
}

impl IdleTimer {
    fn arm(slot: Slot, idle_timeout: Duration) -> Option<Self> {
        let Ok(runtime) = Handle::try_current() else {
            warn!("no async runtime available; idle timer not armed");
            return None;
        };

        let task = runtime.spawn(async move {
            sleep(idle_timeout).await;
            let held = slot.lock().await.take();
            if let Some(mut mind) = held {
                debug!(
                    idle_secs = idle_timeout.as_secs_f64(),
                    body_id = %mind.body_id(),
                    "idle timeout elapsed"
                );
                mind.close().await;
            }
        });
        Some(Self { task })
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    pub fn cancel(self) {
        self.task.abort();
    }
}
