//! Scope-level lifecycle controller.
//!
//! A `Registration` holds at most one active and one waiting agent. It
//! runs each install and activation to completion before accepting the
//! next one, routes intercepted requests to the active agent, and hands
//! control over when the waiting agent is told to skip waiting.

use std::sync::{Arc, RwLock};

use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::agent::{Capabilities, OfflineAgent};
use crate::config::AgentConfig;
use crate::error::{AgentError, Result};
use crate::events::AgentEvent;
use crate::models::{ControlMessage, ControlReply, LifecycleState, Request};
use crate::strategy::{self, FetchOutcome, Intercept};

#[derive(Default)]
struct Slots {
    active: Option<Arc<OfflineAgent>>,
    waiting: Option<Arc<OfflineAgent>>,
}

pub struct Registration {
    caps: Capabilities,
    slots: RwLock<Slots>,
    /// Held for the whole of an install or activation.
    transition: Mutex<()>,
}

impl Registration {
    pub fn new(caps: Capabilities) -> Self {
        Self {
            caps,
            slots: RwLock::new(Slots::default()),
            transition: Mutex::new(()),
        }
    }

    pub fn capabilities(&self) -> &Capabilities {
        &self.caps
    }

    pub fn active(&self) -> Option<Arc<OfflineAgent>> {
        self.slots.read().ok().and_then(|s| s.active.clone())
    }

    pub fn waiting(&self) -> Option<Arc<OfflineAgent>> {
        self.slots.read().ok().and_then(|s| s.waiting.clone())
    }

    fn with_slots<T>(&self, f: impl FnOnce(&mut Slots) -> T) -> Result<T> {
        let mut slots = self
            .slots
            .write()
            .map_err(|_| AgentError::Storage("registration lock poisoned".to_string()))?;
        Ok(f(&mut slots))
    }

    /// Install a new version. Activates it straight away when nothing is
    /// active, otherwise leaves it waiting. A failed install or activation
    /// leaves the current active agent in control.
    pub async fn install(&self, config: AgentConfig) -> Result<Arc<OfflineAgent>> {
        let _guard = self.transition.lock().await;
        let agent = Arc::new(OfflineAgent::new(config, self.caps.clone()));

        agent.on_install().await?;

        if self.active().is_none() {
            if let Err(e) = self.activate(agent.clone()).await {
                agent.retire();
                return Err(e);
            }
            return Ok(agent);
        }

        let replaced = self.with_slots(|s| s.waiting.replace(agent.clone()))?;
        if let Some(previous) = replaced {
            previous.retire();
        }
        self.caps.events.emit(&AgentEvent::UpdateAvailable {
            version: agent.version(),
        });
        Ok(agent)
    }

    /// Make an already installed version active without fetching anything,
    /// as a host does when it restarts with a version already in control.
    pub async fn adopt(&self, config: AgentConfig) -> Result<Arc<OfflineAgent>> {
        let _guard = self.transition.lock().await;
        let static_name = config.static_cache_name();
        let installed = self
            .caps
            .storage
            .partitions()
            .await?
            .iter()
            .any(|name| *name == static_name);
        if !installed {
            return Err(AgentError::NotInstalled(static_name));
        }

        let agent = Arc::new(OfflineAgent::new(config, self.caps.clone()));
        agent.transition(LifecycleState::Active)?;
        let replaced = self.with_slots(|s| s.active.replace(agent.clone()))?;
        if let Some(previous) = replaced {
            previous.retire();
        }
        debug!(version = agent.version(), "Adopted installed version");
        Ok(agent)
    }

    /// Run the agent's activation, then move it into the active slot. If
    /// activation fails the slots are left as they were.
    async fn activate(&self, agent: Arc<OfflineAgent>) -> Result<()> {
        let deleted = agent.on_activate().await?;
        let replaced = self.with_slots(|s| {
            if s.waiting.as_ref().is_some_and(|w| Arc::ptr_eq(w, &agent)) {
                s.waiting = None;
            }
            s.active.replace(agent.clone())
        })?;
        if let Some(previous) = replaced {
            previous.retire();
        }
        info!(version = agent.version(), deleted = deleted, "Version now in control");
        Ok(())
    }

    /// Promote the waiting agent, if any, without waiting for pages to close.
    /// Returns whether a handoff happened.
    pub async fn skip_waiting(&self) -> Result<bool> {
        let _guard = self.transition.lock().await;
        match self.waiting() {
            Some(agent) => {
                agent.on_message(ControlMessage::SkipWaiting).await;
                self.activate(agent).await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Route a control message. `SkipWaiting` hands control to the waiting
    /// agent; everything else is answered by the active agent, or by the
    /// waiting one before any version has activated.
    pub async fn on_message(&self, message: ControlMessage) -> Result<Option<ControlReply>> {
        match message {
            ControlMessage::SkipWaiting => {
                self.skip_waiting().await?;
                Ok(None)
            }
            other => {
                let agent = self
                    .active()
                    .or_else(|| self.waiting())
                    .ok_or(AgentError::NoActiveInstance)?;
                Ok(agent.on_message(other).await)
            }
        }
    }

    /// Synchronous interception decision. Without an active agent nothing
    /// is intercepted.
    pub fn intercept(&self, request: &Request) -> Intercept {
        match self.active() {
            Some(agent) => agent.intercept(request),
            None => Intercept::Passthrough,
        }
    }

    /// Serve a request through the active agent, or straight from the
    /// network when no version is in control.
    pub async fn fetch(&self, request: &Request) -> FetchOutcome {
        match self.active() {
            Some(agent) => agent.on_fetch(request).await,
            None => {
                strategy::passthrough(self.caps.network.as_ref(), self.caps.events.as_ref(), request)
                    .await
            }
        }
    }

    /// Deliver a background sync event to the active agent.
    pub async fn sync(&self, tag: &str) -> bool {
        match self.active() {
            Some(agent) => agent.on_sync(tag).await,
            None => false,
        }
    }

    /// Ask the host to look for a newer version.
    pub async fn update(&self) {
        self.caps.host.request_update().await;
    }
}
