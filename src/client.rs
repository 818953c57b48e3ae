//! Sync client: owns the store and every entry point that mutates it.
//!
//! - [`SyncClient::bootstrap`] runs the two-phase initial load.
//! - [`SyncClient::handle_event`] feeds one server event through the
//!   dispatcher and runs any follow-up fetch in the background.
//! - [`SyncClient::sync_session`] fetches full detail for one session, once.
//!
//! Fetches never hold the store lock. Each fetch result is applied under a
//! single lock acquisition, so readers never observe a half-applied update.
//! Readers take snapshots with [`SyncClient::read`] and learn about changes by
//! subscribing to the change channel.

use crate::api::ServerApi;
use crate::dispatch::FollowUp;
use crate::error::{Error, Result};
use crate::event::Event;
use crate::model::{ActivityStatus, Session, SessionStatus};
use crate::store::{Change, MESSAGE_LIMIT, SessionDetail, StoreStatus, SyncStore};
use crate::time::now_ms;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

const CHANGE_BUFFER: usize = 4096;

pub struct SyncClient<A> {
    api: Arc<A>,
    store: Arc<Mutex<SyncStore>>,
    changes: broadcast::Sender<Change>,
}

impl<A> Clone for SyncClient<A> {
    fn clone(&self) -> Self {
        Self {
            api: Arc::clone(&self.api),
            store: Arc::clone(&self.store),
            changes: self.changes.clone(),
        }
    }
}

/// Receiver half of the change channel.
#[derive(Debug)]
pub struct ChangeRx {
    rx: broadcast::Receiver<Change>,
}

impl ChangeRx {
    /// Next change, or `None` once the client is gone.
    ///
    /// Lagging is not an error: readers re-read the slice they render, so a
    /// skipped notification only delays them to the next one.
    pub async fn recv(&mut self) -> Option<Change> {
        loop {
            match self.rx.recv().await {
                Ok(change) => return Some(change),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    debug!(skipped, "change receiver lagged");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

impl<A: ServerApi + 'static> SyncClient<A> {
    pub fn new(api: A) -> Self {
        Self::from_arc(Arc::new(api))
    }

    pub fn from_arc(api: Arc<A>) -> Self {
        let (changes, _rx) = broadcast::channel(CHANGE_BUFFER);
        Self {
            api,
            store: Arc::new(Mutex::new(SyncStore::new())),
            changes,
        }
    }

    pub fn subscribe(&self) -> ChangeRx {
        ChangeRx {
            rx: self.changes.subscribe(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SyncStore> {
        self.store.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run `f` against a consistent view of the store.
    pub fn read<R>(&self, f: impl FnOnce(&SyncStore) -> R) -> R {
        f(&*self.lock())
    }

    /// Mutate the store as one batch, then publish what changed.
    fn write<R>(&self, f: impl FnOnce(&mut SyncStore) -> R) -> R {
        let (result, changes) = {
            let mut store = self.lock();
            let result = f(&mut *store);
            (result, store.take_changes())
        };
        for change in changes {
            // no subscribers is fine
            let _ = self.changes.send(change);
        }
        result
    }

    pub fn status(&self) -> StoreStatus {
        self.read(SyncStore::status)
    }

    pub fn ready(&self) -> bool {
        self.read(SyncStore::ready)
    }

    pub fn session(&self, session_id: &str) -> Option<Session> {
        self.read(|store| store.session(session_id).cloned())
    }

    pub fn session_activity(&self, session_id: &str) -> ActivityStatus {
        self.read(|store| store.derived_status(session_id))
    }

    pub fn session_status(&self, session_id: &str) -> Option<SessionStatus> {
        self.read(|store| store.session_status(session_id).cloned())
    }

    // -----------------------------------------------------------------------
    // Events
    // -----------------------------------------------------------------------

    /// Apply one event. If it needs a refetch, that runs on a background task
    /// whose handle is returned.
    pub fn handle_event(&self, event: Event) -> Option<JoinHandle<()>> {
        let follow_up = self.write(|store| store.apply(event, now_ms()))?;
        let client = self.clone();
        Some(tokio::spawn(async move {
            client.run_follow_up(follow_up).await;
        }))
    }

    /// Fetch and apply a follow-up. Failures are logged and dropped; the next
    /// event or reconnect repairs the state.
    pub async fn run_follow_up(&self, follow_up: FollowUp) {
        match follow_up {
            FollowUp::RefreshLsp => match self.api.lsp_status().await {
                Ok(lsp) => self.write(|store| store.set_lsp(lsp)),
                Err(e) => debug!(error = %e, "lsp refresh dropped"),
            },
            FollowUp::ReconcileStatuses => match self.api.session_statuses().await {
                Ok(statuses) => {
                    self.write(|store| store.reconcile_statuses(statuses, now_ms()));
                }
                Err(e) => warn!(error = %e, "status reconciliation failed"),
            },
        }
    }

    // -----------------------------------------------------------------------
    // Bootstrap
    // -----------------------------------------------------------------------

    /// Run the critical load, then start the enrichment load in the
    /// background. An error here is fatal for the application.
    ///
    /// Not guarded against re-entry; callers should only invoke it once.
    pub async fn bootstrap(&self) -> Result<JoinHandle<Result<()>>> {
        if let Err(e) = self.load_critical().await {
            error!(error = %e, "bootstrap failed");
            return Err(e);
        }
        let client = self.clone();
        Ok(tokio::spawn(async move { client.load_enrichment().await }))
    }

    /// Phase 1: providers, provider list, agents and config. All must
    /// succeed; on success the store becomes `partial`.
    pub async fn load_critical(&self) -> Result<()> {
        info!("loading providers, agents and config");
        let api = &self.api;
        let (provider_config, provider_list, agents, config) = tokio::try_join!(
            api.provider_config(),
            api.provider_list(),
            api.agents(),
            api.config()
        )?;
        self.write(|store| {
            store.set_provider_config(provider_config);
            store.set_provider_list(provider_list);
            store.set_agents(agents);
            store.set_config(config);
            store.advance(StoreStatus::Partial);
        });
        Ok(())
    }

    /// Phase 2: everything else. Each result is applied as it arrives. The
    /// store becomes `complete` only if every fetch succeeded; otherwise the
    /// first error is returned and the store stays `partial`.
    pub async fn load_enrichment(&self) -> Result<()> {
        let api = &self.api;
        let results = tokio::join!(
            async {
                let sessions = api.sessions().await?;
                self.write(|store| store.set_sessions(sessions));
                Ok::<_, Error>(())
            },
            async {
                let commands = api.commands().await?;
                self.write(|store| store.set_commands(commands));
                Ok::<_, Error>(())
            },
            async {
                let lsp = api.lsp_status().await?;
                self.write(|store| store.set_lsp(lsp));
                Ok::<_, Error>(())
            },
            async {
                let mcp = api.mcp_status().await?;
                self.write(|store| store.set_mcp(mcp));
                Ok::<_, Error>(())
            },
            async {
                let formatters = api.formatter_status().await?;
                self.write(|store| store.set_formatters(formatters));
                Ok::<_, Error>(())
            },
            async {
                let statuses = api.session_statuses().await?;
                // the snapshot omits idle sessions, so anything busy locally
                // but absent here is forced idle
                self.write(|store| store.reconcile_statuses(statuses, now_ms()));
                Ok::<_, Error>(())
            },
            async {
                let auth = api.provider_auth().await?;
                self.write(|store| store.set_provider_auth(auth));
                Ok::<_, Error>(())
            },
            async {
                let vcs = api.vcs().await?;
                self.write(|store| store.set_vcs(vcs));
                Ok::<_, Error>(())
            },
            async {
                let path = api.path().await?;
                self.write(|store| store.set_path(path));
                Ok::<_, Error>(())
            },
            async {
                let ptys = api.ptys().await?;
                self.write(|store| store.set_ptys(ptys));
                Ok::<_, Error>(())
            },
            async {
                let enabled = api.permission_bypass().await.unwrap_or_else(|e| {
                    debug!(error = %e, "permission bypass fetch failed, assuming disabled");
                    false
                });
                self.write(|store| store.set_permission_bypass(enabled));
                Ok::<_, Error>(())
            }
        );

        let (sessions, commands, lsp, mcp, formatter, statuses, auth, vcs, path, pty, bypass) =
            results;
        let mut first_error = None;
        for result in [
            sessions, commands, lsp, mcp, formatter, statuses, auth, vcs, path, pty, bypass,
        ] {
            if let Err(e) = result {
                error!(error = %e, "bootstrap enrichment failed");
                first_error.get_or_insert(e);
            }
        }
        if let Some(e) = first_error {
            return Err(e);
        }

        self.write(|store| store.advance(StoreStatus::Complete));
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Session detail
    // -----------------------------------------------------------------------

    /// Fetch full detail for a session the first time it is asked for.
    /// Later calls return immediately without touching the network.
    pub async fn sync_session(&self, session_id: &str) -> Result<()> {
        if self.read(|store| store.is_synced(session_id)) {
            return Ok(());
        }
        debug!(%session_id, "syncing session");
        let api = &self.api;
        let (session, messages, todos, diff) = tokio::try_join!(
            api.session(session_id),
            api.session_messages(session_id, MESSAGE_LIMIT),
            api.session_todos(session_id),
            api.session_diff(session_id)
        )?;
        let count = messages.len();
        self.write(|store| {
            store.apply_session_detail(SessionDetail {
                session_id: session_id.to_string(),
                session,
                messages,
                todos,
                diff,
            })
        });
        info!(%session_id, messages = count, "session synced");
        Ok(())
    }
}
