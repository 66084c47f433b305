//! A running calendar for one actor.
//!
//! The session keeps the local state in sync with the store through one
//! snapshot listener per collection and runs the materializer on a timer.
//! Both stop together on [`CalendarSession::shutdown`].

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use tutorsync_core::calendar::EntityType;
use tutorsync_core::meeting::MeetingProvider;
use tutorsync_core::notification::NotificationOutbox;
use tutorsync_core::policy::Actor;
use tutorsync_core::storage::{EventStore, RepositoryError, Subscription};

use crate::config::Config;
use crate::coordinator::MutationCoordinator;
use crate::materializer::Materializer;
use crate::notify::NotificationGate;
use crate::state::{CalendarState, CalendarView};

pub struct CalendarSession {
    actor: Actor,
    state: Arc<CalendarState>,
    coordinator: MutationCoordinator,
    shutdown_tx: broadcast::Sender<()>,
    tasks: Vec<JoinHandle<()>>,
}

impl CalendarSession {
    /// Loads the calendar, subscribes to the store and starts the materialization timer.
    ///
    /// The first materialization pass runs right away.
    pub async fn start(
        actor: Actor,
        config: &Config,
        store: Arc<dyn EventStore>,
        state: Arc<CalendarState>,
        outbox: Arc<dyn NotificationOutbox>,
        meetings: Arc<dyn MeetingProvider>,
    ) -> Result<Self, RepositoryError> {
        let mut subscriptions = Vec::with_capacity(EntityType::ALL.len());
        for collection in EntityType::ALL {
            let events = store.get_all(collection).await?;
            state.replace_slice(collection, events).await;
            subscriptions.push(store.subscribe(collection).await?);
        }

        let (shutdown_tx, _) = broadcast::channel(1);
        let mut tasks: Vec<JoinHandle<()>> = subscriptions
            .into_iter()
            .map(|subscription| {
                spawn_listener(subscription, state.clone(), shutdown_tx.subscribe())
            })
            .collect();

        let materializer = Materializer::new(store.clone(), state.clone())
            .with_batch_size(config.materialize_batch_size);
        tasks.push(spawn_timer(
            materializer,
            config.materialize_interval(),
            shutdown_tx.subscribe(),
        ));

        let coordinator = MutationCoordinator::new(
            store,
            state.clone(),
            NotificationGate::new(outbox),
            meetings,
        )
        .with_batch_size(config.materialize_batch_size);

        tracing::info!(role = %actor.role, email = %actor.email, "Calendar session started");

        Ok(Self {
            actor,
            state,
            coordinator,
            shutdown_tx,
            tasks,
        })
    }

    pub fn actor(&self) -> &Actor {
        &self.actor
    }

    pub fn state(&self) -> &Arc<CalendarState> {
        &self.state
    }

    pub fn coordinator(&self) -> &MutationCoordinator {
        &self.coordinator
    }

    /// The calendar as the session's actor sees it.
    pub async fn view(&self) -> CalendarView {
        self.state.view(&self.actor).await
    }

    /// Stops the snapshot listeners and the materialization timer.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(());
        for task in self.tasks {
            if let Err(err) = task.await {
                tracing::warn!(error = %err, "Session task ended abnormally");
            }
        }
        tracing::info!(email = %self.actor.email, "Calendar session stopped");
    }
}

fn spawn_listener(
    mut subscription: Subscription,
    state: Arc<CalendarState>,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let collection = subscription.collection();
        tracing::debug!(%collection, "Snapshot listener started");

        loop {
            tokio::select! {
                snapshot = subscription.next_snapshot() => {
                    match snapshot {
                        Some(snapshot) => {
                            state.reconcile_slice(snapshot.collection, snapshot.events).await;
                        }
                        None => {
                            tracing::info!(%collection, "Snapshot feed closed");
                            break;
                        }
                    }
                }
                _ = shutdown_rx.recv() => {
                    tracing::debug!(%collection, "Snapshot listener shutting down");
                    break;
                }
            }
        }

        subscription.unsubscribe();
    })
}

fn spawn_timer(
    materializer: Materializer,
    period: Duration,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(err) = materializer.run_once(Utc::now()).await {
                        tracing::error!(error = %err, "Materialization pass failed");
                    }
                }
                _ = shutdown_rx.recv() => {
                    tracing::debug!("Materialization timer shutting down");
                    break;
                }
            }
        }
    })
}
