use std::sync::Arc;

use event_bus::{BusError, EventBus, EventType};
use playground_store::{Instance, PlaygroundStore, StoreError};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::task::Task;

/// Drives every registered [`Task`] for each instance the platform knows
/// about, and owns their shutdown.
#[derive(Clone)]
pub struct Scheduler {
    store: Arc<dyn PlaygroundStore>,
    tasks: Arc<Vec<Arc<dyn Task>>>,
    root: CancellationToken,
}

impl Scheduler {
    pub fn new(store: Arc<dyn PlaygroundStore>, tasks: Vec<Arc<dyn Task>>) -> Self {
        Self {
            store,
            tasks: Arc::new(tasks),
            root: CancellationToken::new(),
        }
    }

    pub fn task_names(&self) -> Vec<String> {
        self.tasks.iter().map(|t| t.name().to_string()).collect()
    }

    /// Runs each task for `instance`. A failing task is logged and does not
    /// keep the others from running.
    pub async fn schedule(&self, instance: &Instance) {
        for task in self.tasks.iter() {
            if let Err(err) = task.run(self.root.child_token(), instance).await {
                warn!(
                    task = task.name(),
                    instance = %instance.name,
                    error = %err,
                    "task failed"
                );
            }
        }
    }

    /// Schedules every instance of every stored session. Used at boot so
    /// workers lost with the previous process come back.
    pub async fn schedule_existing(&self) -> Result<usize, StoreError> {
        let mut scheduled = 0;
        for session in self.store.session_get_all().await? {
            for instance in self.store.instances_by_session(&session.id).await? {
                self.schedule(&instance).await;
                scheduled += 1;
            }
        }
        info!(scheduled, "scheduled existing instances");
        Ok(scheduled)
    }

    /// Schedules instances announced on the bus as `instance new`
    /// (`id` = session id, first arg = instance name).
    pub fn listen(&self, events: &EventBus) -> JoinHandle<()> {
        let mut created = events.subscribe(EventType::InstanceNew);
        let scheduler = self.clone();
        tokio::spawn(async move {
            loop {
                let event = tokio::select! {
                    _ = scheduler.root.cancelled() => break,
                    event = created.recv() => event,
                };
                match event {
                    Ok(event) => scheduler.schedule_named(&event.id, event.args.first()).await,
                    Err(BusError::Lagged(skipped)) => {
                        warn!(skipped, "instance events lagged; some instances were not scheduled")
                    }
                    Err(BusError::Closed) => break,
                    Err(err) => warn!(error = %err, "ignoring malformed instance event"),
                }
            }
            debug!("scheduler listener stopped");
        })
    }

    async fn schedule_named(&self, session_id: &str, name: Option<&String>) {
        let Some(name) = name else {
            warn!(%session_id, "instance event without instance name");
            return;
        };
        match self.store.instance_get(name).await {
            Ok(instance) => self.schedule(&instance).await,
            Err(err) if err.is_not_found() => {
                debug!(%session_id, instance = %name, "announced instance already gone")
            }
            Err(err) => warn!(%session_id, instance = %name, error = %err, "failed to load instance"),
        }
    }

    /// Stops the listener and every task's background work, waiting for it
    /// to finish.
    pub async fn shutdown(&self) {
        self.root.cancel();
        for task in self.tasks.iter() {
            task.shutdown().await;
        }
        info!("scheduler stopped");
    }
}
