use std::sync::Arc;

use chrono::Utc;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value as JsonValue;
use thiserror::Error;
use tracing::{info, warn};

use sahakari_billing::{Subscription, SubscriptionStatus, SUBSCRIPTION_ID};
use sahakari_core::{Aggregate, AggregateId, DomainError, TenantId};
use sahakari_events::{EventBus, EventEnvelope, InMemoryEventBus, Subscription as BusSubscription};
use sahakari_infra::{
    event_store::{EventStore, EventStoreError, InMemoryEventStore, StoredEvent},
    CommandDispatcher, DispatchError, ProjectionHub, RebuildError, RebuildReport,
};
use sahakari_reports::LedgerRecord;

#[cfg(feature = "postgres")]
use sahakari_infra::event_store::PostgresEventStore;

use crate::config::ApiConfig;

/// Event store behind the API; in-memory or Postgres depending on config.
pub type SharedStore = Arc<dyn EventStore>;

type Bus = InMemoryEventBus<EventEnvelope<JsonValue>>;
type Dispatcher = CommandDispatcher<SharedStore, Arc<Bus>>;

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("USE_PERSISTENT_STORES=true needs a build with the `postgres` feature")]
    PersistenceUnavailable,

    #[error("DATABASE_URL must be set when USE_PERSISTENT_STORES=true")]
    MissingDatabaseUrl,

    #[error(transparent)]
    Store(#[from] EventStoreError),
}

/// Write path (dispatcher) and read path (projection hub) shared by handlers.
pub struct AppServices {
    dispatcher: Dispatcher,
    store: SharedStore,
    hub: Arc<ProjectionHub>,
    enforce_subscription: bool,
}

pub async fn build_services(config: &ApiConfig) -> Result<AppServices, StartupError> {
    let store: SharedStore = if config.use_persistent_stores {
        persistent_store(config).await?
    } else {
        Arc::new(InMemoryEventStore::new())
    };

    let bus: Arc<Bus> = Arc::new(InMemoryEventBus::new());
    let hub = Arc::new(ProjectionHub::new());

    spawn_projection_worker(bus.subscribe(), hub.clone(), store.clone());

    info!(
        persistent = config.use_persistent_stores,
        enforce_subscription = config.enforce_subscription,
        "services ready"
    );

    Ok(AppServices {
        dispatcher: CommandDispatcher::new(store.clone(), bus),
        store,
        hub,
        enforce_subscription: config.enforce_subscription,
    })
}

#[cfg(feature = "postgres")]
async fn persistent_store(config: &ApiConfig) -> Result<SharedStore, StartupError> {
    let url = config.database_url.as_deref().ok_or(StartupError::MissingDatabaseUrl)?;
    let store = PostgresEventStore::connect(url).await?;
    store.migrate().await?;
    info!("connected to postgres event store");
    Ok(Arc::new(store))
}

#[cfg(not(feature = "postgres"))]
async fn persistent_store(config: &ApiConfig) -> Result<SharedStore, StartupError> {
    if config.database_url.is_none() {
        return Err(StartupError::MissingDatabaseUrl);
    }
    Err(StartupError::PersistenceUnavailable)
}

/// Background subscriber: bus -> projections.
fn spawn_projection_worker(
    sub: BusSubscription<EventEnvelope<JsonValue>>,
    hub: Arc<ProjectionHub>,
    store: SharedStore,
) {
    tokio::task::spawn_blocking(move || loop {
        match sub.recv() {
            Ok(env) => {
                if let Err(e) = hub.apply_published(&env, &store) {
                    warn!(
                        tenant_id = %env.tenant_id(),
                        aggregate_type = env.aggregate_type(),
                        sequence_number = env.sequence_number(),
                        error = %e,
                        "projection apply failed"
                    );
                }
            }
            Err(_) => break,
        }
    });
}

impl AppServices {
    pub fn dispatch<A>(
        &self,
        tenant_id: TenantId,
        aggregate_id: AggregateId,
        aggregate_type: &str,
        command: A::Command,
        make_aggregate: impl FnOnce(TenantId, AggregateId) -> A,
    ) -> Result<Vec<StoredEvent>, DispatchError>
    where
        A: Aggregate<Error = DomainError>,
        A::Event: sahakari_events::Event + Serialize + DeserializeOwned,
    {
        self.dispatcher
            .dispatch::<A>(tenant_id, aggregate_id, aggregate_type, command, make_aggregate)
    }

    /// Current state of one aggregate, straight from its stream.
    pub fn load<A>(
        &self,
        tenant_id: TenantId,
        aggregate_id: AggregateId,
        make_aggregate: impl FnOnce(TenantId, AggregateId) -> A,
    ) -> Result<A, DispatchError>
    where
        A: Aggregate,
        A::Event: DeserializeOwned,
    {
        self.dispatcher.load(tenant_id, aggregate_id, make_aggregate)
    }

    /// Read models for `tenant_id`, replayed from the store first if this
    /// process has not seen the tenant yet.
    pub fn views(&self, tenant_id: TenantId) -> Result<&ProjectionHub, RebuildError> {
        self.hub.ensure_warm(tenant_id, &self.store)?;
        Ok(&self.hub)
    }

    pub fn ledger_records(&self, tenant_id: TenantId) -> Result<Vec<LedgerRecord>, RebuildError> {
        Ok(self.views(tenant_id)?.ledger.records(tenant_id))
    }

    pub fn rebuild(&self, tenant_id: TenantId) -> Result<RebuildReport, RebuildError> {
        self.hub.rebuild_tenant(tenant_id, &self.store)
    }

    pub fn subscription_status(&self, tenant_id: TenantId) -> Result<SubscriptionStatus, DispatchError> {
        let subscription = self.load(tenant_id, SUBSCRIPTION_ID, |_, id| Subscription::empty(id))?;
        Ok(subscription.status(Utc::now()))
    }

    /// Whether ledger writes require an Active or Grace subscription.
    pub fn enforces_subscription(&self) -> bool {
        self.enforce_subscription
    }
}
