use std::sync::Arc;

use chipin_core::{ListId, RowId};
use chipin_infra::{
    InMemoryRowStore, ReservationEngine, ReservationError, RowStore, RowStoreError,
};
use chipin_listing::{ConsolidatedItem, ItemRow, ListProgress};

#[cfg(feature = "postgres")]
use chipin_infra::PostgresRowStore;
#[cfg(feature = "postgres")]
use sqlx::PgPool;

type InMemoryEngine = ReservationEngine<Arc<InMemoryRowStore>>;

#[cfg(feature = "postgres")]
type PersistentEngine = ReservationEngine<Arc<PostgresRowStore>>;

#[derive(Clone)]
pub enum AppServices {
    InMemory { engine: Arc<InMemoryEngine> },
    #[cfg(feature = "postgres")]
    Persistent { engine: Arc<PersistentEngine> },
}

pub async fn build_services() -> AppServices {
    let use_persistent = std::env::var("USE_PERSISTENT_STORES")
        .unwrap_or_else(|_| "false".to_string())
        .parse::<bool>()
        .unwrap_or(false);

    if use_persistent {
        #[cfg(feature = "postgres")]
        {
            return build_persistent_services().await;
        }
        #[cfg(not(feature = "postgres"))]
        {
            tracing::warn!(
                "USE_PERSISTENT_STORES=true but postgres feature not enabled, falling back to in-memory"
            );
            return build_in_memory_services();
        }
    }

    build_in_memory_services()
}

fn build_in_memory_services() -> AppServices {
    let store = Arc::new(InMemoryRowStore::new());
    AppServices::InMemory {
        engine: Arc::new(ReservationEngine::new(store)),
    }
}

#[cfg(feature = "postgres")]
async fn build_persistent_services() -> AppServices {
    let database_url = std::env::var("DATABASE_URL")
        .expect("DATABASE_URL must be set when USE_PERSISTENT_STORES=true");

    let pool = PgPool::connect(&database_url)
        .await
        .expect("Failed to connect to Postgres");

    let store = Arc::new(PostgresRowStore::new(pool));
    AppServices::Persistent {
        engine: Arc::new(ReservationEngine::new(store)),
    }
}

/// Run a synchronous engine call off the async worker threads.
///
/// The engine is synchronous by design (the Postgres store bridges into the
/// ambient runtime), so handlers hop onto the blocking pool for every call.
async fn run_blocking<S, T, F>(
    engine: Arc<ReservationEngine<S>>,
    f: F,
) -> Result<T, ReservationError>
where
    S: RowStore + 'static,
    T: Send + 'static,
    F: FnOnce(&ReservationEngine<S>) -> Result<T, ReservationError> + Send + 'static,
{
    tokio::task::spawn_blocking(move || f(&engine))
        .await
        .map_err(|e| {
            ReservationError::Store(RowStoreError::Storage(format!("blocking task failed: {e}")))
        })?
}

impl AppServices {
    pub async fn add_row(
        &self,
        list_id: ListId,
        display_name: String,
        quantity: u32,
        display_order: i32,
    ) -> Result<ItemRow, ReservationError> {
        match self {
            AppServices::InMemory { engine } => {
                run_blocking(engine.clone(), move |e| {
                    e.add_row(list_id, &display_name, quantity, display_order)
                })
                .await
            }
            #[cfg(feature = "postgres")]
            AppServices::Persistent { engine } => {
                run_blocking(engine.clone(), move |e| {
                    e.add_row(list_id, &display_name, quantity, display_order)
                })
                .await
            }
        }
    }

    pub async fn claim(
        &self,
        list_id: ListId,
        item_name: String,
        claimant_name: String,
        quantity: u32,
    ) -> Result<Vec<ItemRow>, ReservationError> {
        match self {
            AppServices::InMemory { engine } => {
                run_blocking(engine.clone(), move |e| {
                    e.claim(list_id, &item_name, &claimant_name, quantity)
                })
                .await
            }
            #[cfg(feature = "postgres")]
            AppServices::Persistent { engine } => {
                run_blocking(engine.clone(), move |e| {
                    e.claim(list_id, &item_name, &claimant_name, quantity)
                })
                .await
            }
        }
    }

    pub async fn unclaim(&self, row_id: RowId) -> Result<ItemRow, ReservationError> {
        match self {
            AppServices::InMemory { engine } => {
                run_blocking(engine.clone(), move |e| e.unclaim(row_id)).await
            }
            #[cfg(feature = "postgres")]
            AppServices::Persistent { engine } => {
                run_blocking(engine.clone(), move |e| e.unclaim(row_id)).await
            }
        }
    }

    pub async fn find_row(&self, row_id: RowId) -> Result<ItemRow, ReservationError> {
        match self {
            AppServices::InMemory { engine } => {
                run_blocking(engine.clone(), move |e| e.find_row(row_id)).await
            }
            #[cfg(feature = "postgres")]
            AppServices::Persistent { engine } => {
                run_blocking(engine.clone(), move |e| e.find_row(row_id)).await
            }
        }
    }

    pub async fn consolidated_view(
        &self,
        list_id: ListId,
    ) -> Result<Vec<ConsolidatedItem>, ReservationError> {
        match self {
            AppServices::InMemory { engine } => {
                run_blocking(engine.clone(), move |e| e.consolidated_view(list_id)).await
            }
            #[cfg(feature = "postgres")]
            AppServices::Persistent { engine } => {
                run_blocking(engine.clone(), move |e| e.consolidated_view(list_id)).await
            }
        }
    }

    pub async fn progress(&self, list_id: ListId) -> Result<ListProgress, ReservationError> {
        match self {
            AppServices::InMemory { engine } => {
                run_blocking(engine.clone(), move |e| e.progress(list_id)).await
            }
            #[cfg(feature = "postgres")]
            AppServices::Persistent { engine } => {
                run_blocking(engine.clone(), move |e| e.progress(list_id)).await
            }
        }
    }
}
