//! Shared application state.
//!
//! `CoreState` is built once at startup and shared as `Arc<CoreState>` by
//! every request handler. The SQLite connection and the mock generator sit
//! behind their own mutexes; a lock is held for one load, mutation or save
//! and released before any await point.

use std::sync::{Mutex, MutexGuard};

use chrono::{NaiveDate, Utc};
use rusqlite::Connection;

use crate::config::Settings;
use crate::crud::{Collection, CrudContext, Record};
use crate::db;
use crate::generator::MockRng;
use crate::loader::LoaderService;
use crate::notify::NotificationCenter;
use crate::operations::OperationRegistry;
use crate::pipeline::Screen;

pub struct CoreState {
    conn: Mutex<Connection>,
    rng: Mutex<MockRng>,
    pub settings: Settings,
    pub loader: LoaderService,
    pub notices: NotificationCenter,
    pub operations: OperationRegistry,
}

impl CoreState {
    /// Open the on-disk store named in `settings`.
    pub fn open(settings: Settings) -> Result<Self, CoreError> {
        let conn = db::open_database(&settings.database_path)?;
        tracing::info!(path = %settings.database_path.display(), "Record store opened");
        Ok(Self::with_connection(conn, settings))
    }

    /// In-memory store with default settings and the given generator seed.
    pub fn in_memory(seed: Option<u64>) -> Result<Self, CoreError> {
        let mut settings = Settings::from_env();
        settings.seed = seed;
        settings.simulated_latency = std::time::Duration::ZERO;
        let conn = db::open_memory_database()?;
        Ok(Self::with_connection(conn, settings))
    }

    fn with_connection(conn: Connection, settings: Settings) -> Self {
        Self {
            conn: Mutex::new(conn),
            rng: Mutex::new(MockRng::from_seed_option(settings.seed)),
            settings,
            loader: LoaderService::new(),
            notices: NotificationCenter::new(),
            operations: OperationRegistry::new(),
        }
    }

    pub fn today(&self) -> NaiveDate {
        Utc::now().date_naive()
    }

    fn lock_conn(&self) -> Result<MutexGuard<'_, Connection>, CoreError> {
        self.conn.lock().map_err(|_| CoreError::LockPoisoned)
    }

    fn lock_rng(&self) -> Result<MutexGuard<'_, MockRng>, CoreError> {
        self.rng.lock().map_err(|_| CoreError::LockPoisoned)
    }

    /// Run `f` against the raw connection.
    pub fn with_conn<T, E>(&self, f: impl FnOnce(&Connection) -> Result<T, E>) -> Result<T, E>
    where
        E: From<CoreError>,
    {
        let conn = self.lock_conn()?;
        f(&conn)
    }

    /// A screen's stored records, generated and persisted on first use.
    pub fn records<S: Screen>(&self) -> Result<Vec<S::Record>, CoreError> {
        let today = self.today();
        let conn = self.lock_conn()?;
        let mut rng = self.lock_rng()?;
        let records = db::load_or_init(&conn, S::STORAGE_KEY, S::RECORD_VERSION, || {
            S::generate(&mut rng, today)
        })?;
        Ok(records)
    }

    /// Throw away a screen's records and store a freshly generated set.
    pub fn regenerate<S: Screen>(&self) -> Result<Vec<S::Record>, CoreError> {
        let today = self.today();
        let conn = self.lock_conn()?;
        let records = S::generate(&mut *self.lock_rng()?, today);
        db::save_records(&conn, S::STORAGE_KEY, S::RECORD_VERSION, &records)?;
        tracing::info!(screen = S::NAME, count = records.len(), "Regenerated record set");
        Ok(records)
    }

    pub fn insights<S: Screen>(&self, records: &[S::Record]) -> Result<S::Insights, CoreError> {
        let today = self.today();
        let mut rng = self.lock_rng()?;
        Ok(S::insights(records, &mut rng, today))
    }

    /// Load a screen's records as a [`Collection`] and run one mutation on it.
    pub fn mutate<S, T, E>(
        &self,
        label: &'static str,
        f: impl FnOnce(&mut Collection<S::Record>, &CrudContext<'_>, &mut MockRng) -> Result<T, E>,
    ) -> Result<T, E>
    where
        S: Screen,
        S::Record: Record,
        E: From<CoreError>,
    {
        self.with_workspace(|ws| {
            let mut collection = ws.collection::<S>(label)?;
            let ctx = ws.ctx();
            f(&mut collection, &ctx, &mut *ws.rng)
        })
    }

    /// Run a mutation that spans several screens' collections under one
    /// lock of the store and the generator.
    pub fn with_workspace<T, E>(
        &self,
        f: impl FnOnce(&mut Workspace<'_>) -> Result<T, E>,
    ) -> Result<T, E>
    where
        E: From<CoreError>,
    {
        let conn = self.lock_conn()?;
        let mut rng = self.lock_rng()?;
        let mut ws = Workspace {
            conn: &conn,
            notices: &self.notices,
            rng: &mut rng,
            today: self.today(),
        };
        f(&mut ws)
    }
}

/// The locked store and generator, lent to one mutation.
pub struct Workspace<'a> {
    conn: &'a Connection,
    notices: &'a NotificationCenter,
    pub rng: &'a mut MockRng,
    pub today: NaiveDate,
}

impl<'a> Workspace<'a> {
    pub fn ctx(&self) -> CrudContext<'a> {
        CrudContext {
            conn: self.conn,
            notices: self.notices,
        }
    }

    /// A screen's stored records, generated and persisted on first use.
    pub fn collection<S>(&mut self, label: &'static str) -> Result<Collection<S::Record>, CoreError>
    where
        S: Screen,
        S::Record: Record,
    {
        let rng = &mut *self.rng;
        let today = self.today;
        Ok(Collection::load_or_init(
            self.conn,
            S::STORAGE_KEY,
            S::RECORD_VERSION,
            label,
            || S::generate(rng, today),
        )?)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Internal lock error")]
    LockPoisoned,
    #[error("Database error: {0}")]
    Database(#[from] db::DatabaseError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::AdverseEventScreen;
    use crate::api::error::ApiError;
    use crate::inventory::InventoryScreen;
    use crate::notify::AutoConfirm;

    fn state() -> CoreState {
        CoreState::in_memory(Some(11)).unwrap()
    }

    #[test]
    fn records_are_generated_once_then_reloaded() {
        let state = state();
        let first = state.records::<InventoryScreen>().unwrap();
        let second = state.records::<InventoryScreen>().unwrap();
        assert_eq!(first, second);
        let stored = state
            .with_conn(|conn| db::list_entries(conn).map_err(CoreError::from))
            .unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].key, "vaccineBatches");
    }

    #[test]
    fn regenerate_replaces_stored_set() {
        let state = state();
        let first = state.records::<InventoryScreen>().unwrap();
        let fresh = state.regenerate::<InventoryScreen>().unwrap();
        assert_ne!(first, fresh);
        assert_eq!(state.records::<InventoryScreen>().unwrap(), fresh);
    }

    #[test]
    fn mutation_persists_and_notifies() {
        let state = state();
        let before = state.records::<AdverseEventScreen>().unwrap();
        let id = before[0].id.clone();

        state
            .mutate::<AdverseEventScreen, _, ApiError>("Adverse event", |events, ctx, _| {
                events.delete(ctx, &id, &AutoConfirm(true))?;
                Ok(())
            })
            .unwrap();

        let after = state.records::<AdverseEventScreen>().unwrap();
        assert_eq!(after.len(), before.len() - 1);
        assert_eq!(
            state.notices.last().unwrap().message,
            "Adverse event deleted successfully"
        );
    }

    #[test]
    fn in_memory_disables_latency() {
        assert!(state().settings.simulated_latency.is_zero());
    }
}
