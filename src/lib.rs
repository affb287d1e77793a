//! `sawitdb`: an embeddable, single-file row store.
//!
//! [`Database`] is the public handle: it opens a page file through
//! [`storage::FilePager`], loads the catalog and index directories, and
//! dispatches [`executor::OpDescriptor`]s against them. Everything else in
//! this workspace — `types`, `common`, `codec`, `storage`, `catalog`,
//! `heap`, `index`, `executor` — is a layer `Database` wires together.
//!
//! ```no_run
//! use sawitdb::Database;
//! use executor::OpDescriptor;
//! use common::{Config, Record};
//! use types::Value;
//!
//! let config = Config::builder().data_dir("./my_db".into()).build();
//! let mut db = Database::open(config).unwrap();
//! db.execute(OpDescriptor::CreateTable { table: "panen".into(), is_system: false }).unwrap();
//! db.execute(OpDescriptor::Insert {
//!     table: "panen".into(),
//!     record: Record::new().with("bibit", Value::String("Dura".into())),
//! }).unwrap();
//! db.close().unwrap();
//! ```

pub use catalog::Catalog;
pub use common::{Config, DbError, DbEvent, DbResult, Record};
pub use executor::{Engine, Op, OpDescriptor, OpResult, OrderBy, Predicate, ScanStats};
pub use storage::{FilePager, Pager};
pub use types::{SqlType, Value};

use std::fs;

/// An open database: a pager-backed [`Engine`] over the file named by
/// `config.db_path()`.
pub struct Database {
    engine: Engine<FilePager>,
}

impl Database {
    /// Opens (creating if absent) the page file at `config.db_path()`.
    pub fn open(config: Config) -> DbResult<Self> {
        fs::create_dir_all(&config.data_dir)?;
        let pager = FilePager::open(config.db_path(), config.cache_capacity)?;
        let engine = Engine::open(pager)?;
        Ok(Self { engine })
    }

    pub fn execute(&mut self, op: OpDescriptor) -> DbResult<OpResult> {
        self.engine.execute(op)
    }

    /// Registers a callback run synchronously after every successful
    /// mutating operation (spec §4.6's `OnTableInserted`/`OnTableUpdated`/
    /// `OnTableDeleted` events).
    pub fn subscribe(&mut self, subscriber: impl FnMut(&DbEvent) + 'static) {
        self.engine.subscribe(subscriber);
    }

    /// Flushes every dirty page and closes the underlying file.
    pub fn close(self) -> DbResult<()> {
        self.engine.close()
    }
}
