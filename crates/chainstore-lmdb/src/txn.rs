use chainstore_core::{
    error::{Result, StoreError},
    observe,
};
use lmdb::{Cursor, Database, Environment, RwTransaction, Transaction, WriteFlags};
use std::time::Instant;

use crate::engine::engine_err;

/// Scoped write transaction
///
/// Aborts on drop unless committed. At most one exists per environment at a
/// time; the owning store serializes writers.
pub(crate) struct WriteHandle<'env> {
    txn: Option<RwTransaction<'env>>,
    db: Database,
    ops: usize,
    started: Instant,
}

impl<'env> WriteHandle<'env> {
    pub fn begin(env: &'env Environment, db: Database) -> Result<Self> {
        let txn = env.begin_rw_txn().map_err(engine_err)?;
        Ok(Self {
            txn: Some(txn),
            db,
            ops: 0,
            started: Instant::now(),
        })
    }

    /// Mutations applied so far
    pub fn ops(&self) -> usize {
        self.ops
    }

    fn txn_mut(&mut self) -> Result<&mut RwTransaction<'env>> {
        self.txn
            .as_mut()
            .ok_or_else(|| StoreError::InvalidState("Transaction already committed".into()))
    }

    pub fn put(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        let db = self.db;
        self.txn_mut()?
            .put(db, &key, &value, WriteFlags::empty())
            .map_err(engine_err)?;
        self.ops += 1;
        Ok(())
    }

    /// Delete a key, returning whether it existed
    pub fn del(&mut self, key: &[u8]) -> Result<bool> {
        let db = self.db;
        match self.txn_mut()?.del(db, &key, None) {
            Ok(()) => {
                self.ops += 1;
                Ok(true)
            }
            Err(lmdb::Error::NotFound) => Ok(false),
            Err(e) => Err(engine_err(e)),
        }
    }

    /// Delete the largest key, returning it
    pub fn delete_last(&mut self) -> Result<Option<Vec<u8>>> {
        let db = self.db;
        let txn = self.txn_mut()?;
        let mut cursor = txn.open_rw_cursor(db).map_err(engine_err)?;
        let key = match cursor.get(None, None, lmdb_sys::MDB_LAST) {
            Ok((key, _)) => key.map(<[u8]>::to_vec),
            Err(lmdb::Error::NotFound) => return Ok(None),
            Err(e) => return Err(engine_err(e)),
        };
        cursor.del(WriteFlags::empty()).map_err(engine_err)?;
        drop(cursor);
        self.ops += 1;
        Ok(key)
    }

    /// Remove every entry of the table
    pub fn clear(&mut self) -> Result<()> {
        let db = self.db;
        self.txn_mut()?.clear_db(db).map_err(engine_err)?;
        self.ops += 1;
        Ok(())
    }

    /// Commit, returning the number of mutations
    pub fn commit(mut self, store: &'static str) -> Result<usize> {
        let txn = self
            .txn
            .take()
            .ok_or_else(|| StoreError::InvalidState("Transaction already committed".into()))?;
        txn.commit().map_err(engine_err)?;
        observe::record_commit(store, self.ops, self.started.elapsed());
        tracing::trace!("Committed {} operations", self.ops);
        Ok(self.ops)
    }
}

impl Drop for WriteHandle<'_> {
    fn drop(&mut self) {
        if let Some(txn) = self.txn.take() {
            tracing::trace!("Aborting write transaction with {} operations", self.ops);
            txn.abort();
        }
    }
}
