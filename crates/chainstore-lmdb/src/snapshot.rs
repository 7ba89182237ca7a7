use chainstore_core::{
    error::{Result, StoreError},
    observe,
};
use lmdb::{Cursor, Database, Environment, RoTransaction, Transaction};
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::engine::engine_err;

/// Consecutive renewal failures after which a snapshot reports itself unusable
pub const MAX_RENEWAL_FAILURES: u32 = 3;

/// Outcome of [`Snapshot::renew`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenewalOutcome {
    /// The existing transaction was reset and renewed
    Renewed,
    /// Renewal failed; a fresh transaction was opened, or will be on the next renewal
    Retried,
    /// Renewal failed [`MAX_RENEWAL_FAILURES`] times in a row
    PersistentFailure,
}

impl RenewalOutcome {
    fn label(self) -> &'static str {
        match self {
            RenewalOutcome::Renewed => "renewed",
            RenewalOutcome::Retried => "retried",
            RenewalOutcome::PersistentFailure => "failed",
        }
    }
}

/// Long-lived read-only view of a store
///
/// A snapshot sees the data committed when it was opened (or last renewed).
/// Renewing moves it forward to the latest committed data without allocating
/// a new reader slot. While any snapshot holds a transaction the map cannot
/// be grown, so callers renew right before reading and drop snapshots they
/// no longer need.
pub struct Snapshot<'env> {
    env: &'env Environment,
    db: Database,
    live: &'env AtomicUsize,
    txn: Option<RoTransaction<'env>>,
    failures: u32,
}

impl<'env> Snapshot<'env> {
    pub(crate) fn open(env: &'env Environment, db: Database, live: &'env AtomicUsize) -> Result<Self> {
        let txn = env.begin_ro_txn().map_err(engine_err)?;
        live.fetch_add(1, Ordering::SeqCst);
        Ok(Self {
            env,
            db,
            live,
            txn: Some(txn),
            failures: 0,
        })
    }

    pub(crate) fn belongs_to(&self, env: &Environment) -> bool {
        std::ptr::eq(self.env, env)
    }

    /// Whether the snapshot currently holds a transaction
    pub fn is_active(&self) -> bool {
        self.txn.is_some()
    }

    /// Consecutive failed renewals since the last success
    pub fn failures(&self) -> u32 {
        self.failures
    }

    /// Move the snapshot forward to the latest committed data
    #[must_use]
    pub fn renew(&mut self) -> RenewalOutcome {
        let renewed = match self.detach() {
            Some(txn) => match txn.reset().renew() {
                Ok(txn) => Some(txn),
                Err(e) => {
                    tracing::warn!("Failed to renew read transaction: {}", e);
                    None
                }
            },
            None => None,
        };

        let outcome = match renewed {
            Some(txn) => {
                self.attach(txn);
                RenewalOutcome::Renewed
            }
            None => match self.env.begin_ro_txn() {
                Ok(txn) => {
                    self.attach(txn);
                    RenewalOutcome::Retried
                }
                Err(e) => {
                    self.failures += 1;
                    tracing::error!(
                        "Failed to open read transaction ({} in a row): {}",
                        self.failures,
                        e
                    );
                    if self.failures >= MAX_RENEWAL_FAILURES {
                        RenewalOutcome::PersistentFailure
                    } else {
                        RenewalOutcome::Retried
                    }
                }
            },
        };
        observe::record_renewal(outcome.label());
        outcome
    }

    /// Get a value by key
    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        match self.active()?.get(self.db, &key) {
            Ok(bytes) => Ok(Some(bytes.to_vec())),
            Err(lmdb::Error::NotFound) => Ok(None),
            Err(e) => Err(engine_err(e)),
        }
    }

    /// Largest key in the table
    pub fn last_key(&self) -> Result<Option<Vec<u8>>> {
        let cursor = self.active()?.open_ro_cursor(self.db).map_err(engine_err)?;
        match cursor.get(None, None, lmdb_sys::MDB_LAST) {
            Ok((key, _)) => Ok(key.map(<[u8]>::to_vec)),
            Err(lmdb::Error::NotFound) => Ok(None),
            Err(e) => Err(engine_err(e)),
        }
    }

    fn active(&self) -> Result<&RoTransaction<'env>> {
        self.txn
            .as_ref()
            .ok_or(StoreError::SnapshotUnavailable(self.failures))
    }

    fn attach(&mut self, txn: RoTransaction<'env>) {
        self.failures = 0;
        self.txn = Some(txn);
        self.live.fetch_add(1, Ordering::SeqCst);
    }

    fn detach(&mut self) -> Option<RoTransaction<'env>> {
        let txn = self.txn.take();
        if txn.is_some() {
            self.live.fetch_sub(1, Ordering::SeqCst);
        }
        txn
    }
}

impl Drop for Snapshot<'_> {
    fn drop(&mut self) {
        // RoTransaction aborts itself on drop
        self.detach();
    }
}
