//! RocksDB-backed persistent settlement store.
//!
//! Implements [`SettlementStore`] using column families for user rows,
//! cycle records, referral shares, and metadata. All mutations use atomic
//! [`WriteBatch`] for crash safety.
//!
//! Commits take per-user locks (the settling user plus every credited
//! referrer, in id order) from an in-process lock table, so two
//! settlements touching the same rows serialize instead of clobbering
//! each other's read-modify-write.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use parking_lot::Mutex;
use rocksdb::{ColumnFamilyDescriptor, Options, SliceTransform, WriteBatch, DB};
use tracing::warn;

use arbot_core::error::StoreError;
use arbot_core::traits::SettlementStore;
use arbot_core::types::{CycleRecord, ReferralShareRecord, SettlementPlan, UserId, UserSnapshot};

// --- Column family names ---

const CF_USERS: &str = "users";
const CF_CYCLES: &str = "cycles";
const CF_SHARES: &str = "shares";
const CF_METADATA: &str = "metadata";

/// All column family names.
const ALL_CFS: &[&str] = &[CF_USERS, CF_CYCLES, CF_SHARES, CF_METADATA];

// --- Metadata keys ---

const META_SCHEMA_VERSION: &[u8] = b"schema_version";

const SCHEMA_VERSION: u64 = 1;

/// RocksDB-backed persistent settlement store.
///
/// Stores user rows, append-only cycle records, referral shares, and
/// metadata in separate column families. Cycle and share keys start with
/// an 8-byte big-endian user id so per-user scans are prefix seeks.
pub struct RocksStore {
    db: DB,
    /// Per-user commit locks, created on first use.
    locks: DashMap<u64, Arc<Mutex<()>>>,
    lock_timeout: Duration,
}

impl RocksStore {
    /// Open or create a database at the given path with the default
    /// 2-second lock timeout.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        Self::open_with_lock_timeout(path, Duration::from_secs(2))
    }

    /// Open or create a database at the given path.
    ///
    /// Creates all column families if they don't exist and stamps the
    /// schema version on first open.
    pub fn open_with_lock_timeout(
        path: impl AsRef<Path>,
        lock_timeout: Duration,
    ) -> Result<Self, StoreError> {
        let mut db_opts = Options::default();
        db_opts.create_if_missing(true);
        db_opts.create_missing_column_families(true);

        let cf_descriptors: Vec<ColumnFamilyDescriptor> = ALL_CFS
            .iter()
            .map(|name| {
                let mut opts = Options::default();
                // Cycle and share keys lead with the 8-byte user id.
                if *name == CF_CYCLES || *name == CF_SHARES {
                    opts.set_prefix_extractor(SliceTransform::create_fixed_prefix(8));
                }
                ColumnFamilyDescriptor::new(*name, opts)
            })
            .collect();

        let db = DB::open_cf_descriptors(&db_opts, path.as_ref(), cf_descriptors)
            .map_err(|e| StoreError::Storage(e.to_string()))?;

        let store = Self {
            db,
            locks: DashMap::new(),
            lock_timeout,
        };
        store.check_schema()?;
        Ok(store)
    }

    /// Flush all in-memory buffers to disk.
    pub fn flush(&self) -> Result<(), StoreError> {
        self.db
            .flush()
            .map_err(|e| StoreError::Storage(e.to_string()))
    }

    // --- Internal helpers ---

    fn check_schema(&self) -> Result<(), StoreError> {
        let cf = self.cf_handle(CF_METADATA)?;
        match self
            .db
            .get_cf(&cf, META_SCHEMA_VERSION)
            .map_err(|e| StoreError::Storage(e.to_string()))?
        {
            Some(bytes) if bytes.len() == 8 => {
                let version = u64::from_le_bytes(bytes.try_into().unwrap());
                if version != SCHEMA_VERSION {
                    return Err(StoreError::Storage(format!(
                        "unsupported schema version {version}, expected {SCHEMA_VERSION}"
                    )));
                }
                Ok(())
            }
            Some(_) => Err(StoreError::Storage("invalid schema version length".into())),
            None => self
                .db
                .put_cf(&cf, META_SCHEMA_VERSION, SCHEMA_VERSION.to_le_bytes())
                .map_err(|e| StoreError::Storage(e.to_string())),
        }
    }

    /// Get a column family handle.
    fn cf_handle(&self, name: &str) -> Result<&rocksdb::ColumnFamily, StoreError> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| StoreError::Storage(format!("missing column family: {name}")))
    }

    fn user_lock(&self, id: UserId) -> Arc<Mutex<()>> {
        self.locks
            .entry(id.0)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Key for a cycle record: user id then cycle index, both big-endian.
    fn cycle_key(user: UserId, index: u64) -> [u8; 16] {
        let mut key = [0u8; 16];
        key[..8].copy_from_slice(&user.to_be_bytes());
        key[8..].copy_from_slice(&index.to_be_bytes());
        key
    }

    /// Key for a referral share: earner, source user, source cycle index.
    fn share_key(earner: UserId, source: UserId, index: u64) -> [u8; 24] {
        let mut key = [0u8; 24];
        key[..8].copy_from_slice(&earner.to_be_bytes());
        key[8..16].copy_from_slice(&source.to_be_bytes());
        key[16..].copy_from_slice(&index.to_be_bytes());
        key
    }

    fn encode_user(snapshot: &UserSnapshot) -> Result<Vec<u8>, StoreError> {
        bincode::encode_to_vec(snapshot, bincode::config::standard())
            .map_err(|e| StoreError::Storage(e.to_string()))
    }

    fn read_user(&self, id: UserId) -> Result<Option<UserSnapshot>, StoreError> {
        let cf = self.cf_handle(CF_USERS)?;
        match self
            .db
            .get_cf(&cf, id.to_be_bytes())
            .map_err(|e| StoreError::Storage(e.to_string()))?
        {
            Some(bytes) => {
                let (snapshot, _): (UserSnapshot, _) =
                    bincode::decode_from_slice(&bytes, bincode::config::standard())
                        .map_err(|e| StoreError::Storage(e.to_string()))?;
                Ok(Some(snapshot))
            }
            None => Ok(None),
        }
    }
}

impl SettlementStore for RocksStore {
    fn get_user(&self, id: UserId) -> Result<Option<UserSnapshot>, StoreError> {
        self.read_user(id)
    }

    fn put_user(&self, snapshot: &UserSnapshot) -> Result<(), StoreError> {
        let cf = self.cf_handle(CF_USERS)?;
        self.db
            .put_cf(&cf, snapshot.id.to_be_bytes(), Self::encode_user(snapshot)?)
            .map_err(|e| StoreError::Storage(e.to_string()))
    }

    fn eligible_user_ids(&self) -> Result<Vec<UserId>, StoreError> {
        let cf = self.cf_handle(CF_USERS)?;
        let iter = self.db.iterator_cf(&cf, rocksdb::IteratorMode::Start);

        let mut ids = Vec::new();
        for item in iter {
            let (_, value) = item.map_err(|e| StoreError::Storage(e.to_string()))?;
            let (snapshot, _): (UserSnapshot, _) =
                bincode::decode_from_slice(&value, bincode::config::standard())
                    .map_err(|e| StoreError::Storage(e.to_string()))?;
            if snapshot.is_eligible() {
                ids.push(snapshot.id);
            }
        }
        // Keys are big-endian ids, so iteration order is already id order.
        Ok(ids)
    }

    fn apply_settlement(
        &self,
        snapshot: &UserSnapshot,
        plan: &SettlementPlan,
    ) -> Result<(), StoreError> {
        let totals = plan.referral_totals();

        // Lock the settling user and every credited referrer, in id order,
        // so concurrent commits touching the same rows cannot deadlock.
        let mut lock_ids: Vec<UserId> = Vec::with_capacity(1 + totals.len());
        lock_ids.push(snapshot.id);
        lock_ids.extend(totals.iter().map(|(earner, _)| *earner));
        lock_ids.sort();
        lock_ids.dedup();

        let lock_arcs: Vec<Arc<Mutex<()>>> =
            lock_ids.iter().map(|id| self.user_lock(*id)).collect();
        let mut guards = Vec::with_capacity(lock_arcs.len());
        for (arc, id) in lock_arcs.iter().zip(&lock_ids) {
            match arc.try_lock_for(self.lock_timeout) {
                Some(guard) => guards.push(guard),
                None => return Err(StoreError::LockTimeout(*id)),
            }
        }

        let stored = self
            .read_user(snapshot.id)?
            .ok_or(StoreError::UserNotFound(snapshot.id))?;

        // Freshness: another invocation may have settled since the plan
        // was computed.
        if stored.last_settled_at != snapshot.last_settled_at
            || stored.cycles_settled != snapshot.cycles_settled
        {
            return Err(StoreError::StaleSnapshot(snapshot.id));
        }

        let cf_cycles = self.cf_handle(CF_CYCLES)?;
        for record in &plan.cycle_records {
            if self
                .db
                .get_cf(&cf_cycles, Self::cycle_key(record.user_id, record.cycle_index))
                .map_err(|e| StoreError::Storage(e.to_string()))?
                .is_some()
            {
                return Err(StoreError::DuplicateCycle {
                    user: record.user_id,
                    index: record.cycle_index,
                });
            }
        }

        let cf_users = self.cf_handle(CF_USERS)?;
        let cf_shares = self.cf_handle(CF_SHARES)?;
        let mut batch = WriteBatch::default();

        let mut updated = stored;
        updated.balance = plan.final_balance;
        updated.total_profit = updated
            .total_profit
            .checked_add(plan.total_profit_delta)
            .expect("lifetime profit overflows u64 cents");
        updated.last_settled_at = Some(plan.new_last_settled_at);
        updated.cycles_settled += plan.cycles_due;
        batch.put_cf(cf_users, updated.id.to_be_bytes(), Self::encode_user(&updated)?);

        for record in &plan.cycle_records {
            let bytes = bincode::encode_to_vec(record, bincode::config::standard())
                .map_err(|e| StoreError::Storage(e.to_string()))?;
            batch.put_cf(
                cf_cycles,
                Self::cycle_key(record.user_id, record.cycle_index),
                bytes,
            );
        }

        for &(earner, amount) in &totals {
            // A user is never their own referrer; a self credit would
            // clobber the settled row already staged in the batch.
            if earner == snapshot.id {
                warn!(%earner, amount, "self-referral share dropped");
                continue;
            }
            match self.read_user(earner)? {
                Some(mut row) => {
                    row.balance = row
                        .balance
                        .checked_add(amount)
                        .expect("referrer balance overflows u64 cents");
                    row.total_referral_earnings = row
                        .total_referral_earnings
                        .checked_add(amount)
                        .expect("referral earnings overflow u64 cents");
                    batch.put_cf(cf_users, row.id.to_be_bytes(), Self::encode_user(&row)?);
                    for share in plan.referral_shares.iter().filter(|s| s.earner_id == earner) {
                        let bytes = bincode::encode_to_vec(share, bincode::config::standard())
                            .map_err(|e| StoreError::Storage(e.to_string()))?;
                        batch.put_cf(
                            cf_shares,
                            Self::share_key(
                                share.earner_id,
                                share.source_user_id,
                                share.source_cycle_index,
                            ),
                            bytes,
                        );
                    }
                }
                None => {
                    // No credit, no record: the share is dropped whole.
                    warn!(
                        earner = %earner,
                        source = %snapshot.id,
                        amount,
                        "referrer row missing, dropping share"
                    );
                }
            }
        }

        self.db
            .write(batch)
            .map_err(|e| StoreError::Storage(e.to_string()))
    }

    fn cycle_records(&self, id: UserId) -> Result<Vec<CycleRecord>, StoreError> {
        let cf = self.cf_handle(CF_CYCLES)?;
        let prefix = id.to_be_bytes();
        let iter = self.db.prefix_iterator_cf(&cf, prefix);

        let mut records = Vec::new();
        for item in iter {
            let (key, value) = item.map_err(|e| StoreError::Storage(e.to_string()))?;
            // Verify the prefix still matches (prefix_iterator may overshoot).
            if key.len() != 16 || key[..8] != prefix {
                break;
            }
            let (record, _): (CycleRecord, _) =
                bincode::decode_from_slice(&value, bincode::config::standard())
                    .map_err(|e| StoreError::Storage(e.to_string()))?;
            records.push(record);
        }
        Ok(records)
    }

    fn referral_shares_for(&self, earner: UserId) -> Result<Vec<ReferralShareRecord>, StoreError> {
        let cf = self.cf_handle(CF_SHARES)?;
        let prefix = earner.to_be_bytes();
        let iter = self.db.prefix_iterator_cf(&cf, prefix);

        let mut shares = Vec::new();
        for item in iter {
            let (key, value) = item.map_err(|e| StoreError::Storage(e.to_string()))?;
            if key.len() != 24 || key[..8] != prefix {
                break;
            }
            let (share, _): (ReferralShareRecord, _) =
                bincode::decode_from_slice(&value, bincode::config::standard())
                    .map_err(|e| StoreError::Storage(e.to_string()))?;
            shares.push(share);
        }
        Ok(shares)
    }
}
