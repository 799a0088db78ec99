//! # RegionDb: Persistent Region Store
//!
//! The persistence layer for contract instances, built on sled's embedded
//! key-value store.
//!
//! ## Tree Layout
//!
//! | Tree       | Key                    | Value                     |
//! |------------|------------------------|---------------------------|
//! | `regions`  | `address` (20B)        | `bincode(StorageRegion)`  |
//! | `metadata` | `address` (20B) `‖` tag | opaque bytes             |
//!
//! Metadata is whatever the runtime needs to bring an instance back: which
//! implementation it points at, which version that implementation is. The
//! db never interprets it.
//!
//! ## Atomicity
//!
//! `put_instance` writes the region and all of its metadata entries as one
//! sled transaction. Either the whole instance lands on disk or nothing does.

use sled::transaction::{ConflictableTransactionError, TransactionError};
use sled::{Db, Transactional, Tree};
use std::path::Path;

use super::region::StorageRegion;
use crate::address::{Address, ADDRESS_LENGTH};

// ---------------------------------------------------------------------------
// Error Type
// ---------------------------------------------------------------------------

/// Errors that can occur during database operations.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("sled error: {0}")]
    Sled(#[from] sled::Error),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("corrupt key: {0}")]
    CorruptKey(String),
}

impl From<TransactionError<DbError>> for DbError {
    fn from(err: TransactionError<DbError>) -> Self {
        match err {
            TransactionError::Abort(inner) => inner,
            TransactionError::Storage(e) => DbError::Sled(e),
        }
    }
}

pub type DbResult<T> = Result<T, DbError>;

// ---------------------------------------------------------------------------
// RegionDb
// ---------------------------------------------------------------------------

/// Persistent store for storage regions and instance metadata.
///
/// # Thread Safety
///
/// sled is inherently thread-safe. `RegionDb` is `Clone` and can be shared
/// across threads without external synchronization.
#[derive(Debug, Clone)]
pub struct RegionDb {
    /// The underlying sled database handle.
    db: Db,
    /// Storage regions keyed by instance address.
    regions: Tree,
    /// Per-instance metadata keyed by `address || tag`.
    metadata: Tree,
}

impl RegionDb {
    /// Open or create a database at the given filesystem path.
    pub fn open<P: AsRef<Path>>(path: P) -> DbResult<Self> {
        let db = sled::open(path)?;
        Self::from_db(db)
    }

    /// Create a temporary database that is cleaned up on drop.
    ///
    /// Ideal for unit tests: no filesystem side effects, no cleanup needed.
    pub fn open_temporary() -> DbResult<Self> {
        let config = sled::Config::new().temporary(true);
        let db = config.open()?;
        Self::from_db(db)
    }

    fn from_db(db: Db) -> DbResult<Self> {
        let regions = db.open_tree("regions")?;
        let metadata = db.open_tree("metadata")?;
        Ok(Self {
            db,
            regions,
            metadata,
        })
    }

    /// Persist an instance's region together with its metadata entries.
    pub fn put_instance(
        &self,
        address: &Address,
        region: &StorageRegion,
        metadata: &[(&str, Vec<u8>)],
    ) -> DbResult<()> {
        let region_bytes =
            bincode::serialize(region).map_err(|e| DbError::Serialization(e.to_string()))?;

        (&self.regions, &self.metadata).transaction(|(regions, meta)| {
            regions.insert(address.as_bytes().as_slice(), region_bytes.as_slice())?;
            for (tag, value) in metadata {
                meta.insert(meta_key(address, tag), value.as_slice())?;
            }
            Ok::<(), ConflictableTransactionError<DbError>>(())
        })?;

        self.db.flush()?;
        tracing::debug!(instance = %address, slots = region.len(), "instance persisted");
        Ok(())
    }

    /// Retrieve an instance's region. `None` if it was never persisted.
    pub fn get_region(&self, address: &Address) -> DbResult<Option<StorageRegion>> {
        match self.regions.get(address.as_bytes())? {
            Some(bytes) => {
                let region: StorageRegion = bincode::deserialize(&bytes)
                    .map_err(|e| DbError::Serialization(e.to_string()))?;
                Ok(Some(region))
            }
            None => Ok(None),
        }
    }

    /// Retrieve one metadata entry of an instance.
    pub fn get_metadata(&self, address: &Address, tag: &str) -> DbResult<Option<Vec<u8>>> {
        Ok(self
            .metadata
            .get(meta_key(address, tag))?
            .map(|bytes| bytes.to_vec()))
    }

    /// Addresses of every persisted instance, in key order.
    pub fn instances(&self) -> DbResult<Vec<Address>> {
        let mut out = Vec::new();
        for entry in self.regions.iter() {
            let (key, _) = entry?;
            let bytes: [u8; ADDRESS_LENGTH] = key
                .as_ref()
                .try_into()
                .map_err(|_| DbError::CorruptKey(hex::encode(&key)))?;
            out.push(Address::from_bytes(bytes));
        }
        Ok(out)
    }

    /// Number of persisted instances.
    pub fn instance_count(&self) -> usize {
        self.regions.len()
    }

    /// Force a flush of all pending writes to disk.
    pub fn flush(&self) -> DbResult<()> {
        self.db.flush()?;
        Ok(())
    }
}

fn meta_key(address: &Address, tag: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(ADDRESS_LENGTH + tag.len());
    key.extend_from_slice(address.as_bytes());
    key.extend_from_slice(tag.as_bytes());
    key
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::region::SlotKey;

    fn sample_region(value: u64) -> StorageRegion {
        let mut region = StorageRegion::new();
        region.write_uint(SlotKey::fixed(4), 0, 8, value).unwrap();
        region
    }

    #[test]
    fn open_temporary_database() {
        let db = RegionDb::open_temporary().expect("should create temp db");
        assert_eq!(db.instance_count(), 0);
        assert!(db.instances().unwrap().is_empty());
    }

    #[test]
    fn open_persistent_database() {
        let dir = tempfile::tempdir().expect("tempdir");
        let addr = Address::derive("vault");
        {
            let db = RegionDb::open(dir.path()).expect("should open db");
            db.put_instance(&addr, &sample_region(9), &[("impl", vec![2])])
                .unwrap();
        }

        let db = RegionDb::open(dir.path()).expect("should reopen db");
        assert_eq!(db.get_region(&addr).unwrap(), Some(sample_region(9)));
        assert_eq!(db.get_metadata(&addr, "impl").unwrap(), Some(vec![2]));
    }

    #[test]
    fn missing_instance_returns_none() {
        let db = RegionDb::open_temporary().unwrap();
        let addr = Address::derive("nobody");
        assert_eq!(db.get_region(&addr).unwrap(), None);
        assert_eq!(db.get_metadata(&addr, "impl").unwrap(), None);
    }

    #[test]
    fn overwrite_replaces_region() {
        let db = RegionDb::open_temporary().unwrap();
        let addr = Address::derive("vault");
        db.put_instance(&addr, &sample_region(1), &[]).unwrap();
        db.put_instance(&addr, &sample_region(2), &[]).unwrap();
        assert_eq!(db.get_region(&addr).unwrap(), Some(sample_region(2)));
        assert_eq!(db.instance_count(), 1);
    }

    #[test]
    fn metadata_is_scoped_per_instance() {
        let db = RegionDb::open_temporary().unwrap();
        let a = Address::derive("a");
        let b = Address::derive("b");
        db.put_instance(&a, &sample_region(1), &[("impl", vec![1])]).unwrap();
        db.put_instance(&b, &sample_region(2), &[("impl", vec![3])]).unwrap();

        assert_eq!(db.get_metadata(&a, "impl").unwrap(), Some(vec![1]));
        assert_eq!(db.get_metadata(&b, "impl").unwrap(), Some(vec![3]));

        let mut listed = db.instances().unwrap();
        listed.sort();
        let mut expected = vec![a, b];
        expected.sort();
        assert_eq!(listed, expected);
    }
}
