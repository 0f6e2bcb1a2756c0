use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::{DashMap, DashSet};

use curio_content::{Cid, ContentStore, ContentStoreError};

/// One stored object.
#[derive(Debug, Clone)]
struct StoredObject {
    data: Bytes,
    label: Option<String>,
}

/// In-memory [`ContentStore`] backed by [`DashMap`]s.
///
/// Mints a fresh, counter-derived CID for every add -- deliberately without
/// content-hash de-duplication, so publishing identical metadata twice yields
/// two distinct identifiers, exactly like the real pinning service is used.
/// Records every pin and unpin so tests can assert on store traffic, and can
/// be told to fail the transfer of specific filenames, all metadata adds, or
/// all unpins.
#[derive(Debug, Default)]
pub struct MemoryContentStore {
    objects: DashMap<Cid, StoredObject>,
    pins: DashMap<Cid, String>,
    failing_files: DashSet<String>,
    failing_metadata: AtomicBool,
    failing_unpins: AtomicBool,
    next_cid: AtomicU64,
    add_file_calls: AtomicU64,
    add_metadata_calls: AtomicU64,
    add_pin_calls: AtomicU64,
    unpinned: Mutex<Vec<Cid>>,
}

impl MemoryContentStore {
    /// Create a new, empty in-memory content store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every future `add_file` of this filename fail with a transfer
    /// error.
    pub fn fail_file(&self, filename: impl Into<String>) {
        self.failing_files.insert(filename.into());
    }

    /// Make every future `add_metadata` fail with a transfer error.
    pub fn fail_metadata(&self) {
        self.failing_metadata.store(true, Ordering::Relaxed);
    }

    /// Make every future `remove_pin` fail with a server error. Attempts are
    /// still recorded in the unpin log.
    pub fn fail_unpins(&self) {
        self.failing_unpins.store(true, Ordering::Relaxed);
    }

    /// Bytes stored under the given CID.
    pub fn stored_bytes(&self, cid: &Cid) -> Option<Bytes> {
        self.objects.get(cid).map(|object| object.data.clone())
    }

    /// Whether the given CID is currently pinned.
    pub fn is_pinned(&self, cid: &Cid) -> bool {
        self.pins.contains_key(cid)
    }

    /// Label of the given pin, if pinned.
    pub fn pin_label(&self, cid: &Cid) -> Option<String> {
        self.pins.get(cid).map(|label| label.clone())
    }

    /// Every unpin attempt in issue order, including CIDs that were never
    /// pinned here.
    pub fn unpin_log(&self) -> Vec<Cid> {
        self.unpinned.lock().map(|log| log.clone()).unwrap_or_default()
    }

    pub fn add_file_calls(&self) -> u64 {
        self.add_file_calls.load(Ordering::Relaxed)
    }

    pub fn add_metadata_calls(&self) -> u64 {
        self.add_metadata_calls.load(Ordering::Relaxed)
    }

    pub fn add_pin_calls(&self) -> u64 {
        self.add_pin_calls.load(Ordering::Relaxed)
    }

    fn mint_cid(&self) -> Cid {
        let n = self.next_cid.fetch_add(1, Ordering::Relaxed);
        Cid::new(format!("QmMem{n:06}"))
    }
}

#[async_trait]
impl ContentStore for MemoryContentStore {
    async fn add_file(&self, filename: &str, data: Bytes) -> Result<Cid, ContentStoreError> {
        self.add_file_calls.fetch_add(1, Ordering::Relaxed);

        if self.failing_files.contains(filename) {
            return Err(ContentStoreError::Transfer(format!(
                "simulated transfer failure for {filename}"
            )));
        }

        let cid = self.mint_cid();
        self.objects.insert(
            cid.clone(),
            StoredObject {
                data,
                label: Some(filename.to_owned()),
            },
        );
        Ok(cid)
    }

    async fn add_metadata(
        &self,
        metadata: &serde_json::Value,
        label: &str,
    ) -> Result<Cid, ContentStoreError> {
        self.add_metadata_calls.fetch_add(1, Ordering::Relaxed);

        if self.failing_metadata.load(Ordering::Relaxed) {
            return Err(ContentStoreError::Transfer(
                "simulated metadata transfer failure".to_owned(),
            ));
        }

        let rendered = serde_json::to_vec(metadata)
            .map_err(|err| ContentStoreError::Serialization(err.to_string()))?;
        let cid = self.mint_cid();
        self.objects.insert(
            cid.clone(),
            StoredObject {
                data: Bytes::from(rendered),
                label: Some(label.to_owned()),
            },
        );
        Ok(cid)
    }

    async fn add_pin(&self, cid: &Cid, label: &str) -> Result<(), ContentStoreError> {
        self.add_pin_calls.fetch_add(1, Ordering::Relaxed);
        self.pins.insert(cid.clone(), label.to_owned());
        Ok(())
    }

    async fn remove_pin(&self, cid: &Cid) -> Result<(), ContentStoreError> {
        if let Ok(mut log) = self.unpinned.lock() {
            log.push(cid.clone());
        }

        if self.failing_unpins.load(Ordering::Relaxed) {
            return Err(ContentStoreError::Status {
                code: 500,
                detail: "simulated unpin failure".to_owned(),
            });
        }

        // Unpinning an absent CID is a no-op by contract.
        self.pins.remove(cid);
        Ok(())
    }
}
