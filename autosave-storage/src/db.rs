use anyhow::{anyhow, bail, Result};
use autosave_types::LedgerEvent;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::sandbox::Sandbox;

const SANDBOX_KEY: &str = "sandbox";
const SNAPSHOT_VERSION: u32 = 1;

pub trait KeyValueBackend {
    fn put(&self, key: &str, value: &[u8]) -> Result<()>;
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;
}

/// One file per key under a directory.
pub struct FileBackend {
    root: PathBuf,
}

impl FileBackend {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let root = path.as_ref().to_path_buf();
        fs::create_dir_all(&root)
            .map_err(|e| anyhow!("Failed to create {}: {}", root.display(), e))?;
        Ok(Self { root })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(format!("{}.bin", key))
    }
}

impl KeyValueBackend for FileBackend {
    fn put(&self, key: &str, value: &[u8]) -> Result<()> {
        let path = self.path_for(key);
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, value).map_err(|e| anyhow!("Write error for {}: {}", key, e))?;
        fs::rename(&tmp, &path).map_err(|e| anyhow!("Rename error for {}: {}", key, e))?;
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.path_for(key);
        if !path.exists() {
            return Ok(None);
        }
        let bytes = fs::read(&path).map_err(|e| anyhow!("Read error for {}: {}", key, e))?;
        Ok(Some(bytes))
    }
}

#[cfg(feature = "rocksdb")]
pub struct RocksBackend {
    pub db: rocksdb::DB,
}

#[cfg(feature = "rocksdb")]
impl RocksBackend {
    pub fn open(path: &str) -> Result<Self> {
        let mut opts = rocksdb::Options::default();
        opts.create_if_missing(true);
        let db = rocksdb::DB::open(&opts, path).map_err(|e| anyhow!("Failed to open DB: {}", e))?;
        Ok(Self { db })
    }
}

#[cfg(feature = "rocksdb")]
impl KeyValueBackend for RocksBackend {
    fn put(&self, key: &str, value: &[u8]) -> Result<()> {
        self.db
            .put(key.as_bytes(), value)
            .map_err(|e| anyhow!("DB write error: {}", e))
    }

    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        self.db
            .get(key.as_bytes())
            .map_err(|e| anyhow!("DB read error: {}", e))
    }
}

#[derive(Serialize, Deserialize)]
struct Envelope {
    version: u32,
    checksum: [u8; 32],
    payload: Vec<u8>,
}

/// Checksummed bincode snapshots of the sandbox and its per-instruction event log.
pub struct Storage<B = FileBackend> {
    backend: B,
}

impl Storage<FileBackend> {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self::new(FileBackend::open(path)?))
    }
}

impl<B: KeyValueBackend> Storage<B> {
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn save_sandbox(&self, sandbox: &Sandbox) -> Result<()> {
        self.put(SANDBOX_KEY, sandbox)?;
        debug!("Saved sandbox at sequence {}", sandbox.sequence);
        Ok(())
    }

    pub fn load_sandbox(&self) -> Result<Option<Sandbox>> {
        self.get(SANDBOX_KEY)
    }

    pub fn save_events(&self, sequence: u64, events: &[LedgerEvent]) -> Result<()> {
        self.put(&events_key(sequence), events)
    }

    pub fn load_events(&self, sequence: u64) -> Result<Option<Vec<LedgerEvent>>> {
        self.get(&events_key(sequence))
    }

    fn put<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        let payload = bincode::serialize(value).map_err(|e| anyhow!("Serialization error: {}", e))?;
        let envelope = Envelope {
            version: SNAPSHOT_VERSION,
            checksum: *blake3::hash(&payload).as_bytes(),
            payload,
        };
        let encoded = bincode::serialize(&envelope).map_err(|e| anyhow!("Serialization error: {}", e))?;
        self.backend.put(key, &encoded)
    }

    fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let Some(bytes) = self.backend.get(key)? else {
            return Ok(None);
        };
        let envelope: Envelope =
            bincode::deserialize(&bytes).map_err(|e| anyhow!("Corrupt envelope for {}: {}", key, e))?;
        if envelope.version != SNAPSHOT_VERSION {
            bail!("Unsupported snapshot version {} for {}", envelope.version, key);
        }
        let actual = blake3::hash(&envelope.payload);
        if actual.as_bytes() != &envelope.checksum {
            bail!(
                "Checksum mismatch for {}: stored {}, computed {}",
                key,
                hex::encode(envelope.checksum),
                actual.to_hex()
            );
        }
        let value = bincode::deserialize(&envelope.payload)
            .map_err(|e| anyhow!("Deserialization error for {}: {}", key, e))?;
        Ok(Some(value))
    }
}

fn events_key(sequence: u64) -> String {
    format!("events_{:020}", sequence)
}
