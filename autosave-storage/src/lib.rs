pub mod db;
pub mod sandbox;

pub use db::{FileBackend, KeyValueBackend, Storage};
#[cfg(feature = "rocksdb")]
pub use db::RocksBackend;
pub use sandbox::{Applied, Sandbox};
