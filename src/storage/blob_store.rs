//! Image blob store — one file per blob under `base_path/blobs/`.
//!
//! ## File Layout
//!
//! ```text
//! [BlobHeader]
//!   magic      : [u8;8]  = b"CARBLOB1"
//!   created_at : i64     (unix seconds, LE)
//!   name_len   : u16     (LE)
//!   name       : [u8; name_len]  (UTF-8 upload file name)
//!   data_len   : u64     (LE)
//!
//! [raw data    : data_len bytes]
//! ```
//!
//! Files are written to `<id>.tmp` and renamed into place, so a blob is
//! either fully present or absent.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, ErrorKind, Read, Write};
use std::path::{Path, PathBuf};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::error::{InventoryError, Result};
use crate::model::BlobId;
use crate::storage::BlobStore;

// ─────────────────────────────── constants ───────────────────────────────────

pub const BLOB_MAGIC: &[u8; 8] = b"CARBLOB1";
pub const BLOB_DIR: &str = "blobs";
const MAX_NAME_LEN: usize = u16::MAX as usize;

// ─────────────────────────────── types ───────────────────────────────────────

/// A blob read back together with its header metadata.
#[derive(Debug, Clone)]
pub struct StoredBlob {
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub data: Vec<u8>,
}

/// File-per-blob store. Safe to share between threads: every blob has its
/// own file and files are only ever created whole via rename.
pub struct FileBlobStore {
    root: PathBuf,
}

impl FileBlobStore {
    /// Open (or create) `base_path/blobs/`.
    pub fn open(base_path: &Path) -> Result<Self> {
        let root = base_path.join(BLOB_DIR);
        fs::create_dir_all(&root)
            .map_err(|e| InventoryError::Storage(format!("Cannot create blob dir: {e}")))?;
        info!(path = ?root, "Blob store opened");
        Ok(Self { root })
    }

    fn blob_path(&self, id: &BlobId) -> PathBuf {
        self.root.join(format!("{id}.blob"))
    }

    /// Read a blob with its header metadata.
    pub fn read(&self, id: &BlobId) -> Result<StoredBlob> {
        let path = self.blob_path(id);
        let file = match File::open(&path) {
            Ok(f) => f,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(InventoryError::BlobNotFound { id: id.to_string() });
            }
            Err(e) => return Err(InventoryError::Storage(format!("open blob {path:?}: {e}"))),
        };
        let mut r = BufReader::new(file);

        let mut magic = [0u8; 8];
        r.read_exact(&mut magic)?;
        if &magic != BLOB_MAGIC {
            return Err(InventoryError::Storage(format!("bad blob magic in {path:?}")));
        }
        let created_at = DateTime::from_timestamp(r.read_i64::<LittleEndian>()?, 0)
            .unwrap_or_default();
        let name_len = r.read_u16::<LittleEndian>()? as usize;
        let mut name = vec![0u8; name_len];
        r.read_exact(&mut name)?;
        let name = String::from_utf8(name)
            .map_err(|e| InventoryError::Storage(format!("blob name in {path:?}: {e}")))?;

        let data_len = r.read_u64::<LittleEndian>()?;
        let mut data = Vec::new();
        r.read_to_end(&mut data)?;
        if data.len() as u64 != data_len {
            return Err(InventoryError::Storage(format!(
                "truncated blob {path:?}: expected {data_len} bytes, found {}",
                data.len()
            )));
        }

        Ok(StoredBlob { name, created_at, data })
    }

    /// Ids of every blob currently stored.
    pub fn list_ids(&self) -> Result<Vec<BlobId>> {
        let mut ids = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let path = entry?.path();
            if path.extension().is_some_and(|ext| ext == "blob") {
                let stem = path.file_stem().and_then(|s| s.to_str());
                if let Some(id) = stem.and_then(|s| s.parse().ok()) {
                    ids.push(id);
                }
            }
        }
        Ok(ids)
    }
}

impl BlobStore for FileBlobStore {
    fn upload(&self, name: &str, data: &[u8]) -> Result<BlobId> {
        let id = BlobId::generate();
        let path = self.blob_path(&id);
        let tmp = path.with_extension("tmp");

        // Truncate on a char boundary so the stored name stays valid UTF-8.
        let mut cut = name.len().min(MAX_NAME_LEN);
        while !name.is_char_boundary(cut) {
            cut -= 1;
        }
        let name_bytes = &name.as_bytes()[..cut];

        let file = File::create(&tmp)
            .map_err(|e| InventoryError::Storage(format!("create blob {tmp:?}: {e}")))?;
        let mut w = BufWriter::new(file);
        w.write_all(BLOB_MAGIC)?;
        w.write_i64::<LittleEndian>(Utc::now().timestamp())?;
        w.write_u16::<LittleEndian>(name_bytes.len() as u16)?;
        w.write_all(name_bytes)?;
        w.write_u64::<LittleEndian>(data.len() as u64)?;
        w.write_all(data)?;
        let file = w
            .into_inner()
            .map_err(|e| InventoryError::Storage(format!("flush blob {tmp:?}: {e}")))?;
        file.sync_all()?;

        fs::rename(&tmp, &path)
            .map_err(|e| InventoryError::Storage(format!("rename blob {tmp:?}: {e}")))?;

        debug!(blob_id = %id, name, bytes = data.len(), "Blob uploaded");
        Ok(id)
    }

    fn download(&self, id: &BlobId) -> Result<Vec<u8>> {
        self.read(id).map(|b| b.data)
    }

    fn delete(&self, id: &BlobId) -> Result<()> {
        let path = self.blob_path(id);
        match fs::remove_file(&path) {
            Ok(()) => {
                debug!(blob_id = %id, "Blob deleted");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                warn!(blob_id = %id, "Blob already absent on delete");
                Ok(())
            }
            Err(e) => Err(InventoryError::Storage(format!("delete blob {path:?}: {e}"))),
        }
    }
}
