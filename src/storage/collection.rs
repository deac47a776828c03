// This software is provided for non-commercial use only.
// Commercial use is strictly prohibited.
// If you use, modify, or redistribute this software, you must provide proper attribution to the original author.
// (c) 2026 Onur Tuna. All rights reserved.

//! Car collection — in-memory document list with write-through JSON
//! persistence.
//!
//! All documents live in a `Vec<Car>` (insertion order is the store's default
//! order) behind a single `RwLock`. Every mutation holds the write lock while
//! it evaluates the filter, applies the change and persists the snapshot, so
//! `update_one` / `delete_one` are atomic with respect to each other.
//!
//! On disk the snapshot is a JSON array at `<base_path>/cars.json`, replaced
//! via temp file + rename. If persisting fails the in-memory change is
//! rolled back.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use tracing::{debug, info};

use crate::error::{InventoryError, Result};
use crate::model::{Car, CarId, NewCar};
use crate::storage::{CarCollection, CarFilter, CarUpdate, DeleteResult, InsertResult, UpdateResult};

pub const COLLECTION_FILE: &str = "cars.json";

pub struct JsonCollection {
    /// `None` for a purely in-memory collection.
    path: Option<PathBuf>,
    cars: RwLock<Vec<Car>>,
}

impl JsonCollection {
    /// Open (or create) the collection file under `base_path/`.
    pub fn open(base_path: &Path) -> Result<Self> {
        fs::create_dir_all(base_path)
            .map_err(|e| InventoryError::Storage(format!("Cannot create storage dir: {e}")))?;
        let path = base_path.join(COLLECTION_FILE);

        let cars: Vec<Car> = if path.exists() {
            let content = fs::read_to_string(&path)
                .map_err(|e| InventoryError::Storage(format!("read {path:?}: {e}")))?;
            serde_json::from_str(&content)
                .map_err(|e| InventoryError::Storage(format!("corrupt collection {path:?}: {e}")))?
        } else {
            Vec::new()
        };
        info!(path = ?path, cars = cars.len(), "Car collection opened");

        Ok(Self { path: Some(path), cars: RwLock::new(cars) })
    }

    /// A collection that is never written to disk.
    pub fn in_memory() -> Self {
        Self { path: None, cars: RwLock::new(Vec::new()) }
    }

    pub fn len(&self) -> usize {
        self.cars.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.cars.read().is_empty()
    }

    fn persist(&self, cars: &[Car]) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let json = serde_json::to_vec_pretty(cars)
            .map_err(|e| InventoryError::Storage(format!("serialize collection: {e}")))?;

        let tmp = path.with_extension("json.tmp");
        let mut f = fs::File::create(&tmp)
            .map_err(|e| InventoryError::Storage(format!("create {tmp:?}: {e}")))?;
        f.write_all(&json)?;
        f.sync_all()?;
        fs::rename(&tmp, path)
            .map_err(|e| InventoryError::Storage(format!("rename {tmp:?}: {e}")))?;
        Ok(())
    }
}

impl CarCollection for JsonCollection {
    fn find(&self, filter: &CarFilter) -> Result<Vec<Car>> {
        Ok(self.cars.read().iter().filter(|c| filter.matches(c)).cloned().collect())
    }

    fn find_one(&self, filter: &CarFilter) -> Result<Option<Car>> {
        Ok(self.cars.read().iter().find(|c| filter.matches(c)).cloned())
    }

    fn insert_one(&self, car: NewCar) -> Result<InsertResult> {
        let mut cars = self.cars.write();
        let id = CarId::generate();
        cars.push(car.with_id(id));
        if let Err(e) = self.persist(&cars) {
            cars.pop();
            return Err(e);
        }
        debug!(car_id = %id, "Document inserted");
        Ok(InsertResult { inserted_id: id })
    }

    fn update_one(&self, filter: &CarFilter, update: &CarUpdate) -> Result<UpdateResult> {
        let mut cars = self.cars.write();
        let Some(pos) = cars.iter().position(|c| filter.matches(c)) else {
            return Ok(UpdateResult { matched_count: 0, modified_count: 0 });
        };

        let before = cars[pos].clone();
        let modified = update.apply(&mut cars[pos]);
        if modified {
            if let Err(e) = self.persist(&cars) {
                cars[pos] = before;
                return Err(e);
            }
        }
        Ok(UpdateResult { matched_count: 1, modified_count: u64::from(modified) })
    }

    fn delete_one(&self, filter: &CarFilter) -> Result<DeleteResult> {
        let mut cars = self.cars.write();
        let Some(pos) = cars.iter().position(|c| filter.matches(c)) else {
            return Ok(DeleteResult { deleted_count: 0 });
        };

        let removed = cars.remove(pos);
        if let Err(e) = self.persist(&cars) {
            cars.insert(pos, removed);
            return Err(e);
        }
        debug!(car_id = %removed.id, "Document deleted");
        Ok(DeleteResult { deleted_count: 1 })
    }
}
