// This software is provided for non-commercial use only.
// Commercial use is strictly prohibited.
// If you use, modify, or redistribute this software, you must provide proper attribution to the original author.
// (c) 2026 Onur Tuna. All rights reserved.

//! Storage subsystem — car document collection + image blob store.
//!
//! The inventory core only sees the two traits below. Both are synchronous:
//! callers on an async runtime run them on the blocking pool.

pub mod blob_store;
pub mod collection;

use serde::Serialize;

use crate::error::Result;
use crate::model::{BlobId, Car, CarDetails, CarId, CarStatus, Customer, NewCar};

// ──────────────── filters / updates ───────────────────────────────────────

/// Match condition for collection operations. Unset fields match anything.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CarFilter {
    pub id: Option<CarId>,
    pub status: Option<CarStatus>,
}

impl CarFilter {
    pub fn by_id(id: CarId) -> Self {
        Self { id: Some(id), status: None }
    }

    pub fn by_status(status: CarStatus) -> Self {
        Self { id: None, status: Some(status) }
    }

    /// `id == id && status == status`
    pub fn by_id_in(id: CarId, status: CarStatus) -> Self {
        Self { id: Some(id), status: Some(status) }
    }

    pub fn matches(&self, car: &Car) -> bool {
        self.id.is_none_or(|id| car.id == id) && self.status.is_none_or(|s| car.status == s)
    }
}

/// Set-style update applied to every field that is `Some`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CarUpdate {
    pub details: Option<CarDetails>,
    pub picture: Option<BlobId>,
    pub status: Option<CarStatus>,
    /// `Some(None)` clears the customer.
    pub customer: Option<Option<Customer>>,
}

impl CarUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn details(mut self, details: CarDetails) -> Self {
        self.details = Some(details);
        self
    }

    pub fn picture(mut self, picture: BlobId) -> Self {
        self.picture = Some(picture);
        self
    }

    pub fn status(mut self, status: CarStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn customer(mut self, customer: Customer) -> Self {
        self.customer = Some(Some(customer));
        self
    }

    pub fn clear_customer(mut self) -> Self {
        self.customer = Some(None);
        self
    }

    /// Apply to `car` in place. Returns true if any field changed.
    pub fn apply(&self, car: &mut Car) -> bool {
        let before = car.clone();
        if let Some(details) = &self.details {
            car.details = details.clone();
        }
        if let Some(picture) = self.picture {
            car.picture = picture;
        }
        if let Some(status) = self.status {
            car.status = status;
        }
        if let Some(customer) = &self.customer {
            car.customer = customer.clone();
        }
        *car != before
    }
}

// ──────────────── results ─────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InsertResult {
    pub inserted_id: CarId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateResult {
    pub matched_count: u64,
    pub modified_count: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteResult {
    pub deleted_count: u64,
}

// ──────────────── traits ──────────────────────────────────────────────────

/// Document collection holding car records.
///
/// `update_one` and `delete_one` must evaluate the filter and apply the
/// mutation as one indivisible step: two concurrent conditional updates on
/// the same document never both match.
pub trait CarCollection: Send + Sync {
    /// All cars matching `filter`, in store order.
    fn find(&self, filter: &CarFilter) -> Result<Vec<Car>>;

    fn find_one(&self, filter: &CarFilter) -> Result<Option<Car>>;

    /// Insert a document; the collection assigns its id.
    fn insert_one(&self, car: NewCar) -> Result<InsertResult>;

    /// Update the first car matching `filter`.
    fn update_one(&self, filter: &CarFilter, update: &CarUpdate) -> Result<UpdateResult>;

    /// Delete the first car matching `filter`.
    fn delete_one(&self, filter: &CarFilter) -> Result<DeleteResult>;
}

/// Binary payload store addressed by generated identifiers.
pub trait BlobStore: Send + Sync {
    /// Store `data` under a fresh id. `name` is kept as metadata only.
    fn upload(&self, name: &str, data: &[u8]) -> Result<BlobId>;

    /// Fails with `BlobNotFound` if no blob has this id.
    fn download(&self, id: &BlobId) -> Result<Vec<u8>>;

    /// Deleting an absent blob is not an error.
    fn delete(&self, id: &BlobId) -> Result<()>;
}
