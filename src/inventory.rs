// This software is provided for non-commercial use only.
// Commercial use is strictly prohibited.
// If you use, modify, or redistribute this software, you must provide proper attribution to the original author.
// (c) 2026 Onur Tuna. All rights reserved.

//! Inventory store: car lifecycle transitions kept consistent with the
//! image blob each car references.
//!
//! ```text
//!            reserve             cancel
//! available ─────────→ reserved ─────────→ available
//!     │
//!     └──── sell ────→ sold  (terminal)
//! ```
//!
//! Update and delete are only allowed while a car is `available`.
//! Reserve, cancel and sell are each a single conditional `update_one`
//! (filter on status + set), never a read followed by a write, so two
//! concurrent callers cannot both win a transition.
//!
//! The store holds no locks of its own. Update and delete read the current
//! record to find its picture before writing; that window is best-effort.

use tracing::{debug, error, info, warn};

use crate::error::{InventoryError, Result};
use crate::model::{BlobId, Car, CarDetails, CarId, CarStatus, Customer, NewCar};
use crate::storage::{
    BlobStore, CarCollection, CarFilter, CarUpdate, DeleteResult, InsertResult, UpdateResult,
};

/// Image supplied with a create or update call.
#[derive(Debug, Clone, Copy)]
pub struct Image<'a> {
    pub name: &'a str,
    pub bytes: &'a [u8],
}

impl<'a> Image<'a> {
    pub fn new(name: &'a str, bytes: &'a [u8]) -> Self {
        Self { name, bytes }
    }
}

/// Car inventory over a document collection `C` and a blob store `B`.
pub struct Inventory<C, B> {
    cars: C,
    blobs: B,
}

impl<C: CarCollection, B: BlobStore> Inventory<C, B> {
    pub fn new(cars: C, blobs: B) -> Self {
        Self { cars, blobs }
    }

    pub fn collection(&self) -> &C {
        &self.cars
    }

    pub fn blob_store(&self) -> &B {
        &self.blobs
    }

    /// All cars currently in `status`, in store order.
    pub fn list_by_status(&self, status: CarStatus) -> Result<Vec<Car>> {
        let cars = self.cars.find(&CarFilter::by_status(status)).inspect_err(|e| {
            error!(status = %status, error = %e, "Failed to list cars");
        })?;
        debug!(status = %status, count = cars.len(), "Cars listed");
        Ok(cars)
    }

    /// Upload `image` and insert a new `available` car pointing at it.
    ///
    /// If the insert fails the freshly uploaded blob is deleted again before
    /// the insert error is returned.
    pub fn create_car(&self, details: CarDetails, image: Image<'_>) -> Result<InsertResult> {
        let picture = self.blobs.upload(image.name, image.bytes).inspect_err(|e| {
            error!(file = image.name, error = %e, "Failed to upload car image");
        })?;

        let doc = NewCar {
            details,
            status: CarStatus::Available,
            customer: None,
            picture,
        };
        match self.cars.insert_one(doc) {
            Ok(res) => {
                info!(car_id = %res.inserted_id, picture = %picture, "Car created");
                Ok(res)
            }
            Err(e) => {
                error!(picture = %picture, error = %e, "Failed to insert car");
                self.discard_blob(&picture);
                Err(e)
            }
        }
    }

    /// Replace the details of an `available` car, and its image if one is
    /// given. Status stays `available`.
    ///
    /// Order with a new image: upload the new blob, write the document
    /// conditioned on `status == available`, then delete the old blob. Until
    /// the write matches, the document keeps pointing at a live image.
    pub fn update_car(
        &self,
        id: CarId,
        details: CarDetails,
        image: Option<Image<'_>>,
    ) -> Result<UpdateResult> {
        let filter = CarFilter::by_id_in(id, CarStatus::Available);
        let mut update = CarUpdate::new().details(details).status(CarStatus::Available);

        let mut replaced = None;
        if let Some(image) = image.filter(|i| !i.bytes.is_empty()) {
            let existing = self.find_available(id)?;
            let picture = self.blobs.upload(image.name, image.bytes).inspect_err(|e| {
                error!(car_id = %id, file = image.name, error = %e, "Failed to upload car image");
            })?;
            update = update.picture(picture);
            replaced = Some((existing.picture, picture));
        }

        let res = match self.cars.update_one(&filter, &update) {
            Ok(res) => res,
            Err(e) => {
                error!(car_id = %id, error = %e, "Failed to update car");
                if let Some((_, picture)) = replaced {
                    self.discard_blob(&picture);
                }
                return Err(e);
            }
        };
        if res.matched_count == 0 {
            if let Some((_, picture)) = replaced {
                // Status changed between the read and the write.
                warn!(car_id = %id, "Car left 'available' during update");
                self.discard_blob(&picture);
            }
            return Err(not_matched(id, "update", CarStatus::Available));
        }
        if let Some((old, _)) = replaced {
            self.discard_blob(&old);
        }

        info!(car_id = %id, new_picture = replaced.is_some(), "Car updated");
        Ok(res)
    }

    /// Delete an `available` car and its image. The blob goes first.
    pub fn delete_car(&self, id: CarId) -> Result<DeleteResult> {
        let car = self.find_available(id)?;

        self.blobs.delete(&car.picture).inspect_err(|e| {
            error!(car_id = %id, picture = %car.picture, error = %e, "Failed to delete car image");
        })?;

        let res = self
            .cars
            .delete_one(&CarFilter::by_id_in(id, CarStatus::Available))
            .inspect_err(|e| {
                error!(
                    car_id = %id,
                    picture = %car.picture,
                    error = %e,
                    "Failed to delete car after its image"
                );
            })?;
        if res.deleted_count == 0 {
            return Err(not_matched(id, "delete", CarStatus::Available));
        }

        info!(car_id = %id, picture = %car.picture, "Car deleted");
        Ok(res)
    }

    /// `available → reserved`, attaching `customer`.
    pub fn reserve_car(&self, id: CarId, customer: Customer) -> Result<UpdateResult> {
        self.transition(
            id,
            "reserve",
            CarStatus::Available,
            CarUpdate::new().status(CarStatus::Reserved).customer(customer),
        )
    }

    /// `reserved → available`, clearing the customer.
    pub fn cancel_reservation(&self, id: CarId) -> Result<UpdateResult> {
        self.transition(
            id,
            "cancel reservation",
            CarStatus::Reserved,
            CarUpdate::new().status(CarStatus::Available).clear_customer(),
        )
    }

    /// `available → sold`, attaching `customer`.
    pub fn sell_car(&self, id: CarId, customer: Customer) -> Result<UpdateResult> {
        self.transition(
            id,
            "sell",
            CarStatus::Available,
            CarUpdate::new().status(CarStatus::Sold).customer(customer),
        )
    }

    /// Raw bytes of the image `picture_id`. A malformed id is reported as
    /// not found.
    pub fn get_image(&self, picture_id: &str) -> Result<Vec<u8>> {
        let id: BlobId = picture_id
            .parse()
            .map_err(|_| InventoryError::BlobNotFound { id: picture_id.to_string() })?;
        self.blobs.download(&id).inspect_err(|e| {
            warn!(picture = picture_id, error = %e, "Failed to fetch car image");
        })
    }

    /// One atomic conditional update: `status == from` and apply `update`.
    fn transition(
        &self,
        id: CarId,
        action: &'static str,
        from: CarStatus,
        update: CarUpdate,
    ) -> Result<UpdateResult> {
        let res = self
            .cars
            .update_one(&CarFilter::by_id_in(id, from), &update)
            .inspect_err(|e| {
                error!(car_id = %id, action, error = %e, "Status transition failed");
            })?;
        if res.matched_count == 0 {
            debug!(car_id = %id, action, "No car in required status");
            return Err(not_matched(id, action, from));
        }
        info!(car_id = %id, action, to = ?update.status, "Car status changed");
        Ok(res)
    }

    fn find_available(&self, id: CarId) -> Result<Car> {
        self.cars
            .find_one(&CarFilter::by_id_in(id, CarStatus::Available))
            .inspect_err(|e| {
                error!(car_id = %id, error = %e, "Failed to look up car");
            })?
            .ok_or_else(|| not_matched(id, "modify", CarStatus::Available))
    }

    /// Best-effort removal of a blob no document references.
    fn discard_blob(&self, picture: &BlobId) {
        if let Err(e) = self.blobs.delete(picture) {
            warn!(picture = %picture, error = %e, "Orphaned car image left in blob store");
        }
    }
}

fn not_matched(id: CarId, action: &str, required: CarStatus) -> InventoryError {
    InventoryError::NotMatched(format!("cannot {action} car '{id}': not found or not {required}"))
}
