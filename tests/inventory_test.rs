//! Inventory integration tests: lifecycle transitions + image blob consistency.
//!
//! Run with: `cargo test`

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Barrier;

use tempfile::TempDir;

use dealership::error::{InventoryError, Result};
use dealership::inventory::{Image, Inventory};
use dealership::model::{BlobId, Car, CarDetails, CarId, CarStatus, Customer, NewCar};
use dealership::storage::blob_store::FileBlobStore;
use dealership::storage::collection::JsonCollection;
use dealership::storage::{
    BlobStore, CarCollection, CarFilter, CarUpdate, DeleteResult, InsertResult, UpdateResult,
};

fn tmp_dir() -> TempDir {
    tempfile::tempdir().expect("create tempdir")
}

fn open_inventory(dir: &TempDir) -> Inventory<JsonCollection, FileBlobStore> {
    let cars = JsonCollection::open(dir.path()).expect("open collection");
    let blobs = FileBlobStore::open(dir.path()).expect("open blob store");
    Inventory::new(cars, blobs)
}

fn corolla() -> CarDetails {
    CarDetails {
        make: "Toyota".into(),
        model: "Corolla".into(),
        year: 2020,
        price: 20000.0,
    }
}

fn john() -> Customer {
    Customer {
        full_name: "John Doe".into(),
        email: "john@x.com".into(),
        phone_number: "1234567890".into(),
    }
}

fn get<C: CarCollection, B: BlobStore>(inv: &Inventory<C, B>, id: CarId) -> Car {
    inv.collection()
        .find_one(&CarFilter::by_id(id))
        .expect("find_one")
        .expect("car exists")
}

fn create<C: CarCollection, B: BlobStore>(inv: &Inventory<C, B>, image: &[u8]) -> CarId {
    inv.create_car(corolla(), Image::new("car.jpg", image))
        .expect("create car")
        .inserted_id
}

fn is_not_matched<T>(res: &Result<T>) -> bool {
    matches!(res, Err(InventoryError::NotMatched(_)))
}

#[test]
fn test_create_forces_available_and_round_trips_image() {
    let dir = tmp_dir();
    let inv = open_inventory(&dir);
    let image = b"\xFF\xD8\xFF\xE0jpeg-bytes".to_vec();

    let id = create(&inv, &image);
    let car = get(&inv, id);

    assert_eq!(car.status, CarStatus::Available);
    assert_eq!(car.customer, None);
    assert_eq!(car.details, corolla());
    assert_eq!(inv.get_image(&car.picture.to_string()).unwrap(), image);
}

#[test]
fn test_list_by_status_returns_exact_sets() {
    let dir = tmp_dir();
    let inv = open_inventory(&dir);

    let a = create(&inv, b"a");
    let b = create(&inv, b"b");
    let c = create(&inv, b"c");
    let d = create(&inv, b"d");
    inv.reserve_car(b, john()).unwrap();
    inv.sell_car(c, john()).unwrap();

    let ids = |s| -> Vec<CarId> {
        inv.list_by_status(s).unwrap().into_iter().map(|car| car.id).collect()
    };
    assert_eq!(ids(CarStatus::Available), [a, d]);
    assert_eq!(ids(CarStatus::Reserved), [b]);
    assert_eq!(ids(CarStatus::Sold), [c]);

    assert!(matches!(
        "leased".parse::<CarStatus>(),
        Err(InventoryError::InvalidArgument(_))
    ));
}

#[test]
fn test_reserve_then_cancel() {
    let dir = tmp_dir();
    let inv = open_inventory(&dir);
    let id = create(&inv, b"img");

    let res = inv.reserve_car(id, john()).unwrap();
    assert_eq!(res, UpdateResult { matched_count: 1, modified_count: 1 });
    let car = get(&inv, id);
    assert_eq!(car.status, CarStatus::Reserved);
    assert_eq!(car.customer, Some(john()));

    inv.cancel_reservation(id).unwrap();
    let car = get(&inv, id);
    assert_eq!(car.status, CarStatus::Available);
    assert_eq!(car.customer, None);
}

#[test]
fn test_reserve_and_sell_require_available() {
    let dir = tmp_dir();
    let inv = open_inventory(&dir);

    let reserved = create(&inv, b"r");
    inv.reserve_car(reserved, john()).unwrap();
    let sold = create(&inv, b"s");
    inv.sell_car(sold, john()).unwrap();

    for id in [reserved, sold] {
        let before = get(&inv, id);
        assert!(is_not_matched(&inv.reserve_car(id, john())));
        assert!(is_not_matched(&inv.sell_car(id, john())));
        assert_eq!(get(&inv, id), before, "failed transition must not touch the car");
    }

    // Unknown id: same outcome.
    assert!(is_not_matched(&inv.reserve_car(CarId::generate(), john())));
}

#[test]
fn test_cancel_requires_reserved() {
    let dir = tmp_dir();
    let inv = open_inventory(&dir);

    let available = create(&inv, b"a");
    let sold = create(&inv, b"s");
    inv.sell_car(sold, john()).unwrap();

    assert!(is_not_matched(&inv.cancel_reservation(available)));
    assert!(is_not_matched(&inv.cancel_reservation(sold)));
    let car = get(&inv, sold);
    assert_eq!(car.status, CarStatus::Sold);
    assert_eq!(car.customer, Some(john()));
}

#[test]
fn test_update_and_delete_require_available() {
    let dir = tmp_dir();
    let inv = open_inventory(&dir);

    let reserved = create(&inv, b"r");
    inv.reserve_car(reserved, john()).unwrap();
    let sold = create(&inv, b"s");
    inv.sell_car(sold, john()).unwrap();

    for id in [reserved, sold] {
        let before = get(&inv, id);
        let changed = CarDetails { price: 1.0, ..corolla() };
        assert!(is_not_matched(&inv.update_car(id, changed.clone(), None)));
        assert!(is_not_matched(
            &inv.update_car(id, changed, Some(Image::new("new.jpg", b"new")))
        ));
        assert!(is_not_matched(&inv.delete_car(id)));

        let after = get(&inv, id);
        assert_eq!(after, before);
        // Image untouched by the rejected calls.
        assert!(inv.get_image(&after.picture.to_string()).is_ok());
    }
    assert!(is_not_matched(&inv.delete_car(CarId::generate())));
}

#[test]
fn test_update_without_image_keeps_picture() {
    let dir = tmp_dir();
    let inv = open_inventory(&dir);
    let id = create(&inv, b"original");
    let picture = get(&inv, id).picture;

    let details = CarDetails {
        make: "Honda".into(),
        model: "Civic".into(),
        year: 2018,
        price: 15000.0,
    };
    inv.update_car(id, details.clone(), None).unwrap();

    let car = get(&inv, id);
    assert_eq!(car.details, details);
    assert_eq!(car.picture, picture);
    assert_eq!(car.status, CarStatus::Available);
    assert_eq!(inv.get_image(&picture.to_string()).unwrap(), b"original");

    // An empty image counts as no image.
    inv.update_car(id, corolla(), Some(Image::new("empty.jpg", b""))).unwrap();
    assert_eq!(get(&inv, id).picture, picture);
}

#[test]
fn test_update_with_image_replaces_blob() {
    let dir = tmp_dir();
    let inv = open_inventory(&dir);
    let id = create(&inv, b"old");
    let old = get(&inv, id).picture;

    inv.update_car(id, corolla(), Some(Image::new("new.jpg", b"new"))).unwrap();

    let car = get(&inv, id);
    assert_ne!(car.picture, old);
    assert_eq!(inv.get_image(&car.picture.to_string()).unwrap(), b"new");
    assert!(matches!(
        inv.get_image(&old.to_string()),
        Err(InventoryError::BlobNotFound { .. })
    ));
    assert_eq!(inv.blob_store().list_ids().unwrap(), [car.picture]);
}

#[test]
fn test_delete_removes_car_and_image() {
    let dir = tmp_dir();
    let inv = open_inventory(&dir);
    let keep = create(&inv, b"keep");
    let id = create(&inv, b"gone");
    let picture = get(&inv, id).picture;

    assert_eq!(inv.delete_car(id).unwrap(), DeleteResult { deleted_count: 1 });

    assert!(inv.collection().find_one(&CarFilter::by_id(id)).unwrap().is_none());
    assert!(inv.get_image(&picture.to_string()).is_err());
    assert_eq!(inv.blob_store().list_ids().unwrap(), [get(&inv, keep).picture]);
}

#[test]
fn test_get_image_unknown_or_malformed_is_not_found() {
    let dir = tmp_dir();
    let inv = open_inventory(&dir);

    let unknown = BlobId::generate().to_string();
    for id in ["", "xyz", "../cars.json", unknown.as_str()] {
        assert!(
            matches!(inv.get_image(id), Err(InventoryError::BlobNotFound { .. })),
            "{id:?} should be not found"
        );
    }
}

#[test]
fn test_concurrent_reservations_single_winner() {
    let dir = tmp_dir();
    let inv = open_inventory(&dir);
    let id = create(&inv, b"hot");

    const CALLERS: usize = 8;
    let barrier = Barrier::new(CALLERS);
    let wins = AtomicUsize::new(0);
    let losses = AtomicUsize::new(0);

    std::thread::scope(|s| {
        for i in 0..CALLERS {
            let (inv, barrier, wins, losses) = (&inv, &barrier, &wins, &losses);
            s.spawn(move || {
                let customer = Customer { full_name: format!("Buyer {i}"), ..john() };
                barrier.wait();
                match inv.reserve_car(id, customer) {
                    Ok(_) => wins.fetch_add(1, Ordering::SeqCst),
                    Err(InventoryError::NotMatched(_)) => losses.fetch_add(1, Ordering::SeqCst),
                    Err(e) => panic!("unexpected error: {e}"),
                };
            });
        }
    });

    assert_eq!(wins.load(Ordering::SeqCst), 1);
    assert_eq!(losses.load(Ordering::SeqCst), CALLERS - 1);
    assert_eq!(get(&inv, id).status, CarStatus::Reserved);
}

#[test]
fn test_dealership_scenario() {
    let dir = tmp_dir();
    let inv = open_inventory(&dir);
    let image = b"X-image-bytes".to_vec();

    let id = create(&inv, &image);
    let car = get(&inv, id);
    assert_eq!(car.status, CarStatus::Available);
    assert_eq!(inv.get_image(&car.picture.to_string()).unwrap(), image);

    inv.reserve_car(id, john()).unwrap();
    assert_eq!(get(&inv, id).status, CarStatus::Reserved);

    assert!(is_not_matched(&inv.sell_car(id, john())));

    inv.cancel_reservation(id).unwrap();
    let car = get(&inv, id);
    assert_eq!(car.status, CarStatus::Available);
    assert_eq!(car.customer, None);

    inv.sell_car(id, john()).unwrap();
    let car = get(&inv, id);
    assert_eq!(car.status, CarStatus::Sold);
    assert_eq!(car.customer, Some(john()));

    assert!(is_not_matched(&inv.delete_car(id)));
}

#[test]
fn test_state_survives_reopen() {
    let dir = tmp_dir();
    let (id, picture) = {
        let inv = open_inventory(&dir);
        let id = create(&inv, b"persisted");
        inv.reserve_car(id, john()).unwrap();
        (id, get(&inv, id).picture)
    };

    let inv = open_inventory(&dir);
    let car = get(&inv, id);
    assert_eq!(car.status, CarStatus::Reserved);
    assert_eq!(car.customer, Some(john()));
    assert_eq!(inv.get_image(&picture.to_string()).unwrap(), b"persisted");
}

// ──────────────── partial failures ────────────────────────────────────────

/// Collection that can be told to fail inserts or deletes, or to have the
/// car reserved by someone else right after a `find_one`.
struct FlakyCollection {
    inner: JsonCollection,
    fail_insert: AtomicBool,
    fail_delete: AtomicBool,
    reserve_after_find: AtomicBool,
}

impl FlakyCollection {
    fn new() -> Self {
        Self {
            inner: JsonCollection::in_memory(),
            fail_insert: AtomicBool::new(false),
            fail_delete: AtomicBool::new(false),
            reserve_after_find: AtomicBool::new(false),
        }
    }
}

impl CarCollection for FlakyCollection {
    fn find(&self, filter: &CarFilter) -> Result<Vec<Car>> {
        self.inner.find(filter)
    }

    fn find_one(&self, filter: &CarFilter) -> Result<Option<Car>> {
        let found = self.inner.find_one(filter)?;
        if let Some(car) = &found {
            if self.reserve_after_find.load(Ordering::SeqCst) {
                self.inner.update_one(
                    &CarFilter::by_id(car.id),
                    &CarUpdate::new().status(CarStatus::Reserved).customer(john()),
                )?;
            }
        }
        Ok(found)
    }

    fn insert_one(&self, car: NewCar) -> Result<InsertResult> {
        if self.fail_insert.load(Ordering::SeqCst) {
            return Err(InventoryError::Storage("insert refused".into()));
        }
        self.inner.insert_one(car)
    }

    fn update_one(&self, filter: &CarFilter, update: &CarUpdate) -> Result<UpdateResult> {
        self.inner.update_one(filter, update)
    }

    fn delete_one(&self, filter: &CarFilter) -> Result<DeleteResult> {
        if self.fail_delete.load(Ordering::SeqCst) {
            return Err(InventoryError::Storage("delete refused".into()));
        }
        self.inner.delete_one(filter)
    }
}

/// Blob store whose uploads fail while `fail_upload` is set.
struct FlakyUploads {
    inner: FileBlobStore,
    fail_upload: AtomicBool,
}

impl FlakyUploads {
    fn new(dir: &TempDir, fail_upload: bool) -> Self {
        Self {
            inner: FileBlobStore::open(dir.path()).expect("open blob store"),
            fail_upload: AtomicBool::new(fail_upload),
        }
    }
}

impl BlobStore for FlakyUploads {
    fn upload(&self, name: &str, data: &[u8]) -> Result<BlobId> {
        if self.fail_upload.load(Ordering::SeqCst) {
            return Err(InventoryError::Storage("disk full".into()));
        }
        self.inner.upload(name, data)
    }

    fn download(&self, id: &BlobId) -> Result<Vec<u8>> {
        self.inner.download(id)
    }

    fn delete(&self, id: &BlobId) -> Result<()> {
        self.inner.delete(id)
    }
}

fn flaky_inventory(dir: &TempDir) -> Inventory<FlakyCollection, FileBlobStore> {
    let blobs = FileBlobStore::open(dir.path()).expect("open blob store");
    Inventory::new(FlakyCollection::new(), blobs)
}

#[test]
fn test_create_insert_failure_discards_uploaded_image() {
    let dir = tmp_dir();
    let inv = flaky_inventory(&dir);
    inv.collection().fail_insert.store(true, Ordering::SeqCst);

    let res = inv.create_car(corolla(), Image::new("car.jpg", b"img"));
    assert!(res.as_ref().is_err_and(InventoryError::is_storage));
    assert!(inv.blob_store().list_ids().unwrap().is_empty(), "no orphaned image");
    assert!(inv.list_by_status(CarStatus::Available).unwrap().is_empty());
}

#[test]
fn test_create_upload_failure_inserts_nothing() {
    let dir = tmp_dir();
    let inv = Inventory::new(JsonCollection::in_memory(), FlakyUploads::new(&dir, true));

    let res = inv.create_car(corolla(), Image::new("car.jpg", b"img"));
    assert!(matches!(res, Err(InventoryError::Storage(_))));
    assert!(inv.collection().is_empty());
}

#[test]
fn test_delete_document_failure_leaves_car_without_image() {
    // The image is deleted before the document; a failing document delete
    // leaves the car pointing at a missing image.
    let dir = tmp_dir();
    let inv = flaky_inventory(&dir);
    let id = create(&inv, b"img");
    let picture = get(&inv, id).picture;
    inv.collection().fail_delete.store(true, Ordering::SeqCst);

    let res = inv.delete_car(id);
    assert!(matches!(res, Err(InventoryError::Storage(_))));
    assert_eq!(get(&inv, id).picture, picture);
    assert!(matches!(
        inv.get_image(&picture.to_string()),
        Err(InventoryError::BlobNotFound { .. })
    ));

    // Retrying once the collection recovers completes the delete.
    inv.collection().fail_delete.store(false, Ordering::SeqCst);
    inv.delete_car(id).unwrap();
    assert!(inv.list_by_status(CarStatus::Available).unwrap().is_empty());
}

#[test]
fn test_update_loses_race_against_reservation() {
    let dir = tmp_dir();
    let inv = flaky_inventory(&dir);
    let id = create(&inv, b"old");
    inv.collection().reserve_after_find.store(true, Ordering::SeqCst);

    let changed = CarDetails { price: 1.0, ..corolla() };
    let res = inv.update_car(id, changed, Some(Image::new("new.jpg", b"new")));
    assert!(is_not_matched(&res));

    // The final write is conditional, so the reservation is not overwritten.
    let car = get(&inv, id);
    assert_eq!(car.status, CarStatus::Reserved);
    assert_eq!(car.details, corolla());
    // The new image is discarded and the old one is still served.
    assert_eq!(inv.blob_store().list_ids().unwrap(), [car.picture]);
    assert_eq!(inv.get_image(&car.picture.to_string()).unwrap(), b"old");
}

#[test]
fn test_update_upload_failure_keeps_old_image() {
    let dir = tmp_dir();
    let inv = Inventory::new(JsonCollection::in_memory(), FlakyUploads::new(&dir, false));
    let id = create(&inv, b"old");
    let picture = get(&inv, id).picture;
    inv.blob_store().fail_upload.store(true, Ordering::SeqCst);

    let changed = CarDetails { price: 1.0, ..corolla() };
    let res = inv.update_car(id, changed, Some(Image::new("new.jpg", b"new")));
    assert!(matches!(res, Err(InventoryError::Storage(_))));

    let car = get(&inv, id);
    assert_eq!(car.details, corolla());
    assert_eq!(car.picture, picture);
    assert_eq!(inv.get_image(&picture.to_string()).unwrap(), b"old");
}
