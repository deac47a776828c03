// This software is provided for non-commercial use only.
// Commercial use is strictly prohibited.
// If you use, modify, or redistribute this software, you must provide proper attribution to the original author.
// (c) 2026 Onur Tuna. All rights reserved.

//! Inventory data model: cars, embedded customers, identifiers and field
//! validation.
//!
//! Identifiers are store-assigned UUIDs rendered as 32 lowercase hex digits.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::InventoryError;

/// Oldest model year accepted for a car.
pub const MIN_YEAR: i32 = 1900;

// ──────────────── identifiers ─────────────────────────────────────────────

macro_rules! hex_id {
    ($name:ident, $what:literal) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(Uuid);

        impl $name {
            /// Generate a fresh random identifier.
            pub fn generate() -> Self {
                Self(Uuid::new_v4())
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0.simple())
            }
        }

        impl FromStr for $name {
            type Err = InventoryError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                if s.len() != 32 || !s.chars().all(|c| c.is_ascii_hexdigit()) {
                    return Err(InventoryError::InvalidArgument(format!(
                        concat!("malformed ", $what, " '{}'"),
                        s
                    )));
                }
                Uuid::parse_str(s).map(Self).map_err(|e| {
                    InventoryError::InvalidArgument(format!(
                        concat!("malformed ", $what, " '{}': {}"),
                        s, e
                    ))
                })
            }
        }

        impl TryFrom<String> for $name {
            type Error = InventoryError;

            fn try_from(s: String) -> Result<Self, Self::Error> {
                s.parse()
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> String {
                id.to_string()
            }
        }
    };
}

hex_id!(CarId, "car id");
hex_id!(BlobId, "blob id");

// ──────────────── status ──────────────────────────────────────────────────

/// Lifecycle status of a car.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CarStatus {
    Available,
    Reserved,
    Sold,
}

impl CarStatus {
    pub const ALL: [CarStatus; 3] = [CarStatus::Available, CarStatus::Reserved, CarStatus::Sold];

    pub fn as_str(self) -> &'static str {
        match self {
            CarStatus::Available => "available",
            CarStatus::Reserved => "reserved",
            CarStatus::Sold => "sold",
        }
    }
}

impl fmt::Display for CarStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CarStatus {
    type Err = InventoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "available" => Ok(CarStatus::Available),
            "reserved" => Ok(CarStatus::Reserved),
            "sold" => Ok(CarStatus::Sold),
            other => Err(InventoryError::InvalidArgument(format!(
                "unrecognised status '{other}'"
            ))),
        }
    }
}

// ──────────────── documents ───────────────────────────────────────────────

/// Caller-editable attributes of a car.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CarDetails {
    pub make: String,
    pub model: String,
    pub year: i32,
    pub price: f64,
}

/// Buyer or reserver attached to a car that is not available.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    pub full_name: String,
    pub email: String,
    pub phone_number: String,
}

/// A persisted car document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Car {
    pub id: CarId,
    #[serde(flatten)]
    pub details: CarDetails,
    pub status: CarStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer: Option<Customer>,
    pub picture: BlobId,
}

/// A car document before the collection has assigned it an id.
#[derive(Debug, Clone, PartialEq)]
pub struct NewCar {
    pub details: CarDetails,
    pub status: CarStatus,
    pub customer: Option<Customer>,
    pub picture: BlobId,
}

impl NewCar {
    pub fn with_id(self, id: CarId) -> Car {
        Car {
            id,
            details: self.details,
            status: self.status,
            customer: self.customer,
            picture: self.picture,
        }
    }
}

// ──────────────── validation ──────────────────────────────────────────────

/// Field name → human-readable message, in field order.
pub type ValidationErrors = BTreeMap<String, String>;

fn required(errors: &mut ValidationErrors, field: &str, value: &str) -> bool {
    if value.trim().is_empty() {
        errors.insert(field.to_string(), format!("{field} is required"));
        return false;
    }
    true
}

impl CarDetails {
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        required(&mut errors, "make", &self.make);
        required(&mut errors, "model", &self.model);
        if self.year < MIN_YEAR {
            errors.insert("year".into(), format!("year must be at least {MIN_YEAR}"));
        }
        if !(self.price.is_finite() && self.price > 0.0) {
            errors.insert("price".into(), "price must be greater than 0".into());
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

impl Customer {
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        required(&mut errors, "fullName", &self.full_name);
        if required(&mut errors, "email", &self.email) && !is_valid_email(&self.email) {
            errors.insert("email".into(), "email is not a valid email address".into());
        }
        if required(&mut errors, "phoneNumber", &self.phone_number)
            && !self.phone_number.chars().all(|c| c.is_ascii_digit())
        {
            errors.insert(
                "phoneNumber".into(),
                "phoneNumber must contain only digits".into(),
            );
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Basic email syntax check: non-empty local part, one `@`, dotted domain,
/// no whitespace.
pub fn is_valid_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn corolla() -> CarDetails {
        CarDetails {
            make: "Toyota".into(),
            model: "Corolla".into(),
            year: 2020,
            price: 20000.0,
        }
    }

    #[test]
    fn test_status_parse() {
        for s in CarStatus::ALL {
            assert_eq!(s.as_str().parse::<CarStatus>().unwrap(), s);
        }
        assert!(matches!(
            "pending".parse::<CarStatus>(),
            Err(InventoryError::InvalidArgument(_))
        ));
        assert!("Available".parse::<CarStatus>().is_err());
    }

    #[test]
    fn test_id_display_and_parse() {
        let id = CarId::generate();
        let text = id.to_string();
        assert_eq!(text.len(), 32);
        assert_eq!(text.parse::<CarId>().unwrap(), id);

        assert!("not-an-id".parse::<CarId>().is_err());
        assert!("".parse::<BlobId>().is_err());
        // Hyphenated UUIDs are not the wire format.
        assert!(Uuid::new_v4().to_string().parse::<BlobId>().is_err());
    }

    #[test]
    fn test_car_json_shape() {
        let car = Car {
            id: CarId::generate(),
            details: corolla(),
            status: CarStatus::Reserved,
            customer: Some(Customer {
                full_name: "John Doe".into(),
                email: "john@x.com".into(),
                phone_number: "1234567890".into(),
            }),
            picture: BlobId::generate(),
        };
        let json = serde_json::to_value(&car).unwrap();
        assert_eq!(json["make"], "Toyota");
        assert_eq!(json["status"], "reserved");
        assert_eq!(json["customer"]["fullName"], "John Doe");
        assert_eq!(json["customer"]["phoneNumber"], "1234567890");
        assert_eq!(json["id"], car.id.to_string());

        let back: Car = serde_json::from_value(json).unwrap();
        assert_eq!(back, car);

        let available = Car { status: CarStatus::Available, customer: None, ..car };
        let json = serde_json::to_value(&available).unwrap();
        assert!(json.get("customer").is_none());
    }

    #[test]
    fn test_car_details_validation() {
        assert!(corolla().validate().is_ok());

        let bad = CarDetails { make: " ".into(), model: String::new(), year: 1899, price: 0.0 };
        let errors = bad.validate().unwrap_err();
        assert_eq!(errors["make"], "make is required");
        assert_eq!(errors["model"], "model is required");
        assert_eq!(errors["year"], "year must be at least 1900");
        assert_eq!(errors["price"], "price must be greater than 0");

        let nan = CarDetails { price: f64::NAN, ..corolla() };
        assert!(nan.validate().is_err());
    }

    #[test]
    fn test_customer_validation() {
        let ok = Customer {
            full_name: "John Doe".into(),
            email: "john@x.com".into(),
            phone_number: "1234567890".into(),
        };
        assert!(ok.validate().is_ok());

        let bad = Customer {
            full_name: String::new(),
            email: "john".into(),
            phone_number: "+1 555".into(),
        };
        let errors = bad.validate().unwrap_err();
        assert_eq!(errors["fullName"], "fullName is required");
        assert_eq!(errors["email"], "email is not a valid email address");
        assert_eq!(errors["phoneNumber"], "phoneNumber must contain only digits");

        let empty_phone = Customer { phone_number: String::new(), ..ok };
        assert_eq!(
            empty_phone.validate().unwrap_err()["phoneNumber"],
            "phoneNumber is required"
        );
    }

    #[test]
    fn test_is_valid_email() {
        assert!(is_valid_email("john@x.com"));
        assert!(is_valid_email("user.name+tag@domain.co.uk"));

        assert!(!is_valid_email(""));
        assert!(!is_valid_email("@x.com"));
        assert!(!is_valid_email("john@"));
        assert!(!is_valid_email("john@localhost"));
        assert!(!is_valid_email("john@@x.com"));
        assert!(!is_valid_email("jo hn@x.com"));
        assert!(!is_valid_email("john@x."));
    }
}
