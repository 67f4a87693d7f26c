//! Rust structs mapping to the four tables.
//!
//! Each stored model implements `from_row` for a row selected with the
//! column list of its repository. `New*` structs carry an insert and
//! `*Changes` structs a partial update; `None` fields are left untouched.
//! Models hold no back-references: related rows are fetched explicitly
//! through the repositories.

use chrono::NaiveDate;
use realstate_common::{Money, OwnerId, PropertyId, PropertyImageId, PropertyTraceId};

use crate::schema::{Record, Value};

// ---------------------------------------------------------------------------
// Owner
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Owner {
    pub id: OwnerId,
    pub name: String,
    pub address: String,
    pub photo: Option<Vec<u8>>,
    pub birthday: NaiveDate,
}

impl Owner {
    /// Build from a row selected as: IdOwner, Name, Address, Photo, Birthday
    pub fn from_row(row: &rusqlite::Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: OwnerId::from(row.get::<_, i64>(0)?),
            name: row.get(1)?,
            address: row.get(2)?,
            photo: row.get(3)?,
            birthday: row.get(4)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOwner {
    pub name: String,
    pub address: String,
    pub photo: Option<Vec<u8>>,
    pub birthday: NaiveDate,
}

impl NewOwner {
    pub(crate) fn record(&self) -> Record<'_> {
        vec![
            ("Name", Value::Text(&self.name)),
            ("Address", Value::Text(&self.address)),
            ("Photo", self.photo.as_deref().map_or(Value::Null, Value::Blob)),
            ("Birthday", Value::Date(self.birthday)),
        ]
    }

    pub(crate) fn into_owner(self, id: OwnerId) -> Owner {
        Owner {
            id,
            name: self.name,
            address: self.address,
            photo: self.photo,
            birthday: self.birthday,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OwnerChanges {
    pub name: Option<String>,
    pub address: Option<String>,
    /// `Some(None)` clears the photo.
    pub photo: Option<Option<Vec<u8>>>,
    pub birthday: Option<NaiveDate>,
}

impl OwnerChanges {
    pub(crate) fn record(&self) -> Record<'_> {
        let mut r = Record::new();
        if let Some(name) = &self.name {
            r.push(("Name", Value::Text(name)));
        }
        if let Some(address) = &self.address {
            r.push(("Address", Value::Text(address)));
        }
        if let Some(photo) = &self.photo {
            r.push(("Photo", photo.as_deref().map_or(Value::Null, Value::Blob)));
        }
        if let Some(birthday) = self.birthday {
            r.push(("Birthday", Value::Date(birthday)));
        }
        r
    }
}

// ---------------------------------------------------------------------------
// Property
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Property {
    pub id: PropertyId,
    pub name: String,
    pub address: String,
    pub price: Money,
    pub code_internal: String,
    pub year: i32,
    pub owner_id: OwnerId,
}

impl Property {
    /// Build from a row selected as:
    /// IdProperty, Name, Address, Price, CodeInternal, Year, IdOwner
    pub fn from_row(row: &rusqlite::Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: PropertyId::from(row.get::<_, i64>(0)?),
            name: row.get(1)?,
            address: row.get(2)?,
            price: Money::from_cents(row.get(3)?),
            code_internal: row.get(4)?,
            year: row.get(5)?,
            owner_id: OwnerId::from(row.get::<_, i64>(6)?),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewProperty {
    pub name: String,
    pub address: String,
    pub price: Money,
    pub code_internal: String,
    pub year: i32,
    pub owner_id: OwnerId,
}

impl NewProperty {
    pub(crate) fn record(&self) -> Record<'_> {
        vec![
            ("Name", Value::Text(&self.name)),
            ("Address", Value::Text(&self.address)),
            ("Price", Value::Decimal(self.price)),
            ("CodeInternal", Value::Text(&self.code_internal)),
            ("Year", Value::Integer(i64::from(self.year))),
            ("IdOwner", Value::Integer(self.owner_id.get())),
        ]
    }

    pub(crate) fn into_property(self, id: PropertyId) -> Property {
        Property {
            id,
            name: self.name,
            address: self.address,
            price: self.price,
            code_internal: self.code_internal,
            year: self.year,
            owner_id: self.owner_id,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PropertyChanges {
    pub name: Option<String>,
    pub address: Option<String>,
    pub price: Option<Money>,
    pub code_internal: Option<String>,
    pub year: Option<i32>,
    /// Transfer the property to another owner.
    pub owner_id: Option<OwnerId>,
}

impl PropertyChanges {
    pub(crate) fn record(&self) -> Record<'_> {
        let mut r = Record::new();
        if let Some(name) = &self.name {
            r.push(("Name", Value::Text(name)));
        }
        if let Some(address) = &self.address {
            r.push(("Address", Value::Text(address)));
        }
        if let Some(price) = self.price {
            r.push(("Price", Value::Decimal(price)));
        }
        if let Some(code) = &self.code_internal {
            r.push(("CodeInternal", Value::Text(code)));
        }
        if let Some(year) = self.year {
            r.push(("Year", Value::Integer(i64::from(year))));
        }
        if let Some(owner_id) = self.owner_id {
            r.push(("IdOwner", Value::Integer(owner_id.get())));
        }
        r
    }
}

// ---------------------------------------------------------------------------
// PropertyImage
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyImage {
    pub id: PropertyImageId,
    pub property_id: PropertyId,
    pub file: Vec<u8>,
    pub enabled: bool,
}

impl PropertyImage {
    /// Build from a row selected as: IdPropertyImage, IdProperty, File, Enabled
    pub fn from_row(row: &rusqlite::Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: PropertyImageId::from(row.get::<_, i64>(0)?),
            property_id: PropertyId::from(row.get::<_, i64>(1)?),
            file: row.get(2)?,
            enabled: row.get(3)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPropertyImage {
    pub property_id: PropertyId,
    pub file: Vec<u8>,
    /// Left to the column default (enabled) when `None`.
    pub enabled: Option<bool>,
}

impl NewPropertyImage {
    pub fn new(property_id: PropertyId, file: Vec<u8>) -> Self {
        Self {
            property_id,
            file,
            enabled: None,
        }
    }

    pub(crate) fn record(&self) -> Record<'_> {
        let mut r = vec![
            ("IdProperty", Value::Integer(self.property_id.get())),
            ("File", Value::Blob(&self.file)),
        ];
        if let Some(enabled) = self.enabled {
            r.push(("Enabled", Value::Boolean(enabled)));
        }
        r
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PropertyImageChanges {
    pub file: Option<Vec<u8>>,
    pub enabled: Option<bool>,
}

impl PropertyImageChanges {
    pub(crate) fn record(&self) -> Record<'_> {
        let mut r = Record::new();
        if let Some(file) = &self.file {
            r.push(("File", Value::Blob(file)));
        }
        if let Some(enabled) = self.enabled {
            r.push(("Enabled", Value::Boolean(enabled)));
        }
        r
    }
}

// ---------------------------------------------------------------------------
// PropertyTrace
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyTrace {
    pub id: PropertyTraceId,
    pub property_id: PropertyId,
    pub date_sale: NaiveDate,
    pub name: String,
    pub value: Money,
    pub tax: Money,
}

impl PropertyTrace {
    /// Build from a row selected as:
    /// IdPropertyTrace, IdProperty, DateSale, Name, Value, Tax
    pub fn from_row(row: &rusqlite::Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: PropertyTraceId::from(row.get::<_, i64>(0)?),
            property_id: PropertyId::from(row.get::<_, i64>(1)?),
            date_sale: row.get(2)?,
            name: row.get(3)?,
            value: Money::from_cents(row.get(4)?),
            tax: Money::from_cents(row.get(5)?),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPropertyTrace {
    pub property_id: PropertyId,
    pub date_sale: NaiveDate,
    pub name: String,
    pub value: Money,
    pub tax: Money,
}

impl NewPropertyTrace {
    pub(crate) fn record(&self) -> Record<'_> {
        vec![
            ("IdProperty", Value::Integer(self.property_id.get())),
            ("DateSale", Value::Date(self.date_sale)),
            ("Name", Value::Text(&self.name)),
            ("Value", Value::Decimal(self.value)),
            ("Tax", Value::Decimal(self.tax)),
        ]
    }

    pub(crate) fn into_trace(self, id: PropertyTraceId) -> PropertyTrace {
        PropertyTrace {
            id,
            property_id: self.property_id,
            date_sale: self.date_sale,
            name: self.name,
            value: self.value,
            tax: self.tax,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PropertyTraceChanges {
    pub date_sale: Option<NaiveDate>,
    pub name: Option<String>,
    pub value: Option<Money>,
    pub tax: Option<Money>,
}

impl PropertyTraceChanges {
    pub(crate) fn record(&self) -> Record<'_> {
        let mut r = Record::new();
        if let Some(date_sale) = self.date_sale {
            r.push(("DateSale", Value::Date(date_sale)));
        }
        if let Some(name) = &self.name {
            r.push(("Name", Value::Text(name)));
        }
        if let Some(value) = self.value {
            r.push(("Value", Value::Decimal(value)));
        }
        if let Some(tax) = self.tax {
            r.push(("Tax", Value::Decimal(tax)));
        }
        r
    }
}
