//! Property CRUD operations and search.

use realstate_common::{Error, Money, OwnerId, PropertyId, Result};
use rusqlite::types::ToSql;

use super::{PropertyImageRepository, PropertyTraceRepository};
use crate::models::{NewProperty, Property, PropertyChanges, PropertyImage, PropertyTrace};
use crate::schema::PROPERTY;
use crate::session::Session;

const COLS: &str =
    r#""IdProperty", "Name", "Address", "Price", "CodeInternal", "Year", "IdOwner""#;

/// Search criteria for [`PropertyRepository::filter`].
///
/// Text criteria are case-insensitive substring matches; blank strings are
/// ignored. Price bounds are inclusive.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PropertyFilter {
    pub name: Option<String>,
    pub address: Option<String>,
    pub min_price: Option<Money>,
    pub max_price: Option<Money>,
}

impl PropertyFilter {
    /// Check that the price bounds are usable.
    pub fn validate(&self) -> Result<()> {
        if self.min_price.is_some_and(|p| p.is_negative()) {
            return Err(Error::invalid_input("minimum price cannot be negative"));
        }
        if self.max_price.is_some_and(|p| p.is_negative()) {
            return Err(Error::invalid_input("maximum price cannot be negative"));
        }
        if let (Some(min), Some(max)) = (self.min_price, self.max_price) {
            if min > max {
                return Err(Error::invalid_input(format!(
                    "minimum price {min} is greater than maximum price {max}"
                )));
            }
        }
        Ok(())
    }

    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }

    fn text(value: &Option<String>) -> Option<&str> {
        value.as_deref().map(str::trim).filter(|s| !s.is_empty())
    }
}

pub struct PropertyRepository<'s> {
    session: &'s mut Session,
}

impl<'s> PropertyRepository<'s> {
    pub(crate) fn new(session: &'s mut Session) -> Self {
        Self { session }
    }

    /// Insert a new property. Fails with a unique violation if the
    /// internal code is taken, or a foreign key violation if the owner
    /// does not exist.
    pub fn insert(&mut self, new: NewProperty) -> Result<Property> {
        let id = self.session.insert(&PROPERTY, &new.record())?;
        Ok(new.into_property(PropertyId::from(id)))
    }

    pub fn get(&mut self, id: PropertyId) -> Result<Option<Property>> {
        let q = format!(r#"SELECT {COLS} FROM "Property" WHERE "IdProperty" = ?1"#);
        self.session.query_opt(&q, &[&id.get()], Property::from_row)
    }

    pub fn require(&mut self, id: PropertyId) -> Result<Property> {
        self.get(id)?.ok_or_else(|| Error::not_found("Property", id))
    }

    /// Look a property up by its internal code.
    pub fn get_by_code(&mut self, code: &str) -> Result<Option<Property>> {
        let q = format!(r#"SELECT {COLS} FROM "Property" WHERE "CodeInternal" = ?1"#);
        self.session.query_opt(&q, &[&code], Property::from_row)
    }

    pub fn list(&mut self) -> Result<Vec<Property>> {
        let q = format!(r#"SELECT {COLS} FROM "Property" ORDER BY "IdProperty" ASC"#);
        self.session.query_all(&q, &[], Property::from_row)
    }

    pub fn list_by_owner(&mut self, owner: OwnerId) -> Result<Vec<Property>> {
        let q = format!(
            r#"SELECT {COLS} FROM "Property" WHERE "IdOwner" = ?1 ORDER BY "IdProperty" ASC"#
        );
        self.session.query_all(&q, &[&owner.get()], Property::from_row)
    }

    /// Properties matching every criterion set in `filter`.
    ///
    /// Text criteria match anywhere in the column, ignoring case under
    /// Unicode rules (`río` finds `Casa RÍO`).
    pub fn filter(&mut self, filter: &PropertyFilter) -> Result<Vec<Property>> {
        filter.validate()?;

        let mut conditions: Vec<String> = Vec::new();
        let mut params: Vec<Box<dyn ToSql>> = Vec::new();

        if let Some(name) = PropertyFilter::text(&filter.name) {
            params.push(Box::new(name.to_lowercase()));
            conditions.push(format!(r#"instr(casefold("Name"), ?{}) > 0"#, params.len()));
        }
        if let Some(address) = PropertyFilter::text(&filter.address) {
            params.push(Box::new(address.to_lowercase()));
            conditions.push(format!(r#"instr(casefold("Address"), ?{}) > 0"#, params.len()));
        }
        if let Some(min) = filter.min_price {
            params.push(Box::new(min.cents()));
            conditions.push(format!(r#""Price" >= ?{}"#, params.len()));
        }
        if let Some(max) = filter.max_price {
            params.push(Box::new(max.cents()));
            conditions.push(format!(r#""Price" <= ?{}"#, params.len()));
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", conditions.join(" AND "))
        };
        let q = format!(r#"SELECT {COLS} FROM "Property"{where_clause} ORDER BY "IdProperty" ASC"#);

        let param_refs: Vec<&dyn ToSql> = params.iter().map(|p| p.as_ref()).collect();
        self.session.query_all(&q, &param_refs, Property::from_row)
    }

    /// Apply `changes`. Returns false if no such property exists.
    pub fn update(&mut self, id: PropertyId, changes: &PropertyChanges) -> Result<bool> {
        self.session.update(&PROPERTY, id.get(), &changes.record())
    }

    /// Delete a property together with its images and traces.
    pub fn delete(&mut self, id: PropertyId) -> Result<bool> {
        self.session.delete(&PROPERTY, id.get())
    }

    pub fn images_for_property(&mut self, id: PropertyId) -> Result<Vec<PropertyImage>> {
        PropertyImageRepository::new(&mut *self.session).list_by_property(id)
    }

    pub fn traces_for_property(&mut self, id: PropertyId) -> Result<Vec<PropertyTrace>> {
        PropertyTraceRepository::new(&mut *self.session).list_by_property(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NewOwner, NewPropertyImage, NewPropertyTrace};
    use crate::store::Store;
    use chrono::NaiveDate;
    use realstate_common::ConstraintKind;

    fn owner(s: &mut Session) -> OwnerId {
        s.owners()
            .insert(NewOwner {
                name: "A. Smith".into(),
                address: "1 Main St".into(),
                photo: None,
                birthday: NaiveDate::from_ymd_opt(1970, 1, 1).unwrap(),
            })
            .unwrap()
            .id
    }

    fn house(owner_id: OwnerId, code: &str, name: &str, address: &str, cents: i64) -> NewProperty {
        NewProperty {
            name: name.into(),
            address: address.into(),
            price: Money::from_cents(cents),
            code_internal: code.into(),
            year: 1999,
            owner_id,
        }
    }

    #[test]
    fn create_get_and_lookup_by_code() {
        let store = Store::memory().unwrap();
        let mut s = store.open_session().unwrap();
        let o = owner(&mut s);
        let p = s
            .properties()
            .insert(house(o, "RE-001", "Casa", "Calle 1", 250_000_00))
            .unwrap();
        assert_eq!(s.properties().require(p.id).unwrap(), p);
        assert_eq!(s.properties().get_by_code("RE-001").unwrap(), Some(p));
        assert!(s.properties().get_by_code("RE-404").unwrap().is_none());
    }

    #[test]
    fn price_keeps_exact_cents() {
        let store = Store::memory().unwrap();
        let mut s = store.open_session().unwrap();
        let o = owner(&mut s);
        let p = s
            .properties()
            .insert(house(o, "RE-1", "Casa", "Calle 1", 123_456_789_01))
            .unwrap();
        let read = s.properties().require(p.id).unwrap();
        assert_eq!(read.price.to_string(), "123456789.01");
    }

    #[test]
    fn duplicate_code_is_unique_violation() {
        let store = Store::memory().unwrap();
        let mut s = store.open_session().unwrap();
        let o = owner(&mut s);
        s.properties().insert(house(o, "RE-1", "A", "x", 1)).unwrap();
        let err = s.properties().insert(house(o, "RE-1", "B", "y", 2)).unwrap_err();
        assert_eq!(err.constraint_kind(), Some(ConstraintKind::Unique));
        assert_eq!(s.properties().list().unwrap().len(), 1);
    }

    #[test]
    fn unknown_owner_is_foreign_key_violation() {
        let store = Store::memory().unwrap();
        let mut s = store.open_session().unwrap();
        let err = s
            .properties()
            .insert(house(OwnerId::from(77), "RE-1", "A", "x", 1))
            .unwrap_err();
        assert_eq!(err.constraint_kind(), Some(ConstraintKind::ForeignKey));
    }

    #[test]
    fn over_precision_price_rejected() {
        let store = Store::memory().unwrap();
        let mut s = store.open_session().unwrap();
        let o = owner(&mut s);
        let err = s
            .properties()
            .insert(house(o, "RE-1", "A", "x", 1_000_000_000_000_000_000))
            .unwrap_err();
        assert_eq!(err.constraint_kind(), Some(ConstraintKind::Check));
    }

    #[test]
    fn filter_folds_non_ascii_case() {
        let store = Store::memory().unwrap();
        let mut s = store.open_session().unwrap();
        let o = owner(&mut s);
        s.properties().insert(house(o, "RE-1", "Casa RÍO", "Calle Ñandú 3", 150_000_00)).unwrap();
        s.properties().insert(house(o, "RE-2", "Casa Rio", "Main Street 9", 150_000_00)).unwrap();

        for needle in ["río", "RÍO", "Río"] {
            let by_name = PropertyFilter {
                name: Some(needle.into()),
                ..PropertyFilter::default()
            };
            let found = s.properties().filter(&by_name).unwrap();
            assert_eq!(found.len(), 1, "{needle}");
            assert_eq!(found[0].code_internal, "RE-1");
        }

        let by_address = PropertyFilter {
            address: Some("ñandú".into()),
            ..PropertyFilter::default()
        };
        assert_eq!(s.properties().filter(&by_address).unwrap().len(), 1);
    }

    #[test]
    fn filter_matches_text_and_price_range() {
        let store = Store::memory().unwrap();
        let mut s = store.open_session().unwrap();
        let o = owner(&mut s);
        s.properties().insert(house(o, "RE-1", "Beach House", "Ocean Drive 5", 500_000_00)).unwrap();
        s.properties().insert(house(o, "RE-2", "City Flat", "Main Street 9", 200_000_00)).unwrap();
        s.properties().insert(house(o, "RE-3", "Beach Hut", "Shore Rd", 90_000_00)).unwrap();

        let codes = |props: Vec<Property>| -> Vec<String> {
            props.into_iter().map(|p| p.code_internal).collect()
        };

        let by_name = PropertyFilter {
            name: Some("beach".into()),
            ..PropertyFilter::default()
        };
        assert_eq!(codes(s.properties().filter(&by_name).unwrap()), vec!["RE-1", "RE-3"]);

        let by_address = PropertyFilter {
            address: Some("MAIN".into()),
            ..PropertyFilter::default()
        };
        assert_eq!(codes(s.properties().filter(&by_address).unwrap()), vec!["RE-2"]);

        let by_range = PropertyFilter {
            min_price: Some(Money::from_cents(90_000_00)),
            max_price: Some(Money::from_cents(200_000_00)),
            ..PropertyFilter::default()
        };
        assert_eq!(codes(s.properties().filter(&by_range).unwrap()), vec!["RE-2", "RE-3"]);

        let combined = PropertyFilter {
            name: Some("beach".into()),
            min_price: Some(Money::from_cents(100_000_00)),
            ..PropertyFilter::default()
        };
        assert_eq!(codes(s.properties().filter(&combined).unwrap()), vec!["RE-1"]);

        let blank = PropertyFilter {
            name: Some("   ".into()),
            ..PropertyFilter::default()
        };
        assert_eq!(s.properties().filter(&blank).unwrap().len(), 3);
    }

    #[test]
    fn filter_rejects_bad_price_bounds() {
        let store = Store::memory().unwrap();
        let mut s = store.open_session().unwrap();

        let negative = PropertyFilter {
            min_price: Some(Money::from_cents(-1)),
            ..PropertyFilter::default()
        };
        assert!(!negative.is_valid());
        assert!(matches!(s.properties().filter(&negative), Err(Error::InvalidInput(_))));

        let inverted = PropertyFilter {
            min_price: Some(Money::from_cents(10)),
            max_price: Some(Money::from_cents(5)),
            ..PropertyFilter::default()
        };
        assert!(matches!(s.properties().filter(&inverted), Err(Error::InvalidInput(_))));
        assert!(PropertyFilter::default().is_valid());
    }

    #[test]
    fn update_transfers_owner() {
        let store = Store::memory().unwrap();
        let mut s = store.open_session().unwrap();
        let a = owner(&mut s);
        let b = owner(&mut s);
        let p = s.properties().insert(house(a, "RE-1", "A", "x", 1)).unwrap();

        let changes = PropertyChanges {
            owner_id: Some(b),
            price: Some(Money::from_cents(99)),
            ..PropertyChanges::default()
        };
        assert!(s.properties().update(p.id, &changes).unwrap());
        let moved = s.properties().require(p.id).unwrap();
        assert_eq!(moved.owner_id, b);
        assert_eq!(moved.price, Money::from_cents(99));
        assert!(s.properties().list_by_owner(a).unwrap().is_empty());

        let dangling = PropertyChanges {
            owner_id: Some(OwnerId::from(999)),
            ..PropertyChanges::default()
        };
        let err = s.properties().update(p.id, &dangling).unwrap_err();
        assert_eq!(err.constraint_kind(), Some(ConstraintKind::ForeignKey));
    }

    #[test]
    fn delete_cascades_to_images_and_traces() {
        let store = Store::memory().unwrap();
        let mut s = store.open_session().unwrap();
        let o = owner(&mut s);
        let p = s.properties().insert(house(o, "RE-1", "A", "x", 1)).unwrap();
        s.property_images()
            .insert(NewPropertyImage::new(p.id, vec![1, 2, 3]))
            .unwrap();
        s.property_traces()
            .insert(NewPropertyTrace {
                property_id: p.id,
                date_sale: NaiveDate::from_ymd_opt(2020, 5, 1).unwrap(),
                name: "Sale".into(),
                value: Money::from_cents(1),
                tax: Money::ZERO,
            })
            .unwrap();
        assert_eq!(s.properties().images_for_property(p.id).unwrap().len(), 1);
        assert_eq!(s.properties().traces_for_property(p.id).unwrap().len(), 1);

        assert!(s.properties().delete(p.id).unwrap());
        assert!(s.property_images().list().unwrap().is_empty());
        assert!(s.property_traces().list().unwrap().is_empty());
        assert!(s.owners().get(o).unwrap().is_some());
    }
}
