#![allow(dead_code)]

use chrono::{DateTime, Utc};
use memomap::{FieldMap, JsonObject, List, MappingResult, Model, ModelRef, TimestampTransform};
use serde_json::Value;

#[derive(Debug, Clone, Default)]
pub struct User {
    pub id: String,
    pub name: String,
    pub joined: Option<DateTime<Utc>>,
    pub address: Option<ModelRef<Address>>,
    pub dogs: List<Dog>,
}

impl Model for User {
    fn primary_key() -> Option<&'static str> {
        Some("id")
    }

    fn describe(&mut self, map: &mut FieldMap<'_>) -> MappingResult<()> {
        map.required("id", &mut self.id)?;
        map.field("name", &mut self.name)?;
        map.field_with("joined", &mut self.joined, &TimestampTransform)?;
        map.relation("address", &mut self.address)?;
        map.list("dogs", &mut self.dogs)?;
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct Address {
    pub street: String,
    pub city: String,
    pub country: String,
    pub phone: Option<ModelRef<Phone>>,
}

impl Model for Address {
    fn describe(&mut self, map: &mut FieldMap<'_>) -> MappingResult<()> {
        map.field("street", &mut self.street)?;
        map.field("city", &mut self.city)?;
        map.field("country", &mut self.country)?;
        map.relation("phone", &mut self.phone)?;
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct Phone {
    pub number: String,
    pub kind: String,
}

impl Model for Phone {
    fn describe(&mut self, map: &mut FieldMap<'_>) -> MappingResult<()> {
        map.required("number", &mut self.number)?;
        map.field("type", &mut self.kind)?;
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct Dog {
    pub id: String,
    pub name: String,
    pub color: String,
}

impl Model for Dog {
    fn primary_key() -> Option<&'static str> {
        Some("id")
    }

    fn describe(&mut self, map: &mut FieldMap<'_>) -> MappingResult<()> {
        map.field("id", &mut self.id)?;
        map.field("name", &mut self.name)?;
        map.field("color", &mut self.color)?;
        Ok(())
    }
}

/// Keyed by an optional field, so a document may leave the key null.
#[derive(Debug, Clone, Default)]
pub struct Kennel {
    pub code: Option<i64>,
    pub dogs: List<Dog>,
}

impl Model for Kennel {
    fn primary_key() -> Option<&'static str> {
        Some("code")
    }

    fn describe(&mut self, map: &mut FieldMap<'_>) -> MappingResult<()> {
        map.field("code", &mut self.code)?;
        map.list("dogs", &mut self.dogs)?;
        Ok(())
    }
}

pub fn user_json() -> Value {
    serde_json::json!({
        "id": "1",
        "name": "User",
        "joined": 1457827200,
        "address": {
            "street": "123 Street",
            "city": "City",
            "country": "Country",
            "phone": {
                "number": "+849876543210",
                "type": "Work"
            }
        },
        "dogs": [
            {
                "id": "1",
                "name": "Pluto",
                "color": "Black"
            }
        ]
    })
}

pub fn dogs_json() -> Value {
    serde_json::json!([
        {
            "id": "1",
            "name": "Pluto",
            "color": "Black new"
        },
        {
            "id": "2",
            "name": "Lux",
            "color": "White"
        }
    ])
}

pub fn object(value: &Value) -> &JsonObject {
    value.as_object().expect("fixture must be a JSON object")
}

pub fn array(value: &Value) -> &[Value] {
    value.as_array().expect("fixture must be a JSON array")
}
