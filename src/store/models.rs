// SPDX-License-Identifier: GPL-3.0-only
use chrono::{DateTime, Utc};
use serde_json::Value;
use uuid::Uuid;

/// A single column value, typed the way it is stored.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Int(Option<i64>),
    Float(Option<f64>),
    Text(Option<String>),
    /// Lists and opaque passthrough values, stored as JSON text
    Json(Value),
}

impl FieldValue {
    pub fn list(items: &[Value]) -> Self {
        FieldValue::Json(Value::Array(items.to_vec()))
    }
}

/// Flattened listing row, keyed by the provider's external identifier.
#[derive(Debug, Clone, PartialEq)]
pub struct ListingRecord {
    /// Stable identifier assigned by the provider
    pub external_id: i64,

    pub licence_plate: Option<String>,
    pub vin: Option<String>,
    pub engine_name: Option<String>,
    pub engine_code: Option<String>,
    pub engine_type: Option<String>,

    pub price: Option<i64>,
    /// Price history as delivered by the provider
    pub prices: Vec<Value>,
    pub odometer_km: Option<i64>,
    pub status: Option<String>,
    pub days_for_sale: Option<i64>,

    pub dates_published: Option<String>,
    pub dates_removed: Option<String>,
    pub dates_changed: Option<String>,
    pub dates_sold: Option<String>,

    pub brand: Option<String>,
    pub model: Option<String>,
    pub series: Option<String>,
    pub generation: Option<String>,
    pub chassis: Option<String>,
    pub model_year: Option<i64>,
    pub name: Option<String>,
    pub sales_name: Option<String>,

    pub transmission_type: Option<String>,
    pub color: Option<String>,
    pub number_of_doors: Option<i64>,
    pub acceleration_0_to_100_kmh: Option<f64>,
    pub power_kw: Option<f64>,
    pub horsepower_hp: Option<f64>,
    pub electric_engine: Value,
    pub type_of_electric_car: Option<String>,
    pub trim_packages: Vec<Value>,
    pub fuels: Vec<Value>,
    pub awards: Value,

    pub url: Option<String>,
    pub source: Option<String>,

    pub wltp_fuel_consumption_combined_min: Option<f64>,
    pub wltp_fuel_consumption_combined_max: Option<f64>,
    pub wltp_co2_emission_combined_min: Option<f64>,
    pub wltp_co2_emission_combined_max: Option<f64>,
    pub nedc_fuel_consumption_combined_min: Option<f64>,
    pub nedc_fuel_consumption_combined_max: Option<f64>,
    pub nedc_co2_emission_combined_min: Option<f64>,
    pub nedc_co2_emission_combined_max: Option<f64>,
    pub euro_ncap_year: Option<i64>,
    pub euro_ncap_result: Option<i64>,

    pub image_urls: Vec<Value>,

    /// Audit log entry that produced the last write
    pub api_log_id: Option<Uuid>,
}

impl ListingRecord {
    /// Empty record for `external_id`: every scalar null, every list empty.
    pub fn new(external_id: i64) -> Self {
        Self {
            external_id,
            licence_plate: None,
            vin: None,
            engine_name: None,
            engine_code: None,
            engine_type: None,
            price: None,
            prices: Vec::new(),
            odometer_km: None,
            status: None,
            days_for_sale: None,
            dates_published: None,
            dates_removed: None,
            dates_changed: None,
            dates_sold: None,
            brand: None,
            model: None,
            series: None,
            generation: None,
            chassis: None,
            model_year: None,
            name: None,
            sales_name: None,
            transmission_type: None,
            color: None,
            number_of_doors: None,
            acceleration_0_to_100_kmh: None,
            power_kw: None,
            horsepower_hp: None,
            electric_engine: Value::Null,
            type_of_electric_car: None,
            trim_packages: Vec::new(),
            fuels: Vec::new(),
            awards: Value::Null,
            url: None,
            source: None,
            wltp_fuel_consumption_combined_min: None,
            wltp_fuel_consumption_combined_max: None,
            wltp_co2_emission_combined_min: None,
            wltp_co2_emission_combined_max: None,
            nedc_fuel_consumption_combined_min: None,
            nedc_fuel_consumption_combined_max: None,
            nedc_co2_emission_combined_min: None,
            nedc_co2_emission_combined_max: None,
            euro_ncap_year: None,
            euro_ncap_result: None,
            image_urls: Vec::new(),
            api_log_id: None,
        }
    }

    /// Mapped columns in schema order. Excludes the key and the audit link,
    /// which are not part of the compared state.
    pub fn fields(&self) -> Vec<(&'static str, FieldValue)> {
        use FieldValue::{Float, Int, Json, Text};

        vec![
            ("licence_plate", Text(self.licence_plate.clone())),
            ("vin", Text(self.vin.clone())),
            ("engine_name", Text(self.engine_name.clone())),
            ("engine_code", Text(self.engine_code.clone())),
            ("engine_type", Text(self.engine_type.clone())),
            ("price", Int(self.price)),
            ("prices", FieldValue::list(&self.prices)),
            ("odometer_km", Int(self.odometer_km)),
            ("status", Text(self.status.clone())),
            ("days_for_sale", Int(self.days_for_sale)),
            ("dates_published", Text(self.dates_published.clone())),
            ("dates_removed", Text(self.dates_removed.clone())),
            ("dates_changed", Text(self.dates_changed.clone())),
            ("dates_sold", Text(self.dates_sold.clone())),
            ("brand", Text(self.brand.clone())),
            ("model", Text(self.model.clone())),
            ("series", Text(self.series.clone())),
            ("generation", Text(self.generation.clone())),
            ("chassis", Text(self.chassis.clone())),
            ("model_year", Int(self.model_year)),
            ("name", Text(self.name.clone())),
            ("sales_name", Text(self.sales_name.clone())),
            ("transmission_type", Text(self.transmission_type.clone())),
            ("color", Text(self.color.clone())),
            ("number_of_doors", Int(self.number_of_doors)),
            ("acceleration_0_to_100_kmh", Float(self.acceleration_0_to_100_kmh)),
            ("power_kw", Float(self.power_kw)),
            ("horsepower_hp", Float(self.horsepower_hp)),
            ("electric_engine", Json(self.electric_engine.clone())),
            ("type_of_electric_car", Text(self.type_of_electric_car.clone())),
            ("trim_packages", FieldValue::list(&self.trim_packages)),
            ("fuels", FieldValue::list(&self.fuels)),
            ("awards", Json(self.awards.clone())),
            ("url", Text(self.url.clone())),
            ("source", Text(self.source.clone())),
            (
                "wltp_fuel_consumption_combined_min",
                Float(self.wltp_fuel_consumption_combined_min),
            ),
            (
                "wltp_fuel_consumption_combined_max",
                Float(self.wltp_fuel_consumption_combined_max),
            ),
            ("wltp_co2_emission_combined_min", Float(self.wltp_co2_emission_combined_min)),
            ("wltp_co2_emission_combined_max", Float(self.wltp_co2_emission_combined_max)),
            (
                "nedc_fuel_consumption_combined_min",
                Float(self.nedc_fuel_consumption_combined_min),
            ),
            (
                "nedc_fuel_consumption_combined_max",
                Float(self.nedc_fuel_consumption_combined_max),
            ),
            ("nedc_co2_emission_combined_min", Float(self.nedc_co2_emission_combined_min)),
            ("nedc_co2_emission_combined_max", Float(self.nedc_co2_emission_combined_max)),
            ("euro_ncap_year", Int(self.euro_ncap_year)),
            ("euro_ncap_result", Int(self.euro_ncap_result)),
            ("image_urls", FieldValue::list(&self.image_urls)),
        ]
    }

    pub fn has_images(&self) -> bool {
        !self.image_urls.is_empty()
    }
}

/// Raw provider payload kept verbatim for audit. Never updated after insert.
#[derive(Debug, Clone)]
pub struct RawApiLogEntry {
    pub id: Uuid,
    pub received_at: DateTime<Utc>,
    pub payload: Value,
}

impl RawApiLogEntry {
    pub fn new(payload: Value) -> Self {
        Self {
            id: Uuid::new_v4(),
            received_at: Utc::now(),
            payload,
        }
    }
}
