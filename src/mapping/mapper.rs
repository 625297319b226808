// SPDX-License-Identifier: GPL-3.0-only
use serde_json::Value;
use uuid::Uuid;

use crate::mapping::coerce::{lookup, to_float, to_int, to_json, to_list, to_text, to_timestamp};
use crate::store::ListingRecord;

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum MappingError {
    #[error("Listing payload is not a JSON object")]
    NotAnObject,

    #[error("Listing payload has no usable id: {0}")]
    MissingId(String),
}

/// Normalize one provider car payload into a flat `ListingRecord`.
///
/// Only the identifier is mandatory. Every other field is coerced totally;
/// unknown keys are ignored.
pub fn map_listing(car: &Value, api_log_id: Option<Uuid>) -> Result<ListingRecord, MappingError> {
    if !car.is_object() {
        return Err(MappingError::NotAnObject);
    }

    let field = |key: &str| car.get(key);
    let nested = |path: &[&str]| lookup(car, path);

    let external_id = to_int(field("id"))
        .ok_or_else(|| MappingError::MissingId(to_json(field("id")).to_string()))?;

    Ok(ListingRecord {
        external_id,
        licence_plate: to_text(field("licence_plate")),
        vin: to_text(field("vin")),
        engine_name: to_text(field("engine_name")),
        engine_code: to_text(field("engine_code")),
        engine_type: to_text(field("engine_type")),
        price: to_int(field("price")),
        prices: to_list(field("prices")),
        odometer_km: to_int(field("odometer_km")),
        status: to_text(field("status")),
        days_for_sale: to_int(field("days_for_sale")),
        dates_published: to_timestamp(nested(&["dates", "published"])),
        dates_removed: to_timestamp(nested(&["dates", "removed"])),
        dates_changed: to_timestamp(nested(&["dates", "changed"])),
        dates_sold: to_timestamp(nested(&["dates", "sold"])),
        brand: to_text(field("brand")),
        model: to_text(field("model")),
        series: to_text(field("series")),
        generation: to_text(field("generation")),
        chassis: to_text(field("chassis")),
        model_year: to_int(field("model_year")),
        name: to_text(field("name")),
        sales_name: to_text(field("sales_name")),
        transmission_type: to_text(field("transmission_type")),
        color: to_text(field("color")),
        number_of_doors: to_int(field("number_of_doors")),
        // The provider misspells this key
        acceleration_0_to_100_kmh: to_float(field("accelleration_0_to_100_kmh")),
        power_kw: to_float(field("power_kW")),
        horsepower_hp: to_float(field("horsepower_hp")),
        electric_engine: to_json(field("electric_engine")),
        type_of_electric_car: to_text(field("type_of_electric_car")),
        trim_packages: to_list(field("trim_packages")),
        fuels: to_list(field("fuels")),
        awards: to_json(field("awards")),
        url: to_text(field("url")),
        source: to_text(field("source")),
        wltp_fuel_consumption_combined_min: to_float(nested(&["wltp", "fuel_consumption_combined", "min"])),
        wltp_fuel_consumption_combined_max: to_float(nested(&["wltp", "fuel_consumption_combined", "max"])),
        wltp_co2_emission_combined_min: to_float(nested(&["wltp", "CO2_emission_combined", "min"])),
        wltp_co2_emission_combined_max: to_float(nested(&["wltp", "CO2_emission_combined", "max"])),
        nedc_fuel_consumption_combined_min: to_float(nested(&["nedc", "fuel_consumption_combined", "min"])),
        nedc_fuel_consumption_combined_max: to_float(nested(&["nedc", "fuel_consumption_combined", "max"])),
        nedc_co2_emission_combined_min: to_float(nested(&["nedc", "CO2_emission_combined", "min"])),
        nedc_co2_emission_combined_max: to_float(nested(&["nedc", "CO2_emission_combined", "max"])),
        euro_ncap_year: to_int(nested(&["euro_ncap", "year"])),
        euro_ncap_result: to_int(nested(&["euro_ncap", "result"])),
        image_urls: to_list(field("images")),
        api_log_id,
    })
}
