// SPDX-License-Identifier: GPL-3.0-only
pub mod coerce;
pub mod mapper;

pub use mapper::{map_listing, MappingError};
