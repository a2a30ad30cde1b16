//! This module stores the column names used across the raw, long and derived
//! tables. The raw names must match the headers of the upstream JHU CSSE
//! time-series files exactly.

pub const RAW_PROVINCE: &str = "Province/State";
pub const RAW_COUNTRY: &str = "Country/Region";
pub const RAW_LAT: &str = "Lat";
pub const RAW_LON: &str = "Long";

pub const COUNTRY: &str = "country";
pub const PROVINCE: &str = "province";
pub const DATE: &str = "date";

pub const CONFIRMED: &str = "confirmed";
pub const DEATHS: &str = "deaths";
pub const RECOVERED: &str = "recovered";

pub const NEW_CONFIRMED: &str = "new_confirmed";
pub const NEW_DEATHS: &str = "new_deaths";
pub const NEW_CONFIRMED_7DMA: &str = "new_confirmed_7dma";
pub const NEW_DEATHS_7DMA: &str = "new_deaths_7dma";
pub const CFR: &str = "cfr";
