use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// One scraped property-for-rent record. Every field the page may or may
/// not carry is optional; a missing field stays `None` instead of failing
/// the record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Listing {
    pub name: Option<String>,
    /// Monthly rent in whole THB.
    pub price: Option<i64>,
    pub location: Location,
    pub property_info: PropertyInfo,
    pub listing_info: ListingInfo,
    pub agent_info: AgentInfo,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub district: Option<String>,
    pub region: Option<String>,
    pub area: Option<String>,
    pub district_code: Option<String>,
    pub region_code: Option<String>,
    pub area_code: Option<String>,
    /// Non-empty parts of (area, district, region) joined by ", ".
    pub address: Option<String>,
    /// (latitude, longitude), populated after resolution.
    pub coordinates: Option<(f64, f64)>,
    /// Reference-point label to distance in km, keyed by whatever the
    /// reference store held at resolution time.
    pub distances: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PropertyInfo {
    pub bedrooms: Option<u32>,
    pub bathrooms: Option<u32>,
    pub floor_area: Option<String>,
    pub property_type: Option<String>,
    pub furnishing: Option<String>,
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ListingInfo {
    pub id: Option<String>,
    pub url: Option<String>,
    pub position: Option<u32>,
    pub status: Option<String>,
    /// "rent" or "sale".
    pub variant: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentInfo {
    pub id: Option<String>,
    pub name: Option<String>,
    pub phone: Option<String>,
    pub phone_formatted: Option<String>,
    pub line_id: Option<String>,
    pub is_verified: bool,
    pub verification_date: Option<String>,
    pub agency_type: Option<String>,
    pub profile_image: Option<String>,
}

fn opt(v: &Option<String>) -> &str {
    v.as_deref().unwrap_or("None")
}

impl fmt::Display for Listing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Name       : {}", opt(&self.name))?;
        match self.price {
            Some(p) => writeln!(f, "Price      : ฿{}/month", p)?,
            None => writeln!(f, "Price      : None")?,
        }
        writeln!(f, "Address    : {}", opt(&self.location.address))?;
        match self.location.coordinates {
            Some((lat, lon)) => writeln!(f, "Coordinates: ({:.4}, {:.4})", lat, lon)?,
            None => writeln!(f, "Coordinates: None")?,
        }
        for (label, km) in &self.location.distances {
            writeln!(f, "             {:.1} km to {}", km, label)?;
        }
        match (self.property_info.bedrooms, self.property_info.bathrooms) {
            (Some(bed), Some(bath)) => writeln!(f, "Rooms      : {} bed, {} bath", bed, bath)?,
            (Some(bed), None) => writeln!(f, "Rooms      : {} bed", bed)?,
            (None, Some(bath)) => writeln!(f, "Rooms      : {} bath", bath)?,
            (None, None) => writeln!(f, "Rooms      : None")?,
        }
        writeln!(f, "Size       : {}", opt(&self.property_info.floor_area))?;
        writeln!(f, "Type       : {}", opt(&self.property_info.property_type))?;
        writeln!(f, "Agent      : {}", opt(&self.agent_info.name))?;
        writeln!(f, "Phone      : {}", opt(&self.agent_info.phone_formatted))?;
        writeln!(f, "URL        : {}", opt(&self.listing_info.url))
    }
}
