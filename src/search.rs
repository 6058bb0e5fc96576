//! Search URL construction for the DD Property results pages.

pub const BASE_URL: &str = "https://www.ddproperty.com/en/property-for-rent";

/// Cities with known marketplace region codes.
pub const CITY_REGION_CODES: &[(&str, &str)] = &[
    ("Phuket", "TH83"),
    ("Bangkok", "TH10"),
    ("Chiang Mai", "TH50"),
    ("Chiang Rai", "TH57"),
];

pub fn region_code(city: &str) -> &'static str {
    CITY_REGION_CODES
        .iter()
        .find(|(name, _)| *name == city)
        .map(|(_, code)| *code)
        .unwrap_or("TH83")
}

#[derive(Debug, Clone)]
pub struct SearchParams {
    pub city: String,
    pub min_price: Option<u32>,
    pub max_price: Option<u32>,
    pub bedrooms: Vec<String>,
    pub bathrooms: Vec<String>,
    /// Marketplace codes: CONDO, BUNG, VIL, TOWN, LAND, APT.
    pub property_types: Vec<String>,
    /// Marketplace codes: FULL, PART, UNFUR.
    pub furnishing: Vec<String>,
    /// Maximum floor area in sqm.
    pub max_size: Option<u32>,
}

impl Default for SearchParams {
    fn default() -> Self {
        SearchParams {
            city: "Phuket".to_string(),
            min_price: None,
            max_price: None,
            bedrooms: vec![],
            bathrooms: vec![],
            property_types: vec![],
            furnishing: vec![],
            max_size: None,
        }
    }
}

impl SearchParams {
    pub fn build_url(&self) -> String {
        let mut query: Vec<(&str, String)> = vec![
            ("freetext", self.city.clone()),
            ("region_code", region_code(&self.city).to_string()),
            ("market", "residential".to_string()),
            ("search", "true".to_string()),
        ];

        if let Some(min) = self.min_price {
            query.push(("minprice", min.to_string()));
        }
        if let Some(max) = self.max_price {
            query.push(("maxprice", max.to_string()));
        }
        for bed in &self.bedrooms {
            query.push(("beds[]", bed.clone()));
        }
        for bath in &self.bathrooms {
            query.push(("baths[]", bath.clone()));
        }
        for code in &self.property_types {
            query.push(("property_type_code[]", code.clone()));
        }
        for code in &self.furnishing {
            query.push(("furnishing[]", code.clone()));
        }
        if let Some(size) = self.max_size {
            query.push(("maxsize", size.to_string()));
        }

        let query = query
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join("&");
        format!("{}?{}", BASE_URL, query)
    }
}
