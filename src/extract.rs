use crate::listing::{AgentInfo, Listing, ListingInfo, Location, PropertyInfo};
use lazy_regex::regex_is_match;
use lazy_static::lazy_static;
use scraper::{ElementRef, Html, Selector};
use serde_json::Value;
use tracing::{debug, warn};

/// Identifies the inline script carrying the listings widget payload.
const PAYLOAD_MARKER: &str = "listingResultsWidget";
/// Start of the JSON object literal inside the marker script.
const PAYLOAD_START: &str = "var guruApp = ";
/// First balanced terminator after the start marker.
const PAYLOAD_END: &str = "};";

const E: &str = "Invalid selector";
lazy_static! {
    static ref SCRIPT: Selector = Selector::parse("script").expect(E);
    static ref GALLERY_IMG: Selector = Selector::parse(".gallery-wrapper img").expect(E);
}

/// Extract all listing records from one results page.
///
/// A page without the marker script yields an empty list, as does a page
/// whose payload fails to parse; neither aborts the caller. Individual
/// malformed records are skipped, the rest of the page is still built.
pub fn extract(doc: &Html) -> Vec<Listing> {
    let script = doc
        .select(&SCRIPT)
        .map(|s| s.text().collect::<String>())
        .find(|text| text.contains(PAYLOAD_MARKER));

    let script = match script {
        Some(script) => script,
        None => {
            debug!("No listings widget payload on page");
            return vec![];
        }
    };

    let payload = match slice_payload(&script) {
        Some(payload) => payload,
        None => {
            warn!("Marker script without a recognizable payload object");
            return vec![];
        }
    };

    let payload: Value = match serde_json::from_str(payload) {
        Ok(payload) => payload,
        Err(e) => {
            warn!("Failed to parse listings widget payload: {}", e);
            return vec![];
        }
    };

    let widget = &payload[PAYLOAD_MARKER];
    let summaries = match widget["gaECListings"].as_array() {
        Some(summaries) => summaries,
        None => {
            debug!("Payload without gaECListings array");
            return vec![];
        }
    };
    let contacts = widget["listingsInfo"].as_array();

    let mut listings = Vec::with_capacity(summaries.len());
    for (i, summary) in summaries.iter().enumerate() {
        let contact = contacts.and_then(|c| c.get(i));
        match build_listing(summary, contact, doc) {
            Some(listing) => listings.push(listing),
            None => warn!("Skipping malformed listing record at index {}", i),
        }
    }
    listings
}

/// Slice the JSON object literal out of the marker script:
/// everything between `var guruApp = ` and the first `};` after it.
fn slice_payload(script: &str) -> Option<&str> {
    let start = script.find(PAYLOAD_START)? + PAYLOAD_START.len();
    let end = script[start..].find(PAYLOAD_END)?;
    Some(&script[start..start + end + 1])
}

fn build_listing(summary: &Value, contact: Option<&Value>, doc: &Html) -> Option<Listing> {
    // Summary entries wrap the fields in a productData object; tolerate
    // the bare form as well.
    let product = summary.get("productData").unwrap_or(summary);
    if !product.is_object() {
        return None;
    }

    let id = str_field(product, "id");

    let location = Location {
        district: str_field(product, "district"),
        region: str_field(product, "region"),
        area: str_field(product, "area"),
        district_code: str_field(product, "districtCode"),
        region_code: str_field(product, "regionCode"),
        area_code: str_field(product, "areaCode"),
        ..Location::default()
    };

    let property_info = PropertyInfo {
        bedrooms: uint_field(product, "bedrooms"),
        bathrooms: uint_field(product, "bathrooms"),
        floor_area: str_field(product, "floorArea"),
        property_type: str_field(product, "propertyType"),
        furnishing: str_field(product, "furnishing"),
        image_url: id.as_deref().and_then(|id| image_url(doc, id)),
    };

    let listing_info = ListingInfo {
        id: id.clone(),
        url: contact
            .and_then(|c| c.get("urls"))
            .and_then(|u| u.get("listing"))
            .and_then(|l| str_field(l, "desktop")),
        position: uint_field(product, "position"),
        status: str_field(product, "status"),
        variant: str_field(product, "variant"),
    };

    let agent = contact.and_then(|c| c.get("agent"));
    let agent_info = match agent {
        Some(agent) => AgentInfo {
            id: str_field(agent, "id"),
            name: str_field(agent, "name"),
            phone: str_field(agent, "mobile"),
            phone_formatted: str_field(agent, "mobilePretty"),
            line_id: str_field(agent, "lineId"),
            is_verified: agent
                .get("isVerified")
                .and_then(Value::as_bool)
                .unwrap_or(false),
            verification_date: str_field(agent, "verificationDate"),
            agency_type: str_field(agent, "accountType"),
            profile_image: str_field(agent, "photoUrl"),
        },
        None => AgentInfo::default(),
    };

    Some(Listing {
        name: str_field(product, "name"),
        price: int_field(product, "price"),
        location,
        property_info,
        listing_info,
        agent_info,
    })
}

/// String field, trimmed; empty strings and non-string values count as
/// absent. Numeric ids are accepted and stringified.
fn str_field(v: &Value, key: &str) -> Option<String> {
    match v.get(key)? {
        Value::String(s) => {
            let s = s.trim();
            if s.is_empty() {
                None
            } else {
                Some(s.to_string())
            }
        }
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Integer field, accepting either a JSON number or a numeric string
/// (with optional thousands separators, as the widget formats prices).
fn int_field(v: &Value, key: &str) -> Option<i64> {
    match v.get(key)? {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().replace(',', "").parse().ok(),
        _ => None,
    }
}

fn uint_field(v: &Value, key: &str) -> Option<u32> {
    int_field(v, key).and_then(|n| u32::try_from(n).ok())
}

/// Find the first usable gallery image on the listing's card, preferring
/// the lazy-load attribute over the plain src, and discarding placeholder
/// and error images.
fn image_url(doc: &Html, listing_id: &str) -> Option<String> {
    let card = listing_card(doc, listing_id)?;
    for img in card.select(&GALLERY_IMG) {
        for attr in ["data-original", "src"] {
            if let Some(url) = img.value().attr(attr) {
                let url = url.trim();
                if !url.is_empty() && !is_placeholder_image(url) {
                    return Some(url.to_string());
                }
            }
        }
    }
    None
}

fn listing_card<'a>(doc: &'a Html, listing_id: &str) -> Option<ElementRef<'a>> {
    if !listing_id.chars().all(|c| c.is_ascii_alphanumeric()) {
        return None;
    }
    let selector = Selector::parse(&format!(r#"div[data-listing-id="{}"]"#, listing_id)).ok()?;
    doc.select(&selector).next()
}

fn is_placeholder_image(url: &str) -> bool {
    regex_is_match!(r"(?i)data:image/gif;base64|no[_-]?photo|blank\.gif|image-error", url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const PAGE: &str = r##"<!DOCTYPE html>
<html><head><title>Property for rent</title>
<script>var tracker = {"page": "search"};</script>
</head><body>
<script>
    var guruApp = {
        "listingResultsWidget": {
            "gaECListings": [
                {"productData": {
                    "id": "9001",
                    "name": "Modern Pool Villa in Rawai",
                    "price": "25,000",
                    "bedrooms": 2,
                    "bathrooms": "2",
                    "floorArea": "180 sqm",
                    "propertyType": "Villa",
                    "district": "Muang Phuket",
                    "districtCode": "TH8301",
                    "region": "Phuket",
                    "regionCode": "TH83",
                    "area": "Rawai",
                    "areaCode": "TH830108",
                    "position": 1,
                    "status": "ACT",
                    "variant": "rent"
                }},
                {"productData": {
                    "id": "9002",
                    "name": "Sea View Condo",
                    "price": 18000,
                    "bedrooms": 1,
                    "area": "Patong",
                    "district": "Kathu",
                    "region": "Phuket",
                    "position": 2,
                    "variant": "rent"
                }},
                {"productData": "not-an-object"}
            ],
            "listingsInfo": [
                {
                    "urls": {"listing": {"desktop": "https://www.ddproperty.com/en/property/9001"}},
                    "agent": {
                        "id": "777",
                        "name": "Somchai P.",
                        "mobile": "+66812345678",
                        "mobilePretty": "081-234-5678",
                        "lineId": "somchai.p",
                        "isVerified": true,
                        "verificationDate": "2023-04-02",
                        "accountType": "AGENT",
                        "photoUrl": "https://img.example.com/agents/777.jpg"
                    }
                }
            ]
        }
    };
    guruApp.foo = "bar";
</script>
<div data-listing-id="9001">
    <div class="gallery-wrapper">
        <img src="data:image/gif;base64,R0lGODlhAQABAAAAACw=" data-original="https://img.example.com/9001/main.jpg">
        <img src="https://img.example.com/9001/second.jpg">
    </div>
</div>
<div data-listing-id="9002">
    <div class="gallery-wrapper">
        <img src="https://static.example.com/no-photo.png">
    </div>
</div>
<ul class="pagination">
    <li><a href="#">1</a></li>
    <li><a href="#">2</a></li>
    <li><a href="#">3</a></li>
    <li><a href="#">Next</a></li>
</ul>
</body></html>"##;

    #[test]
    fn extracts_full_records_from_embedded_payload() {
        let doc = Html::parse_document(PAGE);
        let listings = extract(&doc);
        // Third summary entry is malformed and skipped.
        assert_eq!(listings.len(), 2);

        let first = &listings[0];
        assert_eq!(first.name.as_deref(), Some("Modern Pool Villa in Rawai"));
        assert_eq!(first.price, Some(25000));
        assert_eq!(first.location.area.as_deref(), Some("Rawai"));
        assert_eq!(first.location.district.as_deref(), Some("Muang Phuket"));
        assert_eq!(first.location.region.as_deref(), Some("Phuket"));
        assert_eq!(first.location.area_code.as_deref(), Some("TH830108"));
        assert_eq!(first.property_info.bedrooms, Some(2));
        assert_eq!(first.property_info.bathrooms, Some(2));
        assert_eq!(first.property_info.floor_area.as_deref(), Some("180 sqm"));
        assert_eq!(first.listing_info.id.as_deref(), Some("9001"));
        assert_eq!(
            first.listing_info.url.as_deref(),
            Some("https://www.ddproperty.com/en/property/9001")
        );
        assert_eq!(first.listing_info.position, Some(1));
        assert_eq!(first.listing_info.variant.as_deref(), Some("rent"));
        assert_eq!(first.agent_info.name.as_deref(), Some("Somchai P."));
        assert_eq!(first.agent_info.phone.as_deref(), Some("+66812345678"));
        assert_eq!(first.agent_info.line_id.as_deref(), Some("somchai.p"));
        assert!(first.agent_info.is_verified);
        // Placeholder src is skipped in favour of the lazy-load attribute.
        assert_eq!(
            first.property_info.image_url.as_deref(),
            Some("https://img.example.com/9001/main.jpg")
        );
    }

    #[test]
    fn missing_contact_entry_defaults_to_absent_fields() {
        let doc = Html::parse_document(PAGE);
        let listings = extract(&doc);
        let second = &listings[1];
        assert_eq!(second.name.as_deref(), Some("Sea View Condo"));
        assert_eq!(second.price, Some(18000));
        assert_eq!(second.listing_info.url, None);
        assert_eq!(second.agent_info, Default::default());
        // The only gallery image on this card is a "no photo" asset.
        assert_eq!(second.property_info.image_url, None);
    }

    #[test]
    fn page_without_marker_script_yields_empty_list() {
        let doc = Html::parse_document(
            "<html><body><script>var other = {};</script><p>no results</p></body></html>",
        );
        assert_eq!(extract(&doc), vec![]);
    }

    #[test]
    fn truncated_payload_yields_empty_list() {
        let doc = Html::parse_document(
            r#"<html><body><script>
            var guruApp = {"listingResultsWidget": {"gaECListings": [{"productData"};
            </script></body></html>"#,
        );
        assert_eq!(extract(&doc), vec![]);
    }

    #[test]
    fn payload_slicing_stops_at_first_terminator() {
        let script = r#"var guruApp = {"a": 1}; var trailer = {"b": 2};"#;
        assert_eq!(slice_payload(script), Some(r#"{"a": 1}"#));
    }

    #[test]
    fn placeholder_images_are_rejected() {
        assert!(is_placeholder_image("data:image/gif;base64,R0lGOD"));
        assert!(is_placeholder_image("https://cdn.example.com/NoPhoto.jpg"));
        assert!(is_placeholder_image("https://cdn.example.com/blank.gif"));
        assert!(!is_placeholder_image("https://cdn.example.com/villa.jpg"));
    }
}
