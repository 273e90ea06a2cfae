//! Element shaping: one [`RawElement`] in, at most one [`ShapedRecord`] out.

use std::collections::BTreeMap;

use tracing::debug;

use crate::classify::{classify_key, AddressField, TagClass};
use crate::error::ShapeError;
use crate::models::{Address, Created, ElementKind, RawElement, ShapedRecord, RESERVED_FIELDS};
use crate::street::StreetVocabulary;

/// Shape a raw element into a record.
///
/// Returns `Ok(None)` for anything that is not a `node` or `way`. Missing
/// `id` or provenance attributes and unparseable coordinates are errors for
/// this element; the caller decides whether that aborts the stream.
pub fn shape_element(
    element: &RawElement,
    vocab: &StreetVocabulary,
) -> Result<Option<ShapedRecord>, ShapeError> {
    let kind = match ElementKind::from_name(&element.name) {
        Some(kind) => kind,
        None => return Ok(None),
    };

    let id = element
        .attr("id")
        .ok_or_else(|| ShapeError::MissingAttribute {
            element: element.name.clone(),
            id: "?".to_string(),
            attribute: "id",
        })?
        .to_string();

    let required = |attribute: &'static str| -> Result<String, ShapeError> {
        element
            .attr(attribute)
            .map(str::to_string)
            .ok_or_else(|| ShapeError::MissingAttribute {
                element: element.name.clone(),
                id: id.clone(),
                attribute,
            })
    };

    let created = Created {
        version: required("version")?,
        changeset: required("changeset")?,
        timestamp: required("timestamp")?,
        user: required("user")?,
        uid: required("uid")?,
    };

    let visible = element.attr("visible").unwrap_or("false").to_string();

    let pos = match (element.attr("lat"), element.attr("lon")) {
        (Some(lat), Some(lon)) => Some([
            parse_coordinate(&id, "lat", lat)?,
            parse_coordinate(&id, "lon", lon)?,
        ]),
        _ => None,
    };

    let mut address = Address::default();
    let mut tags = BTreeMap::new();
    for (key, value) in &element.tags {
        match classify_key(key) {
            TagClass::Disallowed => {}
            TagClass::Address(fields) => {
                if fields.contains(AddressField::HouseNumber) {
                    address.housenumber = Some(value.clone());
                }
                if fields.contains(AddressField::Postcode) {
                    address.postcode = Some(value.clone());
                }
                if fields.contains(AddressField::Street) {
                    let fixed = vocab.normalize(value);
                    if fixed != *value {
                        debug!(element = %id, "{} => {}", value, fixed);
                    }
                    address.street = Some(fixed);
                }
            }
            TagClass::Generic => {
                if RESERVED_FIELDS.contains(&key.as_str()) {
                    debug!(element = %id, key = %key, "tag shadows a record field, dropped");
                    continue;
                }
                tags.insert(key.clone(), value.clone());
            }
        }
    }

    let node_refs = match kind {
        ElementKind::Way if !element.node_refs.is_empty() => Some(element.node_refs.clone()),
        _ => None,
    };

    Ok(Some(ShapedRecord {
        id,
        kind,
        visible,
        created,
        pos,
        address: (!address.is_empty()).then_some(address),
        node_refs,
        tags,
    }))
}

/// Parse a finite coordinate. `NaN` and infinities would serialize as
/// `null`, so they are rejected with the unparseable values.
fn parse_coordinate(id: &str, attribute: &'static str, raw: &str) -> Result<f64, ShapeError> {
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| ShapeError::MalformedCoordinate {
            id: id.to_string(),
            attribute,
            value: raw.to_string(),
        })
}
