//! Tag key classification.
//!
//! Decides, per `tag/@k`, whether the key is dropped, routed into the
//! `address` sub-object, or copied verbatim onto the record.

/// Characters that make a key unusable as a document field name.
pub const DISALLOWED_CHARS: &[char] = &[
    '=', '+', '/', '&', '<', '>', ';', '\'', '"', '?', '%', '#', '$', '@', ',', '.', ' ', '\t',
    '\r', '\n',
];

const ADDRESS_PREFIX: &str = "addr:";

/// Address sub-field selected by an `addr:` key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressField {
    HouseNumber,
    Postcode,
    Street,
}

/// The address sub-fields an `addr:` key writes to.
///
/// Each field is matched by substring on its own, so a key such as
/// `addr:street_postcode` writes both `street` and `postcode`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AddressFields {
    pub housenumber: bool,
    pub postcode: bool,
    pub street: bool,
}

impl AddressFields {
    /// No sub-field; the key is dropped.
    pub const NONE: Self = Self {
        housenumber: false,
        postcode: false,
        street: false,
    };

    pub fn only(field: AddressField) -> Self {
        let mut fields = Self::NONE;
        match field {
            AddressField::HouseNumber => fields.housenumber = true,
            AddressField::Postcode => fields.postcode = true,
            AddressField::Street => fields.street = true,
        }
        fields
    }

    pub fn contains(&self, field: AddressField) -> bool {
        match field {
            AddressField::HouseNumber => self.housenumber,
            AddressField::Postcode => self.postcode,
            AddressField::Street => self.street,
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::NONE
    }
}

/// Routing decision for one tag key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagClass {
    /// Contains a disallowed character; contributes nothing to the record.
    Disallowed,
    /// `addr:` key. Empty fields mean the key is dropped: either it names
    /// a sub-field the record does not keep (`addr:city`, `addr:unit`, ...)
    /// or it has a deeper namespace (`addr:street:name`).
    Address(AddressFields),
    /// Stored verbatim as a top-level field.
    Generic,
}

pub fn has_disallowed_chars(key: &str) -> bool {
    key.contains(DISALLOWED_CHARS)
}

/// Classify a tag key.
pub fn classify_key(key: &str) -> TagClass {
    if has_disallowed_chars(key) {
        return TagClass::Disallowed;
    }
    if key.starts_with(ADDRESS_PREFIX) {
        if key.matches(':').count() > 1 {
            return TagClass::Address(AddressFields::NONE);
        }
        return TagClass::Address(address_fields(key));
    }
    TagClass::Generic
}

fn address_fields(key: &str) -> AddressFields {
    AddressFields {
        housenumber: key.contains("housenumber"),
        postcode: key.contains("postcode"),
        street: key.contains("street"),
    }
}
