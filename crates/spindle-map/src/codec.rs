//! Attribute and annotation codec.
//!
//! Write direction: an entity's attributes are normalized into an
//! [`AttributeRecord`] and applied to the object header(s) and the object's
//! metadata section. Read direction: header and section are decoded back into
//! [`Attributes`], with every non-reserved property becoming an annotation.
//!
//! Calendar timestamps are stored as integer epoch seconds (UTC); sub-second
//! precision is discarded.

use chrono::{DateTime, NaiveDateTime};
use spindle_store::{ContainerStore, ObjectHeader, ObjectId, PropertyValue, Section, SectionId};
use spindle_types::{AnnotationValue, Annotations, Attributes};

use crate::diagnostics::{DiagnosticKind, DiagnosticSink};
use crate::error::MapResult;

pub const FILE_ORIGIN: &str = "file_origin";
pub const FILE_DATETIME: &str = "file_datetime";
pub const T_START: &str = "t_start";
pub const T_STOP: &str = "t_stop";
pub const LEFT_SWEEP: &str = "left_sweep";
pub const INDEX: &str = "index";
pub const COORDINATES: &str = "coordinates";
pub const COORDINATES_UNITS: &str = "coordinates.units";

/// Property names owned by the mapping; never read back as annotations.
pub const RESERVED_KEYS: &[&str] = &[
    FILE_ORIGIN,
    FILE_DATETIME,
    T_START,
    T_STOP,
    LEFT_SWEEP,
    INDEX,
    COORDINATES,
    COORDINATES_UNITS,
];

pub fn is_reserved(key: &str) -> bool {
    RESERVED_KEYS.contains(&key)
}

pub fn to_epoch_seconds(dt: NaiveDateTime) -> i64 {
    dt.and_utc().timestamp()
}

pub fn from_epoch_seconds(secs: i64) -> Option<NaiveDateTime> {
    DateTime::from_timestamp(secs, 0).map(|dt| dt.naive_utc())
}

/// Normalized attributes of one entity, ready to be stored.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AttributeRecord {
    pub type_name: String,
    pub definition: Option<String>,
    pub created_at: Option<i64>,
    pub file_datetime: Option<i64>,
    pub file_origin: Option<String>,
    pub annotations: Vec<(String, Vec<PropertyValue>)>,
}

/// Normalize attributes. Dropped annotations are reported to `sink`.
pub fn encode(
    type_name: &str,
    attrs: &Attributes,
    rec_datetime: Option<NaiveDateTime>,
    file_datetime: Option<NaiveDateTime>,
    path: &str,
    sink: &mut DiagnosticSink,
) -> AttributeRecord {
    let mut annotations = Vec::with_capacity(attrs.annotations.len());
    for (key, value) in &attrs.annotations {
        if is_reserved(key) {
            sink.report(path, key, DiagnosticKind::ReservedKey);
            continue;
        }
        match encode_value(value) {
            Ok(values) => annotations.push((key.clone(), values)),
            Err(kind) => sink.report(path, key, kind),
        }
    }
    AttributeRecord {
        type_name: type_name.to_string(),
        definition: attrs.description.clone(),
        created_at: rec_datetime.map(to_epoch_seconds),
        file_datetime: file_datetime.map(to_epoch_seconds),
        file_origin: attrs.file_origin.clone(),
        annotations,
    }
}

/// Convert one annotation value into property values.
pub fn encode_value(value: &AnnotationValue) -> Result<Vec<PropertyValue>, DiagnosticKind> {
    let AnnotationValue::List(items) = value else {
        return encode_scalar(value).map(|v| vec![v]);
    };
    if items.is_empty() {
        return Err(DiagnosticKind::EmptySequence);
    }
    let values = items
        .iter()
        .map(encode_scalar)
        .collect::<Result<Vec<_>, _>>()?;

    let same_kind = values
        .iter()
        .all(|v| std::mem::discriminant(v) == std::mem::discriminant(&values[0]));
    if same_kind {
        return Ok(values);
    }
    // Mixed ints and floats widen to floats; any other mix has no
    // single property type.
    values
        .into_iter()
        .map(|v| match v {
            PropertyValue::Int(i) => Ok(PropertyValue::Float(i as f64)),
            PropertyValue::Float(f) => Ok(PropertyValue::Float(f)),
            _ => Err(DiagnosticKind::UnsupportedAnnotationType),
        })
        .collect()
}

fn encode_scalar(value: &AnnotationValue) -> Result<PropertyValue, DiagnosticKind> {
    match value {
        AnnotationValue::Bool(b) => Ok(PropertyValue::Bool(*b)),
        AnnotationValue::Int(i) => Ok(PropertyValue::Int(*i)),
        AnnotationValue::UInt(u) => i64::try_from(*u)
            .map(PropertyValue::Int)
            .map_err(|_| DiagnosticKind::IntegerOutOfRange),
        AnnotationValue::Float(f) => Ok(PropertyValue::Float(*f)),
        AnnotationValue::Text(s) => Ok(PropertyValue::Text(s.clone())),
        AnnotationValue::Bytes(bytes) => String::from_utf8(bytes.clone())
            .map(PropertyValue::Text)
            .map_err(|_| DiagnosticKind::UnsupportedAnnotationType),
        AnnotationValue::DateTime(dt) => Ok(PropertyValue::Int(to_epoch_seconds(*dt))),
        AnnotationValue::Quantity(_) => Err(DiagnosticKind::QuantityInAnnotation),
        AnnotationValue::List(_) => Err(DiagnosticKind::NestedSequence),
    }
}

/// Write a record onto object headers and their shared section.
///
/// The section's previous properties are replaced, so annotations removed
/// from the entity disappear on re-write.
pub fn apply<S: ContainerStore>(
    store: &mut S,
    objects: &[ObjectId],
    section: SectionId,
    record: &AttributeRecord,
) -> MapResult<()> {
    for object in objects {
        let header = store.object_mut(*object)?.header_mut();
        header.type_name = record.type_name.clone();
        header.definition = record.definition.clone();
        if let Some(created_at) = record.created_at {
            header.created_at = created_at;
        }
        header.metadata = Some(section);
    }

    let section = store.section_mut(section)?;
    section.properties.clear();
    if let Some(origin) = &record.file_origin {
        section.set_property(FILE_ORIGIN, vec![PropertyValue::Text(origin.clone())]);
    }
    if let Some(secs) = record.file_datetime {
        section.set_property(FILE_DATETIME, vec![PropertyValue::Int(secs)]);
    }
    for (key, values) in &record.annotations {
        section.set_property(key, values.clone());
    }
    Ok(())
}

/// Attributes decoded from a header and its section.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DecodedAttributes {
    pub attrs: Attributes,
    pub created_at: Option<NaiveDateTime>,
    pub file_datetime: Option<NaiveDateTime>,
}

/// Decode attributes. The name is taken from the header.
pub fn decode(header: &ObjectHeader, section: Option<&Section>) -> DecodedAttributes {
    decode_named(&header.name, header, section)
}

/// Decode attributes under an explicit entity name (multi-channel signals are
/// named after their group, not their first array).
pub fn decode_named(name: &str, header: &ObjectHeader, section: Option<&Section>) -> DecodedAttributes {
    let mut annotations = Annotations::new();
    let mut file_origin = None;
    let mut file_datetime = None;
    if let Some(section) = section {
        file_origin = section
            .value(FILE_ORIGIN)
            .and_then(PropertyValue::as_text)
            .map(str::to_string);
        file_datetime = section
            .value(FILE_DATETIME)
            .and_then(PropertyValue::as_int)
            .and_then(from_epoch_seconds);
        for property in &section.properties {
            if is_reserved(&property.name) {
                continue;
            }
            if let Some(value) = decode_value(&property.values) {
                annotations.insert(property.name.clone(), value);
            }
        }
    }
    DecodedAttributes {
        attrs: Attributes {
            name: Some(name.to_string()),
            description: header.definition.clone(),
            file_origin,
            annotations,
        },
        created_at: from_epoch_seconds(header.created_at),
        file_datetime,
    }
}

/// One stored value decodes to a scalar, more than one to a list.
pub fn decode_value(values: &[PropertyValue]) -> Option<AnnotationValue> {
    match values {
        [] => None,
        [single] => Some(decode_scalar(single)),
        many => Some(AnnotationValue::List(many.iter().map(decode_scalar).collect())),
    }
}

fn decode_scalar(value: &PropertyValue) -> AnnotationValue {
    match value {
        PropertyValue::Bool(b) => AnnotationValue::Bool(*b),
        PropertyValue::Int(i) => AnnotationValue::Int(*i),
        PropertyValue::Float(f) => AnnotationValue::Float(*f),
        PropertyValue::Text(s) => AnnotationValue::Text(s.clone()),
    }
}
