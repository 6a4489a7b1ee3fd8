use core::fmt;
use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::codec::{DecodeError, EncodeError, TransferType};
use crate::stream::ByteOrder;

pub type Properties = BTreeMap<String, String>;

/// Declared nominal spacing between samples, a [`Datum`](crate::units::Datum)
pub const CADENCE: &str = "cadence";
/// Valid range and resolution, a [`CacheTag`](crate::units::CacheTag)
pub const CACHE_TAG: &str = "cacheTag";
pub const RENDER_TYPE: &str = "renderType";

/// Identifies a packet type. Only one schema uses an id at any time, a new
/// definition replaces the previous one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct SchemaId(u8);

impl SchemaId {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 99;

    pub fn new(id: u8) -> Option<Self> {
        (Self::MIN..=Self::MAX).contains(&id).then_some(Self(id))
    }
    pub fn get(self) -> u8 {
        self.0
    }
}

#[derive(Debug, thiserror::Error)]
#[error("Schema ids lie in 1..=99, got: {0}")]
pub struct InvalidId(pub u8);

impl TryFrom<u8> for SchemaId {
    type Error = InvalidId;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value).ok_or(InvalidId(value))
    }
}

impl From<SchemaId> for u8 {
    fn from(val: SchemaId) -> Self {
        val.0
    }
}

impl fmt::Display for SchemaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}", self.0)
    }
}

/// One named column of a packet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    pub transfer_type: TransferType,
    /// number of values per packet, larger then one for arrays such as
    /// the samples of a waveform
    #[serde(default = "one")]
    pub elements: usize,
    #[serde(default)]
    pub units: Option<String>,
}

fn one() -> usize {
    1
}

impl Field {
    pub fn new(name: impl Into<String>, transfer_type: TransferType) -> Self {
        Self {
            name: name.into(),
            transfer_type,
            elements: 1,
            units: None,
        }
    }
    #[must_use]
    pub fn with_elements(mut self, elements: usize) -> Self {
        self.elements = elements;
        self
    }
    #[must_use]
    pub fn with_units(mut self, units: impl Into<String>) -> Self {
        self.units = Some(units.into());
        self
    }
    /// bytes this field takes in a packet
    pub fn size(&self) -> usize {
        self.transfer_type.width() * self.elements
    }
}

/// Layout and metadata of one packet type.
///
/// Immutable once built, filters that need a different layout derive a new
/// schema and send that downstream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "SchemaBuilder")]
pub struct Schema {
    id: SchemaId,
    fields: Vec<Field>,
    properties: Properties,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaBuilder {
    id: SchemaId,
    #[serde(default)]
    fields: Vec<Field>,
    #[serde(default)]
    properties: Properties,
}

/// Largest packet a schema may declare, in bytes
pub const MAX_PACKET_SIZE: usize = 1 << 22;

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("A schema needs at least one field")]
    NoFields,
    #[error("Field name {0:?} is used more then once")]
    DuplicateField(String),
    #[error("Field {0:?} has zero elements")]
    NoElements(String),
    #[error(
        "Packets would exceed {} bytes, field {field:?} has {elements} elements",
        MAX_PACKET_SIZE
    )]
    TooLarge { field: String, elements: usize },
}

#[derive(Debug, thiserror::Error)]
pub enum PacketError {
    #[error("Packet is {got} bytes long, schema {id} declares {expected}")]
    Size {
        id: SchemaId,
        expected: usize,
        got: usize,
    },
    #[error("Could not decode field {field:?}: {source}")]
    Decode { field: String, source: DecodeError },
    #[error("Could not encode field {field:?}: {source}")]
    Encode { field: String, source: EncodeError },
    #[error("Record has {got} fields, schema {id} declares {expected}")]
    FieldCount {
        id: SchemaId,
        expected: usize,
        got: usize,
    },
    #[error("Record has {got} values for field {field:?}, schema declares {expected}")]
    Shape {
        field: String,
        expected: usize,
        got: usize,
    },
}

impl SchemaBuilder {
    #[must_use]
    pub fn field(mut self, field: Field) -> Self {
        self.fields.push(field);
        self
    }
    #[must_use]
    pub fn property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }
    pub fn build(self) -> Result<Schema, BuildError> {
        if self.fields.is_empty() {
            return Err(BuildError::NoFields);
        }
        let mut names = HashSet::new();
        let mut packet_size = 0usize;
        for field in &self.fields {
            if !names.insert(field.name.as_str()) {
                return Err(BuildError::DuplicateField(field.name.clone()));
            }
            if field.elements == 0 {
                return Err(BuildError::NoElements(field.name.clone()));
            }
            packet_size = field
                .transfer_type
                .width()
                .checked_mul(field.elements)
                .and_then(|size| size.checked_add(packet_size))
                .filter(|size| *size <= MAX_PACKET_SIZE)
                .ok_or_else(|| BuildError::TooLarge {
                    field: field.name.clone(),
                    elements: field.elements,
                })?;
        }
        Ok(Schema {
            id: self.id,
            fields: self.fields,
            properties: self.properties,
        })
    }
}

impl TryFrom<SchemaBuilder> for Schema {
    type Error = BuildError;

    fn try_from(value: SchemaBuilder) -> Result<Self, Self::Error> {
        value.build()
    }
}

impl Schema {
    pub fn builder(id: SchemaId) -> SchemaBuilder {
        SchemaBuilder {
            id,
            fields: Vec::new(),
            properties: Properties::new(),
        }
    }
    pub fn to_builder(&self) -> SchemaBuilder {
        SchemaBuilder {
            id: self.id,
            fields: self.fields.clone(),
            properties: self.properties.clone(),
        }
    }

    pub fn id(&self) -> SchemaId {
        self.id
    }
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }
    /// The independent (usually time) field, every schema has one
    pub fn leading(&self) -> &Field {
        &self.fields[0]
    }
    pub fn properties(&self) -> &Properties {
        &self.properties
    }
    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }

    /// total length of one packet in bytes
    pub fn packet_size(&self) -> usize {
        self.fields.iter().map(Field::size).sum()
    }

    #[must_use]
    pub fn with_property(&self, key: impl Into<String>, value: impl Into<String>) -> Schema {
        let mut derived = self.clone();
        derived.properties.insert(key.into(), value.into());
        derived
    }

    #[must_use]
    pub fn without_properties(&self) -> Schema {
        Schema {
            properties: Properties::new(),
            ..self.clone()
        }
    }

    /// Same layout with each field's encoding replaced, the packet size
    /// follows from the new encodings.
    #[must_use]
    pub fn with_transfer_types(&self, mut map: impl FnMut(&Field) -> TransferType) -> Schema {
        let mut derived = self.clone();
        for field in &mut derived.fields {
            field.transfer_type = map(field);
        }
        derived
    }

    /// Decodes every field of a packet
    pub fn decode(&self, order: ByteOrder, packet: &[u8]) -> Result<Record, PacketError> {
        if packet.len() != self.packet_size() {
            return Err(PacketError::Size {
                id: self.id,
                expected: self.packet_size(),
                got: packet.len(),
            });
        }

        let mut cursor = packet;
        let mut values = Vec::with_capacity(self.fields.len());
        for field in &self.fields {
            let decoded = (0..field.elements)
                .map(|_| field.transfer_type.decode(order, &mut cursor))
                .collect::<Result<Vec<_>, _>>()
                .map_err(|source| PacketError::Decode {
                    field: field.name.clone(),
                    source,
                })?;
            values.push(decoded);
        }
        Ok(Record { values })
    }

    /// Encodes a record into a packet of exactly [`packet_size`](Self::packet_size)
    /// bytes. If the last field is text its final blank becomes a line end.
    pub fn encode(&self, order: ByteOrder, record: &Record) -> Result<Vec<u8>, PacketError> {
        if record.values.len() != self.fields.len() {
            return Err(PacketError::FieldCount {
                id: self.id,
                expected: self.fields.len(),
                got: record.values.len(),
            });
        }

        let mut packet = Vec::with_capacity(self.packet_size());
        for (field, values) in self.fields.iter().zip(&record.values) {
            if values.len() != field.elements {
                return Err(PacketError::Shape {
                    field: field.name.clone(),
                    expected: field.elements,
                    got: values.len(),
                });
            }
            for value in values {
                field
                    .transfer_type
                    .encode(order, *value, &mut packet)
                    .map_err(|source| PacketError::Encode {
                        field: field.name.clone(),
                        source,
                    })?;
            }
        }

        let ends_in_text = self
            .fields
            .last()
            .is_some_and(|field| field.transfer_type.is_ascii());
        if let Some(last) = packet.last_mut().filter(|_| ends_in_text) {
            if last.is_ascii_whitespace() {
                *last = b'\n';
            }
        }
        Ok(packet)
    }
}

/// Values of one packet, one vector per field in schema order
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Record {
    values: Vec<Vec<f64>>,
}

impl Record {
    pub fn new(values: Vec<Vec<f64>>) -> Self {
        Self { values }
    }
    /// first value of the first field, the time tag for time series
    pub fn leading(&self) -> Option<f64> {
        self.values.first().and_then(|field| field.first()).copied()
    }
    pub fn field(&self, idx: usize) -> &[f64] {
        &self.values[idx]
    }
    pub fn fields(&self) -> impl Iterator<Item = &[f64]> {
        self.values.iter().map(Vec::as_slice)
    }
    pub fn last(&self) -> &[f64] {
        self.values.last().map(Vec::as_slice).unwrap_or_default()
    }
    pub fn into_values(self) -> Vec<Vec<f64>> {
        self.values
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(n: u8) -> SchemaId {
        SchemaId::new(n).unwrap()
    }

    fn spectrum() -> Schema {
        Schema::builder(id(3))
            .field(Field::new("time", TransferType::Real8).with_units("us2000"))
            .field(
                Field::new("flux", TransferType::Real4)
                    .with_elements(3)
                    .with_units("V"),
            )
            .build()
            .unwrap()
    }

    #[test]
    fn ids_outside_range_are_rejected() {
        assert!(SchemaId::new(0).is_none());
        assert!(SchemaId::new(100).is_none());
        assert_eq!(id(7).to_string(), "07");
    }

    #[test]
    fn builder_validates() {
        assert!(matches!(
            Schema::builder(id(1)).build(),
            Err(BuildError::NoFields)
        ));
        let dup = Schema::builder(id(1))
            .field(Field::new("a", TransferType::Real8))
            .field(Field::new("a", TransferType::Real4))
            .build();
        assert!(matches!(dup, Err(BuildError::DuplicateField(name)) if name == "a"));
    }

    #[rstest::rstest]
    #[case(TransferType::Real8, usize::MAX / 4)]
    #[case(TransferType::Int1, MAX_PACKET_SIZE + 1)]
    fn oversized_fields_are_rejected(
        #[case] transfer_type: TransferType,
        #[case] elements: usize,
    ) {
        let huge = Schema::builder(id(1))
            .field(Field::new("time", TransferType::Real8))
            .field(Field::new("samples", transfer_type).with_elements(elements))
            .build();
        assert!(matches!(
            huge,
            Err(BuildError::TooLarge { field, .. }) if field == "samples"
        ));
    }

    #[test]
    fn sizes_add_up_across_fields() {
        let half = MAX_PACKET_SIZE / 2;
        let fits = Schema::builder(id(1))
            .field(Field::new("a", TransferType::Int1).with_elements(half))
            .field(Field::new("b", TransferType::Int1).with_elements(half))
            .build()
            .unwrap();
        assert_eq!(fits.packet_size(), MAX_PACKET_SIZE);

        let over = fits
            .to_builder()
            .field(Field::new("c", TransferType::Int1))
            .build();
        assert!(matches!(over, Err(BuildError::TooLarge { field, .. }) if field == "c"));
    }

    #[test]
    fn decode_then_encode_keeps_bytes() {
        let schema = spectrum();
        assert_eq!(schema.packet_size(), 8 + 3 * 4);
        let record = Record::new(vec![vec![1e12], vec![1.0, 2.0, -3.5]]);
        let packet = schema.encode(ByteOrder::Little, &record).unwrap();
        assert_eq!(packet.len(), schema.packet_size());
        assert_eq!(schema.decode(ByteOrder::Little, &packet).unwrap(), record);
    }

    #[test]
    fn wrong_packet_size_is_rejected() {
        let err = spectrum().decode(ByteOrder::Big, &[0; 7]).unwrap_err();
        assert!(matches!(
            err,
            PacketError::Size {
                expected: 20,
                got: 7,
                ..
            }
        ));
    }

    #[test]
    fn text_records_end_in_newline() {
        let schema = spectrum().with_transfer_types(|f| f.transfer_type.ascii_equivalent());
        assert_eq!(schema.packet_size(), 25 + 3 * 17);
        let record = Record::new(vec![vec![1e12], vec![1.0, 2.0, -3.5]]);
        let packet = schema.encode(ByteOrder::Big, &record).unwrap();
        assert_eq!(packet.last(), Some(&b'\n'));
        assert_eq!(schema.decode(ByteOrder::Big, &packet).unwrap(), record);
    }

    #[test]
    fn derived_schema_leaves_original_alone() {
        let original = spectrum();
        let derived = original.with_property(CADENCE, "60 s");
        assert_eq!(derived.property(CADENCE), Some("60 s"));
        assert_eq!(original.property(CADENCE), None);
    }

    #[test]
    fn ron_round_trip() {
        let schema = spectrum().with_property(CADENCE, "1 s");
        let text = ron::to_string(&schema).unwrap();
        let back: Schema = ron::from_str(&text).unwrap();
        assert_eq!(back, schema);
    }
}
