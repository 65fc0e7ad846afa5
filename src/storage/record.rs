// BayunGraph Store Records
//
// Fixed-size records for the node, relationship, property and schema
// stores. Every record begins with an in-use byte.

use byteorder::{ByteOrder, LittleEndian};
use serde::{Serialize, Deserialize};

use crate::common::types::{RecordId, NO_NEXT_RECORD};
use crate::storage::layout::StoreType;

const IN_USE: u8 = 1;
const NOT_IN_USE: u8 = 0;

/// A fixed-size record of one store
pub trait Record: Clone + PartialEq + std::fmt::Debug {
    const STORE_TYPE: StoreType;
    const RECORD_SIZE: usize;

    fn id(&self) -> RecordId;
    fn in_use(&self) -> bool;

    /// A record slot that was never written or has been deleted
    fn unused(id: RecordId) -> Self;

    fn encode(&self, buf: &mut [u8]);
    fn decode(id: RecordId, buf: &[u8]) -> Self;
}

fn in_use_byte(in_use: bool) -> u8 {
    if in_use { IN_USE } else { NOT_IN_USE }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub id: RecordId,
    pub in_use: bool,
    pub next_rel: i64,
    pub next_prop: i64,
    /// Label token ids as a bitset
    pub labels: u64,
}

impl NodeRecord {
    pub fn new(id: RecordId, labels: u64) -> Self {
        Self {
            id,
            in_use: true,
            next_rel: NO_NEXT_RECORD,
            next_prop: NO_NEXT_RECORD,
            labels,
        }
    }

    pub fn has_label(&self, label_id: u32) -> bool {
        label_id < 64 && self.labels & (1 << label_id) != 0
    }
}

impl Record for NodeRecord {
    const STORE_TYPE: StoreType = StoreType::Node;
    const RECORD_SIZE: usize = 25;

    fn id(&self) -> RecordId {
        self.id
    }

    fn in_use(&self) -> bool {
        self.in_use
    }

    fn unused(id: RecordId) -> Self {
        Self {
            id,
            in_use: false,
            next_rel: NO_NEXT_RECORD,
            next_prop: NO_NEXT_RECORD,
            labels: 0,
        }
    }

    fn encode(&self, buf: &mut [u8]) {
        buf[0] = in_use_byte(self.in_use);
        LittleEndian::write_i64(&mut buf[1..9], self.next_rel);
        LittleEndian::write_i64(&mut buf[9..17], self.next_prop);
        LittleEndian::write_u64(&mut buf[17..25], self.labels);
    }

    fn decode(id: RecordId, buf: &[u8]) -> Self {
        if buf[0] != IN_USE {
            return Self::unused(id);
        }
        Self {
            id,
            in_use: true,
            next_rel: LittleEndian::read_i64(&buf[1..9]),
            next_prop: LittleEndian::read_i64(&buf[9..17]),
            labels: LittleEndian::read_u64(&buf[17..25]),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationshipRecord {
    pub id: RecordId,
    pub in_use: bool,
    pub first_node: RecordId,
    pub second_node: RecordId,
    pub rel_type: u32,
    pub next_prop: i64,
}

impl RelationshipRecord {
    pub fn new(id: RecordId, first_node: RecordId, second_node: RecordId, rel_type: u32) -> Self {
        Self {
            id,
            in_use: true,
            first_node,
            second_node,
            rel_type,
            next_prop: NO_NEXT_RECORD,
        }
    }
}

impl Record for RelationshipRecord {
    const STORE_TYPE: StoreType = StoreType::Relationship;
    const RECORD_SIZE: usize = 29;

    fn id(&self) -> RecordId {
        self.id
    }

    fn in_use(&self) -> bool {
        self.in_use
    }

    fn unused(id: RecordId) -> Self {
        Self {
            id,
            in_use: false,
            first_node: 0,
            second_node: 0,
            rel_type: 0,
            next_prop: NO_NEXT_RECORD,
        }
    }

    fn encode(&self, buf: &mut [u8]) {
        buf[0] = in_use_byte(self.in_use);
        LittleEndian::write_u64(&mut buf[1..9], self.first_node);
        LittleEndian::write_u64(&mut buf[9..17], self.second_node);
        LittleEndian::write_u32(&mut buf[17..21], self.rel_type);
        LittleEndian::write_i64(&mut buf[21..29], self.next_prop);
    }

    fn decode(id: RecordId, buf: &[u8]) -> Self {
        if buf[0] != IN_USE {
            return Self::unused(id);
        }
        Self {
            id,
            in_use: true,
            first_node: LittleEndian::read_u64(&buf[1..9]),
            second_node: LittleEndian::read_u64(&buf[9..17]),
            rel_type: LittleEndian::read_u32(&buf[17..21]),
            next_prop: LittleEndian::read_i64(&buf[21..29]),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyRecord {
    pub id: RecordId,
    pub in_use: bool,
    pub key_id: u32,
    pub value: i64,
    pub next_prop: i64,
}

impl PropertyRecord {
    pub fn new(id: RecordId, key_id: u32, value: i64, next_prop: i64) -> Self {
        Self {
            id,
            in_use: true,
            key_id,
            value,
            next_prop,
        }
    }
}

impl Record for PropertyRecord {
    const STORE_TYPE: StoreType = StoreType::Property;
    const RECORD_SIZE: usize = 21;

    fn id(&self) -> RecordId {
        self.id
    }

    fn in_use(&self) -> bool {
        self.in_use
    }

    fn unused(id: RecordId) -> Self {
        Self {
            id,
            in_use: false,
            key_id: 0,
            value: 0,
            next_prop: NO_NEXT_RECORD,
        }
    }

    fn encode(&self, buf: &mut [u8]) {
        buf[0] = in_use_byte(self.in_use);
        LittleEndian::write_u32(&mut buf[1..5], self.key_id);
        LittleEndian::write_i64(&mut buf[5..13], self.value);
        LittleEndian::write_i64(&mut buf[13..21], self.next_prop);
    }

    fn decode(id: RecordId, buf: &[u8]) -> Self {
        if buf[0] != IN_USE {
            return Self::unused(id);
        }
        Self {
            id,
            in_use: true,
            key_id: LittleEndian::read_u32(&buf[1..5]),
            value: LittleEndian::read_i64(&buf[5..13]),
            next_prop: LittleEndian::read_i64(&buf[13..21]),
        }
    }
}

/// Identifies an index over one label and one property key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct IndexDescriptor {
    pub schema_id: RecordId,
    pub label_id: u32,
    pub property_key_id: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaRecord {
    pub id: RecordId,
    pub in_use: bool,
    pub label_id: u32,
    pub property_key_id: u32,
}

impl SchemaRecord {
    pub fn new(id: RecordId, label_id: u32, property_key_id: u32) -> Self {
        Self {
            id,
            in_use: true,
            label_id,
            property_key_id,
        }
    }

    pub fn descriptor(&self) -> IndexDescriptor {
        IndexDescriptor {
            schema_id: self.id,
            label_id: self.label_id,
            property_key_id: self.property_key_id,
        }
    }
}

impl Record for SchemaRecord {
    const STORE_TYPE: StoreType = StoreType::Schema;
    const RECORD_SIZE: usize = 9;

    fn id(&self) -> RecordId {
        self.id
    }

    fn in_use(&self) -> bool {
        self.in_use
    }

    fn unused(id: RecordId) -> Self {
        Self {
            id,
            in_use: false,
            label_id: 0,
            property_key_id: 0,
        }
    }

    fn encode(&self, buf: &mut [u8]) {
        buf[0] = in_use_byte(self.in_use);
        LittleEndian::write_u32(&mut buf[1..5], self.label_id);
        LittleEndian::write_u32(&mut buf[5..9], self.property_key_id);
    }

    fn decode(id: RecordId, buf: &[u8]) -> Self {
        if buf[0] != IN_USE {
            return Self::unused(id);
        }
        Self {
            id,
            in_use: true,
            label_id: LittleEndian::read_u32(&buf[1..5]),
            property_key_id: LittleEndian::read_u32(&buf[5..9]),
        }
    }
}
