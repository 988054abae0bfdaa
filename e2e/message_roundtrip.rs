//! E2E Suite 01: realistic message round trips.
//!
//! A commit-record message exercising every encoding class at once: scalar
//! headers, byte payloads, vectors of tables, string maps, and a recursive
//! placement-policy union tree (single / across-groups / all-of), the shape
//! distributed databases ship for replica placement.

use std::collections::BTreeMap;

use bytes::Bytes;
use flatwire::{
    flat_table, flat_union, load, load_ensure_table, read_file_identifier, save,
    save_ensure_table, FileIdentified, FileIdentifier, LoadCx, Result, UnionLike,
    VTableCollector, Writer,
};

// ─────────────────────────────────────────────────────────────────────────────
// Placement policy: a recursive union tree
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Default, PartialEq, Clone)]
struct PolicyOne;

impl flatwire::Serializable for PolicyOne {
    fn members<'a, V: flatwire::MemberVisitor<'a>>(&'a self, _visitor: &mut V) -> Result<()> {
        Ok(())
    }

    fn members_mut<V: flatwire::MemberVisitorMut>(&mut self, _visitor: &mut V) -> Result<()> {
        Ok(())
    }
}
flat_table!(PolicyOne);

#[derive(Debug, Default, PartialEq, Clone)]
struct PolicyAcross {
    count: u32,
    attribute: String,
    child: Policy,
}
flat_table!(PolicyAcross { count, attribute, child });

/// One node of an all-of list. Wrapping the union in a table keeps vector
/// elements fixed-stride; unions themselves only live in tables.
#[derive(Debug, Default, PartialEq, Clone)]
struct PolicyNode {
    policy: Policy,
}
flat_table!(PolicyNode { policy });

#[derive(Debug, Default, PartialEq, Clone)]
struct PolicyAnd {
    children: Vec<PolicyNode>,
}
flat_table!(PolicyAnd { children });

#[derive(Debug, PartialEq, Clone)]
enum Policy {
    Void,
    One(PolicyOne),
    Across(Box<PolicyAcross>),
    And(PolicyAnd),
}

impl Default for Policy {
    fn default() -> Policy {
        Policy::Void
    }
}

impl UnionLike for Policy {
    const ALTERNATIVES: usize = 4;

    fn index(&self) -> u8 {
        match self {
            Policy::Void => 0,
            Policy::One(_) => 1,
            Policy::Across(_) => 2,
            Policy::And(_) => 3,
        }
    }

    fn is_empty(&self) -> bool {
        matches!(self, Policy::Void)
    }

    fn set_empty(&mut self) {
        *self = Policy::Void;
    }

    fn save_alternative<'a>(&'a self, writer: &mut Writer<'a>) -> Result<usize> {
        match self {
            Policy::Void => unreachable!("empty unions carry no payload"),
            Policy::One(one) => save_ensure_table(one, writer),
            Policy::Across(across) => save_ensure_table(across, writer),
            Policy::And(and) => save_ensure_table(and, writer),
        }
    }

    fn load_alternative(&mut self, cx: &LoadCx<'_>, index: u8, at: usize) -> Result<()> {
        *self = match index {
            0 => Policy::Void,
            1 => Policy::One(load_ensure_table(cx, at)?),
            2 => Policy::Across(load_ensure_table(cx, at)?),
            3 => Policy::And(load_ensure_table(cx, at)?),
            _ => unreachable!("tag validated before dispatch"),
        };
        Ok(())
    }

    fn collect_alternatives(collector: &mut VTableCollector) {
        collector.alternative::<()>();
        collector.alternative::<PolicyOne>();
        collector.alternative::<Box<PolicyAcross>>();
        collector.alternative::<PolicyAnd>();
    }
}
flat_union!(Policy);

// ─────────────────────────────────────────────────────────────────────────────
// The message
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Default, PartialEq, Clone)]
struct Mutation {
    kind: u8,
    key: Bytes,
    value: Bytes,
}
flat_table!(Mutation { kind, key, value });

#[derive(Debug, Default, PartialEq, Clone)]
struct CommitRecord {
    version: u64,
    flags: u16,
    mutations: Vec<Mutation>,
    tags: Vec<u16>,
    metadata: BTreeMap<String, String>,
    placement: Policy,
}
flat_table!(CommitRecord { version, flags, mutations, tags, metadata, placement });
impl FileIdentified for CommitRecord {
    const FILE_IDENTIFIER: FileIdentifier = 0x434d5452;
}

fn sample_policy() -> Policy {
    Policy::And(PolicyAnd {
        children: vec![
            PolicyNode {
                policy: Policy::Across(Box::new(PolicyAcross {
                    count: 2,
                    attribute: "zone".into(),
                    child: Policy::Across(Box::new(PolicyAcross {
                        count: 1,
                        attribute: "machine".into(),
                        child: Policy::One(PolicyOne),
                    })),
                })),
            },
            PolicyNode { policy: Policy::One(PolicyOne) },
        ],
    })
}

fn sample_record() -> CommitRecord {
    CommitRecord {
        version: 0x0102_0304_0506_0708,
        flags: 0b1010,
        mutations: vec![
            Mutation {
                kind: 0,
                key: Bytes::from_static(b"/map/alpha"),
                value: Bytes::from_static(b"\x01\x02\x03"),
            },
            Mutation {
                kind: 1,
                key: Bytes::from_static(b"/map/beta"),
                value: Bytes::new(),
            },
        ],
        tags: vec![1, 9, 512],
        metadata: BTreeMap::from([
            ("origin".to_string(), "dc-east".to_string()),
            ("reason".to_string(), "rebalance".to_string()),
        ]),
        placement: sample_policy(),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn full_message_roundtrips() {
    let record = sample_record();
    let buf = save(&record).unwrap();
    let mut back = CommitRecord::default();
    load(&buf, &mut back).unwrap();
    assert_eq!(back, record);
}

#[test]
fn identifier_travels_with_the_message() {
    let buf = save(&sample_record()).unwrap();
    assert_eq!(read_file_identifier(&buf).unwrap(), CommitRecord::FILE_IDENTIFIER);
}

#[test]
fn deep_policy_trees_roundtrip() {
    // Ten levels of across-nesting: recursion through boxed children and
    // the TypeId-memoized vtable collection.
    let mut policy = Policy::One(PolicyOne);
    for depth in 0..10 {
        policy = Policy::Across(Box::new(PolicyAcross {
            count: depth,
            attribute: format!("level-{depth}"),
            child: policy,
        }));
    }
    let record = CommitRecord { placement: policy, ..CommitRecord::default() };
    let buf = save(&record).unwrap();
    let mut back = CommitRecord::default();
    load(&buf, &mut back).unwrap();
    assert_eq!(back, record);
}

#[test]
fn empty_policy_roundtrips() {
    let record = CommitRecord { placement: Policy::Void, ..sample_record() };
    let buf = save(&record).unwrap();
    let mut back = CommitRecord::default();
    load(&buf, &mut back).unwrap();
    assert_eq!(back.placement, Policy::Void);
}

#[test]
fn save_is_deterministic_for_the_full_message() {
    let first = save(&sample_record()).unwrap();
    let second = save(&sample_record()).unwrap();
    assert_eq!(first, second);
    assert_eq!(first.len() % 8, 0);
}

#[test]
fn mutation_bytes_survive_byte_for_byte() {
    let record = sample_record();
    let buf = save(&record).unwrap();
    let mut back = CommitRecord::default();
    load(&buf, &mut back).unwrap();
    assert_eq!(back.mutations[0].value, Bytes::from_static(b"\x01\x02\x03"));
    assert_eq!(back.mutations[1].value, Bytes::new());
}

#[test]
fn thousand_mutation_log_roundtrips() {
    let mut record = CommitRecord::default();
    for i in 0..1000u32 {
        record.mutations.push(Mutation {
            kind: (i % 3) as u8,
            key: Bytes::from(format!("/key/{i:05}").into_bytes()),
            value: Bytes::from(i.to_le_bytes().to_vec()),
        });
    }
    let buf = save(&record).unwrap();
    let mut back = CommitRecord::default();
    load(&buf, &mut back).unwrap();
    assert_eq!(back, record);
}
