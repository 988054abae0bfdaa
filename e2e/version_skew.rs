//! E2E Suite 02: rolling-upgrade interoperability.
//!
//! Two fleets exchange status messages while running different releases of
//! the same schema. Newer senders append members (including a union); old
//! readers must ignore them, new readers must default what old senders never
//! wrote, and a reader whose union knows fewer alternatives must fail loudly
//! rather than misinterpret the payload.

use flatwire::{
    flat_table, flat_union, load, save, save_ensure_table, load_ensure_table, Error,
    FileIdentified, FileIdentifier, LoadCx, Result, UnionLike, VTableCollector, Writer,
};

const STATUS_ID: FileIdentifier = 0x53544154;

// ─────────────────────────────────────────────────────────────────────────────
// Release 1: plain counters
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Default, PartialEq)]
struct StatusR1 {
    uptime_seconds: u64,
    address: String,
}
flat_table!(StatusR1 { uptime_seconds, address });
impl FileIdentified for StatusR1 {
    const FILE_IDENTIFIER: FileIdentifier = STATUS_ID;
}

// ─────────────────────────────────────────────────────────────────────────────
// Release 2: adds a roles vector and a health union with two alternatives
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Default, PartialEq)]
struct Healthy {
    load_factor: f64,
}
flat_table!(Healthy { load_factor });

#[derive(Debug, Default, PartialEq)]
struct Degraded {
    reason: String,
}
flat_table!(Degraded { reason });

#[derive(Debug, PartialEq)]
enum HealthR2 {
    Unknown,
    Healthy(Healthy),
    Degraded(Degraded),
}

impl Default for HealthR2 {
    fn default() -> HealthR2 {
        HealthR2::Unknown
    }
}

impl UnionLike for HealthR2 {
    const ALTERNATIVES: usize = 3;

    fn index(&self) -> u8 {
        match self {
            HealthR2::Unknown => 0,
            HealthR2::Healthy(_) => 1,
            HealthR2::Degraded(_) => 2,
        }
    }

    fn is_empty(&self) -> bool {
        matches!(self, HealthR2::Unknown)
    }

    fn set_empty(&mut self) {
        *self = HealthR2::Unknown;
    }

    fn save_alternative<'a>(&'a self, writer: &mut Writer<'a>) -> Result<usize> {
        match self {
            HealthR2::Unknown => unreachable!("empty unions carry no payload"),
            HealthR2::Healthy(h) => save_ensure_table(h, writer),
            HealthR2::Degraded(d) => save_ensure_table(d, writer),
        }
    }

    fn load_alternative(&mut self, cx: &LoadCx<'_>, index: u8, at: usize) -> Result<()> {
        *self = match index {
            0 => HealthR2::Unknown,
            1 => HealthR2::Healthy(load_ensure_table(cx, at)?),
            2 => HealthR2::Degraded(load_ensure_table(cx, at)?),
            _ => unreachable!("tag validated before dispatch"),
        };
        Ok(())
    }

    fn collect_alternatives(collector: &mut VTableCollector) {
        collector.alternative::<()>();
        collector.alternative::<Healthy>();
        collector.alternative::<Degraded>();
    }
}
flat_union!(HealthR2);

#[derive(Debug, Default, PartialEq)]
struct StatusR2 {
    uptime_seconds: u64,
    address: String,
    roles: Vec<String>,
    health: HealthR2,
}
flat_table!(StatusR2 { uptime_seconds, address, roles, health });
impl FileIdentified for StatusR2 {
    const FILE_IDENTIFIER: FileIdentifier = STATUS_ID;
}

// ─────────────────────────────────────────────────────────────────────────────
// Release 3: the health union gains a third alternative
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Default, PartialEq)]
struct Draining {
    remaining: u32,
}
flat_table!(Draining { remaining });

#[derive(Debug, PartialEq)]
enum HealthR3 {
    Unknown,
    Healthy(Healthy),
    Degraded(Degraded),
    Draining(Draining),
}

impl Default for HealthR3 {
    fn default() -> HealthR3 {
        HealthR3::Unknown
    }
}

impl UnionLike for HealthR3 {
    const ALTERNATIVES: usize = 4;

    fn index(&self) -> u8 {
        match self {
            HealthR3::Unknown => 0,
            HealthR3::Healthy(_) => 1,
            HealthR3::Degraded(_) => 2,
            HealthR3::Draining(_) => 3,
        }
    }

    fn is_empty(&self) -> bool {
        matches!(self, HealthR3::Unknown)
    }

    fn set_empty(&mut self) {
        *self = HealthR3::Unknown;
    }

    fn save_alternative<'a>(&'a self, writer: &mut Writer<'a>) -> Result<usize> {
        match self {
            HealthR3::Unknown => unreachable!("empty unions carry no payload"),
            HealthR3::Healthy(h) => save_ensure_table(h, writer),
            HealthR3::Degraded(d) => save_ensure_table(d, writer),
            HealthR3::Draining(d) => save_ensure_table(d, writer),
        }
    }

    fn load_alternative(&mut self, cx: &LoadCx<'_>, index: u8, at: usize) -> Result<()> {
        *self = match index {
            0 => HealthR3::Unknown,
            1 => HealthR3::Healthy(load_ensure_table(cx, at)?),
            2 => HealthR3::Degraded(load_ensure_table(cx, at)?),
            3 => HealthR3::Draining(load_ensure_table(cx, at)?),
            _ => unreachable!("tag validated before dispatch"),
        };
        Ok(())
    }

    fn collect_alternatives(collector: &mut VTableCollector) {
        collector.alternative::<()>();
        collector.alternative::<Healthy>();
        collector.alternative::<Degraded>();
        collector.alternative::<Draining>();
    }
}
flat_union!(HealthR3);

#[derive(Debug, Default, PartialEq)]
struct StatusR3 {
    uptime_seconds: u64,
    address: String,
    roles: Vec<String>,
    health: HealthR3,
}
flat_table!(StatusR3 { uptime_seconds, address, roles, health });
impl FileIdentified for StatusR3 {
    const FILE_IDENTIFIER: FileIdentifier = STATUS_ID;
}

// ─────────────────────────────────────────────────────────────────────────────
// Upgrades and downgrades
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn release1_reader_accepts_release2_message() {
    let sent = StatusR2 {
        uptime_seconds: 3600,
        address: "10.0.0.7:4500".into(),
        roles: vec!["storage".into(), "log".into()],
        health: HealthR2::Healthy(Healthy { load_factor: 0.25 }),
    };
    let buf = save(&sent).unwrap();

    let mut old = StatusR1::default();
    load(&buf, &mut old).unwrap();
    assert_eq!(
        old,
        StatusR1 { uptime_seconds: 3600, address: "10.0.0.7:4500".into() }
    );
}

#[test]
fn release2_reader_accepts_release1_message() {
    let buf = save(&StatusR1 {
        uptime_seconds: 60,
        address: "10.0.0.9:4500".into(),
    })
    .unwrap();

    let mut new = StatusR2::default();
    load(&buf, &mut new).unwrap();
    assert_eq!(new.uptime_seconds, 60);
    assert_eq!(new.address, "10.0.0.9:4500");
    assert!(new.roles.is_empty());
    assert_eq!(new.health, HealthR2::Unknown);
}

#[test]
fn shared_alternatives_cross_releases() {
    let sent = StatusR3 {
        uptime_seconds: 10,
        address: "a".into(),
        roles: vec![],
        health: HealthR3::Degraded(Degraded { reason: "disk".into() }),
    };
    let buf = save(&sent).unwrap();

    // Tag 3 (Degraded) exists in both releases.
    let mut r2 = StatusR2::default();
    load(&buf, &mut r2).unwrap();
    assert_eq!(r2.health, HealthR2::Degraded(Degraded { reason: "disk".into() }));
}

#[test]
fn unknown_alternative_is_a_bad_union_tag() {
    let sent = StatusR3 {
        uptime_seconds: 10,
        address: "a".into(),
        roles: vec![],
        health: HealthR3::Draining(Draining { remaining: 12 }),
    };
    let buf = save(&sent).unwrap();

    // Draining is tag 4; release 2 declares three alternatives.
    let mut r2 = StatusR2::default();
    assert_eq!(
        load(&buf, &mut r2),
        Err(Error::BadUnionTag { tag: 4, alternatives: 3 })
    );
}

#[test]
fn empty_union_crosses_releases() {
    let sent = StatusR3 {
        uptime_seconds: 5,
        address: "b".into(),
        roles: vec!["proxy".into()],
        health: HealthR3::Unknown,
    };
    let buf = save(&sent).unwrap();

    let mut r2 = StatusR2::default();
    load(&buf, &mut r2).unwrap();
    assert_eq!(r2.health, HealthR2::Unknown);
}

#[test]
fn downgrade_then_upgrade_preserves_shared_members() {
    let original = StatusR3 {
        uptime_seconds: 777,
        address: "c".into(),
        roles: vec!["storage".into()],
        health: HealthR3::Healthy(Healthy { load_factor: 0.5 }),
    };
    let buf = save(&original).unwrap();

    let mut r1 = StatusR1::default();
    load(&buf, &mut r1).unwrap();
    let buf_r1 = save(&r1).unwrap();

    let mut r3 = StatusR3::default();
    load(&buf_r1, &mut r3).unwrap();
    assert_eq!(r3.uptime_seconds, 777);
    assert_eq!(r3.address, "c");
    assert!(r3.roles.is_empty());
    assert_eq!(r3.health, HealthR3::Unknown);
}
