use crate::db::core::{Design, NetData};
use std::collections::{BTreeSet, HashSet};
use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DiffKind {
    MissingNet,
    ExtraNet,
    KindChanged,
    MissingPip,
    ExtraPip,
    MissingPin,
    ExtraPin,
}

impl fmt::Display for DiffKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DiffKind::MissingNet => "net missing",
            DiffKind::ExtraNet => "net added",
            DiffKind::KindChanged => "net type changed",
            DiffKind::MissingPip => "PIP removed",
            DiffKind::ExtraPip => "PIP added",
            DiffKind::MissingPin => "site pin removed",
            DiffKind::ExtraPin => "site pin added",
        };
        f.write_str(s)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DiffEntry {
    pub net: String,
    pub kind: DiffKind,
    pub resource: String,
}

#[derive(Clone, Debug, Default)]
pub struct DiffReport {
    pub entries: Vec<DiffEntry>,
}

impl DiffReport {
    pub fn count(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn push(&mut self, net: &str, kind: DiffKind, resource: impl Into<String>) {
        self.entries.push(DiffEntry {
            net: net.to_string(),
            kind,
            resource: resource.into(),
        });
    }
}

impl fmt::Display for DiffReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Design differences: {}", self.count())?;
        for e in &self.entries {
            writeln!(f, "  net '{}': {}: {}", e.net, e.kind, e.resource)?;
        }
        Ok(())
    }
}

fn pin_set(design: &Design, net: &NetData) -> BTreeSet<String> {
    net.pins().map(|p| design.pin_label(p)).collect()
}

fn pip_set(net: &NetData) -> BTreeSet<String> {
    net.pips.iter().map(|p| p.to_string()).collect()
}

/// Compares the protected (static and clock) nets of two designs. Any
/// entry in the report means a transform touched a net it must not touch.
pub fn compare_designs(before: &Design, after: &Design) -> DiffReport {
    log::info!("Comparing static and clock nets...");
    let mut report = DiffReport::default();

    let mut names = Vec::new();
    let mut seen = HashSet::new();
    for net in before.nets.iter().chain(after.nets.iter()) {
        if net.kind.is_protected() && seen.insert(net.name.as_str()) {
            names.push(net.name.as_str());
        }
    }

    for name in names {
        let b = before.net_by_name(name).map(|id| before.net(id));
        let a = after.net_by_name(name).map(|id| after.net(id));
        let (b, a) = match (b, a) {
            (Some(b), Some(a)) => (b, a),
            (Some(b), None) => {
                report.push(name, DiffKind::MissingNet, b.kind.keyword());
                continue;
            }
            (None, Some(a)) => {
                report.push(name, DiffKind::ExtraNet, a.kind.keyword());
                continue;
            }
            (None, None) => continue,
        };

        if b.kind != a.kind {
            report.push(
                name,
                DiffKind::KindChanged,
                format!("{} -> {}", b.kind.keyword(), a.kind.keyword()),
            );
        }

        let (bp, ap) = (pip_set(b), pip_set(a));
        for pip in bp.difference(&ap) {
            report.push(name, DiffKind::MissingPip, pip.clone());
        }
        for pip in ap.difference(&bp) {
            report.push(name, DiffKind::ExtraPip, pip.clone());
        }

        let (bs, as_) = (pin_set(before, b), pin_set(after, a));
        for pin in bs.difference(&as_) {
            report.push(name, DiffKind::MissingPin, pin.clone());
        }
        for pin in as_.difference(&bs) {
            report.push(name, DiffKind::ExtraPin, pin.clone());
        }
    }

    if report.is_empty() {
        log::info!("\x1b[32mPASS\x1b[0m: Static and clock nets are unchanged.");
    } else {
        log::error!(
            "\x1b[31mFAIL\x1b[0m: {} difference(s) on static and clock nets",
            report.count()
        );
    }
    report
}
