use crate::db::indices::*;
use crate::db::lut_pins::PendingPinSwap;
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StaticKind {
    Gnd,
    Vcc,
}

impl StaticKind {
    /// Canonical name of the tie-off net of this kind.
    pub fn net_name(self) -> &'static str {
        match self {
            StaticKind::Gnd => "GND",
            StaticKind::Vcc => "VCC",
        }
    }
}

/// Classification tag carried by every physical net.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NetKind {
    Signal,
    Clock,
    Static(StaticKind),
}

impl NetKind {
    pub fn is_static(self) -> bool {
        matches!(self, NetKind::Static(_))
    }

    pub fn is_clock(self) -> bool {
        self == NetKind::Clock
    }

    /// Static and clock nets must come out of any transform untouched.
    pub fn is_protected(self) -> bool {
        self.is_static() || self.is_clock()
    }

    pub fn keyword(self) -> &'static str {
        match self {
            NetKind::Signal => "SIGNAL",
            NetKind::Clock => "CLOCK",
            NetKind::Static(StaticKind::Gnd) => "GND",
            NetKind::Static(StaticKind::Vcc) => "VCC",
        }
    }

    pub fn from_keyword(s: &str) -> Option<Self> {
        match s {
            "SIGNAL" => Some(NetKind::Signal),
            "CLOCK" => Some(NetKind::Clock),
            "GND" => Some(NetKind::Static(StaticKind::Gnd)),
            "VCC" => Some(NetKind::Static(StaticKind::Vcc)),
            _ => None,
        }
    }
}

/// A programmable interconnect point between two wires of a tile.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Pip {
    pub tile: String,
    pub wire0: String,
    pub wire1: String,
    pub bidir: bool,
}

impl Pip {
    pub fn new(tile: &str, wire0: &str, wire1: &str) -> Self {
        Self {
            tile: tile.to_string(),
            wire0: wire0.to_string(),
            wire1: wire1.to_string(),
            bidir: false,
        }
    }
}

impl fmt::Display for Pip {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let arrow = if self.bidir { "<<->>" } else { "->>" };
        write!(f, "{}/{}{}{}", self.tile, self.wire0, arrow, self.wire1)
    }
}

/// Routing through a site-internal mux, named by BEL and selected input.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SitePip {
    pub bel: String,
    pub input: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PinDirection {
    Input,
    Output,
}

#[derive(Clone, Debug)]
pub struct SitePinData {
    pub site: SiteId,
    pub name: String,
    pub net: NetId,
    pub direction: PinDirection,
}

#[derive(Clone, Debug)]
pub struct SiteData {
    pub name: String,
    pub site_type: String,
    /// Pin instances committed to this site.
    pub pins: Vec<PinId>,
    pub site_pips: Vec<SitePip>,
}

/// Placement of one logical cell onto a BEL, with its logical to physical
/// pin binding.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Placement {
    pub cell: String,
    pub site: SiteId,
    pub bel: String,
    pub pin_map: Vec<(String, String)>,
}

#[derive(Clone, Debug)]
pub struct NetData {
    pub name: String,
    pub kind: NetKind,
    pub source: Option<PinId>,
    pub alt_source: Option<PinId>,
    pub sinks: Vec<PinId>,
    pub pips: Vec<Pip>,
}

impl NetData {
    pub fn is_static(&self) -> bool {
        self.kind.is_static()
    }

    pub fn is_clock(&self) -> bool {
        self.kind.is_clock()
    }

    pub fn has_pips(&self) -> bool {
        !self.pips.is_empty()
    }

    /// Source, alternate source and sinks, in that order.
    pub fn pins(&self) -> impl Iterator<Item = PinId> + '_ {
        self.source
            .iter()
            .chain(self.alt_source.iter())
            .chain(self.sinks.iter())
            .copied()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PortDirection {
    Input,
    Output,
    Inout,
}

impl PortDirection {
    pub fn keyword(self) -> &'static str {
        match self {
            PortDirection::Input => "IN",
            PortDirection::Output => "OUT",
            PortDirection::Inout => "INOUT",
        }
    }

    pub fn from_keyword(s: &str) -> Option<Self> {
        match s {
            "IN" => Some(PortDirection::Input),
            "OUT" => Some(PortDirection::Output),
            "INOUT" => Some(PortDirection::Inout),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LogicalPort {
    pub name: String,
    pub direction: PortDirection,
    pub net: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LogicalPin {
    pub name: String,
    pub direction: PortDirection,
    pub net: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LogicalCell {
    pub name: String,
    pub cell_type: String,
    pub pins: Vec<LogicalPin>,
}

impl LogicalCell {
    pub fn pin(&self, name: &str) -> Option<&LogicalPin> {
        self.pins.iter().find(|p| p.name == name)
    }
}

#[derive(Clone, Debug, Default)]
pub struct LogicalNetlist {
    pub name: String,
    pub ports: Vec<LogicalPort>,
    pub cells: Vec<LogicalCell>,
    pub nets: Vec<String>,
    /// Opaque encrypted cell definitions, by absolute path.
    pub encrypted_cells: Vec<PathBuf>,
    cell_name_map: HashMap<String, CellId>,
    net_name_map: HashMap<String, usize>,
}

impl LogicalNetlist {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }

    pub fn add_net(&mut self, name: &str) {
        if self.net_name_map.contains_key(name) {
            return;
        }
        self.net_name_map.insert(name.to_string(), self.nets.len());
        self.nets.push(name.to_string());
    }

    pub fn has_net(&self, name: &str) -> bool {
        self.net_name_map.contains_key(name)
    }

    pub fn add_port(&mut self, name: &str, direction: PortDirection, net: &str) {
        self.add_net(net);
        self.ports.push(LogicalPort {
            name: name.to_string(),
            direction,
            net: net.to_string(),
        });
    }

    pub fn add_cell(&mut self, name: &str, cell_type: &str) -> CellId {
        if let Some(&id) = self.cell_name_map.get(name) {
            return id;
        }
        let id = CellId::new(self.cells.len());
        self.cells.push(LogicalCell {
            name: name.to_string(),
            cell_type: cell_type.to_string(),
            pins: Vec::new(),
        });
        self.cell_name_map.insert(name.to_string(), id);
        id
    }

    pub fn connect(&mut self, cell: CellId, pin: &str, direction: PortDirection, net: &str) {
        self.add_net(net);
        self.cells[cell.index()].pins.push(LogicalPin {
            name: pin.to_string(),
            direction,
            net: net.to_string(),
        });
    }

    pub fn cell_by_name(&self, name: &str) -> Option<CellId> {
        self.cell_name_map.get(name).copied()
    }

    pub fn cell(&self, id: CellId) -> &LogicalCell {
        &self.cells[id.index()]
    }

    /// Nets attached to a top-level port.
    pub fn is_boundary_net(&self, net: &str) -> bool {
        self.ports.iter().any(|p| p.net == net)
    }
}

/// A placed (and possibly routed) design: the physical netlist, merged with
/// its logical netlist once both are loaded.
#[derive(Clone, Debug, Default)]
pub struct Design {
    pub name: String,
    pub part: String,
    pub netlist: LogicalNetlist,

    pub sites: Vec<SiteData>,
    pub nets: Vec<NetData>,
    pub pins: Vec<SitePinData>,
    pub placements: Vec<Placement>,
    pub pin_swaps: Vec<PendingPinSwap>,

    site_name_map: HashMap<String, SiteId>,
    net_name_map: HashMap<String, NetId>,
}

impl Design {
    pub fn new(part: &str) -> Self {
        Self {
            part: part.to_string(),
            ..Self::default()
        }
    }

    pub fn num_nets(&self) -> usize {
        self.nets.len()
    }

    pub fn add_site(&mut self, name: &str, site_type: &str) -> SiteId {
        if let Some(&id) = self.site_name_map.get(name) {
            return id;
        }
        let id = SiteId::new(self.sites.len());
        self.sites.push(SiteData {
            name: name.to_string(),
            site_type: site_type.to_string(),
            pins: Vec::new(),
            site_pips: Vec::new(),
        });
        self.site_name_map.insert(name.to_string(), id);
        id
    }

    pub fn site_by_name(&self, name: &str) -> Option<SiteId> {
        self.site_name_map.get(name).copied()
    }

    pub fn add_net(&mut self, name: &str, kind: NetKind) -> NetId {
        if let Some(&id) = self.net_name_map.get(name) {
            return id;
        }
        let id = NetId::new(self.nets.len());
        self.nets.push(NetData {
            name: name.to_string(),
            kind,
            source: None,
            alt_source: None,
            sinks: Vec::new(),
            pips: Vec::new(),
        });
        self.net_name_map.insert(name.to_string(), id);
        id
    }

    pub fn net_by_name(&self, name: &str) -> Option<NetId> {
        self.net_name_map.get(name).copied()
    }

    pub fn net(&self, id: NetId) -> &NetData {
        &self.nets[id.index()]
    }

    pub fn net_mut(&mut self, id: NetId) -> &mut NetData {
        &mut self.nets[id.index()]
    }

    /// Allocates a pin instance without attaching it to its net or site.
    pub fn alloc_pin(
        &mut self,
        site: SiteId,
        name: &str,
        net: NetId,
        direction: PinDirection,
    ) -> PinId {
        let id = PinId::new(self.pins.len());
        self.pins.push(SitePinData {
            site,
            name: name.to_string(),
            net,
            direction,
        });
        id
    }

    /// Commits a pin instance to its site's pin list.
    pub fn register_site_pin(&mut self, pin: PinId) {
        let site = self.pins[pin.index()].site;
        let pins = &mut self.sites[site.index()].pins;
        if !pins.contains(&pin) {
            pins.push(pin);
        }
    }

    /// Creates a sink pin on `net` and commits it to the site.
    pub fn add_sink(&mut self, net: NetId, site: SiteId, name: &str) -> PinId {
        let pin = self.alloc_pin(site, name, net, PinDirection::Input);
        self.nets[net.index()].sinks.push(pin);
        self.register_site_pin(pin);
        pin
    }

    /// Creates the source pin of `net` and commits it to the site.
    pub fn set_source(&mut self, net: NetId, site: SiteId, name: &str) -> PinId {
        let pin = self.alloc_pin(site, name, net, PinDirection::Output);
        self.nets[net.index()].source = Some(pin);
        self.register_site_pin(pin);
        pin
    }

    pub fn pin(&self, id: PinId) -> &SitePinData {
        &self.pins[id.index()]
    }

    /// Pin instance named `name` among the pins committed to `site`.
    pub fn pin_on_site(&self, site: SiteId, name: &str) -> Option<PinId> {
        self.sites[site.index()]
            .pins
            .iter()
            .copied()
            .find(|&p| self.pins[p.index()].name == name)
    }

    pub fn pin_label(&self, id: PinId) -> String {
        let pin = &self.pins[id.index()];
        format!("{}.{}", self.sites[pin.site.index()].name, pin.name)
    }

    pub fn placement_at(&self, site: SiteId, bel: &str) -> Option<&Placement> {
        self.placements
            .iter()
            .find(|p| p.site == site && p.bel == bel)
    }

    pub fn has_encrypted_cells(&self) -> bool {
        !self.netlist.encrypted_cells.is_empty()
    }

    /// Clears the wire-level routing of a net. Site-level state is kept.
    pub fn unroute_net(&mut self, net: NetId) {
        self.nets[net.index()].pips.clear();
    }

    pub fn pending_pin_swaps(&self) -> usize {
        self.pin_swaps.iter().filter(|s| !s.committed).count()
    }

    /// Creates the sink/source pin instances implied by the placed cells'
    /// pin bindings but absent from the physical nets. Only nets attached to
    /// a top-level port are considered: out-of-context designs carry such
    /// pins on their boundary nets, and materialising them marks the nodes
    /// they occupy as in use. Returns the number of pins created.
    pub fn create_missing_site_pins(&mut self) -> usize {
        let mut missing = Vec::new();
        for placement in &self.placements {
            let Some(cell_id) = self.netlist.cell_by_name(&placement.cell) else {
                continue;
            };
            let cell = self.netlist.cell(cell_id);
            for (logical, physical) in &placement.pin_map {
                let Some(lpin) = cell.pin(logical) else {
                    continue;
                };
                if !self.netlist.is_boundary_net(&lpin.net) {
                    continue;
                }
                let Some(net) = self.net_by_name(&lpin.net) else {
                    continue;
                };
                if self.pin_on_site(placement.site, physical).is_some() {
                    continue;
                }
                missing.push((net, placement.site, physical.clone(), lpin.direction));
            }
        }

        let mut created = 0;
        for (net, site, name, direction) in missing {
            if self.pin_on_site(site, &name).is_some() {
                continue;
            }
            match direction {
                PortDirection::Output => {
                    if self.nets[net.index()].source.is_some() {
                        continue;
                    }
                    self.set_source(net, site, &name);
                }
                _ => {
                    self.add_sink(net, site, &name);
                }
            }
            log::debug!(
                "Created missing pin {}.{} on net '{}'",
                self.sites[site.index()].name,
                name,
                self.nets[net.index()].name
            );
            created += 1;
        }
        created
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// `din` enters through a port, `mid` is internal. Both feed a LUT whose
    /// bound input pin is missing from the physical net.
    fn boundary_design() -> Design {
        let mut d = Design::new("xcvu3p");
        let s0 = d.add_site("SLICE_X0Y0", "SLICEL");
        d.netlist.add_port("din", PortDirection::Input, "din");
        let lut = d.netlist.add_cell("lut", "LUT2");
        d.netlist.connect(lut, "I0", PortDirection::Input, "din");
        d.netlist.connect(lut, "I1", PortDirection::Input, "mid");
        d.add_net("din", NetKind::Signal);
        d.add_net("mid", NetKind::Signal);
        d.placements.push(Placement {
            cell: "lut".to_string(),
            site: s0,
            bel: "A6LUT".to_string(),
            pin_map: vec![
                ("I0".to_string(), "A1".to_string()),
                ("I1".to_string(), "A2".to_string()),
            ],
        });
        d
    }

    #[test]
    fn test_missing_pins_created_on_boundary_nets_only() {
        let mut d = boundary_design();
        assert_eq!(d.create_missing_site_pins(), 1);
        let din = d.net(d.net_by_name("din").unwrap());
        assert_eq!(din.sinks.len(), 1);
        assert_eq!(d.pin_label(din.sinks[0]), "SLICE_X0Y0.A1");
        assert!(d.net(d.net_by_name("mid").unwrap()).sinks.is_empty());

        assert_eq!(d.create_missing_site_pins(), 0);
    }
}
