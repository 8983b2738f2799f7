use contest_common::db::core::{Design, PinDirection, SitePip};
use contest_common::db::indices::{NetId, PinId, SiteId};

const SLICE_TYPES: [&str; 2] = ["SLICEL", "SLICEM"];

/// Sink pins left for the router: every sink of a net that is neither static
/// nor clock, has a source and carries no PIPs yet. Static and clock nets
/// keep their reference routing; source-less nets are legitimate in
/// out-of-context designs.
pub fn select_pins_to_route(design: &Design) -> Vec<PinId> {
    let mut pins = Vec::new();
    let mut nets = 0;
    for net in &design.nets {
        if net.kind.is_protected() || net.source.is_none() || net.has_pips() {
            continue;
        }
        pins.extend(net.sinks.iter().copied());
        nets += 1;
    }
    log::info!("Selected {} sink pins on {} unrouted nets", pins.len(), nets);
    pins
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AlternateSource {
    pub site: SiteId,
    pub pin: String,
    pub site_pip: SitePip,
}

/// Looks for a second legal output pin for a net's driver. A slice LUT
/// driving `<L>_O` can also leave the site through `<L>MUX` via the
/// `OUTMUX<L>` mux, provided that pin and mux are both unused.
pub fn find_alternate_source(design: &Design, net: NetId) -> Option<AlternateSource> {
    let src = design.pin(design.net(net).source?);
    let site = &design.sites[src.site.index()];
    if !SLICE_TYPES.contains(&site.site_type.as_str()) {
        return None;
    }
    let letter = src.name.strip_suffix("_O")?;
    if letter.len() != 1 {
        return None;
    }
    design.placement_at(src.site, &format!("{}6LUT", letter))?;

    let alt = format!("{}MUX", letter);
    let bel = format!("OUTMUX{}", letter);
    if design.pin_on_site(src.site, &alt).is_some() || site.site_pips.iter().any(|sp| sp.bel == bel)
    {
        return None;
    }
    Some(AlternateSource {
        site: src.site,
        pin: alt,
        site_pip: SitePip {
            bel,
            input: "D6".to_string(),
        },
    })
}

/// Adds the pin as the net's alternate source, commits it to the site and
/// routes the site-internal connection between the two outputs.
pub fn commit_alternate_source(design: &mut Design, net: NetId, alt: AlternateSource) -> PinId {
    let pin = design.alloc_pin(alt.site, &alt.pin, net, PinDirection::Output);
    design.net_mut(net).alt_source = Some(pin);
    design.register_site_pin(pin);
    design.sites[alt.site.index()].site_pips.push(alt.site_pip);
    pin
}

/// Runs alternate-source discovery over every non-static, non-clock net that
/// has a single source. Returns the number of alternate sources committed.
pub fn discover_alternate_sources(design: &mut Design) -> usize {
    let mut found = 0;
    for i in 0..design.num_nets() {
        let id = NetId::new(i);
        let net = design.net(id);
        if net.is_static() || net.is_clock() || net.source.is_none() || net.alt_source.is_some() {
            continue;
        }
        if let Some(alt) = find_alternate_source(design, id) {
            let pin = commit_alternate_source(design, id, alt);
            log::debug!(
                "Net '{}': alternate source {}",
                design.net(id).name,
                design.pin_label(pin)
            );
            found += 1;
        }
    }
    log::info!("Discovered {} alternate source pins", found);
    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use contest_common::db::core::{NetKind, Pip, Placement, StaticKind};

    fn design() -> Design {
        let mut d = Design::new("xcvu3p");
        let s0 = d.add_site("SLICE_X0Y0", "SLICEL");
        let s1 = d.add_site("SLICE_X1Y0", "SLICEM");
        let io = d.add_site("IOB_X0Y0", "HPIOB");
        for (site, bel) in [(s0, "A6LUT"), (s0, "B6LUT")] {
            d.placements.push(Placement {
                cell: format!("c_{}", bel),
                site,
                bel: bel.to_string(),
                pin_map: Vec::new(),
            });
        }

        let a = d.add_net("a", NetKind::Signal);
        d.set_source(a, s0, "A_O");
        d.add_sink(a, s1, "A1");

        let b = d.add_net("b", NetKind::Signal);
        d.set_source(b, s0, "B_O");
        d.add_sink(b, s1, "A2");
        d.add_sink(b, s1, "A3");
        d.net_mut(b).pips.push(Pip::new("INT_X0Y0", "B_O", "A2"));

        let gnd = d.add_net("GND", NetKind::Static(StaticKind::Gnd));
        d.add_sink(gnd, s1, "A6");

        let ooc = d.add_net("ooc", NetKind::Signal);
        d.add_sink(ooc, s1, "A4");

        let io_net = d.add_net("din", NetKind::Signal);
        d.set_source(io_net, io, "I");
        d.add_sink(io_net, s1, "A5");

        let clk = d.add_net("clk", NetKind::Clock);
        d.set_source(clk, s0, "C_O");
        d.add_sink(clk, s1, "CLK");
        d
    }

    #[test]
    fn test_selection_skips_routed_protected_and_sourceless() {
        let d = design();
        let pins = select_pins_to_route(&d);
        let labels: Vec<String> = pins.iter().map(|&p| d.pin_label(p)).collect();
        assert_eq!(labels, vec!["SLICE_X1Y0.A1", "SLICE_X1Y0.A5"]);
    }

    #[test]
    fn test_selection_never_returns_pins_of_routed_nets() {
        let d = design();
        for pin in select_pins_to_route(&d) {
            let net = d.net(d.pin(pin).net);
            assert!(!net.has_pips());
            assert!(!net.is_static());
            assert!(!net.is_clock());
        }
    }

    #[test]
    fn test_alternate_source_rule() {
        let d = design();
        let alt = find_alternate_source(&d, d.net_by_name("a").unwrap()).unwrap();
        assert_eq!(alt.pin, "AMUX");
        assert_eq!(alt.site_pip.bel, "OUTMUXA");
        // No LUT placed at C6LUT, IOB sites have no equivalent output.
        assert!(find_alternate_source(&d, d.net_by_name("clk").unwrap()).is_none());
        assert!(find_alternate_source(&d, d.net_by_name("din").unwrap()).is_none());
    }

    #[test]
    fn test_discovery_commits_pin_and_site_routing() {
        let mut d = design();
        assert_eq!(discover_alternate_sources(&mut d), 2);
        let a = d.net(d.net_by_name("a").unwrap());
        let alt = a.alt_source.unwrap();
        assert_eq!(d.pin_label(alt), "SLICE_X0Y0.AMUX");
        let s0 = d.site_by_name("SLICE_X0Y0").unwrap();
        assert!(d.sites[s0.index()].pins.contains(&alt));
        assert_eq!(d.sites[s0.index()].site_pips.len(), 2);

        // Second pass finds nothing new.
        assert_eq!(discover_alternate_sources(&mut d), 0);
    }

    #[test]
    fn test_discovery_skips_used_mux_pin() {
        let mut d = design();
        let s0 = d.site_by_name("SLICE_X0Y0").unwrap();
        let other = d.add_net("other", NetKind::Signal);
        d.add_sink(other, s0, "AMUX");
        assert!(find_alternate_source(&d, d.net_by_name("a").unwrap()).is_none());
    }
}
