use crate::db::core::{Design, LogicalNetlist, NetKind, Pip, Placement, PortDirection, StaticKind};
use crate::db::indices::SiteId;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Deserialize;

const LUT_INPUTS: usize = 6;

#[derive(Clone, Copy, Debug, Deserialize)]
#[serde(default)]
pub struct GeneratorParams {
    /// Total nets, static nets included.
    pub nets: usize,
    /// Number of static nets, at most one GND and one VCC.
    pub static_nets: usize,
    pub sinks_per_net: usize,
    pub seed: u64,
}

impl Default for GeneratorParams {
    fn default() -> Self {
        Self {
            nets: 10,
            static_nets: 2,
            sinks_per_net: 2,
            seed: 1,
        }
    }
}

fn site_name(i: usize) -> String {
    format!("SLICE_X{}Y0", i)
}

fn tile_name(i: usize) -> String {
    format!("INT_X{}Y0", i)
}

/// Builds a random, fully placed and routed reference design. Signal net
/// `net<i>` is driven from `SLICE_X<i>Y0` (A LUT) and fans out to B LUT
/// inputs of other slices; static nets tie C LUT inputs. The result is
/// deterministic for a given seed.
pub fn generate_reference_design(params: &GeneratorParams) -> Design {
    let mut rng = StdRng::seed_from_u64(params.seed);
    let static_nets = params.static_nets.min(2).min(params.nets);
    let signal_nets = params.nets - static_nets;
    let num_sites = signal_nets.max(1) + 1;

    log::info!(
        "Generating reference design: {} signal nets, {} static nets, {} sites",
        signal_nets,
        static_nets,
        num_sites
    );

    let mut netlist = LogicalNetlist::new("generated");
    let mut design = Design::new("xcvu3p");
    let sites: Vec<SiteId> = (0..num_sites)
        .map(|i| design.add_site(&site_name(i), "SLICEL"))
        .collect();

    let mut sink_maps: Vec<Vec<(String, String)>> = vec![Vec::new(); num_sites];

    for i in 0..signal_nets {
        let name = format!("net{}", i);
        let net = design.add_net(&name, NetKind::Signal);

        let drv = netlist.add_cell(&format!("drv{}", i), "LUT6");
        netlist.connect(drv, "O", PortDirection::Output, &name);
        design.placements.push(Placement {
            cell: format!("drv{}", i),
            site: sites[i],
            bel: "A6LUT".to_string(),
            pin_map: vec![("O".to_string(), "A_O".to_string())],
        });
        design.set_source(net, sites[i], "A_O");

        let mut pips = vec![Pip::new(&tile_name(i), "A_O", &format!("{}_OUT", name))];
        let mut candidates: Vec<usize> = (0..num_sites)
            .filter(|&j| j != i && sink_maps[j].len() < LUT_INPUTS)
            .collect();
        for k in 0..params.sinks_per_net {
            if candidates.is_empty() {
                break;
            }
            let j = candidates.swap_remove(rng.gen_range(0..candidates.len()));
            let slot = sink_maps[j].len();
            let logical_pin = format!("I{}", slot);
            let site_pin = format!("B{}", slot + 1);

            let snk = netlist.add_cell(&format!("snk{}", j), "LUT6");
            netlist.connect(snk, &logical_pin, PortDirection::Input, &name);
            sink_maps[j].push((logical_pin, site_pin.clone()));
            design.add_sink(net, sites[j], &site_pin);

            let hop = format!("{}_H{}", name, k);
            pips.push(Pip::new(&tile_name(i), &format!("{}_OUT", name), &hop));
            pips.push(Pip::new(&tile_name(j), &hop, &format!("{}_IMUX", site_pin)));
        }
        design.net_mut(net).pips = pips;
    }

    for (j, map) in sink_maps.into_iter().enumerate() {
        if map.is_empty() {
            continue;
        }
        design.placements.push(Placement {
            cell: format!("snk{}", j),
            site: sites[j],
            bel: "B6LUT".to_string(),
            pin_map: map,
        });
    }

    let kinds = [StaticKind::Gnd, StaticKind::Vcc];
    let mut tie_maps: Vec<Vec<(String, String)>> = vec![Vec::new(); num_sites];
    for &kind in kinds.iter().take(static_nets) {
        let name = kind.net_name();
        let net = design.add_net(name, NetKind::Static(kind));
        netlist.add_net(name);
        let mut pips = Vec::new();
        for _ in 0..2 {
            let j = rng.gen_range(0..num_sites);
            if tie_maps[j].len() >= LUT_INPUTS {
                continue;
            }
            let slot = tie_maps[j].len();
            let logical_pin = format!("I{}", slot);
            let site_pin = format!("C{}", slot + 1);

            let tie = netlist.add_cell(&format!("tie{}", j), "LUT6");
            netlist.connect(tie, &logical_pin, PortDirection::Input, name);
            tie_maps[j].push((logical_pin, site_pin.clone()));
            design.add_sink(net, sites[j], &site_pin);
            pips.push(Pip::new(
                &tile_name(j),
                &format!("{}_WIRE", name),
                &format!("{}_IMUX", site_pin),
            ));
        }
        design.net_mut(net).pips = pips;
    }

    for (j, map) in tie_maps.into_iter().enumerate() {
        if map.is_empty() {
            continue;
        }
        design.placements.push(Placement {
            cell: format!("tie{}", j),
            site: sites[j],
            bel: "C6LUT".to_string(),
            pin_map: map,
        });
    }

    if signal_nets > 0 {
        netlist.add_port("dout", PortDirection::Output, "net0");
    }

    design.name = netlist.name.clone();
    design.netlist = netlist;
    design
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_design_is_fully_routed() {
        let design = generate_reference_design(&GeneratorParams::default());
        assert_eq!(design.num_nets(), 10);
        assert_eq!(design.nets.iter().filter(|n| n.is_static()).count(), 2);
        for net in &design.nets {
            assert!(net.has_pips(), "net {} unrouted", net.name);
            assert!(net.is_static() || net.source.is_some());
        }
    }

    #[test]
    fn test_generation_is_deterministic() {
        let params = GeneratorParams {
            seed: 42,
            ..GeneratorParams::default()
        };
        let a = generate_reference_design(&params);
        let b = generate_reference_design(&params);
        let labels = |d: &Design| -> Vec<String> {
            (0..d.pins.len())
                .map(|i| d.pin_label(crate::db::indices::PinId::new(i)))
                .collect()
        };
        assert_eq!(labels(&a), labels(&b));
    }

    #[test]
    fn test_bindings_resolve_against_logical_netlist() {
        let design = generate_reference_design(&GeneratorParams::default());
        for p in &design.placements {
            let cell = design.netlist.cell(design.netlist.cell_by_name(&p.cell).unwrap());
            for (logical, _) in &p.pin_map {
                assert!(cell.pin(logical).is_some());
            }
        }
    }
}
