//! Deferred LUT input pin swaps.
//!
//! A router that permutes LUT inputs may only touch PIPs, so it routes to
//! the physical pin it picked while the site pin instances keep the original
//! assignment. The chosen permutation is recorded as a [`PendingPinSwap`],
//! together with the synthetic PIPs (a "fake" branch from the routed pin to
//! the original one) that let completeness checks see a fully routed net.
//! [`LutPinReconciler::reconcile`] later commits the permutation to the site
//! pins and cell pin bindings and drops the synthetic PIPs.

use crate::db::core::{Design, PinDirection, Pip};
use crate::db::indices::{NetId, PinId, SiteId};
use crate::error::{DesignError, Result};
use std::collections::{HashMap, HashSet};

/// LUT input pins per LUT: `<L>1` .. `<L>6`.
const LUT_INPUTS: u8 = 6;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PendingPinSwap {
    pub site: SiteId,
    pub bel: String,
    /// (original pin, routed pin) pairs.
    pub mapping: Vec<(String, String)>,
    pub fake_pips: Vec<(NetId, Pip)>,
    pub committed: bool,
}

impl PendingPinSwap {
    pub fn new(site: SiteId, bel: &str) -> Self {
        Self {
            site,
            bel: bel.to_string(),
            mapping: Vec::new(),
            fake_pips: Vec::new(),
            committed: false,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum ReconcileMode {
    /// No reassignment permitted; any pending swap is an error.
    Strict,
    #[default]
    PinSwapEnabled,
}

/// The LUT letter of a LUT BEL (`A6LUT`, `A5LUT` -> `A`).
fn lut_letter(bel: &str) -> Option<char> {
    let mut chars = bel.chars();
    let letter = chars.next()?;
    let rest = chars.as_str();
    if letter.is_ascii_uppercase() && (rest == "6LUT" || rest == "5LUT") {
        Some(letter)
    } else {
        None
    }
}

/// Equivalence class of a LUT input site pin (`B3` -> (`B`, 3)).
fn lut_input_class(pin: &str) -> Option<(char, u8)> {
    let mut chars = pin.chars();
    let letter = chars.next()?;
    let idx: u8 = chars.as_str().parse().ok()?;
    if letter.is_ascii_uppercase() && (1..=LUT_INPUTS).contains(&idx) {
        Some((letter, idx))
    } else {
        None
    }
}

pub struct LutPinReconciler {
    mode: ReconcileMode,
}

impl LutPinReconciler {
    pub fn new(mode: ReconcileMode) -> Self {
        Self { mode }
    }

    /// Commits every pending swap. Already committed swaps are skipped, so a
    /// second call leaves the design unchanged. All swaps are validated
    /// before any is applied; on error the design is untouched. Returns the
    /// number of swaps committed by this call.
    pub fn reconcile(&self, design: &mut Design) -> Result<usize> {
        let pending: Vec<usize> = (0..design.pin_swaps.len())
            .filter(|&i| !design.pin_swaps[i].committed)
            .collect();
        if pending.is_empty() {
            return Ok(0);
        }

        if self.mode == ReconcileMode::Strict {
            let swap = &design.pin_swaps[pending[0]];
            return Err(DesignError::PinConflict {
                site: design.sites[swap.site.index()].name.clone(),
                message: format!(
                    "{} pending LUT pin swap(s) but pin swapping is not permitted",
                    pending.len()
                ),
            });
        }

        let mut luts = HashSet::new();
        let mut plans = Vec::with_capacity(pending.len());
        for &idx in &pending {
            let swap = &design.pin_swaps[idx];
            if !luts.insert((swap.site, lut_letter(&swap.bel))) {
                return Err(DesignError::PinConflict {
                    site: design.sites[swap.site.index()].name.clone(),
                    message: format!("more than one pending swap for {}", swap.bel),
                });
            }
            plans.push((idx, self.plan(design, idx)?));
        }
        for (idx, renames) in &plans {
            apply(design, *idx, renames);
        }
        log::info!("Committed {} deferred LUT pin swap(s)", pending.len());
        Ok(pending.len())
    }

    /// Validates one swap and computes the site pin renames it implies.
    fn plan(&self, design: &Design, idx: usize) -> Result<Vec<(PinId, String)>> {
        let swap = &design.pin_swaps[idx];
        let site = &design.sites[swap.site.index()];
        let conflict = |message: String| DesignError::PinConflict {
            site: site.name.clone(),
            message,
        };

        let letter = lut_letter(&swap.bel)
            .ok_or_else(|| conflict(format!("'{}' is not a LUT BEL", swap.bel)))?;

        let mut targets = HashSet::new();
        let mut sources = HashSet::new();
        let mut map = HashMap::new();
        for (from, to) in &swap.mapping {
            for pin in [from, to] {
                match lut_input_class(pin) {
                    Some((l, _)) if l == letter => {}
                    _ => {
                        return Err(conflict(format!(
                            "pin {} is outside the input class of {}",
                            pin, swap.bel
                        )));
                    }
                }
            }
            if !sources.insert(from.as_str()) {
                return Err(conflict(format!("pin {} is remapped twice", from)));
            }
            if !targets.insert(to.as_str()) {
                return Err(conflict(format!(
                    "two sinks would claim physical pin {}",
                    to
                )));
            }
            map.insert(from.as_str(), to.as_str());
        }

        let mut renames = Vec::new();
        let mut claimed: HashMap<String, PinId> = HashMap::new();
        for &pin_id in &site.pins {
            let pin = design.pin(pin_id);
            if pin.direction != PinDirection::Input {
                continue;
            }
            let Some((l, _)) = lut_input_class(&pin.name) else {
                continue;
            };
            if l != letter {
                continue;
            }
            let name = match map.get(pin.name.as_str()) {
                Some(&to) => {
                    renames.push((pin_id, to.to_string()));
                    to.to_string()
                }
                None => pin.name.clone(),
            };
            if let Some(&other) = claimed.get(&name) {
                return Err(conflict(format!(
                    "sinks {} and {} would both claim physical pin {}",
                    design.pin_label(other),
                    design.pin_label(pin_id),
                    name
                )));
            }
            claimed.insert(name, pin_id);
        }

        for (net, pip) in &swap.fake_pips {
            if !design.net(*net).pips.contains(pip) {
                return Err(conflict(format!(
                    "synthetic PIP {} missing from net '{}'",
                    pip,
                    design.net(*net).name
                )));
            }
        }

        Ok(renames)
    }
}

fn apply(design: &mut Design, idx: usize, renames: &[(PinId, String)]) {
    let swap = design.pin_swaps[idx].clone();
    for (pin, name) in renames {
        design.pins[pin.index()].name = name.clone();
    }

    let map: HashMap<&str, &str> = swap
        .mapping
        .iter()
        .map(|(f, t)| (f.as_str(), t.as_str()))
        .collect();
    let letter = lut_letter(&swap.bel);
    for placement in design
        .placements
        .iter_mut()
        .filter(|p| p.site == swap.site && lut_letter(&p.bel) == letter)
    {
        for (_, physical) in placement.pin_map.iter_mut() {
            if let Some(&to) = map.get(physical.as_str()) {
                *physical = to.to_string();
            }
        }
    }

    for (net, pip) in &swap.fake_pips {
        let pips = &mut design.nets[net.index()].pips;
        if let Some(pos) = pips.iter().position(|p| p == pip) {
            pips.remove(pos);
        }
    }

    design.pin_swaps[idx].committed = true;
}
