use contest_common::db::core::Design;
use contest_common::db::indices::{NetId, PinId};
use contest_common::db::lut_pins::{LutPinReconciler, PendingPinSwap, ReconcileMode};
use contest_common::error::DesignError;
use contest_common::util::check::compare_designs;
use contest_common::util::config::RouterConfig;
use contest_common::util::profiler::ScopedTimer;
use std::collections::BTreeSet;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RouteError {
    #[error("Routing incomplete: {unrouted} of {requested} requested nets have no PIPs")]
    RoutingIncomplete { unrouted: usize, requested: usize },

    #[error("Router unavailable: {0}")]
    RouterUnavailable(String),

    #[error("Router failed: {0}")]
    RouterFailed(String),

    #[error("Router modified {0} resource(s) of static or clock nets")]
    ProtectedNetsModified(usize),

    #[error(transparent)]
    Design(#[from] DesignError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Options forwarded to the router.
#[derive(Clone, Debug, PartialEq)]
pub struct RouterArgs {
    pub fix_bounding_box: bool,
    pub use_uturn_nodes: bool,
    pub non_timing_driven: bool,
    pub verbose: bool,
    pub wirelength_weight: f64,
    pub initial_present_congestion_factor: f64,
    pub present_congestion_multiplier: f64,
    pub historical_congestion_factor: f64,
    pub max_iterations: usize,
    pub lut_pin_swapping: bool,
    pub lut_routethru: bool,
}

impl RouterArgs {
    pub fn from_config(config: &RouterConfig) -> Self {
        Self {
            fix_bounding_box: true,
            use_uturn_nodes: true,
            non_timing_driven: true,
            verbose: true,
            wirelength_weight: config.wirelength_weight,
            initial_present_congestion_factor: config.initial_present_congestion_factor,
            present_congestion_multiplier: config.present_congestion_multiplier,
            historical_congestion_factor: config.historical_congestion_factor,
            max_iterations: config.max_iterations,
            lut_pin_swapping: config.lut_pin_swapping,
            lut_routethru: config.lut_routethru,
        }
    }

    /// Command-line rendering for an external router.
    pub fn to_args(&self) -> Vec<String> {
        let mut args = Vec::new();
        let flags = [
            (self.fix_bounding_box, "--fixBoundingBox"),
            (self.use_uturn_nodes, "--useUTurnNodes"),
            (self.non_timing_driven, "--nonTimingDriven"),
            (self.verbose, "--verbose"),
        ];
        for (on, flag) in flags {
            if on {
                args.push(flag.to_string());
            }
        }
        let values = [
            ("--wirelengthWeight", self.wirelength_weight.to_string()),
            (
                "--initialPresentCongestionFactor",
                self.initial_present_congestion_factor.to_string(),
            ),
            (
                "--presentCongestionMultiplier",
                self.present_congestion_multiplier.to_string(),
            ),
            (
                "--historicalCongestionFactor",
                self.historical_congestion_factor.to_string(),
            ),
            ("--maxIterations", self.max_iterations.to_string()),
        ];
        for (flag, value) in values {
            args.push(flag.to_string());
            args.push(value);
        }
        if self.lut_pin_swapping {
            // The router must leave intra-site state alone and report the
            // permutation as pending swaps.
            args.push("--lutPinSwapping".to_string());
            args.push("--deferIntraSiteUpdates".to_string());
            args.push("--simulateSwappedLutPins".to_string());
        }
        if self.lut_routethru {
            args.push("--lutRoutethru".to_string());
        }
        args
    }
}

/// A routing engine. Implementations may only add PIPs to the nets of the
/// requested pins and record pending LUT pin swaps; everything else in the
/// design must come back untouched.
pub trait Router {
    fn name(&self) -> &str;

    fn route(
        &mut self,
        design: &mut Design,
        pins: &[PinId],
        args: &RouterArgs,
    ) -> Result<(), RouteError>;
}

#[derive(Clone, Debug)]
pub struct RouteSummary {
    pub pins_requested: usize,
    pub nets_requested: usize,
    pub pin_swaps: usize,
    pub elapsed: Duration,
}

fn requested_nets(design: &Design, pins: &[PinId]) -> BTreeSet<NetId> {
    pins.iter().map(|&p| design.pin(p).net).collect()
}

/// Routes exactly `pins` and checks the outcome: every requested net must
/// carry PIPs, static and clock nets must be unchanged and, without pin
/// swapping, no pending swap may be left behind.
pub fn route(
    design: &mut Design,
    pins: &[PinId],
    args: &RouterArgs,
    router: &mut dyn Router,
) -> Result<RouteSummary, RouteError> {
    let nets = requested_nets(design, pins);
    log::info!(
        "Routing {} pins on {} nets with '{}'",
        pins.len(),
        nets.len(),
        router.name()
    );
    let before = design.clone();
    let timer = ScopedTimer::new("Routing");

    if !pins.is_empty() {
        router.route(design, pins, args)?;
    }

    let unrouted = nets.iter().filter(|&&n| !design.net(n).has_pips()).count();
    if unrouted > 0 {
        for &n in nets.iter().filter(|&&n| !design.net(n).has_pips()) {
            log::debug!("Unrouted net '{}'", design.net(n).name);
        }
        return Err(RouteError::RoutingIncomplete {
            unrouted,
            requested: nets.len(),
        });
    }

    let diff = compare_designs(&before, design);
    if !diff.is_empty() {
        return Err(RouteError::ProtectedNetsModified(diff.count()));
    }

    if !args.lut_pin_swapping {
        LutPinReconciler::new(ReconcileMode::Strict).reconcile(design)?;
    }

    Ok(RouteSummary {
        pins_requested: pins.len(),
        nets_requested: nets.len(),
        pin_swaps: design.pending_pin_swaps(),
        elapsed: timer.elapsed(),
    })
}

fn missing(what: &str, name: &str) -> RouteError {
    RouteError::Design(DesignError::MissingReference(format!(
        "router output names unknown {} '{}'",
        what, name
    )))
}

/// Copies the wire-level routing and the pending pin swaps of `routed` into
/// `design`, matching nets and sites by name.
pub fn apply_routing(design: &mut Design, routed: &Design) -> Result<(), RouteError> {
    for net in &routed.nets {
        let id = design
            .net_by_name(&net.name)
            .ok_or_else(|| missing("net", &net.name))?;
        if design.net(id).pips != net.pips {
            design.net_mut(id).pips = net.pips.clone();
        }
    }

    for swap in routed.pin_swaps.iter().filter(|s| !s.committed) {
        let site_name = &routed.sites[swap.site.index()].name;
        let site = design
            .site_by_name(site_name)
            .ok_or_else(|| missing("site", site_name))?;
        let mut copy = PendingPinSwap::new(site, &swap.bel);
        copy.mapping = swap.mapping.clone();
        for (net, pip) in &swap.fake_pips {
            let name = &routed.net(*net).name;
            let id = design
                .net_by_name(name)
                .ok_or_else(|| missing("net", name))?;
            copy.fake_pips.push((id, pip.clone()));
        }
        design.pin_swaps.push(copy);
    }
    Ok(())
}
