use anyhow::{Context, Result, anyhow};
use contest_checker::RouteStatusOracle;
use contest_common::db::core::Design;
use contest_common::db::indices::NetId;
use contest_common::db::loader;
use contest_common::db::lut_pins::{LutPinReconciler, ReconcileMode};
use contest_common::db::parser::{logical, physical};
use contest_common::util::check::compare_designs;
use contest_common::util::config::Config;
use contest_common::util::generator::{GeneratorParams, generate_reference_design};
use contest_common::util::profiler::ScopedTimer;
use contest_common::util::score;
use contest_router::driver::{RouteSummary, Router};
use contest_router::{route_design, selector};
use std::fs;
use std::path::{Path, PathBuf};

fn sibling(path: &Path, ext: &str) -> PathBuf {
    path.with_extension(ext)
}

/// Turns a placed and routed reference checkpoint into the contest starting
/// point: every net that is neither static nor clock loses its PIPs.
pub fn run_seed(config: &Config, input: &Path, out_logical: &Path, out_physical: &Path) -> Result<()> {
    let _timer = ScopedTimer::new("Seed");
    let mut design = loader::load_checkpoint(input, &config.loader)
        .with_context(|| format!("Failed to load reference design {:?}", input))?;
    loader::attach_encrypted_cells(&mut design, input)?;

    let created = design.create_missing_site_pins();
    log::info!("Created {} missing site pins", created);
    selector::discover_alternate_sources(&mut design);

    let mut unrouted = 0;
    for i in 0..design.num_nets() {
        let id = NetId::new(i);
        let net = design.net(id);
        if net.is_static() || net.is_clock() {
            continue;
        }
        if net.has_pips() {
            unrouted += 1;
        }
        design.unroute_net(id);
    }
    log::info!("Unrouted {} of {} nets", unrouted, design.num_nets());

    log::info!("Writing physical netlist {:?}", out_physical);
    physical::save(&design, out_physical)?;
    log::info!("Writing logical netlist {:?}", out_logical);
    logical::save(&design.netlist, out_logical)?;
    Ok(())
}

/// Routes the unrouted nets of a physical netlist and writes the result.
pub fn run_route(
    config: &Config,
    input: &Path,
    output: &Path,
    router: &mut dyn Router,
) -> Result<RouteSummary> {
    let mut design = physical::read(input)
        .with_context(|| format!("Failed to read physical netlist {:?}", input))?;
    let summary = route_design(&mut design, &config.router, router)?;
    log::info!(
        "Routed {} pins on {} nets, {} pending LUT pin swap(s)",
        summary.pins_requested,
        summary.nets_requested,
        summary.pin_swaps
    );
    physical::save(&design, output)?;
    println!("Wall-clock time (sec): {:.2}", summary.elapsed.as_secs_f64());
    Ok(summary)
}

/// Number of differences on static and clock nets, or the configured mock.
fn count_diffs(config: &Config, routed: &Design, unrouted: &Path) -> Result<usize> {
    if let Some(mock) = config.verify.diff_mock_result {
        log::warn!(
            "Skipping static/clock net comparison, reporting {} difference(s)",
            mock
        );
        return Ok(mock);
    }
    if !unrouted.exists() {
        return Err(anyhow!(
            "Unrouted reference netlist missing: {:?}",
            unrouted
        ));
    }
    let reference = physical::read(unrouted)
        .with_context(|| format!("Failed to read unrouted netlist {:?}", unrouted))?;
    let report = compare_designs(&reference, routed);
    if !report.is_empty() {
        print!("{}", report);
    }
    Ok(report.count())
}

/// Full check of a routed submission. Returns the verdict and records it in
/// `<routed>.check`.
pub fn run_verify(config: &Config, netlist: &Path, routed: &Path, unrouted: &Path) -> Result<bool> {
    let _timer = ScopedTimer::new("Verify");
    let oracle = RouteStatusOracle::from_config(&config.oracle)?;

    let netlist_data = logical::read(netlist)
        .with_context(|| format!("Failed to read logical netlist {:?}", netlist))?;
    let routed_design = physical::read(routed)
        .with_context(|| format!("Failed to read physical netlist {:?}", routed))?;

    let diffs = count_diffs(config, &routed_design, unrouted)?;

    let mut design = loader::merge(netlist_data, routed_design, &config.loader)?;
    loader::attach_encrypted_cells(&mut design, netlist)?;

    LutPinReconciler::new(ReconcileMode::PinSwapEnabled).reconcile(&mut design)?;

    let status = oracle.check(&design, &sibling(routed, "dcp"))?;
    let fully_routed = status.is_fully_routed();
    let passed = diffs == 0 && status.logical_nets > 0 && fully_routed;

    if passed {
        log::info!("\x1b[32mPASS\x1b[0m: {:?}", routed);
    } else {
        log::error!(
            "\x1b[31mFAIL\x1b[0m: {:?} (differences: {}, logical nets: {}, fully routed: {})",
            routed,
            diffs,
            status.logical_nets,
            fully_routed
        );
    }

    if config.verify.write_check_file {
        let check = sibling(routed, "check");
        fs::write(&check, if passed { "PASS\n" } else { "FAIL\n" })?;
    }
    Ok(passed)
}

/// Compares static and clock nets of two physical netlists.
pub fn run_diff(routed: &Path, unrouted: &Path) -> Result<bool> {
    let routed = physical::read(routed)?;
    let unrouted = physical::read(unrouted)?;
    let report = compare_designs(&unrouted, &routed);
    if report.is_empty() {
        println!("INFO: No differences found between routed and unrouted netlists");
    } else {
        print!("{}", report);
    }
    Ok(report.is_empty())
}

pub fn print_nets(path: &Path, names: &[String]) -> Result<()> {
    let design = physical::read(path)?;
    let rule = "=".repeat(60);
    for name in names {
        let Some(id) = design.net_by_name(name) else {
            log::warn!("Net '{}' not found in {:?}", name, path);
            continue;
        };
        let net = design.net(id);
        println!("{}", rule);
        println!("Net: {} ({})", net.name, net.kind.keyword());
        if let Some(src) = net.source {
            println!("  Source: {}", design.pin_label(src));
        }
        if let Some(alt) = net.alt_source {
            println!("  Alternate source: {}", design.pin_label(alt));
        }
        for &sink in &net.sinks {
            println!("  Sink: {}", design.pin_label(sink));
        }
        for pip in &net.pips {
            println!("  PIP: {}", pip);
        }
    }
    println!("{}", rule);
    Ok(())
}

pub fn print_scores(benches: &[PathBuf]) {
    let results: Vec<_> = benches.iter().map(|b| score::read_benchmark(b)).collect();
    print!("{}", score::format_table(&results));
}

pub fn run_generate(params: &GeneratorParams, output: &Path) -> Result<()> {
    let design = generate_reference_design(params);
    loader::save_checkpoint(&design, output)?;
    log::info!("Generated: {:?}", output);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use contest_common::db::core::Pip;
    use contest_common::db::indices::PinId;
    use contest_common::util::config::LoaderConfig;
    use contest_router::driver::{RouteError, RouterArgs};
    use std::collections::BTreeSet;

    /// Replays the routing of a reference design, net by net.
    struct ReplayRouter {
        reference: Design,
    }

    impl Router for ReplayRouter {
        fn name(&self) -> &str {
            "replay"
        }

        fn route(
            &mut self,
            design: &mut Design,
            pins: &[PinId],
            _args: &RouterArgs,
        ) -> std::result::Result<(), RouteError> {
            let nets: BTreeSet<_> = pins.iter().map(|&p| design.pin(p).net).collect();
            for id in nets {
                let name = design.net(id).name.clone();
                let Some(r) = self.reference.net_by_name(&name) else {
                    continue;
                };
                design.net_mut(id).pips = self.reference.net(r).pips.clone();
            }
            Ok(())
        }
    }

    struct Bench {
        dir: tempfile::TempDir,
        reference: Design,
    }

    impl Bench {
        fn path(&self, name: &str) -> PathBuf {
            self.dir.path().join(name)
        }
    }

    /// Reference checkpoint plus its seeded logical and physical netlists.
    fn seeded() -> Bench {
        let dir = tempfile::tempdir().unwrap();
        let reference = generate_reference_design(&GeneratorParams::default());
        let bench = Bench { dir, reference };
        loader::save_checkpoint(&bench.reference, &bench.path("ref.dcp")).unwrap();
        run_seed(
            &Config::default(),
            &bench.path("ref.dcp"),
            &bench.path("design.netlist"),
            &bench.path("design.phys"),
        )
        .unwrap();
        bench
    }

    #[cfg(unix)]
    fn fake_tool(dir: &Path, logical_nets: usize) -> String {
        use std::os::unix::fs::PermissionsExt;

        let tool = dir.join("fake-vivado");
        fs::write(
            &tool,
            format!(
                "#!/bin/sh\n\
                 echo '# of logical nets.......... : {} :'\n\
                 echo '# of routable nets......... : 8 :'\n\
                 echo '# of fully routed nets..... : 8 :'\n",
                logical_nets
            ),
        )
        .unwrap();
        fs::set_permissions(&tool, fs::Permissions::from_mode(0o755)).unwrap();
        tool.display().to_string()
    }

    #[test]
    fn test_seed_unroutes_signal_nets_only() {
        let bench = seeded();
        let seeded = physical::read(&bench.path("design.phys")).unwrap();
        assert_eq!(seeded.num_nets(), 10);
        let statics: Vec<_> = seeded.nets.iter().filter(|n| n.is_static()).collect();
        assert_eq!(statics.len(), 2);
        assert!(statics.iter().all(|n| n.has_pips()));
        let signals: Vec<_> = seeded.nets.iter().filter(|n| !n.is_static()).collect();
        assert_eq!(signals.len(), 8);
        assert!(signals.iter().all(|n| !n.has_pips()));
        // Every generated driver sits on an A LUT with its mux output free.
        assert!(signals.iter().all(|n| n.alt_source.is_some()));

        let netlist = logical::read(&bench.path("design.netlist")).unwrap();
        assert_eq!(netlist.name, "generated");
    }

    #[test]
    fn test_route_restores_reference_routing() {
        let bench = seeded();
        let mut router = ReplayRouter {
            reference: bench.reference.clone(),
        };
        let summary = run_route(
            &Config::default(),
            &bench.path("design.phys"),
            &bench.path("routed.phys"),
            &mut router,
        )
        .unwrap();
        assert_eq!(summary.nets_requested, 8);

        let routed = physical::read(&bench.path("routed.phys")).unwrap();
        assert!(routed.nets.iter().all(|n| n.has_pips()));
        assert!(run_diff(&bench.path("routed.phys"), &bench.path("design.phys")).unwrap());
    }

    #[test]
    fn test_diff_detects_static_change() {
        let bench = seeded();
        let mut tampered = physical::read(&bench.path("design.phys")).unwrap();
        let gnd = tampered.net_by_name("GND").unwrap();
        tampered
            .net_mut(gnd)
            .pips
            .push(Pip::new("INT_X0Y0", "GND_WIRE", "EXTRA"));
        physical::save(&tampered, &bench.path("tampered.phys")).unwrap();
        assert!(!run_diff(&bench.path("tampered.phys"), &bench.path("design.phys")).unwrap());
    }

    #[test]
    fn test_verify_requires_unrouted_reference() {
        let bench = seeded();
        let mut config = Config::default();
        config.oracle.tool = "/nonexistent/vivado".to_string();
        let err = run_verify(
            &config,
            &bench.path("design.netlist"),
            &bench.path("design.phys"),
            &bench.path("missing.phys"),
        )
        .unwrap_err();
        assert!(err.to_string().contains("missing"));
    }

    #[cfg(unix)]
    #[test]
    fn test_seed_route_verify_round_trip() {
        let bench = seeded();
        let mut router = ReplayRouter {
            reference: bench.reference.clone(),
        };
        let mut config = Config::default();
        run_route(
            &config,
            &bench.path("design.phys"),
            &bench.path("routed.phys"),
            &mut router,
        )
        .unwrap();

        config.oracle.tool = fake_tool(bench.dir.path(), 10);
        let passed = run_verify(
            &config,
            &bench.path("design.netlist"),
            &bench.path("routed.phys"),
            &bench.path("design.phys"),
        )
        .unwrap();
        assert!(passed);
        assert_eq!(fs::read_to_string(bench.path("routed.check")).unwrap(), "PASS\n");
        assert!(bench.path("routed.dcp").exists());
        let dcp = loader::load_checkpoint(&bench.path("routed.dcp"), &LoaderConfig::default())
            .unwrap();
        assert_eq!(dcp.name, "generated");
    }

    #[cfg(unix)]
    #[test]
    fn test_verify_fails_without_logical_nets() {
        let bench = seeded();
        let mut config = Config::default();
        config.verify.diff_mock_result = Some(0);
        config.oracle.tool = fake_tool(bench.dir.path(), 0);
        let passed = run_verify(
            &config,
            &bench.path("design.netlist"),
            &bench.path("design.phys"),
            &bench.path("does-not-exist.phys"),
        )
        .unwrap();
        assert!(!passed);
        assert_eq!(fs::read_to_string(bench.path("design.check")).unwrap(), "FAIL\n");
    }

    #[cfg(unix)]
    #[test]
    fn test_verify_fails_on_mocked_diffs() {
        let bench = seeded();
        let mut config = Config::default();
        config.verify.diff_mock_result = Some(3);
        config.oracle.tool = fake_tool(bench.dir.path(), 10);
        let passed = run_verify(
            &config,
            &bench.path("design.netlist"),
            &bench.path("design.phys"),
            &bench.path("design.phys"),
        )
        .unwrap();
        assert!(!passed);
    }
}
