use crate::driver::{RouteError, Router, RouterArgs, apply_routing};
use contest_common::db::core::Design;
use contest_common::db::indices::PinId;
use contest_common::db::parser::physical;
use contest_common::util::config::RouterConfig;
use std::fs::File;
use std::io::{BufWriter, ErrorKind, Write};
use std::path::Path;
use std::process::Command;

/// Runs a router executable on a scratch copy of the physical netlist:
///
/// `<command> <input.phys> <output.phys> --pins <pins.txt> <router args>`
///
/// The pins file lists one `SITE PIN` pair per line. Routing and pending pin
/// swaps are read back from the output netlist.
pub struct ExternalRouter {
    program: String,
    leading_args: Vec<String>,
}

impl ExternalRouter {
    pub fn from_config(config: &RouterConfig) -> Result<Self, RouteError> {
        let (program, rest) = config.command.split_first().ok_or_else(|| {
            RouteError::RouterUnavailable("no router command configured".to_string())
        })?;
        Ok(Self {
            program: program.clone(),
            leading_args: rest.to_vec(),
        })
    }
}

fn write_pins(design: &Design, pins: &[PinId], path: &Path) -> std::io::Result<()> {
    let mut out = BufWriter::new(File::create(path)?);
    for &p in pins {
        let pin = design.pin(p);
        writeln!(out, "{} {}", design.sites[pin.site.index()].name, pin.name)?;
    }
    out.flush()
}

impl Router for ExternalRouter {
    fn name(&self) -> &str {
        &self.program
    }

    fn route(
        &mut self,
        design: &mut Design,
        pins: &[PinId],
        args: &RouterArgs,
    ) -> Result<(), RouteError> {
        let scratch = tempfile::tempdir()?;
        let input = scratch.path().join("input.phys");
        let output = scratch.path().join("routed.phys");
        let pin_file = scratch.path().join("pins.txt");
        physical::save(design, &input)?;
        write_pins(design, pins, &pin_file)?;

        let mut cmd = Command::new(&self.program);
        cmd.args(&self.leading_args)
            .arg(&input)
            .arg(&output)
            .arg("--pins")
            .arg(&pin_file)
            .args(args.to_args());
        log::info!("Running {:?}", cmd);

        let status = match cmd.status() {
            Ok(status) => status,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(RouteError::RouterUnavailable(format!(
                    "'{}' not found",
                    self.program
                )));
            }
            Err(e) => return Err(e.into()),
        };
        if !status.success() {
            return Err(RouteError::RouterFailed(format!(
                "'{}' exited with {}",
                self.program, status
            )));
        }

        let routed = physical::read(&output)?;
        apply_routing(design, &routed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contest_common::db::core::NetKind;

    fn design() -> (Design, Vec<PinId>) {
        let mut d = Design::new("xcvu3p");
        let s0 = d.add_site("S0", "SLICEL");
        let s1 = d.add_site("S1", "SLICEL");
        let n = d.add_net("n0", NetKind::Signal);
        d.set_source(n, s0, "A_O");
        let pin = d.add_sink(n, s1, "A1");
        (d, vec![pin])
    }

    #[test]
    fn test_missing_program() {
        let (mut d, pins) = design();
        let config = RouterConfig {
            command: vec!["/nonexistent/router-binary".to_string()],
            ..RouterConfig::default()
        };
        let mut router = ExternalRouter::from_config(&config).unwrap();
        let args = RouterArgs::from_config(&config);
        let err = router.route(&mut d, &pins, &args).unwrap_err();
        assert!(matches!(err, RouteError::RouterUnavailable(_)));
    }

    #[test]
    fn test_empty_command() {
        assert!(matches!(
            ExternalRouter::from_config(&RouterConfig::default()),
            Err(RouteError::RouterUnavailable(_))
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_script_router() {
        // `sh -c <script> <argv0> input output ...`: copies the input and
        // appends a PIP to the routed net.
        let script = r#"awk '{ print } $1 == "SINK" && $3 == "A1" { print "  PIP INT_X0Y0 A_O A1" }' "$1" > "$2""#;
        let config = RouterConfig {
            command: vec![
                "sh".to_string(),
                "-c".to_string(),
                script.to_string(),
                "router".to_string(),
            ],
            ..RouterConfig::default()
        };
        let mut router = ExternalRouter::from_config(&config).unwrap();
        let (mut d, pins) = design();
        let args = RouterArgs::from_config(&config);
        router.route(&mut d, &pins, &args).unwrap();
        let n = d.net_by_name("n0").unwrap();
        assert_eq!(d.net(n).pips.len(), 1);
        assert_eq!(d.net(n).pips[0].wire1, "A1");
    }

    #[cfg(unix)]
    #[test]
    fn test_failing_router() {
        let config = RouterConfig {
            command: vec!["false".to_string()],
            ..RouterConfig::default()
        };
        let mut router = ExternalRouter::from_config(&config).unwrap();
        let (mut d, pins) = design();
        let err = router
            .route(&mut d, &pins, &RouterArgs::from_config(&config))
            .unwrap_err();
        assert!(matches!(err, RouteError::RouterFailed(_)));
    }
}
