use crate::checkpoint::write_checkpoint;
use crate::error::Result;
use crate::local::LocalOracle;
use crate::remote::RemoteOracle;
use crate::report::RouteStatusResult;
use contest_common::db::core::Design;
use contest_common::util::config::OracleConfig;
use std::path::Path;

/// Source of the routing-completeness verdict, picked once per run: the
/// remote service when an endpoint URL is configured, the local tool
/// otherwise.
pub enum RouteStatusOracle {
    Local(LocalOracle),
    Remote(RemoteOracle),
}

impl RouteStatusOracle {
    pub fn from_config(config: &OracleConfig) -> Result<Self> {
        if config.url.as_deref().is_some_and(|u| !u.is_empty()) {
            let remote = RemoteOracle::new(config)?;
            log::info!("Using remote route status service {}", remote.url());
            Ok(Self::Remote(remote))
        } else {
            log::info!("Using local route status tool '{}'", config.tool);
            Ok(Self::Local(LocalOracle::new(&config.tool)))
        }
    }

    /// Writes `design` to `checkpoint` and asks for its route status.
    pub fn check(&self, design: &Design, checkpoint: &Path) -> Result<RouteStatusResult> {
        write_checkpoint(design, checkpoint)?;
        let cells = &design.netlist.encrypted_cells;
        match self {
            Self::Local(oracle) => oracle.check(checkpoint, cells),
            Self::Remote(oracle) => oracle.check(checkpoint, cells),
        }
    }
}
