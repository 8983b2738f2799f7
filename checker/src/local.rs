use crate::checkpoint::load_script;
use crate::error::{OracleError, Result};
use crate::report::{self, RouteStatusResult};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Runs the vendor tool in batch mode on a checkpoint.
pub struct LocalOracle {
    tool: String,
}

impl LocalOracle {
    pub fn new(tool: &str) -> Self {
        Self {
            tool: tool.to_string(),
        }
    }

    pub fn tool(&self) -> &str {
        &self.tool
    }

    pub fn check(&self, checkpoint: &Path, encrypted_cells: &[PathBuf]) -> Result<RouteStatusResult> {
        let cells: Vec<String> = encrypted_cells
            .iter()
            .map(|c| c.display().to_string())
            .collect();
        let mut script = load_script(&checkpoint.display().to_string(), &cells);
        script.push_str("report_route_status\nexit\n");
        let script_path = checkpoint.with_extension("tcl");
        fs::write(&script_path, script)?;

        let mut cmd = Command::new(&self.tool);
        cmd.args(["-mode", "batch", "-nolog", "-nojournal", "-source"])
            .arg(&script_path);
        log::info!("Running {:?}", cmd);

        let output = match cmd.output() {
            Ok(output) => output,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(OracleError::ToolNotFound(self.tool.clone()));
            }
            Err(e) => return Err(e.into()),
        };
        let stdout = String::from_utf8_lossy(&output.stdout);
        log::debug!("{}", stdout);
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(OracleError::Tool(format!(
                "'{}' exited with {}: {}",
                self.tool,
                output.status,
                stderr.trim()
            )));
        }
        report::parse(&stdout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_tool() {
        let dir = tempfile::tempdir().unwrap();
        let dcp = dir.path().join("d.dcp");
        fs::write(&dcp, "").unwrap();
        let oracle = LocalOracle::new("/nonexistent/vivado");
        assert!(matches!(
            oracle.check(&dcp, &[]),
            Err(OracleError::ToolNotFound(_))
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_fake_tool() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let tool = dir.path().join("vivado");
        fs::write(
            &tool,
            "#!/bin/sh\n\
             grep -q report_route_status \"$6\" || exit 3\n\
             echo '   # of logical nets.......... :   4 :'\n\
             echo '       # of routable nets..... :   3 :'\n\
             echo '       # of fully routed nets. :   3 :'\n",
        )
        .unwrap();
        fs::set_permissions(&tool, fs::Permissions::from_mode(0o755)).unwrap();

        let dcp = dir.path().join("d.dcp");
        fs::write(&dcp, "").unwrap();
        let oracle = LocalOracle::new(&tool.display().to_string());
        let result = oracle.check(&dcp, &[]).unwrap();
        assert_eq!(result.logical_nets, 4);
        assert!(result.is_fully_routed());
        assert!(dir.path().join("d.tcl").exists());
    }
}
