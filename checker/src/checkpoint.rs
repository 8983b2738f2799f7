use crate::error::Result;
use contest_common::db::core::Design;
use contest_common::db::loader;
use std::path::{Path, PathBuf};

/// Name of the load script inside an upload bundle.
pub const BUNDLE_SCRIPT: &str = "load.tcl";
/// Directory of the encrypted cells inside an upload bundle.
pub const BUNDLE_CELL_DIR: &str = "edn";

/// Tcl that opens a checkpoint in the route status tool. With encrypted
/// cells the checkpoint is read unlinked, the cell definitions are read in
/// and the design is linked afterwards.
pub fn load_script(checkpoint: &str, encrypted_cells: &[String]) -> String {
    if encrypted_cells.is_empty() {
        return format!("open_checkpoint {{{}}}\n", checkpoint);
    }
    let mut script = format!("read_checkpoint {{{}}}\n", checkpoint);
    for cell in encrypted_cells {
        script.push_str(&format!("read_edif {{{}}}\n", cell));
    }
    script.push_str("link_design\n");
    script
}

/// Bundle-relative path of an encrypted cell file.
pub fn bundle_cell_path(cell: &Path) -> String {
    let name = cell
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    format!("{}/{}", BUNDLE_CELL_DIR, name)
}

/// The load script as it must read inside an upload bundle.
pub fn bundle_script(checkpoint_name: &str, encrypted_cells: &[PathBuf]) -> String {
    let cells: Vec<String> = encrypted_cells.iter().map(|c| bundle_cell_path(c)).collect();
    load_script(checkpoint_name, &cells)
}

pub fn write_checkpoint(design: &Design, path: &Path) -> Result<()> {
    log::info!("Writing checkpoint {:?}", path);
    loader::save_checkpoint(design, path)?;
    Ok(())
}
