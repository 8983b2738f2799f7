use crate::db::core::{Design, LogicalNetlist, NetKind};
use crate::db::parser::{TokenReader, logical, open, physical};
use crate::error::{DesignError, Result};
use crate::util::config::LoaderConfig;
use std::fs::{self, File};
use std::io::{BufRead, BufWriter, Write};
use std::path::{Path, PathBuf};

/// Reads both netlists from streams and merges them into one design.
pub fn load<L: BufRead, P: BufRead>(
    logical_stream: L,
    physical_stream: P,
    options: &LoaderConfig,
) -> Result<Design> {
    let netlist = logical::parse(&mut TokenReader::new(logical_stream))?;
    let design = physical::parse(&mut TokenReader::new(physical_stream))?;
    merge(netlist, design, options)
}

/// Reads both netlist files, merges them and attaches any encrypted cells
/// found next to the logical netlist.
pub fn load_files(
    logical_path: &Path,
    physical_path: &Path,
    options: &LoaderConfig,
) -> Result<Design> {
    log::info!("Reading logical netlist: {:?}", logical_path);
    let netlist = logical::read(logical_path)?;
    log::info!("Reading physical netlist: {:?}", physical_path);
    let design = physical::read(physical_path)?;
    let mut design = merge(netlist, design, options)?;
    attach_encrypted_cells(&mut design, logical_path)?;
    Ok(design)
}

/// Combines a physical design with its logical netlist. Every non-static
/// physical net, placed cell and bound cell pin must exist logically.
pub fn merge(
    mut netlist: LogicalNetlist,
    mut design: Design,
    options: &LoaderConfig,
) -> Result<Design> {
    for net in &design.nets {
        match net.kind {
            NetKind::Static(kind) => {
                if options.check_static_net_naming && net.name != kind.net_name() {
                    return Err(DesignError::Format(format!(
                        "static net '{}' should be named '{}'",
                        net.name,
                        kind.net_name()
                    )));
                }
            }
            _ => {
                if !netlist.has_net(&net.name) {
                    return Err(DesignError::MissingReference(format!(
                        "physical net '{}' has no logical net",
                        net.name
                    )));
                }
            }
        }
    }

    for placement in &design.placements {
        let cell_id = match netlist.cell_by_name(&placement.cell) {
            Some(id) => id,
            None if options.create_missing_cells => {
                log::warn!(
                    "Creating logical cell '{}' for placement on {}",
                    placement.cell,
                    placement.bel
                );
                netlist.add_cell(&placement.cell, &placement.bel)
            }
            None => {
                return Err(DesignError::MissingReference(format!(
                    "placed cell '{}' is not in the logical netlist",
                    placement.cell
                )));
            }
        };
        let cell = netlist.cell(cell_id);
        for (logical_pin, _) in &placement.pin_map {
            if cell.pin(logical_pin).is_none() && !options.create_missing_cells {
                return Err(DesignError::MissingReference(format!(
                    "cell '{}' ({}) has no pin '{}'",
                    cell.name, cell.cell_type, logical_pin
                )));
            }
        }
    }

    design.name = netlist.name.clone();
    design.netlist = netlist;
    log::info!(
        "Merged design '{}': {} cells, {} nets, {} sites",
        design.name,
        design.netlist.cells.len(),
        design.num_nets(),
        design.sites.len()
    );
    Ok(design)
}

/// Directory holding the opaque cell definitions of a netlist file.
pub fn encrypted_cell_dir(netlist_path: &Path) -> PathBuf {
    let mut s = netlist_path.as_os_str().to_os_string();
    s.push(".edn");
    PathBuf::from(s)
}

/// Attaches every file in `<netlist>.edn/` as an opaque encrypted cell, by
/// absolute path. Contents are never read. Returns the number attached.
pub fn attach_encrypted_cells(design: &mut Design, netlist_path: &Path) -> Result<usize> {
    let dir = encrypted_cell_dir(netlist_path);
    if !dir.is_dir() {
        return Ok(0);
    }
    let mut blobs = Vec::new();
    for entry in fs::read_dir(&dir)? {
        let entry = entry?;
        if entry.file_type()?.is_file() {
            blobs.push(fs::canonicalize(entry.path())?);
        }
    }
    blobs.sort();
    blobs.retain(|b| !design.netlist.encrypted_cells.contains(b));
    log::info!("Attaching {} encrypted cell(s) from {:?}", blobs.len(), dir);
    let n = blobs.len();
    design.netlist.encrypted_cells.extend(blobs);
    Ok(n)
}

/// Reads the single-file checkpoint form: logical netlist then physical.
pub fn load_checkpoint(path: &Path, options: &LoaderConfig) -> Result<Design> {
    log::info!("Reading checkpoint: {:?}", path);
    let mut reader = TokenReader::new(open(path)?);
    let netlist = logical::parse(&mut reader)?;
    let design = physical::parse(&mut reader)?;
    merge(netlist, design, options)
}

pub fn save_checkpoint(design: &Design, path: &Path) -> Result<()> {
    let mut file = BufWriter::new(File::create(path)?);
    logical::write(&design.netlist, &mut file)?;
    physical::write(design, &mut file)?;
    file.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const LOGICAL: &str = "\
LOGNETLIST 1
DESIGN top
CELL lut0 LUT1
  PIN O OUT n1
CELL lut1 LUT1
  PIN I0 IN n1
END
";

    const PHYSICAL: &str = "\
PHYSNETLIST 1
SITE S0 SLICEL
SITE S1 SLICEL
PLACE lut0 S0 A6LUT O:A_O
PLACE lut1 S1 A6LUT I0:A1
NET n1 SIGNAL
  SOURCE S0 A_O
  SINK S1 A1
END NET
NET GLOBAL_LOGIC0 GND
END NET
END
";

    #[test]
    fn test_load_merges_netlists() {
        let design = load(
            Cursor::new(LOGICAL),
            Cursor::new(PHYSICAL),
            &LoaderConfig::default(),
        )
        .unwrap();
        assert_eq!(design.name, "top");
        assert_eq!(design.netlist.cells.len(), 2);
        assert_eq!(design.num_nets(), 2);
    }

    #[test]
    fn test_binary_input_is_format_error() {
        let binary: &[u8] = &[0x00, 0xff, 0xfe, 0x81, b'\n'];
        let err = load(
            Cursor::new(binary),
            Cursor::new(PHYSICAL),
            &LoaderConfig::default(),
        )
        .unwrap_err();
        assert!(matches!(err, DesignError::Format(_)));

        let err = load(
            Cursor::new(LOGICAL),
            Cursor::new(binary),
            &LoaderConfig::default(),
        )
        .unwrap_err();
        assert!(matches!(err, DesignError::Format(_)));
    }

    #[test]
    fn test_static_net_naming_check() {
        let options = LoaderConfig {
            check_static_net_naming: true,
            ..LoaderConfig::default()
        };
        let err = load(Cursor::new(LOGICAL), Cursor::new(PHYSICAL), &options).unwrap_err();
        assert!(matches!(err, DesignError::Format(_)));
    }

    #[test]
    fn test_unknown_net_is_missing_reference() {
        let physical = PHYSICAL.replace("NET n1 SIGNAL", "NET n9 SIGNAL");
        let err = load(
            Cursor::new(LOGICAL),
            Cursor::new(physical),
            &LoaderConfig::default(),
        )
        .unwrap_err();
        assert!(matches!(err, DesignError::MissingReference(_)));
    }

    #[test]
    fn test_unknown_cell_pin_is_missing_reference() {
        let physical = PHYSICAL.replace("I0:A1", "I3:A1");
        let err = load(
            Cursor::new(LOGICAL),
            Cursor::new(physical),
            &LoaderConfig::default(),
        )
        .unwrap_err();
        assert!(err.to_string().contains("no pin 'I3'"));
    }

    #[test]
    fn test_missing_cell_created_when_allowed() {
        let physical = PHYSICAL.replace("PLACE lut1", "PLACE lut7");
        let options = LoaderConfig {
            create_missing_cells: true,
            ..LoaderConfig::default()
        };
        let design = load(Cursor::new(LOGICAL), Cursor::new(physical), &options).unwrap();
        assert!(design.netlist.cell_by_name("lut7").is_some());
    }

    #[test]
    fn test_attach_encrypted_cells() {
        let dir = tempfile::tempdir().unwrap();
        let netlist = dir.path().join("design.netlist");
        let edn = encrypted_cell_dir(&netlist);
        fs::create_dir(&edn).unwrap();
        fs::write(edn.join("b.edn"), "opaque").unwrap();
        fs::write(edn.join("a.edn"), "opaque").unwrap();

        let mut design = Design::default();
        assert_eq!(attach_encrypted_cells(&mut design, &netlist).unwrap(), 2);
        assert!(design.has_encrypted_cells());
        assert!(design.netlist.encrypted_cells.iter().all(|p| p.is_absolute()));
        assert!(design.netlist.encrypted_cells[0].ends_with("a.edn"));
        assert_eq!(attach_encrypted_cells(&mut design, &netlist).unwrap(), 0);
        assert_eq!(design.netlist.encrypted_cells.len(), 2);
    }

    #[test]
    fn test_no_encrypted_dir() {
        let dir = tempfile::tempdir().unwrap();
        let mut design = Design::default();
        let n = attach_encrypted_cells(&mut design, &dir.path().join("x.netlist")).unwrap();
        assert_eq!(n, 0);
        assert!(!design.has_encrypted_cells());
    }

    #[test]
    fn test_checkpoint_round_trip() {
        let design = load(
            Cursor::new(LOGICAL),
            Cursor::new(PHYSICAL),
            &LoaderConfig::default(),
        )
        .unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("top.dcp");
        save_checkpoint(&design, &path).unwrap();
        let again = load_checkpoint(&path, &LoaderConfig::default()).unwrap();
        assert_eq!(again.name, "top");
        assert_eq!(again.placements, design.placements);
    }
}
