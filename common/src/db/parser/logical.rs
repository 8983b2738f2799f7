use crate::db::core::{LogicalNetlist, PortDirection};
use crate::db::parser::{TokenReader, field, open};
use crate::error::Result;
use std::fs::File;
use std::io::{BufRead, BufWriter, Write};
use std::path::Path;

pub const MAGIC: &str = "LOGNETLIST";
pub const VERSION: &str = "1";

pub fn read(path: &Path) -> Result<LogicalNetlist> {
    let mut reader = TokenReader::new(open(path)?);
    parse(&mut reader)
}

/// Parses one logical netlist up to and including its `END` record.
pub fn parse<R: BufRead>(reader: &mut TokenReader<R>) -> Result<LogicalNetlist> {
    reader.expect_magic(MAGIC, VERSION)?;

    let mut netlist = LogicalNetlist::default();
    let mut current_cell = None;

    while let Some(parts) = reader.next_record()? {
        match parts[0].as_str() {
            "DESIGN" => {
                netlist.name = field(reader, &parts, 1)?.to_string();
            }
            "NET" => {
                netlist.add_net(field(reader, &parts, 1)?);
                current_cell = None;
            }
            "PORT" => {
                let name = field(reader, &parts, 1)?;
                let dir = field(reader, &parts, 2)?;
                let net = field(reader, &parts, 3)?;
                let direction = PortDirection::from_keyword(dir)
                    .ok_or_else(|| reader.error(format!("bad port direction '{}'", dir)))?;
                netlist.add_port(name, direction, net);
                current_cell = None;
            }
            "CELL" => {
                let name = field(reader, &parts, 1)?;
                let cell_type = field(reader, &parts, 2)?;
                if netlist.cell_by_name(name).is_some() {
                    return Err(reader.error(format!("duplicate cell '{}'", name)));
                }
                current_cell = Some(netlist.add_cell(name, cell_type));
            }
            "PIN" => {
                let Some(cell) = current_cell else {
                    return Err(reader.error("PIN outside of CELL"));
                };
                let name = field(reader, &parts, 1)?;
                let dir = field(reader, &parts, 2)?;
                let net = field(reader, &parts, 3)?;
                let direction = PortDirection::from_keyword(dir)
                    .ok_or_else(|| reader.error(format!("bad pin direction '{}'", dir)))?;
                netlist.connect(cell, name, direction, net);
            }
            "ENCRYPTED" => {
                let path = field(reader, &parts, 1)?;
                netlist.encrypted_cells.push(path.into());
                current_cell = None;
            }
            "END" => return Ok(netlist),
            other => return Err(reader.error(format!("unknown record '{}'", other))),
        }
    }

    Err(reader.error("unexpected end of logical netlist"))
}

pub fn save(netlist: &LogicalNetlist, filename: &Path) -> Result<()> {
    let mut file = BufWriter::new(File::create(filename)?);
    write(netlist, &mut file)?;
    file.flush()?;
    Ok(())
}

pub fn write<W: Write>(netlist: &LogicalNetlist, out: &mut W) -> Result<()> {
    writeln!(out, "{} {}", MAGIC, VERSION)?;
    writeln!(out, "DESIGN {}", netlist.name)?;
    for net in &netlist.nets {
        writeln!(out, "NET {}", net)?;
    }
    for port in &netlist.ports {
        writeln!(
            out,
            "PORT {} {} {}",
            port.name,
            port.direction.keyword(),
            port.net
        )?;
    }
    for cell in &netlist.cells {
        writeln!(out, "CELL {} {}", cell.name, cell.cell_type)?;
        for pin in &cell.pins {
            writeln!(
                out,
                "  PIN {} {} {}",
                pin.name,
                pin.direction.keyword(),
                pin.net
            )?;
        }
    }
    for path in &netlist.encrypted_cells {
        writeln!(out, "ENCRYPTED {}", path.display())?;
    }
    writeln!(out, "END")?;
    Ok(())
}
