use crate::db::core::{Design, NetKind, PinDirection, Pip, Placement, SitePip};
use crate::db::indices::{NetId, SiteId};
use crate::db::lut_pins::PendingPinSwap;
use crate::db::parser::{TokenReader, field, open};
use crate::error::Result;
use std::fs::File;
use std::io::{BufRead, BufWriter, Write};
use std::path::Path;

pub const MAGIC: &str = "PHYSNETLIST";
pub const VERSION: &str = "1";

enum Block {
    Top,
    Net(NetId),
    Swap(usize),
}

pub fn read(path: &Path) -> Result<Design> {
    let mut reader = TokenReader::new(open(path)?);
    parse(&mut reader)
}

/// Parses one physical netlist up to and including its final `END` record.
/// The returned design carries no logical netlist yet.
pub fn parse<R: BufRead>(reader: &mut TokenReader<R>) -> Result<Design> {
    reader.expect_magic(MAGIC, VERSION)?;

    let mut design = Design::default();
    let mut block = Block::Top;

    while let Some(parts) = reader.next_record()? {
        match (parts[0].as_str(), &block) {
            ("PART", Block::Top) => {
                design.part = field(reader, &parts, 1)?.to_string();
            }
            ("SITE", Block::Top) => {
                let name = field(reader, &parts, 1)?;
                let site_type = field(reader, &parts, 2)?;
                design.add_site(name, site_type);
            }
            ("SITEPIP", Block::Top) => {
                let site = lookup_site(reader, &design, field(reader, &parts, 1)?)?;
                let pip = SitePip {
                    bel: field(reader, &parts, 2)?.to_string(),
                    input: field(reader, &parts, 3)?.to_string(),
                };
                design.sites[site.index()].site_pips.push(pip);
            }
            ("PLACE", Block::Top) => {
                let cell = field(reader, &parts, 1)?.to_string();
                let site = lookup_site(reader, &design, field(reader, &parts, 2)?)?;
                let bel = field(reader, &parts, 3)?.to_string();
                let mut pin_map = Vec::new();
                for binding in &parts[4..] {
                    let (logical, physical) = binding
                        .split_once(':')
                        .ok_or_else(|| reader.error(format!("bad pin binding '{}'", binding)))?;
                    pin_map.push((logical.to_string(), physical.to_string()));
                }
                design.placements.push(Placement {
                    cell,
                    site,
                    bel,
                    pin_map,
                });
            }
            ("NET", Block::Top) => {
                let name = field(reader, &parts, 1)?;
                let kw = field(reader, &parts, 2)?;
                let kind = NetKind::from_keyword(kw)
                    .ok_or_else(|| reader.error(format!("bad net kind '{}'", kw)))?;
                if design.net_by_name(name).is_some() {
                    return Err(reader.error(format!("duplicate net '{}'", name)));
                }
                block = Block::Net(design.add_net(name, kind));
            }
            ("SOURCE" | "ALTSOURCE" | "SINK", Block::Net(net)) => {
                let net = *net;
                let site = lookup_site(reader, &design, field(reader, &parts, 1)?)?;
                let pin_name = field(reader, &parts, 2)?;
                if design.pin_on_site(site, pin_name).is_some() {
                    return Err(reader.error(format!(
                        "site pin {}.{} is already in use",
                        design.sites[site.index()].name,
                        pin_name
                    )));
                }
                let taken = match parts[0].as_str() {
                    "SOURCE" => design.nets[net.index()].source.is_some(),
                    "ALTSOURCE" => design.nets[net.index()].alt_source.is_some(),
                    _ => false,
                };
                if taken {
                    return Err(reader.error(format!("second {} on net", parts[0])));
                }
                match parts[0].as_str() {
                    "SOURCE" => {
                        design.set_source(net, site, pin_name);
                    }
                    "ALTSOURCE" => {
                        let pin = design.alloc_pin(site, pin_name, net, PinDirection::Output);
                        design.nets[net.index()].alt_source = Some(pin);
                        design.register_site_pin(pin);
                    }
                    _ => {
                        design.add_sink(net, site, pin_name);
                    }
                }
            }
            ("PIP", Block::Net(net)) => {
                let pip = parse_pip(reader, &parts, 1)?;
                design.nets[net.index()].pips.push(pip);
            }
            ("PINSWAP", Block::Top) => {
                let site = lookup_site(reader, &design, field(reader, &parts, 1)?)?;
                let bel = field(reader, &parts, 2)?.to_string();
                design.pin_swaps.push(PendingPinSwap::new(site, &bel));
                block = Block::Swap(design.pin_swaps.len() - 1);
            }
            ("MAP", Block::Swap(idx)) => {
                let from = field(reader, &parts, 1)?.to_string();
                let to = field(reader, &parts, 2)?.to_string();
                design.pin_swaps[*idx].mapping.push((from, to));
            }
            ("FAKE", Block::Swap(idx)) => {
                let idx = *idx;
                let net_name = field(reader, &parts, 1)?;
                let net = design
                    .net_by_name(net_name)
                    .ok_or_else(|| reader.error(format!("unknown net '{}'", net_name)))?;
                let pip = parse_pip(reader, &parts, 2)?;
                if !design.nets[net.index()].pips.contains(&pip) {
                    return Err(reader.error(format!(
                        "synthetic PIP {} is not part of net '{}'",
                        pip, net_name
                    )));
                }
                design.pin_swaps[idx].fake_pips.push((net, pip));
            }
            ("END", Block::Net(_)) | ("END", Block::Swap(_)) => {
                block = Block::Top;
            }
            ("END", Block::Top) => return Ok(design),
            (other, _) => {
                return Err(reader.error(format!("unexpected record '{}'", other)));
            }
        }
    }

    Err(reader.error("unexpected end of physical netlist"))
}

fn lookup_site<R: BufRead>(reader: &TokenReader<R>, design: &Design, name: &str) -> Result<SiteId> {
    design
        .site_by_name(name)
        .ok_or_else(|| reader.error(format!("undeclared site '{}'", name)))
}

fn parse_pip<R: BufRead>(reader: &TokenReader<R>, parts: &[String], at: usize) -> Result<Pip> {
    let mut pip = Pip::new(
        field(reader, parts, at)?,
        field(reader, parts, at + 1)?,
        field(reader, parts, at + 2)?,
    );
    match parts.get(at + 3).map(String::as_str) {
        None => {}
        Some("BIDIR") => pip.bidir = true,
        Some(other) => return Err(reader.error(format!("unexpected PIP flag '{}'", other))),
    }
    Ok(pip)
}

fn pip_fields(pip: &Pip) -> String {
    if pip.bidir {
        format!("{} {} {} BIDIR", pip.tile, pip.wire0, pip.wire1)
    } else {
        format!("{} {} {}", pip.tile, pip.wire0, pip.wire1)
    }
}

pub fn save(design: &Design, filename: &Path) -> Result<()> {
    let mut file = BufWriter::new(File::create(filename)?);
    write(design, &mut file)?;
    file.flush()?;
    Ok(())
}

/// Writes the physical netlist. Committed pin swaps are already reflected in
/// the site pins and are not written again.
pub fn write<W: Write>(design: &Design, out: &mut W) -> Result<()> {
    writeln!(out, "{} {}", MAGIC, VERSION)?;
    writeln!(out, "PART {}", design.part)?;

    for site in &design.sites {
        writeln!(out, "SITE {} {}", site.name, site.site_type)?;
    }
    for site in &design.sites {
        for sp in &site.site_pips {
            writeln!(out, "SITEPIP {} {} {}", site.name, sp.bel, sp.input)?;
        }
    }
    for placement in &design.placements {
        write!(
            out,
            "PLACE {} {} {}",
            placement.cell,
            design.sites[placement.site.index()].name,
            placement.bel
        )?;
        for (logical, physical) in &placement.pin_map {
            write!(out, " {}:{}", logical, physical)?;
        }
        writeln!(out)?;
    }

    for net in &design.nets {
        writeln!(out, "NET {} {}", net.name, net.kind.keyword())?;
        let site_pin = |id: crate::db::indices::PinId| {
            let pin = design.pin(id);
            format!("{} {}", design.sites[pin.site.index()].name, pin.name)
        };
        if let Some(src) = net.source {
            writeln!(out, "  SOURCE {}", site_pin(src))?;
        }
        if let Some(alt) = net.alt_source {
            writeln!(out, "  ALTSOURCE {}", site_pin(alt))?;
        }
        for &sink in &net.sinks {
            writeln!(out, "  SINK {}", site_pin(sink))?;
        }
        for pip in &net.pips {
            writeln!(out, "  PIP {}", pip_fields(pip))?;
        }
        writeln!(out, "END NET")?;
    }

    for swap in design.pin_swaps.iter().filter(|s| !s.committed) {
        writeln!(
            out,
            "PINSWAP {} {}",
            design.sites[swap.site.index()].name,
            swap.bel
        )?;
        for (from, to) in &swap.mapping {
            writeln!(out, "  MAP {} {}", from, to)?;
        }
        for (net, pip) in &swap.fake_pips {
            writeln!(
                out,
                "  FAKE {} {}",
                design.nets[net.index()].name,
                pip_fields(pip)
            )?;
        }
        writeln!(out, "END PINSWAP")?;
    }

    writeln!(out, "END")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DesignError;
    use std::io::Cursor;

    const SAMPLE: &str = "\
PHYSNETLIST 1
PART xcvu3p
SITE SLICE_X0Y0 SLICEL
SITE SLICE_X1Y0 SLICEL
PLACE lut0 SLICE_X0Y0 A6LUT O:A_O
PLACE lut1 SLICE_X1Y0 B6LUT I0:B3
NET n1 SIGNAL
  SOURCE SLICE_X0Y0 A_O
  SINK SLICE_X1Y0 B3
  PIP INT_X0Y0 A_O_W N1
  PIP INT_X1Y0 N1 BYP_B5
  PIP INT_X1Y0 BYP_B5 B3
END NET
NET GND GND
END NET
PINSWAP SLICE_X1Y0 B6LUT
  MAP B3 B5
  FAKE n1 INT_X1Y0 BYP_B5 B3
END PINSWAP
END
";

    fn sample() -> Design {
        parse(&mut TokenReader::new(Cursor::new(SAMPLE))).unwrap()
    }

    #[test]
    fn test_parse_sample() {
        let design = sample();
        assert_eq!(design.part, "xcvu3p");
        assert_eq!(design.num_nets(), 2);
        let n1 = design.net(design.net_by_name("n1").unwrap());
        assert_eq!(n1.kind, NetKind::Signal);
        assert_eq!(n1.pips.len(), 3);
        assert_eq!(design.pin_label(n1.sinks[0]), "SLICE_X1Y0.B3");
        assert!(design.net(design.net_by_name("GND").unwrap()).is_static());
        assert_eq!(design.pin_swaps.len(), 1);
        assert_eq!(design.pin_swaps[0].fake_pips.len(), 1);
        assert!(!design.pin_swaps[0].committed);
    }

    #[test]
    fn test_write_then_parse_keeps_routing_and_swaps() {
        let design = sample();
        let mut out = Vec::new();
        write(&design, &mut out).unwrap();
        let again = parse(&mut TokenReader::new(Cursor::new(out))).unwrap();
        let a = design.net(design.net_by_name("n1").unwrap());
        let b = again.net(again.net_by_name("n1").unwrap());
        assert_eq!(a.pips, b.pips);
        assert_eq!(again.placements, design.placements);
        assert_eq!(again.pin_swaps[0].mapping, design.pin_swaps[0].mapping);
    }

    #[test]
    fn test_undeclared_site() {
        let text = "PHYSNETLIST 1\nNET a SIGNAL\n  SINK SLICE_X9Y9 A1\nEND NET\nEND\n";
        let err = parse(&mut TokenReader::new(Cursor::new(text))).unwrap_err();
        assert!(matches!(err, DesignError::Format(_)));
    }

    #[test]
    fn test_fake_pip_must_belong_to_net() {
        let text = "\
PHYSNETLIST 1
SITE S SLICEL
NET a SIGNAL
END NET
PINSWAP S A6LUT
  FAKE a INT X Y
END PINSWAP
END
";
        let err = parse(&mut TokenReader::new(Cursor::new(text))).unwrap_err();
        assert!(err.to_string().contains("synthetic PIP"));
    }

    #[test]
    fn test_shared_site_pin_rejected() {
        let text = "\
PHYSNETLIST 1
SITE S SLICEL
NET a SIGNAL
  SINK S A1
END NET
NET b SIGNAL
  SINK S A1
END NET
END
";
        assert!(parse(&mut TokenReader::new(Cursor::new(text))).is_err());
    }
}
