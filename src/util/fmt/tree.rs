use std::io::Write;

use crate::ast::*;

const INDENT_WIDTH: usize = 2;

fn sp(w: &mut impl Write, i: usize) -> std::io::Result<()> {
    write!(w, "{:width$}", "", width = i * INDENT_WIDTH)
}

pub fn print_root_string(root: &Root) -> String {
    let mut buf = Vec::with_capacity(1024);
    print_root(&mut buf, root).expect("writing to a Vec never fails");
    String::from_utf8(buf).expect("tree output is built from UTF-8 strings")
}

pub fn print_root(w: &mut impl Write, root: &Root) -> std::io::Result<()> {
    for reader in &root.readers {
        print_reader(w, 0, reader)?;
    }
    for map in &root.tables {
        print_map(w, 0, map)?;
    }
    for bitflag in &root.bitflags {
        print_bitflag(w, 0, bitflag)?;
    }
    if let Some(ref code) = root.code {
        sp(w, 0)?;
        writeln!(w, "main")?;
        for instruction in code {
            print_instruction(w, 1, instruction)?;
        }
    }
    Ok(())
}

fn print_reader(w: &mut impl Write, i: usize, reader: &Reader) -> std::io::Result<()> {
    sp(w, i)?;
    writeln!(w, "reader {}", reader.name)?;
    for rule in &reader.rules {
        sp(w, i + 1)?;
        write!(w, "rule {} {}", rule.name, rule.bytes_to_read)?;
        match rule.format {
            None => writeln!(w)?,
            Some(FormatSpec::Named(ref name)) => writeln!(w, " as {name} (named)")?,
            Some(ref builtin) => writeln!(w, " as {}", builtin.name())?,
        }
    }
    Ok(())
}

fn print_map(w: &mut impl Write, i: usize, map: &Map) -> std::io::Result<()> {
    sp(w, i)?;
    writeln!(w, "map {}", map.name)?;
    for (key, value) in &map.table {
        sp(w, i + 1)?;
        match value {
            Literal::Number(n) => writeln!(w, "{key} => {n}")?,
            Literal::Text(text) => writeln!(w, "{key} => {text:?}")?,
        }
    }
    Ok(())
}

fn print_bitflag(w: &mut impl Write, i: usize, bitflag: &Bitflag) -> std::io::Result<()> {
    sp(w, i)?;
    writeln!(w, "bitflag {}", bitflag.name)?;
    for (mask, label) in &bitflag.rows {
        sp(w, i + 1)?;
        writeln!(w, "{mask} => {label}")?;
    }
    Ok(())
}

fn print_instruction(
    w: &mut impl Write,
    i: usize,
    instruction: &Instruction,
) -> std::io::Result<()> {
    sp(w, i)?;
    match instruction {
        Instruction::Read { reader_name } => writeln!(w, "read {reader_name}"),
        Instruction::Goto {
            reader_name,
            field_name,
        } => writeln!(w, "goto {reader_name}.{field_name}"),
    }
}
