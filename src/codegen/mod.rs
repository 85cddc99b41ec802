use std::{
    fmt::{self, Write},
    format_args as f,
};

use crate::ast::{Bitflag, FormatSpec, Instruction, Map, Reader, Root};

mod ident;
#[cfg(test)]
mod tests;

pub use ident::{Binding, Ident};

const DEFAULT_CODE_CAPACITY: usize = 32 * 1024; // 32 KiB

/// Support code pasted into every generated program as `mod rt`.
pub const RUNTIME: &str = include_str!("../../runtime/src/lib.rs");

/// Generates a standalone Rust program that reads a binary file as described
/// by `root`.
///
/// The output only depends on `root`: generating twice from the same tree
/// yields the same text.
pub fn generate(root: &Root) -> String {
    CodeGen::with_capacity(DEFAULT_CODE_CAPACITY).generate(root)
}

pub struct CodeGen {
    code: String,
}

impl CodeGen {
    pub fn with_capacity(capacity: usize) -> CodeGen {
        CodeGen {
            code: String::with_capacity(capacity),
        }
    }

    pub fn generate(mut self, root: &Root) -> String {
        self.gen_prelude();
        self.gen_maps(&root.tables);
        self.gen_bitflags(&root.bitflags);
        self.gen_readers(&root.readers);
        self.gen_main(root.code.as_deref());
        self.code
    }

    fn gen_prelude(&mut self) {
        self.emit(f!("\
            // Generated by fmtc. Do not edit.\n\
            #![allow(dead_code, non_camel_case_types, non_snake_case, unused_mut, unused_variables)]\n\
            \n\
            mod rt {{\n\
            {RUNTIME}\
            }}\n"));
    }

    fn gen_maps(&mut self, maps: &[Map]) {
        self.emit(f!("\nstatic MAPS: &[rt::Map] = &[\n"));
        for map in maps {
            self.emit(f!("    rt::Map {{\n        name: {:?},\n        entries: &[\n", map.name));
            for (key, label) in &map.table {
                let label = label.to_string();
                self.emit(f!("            ({key}, {label:?}),\n"));
            }
            self.emit(f!("        ],\n    }},\n"));
        }
        self.emit(f!("];\n"));
    }

    fn gen_bitflags(&mut self, bitflags: &[Bitflag]) {
        self.emit(f!("\nstatic BITFLAGS: &[rt::BitflagSet] = &[\n"));
        for bitflag in bitflags {
            self.emit(f!("    rt::BitflagSet {{\n        name: {:?},\n        flags: &[\n", bitflag.name));
            for (mask, label) in &bitflag.rows {
                self.emit(f!("            rt::Flag {{ mask: {mask}, label: {label:?} }},\n"));
            }
            self.emit(f!("        ],\n    }},\n"));
        }
        self.emit(f!("];\n"));
    }

    fn gen_readers(&mut self, readers: &[Reader]) {
        self.emit(f!("\nmod readers {{\n"));
        for (i, reader) in readers.iter().enumerate() {
            if i > 0 {
                self.emit(f!("\n"));
            }
            self.gen_reader(reader);
        }
        self.emit(f!("}}\n"));
    }

    fn gen_reader(&mut self, reader: &Reader) {
        let name = Ident(&reader.name);

        self.emit(f!("    pub struct {name} {{\n"));
        for rule in &reader.rules {
            let field = Ident(&rule.name);
            self.emit(f!("        pub {field}: super::rt::Field,\n"));
        }
        self.emit(f!("    }}\n\n"));

        self.emit(f!("    impl super::rt::Record for {name} {{\n"));
        self.emit(f!(
            "        const NAME: &'static ::core::primitive::str = {:?};\n",
            reader.name
        ));
        self.emit(f!("        const LAYOUT: &'static [super::rt::FieldSpec] = &[\n"));
        for rule in &reader.rules {
            let format = RuntimeFormat(rule.format_or_default());
            self.emit(f!(
                "            super::rt::FieldSpec {{ name: {:?}, width: {}, format: {format} }},\n",
                rule.name, rule.bytes_to_read,
            ));
        }
        self.emit(f!("        ];\n\n"));

        self.emit(f!(
            "        fn from_fields(fields: ::std::vec::Vec<super::rt::Field>) -> Self {{\n"
        ));
        self.emit(f!("            let mut fields = fields.into_iter();\n"));
        self.emit(f!("            {name} {{\n"));
        for rule in &reader.rules {
            let field = Ident(&rule.name);
            self.emit(f!("                {field}: fields.next().unwrap_or_default(),\n"));
        }
        self.emit(f!("            }}\n        }}\n\n"));

        self.emit(f!("        fn fields(&self) -> ::std::vec::Vec<&super::rt::Field> {{\n"));
        self.emit(f!("            vec!["));
        for (i, rule) in reader.rules.iter().enumerate() {
            let sep = if i > 0 { ", " } else { "" };
            self.emit(f!("{sep}&self.{}", Ident(&rule.name)));
        }
        self.emit(f!("]\n        }}\n    }}\n"));
    }

    fn gen_main(&mut self, code: Option<&[Instruction]>) {
        self.emit(f!("\
            \n\
            fn main() {{\n\
            \x20   if let Err(error) = run() {{\n\
            \x20       eprintln!(\"error: {{error}}\");\n\
            \x20       std::process::exit(1);\n\
            \x20   }}\n\
            }}\n\
            \n\
            fn run() -> Result<(), rt::Error> {{\n\
            \x20   let mut __stream = rt::open_from_args()?;\n\
            \x20   let __symbols = rt::Symbols::new(MAPS, BITFLAGS);\n"));
        if let Some(code) = code {
            if !code.is_empty() {
                self.emit(f!("\n"));
            }
            for instruction in code {
                self.gen_instruction(instruction);
            }
        }
        self.emit(f!("    Ok(())\n}}\n"));
    }

    fn gen_instruction(&mut self, instruction: &Instruction) {
        match instruction {
            Instruction::Read { reader_name } => {
                let var = Binding(reader_name);
                let reader = Ident(reader_name);
                self.emit(f!(
                    "    let {var} = rt::read::<readers::{reader}, _>(&mut __stream, &__symbols)?;\n"
                ));
                self.emit(f!("    rt::show(&{var});\n"));
            }
            Instruction::Goto {
                reader_name,
                field_name,
            } => {
                let var = Binding(reader_name);
                let field = Ident(field_name);
                self.emit(f!("    rt::seek(&mut __stream, {var}.{field}.value)?;\n"));
            }
        }
    }
}

// Utility functions.
impl CodeGen {
    fn emit(&mut self, f: fmt::Arguments<'_>) {
        self.code
            .write_fmt(f)
            .expect("code emit should be infallible");
    }
}

/// A [`FormatSpec`] rendered as the runtime `Format` expression.
struct RuntimeFormat<'a>(&'a FormatSpec);

impl fmt::Display for RuntimeFormat<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            FormatSpec::Int => f.write_str("super::rt::Format::Int"),
            FormatSpec::Hex => f.write_str("super::rt::Format::Hex"),
            FormatSpec::Bin => f.write_str("super::rt::Format::Bin"),
            FormatSpec::Str => f.write_str("super::rt::Format::Str"),
            FormatSpec::Bytes => f.write_str("super::rt::Format::Bytes"),
            FormatSpec::Named(name) => write!(f, "super::rt::Format::Named({name:?})"),
        }
    }
}
