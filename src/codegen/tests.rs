use indoc::indoc;
use pretty_assertions::assert_eq;

use super::{generate, RUNTIME};
use crate::parser::parse_source;

fn compile(src: &str) -> String {
    let root = parse_source(src).expect("failed to parse");
    generate(&root)
}

/// Returns the generated code that follows the embedded runtime.
fn body(out: &str) -> &str {
    let start = out.find(RUNTIME).expect("runtime must be embedded") + RUNTIME.len();
    &out[start..]
}

const HEADER: &str = indoc! {"
    reader H where
    | magic : 2 as bytes
    | size : 4 as hex
    end
    main {
    read H
    goto H.size
    }
"};

#[test]
fn test_header_program() {
    let out = compile(HEADER);
    assert!(out.starts_with("// Generated by fmtc. Do not edit.\n#![allow("));
    let expected = indoc! {r#"
        }

        static MAPS: &[rt::Map] = &[
        ];

        static BITFLAGS: &[rt::BitflagSet] = &[
        ];

        mod readers {
            pub struct H {
                pub magic: super::rt::Field,
                pub size: super::rt::Field,
            }

            impl super::rt::Record for H {
                const NAME: &'static ::core::primitive::str = "H";
                const LAYOUT: &'static [super::rt::FieldSpec] = &[
                    super::rt::FieldSpec { name: "magic", width: 2, format: super::rt::Format::Bytes },
                    super::rt::FieldSpec { name: "size", width: 4, format: super::rt::Format::Hex },
                ];

                fn from_fields(fields: ::std::vec::Vec<super::rt::Field>) -> Self {
                    let mut fields = fields.into_iter();
                    H {
                        magic: fields.next().unwrap_or_default(),
                        size: fields.next().unwrap_or_default(),
                    }
                }

                fn fields(&self) -> ::std::vec::Vec<&super::rt::Field> {
                    vec![&self.magic, &self.size]
                }
            }
        }

        fn main() {
            if let Err(error) = run() {
                eprintln!("error: {error}");
                std::process::exit(1);
            }
        }

        fn run() -> Result<(), rt::Error> {
            let mut __stream = rt::open_from_args()?;
            let __symbols = rt::Symbols::new(MAPS, BITFLAGS);

            let record_H = rt::read::<readers::H, _>(&mut __stream, &__symbols)?;
            rt::show(&record_H);
            rt::seek(&mut __stream, record_H.size.value)?;
            Ok(())
        }
    "#};
    assert_eq!(body(&out), expected);
}

#[test]
fn test_generation_is_deterministic() {
    let src = include_str!("../../formats/pe.fmt");
    let root = parse_source(src).unwrap();
    assert_eq!(generate(&root), generate(&root));
}

#[test]
fn test_field_order_preserved() {
    let out = compile("reader R where\n| b : 4 as hex\n| a : 2\nend\n");
    let b = out.find("pub b: super::rt::Field").unwrap();
    let a = out.find("pub a: super::rt::Field").unwrap();
    assert!(b < a);
    assert!(out.contains(indoc! {r#"
                super::rt::FieldSpec { name: "b", width: 4, format: super::rt::Format::Hex },
                super::rt::FieldSpec { name: "a", width: 2, format: super::rt::Format::Hex },
    "#}));
}

#[test]
fn test_tables_and_bitflags() {
    let out = compile(indoc! {r#"
        map Machine where
        | 0x8664 > "amd64 (64 bits)"
        | 0x14c > "x86 (32 bits)"
        | 7 > 42
        end
        bitflag AB where
        | 1 > A
        | 2 > B
        end
        reader R where
        | m : 2 as Machine
        | f : 1 as AB
        | u : 1 as Undeclared
        end
    "#});
    let expected_maps = indoc! {r#"
        static MAPS: &[rt::Map] = &[
            rt::Map {
                name: "Machine",
                entries: &[
                    (7, "42"),
                    (332, "x86 (32 bits)"),
                    (34404, "amd64 (64 bits)"),
                ],
            },
        ];

        static BITFLAGS: &[rt::BitflagSet] = &[
            rt::BitflagSet {
                name: "AB",
                flags: &[
                    rt::Flag { mask: 1, label: "A" },
                    rt::Flag { mask: 2, label: "B" },
                ],
            },
        ];
    "#};
    assert!(body(&out).contains(expected_maps), "{}", body(&out));
    assert!(out.contains(r#"format: super::rt::Format::Named("Machine")"#));
    assert!(out.contains(r#"format: super::rt::Format::Named("AB")"#));
    // Unknown names are left for the generated program to report.
    assert!(out.contains(r#"format: super::rt::Format::Named("Undeclared")"#));
}

#[test]
fn test_without_main_performs_no_reads() {
    let out = compile("reader H where\n| a : 1\nend\n");
    assert!(body(&out).ends_with(indoc! {"
        fn run() -> Result<(), rt::Error> {
            let mut __stream = rt::open_from_args()?;
            let __symbols = rt::Symbols::new(MAPS, BITFLAGS);
            Ok(())
        }
    "}));
    assert!(!body(&out).contains("rt::read::<"));
}

#[test]
fn test_keyword_names() {
    let out = compile(indoc! {"
        reader type where
        | match : 1
        | self : 1
        end
        main {
        read type
        goto type.match
        }
    "});
    assert!(out.contains("pub struct r#type {"));
    assert!(out.contains("pub r#match: super::rt::Field,"));
    assert!(out.contains("pub self_: super::rt::Field,"));
    assert!(out.contains(r#"const NAME: &'static ::core::primitive::str = "type";"#));
    assert!(out.contains(
        "let record_type = rt::read::<readers::r#type, _>(&mut __stream, &__symbols)?;"
    ));
    assert!(out.contains("rt::seek(&mut __stream, record_type.r#match.value)?;"));
}

#[test]
fn test_runtime_embedded_once() {
    let out = compile("");
    assert_eq!(out.matches("pub fn open_from_args()").count(), 1);
    assert!(out.contains("mod rt {\n"));
}

#[test]
fn test_pe_format_program() {
    let out = compile(include_str!("../../formats/pe.fmt"));
    let main = &out[out.find("fn run()").unwrap()..];
    let reads: Vec<_> = main
        .lines()
        .filter_map(|line| line.trim().strip_prefix("rt::show(&record_"))
        .collect();
    assert_eq!(
        reads,
        [
            "IMAGE_DOS_HEADER);",
            "PE_IMAGE_HEADER);",
            "PE_OPTIONAL_HEADER);",
            "WINDOWS_FIELDS);",
            "DATA_DIRECTORIES);",
        ]
    );
    assert!(main.contains(
        "rt::seek(&mut __stream, record_IMAGE_DOS_HEADER.pe_header_address.value)?;"
    ));
    assert!(out.contains(r#"format: super::rt::Format::Named("DllCharacteristics")"#));
    assert!(out.contains(r#"(34404, "amd64 (64 bits)"),"#));
}

#[test]
fn test_prelude_names() {
    let out = compile(indoc! {"
        reader Vec where
        | a : 1
        end
        reader None where
        | Some : 1
        end
        reader str where
        | x : 1
        end
        main {
        read Vec
        read None
        read str
        goto None.Some
        }
    "});
    assert!(out.contains("pub struct Vec {"));
    assert!(!body(&out).contains(" Vec<"));
    assert!(out.contains("let record_Vec = rt::read::<readers::Vec, _>"));
    assert!(out.contains("let record_None = rt::read::<readers::None, _>"));
    assert!(out.contains("let record_str = rt::read::<readers::str, _>"));
    assert!(out.contains("rt::seek(&mut __stream, record_None.Some.value)?;"));
}

#[test]
fn test_non_ascii_names() {
    let out = compile("reader Ä where\n| größe : 2\nend\nmain {\nread Ä\n}\n");
    assert!(out.contains("pub struct _uc4_ {"));
    assert!(out.contains("pub gr_uf6__udf_e: super::rt::Field,"));
    assert!(out.contains(r#"const NAME: &'static ::core::primitive::str = "Ä";"#));
    assert!(out.contains(r#"super::rt::FieldSpec { name: "größe", width: 2,"#));
    assert!(out.contains("let record__uc4_ = rt::read::<readers::_uc4_, _>"));
}
