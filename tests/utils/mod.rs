pub mod compiler;

use gregex_nfa::{Builder, Regex};
use regex as rust_regex;
use regex_syntax::Parser;

/// Compile a pattern with the test compiler. Return None if the pattern is
/// invalid, or uses a feature the engine cannot express.
pub fn compile(pattern: &str) -> Option<Regex> {
    let hir = Parser::new().parse(pattern).ok()?;
    let (program, register_count) = compiler::Compiler::compile(&hir)?;
    Builder::new(program)
        .register_count(register_count)
        .build()
        .ok()
}

/// Returns true when no match of the pattern can be empty.
fn never_matches_empty(pattern: &str) -> bool {
    Parser::new()
        .parse(pattern)
        .map(|hir| hir.properties().minimum_len().is_some_and(|len| len > 0))
        .unwrap_or(false)
}

/// Offset of a byte position of `input` once encoded in UTF-16.
fn utf16_offset(input: &str, byte: usize) -> usize {
    input[..byte].encode_utf16().count()
}

type Groups = Vec<Option<(usize, usize)>>;

fn rust_groups(input: &str, caps: &rust_regex::Captures<'_>) -> Groups {
    caps.iter()
        .map(|m| m.map(|m| (utf16_offset(input, m.start()), utf16_offset(input, m.end()))))
        .collect()
}

fn our_groups(regex: &Regex, units: &[u16]) -> Option<Groups> {
    regex.find_captures(units).unwrap().map(|caps| {
        caps.iter()
            .map(|m| m.map(|m| (m.start(), m.end())))
            .collect()
    })
}

/// Match a pattern against a given input, encoded in UTF-16 and, when it
/// fits, in Latin-1, and compare both compilation and execution with
/// rust-regex.
pub fn check_against_rust_regex(pattern: &str, input: &str) {
    // Reference engine
    let rust = rust_regex::Regex::new(pattern);
    let ours = compile(pattern);

    match (rust, ours) {
        (Ok(rust_re), Some(regex)) => {
            let wide: Vec<u16> = input.encode_utf16().collect();
            let narrow: Option<Vec<u8>> = input
                .chars()
                .map(|c| u8::try_from(u32::from(c)).ok())
                .collect();

            // find
            let rust_match = rust_re
                .find(input)
                .map(|m| (utf16_offset(input, m.start()), utf16_offset(input, m.end())));
            let my_match = regex.find(&wide).unwrap().map(|m| (m.start(), m.end()));
            assert_eq!(
                my_match, rust_match,
                "Mismatch for pattern {pattern:?} input {input:?} (find)"
            );
            if let Some(narrow) = &narrow {
                let my_match = regex
                    .find(narrow.as_slice())
                    .unwrap()
                    .map(|m| (m.start(), m.end()));
                assert_eq!(
                    my_match, rust_match,
                    "Mismatch for pattern {pattern:?} input {input:?} (find, one byte)"
                );
            }

            // find_captures
            let rust_caps = rust_re.captures(input).map(|caps| rust_groups(input, &caps));
            assert_eq!(
                our_groups(&regex, &wide),
                rust_caps,
                "Mismatch for pattern {pattern:?} input {input:?} (find_captures)"
            );

            // Empty matches directly after a match are reported by us, but
            // skipped by rust-regex, so only compare iterations without them.
            if !never_matches_empty(pattern) {
                return;
            }

            // find_all
            let rust_all: Vec<_> = rust_re
                .find_iter(input)
                .map(|m| (utf16_offset(input, m.start()), utf16_offset(input, m.end())))
                .collect();
            let my_all: Vec<_> = regex
                .find_all(&wide)
                .map(|m| m.map(|m| (m.start(), m.end())).unwrap())
                .collect();
            assert_eq!(
                my_all, rust_all,
                "Mismatch for pattern {pattern:?} input {input:?} (find_all)"
            );

            // find_all_captures
            let rust_all_caps: Vec<Groups> = rust_re
                .captures_iter(input)
                .map(|caps| rust_groups(input, &caps))
                .collect();
            let my_all_caps: Vec<Groups> = regex
                .find_all_captures(&wide)
                .map(|caps| {
                    caps.unwrap()
                        .iter()
                        .map(|m| m.map(|m| (m.start(), m.end())))
                        .collect()
                })
                .collect();
            assert_eq!(
                my_all_caps, rust_all_caps,
                "Mismatch for pattern {pattern:?} input {input:?} (find_all_captures)"
            );
        }
        (Err(_), None) => {} // Both failed, that's good
        (Ok(_), None) => panic!("Failed to compile {pattern:?} but rust-regex succeeded"),
        (Err(e), Some(_)) => panic!("rust-regex failed to compile but we succeeded: {e}"),
    }
}
