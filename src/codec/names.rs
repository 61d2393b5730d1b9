//! Wire-name to local-name normalization.
//!
//! Wire argument names are sent verbatim. The name application code uses in
//! [`Values`](super::Values) is derived deterministically:
//!
//! 1. every `-` becomes `_`
//! 2. if the result is a Rust keyword, its first letter is uppercased
//!
//! So `file-name` is read as `file_name` and `type` as `Type`.

/// Strict and reserved Rust keywords.
const KEYWORDS: &[&str] = &[
    "abstract", "as", "async", "await", "become", "box", "break", "const", "continue", "crate",
    "do", "dyn", "else", "enum", "extern", "false", "final", "fn", "for", "gen", "if", "impl",
    "in", "let", "loop", "macro", "match", "mod", "move", "mut", "override", "priv", "pub", "ref",
    "return", "self", "static", "struct", "super", "trait", "true", "try", "type", "typeof",
    "unsafe", "unsized", "use", "virtual", "where", "while", "yield",
];

/// Convert a wire argument name to its local name.
pub fn local_name(wire_name: &str) -> String {
    let name = wire_name.replace('-', "_");
    if KEYWORDS.contains(&name.as_str()) {
        let mut chars = name.chars();
        return match chars.next() {
            Some(first) => first.to_uppercase().chain(chars).collect(),
            None => name,
        };
    }
    name
}
