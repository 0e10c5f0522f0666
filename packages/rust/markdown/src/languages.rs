//! Code block language names.
//!
//! Fence info strings use short aliases (`js`, `py`, `sh`); code blocks use
//! the service's canonical names. Unknown languages map to `plain text`.

/// Canonical name used when a fence has no or an unknown language.
pub const PLAIN_TEXT: &str = "plain text";

/// Alias → canonical name.
const ALIASES: &[(&str, &str)] = &[
    ("js", "javascript"),
    ("jsx", "javascript"),
    ("mjs", "javascript"),
    ("node", "javascript"),
    ("ts", "typescript"),
    ("tsx", "typescript"),
    ("py", "python"),
    ("python3", "python"),
    ("rb", "ruby"),
    ("rs", "rust"),
    ("sh", "shell"),
    ("zsh", "shell"),
    ("console", "shell"),
    ("ps1", "powershell"),
    ("pwsh", "powershell"),
    ("yml", "yaml"),
    ("md", "markdown"),
    ("cpp", "c++"),
    ("cc", "c++"),
    ("hpp", "c++"),
    ("cs", "c#"),
    ("csharp", "c#"),
    ("fs", "f#"),
    ("fsharp", "f#"),
    ("kt", "kotlin"),
    ("golang", "go"),
    ("htm", "html"),
    ("xhtml", "html"),
    ("dockerfile", "docker"),
    ("tf", "hcl"),
    ("text", PLAIN_TEXT),
    ("txt", PLAIN_TEXT),
    ("plaintext", PLAIN_TEXT),
];

/// Languages the service accepts as-is.
const CANONICAL: &[&str] = &[
    "bash",
    "c",
    "c#",
    "c++",
    "clojure",
    "css",
    "dart",
    "diff",
    "docker",
    "elixir",
    "elm",
    "erlang",
    "f#",
    "go",
    "graphql",
    "groovy",
    "haskell",
    "hcl",
    "html",
    "java",
    "javascript",
    "json",
    "julia",
    "kotlin",
    "latex",
    "less",
    "lua",
    "makefile",
    "markdown",
    "mermaid",
    "nix",
    "objective-c",
    "ocaml",
    "perl",
    "php",
    PLAIN_TEXT,
    "powershell",
    "protobuf",
    "python",
    "r",
    "ruby",
    "rust",
    "sass",
    "scala",
    "scss",
    "shell",
    "sql",
    "swift",
    "toml",
    "typescript",
    "xml",
    "yaml",
];

/// Resolve a fence info string to a canonical language.
///
/// Returns `None` for languages the service does not know.
pub fn canonical_language(info: &str) -> Option<&'static str> {
    let lang = info.trim().to_ascii_lowercase();
    if lang.is_empty() {
        return Some(PLAIN_TEXT);
    }
    if let Some((_, canonical)) = ALIASES.iter().find(|(alias, _)| *alias == lang) {
        return Some(*canonical);
    }
    CANONICAL.iter().find(|c| **c == lang).copied()
}

/// Fence info string for a block language (`None` for plain text).
pub fn fence_language(language: &str) -> Option<&str> {
    let lang = language.trim();
    if lang.is_empty() || lang.eq_ignore_ascii_case(PLAIN_TEXT) {
        None
    } else {
        Some(lang)
    }
}
