//! Line classification for `config`/`edit`/`set`/`end` exports.
//!
//! Every higher layer (block reader, recovery scan, top-level dispatch) sees
//! the input only through [`classify`], so the recognised line shapes live in
//! exactly one place.

/// One classified input line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Line<'a> {
    /// Empty or whitespace-only line.
    Blank,
    /// `#...` comment other than the version banner.
    Comment(&'a str),
    /// `#config-version=...`; carries everything after the `=`.
    VersionBanner(&'a str),
    /// `config vdom`, the virtual-domain list marker.
    Vdom,
    /// `config global`, the shared-settings marker.
    Global,
    /// `config <section>`; the section text is left raw (quotes included).
    Config(&'a str),
    /// `edit <name>` with quotes removed.
    Edit(String),
    /// `set <key> <value...>`; key normalised, value left raw.
    Set { key: String, raw: &'a str },
    /// `append <key> <value...>`.
    Append { key: String, raw: &'a str },
    /// `unset <key>`.
    Unset(String),
    Next,
    End,
    /// Anything else; the trimmed text is kept for warnings.
    Unknown(&'a str),
}

impl Line<'_> {
    /// Section text for any `config ...` form, including the scope markers.
    pub fn config_name(&self) -> Option<&str> {
        match self {
            Line::Config(name) => Some(name),
            Line::Vdom => Some("vdom"),
            Line::Global => Some("global"),
            _ => None,
        }
    }

    /// True when the line neither opens nor changes structure.
    pub fn is_insignificant(&self) -> bool {
        matches!(self, Line::Blank | Line::Comment(_) | Line::VersionBanner(_))
    }
}

/// Classify a single raw line.
pub fn classify(raw: &str) -> Line<'_> {
    let line = raw.trim();
    if line.is_empty() {
        return Line::Blank;
    }
    if let Some(rest) = line.strip_prefix('#') {
        return match rest.strip_prefix("config-version=") {
            Some(banner) => Line::VersionBanner(banner.trim()),
            None => Line::Comment(rest),
        };
    }

    let (word, rest) = split_word(line);
    match word {
        "config" if !rest.is_empty() => match rest {
            "vdom" => Line::Vdom,
            "global" => Line::Global,
            _ => Line::Config(rest),
        },
        "edit" if !rest.is_empty() => Line::Edit(unquote(rest)),
        "set" | "append" => {
            let (key, value) = split_word(rest);
            if key.is_empty() {
                return Line::Unknown(line);
            }
            let key = normalize_key(key);
            if word == "set" {
                Line::Set { key, raw: value }
            } else {
                Line::Append { key, raw: value }
            }
        }
        "unset" if !rest.is_empty() => Line::Unset(normalize_key(split_word(rest).0)),
        "next" if rest.is_empty() => Line::Next,
        "end" if rest.is_empty() => Line::End,
        _ => Line::Unknown(line),
    }
}

/// Leading whitespace width of a raw line.
///
/// Exports indent nested blocks, so a `config` line no deeper than the block
/// that contains it marks a new section even when an `end` went missing.
pub fn indentation(raw: &str) -> usize {
    raw.len() - raw.trim_start().len()
}

/// Normalise a field key or nested block name: hyphens become underscores.
pub fn normalize_key(key: &str) -> String {
    unquote(key).replace('-', "_")
}

/// Normalise a section name for registry lookup.
///
/// Quotes are trimmed, the name is lowercased, and runs of spaces or hyphens
/// become single underscores: `firewall service custom` becomes
/// `firewall_service_custom`.
pub fn normalize_section_name(raw: &str) -> String {
    let unquoted = unquote(raw.trim());
    let mut out = String::with_capacity(unquoted.len());
    let mut pending_sep = false;
    for ch in unquoted.trim().chars() {
        if ch.is_whitespace() || ch == '-' || ch == '_' {
            pending_sep = !out.is_empty();
            continue;
        }
        if pending_sep {
            out.push('_');
            pending_sep = false;
        }
        out.extend(ch.to_lowercase());
    }
    out
}

/// Split a value into tokens, honouring double quotes and backslash escapes.
///
/// Quotes are removed; an empty quoted string yields an empty token.
pub fn split_tokens(raw: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_token = false;
    let mut in_quotes = false;
    let mut chars = raw.chars();

    while let Some(ch) = chars.next() {
        match ch {
            '\\' if in_quotes => {
                if let Some(escaped) = chars.next() {
                    current.push(escaped);
                }
            }
            '"' => {
                in_quotes = !in_quotes;
                in_token = true;
            }
            c if c.is_whitespace() && !in_quotes => {
                if in_token {
                    tokens.push(std::mem::take(&mut current));
                    in_token = false;
                }
            }
            c => {
                current.push(c);
                in_token = true;
            }
        }
    }
    if in_token {
        tokens.push(current);
    }
    tokens
}

/// Strip one level of surrounding quotes, resolving escapes inside them.
pub fn unquote(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.len() >= 2 && trimmed.starts_with('"') && trimmed.ends_with('"') {
        split_tokens(trimmed).concat()
    } else {
        trimmed.to_string()
    }
}

fn split_word(line: &str) -> (&str, &str) {
    match line.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (line, ""),
    }
}
