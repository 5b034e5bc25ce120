//! Field-level updates to record files.
//!
//! Enrichment owns four top-level fields of a record: `stars`,
//! `good_first_issues`, `verified`, and `primary_lang` (only while unset).
//! Updates rewrite the value of the matching line and leave every other line
//! byte-for-byte intact, so a run over an unchanged repository produces no
//! diff. Keys that are missing are inserted ahead of `added_at`, or after the
//! last top-level line when there is no `added_at`.
//!
//! Only top-level keys are touched: scanning stops at the first table
//! header, so a `stars` key inside a `[table]` is never rewritten. Lines that
//! continue a multi-line string or array are never read as keys or headers.

/// Enrichment-owned values to persist into a record file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordUpdate {
    pub stars: u64,
    pub good_first_issues: u64,
    pub verified: bool,
    /// Written only when the record has no (or an empty) `primary_lang`.
    pub primary_lang: Option<String>,
}

/// Apply `update` to the text of a record file.
///
/// Applying the same update twice yields the same text as applying it once.
pub fn apply_update(content: &str, update: &RecordUpdate) -> String {
    let newline = if content.contains("\r\n") { "\r\n" } else { "\n" };
    let mut lines: Vec<String> = content.split_inclusive('\n').map(str::to_string).collect();
    let starts = statement_starts(&lines);
    let top_end = top_level_end(&lines, &starts);
    let find = |lines: &[String], key: &str| find_key(&lines[..top_end], &starts, key);

    let mut missing = Vec::new();
    for (key, value) in [
        ("stars", update.stars.to_string()),
        ("good_first_issues", update.good_first_issues.to_string()),
        ("verified", update.verified.to_string()),
    ] {
        match find(&lines, key) {
            Some(i) if single_line(&starts, i) => lines[i] = replace_value(&lines[i], &value),
            Some(_) => {}
            None => missing.push(format!("{} = {}", key, value)),
        }
    }

    if let Some(ref lang) = update.primary_lang {
        let quoted = toml::Value::String(lang.clone()).to_string();
        match find(&lines, "primary_lang") {
            Some(i) if single_line(&starts, i) && has_blank_value(&lines[i]) => {
                lines[i] = replace_value(&lines[i], &quoted)
            }
            Some(_) => {}
            None => missing.push(format!("primary_lang = {}", quoted)),
        }
    }

    if !missing.is_empty() {
        let at = match find(&lines, "added_at") {
            Some(i) => i,
            None => {
                let mut end = top_end;
                while end > 0 && lines[end - 1].trim().is_empty() {
                    end -= 1;
                }
                end
            }
        };
        if at > 0 && !lines[at - 1].ends_with('\n') {
            lines[at - 1].push_str(newline);
        }
        let block: Vec<String> = missing
            .into_iter()
            .map(|line| format!("{}{}", line, newline))
            .collect();
        lines.splice(at..at, block);
    }

    lines.concat()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scan {
    Code,
    Basic,
    Literal,
    MultiBasic,
    MultiLiteral,
}

/// For each line, whether it begins a new statement: outside every string
/// and every multi-line array.
fn statement_starts(lines: &[String]) -> Vec<bool> {
    let mut state = Scan::Code;
    let mut depth: i32 = 0;
    let mut starts = Vec::with_capacity(lines.len());
    for line in lines {
        starts.push(state == Scan::Code && depth <= 0);
        let bytes = line.as_bytes();
        let mut i = 0;
        while i < bytes.len() {
            let rest = &bytes[i..];
            match state {
                Scan::Code => match bytes[i] {
                    b'#' => break,
                    b'[' => depth += 1,
                    b']' => depth -= 1,
                    b'"' if rest.starts_with(b"\"\"\"") => {
                        state = Scan::MultiBasic;
                        i += 2;
                    }
                    b'\'' if rest.starts_with(b"'''") => {
                        state = Scan::MultiLiteral;
                        i += 2;
                    }
                    b'"' => state = Scan::Basic,
                    b'\'' => state = Scan::Literal,
                    _ => {}
                },
                Scan::Basic => match bytes[i] {
                    b'\\' => i += 1,
                    b'"' => state = Scan::Code,
                    _ => {}
                },
                Scan::Literal => {
                    if bytes[i] == b'\'' {
                        state = Scan::Code;
                    }
                }
                Scan::MultiBasic => {
                    if bytes[i] == b'\\' {
                        i += 1;
                    } else if rest.starts_with(b"\"\"\"") {
                        state = Scan::Code;
                        i += 2 + closing_extra(&rest[3..], b'"');
                    }
                }
                Scan::MultiLiteral => {
                    if rest.starts_with(b"'''") {
                        state = Scan::Code;
                        i += 2 + closing_extra(&rest[3..], b'\'');
                    }
                }
            }
            i += 1;
        }
        // Single-line strings end with their line.
        if matches!(state, Scan::Basic | Scan::Literal) {
            state = Scan::Code;
        }
    }
    starts
}

/// Up to two quotes directly after a closing delimiter belong to the string.
fn closing_extra(rest: &[u8], quote: u8) -> usize {
    rest.iter().take(2).take_while(|&&b| b == quote).count()
}

/// Index of the first table header, or `lines.len()`.
fn top_level_end(lines: &[String], starts: &[bool]) -> usize {
    lines
        .iter()
        .zip(starts)
        .position(|(line, &start)| start && line.trim_start().starts_with('['))
        .unwrap_or(lines.len())
}

fn find_key(lines: &[String], starts: &[bool], key: &str) -> Option<usize> {
    lines.iter().zip(starts).position(|(line, &start)| {
        start
            && line
                .trim_start()
                .strip_prefix(key)
                .is_some_and(|rest| rest.trim_start().starts_with('='))
    })
}

/// Whether the statement on line `i` ends on that line.
fn single_line(starts: &[bool], i: usize) -> bool {
    starts.get(i + 1).copied().unwrap_or(true)
}

/// Split a `key = value # comment` line into (head through `=`, leading
/// whitespace, value, tail) where tail keeps the comment and line ending.
fn split_line(line: &str) -> Option<(&str, &str, &str, &str)> {
    let eq = line.find('=')?;
    let (head, rest) = line.split_at(eq + 1);
    let rest_trimmed = rest.trim_start_matches([' ', '\t']);
    let ws = &rest[..rest.len() - rest_trimmed.len()];

    let value_len = if rest_trimmed.starts_with('"') || rest_trimmed.starts_with('\'') {
        quoted_len(rest_trimmed)
    } else {
        rest_trimmed
            .find(|c: char| c.is_whitespace() || c == '#')
            .unwrap_or(rest_trimmed.len())
    };
    let (value, tail) = rest_trimmed.split_at(value_len);
    Some((head, ws, value, tail))
}

fn quoted_len(s: &str) -> usize {
    let mut chars = s.char_indices();
    let Some((_, q)) = chars.next() else {
        return 0;
    };
    let mut escaped = false;
    for (i, c) in chars {
        if escaped {
            escaped = false;
        } else if c == '\\' && q == '"' {
            escaped = true;
        } else if c == q {
            return i + c.len_utf8();
        }
    }
    s.trim_end_matches(['\r', '\n']).len()
}

/// Whether the line's value is a quoted string holding only whitespace.
fn has_blank_value(line: &str) -> bool {
    split_line(line).is_some_and(|(_, _, value, _)| is_blank(value))
}

fn is_blank(value: &str) -> bool {
    let inner = value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .or_else(|| value.strip_prefix('\'').and_then(|v| v.strip_suffix('\'')));
    inner.is_some_and(|v| v.trim().is_empty())
}

fn replace_value(line: &str, value: &str) -> String {
    match split_line(line) {
        Some((head, ws, _, tail)) => format!("{}{}{}{}", head, ws, value, tail),
        None => line.to_string(),
    }
}
