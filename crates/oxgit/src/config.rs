//! The repository `config` file, in git's INI dialect.
//!
//! ```text
//! # comment
//! [core]
//!     bare = false
//! [remote "origin"]
//!     url = /srv/repo.git
//!     fetch = +refs/heads/*:refs/remotes/origin/*
//! ```
//!
//! Section and key names are case-insensitive; subsection names are not.
//! Lines the caller never touches are written back byte for byte, so
//! comments and layout survive an edit. Writes go through a temporary file
//! renamed over the original.

use std::fmt;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::debug;

use crate::error::{Error, Result};

/// One `key = value` pair, as listed by [`Config::entries`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ConfigEntry {
    /// Full key: `section.name` or `section.subsection.name`.
    pub key: String,
    /// `None` for a bare key, which reads as boolean true.
    pub value: Option<String>,
}

#[derive(Clone, Debug)]
enum Line {
    Entry { name: String, value: Option<String>, raw: String },
    Other(String),
}

#[derive(Clone, Debug)]
struct Section {
    name: String,
    subsection: Option<String>,
    header: String,
    lines: Vec<Line>,
}

impl Section {
    fn new(name: &str, subsection: Option<&str>) -> Self {
        let header = match subsection {
            Some(sub) => format!("[{name} \"{}\"]\n", escape_subsection(sub)),
            None => format!("[{name}]\n"),
        };
        Self {
            name: name.to_string(),
            subsection: subsection.map(str::to_string),
            header,
            lines: Vec::new(),
        }
    }

    fn is(&self, key: &Key) -> bool {
        self.name == key.section && self.subsection.as_deref() == key.subsection.as_deref()
    }
}

/// A parsed `section[.subsection].name`.
struct Key {
    section: String,
    subsection: Option<String>,
    name: String,
}

impl Key {
    fn parse(key: &str) -> Result<Self> {
        let invalid = |reason: &str| Error::invalid(format!("config key {key:?}: {reason}"));
        let (section, rest) = key.split_once('.').ok_or_else(|| invalid("missing section"))?;
        let (subsection, name) = match rest.rsplit_once('.') {
            Some((sub, name)) => (Some(sub), name),
            None => (None, rest),
        };
        if section.is_empty() || !section.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
            return Err(invalid("bad section name"));
        }
        if !is_valid_name(name) {
            return Err(invalid("bad variable name"));
        }
        if subsection.is_some_and(|s| s.contains(['\n', '\0'])) {
            return Err(invalid("bad subsection name"));
        }
        Ok(Self {
            section: section.to_ascii_lowercase(),
            subsection: subsection.map(str::to_string),
            name: name.to_ascii_lowercase(),
        })
    }
}

/// An in-memory config document, optionally bound to a file.
#[derive(Clone, Debug, Default)]
pub struct Config {
    path: Option<PathBuf>,
    preamble: Vec<String>,
    sections: Vec<Section>,
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load `path`. A missing file reads as an empty config that will be
    /// created on [`save`](Self::save).
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => String::new(),
            Err(e) => return Err(e.into()),
        };
        let mut config = Self::parse(&text)?;
        config.path = Some(path);
        Ok(config)
    }

    pub fn parse(text: &str) -> Result<Self> {
        let mut config = Self::default();
        let mut lines = text.split_inclusive('\n').map(|l| {
            if l.ends_with('\n') {
                l.to_string()
            } else {
                format!("{l}\n")
            }
        });
        let mut line_no = 0usize;

        while let Some(raw) = lines.next() {
            line_no += 1;
            let err = |reason: String| Error::Config { line: line_no, reason };
            let trimmed = raw.trim_start();
            if trimmed.trim().is_empty() || trimmed.starts_with(['#', ';']) {
                config.push_line(Line::Other(raw));
                continue;
            }
            if trimmed.starts_with('[') {
                let (name, subsection) = parse_header(trimmed).map_err(err)?;
                config.sections.push(Section {
                    name,
                    subsection,
                    header: raw,
                    lines: Vec::new(),
                });
                continue;
            }
            if config.sections.is_empty() {
                return Err(err("variable outside of any section".into()));
            }
            let start = line_no;
            let mut raw = raw;
            let (name, value) = parse_entry(&mut raw, &mut lines, &mut line_no)
                .map_err(|reason| Error::Config { line: start, reason })?;
            config.push_line(Line::Entry { name, value, raw });
        }
        Ok(config)
    }

    fn push_line(&mut self, line: Line) {
        match (self.sections.last_mut(), line) {
            (Some(section), line) => section.lines.push(line),
            (None, Line::Other(raw)) => self.preamble.push(raw),
            (None, Line::Entry { raw, .. }) => self.preamble.push(raw),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Write the document back to the file it was opened from.
    pub fn save(&self) -> Result<()> {
        let path = self
            .path
            .as_deref()
            .ok_or_else(|| Error::invalid("config has no backing file"))?;
        let dir = path.parent().unwrap_or_else(|| Path::new("."));
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        tmp.write_all(self.to_string().as_bytes())?;
        tmp.as_file().sync_all()?;
        tmp.persist(path).map_err(|e| e.error)?;
        debug!(path = %path.display(), "config written");
        Ok(())
    }

    fn values<'a>(&'a self, key: &'a Key) -> impl Iterator<Item = Option<&'a str>> + 'a {
        self.sections
            .iter()
            .filter(|s| s.is(key))
            .flat_map(|s| s.lines.iter())
            .filter_map(|line| match line {
                Line::Entry { name, value, .. } if *name == key.name => Some(value.as_deref()),
                _ => None,
            })
    }

    /// The last value of `key`. A bare key reads as the empty string.
    pub fn get(&self, key: &str) -> Result<Option<String>> {
        let key = Key::parse(key)?;
        Ok(self.values(&key).last().map(|v| v.unwrap_or_default().to_string()))
    }

    /// Every value of a multi-valued key, in file order.
    pub fn get_all(&self, key: &str) -> Result<Vec<String>> {
        let key = Key::parse(key)?;
        Ok(self.values(&key).map(|v| v.unwrap_or_default().to_string()).collect())
    }

    pub fn get_bool(&self, key: &str) -> Result<Option<bool>> {
        let parsed = Key::parse(key)?;
        match self.values(&parsed).last() {
            None => Ok(None),
            Some(None) => Ok(Some(true)),
            Some(Some(value)) => parse_bool(value)
                .map(Some)
                .ok_or_else(|| Error::invalid(format!("{key} = {value:?} is not a boolean"))),
        }
    }

    /// Integer value, honouring git's `k`, `m` and `g` suffixes.
    pub fn get_i64(&self, key: &str) -> Result<Option<i64>> {
        let parsed = Key::parse(key)?;
        match self.values(&parsed).last() {
            None => Ok(None),
            Some(value) => {
                let value = value.unwrap_or_default();
                parse_i64(value)
                    .map(Some)
                    .ok_or_else(|| Error::invalid(format!("{key} = {value:?} is not an integer")))
            }
        }
    }

    /// Set `key` to a single value, replacing every existing value.
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let parsed = Key::parse(key)?;
        let display_name = display_name(key);
        let entry = render_entry(display_name, value);

        let mut last = None;
        for (si, section) in self.sections.iter().enumerate().filter(|(_, s)| s.is(&parsed)) {
            for (li, line) in section.lines.iter().enumerate() {
                if matches!(line, Line::Entry { name, .. } if *name == parsed.name) {
                    last = Some((si, li));
                }
            }
        }
        match last {
            Some((si, li)) => {
                self.sections[si].lines[li] = entry;
                self.retain_entries(&parsed, |s, l| (s, l) == (si, li));
            }
            None => self.append(&parsed, entry),
        }
        Ok(())
    }

    pub fn set_bool(&mut self, key: &str, value: bool) -> Result<()> {
        self.set(key, if value { "true" } else { "false" })
    }

    pub fn set_i64(&mut self, key: &str, value: i64) -> Result<()> {
        self.set(key, &value.to_string())
    }

    /// Append one more value to a multi-valued key.
    pub fn add(&mut self, key: &str, value: &str) -> Result<()> {
        let parsed = Key::parse(key)?;
        let entry = render_entry(display_name(key), value);
        self.append(&parsed, entry);
        Ok(())
    }

    /// Replace every value of `key` with `values`, in order.
    pub fn set_all(&mut self, key: &str, values: &[&str]) -> Result<()> {
        self.remove(key)?;
        for value in values {
            self.add(key, value)?;
        }
        Ok(())
    }

    /// Remove every value of `key`, returning how many were removed.
    pub fn remove(&mut self, key: &str) -> Result<usize> {
        let parsed = Key::parse(key)?;
        Ok(self.retain_entries(&parsed, |_, _| false))
    }

    /// Remove a whole section. Returns whether one existed.
    pub fn remove_section(&mut self, section: &str, subsection: Option<&str>) -> bool {
        let section = section.to_ascii_lowercase();
        let before = self.sections.len();
        self.sections
            .retain(|s| !(s.name == section && s.subsection.as_deref() == subsection));
        self.sections.len() != before
    }

    /// Distinct subsection names of `section`, in order of appearance.
    pub fn subsections(&self, section: &str) -> Vec<String> {
        let section = section.to_ascii_lowercase();
        let mut names: Vec<String> = Vec::new();
        for s in self.sections.iter().filter(|s| s.name == section) {
            if let Some(sub) = &s.subsection {
                if !names.contains(sub) {
                    names.push(sub.clone());
                }
            }
        }
        names
    }

    pub fn entries(&self) -> Vec<ConfigEntry> {
        let mut out = Vec::new();
        for section in &self.sections {
            let prefix = match &section.subsection {
                Some(sub) => format!("{}.{sub}", section.name),
                None => section.name.clone(),
            };
            for line in &section.lines {
                if let Line::Entry { name, value, .. } = line {
                    out.push(ConfigEntry { key: format!("{prefix}.{name}"), value: value.clone() });
                }
            }
        }
        out
    }

    /// Keep the entries of `key` for which `keep(section, line)` holds.
    fn retain_entries(&mut self, key: &Key, keep: impl Fn(usize, usize) -> bool) -> usize {
        let mut removed = 0;
        for (si, section) in self.sections.iter_mut().enumerate() {
            if !section.is(key) {
                continue;
            }
            let mut li = 0;
            section.lines.retain(|line| {
                let index = li;
                li += 1;
                let matches = matches!(line, Line::Entry { name, .. } if *name == key.name);
                if matches && !keep(si, index) {
                    removed += 1;
                    return false;
                }
                true
            });
        }
        removed
    }

    fn append(&mut self, key: &Key, entry: Line) {
        let index = match self.sections.iter().rposition(|s| s.is(key)) {
            Some(index) => index,
            None => {
                self.sections.push(Section::new(&key.section, key.subsection.as_deref()));
                self.sections.len() - 1
            }
        };
        let lines = &mut self.sections[index].lines;
        let at = lines
            .iter()
            .rposition(|l| matches!(l, Line::Entry { .. }))
            .map_or(0, |i| i + 1);
        lines.insert(at, entry);
    }
}

impl fmt::Display for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for raw in &self.preamble {
            f.write_str(raw)?;
        }
        for section in &self.sections {
            f.write_str(&section.header)?;
            for line in &section.lines {
                match line {
                    Line::Entry { raw, .. } | Line::Other(raw) => f.write_str(raw)?,
                }
            }
        }
        Ok(())
    }
}

pub fn parse_bool(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" => Some(true),
        "false" | "no" | "off" | "" => Some(false),
        other => parse_i64(other).map(|n| n != 0),
    }
}

fn parse_i64(value: &str) -> Option<i64> {
    let value = value.trim();
    let (digits, scale) = match value.char_indices().last()? {
        (i, 'k' | 'K') => (&value[..i], 1 << 10),
        (i, 'm' | 'M') => (&value[..i], 1 << 20),
        (i, 'g' | 'G') => (&value[..i], 1 << 30),
        _ => (value, 1),
    };
    digits.parse::<i64>().ok()?.checked_mul(scale)
}

fn is_valid_name(name: &str) -> bool {
    let mut chars = name.chars();
    chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '-')
}

/// The variable name as the caller spelled it, used when writing.
fn display_name(key: &str) -> &str {
    key.rsplit_once('.').map_or(key, |(_, name)| name)
}

fn render_entry(name: &str, value: &str) -> Line {
    Line::Entry {
        name: name.to_ascii_lowercase(),
        value: Some(value.to_string()),
        raw: format!("\t{name} = {}\n", render_value(value)),
    }
}

fn render_value(value: &str) -> String {
    let quote = value.starts_with(char::is_whitespace)
        || value.ends_with(char::is_whitespace)
        || value.contains(['#', ';']);
    let mut out = String::with_capacity(value.len() + 2);
    if quote {
        out.push('"');
    }
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\u{8}' => out.push_str("\\b"),
            c => out.push(c),
        }
    }
    if quote {
        out.push('"');
    }
    out
}

fn escape_subsection(sub: &str) -> String {
    sub.replace('\\', "\\\\").replace('"', "\\\"")
}

/// `[section]`, `[section "subsection"]` or the legacy `[section.sub]`.
fn parse_header(line: &str) -> std::result::Result<(String, Option<String>), String> {
    let body = &line[1..];
    let name_len = body
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '-' || c == '.'))
        .ok_or("unterminated section header")?;
    let name = &body[..name_len];
    if name.is_empty() {
        return Err("empty section name".into());
    }
    let mut rest = body[name_len..].chars();
    let subsection = match rest.next() {
        Some(']') => match name.split_once('.') {
            Some((section, sub)) => {
                return finish_header(rest.as_str(), section, Some(sub.to_ascii_lowercase()))
            }
            None => None,
        },
        Some(' ' | '\t') => {
            if name.contains('.') {
                return Err("dotted section name with a subsection".into());
            }
            let mut rest_str = rest.as_str().trim_start_matches([' ', '\t']);
            rest_str = rest_str
                .strip_prefix('"')
                .ok_or("expected '\"' before subsection name")?;
            let mut sub = String::new();
            let mut chars = rest_str.chars();
            loop {
                match chars.next() {
                    Some('"') => break,
                    Some('\\') => sub.push(chars.next().ok_or("unterminated subsection")?),
                    Some('\n') | None => return Err("unterminated subsection".into()),
                    Some(c) => sub.push(c),
                }
            }
            let rest_str = chars.as_str();
            let after = rest_str.strip_prefix(']').ok_or("expected ']' after subsection")?;
            return finish_header(after, name, Some(sub));
        }
        _ => return Err("malformed section header".into()),
    };
    finish_header(rest.as_str(), name, subsection)
}

fn finish_header(
    after: &str,
    name: &str,
    subsection: Option<String>,
) -> std::result::Result<(String, Option<String>), String> {
    let after = after.trim();
    if !(after.is_empty() || after.starts_with(['#', ';'])) {
        return Err("unexpected text after section header".into());
    }
    Ok((name.to_ascii_lowercase(), subsection))
}

/// Parse `name [= value]`, pulling continuation lines from `more` into `raw`.
fn parse_entry(
    raw: &mut String,
    more: &mut impl Iterator<Item = String>,
    line_no: &mut usize,
) -> std::result::Result<(String, Option<String>), String> {
    let line = raw.trim_start().to_string();
    let name_len = line
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '-'))
        .unwrap_or(line.len());
    let name = &line[..name_len];
    if !is_valid_name(name) {
        return Err(format!("invalid variable name {name:?}"));
    }
    let rest = line[name_len..].trim_start_matches([' ', '\t']);
    let rest = match rest.chars().next() {
        None | Some('\n' | '\r' | '#' | ';') => return Ok((name.to_ascii_lowercase(), None)),
        Some('=') => &rest[1..],
        Some(c) => return Err(format!("unexpected {c:?} after variable name")),
    };
    let value = parse_value(rest, raw, more, line_no)?;
    Ok((name.to_ascii_lowercase(), Some(value)))
}

fn parse_value(
    first: &str,
    raw: &mut String,
    more: &mut impl Iterator<Item = String>,
    line_no: &mut usize,
) -> std::result::Result<String, String> {
    let mut out = String::new();
    let mut quoted = false;
    let mut trailing_ws = 0usize;
    let mut current = first.to_string();

    loop {
        let mut chars = current.chars();
        let mut continued = false;
        while let Some(c) = chars.next() {
            match c {
                '\n' => break,
                '"' => {
                    quoted = !quoted;
                    trailing_ws = 0;
                }
                '\\' => {
                    let escaped = match chars.next() {
                        Some('\n') | None => {
                            continued = true;
                            break;
                        }
                        Some('\r') if chars.as_str() == "\n" => {
                            continued = true;
                            break;
                        }
                        Some('n') => '\n',
                        Some('t') => '\t',
                        Some('b') => '\u{8}',
                        Some('\\') => '\\',
                        Some('"') => '"',
                        Some(other) => return Err(format!("invalid escape '\\{other}'")),
                    };
                    out.push(escaped);
                    trailing_ws = 0;
                }
                '#' | ';' if !quoted => break,
                c if c.is_whitespace() && !quoted => {
                    if !out.is_empty() {
                        out.push(c);
                        trailing_ws += c.len_utf8();
                    }
                }
                c => {
                    out.push(c);
                    trailing_ws = 0;
                }
            }
        }
        if !continued {
            break;
        }
        match more.next() {
            Some(next) => {
                *line_no += 1;
                raw.push_str(&next);
                current = next;
            }
            None => break,
        }
    }

    if quoted {
        return Err("unterminated quoted value".into());
    }
    out.truncate(out.len() - trailing_ws);
    Ok(out)
}
