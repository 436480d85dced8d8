//! Parsers for SVN XML and text output.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::backend::{ConflictDescription, ConflictKind, NodeKind};
use crate::errors::SvnError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SvnInfo {
    pub root_url: String,
    pub uuid: String,
    pub revision: i64,
    pub url: String,
    pub kind: NodeKind,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SvnLogEntry {
    pub revision: i64,
    pub author: String,
    pub date: String,
    pub message: String,
    pub changed_paths: Vec<SvnChangedPath>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SvnChangedPath {
    pub action: String,
    pub path: String,
    pub copy_from_path: Option<String>,
    pub copy_from_rev: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SvnDiffEntry {
    /// `added`, `deleted`, `modified` or `none`.
    pub item: String,
    /// `file` or `dir`.
    pub kind: String,
    pub props_changed: bool,
    pub path: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SvnListEntry {
    pub name: String,
    pub kind: NodeKind,
}

pub fn parse_svn_info(xml: &str) -> Result<SvnInfo, SvnError> {
    debug!("parsing svn info XML ({} bytes)", xml.len());
    let url = extract_tag_content(xml, "url")
        .ok_or_else(|| SvnError::XmlParseError("missing <url> in svn info".into()))?;
    let root_url = extract_tag_content(xml, "root")
        .ok_or_else(|| SvnError::XmlParseError("missing <root> in svn info".into()))?;
    let uuid = extract_tag_content(xml, "uuid").unwrap_or_default();
    let revision = extract_attribute(xml, "entry", "revision")
        .or_else(|| extract_attribute(xml, "commit", "revision"))
        .and_then(|s| s.parse::<i64>().ok())
        .ok_or_else(|| SvnError::XmlParseError("missing revision in svn info".into()))?;
    let kind = extract_attribute(xml, "entry", "kind")
        .map(|k| NodeKind::from_svn(&k))
        .unwrap_or(NodeKind::None);
    Ok(SvnInfo {
        root_url,
        uuid,
        revision,
        url,
        kind,
    })
}

pub fn parse_svn_log(xml: &str) -> Result<Vec<SvnLogEntry>, SvnError> {
    debug!("parsing svn log XML ({} bytes)", xml.len());
    let mut entries = Vec::new();
    let parts: Vec<&str> = xml.split("<logentry").collect();
    for part in parts.iter().skip(1) {
        let entry_xml = match part.find("</logentry>") {
            Some(pos) => &part[..pos],
            None => part,
        };
        let revision = match extract_attribute_from_fragment(entry_xml, "revision")
            .and_then(|s| s.parse::<i64>().ok())
        {
            Some(rev) => rev,
            None => {
                warn!("skipping SVN log entry with missing or unparseable revision attribute");
                continue;
            }
        };
        let author = extract_tag_content(entry_xml, "author").unwrap_or_default();
        let date = extract_tag_content(entry_xml, "date").unwrap_or_default();
        let message = extract_tag_content(entry_xml, "msg").unwrap_or_default();
        let changed_paths = parse_changed_paths(entry_xml);
        entries.push(SvnLogEntry {
            revision,
            author,
            date,
            message,
            changed_paths,
        });
    }
    debug!(count = entries.len(), "parsed svn log entries");
    Ok(entries)
}

pub fn parse_svn_diff_summarize(xml: &str) -> Result<Vec<SvnDiffEntry>, SvnError> {
    debug!("parsing svn diff --summarize XML ({} bytes)", xml.len());
    let mut entries = Vec::new();
    let parts: Vec<&str> = xml.split("<path").collect();
    for part in parts.iter().skip(1) {
        // skip the <paths> container itself
        if part.starts_with('s') {
            continue;
        }
        let fragment = match part.find("</path>") {
            Some(pos) => &part[..pos],
            None => continue,
        };
        let item = extract_attribute_from_fragment(fragment, "item").unwrap_or_default();
        let kind = extract_attribute_from_fragment(fragment, "kind").unwrap_or_default();
        let props = extract_attribute_from_fragment(fragment, "props").unwrap_or_default();
        let path = match fragment.find('>') {
            Some(pos) => xml_unescape(fragment[pos + 1..].trim()),
            None => String::new(),
        };
        entries.push(SvnDiffEntry {
            item,
            kind,
            props_changed: props != "none" && !props.is_empty(),
            path,
        });
    }
    debug!(count = entries.len(), "parsed svn diff entries");
    Ok(entries)
}

/// Parse `svn list --xml`.
pub fn parse_svn_list(xml: &str) -> Result<Vec<SvnListEntry>, SvnError> {
    debug!("parsing svn list XML ({} bytes)", xml.len());
    if !xml.contains("<lists") && !xml.contains("<list") {
        return Err(SvnError::XmlParseError("missing <list> in svn list".into()));
    }
    let mut entries = Vec::new();
    for part in xml.split("<entry").skip(1) {
        let fragment = match part.find("</entry>") {
            Some(pos) => &part[..pos],
            None => continue,
        };
        let Some(name) = extract_tag_content(fragment, "name") else {
            warn!("skipping svn list entry without <name>");
            continue;
        };
        let kind = extract_attribute_from_fragment(fragment, "kind")
            .map(|k| NodeKind::from_svn(&k))
            .unwrap_or(NodeKind::None);
        entries.push(SvnListEntry { name, kind });
    }
    Ok(entries)
}

/// Extract `N` from a `Committed revision N.` line.
pub fn parse_committed_revision(output: &str) -> Option<i64> {
    for line in output.lines() {
        let line = line.trim();
        if line.starts_with("Committed revision") {
            return line
                .trim_start_matches("Committed revision")
                .trim()
                .trim_end_matches('.')
                .parse::<i64>()
                .ok();
        }
    }
    None
}

/// Collect the conflicts reported in the notification lines of `svn merge`.
///
/// Each notification starts with four status columns (text, properties,
/// unused, tree) and a space; a `C` in any of them marks a conflict.
pub fn parse_merge_conflicts(output: &str) -> Vec<ConflictDescription> {
    let mut conflicts: Vec<ConflictDescription> = Vec::new();
    for line in output.lines() {
        let Some(status) = line.get(..4) else {
            continue;
        };
        if line.as_bytes().get(4) != Some(&b' ') {
            continue;
        }
        if !status
            .chars()
            .all(|c| matches!(c, ' ' | 'A' | 'C' | 'D' | 'E' | 'G' | 'R' | 'U'))
        {
            continue;
        }
        let kind = match status.as_bytes() {
            [b'C', ..] => ConflictKind::Text,
            [_, b'C', ..] => ConflictKind::Property,
            [_, _, _, b'C'] => ConflictKind::Tree,
            _ => continue,
        };
        let raw = line[5..].trim();
        if raw.is_empty() {
            continue;
        }
        let path = normalize_wc_path(raw);
        if conflicts.iter().any(|c| c.path == path) {
            continue;
        }
        conflicts.push(ConflictDescription { path, kind });
    }
    conflicts
}

fn normalize_wc_path(raw: &str) -> String {
    let path = raw.replace('\\', "/");
    match path.strip_prefix("./") {
        Some(rest) => rest.to_string(),
        None => path,
    }
}

/// Split a unified diff into one section per file, keyed by the path of its
/// `Index:` header.
pub fn split_unified_diff(diff: &str) -> BTreeMap<String, String> {
    let mut sections = BTreeMap::new();
    let mut current: Option<(String, String)> = None;
    for line in diff.split_inclusive('\n') {
        if let Some(path) = line.strip_prefix("Index: ") {
            if let Some((p, text)) = current.take() {
                sections.insert(p, text);
            }
            current = Some((path.trim_end().to_string(), line.to_string()));
        } else if let Some((_, text)) = current.as_mut() {
            text.push_str(line);
        }
    }
    if let Some((p, text)) = current {
        sections.insert(p, text);
    }
    sections
}

/// Make a URL reported by svn relative to `base`, decoding `%XX` escapes.
pub fn relative_to(url: &str, base: &str) -> Option<String> {
    let base = base.trim_end_matches('/');
    let decoded_url = decode_uri(url);
    let decoded_base = decode_uri(base);
    let rest = decoded_url.strip_prefix(&decoded_base)?;
    if !rest.is_empty() && !rest.starts_with('/') {
        return None;
    }
    Some(rest.trim_start_matches('/').to_string())
}

fn decode_uri(s: &str) -> String {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            let hex = std::str::from_utf8(&bytes[i + 1..i + 3]).ok();
            if let Some(v) = hex.and_then(|h| u8::from_str_radix(h, 16).ok()) {
                out.push(v);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

fn extract_tag_content(xml: &str, tag: &str) -> Option<String> {
    let open = format!("<{}", tag);
    let close = format!("</{}>", tag);
    let mut search_from = 0;
    while let Some(rel_pos) = xml[search_from..].find(&open) {
        let start_pos = search_from + rel_pos;
        let after_open = &xml[start_pos + open.len()..];
        // next char must be '>' or whitespace, otherwise <url> would match <urlencoded>
        if let Some(ch) = after_open.chars().next() {
            if ch != '>' && !ch.is_ascii_whitespace() {
                search_from = start_pos + open.len();
                continue;
            }
        }
        let content_start = after_open.find('>')? + 1;
        let content = &after_open[content_start..];
        let end_pos = content.find(&close)?;
        return Some(xml_unescape(content[..end_pos].trim()));
    }
    None
}

/// Unescape standard XML entities.
fn xml_unescape(s: &str) -> String {
    s.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

fn extract_attribute(xml: &str, tag: &str, attr: &str) -> Option<String> {
    let open = format!("<{}", tag);
    let start_pos = xml.find(&open)?;
    let after_tag = &xml[start_pos + open.len()..];
    let tag_end = after_tag.find('>')?;
    extract_attr_from_str(&after_tag[..tag_end], attr)
}

fn extract_attribute_from_fragment(fragment: &str, attr: &str) -> Option<String> {
    let tag_end = fragment.find('>').unwrap_or(fragment.len());
    extract_attr_from_str(&fragment[..tag_end], attr)
}

fn extract_attr_from_str(s: &str, attr: &str) -> Option<String> {
    let pattern_dq = format!("{}=\"", attr);
    if let Some(pos) = find_attr(s, &pattern_dq) {
        let after = &s[pos + pattern_dq.len()..];
        let end = after.find('"')?;
        return Some(xml_unescape(&after[..end]));
    }
    let pattern_sq = format!("{}='", attr);
    if let Some(pos) = find_attr(s, &pattern_sq) {
        let after = &s[pos + pattern_sq.len()..];
        let end = after.find('\'')?;
        return Some(xml_unescape(&after[..end]));
    }
    None
}

/// Find `pattern` only where it starts a whole attribute name, so that
/// `kind=` does not match inside `node-kind=`.
fn find_attr(s: &str, pattern: &str) -> Option<usize> {
    let mut from = 0;
    while let Some(rel) = s[from..].find(pattern) {
        let pos = from + rel;
        let preceded_ok = pos == 0
            || s[..pos]
                .chars()
                .last()
                .is_some_and(|c| c.is_ascii_whitespace());
        if preceded_ok {
            return Some(pos);
        }
        from = pos + pattern.len();
    }
    None
}

fn parse_changed_paths(entry_xml: &str) -> Vec<SvnChangedPath> {
    let mut paths = Vec::new();
    let paths_block = match entry_xml.find("<paths>") {
        Some(start) => {
            let rest = &entry_xml[start..];
            match rest.find("</paths>") {
                Some(end) => &rest[..end],
                None => return paths,
            }
        }
        None => return paths,
    };
    for part in paths_block.split("<path").skip(1) {
        if part.starts_with('s') {
            continue;
        }
        let fragment = match part.find("</path>") {
            Some(pos) => &part[..pos],
            None => continue,
        };
        let action = extract_attribute_from_fragment(fragment, "action").unwrap_or_default();
        let copy_from_path = extract_attribute_from_fragment(fragment, "copyfrom-path");
        let copy_from_rev = extract_attribute_from_fragment(fragment, "copyfrom-rev")
            .and_then(|s| s.parse::<i64>().ok());
        let path = match fragment.find('>') {
            Some(pos) => xml_unescape(fragment[pos + 1..].trim()),
            None => String::new(),
        };
        paths.push(SvnChangedPath {
            action,
            path,
            copy_from_path,
            copy_from_rev,
        });
    }
    paths
}
