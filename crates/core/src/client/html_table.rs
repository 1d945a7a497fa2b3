//! Converts the first HTML `<table>` of a page into a JSON array.
//!
//! The output has one object per `<tr>`, keyed by the text of the header
//! row. The header row itself is row 0 (mapping each header to itself), so
//! consumers skip [`crate::client::HostType::header_rows`] rows.

use once_cell::sync::Lazy;
use regex_lite::Regex;
use serde_json::{Map, Value};

use super::ClientError;

static TABLE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<table\b[^>]*>(.*?)</table\s*>").unwrap());
static ROW_START_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)<tr\b[^>]*>").unwrap());
static ROW_END_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)</tr\s*>").unwrap());
static CELL_START_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)<t[dh]\b[^>]*>").unwrap());
static CELL_END_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)</t[dh]\s*>").unwrap());
static TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<[^>]*>").unwrap());
static ENTITY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"&(#[0-9]+|#[xX][0-9a-fA-F]+|[a-zA-Z]+);").unwrap());

/// Parse the first table in `html` into a JSON array of row objects.
pub fn table_to_json(html: &str) -> Result<Value, ClientError> {
    let rows = extract_rows(html)?;
    let mut rows = rows.into_iter();
    let headers: Vec<String> = match rows.next() {
        Some(header_cells) => header_cells
            .into_iter()
            .enumerate()
            .map(|(i, h)| if h.is_empty() { format!("column_{}", i) } else { h })
            .collect(),
        None => return Ok(Value::Array(vec![])),
    };

    let mut out = Vec::new();
    let header_row: Map<String, Value> = headers
        .iter()
        .map(|h| (h.clone(), Value::String(h.clone())))
        .collect();
    out.push(Value::Object(header_row));

    for cells in rows {
        let row: Map<String, Value> = headers
            .iter()
            .zip(cells)
            .map(|(h, cell)| (h.clone(), Value::String(cell)))
            .collect();
        out.push(Value::Object(row));
    }

    Ok(Value::Array(out))
}

/// Cell texts of every row of the first table.
pub fn extract_rows(html: &str) -> Result<Vec<Vec<String>>, ClientError> {
    let table = TABLE_RE
        .captures(html)
        .and_then(|c| c.get(1))
        .ok_or_else(|| ClientError::Protocol("no <table> found in listing page".to_string()))?
        .as_str();

    let rows = ROW_START_RE
        .split(table)
        .skip(1)
        .map(|chunk| {
            let row = cut_at(&ROW_END_RE, chunk);
            CELL_START_RE
                .split(row)
                .skip(1)
                .map(|cell| cell_text(cut_at(&CELL_END_RE, cell)))
                .collect::<Vec<_>>()
        })
        .filter(|cells| !cells.is_empty())
        .collect();

    Ok(rows)
}

fn cut_at<'a>(re: &Regex, s: &'a str) -> &'a str {
    match re.find(s) {
        Some(m) => &s[..m.start()],
        None => s,
    }
}

/// Visible text of a cell: tags stripped, entities decoded, line breaks
/// turned into spaces and the ends trimmed.
fn cell_text(raw: &str) -> String {
    let stripped = TAG_RE.replace_all(raw, "");
    let decoded = decode_entities(&stripped);
    decoded
        .replace(['\r', '\n', '\t'], " ")
        .trim()
        .to_string()
}

fn decode_entities(s: &str) -> String {
    ENTITY_RE
        .replace_all(s, |caps: &regex_lite::Captures| {
            let name = &caps[1];
            let decoded = match name {
                "amp" => Some('&'),
                "lt" => Some('<'),
                "gt" => Some('>'),
                "quot" => Some('"'),
                "apos" => Some('\''),
                "nbsp" => Some(' '),
                _ if name.starts_with("#x") || name.starts_with("#X") => {
                    u32::from_str_radix(&name[2..], 16).ok().and_then(char::from_u32)
                }
                _ if name.starts_with('#') => name[1..].parse().ok().and_then(char::from_u32),
                _ => None,
            };
            match decoded {
                Some(c) => c.to_string(),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}
