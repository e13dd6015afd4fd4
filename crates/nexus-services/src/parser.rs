//! Line-oriented reader/writer for the declarative services file.
//!
//! ```text
//! grafana = {
//!   enabled     = true
//!   core        = false
//!   subdomain   = "grafana"
//!   port        = 3000
//!   public      = false
//!   description = "Dashboards"
//! }
//! ```
//!
//! Anything that is not a recognised attribute is ignored. A block left open
//! when another header starts (or at end of input) is dropped. Inside an open
//! block only a bare `name = {` line starts a new block; one-line
//! `name = { ... }` forms there are nested values and are skipped.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

static HEADER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*([a-zA-Z0-9-]+)\s*=\s*\{(.*)$").expect("static regex")
});
static BOOL_ATTR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*([a-z_]+)\s*=\s*(true|false)\s*$").expect("static regex")
});
static STRING_ATTR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"^\s*([a-z_]+)\s*=\s*"(.*)"\s*$"#).expect("static regex"));
static UINT_ATTR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*([a-z_]+)\s*=\s*(\d+)\s*$").expect("static regex"));

/// One declared service block.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceDefinition {
    pub name: String,
    /// The block's `enabled` value: the desired state before anyone toggles it.
    pub default_enabled: bool,
    pub core: bool,
    pub subdomain: String,
    pub port: u32,
    pub public: bool,
    pub description: String,
}

impl ServiceDefinition {
    fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }

    fn apply_line(&mut self, line: &str) {
        if let Some(c) = BOOL_ATTR.captures(line) {
            let value = &c[2] == "true";
            match &c[1] {
                "enabled" => self.default_enabled = value,
                "core" => self.core = value,
                "public" => self.public = value,
                _ => {}
            }
        } else if let Some(c) = STRING_ATTR.captures(line) {
            match &c[1] {
                "subdomain" => self.subdomain = c[2].to_string(),
                "description" => self.description = c[2].to_string(),
                _ => {}
            }
        } else if let Some(c) = UINT_ATTR.captures(line) {
            if &c[1] == "port" {
                // out-of-range ports keep the zero value
                self.port = c[2].parse().unwrap_or(0);
            }
        }
    }
}

/// Header captures for `line`, given whether a block is currently open.
fn header(line: &str, block_open: bool) -> Option<regex::Captures<'_>> {
    let c = HEADER.captures(line)?;
    let rest = c.get(2).map_or("", |m| m.as_str());
    (!block_open || rest.trim().is_empty()).then_some(c)
}

/// Content after `{` on a header line, and whether the block closes there.
fn header_rest(rest: &str) -> (&str, bool) {
    let rest = rest.trim();
    match rest.strip_suffix('}') {
        Some(inner) => (inner.trim(), true),
        None => (rest, false),
    }
}

/// Parse every complete block, in source order.
pub fn parse_services(text: &str) -> Vec<ServiceDefinition> {
    let mut services = Vec::new();
    let mut current: Option<ServiceDefinition> = None;

    for line in text.lines() {
        if let Some(c) = header(line, current.is_some()) {
            // an unclosed block is discarded here
            let mut def = ServiceDefinition::named(&c[1]);
            let (inline, closed) = header_rest(c.get(2).map_or("", |m| m.as_str()));
            if !inline.is_empty() {
                def.apply_line(inline);
            }
            if closed {
                services.push(def);
                current = None;
            } else {
                current = Some(def);
            }
            continue;
        }

        if line.trim() == "}" {
            services.extend(current.take());
        } else if let Some(def) = current.as_mut() {
            def.apply_line(line);
        }
    }

    services
}

/// Boolean attributes the write path can rewrite.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoolField {
    Enabled,
    Core,
    Public,
}

impl BoolField {
    pub fn as_str(&self) -> &'static str {
        match self {
            BoolField::Enabled => "enabled",
            BoolField::Core => "core",
            BoolField::Public => "public",
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("Service not found: {0}")]
    NotFound(String),

    #[error("Failed to update service: {service} ({field})")]
    UpdateFailed {
        service: String,
        field: &'static str,
    },
}

/// Rewrite `field` of block `service` to `value`, leaving every other byte
/// of `text` as it was.
pub fn update_service_field(
    text: &str,
    service: &str,
    field: BoolField,
    value: bool,
) -> Result<String, ParseError> {
    let key = field.as_str();
    let whole_line = Regex::new(&format!(r"^(\s*{key}\s*=\s*)(true|false)(\s*)$"))
        .map_err(|_| ParseError::UpdateFailed {
            service: service.to_string(),
            field: key,
        })?;
    let inline = Regex::new(&format!(r"(\b{key}\s*=\s*)(true|false)\b")).map_err(|_| {
        ParseError::UpdateFailed {
            service: service.to_string(),
            field: key,
        }
    })?;
    let replacement = format!("${{1}}{value}");

    let mut lines: Vec<String> = text.split('\n').map(String::from).collect();
    let mut found = false;
    let mut updated = false;
    let mut open = false;
    let mut in_target = false;

    for line in lines.iter_mut() {
        if let Some(c) = header(line, open) {
            let is_target = &c[1] == service;
            found |= is_target;
            let rest_start = c.get(2).map_or(line.len(), |m| m.start());
            let (head, rest) = line.split_at(rest_start);
            let (_, closed) = header_rest(rest);
            open = !closed;
            in_target = is_target && !closed;
            if is_target && inline.is_match(rest) {
                let rest = inline.replacen(rest, 1, replacement.as_str()).into_owned();
                *line = format!("{head}{rest}");
                updated = true;
                break;
            }
            continue;
        }

        if line.trim() == "}" {
            if in_target {
                break;
            }
            open = false;
        } else if in_target && whole_line.is_match(line) {
            *line = whole_line
                .replace(line, format!("${{1}}{value}${{3}}").as_str())
                .into_owned();
            updated = true;
            break;
        }
    }

    if !found {
        return Err(ParseError::NotFound(service.to_string()));
    }
    if !updated {
        return Err(ParseError::UpdateFailed {
            service: service.to_string(),
            field: key,
        });
    }
    Ok(lines.join("\n"))
}
