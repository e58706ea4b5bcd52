//! Listing output: query evaluation, machine formats and the grouped text view.
//!
//! The listing is built as a JSON value (IOMMU groups keyed in natural
//! order, or a flat device array for the tabular formats), filtered through
//! a query expression, then either encoded in the requested format or
//! rendered as human-readable text.

mod encode;
mod pretty;
pub mod query;

use crate::error::{AutoVfioError, Result};
use crate::vfio::{group_by_iommu, groups_to_value, PciDevice};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::debug;

pub use encode::Encoder;
pub use pretty::{render_groups, render_nodes};

/// Machine-readable output formats.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Json,
    #[default]
    Yaml,
    Xml,
    Toml,
    Props,
    Shell,
    Csv,
    Tsv,
}

impl OutputFormat {
    pub const ALL: [OutputFormat; 8] = [
        Self::Json,
        Self::Yaml,
        Self::Xml,
        Self::Toml,
        Self::Props,
        Self::Shell,
        Self::Csv,
        Self::Tsv,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Yaml => "yaml",
            Self::Xml => "xml",
            Self::Toml => "toml",
            Self::Props => "props",
            Self::Shell => "shell",
            Self::Csv => "csv",
            Self::Tsv => "tsv",
        }
    }

    /// Tabular formats take the flat device list rather than groups.
    pub fn is_tabular(&self) -> bool {
        matches!(self, Self::Csv | Self::Tsv)
    }

    /// Encoder for this format.
    pub fn encoder(&self) -> Box<dyn Encoder> {
        match self {
            Self::Json => Box::new(encode::JsonEncoder),
            Self::Yaml => Box::new(encode::YamlEncoder),
            Self::Xml => Box::new(encode::XmlEncoder),
            Self::Toml => Box::new(encode::TomlEncoder),
            Self::Props => Box::new(encode::PropsEncoder),
            Self::Shell => Box::new(encode::ShellEncoder),
            Self::Csv => Box::new(encode::CsvEncoder { delimiter: ',' }),
            Self::Tsv => Box::new(encode::CsvEncoder { delimiter: '\t' }),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::ALL.into_iter().find(|f| f.as_str() == s.to_lowercase()).ok_or_else(|| {
            let names: Vec<_> = Self::ALL.iter().map(|f| f.as_str()).collect();
            format!("unsupported output format {:?}. One of: {}", s, names.join(", "))
        })
    }
}

/// Encode query results; `None` means the default format (YAML).
pub fn encode(nodes: &[serde_json::Value], format: Option<OutputFormat>) -> Result<String> {
    format.unwrap_or_default().encoder().encode(nodes)
}

/// How a device listing should be presented.
#[derive(Debug, Clone, Default)]
pub struct ListOptions {
    /// Hierarchical text view
    pub tree: bool,
    /// Machine format; text view when unset
    pub format: Option<OutputFormat>,
    /// Query applied before output, `.` when unset
    pub query: Option<String>,
}

/// Produce the full listing text for a set of devices.
pub fn render_listing(devices: &[PciDevice], options: &ListOptions) -> Result<String> {
    let to_value_err = |e: serde_json::Error| AutoVfioError::Internal(e.to_string());

    let document = match options.format {
        Some(format) if format.is_tabular() => {
            serde_json::to_value(devices).map_err(to_value_err)?
        }
        _ => groups_to_value(&group_by_iommu(devices)).map_err(to_value_err)?,
    };

    let expression = options.query.as_deref().unwrap_or(".");
    let nodes = query::evaluate(expression, &document)?;
    debug!(expression = %expression, nodes = nodes.len(), "Evaluated listing query");

    match options.format {
        Some(format) => encode(&nodes, Some(format)),
        None => render_nodes(&nodes, options.tree),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_parse_and_display() {
        for format in OutputFormat::ALL {
            assert_eq!(format.to_string().parse::<OutputFormat>().unwrap(), format);
        }
        assert_eq!("JSON".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
        let err = "ini".parse::<OutputFormat>().unwrap_err();
        assert!(err.contains("tsv"));
    }

    #[test]
    fn test_default_format_is_yaml() {
        assert_eq!(OutputFormat::default(), OutputFormat::Yaml);
        let out = encode(&[serde_json::json!({"a": 1})], None).unwrap();
        assert_eq!(out, "a: 1\n");
    }

    #[test]
    fn test_tabular_formats() {
        assert!(OutputFormat::Csv.is_tabular());
        assert!(OutputFormat::Tsv.is_tabular());
        assert!(!OutputFormat::Json.is_tabular());
    }
}
