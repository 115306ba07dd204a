//! Context catalog
//!
//! Parses the client's configuration dump into an ordered list of
//! [`Context`] records. The catalog is never updated in place: every
//! enumeration produces a fresh snapshot, because the file it comes from is
//! owned by someone else and may change between two commands.

use serde::{Deserialize, Deserializer};
use serde_yaml::Value;
use tabled::{settings::Style, Table, Tabled};
use thiserror::Error;

use crate::error::{ShellError, ShellResult, UserInputErrorKind};

/// A named access configuration for one cluster
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Context {
    name: String,
    cluster: String,
}

impl Context {
    pub fn new(name: impl Into<String>, cluster: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            cluster: cluster.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn cluster(&self) -> &str {
        &self.cluster
    }
}

/// Ordinal lookup failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LookupError {
    #[error("selection {ordinal} is out of range (1-{len})")]
    OutOfRange { ordinal: i64, len: usize },
    #[error("'{0}' is not a number")]
    NotAnInteger(String),
}

impl From<LookupError> for ShellError {
    fn from(err: LookupError) -> Self {
        let kind = match err {
            LookupError::OutOfRange { .. } => UserInputErrorKind::OutOfRange,
            LookupError::NotAnInteger(_) => UserInputErrorKind::NotAnInteger,
        };
        ShellError::user_input(kind, err.to_string())
    }
}

/// Ordered snapshot of the available contexts
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContextCatalog {
    contexts: Vec<Context>,
}

/// The part of a `kubectl config view` dump the catalog reads.
///
/// A bare list of entries is accepted as well as a full configuration.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawDump {
    List(Vec<Option<RawEntry>>),
    Config {
        #[serde(default)]
        contexts: Option<Vec<Option<RawEntry>>>,
    },
}

#[derive(Deserialize)]
struct RawEntry {
    #[serde(default, deserialize_with = "scalar")]
    name: Option<String>,
    #[serde(default, deserialize_with = "scalar")]
    cluster: Option<String>,
    #[serde(default)]
    context: Option<RawContextBody>,
}

#[derive(Deserialize)]
struct RawContextBody {
    #[serde(default, deserialize_with = "scalar")]
    cluster: Option<String>,
}

impl RawEntry {
    /// Nameless entries yield nothing
    fn into_context(self) -> Option<Context> {
        let name = trimmed(self.name)?;
        let cluster = trimmed(self.context.and_then(|body| body.cluster))
            .or_else(|| trimmed(self.cluster))
            .unwrap_or_default();
        Some(Context::new(name, cluster))
    }
}

/// Accept any YAML scalar as text; `name: 2024` is still a name
fn scalar<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(text)) => Some(text),
        Some(Value::Number(number)) => Some(number.to_string()),
        Some(Value::Bool(flag)) => Some(flag.to_string()),
        _ => None,
    })
}

fn trimmed(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[derive(Tabled)]
struct ContextRow {
    #[tabled(rename = "#")]
    ordinal: usize,
    #[tabled(rename = "")]
    marker: String,
    #[tabled(rename = "NAME")]
    name: String,
    #[tabled(rename = "CLUSTER")]
    cluster: String,
}

impl ContextCatalog {
    pub fn new(contexts: Vec<Context>) -> Self {
        let mut catalog = Self::default();
        for context in contexts {
            catalog.push_unique(context);
        }
        catalog
    }

    /// Parse a configuration dump.
    ///
    /// Only the top-level `contexts:` list is read when the dump is a
    /// configuration; a bare list is read as that list. Entries without a
    /// name are dropped and the first of two equal names wins.
    pub fn parse(raw: &str) -> ShellResult<Self> {
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        let entries = match serde_yaml::from_str::<Option<RawDump>>(raw)? {
            Some(RawDump::List(entries)) => entries,
            Some(RawDump::Config { contexts }) => contexts.unwrap_or_default(),
            None => Vec::new(),
        };

        let mut catalog = Self::default();
        for context in entries.into_iter().flatten().filter_map(RawEntry::into_context) {
            catalog.push_unique(context);
        }
        Ok(catalog)
    }

    fn push_unique(&mut self, context: Context) {
        if self.contexts.iter().any(|c| c.name == context.name) {
            tracing::debug!(name = %context.name, "skipping duplicate context");
            return;
        }
        self.contexts.push(context);
    }

    pub fn len(&self) -> usize {
        self.contexts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contexts.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Context> {
        self.contexts.iter()
    }

    /// First context, in catalog order, whose name contains `fragment`
    pub fn find_by_fragment(&self, fragment: &str) -> Option<&Context> {
        self.contexts.iter().find(|c| c.name.contains(fragment))
    }

    /// Exact name match, falling back to the first fragment match
    pub fn resolve(&self, query: &str) -> Option<&Context> {
        self.contexts
            .iter()
            .find(|c| c.name == query)
            .or_else(|| self.find_by_fragment(query))
    }

    /// 1-based lookup in display order
    pub fn find_by_ordinal(&self, ordinal: i64) -> Result<&Context, LookupError> {
        let out_of_range = LookupError::OutOfRange {
            ordinal,
            len: self.contexts.len(),
        };
        if ordinal < 1 {
            return Err(out_of_range);
        }
        usize::try_from(ordinal - 1)
            .ok()
            .and_then(|index| self.contexts.get(index))
            .ok_or(out_of_range)
    }

    /// Parse a raw input token as a base-10 ordinal and look it up
    pub fn find_by_ordinal_token(&self, token: &str) -> Result<&Context, LookupError> {
        let token = token.trim();
        let ordinal = token
            .parse::<i64>()
            .map_err(|_| LookupError::NotAnInteger(token.to_string()))?;
        self.find_by_ordinal(ordinal)
    }

    /// Column-aligned listing: ordinal, active marker, name, cluster
    pub fn render_table(&self, active: Option<&str>) -> String {
        let rows = self.contexts.iter().enumerate().map(|(i, c)| ContextRow {
            ordinal: i + 1,
            marker: if Some(c.name.as_str()) == active { "*" } else { "" }.to_string(),
            name: c.name.clone(),
            cluster: c.cluster.clone(),
        });
        Table::new(rows).with(Style::blank()).to_string()
    }
}
