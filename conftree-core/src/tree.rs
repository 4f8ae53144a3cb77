use std::collections::btree_map;
use std::collections::BTreeMap;
use std::fmt::{self, Display, Formatter};
use std::net::Ipv4Addr;

use serde::Serialize;

use crate::lexer::split_tokens;

/// Keys whose two-token `address mask` values are folded into CIDR form.
const ADDRESS_MASK_KEYS: &[&str] = &["ip", "subnet", "dst", "src", "src_subnet", "dst_subnet"];

/// A parsed field value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Value {
    /// Single token.
    Scalar(String),
    /// Two or more tokens, in input order.
    List(Vec<String>),
    /// Nested settings block.
    Object(Fields),
    /// Nested list of `edit` entries.
    Objects(Vec<Entry>),
}

impl Value {
    /// Scalar text, also accepting a one-element list.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Scalar(s) => Some(s),
            Value::List(items) if items.len() == 1 => Some(&items[0]),
            _ => None,
        }
    }

    /// Tokens of a scalar or list value; nested blocks yield nothing.
    pub fn items(&self) -> Vec<&str> {
        match self {
            Value::Scalar(s) => vec![s.as_str()],
            Value::List(items) => items.iter().map(String::as_str).collect(),
            Value::Object(_) | Value::Objects(_) => Vec::new(),
        }
    }

    fn push_tokens(&mut self, tokens: Vec<String>) {
        let mut items = match std::mem::replace(self, Value::List(Vec::new())) {
            Value::Scalar(s) => vec![s],
            Value::List(items) => items,
            Value::Object(_) | Value::Objects(_) => Vec::new(),
        };
        items.extend(tokens);
        *self = if items.len() == 1 {
            Value::Scalar(items.remove(0))
        } else {
            Value::List(items)
        };
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Value::Scalar(s) => write!(f, "{s}"),
            Value::List(items) => write!(f, "{}", items.join(" ")),
            Value::Object(fields) => write!(f, "{{{} fields}}", fields.len()),
            Value::Objects(entries) => write!(f, "[{} entries]", entries.len()),
        }
    }
}

/// Field map of one entry or settings block, keyed by normalised key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Fields(BTreeMap<String, Value>);

impl Fields {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        self.0.insert(key.into(), value);
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.remove(key)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Scalar value of `key`.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    /// Tokens of `key` as owned strings; missing keys yield an empty list.
    pub fn get_list(&self, key: &str) -> Vec<String> {
        self.get(key)
            .map(|v| v.items().into_iter().map(ToOwned::to_owned).collect())
            .unwrap_or_default()
    }

    /// Nested settings block stored under `key`.
    pub fn get_object(&self, key: &str) -> Option<&Fields> {
        match self.get(key) {
            Some(Value::Object(fields)) => Some(fields),
            _ => None,
        }
    }

    /// Nested entries stored under `key`.
    pub fn get_entries(&self, key: &str) -> &[Entry] {
        match self.get(key) {
            Some(Value::Objects(entries)) => entries,
            _ => &[],
        }
    }

    /// `true` for `enable`, `false` for `disable`, `default` otherwise.
    pub fn flag(&self, key: &str, default: bool) -> bool {
        match self.get_str(key) {
            Some("enable") => true,
            Some("disable") => false,
            _ => default,
        }
    }

    /// Apply `set key value`.
    pub fn set_raw(&mut self, key: &str, raw: &str) {
        self.insert(key, parse_value(key, raw));
    }

    /// Apply `append key value`, extending any existing scalar or list.
    pub fn append_raw(&mut self, key: &str, raw: &str) {
        let tokens = split_tokens(raw);
        match self.0.get_mut(key) {
            Some(existing) => existing.push_tokens(tokens),
            None => self.insert(key, tokens_to_value(tokens)),
        }
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, Value> {
        self.0.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<'a> IntoIterator for &'a Fields {
    type Item = (&'a String, &'a Value);
    type IntoIter = btree_map::Iter<'a, String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl FromIterator<(String, Value)> for Fields {
    fn from_iter<T: IntoIterator<Item = (String, Value)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// One `edit <name>` ... `next` entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Entry {
    pub name: String,
    pub fields: Fields,
}

impl Entry {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Fields::new(),
        }
    }
}

/// Body of a `config` block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "shape", content = "data", rename_all = "snake_case")]
pub enum BlockBody {
    /// The block opened with `edit`: an ordered list of named entries.
    Entries(Vec<Entry>),
    /// A single settings map.
    Settings(Fields),
}

impl BlockBody {
    /// Entries of a list block; an empty settings block counts as an empty list.
    pub fn entries(&self) -> Option<&[Entry]> {
        match self {
            BlockBody::Entries(entries) => Some(entries),
            BlockBody::Settings(fields) if fields.is_empty() => Some(&[]),
            BlockBody::Settings(_) => None,
        }
    }

    /// Settings map of a settings block; an empty list block counts as empty settings.
    pub fn settings(&self) -> Option<Fields> {
        match self {
            BlockBody::Settings(fields) => Some(fields.clone()),
            BlockBody::Entries(entries) if entries.is_empty() => Some(Fields::new()),
            BlockBody::Entries(_) => None,
        }
    }

    /// Shape label used in messages.
    pub fn shape(&self) -> &'static str {
        match self {
            BlockBody::Entries(_) => "entries",
            BlockBody::Settings(_) => "settings",
        }
    }

    pub fn into_value(self) -> Value {
        match self {
            BlockBody::Entries(entries) => Value::Objects(entries),
            BlockBody::Settings(fields) => Value::Object(fields),
        }
    }
}

/// Parse the raw text after `set <key>`.
///
/// Quoted tokens lose their quotes, a single token becomes a scalar and
/// several become a list. For address-like keys an `address mask` pair is
/// folded into `address/prefix`.
pub fn parse_value(key: &str, raw: &str) -> Value {
    let tokens = split_tokens(raw);
    if tokens.len() == 2 && ADDRESS_MASK_KEYS.contains(&key) {
        if let Some(cidr) = to_cidr(&tokens[0], &tokens[1]) {
            return Value::Scalar(cidr);
        }
    }
    tokens_to_value(tokens)
}

/// Fold an address and a dotted netmask into CIDR notation.
///
/// Returns `None` unless both parse and the mask is contiguous.
pub fn to_cidr(address: &str, mask: &str) -> Option<String> {
    let address: Ipv4Addr = address.parse().ok()?;
    let bits = u32::from(mask.parse::<Ipv4Addr>().ok()?);
    if bits.leading_ones() + bits.trailing_zeros() != 32 {
        return None;
    }
    Some(format!("{address}/{}", bits.count_ones()))
}

fn tokens_to_value(mut tokens: Vec<String>) -> Value {
    match tokens.len() {
        0 => Value::Scalar(String::new()),
        1 => Value::Scalar(tokens.remove(0)),
        _ => Value::List(tokens),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn folds_address_and_mask_into_cidr() {
        assert_eq!(
            parse_value("ip", "192.168.1.1 255.255.255.0"),
            Value::Scalar("192.168.1.1/24".to_string())
        );
        assert_eq!(
            parse_value("subnet", "0.0.0.0 0.0.0.0"),
            Value::Scalar("0.0.0.0/0".to_string())
        );
        // Non-contiguous masks are left alone.
        assert_eq!(
            parse_value("subnet", "10.0.0.0 255.0.255.0"),
            Value::List(vec!["10.0.0.0".to_string(), "255.0.255.0".to_string()])
        );
        // Only address-like keys are folded.
        assert_eq!(
            parse_value("wildcard", "10.0.0.0 255.255.255.0"),
            Value::List(vec!["10.0.0.0".to_string(), "255.255.255.0".to_string()])
        );
    }

    #[test]
    fn single_token_is_scalar_and_many_are_list() {
        assert_eq!(parse_value("member", "\"web\""), Value::Scalar("web".to_string()));
        assert_eq!(
            parse_value("member", "\"web\" \"db\""),
            Value::List(vec!["web".to_string(), "db".to_string()])
        );
        assert_eq!(
            parse_value("comments", "\"two words\""),
            Value::Scalar("two words".to_string())
        );
    }

    #[test]
    fn append_extends_existing_values() {
        let mut fields = Fields::new();
        fields.set_raw("member", "\"a\"");
        fields.append_raw("member", "\"b\" \"c\"");
        fields.append_raw("allowaccess", "ping");
        assert_eq!(fields.get_list("member"), vec!["a", "b", "c"]);
        assert_eq!(fields.get_str("allowaccess"), Some("ping"));
    }

    #[test]
    fn flag_reads_enable_disable() {
        let mut fields = Fields::new();
        fields.set_raw("status", "disable");
        assert!(!fields.flag("status", true));
        assert!(fields.flag("nat", true));
    }
}
