//! Java → Bedrock block translation.
//!
//! Driven by two read-only tables: a per-block-name
//! [`TranslationEntry`] map and a `"id:meta"` → Java descriptor map for
//! legacy schematics. Both are loaded once and shared immutably; the
//! per-conversion memo lives in the [`Translator`] value.

use serde::Deserialize;
use serde_json::Value;
use smol_str::SmolStr;
use std::collections::HashMap;
use tracing::{debug, warn};

use crate::block_state::BlockState;
use crate::error::Result;

/// Java names that translate to nothing at all.
const AIR_SET: [&str; 3] = ["minecraft:air", "minecraft:cave_air", "minecraft:void_air"];

/// Technical blocks that must never be placed by command.
const INVALID_SET: [&str; 3] = [
    "minecraft:piston_head",
    "minecraft:moving_block",
    "minecraft:moving_piston",
];

fn is_air_or_invalid(full_name: &str) -> bool {
    AIR_SET.contains(&full_name) || INVALID_SET.contains(&full_name)
}

/// One string or a list of strings, as table authors prefer.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum StringList {
    One(String),
    Many(Vec<String>),
}

impl StringList {
    fn iter(&self) -> impl Iterator<Item = &str> {
        let slice = match self {
            StringList::One(s) => std::slice::from_ref(s),
            StringList::Many(v) => v.as_slice(),
        };
        slice.iter().map(String::as_str)
    }
}

/// State-value substitution: a list indexed by numeric input or a map
/// keyed by string input.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Remap {
    List(Vec<Value>),
    Table(serde_json::Map<String, Value>),
}

impl Remap {
    fn lookup(&self, value: &StateValue) -> Option<Value> {
        match self {
            Remap::List(list) => value
                .numeric_index()
                .and_then(|i| list.get(i))
                .filter(|v| !v.is_null())
                .cloned(),
            Remap::Table(map) => map.get(&value.lookup_str()).cloned(),
        }
    }
}

/// A node of the dispatch tree. At each level the current identifier
/// key's value selects a child, with `def` as fallback. Leaves either
/// name the Bedrock block outright or patch the surrounding rules.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum MappingNode {
    Name(String),
    Leaf(LeafRules),
    Branch(HashMap<String, MappingNode>),
}

/// Rule patch carried by an object-shaped mapping leaf. The field set
/// is closed so that branch objects (whose keys are state values) fall
/// through to the `Branch` variant during deserialization.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct LeafRules {
    pub name: Option<String>,
    pub additions: serde_json::Map<String, Value>,
    pub removals: Vec<String>,
    pub renames: HashMap<String, String>,
    pub remaps: HashMap<String, Remap>,
}

/// Per-Java-block translation rules, consumed read-only.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TranslationEntry {
    /// Bedrock name override.
    pub name: Option<String>,
    /// State keys that dispatch into `mapping`, outermost first.
    pub identifier: Option<StringList>,
    pub mapping: Option<MappingNode>,
    /// State values injected when the key is absent.
    pub defaults: serde_json::Map<String, Value>,
    /// State keys dropped unconditionally.
    pub removals: Vec<String>,
    /// Java state key → Bedrock state key.
    pub renames: HashMap<String, String>,
    /// Renamed (or original) key → value substitution.
    pub remaps: HashMap<String, Remap>,
    /// Unconditional Bedrock states, appended in table order.
    pub additions: serde_json::Map<String, Value>,
    /// Java state keys that only exist for tile-entity bookkeeping.
    pub tile_extra: HashMap<String, StringList>,
}

/// Default Java → Bedrock table shipped with the crate.
pub const JAVA_TABLE_JSON: &str = include_str!("../data/java_to_bedrock.json");

/// Default legacy `"id:meta"` → Java descriptor table.
pub const LEGACY_TABLE_JSON: &str = include_str!("../data/legacy_map.json");

pub struct Tables {
    java: HashMap<String, TranslationEntry>,
    legacy: HashMap<String, String>,
}

impl Tables {
    pub fn from_json(java_json: &str, legacy_json: &str) -> Result<Self> {
        Ok(Tables {
            java: serde_json::from_str(java_json)?,
            legacy: serde_json::from_str(legacy_json)?,
        })
    }

    /// The tables shipped with the crate.
    pub fn builtin() -> Result<Self> {
        Tables::from_json(JAVA_TABLE_JSON, LEGACY_TABLE_JSON)
    }

    fn entry(&self, full_name: &str) -> Option<&TranslationEntry> {
        self.java.get(full_name).or_else(|| {
            let bare = full_name.split_once(':').map(|(_, b)| b).unwrap_or(full_name);
            self.java.get(bare)
        })
    }

    fn legacy_descriptor(&self, id: u16, meta: u8) -> Option<&str> {
        self.legacy
            .get(&format!("{id}:{meta}"))
            .or_else(|| self.legacy.get(&format!("{id}:0")))
            .map(String::as_str)
    }
}

/// A state value on its way to the output: either the raw string from
/// the Java descriptor or a typed value injected by the tables.
#[derive(Debug, Clone)]
enum StateValue {
    Raw(String),
    Typed(Value),
}

impl StateValue {
    fn lookup_str(&self) -> String {
        match self {
            StateValue::Raw(s) => s.clone(),
            StateValue::Typed(Value::String(s)) => s.clone(),
            StateValue::Typed(v) => v.to_string(),
        }
    }

    fn numeric_index(&self) -> Option<usize> {
        match self {
            StateValue::Raw(s) => s.parse().ok(),
            StateValue::Typed(v) => v.as_u64().map(|n| n as usize),
        }
    }

    /// Bedrock token form: numbers and booleans bare, strings quoted.
    fn render(&self) -> String {
        match self {
            StateValue::Raw(s) => {
                if s.parse::<i64>().is_ok() || s == "true" || s == "false" {
                    s.clone()
                } else {
                    format!("\"{s}\"")
                }
            }
            StateValue::Typed(Value::Number(n)) => n.to_string(),
            StateValue::Typed(Value::Bool(b)) => b.to_string(),
            StateValue::Typed(Value::String(s)) => format!("\"{s}\""),
            StateValue::Typed(v) => format!("\"{v}\""),
        }
    }
}

/// Memo key: palette index for paletted volumes, `id:meta` for legacy.
#[derive(Debug, PartialEq, Eq, Hash)]
enum CacheKey {
    Palette(u32),
    Legacy(u16, u8),
}

/// Stateless translation rules plus a per-conversion memo.
pub struct Translator<'t> {
    tables: &'t Tables,
    cache: HashMap<CacheKey, Option<SmolStr>>,
}

impl<'t> Translator<'t> {
    pub fn new(tables: &'t Tables) -> Self {
        Translator {
            tables,
            cache: HashMap::new(),
        }
    }

    /// Translate a palette entry, memoised by its index so palette
    /// aliases of identical content stay cheap.
    pub fn translate_index(&mut self, index: u32, descriptor: &str) -> Option<SmolStr> {
        if let Some(hit) = self.cache.get(&CacheKey::Palette(index)) {
            return hit.clone();
        }
        let result = self.translate(descriptor);
        self.cache.insert(CacheKey::Palette(index), result.clone());
        result
    }

    /// Translate a legacy `id:meta` pair through the legacy map.
    pub fn translate_legacy(&mut self, id: u16, meta: u8) -> Option<SmolStr> {
        if let Some(hit) = self.cache.get(&CacheKey::Legacy(id, meta)) {
            return hit.clone();
        }
        let result = match self.tables.legacy_descriptor(id, meta) {
            Some(descriptor) => self.translate(descriptor),
            None => {
                warn!(id, meta, "legacy block without a mapping, cell skipped");
                None
            }
        };
        self.cache.insert(CacheKey::Legacy(id, meta), result.clone());
        result
    }

    /// Translate one Java descriptor into its sanitised Bedrock form,
    /// or `None` when the cell must not be emitted.
    pub fn translate(&self, descriptor: &str) -> Option<SmolStr> {
        let parsed = BlockState::parse(descriptor);
        let java_name = normalise_name(&parsed.name);
        if is_air_or_invalid(&java_name) {
            return None;
        }

        let entry = match self.tables.entry(&java_name) {
            Some(entry) => entry.clone(),
            None => {
                debug!(name = %java_name, "no translation entry, passing through");
                TranslationEntry::default()
            }
        };

        let mut states: Vec<(String, StateValue)> = parsed
            .properties
            .iter()
            .map(|(k, v)| (k.to_string(), StateValue::Raw(v.to_string())))
            .collect();

        // Defaults fill in absent keys only.
        for (key, value) in &entry.defaults {
            if !states.iter().any(|(k, _)| k == key) {
                states.push((key.clone(), StateValue::Typed(value.clone())));
            }
        }

        // Unconditional drops plus tile-entity-only keys.
        let tile_drops: Vec<&str> = entry.tile_extra.values().flat_map(StringList::iter).collect();
        states.retain(|(k, _)| !entry.removals.iter().any(|r| r == k) && !tile_drops.contains(&k.as_str()));

        // Call-local rule sets; mapping leaves extend these copies, the
        // shared table is never touched.
        let mut renames = entry.renames.clone();
        let mut remaps = entry.remaps.clone();
        let mut additions: Vec<(String, Value)> = entry
            .additions
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        let mut bedrock_name: Option<String> = None;

        if let (Some(identifier), Some(mapping)) = (&entry.identifier, &entry.mapping) {
            let mut node = Some(mapping);
            for key in identifier.iter() {
                match node {
                    Some(MappingNode::Branch(branch)) => {
                        let value = states
                            .iter()
                            .find(|(k, _)| k == key)
                            .map(|(_, v)| v.lookup_str());
                        node = value
                            .and_then(|v| branch.get(&v))
                            .or_else(|| branch.get("def"));
                        if node.is_none() {
                            break; // no branch and no def: abandon dispatch
                        }
                    }
                    _ => break,
                }
            }
            match node {
                Some(MappingNode::Name(name)) => bedrock_name = Some(name.clone()),
                Some(MappingNode::Leaf(rules)) => {
                    bedrock_name = rules.name.clone();
                    additions.extend(rules.additions.iter().map(|(k, v)| (k.clone(), v.clone())));
                    renames.extend(rules.renames.iter().map(|(k, v)| (k.clone(), v.clone())));
                    remaps.extend(rules.remaps.iter().map(|(k, v)| (k.clone(), v.clone())));
                    states.retain(|(k, _)| !rules.removals.iter().any(|r| r == k));
                }
                Some(MappingNode::Branch(_)) | None => {}
            }
            states.retain(|(k, _)| !identifier.iter().any(|i| i == k));
        }

        let chosen = bedrock_name
            .or_else(|| entry.name.clone())
            .unwrap_or_else(|| java_name.clone());

        let mut pairs: Vec<String> = Vec::with_capacity(states.len() + additions.len());
        for (key, value) in &states {
            let renamed = renames.get(key).cloned().unwrap_or_else(|| key.clone());
            let value = match remaps.get(&renamed).or_else(|| remaps.get(key)) {
                Some(remap) => remap
                    .lookup(value)
                    .map(StateValue::Typed)
                    .unwrap_or_else(|| value.clone()),
                None => value.clone(),
            };
            pairs.push(format!("\"{renamed}\"={}", value.render()));
        }
        for (key, value) in &additions {
            pairs.push(format!("\"{key}\"={}", StateValue::Typed(value.clone()).render()));
        }

        // The mapping may have landed on air or an invalid technical
        // block; those cells are dropped like their Java counterparts.
        let full = normalise_name(&chosen);
        if is_air_or_invalid(&full) {
            return None;
        }

        let sanitised = full.strip_prefix("minecraft:").unwrap_or(&full);
        if pairs.is_empty() {
            Some(SmolStr::new(sanitised))
        } else {
            Some(SmolStr::new(format!("{sanitised}[{}]", pairs.join(","))))
        }
    }
}

/// Lowercase and namespace-qualify a block name.
fn normalise_name(name: &str) -> String {
    let lower = name.trim().to_ascii_lowercase();
    if lower.contains(':') {
        lower
    } else {
        format!("minecraft:{lower}")
    }
}
