//! Java block descriptor handling.
//!
//! The canonical textual form is `minecraft:<name>` or
//! `minecraft:<name>[k1=v1,k2=v2,...]` with property keys sorted
//! ascending.

use smol_str::SmolStr;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockState {
    pub name: SmolStr,
    pub properties: Vec<(SmolStr, SmolStr)>,
}

impl fmt::Display for BlockState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        if !self.properties.is_empty() {
            write!(f, "[")?;
            for (i, (key, value)) in self.properties.iter().enumerate() {
                if i > 0 {
                    write!(f, ",")?;
                }
                write!(f, "{}={}", key, value)?;
            }
            write!(f, "]")?;
        }
        Ok(())
    }
}

impl BlockState {
    pub fn new(name: impl Into<SmolStr>) -> Self {
        BlockState {
            name: name.into(),
            properties: Vec::new(),
        }
    }

    pub fn with_property(mut self, key: impl Into<SmolStr>, value: impl Into<SmolStr>) -> Self {
        self.properties.push((key.into(), value.into()));
        self
    }

    pub fn get_property(&self, key: &str) -> Option<&SmolStr> {
        self.properties
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }

    /// Canonical descriptor: properties sorted by key.
    pub fn to_descriptor(&self) -> String {
        let mut sorted = self.clone();
        sorted.properties.sort_by(|a, b| a.0.cmp(&b.0));
        sorted.to_string()
    }

    /// Parse `name[k=v,...]` back into a state. The name is kept verbatim;
    /// namespace normalisation is the translator's concern.
    pub fn parse(descriptor: &str) -> Self {
        let descriptor = descriptor.trim();
        let (name, rest) = match descriptor.find('[') {
            Some(pos) => (&descriptor[..pos], Some(&descriptor[pos + 1..])),
            None => (descriptor, None),
        };

        let mut state = BlockState::new(name);
        if let Some(rest) = rest {
            let body = rest.strip_suffix(']').unwrap_or(rest);
            for pair in body.split(',') {
                let pair = pair.trim();
                if pair.is_empty() {
                    continue;
                }
                match pair.split_once('=') {
                    Some((k, v)) => state.properties.push((k.trim().into(), v.trim().into())),
                    None => state.properties.push((pair.into(), SmolStr::default())),
                }
            }
        }
        state
    }
}
