use std::fs;
use std::path::Path;

use rand::Rng;
use rand::seq::SliceRandom;
use serde_json::Value;

use super::{ProverbError, ProverbResult};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProverbEntry {
    pub proverb: String,
    pub meaning: String,
}

/// Entries drawn by one `sample` call, in presentation order.
pub type ProverbSample = Vec<ProverbEntry>;

/// Read-only proverb collection, loaded once at startup and shared across sessions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProverbStore {
    entries: Vec<ProverbEntry>,
}

impl ProverbStore {
    pub fn load(path: &Path) -> ProverbResult<Self> {
        let source_name = path.display().to_string();
        let text = fs::read_to_string(path).map_err(|err| {
            ProverbError::data_format(&source_name, format!("unable to read file: {err}"))
        })?;
        Self::from_json_str(&source_name, &text)
    }

    pub fn from_json_str(source_name: &str, text: &str) -> ProverbResult<Self> {
        let root: Value = serde_json::from_str(text)
            .map_err(|err| ProverbError::data_format(source_name, format!("invalid JSON: {err}")))?;
        let Value::Array(items) = root else {
            return Err(ProverbError::data_format(
                source_name,
                "expected a JSON array of {proverb, meaning} objects",
            ));
        };

        let entries = items
            .iter()
            .enumerate()
            .map(|(index, item)| parse_entry(source_name, index, item))
            .collect::<ProverbResult<Vec<_>>>()?;

        Ok(Self { entries })
    }

    pub fn entries(&self) -> &[ProverbEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn sample(&self, count: usize) -> ProverbResult<ProverbSample> {
        self.sample_with(count, &mut rand::thread_rng())
    }

    /// Draws `count` distinct entries without replacement.
    pub fn sample_with<R: Rng + ?Sized>(
        &self,
        count: usize,
        rng: &mut R,
    ) -> ProverbResult<ProverbSample> {
        if count == 0 {
            return Err(ProverbError::InvalidArgument(
                "sample size must be at least 1".to_string(),
            ));
        }
        if count > self.entries.len() {
            return Err(ProverbError::InvalidArgument(format!(
                "sample size {count} exceeds the {} available proverbs",
                self.entries.len()
            )));
        }

        Ok(self.entries.choose_multiple(rng, count).cloned().collect())
    }
}

fn parse_entry(source_name: &str, index: usize, item: &Value) -> ProverbResult<ProverbEntry> {
    let Some(object) = item.as_object() else {
        return Err(ProverbError::data_format(
            source_name,
            format!("entry {index} is not an object"),
        ));
    };

    let field = |name: &str| -> ProverbResult<String> {
        match object.get(name) {
            Some(Value::String(text)) => Ok(text.clone()),
            Some(_) => Err(ProverbError::data_format(
                source_name,
                format!("entry {index}: field '{name}' must be a string"),
            )),
            None => Err(ProverbError::data_format(
                source_name,
                format!("entry {index}: missing field '{name}'"),
            )),
        }
    };

    Ok(ProverbEntry {
        proverb: field("proverb")?,
        meaning: field("meaning")?,
    })
}
