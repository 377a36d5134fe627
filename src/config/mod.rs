//! Cluster configuration.
//!
//! A [`Configuration`] is a flat set of string properties merged from one or
//! more Hadoop-style XML resources. [`ConfigLocation`] finds and validates the
//! directory holding the two site files the client needs.

mod location;
mod xml;

use std::{
    collections::{HashMap, HashSet},
    fs,
    path::{Path, PathBuf},
};

use crate::error::ConnectionError;

pub use location::{ConfigLocation, CORE_SITE, HDFS_SITE};
pub use xml::Property;

/// Upper bound on nested `${...}` expansions for a single value.
const MAX_SUBST: usize = 20;

#[derive(Debug, Clone, Default)]
pub struct Configuration {
    properties: HashMap<String, String>,
    finals: HashSet<String>,
    resources: Vec<PathBuf>,
}

impl Configuration {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads an XML resource and merges its properties.
    ///
    /// Keys already present are overridden unless an earlier resource marked
    /// them final. Adding the same resource twice leaves the effective values
    /// unchanged.
    pub fn add_resource<P: AsRef<Path>>(&mut self, path: P) -> Result<(), ConnectionError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConnectionError::ReadConfig {
            path: path.to_owned(),
            source,
        })?;
        let properties = xml::parse(&content).map_err(|source| ConnectionError::ParseConfig {
            path: path.to_owned(),
            source,
        })?;

        debug!("loaded {} properties from {}", properties.len(), path.display());

        self.merge(properties);
        self.resources.push(path.to_owned());
        Ok(())
    }

    /// Merges already parsed properties, honouring `final` markers.
    pub fn merge<I: IntoIterator<Item = Property>>(&mut self, properties: I) {
        for property in properties {
            if self.finals.contains(&property.name) {
                if self.properties.get(&property.name) != Some(&property.value) {
                    warn!(
                        "attempt to override final parameter {}; ignoring",
                        property.name
                    );
                }
                continue;
            }

            if property.is_final {
                self.finals.insert(property.name.clone());
            }
            self.properties.insert(property.name, property.value);
        }
    }

    pub fn set<K: Into<String>, V: Into<String>>(&mut self, key: K, value: V) {
        self.properties.insert(key.into(), value.into());
    }

    /// Returns the value with `${key}` and `${env.NAME}` references expanded.
    pub fn get(&self, key: &str) -> Option<String> {
        self.get_raw(key).map(|value| self.substitute(value))
    }

    /// Returns the value exactly as loaded.
    pub fn get_raw(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }

    pub fn get_u64(&self, key: &str, default: u64) -> Result<u64, ConnectionError> {
        match self.get(key) {
            None => Ok(default),
            Some(value) => value
                .trim()
                .parse()
                .map_err(|_| ConnectionError::InvalidValue {
                    key: key.to_owned(),
                    value,
                }),
        }
    }

    pub fn get_bool(&self, key: &str, default: bool) -> Result<bool, ConnectionError> {
        match self.get(key) {
            None => Ok(default),
            Some(value) => match value.trim().to_ascii_lowercase().as_str() {
                "true" => Ok(true),
                "false" => Ok(false),
                _ => Err(ConnectionError::InvalidValue {
                    key: key.to_owned(),
                    value,
                }),
            },
        }
    }

    /// Resources merged so far, in load order.
    pub fn resources(&self) -> &[PathBuf] {
        &self.resources
    }

    pub fn len(&self) -> usize {
        self.properties.len()
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }

    fn substitute(&self, value: &str) -> String {
        let mut expanded = value.to_owned();

        for _ in 0..MAX_SUBST {
            let Some(start) = expanded.find("${") else {
                return expanded;
            };
            let Some(len) = expanded[start + 2..].find('}') else {
                return expanded;
            };
            let name = &expanded[start + 2..start + 2 + len];

            let replacement = match name.strip_prefix("env.") {
                Some(var) => std::env::var(var).ok(),
                None => self.properties.get(name).cloned(),
            };

            // Unresolvable references are left as they are.
            let Some(replacement) = replacement else {
                return expanded;
            };

            expanded.replace_range(start..start + 3 + len, &replacement);
        }

        if expanded.contains("${") {
            warn!("variable substitution depth too large in {value:?}");
        }
        expanded
    }
}
