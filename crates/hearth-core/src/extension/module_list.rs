use std::collections::BTreeMap;

use indexmap::IndexMap;

use crate::extension::error::ExtensionError;
use crate::kernel::constants;
use crate::kernel::error::Result;
use crate::storage::ConfigStorage;

/// Enabled modules in load order, mapped to their weight.
///
/// Load order is ascending weight, ties broken by name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModuleList {
    modules: IndexMap<String, i64>,
}

impl ModuleList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from name/weight pairs and sort into load order
    pub fn from_weights<I, S>(weights: I) -> Self
    where
        I: IntoIterator<Item = (S, i64)>,
        S: Into<String>,
    {
        let mut modules: IndexMap<String, i64> = weights.into_iter().map(|(n, w)| (n.into(), w)).collect();
        modules.sort_by(|a_name, a_weight, b_name, b_weight| a_weight.cmp(b_weight).then_with(|| a_name.cmp(b_name)));
        Self { modules }
    }

    /// Read the `module` map of `core.extension`. A missing config object
    /// yields an empty list.
    pub fn from_config(storage: &dyn ConfigStorage) -> Result<Self> {
        let Some(data) = storage.read(constants::CONFIG_EXTENSION)? else {
            return Ok(Self::new());
        };
        if !data.contains_key("module") {
            return Ok(Self::new());
        }
        let weights: BTreeMap<String, i64> =
            data.get("module").ok_or_else(|| ExtensionError::InvalidModuleList {
                key: constants::CONFIG_EXTENSION.to_string(),
                message: "'module' must map module names to integer weights".to_string(),
            })?;
        Ok(Self::from_weights(weights))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.modules.contains_key(name)
    }

    pub fn weight(&self, name: &str) -> Option<i64> {
        self.modules.get(name).copied()
    }

    /// Module names in load order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.modules.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, i64)> {
        self.modules.iter().map(|(name, weight)| (name.as_str(), *weight))
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}
