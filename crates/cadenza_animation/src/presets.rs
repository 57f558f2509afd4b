//! Animation presets
//!
//! A preset is a named options record (duration, easing, offsets, keyframes)
//! that `add` merges into an options record as defaults. Explicit fields on
//! the options record always win.
//!
//! Presets come from [`PresetRegistry::with_builtins`] and from TOML files:
//!
//! ```toml
//! [[preset]]
//! name = "blink"
//! duration = 300
//! easing = "easeInOut"
//! keyframes = [{ opacity = 1.0 }, { opacity = 0.0 }, { opacity = 1.0 }]
//! ```

use crate::keyframe::KeyframeSpec;
use cadenza_core::{CadenzaError, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// An options record without targets
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PresetDefinition {
    #[serde(default)]
    pub duration: Option<f64>,
    #[serde(default)]
    pub easing: Option<String>,
    #[serde(default)]
    pub from: Option<f64>,
    #[serde(default)]
    pub to: Option<f64>,
    #[serde(default)]
    pub keyframes: Vec<KeyframeSpec>,
}

impl PresetDefinition {
    fn new(duration: f64, easing: &str, keyframes: Vec<KeyframeSpec>) -> Self {
        Self {
            duration: Some(duration),
            easing: Some(easing.to_string()),
            from: None,
            to: None,
            keyframes,
        }
    }
}

/// A named preset as written in a preset or scene file
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PresetEntry {
    pub name: String,
    #[serde(default)]
    pub duration: Option<f64>,
    #[serde(default)]
    pub easing: Option<String>,
    #[serde(default)]
    pub from: Option<f64>,
    #[serde(default)]
    pub to: Option<f64>,
    #[serde(default)]
    pub keyframes: Vec<KeyframeSpec>,
}

impl PresetEntry {
    fn into_parts(self) -> (String, PresetDefinition) {
        (
            self.name,
            PresetDefinition {
                duration: self.duration,
                easing: self.easing,
                from: self.from,
                to: self.to,
                keyframes: self.keyframes,
            },
        )
    }
}

#[derive(Deserialize)]
struct PresetFile {
    #[serde(default, rename = "preset")]
    presets: Vec<PresetEntry>,
}

/// Looks up presets by name
pub trait PresetLookup {
    fn lookup(&self, name: &str) -> Option<PresetDefinition>;
}

/// Registry of named presets, in registration order
#[derive(Clone, Debug, Default)]
pub struct PresetRegistry {
    presets: IndexMap<String, PresetDefinition>,
}

impl PresetRegistry {
    /// An empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding the built-in entry animations
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        let frame = KeyframeSpec::new;

        registry.register(
            "fadeIn",
            PresetDefinition::new(
                400.0,
                "easeOut",
                vec![frame().prop("opacity", 0.0), frame().prop("opacity", 1.0)],
            ),
        );
        registry.register(
            "fadeOut",
            PresetDefinition::new(
                400.0,
                "easeIn",
                vec![frame().prop("opacity", 1.0), frame().prop("opacity", 0.0)],
            ),
        );
        registry.register(
            "slideInLeft",
            PresetDefinition::new(
                500.0,
                "easeOutCubic",
                vec![
                    frame().prop("translateX", -100.0).prop("opacity", 0.0),
                    frame().prop("translateX", 0.0).prop("opacity", 1.0),
                ],
            ),
        );
        registry.register(
            "slideInRight",
            PresetDefinition::new(
                500.0,
                "easeOutCubic",
                vec![
                    frame().prop("translateX", 100.0).prop("opacity", 0.0),
                    frame().prop("translateX", 0.0).prop("opacity", 1.0),
                ],
            ),
        );
        registry.register(
            "scaleIn",
            PresetDefinition::new(
                300.0,
                "easeOutBack",
                vec![
                    frame().prop("scale", 0.8).prop("opacity", 0.0),
                    frame().prop("scale", 1.0).prop("opacity", 1.0),
                ],
            ),
        );
        registry.register(
            "pop",
            PresetDefinition::new(
                300.0,
                "easeInOut",
                vec![
                    frame().prop("scale", 1.0),
                    frame().at(0.5).prop("scale", 1.1),
                    frame().prop("scale", 1.0),
                ],
            ),
        );

        registry
    }

    /// Register a preset, returning the one it replaced
    pub fn register(
        &mut self,
        name: impl Into<String>,
        definition: PresetDefinition,
    ) -> Option<PresetDefinition> {
        self.presets.insert(name.into(), definition)
    }

    /// Register every entry, returning how many were added
    pub fn extend<I>(&mut self, entries: I) -> usize
    where
        I: IntoIterator<Item = PresetEntry>,
    {
        let mut count = 0;
        for entry in entries {
            let (name, definition) = entry.into_parts();
            if self.register(name.clone(), definition).is_some() {
                tracing::warn!("Preset `{}` redefined", name);
            }
            count += 1;
        }
        count
    }

    /// Parse `[[preset]]` tables from TOML and register them
    pub fn extend_from_toml(&mut self, content: &str) -> Result<usize> {
        let file: PresetFile =
            toml::from_str(content).map_err(|e| CadenzaError::Config(e.to_string()))?;
        Ok(self.extend(file.presets))
    }

    /// Load `[[preset]]` tables from a TOML file
    pub fn load_file(&mut self, path: impl AsRef<Path>) -> Result<usize> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            CadenzaError::Config(format!("failed to read {}: {}", path.display(), e))
        })?;
        let count = self.extend_from_toml(&content)?;
        tracing::debug!("Loaded {} presets from {}", count, path.display());
        Ok(count)
    }

    pub fn get(&self, name: &str) -> Option<&PresetDefinition> {
        self.presets.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.presets.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.presets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.presets.is_empty()
    }
}

impl PresetLookup for PresetRegistry {
    fn lookup(&self, name: &str) -> Option<PresetDefinition> {
        self.presets.get(name).cloned()
    }
}
