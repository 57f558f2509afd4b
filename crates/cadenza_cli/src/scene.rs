//! Scene file handling
//!
//! A scene file declares targets, extra presets and the `add` calls of one
//! timeline:
//!
//! ```toml
//! [timeline]
//! playback_rate = 1.0
//!
//! [[target]]
//! id = "card"
//! classes = ["item"]
//! properties = { opacity = 0.0 }
//!
//! [[add]]
//! targets = "#card"
//! preset = "fadeIn"
//!
//! [[add]]
//! targets = ".item"
//! duration = 300
//! from = -100
//! keyframes = [{ x = 0.0 }, { x = 40.0 }]
//! ```
//!
//! An `[[add]]` entry with `with_previous = true` joins the batch of the entry
//! before it, so both are placed after the same point of the timeline.

use anyhow::{Context, Result};
use cadenza_animation::{
    AddBatch, AddOptions, Clock, KeyframeSpec, PresetEntry, PresetRegistry, Target, TargetRef,
    TargetRegistry, Timeline,
};
use indexmap::IndexMap;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::rc::Rc;

/// Scene file contents
#[derive(Debug, Default, Deserialize)]
pub struct SceneConfig {
    #[serde(default)]
    pub timeline: TimelineConfig,
    #[serde(default, rename = "target")]
    pub targets: Vec<TargetConfig>,
    #[serde(default, rename = "preset")]
    pub presets: Vec<PresetEntry>,
    #[serde(default, rename = "add")]
    pub adds: Vec<AddConfig>,
}

/// `[timeline]` table
#[derive(Debug, Deserialize)]
pub struct TimelineConfig {
    #[serde(default = "default_rate")]
    pub playback_rate: f64,
    /// Optional file of additional `[[preset]]` entries
    #[serde(default)]
    pub presets: Option<String>,
}

fn default_rate() -> f64 {
    1.0
}

impl Default for TimelineConfig {
    fn default() -> Self {
        Self {
            playback_rate: default_rate(),
            presets: None,
        }
    }
}

/// `[[target]]` entry
#[derive(Debug, Deserialize)]
pub struct TargetConfig {
    pub id: String,
    #[serde(default)]
    pub classes: Vec<String>,
    #[serde(default)]
    pub properties: IndexMap<String, f64>,
}

/// One or more selectors
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum Selectors {
    One(String),
    Many(Vec<String>),
}

impl From<&Selectors> for TargetRef {
    fn from(selectors: &Selectors) -> Self {
        match selectors {
            Selectors::One(selector) => TargetRef::from(selector.as_str()),
            Selectors::Many(list) => TargetRef::from(list.clone()),
        }
    }
}

/// `[[add]]` entry
#[derive(Debug, Deserialize)]
pub struct AddConfig {
    pub targets: Selectors,
    #[serde(default)]
    pub preset: Option<String>,
    #[serde(default)]
    pub from: Option<f64>,
    #[serde(default)]
    pub to: Option<f64>,
    #[serde(default)]
    pub duration: Option<f64>,
    #[serde(default)]
    pub easing: Option<String>,
    #[serde(default)]
    pub keyframes: Vec<KeyframeSpec>,
    /// Join the previous entry's batch
    #[serde(default)]
    pub with_previous: bool,
}

impl AddConfig {
    fn to_options(&self) -> AddOptions {
        AddOptions {
            targets: Some(TargetRef::from(&self.targets)),
            preset: self.preset.clone(),
            from: self.from,
            to: self.to,
            duration: self.duration,
            easing: self.easing.clone(),
            keyframes: self.keyframes.clone(),
        }
    }
}

/// A built scene
pub struct Scene {
    pub timeline: Timeline,
    pub registry: Rc<TargetRegistry>,
}

impl SceneConfig {
    /// Load a scene file
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let mut config = Self::from_toml(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?;

        // Preset files are relative to the scene file
        if let (Some(presets), Some(dir)) = (&config.timeline.presets, path.parent()) {
            config.timeline.presets = Some(dir.join(presets).display().to_string());
        }
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).context("Invalid scene file")
    }

    /// Group `[[add]]` entries into the batches passed to `Timeline::add`
    pub fn batches(&self) -> Vec<AddBatch> {
        let mut batches: Vec<Vec<AddOptions>> = Vec::new();
        for add in &self.adds {
            match batches.last_mut() {
                Some(batch) if add.with_previous => batch.push(add.to_options()),
                _ => batches.push(vec![add.to_options()]),
            }
        }
        batches.into_iter().map(AddBatch::from).collect()
    }

    /// Build the timeline, paused before its first tick
    pub fn build(&self, clock: Rc<dyn Clock>) -> Result<Scene> {
        let registry = Rc::new(TargetRegistry::new());
        for target in &self.targets {
            let entity = Target::with_classes(target.id.as_str(), target.classes.iter().cloned());
            for (name, value) in &target.properties {
                entity.set_property(name.as_str(), *value);
            }
            registry.register(entity);
        }

        let mut presets = PresetRegistry::with_builtins();
        if let Some(path) = &self.timeline.presets {
            presets
                .load_file(path)
                .with_context(|| format!("Failed to load presets from {path}"))?;
        }
        presets.extend(self.presets.iter().cloned());

        let timeline = Timeline::builder(clock)
            .resolver(registry.clone())
            .presets(Rc::new(presets))
            .playback_rate(self.timeline.playback_rate)
            .autoplay(false)
            .build();

        for (index, batch) in self.batches().into_iter().enumerate() {
            timeline
                .add(batch)
                .with_context(|| format!("Failed to add batch {}", index + 1))?;
        }

        Ok(Scene { timeline, registry })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadenza_animation::{CadenzaError, ManualClock, PlayState};

    const SCENE: &str = r##"
        [[target]]
        id = "card"
        classes = ["item"]
        properties = { opacity = 0.0 }

        [[target]]
        id = "badge"
        classes = ["item"]

        [[preset]]
        name = "grow"
        duration = 200
        keyframes = [{ scale = 1.0 }, { scale = 2.0 }]

        [[add]]
        targets = "#card"
        preset = "fadeIn"

        [[add]]
        targets = ".item"
        preset = "grow"

        [[add]]
        targets = ["#badge"]
        duration = 100
        from = 50
        keyframes = [{ x = 10.0 }]
        with_previous = true
    "##;

    #[test]
    fn test_parse_scene() {
        let config = SceneConfig::from_toml(SCENE).unwrap();

        assert_eq!(config.timeline.playback_rate, 1.0);
        assert_eq!(config.targets.len(), 2);
        assert_eq!(config.presets[0].name, "grow");
        assert_eq!(config.adds.len(), 3);
        assert_eq!(config.batches().len(), 2);
    }

    #[test]
    fn test_build_scene() {
        let config = SceneConfig::from_toml(SCENE).unwrap();
        let clock = Rc::new(ManualClock::new());
        let scene = config.build(clock).unwrap();

        assert_eq!(scene.registry.len(), 2);
        assert_eq!(scene.timeline.play_state(), PlayState::Idle);
        assert_eq!(
            scene.timeline.segment_offsets(),
            vec![(0.0, 400.0), (400.0, 600.0), (400.0, 600.0), (450.0, 550.0)]
        );
        assert_eq!(scene.timeline.duration(), 600.0);
    }

    #[test]
    fn test_unknown_preset_fails_build() {
        let config = SceneConfig::from_toml(
            r##"
            [[add]]
            targets = "#card"
            preset = "wobble"
            "##,
        )
        .unwrap();

        let err = config.build(Rc::new(ManualClock::new())).err().unwrap();
        let cause = err.downcast_ref::<CadenzaError>().unwrap();
        assert!(cause.is_invalid_argument());
    }

    #[test]
    fn test_missing_targets_rejected() {
        assert!(SceneConfig::from_toml("[[add]]\nduration = 100").is_err());
    }
}
