//! Options records accepted by [`Timeline::add`](crate::Timeline::add)

use crate::keyframe::KeyframeSpec;
use crate::presets::PresetDefinition;
use crate::target::TargetRef;

/// One options record: which targets to animate, how, and where to place it
///
/// `from` and `to` are offsets relative to the end of the timeline as it was
/// before the `add` call. `from` defaults to 0, `to` to `from + duration`.
#[derive(Clone, Debug, Default)]
pub struct AddOptions {
    pub targets: Option<TargetRef>,
    /// Name of a preset supplying defaults for the other fields
    pub preset: Option<String>,
    pub from: Option<f64>,
    pub to: Option<f64>,
    pub duration: Option<f64>,
    pub easing: Option<String>,
    pub keyframes: Vec<KeyframeSpec>,
}

impl AddOptions {
    pub fn new(targets: impl Into<TargetRef>) -> Self {
        Self {
            targets: Some(targets.into()),
            ..Self::default()
        }
    }

    pub fn preset(mut self, name: impl Into<String>) -> Self {
        self.preset = Some(name.into());
        self
    }

    pub fn from(mut self, offset: f64) -> Self {
        self.from = Some(offset);
        self
    }

    pub fn to(mut self, offset: f64) -> Self {
        self.to = Some(offset);
        self
    }

    pub fn duration(mut self, ms: f64) -> Self {
        self.duration = Some(ms);
        self
    }

    pub fn easing(mut self, key: impl Into<String>) -> Self {
        self.easing = Some(key.into());
        self
    }

    pub fn keyframe(mut self, keyframe: KeyframeSpec) -> Self {
        self.keyframes.push(keyframe);
        self
    }

    pub fn keyframes(mut self, keyframes: impl IntoIterator<Item = KeyframeSpec>) -> Self {
        self.keyframes.extend(keyframes);
        self
    }

    /// Fill every unset field from a preset
    pub fn inherit(&mut self, preset: &PresetDefinition) {
        self.duration = self.duration.or(preset.duration);
        self.from = self.from.or(preset.from);
        self.to = self.to.or(preset.to);
        if self.easing.is_none() {
            self.easing = preset.easing.clone();
        }
        if self.keyframes.is_empty() {
            self.keyframes = preset.keyframes.clone();
        }
    }
}

/// One or more options records added together
///
/// Every record of a batch is placed relative to the same basis.
#[derive(Clone, Debug, Default)]
pub struct AddBatch(pub Vec<AddOptions>);

impl AddBatch {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<AddOptions> for AddBatch {
    fn from(options: AddOptions) -> Self {
        Self(vec![options])
    }
}

impl From<Vec<AddOptions>> for AddBatch {
    fn from(options: Vec<AddOptions>) -> Self {
        Self(options)
    }
}

impl<const N: usize> From<[AddOptions; N]> for AddBatch {
    fn from(options: [AddOptions; N]) -> Self {
        Self(options.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inherit_keeps_explicit_fields() {
        let preset = PresetDefinition {
            duration: Some(400.0),
            easing: Some("easeOut".into()),
            from: Some(-100.0),
            to: None,
            keyframes: vec![KeyframeSpec::new().prop("opacity", 1.0)],
        };

        let mut options = AddOptions::new("#card").duration(250.0);
        options.inherit(&preset);

        assert_eq!(options.duration, Some(250.0));
        assert_eq!(options.easing.as_deref(), Some("easeOut"));
        assert_eq!(options.from, Some(-100.0));
        assert_eq!(options.to, None);
        assert_eq!(options.keyframes.len(), 1);
    }

    #[test]
    fn test_inherit_does_not_merge_keyframes() {
        let preset = PresetDefinition {
            keyframes: vec![
                KeyframeSpec::new().prop("opacity", 0.0),
                KeyframeSpec::new().prop("opacity", 1.0),
            ],
            ..PresetDefinition::default()
        };

        let mut options = AddOptions::new("#card").keyframe(KeyframeSpec::new().prop("scale", 2.0));
        options.inherit(&preset);

        assert_eq!(options.keyframes.len(), 1);
    }

    #[test]
    fn test_batch_conversions() {
        assert_eq!(AddBatch::from(AddOptions::new("#a")).len(), 1);
        assert_eq!(
            AddBatch::from([AddOptions::new("#a"), AddOptions::new("#b")]).len(),
            2
        );
        assert!(AddBatch::from(Vec::<AddOptions>::new()).is_empty());
    }
}
