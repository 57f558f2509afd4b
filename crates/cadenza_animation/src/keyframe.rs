//! Keyframe normalization
//!
//! Turns loosely specified keyframes into a dense, validated sequence a
//! controller can interpolate:
//!
//! 1. Property names are normalized (`background-opacity` becomes
//!    `backgroundOpacity`, `x`/`y`/`z` become `translateX`/`translateY`/`translateZ`)
//! 2. Missing offsets are spaced out (first defaults to 0, last to 1, gaps are
//!    distributed evenly between the known offsets around them)
//! 3. Offsets are validated (inside 0..1, non-decreasing)
//! 4. Properties missing from a frame are carried forward from the previous
//!    frame, or back-filled from the first frame that declares them
//!
//! A single keyframe is treated as an end state (offset 1). The controller
//! fills in the start state from the target when it first plays.

use crate::easing::Easing;
use cadenza_core::{CadenzaError, Result};
use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};

/// A keyframe as written by the caller
///
/// In TOML, every key other than `offset` and `easing` is a property:
///
/// ```toml
/// keyframes = [{ opacity = 0.0 }, { offset = 0.25, opacity = 1.0, easing = "easeOut" }]
/// ```
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct KeyframeSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset: Option<f64>,
    /// Easing for the interval starting at this keyframe
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub easing: Option<String>,
    #[serde(flatten)]
    pub properties: IndexMap<String, f64>,
}

impl KeyframeSpec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pin this keyframe to an offset (0..1)
    pub fn at(mut self, offset: f64) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn easing(mut self, key: impl Into<String>) -> Self {
        self.easing = Some(key.into());
        self
    }

    /// Set a numeric property
    pub fn prop(mut self, name: impl Into<String>, value: f64) -> Self {
        self.properties.insert(name.into(), value);
        self
    }
}

/// A normalized keyframe
#[derive(Clone, Debug, PartialEq)]
pub struct Keyframe {
    pub offset: f64,
    /// Easing for the interval between this keyframe and the next
    pub easing: Easing,
    pub properties: IndexMap<String, f64>,
}

impl Keyframe {
    pub fn new(offset: f64, properties: IndexMap<String, f64>) -> Self {
        Self {
            offset,
            easing: Easing::Linear,
            properties,
        }
    }
}

/// `kebab-case` to `camelCase`
pub(crate) fn camel_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for (i, part) in name.split('-').filter(|p| !p.is_empty()).enumerate() {
        if i == 0 {
            out.push_str(part);
            continue;
        }
        let mut chars = part.chars();
        if let Some(first) = chars.next() {
            out.extend(first.to_uppercase());
            out.push_str(chars.as_str());
        }
    }
    out
}

/// Canonical name for a property
pub fn normalize_property_name(name: &str) -> String {
    match name {
        "x" => "translateX".to_string(),
        "y" => "translateY".to_string(),
        "z" => "translateZ".to_string(),
        other => camel_case(other),
    }
}

/// Fill in missing offsets
fn space_offsets(offsets: &[Option<f64>]) -> Vec<f64> {
    if let [only] = offsets {
        return vec![only.unwrap_or(1.0)];
    }

    let mut spaced = offsets.to_vec();
    let last = spaced.len().saturating_sub(1);
    if let Some(first) = spaced.first_mut() {
        first.get_or_insert(0.0);
    }
    if let Some(end) = spaced.last_mut() {
        end.get_or_insert(1.0);
    }

    let mut known = 0;
    for i in 1..=last {
        let Some(end) = spaced[i] else {
            continue;
        };
        let start = spaced[known].unwrap_or(0.0);
        let gap = (i - known) as f64;
        for (step, slot) in spaced[known + 1..i].iter_mut().enumerate() {
            *slot = Some(start + (end - start) * (step + 1) as f64 / gap);
        }
        known = i;
    }

    spaced.into_iter().map(|o| o.unwrap_or(0.0)).collect()
}

/// Give every frame a value for every property
fn fill_missing(frames: &mut [Keyframe]) {
    let names: IndexSet<String> = frames
        .iter()
        .flat_map(|frame| frame.properties.keys().cloned())
        .collect();

    for name in names {
        let Some(mut carried) = frames
            .iter()
            .find_map(|frame| frame.properties.get(&name).copied())
        else {
            continue;
        };
        for frame in frames.iter_mut() {
            match frame.properties.get(&name) {
                Some(value) => carried = *value,
                None => {
                    frame.properties.insert(name.clone(), carried);
                }
            }
        }
    }
}

/// Run the normalization pipeline
pub fn normalize_keyframes(specs: &[KeyframeSpec]) -> Result<Vec<Keyframe>> {
    if specs.is_empty() {
        return Err(CadenzaError::Keyframe(
            "at least one keyframe is required".to_string(),
        ));
    }

    let offsets: Vec<Option<f64>> = specs.iter().map(|spec| spec.offset).collect();
    let offsets = space_offsets(&offsets);

    let mut frames: Vec<Keyframe> = Vec::with_capacity(specs.len());
    for (index, (spec, offset)) in specs.iter().zip(offsets).enumerate() {
        if !(0.0..=1.0).contains(&offset) {
            return Err(CadenzaError::Keyframe(format!(
                "keyframe {index} has offset {offset}, expected 0..1"
            )));
        }
        if let Some(previous) = frames.last() {
            if offset < previous.offset {
                return Err(CadenzaError::Keyframe(format!(
                    "keyframe {index} has offset {offset} before {}",
                    previous.offset
                )));
            }
        }

        let mut properties = IndexMap::with_capacity(spec.properties.len());
        for (name, value) in &spec.properties {
            if !value.is_finite() {
                return Err(CadenzaError::Keyframe(format!(
                    "keyframe {index} property `{name}` is not a finite number"
                )));
            }
            properties.insert(normalize_property_name(name), *value);
        }

        frames.push(Keyframe {
            offset,
            easing: spec
                .easing
                .as_deref()
                .map(Easing::resolve)
                .unwrap_or_default(),
            properties,
        });
    }

    fill_missing(&mut frames);
    Ok(frames)
}

/// Interpolate normalized keyframes at `progress` (0..1)
pub fn sample(frames: &[Keyframe], progress: f64) -> IndexMap<String, f64> {
    let (Some(first), Some(last)) = (frames.first(), frames.last()) else {
        return IndexMap::new();
    };
    if progress <= first.offset {
        return first.properties.clone();
    }
    if progress >= last.offset {
        return last.properties.clone();
    }

    let index = frames
        .windows(2)
        .position(|pair| progress <= pair[1].offset)
        .unwrap_or(frames.len() - 2);
    let (from, to) = (&frames[index], &frames[index + 1]);

    let span = to.offset - from.offset;
    let local = if span > 0.0 {
        (progress - from.offset) / span
    } else {
        1.0
    };
    let eased = from.easing.apply(local);

    from.properties
        .iter()
        .map(|(name, start)| {
            let end = to.properties.get(name).copied().unwrap_or(*start);
            (name.clone(), start + (end - start) * eased)
        })
        .collect()
}
