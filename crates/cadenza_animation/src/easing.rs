//! Easing functions
//!
//! Easing keys are resolved through a named table of cubic-bezier curves.
//! CSS style strings (`cubic-bezier(a, b, c, d)`, `steps(n)`) are parsed, and
//! anything else is passed through untouched as [`Easing::Native`], on the
//! assumption that the host knows what it means.

use crate::keyframe::camel_case;

/// Named cubic-bezier curves, keyed by camelCase name
const EASINGS: &[(&str, [f64; 4])] = &[
    ("ease", [0.25, 0.1, 0.25, 1.0]),
    ("easeIn", [0.42, 0.0, 1.0, 1.0]),
    ("easeOut", [0.0, 0.0, 0.58, 1.0]),
    ("easeInOut", [0.42, 0.0, 0.58, 1.0]),
    ("easeInBack", [0.6, -0.28, 0.735, 0.045]),
    ("easeOutBack", [0.175, 0.885, 0.32, 1.275]),
    ("easeInOutBack", [0.68, -0.55, 0.265, 1.55]),
    ("easeInCirc", [0.6, 0.04, 0.98, 0.335]),
    ("easeOutCirc", [0.075, 0.82, 0.165, 1.0]),
    ("easeInOutCirc", [0.785, 0.135, 0.15, 0.86]),
    ("easeInCubic", [0.55, 0.055, 0.675, 0.19]),
    ("easeOutCubic", [0.215, 0.61, 0.355, 1.0]),
    ("easeInOutCubic", [0.645, 0.045, 0.355, 1.0]),
    ("easeInExpo", [0.95, 0.05, 0.795, 0.035]),
    ("easeOutExpo", [0.19, 1.0, 0.22, 1.0]),
    ("easeInOutExpo", [1.0, 0.0, 0.0, 1.0]),
    ("easeInQuad", [0.55, 0.085, 0.68, 0.53]),
    ("easeOutQuad", [0.25, 0.46, 0.45, 0.94]),
    ("easeInOutQuad", [0.455, 0.03, 0.515, 0.955]),
    ("easeInQuart", [0.895, 0.03, 0.685, 0.22]),
    ("easeOutQuart", [0.165, 0.84, 0.44, 1.0]),
    ("easeInOutQuart", [0.77, 0.0, 0.175, 1.0]),
    ("easeInQuint", [0.755, 0.05, 0.855, 0.06]),
    ("easeOutQuint", [0.23, 1.0, 0.32, 1.0]),
    ("easeInOutQuint", [0.86, 0.0, 0.07, 1.0]),
    ("easeInSine", [0.47, 0.0, 0.745, 0.715]),
    ("easeOutSine", [0.39, 0.575, 0.565, 1.0]),
    ("easeInOutSine", [0.445, 0.05, 0.55, 0.95]),
];

/// A progress curve mapping linear progress (0..1) to eased progress
#[derive(Clone, Debug, Default, PartialEq)]
pub enum Easing {
    #[default]
    Linear,
    /// CSS style cubic bezier with control points (x1, y1) and (x2, y2)
    CubicBezier(f64, f64, f64, f64),
    /// Jump in `n` equal steps at the end of each interval
    Steps(u32),
    /// Host-native identifier the table does not know; evaluated linearly
    Native(String),
}

impl Easing {
    /// Resolve an easing key
    ///
    /// Accepts table names in camelCase or kebab-case (`easeInOut`,
    /// `ease-in-out`), `linear`, `cubic-bezier(...)` and `steps(n)`.
    /// Unknown keys come back as [`Easing::Native`].
    pub fn resolve(key: &str) -> Self {
        let trimmed = key.trim();
        if trimmed == "linear" {
            return Self::Linear;
        }

        let name = camel_case(trimmed);
        if let Some((_, [x1, y1, x2, y2])) = EASINGS.iter().find(|(n, _)| *n == name) {
            return Self::CubicBezier(*x1, *y1, *x2, *y2);
        }

        if let Some(args) = function_args(trimmed, "cubic-bezier") {
            let points: Vec<f64> = args
                .split(',')
                .filter_map(|p| p.trim().parse().ok())
                .collect();
            if let &[x1, y1, x2, y2] = points.as_slice() {
                return Self::CubicBezier(x1, y1, x2, y2);
            }
        }

        if let Some(args) = function_args(trimmed, "steps") {
            if let Ok(count) = args.trim().parse::<u32>() {
                if count > 0 {
                    return Self::Steps(count);
                }
            }
        }

        Self::Native(key.to_string())
    }

    /// Apply the curve to linear progress `t`
    pub fn apply(&self, t: f64) -> f64 {
        let t = t.clamp(0.0, 1.0);
        match self {
            Self::Linear | Self::Native(_) => t,
            Self::CubicBezier(x1, y1, x2, y2) => cubic_bezier(*x1, *y1, *x2, *y2, t),
            Self::Steps(count) => {
                let count = f64::from(*count);
                (t * count).floor().min(count) / count
            }
        }
    }
}

/// Inner text of `name(...)`, if `value` has that shape
fn function_args<'a>(value: &'a str, name: &str) -> Option<&'a str> {
    value
        .strip_prefix(name)?
        .trim_start()
        .strip_prefix('(')?
        .strip_suffix(')')
}

/// Evaluate a unit cubic bezier at x = `t`
fn cubic_bezier(x1: f64, y1: f64, x2: f64, y2: f64, t: f64) -> f64 {
    if t <= 0.0 || t >= 1.0 {
        return t;
    }

    // Polynomial coefficients for B(s) with P0 = (0,0) and P3 = (1,1)
    let cx = 3.0 * x1;
    let bx = 3.0 * (x2 - x1) - cx;
    let ax = 1.0 - cx - bx;
    let cy = 3.0 * y1;
    let by = 3.0 * (y2 - y1) - cy;
    let ay = 1.0 - cy - by;

    let sample_x = |s: f64| ((ax * s + bx) * s + cx) * s;
    let sample_y = |s: f64| ((ay * s + by) * s + cy) * s;
    let slope_x = |s: f64| (3.0 * ax * s + 2.0 * bx) * s + cx;

    const EPSILON: f64 = 1e-7;

    // Newton-Raphson first, bisection if the slope flattens out
    let mut s = t;
    for _ in 0..8 {
        let error = sample_x(s) - t;
        if error.abs() < EPSILON {
            return sample_y(s);
        }
        let slope = slope_x(s);
        if slope.abs() < 1e-6 {
            break;
        }
        s -= error / slope;
    }

    let (mut lo, mut hi) = (0.0, 1.0);
    s = t;
    while lo < hi {
        let x = sample_x(s);
        if (x - t).abs() < EPSILON {
            break;
        }
        if t > x {
            lo = s;
        } else {
            hi = s;
        }
        let next = (lo + hi) / 2.0;
        if (next - s).abs() < EPSILON {
            break;
        }
        s = next;
    }
    sample_y(s)
}
