//! Usage color ramp: green → orange → red → dark red.

use std::fmt;

/// Color in hue/saturation/lightness space
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hsl {
    pub h: f64,
    pub s: f64,
    pub l: f64,
}

impl fmt::Display for Hsl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "hsl({:.1}, {:.1}%, {:.1}%)", self.h, self.s, self.l)
    }
}

const GREEN: Hsl = Hsl {
    h: 142.0,
    s: 70.0,
    l: 45.0,
};
const ORANGE: Hsl = Hsl {
    h: 32.0,
    s: 95.0,
    l: 50.0,
};
const RED: Hsl = Hsl {
    h: 0.0,
    s: 85.0,
    l: 50.0,
};
const DARK_RED: Hsl = Hsl {
    h: 0.0,
    s: 90.0,
    l: 32.0,
};

/// Segment boundaries in percent
const ORANGE_AT: f64 = 35.0;
const RED_AT: f64 = 85.0;

fn lerp(from: Hsl, to: Hsl, t: f64) -> Hsl {
    Hsl {
        h: from.h + (to.h - from.h) * t,
        s: from.s + (to.s - from.s) * t,
        l: from.l + (to.l - from.l) * t,
    }
}

/// Interpolate within one of the three segments (`t` in `[0, 1]`)
fn segment(index: usize, t: f64) -> Hsl {
    match index {
        0 => lerp(GREEN, ORANGE, t),
        1 => lerp(ORANGE, RED, t),
        _ => lerp(RED, DARK_RED, t),
    }
}

/// Color for a usage percentage; input is clamped to `[0, 100]`
pub fn hsl_for_percentage(percent: f64) -> Hsl {
    let p = if percent.is_nan() {
        0.0
    } else {
        percent.clamp(0.0, 100.0)
    };

    if p <= ORANGE_AT {
        segment(0, p / ORANGE_AT)
    } else if p <= RED_AT {
        segment(1, (p - ORANGE_AT) / (RED_AT - ORANGE_AT))
    } else {
        segment(2, (p - RED_AT) / (100.0 - RED_AT))
    }
}

/// CSS color string for a usage percentage
pub fn color_for_percentage(percent: f64) -> String {
    hsl_for_percentage(percent).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: Hsl, b: Hsl) -> bool {
        (a.h - b.h).abs() < 1e-9 && (a.s - b.s).abs() < 1e-9 && (a.l - b.l).abs() < 1e-9
    }

    #[test]
    fn test_endpoints() {
        assert_eq!(hsl_for_percentage(0.0), GREEN);
        assert_eq!(hsl_for_percentage(100.0), DARK_RED);
    }

    #[test]
    fn test_continuous_at_boundaries() {
        assert!(close(segment(0, 1.0), segment(1, 0.0)));
        assert!(close(segment(1, 1.0), segment(2, 0.0)));
        assert!(close(hsl_for_percentage(35.0), segment(1, 0.0)));
        assert!(close(hsl_for_percentage(85.0), segment(2, 0.0)));

        let below = hsl_for_percentage(34.999);
        let above = hsl_for_percentage(35.001);
        assert!((below.h - above.h).abs() < 0.1);
    }

    #[test]
    fn test_clamps_out_of_range() {
        assert_eq!(hsl_for_percentage(-20.0), GREEN);
        assert_eq!(hsl_for_percentage(150.0), DARK_RED);
        assert_eq!(hsl_for_percentage(f64::NAN), GREEN);
    }

    #[test]
    fn test_css_string() {
        assert_eq!(color_for_percentage(0.0), "hsl(142.0, 70.0%, 45.0%)");
        assert_eq!(color_for_percentage(35.0), "hsl(32.0, 95.0%, 50.0%)");
    }

    #[test]
    fn test_deterministic() {
        assert_eq!(color_for_percentage(62.5), color_for_percentage(62.5));
    }
}
