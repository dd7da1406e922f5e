// src/ingest/interleave.rs
//! Weighted interleaving of two ranked sequences.
//!
//! Each round emits `round(ratio * window)` items from `primary` followed by
//! the rest of the window from `secondary`. When one side runs dry the other
//! keeps emitting its own quota per round, which drains it. Output stops at
//! `cap` or when both sides are exhausted. The result depends only on the
//! inputs and the policy.

/// Mixing policy: `ratio` is the primary share of each window of `window` items.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InterleavePolicy {
    pub ratio: f64,
    pub window: usize,
}

impl Default for InterleavePolicy {
    /// Two primary items for every secondary one.
    fn default() -> Self {
        Self {
            ratio: 2.0 / 3.0,
            window: 3,
        }
    }
}

impl InterleavePolicy {
    /// Ratio is clamped to [0, 1]; non-finite ratios and a zero window fall back to defaults.
    pub fn new(ratio: f64, window: usize) -> Self {
        let d = Self::default();
        let ratio = if ratio.is_finite() {
            ratio.clamp(0.0, 1.0)
        } else {
            d.ratio
        };
        let window = if window == 0 { d.window } else { window };
        Self { ratio, window }
    }

    pub fn primary_per_window(&self) -> usize {
        ((self.ratio * self.window as f64).round() as usize).min(self.window)
    }

    pub fn secondary_per_window(&self) -> usize {
        self.window - self.primary_per_window()
    }
}

/// Merge `primary` and `secondary` (both pre-sorted by the caller) under `policy`, up to `cap` items.
pub fn interleave<T: Clone>(
    primary: &[T],
    secondary: &[T],
    policy: &InterleavePolicy,
    cap: usize,
) -> Vec<T> {
    let per_primary = policy.primary_per_window();
    let per_secondary = policy.secondary_per_window();
    let mut out = Vec::with_capacity(cap.min(primary.len() + secondary.len()));
    let (mut pi, mut si) = (0usize, 0usize);

    while out.len() < cap && (pi < primary.len() || si < secondary.len()) {
        // An exhausted side hands its slots to the other so a zero quota still drains.
        let (per_primary, per_secondary) = if si >= secondary.len() {
            (per_primary.max(1), per_secondary)
        } else if pi >= primary.len() {
            (per_primary, per_secondary.max(1))
        } else {
            (per_primary, per_secondary)
        };
        for _ in 0..per_primary {
            if pi >= primary.len() || out.len() >= cap {
                break;
            }
            out.push(primary[pi].clone());
            pi += 1;
        }
        for _ in 0..per_secondary {
            if si >= secondary.len() || out.len() >= cap {
                break;
            }
            out.push(secondary[si].clone());
            si += 1;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(prefix: &str, n: usize) -> Vec<String> {
        (1..=n).map(|i| format!("{prefix}{i}")).collect()
    }

    #[test]
    fn two_to_one_pattern_with_cap() {
        let p = labels("P", 10);
        let s = labels("S", 5);
        let out = interleave(&p, &s, &InterleavePolicy::default(), 9);
        assert_eq!(out, ["P1", "P2", "S1", "P3", "P4", "S2", "P5", "P6", "S3"]);
        // deterministic
        assert_eq!(out, interleave(&p, &s, &InterleavePolicy::default(), 9));
    }

    #[test]
    fn drains_other_side_when_one_exhausts() {
        let p = labels("P", 1);
        let s = labels("S", 4);
        let out = interleave(&p, &s, &InterleavePolicy::default(), 10);
        assert_eq!(out, ["P1", "S1", "S2", "S3", "S4"]);

        let out = interleave(&labels("P", 5), &Vec::<String>::new(), &InterleavePolicy::default(), 4);
        assert_eq!(out, ["P1", "P2", "P3", "P4"]);
    }

    #[test]
    fn empty_inputs_and_zero_cap() {
        let empty: Vec<String> = vec![];
        assert!(interleave(&empty, &empty, &InterleavePolicy::default(), 5).is_empty());
        assert!(interleave(&labels("P", 3), &empty, &InterleavePolicy::default(), 0).is_empty());
    }

    #[test]
    fn extreme_ratios_still_progress() {
        let all_secondary = InterleavePolicy::new(0.0, 2);
        assert_eq!(all_secondary.primary_per_window(), 0);
        let out = interleave(&labels("P", 2), &labels("S", 2), &all_secondary, 10);
        // primary only drains once secondary is exhausted
        assert_eq!(out, ["S1", "S2", "P1", "P2"]);

        let all_primary = InterleavePolicy::new(5.0, 2);
        assert_eq!(all_primary.secondary_per_window(), 0);
        assert_eq!(
            interleave(&labels("P", 2), &labels("S", 2), &all_primary, 10),
            ["P1", "P2", "S1", "S2"]
        );
    }

    #[test]
    fn policy_sanitizes_inputs() {
        let p = InterleavePolicy::new(f64::NAN, 0);
        assert_eq!(p, InterleavePolicy::default());
        let q = InterleavePolicy::new(0.75, 4);
        assert_eq!((q.primary_per_window(), q.secondary_per_window()), (3, 1));
    }
}
