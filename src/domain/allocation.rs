//! Conviction-weighted target allocation with per-position bounds.
//!
//! Weights are normalized convictions clamped to `[min_position, max_position]`.
//! An oversubscribed book is scaled down proportionally; capacity freed by
//! capping is redistributed among positions still below the cap until the
//! book is fully invested or every position is capped. Whatever cannot be
//! placed stays as cash.

use crate::domain::conviction::Conviction;

const EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, PartialEq)]
pub struct TargetAllocation {
    pub ticker: String,
    pub weight: f64,
    pub conviction: f64,
}

/// Compute target weights for `selected`, preserving its order.
pub fn allocate(
    selected: &[Conviction],
    min_position: f64,
    max_position: f64,
) -> Vec<TargetAllocation> {
    if selected.is_empty() {
        return Vec::new();
    }

    let total: f64 = selected.iter().map(|c| c.value.max(0.0)).sum();
    let mut weights: Vec<f64> = if total > 0.0 {
        selected.iter().map(|c| c.value.max(0.0) / total).collect()
    } else {
        vec![1.0 / selected.len() as f64; selected.len()]
    };

    for w in weights.iter_mut() {
        *w = w.clamp(min_position, max_position);
    }

    let sum: f64 = weights.iter().sum();
    if sum > 1.0 {
        weights.iter_mut().for_each(|w| *w /= sum);
    } else {
        redistribute_residual(&mut weights, max_position);
    }

    // Guard against float creep past a fully invested book.
    let sum: f64 = weights.iter().sum();
    if sum > 1.0 {
        weights.iter_mut().for_each(|w| *w /= sum);
    }

    selected
        .iter()
        .zip(weights)
        .map(|(c, weight)| TargetAllocation {
            ticker: c.ticker.clone(),
            weight,
            conviction: c.value,
        })
        .collect()
}

/// Fixed-point iteration: hand the uninvested residual to open (uncapped)
/// positions in proportion to their weight. Each pass either exhausts the
/// residual or caps at least one more position, so at most `n` passes run.
fn redistribute_residual(weights: &mut [f64], max_position: f64) {
    for _ in 0..=weights.len() {
        let residual = 1.0 - weights.iter().sum::<f64>();
        if residual <= EPSILON {
            return;
        }

        let open_sum: f64 = weights
            .iter()
            .filter(|&&w| w < max_position - EPSILON)
            .sum();
        if open_sum <= 0.0 {
            return;
        }

        for w in weights.iter_mut() {
            if *w < max_position - EPSILON {
                *w = (*w + residual * *w / open_sum).min(max_position);
            }
        }
    }
}

/// Sum of target weights; the remainder to 1 is the cash weight.
pub fn invested_weight(allocations: &[TargetAllocation]) -> f64 {
    allocations.iter().map(|a| a.weight).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn weights_of(allocs: &[TargetAllocation]) -> Vec<f64> {
        allocs.iter().map(|a| a.weight).collect()
    }

    #[test]
    fn empty_selection() {
        assert!(allocate(&[], 0.05, 0.25).is_empty());
    }

    #[test]
    fn both_capped_leaves_cash() {
        let selected = vec![Conviction::new("A", 0.8), Conviction::new("B", 0.6)];
        let allocs = allocate(&selected, 0.05, 0.25);
        assert_eq!(weights_of(&allocs), vec![0.25, 0.25]);
        assert!((invested_weight(&allocs) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn proportional_when_within_bounds() {
        let selected = vec![
            Conviction::new("A", 0.6),
            Conviction::new("B", 0.6),
            Conviction::new("C", 0.6),
            Conviction::new("D", 0.6),
        ];
        let allocs = allocate(&selected, 0.05, 0.30);
        for a in &allocs {
            assert!((a.weight - 0.25).abs() < 1e-12);
        }
    }

    #[test]
    fn capping_frees_capacity_for_open_positions() {
        // Normalized: 0.4, 0.2, 0.2, 0.2 → A capped at 0.3, residual 0.1 spread over B/C/D.
        let selected = vec![
            Conviction::new("A", 1.0),
            Conviction::new("B", 0.5),
            Conviction::new("C", 0.5),
            Conviction::new("D", 0.5),
        ];
        let allocs = allocate(&selected, 0.05, 0.30);
        let w = weights_of(&allocs);
        assert!((w[0] - 0.30).abs() < 1e-9);
        for &x in &w[1..] {
            assert!((x - 0.7 / 3.0).abs() < 1e-9);
        }
        assert!((invested_weight(&allocs) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn redistribution_can_cascade_into_caps() {
        // Five names, cap 0.25: normalized 0.3, 0.25, 0.2, 0.15, 0.1.
        let selected = vec![
            Conviction::new("A", 0.6),
            Conviction::new("B", 0.5),
            Conviction::new("C", 0.4),
            Conviction::new("D", 0.3),
            Conviction::new("E", 0.2),
        ];
        let allocs = allocate(&selected, 0.05, 0.25);
        let w = weights_of(&allocs);
        assert!(w.iter().all(|&x| x <= 0.25 + 1e-12 && x >= 0.05 - 1e-12));
        assert!((invested_weight(&allocs) - 1.0).abs() < 1e-9);
        // Ranking is preserved.
        for pair in w.windows(2) {
            assert!(pair[0] >= pair[1] - 1e-12);
        }
    }

    #[test]
    fn min_floor_then_scaled_down_when_oversubscribed() {
        // Normalized 0.9, 0.05, 0.05 with min 0.1, max 0.9 → 0.9, 0.1, 0.1 = 1.1 → scaled.
        let selected = vec![
            Conviction::new("A", 0.9),
            Conviction::new("B", 0.05),
            Conviction::new("C", 0.05),
        ];
        let allocs = allocate(&selected, 0.1, 0.9);
        let w = weights_of(&allocs);
        assert!((invested_weight(&allocs) - 1.0).abs() < 1e-12);
        assert!((w[0] - 0.9 / 1.1).abs() < 1e-12);
        assert!((w[1] - 0.1 / 1.1).abs() < 1e-12);
    }

    #[test]
    fn single_position_capped() {
        let allocs = allocate(&[Conviction::new("A", 0.9)], 0.05, 0.25);
        assert_eq!(weights_of(&allocs), vec![0.25]);
    }

    #[test]
    fn zero_convictions_fall_back_to_equal_weight() {
        let selected = vec![Conviction::new("A", 0.0), Conviction::new("B", 0.0)];
        let allocs = allocate(&selected, 0.05, 0.5);
        assert_eq!(weights_of(&allocs), vec![0.5, 0.5]);
    }

    #[test]
    fn preserves_order_and_convictions() {
        let selected = vec![Conviction::new("B", 0.7), Conviction::new("A", 0.9)];
        let allocs = allocate(&selected, 0.05, 0.6);
        assert_eq!(allocs[0].ticker, "B");
        assert_eq!(allocs[1].ticker, "A");
        assert_eq!(allocs[1].conviction, 0.9);
    }
}
