//! Globally optimal one-to-one pairing over a score matrix (Kuhn–Munkres).

use pathfinding::kuhn_munkres::kuhn_munkres_min;
use pathfinding::matrix::Matrix;
use serde::{Deserialize, Serialize};

use crate::scoring::{PairScore, ScoreMatrix};

/// Fixed-point scale for turning `1 - score` into integer costs.
pub const COST_SCALE: i64 = 1_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Assignment {
    pub morning: usize,
    pub evening: usize,
    pub score: PairScore,
}

fn cost(score: f64) -> i64 {
    let clamped = if score.is_nan() { 0.0 } else { score.clamp(0.0, 1.0) };
    COST_SCALE - (clamped * COST_SCALE as f64).round() as i64
}

/// Every real pair of a minimum-cost assignment, ordered by morning index.
///
/// The matrix is padded to square with the cost of a zero score; padding
/// assignments are discarded, so at most `min(rows, columns)` pairs come back.
pub fn solve(matrix: &ScoreMatrix) -> Vec<Assignment> {
    if matrix.is_empty() {
        return Vec::new();
    }
    let size = matrix.rows().max(matrix.columns());
    let mut costs = Vec::with_capacity(size * size);
    for i in 0..size {
        for j in 0..size {
            costs.push(matrix.get(i, j).map_or(COST_SCALE, |s| cost(s.combined)));
        }
    }
    let Ok(weights) = Matrix::from_vec(size, size, costs) else {
        return Vec::new();
    };
    let (_, columns) = kuhn_munkres_min(&weights);

    columns
        .into_iter()
        .enumerate()
        .filter_map(|(i, j)| {
            matrix.get(i, j).map(|score| Assignment {
                morning: i,
                evening: j,
                score: *score,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid(rows: usize, columns: usize, values: &[f64]) -> ScoreMatrix {
        ScoreMatrix::from_combined(rows, columns, values).unwrap()
    }

    fn pairs(assignments: &[Assignment]) -> Vec<(usize, usize)> {
        assignments.iter().map(|a| (a.morning, a.evening)).collect()
    }

    #[test]
    fn empty_sides_yield_nothing() {
        assert!(solve(&grid(0, 3, &[])).is_empty());
        assert!(solve(&grid(2, 0, &[])).is_empty());
    }

    #[test]
    fn beats_greedy_choice() {
        // Greedy takes (0,0)=0.95 and is left with (1,1)=0.10;
        // the optimum is (0,1)+(1,0) = 0.90 + 0.90.
        let m = grid(2, 2, &[0.95, 0.90, 0.90, 0.10]);
        let result = solve(&m);
        assert_eq!(pairs(&result), vec![(0, 1), (1, 0)]);
        assert_eq!(result[0].score.combined, 0.90);
    }

    #[test]
    fn rectangular_matrices_leave_rows_unmatched() {
        let wide = grid(1, 3, &[0.2, 0.9, 0.4]);
        assert_eq!(pairs(&solve(&wide)), vec![(0, 1)]);

        let tall = grid(3, 2, &[0.1, 0.8, 0.95, 0.2, 0.3, 0.3]);
        let result = solve(&tall);
        assert_eq!(result.len(), 2);
        assert_eq!(pairs(&result), vec![(0, 1), (1, 0)]);
    }

    #[test]
    fn never_reuses_a_row_or_column() {
        let values: Vec<f64> = (0..20).map(|k| ((k * 7) % 11) as f64 / 10.0).collect();
        let m = grid(4, 5, &values);
        let result = solve(&m);
        assert!(result.len() <= 4);
        let mut mornings: Vec<_> = result.iter().map(|a| a.morning).collect();
        let mut evenings: Vec<_> = result.iter().map(|a| a.evening).collect();
        mornings.dedup();
        evenings.sort_unstable();
        evenings.dedup();
        assert_eq!(mornings.len(), result.len());
        assert_eq!(evenings.len(), result.len());
    }

    #[test]
    fn costs_are_inverted_scores() {
        assert_eq!(cost(1.0), 0);
        assert_eq!(cost(0.0), COST_SCALE);
        assert_eq!(cost(f64::NAN), COST_SCALE);
        assert_eq!(cost(1.7), 0);
    }
}
