//! Minimum-cost bipartite assignment between tracks (rows) and detections
//! (columns).

use ndarray::Array2;
use thiserror::Error;
use tracing::warn;

use crate::config::AssociatorKind;
use crate::tracker::cost::INFEASIBLE;

#[derive(Debug, Error)]
pub enum AssignmentError {
    #[error("assignment solver failed to converge")]
    SolverFailed,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AssignmentResult {
    /// `(row, column)` pairs
    pub matches: Vec<(usize, usize)>,
    pub unmatched_tracks: Vec<usize>,
    pub unmatched_detections: Vec<usize>,
}

impl AssignmentResult {
    fn unmatched(num_rows: usize, num_cols: usize) -> Self {
        Self {
            matches: vec![],
            unmatched_tracks: (0..num_rows).collect(),
            unmatched_detections: (0..num_cols).collect(),
        }
    }

    fn from_matches(matches: Vec<(usize, usize)>, num_rows: usize, num_cols: usize) -> Self {
        let mut row_used = vec![false; num_rows];
        let mut col_used = vec![false; num_cols];
        for &(r, c) in &matches {
            row_used[r] = true;
            col_used[c] = true;
        }
        Self {
            matches,
            unmatched_tracks: (0..num_rows).filter(|&r| !row_used[r]).collect(),
            unmatched_detections: (0..num_cols).filter(|&c| !col_used[c]).collect(),
        }
    }
}

/// An assignment strategy. Pairs whose cost is not below `thresh` are never
/// matched.
pub trait Associator: Send {
    fn name(&self) -> &'static str;

    fn solve(&self, cost_matrix: &Array2<f32>, thresh: f32) -> Result<AssignmentResult, AssignmentError>;
}

/// Exact optimal assignment (Jonker-Volgenant).
#[derive(Debug, Clone, Copy, Default)]
pub struct OptimalAssociator;

impl Associator for OptimalAssociator {
    fn name(&self) -> &'static str {
        "optimal"
    }

    fn solve(&self, cost_matrix: &Array2<f32>, thresh: f32) -> Result<AssignmentResult, AssignmentError> {
        let (num_rows, num_cols) = cost_matrix.dim();
        if num_rows == 0 || num_cols == 0 {
            return Ok(AssignmentResult::unmatched(num_rows, num_cols));
        }

        let size = num_rows.max(num_cols);
        let mut padded = Array2::<f64>::from_elem((size, size), INFEASIBLE as f64);
        for ((i, j), &c) in cost_matrix.indexed_iter() {
            padded[[i, j]] = c as f64;
        }

        let (row_to_col, _) = lapjv::lapjv(&padded).map_err(|_| AssignmentError::SolverFailed)?;

        let matches = row_to_col
            .iter()
            .enumerate()
            .take(num_rows)
            .filter(|&(row, &col)| col < num_cols && cost_matrix[[row, col]] < thresh)
            .map(|(row, &col)| (row, col))
            .collect();

        Ok(AssignmentResult::from_matches(matches, num_rows, num_cols))
    }
}

/// Greedy assignment by ascending cost; each row and column is used at most
/// once.
#[derive(Debug, Clone, Copy, Default)]
pub struct GreedyAssociator;

impl Associator for GreedyAssociator {
    fn name(&self) -> &'static str {
        "greedy"
    }

    fn solve(&self, cost_matrix: &Array2<f32>, thresh: f32) -> Result<AssignmentResult, AssignmentError> {
        let (num_rows, num_cols) = cost_matrix.dim();

        let mut candidates: Vec<(f32, usize, usize)> = cost_matrix
            .indexed_iter()
            .filter(|&(_, &c)| c < thresh)
            .map(|((i, j), &c)| (c, i, j))
            .collect();
        candidates.sort_by(|a, b| a.0.total_cmp(&b.0));

        let mut row_used = vec![false; num_rows];
        let mut col_used = vec![false; num_cols];
        let mut matches = Vec::new();
        for (_, row, col) in candidates {
            if row_used[row] || col_used[col] {
                continue;
            }
            row_used[row] = true;
            col_used[col] = true;
            matches.push((row, col));
        }

        Ok(AssignmentResult::from_matches(matches, num_rows, num_cols))
    }
}

/// Runs `primary`, degrading to greedy matching if it fails.
pub struct FallbackAssociator<A: Associator> {
    primary: A,
    fallback: GreedyAssociator,
}

impl<A: Associator> FallbackAssociator<A> {
    pub fn new(primary: A) -> Self {
        Self {
            primary,
            fallback: GreedyAssociator,
        }
    }
}

impl<A: Associator> Associator for FallbackAssociator<A> {
    fn name(&self) -> &'static str {
        self.primary.name()
    }

    fn solve(&self, cost_matrix: &Array2<f32>, thresh: f32) -> Result<AssignmentResult, AssignmentError> {
        match self.primary.solve(cost_matrix, thresh) {
            Ok(result) => Ok(result),
            Err(err) => {
                warn!(solver = self.primary.name(), %err, "falling back to greedy assignment");
                self.fallback.solve(cost_matrix, thresh)
            }
        }
    }
}

/// Associator for the configured strategy.
pub fn associator_for(kind: AssociatorKind) -> Box<dyn Associator> {
    match kind {
        AssociatorKind::Optimal => Box::new(FallbackAssociator::new(OptimalAssociator)),
        AssociatorKind::Greedy => Box::new(GreedyAssociator),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    struct FailingAssociator;

    impl Associator for FailingAssociator {
        fn name(&self) -> &'static str {
            "failing"
        }

        fn solve(&self, _: &Array2<f32>, _: f32) -> Result<AssignmentResult, AssignmentError> {
            Err(AssignmentError::SolverFailed)
        }
    }

    #[test]
    fn test_optimal_beats_greedy() {
        // Greedy takes (0,0)=0.1 first and is left with (1,1)=0.6.
        // Optimal picks (0,1)+(1,0) = 0.2 + 0.2.
        let costs = array![[0.1, 0.2], [0.2, 0.6]];

        let opt = OptimalAssociator.solve(&costs, 0.7).unwrap();
        let mut m = opt.matches.clone();
        m.sort();
        assert_eq!(m, vec![(0, 1), (1, 0)]);

        let greedy = GreedyAssociator.solve(&costs, 0.7).unwrap();
        let mut m = greedy.matches.clone();
        m.sort();
        assert_eq!(m, vec![(0, 0), (1, 1)]);
    }

    #[test]
    fn test_threshold_rejects_pairs() {
        let costs = array![[0.1, INFEASIBLE], [INFEASIBLE, 0.9]];
        for result in [
            OptimalAssociator.solve(&costs, 0.7).unwrap(),
            GreedyAssociator.solve(&costs, 0.7).unwrap(),
        ] {
            assert_eq!(result.matches, vec![(0, 0)]);
            assert_eq!(result.unmatched_tracks, vec![1]);
            assert_eq!(result.unmatched_detections, vec![1]);
        }
    }

    #[test]
    fn test_rectangular_matrices() {
        let wide = array![[0.5, 0.1, 0.3]];
        let r = OptimalAssociator.solve(&wide, 0.7).unwrap();
        assert_eq!(r.matches, vec![(0, 1)]);
        assert_eq!(r.unmatched_detections, vec![0, 2]);

        let tall = array![[0.5], [0.1], [0.3]];
        let r = OptimalAssociator.solve(&tall, 0.7).unwrap();
        assert_eq!(r.matches, vec![(1, 0)]);
        assert_eq!(r.unmatched_tracks, vec![0, 2]);
    }

    #[test]
    fn test_empty_matrices() {
        let no_tracks = Array2::<f32>::zeros((0, 3));
        let r = OptimalAssociator.solve(&no_tracks, 0.7).unwrap();
        assert_eq!(r.unmatched_detections, vec![0, 1, 2]);

        let no_dets = Array2::<f32>::zeros((2, 0));
        let r = GreedyAssociator.solve(&no_dets, 0.7).unwrap();
        assert_eq!(r.unmatched_tracks, vec![0, 1]);
    }

    #[test]
    fn test_fallback_on_solver_failure() {
        let costs = array![[0.1, 0.2], [0.2, 0.6]];
        let assoc = FallbackAssociator::new(FailingAssociator);
        let r = assoc.solve(&costs, 0.7).unwrap();
        assert_eq!(r.matches.len(), 2);
    }

    #[test]
    fn test_associator_for_kind() {
        assert_eq!(associator_for(AssociatorKind::Optimal).name(), "optimal");
        assert_eq!(associator_for(AssociatorKind::Greedy).name(), "greedy");
    }
}
