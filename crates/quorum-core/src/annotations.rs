//! Annotation input matrices.
//!
//! One `AnnotationMatrix` holds the binary votes of every annotator over
//! every item of a single domain. Shape problems are rejected here, at
//! construction, so the sampler can treat its inputs as validated state.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Immutable items x annotators vote matrix for one domain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnnotationMatrix {
    items: usize,
    annotators: usize,
    votes: Vec<bool>,
}

impl AnnotationMatrix {
    /// Build a matrix from per-item vote rows.
    ///
    /// Every row must have the same length; the annotator count is taken
    /// from the first row. Empty matrices are rejected because the
    /// annotator count cannot be inferred from zero rows.
    pub fn from_rows(rows: Vec<Vec<bool>>) -> Result<Self> {
        let Some(first) = rows.first() else {
            return Err(Error::EmptyMatrix);
        };
        let annotators = first.len();
        if annotators == 0 {
            return Err(Error::NoAnnotators);
        }
        for (item, row) in rows.iter().enumerate() {
            if row.len() != annotators {
                return Err(Error::RaggedRow {
                    item,
                    expected: annotators,
                    got: row.len(),
                });
            }
        }
        let items = rows.len();
        let votes = rows.into_iter().flatten().collect();
        Ok(Self {
            items,
            annotators,
            votes,
        })
    }

    pub fn items(&self) -> usize {
        self.items
    }

    pub fn annotators(&self) -> usize {
        self.annotators
    }

    /// The vote of `annotator` on `item`.
    pub fn vote(&self, item: usize, annotator: usize) -> bool {
        self.votes[item * self.annotators + annotator]
    }

    /// Annotator-major 0/1 view, `out[j][i]`, the layout every sweep
    /// iterates in.
    pub(crate) fn by_annotator(&self) -> Vec<Vec<u8>> {
        (0..self.annotators)
            .map(|j| (0..self.items).map(|i| u8::from(self.vote(i, j))).collect())
            .collect()
    }

    /// Majority-vote warm-start labels: 1 iff at least `annotators / 2`
    /// votes are positive (integer division, so exact ties go to 1).
    pub(crate) fn majority_labels(&self) -> Vec<u8> {
        (0..self.items)
            .map(|i| {
                let positive = (0..self.annotators).filter(|&j| self.vote(i, j)).count();
                u8::from(positive >= self.annotators / 2)
            })
            .collect()
    }
}
