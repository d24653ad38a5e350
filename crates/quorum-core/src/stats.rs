//! Incrementally maintained sufficient statistics for one domain.
//!
//! Two families of counts drive every conditional posterior in the sweep:
//! label-prior counts (how many items currently carry each label) and
//! confusion cells (how many (item, annotator) pairs fall in each
//! cluster/true-label/vote combination). The mutators here pair every
//! decrement with its matching increment so a caller cannot leave the
//! counts half-updated; the only exposed intermediate state is the
//! detach/attach pair the cluster-assignment step requires.

/// Per-domain label and confusion counts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SufficientStats {
    label_counts: [u32; 2],
    confusion: Vec<[[u32; 2]; 2]>,
}

impl SufficientStats {
    pub fn new() -> Self {
        Self {
            label_counts: [0, 0],
            confusion: Vec::new(),
        }
    }

    /// Grow the confusion arena to cover cluster `id`.
    pub fn ensure_cluster(&mut self, id: usize) {
        if self.confusion.len() <= id {
            self.confusion.resize(id + 1, [[0; 2]; 2]);
        }
    }

    pub fn label_counts(&self) -> [u32; 2] {
        self.label_counts
    }

    /// Confusion cells `[true][vote]` for cluster `id`.
    pub fn confusion(&self, id: usize) -> &[[u32; 2]; 2] {
        &self.confusion[id]
    }

    /// Count a warm-started item: its label, and one confusion cell per
    /// annotator under that annotator's current cluster.
    pub fn add_item(&mut self, item: usize, label: u8, assignment: &[usize], votes: &[Vec<u8>]) {
        self.label_counts[label as usize] += 1;
        for (j, &cluster) in assignment.iter().enumerate() {
            self.confusion[cluster][label as usize][votes[j][item] as usize] += 1;
        }
    }

    /// Move an item from `old` to `new` label: decrement every count the
    /// old label governed, increment the same cells under the new label.
    pub fn relabel_item(
        &mut self,
        item: usize,
        old: u8,
        new: u8,
        assignment: &[usize],
        votes: &[Vec<u8>],
    ) {
        if old == new {
            return;
        }
        self.label_counts[old as usize] -= 1;
        self.label_counts[new as usize] += 1;
        for (j, &cluster) in assignment.iter().enumerate() {
            let vote = votes[j][item] as usize;
            self.confusion[cluster][old as usize][vote] -= 1;
            self.confusion[cluster][new as usize][vote] += 1;
        }
    }

    /// Subtract one annotator's contributions from `cluster`. Must be
    /// followed by [`SufficientStats::attach_annotator`] before any other
    /// mutation touches this annotator.
    pub fn detach_annotator(&mut self, cluster: usize, labels: &[u8], votes_j: &[u8]) {
        for (i, &label) in labels.iter().enumerate() {
            self.confusion[cluster][label as usize][votes_j[i] as usize] -= 1;
        }
    }

    /// Add one annotator's contributions to `cluster`.
    pub fn attach_annotator(&mut self, cluster: usize, labels: &[u8], votes_j: &[u8]) {
        for (i, &label) in labels.iter().enumerate() {
            self.confusion[cluster][label as usize][votes_j[i] as usize] += 1;
        }
    }

    /// Rebuild the counts from scratch; the incremental path must always
    /// agree with this.
    #[cfg(test)]
    pub fn recompute(labels: &[u8], assignment: &[usize], votes: &[Vec<u8>]) -> Self {
        let mut stats = Self::new();
        if let Some(&max) = assignment.iter().max() {
            stats.ensure_cluster(max);
        }
        for (i, &label) in labels.iter().enumerate() {
            stats.add_item(i, label, assignment, votes);
        }
        stats
    }

    #[cfg(test)]
    pub fn clusters(&self) -> usize {
        self.confusion.len()
    }

    #[cfg(test)]
    pub fn pad_clusters(&mut self, len: usize) {
        if self.confusion.len() < len {
            self.confusion.resize(len, [[0; 2]; 2]);
        }
    }
}
