//! Ranking classes by decision score.

use serde::{Deserialize, Serialize};

/// How many classes to keep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TopK {
    /// Every class.
    All,
    /// At most this many classes.
    Limit(usize),
}

impl TopK {
    fn cap(self, n: usize) -> usize {
        match self {
            TopK::All => n,
            TopK::Limit(k) => k.min(n),
        }
    }
}

impl From<usize> for TopK {
    fn from(k: usize) -> Self {
        TopK::Limit(k)
    }
}

/// One ranked class.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RankedEntry {
    /// The class label.
    pub label: i32,
    /// Its raw decision score, when the list tracks scores.
    pub score: Option<f64>,
}

/// Classes in descending score order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedPrediction {
    k: TopK,
    scored: bool,
    entries: Vec<RankedEntry>,
}

impl RankedPrediction {
    /// An empty list that keeps scores.
    pub fn scored(k: TopK) -> Self {
        Self {
            k,
            scored: true,
            entries: Vec::new(),
        }
    }

    /// An empty list that keeps labels only.
    pub fn unscored(k: TopK) -> Self {
        Self {
            k,
            scored: false,
            entries: Vec::new(),
        }
    }

    /// The requested size.
    pub fn k(&self) -> TopK {
        self.k
    }

    /// Returns true if entries carry scores.
    pub fn is_scored(&self) -> bool {
        self.scored
    }

    /// Ranked entries, best first.
    pub fn entries(&self) -> &[RankedEntry] {
        &self.entries
    }

    /// Ranked labels, best first.
    pub fn labels(&self) -> Vec<i32> {
        self.entries.iter().map(|e| e.label).collect()
    }

    /// The best label, if any.
    pub fn best(&self) -> Option<i32> {
        self.entries.first().map(|e| e.label)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if there are no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn push(&mut self, label: i32, score: f64) {
        self.entries.push(RankedEntry {
            label,
            score: self.scored.then_some(score),
        });
    }
}

/// Ranks `labels` by their parallel `scores`, keeping the top `k` with
/// scores attached.
///
/// Equal scores keep their original relative order. Labels without a
/// score (or scores without a label) are ignored.
///
/// ```
/// use catlin_training::rank::{rank_top_k, TopK};
///
/// let ranked = rank_top_k(&[1, 2, 3], &[0.2, 0.9, -0.4], TopK::Limit(2));
/// assert_eq!(ranked.labels(), vec![2, 1]);
/// ```
pub fn rank_top_k(labels: &[i32], scores: &[f64], k: TopK) -> RankedPrediction {
    rank_into(labels, scores, RankedPrediction::scored(k))
}

/// Fills `list` (scored or not) with the top classes.
///
/// A single requested class is found with one scan; otherwise the first
/// `k` positions are settled by repeated max-selection.
pub fn rank_into(labels: &[i32], scores: &[f64], mut list: RankedPrediction) -> RankedPrediction {
    let n = labels.len().min(scores.len());
    let k = list.k.cap(n);
    list.entries.clear();
    if k == 0 {
        return list;
    }
    if k == 1 {
        let mut best = 0;
        for i in 1..n {
            if scores[i] > scores[best] {
                best = i;
            }
        }
        list.push(labels[best], scores[best]);
        return list;
    }

    let mut ranked: Vec<(i32, f64)> = labels
        .iter()
        .copied()
        .zip(scores.iter().copied())
        .collect();
    for i in 0..k {
        let mut largest = i;
        for j in i + 1..n {
            if ranked[j].1 > ranked[largest].1 {
                largest = j;
            }
        }
        // Rotate rather than swap so ties keep their order.
        ranked[i..=largest].rotate_right(1);
    }
    for &(label, score) in &ranked[..k] {
        list.push(label, score);
    }
    list
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descending_order_and_cap() {
        let labels = [10, 20, 30, 40];
        let scores = [0.1, 0.7, -1.0, 0.3];
        let ranked = rank_top_k(&labels, &scores, TopK::Limit(3));
        assert_eq!(ranked.labels(), vec![20, 40, 10]);
        assert_eq!(ranked.entries()[0].score, Some(0.7));

        let all = rank_top_k(&labels, &scores, TopK::All);
        assert_eq!(all.labels(), vec![20, 40, 10, 30]);
        assert_eq!(rank_top_k(&labels, &scores, TopK::Limit(9)).len(), 4);
    }

    #[test]
    fn test_zero_and_one() {
        let labels = [1, 2, 3];
        let scores = [0.5, 0.9, 0.9];
        assert!(rank_top_k(&labels, &scores, TopK::Limit(0)).is_empty());
        let best = rank_top_k(&labels, &scores, TopK::Limit(1));
        assert_eq!(best.labels(), vec![2]);
        assert_eq!(best.best(), Some(2));
    }

    #[test]
    fn test_ties_keep_original_order() {
        let labels = [1, 2, 3, 4, 5];
        let scores = [2.0, 2.0, 5.0, 2.0, 1.0];
        let ranked = rank_top_k(&labels, &scores, TopK::All);
        assert_eq!(ranked.labels(), vec![3, 1, 2, 4, 5]);
    }

    #[test]
    fn test_output_is_non_increasing_for_many_inputs() {
        use rand::rngs::StdRng;
        use rand::{Rng, SeedableRng};

        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..200 {
            let n: usize = rng.gen_range(1..12);
            let labels: Vec<i32> = (0..n as i32).collect();
            let scores: Vec<f64> = (0..n).map(|_| f64::from(rng.gen_range(-3i32..4))).collect();
            let k = rng.gen_range(0..n + 2);
            let ranked = rank_top_k(&labels, &scores, TopK::Limit(k));
            assert_eq!(ranked.len(), k.min(n));
            for pair in ranked.entries().windows(2) {
                let (a, b) = (pair[0], pair[1]);
                assert!(a.score >= b.score);
                if a.score == b.score {
                    assert!(a.label < b.label);
                }
            }
        }
    }

    #[test]
    fn test_unscored_list_keeps_order_without_scores() {
        let list = RankedPrediction::unscored(TopK::All);
        let ranked = rank_into(&[1, 2, 3], &[0.0, 3.0, 1.0], list);
        assert!(!ranked.is_scored());
        assert_eq!(ranked.labels(), vec![2, 3, 1]);
        assert!(ranked.entries().iter().all(|e| e.score.is_none()));
    }
}
