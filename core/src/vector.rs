//! Sparse word-frequency vectors and their similarity measures.
//!
//! Corpus questions are stored as one [`FrequencyVector`] per clause with
//! integer counts, grouped into a [`FrequencyVectorSet`]. The dialogue
//! context is a [`WeightedVector`] with decaying `f64` weights.

use std::cell::Cell;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Word counts of one clause, keyed by corpus word id.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FrequencyVector {
    text: String,
    counts: BTreeMap<u32, u32>,
    norm_squared: u64,
}

impl FrequencyVector {
    /// Build a vector, computing its squared norm.
    pub fn new(text: impl Into<String>, counts: BTreeMap<u32, u32>) -> Self {
        let norm_squared = Self::norm_of(&counts);
        Self {
            text: text.into(),
            counts,
            norm_squared,
        }
    }

    /// Build a vector from a stored squared norm. Returns `None` when the norm
    /// disagrees with the counts.
    pub fn with_norm(text: impl Into<String>, counts: BTreeMap<u32, u32>, norm_squared: u64) -> Option<Self> {
        (Self::norm_of(&counts) == norm_squared).then(|| Self {
            text: text.into(),
            counts,
            norm_squared,
        })
    }

    fn norm_of(counts: &BTreeMap<u32, u32>) -> u64 {
        counts.values().map(|&c| u64::from(c) * u64::from(c)).sum()
    }

    /// The clause text the vector was built from.
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn counts(&self) -> &BTreeMap<u32, u32> {
        &self.counts
    }

    pub fn count(&self, word: u32) -> u32 {
        self.counts.get(&word).copied().unwrap_or(0)
    }

    pub fn norm_squared(&self) -> u64 {
        self.norm_squared
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Cosine of the angle between two vectors, 0 if either is empty.
    pub fn cosine(&self, other: &FrequencyVector) -> f64 {
        if self.norm_squared == 0 || other.norm_squared == 0 {
            return 0.0;
        }
        let dot: u64 = self
            .counts
            .iter()
            .map(|(word, &c)| u64::from(c) * u64::from(other.count(*word)))
            .sum();
        dot as f64 / ((self.norm_squared as f64) * (other.norm_squared as f64)).sqrt()
    }
}

/// The clause vectors of one question, together with the question's total
/// character length.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FrequencyVectorSet {
    vectors: Vec<FrequencyVector>,
    total_length: usize,
}

impl FrequencyVectorSet {
    /// The total length is the sum of the clause lengths in characters.
    pub fn new(vectors: Vec<FrequencyVector>) -> Self {
        let total_length = vectors.iter().map(|v| v.text.chars().count()).sum();
        Self { vectors, total_length }
    }

    pub fn vectors(&self) -> &[FrequencyVector] {
        &self.vectors
    }

    pub fn total_length(&self) -> usize {
        self.total_length
    }

    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    /// Best clause-for-clause similarity between two questions.
    ///
    /// Every clause pair `(i, j)` scores `cosine(a_i, b_j)` weighted by
    /// `(len a_i + len b_j) / (total a + total b)`. Each clause of `self` is
    /// then matched with at most one unused clause of `other`, and the
    /// assignment with the largest summed score wins.
    pub fn similarity(&self, other: &FrequencyVectorSet) -> f64 {
        let total = (self.total_length + other.total_length) as f64;
        if total == 0.0 || self.is_empty() || other.is_empty() {
            return 0.0;
        }
        let columns = other.vectors.len();
        let weights: Vec<f64> = self
            .vectors
            .iter()
            .flat_map(|a| {
                let a_len = a.text.chars().count();
                other.vectors.iter().map(move |b| {
                    let b_len = b.text.chars().count();
                    a.cosine(b) * (a_len + b_len) as f64 / total
                })
            })
            .collect();
        best_assignment(&weights, self.vectors.len(), columns)
    }
}

/// Maximum-weight assignment of rows to distinct columns over a row-major
/// `rows x columns` matrix, in `O(n^3)` for `n = max(rows, columns)`.
///
/// A row may stay unassigned: negative weights count as 0 and the matrix is
/// padded square with zero cells, so a skip and a zero cell are the same.
fn best_assignment(weights: &[f64], rows: usize, columns: usize) -> f64 {
    let n = rows.max(columns);
    if n == 0 {
        return 0.0;
    }
    let cost = |i: usize, j: usize| {
        if i < rows && j < columns {
            -weights[i * columns + j].max(0.0)
        } else {
            0.0
        }
    };

    // potentials and matching are 1-based; index 0 is the virtual column
    let mut u = vec![0.0; n + 1];
    let mut v = vec![0.0; n + 1];
    let mut owner = vec![0usize; n + 1];
    let mut way = vec![0usize; n + 1];
    for i in 1..=n {
        owner[0] = i;
        let mut j0 = 0;
        let mut min_slack = vec![f64::INFINITY; n + 1];
        let mut visited = vec![false; n + 1];
        loop {
            visited[j0] = true;
            let i0 = owner[j0];
            let mut delta = f64::INFINITY;
            let mut j1 = 0;
            for j in 1..=n {
                if visited[j] {
                    continue;
                }
                let slack = cost(i0 - 1, j - 1) - u[i0] - v[j];
                if slack < min_slack[j] {
                    min_slack[j] = slack;
                    way[j] = j0;
                }
                if min_slack[j] < delta {
                    delta = min_slack[j];
                    j1 = j;
                }
            }
            for j in 0..=n {
                if visited[j] {
                    u[owner[j]] += delta;
                    v[j] -= delta;
                } else {
                    min_slack[j] -= delta;
                }
            }
            j0 = j1;
            if owner[j0] == 0 {
                break;
            }
        }
        while j0 != 0 {
            let j1 = way[j0];
            owner[j0] = owner[j1];
            j0 = j1;
        }
    }

    (1..=n)
        .filter(|&j| owner[j] != 0)
        .map(|j| -cost(owner[j] - 1, j - 1))
        .sum()
}

/// Sparse vector with `f64` weights and a lazily computed norm.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WeightedVector {
    weights: BTreeMap<u32, f64>,
    #[serde(skip)]
    norm_squared: Cell<Option<f64>>,
}

impl PartialEq for WeightedVector {
    fn eq(&self, other: &Self) -> bool {
        self.weights == other.weights
    }
}

impl WeightedVector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `weight` to the entry for `word`.
    pub fn merge(&mut self, word: u32, weight: f64) {
        *self.weights.entry(word).or_insert(0.0) += weight;
        self.norm_squared.set(None);
    }

    /// Add every count of a clause vector.
    pub fn merge_counts(&mut self, vector: &FrequencyVector) {
        for (&word, &count) in &vector.counts {
            self.merge(word, f64::from(count));
        }
    }

    /// Add every clause of a question.
    pub fn merge_set(&mut self, set: &FrequencyVectorSet) {
        for vector in &set.vectors {
            self.merge_counts(vector);
        }
    }

    /// Divide every weight by `divisor` and drop entries below `threshold`.
    pub fn decay(&mut self, divisor: f64, threshold: f64) {
        self.weights.retain(|_, w| {
            *w /= divisor;
            *w >= threshold
        });
        self.norm_squared.set(None);
    }

    pub fn weight(&self, word: u32) -> f64 {
        self.weights.get(&word).copied().unwrap_or(0.0)
    }

    pub fn words(&self) -> impl Iterator<Item = u32> + '_ {
        self.weights.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, f64)> + '_ {
        self.weights.iter().map(|(&k, &v)| (k, v))
    }

    pub fn len(&self) -> usize {
        self.weights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    pub fn clear(&mut self) {
        self.weights.clear();
        self.norm_squared.set(Some(0.0));
    }

    pub fn norm_squared(&self) -> f64 {
        if let Some(norm) = self.norm_squared.get() {
            return norm;
        }
        let norm = self.weights.values().map(|w| w * w).sum();
        self.norm_squared.set(Some(norm));
        norm
    }

    /// Cosine of the angle between two vectors, 0 if either is empty.
    pub fn cosine(&self, other: &WeightedVector) -> f64 {
        let norms = self.norm_squared() * other.norm_squared();
        if norms == 0.0 {
            return 0.0;
        }
        let (small, large) = if self.len() <= other.len() {
            (self, other)
        } else {
            (other, self)
        };
        let dot: f64 = small.iter().map(|(word, w)| w * large.weight(word)).sum();
        dot / norms.sqrt()
    }
}
