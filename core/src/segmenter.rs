// core/src/segmenter.rs
//
// Maximum-likelihood word segmentation over lexicon frequency traces.

use std::cell::RefCell;
use std::num::NonZeroUsize;
use std::sync::Arc;

use lru::LruCache;

use crate::lexicon::{Lexicon, UNDEFINED_FREQUENCY};
use crate::units::{join_units, split_units};
use crate::Config;

const DEFAULT_CACHE_SIZE: NonZeroUsize = match NonZeroUsize::new(1000) {
    Some(n) => n,
    None => unreachable!(),
};

/// Dynamic-programming segmenter.
///
/// For every prefix `units[0..n)` the segmenter keeps the best cumulative
/// `log10(frequency)` score and the start of the last word on that best path.
/// Candidate last words are read off `Lexicon::frequency_trace(units, 0, n)`,
/// which yields the frequency of every dictionary word ending at `n`.
///
/// Words whose frequency is [`UNDEFINED_FREQUENCY`] get a fallback weight:
/// a lone trailing unit gets `unknown_floor`, one that borders a word with a
/// real frequency gets twice the last effective frequency seen, anything else
/// is impossible.
///
/// Results are memoized per clause in an LRU cache.
pub struct WordSegmenter {
    lexicon: Arc<Lexicon>,
    unknown_floor: f64,
    cache: RefCell<LruCache<String, Vec<String>>>,
    cache_hits: RefCell<usize>,
    cache_misses: RefCell<usize>,
}

impl WordSegmenter {
    /// Create a segmenter with a cache of `cache_capacity` clauses.
    pub fn new(lexicon: Arc<Lexicon>, cache_capacity: usize) -> Self {
        Self {
            lexicon,
            unknown_floor: 0.0001,
            cache: RefCell::new(LruCache::new(
                NonZeroUsize::new(cache_capacity).unwrap_or(DEFAULT_CACHE_SIZE),
            )),
            cache_hits: RefCell::new(0),
            cache_misses: RefCell::new(0),
        }
    }

    pub fn from_config(lexicon: Arc<Lexicon>, config: &Config) -> Self {
        Self::new(lexicon, config.max_cache_size).with_unknown_floor(config.unknown_unit_floor)
    }

    /// Override the weight given to a lone unknown unit.
    pub fn with_unknown_floor(mut self, floor: f64) -> Self {
        if floor > 0.0 {
            self.unknown_floor = floor;
        }
        self
    }

    pub fn lexicon(&self) -> &Arc<Lexicon> {
        &self.lexicon
    }

    /// Segment a clause into words.
    pub fn segment(&self, clause: &str) -> Vec<String> {
        if let Some(cached) = self.cache.borrow_mut().get(clause) {
            *self.cache_hits.borrow_mut() += 1;
            return cached.clone();
        }
        *self.cache_misses.borrow_mut() += 1;

        let words = self.segment_units(&split_units(clause));
        self.cache.borrow_mut().put(clause.to_string(), words.clone());
        words
    }

    /// Segment an already split unit sequence. Empty input yields no words.
    pub fn segment_units<S: AsRef<str>>(&self, units: &[S]) -> Vec<String> {
        let len = units.len();
        if len == 0 {
            return Vec::new();
        }

        // best[n]: score of the best path over units[0..n); None while no
        // word ending at n has been accepted.
        let mut best: Vec<Option<f64>> = vec![None; len + 1];
        best[0] = Some(0.0);
        let mut choose: Vec<usize> = vec![0; len + 1];
        let mut last_effective = 0.0f64;

        for n in 1..=len {
            choose[n] = n - 1;
            let trace = self.lexicon.frequency_trace(units, 0, n);
            for i in (0..n).rev() {
                let mut frequency = trace[i];
                if frequency == UNDEFINED_FREQUENCY {
                    frequency = if i == n - 1 {
                        self.unknown_floor
                    } else if i == 0 || trace[i - 1] >= 0.0 {
                        if last_effective == 0.0 {
                            last_effective = self.unknown_floor;
                        }
                        last_effective * 2.0
                    } else {
                        0.0
                    };
                }
                if frequency > 0.0 {
                    last_effective = frequency;
                    let score = frequency.log10() + best[i].unwrap_or(0.0);
                    // strict comparison: the first optimum found (shortest
                    // last word) is kept on ties
                    if best[n].map_or(true, |b| score > b) {
                        best[n] = Some(score);
                        choose[n] = i;
                    }
                }
            }
        }

        let mut words = Vec::new();
        let mut end = len;
        while end > 0 {
            let start = choose[end];
            words.push(join_units(&units[start..end]));
            end = start;
        }
        words.reverse();
        words
    }

    /// Hits and misses of the clause cache, as `(hits, misses)`.
    pub fn cache_stats(&self) -> (usize, usize) {
        (*self.cache_hits.borrow(), *self.cache_misses.borrow())
    }

    /// Share of clause lookups served from the cache, in percent. `None`
    /// until the first clause has been segmented.
    pub fn cache_hit_rate(&self) -> Option<f32> {
        let hits = *self.cache_hits.borrow();
        let total = hits + *self.cache_misses.borrow();
        if total == 0 {
            None
        } else {
            Some((hits as f32 / total as f32) * 100.0)
        }
    }

    pub fn cache_size(&self) -> usize {
        self.cache.borrow().len()
    }

    pub fn cache_capacity(&self) -> usize {
        self.cache.borrow().cap().get()
    }

    /// Forget every memoized clause and zero the hit counters.
    pub fn clear_cache(&self) {
        self.cache.borrow_mut().clear();
        *self.cache_hits.borrow_mut() = 0;
        *self.cache_misses.borrow_mut() = 0;
    }
}
