//! K-means-based cue clustering.
//!
//! Turns a list of detected [`SilenceSpan`]s into a family of candidate
//! chapter-cue lists, one per cardinality, per spec §4.4.

use crate::config::SmartDetectConfig;
use crate::cue::{CueSet, SilenceSpan};
use crate::kmeans::kmeans_1d;

/// Fixed seed for reproducible clustering (§8: byte-identical across runs
/// and platforms).
pub const CLUSTER_SEED: u64 = 1337;
/// Number of k-means restarts per `k`.
pub const N_INIT: usize = 10;
/// Hard cap on the cardinality `k` explored.
pub const MAX_K: usize = 15;

/// Produces candidate cue sets from detected silences.
pub struct CueClusterer;

impl CueClusterer {
    /// Run the full clustering + post-filter pipeline.
    pub fn cluster(
        silences: &[SilenceSpan],
        book_duration: f64,
        config: &SmartDetectConfig,
    ) -> CueSet {
        let mut raw = CueSet::new();
        let max_k = MAX_K.min(silences.len());

        for k in 2..=max_k.max(1) {
            if k < 2 || silences.len() < k {
                continue;
            }
            let durations: Vec<f64> = silences.iter().map(SilenceSpan::duration).collect();
            let fit = kmeans_1d(&durations, k, CLUSTER_SEED, N_INIT);

            // Order clusters by descending centroid ("long-silence" first).
            let mut cluster_order: Vec<usize> = (0..k).collect();
            cluster_order.sort_by(|&a, &b| {
                fit.centroids[b]
                    .partial_cmp(&fit.centroids[a])
                    .expect("centroids are finite")
            });

            for top_n in 1..k {
                let selected_clusters = &cluster_order[..top_n];
                let cue_list = Self::build_cue_list(
                    silences,
                    &fit.assignments,
                    selected_clusters,
                    book_duration,
                    config,
                );
                raw.insert(cue_list.len(), cue_list);
            }
        }

        Self::collapse_runs(raw)
    }

    /// Build one candidate cue list from the silences belonging to the
    /// selected (top-N longest) clusters, applying the snap-to-zero and
    /// duration-trim rules (§4.4 steps 3-4).
    fn build_cue_list(
        silences: &[SilenceSpan],
        assignments: &[usize],
        selected_clusters: &[usize],
        book_duration: f64,
        config: &SmartDetectConfig,
    ) -> Vec<f64> {
        let mut candidates: Vec<f64> = Vec::new();
        for (span, &cluster) in silences.iter().zip(assignments.iter()) {
            if !selected_clusters.contains(&cluster) {
                continue;
            }
            let cue = span.end - config.asr_buffer;
            // Discard candidates within min_clip_length of an already-kept one.
            if candidates
                .iter()
                .any(|&kept| (cue - kept).abs() < config.min_clip_length)
            {
                continue;
            }
            candidates.push(cue);
        }

        candidates.sort_by(|a, b| a.partial_cmp(b).expect("cue timestamps are finite"));

        if let Some(&first) = candidates.first() {
            if first <= config.segment_length + config.min_clip_length {
                candidates[0] = 0.0;
            } else {
                candidates.insert(0, 0.0);
            }
        } else {
            candidates.push(0.0);
        }

        if let Some(&last) = candidates.last() {
            if last > book_duration - config.segment_length && candidates.len() > 1 {
                candidates.pop();
            }
        }

        candidates
    }

    /// Collapse runs of consecutive cardinalities (§4.4 post-filter):
    /// a run of length 1 is kept as-is; length 2 keeps the larger
    /// cardinality; length >= 3 keeps the first and the last.
    fn collapse_runs(cue_sets: CueSet) -> CueSet {
        let cardinalities: Vec<usize> = cue_sets.cardinalities().collect();
        if cardinalities.is_empty() {
            return cue_sets;
        }

        let mut runs: Vec<Vec<usize>> = Vec::new();
        let mut current = vec![cardinalities[0]];
        for &c in &cardinalities[1..] {
            if c == *current.last().expect("current is never empty") + 1 {
                current.push(c);
            } else {
                runs.push(std::mem::take(&mut current));
                current.push(c);
            }
        }
        runs.push(current);

        let mut keep = Vec::new();
        for run in runs {
            match run.len() {
                1 => keep.push(run[0]),
                2 => keep.push(run[1]),
                _ => {
                    keep.push(run[0]);
                    keep.push(*run.last().expect("run has >= 3 elements"));
                }
            }
        }

        let mut result = CueSet::new();
        for k in keep {
            if let Some(list) = cue_sets.get(k) {
                result.insert(k, list.to_vec());
            }
        }
        result
    }
}
