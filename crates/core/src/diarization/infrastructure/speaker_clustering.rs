//! Average-linkage agglomerative clustering of speaker embeddings.

use crate::diarization::domain::diarizer::SpeakerBounds;

pub const DEFAULT_THRESHOLD: f64 = 0.5;

pub fn l2_normalize(v: &mut [f32]) {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}

/// Dot product of L2-normalized vectors equals cosine similarity.
fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (*x as f64) * (*y as f64))
        .sum()
}

/// Assign a cluster label to every embedding.
///
/// Merging stops once the most similar pair of clusters falls below
/// `threshold`, except that with `bounds` there are never more than `max`
/// nor (when enough embeddings exist) fewer than `min` clusters. Labels are
/// numbered by first appearance, so `labels[0] == 0`.
pub fn cluster(embeddings: &[Vec<f32>], threshold: f64, bounds: Option<SpeakerBounds>) -> Vec<usize> {
    let n = embeddings.len();
    if n == 0 {
        return Vec::new();
    }
    let (min_clusters, max_clusters) = match bounds {
        Some(b) => {
            let max = (b.max as usize).max(1);
            ((b.min as usize).clamp(1, max), max)
        }
        None => (1, usize::MAX),
    };

    let mut sim = vec![vec![0.0f64; n]; n];
    for i in 0..n {
        for j in (i + 1)..n {
            let s = cosine_similarity(&embeddings[i], &embeddings[j]);
            sim[i][j] = s;
            sim[j][i] = s;
        }
    }
    let mut size = vec![1usize; n];
    let mut active = vec![true; n];
    let mut assignment: Vec<usize> = (0..n).collect();
    let mut best: Vec<Option<(usize, f64)>> = (0..n).map(|i| nearest(&sim, &active, i)).collect();
    let mut num_clusters = n;

    while num_clusters > 1 {
        let Some((i, j, score)) = (0..n)
            .filter(|&i| active[i])
            .filter_map(|i| best[i].map(|(j, s)| (i, j, s)))
            .max_by(|a, b| a.2.total_cmp(&b.2))
        else {
            break;
        };

        let must_merge = num_clusters > max_clusters;
        let may_merge = num_clusters > min_clusters && score >= threshold;
        if !must_merge && !may_merge {
            break;
        }

        // Merge j into i, updating similarities by the average-linkage rule.
        let (si, sj) = (size[i] as f64, size[j] as f64);
        for k in 0..n {
            if active[k] && k != i && k != j {
                let merged = (si * sim[i][k] + sj * sim[j][k]) / (si + sj);
                sim[i][k] = merged;
                sim[k][i] = merged;
            }
        }
        size[i] += size[j];
        active[j] = false;
        for a in assignment.iter_mut() {
            if *a == j {
                *a = i;
            }
        }
        num_clusters -= 1;

        best[j] = None;
        best[i] = nearest(&sim, &active, i);
        for k in 0..n {
            if !active[k] || k == i {
                continue;
            }
            let current = best[k];
            match current {
                Some((partner, _)) if partner == i || partner == j => {
                    best[k] = nearest(&sim, &active, k);
                }
                Some((_, s)) if sim[k][i] > s => best[k] = Some((i, sim[k][i])),
                None => best[k] = nearest(&sim, &active, k),
                _ => {}
            }
        }
    }

    relabel_by_first_appearance(&assignment)
}

fn nearest(sim: &[Vec<f64>], active: &[bool], i: usize) -> Option<(usize, f64)> {
    (0..sim.len())
        .filter(|&j| j != i && active[j])
        .map(|j| (j, sim[i][j]))
        .max_by(|a, b| a.1.total_cmp(&b.1))
}

fn relabel_by_first_appearance(assignment: &[usize]) -> Vec<usize> {
    let mut seen: Vec<usize> = Vec::new();
    assignment
        .iter()
        .map(|id| match seen.iter().position(|s| s == id) {
            Some(label) => label,
            None => {
                seen.push(*id);
                seen.len() - 1
            }
        })
        .collect()
}
