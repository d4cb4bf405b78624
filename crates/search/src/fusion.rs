use crate::modality::{Modality, ModalityHit};
use crate::normalize::normalize_distance;
use crate::query::ModalityWeights;
use docqa_protocol::SearchHit;
use docqa_vector_store::DocumentAttributes;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

/// A document seen by at least one modality, with the raw distance each
/// modality reported. `None` means the modality did not return it.
#[derive(Debug, Clone, PartialEq)]
pub struct MergedCandidate {
    pub document_id: String,
    pub entity: DocumentAttributes,
    pub sparse_distance: Option<f32>,
    pub dense_text_distance: Option<f32>,
    pub dense_code_distance: Option<f32>,
}

impl MergedCandidate {
    fn seeded(hit: &ModalityHit) -> Self {
        Self {
            document_id: hit.document_id.clone(),
            entity: hit.entity.clone(),
            sparse_distance: None,
            dense_text_distance: None,
            dense_code_distance: None,
        }
    }

    #[must_use]
    pub const fn distance(&self, modality: Modality) -> Option<f32> {
        match modality {
            Modality::Sparse => self.sparse_distance,
            Modality::DenseText => self.dense_text_distance,
            Modality::DenseCode => self.dense_code_distance,
        }
    }

    fn set_distance(&mut self, modality: Modality, distance: f32) {
        let slot = match modality {
            Modality::Sparse => &mut self.sparse_distance,
            Modality::DenseText => &mut self.dense_text_distance,
            Modality::DenseCode => &mut self.dense_code_distance,
        };
        *slot = Some(distance);
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RankedResult {
    pub candidate: MergedCandidate,
    pub combined_score: f32,
}

impl From<RankedResult> for SearchHit {
    fn from(result: RankedResult) -> Self {
        let RankedResult {
            candidate,
            combined_score,
        } = result;
        let DocumentAttributes {
            title,
            metadata,
            text_content,
            code_content,
            version,
            tag,
        } = candidate.entity;
        Self {
            id: candidate.document_id,
            title,
            metadata,
            text_content,
            code_content,
            version,
            tag,
            sparse_distance: candidate.sparse_distance,
            dense_text_distance: candidate.dense_text_distance,
            dense_code_distance: candidate.dense_code_distance,
            combined_score,
        }
    }
}

/// Merge per-modality hit lists by document id.
///
/// Modalities are visited in `Modality` order; the first modality to see a
/// document supplies its attributes. Candidates keep first-seen order.
#[must_use]
pub fn merge(hits_by_modality: BTreeMap<Modality, Vec<ModalityHit>>) -> Vec<MergedCandidate> {
    let mut candidates: Vec<MergedCandidate> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for (modality, hits) in hits_by_modality {
        for hit in hits {
            let slot = match index.get(&hit.document_id) {
                Some(&slot) => slot,
                None => {
                    candidates.push(MergedCandidate::seeded(&hit));
                    index.insert(hit.document_id.clone(), candidates.len() - 1);
                    candidates.len() - 1
                }
            };
            candidates[slot].set_distance(modality, hit.raw_distance);
        }
    }

    candidates
}

/// Weighted mean of normalized relevance over the modalities that are both
/// weighted and present for this candidate. Silent modalities do not drag
/// the score down; a candidate with no weighted evidence scores `0`.
#[must_use]
pub fn score(candidate: &MergedCandidate, weights: &ModalityWeights) -> f32 {
    let contributions: Vec<(f32, f32)> = Modality::ALL
        .into_iter()
        .filter_map(|modality| {
            let weight = weights.get(modality);
            if weight == 0.0 {
                return None;
            }
            candidate
                .distance(modality)
                .map(|distance| (weight, normalize_distance(distance)))
        })
        .collect();

    // Scale by the largest weight first so huge finite weights cannot
    // overflow the total.
    let max_weight = contributions.iter().map(|(w, _)| *w).fold(0.0_f32, f32::max);
    if max_weight <= 0.0 {
        return 0.0;
    }
    let weight_total: f32 = contributions.iter().map(|(w, _)| w / max_weight).sum();

    contributions
        .iter()
        .map(|(weight, relevance)| (weight / max_weight / weight_total) * relevance)
        .sum::<f32>()
        .clamp(0.0, 1.0)
}

/// Score every candidate and keep the best `top_k`, highest score first.
/// Equal scores are ordered by document id.
#[must_use]
pub fn rank(
    candidates: Vec<MergedCandidate>,
    weights: &ModalityWeights,
    top_k: usize,
) -> Vec<RankedResult> {
    let mut ranked: Vec<RankedResult> = candidates
        .into_iter()
        .map(|candidate| {
            let combined_score = score(&candidate, weights);
            RankedResult {
                candidate,
                combined_score,
            }
        })
        .collect();

    ranked.sort_by(|a, b| {
        b.combined_score
            .partial_cmp(&a.combined_score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.candidate.document_id.cmp(&b.candidate.document_id))
    });
    ranked.truncate(top_k);
    ranked
}
