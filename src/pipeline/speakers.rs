use std::collections::{BTreeSet, HashMap};

use tracing::{info, warn};

use crate::extract::backend::SpeakerVerifier;
use crate::models::{
    DiarizedTranscript, MergeConfidence, MergedSpeaker, SpeakerMap, SpeakerProfile, SpeakerSample,
    TranscriptSegment,
};
use crate::pipeline::normalize::UnionFind;

/// Configuration for speaker cluster correction
#[derive(Debug, Clone)]
pub struct SpeakerConfig {
    /// Cosine similarity at which two embedding centroids merge
    pub embedding_threshold: f32,
    /// Verification runs only while more clusters than this remain
    pub expected_max_speakers: usize,
    /// Minimum clean sample length for the verification pass
    pub min_sample_ms: u64,
}

impl Default for SpeakerConfig {
    fn default() -> Self {
        Self {
            embedding_threshold: 0.85,
            expected_max_speakers: 4,
            min_sample_ms: 10_000,
        }
    }
}

/// Result of speaker cluster correction
#[derive(Debug)]
pub struct SpeakerResult {
    pub map: SpeakerMap,
    pub embedding_merges: usize,
    pub verified_merges: usize,
    /// Labels whose cluster was verified from an insufficient speech sample
    pub low_confidence: Vec<String>,
}

/// Collapse over-split diarizer clusters into corrected speakers.
///
/// Pass 1 merges labels whose embedding centroids are near-identical. Pass 2
/// runs only when more clusters remain than the conversation should have and
/// a verifier is available: one speech sample per cluster goes out in a
/// single request, and returned groupings fold into the same union-find.
/// Merging is monotonic: a pass can join clusters, never split them. Every
/// raw label ends up in exactly one merged speaker.
pub async fn correct_speakers<V: SpeakerVerifier>(
    transcript: &DiarizedTranscript,
    verifier: Option<&V>,
    config: &SpeakerConfig,
) -> SpeakerResult {
    let profiles = build_profiles(transcript);
    let label_index: HashMap<&str, usize> = profiles
        .iter()
        .enumerate()
        .map(|(i, p)| (p.label.as_str(), i))
        .collect();

    let mut sets = UnionFind::new(profiles.len());
    let mut embedding_merges = 0;

    for i in 0..profiles.len() {
        for j in (i + 1)..profiles.len() {
            let (a, b) = (&profiles[i].embedding, &profiles[j].embedding);
            if a.is_empty() || b.is_empty() {
                continue;
            }
            if cosine_similarity(a, b) >= config.embedding_threshold && !sets.same(i, j) {
                sets.union(i, j);
                embedding_merges += 1;
            }
        }
    }

    let mut verified_merges = 0;
    let mut low_confidence: Vec<String> = Vec::new();

    let cluster_count = count_clusters(&mut sets, profiles.len());
    if cluster_count > config.expected_max_speakers {
        if let Some(verifier) = verifier {
            let mut samples = Vec::new();
            for root in 0..profiles.len() {
                if sets.find(root) != root {
                    continue;
                }
                let members: BTreeSet<String> = (0..profiles.len())
                    .filter(|&j| sets.find(j) == root)
                    .map(|j| profiles[j].label.clone())
                    .collect();
                match pick_sample(transcript, &members, &profiles[root].label, config.min_sample_ms)
                {
                    Some((sample, fallback)) => {
                        if fallback {
                            warn!(
                                "no clean sample of {}ms+ for speaker {}; using a weaker one",
                                config.min_sample_ms, sample.label
                            );
                            low_confidence.push(sample.label.clone());
                        }
                        samples.push(sample);
                    }
                    None => warn!(
                        "speaker {} has no segments to sample; skipping verification for it",
                        profiles[root].label
                    ),
                }
            }

            match verifier.group_samples(&samples).await {
                Ok(groups) => {
                    for group in groups {
                        let indices: Vec<usize> = group
                            .iter()
                            .filter_map(|label| label_index.get(label.as_str()).copied())
                            .collect();
                        if indices.len() < group.len() {
                            warn!("verifier returned unknown speaker labels; ignoring them");
                        }
                        for pair in indices.windows(2) {
                            if !sets.same(pair[0], pair[1]) {
                                sets.union(pair[0], pair[1]);
                                verified_merges += 1;
                            }
                        }
                    }
                }
                Err(e) => {
                    warn!("speaker verification failed: {e}; keeping embedding-pass clusters");
                }
            }
        }
    }

    let map = build_map(&profiles, &mut sets, &low_confidence);
    info!(
        "Speaker correction: {} raw labels -> {} speakers ({} embedding merges, {} verified)",
        profiles.len(),
        map.merged_count(),
        embedding_merges,
        verified_merges
    );

    SpeakerResult {
        map,
        embedding_merges,
        verified_merges,
        low_confidence,
    }
}

/// Per-label profiles in order of first appearance
fn build_profiles(transcript: &DiarizedTranscript) -> Vec<SpeakerProfile> {
    transcript
        .speakers
        .iter()
        .map(|label| SpeakerProfile {
            label: label.clone(),
            embedding: transcript
                .speaker_embeddings
                .get(label)
                .cloned()
                .unwrap_or_default(),
            total_speech_ms: transcript.speech_ms_for(label),
            segment_count: transcript
                .segments
                .iter()
                .filter(|s| &s.speaker == label)
                .count(),
        })
        .collect()
}

fn count_clusters(sets: &mut UnionFind, len: usize) -> usize {
    (0..len).filter(|&i| sets.find(i) == i).count()
}

/// Longest clean (non-overlapped, min-length) segment across the cluster's
/// members; falls back to the longest segment of any kind.
fn pick_sample(
    transcript: &DiarizedTranscript,
    members: &BTreeSet<String>,
    representative: &str,
    min_sample_ms: u64,
) -> Option<(SpeakerSample, bool)> {
    let mut best_clean: Option<&TranscriptSegment> = None;
    let mut best_any: Option<&TranscriptSegment> = None;

    for segment in &transcript.segments {
        if !members.contains(&segment.speaker) {
            continue;
        }
        if best_any.is_none_or(|b| segment.duration_ms() > b.duration_ms()) {
            best_any = Some(segment);
        }
        if !segment.overlapped
            && segment.duration_ms() >= min_sample_ms
            && best_clean.is_none_or(|b| segment.duration_ms() > b.duration_ms())
        {
            best_clean = Some(segment);
        }
    }

    let (segment, fallback) = match (best_clean, best_any) {
        (Some(segment), _) => (segment, false),
        (None, Some(segment)) => (segment, true),
        (None, None) => return None,
    };
    Some((
        SpeakerSample {
            label: representative.to_string(),
            start_ms: segment.start_ms,
            end_ms: segment.end_ms,
            text: segment.text.clone(),
            overlapped: segment.overlapped,
        },
        fallback,
    ))
}

/// Finalize the partition: merged ids S0, S1, ... in order of first
/// appearance in the transcript.
fn build_map(
    profiles: &[SpeakerProfile],
    sets: &mut UnionFind,
    low_confidence: &[String],
) -> SpeakerMap {
    let mut map = SpeakerMap::default();

    for root in 0..profiles.len() {
        if sets.find(root) != root {
            continue;
        }
        let merged_id = format!("S{}", map.merged.len());

        let mut members = BTreeSet::new();
        let mut total_speech_ms = 0;
        let mut segment_count = 0;
        let mut confidence = MergeConfidence::High;
        for (j, profile) in profiles.iter().enumerate() {
            if sets.find(j) != root {
                continue;
            }
            members.insert(profile.label.clone());
            total_speech_ms += profile.total_speech_ms;
            segment_count += profile.segment_count;
            if low_confidence.contains(&profile.label) {
                confidence = MergeConfidence::Low;
            }
            map.index.insert(profile.label.clone(), merged_id.clone());
        }

        map.merged.push(MergedSpeaker {
            merged_id,
            members,
            total_speech_ms,
            segment_count,
            confidence,
        });
    }

    map
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}
