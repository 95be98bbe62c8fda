use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};

use crate::models::{format_timestamp, IntelligenceReport};

/// Entities listed in the digest before the count rolls up
const DIGEST_ENTITY_LIMIT: usize = 20;
/// Relationships listed in the digest
const DIGEST_RELATIONSHIP_LIMIT: usize = 10;

/// Write the full report as pretty-printed JSON
pub fn write_report_json(report: &IntelligenceReport, path: &Path) -> Result<()> {
    let file = std::fs::File::create(path)
        .with_context(|| format!("Failed to create file: {:?}", path))?;
    serde_json::to_writer_pretty(file, report).context("Failed to write report JSON")?;
    Ok(())
}

/// Human-readable digest of a report
pub struct ReportDigest<'a> {
    report: &'a IntelligenceReport,
}

impl<'a> ReportDigest<'a> {
    pub fn new(report: &'a IntelligenceReport) -> Self {
        Self { report }
    }

    /// Format the digest as plain text
    pub fn format(&self) -> String {
        let r = self.report;
        let mut out = String::new();

        let title = r.metadata.title.as_deref().unwrap_or("Untitled recording");
        out.push_str(title);
        out.push('\n');
        out.push_str(&"=".repeat(title.chars().count().max(4)));
        out.push('\n');
        if let Some(source) = r.metadata.source.as_deref() {
            out.push_str(&format!("Source: {}\n", source));
        }
        out.push_str(&format!(
            "Duration: {}\n",
            format_timestamp(r.metadata.duration_ms)
        ));
        if let Some(sentiment) = &r.sentiment {
            out.push_str(&format!(
                "Overall sentiment: {:?} (confidence {:.2})\n",
                sentiment.overall, sentiment.confidence
            ));
        }
        if r.incomplete {
            out.push_str("NOTE: incomplete run; some chunks were not extracted\n");
        }
        out.push('\n');

        self.push_speakers(&mut out);
        self.push_entities(&mut out);
        self.push_relationships(&mut out);
        self.push_topics(&mut out);
        self.push_key_moments(&mut out);
        self.push_cost(&mut out);

        out
    }

    /// Write the digest to a text file
    pub fn write_file(&self, path: &Path) -> Result<()> {
        let mut file = std::fs::File::create(path)
            .with_context(|| format!("Failed to create file: {:?}", path))?;
        write!(file, "{}", self.format())?;
        Ok(())
    }

    fn push_speakers(&self, out: &mut String) {
        let map = &self.report.speaker_map;
        if map.merged.is_empty() {
            return;
        }
        push_section(out, "Speakers");
        for speaker in &map.merged {
            let members: Vec<&str> = speaker.members.iter().map(|m| m.as_str()).collect();
            out.push_str(&format!(
                "{}: {:.1} min across {} segments ({})\n",
                speaker.merged_id,
                speaker.total_speech_ms as f64 / 60_000.0,
                speaker.segment_count,
                members.join(", ")
            ));
        }
        out.push('\n');
    }

    fn push_entities(&self, out: &mut String) {
        let entities = &self.report.entities;
        if entities.is_empty() {
            return;
        }
        push_section(out, "Entities");
        let mut by_mentions: Vec<_> = entities.iter().collect();
        by_mentions.sort_by(|a, b| b.mention_count.cmp(&a.mention_count));
        for entity in by_mentions.iter().take(DIGEST_ENTITY_LIMIT) {
            out.push_str(&format!(
                "{} ({:?}): {} mentions, confidence {:.2}",
                entity.canonical_name, entity.category, entity.mention_count, entity.confidence
            ));
            let aliases: Vec<&str> = entity
                .aliases
                .iter()
                .filter(|a| *a != &entity.canonical_name)
                .map(|a| a.as_str())
                .collect();
            if !aliases.is_empty() {
                out.push_str(&format!(" (aka {})", aliases.join(", ")));
            }
            out.push('\n');
        }
        if by_mentions.len() > DIGEST_ENTITY_LIMIT {
            out.push_str(&format!(
                "... and {} more\n",
                by_mentions.len() - DIGEST_ENTITY_LIMIT
            ));
        }
        out.push('\n');
    }

    fn push_relationships(&self, out: &mut String) {
        let relationships = &self.report.relationships;
        if relationships.is_empty() {
            return;
        }
        push_section(out, "Relationships");
        let mut by_confidence: Vec<_> = relationships.iter().collect();
        by_confidence.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
        for rel in by_confidence.iter().take(DIGEST_RELATIONSHIP_LIMIT) {
            out.push_str(&format!(
                "{} {} {} ({:.2})\n",
                rel.subject, rel.predicate, rel.object, rel.confidence
            ));
        }
        if by_confidence.len() > DIGEST_RELATIONSHIP_LIMIT {
            out.push_str(&format!(
                "... and {} more\n",
                by_confidence.len() - DIGEST_RELATIONSHIP_LIMIT
            ));
        }
        out.push('\n');
    }

    fn push_topics(&self, out: &mut String) {
        let topics = &self.report.topics;
        if topics.is_empty() {
            return;
        }
        push_section(out, "Topics");
        for topic in topics {
            let stamp = topic
                .start_ms
                .map(format_timestamp)
                .unwrap_or_else(|| "-".to_string());
            out.push_str(&format!(
                "[{}] {} (relevance {:.2})\n",
                stamp, topic.name, topic.relevance
            ));
        }
        out.push('\n');
    }

    fn push_key_moments(&self, out: &mut String) {
        let moments = &self.report.key_moments;
        if moments.is_empty() {
            return;
        }
        push_section(out, "Key Moments");
        for moment in moments {
            let who = moment.speaker.as_deref().unwrap_or("unknown");
            out.push_str(&format!(
                "[{}] {}: {}\n",
                format_timestamp(moment.timestamp_ms),
                who,
                moment.description
            ));
        }
        out.push('\n');
    }

    fn push_cost(&self, out: &mut String) {
        let cost = &self.report.cost_report;
        push_section(out, "Cost");
        out.push_str(&format!(
            "Total: ${:.4} ({} in / {} out, {:.1}% cached)\n",
            cost.total_cost_usd,
            cost.total_input_tokens,
            cost.total_output_tokens,
            cost.cache_hit_rate * 100.0
        ));
        out.push_str(&format!(
            "Chunks billed: {} standard, {} long-context\n",
            cost.standard_chunks, cost.long_context_chunks
        ));
        if !self.report.diagnostics.is_empty() {
            out.push_str(&format!(
                "Diagnostics recorded: {}\n",
                self.report.diagnostics.events.len()
            ));
        }
    }
}

fn push_section(out: &mut String, header: &str) {
    out.push_str(header);
    out.push('\n');
    out.push_str(&"-".repeat(header.chars().count()));
    out.push('\n');
}
