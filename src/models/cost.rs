use serde::{Deserialize, Serialize};

/// Token counts from one service call.
///
/// `input_tokens` is the total prompt size including cache reads;
/// `cached_tokens` is the subset served from cache.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
    #[serde(default)]
    pub cached_tokens: u64,
}

impl TokenUsage {
    /// Accumulate another call's usage (retries bill every attempt)
    pub fn merge(&mut self, other: &TokenUsage) {
        self.input_tokens += other.input_tokens;
        self.output_tokens += other.output_tokens;
        self.cached_tokens += other.cached_tokens;
    }

    pub fn is_zero(&self) -> bool {
        self.input_tokens == 0 && self.output_tokens == 0 && self.cached_tokens == 0
    }
}

/// Pricing tier a call was billed under, decided by prompt size
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PricingTier {
    Standard,
    LongContext,
}

/// Dollar rates per million tokens
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PricingRates {
    pub input_per_mtok: f64,
    pub output_per_mtok: f64,
    pub cached_per_mtok: f64,
}

impl PricingRates {
    pub fn cost_for(&self, usage: &TokenUsage) -> f64 {
        let uncached = usage.input_tokens.saturating_sub(usage.cached_tokens) as f64;
        (uncached * self.input_per_mtok
            + usage.cached_tokens as f64 * self.cached_per_mtok
            + usage.output_tokens as f64 * self.output_per_mtok)
            / 1_000_000.0
    }
}

/// Two-tier pricing schedule: calls whose input crosses the threshold bill
/// at long-context rates.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PricingSchedule {
    pub standard: PricingRates,
    pub long_context: PricingRates,
    pub long_context_threshold: u64,
}

impl Default for PricingSchedule {
    fn default() -> Self {
        Self {
            standard: PricingRates {
                input_per_mtok: 3.00,
                output_per_mtok: 15.00,
                cached_per_mtok: 0.30,
            },
            long_context: PricingRates {
                input_per_mtok: 6.00,
                output_per_mtok: 22.50,
                cached_per_mtok: 0.60,
            },
            long_context_threshold: 200_000,
        }
    }
}

impl PricingSchedule {
    pub fn tier_for(&self, input_tokens: u64) -> PricingTier {
        if input_tokens >= self.long_context_threshold {
            PricingTier::LongContext
        } else {
            PricingTier::Standard
        }
    }

    pub fn rates_for(&self, tier: PricingTier) -> &PricingRates {
        match tier {
            PricingTier::Standard => &self.standard,
            PricingTier::LongContext => &self.long_context,
        }
    }
}

/// What one chunk's extraction cost, retries included
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CostRecord {
    pub chunk_index: usize,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cached_tokens: u64,
    pub tier: PricingTier,
    pub cost_usd: f64,
}

impl CostRecord {
    /// Price accumulated usage for a chunk under the tier the first attempt
    /// was billed at.
    pub fn new(
        chunk_index: usize,
        usage: TokenUsage,
        tier: PricingTier,
        schedule: &PricingSchedule,
    ) -> Self {
        Self {
            chunk_index,
            input_tokens: usage.input_tokens,
            output_tokens: usage.output_tokens,
            cached_tokens: usage.cached_tokens,
            tier,
            cost_usd: schedule.rates_for(tier).cost_for(&usage),
        }
    }
}

/// Run-level cost summary: a pure fold over the per-chunk records
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CostReport {
    pub total_cost_usd: f64,
    pub total_input_tokens: u64,
    pub total_output_tokens: u64,
    pub total_cached_tokens: u64,
    /// Cached input tokens over total input tokens; 0 when nothing was sent
    pub cache_hit_rate: f64,
    pub standard_chunks: usize,
    pub long_context_chunks: usize,
}

impl CostReport {
    pub fn from_records(records: &[CostRecord]) -> Self {
        let mut report = CostReport::default();
        for record in records {
            report.total_cost_usd += record.cost_usd;
            report.total_input_tokens += record.input_tokens;
            report.total_output_tokens += record.output_tokens;
            report.total_cached_tokens += record.cached_tokens;
            match record.tier {
                PricingTier::Standard => report.standard_chunks += 1,
                PricingTier::LongContext => report.long_context_chunks += 1,
            }
        }
        if report.total_input_tokens > 0 {
            report.cache_hit_rate =
                report.total_cached_tokens as f64 / report.total_input_tokens as f64;
        }
        report
    }
}
