//! Vote aggregation and advancement.
//!
//! Only votes whose task is still active count. Disqualified entries are
//! left out, and so are entries with fewer counted votes than the quorum;
//! those are reported as under-voted.

use std::{collections::HashMap, sync::Arc};

use jury_common::{AppError, AppResult};
use jury_db::{
    entities::{entry, round, round_entry, vote},
    repositories::{RoundEntryRepository, RoundRepository, VoteRepository},
};
use sea_orm::{ConnectionTrait, DatabaseConnection};
use serde::Serialize;

use super::{Actor, access::require_coordinator, round_quorum};
use crate::vote_method::{VoteMethod, VoteRules};

/// Aggregated votes of one entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntrySummary {
    pub round_entry_id: String,
    pub entry_id: String,
    pub entry_name: String,
    pub vote_count: usize,
    /// Mean vote value rounded to three decimals. For ranking rounds this is
    /// the mean rank.
    pub average: f64,
}

/// An entry left out of aggregation for lack of votes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnderVotedEntry {
    pub round_entry_id: String,
    pub entry_id: String,
    pub entry_name: String,
    pub vote_count: usize,
    pub quorum: usize,
}

/// Aggregation of a whole round.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RoundSummary {
    pub entries: Vec<EntrySummary>,
    pub under_voted: Vec<UnderVotedEntry>,
}

/// Number of entries sharing one average.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AverageCount {
    pub average: f64,
    pub count: usize,
}

/// Number of entries whose average is at least `threshold`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ThresholdStep {
    pub threshold: f64,
    pub count: usize,
}

/// Every observed average mapped to the number of entries that would
/// advance with it as the cut-off. Steps ascend by threshold; counts never
/// increase.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ThresholdMap {
    steps: Vec<ThresholdStep>,
}

impl ThresholdMap {
    /// Build the map from per-entry averages.
    #[must_use]
    pub fn from_averages(averages: impl IntoIterator<Item = f64>) -> Self {
        let mut averages: Vec<f64> = averages.into_iter().collect();
        averages.sort_by(f64::total_cmp);

        let total = averages.len();
        let mut steps: Vec<ThresholdStep> = Vec::new();
        for (index, average) in averages.iter().enumerate() {
            if steps.last().is_some_and(|s| s.threshold == *average) {
                continue;
            }
            steps.push(ThresholdStep {
                threshold: *average,
                count: total - index,
            });
        }
        Self { steps }
    }

    #[must_use]
    pub fn steps(&self) -> &[ThresholdStep] {
        &self.steps
    }

    /// Number of entries with an average of at least `threshold`.
    #[must_use]
    pub fn count_at(&self, threshold: f64) -> usize {
        self.steps
            .iter()
            .find(|s| s.threshold >= threshold)
            .map_or(0, |s| s.count)
    }

    /// The highest threshold that still advances at least `min_entries`.
    #[must_use]
    pub fn pick_threshold(&self, min_entries: usize) -> Option<f64> {
        self.steps
            .iter()
            .rev()
            .find(|s| s.count >= min_entries)
            .map(|s| s.threshold)
    }
}

/// An entry's place in a ranking round's results.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedEntry {
    /// 1-based position.
    pub rank: usize,
    #[serde(flatten)]
    pub summary: EntrySummary,
}

/// Round a value to three decimal places.
#[must_use]
pub fn round_to_millis(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

/// Aggregate counted votes per eligible entry.
#[must_use]
pub fn summarize_votes(
    vote_method: VoteMethod,
    quorum: usize,
    entries: &[(round_entry::Model, entry::Model)],
    votes: &[vote::Model],
) -> RoundSummary {
    let mut values: HashMap<&str, Vec<f64>> = HashMap::new();
    for vote in votes {
        values
            .entry(vote.round_entry_id.as_str())
            .or_default()
            .push(vote.value);
    }

    let mut summary = RoundSummary::default();
    for (round_entry, entry) in entries.iter().filter(|(re, _)| !re.is_disqualified()) {
        let entry_values = values
            .get(round_entry.id.as_str())
            .map_or(&[][..], Vec::as_slice);
        let vote_count = entry_values.len();

        match vote_method.aggregate(entry_values) {
            Some(average) if vote_count >= quorum => summary.entries.push(EntrySummary {
                round_entry_id: round_entry.id.clone(),
                entry_id: entry.id.clone(),
                entry_name: entry.name.clone(),
                vote_count,
                average: round_to_millis(average),
            }),
            _ => summary.under_voted.push(UnderVotedEntry {
                round_entry_id: round_entry.id.clone(),
                entry_id: entry.id.clone(),
                entry_name: entry.name.clone(),
                vote_count,
                quorum,
            }),
        }
    }
    summary
}

/// Count entries per exact average.
#[must_use]
pub fn average_rating_map(summary: &RoundSummary) -> Vec<AverageCount> {
    let mut averages: Vec<f64> = summary.entries.iter().map(|e| e.average).collect();
    averages.sort_by(f64::total_cmp);

    let mut counts: Vec<AverageCount> = Vec::new();
    for average in averages {
        match counts.last_mut() {
            Some(last) if last.average == average => last.count += 1,
            _ => counts.push(AverageCount { average, count: 1 }),
        }
    }
    counts
}

/// Entries whose average is at least `threshold`, best first.
#[must_use]
pub fn advancing_group(summary: &RoundSummary, threshold: f64) -> Vec<EntrySummary> {
    let mut group: Vec<EntrySummary> = summary
        .entries
        .iter()
        .filter(|e| e.average >= threshold)
        .cloned()
        .collect();
    group.sort_by(|a, b| {
        b.average
            .total_cmp(&a.average)
            .then_with(|| a.entry_name.cmp(&b.entry_name))
    });
    group
}

/// Order entries by mean rank, lowest first. Ties fall back to entry name,
/// then entry ID, so the order is total.
#[must_use]
pub fn rank_entries(summary: &RoundSummary) -> Vec<RankedEntry> {
    let mut entries = summary.entries.clone();
    entries.sort_by(|a, b| {
        a.average
            .total_cmp(&b.average)
            .then_with(|| a.entry_name.cmp(&b.entry_name))
            .then_with(|| a.entry_id.cmp(&b.entry_id))
    });
    entries
        .into_iter()
        .enumerate()
        .map(|(index, summary)| RankedEntry {
            rank: index + 1,
            summary,
        })
        .collect()
}

/// Load and aggregate a round's counted votes.
pub(crate) async fn summarize<C: ConnectionTrait>(
    db: &C,
    round: &round::Model,
) -> AppResult<RoundSummary> {
    let entries = RoundEntryRepository::new(db)
        .find_with_entries_by_round(&round.id)
        .await?;
    let votes = VoteRepository::new(db)
        .find_counted_by_round(&round.id)
        .await?;
    let quorum = round_quorum(round)?;
    Ok(summarize_votes(round.vote_method, quorum, &entries, &votes))
}

/// Read-side service over round results.
#[derive(Clone)]
pub struct ThresholdAdvancer {
    db: Arc<DatabaseConnection>,
}

impl ThresholdAdvancer {
    /// Create a new advancer.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Per-entry aggregation of a round, with under-voted entries listed
    /// separately.
    pub async fn entry_summaries(&self, actor: &Actor, round_id: &str) -> AppResult<RoundSummary> {
        Ok(self.load(actor, round_id).await?.1)
    }

    /// Number of entries per exact average.
    pub async fn get_round_average_rating_map(
        &self,
        actor: &Actor,
        round_id: &str,
    ) -> AppResult<Vec<AverageCount>> {
        let (round, summary) = self.load(actor, round_id).await?;
        require_threshold_method(&round)?;
        Ok(average_rating_map(&summary))
    }

    /// Number of entries that would advance at each observed average.
    pub async fn get_threshold_map(&self, actor: &Actor, round_id: &str) -> AppResult<ThresholdMap> {
        let (round, summary) = self.load(actor, round_id).await?;
        require_threshold_method(&round)?;
        Ok(ThresholdMap::from_averages(
            summary.entries.iter().map(|e| e.average),
        ))
    }

    /// Entries whose average is at least `threshold`.
    pub async fn get_rating_advancing_group(
        &self,
        actor: &Actor,
        round_id: &str,
        threshold: f64,
    ) -> AppResult<Vec<EntrySummary>> {
        let (round, summary) = self.load(actor, round_id).await?;
        require_threshold_method(&round)?;
        Ok(advancing_group(&summary, threshold))
    }

    /// Entries of a ranking round in final order.
    pub async fn get_ranking_results(
        &self,
        actor: &Actor,
        round_id: &str,
    ) -> AppResult<Vec<RankedEntry>> {
        let (round, summary) = self.load(actor, round_id).await?;
        if round.vote_method != VoteMethod::Ranking {
            return Err(AppError::InvalidAction(format!(
                "round {} is not a ranking round",
                round.id
            )));
        }
        Ok(rank_entries(&summary))
    }

    async fn load(&self, actor: &Actor, round_id: &str) -> AppResult<(round::Model, RoundSummary)> {
        let db = self.db.as_ref();
        let round = RoundRepository::new(db).get_by_id(round_id).await?;
        require_coordinator(db, actor, &round.campaign_id).await?;
        let summary = summarize(db, &round).await?;
        Ok((round, summary))
    }
}

fn require_threshold_method(round: &round::Model) -> AppResult<()> {
    if round.vote_method.uses_threshold() {
        Ok(())
    } else {
        Err(AppError::InvalidAction(format!(
            "round {} is a ranking round and has no threshold",
            round.id
        )))
    }
}
