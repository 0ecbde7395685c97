//! Disqualification rules and service.
//!
//! Disqualifying an entry cancels its open tasks. Completed tasks and their
//! votes stay stored but no longer count, since aggregation skips
//! disqualified entries.

use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};

use chrono::Utc;
use jury_common::{AppError, AppResult};
use jury_db::{
    db_err,
    entities::{
        entry,
        round::{self, RoundStatus},
        round_entry,
    },
    repositories::{
        CampaignRepository, RoundEntryRepository, RoundRepository, TaskRepository, UserRepository,
    },
};
use sea_orm::{
    ConnectionTrait, DatabaseConnection, Set, TransactionTrait, prelude::DateTimeWithTimeZone,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::{Actor, access::require_coordinator, ensure_status};
use crate::round_config::RoundConfig;

/// Why an entry was disqualified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisqualificationRule {
    UploadDate,
    Resolution,
    Uploader,
    Filetype,
    Manual,
}

/// An entry matched by a disqualification rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DisqualifiedEntry {
    pub round_entry_id: String,
    pub entry_id: String,
    pub entry_name: String,
    pub rule: DisqualificationRule,
    pub reason: String,
}

impl DisqualifiedEntry {
    fn new(
        round_entry: &round_entry::Model,
        entry: &entry::Model,
        rule: DisqualificationRule,
        reason: String,
    ) -> Self {
        Self {
            round_entry_id: round_entry.id.clone(),
            entry_id: entry.id.clone(),
            entry_name: entry.name.clone(),
            rule,
            reason,
        }
    }
}

/// Rule selection for [`DisqualificationService::autodisqualify`]. Unset
/// flags fall back to the round configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AutodisqualifyInput {
    pub dq_by_upload_date: Option<bool>,
    pub dq_by_resolution: Option<bool>,
    pub dq_by_uploader: Option<bool>,
    pub dq_by_filetype: Option<bool>,
    /// Report matches without disqualifying anything.
    #[serde(default)]
    pub preview: bool,
}

fn candidates(
    entries: &[(round_entry::Model, entry::Model)],
) -> impl Iterator<Item = &(round_entry::Model, entry::Model)> {
    entries.iter().filter(|(re, _)| !re.is_disqualified())
}

/// Entries uploaded outside the campaign's open period. Entries without an
/// upload date are kept.
#[must_use]
pub fn by_upload_date(
    entries: &[(round_entry::Model, entry::Model)],
    open_date: Option<DateTimeWithTimeZone>,
    close_date: Option<DateTimeWithTimeZone>,
) -> Vec<DisqualifiedEntry> {
    candidates(entries)
        .filter_map(|(re, e)| {
            let uploaded = e.upload_date?;
            let reason = match (open_date, close_date) {
                (Some(open), _) if uploaded < open => {
                    format!("uploaded {uploaded} before the campaign opened on {open}")
                }
                (_, Some(close)) if uploaded > close => {
                    format!("uploaded {uploaded} after the campaign closed on {close}")
                }
                _ => return None,
            };
            Some(DisqualifiedEntry::new(
                re,
                e,
                DisqualificationRule::UploadDate,
                reason,
            ))
        })
        .collect()
}

/// Entries with fewer than `min_resolution` pixels.
#[must_use]
pub fn by_resolution(
    entries: &[(round_entry::Model, entry::Model)],
    min_resolution: i64,
) -> Vec<DisqualifiedEntry> {
    candidates(entries)
        .filter(|(_, e)| e.resolution() < min_resolution)
        .map(|(re, e)| {
            DisqualifiedEntry::new(
                re,
                e,
                DisqualificationRule::Resolution,
                format!(
                    "resolution {}x{} is below {min_resolution} pixels",
                    e.width, e.height
                ),
            )
        })
        .collect()
}

/// Entries uploaded by campaign staff. `roles` maps user names to the role
/// that disqualifies them.
#[must_use]
pub fn by_uploader(
    entries: &[(round_entry::Model, entry::Model)],
    roles: &HashMap<String, &'static str>,
) -> Vec<DisqualifiedEntry> {
    candidates(entries)
        .filter_map(|(re, e)| {
            let role = roles.get(&e.upload_user_text)?;
            Some(DisqualifiedEntry::new(
                re,
                e,
                DisqualificationRule::Uploader,
                format!("uploaded by {} ({role})", e.upload_user_text),
            ))
        })
        .collect()
}

/// Entries whose MIME type is not allowed by the round.
#[must_use]
pub fn by_filetype(
    entries: &[(round_entry::Model, entry::Model)],
    config: &RoundConfig,
) -> Vec<DisqualifiedEntry> {
    candidates(entries)
        .filter(|(_, e)| !config.allows_mime_type(&e.mime_type))
        .map(|(re, e)| {
            DisqualifiedEntry::new(
                re,
                e,
                DisqualificationRule::Filetype,
                format!("file type {} is not allowed", e.mime_type),
            )
        })
        .collect()
}

/// Service for disqualifying and requalifying round entries.
#[derive(Clone)]
pub struct DisqualificationService {
    db: Arc<DatabaseConnection>,
}

impl DisqualificationService {
    /// Create a new disqualification service.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Run the selected rules over the round's entries. Unless previewing,
    /// matches are disqualified, which needs a paused round.
    pub async fn autodisqualify(
        &self,
        actor: &Actor,
        round_id: &str,
        input: AutodisqualifyInput,
    ) -> AppResult<Vec<DisqualifiedEntry>> {
        let txn = self.db.begin().await.map_err(db_err)?;
        let round = RoundRepository::new(&txn).get_for_update(round_id).await?;
        require_coordinator(&txn, actor, &round.campaign_id).await?;
        if input.preview {
            ensure_status(
                &round,
                &[RoundStatus::Draft, RoundStatus::Active, RoundStatus::Paused],
                "evaluate disqualification rules for",
            )?;
        } else {
            ensure_status(&round, &[RoundStatus::Paused], "disqualify entries in")?;
        }

        let config = RoundConfig::from_stored(&round.config)?;
        let entries = RoundEntryRepository::new(&txn)
            .find_with_entries_by_round(&round.id)
            .await?;

        let mut matched = Vec::new();
        if input.dq_by_upload_date.unwrap_or(config.dq_by_upload_date) {
            let campaign = CampaignRepository::new(&txn)
                .get_by_id(&round.campaign_id)
                .await?;
            matched.extend(by_upload_date(
                &entries,
                campaign.open_date,
                campaign.close_date,
            ));
        }
        if input.dq_by_resolution.unwrap_or(config.dq_by_resolution) {
            matched.extend(by_resolution(&entries, config.min_resolution));
        }
        if input.dq_by_uploader.unwrap_or(config.dq_by_uploader) {
            let roles = staff_roles(&txn, &round, &config, &entries).await?;
            matched.extend(by_uploader(&entries, &roles));
        }
        if input.dq_by_filetype.unwrap_or(config.dq_by_filetype) {
            matched.extend(by_filetype(&entries, &config));
        }

        // The first matching rule names the reason.
        let mut seen = HashSet::new();
        matched.retain(|m| seen.insert(m.round_entry_id.clone()));

        if input.preview {
            txn.rollback().await.map_err(db_err)?;
            return Ok(matched);
        }

        let by_id: HashMap<&str, &round_entry::Model> =
            entries.iter().map(|(re, _)| (re.id.as_str(), re)).collect();
        let now: DateTimeWithTimeZone = Utc::now().into();
        let mut cancelled = 0;
        for m in &matched {
            if let Some(round_entry) = by_id.get(m.round_entry_id.as_str()) {
                cancelled +=
                    disqualify_in(&txn, round_entry, &m.reason, &actor.user_id, now).await?;
            }
        }

        txn.commit().await.map_err(db_err)?;
        info!(
            round_id = %round.id,
            disqualified = matched.len(),
            cancelled_tasks = cancelled,
            "Auto-disqualified entries"
        );
        Ok(matched)
    }

    /// Disqualify one entry of a paused round.
    pub async fn disqualify_entry(
        &self,
        actor: &Actor,
        round_id: &str,
        entry_id: &str,
        reason: Option<String>,
    ) -> AppResult<DisqualifiedEntry> {
        let txn = self.db.begin().await.map_err(db_err)?;
        let round = RoundRepository::new(&txn).get_for_update(round_id).await?;
        require_coordinator(&txn, actor, &round.campaign_id).await?;
        ensure_status(&round, &[RoundStatus::Paused], "disqualify entries in")?;

        let (round_entry, entry) = find_round_entry(&txn, &round, entry_id).await?;
        if round_entry.is_disqualified() {
            return Err(AppError::InvalidAction(format!(
                "entry {entry_id} is already disqualified"
            )));
        }

        let reason = reason.unwrap_or_else(|| "disqualified by a coordinator".to_string());
        let now: DateTimeWithTimeZone = Utc::now().into();
        let cancelled = disqualify_in(&txn, &round_entry, &reason, &actor.user_id, now).await?;

        txn.commit().await.map_err(db_err)?;
        info!(
            round_id = %round.id,
            entry_id = %entry_id,
            cancelled_tasks = cancelled,
            "Disqualified entry"
        );
        Ok(DisqualifiedEntry::new(
            &round_entry,
            &entry,
            DisqualificationRule::Manual,
            reason,
        ))
    }

    /// Return a disqualified entry to a paused round. Its tasks come back on
    /// the next rebalance.
    pub async fn requalify_entry(
        &self,
        actor: &Actor,
        round_id: &str,
        entry_id: &str,
    ) -> AppResult<round_entry::Model> {
        let txn = self.db.begin().await.map_err(db_err)?;
        let round = RoundRepository::new(&txn).get_for_update(round_id).await?;
        require_coordinator(&txn, actor, &round.campaign_id).await?;
        ensure_status(&round, &[RoundStatus::Paused], "requalify entries in")?;

        let (round_entry, _) = find_round_entry(&txn, &round, entry_id).await?;
        if !round_entry.is_disqualified() {
            return Err(AppError::InvalidAction(format!(
                "entry {entry_id} is not disqualified"
            )));
        }

        let mut active: round_entry::ActiveModel = round_entry.into();
        active.dq_reason = Set(None);
        active.dq_user_id = Set(None);
        active.dq_date = Set(None);
        let round_entry = RoundEntryRepository::new(&txn).update(active).await?;

        let round_id = round.id.clone();
        let mut active: round::ActiveModel = round.into();
        active.rebalance_pending = Set(true);
        RoundRepository::new(&txn).update(active).await?;

        txn.commit().await.map_err(db_err)?;
        info!(round_id = %round_id, entry_id = %entry_id, "Requalified entry");
        Ok(round_entry)
    }
}

async fn find_round_entry<C: ConnectionTrait>(
    db: &C,
    round: &round::Model,
    entry_id: &str,
) -> AppResult<(round_entry::Model, entry::Model)> {
    let round_entry = RoundEntryRepository::new(db)
        .get_by_round_and_entry(&round.id, entry_id)
        .await?;
    let mut pairs = RoundEntryRepository::new(db)
        .find_with_entries_by_ids(std::slice::from_ref(&round_entry.id))
        .await?;
    pairs
        .pop()
        .ok_or_else(|| AppError::Internal(format!("round entry {} has no entry", round_entry.id)))
}

/// Mark a round entry disqualified and cancel its open tasks. Returns the
/// number of cancelled tasks.
async fn disqualify_in<C: ConnectionTrait>(
    db: &C,
    round_entry: &round_entry::Model,
    reason: &str,
    user_id: &str,
    now: DateTimeWithTimeZone,
) -> AppResult<u64> {
    let mut active: round_entry::ActiveModel = round_entry.clone().into();
    active.dq_reason = Set(Some(reason.to_string()));
    active.dq_user_id = Set(Some(user_id.to_string()));
    active.dq_date = Set(Some(now));
    RoundEntryRepository::new(db).update(active).await?;

    TaskRepository::new(db)
        .cancel_open_by_round_entry(&round_entry.id, now)
        .await
}

/// Map uploader user names to the staff role that disqualifies them.
async fn staff_roles<C: ConnectionTrait>(
    db: &C,
    round: &round::Model,
    config: &RoundConfig,
    entries: &[(round_entry::Model, entry::Model)],
) -> AppResult<HashMap<String, &'static str>> {
    let mut uploaders: Vec<String> = entries
        .iter()
        .map(|(_, e)| e.upload_user_text.clone())
        .collect();
    uploaders.sort();
    uploaders.dedup();

    let users = UserRepository::new(db).find_by_usernames(&uploaders).await?;
    let coordinators: HashSet<String> = if config.dq_coords {
        CampaignRepository::new(db)
            .find_coordinator_ids(&round.campaign_id)
            .await?
            .into_iter()
            .collect()
    } else {
        HashSet::new()
    };

    let mut roles = HashMap::new();
    for user in users {
        let role = if coordinators.contains(&user.id) {
            Some("coordinator")
        } else if config.dq_organizers && user.is_organizer {
            Some("organizer")
        } else if config.dq_maintainers && user.is_maintainer {
            Some("maintainer")
        } else {
            None
        };
        if let Some(role) = role {
            roles.insert(user.username, role);
        }
    }
    Ok(roles)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn pair(
        id: &str,
        width: i32,
        height: i32,
        mime_type: &str,
        uploader: &str,
        upload_date: Option<DateTimeWithTimeZone>,
    ) -> (round_entry::Model, entry::Model) {
        (
            round_entry::Model {
                id: format!("re-{id}"),
                round_id: "r1".to_string(),
                entry_id: id.to_string(),
                dq_reason: None,
                dq_user_id: None,
                dq_date: None,
                created_at: Utc::now().into(),
            },
            entry::Model {
                id: id.to_string(),
                name: format!("{id}.jpg"),
                width,
                height,
                mime_type: mime_type.to_string(),
                upload_user_text: uploader.to_string(),
                upload_date,
                created_at: Utc::now().into(),
            },
        )
    }

    fn date(day: u32) -> DateTimeWithTimeZone {
        Utc.with_ymd_and_hms(2025, 9, day, 12, 0, 0).unwrap().into()
    }

    #[test]
    fn test_by_resolution() {
        let entries = vec![
            pair("small", 1000, 1000, "image/jpeg", "A", None),
            pair("large", 4000, 3000, "image/jpeg", "A", None),
            pair("edge", 2000, 1000, "image/jpeg", "A", None),
        ];

        let matched = by_resolution(&entries, 2_000_000);

        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].entry_id, "small");
        assert_eq!(matched[0].rule, DisqualificationRule::Resolution);
    }

    #[test]
    fn test_already_disqualified_entries_skipped() {
        let mut entries = vec![pair("small", 10, 10, "image/jpeg", "A", None)];
        entries[0].0.dq_date = Some(Utc::now().into());

        assert!(by_resolution(&entries, 2_000_000).is_empty());
    }

    #[test]
    fn test_by_upload_date() {
        let entries = vec![
            pair("early", 1, 1, "image/jpeg", "A", Some(date(1))),
            pair("inside", 1, 1, "image/jpeg", "A", Some(date(10))),
            pair("late", 1, 1, "image/jpeg", "A", Some(date(20) + Duration::hours(1))),
            pair("undated", 1, 1, "image/jpeg", "A", None),
        ];

        let matched = by_upload_date(&entries, Some(date(5)), Some(date(20)));

        let ids: Vec<&str> = matched.iter().map(|m| m.entry_id.as_str()).collect();
        assert_eq!(ids, vec!["early", "late"]);
    }

    #[test]
    fn test_by_uploader() {
        let entries = vec![
            pair("e1", 1, 1, "image/jpeg", "Coord", None),
            pair("e2", 1, 1, "image/jpeg", "Someone", None),
        ];
        let roles = HashMap::from([("Coord".to_string(), "coordinator")]);

        let matched = by_uploader(&entries, &roles);

        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].entry_id, "e1");
        assert!(matched[0].reason.contains("coordinator"));
    }

    #[test]
    fn test_by_filetype() {
        let entries = vec![
            pair("photo", 1, 1, "image/JPEG", "A", None),
            pair("video", 1, 1, "video/webm", "A", None),
            pair("vector", 1, 1, "image/svg+xml", "A", None),
        ];

        let matched = by_filetype(&entries, &RoundConfig::default());

        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].entry_id, "video");
    }
}
