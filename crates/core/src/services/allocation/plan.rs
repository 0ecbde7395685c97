//! Allocation planning.
//!
//! Planners are pure: they read a [`RoundSnapshot`] and return the tasks to
//! cancel and create. [`super::TaskAllocator`] loads snapshots and applies
//! plans inside the caller's transaction.

use std::{
    collections::{BTreeMap, BTreeSet, HashMap, HashSet},
    fmt,
};

use jury_common::{AppError, AppResult};
use jury_db::entities::task;
use rand::{Rng, seq::SliceRandom};

/// A task to be created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedTask {
    pub round_entry_id: String,
    pub user_id: String,
}

/// The allocation-relevant state of a round.
#[derive(Debug, Clone, Default)]
pub struct RoundSnapshot {
    /// Required active tasks per eligible entry.
    pub quorum: usize,
    /// User IDs of the active jurors.
    pub jurors: Vec<String>,
    /// IDs of the round entries that are not disqualified.
    pub entries: Vec<String>,
    /// Every active (not cancelled) task of the round.
    pub tasks: Vec<task::Model>,
}

/// Changes a planner wants applied.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AllocationPlan {
    /// IDs of open tasks to cancel.
    pub cancel: Vec<String>,
    pub create: Vec<PlannedTask>,
    /// Created tasks that replace a cancelled one on the same entry.
    pub reassigned: usize,
    /// Quorum slots no eligible juror was left to fill.
    pub unfilled_slots: usize,
    /// Number of (entry, juror) pairs that held more than one active task.
    pub duplicate_pairs: usize,
    /// Active tasks per active juror once the plan is applied.
    pub juror_loads: BTreeMap<String, usize>,
}

impl AllocationPlan {
    /// Mean number of active tasks per active juror.
    #[must_use]
    pub fn task_count_mean(&self) -> f64 {
        if self.juror_loads.is_empty() {
            return 0.0;
        }
        self.juror_loads.values().sum::<usize>() as f64 / self.juror_loads.len() as f64
    }
}

/// A broken allocation invariant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntegrityViolation {
    /// One juror holds several active tasks for the same entry.
    DuplicateAssignment {
        round_entry_id: String,
        user_id: String,
        active_tasks: usize,
    },
    /// An eligible entry has more active tasks than the quorum, or fewer
    /// while some active juror could still take it.
    QuorumMismatch {
        round_entry_id: String,
        expected: usize,
        actual: usize,
    },
}

impl fmt::Display for IntegrityViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicateAssignment {
                round_entry_id,
                user_id,
                active_tasks,
            } => write!(
                f,
                "juror {user_id} holds {active_tasks} active tasks for round entry {round_entry_id}"
            ),
            Self::QuorumMismatch {
                round_entry_id,
                expected,
                actual,
            } => write!(
                f,
                "round entry {round_entry_id} has {actual} active tasks, quorum is {expected}"
            ),
        }
    }
}

/// Plan the first allocation of a round.
///
/// Entries and jurors are shuffled, the entry sequence is walked `quorum`
/// times, and jurors are taken from a cyclic cursor. A juror already holding
/// the entry is skipped, as is one at the soft cap `ceil(E * Q / J)`. When
/// every eligible juror is at the cap the least-loaded eligible juror is
/// used.
pub fn plan_initial<R: Rng + ?Sized>(
    entries: &[String],
    jurors: &[String],
    quorum: usize,
    rng: &mut R,
) -> AppResult<Vec<PlannedTask>> {
    if quorum == 0 {
        return Err(AppError::InvalidAction(
            "quorum must be at least 1".to_string(),
        ));
    }
    if quorum > jurors.len() {
        return Err(AppError::InvalidAction(format!(
            "quorum {quorum} exceeds the {} active jurors",
            jurors.len()
        )));
    }

    let mut entries = entries.to_vec();
    entries.shuffle(rng);
    let mut jurors = jurors.to_vec();
    jurors.shuffle(rng);

    let juror_count = jurors.len();
    let cap = (entries.len() * quorum).div_ceil(juror_count);
    let mut load = vec![0_usize; juror_count];
    let mut held: HashSet<(usize, usize)> = HashSet::new();
    let mut planned = Vec::with_capacity(entries.len() * quorum);
    let mut cursor = 0;

    for _ in 0..quorum {
        for (entry_idx, entry_id) in entries.iter().enumerate() {
            let from_cursor = (0..juror_count).map(|k| (cursor + k) % juror_count);
            let chosen = from_cursor
                .clone()
                .find(|&j| !held.contains(&(entry_idx, j)) && load[j] < cap)
                .or_else(|| {
                    from_cursor
                        .filter(|&j| !held.contains(&(entry_idx, j)))
                        .min_by_key(|&j| load[j])
                })
                .ok_or_else(|| {
                    AppError::Internal(format!("no eligible juror left for round entry {entry_id}"))
                })?;

            held.insert((entry_idx, chosen));
            load[chosen] += 1;
            cursor = (chosen + 1) % juror_count;
            planned.push(PlannedTask {
                round_entry_id: entry_id.clone(),
                user_id: jurors[chosen].clone(),
            });
        }
    }

    Ok(planned)
}

/// Plan a rebalance toward `quorum` distinct active jurors per eligible
/// entry.
///
/// Completed tasks are never cancelled. Open tasks of jurors no longer on the
/// active roster are cancelled and their slots refilled. Deficits go to the
/// least-loaded jurors not already holding the entry, ties broken by a
/// shuffled juror order. Surplus open tasks are cancelled oldest first.
pub fn plan_rebalance<R: Rng + ?Sized>(snapshot: &RoundSnapshot, rng: &mut R) -> AllocationPlan {
    let mut order = snapshot.jurors.clone();
    order.shuffle(rng);

    let active: HashSet<&str> = snapshot.jurors.iter().map(String::as_str).collect();
    let eligible: BTreeSet<&str> = snapshot.entries.iter().map(String::as_str).collect();
    let mut load = initial_loads(snapshot);
    let mut plan = AllocationPlan::default();

    let mut by_entry: BTreeMap<&str, Vec<&task::Model>> = BTreeMap::new();
    for task in &snapshot.tasks {
        if eligible.contains(task.round_entry_id.as_str()) {
            by_entry
                .entry(task.round_entry_id.as_str())
                .or_default()
                .push(task);
        } else if task.is_open() {
            // Disqualified entries keep no open work.
            cancel_task(&mut plan, &mut load, task);
        }
    }

    for entry_id in &eligible {
        let mut tasks = by_entry.remove(entry_id).unwrap_or_default();
        tasks.sort_by(|a, b| a.id.cmp(&b.id));

        let mut kept = Vec::with_capacity(tasks.len());
        let mut displaced = 0;
        for task in tasks {
            if task.is_open() && !active.contains(task.user_id.as_str()) {
                cancel_task(&mut plan, &mut load, task);
                displaced += 1;
            } else {
                kept.push(task);
            }
        }

        if kept.len() < snapshot.quorum {
            let holders: HashSet<&str> = kept.iter().map(|t| t.user_id.as_str()).collect();
            let needed = snapshot.quorum - kept.len();
            let created = fill_slots(&mut plan, &mut load, &order, entry_id, &holders, needed);
            plan.reassigned += displaced.min(created);
        } else if kept.len() > snapshot.quorum {
            let surplus = kept.len() - snapshot.quorum;
            let excess: Vec<&task::Model> = kept
                .into_iter()
                .filter(|t| t.is_open())
                .take(surplus)
                .collect();
            for task in excess {
                cancel_task(&mut plan, &mut load, task);
            }
        }
    }

    plan.juror_loads = load.into_iter().collect();
    plan
}

/// Plan a reshuffle of every open task of the round.
///
/// All open tasks are cancelled and each eligible entry is refilled to
/// quorum from the current roster as in [`plan_rebalance`]. Completed tasks
/// stay, and their jurors are not given the same entry again.
pub fn plan_reshuffle<R: Rng + ?Sized>(snapshot: &RoundSnapshot, rng: &mut R) -> AllocationPlan {
    let settled = RoundSnapshot {
        tasks: snapshot
            .tasks
            .iter()
            .filter(|t| t.is_completed())
            .cloned()
            .collect(),
        ..snapshot.clone()
    };
    let mut plan = plan_rebalance(&settled, rng);

    let mut freed: HashMap<&str, usize> = HashMap::new();
    for task in snapshot.tasks.iter().filter(|t| t.is_open()) {
        plan.cancel.push(task.id.clone());
        *freed.entry(task.round_entry_id.as_str()).or_default() += 1;
    }
    let mut refilled: HashMap<&str, usize> = HashMap::new();
    for created in &plan.create {
        *refilled.entry(created.round_entry_id.as_str()).or_default() += 1;
    }
    plan.reassigned = freed
        .iter()
        .map(|(entry_id, n)| (*n).min(refilled.get(entry_id).copied().unwrap_or(0)))
        .sum();
    plan
}

/// Plan the removal of duplicate (entry, juror) assignments.
///
/// Completed tasks are never cancelled. For each duplicated pair the
/// completed task is kept if there is one, otherwise the most recently
/// created; the other open tasks are cancelled and the entry is topped back
/// up to quorum with other jurors.
pub fn plan_dedupe<R: Rng + ?Sized>(snapshot: &RoundSnapshot, rng: &mut R) -> AllocationPlan {
    let mut order = snapshot.jurors.clone();
    order.shuffle(rng);

    let eligible: BTreeSet<&str> = snapshot.entries.iter().map(String::as_str).collect();
    let mut load = initial_loads(snapshot);
    let mut plan = AllocationPlan::default();

    let mut by_pair: BTreeMap<(&str, &str), Vec<&task::Model>> = BTreeMap::new();
    for task in &snapshot.tasks {
        by_pair
            .entry((task.round_entry_id.as_str(), task.user_id.as_str()))
            .or_default()
            .push(task);
    }

    let mut touched: BTreeSet<&str> = BTreeSet::new();
    for ((entry_id, _), mut tasks) in by_pair {
        if tasks.len() < 2 {
            continue;
        }
        plan.duplicate_pairs += 1;
        tasks.sort_by(|a, b| a.id.cmp(&b.id));

        let keep_id = if tasks.iter().any(|t| t.is_completed()) {
            None
        } else {
            tasks.last().map(|t| t.id.clone())
        };
        for task in tasks {
            if task.is_open() && keep_id.as_deref() != Some(task.id.as_str()) {
                cancel_task(&mut plan, &mut load, task);
                touched.insert(entry_id);
            }
        }
    }

    let cancelled: HashSet<&str> = plan.cancel.iter().map(String::as_str).collect();
    let mut refills = Vec::new();
    for entry_id in touched.into_iter().filter(|e| eligible.contains(e)) {
        let remaining: Vec<&task::Model> = snapshot
            .tasks
            .iter()
            .filter(|t| t.round_entry_id == entry_id && !cancelled.contains(t.id.as_str()))
            .collect();
        if remaining.len() < snapshot.quorum {
            let holders: HashSet<&str> = remaining.iter().map(|t| t.user_id.as_str()).collect();
            refills.push((entry_id, holders, snapshot.quorum - remaining.len()));
        }
    }
    for (entry_id, holders, needed) in refills {
        let created = fill_slots(&mut plan, &mut load, &order, entry_id, &holders, needed);
        plan.reassigned += created;
    }

    plan.juror_loads = load.into_iter().collect();
    plan
}

/// Find broken allocation invariants.
///
/// A shortfall only counts when an active juror not yet holding the entry
/// exists; a roster too small for the quorum is reported by rebalance as
/// unfilled slots instead.
#[must_use]
pub fn check_integrity(snapshot: &RoundSnapshot) -> Vec<IntegrityViolation> {
    let mut violations = Vec::new();

    let mut by_pair: BTreeMap<(&str, &str), usize> = BTreeMap::new();
    let mut by_entry: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    for task in &snapshot.tasks {
        *by_pair
            .entry((task.round_entry_id.as_str(), task.user_id.as_str()))
            .or_default() += 1;
        by_entry
            .entry(task.round_entry_id.as_str())
            .or_default()
            .push(task.user_id.as_str());
    }

    for ((entry_id, user_id), count) in &by_pair {
        if *count > 1 {
            violations.push(IntegrityViolation::DuplicateAssignment {
                round_entry_id: (*entry_id).to_string(),
                user_id: (*user_id).to_string(),
                active_tasks: *count,
            });
        }
    }

    for entry_id in &snapshot.entries {
        let holders = by_entry.get(entry_id.as_str()).cloned().unwrap_or_default();
        let actual = holders.len();
        let fillable = snapshot
            .jurors
            .iter()
            .any(|j| !holders.contains(&j.as_str()));
        if actual > snapshot.quorum || (actual < snapshot.quorum && fillable) {
            violations.push(IntegrityViolation::QuorumMismatch {
                round_entry_id: entry_id.clone(),
                expected: snapshot.quorum,
                actual,
            });
        }
    }

    violations
}

/// Largest number of completed tasks held by any eligible entry.
#[must_use]
pub fn completed_coverage(snapshot: &RoundSnapshot) -> usize {
    let eligible: HashSet<&str> = snapshot.entries.iter().map(String::as_str).collect();
    let mut completed: HashMap<&str, usize> = HashMap::new();
    for task in snapshot.tasks.iter().filter(|t| t.is_completed()) {
        if eligible.contains(task.round_entry_id.as_str()) {
            *completed.entry(task.round_entry_id.as_str()).or_default() += 1;
        }
    }
    completed.values().copied().max().unwrap_or(0)
}

fn initial_loads(snapshot: &RoundSnapshot) -> HashMap<String, usize> {
    let mut load: HashMap<String, usize> =
        snapshot.jurors.iter().map(|j| (j.clone(), 0)).collect();
    for task in &snapshot.tasks {
        if let Some(count) = load.get_mut(&task.user_id) {
            *count += 1;
        }
    }
    load
}

fn cancel_task(plan: &mut AllocationPlan, load: &mut HashMap<String, usize>, task: &task::Model) {
    plan.cancel.push(task.id.clone());
    if let Some(count) = load.get_mut(&task.user_id) {
        *count = count.saturating_sub(1);
    }
}

/// Give `needed` new tasks on `entry_id` to the least-loaded jurors outside
/// `holders`. Returns how many were planned; the rest are unfilled.
fn fill_slots(
    plan: &mut AllocationPlan,
    load: &mut HashMap<String, usize>,
    order: &[String],
    entry_id: &str,
    holders: &HashSet<&str>,
    needed: usize,
) -> usize {
    let mut candidates: Vec<(usize, &String)> = order
        .iter()
        .enumerate()
        .filter(|(_, juror)| !holders.contains(juror.as_str()))
        .collect();
    candidates.sort_by_key(|(position, juror)| (load.get(*juror).copied().unwrap_or(0), *position));

    let mut created = 0;
    for (_, juror) in candidates.into_iter().take(needed) {
        plan.create.push(PlannedTask {
            round_entry_id: entry_id.to_string(),
            user_id: juror.clone(),
        });
        *load.entry(juror.clone()).or_default() += 1;
        created += 1;
    }
    plan.unfilled_slots += needed - created;
    created
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rand::{SeedableRng, rngs::StdRng};

    fn ids(prefix: &str, n: usize) -> Vec<String> {
        (0..n).map(|i| format!("{prefix}{i:02}")).collect()
    }

    fn task(id: &str, entry: &str, juror: &str, completed: bool) -> task::Model {
        task::Model {
            id: id.to_string(),
            round_id: "r1".to_string(),
            round_entry_id: entry.to_string(),
            user_id: juror.to_string(),
            created_at: Utc::now().into(),
            complete_date: completed.then(|| Utc::now().into()),
            cancel_date: None,
            skipped_at: None,
        }
    }

    fn loads(planned: &[PlannedTask]) -> HashMap<&str, usize> {
        let mut loads = HashMap::new();
        for t in planned {
            *loads.entry(t.user_id.as_str()).or_default() += 1;
        }
        loads
    }

    fn assert_distinct_pairs(planned: &[PlannedTask]) {
        let pairs: HashSet<(&str, &str)> = planned
            .iter()
            .map(|t| (t.round_entry_id.as_str(), t.user_id.as_str()))
            .collect();
        assert_eq!(pairs.len(), planned.len());
    }

    #[test]
    fn test_initial_full_coverage() {
        let mut rng = StdRng::seed_from_u64(7);
        let planned = plan_initial(&ids("e", 9), &ids("j", 3), 3, &mut rng).unwrap();

        assert_eq!(planned.len(), 27);
        assert_distinct_pairs(&planned);
        assert!(loads(&planned).values().all(|&n| n == 9));
    }

    #[test]
    fn test_initial_respects_soft_cap() {
        for seed in 0..20 {
            let mut rng = StdRng::seed_from_u64(seed);
            let planned = plan_initial(&ids("e", 10), &ids("j", 4), 2, &mut rng).unwrap();

            assert_eq!(planned.len(), 20);
            assert_distinct_pairs(&planned);
            assert!(loads(&planned).values().all(|&n| n <= 5));
        }
    }

    #[test]
    fn test_initial_rejects_quorum_above_roster() {
        let mut rng = StdRng::seed_from_u64(1);
        let err = plan_initial(&ids("e", 3), &ids("j", 2), 3, &mut rng).unwrap_err();
        assert!(matches!(err, AppError::InvalidAction(_)));

        let err = plan_initial(&ids("e", 3), &ids("j", 2), 0, &mut rng).unwrap_err();
        assert!(matches!(err, AppError::InvalidAction(_)));
    }

    #[test]
    fn test_initial_is_reproducible() {
        let first = plan_initial(&ids("e", 6), &ids("j", 4), 2, &mut StdRng::seed_from_u64(3));
        let second = plan_initial(&ids("e", 6), &ids("j", 4), 2, &mut StdRng::seed_from_u64(3));
        assert_eq!(first.unwrap(), second.unwrap());
    }

    #[test]
    fn test_rebalance_replaces_removed_juror() {
        let snapshot = RoundSnapshot {
            quorum: 2,
            jurors: vec!["A".to_string(), "C".to_string()],
            entries: vec!["E1".to_string()],
            tasks: vec![task("t1", "E1", "A", false), task("t2", "E1", "B", false)],
        };

        let plan = plan_rebalance(&snapshot, &mut StdRng::seed_from_u64(0));

        assert_eq!(plan.cancel, vec!["t2".to_string()]);
        assert_eq!(
            plan.create,
            vec![PlannedTask {
                round_entry_id: "E1".to_string(),
                user_id: "C".to_string(),
            }]
        );
        assert_eq!(plan.reassigned, 1);
        assert_eq!(plan.unfilled_slots, 0);
    }

    #[test]
    fn test_rebalance_keeps_completed_tasks_of_removed_juror() {
        let snapshot = RoundSnapshot {
            quorum: 2,
            jurors: vec!["A".to_string(), "C".to_string()],
            entries: vec!["E1".to_string()],
            tasks: vec![task("t1", "E1", "A", false), task("t2", "E1", "B", true)],
        };

        let plan = plan_rebalance(&snapshot, &mut StdRng::seed_from_u64(0));

        assert!(plan.cancel.is_empty());
        assert!(plan.create.is_empty());
    }

    #[test]
    fn test_rebalance_cancels_surplus_oldest_first() {
        let snapshot = RoundSnapshot {
            quorum: 1,
            jurors: vec!["A".to_string(), "C".to_string()],
            entries: vec!["E1".to_string()],
            tasks: vec![task("t1", "E1", "A", false), task("t2", "E1", "C", false)],
        };

        let plan = plan_rebalance(&snapshot, &mut StdRng::seed_from_u64(0));

        assert_eq!(plan.cancel, vec!["t1".to_string()]);
        assert!(plan.create.is_empty());
    }

    #[test]
    fn test_rebalance_surplus_skips_completed() {
        let snapshot = RoundSnapshot {
            quorum: 1,
            jurors: vec!["A".to_string(), "C".to_string()],
            entries: vec!["E1".to_string()],
            tasks: vec![task("t1", "E1", "A", true), task("t2", "E1", "C", false)],
        };

        let plan = plan_rebalance(&snapshot, &mut StdRng::seed_from_u64(0));

        assert_eq!(plan.cancel, vec!["t2".to_string()]);
    }

    #[test]
    fn test_rebalance_prefers_least_loaded() {
        let snapshot = RoundSnapshot {
            quorum: 1,
            jurors: vec!["A".to_string(), "B".to_string()],
            entries: vec!["E1".to_string(), "E2".to_string(), "E3".to_string()],
            tasks: vec![task("t1", "E1", "A", false), task("t2", "E2", "A", false)],
        };

        let plan = plan_rebalance(&snapshot, &mut StdRng::seed_from_u64(9));

        assert_eq!(plan.create.len(), 1);
        assert_eq!(plan.create[0].round_entry_id, "E3");
        assert_eq!(plan.create[0].user_id, "B");
        assert_eq!(plan.juror_loads.get("A"), Some(&2));
        assert_eq!(plan.juror_loads.get("B"), Some(&1));
        assert!((plan.task_count_mean() - 1.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_rebalance_reports_unfilled_slots() {
        let snapshot = RoundSnapshot {
            quorum: 3,
            jurors: vec!["A".to_string(), "B".to_string()],
            entries: vec!["E1".to_string()],
            tasks: vec![],
        };

        let plan = plan_rebalance(&snapshot, &mut StdRng::seed_from_u64(0));

        assert_eq!(plan.create.len(), 2);
        assert_eq!(plan.unfilled_slots, 1);
        assert!(check_integrity(&snapshot_after(&snapshot, &plan)).is_empty());
    }

    #[test]
    fn test_rebalance_cancels_open_tasks_on_disqualified_entries() {
        let snapshot = RoundSnapshot {
            quorum: 1,
            jurors: vec!["A".to_string()],
            entries: vec![],
            tasks: vec![task("t1", "E1", "A", false), task("t2", "E1", "A", true)],
        };

        let plan = plan_rebalance(&snapshot, &mut StdRng::seed_from_u64(0));

        assert_eq!(plan.cancel, vec!["t1".to_string()]);
    }

    #[test]
    fn test_dedupe_keeps_most_recent_open_task() {
        let snapshot = RoundSnapshot {
            quorum: 2,
            jurors: vec!["A".to_string(), "B".to_string()],
            entries: vec!["E1".to_string()],
            tasks: vec![task("t1", "E1", "A", false), task("t2", "E1", "A", false)],
        };

        let plan = plan_dedupe(&snapshot, &mut StdRng::seed_from_u64(0));

        assert_eq!(plan.duplicate_pairs, 1);
        assert_eq!(plan.cancel, vec!["t1".to_string()]);
        assert_eq!(plan.create.len(), 1);
        assert_eq!(plan.create[0].user_id, "B");
    }

    #[test]
    fn test_dedupe_keeps_completed_task() {
        let snapshot = RoundSnapshot {
            quorum: 1,
            jurors: vec!["A".to_string(), "B".to_string()],
            entries: vec!["E1".to_string()],
            tasks: vec![task("t1", "E1", "A", true), task("t2", "E1", "A", false)],
        };

        let plan = plan_dedupe(&snapshot, &mut StdRng::seed_from_u64(0));

        assert_eq!(plan.cancel, vec!["t2".to_string()]);
        assert!(plan.create.is_empty());
    }

    #[test]
    fn test_check_integrity() {
        let snapshot = RoundSnapshot {
            quorum: 2,
            jurors: vec!["A".to_string(), "B".to_string(), "C".to_string()],
            entries: vec!["E1".to_string(), "E2".to_string()],
            tasks: vec![
                task("t1", "E1", "A", false),
                task("t2", "E1", "A", false),
                task("t3", "E2", "B", false),
            ],
        };

        let violations = check_integrity(&snapshot);

        assert!(violations.contains(&IntegrityViolation::DuplicateAssignment {
            round_entry_id: "E1".to_string(),
            user_id: "A".to_string(),
            active_tasks: 2,
        }));
        assert!(violations.contains(&IntegrityViolation::QuorumMismatch {
            round_entry_id: "E2".to_string(),
            expected: 2,
            actual: 1,
        }));
        assert_eq!(violations.len(), 2);
    }

    #[test]
    fn test_completed_coverage() {
        let snapshot = RoundSnapshot {
            quorum: 3,
            jurors: vec![],
            entries: vec!["E1".to_string(), "E2".to_string()],
            tasks: vec![
                task("t1", "E1", "A", true),
                task("t2", "E1", "B", true),
                task("t3", "E2", "A", true),
                task("t4", "E3", "A", true),
                task("t5", "E3", "B", true),
                task("t6", "E3", "C", true),
            ],
        };

        assert_eq!(completed_coverage(&snapshot), 2);
    }

    #[test]
    fn test_reshuffle_moves_open_work_and_keeps_completed() {
        let snapshot = RoundSnapshot {
            quorum: 2,
            jurors: ids("j", 4),
            entries: vec!["E1".to_string(), "E2".to_string()],
            tasks: vec![
                task("t1", "E1", "j00", true),
                task("t2", "E1", "j01", false),
                task("t3", "E2", "j00", false),
                task("t4", "E2", "j01", false),
            ],
        };

        let plan = plan_reshuffle(&snapshot, &mut StdRng::seed_from_u64(5));

        assert_eq!(plan.cancel, vec!["t2".to_string(), "t3".to_string(), "t4".to_string()]);
        assert_eq!(plan.create.len(), 3);
        assert_eq!(plan.reassigned, 3);
        assert_eq!(plan.unfilled_slots, 0);
        assert!(
            !plan
                .create
                .iter()
                .any(|t| t.round_entry_id == "E1" && t.user_id == "j00")
        );
        assert!(check_integrity(&snapshot_after(&snapshot, &plan)).is_empty());
    }

    #[test]
    fn test_reshuffle_spreads_load_over_new_jurors() {
        let snapshot = RoundSnapshot {
            quorum: 1,
            jurors: ids("j", 3),
            entries: ids("e", 6),
            tasks: (0..6)
                .map(|i| task(&format!("t{i}"), &format!("e{i:02}"), "j00", false))
                .collect(),
        };

        let plan = plan_reshuffle(&snapshot, &mut StdRng::seed_from_u64(11));

        assert_eq!(plan.cancel.len(), 6);
        assert_eq!(plan.create.len(), 6);
        assert_distinct_pairs(&plan.create);
        assert!(loads(&plan.create).values().all(|&n| n == 2));
    }

    fn snapshot_after(snapshot: &RoundSnapshot, plan: &AllocationPlan) -> RoundSnapshot {
        let mut tasks: Vec<task::Model> = snapshot
            .tasks
            .iter()
            .filter(|t| !plan.cancel.contains(&t.id))
            .cloned()
            .collect();
        for (i, created) in plan.create.iter().enumerate() {
            tasks.push(task(
                &format!("n{i:02}"),
                &created.round_entry_id,
                &created.user_id,
                false,
            ));
        }
        RoundSnapshot {
            tasks,
            ..snapshot.clone()
        }
    }
}
