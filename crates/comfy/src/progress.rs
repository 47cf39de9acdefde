//! Completion percentage estimation for a running job.
//!
//! The engine reports a sequence of per-node `executing` notifications
//! plus occasional step-level progress inside a node. The declared node
//! count is the only stable denominator available, so the percentage
//! weights every node equally and is necessarily an approximation.
//! The emitted value is guaranteed monotonically non-decreasing and
//! clamped to [0, 100].

use std::collections::HashSet;

use helios_core::workflow::Workflow;

/// One normalized status event, appended to the per-job log.
///
/// `value`/`max` default to 1/1 (a node with no step-level progress
/// counts as fully complete once reached).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusLog {
    /// Node the event refers to, if any.
    pub node: Option<String>,
    /// Current step within the node.
    pub value: i64,
    /// Total steps within the node.
    pub max: i64,
    /// Node IDs satisfied from cache; they will never be visited.
    pub cached_nodes: Vec<String>,
}

impl Default for StatusLog {
    fn default() -> Self {
        Self {
            node: None,
            value: 1,
            max: 1,
            cached_nodes: Vec::new(),
        }
    }
}

impl StatusLog {
    pub fn for_node(node: impl Into<String>) -> Self {
        Self {
            node: Some(node.into()),
            ..Default::default()
        }
    }

    pub fn with_steps(node: Option<String>, value: i64, max: i64) -> Self {
        Self {
            node,
            value,
            max,
            cached_nodes: Vec::new(),
        }
    }

    pub fn cached(nodes: Vec<String>) -> Self {
        Self {
            cached_nodes: nodes,
            ..Default::default()
        }
    }
}

/// Per-job progress state: total and visited node sets, the current
/// node pointer, and the last emitted percentage.
#[derive(Debug)]
pub struct JobProgress {
    total_nodes: HashSet<String>,
    visited_nodes: HashSet<String>,
    current: Option<StatusLog>,
    status_logs: Vec<StatusLog>,
    last_percentage: f64,
}

impl JobProgress {
    /// Initialize from the submitted workflow; the key set of the
    /// workflow object is the total node set.
    pub fn new(workflow: &Workflow) -> Self {
        Self {
            total_nodes: workflow.node_ids().map(str::to_owned).collect(),
            visited_nodes: HashSet::new(),
            current: None,
            status_logs: Vec::new(),
            last_percentage: 0.0,
        }
    }

    /// Record one status event.
    ///
    /// Cached nodes are removed from the total set before anything else
    /// so a later percentage computation never divides by a stale
    /// denominator. Events with a node update the current-node pointer;
    /// a current node inside the (possibly shrunk) total set is marked
    /// visited.
    pub fn record(&mut self, log: StatusLog) {
        for node in &log.cached_nodes {
            self.total_nodes.remove(node);
        }
        if log.node.is_some() {
            self.current = Some(log.clone());
        }
        self.status_logs.push(log);
        if let Some(node) = self.current.as_ref().and_then(|c| c.node.as_deref()) {
            if self.total_nodes.contains(node) {
                self.visited_nodes.insert(node.to_owned());
            }
        }
    }

    /// Compute the completion percentage and advance the monotonic
    /// floor. Rounded to two decimal places for reporting.
    ///
    /// An empty total set (zero-node workflow, or every node served
    /// from cache) is defined as 100: there is nothing left to execute.
    pub fn percentage(&mut self) -> f64 {
        if self.total_nodes.is_empty() {
            self.last_percentage = 100.0;
            return 100.0;
        }

        let total = self.total_nodes.len() as f64;
        let node_weight = 100.0 / total;

        let (value, max) = self
            .current
            .as_ref()
            .map(|c| (c.value, c.max))
            .unwrap_or((1, 1));
        let ratio = if max <= 0 {
            1.0
        } else {
            (value as f64 / max as f64).clamp(0.0, 1.0)
        };
        let current_contribution = (ratio * node_weight).min(100.0);

        // A current node mid-way through its steps has not yet earned its
        // full node weight; otherwise subtract it from the visited count
        // since its full weight re-enters via the contribution term.
        let partial = self
            .current
            .as_ref()
            .map(|c| c.max != 1 && c.value != 0)
            .unwrap_or(false);
        let adjustment = if partial { 0.0 } else { 1.0 };

        let base = ((self.visited_nodes.len() as f64 - adjustment) / total) * 100.0;
        let raw = base + current_contribution;

        self.last_percentage = raw.max(self.last_percentage).min(100.0);
        round2(self.last_percentage)
    }

    /// Last emitted percentage without recomputation.
    pub fn last_percentage(&self) -> f64 {
        round2(self.last_percentage)
    }

    /// Node id of the most recent event that named one.
    pub fn current_node(&self) -> Option<&str> {
        self.current.as_ref().and_then(|c| c.node.as_deref())
    }

    /// The ordered, append-only event log for this job.
    pub fn status_logs(&self) -> &[StatusLog] {
        &self.status_logs
    }

    pub fn visited_count(&self) -> usize {
        self.visited_nodes.len()
    }

    pub fn total_count(&self) -> usize {
        self.total_nodes.len()
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn workflow(nodes: &[&str]) -> Workflow {
        let mut map = serde_json::Map::new();
        for n in nodes {
            map.insert((*n).to_string(), serde_json::json!({}));
        }
        Workflow::new(map)
    }

    #[test]
    fn strictly_increases_and_hits_100_at_sentinel() {
        let wf = workflow(&["A", "B", "C"]);
        let mut progress = JobProgress::new(&wf);

        progress.record(StatusLog::for_node("A"));
        let p1 = progress.percentage();
        progress.record(StatusLog::for_node("B"));
        let p2 = progress.percentage();
        progress.record(StatusLog::for_node("C"));
        let p3 = progress.percentage();
        // End-of-graph sentinel: executing with no node.
        progress.record(StatusLog::default());
        let p4 = progress.percentage();

        assert!(p1 > 0.0);
        assert!(p2 > p1);
        assert!(p3 > p2);
        assert_eq!(p3, 100.0);
        assert_eq!(p4, 100.0);
    }

    #[test]
    fn cached_nodes_shrink_the_denominator() {
        let wf = workflow(&["A", "B", "C"]);
        let mut progress = JobProgress::new(&wf);

        progress.record(StatusLog::cached(vec!["B".to_string()]));
        progress.record(StatusLog::for_node("A"));
        assert_eq!(progress.percentage(), 50.0);
        progress.record(StatusLog::for_node("C"));
        assert_eq!(progress.percentage(), 100.0);
    }

    #[test]
    fn empty_workflow_is_trivially_complete() {
        let wf = workflow(&[]);
        let mut progress = JobProgress::new(&wf);
        assert_eq!(progress.percentage(), 100.0);
    }

    #[test]
    fn all_nodes_cached_is_complete() {
        let wf = workflow(&["A", "B"]);
        let mut progress = JobProgress::new(&wf);
        progress.record(StatusLog::cached(vec!["A".to_string(), "B".to_string()]));
        assert_eq!(progress.percentage(), 100.0);
    }

    #[test]
    fn never_decreases() {
        let wf = workflow(&["A", "B", "C", "D"]);
        let mut progress = JobProgress::new(&wf);

        let mut last = 0.0;
        let events = vec![
            StatusLog::for_node("A"),
            StatusLog::for_node("B"),
            StatusLog::with_steps(Some("B".to_string()), 1, 20),
            StatusLog::with_steps(Some("B".to_string()), 10, 20),
            // Re-announcing an earlier node must not move the number back.
            StatusLog::for_node("A"),
            StatusLog::for_node("C"),
            StatusLog::for_node("D"),
            StatusLog::default(),
        ];
        for event in events {
            progress.record(event);
            let p = progress.percentage();
            assert!(p >= last, "percentage regressed: {p} < {last}");
            assert!((0.0..=100.0).contains(&p));
            last = p;
        }
        assert_eq!(last, 100.0);
    }

    #[test]
    fn step_progress_contributes_fractionally() {
        let wf = workflow(&["A", "B", "C"]);
        let mut progress = JobProgress::new(&wf);

        progress.record(StatusLog::for_node("A"));
        assert_eq!(progress.percentage(), 33.33);

        // Halfway through node B's 20 steps.
        progress.record(StatusLog::with_steps(Some("B".to_string()), 10, 20));
        let p = progress.percentage();
        assert!(p > 33.33 && p < 100.0, "got {p}");
    }

    #[test]
    fn unknown_node_is_not_counted_as_visited() {
        let wf = workflow(&["A"]);
        let mut progress = JobProgress::new(&wf);
        progress.record(StatusLog::for_node("Z"));
        assert_eq!(progress.visited_count(), 0);
    }

    #[test]
    fn visited_is_subset_of_total() {
        let wf = workflow(&["A", "B"]);
        let mut progress = JobProgress::new(&wf);
        progress.record(StatusLog::for_node("A"));
        progress.record(StatusLog::cached(vec!["B".to_string()]));
        progress.record(StatusLog::for_node("B"));
        assert!(progress.visited_count() <= progress.total_count());
    }

    #[test]
    fn reported_values_are_rounded() {
        let wf = workflow(&["A", "B", "C"]);
        let mut progress = JobProgress::new(&wf);
        progress.record(StatusLog::for_node("A"));
        assert_eq!(progress.percentage(), 33.33);
    }

    #[test]
    fn keeps_the_event_log_in_order() {
        let wf = workflow(&["A"]);
        let mut progress = JobProgress::new(&wf);
        progress.record(StatusLog::for_node("A"));
        progress.record(StatusLog::default());
        assert_eq!(progress.status_logs().len(), 2);
        assert_eq!(progress.status_logs()[0].node.as_deref(), Some("A"));
    }
}
