//! Workflow index entry: a denormalized projection used for listing.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::WorkflowId;
use super::workflow::{Progress, Workflow, WorkflowStatus};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowIndexEntry {
    pub id: WorkflowId,
    pub title: String,
    pub status: WorkflowStatus,
    pub project: String,
    pub progress: Progress,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl From<&Workflow> for WorkflowIndexEntry {
    fn from(wf: &Workflow) -> Self {
        Self {
            id: wf.id,
            title: wf.title.clone(),
            status: wf.status,
            project: wf.project.clone(),
            progress: wf.progress,
            created_at: wf.created_at,
            updated_at: wf.updated_at,
            tags: wf.tags.clone(),
        }
    }
}

/// Filter for `WorkflowStore::list`. Empty / `None` fields match everything.
#[derive(Debug, Clone, Default)]
pub struct WorkflowFilter {
    pub status: Vec<WorkflowStatus>,
    pub project: Option<String>,
    /// Any-match against the entry's tags.
    pub tags: Vec<String>,
    /// Case-insensitive substring over title and tags.
    pub search: Option<String>,
    pub has_incomplete: Option<bool>,
    pub created_after: Option<DateTime<Utc>>,
    pub created_before: Option<DateTime<Utc>>,
    pub limit: Option<usize>,
}

impl WorkflowFilter {
    pub fn status(mut self, status: WorkflowStatus) -> Self {
        self.status.push(status);
        self
    }

    pub fn project(mut self, project: impl Into<String>) -> Self {
        self.project = Some(project.into());
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    pub fn search(mut self, text: impl Into<String>) -> Self {
        self.search = Some(text.into());
        self
    }

    pub fn matches(&self, entry: &WorkflowIndexEntry) -> bool {
        if !self.status.is_empty() && !self.status.contains(&entry.status) {
            return false;
        }
        if let Some(project) = &self.project
            && &entry.project != project
        {
            return false;
        }
        if !self.tags.is_empty() && !self.tags.iter().any(|t| entry.tags.contains(t)) {
            return false;
        }
        if let Some(text) = &self.search {
            let needle = text.to_lowercase();
            let hit = entry.title.to_lowercase().contains(&needle)
                || entry.tags.iter().any(|t| t.to_lowercase().contains(&needle));
            if !hit {
                return false;
            }
        }
        if let Some(incomplete) = self.has_incomplete
            && entry.progress.has_incomplete_work() != incomplete
        {
            return false;
        }
        if let Some(after) = self.created_after
            && entry.created_at < after
        {
            return false;
        }
        if let Some(before) = self.created_before
            && entry.created_at > before
        {
            return false;
        }
        true
    }

    /// Filter, sort most-recently-updated first, then apply `limit`.
    pub fn apply(&self, entries: Vec<WorkflowIndexEntry>) -> Vec<WorkflowIndexEntry> {
        let mut out: Vec<_> = entries.into_iter().filter(|e| self.matches(e)).collect();
        out.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        if let Some(limit) = self.limit {
            out.truncate(limit);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use ulid::Ulid;

    fn entry(title: &str, project: &str, tags: &[&str], age_mins: i64) -> WorkflowIndexEntry {
        let at = Utc::now() - Duration::minutes(age_mins);
        WorkflowIndexEntry {
            id: WorkflowId::from_ulid(Ulid::new()),
            title: title.into(),
            status: WorkflowStatus::Draft,
            project: project.into(),
            progress: Progress::default(),
            created_at: at,
            updated_at: at,
            tags: tags.iter().map(|t| t.to_string()).collect(),
        }
    }

    #[test]
    fn sorts_most_recently_updated_first() {
        let old = entry("old", "p", &[], 30);
        let new = entry("new", "p", &[], 1);
        let out = WorkflowFilter::default().apply(vec![old, new]);
        assert_eq!(out[0].title, "new");
        assert_eq!(out[1].title, "old");
    }

    #[test]
    fn search_hits_title_or_tags_case_insensitively() {
        let a = entry("Auth rewrite", "p", &[], 1);
        let b = entry("Billing", "p", &["AUTHZ"], 2);
        let c = entry("Docs", "p", &[], 3);
        let out = WorkflowFilter::default().search("auth").apply(vec![a, b, c]);
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn project_and_tag_filters_combine() {
        let a = entry("a", "web", &["api"], 1);
        let b = entry("b", "cli", &["api"], 2);
        let c = entry("c", "web", &["ui"], 3);
        let out = WorkflowFilter::default()
            .project("web")
            .tag("api")
            .tag("db")
            .apply(vec![a, b, c]);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].title, "a");
    }

    #[test]
    fn has_incomplete_and_date_bounds() {
        let mut done = entry("done", "p", &[], 10);
        done.progress = Progress {
            total: 2,
            completed: 2,
            failed: 0,
            percentage: 100,
        };
        let mut open = entry("open", "p", &[], 120);
        open.progress = Progress {
            total: 2,
            completed: 1,
            failed: 0,
            percentage: 50,
        };

        let filter = WorkflowFilter {
            has_incomplete: Some(true),
            ..WorkflowFilter::default()
        };
        let out = filter.apply(vec![done.clone(), open.clone()]);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].title, "open");

        let filter = WorkflowFilter {
            created_after: Some(Utc::now() - Duration::minutes(60)),
            ..WorkflowFilter::default()
        };
        let out = filter.apply(vec![done, open]);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].title, "done");
    }

    #[test]
    fn limit_applies_after_sort() {
        let entries = (0..5).map(|i| entry(&format!("w{i}"), "p", &[], i)).collect();
        let filter = WorkflowFilter {
            limit: Some(2),
            ..WorkflowFilter::default()
        };
        let out = filter.apply(entries);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].title, "w0");
    }
}
