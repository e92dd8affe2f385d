//! Scripted in-memory collaborators for workflow tests.
//!
//! `FakeRepoHost` and `FakeDocModel` answer every contract method from
//! seeded state, with knobs to script failures, hold calls open, and
//! observe what was invoked. Health results go through the real scoring
//! function, so fixtures express signals rather than precomputed scores.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::watch;

use crate::activities::{
    AccessToken, ActivityError, ActivityResult, DocModel, ProfilePublication, RepoHost, RepoKey,
};
use crate::domain::{
    CodebaseSummary, DocKind, FileNode, HealthSignals, ProfileContext, RepoHealthResult,
    RepoMetadata, RepoSummary, ScanResult,
};

/// One seeded repository: metadata plus the signals its analysis reports.
#[derive(Debug, Clone)]
pub struct FakeRepo {
    pub meta: RepoMetadata,
    pub signals: HealthSignals,
    pub pending_fix_url: Option<String>,
}

impl FakeRepo {
    /// A healthy repository with the given name and id.
    pub fn healthy(id: u64, full_name: &str) -> Self {
        let pushed_at = Some(Utc::now() - chrono::Duration::days(2));
        Self {
            meta: RepoMetadata {
                id,
                full_name: full_name.to_string(),
                description: Some(format!("Description of {full_name}")),
                fork: false,
                stargazers_count: 0,
                pushed_at,
                language: Some("Rust".to_string()),
            },
            signals: HealthSignals {
                has_readme: true,
                has_description: true,
                last_push: pushed_at,
            },
            pending_fix_url: None,
        }
    }

    pub fn with_stars(mut self, stars: u32) -> Self {
        self.meta.stargazers_count = stars;
        self
    }

    pub fn with_language(mut self, language: &str) -> Self {
        self.meta.language = Some(language.to_string());
        self
    }

    pub fn as_fork(mut self) -> Self {
        self.meta.fork = true;
        self
    }

    pub fn without_readme(mut self) -> Self {
        self.signals.has_readme = false;
        self
    }
}

/// Record of a pull request the fake host holds open.
#[derive(Debug, Clone)]
pub struct PullRequestRecord {
    pub url: String,
    pub files: BTreeMap<String, String>,
    /// Times the same PR was updated after creation.
    pub updates: usize,
}

// ---------------------------------------------------------------------------
// FakeRepoHost
// ---------------------------------------------------------------------------

/// In-memory [`RepoHost`] backed by seeded repositories.
#[derive(Default)]
pub struct FakeRepoHost {
    repos: Mutex<Vec<FakeRepo>>,
    /// Remaining scripted failures per repo name; `usize::MAX` fails forever.
    failing_analysis: Mutex<HashMap<String, usize>>,
    failing_listings: AtomicUsize,
    scan_failures_remaining: AtomicUsize,
    scan_calls: AtomicUsize,
    analyze_calls: AtomicUsize,
    scan_result: Mutex<Option<ScanResult>>,
    analysis_gate: Mutex<Option<watch::Receiver<bool>>>,
    pull_requests: Mutex<HashMap<String, PullRequestRecord>>,
    publish_calls: AtomicUsize,
    failing_publishes: AtomicUsize,
    published_profile: Mutex<Option<(String, String)>>,
}

impl FakeRepoHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_repo(&self, repo: FakeRepo) {
        self.repos.lock().unwrap().push(repo);
    }

    /// Make every analysis of `full_name` fail.
    pub fn fail_analysis(&self, full_name: &str) {
        self.failing_analysis
            .lock()
            .unwrap()
            .insert(full_name.to_string(), usize::MAX);
    }

    /// Make the next `times` analyses of `full_name` fail, then succeed.
    pub fn fail_analysis_times(&self, full_name: &str, times: usize) {
        self.failing_analysis
            .lock()
            .unwrap()
            .insert(full_name.to_string(), times);
    }

    /// Make the next `times` listing calls fail.
    pub fn fail_listings(&self, times: usize) {
        self.failing_listings.store(times, Ordering::SeqCst);
    }

    /// Make the next `times` deep scans fail.
    pub fn fail_scans(&self, times: usize) {
        self.scan_failures_remaining.store(times, Ordering::SeqCst);
    }

    /// Override the canned scan result.
    pub fn set_scan_result(&self, scan: ScanResult) {
        *self.scan_result.lock().unwrap() = Some(scan);
    }

    /// Hold every analysis call open until `true` is sent on the returned
    /// channel. Lets tests observe mid-flight status.
    pub fn hold_analysis(&self) -> watch::Sender<bool> {
        let (tx, rx) = watch::channel(false);
        *self.analysis_gate.lock().unwrap() = Some(rx);
        tx
    }

    /// Number of deep scans invoked so far.
    pub fn scan_calls(&self) -> usize {
        self.scan_calls.load(Ordering::SeqCst)
    }

    /// Number of analysis attempts invoked so far.
    pub fn analyze_calls(&self) -> usize {
        self.analyze_calls.load(Ordering::SeqCst)
    }

    /// Number of publish attempts invoked so far.
    pub fn publish_calls(&self) -> usize {
        self.publish_calls.load(Ordering::SeqCst)
    }

    /// Make the next `times` profile publishes fail.
    pub fn fail_publishes(&self, times: usize) {
        self.failing_publishes.store(times, Ordering::SeqCst);
    }

    /// The PR currently open for `full_name`, if any.
    pub fn pull_request(&self, full_name: &str) -> Option<PullRequestRecord> {
        self.pull_requests.lock().unwrap().get(full_name).cloned()
    }

    /// Number of distinct pull requests created.
    pub fn created_pr_count(&self) -> usize {
        self.pull_requests.lock().unwrap().len()
    }

    /// The last published profile as `(username, content)`.
    pub fn published_profile(&self) -> Option<(String, String)> {
        self.published_profile.lock().unwrap().clone()
    }

    fn scripted_failure(&self, full_name: &str) -> bool {
        let mut failing = self.failing_analysis.lock().unwrap();
        match failing.get_mut(full_name) {
            Some(remaining) if *remaining > 0 => {
                if *remaining != usize::MAX {
                    *remaining -= 1;
                }
                true
            }
            _ => false,
        }
    }
}

/// Canned scan used when no override is set.
fn default_scan_result() -> ScanResult {
    let mut tech_stack_files = BTreeMap::new();
    tech_stack_files.insert(
        "Cargo.toml".to_string(),
        "[package]\nname = \"fixture\"\n".to_string(),
    );
    ScanResult {
        file_tree: vec![
            FileNode::dir("src", "src", vec![FileNode::file("main.rs", "src/main.rs")]),
            FileNode::file("Cargo.toml", "Cargo.toml"),
        ],
        tech_stack_files,
    }
}

#[async_trait]
impl RepoHost for FakeRepoHost {
    async fn analyze_health(
        &self,
        repo_full_name: &str,
        _token: &AccessToken,
    ) -> ActivityResult<RepoHealthResult> {
        // Clone the receiver out so no lock is held across the await.
        let gate = self.analysis_gate.lock().unwrap().clone();
        if let Some(mut rx) = gate {
            rx.wait_for(|open| *open).await.ok();
        }
        self.analyze_calls.fetch_add(1, Ordering::SeqCst);

        if self.scripted_failure(repo_full_name) {
            return Err(ActivityError::Remote {
                activity: "analyze_health".to_string(),
                message: format!("scripted analysis failure for {repo_full_name}"),
            });
        }

        let repos = self.repos.lock().unwrap();
        let repo = repos
            .iter()
            .find(|r| r.meta.full_name == repo_full_name)
            .ok_or_else(|| ActivityError::Remote {
                activity: "analyze_health".to_string(),
                message: format!("unknown repository {repo_full_name}"),
            })?;
        let mut result =
            RepoHealthResult::from_signals(repo_full_name, &repo.signals, Utc::now());
        result.pending_fix_url = repo.pending_fix_url.clone();
        Ok(result)
    }

    async fn list_repos(
        &self,
        _token: &AccessToken,
        limit: usize,
    ) -> ActivityResult<Vec<RepoSummary>> {
        if self.failing_listings.load(Ordering::SeqCst) > 0 {
            self.failing_listings.fetch_sub(1, Ordering::SeqCst);
            return Err(ActivityError::Remote {
                activity: "list_repos".to_string(),
                message: "scripted listing failure".to_string(),
            });
        }
        let repos = self.repos.lock().unwrap();
        Ok(repos.iter().take(limit).map(|r| r.meta.summary()).collect())
    }

    async fn list_repos_extended(
        &self,
        _token: &AccessToken,
    ) -> ActivityResult<Vec<RepoMetadata>> {
        if self.failing_listings.load(Ordering::SeqCst) > 0 {
            self.failing_listings.fetch_sub(1, Ordering::SeqCst);
            return Err(ActivityError::Remote {
                activity: "list_repos_extended".to_string(),
                message: "scripted listing failure".to_string(),
            });
        }
        let repos = self.repos.lock().unwrap();
        Ok(repos.iter().map(|r| r.meta.clone()).collect())
    }

    async fn deep_scan(&self, repo: &RepoKey, _token: &AccessToken) -> ActivityResult<ScanResult> {
        self.scan_calls.fetch_add(1, Ordering::SeqCst);
        if self.scan_failures_remaining.load(Ordering::SeqCst) > 0 {
            self.scan_failures_remaining.fetch_sub(1, Ordering::SeqCst);
            return Err(ActivityError::Remote {
                activity: "deep_scan".to_string(),
                message: format!("scripted scan failure for {}", repo.full_name),
            });
        }
        let override_scan = self.scan_result.lock().unwrap().clone();
        Ok(override_scan.unwrap_or_else(default_scan_result))
    }

    async fn open_docs_pull_request(
        &self,
        repo_full_name: &str,
        files: &BTreeMap<String, String>,
        _token: &AccessToken,
    ) -> ActivityResult<String> {
        let mut prs = self.pull_requests.lock().unwrap();
        // Reuse the existing branch/PR for this repo instead of opening a
        // duplicate.
        if let Some(existing) = prs.get_mut(repo_full_name) {
            existing.files = files.clone();
            existing.updates += 1;
            return Ok(existing.url.clone());
        }
        let url = format!("https://example.com/{repo_full_name}/pull/{}", prs.len() + 1);
        prs.insert(
            repo_full_name.to_string(),
            PullRequestRecord {
                url: url.clone(),
                files: files.clone(),
                updates: 0,
            },
        );
        Ok(url)
    }

    async fn publish_profile(
        &self,
        username: &str,
        content: &str,
        _token: &AccessToken,
    ) -> ActivityResult<ProfilePublication> {
        self.publish_calls.fetch_add(1, Ordering::SeqCst);
        if self.failing_publishes.load(Ordering::SeqCst) > 0 {
            self.failing_publishes.fetch_sub(1, Ordering::SeqCst);
            return Err(ActivityError::Remote {
                activity: "publish_profile".to_string(),
                message: "scripted publish failure".to_string(),
            });
        }
        *self.published_profile.lock().unwrap() =
            Some((username.to_string(), content.to_string()));
        Ok(ProfilePublication {
            profile_url: format!("https://example.com/{username}/{username}"),
            pr_url: Some(format!("https://example.com/{username}/{username}/pull/1")),
        })
    }
}

// ---------------------------------------------------------------------------
// FakeDocModel
// ---------------------------------------------------------------------------

/// In-memory [`DocModel`] producing deterministic canned documents.
#[derive(Default)]
pub struct FakeDocModel {
    failing_docs: Mutex<HashMap<DocKind, usize>>,
    failing_summaries: AtomicUsize,
    failing_profiles: AtomicUsize,
    summarize_calls: AtomicUsize,
    generate_calls: AtomicUsize,
    profile_calls: AtomicUsize,
    generation_gate: Mutex<Option<watch::Receiver<bool>>>,
}

impl FakeDocModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every generation of `kind` fail.
    pub fn fail_doc(&self, kind: DocKind) {
        self.failing_docs.lock().unwrap().insert(kind, usize::MAX);
    }

    /// Make the next `times` generations of `kind` fail, then succeed.
    pub fn fail_doc_times(&self, kind: DocKind, times: usize) {
        self.failing_docs.lock().unwrap().insert(kind, times);
    }

    /// Make the next `times` summarizations fail.
    pub fn fail_summaries(&self, times: usize) {
        self.failing_summaries.store(times, Ordering::SeqCst);
    }

    /// Make the next `times` profile generations fail.
    pub fn fail_profiles(&self, times: usize) {
        self.failing_profiles.store(times, Ordering::SeqCst);
    }

    /// Hold every document generation open until `true` is sent on the
    /// returned channel.
    pub fn hold_generation(&self) -> watch::Sender<bool> {
        let (tx, rx) = watch::channel(false);
        *self.generation_gate.lock().unwrap() = Some(rx);
        tx
    }

    pub fn summarize_calls(&self) -> usize {
        self.summarize_calls.load(Ordering::SeqCst)
    }

    pub fn generate_calls(&self) -> usize {
        self.generate_calls.load(Ordering::SeqCst)
    }

    pub fn profile_calls(&self) -> usize {
        self.profile_calls.load(Ordering::SeqCst)
    }

    fn scripted_doc_failure(&self, kind: DocKind) -> bool {
        let mut failing = self.failing_docs.lock().unwrap();
        match failing.get_mut(&kind) {
            Some(remaining) if *remaining > 0 => {
                if *remaining != usize::MAX {
                    *remaining -= 1;
                }
                true
            }
            _ => false,
        }
    }
}

#[async_trait]
impl DocModel for FakeDocModel {
    async fn summarize_codebase(
        &self,
        repo_name: &str,
        description: Option<&str>,
        scan: &ScanResult,
    ) -> ActivityResult<CodebaseSummary> {
        self.summarize_calls.fetch_add(1, Ordering::SeqCst);
        if self.failing_summaries.load(Ordering::SeqCst) > 0 {
            self.failing_summaries.fetch_sub(1, Ordering::SeqCst);
            return Err(ActivityError::Remote {
                activity: "summarize_codebase".to_string(),
                message: "scripted summary failure".to_string(),
            });
        }
        let description = description.unwrap_or("none");
        Ok(CodebaseSummary(format!(
            "{{\"repo\":\"{repo_name}\",\"description\":\"{description}\",\"tech_files\":{}}}",
            scan.tech_stack_files.len()
        )))
    }

    async fn generate_document(
        &self,
        kind: DocKind,
        repo_name: &str,
        summary: &CodebaseSummary,
        _scan: &ScanResult,
    ) -> ActivityResult<String> {
        let gate = self.generation_gate.lock().unwrap().clone();
        if let Some(mut rx) = gate {
            rx.wait_for(|open| *open).await.ok();
        }
        self.generate_calls.fetch_add(1, Ordering::SeqCst);
        if self.scripted_doc_failure(kind) {
            return Err(ActivityError::Remote {
                activity: "generate_document".to_string(),
                message: format!("scripted {} generation failure", kind.label()),
            });
        }
        Ok(format!(
            "# {repo_name}\n\nGenerated {} from summary ({} bytes).\n",
            kind.filename(),
            summary.as_str().len()
        ))
    }

    async fn generate_profile(
        &self,
        username: &str,
        context: &ProfileContext,
    ) -> ActivityResult<String> {
        self.profile_calls.fetch_add(1, Ordering::SeqCst);
        if self.failing_profiles.load(Ordering::SeqCst) > 0 {
            self.failing_profiles.fetch_sub(1, Ordering::SeqCst);
            return Err(ActivityError::Remote {
                activity: "generate_profile".to_string(),
                message: "scripted profile failure".to_string(),
            });
        }
        let projects: Vec<&str> = context
            .selected
            .iter()
            .map(|c| c.full_name.as_str())
            .collect();
        Ok(format!(
            "# Hi, I'm {username}\n\nTop projects: {}\n",
            projects.join(", ")
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token() -> AccessToken {
        AccessToken::new("test-token")
    }

    #[tokio::test]
    async fn test_analysis_scores_seeded_signals() {
        let host = FakeRepoHost::new();
        host.push_repo(FakeRepo::healthy(1, "me/tidy"));
        host.push_repo(FakeRepo::healthy(2, "me/bare").without_readme());

        let tidy = host.analyze_health("me/tidy", &token()).await.unwrap();
        assert_eq!(tidy.health_score, 100);

        let bare = host.analyze_health("me/bare", &token()).await.unwrap();
        assert_eq!(bare.health_score, 80);
        assert_eq!(bare.issues, vec!["No README".to_string()]);
    }

    #[tokio::test]
    async fn test_scripted_failures_count_down() {
        let host = FakeRepoHost::new();
        host.push_repo(FakeRepo::healthy(1, "me/flaky"));
        host.fail_analysis_times("me/flaky", 2);

        assert!(host.analyze_health("me/flaky", &token()).await.is_err());
        assert!(host.analyze_health("me/flaky", &token()).await.is_err());
        assert!(host.analyze_health("me/flaky", &token()).await.is_ok());
    }

    #[tokio::test]
    async fn test_pull_requests_are_reused_not_duplicated() {
        let host = FakeRepoHost::new();
        let files: BTreeMap<String, String> =
            [("README.md".to_string(), "# hi".to_string())].into();

        let first = host
            .open_docs_pull_request("me/repo", &files, &token())
            .await
            .unwrap();
        let second = host
            .open_docs_pull_request("me/repo", &files, &token())
            .await
            .unwrap();
        assert_eq!(first, second);
        assert_eq!(host.created_pr_count(), 1);
        assert_eq!(host.pull_request("me/repo").unwrap().updates, 1);
    }

    #[tokio::test]
    async fn test_doc_model_fails_only_scripted_kinds() {
        let model = FakeDocModel::new();
        model.fail_doc(DocKind::Architecture);
        let summary = CodebaseSummary("{}".to_string());
        let scan = default_scan_result();

        assert!(model
            .generate_document(DocKind::Readme, "me/repo", &summary, &scan)
            .await
            .is_ok());
        assert!(model
            .generate_document(DocKind::Architecture, "me/repo", &summary, &scan)
            .await
            .is_err());
    }
}
