use crate::Result;
use core::fmt::{Display, Formatter};
use ohno::{IntoAppError, bail};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use url::Url;

/// A hosted repository, identified by `host/owner/repo`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RepoSpec {
    url: Arc<Url>,
    host: Arc<str>,
    owner: Arc<str>,
    repo: Arc<str>,
}

impl RepoSpec {
    pub fn parse(url: &Url) -> Result<Self> {
        let path_segments: Vec<_> = url.path_segments().map(Iterator::collect).unwrap_or_default();

        if path_segments.len() < 2 {
            bail!("cannot parse owner/repo from repository URL: {url}");
        }

        if path_segments[0].is_empty() || path_segments[1].is_empty() {
            bail!("invalid repository URL: empty owner or repo name: {url}");
        }

        let host = url.host_str().unwrap_or_default();
        let owner = path_segments[0];
        let repo = path_segments[1].trim_end_matches(".git");
        let scheme = url.scheme();

        let clean_url = Url::parse(&format!("{scheme}://{host}/{owner}/{repo}"))
            .into_app_err("reconstructing repository URL")?;

        Ok(Self {
            host: Arc::from(host),
            owner: Arc::from(owner),
            repo: Arc::from(repo),
            url: Arc::new(clean_url),
        })
    }

    /// Parse a repository reference given as text.
    pub fn parse_str(text: &str) -> Result<Self> {
        let url = Url::parse(text.trim()).into_app_err_with(|| format!("invalid repository URL '{text}'"))?;
        Self::parse(&url)
    }

    #[must_use]
    pub fn url(&self) -> &Url {
        &self.url
    }

    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    #[must_use]
    pub fn owner(&self) -> &str {
        &self.owner
    }

    #[must_use]
    pub fn repo(&self) -> &str {
        &self.repo
    }

    /// `owner/repo`, the form CI providers report as a run's head repository.
    #[must_use]
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.repo)
    }

    /// Whether a provider-reported `owner/repo` names this repository.
    #[must_use]
    pub fn is_same_repository(&self, full_name: &str) -> bool {
        full_name.eq_ignore_ascii_case(&self.full_name())
    }

    /// Where a local clone of this repository lives under `work_dir`.
    #[must_use]
    pub fn clone_dir(&self, work_dir: &Path) -> PathBuf {
        work_dir
            .join("repos")
            .join(sanitize_path_component(&self.host))
            .join(sanitize_path_component(&self.owner))
            .join(sanitize_path_component(&self.repo))
    }

    /// Where the analytics report for this repository is written under `work_dir`.
    #[must_use]
    pub fn report_path(&self, work_dir: &Path) -> PathBuf {
        work_dir
            .join("reports")
            .join(sanitize_path_component(&self.host))
            .join(sanitize_path_component(&self.owner))
            .join(format!("{}.json", sanitize_path_component(&self.repo)))
    }

    /// Storage object name for a report published on behalf of `identity`.
    #[must_use]
    pub fn object_name(&self, identity: &str) -> String {
        format!(
            "{}/{}/{}.json",
            sanitize_path_component(identity),
            sanitize_path_component(&self.owner),
            sanitize_path_component(&self.repo)
        )
    }
}

impl Display for RepoSpec {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.url)
    }
}

/// Replace anything that is not safe in a single path component.
fn sanitize_path_component(s: &str) -> String {
    let cleaned: String = s
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') { c } else { '_' })
        .collect();

    match cleaned.as_str() {
        "" | "." | ".." => "_".to_string(),
        _ => cleaned,
    }
}
