//! Admission of inbound push notifications.

use crate::allowlist::{AllowList, canonical};
use crate::payload::PushEvent;
use shipwright_core::ports::{SourceControl, TargetRegistry};
use shipwright_core::request::{branch_from_ref, branch_slug, target_name};
use shipwright_core::{DeploymentRequest, Error, Result, Trigger};
use std::net::IpAddr;
use std::sync::Arc;

/// Decides whether a notification is trusted and which target it names.
#[derive(Clone)]
pub struct AdmissionFilter {
    allow_list: AllowList,
    registry: Arc<dyn TargetRegistry>,
    source_control: Arc<dyn SourceControl>,
}

impl AdmissionFilter {
    pub fn new(
        allow_list: AllowList,
        registry: Arc<dyn TargetRegistry>,
        source_control: Arc<dyn SourceControl>,
    ) -> Self {
        Self {
            allow_list,
            registry,
            source_control,
        }
    }

    pub fn allow_list(&self) -> &AllowList {
        &self.allow_list
    }

    /// Turn a raw notification into a request for an existing target.
    ///
    /// Errors are rejections: [`Error::UntrustedSource`],
    /// [`Error::InvalidPayload`], [`Error::UnsupportedRef`] or
    /// [`Error::TargetNotFound`].
    pub async fn admit(&self, source: IpAddr, raw: &[u8]) -> Result<DeploymentRequest> {
        if !self.allow_list.contains(source) {
            return Err(Error::UntrustedSource(source.to_string()));
        }

        let event = PushEvent::parse(raw)?;
        let repository = event.repository.name.trim();
        validate_component(repository)?;
        let branch = branch_from_ref(&event.git_ref)?;

        let name = target_name(repository, branch);
        let path = self.registry.locate(&name);
        let request = DeploymentRequest::new(repository, branch, path, Trigger::Push);

        match self.registry.resolve(&request).await? {
            Some(_) => Ok(request),
            None => Err(Error::TargetNotFound(request.name)),
        }
    }

    /// Turn an operator's request for target `name` into a manual request.
    ///
    /// Only loopback and allow-listed sources are accepted. The branch and
    /// repository are read from the target's working copy.
    pub async fn admit_manual(&self, source: IpAddr, name: &str) -> Result<DeploymentRequest> {
        if !canonical(source).is_loopback() && !self.allow_list.contains(source) {
            return Err(Error::UntrustedSource(source.to_string()));
        }
        validate_component(name)?;

        let path = self.registry.locate(name);
        let mut request = DeploymentRequest::for_target(name, path, name, "", Trigger::Manual);
        if self.registry.resolve(&request).await?.is_none() {
            return Err(Error::TargetNotFound(request.name));
        }

        let branch = self.source_control.current_branch(&request.path).await?;
        let suffix = format!("-{}", branch_slug(&branch));
        request.repository = name.strip_suffix(&suffix).unwrap_or(name).to_string();
        request.branch = branch;
        Ok(request)
    }
}

/// Repository and target names become directory names, so they must be a
/// single plain path component.
fn validate_component(name: &str) -> Result<()> {
    let invalid = name.is_empty()
        || name.starts_with('.')
        || name.contains(['/', '\\'])
        || name.chars().any(char::is_control);
    if invalid {
        return Err(Error::InvalidPayload(format!("invalid name {:?}", name)));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use shipwright_core::ports::{RunReport, Target};
    use std::path::{Path, PathBuf};

    struct Known(PathBuf);

    #[async_trait]
    impl Target for Known {
        fn name(&self) -> &str {
            "app-feature-x"
        }

        fn path(&self) -> &Path {
            &self.0
        }

        async fn pull(&self, _path: &Path) -> Result<()> {
            Ok(())
        }

        async fn run(&self, _request: &DeploymentRequest) -> Result<RunReport> {
            Ok(RunReport {
                exit_code: 0,
                duration_ms: 0,
            })
        }
    }

    /// Knows only `app-feature-x` and `app-main`.
    struct Registry;

    #[async_trait]
    impl TargetRegistry for Registry {
        fn locate(&self, name: &str) -> PathBuf {
            PathBuf::from("/srv/targets").join(name)
        }

        async fn discover(&self) -> Result<Vec<Arc<dyn Target>>> {
            Ok(vec![])
        }

        async fn resolve(&self, request: &DeploymentRequest) -> Result<Option<Arc<dyn Target>>> {
            if request.name == "app-feature-x" || request.name == "app-main" {
                return Ok(Some(Arc::new(Known(request.path.clone()))));
            }
            Ok(None)
        }
    }

    struct OnBranch(&'static str);

    #[async_trait]
    impl SourceControl for OnBranch {
        async fn current_branch(&self, _path: &Path) -> Result<String> {
            Ok(self.0.to_string())
        }

        async fn sync(&self, _path: &Path) -> Result<()> {
            Ok(())
        }
    }

    fn filter() -> AdmissionFilter {
        filter_on("main")
    }

    fn filter_on(branch: &'static str) -> AdmissionFilter {
        AdmissionFilter::new(
            AllowList::parse(["10.0.0.0/8"]).unwrap(),
            Arc::new(Registry),
            Arc::new(OnBranch(branch)),
        )
    }

    fn payload(repo: &str, git_ref: &str) -> Vec<u8> {
        serde_json::json!({ "ref": git_ref, "repository": { "name": repo } })
            .to_string()
            .into_bytes()
    }

    #[tokio::test]
    async fn test_admit_trusted_push() {
        let request = filter()
            .admit("10.1.2.3".parse().unwrap(), &payload("app", "refs/heads/feature/x"))
            .await
            .unwrap();

        assert_eq!(request.name, "app-feature-x");
        assert_eq!(request.branch, "feature/x");
        assert_eq!(request.repository, "app");
        assert_eq!(request.path, PathBuf::from("/srv/targets/app-feature-x"));
        assert_eq!(request.trigger, Trigger::Push);
    }

    #[tokio::test]
    async fn test_reject_untrusted_source() {
        let err = filter()
            .admit("203.0.113.5".parse().unwrap(), &payload("app", "refs/heads/main"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::UntrustedSource(_)));
    }

    #[tokio::test]
    async fn test_reject_unknown_target() {
        let err = filter()
            .admit("10.1.2.3".parse().unwrap(), &payload("other", "refs/heads/main"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::TargetNotFound(name) if name == "other-main"));
    }

    #[tokio::test]
    async fn test_reject_tag_push() {
        let err = filter()
            .admit("10.1.2.3".parse().unwrap(), &payload("app", "refs/tags/v1"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::UnsupportedRef(_)));
    }

    #[tokio::test]
    async fn test_reject_path_like_repository() {
        for repo in ["../etc", "a/b", ".hidden", ""] {
            let err = filter()
                .admit("10.1.2.3".parse().unwrap(), &payload(repo, "refs/heads/main"))
                .await
                .unwrap_err();
            assert!(matches!(err, Error::InvalidPayload(_)), "accepted {repo:?}");
        }
    }

    #[tokio::test]
    async fn test_manual_from_loopback_reads_working_copy() {
        let request = filter_on("feature/x")
            .admit_manual("127.0.0.1".parse().unwrap(), "app-feature-x")
            .await
            .unwrap();

        assert_eq!(request.name, "app-feature-x");
        assert_eq!(request.repository, "app");
        assert_eq!(request.branch, "feature/x");
        assert_eq!(request.trigger, Trigger::Manual);
        assert_eq!(request.path, PathBuf::from("/srv/targets/app-feature-x"));
    }

    #[tokio::test]
    async fn test_manual_rejections() {
        let err = filter()
            .admit_manual("203.0.113.5".parse().unwrap(), "app-main")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::UntrustedSource(_)));

        let err = filter()
            .admit_manual("::1".parse().unwrap(), "other-main")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::TargetNotFound(_)));

        let err = filter()
            .admit_manual("10.1.2.3".parse().unwrap(), "..")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidPayload(_)));
    }
}
