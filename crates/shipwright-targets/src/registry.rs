//! Target discovery under a root directory.

use crate::definition::TargetDefinition;
use crate::script::ScriptTarget;
use async_trait::async_trait;
use shipwright_core::ports::{SourceControl, Target, TargetRegistry};
use shipwright_core::{DeploymentRequest, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

/// Treats every `<root>/<name>/deploy.yaml` as the target `name`.
///
/// Definitions are read from disk on every call, so edits pulled into a
/// working copy take effect on the next run without a restart.
pub struct DirectoryRegistry {
    root: PathBuf,
    source_control: Arc<dyn SourceControl>,
}

impl DirectoryRegistry {
    pub fn new(root: impl Into<PathBuf>, source_control: Arc<dyn SourceControl>) -> Self {
        Self {
            root: root.into(),
            source_control,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    async fn load(&self, name: &str, path: &Path) -> Result<Option<ScriptTarget>> {
        let definition = TargetDefinition::load(path).await?;
        Ok(definition.map(|definition| {
            ScriptTarget::new(name, path, definition, Arc::clone(&self.source_control))
        }))
    }
}

#[async_trait]
impl TargetRegistry for DirectoryRegistry {
    fn locate(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    async fn discover(&self) -> Result<Vec<Arc<dyn Target>>> {
        let mut entries = tokio::fs::read_dir(&self.root).await?;
        let mut targets: Vec<Arc<dyn Target>> = Vec::new();

        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_dir() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().to_string();
            if name.starts_with('.') {
                continue;
            }

            match self.load(&name, &entry.path()).await {
                Ok(Some(target)) => targets.push(Arc::new(target)),
                Ok(None) => debug!(name = %name, "Directory has no definition"),
                Err(e) => warn!(name = %name, error = %e, "Skipping target with invalid definition"),
            }
        }

        targets.sort_by(|a, b| a.name().cmp(b.name()));
        Ok(targets)
    }

    async fn resolve(&self, request: &DeploymentRequest) -> Result<Option<Arc<dyn Target>>> {
        let target = self.load(&request.name, &request.path).await?;
        Ok(target.map(|t| Arc::new(t) as Arc<dyn Target>))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::git::GitSource;
    use shipwright_core::Trigger;

    fn write_target(root: &Path, name: &str, yaml: &str) {
        let dir = root.join(name);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join(crate::DEFINITION_FILE), yaml).unwrap();
    }

    fn registry(root: &Path) -> DirectoryRegistry {
        DirectoryRegistry::new(root, Arc::new(GitSource::new()))
    }

    #[tokio::test]
    async fn test_discover_only_defined_targets() {
        let root = tempfile::tempdir().unwrap();
        write_target(root.path(), "web-main", "run: ./deploy.sh\n");
        write_target(root.path(), "api-main", "run: make\n");
        write_target(root.path(), "broken-main", "run: [unclosed\n");
        std::fs::create_dir_all(root.path().join("scratch")).unwrap();
        std::fs::write(root.path().join("README"), "not a target").unwrap();

        let targets = registry(root.path()).discover().await.unwrap();
        let names: Vec<&str> = targets.iter().map(|t| t.name()).collect();
        assert_eq!(names, vec!["api-main", "web-main"]);
    }

    #[tokio::test]
    async fn test_resolve_reads_definition_fresh() {
        let root = tempfile::tempdir().unwrap();
        let registry = registry(root.path());
        let request = DeploymentRequest::new(
            "app",
            "main",
            registry.locate("app-main"),
            Trigger::Push,
        );

        assert!(registry.resolve(&request).await.unwrap().is_none());

        write_target(root.path(), "app-main", "run: echo one\ntimeout_seconds: 5\n");
        let first = registry.resolve(&request).await.unwrap().unwrap();
        assert_eq!(first.run_timeout(), Some(std::time::Duration::from_secs(5)));

        write_target(root.path(), "app-main", "run: echo two\n");
        let second = registry.resolve(&request).await.unwrap().unwrap();
        assert_eq!(second.run_timeout(), None);
    }

    #[test]
    fn test_locate_joins_root() {
        let registry = registry(Path::new("/srv/targets"));
        assert_eq!(registry.locate("app-main"), PathBuf::from("/srv/targets/app-main"));
    }
}
