//! The artifact handoff between build jobs and packaging jobs
//!
//! Build jobs publish exactly one handle per target; packaging jobs fetch by
//! artifact tag. The store never blocks or waits: the step graph guarantees a
//! fetch only runs after the corresponding publish finished (or after we know
//! the build failed, in which case the fetch comes up empty and the target is
//! skipped). The mutex guards the map itself, not the ordering.

use std::sync::Mutex;

use camino::Utf8PathBuf;

use crate::errors::*;
use crate::tasks::FastMap;

/// An opaque reference to one target's finished (stripped) binary
#[derive(Debug, Clone)]
pub struct ArtifactHandle {
    /// The artifact-store key this was published under
    pub artifact_tag: String,
    /// Where the binary lives inside the run's dist dir
    pub path: Utf8PathBuf,
}

/// Keyed handoff surface between the build stage and the packaging stage
#[derive(Debug, Default)]
pub struct ArtifactStore {
    entries: Mutex<FastMap<String, ArtifactHandle>>,
}

impl ArtifactStore {
    /// Publish a build's output, transferring ownership of the handle to the store
    ///
    /// Each artifact tag has exactly one writer (the build job for that
    /// target), so a second publish under the same tag is a hard error.
    pub fn publish(&self, handle: ArtifactHandle) -> ShipResult<()> {
        let mut entries = self.entries.lock().expect("artifact store poisoned");
        if entries.contains_key(&handle.artifact_tag) {
            return Err(ShipError::DoublePublish {
                artifact_tag: handle.artifact_tag,
            });
        }
        entries.insert(handle.artifact_tag.clone(), handle);
        Ok(())
    }

    /// Fetch the artifact for a tag, if its build succeeded
    ///
    /// `None` means the build failed or was never scheduled; packaging treats
    /// that as "skip this target".
    pub fn fetch(&self, artifact_tag: &str) -> Option<ArtifactHandle> {
        let entries = self.entries.lock().expect("artifact store poisoned");
        entries.get(artifact_tag).cloned()
    }

    /// How many artifacts have been published
    pub fn len(&self) -> usize {
        let entries = self.entries.lock().expect("artifact store poisoned");
        entries.len()
    }

    /// Whether nothing has been published yet
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handle(tag: &str) -> ArtifactHandle {
        ArtifactHandle {
            artifact_tag: tag.to_owned(),
            path: Utf8PathBuf::from(format!("/tmp/{tag}/bin")),
        }
    }

    #[test]
    fn publish_then_fetch() {
        let store = ArtifactStore::default();
        store.publish(handle("x86_64")).unwrap();
        let got = store.fetch("x86_64").unwrap();
        assert_eq!(got.artifact_tag, "x86_64");
    }

    #[test]
    fn fetch_missing_is_none() {
        let store = ArtifactStore::default();
        assert!(store.fetch("armv6").is_none());
    }

    #[test]
    fn double_publish_is_an_error() {
        let store = ArtifactStore::default();
        store.publish(handle("x86_64")).unwrap();
        assert!(matches!(
            store.publish(handle("x86_64")),
            Err(ShipError::DoublePublish { .. })
        ));
        assert_eq!(store.len(), 1);
    }
}
