//! Label-based container autodiscovery.

use crate::probe::classify_container;
use crate::runtime::{ContainerSnapshot, LOCAL_SERVER};
use crate::store::StatusStore;
use crate::target::Target;

/// Prefix shared by every recognized label.
pub const LABEL_PREFIX: &str = "homepage.";

/// Group for discovered targets without a `homepage.group` label.
pub const DEFAULT_GROUP: &str = "Docker";

const NAME_LABEL: &str = "homepage.name";
const GROUP_LABEL: &str = "homepage.group";
const DESCRIPTION_LABEL: &str = "homepage.description";
const HREF_LABEL: &str = "homepage.href";

/// Whether the container carries any `homepage.` label.
#[must_use]
pub fn has_homepage_labels(container: &ContainerSnapshot) -> bool {
    container.labels.keys().any(|key| key.starts_with(LABEL_PREFIX))
}

/// Build a target for a labelled container, or `None` if it has no labels.
///
/// The target follows the container by its own name on the local runtime.
#[must_use]
pub fn synthesize_target(container: &ContainerSnapshot) -> Option<Target> {
    if !has_homepage_labels(container) {
        return None;
    }

    let label = |key: &str| {
        container
            .labels
            .get(key)
            .filter(|value| !value.is_empty())
            .cloned()
    };

    let mut target = Target::new(label(NAME_LABEL).unwrap_or_else(|| container.name.clone()))
        .with_container(container.name.clone(), LOCAL_SERVER)
        .with_group(label(GROUP_LABEL).unwrap_or_else(|| DEFAULT_GROUP.to_string()));
    target.description =
        Some(label(DESCRIPTION_LABEL).unwrap_or_else(|| format!("Image: {}", container.image)));
    target.href = label(HREF_LABEL);

    Some(target)
}

/// Register targets for labelled containers that nothing tracks yet.
///
/// `register` must insert the target only if its name is free and report
/// whether it did. Newly registered targets get their container result right
/// away instead of waiting a full cycle. Returns the new target names.
///
/// Must be called without any store lock held, since `register` takes the
/// write lock.
pub fn discover<F>(store: &StatusStore, containers: &[ContainerSnapshot], mut register: F) -> Vec<String>
where
    F: FnMut(Target) -> bool,
{
    let mut discovered = Vec::new();

    for container in containers {
        let Some(target) = synthesize_target(container) else {
            tracing::trace!(container = %container.name, "No homepage labels");
            continue;
        };
        let name = target.name.clone();
        if !register(target) {
            continue;
        }

        tracing::info!(
            container = %container.name,
            target_name = %name,
            "Discovered container from labels"
        );
        store.record(&name, &classify_container(container));
        discovered.push(name);
    }

    if !discovered.is_empty() {
        tracing::debug!(count = discovered.len(), "Autodiscovery finished");
    }
    discovered
}
