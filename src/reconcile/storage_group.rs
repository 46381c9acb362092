//! Storage group lookup for the masking document

use crate::domain::ports::{ArrayManagementClient, Volume, MASKING_GROUP_CLASS};
use crate::error::Result;
use tracing::{debug, warn};

/// Masking group name of the first source volume, if it has one
///
/// Missing volumes, paths or groups yield `None`; only a failing provider
/// call is an error.
pub async fn storage_group_of(
    client: &dyn ArrayManagementClient,
    sources: &[Volume],
) -> Result<Option<String>> {
    let Some(first) = sources.first() else {
        warn!("No source devices left to look up a storage group");
        return Ok(None);
    };
    let Some(path) = first.path.as_ref() else {
        warn!("Source device {} has no instance path", first.device_id);
        return Ok(None);
    };

    let groups = client.associators(path, MASKING_GROUP_CLASS).await?;
    let name = groups
        .iter()
        .find_map(|group| group.get_str("ElementName"))
        .map(str::to_string);

    match &name {
        Some(group) => debug!("Source device {} is in storage group {}", first.device_id, group),
        None => warn!("Source device {} is not in any storage group", first.device_id),
    }
    Ok(name)
}
