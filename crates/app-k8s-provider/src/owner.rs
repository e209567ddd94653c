use anyhow::{anyhow, bail, Result};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::{Resource, ResourceExt};

/// Marks `owner` as the controller of the object described by `child`.
///
/// Stamping the same owner twice leaves the metadata unchanged. Fails if
/// `owner` has not been persisted yet (no uid) or if `child` is already
/// controlled by another object.
pub fn set_owner<P>(child: &mut ObjectMeta, owner: &P) -> Result<()>
where
    P: Resource<DynamicType = ()>,
{
    let mut reference = owner.controller_owner_ref(&()).ok_or_else(|| {
        anyhow!(
            "failed to get owner reference of {kind} {name}: missing uid",
            kind = P::kind(&()),
            name = owner.name_any(),
        )
    })?;
    // foreground deletion of the owner waits for the child
    reference.block_owner_deletion = Some(true);

    let references = child.owner_references.get_or_insert_with(Vec::new);
    if let Some(controller) = references
        .iter()
        .find(|existing| existing.controller == Some(true) && existing.uid != reference.uid)
    {
        bail!(
            "{name} is already controlled by {kind} {owner}",
            name = child.name.as_deref().unwrap_or_default(),
            kind = controller.kind,
            owner = controller.name,
        )
    }

    match references
        .iter_mut()
        .find(|existing| existing.uid == reference.uid)
    {
        Some(existing) => *existing = reference,
        None => references.push(reference),
    }
    Ok(())
}
