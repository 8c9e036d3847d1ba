//! Controller ownership references.
//!
//! Anything exposing its type identity (apiVersion/kind) and object identity
//! (metadata) can become the controlling owner of a generated resource.

use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference};

/// Compile-time apiVersion and kind of a resource type.
pub trait TypeIdentity {
    const API_VERSION: &'static str;
    const KIND: &'static str;
}

/// Access to the metadata identifying one object.
pub trait ObjectIdentity {
    fn object_meta(&self) -> &ObjectMeta;
}

/// Owner reference marking `owner` as the controller of a child resource.
///
/// The child is garbage collected with its owner and blocks the owner's
/// foreground deletion until it is gone.
pub fn controller_ref<T>(owner: &T) -> OwnerReference
where
    T: TypeIdentity + ObjectIdentity,
{
    let meta = owner.object_meta();
    OwnerReference {
        api_version: T::API_VERSION.to_string(),
        kind: T::KIND.to_string(),
        name: meta.name.clone().unwrap_or_default(),
        uid: meta.uid.clone().unwrap_or_default(),
        controller: Some(true),
        block_owner_deletion: Some(true),
    }
}
