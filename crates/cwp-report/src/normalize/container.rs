//! Container model normalization

use crate::records::{ContainerModelRecord, RawContainerProfile};

pub fn normalize_container(raw: &RawContainerProfile) -> ContainerModelRecord {
    ContainerModelRecord {
        image: raw.image.clone(),
        cluster: raw.cluster.clone(),
        namespace: raw.namespace.clone(),
        os: raw.os.clone(),
        entrypoint: raw.entrypoint.clone(),
        state: raw.state.clone(),
        collections: raw.collections.join(", "),
    }
}
