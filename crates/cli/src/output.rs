use resgraph_client::{Asset, Container};
use resgraph_protocol::Metadata;
use serde::Serialize;
use std::path::Path;

#[derive(Serialize)]
pub(crate) struct ContainerView<'a> {
    id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<&'a str>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    kind: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<&'a str>,
    tags: &'a [String],
    metadata: &'a Metadata,
    #[serde(skip_serializing_if = "Option::is_none")]
    assets: Option<Vec<AssetView<'a>>>,
}

impl<'a> ContainerView<'a> {
    pub(crate) fn new(container: &'a Container) -> Self {
        Self {
            id: container.id(),
            name: container.name(),
            kind: container.kind(),
            description: container.description(),
            tags: container.tags(),
            metadata: container.metadata(),
            assets: None,
        }
    }

    pub(crate) fn with_assets(container: &'a Container, assets: &'a [Asset]) -> Self {
        Self {
            assets: Some(assets.iter().map(AssetView::new).collect()),
            ..Self::new(container)
        }
    }
}

#[derive(Serialize)]
pub(crate) struct AssetView<'a> {
    id: &'a str,
    file: &'a Path,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<&'a str>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    kind: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<&'a str>,
    tags: &'a [String],
    metadata: &'a Metadata,
}

impl<'a> AssetView<'a> {
    pub(crate) fn new(asset: &'a Asset) -> Self {
        Self {
            id: asset.id(),
            file: asset.file(),
            name: asset.name(),
            kind: asset.kind(),
            description: asset.description(),
            tags: asset.tags(),
            metadata: asset.metadata(),
        }
    }
}
