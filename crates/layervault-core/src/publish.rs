//! Map-server message contract
//!
//! Request bodies and endpoint URLs used to publish a database table as a
//! map-server layer, upload resources and invalidate tile caches. Sending
//! the requests is left to the host application.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

/// Workspace layers are published under by default
pub const DEFAULT_WORKSPACE: &str = "geonode";

/// Relative resource path for uploaded legend icons
pub const ICON_REL_PATH: &str = "workspaces/geonode/styles";

/// Body of a feature-type creation request
///
/// ```json
/// {"featureType": {"name": "roads_layer", "nativeName": "roads"}}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureTypeRequest {
    #[serde(rename = "featureType")]
    pub feature_type: FeatureType,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureType {
    pub name: String,
    #[serde(rename = "nativeName")]
    pub native_name: String,
}

impl FeatureTypeRequest {
    /// Publish database table `table_name` as layer `layer_name`
    pub fn new(table_name: impl Into<String>, layer_name: impl Into<String>) -> Self {
        Self {
            feature_type: FeatureType {
                name: layer_name.into(),
                native_name: table_name.into(),
            },
        }
    }
}

/// Endpoint builder for one map-server workspace and datastore
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapServerEndpoints {
    pub base_url: String,
    pub workspace: String,
    pub datastore: String,
}

impl MapServerEndpoints {
    pub fn new(
        base_url: impl Into<String>,
        workspace: impl Into<String>,
        datastore: impl Into<String>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            workspace: workspace.into(),
            datastore: datastore.into(),
        }
    }

    /// Where feature-type creation requests are posted
    pub fn feature_types_url(&self) -> String {
        urljoin(&[
            &self.base_url,
            "rest/workspaces",
            &self.workspace,
            "datastores",
            &self.datastore,
            "featuretypes",
        ])
    }

    pub fn tile_cache_url(&self) -> String {
        urljoin(&[&self.base_url, "gwc/rest"])
    }

    /// Tile-cache entry for a layer, used to invalidate it
    pub fn tile_cache_layer_url(&self, layer_name: &str) -> String {
        urljoin(&[&self.tile_cache_url(), "layers", layer_name])
    }

    /// Upload target for a resource file
    pub fn resource_url(&self, rel_path: &str, file_name: &str) -> String {
        urljoin(&[&self.base_url, "rest/resource", rel_path, file_name])
    }

    /// Qualified `workspace:layer` name
    pub fn qualified_name(&self, layer_name: &str) -> String {
        qualified_name(&self.workspace, layer_name)
    }
}

/// `workspace:layer`, the portal's alternate name for a layer
pub fn qualified_name(workspace: &str, layer_name: &str) -> String {
    format!("{}:{}", workspace, layer_name)
}

/// Join URL segments with exactly one `/` between them
pub fn urljoin(parts: &[&str]) -> String {
    let mut url = String::new();
    for (i, part) in parts.iter().enumerate() {
        let part = if i == 0 {
            part.trim_end_matches('/')
        } else {
            part.trim_matches('/')
        };
        if part.is_empty() {
            continue;
        }
        if !url.is_empty() {
            url.push('/');
        }
        url.push_str(part);
    }
    url
}

/// Whether a creation request succeeded (HTTP 201)
pub fn is_created(status: u16) -> bool {
    status == 201
}

/// Lower-case a name and collapse every run of other characters into `_`
///
/// Used for style names and for attribute names referenced in style bodies.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_sep = false;
    for c in name.chars() {
        if c.is_alphanumeric() {
            if pending_sep && !slug.is_empty() {
                slug.push('_');
            }
            pending_sep = false;
            slug.extend(c.to_lowercase());
        } else {
            pending_sep = true;
        }
    }
    slug
}

/// A style name not yet taken on the map server
///
/// The slugified name is used as-is when free; otherwise a
/// `_%Y%m%d_%H%M%S` suffix from `now` is appended.
pub fn unique_style_name<F>(name: &str, exists: F, now: DateTime<Local>) -> String
where
    F: Fn(&str) -> bool,
{
    let slug = slugify(name);
    if !exists(&slug) {
        return slug;
    }
    format!("{}_{}", slug, now.format("%Y%m%d_%H%M%S"))
}
