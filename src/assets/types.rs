//! Cloud Asset Inventory data model.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::error::AssetError;

/// IAM members that make a resource public.
pub const PUBLIC_MEMBERS: &[&str] = &["allUsers", "allAuthenticatedUsers"];

/// A single asset as returned by the Cloud Asset API.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Asset {
    /// Full resource name, e.g. `//storage.googleapis.com/phi-exports`.
    pub name: String,
    /// Asset type, e.g. `storage.googleapis.com/Bucket`.
    pub asset_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource: Option<AssetResource>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iam_policy: Option<IamPolicy>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AssetResource {
    #[serde(default)]
    pub data: Value,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IamPolicy {
    #[serde(default)]
    pub bindings: Vec<Binding>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Binding {
    pub role: String,
    #[serde(default)]
    pub members: Vec<String>,
}

static NULL: Value = Value::Null;

impl Asset {
    /// Resource payload, or `null` when the asset carries none.
    #[must_use]
    pub fn data(&self) -> &Value {
        self.resource.as_ref().map_or(&NULL, |r| &r.data)
    }

    /// Last path segment of the full resource name.
    #[must_use]
    pub fn short_name(&self) -> &str {
        self.name.rsplit('/').next().unwrap_or(&self.name)
    }

    /// Human name: `data.name` if it is a bare name, else the short name.
    #[must_use]
    pub fn display_name(&self) -> &str {
        match self.data().get("name").and_then(Value::as_str) {
            Some(name) if !name.contains('/') => name,
            _ => self.short_name(),
        }
    }

    /// IAM bindings attached to the asset.
    #[must_use]
    pub fn bindings(&self) -> &[Binding] {
        match &self.iam_policy {
            Some(policy) => &policy.bindings,
            None => &[],
        }
    }

    /// Whether any binding grants a role to `allUsers` or `allAuthenticatedUsers`.
    #[must_use]
    pub fn has_public_member(&self) -> bool {
        self.bindings()
            .iter()
            .flat_map(|b| b.members.iter())
            .any(|m| PUBLIC_MEMBERS.contains(&m.as_str()))
    }
}

/// All assets of one project.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AssetInventory {
    pub project_id: String,
    pub assets: Vec<Asset>,
}

impl AssetInventory {
    #[must_use]
    pub fn new(project_id: impl Into<String>, assets: Vec<Asset>) -> Self {
        Self {
            project_id: project_id.into(),
            assets,
        }
    }

    /// Parse an inventory from a ListAssets response, a JSON array, or
    /// newline-delimited JSON.
    ///
    /// # Errors
    ///
    /// Returns `AssetError::Json` with the offending line, or
    /// `AssetError::Format` for a JSON document of the wrong shape.
    pub fn parse(project_id: &str, text: &str) -> Result<Self, AssetError> {
        let assets = match serde_json::from_str::<Value>(text) {
            Ok(document) => assets_from_document(document)?,
            Err(_) => parse_lines(text)?,
        };
        Ok(Self::new(project_id, assets))
    }

    /// Read and parse an inventory file.
    ///
    /// # Errors
    ///
    /// Returns `AssetError::Io` if the file cannot be read, or a parse error.
    pub fn load(project_id: &str, path: &Path) -> Result<Self, AssetError> {
        let text = std::fs::read_to_string(path).map_err(|source| AssetError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(project_id, &text)
    }

    /// Assets whose type matches exactly.
    pub fn of_type<'a>(&'a self, asset_type: &'a str) -> impl Iterator<Item = &'a Asset> + 'a {
        self.assets.iter().filter(move |a| a.asset_type == asset_type)
    }

    /// Attach IAM policies fetched separately, matching assets by name.
    ///
    /// Policies for names not yet in the inventory are added as assets.
    pub fn merge_policies(&mut self, policies: Vec<Asset>) {
        let index: HashMap<String, usize> = self
            .assets
            .iter()
            .enumerate()
            .map(|(i, a)| (a.name.clone(), i))
            .collect();

        for policy in policies {
            match index.get(&policy.name) {
                Some(&i) => self.assets[i].iam_policy = policy.iam_policy,
                None => self.assets.push(policy),
            }
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.assets.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }
}

fn assets_from_document(document: Value) -> Result<Vec<Asset>, AssetError> {
    let to_assets = |value: Value| {
        serde_json::from_value::<Vec<Asset>>(value).map_err(|source| AssetError::Json { line: 1, source })
    };
    match document {
        Value::Array(_) => to_assets(document),
        Value::Object(mut map) => {
            if let Some(assets) = map.remove("assets") {
                return to_assets(assets);
            }
            if map.contains_key("name") && map.contains_key("assetType") {
                let asset = serde_json::from_value(Value::Object(map))
                    .map_err(|source| AssetError::Json { line: 1, source })?;
                return Ok(vec![asset]);
            }
            // An empty ListAssets page omits the field.
            if map.is_empty() || map.contains_key("readTime") {
                return Ok(Vec::new());
            }
            Err(AssetError::Format(
                "expected an `assets` array or a single asset".to_string(),
            ))
        }
        other => Err(AssetError::Format(format!("unexpected top-level JSON {other}"))),
    }
}

fn parse_lines(text: &str) -> Result<Vec<Asset>, AssetError> {
    text.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| {
            serde_json::from_str(line).map_err(|source| AssetError::Json { line: i + 1, source })
        })
        .collect()
}
