use miette::{IntoDiagnostic, Result, WrapErr};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::merge::{
    default_rules, Feature, ImpliedPermissionRule, ManifestMerger, MergeType, SdkCodenames,
    SystemProperty,
};
use crate::report::ReportFormat;

/// Configuration for a manifest merge
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Merge type, features and extra inputs
    pub merge: MergeConfig,

    /// Placeholder name to value
    pub placeholders: BTreeMap<String, String>,

    /// Values forced onto the merged manifest
    pub overrides: OverridesConfig,

    /// Codename to API level table
    pub sdk: SdkCodenames,

    /// Permissions granted implicitly to libraries built against old SDKs
    pub implied_permissions: Vec<ImpliedPermissionRule>,

    /// Report configuration
    pub report: ReportConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MergeConfig {
    /// application or library
    #[serde(rename = "type")]
    pub merge_type: MergeType,

    pub features: Vec<Feature>,

    /// Library manifests, highest priority first
    pub libraries: Vec<PathBuf>,

    /// Overlay manifests, highest priority first
    pub overlays: Vec<PathBuf>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OverridesConfig {
    pub package: Option<String>,

    #[serde(deserialize_with = "string_or_number")]
    pub version_code: Option<String>,

    #[serde(deserialize_with = "string_or_number")]
    pub version_name: Option<String>,

    #[serde(deserialize_with = "string_or_number")]
    pub min_sdk_version: Option<String>,

    #[serde(deserialize_with = "string_or_number")]
    pub target_sdk_version: Option<String>,

    #[serde(deserialize_with = "string_or_number")]
    pub max_sdk_version: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    /// Output format: terminal, json
    pub format: ReportFormat,

    /// Print the blame log of the merged manifest
    pub blame: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            merge: MergeConfig::default(),
            placeholders: BTreeMap::new(),
            overrides: OverridesConfig::default(),
            sdk: SdkCodenames::default(),
            implied_permissions: default_rules(),
            report: ReportConfig::default(),
        }
    }
}

impl OverridesConfig {
    /// Every configured override, in property order
    pub fn properties(&self) -> Vec<(SystemProperty, String)> {
        SystemProperty::ALL
            .into_iter()
            .filter_map(|property| {
                let value = match property {
                    SystemProperty::Package => &self.package,
                    SystemProperty::VersionCode => &self.version_code,
                    SystemProperty::VersionName => &self.version_name,
                    SystemProperty::MinSdkVersion => &self.min_sdk_version,
                    SystemProperty::TargetSdkVersion => &self.target_sdk_version,
                    SystemProperty::MaxSdkVersion => &self.max_sdk_version,
                };
                value.clone().map(|value| (property, value))
            })
            .collect()
    }
}

impl Config {
    /// Load configuration from a file (YAML or TOML)
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .into_diagnostic()
            .wrap_err_with(|| format!("Failed to read config file: {}", path.display()))?;

        let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("");

        match extension {
            "yml" | "yaml" => serde_yaml::from_str(&contents)
                .into_diagnostic()
                .wrap_err("Failed to parse YAML config"),
            "toml" => toml::from_str(&contents)
                .into_diagnostic()
                .wrap_err("Failed to parse TOML config"),
            _ => {
                // Try YAML first, then TOML
                if let Ok(config) = serde_yaml::from_str(&contents) {
                    Ok(config)
                } else {
                    toml::from_str(&contents)
                        .into_diagnostic()
                        .wrap_err("Failed to parse config file")
                }
            }
        }
    }

    /// Try to load configuration from default locations
    pub fn from_default_locations(project_root: &Path) -> Result<Self> {
        let default_names = [
            ".manifestmerger.yml",
            ".manifestmerger.yaml",
            ".manifestmerger.toml",
            "manifestmerger.yml",
            "manifestmerger.yaml",
            "manifestmerger.toml",
        ];

        for name in &default_names {
            let path = project_root.join(name);
            if path.exists() {
                return Self::from_file(&path);
            }
        }

        // No config file found, use defaults
        Ok(Self::default())
    }

    /// Hand every configured value to `merger`
    pub fn apply(&self, mut merger: ManifestMerger) -> ManifestMerger {
        for overlay in &self.merge.overlays {
            merger = merger.add_overlay(overlay.clone());
        }
        for (property, value) in self.overrides.properties() {
            merger = merger.with_property(property, value);
        }
        merger
            .add_libraries(self.merge.libraries.iter().cloned())
            .with_features(self.merge.features.iter().copied())
            .with_placeholders(self.placeholders.clone())
            .with_codenames(self.sdk.clone())
            .with_implied_permissions(self.implied_permissions.clone())
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Scalar {
    Text(String),
    Integer(i64),
}

/// Version values are often written unquoted
fn string_or_number<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Scalar>::deserialize(deserializer)?.map(|value| match value {
        Scalar::Text(text) => text,
        Scalar::Integer(number) => number.to_string(),
    }))
}
