use super::attribute::{AttributeModel, MergingPolicy, Validator};
use super::name::QualifiedName;

/// What happens when a lower priority element has the same identity as an
/// element already present in the higher priority tree
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeMergeType {
    /// Attributes and children are reconciled
    Merge,
    /// The lower priority element is always imported unless a structurally
    /// identical element already exists
    Always,
}

/// How an element's uniqueness key is computed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyStrategy {
    /// At most one element per parent scope
    None,
    /// Value of the first present android attribute of the list
    FirstOf(&'static [&'static str]),
    /// `+` joined values of the present android attributes of the list
    Composite(&'static [&'static str]),
    /// Sorted `+` joined identities of the element's `action` and
    /// `category` children
    Children,
}

impl KeyStrategy {
    /// Android attribute names taking part in the key
    pub fn key_attributes(&self) -> &'static [&'static str] {
        match self {
            KeyStrategy::FirstOf(names) | KeyStrategy::Composite(names) => names,
            KeyStrategy::None | KeyStrategy::Children => &[],
        }
    }
}

/// Closed classification of manifest elements
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeType {
    Action,
    Activity,
    ActivityAlias,
    Application,
    Category,
    CompatibleScreens,
    Data,
    GrantUriPermission,
    Instrumentation,
    IntentFilter,
    Manifest,
    MetaData,
    PathPermission,
    Permission,
    PermissionGroup,
    PermissionTree,
    Provider,
    Receiver,
    Screen,
    Service,
    SupportsGlTexture,
    SupportsScreens,
    UsesConfiguration,
    UsesFeature,
    UsesLibrary,
    UsesPermission,
    UsesSdk,
    /// Any element the table does not know; passed through untouched
    Custom,
}

const NAME_KEY: KeyStrategy = KeyStrategy::FirstOf(&["name"]);

const PROTECTION_LEVELS: &[&str] = &[
    "normal",
    "dangerous",
    "signature",
    "signatureOrSystem",
    "privileged",
    "system",
    "development",
    "appop",
    "pre23",
    "installer",
    "verifier",
    "preinstalled",
    "setup",
];

const COMPONENT_ATTRIBUTES: &[AttributeModel] = &[AttributeModel::class_name("name")];

const ACTIVITY_ATTRIBUTES: &[AttributeModel] = &[
    AttributeModel::class_name("name"),
    AttributeModel::class_name("parentActivityName"),
];

const ACTIVITY_ALIAS_ATTRIBUTES: &[AttributeModel] = &[
    AttributeModel::class_name("name"),
    AttributeModel::class_name("targetActivity"),
];

const APPLICATION_ATTRIBUTES: &[AttributeModel] = &[
    AttributeModel::class_name("name"),
    AttributeModel::class_name("backupAgent"),
    AttributeModel::class_name("manageSpaceActivity"),
];

const PERMISSION_ATTRIBUTES: &[AttributeModel] = &[AttributeModel::new("protectionLevel")
    .with_default("normal")
    .with_policy(MergingPolicy::KeepHigher)
    .with_validator(Validator::Flags(PROTECTION_LEVELS))];

const USES_FEATURE_ATTRIBUTES: &[AttributeModel] = &[
    AttributeModel::new("required")
        .with_default("true")
        .with_policy(MergingPolicy::BooleanOr)
        .with_validator(Validator::Boolean),
    AttributeModel::new("glEsVersion")
        .with_default("0x00010000")
        .with_policy(MergingPolicy::NumericalSuperiority)
        .with_validator(Validator::Hexadecimal {
            min: 0x0001_0000,
            max: 0x7FFF_FFFF,
        }),
];

const USES_LIBRARY_ATTRIBUTES: &[AttributeModel] = &[AttributeModel::new("required")
    .with_default("true")
    .with_policy(MergingPolicy::BooleanOr)
    .with_validator(Validator::Boolean)];

const USES_SDK_ATTRIBUTES: &[AttributeModel] = &[
    AttributeModel::new("minSdkVersion")
        .with_default("1")
        .with_policy(MergingPolicy::KeepHigher),
    AttributeModel::new("targetSdkVersion").with_policy(MergingPolicy::KeepHigher),
    AttributeModel::new("maxSdkVersion").with_policy(MergingPolicy::KeepHigher),
];

const ALL_TYPES: &[NodeType] = &[
    NodeType::Action,
    NodeType::Activity,
    NodeType::ActivityAlias,
    NodeType::Application,
    NodeType::Category,
    NodeType::CompatibleScreens,
    NodeType::Data,
    NodeType::GrantUriPermission,
    NodeType::Instrumentation,
    NodeType::IntentFilter,
    NodeType::Manifest,
    NodeType::MetaData,
    NodeType::PathPermission,
    NodeType::Permission,
    NodeType::PermissionGroup,
    NodeType::PermissionTree,
    NodeType::Provider,
    NodeType::Receiver,
    NodeType::Screen,
    NodeType::Service,
    NodeType::SupportsGlTexture,
    NodeType::SupportsScreens,
    NodeType::UsesConfiguration,
    NodeType::UsesFeature,
    NodeType::UsesLibrary,
    NodeType::UsesPermission,
    NodeType::UsesSdk,
];

impl NodeType {
    /// Classify an element name; namespaced or unknown tags are `Custom`
    pub fn from_tag(name: &QualifiedName) -> NodeType {
        if name.namespace().is_some() {
            return NodeType::Custom;
        }
        ALL_TYPES
            .iter()
            .copied()
            .find(|node_type| node_type.xml_name() == name.local_name())
            .unwrap_or(NodeType::Custom)
    }

    /// Tag name, `"custom"` for unknown elements
    pub fn xml_name(&self) -> &'static str {
        match self {
            NodeType::Action => "action",
            NodeType::Activity => "activity",
            NodeType::ActivityAlias => "activity-alias",
            NodeType::Application => "application",
            NodeType::Category => "category",
            NodeType::CompatibleScreens => "compatible-screens",
            NodeType::Data => "data",
            NodeType::GrantUriPermission => "grant-uri-permission",
            NodeType::Instrumentation => "instrumentation",
            NodeType::IntentFilter => "intent-filter",
            NodeType::Manifest => "manifest",
            NodeType::MetaData => "meta-data",
            NodeType::PathPermission => "path-permission",
            NodeType::Permission => "permission",
            NodeType::PermissionGroup => "permission-group",
            NodeType::PermissionTree => "permission-tree",
            NodeType::Provider => "provider",
            NodeType::Receiver => "receiver",
            NodeType::Screen => "screen",
            NodeType::Service => "service",
            NodeType::SupportsGlTexture => "supports-gl-texture",
            NodeType::SupportsScreens => "supports-screens",
            NodeType::UsesConfiguration => "uses-configuration",
            NodeType::UsesFeature => "uses-feature",
            NodeType::UsesLibrary => "uses-library",
            NodeType::UsesPermission => "uses-permission",
            NodeType::UsesSdk => "uses-sdk",
            NodeType::Custom => "custom",
        }
    }

    pub fn merge_type(&self) -> NodeMergeType {
        match self {
            NodeType::IntentFilter | NodeType::UsesConfiguration | NodeType::Custom => {
                NodeMergeType::Always
            }
            _ => NodeMergeType::Merge,
        }
    }

    pub fn key_strategy(&self) -> KeyStrategy {
        match self {
            NodeType::Action
            | NodeType::Activity
            | NodeType::ActivityAlias
            | NodeType::Category
            | NodeType::Instrumentation
            | NodeType::MetaData
            | NodeType::Permission
            | NodeType::PermissionGroup
            | NodeType::PermissionTree
            | NodeType::Provider
            | NodeType::Receiver
            | NodeType::Service
            | NodeType::SupportsGlTexture
            | NodeType::UsesLibrary
            | NodeType::UsesPermission => NAME_KEY,
            NodeType::UsesFeature => KeyStrategy::FirstOf(&["name", "glEsVersion"]),
            NodeType::Screen => KeyStrategy::Composite(&["screenSize", "screenDensity"]),
            NodeType::Data => KeyStrategy::Composite(&[
                "scheme",
                "host",
                "port",
                "path",
                "pathPrefix",
                "pathPattern",
                "mimeType",
            ]),
            NodeType::GrantUriPermission | NodeType::PathPermission => {
                KeyStrategy::Composite(&["path", "pathPrefix", "pathPattern"])
            }
            NodeType::IntentFilter => KeyStrategy::Children,
            NodeType::Application
            | NodeType::CompatibleScreens
            | NodeType::Manifest
            | NodeType::SupportsScreens
            | NodeType::UsesConfiguration
            | NodeType::UsesSdk
            | NodeType::Custom => KeyStrategy::None,
        }
    }

    /// Attribute descriptors declared by this node type
    pub fn attribute_models(&self) -> &'static [AttributeModel] {
        match self {
            NodeType::Activity => ACTIVITY_ATTRIBUTES,
            NodeType::ActivityAlias => ACTIVITY_ALIAS_ATTRIBUTES,
            NodeType::Application => APPLICATION_ATTRIBUTES,
            NodeType::Instrumentation
            | NodeType::Provider
            | NodeType::Receiver
            | NodeType::Service => COMPONENT_ATTRIBUTES,
            NodeType::Permission => PERMISSION_ATTRIBUTES,
            NodeType::UsesFeature => USES_FEATURE_ATTRIBUTES,
            NodeType::UsesLibrary => USES_LIBRARY_ATTRIBUTES,
            NodeType::UsesSdk => USES_SDK_ATTRIBUTES,
            _ => &[],
        }
    }

    /// Model of an attribute of this node type, if the table knows it
    pub fn attribute_model(&self, name: &QualifiedName) -> Option<&'static AttributeModel> {
        if !name.is_android() {
            return None;
        }
        self.attribute_models()
            .iter()
            .find(|model| model.name == name.local_name())
    }
}

impl std::fmt::Display for NodeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.xml_name())
    }
}
