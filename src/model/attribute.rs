/// How two values of the same attribute are reconciled when both the
/// higher and the lower priority element declare it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergingPolicy {
    /// Values must be identical
    Strict,
    /// Boolean values are OR-ed together
    BooleanOr,
    /// The numerically greater value wins
    NumericalSuperiority,
    /// The higher priority value always wins
    KeepHigher,
}

impl MergingPolicy {
    /// Combine a higher and a lower priority value.
    ///
    /// Returns `None` when the values are irreconcilable.
    pub fn merge(&self, higher: &str, lower: &str) -> Option<String> {
        match self {
            MergingPolicy::Strict => (higher == lower).then(|| higher.to_string()),
            MergingPolicy::KeepHigher => Some(higher.to_string()),
            MergingPolicy::BooleanOr => match (parse_bool(higher), parse_bool(lower)) {
                (Some(h), Some(l)) => {
                    if h || !l {
                        Some(higher.to_string())
                    } else {
                        Some(lower.to_string())
                    }
                }
                _ => (higher == lower).then(|| higher.to_string()),
            },
            MergingPolicy::NumericalSuperiority => match (parse_number(higher), parse_number(lower)) {
                (Some(h), Some(l)) => {
                    if h >= l {
                        Some(higher.to_string())
                    } else {
                        Some(lower.to_string())
                    }
                }
                _ => (higher == lower).then(|| higher.to_string()),
            },
        }
    }

    /// Whether an implicit default on the higher priority side takes part
    /// in the reconciliation when only the lower side declares the value
    pub fn merges_with_default(&self) -> bool {
        matches!(self, MergingPolicy::BooleanOr | MergingPolicy::NumericalSuperiority)
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            MergingPolicy::Strict => "strict",
            MergingPolicy::BooleanOr => "boolean-or",
            MergingPolicy::NumericalSuperiority => "numerical-superiority",
            MergingPolicy::KeepHigher => "keep-higher",
        }
    }
}

/// Value validation attached to an attribute model
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Validator {
    Boolean,
    /// 32 bit hexadecimal value within `[min, max]`
    Hexadecimal { min: u32, max: u32 },
    /// `|` separated flags, each one taken from the list
    Flags(&'static [&'static str]),
}

impl Validator {
    /// Check `value`; `at` describes the attribute location for the message
    pub fn validate(&self, local_name: &str, at: &str, value: &str) -> Result<(), String> {
        // resource references and placeholders are resolved later
        if value.starts_with('@') || value.starts_with('?') || value.contains("${") {
            return Ok(());
        }
        match self {
            Validator::Boolean => {
                if parse_bool(value).is_some() {
                    Ok(())
                } else {
                    Err(format!(
                        "Attribute {} at {} has an illegal value={}, expected 'true' or 'false'",
                        local_name, at, value
                    ))
                }
            }
            Validator::Hexadecimal { min, max } => {
                let parsed = value
                    .strip_prefix("0x")
                    .or_else(|| value.strip_prefix("0X"))
                    .and_then(|digits| u64::from_str_radix(digits, 16).ok())
                    .filter(|v| *v <= u64::from(u32::MAX));
                match parsed {
                    None => Err(format!(
                        "Attribute {} at {} is not a valid hexadecimal 32 bit value, found {}",
                        local_name, at, value
                    )),
                    Some(v) if v < u64::from(*min) || v > u64::from(*max) => Err(format!(
                        "Attribute {} at {} is not a valid hexadecimal value, minimum is 0x{:08X}, maximum is 0x{:08X}, found {}",
                        local_name, at, min, max, value
                    )),
                    Some(_) => Ok(()),
                }
            }
            Validator::Flags(allowed) => {
                let invalid: Vec<&str> = value
                    .split('|')
                    .map(str::trim)
                    .filter(|flag| !allowed.contains(flag))
                    .collect();
                if invalid.is_empty() {
                    Ok(())
                } else {
                    Err(format!(
                        "Invalid value for attribute {} at {}, value={}, acceptable values are ({})",
                        local_name,
                        at,
                        value,
                        allowed.join(",")
                    ))
                }
            }
        }
    }
}

/// Descriptor of an attribute known by a node type, always in the
/// android namespace
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttributeModel {
    pub name: &'static str,
    pub default_value: Option<&'static str>,
    /// Relative class names are expanded against the document package
    pub package_dependent: bool,
    pub validator: Option<Validator>,
    pub policy: MergingPolicy,
}

impl AttributeModel {
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            default_value: None,
            package_dependent: false,
            validator: None,
            policy: MergingPolicy::Strict,
        }
    }

    pub const fn class_name(name: &'static str) -> Self {
        Self {
            package_dependent: true,
            ..Self::new(name)
        }
    }

    pub const fn with_default(self, value: &'static str) -> Self {
        Self {
            default_value: Some(value),
            ..self
        }
    }

    pub const fn with_policy(self, policy: MergingPolicy) -> Self {
        Self { policy, ..self }
    }

    pub const fn with_validator(self, validator: Validator) -> Self {
        Self {
            validator: Some(validator),
            ..self
        }
    }
}

/// Expand a relative class name against `package`.
///
/// `.Foo` becomes `package.Foo`, `Foo` becomes `package.Foo`, anything
/// already containing a dot is left untouched.
pub fn expand_class_name(value: &str, package: &str) -> String {
    if value.is_empty() || package.is_empty() || value.contains("${") {
        value.to_string()
    } else if value.starts_with('.') {
        format!("{}{}", package, value)
    } else if !value.contains('.') {
        format!("{}.{}", package, value)
    } else {
        value.to_string()
    }
}

/// Inverse of [`expand_class_name`] for names inside `package`
pub fn extract_class_name(value: &str, package: &str) -> String {
    match value.strip_prefix(package) {
        Some(rest) if !package.is_empty() && rest.starts_with('.') && rest.len() > 1 => {
            rest.to_string()
        }
        _ => value.to_string(),
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" => Some(true),
        "false" => Some(false),
        _ => None,
    }
}

fn parse_number(value: &str) -> Option<i64> {
    let value = value.trim();
    match value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")) {
        Some(hex) => i64::from_str_radix(hex, 16).ok(),
        None => value.parse().ok(),
    }
}
