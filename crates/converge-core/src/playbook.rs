//! Playbook model and YAML loading

use std::collections::BTreeMap;
use std::io::Read;

use serde::{Deserialize, Serialize};
use serde_yaml::Value;

use crate::error::{PlaybookError, ValidationError};

/// One desired-state unit handled by a single module kind
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceDeclaration {
    /// Module kind that handles this resource (e.g. `package`)
    pub kind: String,
    /// Optional unique name; defaults to the positional index
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Module parameters, keyed by normalized (lower-case) name
    #[serde(default)]
    pub params: BTreeMap<String, String>,
    /// Ids that must converge before this resource runs
    #[serde(default)]
    pub requires: Vec<String>,
}

impl ResourceDeclaration {
    /// Create a declaration of the given kind with no params or dependencies
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            id: None,
            params: BTreeMap::new(),
            requires: Vec::new(),
        }
    }

    /// Set the id
    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Add a parameter
    #[must_use]
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    /// Add a dependency, ignoring duplicates
    #[must_use]
    pub fn requiring(mut self, id: impl Into<String>) -> Self {
        let id = id.into();
        if !self.requires.contains(&id) {
            self.requires.push(id);
        }
        self
    }

    /// The id used for graph lookups: the declared id or the 0-based position
    #[must_use]
    pub fn resolved_id(&self, index: usize) -> String {
        self.id.clone().unwrap_or_else(|| index.to_string())
    }

    /// Check that every field can be carried by the record transport
    ///
    /// # Errors
    /// Returns the first field that fails validation
    pub fn validate(&self) -> Result<(), ValidationError> {
        check_identifier("kind", &self.kind)?;
        if let Some(id) = &self.id {
            check_identifier("id", id)?;
        }
        for (i, req) in self.requires.iter().enumerate() {
            check_identifier("requires", req)?;
            if self.requires[..i].contains(req) {
                return Err(ValidationError::DuplicateRequirement(req.clone()));
            }
        }
        for key in self.params.keys() {
            if !is_param_key(key) {
                return Err(ValidationError::InvalidParamKey(key.clone()));
            }
        }
        Ok(())
    }
}

/// Whether `value` may be used as a kind or resource id
#[must_use]
pub fn is_identifier(value: &str) -> bool {
    !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.' | ':'))
}

/// Whether `key` is a parameter name in normalized form
#[must_use]
pub fn is_param_key(key: &str) -> bool {
    !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}

pub(crate) fn check_identifier(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if is_identifier(value) {
        Ok(())
    } else {
        Err(ValidationError::InvalidIdentifier {
            field,
            value: value.to_string(),
        })
    }
}

/// The full ordered set of declared resources
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Playbook {
    /// Resources in declaration order
    pub resources: Vec<ResourceDeclaration>,
}

#[derive(Deserialize)]
struct RawPlaybook {
    resources: Option<Vec<RawResource>>,
}

#[derive(Deserialize)]
struct RawResource {
    kind: Value,
    #[serde(default)]
    id: Option<Value>,
    #[serde(default)]
    params: Option<BTreeMap<String, Value>>,
    #[serde(default)]
    requires: Option<Vec<Value>>,
}

impl Playbook {
    /// Parse a playbook from YAML text
    ///
    /// # Errors
    /// Returns `PlaybookError` if the YAML is invalid, `resources` is missing,
    /// or a declaration fails validation
    pub fn from_yaml(input: &str) -> Result<Self, PlaybookError> {
        let raw: RawPlaybook =
            serde_yaml::from_str(input).map_err(|e| PlaybookError::Yaml(e.to_string()))?;
        let raw_resources = raw.resources.ok_or(PlaybookError::MissingResources)?;

        let resources = raw_resources
            .into_iter()
            .enumerate()
            .map(|(index, raw)| convert_resource(index, raw))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { resources })
    }

    /// Parse a playbook from a reader (file or stdin)
    ///
    /// # Errors
    /// Returns `PlaybookError::Io` if reading fails, otherwise as [`Playbook::from_yaml`]
    pub fn from_reader(mut reader: impl Read) -> Result<Self, PlaybookError> {
        let mut input = String::new();
        reader
            .read_to_string(&mut input)
            .map_err(|e| PlaybookError::Io(e.to_string()))?;
        Self::from_yaml(&input)
    }

    /// Number of declared resources
    #[must_use]
    pub fn len(&self) -> usize {
        self.resources.len()
    }

    /// Whether the playbook declares nothing
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }
}

fn convert_resource(index: usize, raw: RawResource) -> Result<ResourceDeclaration, PlaybookError> {
    let scalar = |field: &str, value: &Value| {
        scalar_to_string(value).ok_or_else(|| PlaybookError::NonScalar {
            index,
            field: field.to_string(),
        })
    };

    let mut decl = ResourceDeclaration::new(scalar("kind", &raw.kind)?);
    if let Some(id) = &raw.id
        && !id.is_null()
    {
        decl.id = Some(scalar("id", id)?);
    }

    for (key, value) in raw.params.unwrap_or_default() {
        let value = scalar(&key, &value)?;
        let key = key.to_ascii_lowercase();
        if decl.params.contains_key(&key) {
            return Err(PlaybookError::Invalid {
                index,
                source: ValidationError::DuplicateParamKey(key),
            });
        }
        decl.params.insert(key, value);
    }

    for req in raw.requires.unwrap_or_default() {
        decl = decl.requiring(scalar("requires", &req)?);
    }

    decl.validate()
        .map_err(|source| PlaybookError::Invalid { index, source })?;

    Ok(decl)
}

/// Stringify a YAML scalar the way module parameters are transported
fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::Null => Some(String::new()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) => Some(s.clone()),
        Value::Tagged(tagged) => scalar_to_string(&tagged.value),
        Value::Sequence(_) | Value::Mapping(_) => None,
    }
}
