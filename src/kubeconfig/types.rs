// src/kubeconfig/types.rs
use crate::error::{KubiError, Result};
use serde::{Deserialize, Deserializer, Serialize};
use serde_yaml::{Mapping, Value};
use std::collections::BTreeMap;

/// A kubeconfig document as kubectl reads it.
///
/// Only the fields kubi touches are typed; everything else is carried in the
/// `extra` maps so a rewrite never drops another tool's settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KubeConfig {
    #[serde(rename = "apiVersion", default = "default_api_version")]
    pub api_version: String,
    #[serde(default = "default_kind")]
    pub kind: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub clusters: Vec<NamedCluster>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub contexts: Vec<NamedContext>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub users: Vec<NamedAuthInfo>,
    #[serde(rename = "current-context", default, deserialize_with = "null_as_default")]
    pub current_context: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub preferences: Mapping,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamedCluster {
    pub name: String,
    pub cluster: Cluster,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Cluster {
    #[serde(default)]
    pub server: String,
    #[serde(
        rename = "certificate-authority-data",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub certificate_authority_data: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamedContext {
    pub name: String,
    pub context: Context,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Context {
    #[serde(default)]
    pub cluster: String,
    #[serde(default)]
    pub user: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamedAuthInfo {
    pub name: String,
    pub user: AuthInfo,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuthInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// Entries keyed by name inside a kubeconfig list.
pub trait Named {
    fn name(&self) -> &str;
}

impl Named for NamedCluster {
    fn name(&self) -> &str {
        &self.name
    }
}

impl Named for NamedContext {
    fn name(&self) -> &str {
        &self.name
    }
}

impl Named for NamedAuthInfo {
    fn name(&self) -> &str {
        &self.name
    }
}

fn default_api_version() -> String {
    "v1".to_string()
}

fn default_kind() -> String {
    "Config".to_string()
}

fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

impl Default for KubeConfig {
    fn default() -> Self {
        Self {
            api_version: default_api_version(),
            kind: default_kind(),
            clusters: Vec::new(),
            contexts: Vec::new(),
            users: Vec::new(),
            current_context: String::new(),
            preferences: Mapping::new(),
            extra: BTreeMap::new(),
        }
    }
}

impl KubeConfig {
    /// Parses a kubeconfig document; `origin` names it in error messages.
    /// An empty document is an empty config.
    pub fn from_yaml(text: &str, origin: &str) -> Result<Self> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(text).map_err(|source| KubiError::MalformedConfig {
            origin: origin.to_string(),
            source,
        })
    }

    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).map_err(|source| KubiError::MalformedConfig {
            origin: "generated kubeconfig".to_string(),
            source,
        })
    }

    pub fn cluster(&self, name: &str) -> Option<&Cluster> {
        find(&self.clusters, name).map(|c| &c.cluster)
    }

    pub fn context(&self, name: &str) -> Option<&Context> {
        find(&self.contexts, name).map(|c| &c.context)
    }

    pub fn user(&self, name: &str) -> Option<&AuthInfo> {
        find(&self.users, name).map(|u| &u.user)
    }

    pub fn user_mut(&mut self, name: &str) -> Option<&mut AuthInfo> {
        self.users
            .iter_mut()
            .rev()
            .find(|u| u.name == name)
            .map(|u| &mut u.user)
    }

    pub fn current(&self) -> Option<(&str, &Context)> {
        if self.current_context.is_empty() {
            return None;
        }
        self.context(&self.current_context)
            .map(|c| (self.current_context.as_str(), c))
    }

    /// Names of contexts whose cluster or user does not resolve in this document.
    pub fn dangling_contexts(&self) -> Vec<String> {
        self.contexts
            .iter()
            .filter(|c| !self.resolves(&c.context))
            .map(|c| c.name.clone())
            .collect()
    }

    pub fn resolves(&self, context: &Context) -> bool {
        self.cluster(&context.cluster).is_some() && self.user(&context.user).is_some()
    }
}

/// Last entry wins, matching how the merge indexes duplicates.
fn find<'a, T: Named>(entries: &'a [T], name: &str) -> Option<&'a T> {
    entries.iter().rev().find(|e| e.name() == name)
}
