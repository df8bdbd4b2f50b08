//! Resolved links

use crate::instance::JobInstance;
use crate::property::PropertyValue;
use serde::{Deserialize, Serialize};

/// A typed, named bundle shared by a provider job with its consumers
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Link {
    /// Address of the provider's instance group
    pub address: String,

    /// Provider instances
    #[serde(default)]
    pub instances: Vec<JobInstance>,

    /// Exposed properties, with spec defaults overlaid by explicit job values
    #[serde(default, skip_serializing_if = "PropertyValue::is_null")]
    pub properties: PropertyValue,
}
