//! Sub-store resource models

use serde::{Deserialize, Serialize};

/// Name of the managed subscription resource
pub const SUB_NAME: &str = "sub";

/// Name of the managed mihomo profile resource
pub const MIHOMO_NAME: &str = "mihomo";

/// Remark stored on both managed resources
pub const MANAGED_REMARK: &str = "managed by subcheck, do not edit";

/// Generic sub-store API envelope
#[derive(Debug, Clone, Deserialize)]
pub struct ApiResponse {
    pub status: String,
    #[serde(default)]
    pub data: Option<serde_json::Value>,
}

impl ApiResponse {
    pub fn is_success(&self) -> bool {
        self.status == "success"
    }
}

/// Operator entry in a subscription's process list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessStep {
    #[serde(rename = "type")]
    pub kind: String,
}

/// Subscription resource holding the generated proxy list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubResource {
    pub content: String,
    pub name: String,
    pub remark: String,
    pub source: String,
    pub process: Vec<ProcessStep>,
}

impl SubResource {
    /// Build the managed `sub` resource around raw list content
    pub fn managed(content: &str) -> Self {
        Self {
            content: content.to_string(),
            name: SUB_NAME.to_string(),
            remark: MANAGED_REMARK.to_string(),
            source: "local".to_string(),
            process: vec![ProcessStep {
                kind: "Quick Setting Operator".to_string(),
            }],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperatorArgs {
    pub content: String,
    pub mode: String,
}

/// Script operator applied to a file resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Operator {
    pub args: OperatorArgs,
    pub disabled: bool,
    #[serde(rename = "type")]
    pub kind: String,
}

/// File resource producing the mihomo profile from the `sub` subscription
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileResource {
    pub name: String,
    pub process: Vec<Operator>,
    pub remark: String,
    pub source: String,
    pub source_name: String,
    pub source_type: String,
    #[serde(rename = "type")]
    pub kind: String,
}

impl ProfileResource {
    /// Build the managed `mihomo` profile pointing at `overwrite_url`
    pub fn managed(overwrite_url: &str) -> Self {
        Self {
            name: MIHOMO_NAME.to_string(),
            process: vec![Operator {
                args: OperatorArgs {
                    content: overwrite_url.to_string(),
                    mode: "link".to_string(),
                },
                disabled: false,
                kind: "Script Operator".to_string(),
            }],
            remark: MANAGED_REMARK.to_string(),
            source: "local".to_string(),
            source_name: SUB_NAME.to_string(),
            source_type: "subscription".to_string(),
            kind: "mihomoProfile".to_string(),
        }
    }
}
