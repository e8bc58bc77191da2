//! Synthesized CloudFormation template

use crate::error::Result;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A synthesized CloudFormation template
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Template {
    #[serde(rename = "AWSTemplateFormatVersion")]
    pub format_version: String,

    #[serde(rename = "Description", default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(rename = "Parameters", default, skip_serializing_if = "IndexMap::is_empty")]
    pub parameters: IndexMap<String, Value>,

    /// Resources indexed by logical ID, in declaration order
    #[serde(rename = "Resources")]
    pub resources: IndexMap<String, Value>,

    #[serde(rename = "Outputs", default, skip_serializing_if = "IndexMap::is_empty")]
    pub outputs: IndexMap<String, Value>,
}

impl Template {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    pub fn from_json(content: &str) -> Result<Self> {
        Ok(serde_json::from_str(content)?)
    }

    /// Get a resource by logical ID
    pub fn resource(&self, logical_id: &str) -> Option<&Value> {
        self.resources.get(logical_id)
    }

    /// Resources of the given type, in declaration order
    pub fn resources_of_type(&self, resource_type: &str) -> Vec<(&String, &Value)> {
        self.resources
            .iter()
            .filter(|(_, r)| r.get("Type").and_then(Value::as_str) == Some(resource_type))
            .collect()
    }

    /// Summary of the template contents
    pub fn summary(&self) -> TemplateSummary {
        let mut by_type: IndexMap<String, usize> = IndexMap::new();
        for resource in self.resources.values() {
            let resource_type = resource
                .get("Type")
                .and_then(Value::as_str)
                .unwrap_or("(unknown)")
                .to_string();
            *by_type.entry(resource_type).or_insert(0) += 1;
        }
        by_type.sort_keys();

        TemplateSummary {
            resources: self.resources.len(),
            parameters: self.parameters.len(),
            outputs: self.outputs.len(),
            by_type,
        }
    }
}

/// Summary of a synthesized template
#[derive(Debug, Clone)]
pub struct TemplateSummary {
    pub resources: usize,
    pub parameters: usize,
    pub outputs: usize,
    /// Resource counts by type, sorted by type name
    pub by_type: IndexMap<String, usize>,
}

impl std::fmt::Display for TemplateSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} resources, {} parameters, {} outputs",
            self.resources, self.parameters, self.outputs
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Template {
        let mut resources = IndexMap::new();
        resources.insert(
            "LogGroup".to_string(),
            json!({ "Type": "AWS::Logs::LogGroup", "Properties": { "RetentionInDays": 7 } }),
        );
        resources.insert(
            "RouteA".to_string(),
            json!({ "Type": "AWS::EC2::Route", "Properties": {} }),
        );
        resources.insert(
            "RouteB".to_string(),
            json!({ "Type": "AWS::EC2::Route", "Properties": {} }),
        );
        Template {
            format_version: "2010-09-09".to_string(),
            description: None,
            parameters: IndexMap::new(),
            resources,
            outputs: IndexMap::new(),
        }
    }

    #[test]
    fn test_summary_counts_by_type() {
        let summary = sample().summary();
        assert_eq!(summary.resources, 3);
        assert_eq!(summary.by_type["AWS::EC2::Route"], 2);
        assert_eq!(summary.by_type["AWS::Logs::LogGroup"], 1);
        assert_eq!(
            summary.by_type.keys().next().map(String::as_str),
            Some("AWS::EC2::Route")
        );
        assert_eq!(summary.to_string(), "3 resources, 0 parameters, 0 outputs");
    }

    #[test]
    fn test_json_skips_empty_sections() {
        let json = sample().to_json().unwrap();
        assert!(json.contains("AWSTemplateFormatVersion"));
        assert!(!json.contains("Parameters"));
        assert!(!json.contains("Outputs"));
    }

    #[test]
    fn test_json_reload() {
        let template = sample();
        let reloaded = Template::from_json(&template.to_json().unwrap()).unwrap();
        assert_eq!(reloaded, template);
        assert_eq!(reloaded.resources_of_type("AWS::EC2::Route").len(), 2);
    }

    #[test]
    fn test_yaml_output() {
        let yaml = sample().to_yaml().unwrap();
        assert!(yaml.contains("AWSTemplateFormatVersion: 2010-09-09") || yaml.contains("AWSTemplateFormatVersion: '2010-09-09'"));
        assert!(yaml.contains("AWS::Logs::LogGroup"));
    }
}
