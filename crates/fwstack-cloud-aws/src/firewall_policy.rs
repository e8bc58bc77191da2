//! Firewall policy construct

use crate::construct_path;
use crate::error::{AwsError, Result};
use fwstack_cloud::{Construct, ConstructPath, ResourceRef, Stack, Token};
use fwstack_core::RuleOrder;
use serde_json::{Value, json};
use std::collections::HashSet;

/// Stateless traffic is handed to the stateful engine
pub const STATELESS_DEFAULT_ACTIONS: &[&str] = &["aws:forward_to_sfe"];

/// Established flows not matched by a rule are dropped and logged
pub const STATEFUL_DEFAULT_ACTIONS: &[&str] = &["aws:drop_established", "aws:alert_established"];

/// A stateful rule group referenced from a policy
#[derive(Debug, Clone, PartialEq)]
pub struct StatefulRuleGroupReference {
    pub priority: u32,
    pub resource_arn: Token,
}

/// `AWS::NetworkFirewall::FirewallPolicy` with strict rule ordering
#[derive(Debug, Clone)]
pub struct NetworkFirewallPolicy {
    path: ConstructPath,
    firewall_policy: ResourceRef,
}

impl NetworkFirewallPolicy {
    /// Declare a policy referencing `references`
    ///
    /// Priorities must be unique and at least 1.
    pub fn new(
        stack: &mut Stack,
        scope: Option<&ConstructPath>,
        id: &str,
        policy_name: &str,
        references: &[StatefulRuleGroupReference],
    ) -> Result<Self> {
        let mut seen = HashSet::new();
        for reference in references {
            if reference.priority == 0 || !seen.insert(reference.priority) {
                return Err(AwsError::InvalidPriority(reference.priority));
            }
        }

        let path = construct_path(scope, id)?;
        stack.register(&path)?;

        let references: Vec<Value> = references
            .iter()
            .map(|r| {
                json!({
                    "Priority": r.priority,
                    "ResourceArn": r.resource_arn,
                })
            })
            .collect();

        let firewall_policy = stack.add_resource(
            path.child("Default")?,
            "AWS::NetworkFirewall::FirewallPolicy",
            json!({
                "FirewallPolicy": {
                    "StatefulDefaultActions": STATEFUL_DEFAULT_ACTIONS,
                    "StatefulEngineOptions": {
                        "RuleOrder": RuleOrder::StrictOrder.as_str(),
                    },
                    "StatefulRuleGroupReferences": references,
                    "StatelessDefaultActions": STATELESS_DEFAULT_ACTIONS,
                    "StatelessFragmentDefaultActions": STATELESS_DEFAULT_ACTIONS,
                },
                "FirewallPolicyName": policy_name,
            }),
        )?;

        Ok(Self {
            path,
            firewall_policy,
        })
    }

    pub fn firewall_policy(&self) -> &ResourceRef {
        &self.firewall_policy
    }

    /// `FirewallPolicyArn` attribute
    pub fn arn(&self) -> Token {
        self.firewall_policy.attr("FirewallPolicyArn")
    }
}

impl Construct for NetworkFirewallPolicy {
    fn path(&self) -> &ConstructPath {
        &self.path
    }
}
