//! Stateful 5-tuple rule group construct

use crate::construct_path;
use crate::error::Result;
use fwstack_cloud::{Construct, ConstructPath, ResourceRef, Stack, Token};
use fwstack_core::{RuleGroupSpec, RuleOrder, StatefulRuleSpec};
use serde_json::{Value, json};

/// `AWS::NetworkFirewall::RuleGroup` holding stateful 5-tuple rules
#[derive(Debug, Clone)]
pub struct NetworkFirewallRuleGroup5Tuple {
    path: ConstructPath,
    rule_group: ResourceRef,
    rule_order: RuleOrder,
}

impl NetworkFirewallRuleGroup5Tuple {
    /// Rule group with the default content: one PASS rule from `$HOME_NET` to anywhere
    pub fn new(stack: &mut Stack, scope: Option<&ConstructPath>, id: &str) -> Result<Self> {
        Self::with_spec(stack, scope, id, &RuleGroupSpec::default())
    }

    /// Rule group with caller-supplied rules
    pub fn with_spec(
        stack: &mut Stack,
        scope: Option<&ConstructPath>,
        id: &str,
        spec: &RuleGroupSpec,
    ) -> Result<Self> {
        spec.validate()?;

        let path = construct_path(scope, id)?;
        stack.register(&path)?;

        let rules: Vec<Value> = spec.rules.iter().map(stateful_rule).collect();
        let rule_group = stack.add_resource(
            path.child("Default")?,
            "AWS::NetworkFirewall::RuleGroup",
            json!({
                "Capacity": spec.capacity,
                "RuleGroup": {
                    "RulesSource": {
                        "StatefulRules": rules,
                    },
                    "StatefulRuleOptions": {
                        "RuleOrder": spec.rule_order.as_str(),
                    },
                },
                "RuleGroupName": spec.name,
                "Type": "STATEFUL",
            }),
        )?;

        tracing::debug!(
            rule_group = %spec.name,
            rules = spec.rules.len(),
            capacity = spec.capacity,
            "Declared stateful rule group"
        );

        Ok(Self {
            path,
            rule_group,
            rule_order: spec.rule_order,
        })
    }

    pub fn rule_group(&self) -> &ResourceRef {
        &self.rule_group
    }

    /// `RuleGroupArn` attribute
    pub fn arn(&self) -> Token {
        self.rule_group.attr("RuleGroupArn")
    }

    pub fn rule_order(&self) -> RuleOrder {
        self.rule_order
    }
}

impl Construct for NetworkFirewallRuleGroup5Tuple {
    fn path(&self) -> &ConstructPath {
        &self.path
    }
}

fn stateful_rule(rule: &StatefulRuleSpec) -> Value {
    let options: Vec<Value> = rule
        .rule_options()
        .into_iter()
        .map(|keyword| json!({ "Keyword": keyword }))
        .collect();
    json!({
        "Action": rule.action.as_str(),
        "Header": {
            "Destination": rule.destination.to_string(),
            "DestinationPort": rule.destination_port.to_string(),
            "Direction": rule.direction.as_str(),
            "Protocol": rule.protocol.as_str(),
            "Source": rule.source.to_string(),
            "SourcePort": rule.source_port.to_string(),
        },
        "RuleOptions": options,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AwsError;
    use fwstack_core::{Address, PortSpec, RuleAction, RuleProtocol};

    #[test]
    fn test_default_rule_group() {
        let mut stack = Stack::new("test").unwrap();
        let group = NetworkFirewallRuleGroup5Tuple::new(&mut stack, None, "RuleGroup").unwrap();

        let props = stack.properties(group.rule_group().logical_id()).unwrap();
        assert_eq!(props["Capacity"], 100);
        assert_eq!(props["Type"], "STATEFUL");
        assert_eq!(props["RuleGroupName"], "network-firewall-rule-group-5-tuple");
        assert_eq!(
            props["RuleGroup"]["StatefulRuleOptions"]["RuleOrder"],
            "STRICT_ORDER"
        );

        let rules = props["RuleGroup"]["RulesSource"]["StatefulRules"]
            .as_array()
            .unwrap();
        assert_eq!(rules.len(), 1);
        let rule = &rules[0];
        assert_eq!(rule["Action"], "PASS");
        assert_eq!(
            rule["Header"],
            json!({
                "Destination": "0.0.0.0/0",
                "DestinationPort": "ANY",
                "Direction": "FORWARD",
                "Protocol": "IP",
                "Source": "$HOME_NET",
                "SourcePort": "ANY",
            })
        );
        assert_eq!(
            rule["RuleOptions"],
            json!([
                { "Keyword": "msg:\"HOME_NET pass\"" },
                { "Keyword": "sid:1000001" },
                { "Keyword": "rev:1" },
            ])
        );
    }

    #[test]
    fn test_rule_group_from_spec() {
        let mut spec = RuleGroupSpec::named("allow-https");
        spec.rules.push(StatefulRuleSpec {
            action: RuleAction::Pass,
            protocol: RuleProtocol::Tls,
            destination: Address::Any,
            destination_port: PortSpec::Single(443),
            msg: "tls out".to_string(),
            sid: 10,
            ..Default::default()
        });
        spec.rules.push(StatefulRuleSpec {
            action: RuleAction::Drop,
            msg: "deny".to_string(),
            sid: 11,
            ..Default::default()
        });

        let mut stack = Stack::new("test").unwrap();
        let group =
            NetworkFirewallRuleGroup5Tuple::with_spec(&mut stack, None, "Https", &spec).unwrap();
        let props = stack.properties(group.rule_group().logical_id()).unwrap();
        let rules = props["RuleGroup"]["RulesSource"]["StatefulRules"]
            .as_array()
            .unwrap();
        assert_eq!(rules.len(), 2);
        assert_eq!(rules[0]["Header"]["Protocol"], "TLS");
        assert_eq!(rules[0]["Header"]["Destination"], "ANY");
        assert_eq!(rules[0]["Header"]["DestinationPort"], "443");
        assert_eq!(rules[1]["Action"], "DROP");
    }

    #[test]
    fn test_invalid_spec_rejected() {
        let spec = RuleGroupSpec::named("empty");
        let mut stack = Stack::new("test").unwrap();
        let result = NetworkFirewallRuleGroup5Tuple::with_spec(&mut stack, None, "Empty", &spec);
        assert!(matches!(result, Err(AwsError::Spec(_))));
        assert_eq!(stack.resource_count(), 0);
    }

    #[test]
    fn test_arn_token() {
        let mut stack = Stack::new("test").unwrap();
        let group = NetworkFirewallRuleGroup5Tuple::new(&mut stack, None, "RuleGroup").unwrap();
        assert_eq!(
            Value::from(group.arn()),
            json!({ "Fn::GetAtt": [group.rule_group().logical_id(), "RuleGroupArn"] })
        );
    }
}
