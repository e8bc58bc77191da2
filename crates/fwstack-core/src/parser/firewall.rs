//! firewall ノードのパース

use super::{arg_bool, arg_int, arg_str, required_name};
use crate::error::{Result, SpecError};
use crate::model::{
    Address, Direction, FirewallSpec, PortSpec, RuleAction, RuleGroupSpec, RuleOrder,
    RuleProtocol, StatefulRuleSpec,
};
use kdl::KdlNode;

/// firewall ノードをパース
///
/// rule-group が1つもなければデフォルトのルールグループ（HOME_NET pass）を使用します。
pub fn parse_firewall(node: &KdlNode) -> Result<FirewallSpec> {
    let mut firewall = FirewallSpec::default();
    if let Some(name) = arg_str(node) {
        firewall.name = name.to_string();
    }

    let mut rule_groups = Vec::new();
    if let Some(children) = node.children() {
        for child in children.nodes() {
            match child.name().value() {
                "subnet_group" | "subnet-group" => {
                    firewall.subnet_group = required_value(child)?;
                }
                "egress_subnet_group" | "egress-subnet-group" => {
                    firewall.egress_subnet_group = required_value(child)?;
                }
                "log_retention_days" | "log-retention-days" => {
                    if let Some(days) = arg_int(child)? {
                        firewall.log_retention_days = days;
                    }
                }
                "delete_protection" | "delete-protection" => {
                    firewall.delete_protection = arg_bool(child).unwrap_or(false);
                }
                "subnet_change_protection" | "subnet-change-protection" => {
                    firewall.subnet_change_protection = arg_bool(child).unwrap_or(false);
                }
                "rule_group" | "rule-group" => {
                    rule_groups.push(parse_rule_group(child)?);
                }
                other => {
                    tracing::warn!(node = %other, "Unknown firewall setting, skipping");
                }
            }
        }
    }

    if !rule_groups.is_empty() {
        firewall.rule_groups = rule_groups;
    }
    Ok(firewall)
}

/// rule-group ノードをパース
fn parse_rule_group(node: &KdlNode) -> Result<RuleGroupSpec> {
    let mut group = RuleGroupSpec::named(required_name(node)?);

    if let Some(children) = node.children() {
        for child in children.nodes() {
            match child.name().value() {
                "capacity" => {
                    if let Some(capacity) = arg_int(child)? {
                        group.capacity = capacity;
                    }
                }
                "rule_order" | "rule-order" => {
                    let value = required_value(child)?;
                    group.rule_order = RuleOrder::parse(&value).ok_or_else(|| {
                        SpecError::InvalidConfig(format!(
                            "rule-group '{}': 不明な rule-order '{}'",
                            group.name, value
                        ))
                    })?;
                }
                "rule" => {
                    group.rules.push(parse_rule(child)?);
                }
                other => {
                    tracing::warn!(node = %other, "Unknown rule-group setting, skipping");
                }
            }
        }
    }

    Ok(group)
}

/// rule ノードをパース
///
/// 例:
/// ```kdl
/// rule action="pass" protocol="ip" source="$HOME_NET" destination="0.0.0.0/0" {
///     msg "HOME_NET pass"
///     sid 1000001
/// }
/// ```
fn parse_rule(node: &KdlNode) -> Result<StatefulRuleSpec> {
    let mut rule = StatefulRuleSpec::default();

    if let Some(value) = prop_str(node, "action") {
        rule.action = RuleAction::parse(value)
            .ok_or_else(|| SpecError::InvalidConfig(format!("不明な action: {}", value)))?;
    }
    if let Some(value) = prop_str(node, "protocol") {
        rule.protocol = RuleProtocol::parse(value)
            .ok_or_else(|| SpecError::InvalidConfig(format!("不明な protocol: {}", value)))?;
    }
    if let Some(value) = prop_str(node, "source") {
        rule.source = Address::parse(value)?;
    }
    if let Some(value) = prop_str(node, "source-port").or_else(|| prop_str(node, "source_port")) {
        rule.source_port = PortSpec::parse(value)?;
    }
    if let Some(value) = prop_str(node, "destination") {
        rule.destination = Address::parse(value)?;
    }
    if let Some(value) =
        prop_str(node, "destination-port").or_else(|| prop_str(node, "destination_port"))
    {
        rule.destination_port = PortSpec::parse(value)?;
    }
    if let Some(value) = prop_str(node, "direction") {
        rule.direction = Direction::parse(value)
            .ok_or_else(|| SpecError::InvalidConfig(format!("不明な direction: {}", value)))?;
    }

    if let Some(children) = node.children() {
        for child in children.nodes() {
            match child.name().value() {
                "msg" => rule.msg = required_value(child)?,
                "sid" => {
                    if let Some(sid) = arg_int(child)? {
                        rule.sid = sid;
                    }
                }
                "rev" => {
                    if let Some(rev) = arg_int(child)? {
                        rule.rev = rev;
                    }
                }
                other => {
                    tracing::warn!(node = %other, "Unknown rule option, skipping");
                }
            }
        }
    }

    Ok(rule)
}

fn prop_str<'a>(node: &'a KdlNode, key: &str) -> Option<&'a str> {
    node.get(key).and_then(|v| v.as_string())
}

fn required_value(node: &KdlNode) -> Result<String> {
    arg_str(node).map(str::to_string).ok_or_else(|| {
        SpecError::InvalidConfig(format!("{} requires a value", node.name().value()))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn first_node(kdl: &str) -> KdlNode {
        let doc: kdl::KdlDocument = kdl.parse().unwrap();
        doc.nodes().first().unwrap().clone()
    }

    #[test]
    fn test_empty_firewall_uses_default_rule_group() {
        let firewall = parse_firewall(&first_node("firewall")).unwrap();
        assert_eq!(firewall, FirewallSpec::default());
        assert_eq!(
            firewall.rule_groups[0].rules[0],
            StatefulRuleSpec::default()
        );
    }

    #[test]
    fn test_parse_firewall_settings() {
        let node = first_node(
            r#"
            firewall "egress-firewall" {
                subnet-group "Inspection"
                egress-subnet-group "App"
                log-retention-days 30
                delete-protection #true
                subnet-change-protection "true"
            }
        "#,
        );
        let firewall = parse_firewall(&node).unwrap();
        assert_eq!(firewall.name, "egress-firewall");
        assert_eq!(firewall.subnet_group, "Inspection");
        assert_eq!(firewall.egress_subnet_group, "App");
        assert_eq!(firewall.log_retention_days, 30);
        assert!(firewall.delete_protection);
        assert!(firewall.subnet_change_protection);
    }

    #[test]
    fn test_parse_rule_groups() {
        let node = first_node(
            r#"
            firewall {
                rule-group "allow-https" {
                    capacity 10
                    rule-order "strict-order"
                    rule action="pass" protocol="tcp" source="$HOME_NET" destination="any" destination-port="443" {
                        msg "https out"
                        sid 100
                    }
                    rule action="drop" protocol="ip" source="$HOME_NET" destination="any" direction="any" {
                        msg "deny rest"
                        sid 101
                        rev 2
                    }
                }
            }
        "#,
        );
        let firewall = parse_firewall(&node).unwrap();
        assert_eq!(firewall.rule_groups.len(), 1);

        let group = &firewall.rule_groups[0];
        assert_eq!(group.name, "allow-https");
        assert_eq!(group.capacity, 10);
        assert_eq!(group.rule_order, RuleOrder::StrictOrder);
        assert_eq!(group.rules.len(), 2);

        let https = &group.rules[0];
        assert_eq!(https.protocol, RuleProtocol::Tcp);
        assert_eq!(https.destination, Address::Any);
        assert_eq!(https.destination_port, PortSpec::Single(443));
        assert_eq!(https.rev, 1);

        let deny = &group.rules[1];
        assert_eq!(deny.action, RuleAction::Drop);
        assert_eq!(deny.direction, Direction::Any);
        assert_eq!(deny.rule_options(), vec!["msg:\"deny rest\"", "sid:101", "rev:2"]);
        assert!(firewall.validate().is_ok());
    }

    #[test]
    fn test_parse_rule_errors() {
        let node = first_node(r#"rule action="allow""#);
        assert!(parse_rule(&node).is_err());

        let node = first_node(r#"rule source="10.0.0.0/33""#);
        assert!(matches!(parse_rule(&node), Err(SpecError::InvalidCidr(_))));

        let node = first_node(r#"rule destination-port="443:80""#);
        assert!(parse_rule(&node).is_err());

        let node = first_node(r#"rule { sid -1 }"#);
        assert!(parse_rule(&node).is_err());
    }

    #[test]
    fn test_rule_group_requires_name() {
        let node = first_node(r#"firewall { rule-group { capacity 10 } }"#);
        assert!(parse_firewall(&node).is_err());
    }

    #[test]
    fn test_unknown_rule_order() {
        let node = first_node(r#"rule-group "x" { rule-order "random" }"#);
        assert!(parse_rule_group(&node).is_err());
    }
}
