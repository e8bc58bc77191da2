//! KDLパーサー
//!
//! fwstack のKDL設定ファイルをパースします。
//! 各ノードタイプのパース処理はモジュールに分離されています。

mod firewall;
mod instance;
mod network;

use firewall::parse_firewall;
use instance::{parse_instance, parse_role};
use network::parse_network;

use crate::error::{Result, SpecError};
use crate::model::{DEFAULT_REGION, StackSpec, stack_name_from};
use kdl::{KdlDocument, KdlNode};
use std::fs;
use std::path::Path;

/// KDLファイルをパースして StackSpec を生成
pub fn parse_kdl_file<P: AsRef<Path>>(path: P) -> Result<StackSpec> {
    let content = fs::read_to_string(path.as_ref())?;
    let name = path
        .as_ref()
        .parent()
        .and_then(|p| p.file_name())
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    parse_kdl_string(&content, name)
}

/// KDL文字列をパース
///
/// `stack` ノードがない場合は `default_name` をスタック名として使える形に
/// 整えて使用します。
pub fn parse_kdl_string(content: &str, default_name: String) -> Result<StackSpec> {
    let doc: KdlDocument = content.parse()?;

    // region はネットワークのデフォルトAZに影響するため先に読む
    let mut spec = StackSpec::new(stack_name_from(&default_name), DEFAULT_REGION);
    if let Some(stack_node) = doc.nodes().iter().find(|n| n.name().value() == "stack") {
        if let Some(name) = arg_str(stack_node) {
            spec.name = name.to_string();
        }
        if let Some(children) = stack_node.children() {
            for child in children.nodes() {
                match child.name().value() {
                    "description" => spec.description = arg_str(child).map(str::to_string),
                    "region" => {
                        if let Some(region) = arg_str(child) {
                            spec.region = region.to_string();
                            spec.network = crate::model::NetworkSpec::for_region(region);
                        }
                    }
                    other => {
                        tracing::warn!(node = %other, "Unknown stack setting, skipping");
                    }
                }
            }
        }
    }

    let mut seen_network = false;
    for node in doc.nodes() {
        match node.name().value() {
            "stack" => {}
            "network" => {
                if seen_network {
                    return Err(SpecError::Duplicate("network".to_string()));
                }
                seen_network = true;
                spec.network = parse_network(node, &spec.region)?;
            }
            "role" => {
                let (name, role) = parse_role(node)?;
                if spec.roles.insert(name.clone(), role).is_some() {
                    return Err(SpecError::Duplicate(format!("role {}", name)));
                }
            }
            "firewall" => {
                if spec.firewall.is_some() {
                    return Err(SpecError::Duplicate("firewall".to_string()));
                }
                spec.firewall = Some(parse_firewall(node)?);
            }
            "instance" => {
                let (name, instance) = parse_instance(node)?;
                if spec.instances.insert(name.clone(), instance).is_some() {
                    return Err(SpecError::Duplicate(format!("instance {}", name)));
                }
            }
            other => {
                // 不明なノードはスキップ
                tracing::warn!(node = %other, "Unknown node, skipping");
            }
        }
    }

    spec.validate()?;
    tracing::debug!(
        stack = %spec.name,
        roles = spec.roles.len(),
        instances = spec.instances.len(),
        firewall = spec.firewall.is_some(),
        "Parsed stack definition"
    );
    Ok(spec)
}

/// 最初の位置引数（文字列）
pub(crate) fn arg_str(node: &KdlNode) -> Option<&str> {
    node.entries()
        .iter()
        .find(|e| e.name().is_none())
        .and_then(|e| e.value().as_string())
}

/// すべての位置引数（文字列）
pub(crate) fn args_str(node: &KdlNode) -> Vec<String> {
    node.entries()
        .iter()
        .filter(|e| e.name().is_none())
        .filter_map(|e| e.value().as_string().map(|s| s.to_string()))
        .collect()
}

/// 名前付き引数として必須のノード名
pub(crate) fn required_name(node: &KdlNode) -> Result<String> {
    arg_str(node).map(str::to_string).ok_or_else(|| {
        SpecError::InvalidConfig(format!("{} requires a name", node.name().value()))
    })
}

/// 最初の位置引数を整数として取得し、範囲外ならエラー
pub(crate) fn arg_int<T: TryFrom<i128>>(node: &KdlNode) -> Result<Option<T>> {
    let Some(value) = node
        .entries()
        .iter()
        .find(|e| e.name().is_none())
        .and_then(|e| e.value().as_integer())
    else {
        return Ok(None);
    };
    T::try_from(value).map(Some).map_err(|_| {
        SpecError::InvalidConfig(format!(
            "{}: {} は範囲外です",
            node.name().value(),
            value
        ))
    })
}

/// プロパティを整数として取得
pub(crate) fn prop_int<T: TryFrom<i128>>(node: &KdlNode, key: &str) -> Result<Option<T>> {
    let Some(value) = node.get(key).and_then(|v| v.as_integer()) else {
        return Ok(None);
    };
    T::try_from(value)
        .map(Some)
        .map_err(|_| SpecError::InvalidConfig(format!("{}={} は範囲外です", key, value)))
}

/// ブール値の位置引数をパースし、`"true"`/`"false"` 文字列が使用された場合は警告を出力
/// KDL v2では `#true`/`#false` を使用する必要がある
pub(crate) fn arg_bool(node: &KdlNode) -> Option<bool> {
    let value = node.entries().iter().find(|e| e.name().is_none())?.value();
    if let Some(b) = value.as_bool() {
        return Some(b);
    }

    let key = node.name().value();
    match value.as_string() {
        Some("true") => {
            tracing::warn!("'{key} \"true\"' is a string, not a boolean. Use '{key} #true'");
            Some(true)
        }
        Some("false") => {
            tracing::warn!("'{key} \"false\"' is a string, not a boolean. Use '{key} #false'");
            Some(false)
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{RuleAction, SubnetType};

    const FULL: &str = r#"
        stack "egress-inspection" {
            description "Egress inspection with AWS Network Firewall"
            region "us-east-1"
        }

        network {
            cidr "10.1.0.0/16"
            availability-zones "us-east-1a" "us-east-1c"
            nat-gateways 2
            subnet "Public" type="public" cidr-mask=24
            subnet "Firewall" type="private-with-egress" cidr-mask=28
            subnet "Egress" type="private-with-egress" cidr-mask=24
        }

        role "InstanceRole" {
            managed-policy "AmazonSSMManagedInstanceCore"
        }

        firewall {
            rule-group "network-firewall-rule-group-5-tuple" {
                capacity 100
                rule action="pass" protocol="ip" source="$HOME_NET" destination="0.0.0.0/0" {
                    msg "HOME_NET pass"
                    sid 1000001
                    rev 1
                }
            }
        }

        instance "Ec2Instance" {
            role "InstanceRole"
        }
    "#;

    #[test]
    fn test_parse_full_stack() {
        let spec = parse_kdl_string(FULL, "default".to_string()).unwrap();
        assert_eq!(spec.name, "egress-inspection");
        assert_eq!(
            spec.description.as_deref(),
            Some("Egress inspection with AWS Network Firewall")
        );
        assert_eq!(spec.network.cidr.to_string(), "10.1.0.0/16");
        assert_eq!(spec.network.nat_gateways, Some(2));
        assert_eq!(spec.network.subnet_groups.len(), 3);
        assert_eq!(
            spec.network.group("Public").unwrap().subnet_type,
            SubnetType::Public
        );
        assert!(spec.roles.contains_key("InstanceRole"));

        let firewall = spec.firewall.as_ref().unwrap();
        assert_eq!(firewall.rule_groups.len(), 1);
        let rule = &firewall.rule_groups[0].rules[0];
        assert_eq!(rule.action, RuleAction::Pass);
        assert_eq!(rule.sid, 1_000_001);

        let instance = &spec.instances["Ec2Instance"];
        assert_eq!(instance.role.as_deref(), Some("InstanceRole"));
        assert_eq!(instance.volume_size, 8);
    }

    #[test]
    fn test_parse_minimal_uses_defaults() {
        let spec = parse_kdl_string("firewall", "minimal".to_string()).unwrap();
        assert_eq!(spec.name, "minimal");
        assert_eq!(spec.region, "us-east-1");
        assert_eq!(spec.network.availability_zones.len(), 2);
        assert_eq!(spec.firewall.unwrap().rule_groups[0].rules.len(), 1);
    }

    #[test]
    fn test_region_changes_default_zones() {
        let kdl = r#"
            stack "tokyo" {
                region "ap-northeast-1"
            }
        "#;
        let spec = parse_kdl_string(kdl, "x".to_string()).unwrap();
        assert_eq!(
            spec.network.availability_zones,
            vec!["ap-northeast-1a", "ap-northeast-1c"]
        );
    }

    #[test]
    fn test_duplicate_firewall_rejected() {
        let result = parse_kdl_string("firewall\nfirewall", "x".to_string());
        assert!(matches!(result, Err(SpecError::Duplicate(_))));
    }

    #[test]
    fn test_duplicate_instance_rejected() {
        let kdl = r#"
            instance "A"
            instance "A"
        "#;
        assert!(parse_kdl_string(kdl, "x".to_string()).is_err());
    }

    #[test]
    fn test_unknown_node_skipped() {
        let spec = parse_kdl_string("dashboard \"x\"", "x".to_string()).unwrap();
        assert!(spec.firewall.is_none());
    }

    #[test]
    fn test_invalid_kdl() {
        let result = parse_kdl_string("firewall {", "x".to_string());
        assert!(matches!(result, Err(SpecError::KdlParse(_))));
    }

    #[test]
    fn test_parse_kdl_file() {
        let dir = tempfile::tempdir().unwrap();
        let project = dir.path().join("egress");
        fs::create_dir(&project).unwrap();
        let path = project.join("fwstack.kdl");
        fs::write(&path, "firewall").unwrap();

        let spec = parse_kdl_file(&path).unwrap();
        assert_eq!(spec.name, "egress");
    }

    #[test]
    fn test_default_name_made_valid() {
        let spec = parse_kdl_string("firewall\n", "my_project".to_string()).unwrap();
        assert_eq!(spec.name, "my-project");

        let spec = parse_kdl_string("firewall\n", "42".to_string()).unwrap();
        assert_eq!(spec.name, "fwstack-42");
    }

    #[test]
    fn test_parse_kdl_file_in_dotted_dir() {
        let dir = tempfile::tempdir().unwrap();
        let project = dir.path().join(".my_project.v2");
        fs::create_dir(&project).unwrap();
        let path = project.join("fwstack.kdl");
        fs::write(&path, "firewall").unwrap();

        let spec = parse_kdl_file(&path).unwrap();
        assert_eq!(spec.name, "my-project-v2");
    }

    #[test]
    fn test_invalid_explicit_stack_name() {
        let result = parse_kdl_string("stack \"my_stack\"", "x".to_string());
        assert!(matches!(result, Err(SpecError::InvalidConfig(_))));
    }
}
