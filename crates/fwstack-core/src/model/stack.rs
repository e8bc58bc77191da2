//! スタック定義
//!
//! KDLファイル1つから得られる全体構成

use super::{FirewallSpec, InstanceSpec, NetworkSpec, RoleSpec, SubnetType};
use crate::error::{Result, SpecError};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

const MAX_STACK_NAME_LEN: usize = 128;
const FALLBACK_STACK_NAME: &str = "fwstack";

/// スタック名として使えるか（英字で始まり、英数字と `-` のみ、128文字以内）
pub fn is_valid_stack_name(name: &str) -> bool {
    name.len() <= MAX_STACK_NAME_LEN
        && name.starts_with(|c: char| c.is_ascii_alphabetic())
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
}

/// 任意の文字列（ディレクトリ名など）からスタック名を作る
///
/// 英数字以外は `-` に置き換え、先頭が英字でなければ `fwstack-` を付けます。
pub fn stack_name_from(raw: &str) -> String {
    let mut name = String::with_capacity(raw.len());
    for c in raw.chars() {
        if c.is_ascii_alphanumeric() {
            name.push(c);
        } else if !name.is_empty() && !name.ends_with('-') {
            name.push('-');
        }
    }
    let name = name.trim_end_matches('-');

    let mut name = if name.is_empty() {
        FALLBACK_STACK_NAME.to_string()
    } else if name.starts_with(|c: char| c.is_ascii_alphabetic()) {
        name.to_string()
    } else {
        format!("{}-{}", FALLBACK_STACK_NAME, name)
    };
    name.truncate(MAX_STACK_NAME_LEN);
    name.truncate(name.trim_end_matches('-').len());
    name
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackSpec {
    /// スタック名
    pub name: String,

    pub description: Option<String>,

    pub region: String,

    pub network: NetworkSpec,

    /// ロール定義（宣言順）
    pub roles: IndexMap<String, RoleSpec>,

    pub firewall: Option<FirewallSpec>,

    /// インスタンス定義（宣言順）
    pub instances: IndexMap<String, InstanceSpec>,
}

impl StackSpec {
    /// デフォルトのネットワークのみを持つスタック
    pub fn new(name: impl Into<String>, region: impl Into<String>) -> Self {
        let region = region.into();
        Self {
            name: name.into(),
            description: None,
            network: NetworkSpec::for_region(&region),
            region,
            roles: IndexMap::new(),
            firewall: None,
            instances: IndexMap::new(),
        }
    }

    /// サブネットグループ参照も含めた全体検証
    pub fn validate(&self) -> Result<()> {
        if !is_valid_stack_name(&self.name) {
            return Err(SpecError::InvalidConfig(format!(
                "スタック名 '{}' は英字で始まり、英数字と '-' のみ（{}文字以内）で指定してください",
                self.name, MAX_STACK_NAME_LEN
            )));
        }
        self.network.validate()?;

        if let Some(firewall) = &self.firewall {
            firewall.validate()?;
            for group in [&firewall.subnet_group, &firewall.egress_subnet_group] {
                if self.network.group(group).is_none() {
                    return Err(SpecError::SubnetGroupNotFound(group.clone()));
                }
            }
            if firewall.subnet_group == firewall.egress_subnet_group {
                return Err(SpecError::InvalidConfig(
                    "firewall の subnet-group と egress-subnet-group は別のグループを指定してください"
                        .to_string(),
                ));
            }
            if let Some(group) = self.network.group(&firewall.subnet_group)
                && group.subnet_type == SubnetType::Public
            {
                return Err(SpecError::InvalidConfig(format!(
                    "firewall の subnet-group '{}' に public サブネットは指定できません",
                    group.name
                )));
            }
            if let Some(group) = self.network.group(&firewall.egress_subnet_group)
                && group.subnet_type != SubnetType::PrivateWithEgress
            {
                return Err(SpecError::InvalidConfig(format!(
                    "egress-subnet-group '{}' は {} ではなく {} を指定してください",
                    group.name,
                    group.subnet_type,
                    SubnetType::PrivateWithEgress
                )));
            }
        }

        for (name, instance) in &self.instances {
            instance.validate()?;
            if self.network.group(&instance.subnet_group).is_none() {
                return Err(SpecError::SubnetGroupNotFound(format!(
                    "{} (instance '{}')",
                    instance.subnet_group, name
                )));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_stack_uses_region_zones() {
        let stack = StackSpec::new("egress", "ap-northeast-1");
        assert_eq!(
            stack.network.availability_zones,
            vec!["ap-northeast-1a", "ap-northeast-1c"]
        );
        assert!(stack.validate().is_ok());
    }

    #[test]
    fn test_stack_name_checked() {
        assert!(StackSpec::new("egress-inspection", "us-east-1").validate().is_ok());
        for name in ["my_stack", "1stack", "", "a.b"] {
            assert!(
                matches!(
                    StackSpec::new(name, "us-east-1").validate(),
                    Err(SpecError::InvalidConfig(_))
                ),
                "{name}"
            );
        }
    }

    #[test]
    fn test_stack_name_from() {
        assert_eq!(stack_name_from("egress"), "egress");
        assert_eq!(stack_name_from("my_project"), "my-project");
        assert_eq!(stack_name_from(".tmpAb3xY"), "tmpAb3xY");
        assert_eq!(stack_name_from("2024 infra"), "fwstack-2024-infra");
        assert_eq!(stack_name_from("a__b--"), "a-b");
        assert_eq!(stack_name_from("..."), "fwstack");
        assert_eq!(stack_name_from("日本語"), "fwstack");
        assert_eq!(stack_name_from(&"x".repeat(200)).len(), 128);
        assert!(is_valid_stack_name(&stack_name_from("_9.x")));
    }

    #[test]
    fn test_missing_firewall_group() {
        let mut stack = StackSpec::new("egress", "us-east-1");
        stack.firewall = Some(FirewallSpec {
            subnet_group: "Inspection".to_string(),
            ..Default::default()
        });
        assert!(matches!(
            stack.validate(),
            Err(SpecError::SubnetGroupNotFound(ref g)) if g == "Inspection"
        ));
    }

    #[test]
    fn test_same_firewall_and_egress_group_rejected() {
        let mut stack = StackSpec::new("egress", "us-east-1");
        stack.firewall = Some(FirewallSpec {
            subnet_group: "Egress".to_string(),
            ..Default::default()
        });
        assert!(stack.validate().is_err());
    }

    #[test]
    fn test_public_egress_group_rejected() {
        let mut stack = StackSpec::new("egress", "us-east-1");
        stack.firewall = Some(FirewallSpec {
            egress_subnet_group: "Public".to_string(),
            ..Default::default()
        });
        assert!(matches!(stack.validate(), Err(SpecError::InvalidConfig(_))));
    }

    #[test]
    fn test_public_firewall_group_rejected() {
        let mut stack = StackSpec::new("egress", "us-east-1");
        stack.firewall = Some(FirewallSpec {
            subnet_group: "Public".to_string(),
            ..Default::default()
        });
        assert!(matches!(stack.validate(), Err(SpecError::InvalidConfig(_))));
    }

    #[test]
    fn test_instance_group_checked() {
        let mut stack = StackSpec::new("egress", "us-east-1");
        stack.instances.insert(
            "Ec2Instance".to_string(),
            InstanceSpec {
                subnet_group: "App".to_string(),
                ..Default::default()
            },
        );
        assert!(stack.validate().is_err());
    }
}
