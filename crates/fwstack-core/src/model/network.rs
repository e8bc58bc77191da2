//! ネットワークモデル
//!
//! VPC とサブネットグループの定義

use crate::error::{Result, SpecError};
use ipnetwork::Ipv4Network;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::net::Ipv4Addr;

/// サブネットマスクとして指定可能な範囲
pub const MIN_CIDR_MASK: u8 = 16;
pub const MAX_CIDR_MASK: u8 = 28;

const DEFAULT_VPC_CIDR: Ipv4Network =
    match Ipv4Network::new_checked(Ipv4Addr::new(10, 0, 0, 0), 16) {
        Some(net) => net,
        None => panic!("10.0.0.0/16"),
    };

/// デフォルトリージョン
pub const DEFAULT_REGION: &str = "us-east-1";

/// サブネットの種類
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SubnetType {
    /// インターネットゲートウェイへのデフォルトルートを持つ
    Public,
    /// NAT ゲートウェイへのデフォルトルートを持つ
    PrivateWithEgress,
    /// デフォルトルートなし
    Isolated,
}

impl SubnetType {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().replace('_', "-").as_str() {
            "public" => Some(SubnetType::Public),
            "private-with-egress" | "private" => Some(SubnetType::PrivateWithEgress),
            "isolated" | "private-isolated" => Some(SubnetType::Isolated),
            _ => None,
        }
    }
}

impl fmt::Display for SubnetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubnetType::Public => write!(f, "public"),
            SubnetType::PrivateWithEgress => write!(f, "private-with-egress"),
            SubnetType::Isolated => write!(f, "isolated"),
        }
    }
}

/// サブネットグループ設定
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubnetGroupSpec {
    pub name: String,
    pub subnet_type: SubnetType,
    pub cidr_mask: u8,

    /// このグループを配置するAZ（未指定時はネットワーク全体のAZ）
    pub availability_zones: Option<Vec<String>>,
}

impl SubnetGroupSpec {
    pub fn new(name: impl Into<String>, subnet_type: SubnetType, cidr_mask: u8) -> Self {
        Self {
            name: name.into(),
            subnet_type,
            cidr_mask,
            availability_zones: None,
        }
    }
}

/// ネットワーク（VPC）設定
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkSpec {
    pub cidr: Ipv4Network,

    /// 使用するAZ（宣言順）
    pub availability_zones: Vec<String>,

    /// NAT ゲートウェイ数（未指定時はパブリックサブネットごとに1つ）
    pub nat_gateways: Option<u32>,

    pub subnet_groups: Vec<SubnetGroupSpec>,
}

impl Default for NetworkSpec {
    fn default() -> Self {
        Self::for_region(DEFAULT_REGION)
    }
}

impl NetworkSpec {
    /// リージョンのデフォルト設定（2AZ、Public / Firewall / Egress）
    pub fn for_region(region: &str) -> Self {
        Self {
            cidr: DEFAULT_VPC_CIDR,
            availability_zones: vec![format!("{}a", region), format!("{}c", region)],
            nat_gateways: None,
            subnet_groups: vec![
                SubnetGroupSpec::new("Public", SubnetType::Public, 24),
                SubnetGroupSpec::new("Firewall", SubnetType::PrivateWithEgress, 28),
                SubnetGroupSpec::new("Egress", SubnetType::PrivateWithEgress, 24),
            ],
        }
    }

    /// 名前でサブネットグループを取得
    pub fn group(&self, name: &str) -> Option<&SubnetGroupSpec> {
        self.subnet_groups.iter().find(|g| g.name == name)
    }

    /// グループが配置されるAZ（宣言順）
    pub fn zones_for<'a>(&'a self, group: &'a SubnetGroupSpec) -> Vec<&'a str> {
        match &group.availability_zones {
            Some(zones) => zones.iter().map(String::as_str).collect(),
            None => self.availability_zones.iter().map(String::as_str).collect(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.availability_zones.is_empty() {
            return Err(SpecError::InvalidConfig(
                "availability-zones が空です".to_string(),
            ));
        }
        let mut zones = HashSet::new();
        for az in &self.availability_zones {
            if !zones.insert(az.as_str()) {
                return Err(SpecError::Duplicate(format!("availability-zone {}", az)));
            }
        }

        if self.subnet_groups.is_empty() {
            return Err(SpecError::InvalidConfig(
                "subnet が1つも定義されていません".to_string(),
            ));
        }

        let mut names = HashSet::new();
        for group in &self.subnet_groups {
            if group.name.is_empty() || !group.name.chars().all(|c| c.is_ascii_alphanumeric()) {
                return Err(SpecError::InvalidConfig(format!(
                    "サブネットグループ名は英数字のみ使用できます: '{}'",
                    group.name
                )));
            }
            if !names.insert(group.name.as_str()) {
                return Err(SpecError::Duplicate(format!("subnet {}", group.name)));
            }
            if group.cidr_mask < MIN_CIDR_MASK.max(self.cidr.prefix())
                || group.cidr_mask > MAX_CIDR_MASK
            {
                return Err(SpecError::InvalidConfig(format!(
                    "subnet '{}': cidr-mask {} は /{}〜/{} の範囲で指定してください",
                    group.name,
                    group.cidr_mask,
                    MIN_CIDR_MASK.max(self.cidr.prefix()),
                    MAX_CIDR_MASK
                )));
            }
            if let Some(group_zones) = &group.availability_zones {
                if group_zones.is_empty() {
                    return Err(SpecError::InvalidConfig(format!(
                        "subnet '{}': availability-zones が空です",
                        group.name
                    )));
                }
                let mut seen = HashSet::new();
                for az in group_zones {
                    if !zones.contains(az.as_str()) {
                        return Err(SpecError::InvalidConfig(format!(
                            "subnet '{}': AZ '{}' はネットワークに含まれていません",
                            group.name, az
                        )));
                    }
                    if !seen.insert(az.as_str()) {
                        return Err(SpecError::Duplicate(format!(
                            "subnet '{}' availability-zone {}",
                            group.name, az
                        )));
                    }
                }
            }
        }

        let has_public = self
            .subnet_groups
            .iter()
            .any(|g| g.subnet_type == SubnetType::Public);
        let needs_nat = self
            .subnet_groups
            .iter()
            .any(|g| g.subnet_type == SubnetType::PrivateWithEgress);
        if needs_nat && !has_public {
            return Err(SpecError::InvalidConfig(
                "private-with-egress サブネットには public サブネット（NAT ゲートウェイ配置先）が必要です"
                    .to_string(),
            ));
        }
        if needs_nat && self.nat_gateways == Some(0) {
            return Err(SpecError::InvalidConfig(
                "private-with-egress サブネットには1つ以上の NAT ゲートウェイが必要です".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_network() {
        let net = NetworkSpec::default();
        assert_eq!(net.cidr.to_string(), "10.0.0.0/16");
        assert_eq!(net.availability_zones, vec!["us-east-1a", "us-east-1c"]);
        assert_eq!(net.subnet_groups.len(), 3);
        assert_eq!(net.group("Firewall").unwrap().cidr_mask, 28);
        assert!(net.validate().is_ok());
    }

    #[test]
    fn test_subnet_type_parse() {
        assert_eq!(SubnetType::parse("public"), Some(SubnetType::Public));
        assert_eq!(
            SubnetType::parse("private_with_egress"),
            Some(SubnetType::PrivateWithEgress)
        );
        assert_eq!(SubnetType::parse("ISOLATED"), Some(SubnetType::Isolated));
        assert_eq!(SubnetType::parse("dmz"), None);
    }

    #[test]
    fn test_zones_for_group_override() {
        let mut net = NetworkSpec::default();
        net.subnet_groups[1].availability_zones =
            Some(vec!["us-east-1c".to_string(), "us-east-1a".to_string()]);
        let firewall = net.group("Firewall").unwrap();
        assert_eq!(net.zones_for(firewall), vec!["us-east-1c", "us-east-1a"]);
        assert!(net.validate().is_ok());
    }

    #[test]
    fn test_unknown_group_zone_rejected() {
        let mut net = NetworkSpec::default();
        net.subnet_groups[0].availability_zones = Some(vec!["us-west-2a".to_string()]);
        assert!(net.validate().is_err());
    }

    #[test]
    fn test_private_requires_public() {
        let net = NetworkSpec {
            subnet_groups: vec![SubnetGroupSpec::new(
                "Egress",
                SubnetType::PrivateWithEgress,
                24,
            )],
            ..Default::default()
        };
        assert!(net.validate().is_err());
    }

    #[test]
    fn test_cidr_mask_bounds() {
        let mut net = NetworkSpec::default();
        net.subnet_groups[0].cidr_mask = 29;
        assert!(net.validate().is_err());
        net.subnet_groups[0].cidr_mask = 15;
        assert!(net.validate().is_err());
    }

    #[test]
    fn test_duplicate_zone_rejected() {
        let net = NetworkSpec {
            availability_zones: vec!["us-east-1a".to_string(), "us-east-1a".to_string()],
            ..Default::default()
        };
        assert!(matches!(net.validate(), Err(SpecError::Duplicate(_))));
    }

    #[test]
    fn test_duplicate_group_zone_rejected() {
        let mut net = NetworkSpec::default();
        net.subnet_groups[1].availability_zones =
            Some(vec!["us-east-1a".to_string(), "us-east-1a".to_string()]);
        assert!(matches!(
            net.validate(),
            Err(SpecError::Duplicate(ref what)) if what.contains("Firewall")
        ));
    }
}
