//! network ノードのパース

use super::{arg_int, arg_str, args_str, prop_int, required_name};
use crate::error::{Result, SpecError};
use crate::model::{NetworkSpec, SubnetGroupSpec, SubnetType};
use ipnetwork::Ipv4Network;
use kdl::KdlNode;

/// network ノードをパース
///
/// subnet ノードが1つでもあれば、デフォルトのサブネットグループを置き換えます。
pub fn parse_network(node: &KdlNode, region: &str) -> Result<NetworkSpec> {
    let mut network = NetworkSpec::for_region(region);
    let mut groups = Vec::new();

    if let Some(children) = node.children() {
        for child in children.nodes() {
            match child.name().value() {
                "cidr" => {
                    let cidr = arg_str(child).ok_or_else(|| {
                        SpecError::InvalidConfig("cidr requires a value".to_string())
                    })?;
                    network.cidr = cidr
                        .parse::<Ipv4Network>()
                        .map_err(|_| SpecError::InvalidCidr(cidr.to_string()))?;
                }
                "availability_zones" | "availability-zones" | "azs" => {
                    network.availability_zones = args_str(child);
                }
                "nat_gateways" | "nat-gateways" => {
                    network.nat_gateways = arg_int(child)?;
                }
                "subnet" => {
                    groups.push(parse_subnet(child)?);
                }
                other => {
                    tracing::warn!(node = %other, "Unknown network setting, skipping");
                }
            }
        }
    }

    if !groups.is_empty() {
        network.subnet_groups = groups;
    }
    Ok(network)
}

/// subnet ノードをパース
///
/// 例: subnet "Egress" type="private-with-egress" cidr-mask=24
fn parse_subnet(node: &KdlNode) -> Result<SubnetGroupSpec> {
    let name = required_name(node)?;

    let type_str = node
        .get("type")
        .and_then(|v| v.as_string())
        .ok_or_else(|| SpecError::InvalidConfig(format!("subnet '{}' requires type=", name)))?;
    let subnet_type = SubnetType::parse(type_str).ok_or_else(|| {
        SpecError::InvalidConfig(format!(
            "subnet '{}': 不明なサブネットタイプ '{}' (public, private-with-egress, isolated)",
            name, type_str
        ))
    })?;

    let cidr_mask = match prop_int::<u8>(node, "cidr-mask")? {
        Some(mask) => mask,
        None => prop_int::<u8>(node, "cidr_mask")?.unwrap_or(24),
    };

    let mut group = SubnetGroupSpec::new(name, subnet_type, cidr_mask);

    if let Some(children) = node.children() {
        for child in children.nodes() {
            match child.name().value() {
                "availability_zones" | "availability-zones" | "azs" => {
                    group.availability_zones = Some(args_str(child));
                }
                other => {
                    tracing::warn!(node = %other, "Unknown subnet setting, skipping");
                }
            }
        }
    }

    Ok(group)
}
