//! instance / role ノードのパース

use super::{arg_bool, arg_int, arg_str, args_str, required_name};
use crate::error::{Result, SpecError};
use crate::model::{ImageFamily, InstanceSpec, RoleSpec, VolumeType};
use kdl::KdlNode;

/// instance ノードをパース
pub fn parse_instance(node: &KdlNode) -> Result<(String, InstanceSpec)> {
    let name = required_name(node)?;
    let mut instance = InstanceSpec::default();

    if let Some(children) = node.children() {
        for child in children.nodes() {
            match child.name().value() {
                "instance_type" | "instance-type" | "type" => {
                    if let Some(value) = arg_str(child) {
                        instance.instance_type = value.to_string();
                    }
                }
                "image" => {
                    if let Some(value) = arg_str(child) {
                        instance.image = ImageFamily::parse(value).ok_or_else(|| {
                            SpecError::InvalidConfig(format!(
                                "instance '{}': 不明なイメージ '{}'",
                                name, value
                            ))
                        })?;
                    }
                }
                "volume_size" | "volume-size" => {
                    if let Some(size) = arg_int(child)? {
                        instance.volume_size = size;
                    }
                }
                "volume_type" | "volume-type" => {
                    if let Some(value) = arg_str(child) {
                        instance.volume_type = VolumeType::parse(value).ok_or_else(|| {
                            SpecError::InvalidConfig(format!(
                                "instance '{}': 不明なボリュームタイプ '{}'",
                                name, value
                            ))
                        })?;
                    }
                }
                "device_name" | "device-name" => {
                    if let Some(value) = arg_str(child) {
                        instance.device_name = value.to_string();
                    }
                }
                "subnet_group" | "subnet-group" => {
                    if let Some(value) = arg_str(child) {
                        instance.subnet_group = value.to_string();
                    }
                }
                "role" => {
                    instance.role = arg_str(child).map(str::to_string);
                }
                "propagate_tags" | "propagate-tags" => {
                    instance.propagate_tags_to_volume = arg_bool(child).unwrap_or(true);
                }
                other => {
                    tracing::warn!(node = %other, "Unknown instance setting, skipping");
                }
            }
        }
    }

    Ok((name, instance))
}

/// role ノードをパース
///
/// managed-policy を省略した場合は AmazonSSMManagedInstanceCore のみを付与します。
pub fn parse_role(node: &KdlNode) -> Result<(String, RoleSpec)> {
    let name = required_name(node)?;
    let mut policies = Vec::new();

    if let Some(children) = node.children() {
        for child in children.nodes() {
            match child.name().value() {
                "managed_policy" | "managed-policy" => {
                    policies.extend(args_str(child));
                }
                other => {
                    tracing::warn!(node = %other, "Unknown role setting, skipping");
                }
            }
        }
    }

    let role = if policies.is_empty() {
        RoleSpec::default()
    } else {
        RoleSpec {
            managed_policies: policies,
        }
    };
    Ok((name, role))
}
