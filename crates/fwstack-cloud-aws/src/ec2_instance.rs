//! EC2 instance construct

use crate::error::{AwsError, Result};
use crate::role::RoleRef;
use crate::vpc::Vpc;
use crate::{construct_path, name_tags};
use fwstack_cloud::{Construct, ConstructPath, Parameter, ResourceRef, Stack};
use fwstack_core::InstanceSpec;
use serde_json::json;

/// CloudFormation type of an SSM parameter holding an AMI ID
pub const IMAGE_PARAMETER_TYPE: &str = "AWS::SSM::Parameter::Value<AWS::EC2::Image::Id>";

/// A declared EC2 instance with its security group and instance profile
#[derive(Debug, Clone)]
pub struct Ec2Instance {
    path: ConstructPath,
    instance: ResourceRef,
    security_group: ResourceRef,
    instance_profile: ResourceRef,
    availability_zone: String,
}

impl Ec2Instance {
    /// Declare an instance in the first subnet of `spec.subnet_group`
    ///
    /// The image ID is resolved at deploy time from the public SSM parameter of
    /// the image family, declared once per stack as a template parameter.
    pub fn new(
        stack: &mut Stack,
        scope: Option<&ConstructPath>,
        id: &str,
        vpc: &Vpc,
        role: &RoleRef,
        spec: &InstanceSpec,
    ) -> Result<Self> {
        spec.validate()?;
        let subnet = vpc
            .select_subnets(&spec.subnet_group)?
            .into_iter()
            .next()
            .ok_or_else(|| AwsError::EmptySubnetGroup(spec.subnet_group.clone()))?;

        let path = construct_path(scope, id)?;
        stack.register(&path)?;

        let ssm_path = spec.image.ssm_parameter();
        let parameter_id: String = format!("SsmParameterValue{}", ssm_path)
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect();
        let image_id = stack.add_parameter(
            &parameter_id,
            Parameter::new(IMAGE_PARAMETER_TYPE).with_default(ssm_path),
        )?;

        let security_group = stack.add_resource(
            path.child("InstanceSecurityGroup")?,
            "AWS::EC2::SecurityGroup",
            json!({
                "GroupDescription": format!("{}/{}", stack.name(), path),
                "SecurityGroupEgress": [{
                    "CidrIp": "0.0.0.0/0",
                    "Description": "Allow all outbound traffic by default",
                    "IpProtocol": "-1",
                }],
                "Tags": name_tags(stack, &path),
                "VpcId": vpc.vpc_id(),
            }),
        )?;

        let instance_profile = stack.add_resource(
            path.child("InstanceProfile")?,
            "AWS::IAM::InstanceProfile",
            json!({ "Roles": [role.role_name()] }),
        )?;

        let instance = stack.add_resource(
            path.child("Default")?,
            "AWS::EC2::Instance",
            json!({
                "AvailabilityZone": subnet.availability_zone(),
                "BlockDeviceMappings": [{
                    "DeviceName": spec.device_name,
                    "Ebs": {
                        "VolumeSize": spec.volume_size,
                        "VolumeType": spec.volume_type.as_str(),
                    },
                }],
                "IamInstanceProfile": instance_profile.ref_token(),
                "ImageId": image_id,
                "InstanceType": spec.instance_type,
                "PropagateTagsToVolumeOnCreation": spec.propagate_tags_to_volume,
                "SecurityGroupIds": [security_group.attr("GroupId")],
                "SubnetId": subnet.subnet_id(),
                "Tags": name_tags(stack, &path),
            }),
        )?;
        if let Some(role_resource) = role.resource() {
            stack.add_dependency(&instance, role_resource)?;
        }

        tracing::debug!(
            instance = %path,
            subnet = %subnet.path(),
            az = %subnet.availability_zone(),
            "Declared EC2 instance"
        );

        Ok(Self {
            path,
            instance,
            security_group,
            instance_profile,
            availability_zone: subnet.availability_zone().to_string(),
        })
    }

    pub fn instance(&self) -> &ResourceRef {
        &self.instance
    }

    pub fn security_group(&self) -> &ResourceRef {
        &self.security_group
    }

    pub fn instance_profile(&self) -> &ResourceRef {
        &self.instance_profile
    }

    pub fn availability_zone(&self) -> &str {
        &self.availability_zone
    }
}

impl Construct for Ec2Instance {
    fn path(&self) -> &ConstructPath {
        &self.path
    }
}
