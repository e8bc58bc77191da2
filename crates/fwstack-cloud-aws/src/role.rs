//! IAM role construct

use crate::construct_path;
use crate::error::Result;
use fwstack_cloud::{Construct, ConstructPath, ResourceRef, Stack, Token};
use fwstack_core::RoleSpec;
use serde_json::{Value, json};

/// Service principal allowed to assume instance roles
pub const EC2_SERVICE_PRINCIPAL: &str = "ec2.amazonaws.com";

/// A declared IAM role
#[derive(Debug, Clone)]
pub struct Role {
    path: ConstructPath,
    role: ResourceRef,
}

impl Role {
    pub fn new(
        stack: &mut Stack,
        scope: Option<&ConstructPath>,
        id: &str,
        spec: &RoleSpec,
    ) -> Result<Self> {
        let path = construct_path(scope, id)?;
        stack.register(&path)?;

        let policies: Vec<Value> = spec
            .managed_policies
            .iter()
            .map(|name| managed_policy_arn(name))
            .collect();

        let role = stack.add_resource(
            path.child("Default")?,
            "AWS::IAM::Role",
            json!({
                "AssumeRolePolicyDocument": {
                    "Statement": [{
                        "Action": "sts:AssumeRole",
                        "Effect": "Allow",
                        "Principal": { "Service": EC2_SERVICE_PRINCIPAL },
                    }],
                    "Version": "2012-10-17",
                },
                "ManagedPolicyArns": policies,
            }),
        )?;

        Ok(Self { path, role })
    }

    pub fn resource(&self) -> &ResourceRef {
        &self.role
    }

    /// Handle for consumers of the role
    pub fn role_ref(&self) -> RoleRef {
        RoleRef {
            name: self.role.ref_token(),
            resource: Some(self.role.clone()),
        }
    }
}

impl Construct for Role {
    fn path(&self) -> &ConstructPath {
        &self.path
    }
}

/// A role handed to other constructs: declared in this stack or imported by name
#[derive(Debug, Clone, PartialEq)]
pub struct RoleRef {
    name: Token,
    resource: Option<ResourceRef>,
}

impl RoleRef {
    /// Reference an existing role by name
    pub fn imported(name: impl Into<String>) -> Self {
        Self {
            name: Token::literal(name.into()),
            resource: None,
        }
    }

    /// Role name (a `Ref` for declared roles)
    pub fn role_name(&self) -> &Token {
        &self.name
    }

    /// Declared role resource, `None` for imported roles
    pub fn resource(&self) -> Option<&ResourceRef> {
        self.resource.as_ref()
    }
}

/// `arn:${AWS::Partition}:iam::aws:policy/<name>`
fn managed_policy_arn(name: &str) -> Value {
    json!({
        "Fn::Join": ["", ["arn:", { "Ref": "AWS::Partition" }, ":iam::aws:policy/", name]]
    })
}
