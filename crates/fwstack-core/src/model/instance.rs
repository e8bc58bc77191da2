//! コンピュートインスタンスモデル

use crate::error::{Result, SpecError};
use serde::{Deserialize, Serialize};

/// マシンイメージの種類
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ImageFamily {
    #[default]
    AmazonLinux2,
    AmazonLinux2023,
}

impl ImageFamily {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "amazon-linux-2" | "amazon_linux_2" | "al2" => Some(ImageFamily::AmazonLinux2),
            "amazon-linux-2023" | "amazon_linux_2023" | "al2023" => {
                Some(ImageFamily::AmazonLinux2023)
            }
            _ => None,
        }
    }

    /// 最新AMI IDを公開している SSM パラメータ
    pub fn ssm_parameter(&self) -> &'static str {
        match self {
            ImageFamily::AmazonLinux2 => {
                "/aws/service/ami-amazon-linux-latest/amzn2-ami-hvm-x86_64-gp2"
            }
            ImageFamily::AmazonLinux2023 => {
                "/aws/service/ami-amazon-linux-latest/al2023-ami-kernel-default-x86_64"
            }
        }
    }
}

/// EBS ボリュームタイプ
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VolumeType {
    Standard,
    Gp2,
    #[default]
    Gp3,
    Io1,
    Io2,
    St1,
    Sc1,
}

impl VolumeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            VolumeType::Standard => "standard",
            VolumeType::Gp2 => "gp2",
            VolumeType::Gp3 => "gp3",
            VolumeType::Io1 => "io1",
            VolumeType::Io2 => "io2",
            VolumeType::St1 => "st1",
            VolumeType::Sc1 => "sc1",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "standard" => Some(VolumeType::Standard),
            "gp2" => Some(VolumeType::Gp2),
            "gp3" => Some(VolumeType::Gp3),
            "io1" => Some(VolumeType::Io1),
            "io2" => Some(VolumeType::Io2),
            "st1" => Some(VolumeType::St1),
            "sc1" => Some(VolumeType::Sc1),
            _ => None,
        }
    }
}

/// インスタンス設定
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceSpec {
    /// インスタンスタイプ（t3.micro など）
    pub instance_type: String,

    pub image: ImageFamily,

    /// ルートボリュームサイズ (GiB)
    pub volume_size: u32,

    pub volume_type: VolumeType,

    pub device_name: String,

    /// 配置先サブネットグループ
    pub subnet_group: String,

    /// IAMロール名（role ノード名、または既存ロール名）
    /// 未指定時はインスタンス専用のロールを作成
    pub role: Option<String>,

    pub propagate_tags_to_volume: bool,
}

impl Default for InstanceSpec {
    fn default() -> Self {
        Self {
            instance_type: "t3.micro".to_string(),
            image: ImageFamily::AmazonLinux2,
            volume_size: 8,
            volume_type: VolumeType::Gp3,
            device_name: "/dev/xvda".to_string(),
            subnet_group: "Egress".to_string(),
            role: None,
            propagate_tags_to_volume: true,
        }
    }
}

impl InstanceSpec {
    pub fn validate(&self) -> Result<()> {
        let valid_type = self
            .instance_type
            .split_once('.')
            .map(|(family, size)| {
                !family.is_empty()
                    && !size.is_empty()
                    && family.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
                    && size.chars().all(|c| c.is_ascii_alphanumeric())
            })
            .unwrap_or(false);
        if !valid_type {
            return Err(SpecError::InvalidConfig(format!(
                "無効なインスタンスタイプ: '{}'",
                self.instance_type
            )));
        }
        if self.volume_size == 0 || self.volume_size > 16_384 {
            return Err(SpecError::InvalidConfig(format!(
                "volume-size は 1〜16384 GiB で指定してください (指定値: {})",
                self.volume_size
            )));
        }
        if !self.device_name.starts_with("/dev/") {
            return Err(SpecError::InvalidConfig(format!(
                "無効なデバイス名: '{}'",
                self.device_name
            )));
        }
        Ok(())
    }
}

/// IAMロール設定
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleSpec {
    /// AWS管理ポリシー名
    pub managed_policies: Vec<String>,
}

impl Default for RoleSpec {
    fn default() -> Self {
        Self {
            managed_policies: vec!["AmazonSSMManagedInstanceCore".to_string()],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instance_defaults() {
        let spec = InstanceSpec::default();
        assert_eq!(spec.instance_type, "t3.micro");
        assert_eq!(spec.volume_size, 8);
        assert_eq!(spec.volume_type, VolumeType::Gp3);
        assert_eq!(spec.device_name, "/dev/xvda");
        assert_eq!(spec.subnet_group, "Egress");
        assert!(spec.propagate_tags_to_volume);
        assert!(spec.validate().is_ok());
    }

    #[test]
    fn test_invalid_instance_type() {
        for bad in ["t3", ".micro", "t3.", "t3 micro"] {
            let spec = InstanceSpec {
                instance_type: bad.to_string(),
                ..Default::default()
            };
            assert!(spec.validate().is_err(), "{} should be rejected", bad);
        }
    }

    #[test]
    fn test_image_family() {
        assert_eq!(ImageFamily::parse("al2023"), Some(ImageFamily::AmazonLinux2023));
        assert!(
            ImageFamily::AmazonLinux2
                .ssm_parameter()
                .ends_with("amzn2-ami-hvm-x86_64-gp2")
        );
    }

    #[test]
    fn test_volume_type_parse() {
        assert_eq!(VolumeType::parse("GP3"), Some(VolumeType::Gp3));
        assert_eq!(VolumeType::parse("ssd"), None);
        assert_eq!(VolumeType::Io2.as_str(), "io2");
    }
}
