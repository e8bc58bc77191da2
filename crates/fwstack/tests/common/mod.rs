use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

/// 2 AZ の egress 検査スタック
pub const EGRESS_STACK: &str = r#"
stack "egress-inspection" {
    description "Egress inspection"
    region "us-east-1"
}

role "InstanceRole" {
    managed-policy "AmazonSSMManagedInstanceCore"
}

firewall

instance "Ec2Instance" {
    role "InstanceRole"
}
"#;

pub struct TestProject {
    pub root: TempDir,
}

impl TestProject {
    pub fn new() -> Self {
        let root = tempfile::tempdir().unwrap();
        Self { root }
    }

    pub fn write_stack_kdl(&self, content: &str) {
        self.write_file("fwstack.kdl", content);
    }

    pub fn write_file(&self, name: &str, content: &str) {
        let path = self.root.path().join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, content).unwrap();
    }

    pub fn path(&self) -> PathBuf {
        self.root.path().to_path_buf()
    }
}
