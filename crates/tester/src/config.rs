use std::path::Path;

use anyhow::{Context, Result};
use oscport::PortConfig;

pub fn load_port_config(path: &Path) -> Result<PortConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_yaml::from_str(&content).with_context(|| format!("Invalid config {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use oscport::ReceiveMode;

    #[test]
    fn loads_partial_file() {
        let path = std::env::temp_dir().join(format!("osc-tester-{}.yaml", std::process::id()));
        std::fs::write(&path, "local_port: 9100\nreceive_mode: poll\n").unwrap();
        let config = load_port_config(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(config.local_port, 9100);
        assert_eq!(config.receive_mode, ReceiveMode::Poll);
        assert_eq!(config.limit_receive_buffer, 10);
    }

    #[test]
    fn missing_file_is_an_error() {
        assert!(load_port_config(Path::new("/nonexistent/osc.yaml")).is_err());
    }
}
