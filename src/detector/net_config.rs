use crate::Errors;
use anyhow::Result;
use std::fs;
use std::path::Path;

/// Network parameters read from a darknet-style `.cfg` file
///
/// Only the `[net]` (or `[network]`) section is read; layer sections are described by the
/// serialized network itself.
///
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NetConfig {
    pub width: u32,
    pub height: u32,
}

impl NetConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            Errors::NetworkConfig(path.display().to_string(), e.to_string())
        })?;
        Self::parse(&content)
            .map_err(|e| Errors::NetworkConfig(path.display().to_string(), e).into())
    }

    /// Parses the config content
    ///
    pub fn parse(content: &str) -> std::result::Result<Self, String> {
        let mut in_net = false;
        let mut width = None;
        let mut height = None;

        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
                continue;
            }

            if line.starts_with('[') {
                if in_net {
                    break;
                }
                in_net = matches!(line, "[net]" | "[network]");
                continue;
            }

            if !in_net {
                continue;
            }

            if let Some((key, value)) = line.split_once('=') {
                let parsed = || {
                    value
                        .trim()
                        .parse::<u32>()
                        .ok()
                        .filter(|v| *v > 0)
                        .ok_or_else(|| format!("`{}` must be a positive integer", key.trim()))
                };
                match key.trim() {
                    "width" => width = Some(parsed()?),
                    "height" => height = Some(parsed()?),
                    _ => {}
                }
            }
        }

        match (width, height) {
            (Some(width), Some(height)) => Ok(Self { width, height }),
            _ => Err("the [net] section must define `width` and `height`".to_string()),
        }
    }
}
