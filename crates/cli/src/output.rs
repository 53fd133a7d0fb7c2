// Output formatting for the load report

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
    Yaml,
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            "yaml" => Ok(OutputFormat::Yaml),
            other => Err(format!("unknown output format: {}", other)),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OutputFormat::Text => "text",
            OutputFormat::Json => "json",
            OutputFormat::Yaml => "yaml",
        };
        f.write_str(name)
    }
}

impl OutputFormat {
    /// Render a value in a structured format; `None` for text, which the
    /// caller lays out itself
    pub fn render<T: Serialize>(&self, value: &T) -> anyhow::Result<Option<String>> {
        match self {
            OutputFormat::Json => Ok(Some(serde_json::to_string_pretty(value)?)),
            OutputFormat::Yaml => Ok(Some(serde_yaml::to_string(value)?)),
            OutputFormat::Text => Ok(None),
        }
    }

    pub fn is_text(&self) -> bool {
        matches!(self, OutputFormat::Text)
    }
}

/// Print a simple key-value pair for text output
pub fn print_field(label: &str, value: impl fmt::Display) {
    println!("{:<22} {}", format!("{}:", label), value);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Serialize)]
    struct Sample {
        accepted: u64,
    }

    #[test]
    fn test_parse_formats() {
        assert_eq!("json".parse::<OutputFormat>(), Ok(OutputFormat::Json));
        assert_eq!("yaml".parse::<OutputFormat>(), Ok(OutputFormat::Yaml));
        assert_eq!("text".parse::<OutputFormat>(), Ok(OutputFormat::Text));
        assert!("xml".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn test_render() {
        let sample = Sample { accepted: 3 };

        let json = OutputFormat::Json.render(&sample).unwrap().unwrap();
        assert!(json.contains("\"accepted\": 3"));

        let yaml = OutputFormat::Yaml.render(&sample).unwrap().unwrap();
        assert_eq!(yaml.trim(), "accepted: 3");

        assert!(OutputFormat::Text.render(&sample).unwrap().is_none());
        assert!(OutputFormat::Text.is_text());
        assert!(!OutputFormat::Json.is_text());
    }
}
