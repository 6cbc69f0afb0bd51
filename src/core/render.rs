//! Renderer module
//!
//! Renders a dry-run plan to different output formats: jsonl, json, md

use crate::core::model::PlanItem;
use std::io::Write;

/// Output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Jsonl,
    Json,
    Markdown,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "jsonl" => Ok(OutputFormat::Jsonl),
            "json" => Ok(OutputFormat::Json),
            "md" | "markdown" => Ok(OutputFormat::Markdown),
            _ => Err(format!("Unknown format: {}", s)),
        }
    }
}

/// Render configuration combining format and options
#[derive(Debug, Clone, Copy, Default)]
pub struct RenderConfig {
    pub format: OutputFormat,
    pub pretty: bool,
}

impl RenderConfig {
    /// Create a new render config with pretty option
    pub fn with_pretty(format: OutputFormat, pretty: bool) -> Self {
        Self { format, pretty }
    }
}

/// Renderer for dry-run plans
pub struct Renderer {
    config: RenderConfig,
}

impl Renderer {
    /// Create a new renderer with render config
    pub fn with_config(config: RenderConfig) -> Self {
        Self { config }
    }

    /// Render a plan to a string
    pub fn render(&self, plan: &[PlanItem]) -> String {
        match self.config.format {
            OutputFormat::Jsonl => self.render_jsonl(plan),
            OutputFormat::Json => self.render_json(plan),
            OutputFormat::Markdown => self.render_markdown(plan),
        }
    }

    /// Render to a writer, with a trailing newline
    pub fn render_to<W: Write>(&self, plan: &[PlanItem], mut writer: W) -> std::io::Result<()> {
        let output = self.render(plan);
        writer.write_all(output.as_bytes())?;
        if !output.is_empty() && !output.ends_with('\n') {
            writer.write_all(b"\n")?;
        }
        writer.flush()
    }

    /// Render as JSON Lines (one JSON object per line)
    fn render_jsonl(&self, plan: &[PlanItem]) -> String {
        plan.iter()
            .filter_map(|item| {
                if self.config.pretty {
                    serde_json::to_string_pretty(item).ok()
                } else {
                    serde_json::to_string(item).ok()
                }
            })
            .collect::<Vec<_>>()
            .join(if self.config.pretty { "\n\n" } else { "\n" })
    }

    /// Render as a single JSON array
    fn render_json(&self, plan: &[PlanItem]) -> String {
        if self.config.pretty {
            serde_json::to_string_pretty(plan).unwrap_or_else(|_| "[]".to_string())
        } else {
            serde_json::to_string(plan).unwrap_or_else(|_| "[]".to_string())
        }
    }

    /// Render as Markdown
    fn render_markdown(&self, plan: &[PlanItem]) -> String {
        let mut output = String::from("## Packing plan\n\n");
        if plan.is_empty() {
            output.push_str("_No files selected._\n");
            return output;
        }

        output.push_str("| # | Path | Priority | Size |\n");
        output.push_str("|---|------|----------|------|\n");
        for (i, item) in plan.iter().enumerate() {
            output.push_str(&format!(
                "| {} | `{}` | {} | {} {} |\n",
                i + 1,
                item.path,
                item.priority,
                item.size,
                item.unit
            ));
        }
        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plan() -> Vec<PlanItem> {
        vec![
            PlanItem {
                path: "src/main.rs".to_string(),
                priority: 10,
                size: 120,
                unit: "bytes",
            },
            PlanItem {
                path: "README.md".to_string(),
                priority: 0,
                size: 40,
                unit: "bytes",
            },
        ]
    }

    #[test]
    fn test_render_jsonl() {
        let renderer = Renderer::with_config(RenderConfig::default());
        let output = renderer.render(&plan());
        let lines: Vec<_> = output.lines().collect();
        assert_eq!(lines.len(), 2);
        let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["path"], "src/main.rs");
        assert_eq!(first["priority"], 10);
    }

    #[test]
    fn test_render_json() {
        let renderer = Renderer::with_config(RenderConfig::with_pretty(OutputFormat::Json, false));
        let output = renderer.render(&plan());
        let parsed: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(parsed.as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_render_json_pretty() {
        let renderer = Renderer::with_config(RenderConfig::with_pretty(OutputFormat::Json, true));
        let output = renderer.render(&plan());
        assert!(output.contains("\n  "));
    }

    #[test]
    fn test_render_jsonl_pretty() {
        let renderer = Renderer::with_config(RenderConfig::with_pretty(OutputFormat::Jsonl, true));
        let output = renderer.render(&plan());
        assert!(output.contains("\n\n"));
    }

    #[test]
    fn test_render_markdown() {
        let renderer =
            Renderer::with_config(RenderConfig::with_pretty(OutputFormat::Markdown, false));
        let output = renderer.render(&plan());
        assert!(output.contains("| 1 | `src/main.rs` | 10 | 120 bytes |"));
        assert!(output.contains("| 2 | `README.md` | 0 | 40 bytes |"));
    }

    #[test]
    fn test_render_markdown_empty() {
        let renderer =
            Renderer::with_config(RenderConfig::with_pretty(OutputFormat::Markdown, false));
        assert!(renderer.render(&[]).contains("No files selected"));
    }

    #[test]
    fn test_output_format_parse() {
        assert_eq!("jsonl".parse::<OutputFormat>().unwrap(), OutputFormat::Jsonl);
        assert_eq!("JSON".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
        assert_eq!("md".parse::<OutputFormat>().unwrap(), OutputFormat::Markdown);
        assert!("raw".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn test_render_to_writer() {
        let renderer = Renderer::with_config(RenderConfig::default());
        let mut buf = Vec::new();
        renderer.render_to(&plan(), &mut buf).unwrap();
        assert!(buf.ends_with(b"\n"));
    }
}
