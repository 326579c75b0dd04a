//! Markdown export of a course syllabus.
//!
//! The document has a title, a summary table (skill level, learning style,
//! module count, estimated hours), one section per module, and a footer with
//! the course timestamps.

use std::fmt::Write;

use chrono::{DateTime, Utc};

use crate::Syllabus;

/// Renders a [`Syllabus`] as Markdown.
pub struct MarkdownGenerator<'a> {
    syllabus: &'a Syllabus,
}

impl<'a> MarkdownGenerator<'a> {
    /// Creates a generator for the given syllabus.
    #[must_use]
    pub const fn new(syllabus: &'a Syllabus) -> Self {
        Self { syllabus }
    }

    /// Generates the complete Markdown document.
    #[must_use]
    pub fn generate(&self) -> String {
        let mut output = String::new();

        self.write_title(&mut output);
        self.write_summary(&mut output);
        self.write_modules(&mut output);
        self.write_footer(&mut output);

        output
    }

    fn write_title(&self, output: &mut String) {
        let _ = writeln!(output, "# {}\n", escape_markdown(&self.syllabus.title));
    }

    fn write_summary(&self, output: &mut String) {
        let hours = self
            .syllabus
            .estimated_hours
            .map_or_else(|| "Not estimated".to_string(), |h| h.to_string());

        let _ = writeln!(output, "## Summary\n");
        let _ = writeln!(output, "| Field | Value |");
        let _ = writeln!(output, "|-------|-------|");
        let _ = writeln!(output, "| Skill Level | {} |", self.syllabus.skill_level);
        let _ = writeln!(
            output,
            "| Learning Style | {} |",
            self.syllabus.style_preference
        );
        let _ = writeln!(output, "| Modules | {} |", self.syllabus.module_count());
        let _ = writeln!(output, "| Estimated Hours | {hours} |");
        let _ = writeln!(output);
    }

    fn write_modules(&self, output: &mut String) {
        let _ = writeln!(output, "## Modules\n");

        for (index, module) in self.syllabus.modules.iter().enumerate() {
            let _ = writeln!(
                output,
                "### {}. {}\n",
                index + 1,
                escape_markdown(&module.title)
            );
            let content = module.content.trim();
            if content.is_empty() {
                let _ = writeln!(output, "*No lesson content yet.*\n");
            } else {
                let _ = writeln!(output, "{content}\n");
            }
        }
    }

    /// Timestamps come from the record, so unsaved courses get no date line.
    fn write_footer(&self, output: &mut String) {
        let _ = writeln!(output, "---");
        match (self.syllabus.created_at, self.syllabus.updated_at) {
            (Some(created), Some(updated)) => {
                let _ = writeln!(
                    output,
                    "*Created {}, last updated {}*",
                    format_timestamp(&created),
                    format_timestamp(&updated)
                );
            }
            (Some(created), None) => {
                let _ = writeln!(output, "*Created {}*", format_timestamp(&created));
            }
            _ => {
                let _ = writeln!(output, "*Generated course, not yet saved*");
            }
        }
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Format: "YYYY-MM-DD HH:MM:SS UTC"
fn format_timestamp(dt: &DateTime<Utc>) -> String {
    dt.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

/// Escapes Markdown control characters in titles and table cells.
fn escape_markdown(text: &str) -> String {
    let mut result = String::with_capacity(text.len());

    for ch in text.chars() {
        match ch {
            '*' | '_' | '`' | '#' | '[' | ']' | '\\' | '<' | '>' | '|' => {
                result.push('\\');
                result.push(ch);
            }
            '\n' => result.push(' '),
            _ => result.push(ch),
        }
    }

    result
}

// ============================================================================
// Tests
// ============================================================================
