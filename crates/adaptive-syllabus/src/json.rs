//! JSON export of a course syllabus.
//!
//! # Example
//!
//! ```rust
//! use adaptive_store::{CourseContent, CourseModule, SkillLevel, StylePreference};
//! use adaptive_syllabus::json::JsonGenerator;
//! use adaptive_syllabus::Syllabus;
//!
//! let content = CourseContent::new("Rust", vec![CourseModule::new("Intro", "Hello.")]);
//! let syllabus = Syllabus::from_content(content, SkillLevel::Beginner, StylePreference::Pdf).unwrap();
//!
//! let generator = JsonGenerator::new(&syllabus);
//! let compact = generator.generate().unwrap();
//! assert!(compact.contains(r#""skillLevel":"Beginner""#));
//! ```

use std::fs::File;
use std::io::Write;
use std::path::Path;

use crate::{Result, Syllabus, SyllabusError};

/// Serializes a [`Syllabus`] to JSON.
pub struct JsonGenerator<'a> {
    syllabus: &'a Syllabus,
}

impl<'a> JsonGenerator<'a> {
    /// Creates a generator for the given syllabus.
    #[must_use]
    pub const fn new(syllabus: &'a Syllabus) -> Self {
        Self { syllabus }
    }

    /// Generates single-line JSON.
    pub fn generate(&self) -> Result<String> {
        serde_json::to_string(self.syllabus).map_err(SyllabusError::from)
    }

    /// Generates JSON with two-space indentation.
    pub fn generate_pretty(&self) -> Result<String> {
        serde_json::to_string_pretty(self.syllabus).map_err(SyllabusError::from)
    }

    /// Writes the JSON to `path`, creating or truncating it. Parent
    /// directories must exist.
    ///
    /// # Errors
    ///
    /// Returns [`SyllabusError::Io`] if the file cannot be written.
    pub fn write_to_file(&self, path: &Path, pretty: bool) -> Result<()> {
        let json = if pretty {
            self.generate_pretty()?
        } else {
            self.generate()?
        };

        let mut file = File::create(path)?;
        file.write_all(json.as_bytes())?;

        Ok(())
    }
}
