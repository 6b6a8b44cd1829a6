//! HTML report rendering
//!
//! A report is produced either from an external template or from the
//! embedded skeleton; both go through the same region replacement.

pub mod fragments;
pub mod skeleton;
pub mod template;

pub use fragments::ReportView;
pub use template::{locate_region, replace_region, verify_structure, Region};

use crate::errors::ErrorContext;
use crate::output::{write_file, OutputConfig};
use crate::prelude::*;
use std::path::Path;
use tracing::debug;

/// Fills the dynamic regions of a report document
#[derive(Debug, Clone, Copy, Default)]
pub struct TemplateRenderer;

impl TemplateRenderer {
    pub fn new() -> Self {
        Self
    }

    pub fn load_template(&self, path: &Path) -> Result<String> {
        let template = std::fs::read_to_string(path).with_file_context(path)?;
        verify_structure(&template, &Region::ALL).map_err(|e| ReportError::FileProcessing {
            file_path: path.to_path_buf(),
            cause: e.to_string(),
        })?;
        Ok(template)
    }

    /// Content generated for one region
    pub fn region_content(&self, region: Region, view: &ReportView<'_>) -> String {
        match region {
            Region::Timestamp => fragments::timestamp_line(&view.generated_at),
            Region::SummaryGrid => fragments::summary_cards(view),
            Region::UserCount => fragments::user_count_sentence(view.records.len()),
            Region::TableBody => fragments::table_rows(view.records, view.policy),
            Region::Footer => fragments::footer_line(&view.generated_at),
            Region::FilterOptions => fragments::filter_options(view.records),
        }
    }

    /// Replace every region of `template`; missing required anchors are errors
    pub fn render(&self, template: &str, view: &ReportView<'_>) -> Result<String> {
        verify_structure(template, &Region::ALL)?;

        let mut document = template.to_string();
        for region in Region::ALL {
            if !region.is_required() && locate_region(&document, region)?.is_none() {
                debug!(region = %region, "optional region absent from template");
                continue;
            }
            let content = self.region_content(region, view);
            document = replace_region(&document, region, &content)?;
        }

        verify_structure(&document, &Region::ALL)?;
        Ok(document)
    }

    /// Render the embedded self-contained document
    pub fn render_skeleton(&self, view: &ReportView<'_>) -> Result<String> {
        self.render(skeleton::SKELETON, view)
    }

    /// Render from `template` (or the skeleton) and write to `path`
    pub fn render_to_path(
        &self,
        template: Option<&str>,
        view: &ReportView<'_>,
        path: &Path,
        config: &OutputConfig,
    ) -> Result<()> {
        let document = match template {
            Some(template) => self.render(template, view)?,
            None => self.render_skeleton(view)?,
        };
        write_file(path, document.as_bytes(), config)
    }
}
