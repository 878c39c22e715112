//! Rendering of the final build result

use crate::events::status_style;
use comfy_table::{presets::UTF8_FULL, Attribute, Cell, Color, ContentArrangement, Table};
use std::io;
use wharf_errors::UserFacingError;
use wharf_types::{BuildResult, Status};

/// Output renderer for CLI results
#[derive(Clone)]
pub struct OutputRenderer {
    /// Use JSON output format
    json_output: bool,
}

impl OutputRenderer {
    /// Create new output renderer
    pub fn new(json_output: bool) -> Self {
        Self { json_output }
    }

    /// Render the result of a build
    pub fn render_result(&self, result: &BuildResult) -> io::Result<()> {
        if self.json_output {
            let json = serde_json::to_string(result).map_err(io::Error::other)?;
            println!("{json}");
            return Ok(());
        }

        if result.status == Status::None {
            println!("No stage matched '{}', nothing was run.", result.options.stage_filter);
            return Ok(());
        }

        println!();
        println!("{}", summary_table(result));
        println!(
            "Build {} in {:.1?}",
            status_style(result.status).apply_to(result.status),
            result.duration
        );
        Ok(())
    }
}

fn status_cell(status: Status) -> Cell {
    let cell = Cell::new(status);
    match status {
        Status::Success => cell.fg(Color::Green),
        Status::Failed => cell.fg(Color::Red).add_attribute(Attribute::Bold),
        Status::Cancelled => cell.fg(Color::Yellow),
        _ => cell,
    }
}

fn summary_table(result: &BuildResult) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);

    table.set_header(vec![
        Cell::new("Stage").add_attribute(Attribute::Bold),
        Cell::new("Step").add_attribute(Attribute::Bold),
        Cell::new("Type").add_attribute(Attribute::Bold),
        Cell::new("Status").add_attribute(Attribute::Bold),
        Cell::new("Duration").add_attribute(Attribute::Bold),
        Cell::new("Error").add_attribute(Attribute::Bold),
    ]);

    for stage in &result.stages {
        for step in &stage.steps {
            let error = step
                .error
                .as_ref()
                .filter(|err| !err.is_cancelled())
                .map(|err| err.user_message().into_owned())
                .unwrap_or_default();
            table.add_row(vec![
                Cell::new(&stage.name),
                Cell::new(&step.name),
                Cell::new(&step.step_type),
                status_cell(step.status),
                Cell::new(format!("{:.1?}", step.duration)),
                Cell::new(error),
            ]);
        }
    }
    table
}
