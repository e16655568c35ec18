//! HTML report rendering.
//!
//! A template is chosen by job status and its `{{NAME}}` placeholders are
//! filled in a single pass, so text inside substituted values is never
//! expanded again.

use std::path::{Path, PathBuf};

use imgpromote_core::{JobStatus, PromotionResult, PromotionStatus};
use tracing::warn;

use crate::payload::NotificationPayload;

pub const SUCCESS_TEMPLATE: &str = "email_success.html";
pub const FAILURE_TEMPLATE: &str = "email_failure.html";

const BUILTIN_SUCCESS: &str = include_str!("../templates/email_success.html");
const BUILTIN_FAILURE: &str = include_str!("../templates/email_failure.html");

const SUCCESS_COLOR: &str = "#007bff";
const FAILURE_COLOR: &str = "#dc3545";

/// Job parameters shown in the report, in display order.
pub const PARAMETER_ALLOW_LIST: &[&str] = &[
    "TICKET_NUMBER",
    "OPTIONAL_RECIPIENTS",
    "TAGGING_OPTION",
    "TAG_A_TYPE",
    "CUSTOM_SOURCE_TAG",
    "CUSTOM_TAG_SOURCE",
    "CUSTOM_TAG_DESTINATION",
    "REGISTRY_TYPE",
    "DRY_RUN",
    "IMAGES_TO_TAG",
];

/// Where report templates come from.
#[derive(Debug, Clone, Default)]
pub enum Templates {
    /// Templates compiled into the crate.
    #[default]
    Builtin,
    /// `email_success.html` / `email_failure.html` inside a directory.
    Dir(PathBuf),
}

impl Templates {
    pub fn from_dir(dir: impl Into<PathBuf>) -> Self {
        Templates::Dir(dir.into())
    }

    /// Template text for `name`. A template that cannot be read becomes an
    /// inline error body instead of failing the notification.
    pub fn load(&self, name: &str) -> String {
        match self {
            Templates::Builtin => match name {
                SUCCESS_TEMPLATE => BUILTIN_SUCCESS.to_string(),
                FAILURE_TEMPLATE => BUILTIN_FAILURE.to_string(),
                _ => missing_template(name),
            },
            Templates::Dir(dir) => read_template(dir, name),
        }
    }
}

fn read_template(dir: &Path, name: &str) -> String {
    let path = dir.join(name);
    match std::fs::read_to_string(&path) {
        Ok(content) => content,
        Err(e) => {
            warn!(template = %path.display(), error = %e, "template unavailable");
            missing_template(name)
        }
    }
}

fn missing_template(name: &str) -> String {
    format!("<h1>Error: Template {} not found!</h1>", escape_html(name))
}

/// Subject line and HTML body of a report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedEmail {
    pub subject: String,
    pub html: String,
}

/// Render the report for `payload`.
pub fn render(payload: &NotificationPayload, templates: &Templates, logo_url: &str) -> RenderedEmail {
    let success = payload.status.is_success();
    let (template_name, primary_color, tag_line) = if success {
        (SUCCESS_TEMPLATE, SUCCESS_COLOR, "Image Promotion Completed")
    } else {
        (FAILURE_TEMPLATE, FAILURE_COLOR, "Image Promotion Failed")
    };

    let meta = &payload.metadata;
    let ticket = meta.ticket();
    let template = templates.load(template_name);

    let html = substitute(
        &template,
        &[
            ("STATUS_BADGE", status_badge(payload.status)),
            ("TAG_LINE", tag_line.to_string()),
            ("TICKET_NUMBER", escape_html(ticket)),
            ("RELEASE_NOTES_LINK", escape_html(&meta.release_link)),
            ("JENKINS_JOB_LINK", escape_html(&meta.job_url)),
            ("IMAGE_RESULTS_TABLE", results_table(&payload.results)),
            ("PARAMETERS_LIST", parameters_list(&meta.parameters_json)),
            ("DRY_RUN_STATUS", escape_html(&meta.dry_run_status)),
            ("PRIMARY_COLOR", primary_color.to_string()),
            ("COMPANY_LOGO_URL", escape_html(logo_url)),
            ("BUILD_INFO", escape_html(&meta.build_info)),
        ],
    );

    RenderedEmail {
        subject: subject(payload.status, ticket),
        html,
    }
}

pub fn subject(status: JobStatus, ticket: &str) -> String {
    format!("[{}] Docker Tagging Job: {}", status, ticket)
}

pub fn status_badge(status: JobStatus) -> String {
    let color = if status.is_success() {
        SUCCESS_COLOR
    } else {
        FAILURE_COLOR
    };
    format!(
        "<span style=\"display: inline-block; background-color: {}; color: white; \
         padding: 5px 10px; border-radius: 5px; font-weight: bold;\">{}</span>",
        color, status
    )
}

fn row_color(status: PromotionStatus) -> &'static str {
    match status {
        PromotionStatus::Success => "#d4edda",
        PromotionStatus::DryRunSuccess => "#fff3cd",
        PromotionStatus::Failure => "#f8d7da",
    }
}

/// One table row per result, colour-coded by status.
pub fn results_table(results: &[PromotionResult]) -> String {
    const CELL: &str = "padding: 8px; border: 1px solid #ddd;";

    let mut html = String::from(
        "<table style=\"width:100%; border-collapse: collapse; text-align: left;\">\n<thead>\n\
         <tr style=\"background-color: #f2f2f2;\">",
    );
    for heading in ["Image Name", "Tag Change", "Status", "Message"] {
        html.push_str(&format!("<th style=\"{}\">{}</th>", CELL, heading));
    }
    html.push_str("</tr>\n</thead>\n<tbody>\n");

    for result in results {
        html.push_str(&format!(
            "<tr style=\"background-color: {};\">\
             <td style=\"{cell}\">{}</td>\
             <td style=\"{cell}\">{} &rarr; {}</td>\
             <td style=\"{cell}\"><strong>{}</strong></td>\
             <td style=\"{cell}\">{}</td></tr>\n",
            row_color(result.status),
            escape_html(&result.image),
            escape_html(&result.source_tag),
            escape_html(&result.destination_tag),
            result.status,
            escape_html(&result.message),
            cell = CELL,
        ));
    }

    html.push_str("</tbody>\n</table>");
    html
}

/// Allow-listed job parameters as an HTML list.
pub fn parameters_list(parameters_json: &str) -> String {
    let params = match serde_json::from_str::<serde_json::Value>(parameters_json) {
        Ok(serde_json::Value::Object(map)) => map,
        Ok(_) => {
            return decode_error(parameters_json, "expected a JSON object");
        }
        Err(e) => return decode_error(parameters_json, &e.to_string()),
    };

    let mut html = String::from("<ul style='list-style-type: none; padding-left: 0;'>");
    for key in PARAMETER_ALLOW_LIST {
        let Some(value) = params.get(*key) else {
            continue;
        };
        let value = match value {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        html.push_str(&format!(
            "<li style='margin-bottom: 5px;'><strong>{}:</strong> {}</li>",
            title_case(key),
            escape_html(&value)
        ));
    }
    html.push_str("</ul>");
    html
}

fn decode_error(raw: &str, reason: &str) -> String {
    warn!(error = %reason, "parameters JSON not usable");
    format!("<div>Error decoding parameters: {}</div>", escape_html(raw))
}

/// `TAG_A_TYPE` -> `Tag A Type`.
fn title_case(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    let mut prev_alpha = false;
    for c in key.chars() {
        let c = if c == '_' { ' ' } else { c };
        if c.is_alphabetic() {
            if prev_alpha {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
            prev_alpha = true;
        } else {
            out.push(c);
            prev_alpha = false;
        }
    }
    out
}

/// Replace every `{{NAME}}` with its value. Unknown placeholders are left
/// as they are.
fn substitute(template: &str, values: &[(&str, String)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let replaced = after.find("}}").and_then(|end| {
            let name = &after[..end];
            values
                .iter()
                .find(|(key, _)| *key == name)
                .map(|(_, value)| (value, end))
        });
        match replaced {
            Some((value, end)) => {
                out.push_str(value);
                rest = &after[end + 2..];
            }
            None => {
                out.push_str("{{");
                rest = after;
            }
        }
    }

    out.push_str(rest);
    out
}

pub fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
