//! Quotation document rendering.
//!
//! Quotations are rendered to HTML with tera and converted to PDF with
//! `wkhtmltopdf` when the binary is on PATH. Without it the HTML itself
//! is returned so the browser can print it. Monetary values reach the
//! template as exact decimal strings; the `money` filter applies the
//! 2-decimal display rounding.

use std::collections::HashMap;
use std::process::Stdio;

use axum::{
    body::Body,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use cotizador_db::QuotationView;
use tera::{Context, Tera};
use thiserror::Error;
use tokio::process::Command;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("template error: {0}")]
    Template(String),
    #[error("pdf conversion failed: {0}")]
    Conversion(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub enum RenderedDocument {
    Pdf(Vec<u8>),
    Html(String),
}

impl RenderedDocument {
    pub fn into_response(self, filename: &str) -> Response {
        match self {
            Self::Pdf(bytes) => (
                StatusCode::OK,
                [
                    (header::CONTENT_TYPE, "application/pdf".to_string()),
                    (
                        header::CONTENT_DISPOSITION,
                        format!("attachment; filename=\"{filename}\""),
                    ),
                ],
                Body::from(bytes),
            )
                .into_response(),
            Self::Html(html) => (
                StatusCode::OK,
                [(header::CONTENT_TYPE, "text/html; charset=utf-8".to_string())],
                Body::from(html),
            )
                .into_response(),
        }
    }
}

pub struct QuotationRenderer {
    tera: Tera,
    wkhtmltopdf_path: Option<String>,
}

/// 2-decimal display rounding for monetary values. Accepts the decimal
/// strings the API serializes as well as plain numbers.
fn tera_money_filter(
    value: &tera::Value,
    _args: &HashMap<String, tera::Value>,
) -> tera::Result<tera::Value> {
    let amount = match value {
        tera::Value::String(raw) => raw.parse::<f64>().unwrap_or(0.0),
        tera::Value::Number(n) => n.as_f64().unwrap_or(0.0),
        _ => 0.0,
    };
    Ok(tera::Value::String(format!("${amount:.2}")))
}

pub fn register_template_filters(tera: &mut Tera) {
    tera.register_filter("money", tera_money_filter);
}

impl QuotationRenderer {
    pub fn new(template_dir: &str) -> Result<Self, RenderError> {
        let mut tera = Tera::new(&format!("{template_dir}/**/*"))
            .map_err(|e| RenderError::Template(e.to_string()))?;
        register_template_filters(&mut tera);

        Ok(Self { tera, wkhtmltopdf_path: discover_wkhtmltopdf() })
    }

    /// Fallback used when the configured template directory cannot be
    /// read, e.g. when running from a different working directory.
    pub fn with_embedded_templates() -> Self {
        let mut tera = Tera::default();
        register_template_filters(&mut tera);

        tera.add_raw_template(
            "quotations/quotation.html.tera",
            include_str!("../templates/quotations/quotation.html.tera"),
        )
        .ok();

        Self { tera, wkhtmltopdf_path: discover_wkhtmltopdf() }
    }

    pub fn render_html(&self, view: &QuotationView) -> Result<String, RenderError> {
        let mut context = Context::new();
        context.insert("quotation", &view.quotation);
        context.insert("client", &view.client);
        context.insert("salesperson", &view.salesperson);

        let lines: Vec<serde_json::Value> = view
            .details
            .iter()
            .map(|item| {
                serde_json::json!({
                    "product_name": item.product.name,
                    "product_sku": item.product.sku,
                    "quantity": item.detail.quantity,
                    "unit_price": item.detail.unit_price,
                    "subtotal": item.detail.subtotal,
                    "line_tax": item.detail.line_tax,
                })
            })
            .collect();
        context.insert("lines", &lines);
        context.insert("grand_total", &(view.quotation.total + view.quotation.total_tax));

        self.tera
            .render("quotations/quotation.html.tera", &context)
            .map_err(|e| RenderError::Template(e.to_string()))
    }

    pub async fn render(&self, view: &QuotationView) -> Result<RenderedDocument, RenderError> {
        let html = self.render_html(view)?;

        if let Some(wkhtmltopdf) = &self.wkhtmltopdf_path {
            match convert_html_to_pdf(&html, wkhtmltopdf).await {
                Ok(bytes) => return Ok(RenderedDocument::Pdf(bytes)),
                Err(error) => {
                    warn!(
                        event_name = "pdf.conversion_failed",
                        quotation_number = %view.quotation.number,
                        error = %error,
                        "pdf conversion failed, falling back to html"
                    );
                }
            }
        }

        Ok(RenderedDocument::Html(html))
    }
}

fn discover_wkhtmltopdf() -> Option<String> {
    match which::which("wkhtmltopdf") {
        Ok(path) => {
            let path = path.to_string_lossy().to_string();
            info!(event_name = "pdf.wkhtmltopdf_found", path = %path, "wkhtmltopdf found");
            Some(path)
        }
        Err(_) => {
            warn!(
                event_name = "pdf.wkhtmltopdf_missing",
                "wkhtmltopdf not found in PATH, quotation documents will render as html"
            );
            None
        }
    }
}

async fn convert_html_to_pdf(html: &str, wkhtmltopdf_path: &str) -> Result<Vec<u8>, RenderError> {
    let temp_dir = std::env::temp_dir();
    let stem = uuid::Uuid::new_v4().simple().to_string();
    let html_path = temp_dir.join(format!("cotizacion_{stem}.html"));
    let pdf_path = temp_dir.join(format!("cotizacion_{stem}.pdf"));

    tokio::fs::write(&html_path, html).await?;

    let output = Command::new(wkhtmltopdf_path)
        .arg("--page-size")
        .arg("A4")
        .arg("--margin-top")
        .arg("10mm")
        .arg("--margin-bottom")
        .arg("10mm")
        .arg("--margin-left")
        .arg("10mm")
        .arg("--margin-right")
        .arg("10mm")
        .arg("--encoding")
        .arg("utf-8")
        .arg(&html_path)
        .arg(&pdf_path)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let _ = tokio::fs::remove_file(&html_path).await;
        return Err(RenderError::Conversion(stderr.to_string()));
    }

    let pdf_bytes = tokio::fs::read(&pdf_path).await?;

    let _ = tokio::fs::remove_file(&html_path).await;
    let _ = tokio::fs::remove_file(&pdf_path).await;

    Ok(pdf_bytes)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::tera_money_filter;

    #[test]
    fn money_filter_rounds_decimal_strings_for_display() {
        let args = HashMap::new();

        let rounded = tera_money_filter(&tera::Value::String("47.5".to_string()), &args)
            .expect("filter should succeed");
        assert_eq!(rounded, tera::Value::String("$47.50".to_string()));

        let truncated = tera_money_filter(&tera::Value::String("1.8981".to_string()), &args)
            .expect("filter should succeed");
        assert_eq!(truncated, tera::Value::String("$1.90".to_string()));
    }

    #[test]
    fn money_filter_accepts_plain_numbers() {
        let args = HashMap::new();
        let value = serde_json::json!(250);
        let rendered = tera_money_filter(&value, &args).expect("filter should succeed");
        assert_eq!(rendered, tera::Value::String("$250.00".to_string()));
    }
}
