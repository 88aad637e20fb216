use crate::catalog::CareInstructionRecord;
use crate::stage::{ClassifyOutcome, ImageRejection, PredictionResult};
use html_escape::{encode_double_quoted_attribute, encode_text};
use serde::Serialize;

/// 展示层输出：摘要、各类别置信度、养护建议
#[derive(Debug, Clone, Default, Serialize)]
pub struct StageReport {
    pub summary: String,
    pub confidence_html: String,
    pub care_html: String,
}

/// 结果格式化器
pub struct ReportFormatter;

impl ReportFormatter {
    pub fn format(outcome: &ClassifyOutcome) -> StageReport {
        match outcome {
            ClassifyOutcome::Predicted(result) => StageReport {
                summary: Self::summary(result),
                confidence_html: Self::confidence_html(result),
                care_html: Self::care_html(&result.care),
            },
            ClassifyOutcome::ModelUnavailable { .. } => Self::message_only(
                "❌ Model not loaded. Please check if the model file exists.".to_string(),
            ),
            ClassifyOutcome::NoInput => {
                Self::message_only("📤 Please upload an image first.".to_string())
            }
            ClassifyOutcome::ImageRejected { reason, message } => {
                let text = match reason {
                    ImageRejection::NotFound => "the image file could not be found",
                    ImageRejection::Unsupported => "the file is not a readable image",
                };
                Self::message_only(format!(
                    "❌ Could not process image: {} ({})",
                    text, message
                ))
            }
            ClassifyOutcome::InferenceFailed { message } => {
                Self::message_only(format!("❌ An error occurred: {}", message))
            }
        }
    }

    fn message_only(summary: String) -> StageReport {
        StageReport {
            summary,
            ..StageReport::default()
        }
    }

    /// 预测阶段与置信度百分比
    pub fn summary(result: &PredictionResult) -> String {
        format!(
            "🎯 **Predicted Stage:** {}\n📊 **Confidence:** {:.1}%",
            result.predicted_label,
            result.confidence * 100.0
        )
    }

    /// 各类别置信度，按目录顺序
    pub fn confidence_html(result: &PredictionResult) -> String {
        let mut html = String::from("<div class=\"confidence\"><h3>📈 Confidence Analysis</h3>");

        for item in &result.per_class_confidences {
            let pct = item.confidence * 100.0;
            let class = if item.label == result.predicted_label {
                "row predicted"
            } else {
                "row"
            };
            html.push_str(&format!(
                "<div class=\"{}\"><span class=\"label\">{}</span><span class=\"pct\">{:.1}%</span>\
                 <div class=\"bar\"><div class=\"fill\" style=\"width: {:.1}%\"></div></div></div>",
                encode_double_quoted_attribute(class),
                encode_text(&item.label.to_string()),
                pct,
                pct
            ));
        }

        html.push_str("</div>");
        html
    }

    /// 养护建议：标题、说明、建议做与不要做
    pub fn care_html(care: &CareInstructionRecord) -> String {
        let mut html = format!(
            "<div class=\"care\"><h2>{}</h2><p>{}</p>",
            encode_text(&care.title),
            encode_text(&care.description)
        );

        html.push_str("<div class=\"do\"><h3>✅ What TO DO:</h3><ul>");
        for item in &care.dos {
            html.push_str(&format!("<li>{}</li>", encode_text(item)));
        }
        html.push_str("</ul></div><div class=\"dont\"><h3>🚫 What NOT TO DO:</h3><ul>");
        for item in &care.donts {
            html.push_str(&format!("<li>{}</li>", encode_text(item)));
        }
        html.push_str("</ul></div></div>");

        html
    }
}
