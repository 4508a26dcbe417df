//! HTML rendering of a [`Report`] with `maud`.
//!
//! The page is a list of titled sections; each section holds free-form
//! markup and inline plotly figures. Plotly itself is loaded from its CDN.
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use maud::{html, Markup, PreEscaped, DOCTYPE};
use plotly::Plot;

use crate::data_handling::Label;
use crate::report::plots::{plot_roc_curve, plot_score_histogram};
use crate::report::Report;

const PLOTLY_CDN: &str = "https://cdn.plot.ly/plotly-2.12.1.min.js";

const STYLE: &str = "
body { font-family: sans-serif; margin: 2em; color: #222; }
h1 { border-bottom: 2px solid #444; }
section { margin-bottom: 2em; }
table { border-collapse: collapse; }
th, td { border: 1px solid #ccc; padding: 4px 10px; text-align: right; }
th:first-child, td:first-child { text-align: left; }
.code-container { background-color: #f5f5f5; padding: 10px; border-radius: 5px; font-family: monospace; white-space: pre-wrap; }
";

pub struct ReportSection {
    title: String,
    content: Vec<Markup>,
}

impl ReportSection {
    pub fn new(title: &str) -> Self {
        ReportSection {
            title: title.to_string(),
            content: Vec::new(),
        }
    }

    pub fn add_content(&mut self, markup: Markup) {
        self.content.push(markup);
    }

    pub fn add_plot(&mut self, plot: Plot) {
        let id = format!("plot-{}-{}", slug(&self.title), self.content.len());
        self.content.push(PreEscaped(plot.to_inline_html(Some(&id))));
    }

    fn render(&self) -> Markup {
        html! {
            section {
                h2 { (self.title) }
                @for block in &self.content {
                    div { (block) }
                }
            }
        }
    }
}

/// A standalone HTML page made of sections.
pub struct HtmlReport {
    title: String,
    subtitle: String,
    sections: Vec<ReportSection>,
}

impl HtmlReport {
    pub fn new(title: &str, subtitle: &str) -> Self {
        HtmlReport {
            title: title.to_string(),
            subtitle: subtitle.to_string(),
            sections: Vec::new(),
        }
    }

    pub fn add_section(&mut self, section: ReportSection) {
        self.sections.push(section);
    }

    pub fn render(&self) -> Markup {
        html! {
            (DOCTYPE)
            html {
                head {
                    meta charset="utf-8";
                    title { (self.title) }
                    script src=(PLOTLY_CDN) {}
                    style { (PreEscaped(STYLE)) }
                }
                body {
                    h1 { (self.title) }
                    p { (self.subtitle) }
                    @for section in &self.sections {
                        (section.render())
                    }
                }
            }
        }
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        fs::write(path, self.render().into_string())
            .with_context(|| format!("Failed to write HTML report to {}", path.display()))
    }
}

fn slug(title: &str) -> String {
    title
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '-' })
        .collect()
}

/// Build the HTML page of a held-out evaluation.
pub fn render_report(report: &Report, subtitle: &str) -> Result<HtmlReport> {
    let mut page = HtmlReport::new(
        &format!("Seizure prediction report: {}", report.method),
        subtitle,
    );

    let mut overview = ReportSection::new("Best configuration");
    overview.add_content(html! {
        p { "Estimator: " strong { (report.estimator_name) } }
        div class="code-container" { (report.best_params.to_string()) }
        @if let Some(auc) = report.roc_auc {
            p { "ROC AUC on the evaluation set: " strong { (format!("{:.3}", auc)) } }
        }
    });
    page.add_section(overview);

    let mut grid = ReportSection::new("Grid scores");
    grid.add_content(html! {
        table {
            tr { th { "Rank" } th { "Mean" } th { "Std/2" } th { "Parameters" } }
            @for score in &report.grid_scores {
                tr {
                    td { (score.rank) }
                    td { (format!("{:.3}", score.mean_score)) }
                    td { (format!("{:.3}", score.std_score / 2.0)) }
                    td { (score.params.to_string()) }
                }
            }
        }
    });
    page.add_section(grid);

    let mut metrics = ReportSection::new("Classification report");
    metrics.add_content(html! {
        table {
            tr { th { "" } th { "precision" } th { "recall" } th { "f1-score" } th { "support" } }
            @for class in Label::ALL {
                @let m = report.metrics_for(class);
                tr {
                    td { (class.name()) }
                    td { (format!("{:.2}", m.precision)) }
                    td { (format!("{:.2}", m.recall)) }
                    td { (format!("{:.2}", m.f1)) }
                    td { (m.support) }
                }
            }
            tr {
                td { "weighted avg" }
                td { (format!("{:.2}", report.weighted_avg.precision)) }
                td { (format!("{:.2}", report.weighted_avg.recall)) }
                td { (format!("{:.2}", report.weighted_avg.f1)) }
                td { (report.weighted_avg.support) }
            }
        }
        h3 { "Confusion matrix (rows: true class, columns: predicted class)" }
        table {
            tr {
                th { "" }
                @for predicted in Label::ALL { th { (predicted.name()) } }
            }
            @for truth in Label::ALL {
                tr {
                    td { (truth.name()) }
                    @for predicted in Label::ALL {
                        td { (report.confusion_matrix.get(truth, predicted)) }
                    }
                }
            }
        }
    });
    page.add_section(metrics);

    let mut scores = ReportSection::new("Held-out scores");
    scores.add_plot(plot_roc_curve(
        &report.positive_scores,
        &report.held_out_labels,
        "ROC curve",
    )?);
    scores.add_plot(plot_score_histogram(
        &report.positive_scores,
        &report.held_out_labels,
        "Preictal score distribution",
    )?);
    page.add_section(scores);

    Ok(page)
}

/// Render `report` and write it to `path`.
pub fn write_html<P: AsRef<Path>>(report: &Report, subtitle: &str, path: P) -> Result<()> {
    render_report(report, subtitle)?.save_to_file(path.as_ref())?;
    log::info!("HTML report written to {}", path.as_ref().display());
    Ok(())
}
