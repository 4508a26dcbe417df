use plotly::common::{DashType, Line, Mode};
use plotly::histogram::HistNorm;
use plotly::layout::{Axis, Layout};
use plotly::{Histogram, Plot, Scatter};

use crate::data_handling::Label;
use crate::error::{ModelSelectionError, Result};
use crate::stats::{roc_auc, roc_curve};

fn check_lengths(scores: &[f64], labels: &[Label]) -> Result<()> {
    if scores.len() != labels.len() {
        return Err(ModelSelectionError::config(format!(
            "Scores and labels must have the same length ({} vs {})",
            scores.len(),
            labels.len()
        )));
    }
    Ok(())
}

/// Plot a histogram of the preictal scores for each true class
pub fn plot_score_histogram(scores: &[f64], labels: &[Label], title: &str) -> Result<Plot> {
    check_lengths(scores, labels)?;

    let mut scores_preictal = Vec::new();
    let mut scores_interictal = Vec::new();
    for (&score, label) in scores.iter().zip(labels.iter()) {
        if label.is_preictal() {
            scores_preictal.push(score);
        } else {
            scores_interictal.push(score);
        }
    }

    let trace_interictal = Histogram::new(scores_interictal)
        .name("Interictal")
        .hist_norm(HistNorm::ProbabilityDensity);
    let trace_preictal = Histogram::new(scores_preictal)
        .name("Preictal")
        .hist_norm(HistNorm::ProbabilityDensity);

    let layout = Layout::new()
        .title(title)
        .x_axis(Axis::new().title("Preictal score"))
        .y_axis(Axis::new().title("Density"));

    let mut plot = Plot::new();
    plot.add_trace(trace_interictal);
    plot.add_trace(trace_preictal);
    plot.set_layout(layout);

    Ok(plot)
}

/// ROC curve of the held-out scores with the chance diagonal.
pub fn plot_roc_curve(scores: &[f64], labels: &[Label], title: &str) -> Result<Plot> {
    check_lengths(scores, labels)?;
    let (fpr, tpr, _) = roc_curve(labels, scores);
    let name = match roc_auc(labels, scores) {
        Ok(auc) => format!("ROC (AUC = {:.3})", auc),
        Err(_) => "ROC".to_string(),
    };

    let curve = Scatter::new(fpr, tpr).mode(Mode::Lines).name(name.as_str());
    let chance = Scatter::new(vec![0.0, 1.0], vec![0.0, 1.0])
        .mode(Mode::Lines)
        .name("Chance")
        .line(Line::new().color("red").dash(DashType::Dash));

    let mut plot = Plot::new();
    plot.add_trace(curve);
    plot.add_trace(chance);
    plot.set_layout(
        Layout::new()
            .title(title)
            .x_axis(Axis::new().title("False positive rate"))
            .y_axis(Axis::new().title("True positive rate")),
    );
    Ok(plot)
}
