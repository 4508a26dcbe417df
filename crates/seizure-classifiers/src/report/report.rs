use std::fmt;

use ndarray::ArrayView2;
use serde::{Deserialize, Serialize};

use crate::data_handling::Label;
use crate::error::{ModelSelectionError, Result};
use crate::grid_search::TrainedModel;
use crate::models::classifier_trait::Classifier;
use crate::models::params::ParamSet;
use crate::models::registry::Method;
use crate::stats::{class_metrics, roc_auc, weighted_average, ClassMetrics, ConfusionMatrix};

/// Cross-validation score of one configuration, ranked by mean.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridScore {
    /// 1-based position after sorting by mean score (descending)
    pub rank: usize,
    pub params: ParamSet,
    pub mean_score: f64,
    pub std_score: f64,
}

/// Evaluation of a trained model on a held-out partition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub method: Method,
    pub estimator_name: String,
    pub best_params: ParamSet,
    pub grid_scores: Vec<GridScore>,
    pub confusion_matrix: ConfusionMatrix,
    /// Per-class metrics in [`Label::ALL`] order
    pub class_metrics: [ClassMetrics; 2],
    pub weighted_avg: ClassMetrics,
    pub held_out_labels: Vec<Label>,
    pub positive_scores: Vec<f64>,
    /// Only present when both classes occur in the held-out labels
    pub roc_auc: Option<f64>,
}

/// Evaluate `model` on the held-out rows `x`/`y`.
pub fn build_report(model: &TrainedModel, x: ArrayView2<f64>, y: &[Label]) -> Result<Report> {
    if x.nrows() != y.len() {
        return Err(ModelSelectionError::config(format!(
            "Held-out data has {} rows but {} labels",
            x.nrows(),
            y.len()
        )));
    }

    let predicted = model.predict(x)?;
    let positive_scores = model.positive_scores(x)?;

    let confusion_matrix = ConfusionMatrix::from_predictions(y, &predicted)?;
    let per_class = [
        class_metrics(y, &predicted, Label::ALL[0])?,
        class_metrics(y, &predicted, Label::ALL[1])?,
    ];
    let weighted_avg = weighted_average(&per_class);

    let both_classes = Label::ALL.iter().all(|class| y.contains(class));
    let roc_auc = if both_classes {
        Some(roc_auc(y, &positive_scores)?)
    } else {
        None
    };

    Ok(Report {
        method: model.method,
        estimator_name: model.estimator.name().to_string(),
        best_params: model.best_params().clone(),
        grid_scores: rank_grid_scores(model),
        confusion_matrix,
        class_metrics: per_class,
        weighted_avg,
        held_out_labels: y.to_vec(),
        positive_scores,
        roc_auc,
    })
}

fn rank_grid_scores(model: &TrainedModel) -> Vec<GridScore> {
    let mut order: Vec<usize> = (0..model.cv_results.len()).collect();
    // stable sort keeps enumeration order among equal means
    order.sort_by(|&a, &b| {
        let (a, b) = (&model.cv_results[a], &model.cv_results[b]);
        b.mean_score.total_cmp(&a.mean_score)
    });
    order
        .into_iter()
        .enumerate()
        .map(|(rank, idx)| {
            let result = &model.cv_results[idx];
            GridScore {
                rank: rank + 1,
                params: result.params.clone(),
                mean_score: result.mean_score,
                std_score: result.std_score,
            }
        })
        .collect()
}

impl Report {
    pub fn metrics_for(&self, class: Label) -> &ClassMetrics {
        &self.class_metrics[class.as_u8() as usize]
    }

    /// Tab separated confusion matrix, rows are true classes.
    pub fn confusion_matrix_table(&self) -> String {
        let width = Label::ALL.iter().map(|l| l.name().len()).max().unwrap_or(0);
        let mut lines = vec!["Colums show what the true values(rows) were classified as.".to_string()];

        let mut header = vec![format!("{:>width$}", "", width = width)];
        header.extend(Label::ALL.iter().map(|l| format!("{:>width$}", l.name(), width = width)));
        lines.push(header.join("\t"));

        for truth in Label::ALL {
            let mut row = vec![format!("{:<width$}", truth.name(), width = width)];
            row.extend(Label::ALL.iter().map(|&predicted| {
                format!("{:>width$}", self.confusion_matrix.get(truth, predicted), width = width)
            }));
            lines.push(row.join("\t"));
        }
        lines.join("\n")
    }

    fn classification_table(&self) -> String {
        let width = Label::ALL
            .iter()
            .map(|l| l.name().len())
            .chain(std::iter::once("weighted avg".len()))
            .max()
            .unwrap_or(0);
        let row = |name: &str, m: &ClassMetrics| {
            format!(
                "{:>width$} {:>9.2} {:>9.2} {:>9.2} {:>9}",
                name,
                m.precision,
                m.recall,
                m.f1,
                m.support,
                width = width
            )
        };

        let mut lines = vec![format!(
            "{:>width$} {:>9} {:>9} {:>9} {:>9}",
            "",
            "precision",
            "recall",
            "f1-score",
            "support",
            width = width
        )];
        lines.push(String::new());
        for class in Label::ALL {
            lines.push(row(class.name(), self.metrics_for(class)));
        }
        lines.push(String::new());
        lines.push(row("weighted avg", &self.weighted_avg));
        lines.join("\n")
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Classification report:")?;
        writeln!(f, "Best parameters set found on development set:")?;
        writeln!(f)?;
        writeln!(f, "{} {}", self.estimator_name, self.best_params)?;
        writeln!(f)?;

        writeln!(f, "Grid scores on development set:")?;
        writeln!(f)?;
        for score in &self.grid_scores {
            writeln!(
                f,
                "{:.3} (+/-{:.3}) for {}",
                score.mean_score,
                score.std_score / 2.0,
                score.params
            )?;
        }
        writeln!(f)?;

        writeln!(f, "Detailed classification report:")?;
        writeln!(f, "The model is trained on the full development set.")?;
        writeln!(f, "The scores are computed on the full evaluation set.")?;
        writeln!(f)?;
        writeln!(f, "{}", self.classification_table())?;
        if let Some(auc) = self.roc_auc {
            writeln!(f)?;
            writeln!(f, "ROC AUC on the evaluation set: {:.3}", auc)?;
        }
        writeln!(f)?;
        writeln!(f, "{}", self.confusion_matrix_table())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid_search::CvResult;
    use crate::models::knn::KNeighbors;
    use crate::models::Estimator;
    use ndarray::array;

    fn fitted_model(cv_means: &[f64]) -> TrainedModel {
        let x = array![[0.0], [0.1], [1.0], [1.1]];
        let y = vec![Label::Interictal, Label::Interictal, Label::Preictal, Label::Preictal];
        let params = ParamSet::new().with("n_neighbors", 1i64);
        let mut estimator =
            Estimator::KNeighbors(KNeighbors::from_params(&params).unwrap());
        estimator.fit(x.view(), &y).unwrap();
        TrainedModel {
            method: Method::Knn,
            estimator,
            best_params: params.clone(),
            params,
            cv_results: cv_means
                .iter()
                .enumerate()
                .map(|(i, &m)| CvResult {
                    params: ParamSet::new().with("n_neighbors", i as i64 + 1),
                    fold_scores: vec![m],
                    mean_score: m,
                    std_score: 0.0,
                })
                .collect(),
            best_index: Some(0),
            seed: 0,
            n_folds: 2,
            segment_aware: true,
        }
    }

    #[test]
    fn test_report_on_held_out_rows() {
        let model = fitted_model(&[0.9]);
        let x = array![[0.05], [0.2], [0.95], [0.4]];
        let y = vec![Label::Interictal, Label::Interictal, Label::Preictal, Label::Preictal];
        let report = build_report(&model, x.view(), &y).unwrap();

        assert_eq!(report.confusion_matrix.total(), 4);
        assert_eq!(report.confusion_matrix.0, [[2, 0], [1, 1]]);
        assert_eq!(report.metrics_for(Label::Preictal).recall, 0.5);
        assert_eq!(report.weighted_avg.support, 4);
        assert_eq!(report.roc_auc, Some(0.75));
    }

    #[test]
    fn test_report_without_both_classes_has_no_auc() {
        let model = fitted_model(&[0.9]);
        let x = array![[0.05], [0.2]];
        let report = build_report(&model, x.view(), &[Label::Interictal, Label::Interictal]).unwrap();
        assert_eq!(report.roc_auc, None);
    }

    #[test]
    fn test_grid_scores_ranked_stably() {
        let model = fitted_model(&[0.6, 0.8, 0.6, 0.8]);
        let x = array![[0.0], [1.0]];
        let report = build_report(&model, x.view(), &[Label::Interictal, Label::Preictal]).unwrap();
        let order: Vec<i64> = report
            .grid_scores
            .iter()
            .map(|s| s.params.get("n_neighbors").unwrap().as_i64().unwrap())
            .collect();
        assert_eq!(order, vec![2, 4, 1, 3]);
        assert_eq!(report.grid_scores[0].rank, 1);
    }

    #[test]
    fn test_text_report_layout() {
        let model = fitted_model(&[0.5]);
        let x = array![[0.0], [1.0]];
        let report = build_report(&model, x.view(), &[Label::Interictal, Label::Preictal]).unwrap();
        let text = report.to_string();
        assert!(text.contains("0.500 (+/-0.000) for {'n_neighbors': 1}"));
        assert!(text.contains("weighted avg"));
        assert!(text.contains("          \tInterictal\t  Preictal"));
        assert!(text.contains("Interictal\t         1\t         0"));
    }
}
