//! Experiment pipeline: balance, hold out, search, evaluate.
use crate::config::ExperimentConfig;
use crate::cross_validation::train_test_split;
use crate::data_handling::{merge_interictal_preictal, LabeledDataset};
use crate::error::{ModelSelectionError, Result};
use crate::grid_search::{fit_without_search, select_model, TrainedModel};
use crate::report::{build_report, Report};
use crate::resample::{downsample, resolve_seed};

/// Train a model on the two class tables according to `config`.
///
/// With cross-validation enabled the working set is split into a training
/// and an evaluation partition, the grid search runs on the training part
/// and the returned report describes the evaluation part. Without
/// cross-validation the configured parameters are fitted on every row and
/// no report is produced.
pub fn train_model(
    interictal: &LabeledDataset,
    preictal: &LabeledDataset,
    config: &ExperimentConfig,
) -> Result<(TrainedModel, Option<Report>)> {
    let seed = resolve_seed(config.seed);

    let working = if config.downsample {
        downsample(interictal, preictal, config.downsample_ratio, Some(seed))?.dataset
    } else {
        merge_interictal_preictal(interictal, preictal)?
    };
    working.log_input_data_summary();

    if config.no_crossvalidation {
        let model = fit_without_search(
            &working,
            config.method.as_str(),
            config.model_params.as_ref(),
            Some(seed),
        )?;
        return Ok((model, None));
    }

    let (training, test) =
        train_test_split(&working, config.training_ratio, config.segment_aware, seed)?;
    log::info!(
        "Shapes after splitting experiment data: training {:?}, test {:?}",
        training.x.dim(),
        test.x.dim()
    );
    if training.is_empty() {
        return Err(ModelSelectionError::config(format!(
            "No training rows left after the hold-out split (training_ratio {})",
            config.training_ratio
        )));
    }

    let model = select_model(
        &training,
        config.method.as_str(),
        &config.to_selection_options(seed),
    )?;

    if test.is_empty() {
        log::warn!("The evaluation set is empty, skipping the report");
        return Ok((model, None));
    }
    let report = build_report(&model, test.x.view(), &test.y)?;
    log::info!("\n{}", report);
    Ok((model, Some(report)))
}

/// Fit the winning configuration of `model` on new class tables.
pub fn refit_model(
    interictal: &LabeledDataset,
    preictal: &LabeledDataset,
    model: &TrainedModel,
) -> Result<TrainedModel> {
    let training = merge_interictal_preictal(interictal, preictal)?;
    model.refit(&training)
}

/// Mean preictal score of every segment, in order of first appearance.
pub fn assign_segment_scores(model: &TrainedModel, dataset: &LabeledDataset) -> Result<Vec<(String, f64)>> {
    let scores = model.positive_scores(dataset.x.view())?;
    Ok(dataset
        .segments()
        .into_iter()
        .map(|segment| {
            let total: f64 = segment.rows.iter().map(|&r| scores[r]).sum();
            (segment.segment_id, total / segment.rows.len() as f64)
        })
        .collect())
}
