use crate::error::{Result, TriageError};
use crate::ml::features::FeatureExtractor;
use crate::ml::LabeledSample;
use crate::models::{Algorithm, ModelVersion};
use ndarray::Array2;
use smartcore::linalg::basic::matrix::DenseMatrix;
use smartcore::linear::logistic_regression::{LogisticRegression, LogisticRegressionParameters};
use smartcore::naive_bayes::gaussian::GaussianNB;
use smartcore::tree::decision_tree_classifier::{
    DecisionTreeClassifier, DecisionTreeClassifierParameters, SplitCriterion,
};
use std::collections::HashMap;

const DECISION_TREE_MAX_DEPTH: u16 = 10;

/// Trait for category classifiers. Labels are indices into the label list
/// the model was trained with.
pub trait Classifier: Send + Sync {
    /// Train on a feature matrix and label indices
    fn train(&mut self, features: &Array2<f64>, labels: &[usize]) -> Result<()>;

    /// Predict label indices for a feature matrix
    fn predict(&self, features: &Array2<f64>) -> Result<Vec<usize>>;

    /// Check if model is trained
    fn is_trained(&self) -> bool;
}

fn ndarray_to_densematrix(arr: &Array2<f64>) -> DenseMatrix<f64> {
    let shape = arr.shape();
    let data: Vec<f64> = arr.iter().copied().collect();
    DenseMatrix::new(shape[0], shape[1], data, false)
}

/// Logistic regression (the linear-margin option)
pub struct LogisticRegressionClassifier {
    model: Option<LogisticRegression<f64, i32, DenseMatrix<f64>, Vec<i32>>>,
}

impl LogisticRegressionClassifier {
    pub fn new() -> Self {
        Self { model: None }
    }
}

impl Default for LogisticRegressionClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl Classifier for LogisticRegressionClassifier {
    fn train(&mut self, features: &Array2<f64>, labels: &[usize]) -> Result<()> {
        let x = ndarray_to_densematrix(features);
        let y: Vec<i32> = labels.iter().map(|&l| l as i32).collect();

        let model = LogisticRegression::fit(&x, &y, LogisticRegressionParameters::default())
            .map_err(|e| {
                TriageError::Internal(format!("Failed to train logistic regression: {}", e))
            })?;

        self.model = Some(model);
        Ok(())
    }

    fn predict(&self, features: &Array2<f64>) -> Result<Vec<usize>> {
        let model = self
            .model
            .as_ref()
            .ok_or_else(|| TriageError::Internal("Model not trained".to_string()))?;

        let x = ndarray_to_densematrix(features);
        let predictions = model
            .predict(&x)
            .map_err(|e| TriageError::Internal(format!("Prediction failed: {}", e)))?;

        Ok(predictions.iter().map(|&l| l as usize).collect())
    }

    fn is_trained(&self) -> bool {
        self.model.is_some()
    }
}

/// Gaussian Naive Bayes
pub struct NaiveBayesClassifier {
    model: Option<GaussianNB<f64, usize, DenseMatrix<f64>, Vec<usize>>>,
}

impl NaiveBayesClassifier {
    pub fn new() -> Self {
        Self { model: None }
    }
}

impl Default for NaiveBayesClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl Classifier for NaiveBayesClassifier {
    fn train(&mut self, features: &Array2<f64>, labels: &[usize]) -> Result<()> {
        let x = ndarray_to_densematrix(features);
        let y: Vec<usize> = labels.to_vec();

        let model = GaussianNB::fit(&x, &y, Default::default())
            .map_err(|e| TriageError::Internal(format!("Failed to train Naive Bayes: {}", e)))?;

        self.model = Some(model);
        Ok(())
    }

    fn predict(&self, features: &Array2<f64>) -> Result<Vec<usize>> {
        let model = self
            .model
            .as_ref()
            .ok_or_else(|| TriageError::Internal("Model not trained".to_string()))?;

        let x = ndarray_to_densematrix(features);
        model
            .predict(&x)
            .map_err(|e| TriageError::Internal(format!("Prediction failed: {}", e)))
    }

    fn is_trained(&self) -> bool {
        self.model.is_some()
    }
}

/// Gini decision tree (the forest-family option)
pub struct DecisionTreeClassifierWrapper {
    model: Option<DecisionTreeClassifier<f64, i32, DenseMatrix<f64>, Vec<i32>>>,
}

impl DecisionTreeClassifierWrapper {
    pub fn new() -> Self {
        Self { model: None }
    }
}

impl Default for DecisionTreeClassifierWrapper {
    fn default() -> Self {
        Self::new()
    }
}

impl Classifier for DecisionTreeClassifierWrapper {
    fn train(&mut self, features: &Array2<f64>, labels: &[usize]) -> Result<()> {
        let x = ndarray_to_densematrix(features);
        let y: Vec<i32> = labels.iter().map(|&l| l as i32).collect();

        let params = DecisionTreeClassifierParameters::default()
            .with_max_depth(DECISION_TREE_MAX_DEPTH)
            .with_criterion(SplitCriterion::Gini);

        let model = DecisionTreeClassifier::fit(&x, &y, params)
            .map_err(|e| TriageError::Internal(format!("Failed to train decision tree: {}", e)))?;

        self.model = Some(model);
        Ok(())
    }

    fn predict(&self, features: &Array2<f64>) -> Result<Vec<usize>> {
        let model = self
            .model
            .as_ref()
            .ok_or_else(|| TriageError::Internal("Model not trained".to_string()))?;

        let x = ndarray_to_densematrix(features);
        let predictions = model
            .predict(&x)
            .map_err(|e| TriageError::Internal(format!("Prediction failed: {}", e)))?;

        Ok(predictions.iter().map(|&l| l as usize).collect())
    }

    fn is_trained(&self) -> bool {
        self.model.is_some()
    }
}

fn make_classifier(algorithm: Algorithm) -> Box<dyn Classifier> {
    match algorithm {
        Algorithm::NaiveBayes => Box::new(NaiveBayesClassifier::new()),
        Algorithm::LogisticRegression => Box::new(LogisticRegressionClassifier::new()),
        Algorithm::DecisionTree => Box::new(DecisionTreeClassifierWrapper::new()),
    }
}

/// A trained model together with everything needed to serve predictions:
/// the fitted extractor and the label list the indices refer to.
pub struct TrainedModel {
    pub version: ModelVersion,
    pub extractor: FeatureExtractor,
    pub model: Box<dyn Classifier>,
    pub labels: Vec<String>,
}

impl std::fmt::Debug for TrainedModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrainedModel")
            .field("version", &self.version)
            .field("labels", &self.labels)
            .finish_non_exhaustive()
    }
}

/// Train a candidate model with a held-out validation split.
///
/// Fails with `InsufficientData` below `min_samples` without side effects.
/// The split is deterministic: every k-th sample is held out, so repeated
/// training runs on the same data produce the same metrics.
pub fn train_candidate(
    samples: &[LabeledSample],
    algorithm: Algorithm,
    validation_split: f64,
    min_samples: usize,
) -> Result<TrainedModel> {
    if samples.len() < min_samples {
        return Err(TriageError::InsufficientData {
            got: samples.len(),
            need: min_samples,
        });
    }

    let mut extractor = FeatureExtractor::new();
    let texts: Vec<String> = samples.iter().map(|s| s.text.clone()).collect();
    extractor.fit(&texts);

    let mut labels: Vec<String> = samples.iter().map(|s| s.category.clone()).collect();
    labels.sort();
    labels.dedup();

    let label_index: HashMap<&str, usize> = labels
        .iter()
        .enumerate()
        .map(|(i, l)| (l.as_str(), i))
        .collect();

    let y: Vec<usize> = samples
        .iter()
        .map(|s| label_index[s.category.as_str()])
        .collect();

    // Interleaved hold-out keeps every category represented on both sides
    let stride = if validation_split > 0.0 {
        (1.0 / validation_split).round().max(2.0) as usize
    } else {
        usize::MAX
    };

    let mut train_rows = Vec::new();
    let mut valid_rows = Vec::new();
    for i in 0..samples.len() {
        if stride != usize::MAX && i % stride == stride - 1 {
            valid_rows.push(i);
        } else {
            train_rows.push(i);
        }
    }

    let n_features = extractor.vocab_size();
    let build_matrix = |rows: &[usize]| -> Array2<f64> {
        let mut matrix = Array2::zeros((rows.len(), n_features));
        for (out_row, &in_row) in rows.iter().enumerate() {
            let vector = extractor.transform_vec(&samples[in_row].text);
            for (col, value) in vector.into_iter().enumerate() {
                matrix[[out_row, col]] = value;
            }
        }
        matrix
    };

    let train_x = build_matrix(&train_rows);
    let train_y: Vec<usize> = train_rows.iter().map(|&i| y[i]).collect();

    let mut model = make_classifier(algorithm);
    model.train(&train_x, &train_y)?;

    // Held-out metrics; fall back to training-set metrics when no split
    let (eval_rows, eval_y) = if valid_rows.is_empty() {
        (train_rows.clone(), train_y.clone())
    } else {
        let vy: Vec<usize> = valid_rows.iter().map(|&i| y[i]).collect();
        (valid_rows, vy)
    };

    let eval_x = build_matrix(&eval_rows);
    let predictions = model.predict(&eval_x)?;

    let accuracy = calculate_accuracy(&eval_y, &predictions);
    let per_category_precision = calculate_precision(&eval_y, &predictions, &labels);

    let version = ModelVersion::candidate(algorithm, accuracy, per_category_precision, samples.len());

    tracing::info!(
        model_id = %version.id,
        algorithm = %algorithm,
        samples = samples.len(),
        held_out = eval_y.len(),
        accuracy = accuracy,
        "Candidate model trained"
    );

    Ok(TrainedModel {
        version,
        extractor,
        model,
        labels,
    })
}

fn calculate_accuracy(y_true: &[usize], y_pred: &[usize]) -> f64 {
    if y_true.is_empty() {
        return 0.0;
    }
    let correct = y_true
        .iter()
        .zip(y_pred.iter())
        .filter(|(t, p)| t == p)
        .count();
    correct as f64 / y_true.len() as f64
}

fn calculate_precision(
    y_true: &[usize],
    y_pred: &[usize],
    labels: &[String],
) -> HashMap<String, f64> {
    let mut precision = HashMap::new();

    for (idx, label) in labels.iter().enumerate() {
        let tp = y_true
            .iter()
            .zip(y_pred.iter())
            .filter(|(t, p)| **t == idx && **p == idx)
            .count();
        let fp = y_true
            .iter()
            .zip(y_pred.iter())
            .filter(|(t, p)| **t != idx && **p == idx)
            .count();

        if tp + fp > 0 {
            precision.insert(label.clone(), tp as f64 / (tp + fp) as f64);
        }
    }

    precision
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_samples(n: usize) -> Vec<LabeledSample> {
        (0..n)
            .map(|i| {
                if i % 2 == 0 {
                    LabeledSample::new(
                        format!("database deadlock connection timeout incident {}", i),
                        "infrastructure.database",
                    )
                } else {
                    LabeledSample::new(
                        format!("batch job abend scheduler restart incident {}", i),
                        "application.batch",
                    )
                }
            })
            .collect()
    }

    #[test]
    fn test_insufficient_data_aborts() {
        let samples = make_samples(10);
        let err = train_candidate(&samples, Algorithm::NaiveBayes, 0.2, 100).unwrap_err();

        match err {
            TriageError::InsufficientData { got, need } => {
                assert_eq!(got, 10);
                assert_eq!(need, 100);
            }
            other => panic!("expected InsufficientData, got {:?}", other),
        }
    }

    #[test]
    fn test_train_naive_bayes_candidate() {
        let samples = make_samples(120);
        let trained = train_candidate(&samples, Algorithm::NaiveBayes, 0.2, 100).unwrap();

        assert!(trained.model.is_trained());
        assert_eq!(trained.labels.len(), 2);
        assert!((0.0..=1.0).contains(&trained.version.held_out_accuracy));
        assert_eq!(trained.version.algorithm, Algorithm::NaiveBayes);
        assert_eq!(trained.version.n_training_samples, 120);
    }

    #[test]
    fn test_train_logistic_regression_candidate() {
        let samples = make_samples(120);
        let trained = train_candidate(&samples, Algorithm::LogisticRegression, 0.2, 100).unwrap();

        assert!(trained.model.is_trained());
        // Clearly separable vocabulary: held-out accuracy should be high
        assert!(trained.version.held_out_accuracy > 0.8);
    }

    #[test]
    fn test_train_decision_tree_candidate() {
        let samples = make_samples(120);
        let trained = train_candidate(&samples, Algorithm::DecisionTree, 0.2, 100).unwrap();

        assert!(trained.model.is_trained());
        assert!(!trained.version.per_category_precision.is_empty());
    }

    #[test]
    fn test_predict_matches_training_separation() {
        let samples = make_samples(120);
        let trained = train_candidate(&samples, Algorithm::LogisticRegression, 0.2, 100).unwrap();

        let v = trained
            .extractor
            .transform_vec("database connection deadlock");
        let x = Array2::from_shape_vec((1, v.len()), v).unwrap();
        let pred = trained.model.predict(&x).unwrap();
        assert_eq!(trained.labels[pred[0]], "infrastructure.database");
    }

    #[test]
    fn test_metrics_helpers() {
        let y_true = vec![0, 0, 1, 1];
        let y_pred = vec![0, 1, 1, 1];
        assert_eq!(calculate_accuracy(&y_true, &y_pred), 0.75);

        let labels = vec!["a".to_string(), "b".to_string()];
        let precision = calculate_precision(&y_true, &y_pred, &labels);
        assert_eq!(precision["a"], 1.0);
        assert!((precision["b"] - 2.0 / 3.0).abs() < 1e-9);
    }
}
