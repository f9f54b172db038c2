//! Classification metrics for binary churn labels.

use crate::config::ScoringMetric;
use crate::error::{LearningError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Fraction of positions where `predicted` equals `actual`.
pub fn accuracy(predicted: &[u8], actual: &[u8]) -> Result<f64> {
    check_lengths(predicted, actual)?;
    let hits = predicted.iter().zip(actual).filter(|(p, a)| p == a).count();
    Ok(hits as f64 / actual.len() as f64)
}

/// Score predictions with `metric`.
pub fn score(metric: ScoringMetric, predicted: &[u8], actual: &[u8]) -> Result<f64> {
    match metric {
        ScoringMetric::Accuracy => accuracy(predicted, actual),
    }
}

fn check_lengths(predicted: &[u8], actual: &[u8]) -> Result<()> {
    if predicted.len() != actual.len() {
        return Err(LearningError::InvalidData(format!(
            "{} predictions for {} labels",
            predicted.len(),
            actual.len()
        )));
    }
    if actual.is_empty() {
        return Err(LearningError::InvalidData("no labels to score".to_string()));
    }
    Ok(())
}

/// Precision, recall and F1 for one class.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassMetrics {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub support: usize,
}

impl ClassMetrics {
    fn from_counts(tp: usize, fp: usize, fn_: usize) -> Self {
        let precision = ratio(tp, tp + fp);
        let recall = ratio(tp, tp + fn_);
        let f1 = if precision + recall > 0.0 {
            2.0 * precision * recall / (precision + recall)
        } else {
            0.0
        };
        Self {
            precision,
            recall,
            f1,
            support: tp + fn_,
        }
    }
}

/// Zero when the denominator is zero.
fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 { 0.0 } else { num as f64 / den as f64 }
}

/// Per-class and averaged metrics for a binary classifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationReport {
    /// Indexed by label: `[No, Yes]`.
    pub classes: [ClassMetrics; 2],
    pub accuracy: f64,
    pub macro_avg: ClassMetrics,
    pub weighted_avg: ClassMetrics,
}

impl ClassificationReport {
    pub fn new(predicted: &[u8], actual: &[u8]) -> Result<Self> {
        check_lengths(predicted, actual)?;

        // confusion[actual][predicted]
        let mut confusion = [[0usize; 2]; 2];
        for (&p, &a) in predicted.iter().zip(actual) {
            if p > 1 || a > 1 {
                return Err(LearningError::InvalidData(format!(
                    "labels must be 0 or 1, got predicted={p} actual={a}"
                )));
            }
            confusion[usize::from(a)][usize::from(p)] += 1;
        }

        let classes = [0, 1].map(|c| {
            let other = 1 - c;
            ClassMetrics::from_counts(confusion[c][c], confusion[other][c], confusion[c][other])
        });

        let total = actual.len();
        let macro_avg = ClassMetrics {
            precision: classes.iter().map(|m| m.precision).sum::<f64>() / 2.0,
            recall: classes.iter().map(|m| m.recall).sum::<f64>() / 2.0,
            f1: classes.iter().map(|m| m.f1).sum::<f64>() / 2.0,
            support: total,
        };
        let weight = |f: fn(&ClassMetrics) -> f64| {
            classes.iter().map(|m| f(m) * m.support as f64).sum::<f64>() / total as f64
        };
        let weighted_avg = ClassMetrics {
            precision: weight(|m| m.precision),
            recall: weight(|m| m.recall),
            f1: weight(|m| m.f1),
            support: total,
        };

        Ok(Self {
            classes,
            accuracy: ratio(confusion[0][0] + confusion[1][1], total),
            macro_avg,
            weighted_avg,
        })
    }
}

impl fmt::Display for ClassificationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{:>14} {:>9} {:>9} {:>9} {:>9}", "", "precision", "recall", "f1-score", "support")?;
        for (name, m) in ["No", "Yes"].iter().zip(&self.classes) {
            writeln!(
                f,
                "{:>14} {:>9.2} {:>9.2} {:>9.2} {:>9}",
                name, m.precision, m.recall, m.f1, m.support
            )?;
        }
        writeln!(f)?;
        writeln!(
            f,
            "{:>14} {:>9} {:>9} {:>9.2} {:>9}",
            "accuracy", "", "", self.accuracy, self.macro_avg.support
        )?;
        for (name, m) in [("macro avg", &self.macro_avg), ("weighted avg", &self.weighted_avg)] {
            writeln!(
                f,
                "{:>14} {:>9.2} {:>9.2} {:>9.2} {:>9}",
                name, m.precision, m.recall, m.f1, m.support
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-12
    }

    #[test]
    fn test_accuracy() {
        assert!(close(accuracy(&[1, 0, 1, 1], &[1, 0, 0, 1]).unwrap(), 0.75));
        assert!(accuracy(&[1], &[1, 0]).is_err());
        assert!(accuracy(&[], &[]).is_err());
    }

    #[test]
    fn test_report_counts() {
        // actual:    1 1 1 0 0 0 0 0
        // predicted: 1 1 0 1 0 0 0 0
        let actual = [1, 1, 1, 0, 0, 0, 0, 0];
        let predicted = [1, 1, 0, 1, 0, 0, 0, 0];
        let report = ClassificationReport::new(&predicted, &actual).unwrap();

        let yes = report.classes[1];
        assert!(close(yes.precision, 2.0 / 3.0));
        assert!(close(yes.recall, 2.0 / 3.0));
        assert_eq!(yes.support, 3);

        let no = report.classes[0];
        assert!(close(no.precision, 4.0 / 5.0));
        assert!(close(no.recall, 4.0 / 5.0));
        assert_eq!(no.support, 5);

        assert!(close(report.accuracy, 0.75));
        assert!(close(report.macro_avg.recall, (2.0 / 3.0 + 0.8) / 2.0));
        assert!(close(report.weighted_avg.recall, report.accuracy));
    }

    #[test]
    fn test_report_without_positive_predictions() {
        let report = ClassificationReport::new(&[0, 0, 0], &[0, 1, 0]).unwrap();
        assert_eq!(report.classes[1].precision, 0.0);
        assert_eq!(report.classes[1].f1, 0.0);
    }

    #[test]
    fn test_report_display() {
        let report = ClassificationReport::new(&[1, 0], &[1, 0]).unwrap();
        let text = report.to_string();
        assert!(text.contains("precision"));
        assert!(text.contains("weighted avg"));
        assert!(text.contains("1.00"));
    }

    #[test]
    fn test_score_dispatch() {
        let s = score(ScoringMetric::Accuracy, &[1, 1], &[1, 0]).unwrap();
        assert!(close(s, 0.5));
    }
}
