//! Streaming confusion-area accumulation and segmentation metrics
//!
//! Per-class pixel areas are accumulated sample by sample into a
//! [`ConfusionAreaAccumulator`]. Once every sample has been seen, the final
//! [`PixelAreaCounts`] are handed to the pure derivation functions
//! ([`mean_iou`], [`accuracy`], [`kappa`], [`dice`], [`class_measurement`]).
//!
//! Area counts are additive across disjoint sample sets, so accumulators built
//! independently can be combined with [`ConfusionAreaAccumulator::merge`]
//! before metrics are derived.
//!
//! ```rust
//! use ndarray::array;
//! use segeval::metrics::{mean_iou, ConfusionAreaAccumulator};
//!
//! # fn main() -> segeval::Result<()> {
//! let mut acc = ConfusionAreaAccumulator::new(2, 255)?;
//! let gt = array![[0u32, 1], [1, 0]];
//! let pred = array![[0u32, 1], [1, 1]];
//! acc.accumulate(pred.view(), gt.view())?;
//!
//! let (class_iou, miou) = mean_iou(acc.counts());
//! assert_eq!(class_iou.len(), 2);
//! assert!((miou - 0.5833).abs() < 1e-4);
//! # Ok(())
//! # }
//! ```

use crate::error::{Result, SegEvalError};
use ndarray::{Array2, ArrayView2};
use serde::{Deserialize, Serialize};

/// 2-D grid of class indices (rows x cols)
pub type LabelMap = Array2<u32>;

/// Ignore index used by Cityscapes, PascalVOC and ADE20K ground truth
pub const DEFAULT_IGNORE_INDEX: u32 = 255;

/// Per-class intersect / predicted / label pixel areas
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PixelAreaCounts {
    /// Pixels where prediction and ground truth both equal the class
    pub intersect: Vec<u64>,
    /// Pixels predicted as the class (ignored ground truth excluded)
    pub predicted: Vec<u64>,
    /// Ground-truth pixels of the class
    pub label: Vec<u64>,
}

impl PixelAreaCounts {
    /// Zeroed counts for `num_classes` classes
    #[must_use]
    pub fn zeros(num_classes: usize) -> Self {
        Self {
            intersect: vec![0; num_classes],
            predicted: vec![0; num_classes],
            label: vec![0; num_classes],
        }
    }

    #[must_use]
    pub fn num_classes(&self) -> usize {
        self.label.len()
    }

    /// Total number of non-ignored ground-truth pixels
    #[must_use]
    pub fn total_area(&self) -> u64 {
        self.label.iter().sum()
    }

    /// Element-wise sum with another set of counts
    ///
    /// # Errors
    /// - The two count sets cover a different number of classes
    pub fn add(&mut self, other: &Self) -> Result<()> {
        if other.num_classes() != self.num_classes() {
            return Err(SegEvalError::invalid_config(format!(
                "Cannot combine area counts for {} and {} classes",
                self.num_classes(),
                other.num_classes()
            )));
        }

        for (dst, src) in self.intersect.iter_mut().zip(&other.intersect) {
            *dst += src;
        }
        for (dst, src) in self.predicted.iter_mut().zip(&other.predicted) {
            *dst += src;
        }
        for (dst, src) in self.label.iter_mut().zip(&other.label) {
            *dst += src;
        }
        Ok(())
    }
}

/// Compute the per-class areas contributed by a single sample
///
/// Pixels whose ground truth equals `ignore_index` contribute to none of the
/// three area vectors. Every other ground-truth value, and every prediction at
/// a non-ignored pixel, must be a valid class index.
///
/// # Errors
/// - [`SegEvalError::ShapeMismatch`] when the grids differ in size
/// - [`SegEvalError::ClassIndexOutOfRange`] for indices `>= num_classes`
pub fn calculate_area(
    predicted: ArrayView2<'_, u32>,
    ground_truth: ArrayView2<'_, u32>,
    num_classes: usize,
    ignore_index: u32,
) -> Result<PixelAreaCounts> {
    if predicted.dim() != ground_truth.dim() {
        return Err(SegEvalError::ShapeMismatch {
            expected: ground_truth.dim(),
            actual: predicted.dim(),
        });
    }

    let mut counts = PixelAreaCounts::zeros(num_classes);

    for (&pred, &gt) in predicted.iter().zip(ground_truth.iter()) {
        if gt == ignore_index {
            continue;
        }

        let gt_slot = class_slot(gt, num_classes)?;
        let pred_slot = class_slot(pred, num_classes)?;

        if let Some(area) = counts.label.get_mut(gt_slot) {
            *area += 1;
        }
        if let Some(area) = counts.predicted.get_mut(pred_slot) {
            *area += 1;
        }
        if gt_slot == pred_slot {
            if let Some(area) = counts.intersect.get_mut(gt_slot) {
                *area += 1;
            }
        }
    }

    Ok(counts)
}

fn class_slot(value: u32, num_classes: usize) -> Result<usize> {
    let slot = value as usize;
    if slot >= num_classes {
        return Err(SegEvalError::ClassIndexOutOfRange { value, num_classes });
    }
    Ok(slot)
}

/// Running per-class area totals over a stream of samples
///
/// The accumulator is owned by a single evaluation loop. Each call to
/// [`accumulate`](Self::accumulate) validates the sample completely before
/// touching the running totals, so a rejected sample leaves the state as it
/// was.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfusionAreaAccumulator {
    counts: PixelAreaCounts,
    ignore_index: u32,
    samples: usize,
}

impl ConfusionAreaAccumulator {
    /// Create an accumulator with zeroed counts
    ///
    /// # Errors
    /// - `num_classes` is zero
    pub fn new(num_classes: usize, ignore_index: u32) -> Result<Self> {
        if num_classes == 0 {
            return Err(SegEvalError::config_value_error(
                "number of classes",
                num_classes,
                ">= 1",
            ));
        }

        Ok(Self {
            counts: PixelAreaCounts::zeros(num_classes),
            ignore_index,
            samples: 0,
        })
    }

    /// Add one (prediction, ground truth) pair to the running totals
    ///
    /// # Errors
    /// See [`calculate_area`]. On error the running totals are unchanged.
    pub fn accumulate(
        &mut self,
        predicted: ArrayView2<'_, u32>,
        ground_truth: ArrayView2<'_, u32>,
    ) -> Result<()> {
        let sample = calculate_area(
            predicted,
            ground_truth,
            self.num_classes(),
            self.ignore_index,
        )?;
        self.counts.add(&sample)?;
        self.samples += 1;
        Ok(())
    }

    /// Fold another accumulator's totals into this one
    ///
    /// # Errors
    /// - Class count or ignore index differ
    pub fn merge(&mut self, other: &Self) -> Result<()> {
        if other.ignore_index != self.ignore_index {
            return Err(SegEvalError::invalid_config(format!(
                "Cannot merge accumulators with ignore index {} and {}",
                self.ignore_index, other.ignore_index
            )));
        }
        self.counts.add(&other.counts)?;
        self.samples += other.samples;
        Ok(())
    }

    /// Reduce independently built accumulators into one
    ///
    /// # Errors
    /// - No accumulators given
    /// - Incompatible accumulators (see [`merge`](Self::merge))
    pub fn merge_all<I>(accumulators: I) -> Result<Self>
    where
        I: IntoIterator<Item = Self>,
    {
        let mut iter = accumulators.into_iter();
        let mut total = iter
            .next()
            .ok_or_else(|| SegEvalError::invalid_config("No accumulators to merge"))?;
        for acc in iter {
            total.merge(&acc)?;
        }
        Ok(total)
    }

    #[must_use]
    pub fn counts(&self) -> &PixelAreaCounts {
        &self.counts
    }

    #[must_use]
    pub fn into_counts(self) -> PixelAreaCounts {
        self.counts
    }

    #[must_use]
    pub fn num_classes(&self) -> usize {
        self.counts.num_classes()
    }

    #[must_use]
    pub fn ignore_index(&self) -> u32 {
        self.ignore_index
    }

    /// Number of samples accumulated so far
    #[must_use]
    pub fn samples(&self) -> usize {
        self.samples
    }

    /// Derive every metric from the current totals
    #[must_use]
    pub fn summary(&self) -> MetricSummary {
        MetricSummary::from_counts(&self.counts)
    }
}

fn ratio(numerator: u64, denominator: u64) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

/// Per-class IoU and its mean over classes present in prediction or ground truth
///
/// Classes absent from both are reported as 0 and excluded from the mean.
#[must_use]
pub fn mean_iou(counts: &PixelAreaCounts) -> (Vec<f64>, f64) {
    let mut class_iou = Vec::with_capacity(counts.num_classes());
    let mut sum = 0.0;
    let mut valid = 0usize;

    for ((&intersect, &pred), &label) in counts
        .intersect
        .iter()
        .zip(&counts.predicted)
        .zip(&counts.label)
    {
        let union = pred + label - intersect;
        let iou = ratio(intersect, union);
        if union != 0 {
            sum += iou;
            valid += 1;
        }
        class_iou.push(iou);
    }

    let miou = if valid == 0 { 0.0 } else { sum / valid as f64 };
    (class_iou, miou)
}

/// Per-class accuracy (`intersect / predicted`) and overall pixel accuracy
#[must_use]
pub fn accuracy(counts: &PixelAreaCounts) -> (Vec<f64>, f64) {
    let class_acc = counts
        .intersect
        .iter()
        .zip(&counts.predicted)
        .map(|(&intersect, &pred)| ratio(intersect, pred))
        .collect();

    let overall = ratio(
        counts.intersect.iter().sum(),
        counts.predicted.iter().sum(),
    );
    (class_acc, overall)
}

/// Cohen's kappa from aggregated confusion areas
///
/// Returns 0 when expected agreement is exactly 1 or no pixels were counted.
#[must_use]
pub fn kappa(counts: &PixelAreaCounts) -> f64 {
    let total = u128::from(counts.total_area());
    if total == 0 {
        return 0.0;
    }

    let observed: u128 = counts.intersect.iter().map(|&a| u128::from(a)).sum();
    let expected: u128 = counts
        .predicted
        .iter()
        .zip(&counts.label)
        .map(|(&pred, &label)| u128::from(pred) * u128::from(label))
        .sum();

    let total_sq = total * total;
    if expected == total_sq {
        return 0.0;
    }

    let po = observed as f64 / total as f64;
    let pe = expected as f64 / total_sq as f64;
    (po - pe) / (1.0 - pe)
}

/// Per-class Dice coefficient and its mean over classes with nonzero area
#[must_use]
pub fn dice(counts: &PixelAreaCounts) -> (Vec<f64>, f64) {
    let mut class_dice = Vec::with_capacity(counts.num_classes());
    let mut sum = 0.0;
    let mut valid = 0usize;

    for ((&intersect, &pred), &label) in counts
        .intersect
        .iter()
        .zip(&counts.predicted)
        .zip(&counts.label)
    {
        let denom = pred + label;
        let value = ratio(2 * intersect, denom);
        if denom != 0 {
            sum += value;
            valid += 1;
        }
        class_dice.push(value);
    }

    let mdice = if valid == 0 { 0.0 } else { sum / valid as f64 };
    (class_dice, mdice)
}

/// Per-class precision (`intersect / predicted`) and recall (`intersect / label`)
#[must_use]
pub fn class_measurement(counts: &PixelAreaCounts) -> (Vec<f64>, Vec<f64>) {
    let precision = counts
        .intersect
        .iter()
        .zip(&counts.predicted)
        .map(|(&i, &p)| ratio(i, p))
        .collect();
    let recall = counts
        .intersect
        .iter()
        .zip(&counts.label)
        .map(|(&i, &l)| ratio(i, l))
        .collect();
    (precision, recall)
}

/// All metrics derived from one set of final counts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSummary {
    pub miou: f64,
    pub accuracy: f64,
    pub kappa: f64,
    pub mean_dice: f64,
    pub class_iou: Vec<f64>,
    pub class_accuracy: Vec<f64>,
    pub class_dice: Vec<f64>,
    pub class_precision: Vec<f64>,
    pub class_recall: Vec<f64>,
}

impl MetricSummary {
    #[must_use]
    pub fn from_counts(counts: &PixelAreaCounts) -> Self {
        let (class_iou, miou) = mean_iou(counts);
        let (class_accuracy, accuracy) = accuracy(counts);
        let (class_dice, mean_dice) = dice(counts);
        let (class_precision, class_recall) = class_measurement(counts);

        Self {
            miou,
            accuracy,
            kappa: kappa(counts),
            mean_dice,
            class_iou,
            class_accuracy,
            class_dice,
            class_precision,
            class_recall,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 1e-9,
            "expected {expected}, got {actual}"
        );
    }

    fn scenario() -> (LabelMap, LabelMap) {
        let gt = array![[0u32, 1], [1, 0]];
        let pred = array![[0u32, 1], [1, 1]];
        (pred, gt)
    }

    /// Small LCG so the invariant tests cover many label layouts deterministically
    fn pseudo_random_map(seed: &mut u64, rows: usize, cols: usize, classes: u32) -> LabelMap {
        Array2::from_shape_fn((rows, cols), |_| {
            *seed = seed
                .wrapping_mul(6_364_136_223_846_793_005)
                .wrapping_add(1_442_695_040_888_963_407);
            let value = ((*seed >> 33) % u64::from(classes + 1)) as u32;
            if value == classes {
                DEFAULT_IGNORE_INDEX
            } else {
                value
            }
        })
    }

    #[test]
    fn test_reference_scenario_areas() {
        let (pred, gt) = scenario();
        let counts = calculate_area(pred.view(), gt.view(), 2, 255).unwrap();

        assert_eq!(counts.label, vec![2, 2]);
        assert_eq!(counts.predicted, vec![1, 3]);
        assert_eq!(counts.intersect, vec![1, 2]);
    }

    #[test]
    fn test_reference_scenario_metrics() {
        let (pred, gt) = scenario();
        let mut acc = ConfusionAreaAccumulator::new(2, 255).unwrap();
        acc.accumulate(pred.view(), gt.view()).unwrap();

        let (class_iou, miou) = mean_iou(acc.counts());
        assert_close(class_iou[0], 0.5);
        assert_close(class_iou[1], 2.0 / 3.0);
        assert_close(miou, (0.5 + 2.0 / 3.0) / 2.0);

        let (class_acc, overall) = accuracy(acc.counts());
        assert_close(overall, 0.75);
        assert_close(class_acc[0], 1.0);
        assert_close(class_acc[1], 2.0 / 3.0);

        // po = 3/4, pe = (1*2 + 3*2) / 16 = 1/2
        assert_close(kappa(acc.counts()), 0.5);
    }

    #[test]
    fn test_ignored_pixel_contributes_nothing() {
        let (pred, gt) = scenario();
        let baseline = calculate_area(pred.view(), gt.view(), 2, 255).unwrap();

        let gt_with_ignore = array![[0u32, 1, 255], [1, 0, 255]];
        let pred_with_ignore = array![[0u32, 1, 0], [1, 1, 1]];
        let with_ignore =
            calculate_area(pred_with_ignore.view(), gt_with_ignore.view(), 2, 255).unwrap();

        assert_eq!(baseline, with_ignore);
    }

    #[test]
    fn test_prediction_value_ignored_where_ground_truth_ignored() {
        // An out-of-range prediction is tolerated on ignored pixels
        let gt = array![[255u32, 0]];
        let pred = array![[255u32, 0]];
        let counts = calculate_area(pred.view(), gt.view(), 2, 255).unwrap();
        assert_eq!(counts.predicted, vec![1, 0]);
    }

    #[test]
    fn test_shape_mismatch_is_rejected() {
        let gt = array![[0u32, 1], [1, 0]];
        let pred = array![[0u32, 1, 1], [1, 0, 0]];
        let mut acc = ConfusionAreaAccumulator::new(2, 255).unwrap();

        let err = acc.accumulate(pred.view(), gt.view()).unwrap_err();
        assert!(matches!(
            err,
            SegEvalError::ShapeMismatch {
                expected: (2, 2),
                actual: (2, 3)
            }
        ));
        assert_eq!(acc.samples(), 0);
        assert_eq!(acc.counts(), &PixelAreaCounts::zeros(2));
    }

    #[test]
    fn test_out_of_range_class_leaves_state_untouched() {
        let mut acc = ConfusionAreaAccumulator::new(2, 255).unwrap();
        let (pred, gt) = scenario();
        acc.accumulate(pred.view(), gt.view()).unwrap();
        let before = acc.clone();

        let bad_gt = array![[0u32, 3]];
        let bad_pred = array![[0u32, 1]];
        let err = acc.accumulate(bad_pred.view(), bad_gt.view()).unwrap_err();
        assert!(matches!(
            err,
            SegEvalError::ClassIndexOutOfRange {
                value: 3,
                num_classes: 2
            }
        ));
        assert_eq!(acc, before);

        let bad_pred = array![[0u32, 2]];
        let ok_gt = array![[0u32, 1]];
        assert!(acc.accumulate(bad_pred.view(), ok_gt.view()).is_err());
        assert_eq!(acc, before);
    }

    #[test]
    fn test_empty_input_contributes_zero() {
        let empty = LabelMap::zeros((0, 0));
        let mut acc = ConfusionAreaAccumulator::new(3, 255).unwrap();
        acc.accumulate(empty.view(), empty.view()).unwrap();

        assert_eq!(acc.counts(), &PixelAreaCounts::zeros(3));
        assert_eq!(acc.samples(), 1);

        let summary = acc.summary();
        assert_close(summary.miou, 0.0);
        assert_close(summary.accuracy, 0.0);
        assert_close(summary.kappa, 0.0);
    }

    #[test]
    fn test_zero_classes_rejected() {
        assert!(ConfusionAreaAccumulator::new(0, 255).is_err());
    }

    #[test]
    fn test_intersect_never_exceeds_areas() {
        let mut seed = 42;
        let mut acc = ConfusionAreaAccumulator::new(5, DEFAULT_IGNORE_INDEX).unwrap();

        for step in 0..50 {
            let rows = 1 + step % 7;
            let cols = 1 + step % 5;
            let gt = pseudo_random_map(&mut seed, rows, cols, 5);
            let pred = pseudo_random_map(&mut seed, rows, cols, 5).mapv(|v| v % 5);
            acc.accumulate(pred.view(), gt.view()).unwrap();

            let counts = acc.counts();
            for c in 0..5 {
                assert!(counts.intersect[c] <= counts.predicted[c]);
                assert!(counts.intersect[c] <= counts.label[c]);
            }
        }
        assert_eq!(acc.samples(), 50);
    }

    #[test]
    fn test_accumulation_is_associative() {
        let mut seed = 7;
        let samples: Vec<(LabelMap, LabelMap)> = (0..6)
            .map(|_| {
                let gt = pseudo_random_map(&mut seed, 6, 4, 3);
                let pred = pseudo_random_map(&mut seed, 6, 4, 3).mapv(|v| v % 3);
                (pred, gt)
            })
            .collect();

        let mut single = ConfusionAreaAccumulator::new(3, 255).unwrap();
        for (pred, gt) in &samples {
            single.accumulate(pred.view(), gt.view()).unwrap();
        }

        let (first_half, second_half) = samples.split_at(3);
        let mut left = ConfusionAreaAccumulator::new(3, 255).unwrap();
        for (pred, gt) in first_half {
            left.accumulate(pred.view(), gt.view()).unwrap();
        }
        let mut right = ConfusionAreaAccumulator::new(3, 255).unwrap();
        for (pred, gt) in second_half {
            right.accumulate(pred.view(), gt.view()).unwrap();
        }

        let merged = ConfusionAreaAccumulator::merge_all(vec![left.clone(), right.clone()]).unwrap();
        assert_eq!(merged.counts(), single.counts());
        assert_eq!(merged.samples(), single.samples());

        // Merge order does not matter
        let reversed = ConfusionAreaAccumulator::merge_all(vec![right, left]).unwrap();
        assert_eq!(reversed.counts(), single.counts());
    }

    #[test]
    fn test_merge_rejects_incompatible_accumulators() {
        let mut a = ConfusionAreaAccumulator::new(2, 255).unwrap();
        let b = ConfusionAreaAccumulator::new(3, 255).unwrap();
        assert!(a.merge(&b).is_err());

        let c = ConfusionAreaAccumulator::new(2, 0).unwrap();
        assert!(a.merge(&c).is_err());

        assert!(ConfusionAreaAccumulator::merge_all(Vec::new()).is_err());
    }

    #[test]
    fn test_derivations_are_idempotent() {
        let (pred, gt) = scenario();
        let mut acc = ConfusionAreaAccumulator::new(2, 255).unwrap();
        acc.accumulate(pred.view(), gt.view()).unwrap();
        let counts = acc.counts().clone();

        assert_eq!(mean_iou(&counts), mean_iou(&counts));
        assert_eq!(accuracy(&counts), accuracy(&counts));
        assert_eq!(kappa(&counts).to_bits(), kappa(&counts).to_bits());
        assert_eq!(acc.summary(), acc.summary());
        assert_eq!(acc.counts(), &counts);
    }

    #[test]
    fn test_kappa_degenerate_single_class() {
        let gt = array![[0u32, 0], [0, 0]];
        let pred = array![[0u32, 0], [0, 0]];
        let counts = calculate_area(pred.view(), gt.view(), 1, 255).unwrap();

        assert_close(kappa(&counts), 0.0);
        let (_, miou) = mean_iou(&counts);
        assert_close(miou, 1.0);
    }

    #[test]
    fn test_absent_class_excluded_from_mean() {
        // Class 2 never appears in prediction or ground truth
        let gt = array![[0u32, 1], [1, 0]];
        let pred = array![[0u32, 1], [1, 0]];
        let counts = calculate_area(pred.view(), gt.view(), 3, 255).unwrap();

        let (class_iou, miou) = mean_iou(&counts);
        assert_eq!(class_iou, vec![1.0, 1.0, 0.0]);
        assert_close(miou, 1.0);

        let (class_dice, mdice) = dice(&counts);
        assert_eq!(class_dice, vec![1.0, 1.0, 0.0]);
        assert_close(mdice, 1.0);
    }

    #[test]
    fn test_dice_and_class_measurement() {
        let (pred, gt) = scenario();
        let counts = calculate_area(pred.view(), gt.view(), 2, 255).unwrap();

        let (class_dice, mdice) = dice(&counts);
        assert_close(class_dice[0], 2.0 / 3.0);
        assert_close(class_dice[1], 0.8);
        assert_close(mdice, (2.0 / 3.0 + 0.8) / 2.0);

        let (precision, recall) = class_measurement(&counts);
        assert_close(precision[0], 1.0);
        assert_close(precision[1], 2.0 / 3.0);
        assert_close(recall[0], 0.5);
        assert_close(recall[1], 1.0);
    }

    #[test]
    fn test_summary_matches_individual_functions() {
        let (pred, gt) = scenario();
        let counts = calculate_area(pred.view(), gt.view(), 2, 255).unwrap();
        let summary = MetricSummary::from_counts(&counts);

        assert_eq!((summary.class_iou.clone(), summary.miou), mean_iou(&counts));
        assert_eq!(
            (summary.class_accuracy.clone(), summary.accuracy),
            accuracy(&counts)
        );
        assert_close(summary.kappa, kappa(&counts));
    }
}
