use std::fmt;

/// Mask-wearing state picked from a [`MaskPrediction`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MaskLabel {
    CorrectMask,
    IncorrectMask,
    WithoutMask,
}

impl MaskLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            MaskLabel::CorrectMask => "correct_mask",
            MaskLabel::IncorrectMask => "incorrect mask",
            MaskLabel::WithoutMask => "without mask",
        }
    }

    /// Overlay colour in B, G, R order.
    pub fn color_bgr(&self) -> [u8; 3] {
        match self {
            MaskLabel::CorrectMask => [0, 255, 0],
            MaskLabel::IncorrectMask => [255, 0, 0],
            MaskLabel::WithoutMask => [0, 0, 255],
        }
    }
}

impl fmt::Display for MaskLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classifier output for one face: softmax scores over the three classes.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MaskPrediction {
    pub correct_mask: f32,
    pub incorrect_mask: f32,
    pub without_mask: f32,
}

impl MaskPrediction {
    pub fn new(correct_mask: f32, incorrect_mask: f32, without_mask: f32) -> Self {
        Self {
            correct_mask,
            incorrect_mask,
            without_mask,
        }
    }

    /// Builds a prediction from a `[correct, incorrect, without]` score row.
    pub fn from_scores(scores: &[f32]) -> Option<Self> {
        match scores {
            [c, i, w] => Some(Self::new(*c, *i, *w)),
            _ => None,
        }
    }

    /// Highest score across the three classes.
    pub fn max_probability(&self) -> f32 {
        self.incorrect_mask
            .max(self.correct_mask)
            .max(self.without_mask)
    }

    /// Picks the label and its probability.
    ///
    /// `CorrectMask` is the fallback; `IncorrectMask` is checked first, then
    /// `WithoutMask`, each with `>=` against the maximum. Ties therefore
    /// resolve to incorrect, then without, then correct.
    pub fn decide(&self) -> (MaskLabel, f32) {
        let max_prob = self.max_probability();
        let mut label = MaskLabel::CorrectMask;
        if self.incorrect_mask >= max_prob {
            label = MaskLabel::IncorrectMask;
        } else if self.without_mask >= max_prob {
            label = MaskLabel::WithoutMask;
        }
        (label, max_prob)
    }

    pub fn label(&self) -> MaskLabel {
        self.decide().0
    }

    /// Overlay caption, e.g. `"without mask: 70.00%"`.
    pub fn caption(&self) -> String {
        let (label, prob) = self.decide();
        format!("{label}: {:.2}%", prob * 100.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rstest::rstest;

    #[test]
    fn test_confident_correct_mask_caption() {
        let p = MaskPrediction::new(0.9, 0.05, 0.05);
        assert_eq!(p.label(), MaskLabel::CorrectMask);
        assert_eq!(p.caption(), "correct_mask: 90.00%");
    }

    #[test]
    fn test_without_mask_caption() {
        let p = MaskPrediction::new(0.1, 0.2, 0.7);
        assert_eq!(p.label(), MaskLabel::WithoutMask);
        assert_eq!(p.caption(), "without mask: 70.00%");
    }

    #[test]
    fn test_incorrect_mask_caption() {
        let p = MaskPrediction::new(0.2, 0.75, 0.05);
        assert_eq!(p.caption(), "incorrect mask: 75.00%");
    }

    #[rstest]
    #[case::correct_incorrect_tie(MaskPrediction::new(0.4, 0.4, 0.2), MaskLabel::IncorrectMask)]
    #[case::correct_without_tie(MaskPrediction::new(0.4, 0.2, 0.4), MaskLabel::WithoutMask)]
    #[case::incorrect_without_tie(MaskPrediction::new(0.2, 0.4, 0.4), MaskLabel::IncorrectMask)]
    #[case::three_way_tie(MaskPrediction::new(0.5, 0.5, 0.5), MaskLabel::IncorrectMask)]
    fn test_tie_break_order(#[case] p: MaskPrediction, #[case] expected: MaskLabel) {
        assert_eq!(p.label(), expected);
    }

    #[test]
    fn test_tie_caption_uses_shared_maximum() {
        assert_eq!(
            MaskPrediction::new(0.4, 0.4, 0.2).caption(),
            "incorrect mask: 40.00%"
        );
    }

    #[test]
    fn test_decide_returns_max_probability() {
        let (_, prob) = MaskPrediction::new(0.3, 0.6, 0.1).decide();
        assert_relative_eq!(prob, 0.6);
    }

    #[test]
    fn test_from_scores() {
        assert_eq!(
            MaskPrediction::from_scores(&[0.1, 0.2, 0.7]),
            Some(MaskPrediction::new(0.1, 0.2, 0.7))
        );
        assert_eq!(MaskPrediction::from_scores(&[0.5, 0.5]), None);
    }

    #[test]
    fn test_label_colors_are_distinct() {
        let colors = [
            MaskLabel::CorrectMask.color_bgr(),
            MaskLabel::IncorrectMask.color_bgr(),
            MaskLabel::WithoutMask.color_bgr(),
        ];
        assert_eq!(colors[0], [0, 255, 0]);
        assert_ne!(colors[0], colors[1]);
        assert_ne!(colors[1], colors[2]);
        assert_ne!(colors[0], colors[2]);
    }
}
