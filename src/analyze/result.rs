use crate::EmotionLabel;

/// Scores over the emotion categories for one frame.
///
/// Indexed by `EmotionLabel::index()`. Scores are whatever scale the
/// backend produces (probabilities, percentages, raw heuristics); only
/// their relative order matters to the session.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct EmotionScores {
    scores: [f32; EmotionLabel::COUNT],
}

impl EmotionScores {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, label: EmotionLabel, score: f32) {
        self.scores[label.index()] = score;
    }

    pub fn get(&self, label: EmotionLabel) -> f32 {
        self.scores[label.index()]
    }

    /// Highest-scoring label, or `None` when no score is finite and
    /// positive. Ties break in `EmotionLabel::ALL` order.
    pub fn dominant(&self) -> Option<EmotionReading> {
        let mut best: Option<EmotionReading> = None;
        for label in EmotionLabel::ALL {
            let score = self.get(label);
            if !score.is_finite() || score <= 0.0 {
                continue;
            }
            match &best {
                Some(reading) if reading.confidence >= score => {}
                _ => {
                    best = Some(EmotionReading {
                        label,
                        confidence: score,
                    })
                }
            }
        }
        best
    }

    pub fn iter(&self) -> impl Iterator<Item = (EmotionLabel, f32)> + '_ {
        EmotionLabel::ALL
            .iter()
            .map(move |&label| (label, self.get(label)))
    }
}

impl FromIterator<(EmotionLabel, f32)> for EmotionScores {
    fn from_iter<T: IntoIterator<Item = (EmotionLabel, f32)>>(iter: T) -> Self {
        let mut scores = Self::new();
        for (label, score) in iter {
            scores.set(label, score);
        }
        scores
    }
}

/// One classified frame: the dominant label and its confidence.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EmotionReading {
    pub label: EmotionLabel,
    pub confidence: f32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dominant_picks_highest_score() {
        let scores: EmotionScores = [
            (EmotionLabel::Happy, 0.7),
            (EmotionLabel::Neutral, 0.2),
            (EmotionLabel::Sad, 0.1),
        ]
        .into_iter()
        .collect();

        let reading = scores.dominant().unwrap();
        assert_eq!(reading.label, EmotionLabel::Happy);
        assert_eq!(reading.confidence, 0.7);
    }

    #[test]
    fn dominant_tie_breaks_in_label_order() {
        let scores: EmotionScores = [(EmotionLabel::Fear, 0.5), (EmotionLabel::Sad, 0.5)]
            .into_iter()
            .collect();

        // Fear precedes Sad in ALL.
        assert_eq!(scores.dominant().unwrap().label, EmotionLabel::Fear);
    }

    #[test]
    fn dominant_is_none_without_positive_scores() {
        assert!(EmotionScores::new().dominant().is_none());

        let mut scores = EmotionScores::new();
        scores.set(EmotionLabel::Happy, -1.0);
        assert!(scores.dominant().is_none());
    }

    #[test]
    fn dominant_skips_non_finite_scores() {
        let mut scores = EmotionScores::new();
        scores.set(EmotionLabel::Angry, f32::NAN);
        scores.set(EmotionLabel::Neutral, 0.3);

        assert_eq!(scores.dominant().unwrap().label, EmotionLabel::Neutral);
    }

    #[test]
    fn iter_walks_all_labels() {
        let scores = EmotionScores::new();
        assert_eq!(scores.iter().count(), EmotionLabel::COUNT);
    }
}
