//! Fixed label set of the chest X-ray classifier.

/// Pathology labels in model output-index order.
pub const LABELS: [&str; 14] = [
    "Pneumonia",
    "Cardiomegaly",
    "Effusion",
    "Infiltration",
    "Mass",
    "Nodule",
    "Atelectasis",
    "Pneumothorax",
    "Pleural_Thickening",
    "Consolidation",
    "Emphysema",
    "Fibrosis",
    "Edema",
    "Hernia",
];

/// Reported when no pathology clears the confidence threshold.
pub const NORMAL: &str = "Normal";

/// Number of logits the model must emit.
pub const NUM_CLASSES: usize = LABELS.len();

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fourteen_labels_in_index_order() {
        assert_eq!(NUM_CLASSES, 14);
        assert_eq!(LABELS[0], "Pneumonia");
        assert_eq!(LABELS[8], "Pleural_Thickening");
        assert_eq!(LABELS[13], "Hernia");
    }

    #[test]
    fn normal_is_not_a_model_output() {
        assert!(!LABELS.contains(&NORMAL));
        assert!(!LABELS.contains(&"Tuberculosis"));
    }
}
