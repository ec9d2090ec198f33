//! Static one-sentence descriptions of every reportable condition.
//!
//! Used both inside the language-model prompt and as the degraded-mode reply.

pub const CONDITION_INFO: [(&str, &str); 16] = [
    ("Normal", "No abnormalities detected in the chest X-ray."),
    ("Pneumonia", "An infection that inflames the air sacs in one or both lungs."),
    ("Tuberculosis", "A bacterial infection that primarily affects the lungs."),
    ("Cardiomegaly", "An enlarged heart, which can be a sign of various heart conditions."),
    ("Effusion", "Fluid accumulation in the pleural space around the lungs."),
    ("Infiltration", "Abnormal substances accumulated in the lung tissues."),
    ("Mass", "An abnormal growth or lump that may require further investigation."),
    ("Nodule", "A small, round growth in the lung that appears as a white spot on X-rays."),
    ("Atelectasis", "A complete or partial collapse of a lung or lobe of a lung."),
    ("Pneumothorax", "Air or gas in the pleural cavity causing lung collapse."),
    ("Pleural_Thickening", "Thickening of the pleural space from excess fluid or scarring."),
    ("Consolidation", "Lung tissue filled with liquid instead of air."),
    ("Emphysema", "A lung condition that causes shortness of breath."),
    ("Fibrosis", "Scarring of lung tissue that can interfere with breathing."),
    ("Edema", "Excess fluid in the lungs or other body tissues."),
    ("Hernia", "Protrusion of an organ through the structure that normally contains it."),
];

/// Description for `condition`, matched exactly (case-sensitive).
pub fn describe(condition: &str) -> Option<&'static str> {
    CONDITION_INFO
        .iter()
        .find(|(name, _)| *name == condition)
        .map(|(_, info)| *info)
}

/// Reply served while the language model is not ready.
pub fn degraded_reply(condition: &str) -> String {
    format!(
        "Your X-ray shows {condition}. {}",
        describe(condition).unwrap_or("Please consult a doctor.")
    )
}

/// Reply served when generation fails on a ready model.
pub fn apology_reply(condition: &str) -> String {
    format!(
        "Sorry, I'm having trouble responding. Your X-ray shows {condition}. {}",
        describe(condition).unwrap_or("")
    )
}
