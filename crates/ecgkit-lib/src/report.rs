//! Support for the external report writer: what we send it and how its answer is tidied.

use crate::{error::Result, metrics::hrv::HrvMetrics, sanitize::sanitize};

/// Lines mentioning any of these are treated as a signature block and dropped.
const SIGNATURE_PATTERNS: [&str; 9] = [
    "médecin",
    "docteur",
    "dr.",
    "service",
    "date",
    "signature",
    "signé",
    "[nom",
    "praticien",
];

/// Prompt asking for a short clinical summary of `metrics`.
pub fn build_report_prompt(metrics: &HrvMetrics) -> Result<String> {
    let json = serde_json::to_string_pretty(&sanitize(metrics)?)?;
    Ok(format!(
        "Vous êtes un professionnel de santé spécialisé en électrocardiographie.\n\
         Rédigez un compte rendu médical clair, concis et structuré en français à partir \
         des métriques de variabilité cardiaque suivantes :\n\n\
         {json}\n\n\
         Synthétisez les informations utiles au lieu de reprendre chaque métrique.\n\
         Adoptez un ton professionnel et médical.\n\
         Ouvrez par une phrase d'introduction, détaillez les éléments remarquables, \
         puis concluez si besoin par une recommandation clinique.\n\n\
         IMPORTANT : aucune date, aucun nom de médecin, aucun service ni aucune signature.\n\
         Le rapport se termine par la conclusion clinique.\n\n\
         Compte rendu :"
    ))
}

/// Strip signature lines and Markdown emphasis, collapse whitespace, drop blank lines.
pub fn clean_report_text(text: &str) -> String {
    text.lines()
        .filter(|line| {
            let lower = line.trim().to_lowercase();
            !SIGNATURE_PATTERNS.iter().any(|p| lower.contains(p))
        })
        .map(|line| {
            let without_stars: String = line.chars().filter(|c| *c != '*').collect();
            without_stars.split_whitespace().collect::<Vec<_>>().join(" ")
        })
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}
