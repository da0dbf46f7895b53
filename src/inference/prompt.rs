use serde_json::{json, Value};

use crate::settings::PromptLanguage;

pub fn user_instruction(language: PromptLanguage) -> &'static str {
    match language {
        PromptLanguage::En => {
            "Analyze this image and count the number of human beings visible. \
             Do not count cartoons, drawings, statues or reflections where you can tell them apart. \
             Be precise."
        }
        PromptLanguage::Fr => {
            "Analyse cette image et compte le nombre d'êtres humains visibles. \
             Ne compte pas les dessins animés, les statues ou les reflets si possible. \
             Sois précis."
        }
    }
}

pub fn system_instruction(language: PromptLanguage) -> &'static str {
    match language {
        PromptLanguage::En => {
            "You are an expert computer vision assistant. You must answer in JSON only."
        }
        PromptLanguage::Fr => {
            "Tu es un assistant expert en vision par ordinateur. Tu dois répondre en format JSON uniquement."
        }
    }
}

/// Structured-output schema: `count` and `description` required,
/// `confidenceLevel` optional.
pub fn response_schema(language: PromptLanguage) -> Value {
    let (count, description, confidence, levels) = match language {
        PromptLanguage::En => (
            "Total number of people detected.",
            "A short description of the scene and where the people are (at most 2 sentences).",
            "Confidence level of the analysis.",
            ["High", "Medium", "Low"],
        ),
        PromptLanguage::Fr => (
            "Le nombre total de personnes détectées.",
            "Une brève description (en français) de la scène et de où se trouvent les personnes (max 2 phrases).",
            "Niveau de confiance de l'analyse.",
            ["Élevé", "Moyen", "Faible"],
        ),
    };

    json!({
        "type": "OBJECT",
        "properties": {
            "count": { "type": "INTEGER", "description": count },
            "description": { "type": "STRING", "description": description },
            "confidenceLevel": { "type": "STRING", "description": confidence, "enum": levels },
        },
        "required": ["count", "description"],
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_required_fields() {
        for language in [PromptLanguage::En, PromptLanguage::Fr] {
            let schema = response_schema(language);
            assert_eq!(schema["required"], json!(["count", "description"]));
            assert_eq!(schema["properties"]["count"]["type"], "INTEGER");
            assert!(schema["properties"]["confidenceLevel"].is_object());
        }
    }

    #[test]
    fn test_instruction_excludes_depictions() {
        let text = user_instruction(PromptLanguage::En);
        assert!(text.contains("statues"));
        assert!(text.contains("reflections"));
    }
}
