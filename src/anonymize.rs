//! Anonimización de identificadores de modelo para la interfaz del
//! evaluador: el nombre real se sustituye por un pseudónimo estable que
//! no revela el proveedor, para reducir el sesgo al puntuar.

/// Reglas ordenadas de clasificación por familia: la primera palabra clave
/// que aparezca en el nombre (sin distinguir mayúsculas) decide la etiqueta.
const FAMILY_RULES: &[(&[&str], &str)] = &[
    (&["deepseek"], "Modelo A"),
    (&["gpt", "davinci", "openai"], "Modelo B"),
    (&["claude", "anthropic"], "Modelo C"),
    (&["gemini", "bard", "palm"], "Modelo D"),
    (&["llama"], "Modelo E"),
    (&["mistral", "mixtral"], "Modelo F"),
    (&["qwen"], "Modelo G"),
    (&["grok"], "Modelo H"),
];

/// Cubos de reserva para nombres que no casan con ninguna familia conocida.
/// El reparto por primer carácter NO garantiza ausencia de colisiones entre
/// modelos desconocidos distintos; es una limitación asumida.
const FALLBACK_LABELS: [&str; 4] = ["Modelo X", "Modelo Y", "Modelo Z", "Modelo W"];

/// Pseudónimo estable para un identificador de modelo. Función pura:
/// la misma entrada produce siempre la misma etiqueta, entre llamadas
/// y entre sesiones.
pub fn anonymize(model_name: &str) -> &'static str {
    let lowered = model_name.to_lowercase();
    for (keywords, label) in FAMILY_RULES {
        if keywords.iter().any(|k| lowered.contains(k)) {
            return label;
        }
    }

    let first = lowered.chars().next().unwrap_or('\0') as u32;
    FALLBACK_LABELS[first as usize % FALLBACK_LABELS.len()]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anonimizacion_es_determinista() {
        assert_eq!(anonymize("gpt-4-turbo"), anonymize("gpt-4-turbo"));
        assert_eq!(anonymize("GPT-4-Turbo"), anonymize("gpt-4-turbo"));
        assert_eq!(anonymize("deepseek-chat"), anonymize("DeepSeek-R1"));
    }

    #[test]
    fn familias_distintas_no_comparten_cubo() {
        assert_ne!(anonymize("claude-3-opus"), anonymize("deepseek-chat"));
        assert_ne!(anonymize("gpt-4o"), anonymize("gemini-1.5-pro"));
        assert_ne!(anonymize("llama-3-70b"), anonymize("mistral-large"));
    }

    #[test]
    fn gana_la_primera_regla_que_casa() {
        // "deepseek" va antes que "gpt" en la lista ordenada.
        assert_eq!(anonymize("deepseek-gpt-mix"), "Modelo A");
    }

    #[test]
    fn nombres_desconocidos_caen_en_cubos_estables() {
        assert_eq!(anonymize("zephyr-7b"), anonymize("zephyr-7b"));
        // Limitación asumida: dos desconocidos con el mismo primer carácter
        // comparten cubo.
        assert_eq!(anonymize("falcon-40b"), anonymize("fuyu-8b"));
    }
}
