//! Centralized prompt and response-schema definitions.
//!
//! Every Gemini call made by the game goes through one of these builders,
//! so the narrative voice, the safety phrasing of image prompts and the
//! JSON output contracts are maintained in a single place. The prompt
//! bodies are Spanish on purpose: they are product content, and the
//! `language` parameter only steers the language of the generated reply.

use serde_json::{json, Value};

use crate::session::ChatMessage;

/// Style suffix appended to every image prompt before synthesis.
pub const IMAGE_STYLE_SUFFIX: &str =
    ", photorealistic, cinematic lighting, noir style, high detail";

/// Prompt that asks the model to author a complete new mystery.
pub fn mystery_prompt(language: &str) -> String {
    format!(
        r#"Actúa como un maestro escritor de misterios al estilo de Agatha Christie. Crea un completo misterio de asesinato ambientado en el Concejo Deliberante de la ciudad de Córdoba, Argentina, en el año 2025.
Para la creación de personajes ficticios y para dar consistencia a la narración, utiliza como referencia la estructura, roles y comisiones que se encuentran en el sitio web oficial www.cdcordoba.gob.ar.
La víctima es un concejal influyente y polémico. El escenario y TODAS las locaciones mencionadas deben estar estrictamente dentro del NUEVO edificio del Concejo Deliberante de la ciudad de Córdoba, ubicado en Av. Gdor. Amadeo Sabattini 4700. No utilices el antiguo edificio (Palacio 6 de Julio). No introduzcas ninguna ubicación externa. Los personajes deben ser ficticios pero realistas para ese entorno, inspirados en los roles que encontrarías en el concejo real.
Debes proporcionar:
1.  Un título intrigante.
2.  Una escena inicial detallada que describe el descubrimiento del cuerpo y el entorno.
3.  Un prompt para un generador de imágenes que capture la atmósfera de la escena inicial con un estilo cinematográfico y noir.
4.  Una solución secreta detallada que explique quién es el asesino, su motivo, el método y cómo se pueden interpretar las pistas.
La respuesta DEBE estar en el idioma: {language}.
IMPORTANTE: NO incluyas nombres de políticos o personalidades reales. Utiliza nombres y personalidades completamente ficticias, aunque sus roles y funciones se basen en la información del sitio web de referencia.
Tu respuesta debe ser únicamente el objeto JSON, sin ningún texto adicional, explicaciones o formato markdown."#
    )
}

/// Prompt that advances the story one turn from the player's action.
pub fn turn_prompt(history: &[ChatMessage], player_input: &str, language: &str) -> String {
    format!(
        r#"Eres el Game Master de un juego de misterio. El jugador es un detective. La historia hasta ahora es:
{history}

La última acción del jugador es: "{player_input}".

Basado en la acción del jugador, genera la siguiente parte de la historia. La narración debe ser puramente descriptiva y en el idioma del jugador ({language}). NO incluyas la acción del jugador en tu respuesta. NO incluyas meta-comentarios. Solo proporciona la narración, un nuevo prompt de imagen y una posible nueva pista. Tu respuesta debe ser únicamente el objeto JSON."#,
        history = render_history(history),
    )
}

/// Prompt that judges a proposed solution against the secret one.
pub fn solution_prompt(
    history: &[ChatMessage],
    proposed: &str,
    secret: &str,
    language: &str,
) -> String {
    format!(
        r#"Eres el Game Master. El jugador ha propuesto una solución al misterio. La historia hasta ahora es:
{history}

La solución secreta es: "{secret}"

La solución propuesta por el jugador es: "{proposed}"

Analiza si la propuesta del jugador es correcta. Compara su razonamiento con la solución secreta. Tu respuesta debe estar en el idioma: {language}.
Tu respuesta debe ser únicamente el objeto JSON."#,
        history = render_history(history),
    )
}

/// Render the transcript the way it is replayed to the model: one
/// `role: text` line per message, chronological.
pub fn render_history(history: &[ChatMessage]) -> String {
    history
        .iter()
        .map(|m| format!("{}: {}", m.speaker.as_role(), m.text))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Response schema for mystery creation.
pub fn mystery_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "title": { "type": "STRING", "description": "El título del misterio." },
            "initialScene": { "type": "STRING", "description": "El texto narrativo inicial que establece la escena del crimen." },
            "initialImagePrompt": { "type": "STRING", "description": "Un prompt detallado para un generador de imágenes, estilo noir y fotorrealista, describiendo la escena inicial. El prompt debe ser descriptivo pero evitar lenguaje que pueda ser interpretado como gráfico o violento (ej. en lugar de 'cuerpo ensangrentado', usar 'figura inmóvil en el suelo')." },
            "secretSolution": { "type": "STRING", "description": "La solución secreta y detallada del misterio: quién fue, cómo y por qué." }
        },
        "required": ["title", "initialScene", "initialImagePrompt", "secretSolution"]
    })
}

/// Response schema for a narrative turn.
pub fn turn_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "narration": { "type": "STRING", "description": "La continuación de la historia basada en la acción del jugador. Debe ser solo la narración pura, sin meta-comentarios." },
            "imagePrompt": { "type": "STRING", "description": "Un nuevo prompt de imagen que refleja la narración. El prompt debe ser descriptivo pero evitar lenguaje que pueda ser interpretado como gráfico o violento (ej. en lugar de 'cuchillo en el pecho', usar 'un objeto metálico sobre la camisa')." },
            "newClue": { "type": "STRING", "description": "Una pista clave que el jugador descubrió, si la hay. Si no hay una nueva pista específica, este campo debe ser una cadena vacía." }
        },
        "required": ["narration", "imagePrompt", "newClue"]
    })
}

/// Response schema for a solution judgment.
pub fn solution_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "isCorrect": { "type": "BOOLEAN", "description": "Verdadero si la solución del jugador es correcta, falso en caso contrario." },
            "explanation": { "type": "STRING", "description": "Una explicación detallada de por qué la solución es correcta o incorrecta." }
        },
        "required": ["isCorrect", "explanation"]
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::ChatMessage;

    #[test]
    fn test_mystery_prompt_carries_language() {
        let prompt = mystery_prompt("es-AR");
        assert!(prompt.contains("es-AR"));
        assert!(prompt.contains("Agatha Christie"));
    }

    #[test]
    fn test_turn_prompt_replays_history_in_order() {
        let history = vec![
            ChatMessage::narrator("Una figura inmóvil en el despacho."),
            ChatMessage::player("Examino la ventana."),
        ];
        let prompt = turn_prompt(&history, "Abro el cajón", "es-ES");

        assert!(prompt.contains("model: Una figura inmóvil en el despacho."));
        assert!(prompt.contains("user: Examino la ventana."));
        assert!(prompt.contains("\"Abro el cajón\""));
        let narrator_pos = prompt.find("model:").unwrap();
        let player_pos = prompt.find("user:").unwrap();
        assert!(narrator_pos < player_pos);
    }

    #[test]
    fn test_solution_prompt_quotes_both_solutions() {
        let history = vec![ChatMessage::narrator("El salón está vacío.")];
        let prompt = solution_prompt(&history, "el mayordomo", "la secretaria", "es-ES");
        assert!(prompt.contains("model: El salón está vacío."));
        assert!(prompt.contains("\"el mayordomo\""));
        assert!(prompt.contains("\"la secretaria\""));
    }

    #[test]
    fn test_schemas_are_objects_with_required_fields() {
        for (schema, field) in [
            (mystery_schema(), "secretSolution"),
            (turn_schema(), "newClue"),
            (solution_schema(), "isCorrect"),
        ] {
            assert_eq!(schema["type"], "OBJECT");
            assert!(schema["properties"].get(field).is_some());
        }
    }
}
