//! Closed sets of intents recognised from free chat text.

/// What a driver means by a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverIntent {
    Accept,
    Reject,
    /// The accepted ride is over.
    Finished,
    Unknown,
}

/// What a client means by a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientIntent {
    Menu,
    RequestTaxi,
    Text(String),
}

const ACCEPT_WORDS: &[&str] = &["si", "sí", "acepto", "ok", "dale"];
const REJECT_WORDS: &[&str] = &["no", "rechazo", "paso"];
const FINISHED_WORDS: &[&str] = &["libre", "fin", "termine", "terminé"];
const MENU_WORDS: &[&str] = &["menu", "menú", "inicio", "volver", "hola"];
const TAXI_WORDS: &[&str] = &["taxi"];

fn normalise(text: &str) -> String {
    text.trim()
        .trim_matches(|c: char| c.is_ascii_punctuation() || c == '¡' || c == '¿')
        .to_lowercase()
}

impl DriverIntent {
    pub fn parse(text: &str) -> Self {
        let word = normalise(text);
        if ACCEPT_WORDS.contains(&word.as_str()) {
            Self::Accept
        } else if REJECT_WORDS.contains(&word.as_str()) {
            Self::Reject
        } else if FINISHED_WORDS.contains(&word.as_str()) {
            Self::Finished
        } else {
            Self::Unknown
        }
    }
}

impl ClientIntent {
    pub fn parse(text: &str) -> Self {
        let word = normalise(text);
        if MENU_WORDS.contains(&word.as_str()) {
            Self::Menu
        } else if TAXI_WORDS.contains(&word.as_str()) {
            Self::RequestTaxi
        } else {
            Self::Text(text.trim().to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn driver_words_map_to_intents() {
        for word in ["si", "Sí", " ACEPTO ", "ok!", "dale"] {
            assert_eq!(DriverIntent::parse(word), DriverIntent::Accept, "{word}");
        }
        for word in ["no", "Rechazo", "paso."] {
            assert_eq!(DriverIntent::parse(word), DriverIntent::Reject, "{word}");
        }
        assert_eq!(DriverIntent::parse("libre"), DriverIntent::Finished);
        assert_eq!(DriverIntent::parse("quizás"), DriverIntent::Unknown);
        assert_eq!(DriverIntent::parse("si claro"), DriverIntent::Unknown);
    }

    #[test]
    fn client_words_map_to_intents() {
        assert_eq!(ClientIntent::parse("Menú"), ClientIntent::Menu);
        assert_eq!(ClientIntent::parse("¡Hola!"), ClientIntent::Menu);
        assert_eq!(ClientIntent::parse("TAXI"), ClientIntent::RequestTaxi);
        assert_eq!(
            ClientIntent::parse("  Av. Amazonas y Naciones Unidas "),
            ClientIntent::Text("Av. Amazonas y Naciones Unidas".to_string())
        );
    }
}
