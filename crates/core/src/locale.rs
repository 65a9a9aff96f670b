use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    English,
    Spanish,
    French,
    German,
    Portuguese,
    Italian,
    Chinese,
    Japanese,
    Hindi,
    Arabic,
}

impl Language {
    pub const ALL: [Language; 10] = [
        Language::English,
        Language::Spanish,
        Language::French,
        Language::German,
        Language::Portuguese,
        Language::Italian,
        Language::Chinese,
        Language::Japanese,
        Language::Hindi,
        Language::Arabic,
    ];

    pub fn code(self) -> &'static str {
        match self {
            Language::English => "en",
            Language::Spanish => "es",
            Language::French => "fr",
            Language::German => "de",
            Language::Portuguese => "pt",
            Language::Italian => "it",
            Language::Chinese => "zh",
            Language::Japanese => "ja",
            Language::Hindi => "hi",
            Language::Arabic => "ar",
        }
    }

    /// English name, as used in the answer-language instruction.
    pub fn name(self) -> &'static str {
        match self {
            Language::English => "English",
            Language::Spanish => "Spanish",
            Language::French => "French",
            Language::German => "German",
            Language::Portuguese => "Portuguese",
            Language::Italian => "Italian",
            Language::Chinese => "Chinese",
            Language::Japanese => "Japanese",
            Language::Hindi => "Hindi",
            Language::Arabic => "Arabic",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown language '{0}' (expected one of: {known})", known = known_codes())]
pub struct UnknownLanguage(pub String);

fn known_codes() -> String {
    Language::ALL
        .iter()
        .map(|language| language.code())
        .collect::<Vec<_>>()
        .join(", ")
}

impl FromStr for Language {
    type Err = UnknownLanguage;

    /// Accepts an ISO 639-1 code or the English name, case-insensitively.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let wanted = value.trim();
        Language::ALL
            .into_iter()
            .find(|language| {
                language.code().eq_ignore_ascii_case(wanted)
                    || language.name().eq_ignore_ascii_case(wanted)
            })
            .ok_or_else(|| UnknownLanguage(value.to_string()))
    }
}

#[derive(Debug)]
pub struct UiText {
    pub title: &'static str,
    pub input_hint: &'static str,
    pub thinking: &'static str,
    pub history_cleared: &'static str,
    pub rebuild_done: &'static str,
    pub key_missing: &'static str,
    pub goodbye: &'static str,
}

const EN: UiText = UiText {
    title: "Bioinformatics Chatbot. Ask questions about bioinformatics.",
    input_hint: "Ask a question (/help for commands)",
    thinking: "Thinking...",
    history_cleared: "Chat history cleared.",
    rebuild_done: "Knowledge base deleted and cache cleared; rebuilding now.",
    key_missing: "Please provide a Google AI API key (--api-key, GEMINI_API_KEY, or `biochat set-key`).",
    goodbye: "Goodbye.",
};

const ES: UiText = UiText {
    title: "Chatbot de bioinformática. Haz preguntas sobre bioinformática.",
    input_hint: "Haz una pregunta (/help para ver los comandos)",
    thinking: "Pensando...",
    history_cleared: "Historial del chat borrado.",
    rebuild_done: "Base de conocimiento eliminada y caché vaciada; reconstruyendo.",
    key_missing: "Proporciona una clave de API de Google AI (--api-key, GEMINI_API_KEY o `biochat set-key`).",
    goodbye: "Adiós.",
};

const FR: UiText = UiText {
    title: "Chatbot de bio-informatique. Posez vos questions sur la bio-informatique.",
    input_hint: "Posez une question (/help pour les commandes)",
    thinking: "Réflexion...",
    history_cleared: "Historique effacé.",
    rebuild_done: "Base de connaissances supprimée et cache vidé ; reconstruction en cours.",
    key_missing: "Veuillez fournir une clé API Google AI (--api-key, GEMINI_API_KEY ou `biochat set-key`).",
    goodbye: "Au revoir.",
};

const DE: UiText = UiText {
    title: "Bioinformatik-Chatbot. Stellen Sie Fragen zur Bioinformatik.",
    input_hint: "Stellen Sie eine Frage (/help für Befehle)",
    thinking: "Denke nach...",
    history_cleared: "Chatverlauf gelöscht.",
    rebuild_done: "Wissensbasis gelöscht und Cache geleert; wird neu aufgebaut.",
    key_missing: "Bitte geben Sie einen Google-AI-API-Schlüssel an (--api-key, GEMINI_API_KEY oder `biochat set-key`).",
    goodbye: "Auf Wiedersehen.",
};

const PT: UiText = UiText {
    title: "Chatbot de bioinformática. Faça perguntas sobre bioinformática.",
    input_hint: "Faça uma pergunta (/help para comandos)",
    thinking: "Pensando...",
    history_cleared: "Histórico do chat apagado.",
    rebuild_done: "Base de conhecimento apagada e cache limpo; reconstruindo.",
    key_missing: "Forneça uma chave de API do Google AI (--api-key, GEMINI_API_KEY ou `biochat set-key`).",
    goodbye: "Tchau.",
};

/// Interface strings for `language`; languages without a table fall back to English.
pub fn ui_text(language: Language) -> &'static UiText {
    match language {
        Language::Spanish => &ES,
        Language::French => &FR,
        Language::German => &DE,
        Language::Portuguese => &PT,
        _ => &EN,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_codes_and_names() {
        assert_eq!("es".parse::<Language>(), Ok(Language::Spanish));
        assert_eq!("FR".parse::<Language>(), Ok(Language::French));
        assert_eq!("german".parse::<Language>(), Ok(Language::German));
        assert!("klingon".parse::<Language>().is_err());
    }

    #[test]
    fn unknown_language_lists_the_accepted_codes() {
        let error = "klingon".parse::<Language>().err().map(|error| error.to_string());
        let message = error.unwrap_or_default();

        assert!(message.starts_with("unknown language 'klingon'"));
        assert!(message.contains("en, es"));
        let _: &dyn std::error::Error = &UnknownLanguage("tlh".to_string());
    }

    #[test]
    fn codes_round_trip() {
        for language in Language::ALL {
            assert_eq!(language.code().parse::<Language>(), Ok(language));
        }
    }

    #[test]
    fn missing_tables_fall_back_to_english() {
        assert_eq!(ui_text(Language::Japanese).title, EN.title);
        assert_ne!(ui_text(Language::Spanish).title, EN.title);
    }
}
