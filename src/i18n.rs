use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    En,
    #[default]
    Pl,
}

impl Language {
    pub fn toggled(self) -> Self {
        match self {
            Self::En => Self::Pl,
            Self::Pl => Self::En,
        }
    }

    pub fn code(self) -> &'static str {
        match self {
            Self::En => "en",
            Self::Pl => "pl",
        }
    }

    /// Instruction appended to generated-text prompts.
    pub fn prompt_name(self) -> &'static str {
        match self {
            Self::En => "English",
            Self::Pl => "Polish",
        }
    }

    pub fn texts(self) -> &'static Texts {
        match self {
            Self::En => &EN,
            Self::Pl => &PL,
        }
    }

    pub fn weekday_name(self, date: NaiveDate) -> &'static str {
        let names = match self {
            Self::En => &EN_WEEKDAYS,
            Self::Pl => &PL_WEEKDAYS,
        };
        names[date.weekday().num_days_from_monday() as usize]
    }

    /// Display name for a system category; custom names pass through.
    pub fn category_label(self, name: &str, is_default: bool) -> String {
        if !is_default || self == Self::En {
            return name.to_string();
        }
        let label = match name.to_ascii_lowercase().as_str() {
            "health" => "Zdrowie",
            "productivity" => "Produktywność",
            "mindfulness" => "Uważność",
            "learning" => "Nauka",
            "fitness" => "Fitness",
            "other" => "Inne",
            _ => return name.to_string(),
        };
        label.to_string()
    }
}

/// Static strings shown when the generative-text service cannot help.
#[derive(Debug)]
pub struct Texts {
    pub motivation_empty: &'static str,
    pub motivation_fallback: &'static str,
    pub insight_no_habits: &'static str,
    pub insight_empty: &'static str,
    pub insight_fallback: &'static str,
    pub unknown_category: &'static str,
    pub general_category: &'static str,
}

static EN: Texts = Texts {
    motivation_empty: "Keep going!",
    motivation_fallback: "You are on the right track!",
    insight_no_habits: "Add your first habit, and I'll tell you about the science behind it!",
    insight_empty: "Every day is a new chance for success!",
    insight_fallback: "Consistency is key. Keep moving forward!",
    unknown_category: "Unknown",
    general_category: "General",
};

static PL: Texts = Texts {
    motivation_empty: "Nie poddawaj się!",
    motivation_fallback: "Jesteś na dobrej drodze!",
    insight_no_habits: "Dodaj swój pierwszy nawyk, a opowiem Ci o korzyściach z niego płynących!",
    insight_empty: "Każdy dzień to nowa szansa na sukces!",
    insight_fallback: "Konsekwencja jest kluczem do sukcesu. Trzymaj tak dalej!",
    unknown_category: "Nieznana",
    general_category: "Ogólne",
};

const EN_WEEKDAYS: [&str; 7] = [
    "Monday", "Tuesday", "Wednesday", "Thursday", "Friday", "Saturday", "Sunday",
];

const PL_WEEKDAYS: [&str; 7] = [
    "Poniedziałek",
    "Wtorek",
    "Środa",
    "Czwartek",
    "Piątek",
    "Sobota",
    "Niedziela",
];
