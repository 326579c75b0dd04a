//! The five fixed general questions, localized.

/// Number of general questions asked before any follow-up.
pub const GENERAL_QUESTION_COUNT: usize = 5;

/// Index of the experience-level answer, sent as `skillLevel` for follow-ups.
pub const SKILL_LEVEL_INDEX: usize = 0;

/// Index of the topic answer, sent as `topic` for follow-ups.
pub const TOPIC_INDEX: usize = 2;

/// Languages with a translated question set.
pub const SUPPORTED_LANGUAGES: [&str; 7] = [
    "English", "Spanish", "French", "German", "Hindi", "Chinese", "Nepali",
];

const ENGLISH: [&str; GENERAL_QUESTION_COUNT] = [
    "What is your current experience level with programming?",
    "Which learning format helps you understand concepts best?",
    "What topic are you most interested in learning right now?",
    "What is your primary goal (e.g., Career change, personal project)?",
    "How much time can you realistically dedicate to learning each week?",
];

const SPANISH: [&str; GENERAL_QUESTION_COUNT] = [
    "¿Cuál es tu nivel de experiencia actual en programación?",
    "¿Qué formato de aprendizaje te ayuda a entender mejor los conceptos?",
    "¿Qué tema te interesa más aprender en este momento?",
    "¿Cuál es tu objetivo principal (ej., cambio de carrera, proyecto personal)?",
    "¿Cuánto tiempo puedes dedicar realistamente al aprendizaje cada semana?",
];

const FRENCH: [&str; GENERAL_QUESTION_COUNT] = [
    "Quel est votre niveau d'expérience actuel en programmation ?",
    "Quel format d'apprentissage vous aide le mieux à comprendre les concepts ?",
    "Quel sujet vous intéresse le plus en ce moment ?",
    "Quel est votre objectif principal (ex. reconversion, projet personnel) ?",
    "Combien de temps pouvez-vous réellement consacrer à l'apprentissage chaque semaine ?",
];

const GERMAN: [&str; GENERAL_QUESTION_COUNT] = [
    "Wie ist dein aktuelles Erfahrungsniveau in der Programmierung?",
    "Welches Lernformat hilft dir am besten, Konzepte zu verstehen?",
    "Welches Thema interessiert dich gerade am meisten?",
    "Was ist dein Hauptziel (z. B. Berufswechsel, persönliches Projekt)?",
    "Wie viel Zeit kannst du realistisch pro Woche für das Lernen aufwenden?",
];

const HINDI: [&str; GENERAL_QUESTION_COUNT] = [
    "प्रोग्रामिंग के साथ आपका वर्तमान अनुभव स्तर क्या है?",
    "कौन सा सीखने का प्रारूप आपको अवधारणाओं को सर्वोत्तम रूप से समझने में मदद करता है?",
    "अभी आप किस विषय को सीखने में सबसे अधिक रुचि रखते हैं?",
    "आपका प्राथमिक लक्ष्य क्या है (जैसे, करियर परिवर्तन, व्यक्तिगत परियोजना)?",
    "आप वास्तविक रूप से प्रत्येक सप्ताह सीखने के लिए कितना समय समर्पित कर सकते हैं?",
];

const CHINESE: [&str; GENERAL_QUESTION_COUNT] = [
    "你目前的编程经验水平如何？",
    "哪种学习形式最能帮助你理解概念？",
    "你现在最感兴趣的学习话题是什么？",
    "你的主要目标是什么（例如：职业转变、个人项目）？",
    "你每周现实中能投入多少时间学习？",
];

const NEPALI: [&str; GENERAL_QUESTION_COUNT] = [
    "प्रोग्रामिङमा तपाईंको वर्तमान अनुभव स्तर के हो?",
    "कुन सिकाई ढाँचाले तपाईंलाई अवधारणाहरू राम्रोसँग बुझ्न मद्दत गर्दछ?",
    "अहिले तपाईं कुन विषय सिक्न सबैभन्दा इच्छुक हुनुहुन्छ?",
    "तपाईंको मुख्य लक्ष्य के हो (जस्तै, करियर परिवर्तन, व्यक्तिगत परियोजना)?",
    "तपाईं हरेक हप्ता सिकाईमा कति समय दिन सक्नुहुन्छ?",
];

/// Returns the general questions for `language`, falling back to English.
///
/// Matching is case-insensitive on the English language name.
#[must_use]
pub fn general_questions(language: &str) -> Vec<String> {
    let set = match language.trim().to_lowercase().as_str() {
        "spanish" => &SPANISH,
        "french" => &FRENCH,
        "german" => &GERMAN,
        "hindi" => &HINDI,
        "chinese" => &CHINESE,
        "nepali" => &NEPALI,
        _ => &ENGLISH,
    };
    set.iter().map(ToString::to_string).collect()
}

/// Returns `true` if `language` has its own translated question set.
#[must_use]
pub fn is_supported(language: &str) -> bool {
    SUPPORTED_LANGUAGES
        .iter()
        .any(|l| l.eq_ignore_ascii_case(language.trim()))
}
