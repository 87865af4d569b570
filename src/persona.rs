//! Persona definitions
//!
//! A persona is a fixed system instruction plus the display data the UI
//! needs to present it. Every variant is served by the same session code.

use rand::seq::SliceRandom;
use rand::Rng;
use serde::Serialize;

/// Colours for a persona's page
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PersonaTheme {
    pub background: String,
    pub accent: String,
    pub header: String,
}

impl PersonaTheme {
    pub fn new(background: &str, accent: &str, header: &str) -> Self {
        Self {
            background: background.to_string(),
            accent: accent.to_string(),
            header: header.to_string(),
        }
    }
}

impl Default for PersonaTheme {
    fn default() -> Self {
        Self::new("#ffffff", "#4b90d4", "#333333")
    }
}

/// Immutable persona: system instruction, topical facts and display data
#[derive(Debug, Clone)]
pub struct PersonaDefinition {
    id: String,
    /// Speaker label for assistant turns
    name: String,
    system_instruction: String,
    facts: Vec<String>,
    title: String,
    input_label: String,
    hint: String,
    fact_label: String,
    farewell: String,
    theme: PersonaTheme,
}

impl PersonaDefinition {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        system_instruction: impl Into<String>,
    ) -> Self {
        let name = name.into();
        Self {
            id: id.into(),
            title: name.clone(),
            farewell: format!("Thank you for chatting with the {name}!"),
            name,
            system_instruction: system_instruction.into(),
            facts: Vec::new(),
            input_label: "What would you like to ask?".to_string(),
            hint: "Type 'stop' to end the conversation.".to_string(),
            fact_label: "Did you know?".to_string(),
            theme: PersonaTheme::default(),
        }
    }

    pub fn with_facts<I, S>(mut self, facts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.facts = facts.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_input_label(mut self, label: impl Into<String>) -> Self {
        self.input_label = label.into();
        self
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = hint.into();
        self
    }

    pub fn with_fact_label(mut self, label: impl Into<String>) -> Self {
        self.fact_label = label.into();
        self
    }

    pub fn with_farewell(mut self, farewell: impl Into<String>) -> Self {
        self.farewell = farewell.into();
        self
    }

    pub fn with_theme(mut self, theme: PersonaTheme) -> Self {
        self.theme = theme;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn system_instruction(&self) -> &str {
        &self.system_instruction
    }

    pub fn facts(&self) -> &[String] {
        &self.facts
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn farewell(&self) -> &str {
        &self.farewell
    }

    pub fn input_label(&self) -> &str {
        &self.input_label
    }

    pub fn hint(&self) -> &str {
        &self.hint
    }

    pub fn fact_label(&self) -> &str {
        &self.fact_label
    }

    pub fn theme(&self) -> &PersonaTheme {
        &self.theme
    }

    /// Pick a fact uniformly at random, if the persona has any
    pub fn random_fact<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<&str> {
        self.facts.choose(rng).map(String::as_str)
    }
}

/// The persona variants this server can host
#[derive(Debug, Clone)]
pub struct PersonaCatalog {
    personas: Vec<PersonaDefinition>,
}

impl PersonaCatalog {
    pub fn new(personas: Vec<PersonaDefinition>) -> Self {
        Self { personas }
    }

    /// The four personas shipped with the application
    pub fn builtin() -> Self {
        Self::new(vec![cybersec(), psychiatrist(), doctor(), mario()])
    }

    pub fn get(&self, id: &str) -> Option<&PersonaDefinition> {
        self.personas.iter().find(|p| p.id.eq_ignore_ascii_case(id))
    }

    pub fn all(&self) -> &[PersonaDefinition] {
        &self.personas
    }

    pub fn default_persona(&self) -> Option<&PersonaDefinition> {
        self.personas.first()
    }
}

fn cybersec() -> PersonaDefinition {
    PersonaDefinition::new(
        "cybersec",
        "CyberSec Expert",
        "You are an expert in cybersecurity, ethical hacking, and digital forensics. \
         Provide up-to-date, detailed security advice and solutions based on the latest \
         cybersecurity threats and vulnerabilities.",
    )
    .with_title("CyberSec Advisor 🔐")
    .with_input_label("Ask your cybersecurity question:")
    .with_hint("Get expert cybersecurity advice. Type 'stop' to end the conversation.")
    .with_fact_label("Cybersecurity Fact")
    .with_theme(PersonaTheme::new("#1e1e2e", "#5a5a8e", "#f8c291"))
    .with_facts([
        "Did you know? The first computer virus, Creeper, was created in 1971 as an experimental program.",
        "Fun Fact: Over 90% of cyberattacks start with phishing emails.",
        "Here’s something interesting: The average cost of a data breach in 2023 was $4.45 million.",
        "Did you know? Multi-factor authentication (MFA) can prevent 99% of automated cyberattacks!",
        "Fun Fact: The longest known password in a data breach had 1,279 characters!",
        "Cyber Tip: Regularly updating your software and using strong, unique passwords can prevent most cyberattacks.",
    ])
}

fn psychiatrist() -> PersonaDefinition {
    PersonaDefinition::new(
        "psychiatrist",
        "Psychiatrist",
        "You are an experienced, compassionate psychiatrist with deep knowledge of mental \
         health practices, able to provide insightful, evidence-based advice and explanations \
         in a kind and empathetic manner.",
    )
    .with_title("Digital Therapist Bot: Your Emotional Support 💙🌿")
    .with_input_label("What would you like to ask the psychiatrist?")
    .with_hint("Ask your mental health-related questions. Type 'stop' to end the conversation.")
    .with_fact_label("Here's a helpful tip")
    .with_farewell("Thank you for chatting with the Digital Therapist Bot!")
    .with_theme(PersonaTheme::new("#d1c4e9", "#9575cd", "#4a148c"))
    .with_facts([
        "Remember: It's okay to not be okay. Talk to someone when you feel overwhelmed.",
        "Self-care isn't selfish. It's necessary for your well-being.",
        "Sometimes the bravest thing you can do is ask for help.",
        "Breathing exercises can help you calm your mind and body. Try taking deep breaths.",
        "Your mental health is just as important as your physical health.",
    ])
}

fn doctor() -> PersonaDefinition {
    PersonaDefinition::new(
        "doctor",
        "Doctor",
        "You are an experienced, educated doctor with in-depth knowledge of medical practices, \
         able to provide accurate, evidence-based advice and explanations in a clear and \
         concise manner.",
    )
    .with_title("Doctor Chatbot 🩺")
    .with_input_label("What would you like to ask the doctor?")
    .with_hint("Ask your health-related questions. Type 'stop' to end the conversation.")
    .with_fact_label("Here's an interesting fact")
    .with_farewell("Thank you for chatting with the Doctor!")
    .with_theme(PersonaTheme::new("#f0f8ff", "#68a0b0", "#5e8c8e"))
    .with_facts([
        "Did you know? The human body contains around 37.2 trillion cells.",
        "Fun Fact: The average adult body has around 5 liters of blood circulating.",
        "Here’s something interesting: Our stomach gets a new lining every 3 to 4 days.",
        "Did you know? A human sneeze can travel as fast as 100 miles per hour!",
        "Fun Fact: Your heart beats about 100,000 times per day!",
    ])
}

fn mario() -> PersonaDefinition {
    PersonaDefinition::new(
        "mario",
        "Mario",
        "You are Mario from Super Mario Bros. Answer as Mario, the assistant, only. \
         Use a cheerful and playful tone!",
    )
    .with_title("MARIO CHATBOT 🍄")
    .with_input_label("What query would you like to ask?")
    .with_hint("Wahoo! Ask Mario anything. Type 'stop' to end the conversation.")
    .with_farewell("Mamma mia, see you next time!")
    .with_theme(PersonaTheme::new("#f8e5a6", "#4b90d4", "#c0392b"))
}
