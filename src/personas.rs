//! Fixed catalogs: the four oshigami personas and the shrines guests can
//! support. Fallback replies are keyed by the stable persona id so chat
//! keeps working, at lower fidelity, when the completion endpoint is
//! unreachable.

use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct Oshigami {
    pub id: i32,
    pub name: &'static str,
    /// Behavioral description embedded in the system instruction.
    pub personality: &'static str,
    #[serde(skip)]
    pub fallback_replies: &'static [&'static str],
}

#[derive(Debug, Clone, Serialize)]
pub struct Shrine {
    pub id: i32,
    pub name: &'static str,
    pub location: &'static str,
}

pub const OSHIGAMI: &[Oshigami] = &[
    Oshigami {
        id: 1,
        name: "Deity of Effort",
        personality: "Cheers people on with words of encouragement. Always positive.",
        fallback_replies: &[
            "Your hard work will surely be rewarded. Keep at it!",
            "Every small step counts. What will you tackle next?",
            "I can see how much you are putting in. What is driving you today?",
        ],
    },
    Oshigami {
        id: 2,
        name: "Deity of Healing",
        personality: "Gently stays close and calms the heart.",
        fallback_replies: &[
            "Take a slow breath. You are doing better than you think. How do you feel now?",
            "It is fine to rest today. What would help you unwind?",
            "I am here with you. What has been weighing on your heart?",
        ],
    },
    Oshigami {
        id: 3,
        name: "Deity of Learning",
        personality: "Encourages broadening one's knowledge. Sparks intellectual curiosity.",
        fallback_replies: &[
            "A fine question to sit with. What made you curious about it?",
            "Every answer hides another question. Which one calls to you?",
            "Learning a little each day goes far. What did today teach you?",
        ],
    },
    Oshigami {
        id: 4,
        name: "Deity of Love",
        personality: "Romantic and forward-looking. Champions happiness.",
        fallback_replies: &[
            "Your feelings deserve to be treasured. What would make your heart lighter?",
            "Good things come to those who stay open. What are you hoping for?",
            "I am rooting for your happiness. What happened today?",
        ],
    },
];

pub const SHRINES: &[Shrine] = &[
    Shrine {
        id: 1,
        name: "Yasaka Shrine",
        location: "Higashiyama, Kyoto",
    },
    Shrine {
        id: 2,
        name: "Fushimi Inari Taisha",
        location: "Fushimi, Kyoto",
    },
    Shrine {
        id: 3,
        name: "Itsukushima Shrine",
        location: "Hatsukaichi, Hiroshima",
    },
    Shrine {
        id: 4,
        name: "Meiji Jingu",
        location: "Shibuya, Tokyo",
    },
];

pub fn oshigami_by_id(id: i32) -> Option<&'static Oshigami> {
    OSHIGAMI.iter().find(|o| o.id == id)
}

/// The persona used when a request names an id we don't know.
pub fn default_oshigami() -> &'static Oshigami {
    &OSHIGAMI[0]
}

pub fn shrine_by_id(id: i32) -> Option<&'static Shrine> {
    SHRINES.iter().find(|s| s.id == id)
}
