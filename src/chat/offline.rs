use anyhow::Result;
use rand::seq::SliceRandom;

use super::backend::{ChatBackend, ChatRequest};
use crate::models::Emotion;

/// Canned, emotion-aware replies used when no language model is reachable.
#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineResponder;

impl OfflineResponder {
    pub fn reply(&self, emotion: Option<Emotion>) -> String {
        pick(replies(emotion.unwrap_or(Emotion::Neutral)))
    }

    pub fn greeting(&self, emotion: Option<Emotion>) -> &'static str {
        match emotion.unwrap_or(Emotion::Neutral) {
            Emotion::Happy => "Hey! You look like you're in a good mood today.",
            Emotion::Sad => "Hello... I'm here if you need to talk.",
            Emotion::Angry => "Hi. Something seems to be bothering you. I'm listening.",
            Emotion::Neutral => "Hello! How can I help you today?",
            Emotion::Fear => "Hi... I'm here, everything is okay. What would you like to talk about?",
            Emotion::Surprise => "Oh, hello! You look surprised to see me!",
            Emotion::Disgust => "Hi... Is something wrong? I'm here to talk about it.",
        }
    }

    /// A short well-being suggestion matching `emotion`.
    pub fn wellness_tip(&self, emotion: Option<Emotion>) -> String {
        let tips: &[&str] = match emotion.unwrap_or(Emotion::Neutral) {
            Emotion::Happy | Emotion::Surprise => &[
                "Write this moment down in a journal so you can come back to it.",
                "Share your good mood with someone, it tends to spread.",
                "Use this energy for something you enjoy.",
            ],
            Emotion::Sad => &[
                "A short walk in fresh air can help clear your head.",
                "Put on some music you love.",
                "Take a moment for yourself: something warm to drink and some rest.",
            ],
            Emotion::Angry | Emotion::Disgust => &[
                "Try 4-7-8 breathing: in for 4 seconds, hold for 7, out for 8.",
                "Physical exercise helps release frustration. How about a short walk?",
                "Write down what is bothering you, then crumple the paper and throw it away.",
            ],
            Emotion::Fear => &[
                "Ground yourself in the present: name five things you can see around you.",
                "Slow, deep breathing calms the nervous system.",
                "Most of what we worry about never actually happens.",
            ],
            Emotion::Neutral => &[
                "A good moment to try something new.",
                "Use the calm to plan something you are looking forward to.",
                "Try some gratitude: three good things from today?",
            ],
        };
        pick(tips)
    }
}

impl ChatBackend for OfflineResponder {
    fn respond(&self, request: &ChatRequest) -> Result<String> {
        Ok(self.reply(request.current_emotion))
    }
}

fn replies(emotion: Emotion) -> &'static [&'static str] {
    match emotion {
        Emotion::Happy => &[
            "Nice to see you in a good mood! What's making you happy today?",
            "Your smile is contagious! Tell me about your day?",
            "Love this positive energy! What good thing happened?",
        ],
        Emotion::Sad => &[
            "It looks like you're going through a hard moment... I'm here for you. Want to talk about it?",
            "It's okay not to be okay sometimes. What's on your mind?",
            "I'm here to listen, without judgement. Take your time.",
        ],
        Emotion::Angry => &[
            "I understand you're frustrated. Take a deep breath... What happened?",
            "Anger is normal. Would talking about it help let some of it out?",
            "I'm listening. Sometimes saying what annoys us does us good.",
        ],
        Emotion::Neutral => &[
            "Hey! How are you doing? What brings you here today?",
            "Hi! Good to see you. What would you like to talk about?",
            "Hello! How's your day going so far?",
        ],
        Emotion::Fear => &[
            "I'm here, it's going to be alright. What's worrying you?",
            "Breathe slowly... I understand you might feel anxious. Talk to me.",
            "You're not alone. Tell me what scares you and we can talk it through.",
        ],
        Emotion::Surprise => &[
            "Oh! You look surprised! Did something unexpected happen?",
            "Wow, I can see the surprise on your face! Tell me!",
            "What surprised you like that? I'm curious!",
        ],
        Emotion::Disgust => &[
            "Hmm, something doesn't seem to sit right with you... Want to talk about it?",
            "I can see something is bothering you. What happened?",
            "Looks like you went through something unpleasant. I'm listening.",
        ],
    }
}

fn pick(options: &[&str]) -> String {
    options
        .choose(&mut rand::thread_rng())
        .copied()
        .unwrap_or_default()
        .to_string()
}
