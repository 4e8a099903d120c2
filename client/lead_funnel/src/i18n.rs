//! Russian and English strings for the funnel.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::FunnelError;
use crate::store::{Capital, Motivation, Readiness};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Ru,
    En,
}

impl Language {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ru => "ru",
            Self::En => "en",
        }
    }

    pub fn messages(&self) -> &'static Messages {
        match self {
            Self::Ru => &RU,
            Self::En => &EN,
        }
    }
}

impl FromStr for Language {
    type Err = FunnelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ru" => Ok(Self::Ru),
            "en" => Ok(Self::En),
            other => Err(FunnelError::Config(format!("Unsupported language: {other}"))),
        }
    }
}

#[derive(Debug)]
pub struct HomeMessages {
    pub title: &'static str,
    pub highlight: [&'static str; 2],
    pub subtitle: &'static str,
    pub start_button: &'static str,
}

#[derive(Debug)]
pub struct ContactMessages {
    pub title: &'static str,
    pub name_placeholder: &'static str,
    pub phone_placeholder: &'static str,
    pub email_placeholder: &'static str,
    pub name_error: &'static str,
    pub phone_error: &'static str,
    pub email_error: &'static str,
}

#[derive(Debug)]
pub struct FinalMessages {
    pub title: &'static str,
    pub subtitle: &'static str,
    pub description: &'static str,
    pub home_button: &'static str,
}

#[derive(Debug)]
pub struct Messages {
    pub home: HomeMessages,
    pub back: &'static str,
    pub next: &'static str,
    pub submit: &'static str,
    pub capital_title: &'static str,
    /// Indexed like [`Capital::ALL`].
    pub capital_options: [&'static str; 3],
    pub motivation_title: &'static str,
    /// Indexed like [`Motivation::ALL`].
    pub motivation_options: [&'static str; 4],
    pub readiness_title: &'static str,
    /// Indexed like [`Readiness::ALL`].
    pub readiness_options: [&'static str; 4],
    pub contact: ContactMessages,
    pub done: FinalMessages,
}

impl Messages {
    pub fn capital_label(&self, capital: Capital) -> &'static str {
        let idx = Capital::ALL.iter().position(|c| *c == capital).unwrap_or(0);
        self.capital_options[idx]
    }

    pub fn motivation_label(&self, motivation: Motivation) -> &'static str {
        let idx = Motivation::ALL
            .iter()
            .position(|m| *m == motivation)
            .unwrap_or(0);
        self.motivation_options[idx]
    }

    pub fn readiness_label(&self, readiness: Readiness) -> &'static str {
        let idx = Readiness::ALL
            .iter()
            .position(|r| *r == readiness)
            .unwrap_or(0);
        self.readiness_options[idx]
    }
}

pub static RU: Messages = Messages {
    home: HomeMessages {
        title: "КАК СДЕЛАТЬ",
        highlight: ["$800 ЗА", "11 ДНЕЙ?"],
        subtitle: "Пройди опрос и получи\nперсональную стратегию",
        start_button: "Начать",
    },
    back: "Назад",
    next: "Далее",
    submit: "Отправить",
    capital_title: "Какой у вас капитал для начала работы в арбитраже?",
    capital_options: ["До $200", "От 300 до $1000", "От $1000 и больше"],
    motivation_title: "Что вас мотивирует зарабатывать на арбитраже?",
    motivation_options: [
        "Хочу дополнительный доход",
        "Хочу сменить основную работу",
        "Хочу увеличить капитал и войти в крипторынок",
        "Уже зарабатываю, хочу масштабировать",
    ],
    readiness_title: "Насколько быстро вы готовы начать после консультации?",
    readiness_options: [
        "Готов(а) сразу после общения",
        "Готов стартовать на неделе",
        "Сначала хочу разобраться подробнее",
        "Не уверен(а), просто интересно",
    ],
    contact: ContactMessages {
        title: "Оставьте контакт, и наш специалист свяжется с вами!",
        name_placeholder: "Имя*",
        phone_placeholder: "(000) 000 - 0000*",
        email_placeholder: "Почта",
        name_error: "Введите имя",
        phone_error: "Введите корректный номер телефона",
        email_error: "Введите корректный email",
    },
    done: FinalMessages {
        title: "Спасибо за вашу заявку!",
        subtitle: "Наш специалист свяжется с вами в ближайшее время",
        description:
            "Мы получили ваши данные и скоро начнем работу над вашей персональной стратегией",
        home_button: "На главную",
    },
};

pub static EN: Messages = Messages {
    home: HomeMessages {
        title: "HOW TO MAKE",
        highlight: ["$800 IN", "11 DAYS?"],
        subtitle: "Take the quiz and get\na personalized strategy",
        start_button: "Start",
    },
    back: "Back",
    next: "Next",
    submit: "Submit",
    capital_title: "What capital do you have to start working in arbitrage?",
    capital_options: ["Up to $200", "From $300 to $1000", "From $1000 and more"],
    motivation_title: "What motivates you to earn money on arbitrage?",
    motivation_options: [
        "I want additional income",
        "I want to change my main job",
        "I want to increase capital and enter the crypto market",
        "Already earning, want to scale",
    ],
    readiness_title: "How soon are you ready to start after the consultation?",
    readiness_options: [
        "Ready right after the consultation",
        "Ready to start within a week",
        "Want to learn more first",
        "Not sure, just curious",
    ],
    contact: ContactMessages {
        title: "Leave your contact and our specialist will contact you!",
        name_placeholder: "Name*",
        phone_placeholder: "(000) 000 - 0000*",
        email_placeholder: "Email",
        name_error: "Enter your name",
        phone_error: "Enter a valid phone number",
        email_error: "Enter a valid email",
    },
    done: FinalMessages {
        title: "Thank you for your application!",
        subtitle: "Our specialist will contact you soon",
        description:
            "We have received your information and will start working on your personalized strategy soon",
        home_button: "Home",
    },
};
