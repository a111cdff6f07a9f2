//! Rich content shown during webinar booking

use supportbot_core::{CardAction, HeroCard};

/// Webinars offered in the booking carousel
pub const WEBINARS: &[Webinar] = &[
    Webinar {
        title: "Academic Referencing",
        duration: "45 Minutes",
        description: "Referencing/writing: an interactive session designed to teach you how to reference your course materials and other sources in your assessments.",
        image: "https://s3.envato.com/files/111173317/Preview%20Notebook%20vs%20Pencil.JPG",
    },
    Webinar {
        title: "Live Orientation",
        duration: "45 Minutes",
        description: "Live orientation: this is the first step in getting started with your course and recommended for all new students.",
        image: "http://au.elevateeducation.com/cms_uploads/images/134_au_attention-study-and-the-facebook-effect.jpg",
    },
    Webinar {
        title: "Time Management",
        duration: "45 minutes",
        description: "Time management and study tips: this is an interactive session designed to help you learn how to set up a study plan that works for you.",
        image: "http://www.rachelobeauty.com/wp-content/uploads/2013/11/AABusyMom.jpg",
    },
];

/// Session times offered after a webinar is picked
pub const TIME_SLOTS: &[&str] = &[
    "Tuesday 3rd April - 3:15pm",
    "Wednesday 4th April - 7:15pm",
    "Friday 6th April - 12:15pm",
    "Later date",
];

/// Replies offered on the booking confirmation
pub const BOOKING_REPLIES: &[&str] = &["Yes please", "No thank you", "Take me back to the start"];

pub const WEBINAR_INFO_URL: &str =
    "https://os.opencolleges.edu.au/page#/support-article/what-are-online-tutorials-and-how-can-they-help-you";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Webinar {
    pub title: &'static str,
    pub duration: &'static str,
    pub description: &'static str,
    pub image: &'static str,
}

impl Webinar {
    pub fn card(&self) -> HeroCard {
        HeroCard::new(self.title)
            .subtitle(self.duration)
            .text(self.description)
            .image(self.image)
            .button(CardAction::im_back(self.title, "Choose a Time"))
    }
}

pub fn webinar_cards() -> Vec<HeroCard> {
    WEBINARS.iter().map(Webinar::card).collect()
}

/// Webinar whose title matches the reply, ignoring case
pub fn find_webinar(reply: &str) -> Option<&'static Webinar> {
    let reply = reply.trim();
    WEBINARS
        .iter()
        .find(|w| w.title.eq_ignore_ascii_case(reply))
}

pub fn im_back_actions(values: &[&str]) -> Vec<CardAction> {
    values.iter().map(|v| CardAction::im_back(*v, *v)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cards_post_their_title() {
        let cards = webinar_cards();
        assert_eq!(cards.len(), 3);
        assert_eq!(cards[1].buttons[0].value, "Live Orientation");
        assert_eq!(cards[1].buttons[0].title, "Choose a Time");
    }

    #[test]
    fn test_find_webinar() {
        assert_eq!(
            find_webinar(" time management ").map(|w| w.title),
            Some("Time Management")
        );
        assert!(find_webinar("Cooking").is_none());
    }
}
