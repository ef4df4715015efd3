//! Hints for the player: what to build next, or what is wrong with the plan.
//!
//! The first two suggestions are always shown while unmet. After that a coin
//! decides whether a problem is reported first, and unmet suggestions are
//! randomly skipped so the player does not see the same hint every time.

use rand::Rng;
use rand_distr::{Bernoulli, Distribution};

use super::coverage::reachable_in_room;
use super::graph::GraphStore;
use crate::common::catalog::Modality;

/// Probability of each coin flip.
const COIN_PROBABILITY: f64 = 0.5;

pub const LOADING_TEXT: &str = "Wait for the game to load..";

pub const ALL_DONE_TEXT: &str = "Looks like you're all done with the \"basic\" stuff. Keep up the good work!\n\n\
Some ideas to try out:\n\
- What's the minimal number of devices needed to achieve full coverage?\n\
- If you're using BLE for communication, try switching the network to TSCH and vice versa.\n\
- Indoor localization relies on Forwarding Gateways: the more, the better (but they also make the system more expensive).";

/// A single hint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hint {
    Suggestion(&'static str),
    Problem(&'static str),
}

impl Hint {
    pub fn text(&self) -> &'static str {
        match self {
            Hint::Suggestion(t) | Hint::Problem(t) => t,
        }
    }
}

impl std::fmt::Display for Hint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Hint::Suggestion(t) => write!(f, "Suggestion: {}", t),
            Hint::Problem(t) => write!(f, "Problem: {}", t),
        }
    }
}

/// Plan facts a hint can depend on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Check {
    HasNodes,
    HasLinks,
    HasHomeGateway,
    HasAnySensor,
    Has(Modality),
    Reachable(Modality),
    ReachableIn(Modality, &'static str),
    ReachableGatewayInBedroom,
    GatewaysMeshedOrFew,
    PlacedIn(Modality, &'static str),
    PlacedInBedroom(Modality),
    Unreachable(Modality),
    Disconnected(Modality),
    MoreThan(Modality, usize),
}

impl Check {
    fn holds(&self, store: &GraphStore) -> bool {
        match *self {
            Check::HasNodes => store.node_count() > 0,
            Check::HasLinks => store.link_count() > 0,
            Check::HasHomeGateway => store.nodes().iter().any(|n| n.device_type.is_home_gateway),
            Check::HasAnySensor => {
                store.has_modality(Modality::Environmental) || store.has_modality(Modality::Wearable) || store.has_modality(Modality::Video)
            }
            Check::Has(m) => store.has_modality(m),
            Check::Reachable(m) => store.has_reachable(m),
            Check::ReachableIn(m, room) => reachable_in_room(store, m, room),
            Check::ReachableGatewayInBedroom => {
                reachable_in_room(store, Modality::Gateway, "guest bedroom") || reachable_in_room(store, Modality::Gateway, "master bedroom")
            }
            Check::GatewaysMeshedOrFew => store.nodes_of(Modality::Gateway).count() < 2 || store.has_gateway_mesh(),
            Check::PlacedIn(m, room) => store.nodes_of(m).any(|n| n.in_room(room)),
            Check::PlacedInBedroom(m) => store.nodes_of(m).any(|n| n.in_room("master bedroom") || n.in_room("guest bedroom")),
            Check::Unreachable(m) => store.nodes_of(m).any(|n| !n.is_reachable),
            Check::Disconnected(m) => store.nodes_of(m).any(|n| !n.is_reachable && store.outgoing_count(&n.id) == 0),
            Check::MoreThan(m, count) => store.nodes_of(m).count() > count,
        }
    }
}

/// Shown while the check does not hold.
const SUGGESTIONS: [(Check, &str); 16] = [
    (
        Check::HasNodes,
        "Try adding some devices from the catalog to the house plan to get started",
    ),
    (
        Check::HasLinks,
        "Join the devices together with links to get started.\nA link goes from an output of a device to an input of another device",
    ),
    (Check::HasHomeGateway, "A smart home system needs a home gateway"),
    (Check::HasAnySensor, "A smart home system needs sensors for data collection"),
    (
        Check::Has(Modality::Environmental),
        "A smart home system needs environmental sensors to capture ambient information about the rooms",
    ),
    (
        Check::Has(Modality::Wearable),
        "A smart home system needs a wristband sensor (a \"wearable\") to capture participant activity and location in the house in every moment",
    ),
    (
        Check::Has(Modality::Video),
        "A smart home system needs video sensors to capture participant activities and information about their quality of movement",
    ),
    (
        Check::Has(Modality::Gateway),
        "Adding forwarding gateways to the system is necessary to collect information from the wristband sensors; it also helps to increase the coverage in parts of the house remote from the Home Gateway",
    ),
    (
        Check::Reachable(Modality::Environmental),
        "Environmental sensors need to be able to reach the Home Gateway",
    ),
    (
        Check::Reachable(Modality::Video),
        "Information extracted from raw video need to be able to reach the Home Gateway",
    ),
    (
        Check::Reachable(Modality::Gateway),
        "Information from wristband devices need to be able to reach the Home Gateway",
    ),
    (
        Check::ReachableIn(Modality::Video, "hall-and-stairs"),
        "A connected video sensor in the hall helps to detect movement quality, especially about participants moving up and down the stairs. This is useful to, for example, monitor the recovery of patients after hip or knee operations, and diagnose the severity of chronic health conditions such as Parkinson's disease",
    ),
    (
        Check::ReachableIn(Modality::Video, "kitchen"),
        "A connected video sensor in the kitchen helps to detect cooking-related activities. This is useful to diagnose the \"complexity\" and duration of meals, which is useful for many medical applications, including monitoring and early diagnosis of Alzheimer's disease",
    ),
    (
        Check::ReachableIn(Modality::Video, "living room"),
        "A connected video sensor in the living room records a lot of information about activities, such as the time spent watching TV",
    ),
    (
        Check::ReachableGatewayInBedroom,
        "A connected Forwarding Gateway in the bedroom is useful to record information about sleep quality during night, assuming a wristband device is worn by the participant sleeping there. Bad sleep quality is correlated with many medical conditions, and may increase the risk of depressing and hypertension",
    ),
    (
        Check::GatewaysMeshedOrFew,
        "There are multiple Forwarding Gateways, but they are not connected in a mesh (that is, with each another). Connecting them in a mesh will allow to cover more areas in the house with Wearable Sensing and Environmental Sensing. The Forwarding gateways are going forward data from environmental sensors and wristband sensors to the Home Gateway",
    ),
];

/// Shown while the check holds.
const PROBLEMS: [(Check, &str); 9] = [
    (
        Check::PlacedInBedroom(Modality::Video),
        "Video monitoring in bedrooms could be seen as a severe violation of participant privacy",
    ),
    (
        Check::PlacedIn(Modality::Video, "toilet"),
        "Video monitoring in the toilet could be seen as a severe violation of participant privacy",
    ),
    (
        Check::PlacedIn(Modality::Video, "bathroom"),
        "Video monitoring in the bathroom could be seen as a severe violation of participant privacy",
    ),
    (
        Check::Unreachable(Modality::Gateway),
        "There is a disconnected Forwarding Gateway. All Forwarding Gateways need to be able to communicate with the Home Gateway either directly or, for most of them, through another Forwarding Gateway",
    ),
    (
        Check::Disconnected(Modality::Environmental),
        "There is a disconnected environmental sensor. All environmental sensors need to be able to communicate with the Home Gateway through a Forwarding Gateway",
    ),
    (
        Check::Unreachable(Modality::Environmental),
        "There is an unreachable environmental sensor. All environmental sensors need to be able to communicate with the Home Gateway through a Forwarding Gateway",
    ),
    (
        Check::Disconnected(Modality::Video),
        "There is a disconnected video camera. Each video camera needs to be connected to a Video Gateway with a USB cable",
    ),
    (
        Check::Unreachable(Modality::Video),
        "There is an unreachable video camera. All video cameras need to be able to communicate with the Home Gateway through a Video Gateway",
    ),
    (
        Check::MoreThan(Modality::Video, 3),
        "More than three video cameras may make you run out of budget too soon if you're not careful",
    ),
];

fn flip<R: Rng + ?Sized>(rng: &mut R) -> bool {
    match Bernoulli::new(COIN_PROBABILITY) {
        Ok(coin) => coin.sample(rng),
        Err(_) => false,
    }
}

/// Pick the hint to show for the current plan.
///
/// `started` is false until the engine has finished loading.
pub fn suggest<R: Rng + ?Sized>(store: &GraphStore, started: bool, rng: &mut R) -> Hint {
    if !started {
        return Hint::Suggestion(LOADING_TEXT);
    }

    for (check, text) in SUGGESTIONS.iter().take(2) {
        if !check.holds(store) {
            return Hint::Suggestion(text);
        }
    }

    if flip(rng) {
        if let Some((_, text)) = PROBLEMS.iter().find(|(check, _)| check.holds(store)) {
            return Hint::Problem(text);
        }
    }

    let last = SUGGESTIONS.len() - 1;
    let mut any_skipped = false;
    for pass in 0..2 {
        for (i, (check, text)) in SUGGESTIONS.iter().enumerate().skip(2) {
            if check.holds(store) {
                continue;
            }
            if pass == 0 && i != last && flip(rng) {
                any_skipped = true;
                continue;
            }
            return Hint::Suggestion(text);
        }
        if !any_skipped {
            break;
        }
    }

    Hint::Suggestion(ALL_DONE_TEXT)
}
