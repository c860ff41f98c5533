//! Prompts for language-model seats.
//!
//! The system prompt fixes the persona and the answer format; the user
//! prompt renders only what the seat's view already holds.

use std::fmt::Write as _;

use coordination::agent::PastRound;
use coordination::{HeuristicStrategy, ProviderRequest, Stage};

/// Rounds of history rendered into the user prompt.
pub const HISTORY_WINDOW: usize = 8;

fn task_rules(reward_unit: i32) -> String {
    format!(
        "You are one of five players in a repeated two-option game. Each round one option, \
         A or B, pays off for everyone. Which option is more likely to pay changes without \
         warning every few rounds. Each round has two stages. In each stage you pick an option \
         and bet 1, 2 or 3: a correct pick wins {reward_unit} points per bet unit, a wrong pick \
         loses the same. After the first stage you see what the other four players picked, and \
         you may change your mind for the second stage."
    )
}

const ANSWER_FORMAT: &str = "Answer with one JSON object and nothing else, for example \
{\"choice\": \"A\", \"bet\": 2}. `choice` must be \"A\" or \"B\" and `bet` must be 1, 2 or 3.";

fn persona(strategy: HeuristicStrategy) -> &'static str {
    match strategy {
        HeuristicStrategy::Standard => {
            "Weigh your own results and the other players' picks equally. Bet more the longer \
             your current winning streak."
        }
        HeuristicStrategy::RiskTaking => {
            "You play boldly. Stay with an option while it wins and drop it after a loss or \
             as soon as any other player disagrees. Bet either 1 or 3, never 2."
        }
        HeuristicStrategy::SocialFollower => {
            "You trust the group more than yourself. Follow the majority of the other players, \
             and bet high when they all agree."
        }
        HeuristicStrategy::Random => "Pick and bet without any particular pattern.",
    }
}

pub fn system_prompt(strategy: HeuristicStrategy, reward_unit: i32) -> String {
    format!("{}\n\n{}\n\n{ANSWER_FORMAT}", task_rules(reward_unit), persona(strategy))
}

fn render_round(out: &mut String, past: &PastRound) {
    let peers: Vec<String> = past
        .peer_second
        .iter()
        .map(|p| p.choice.to_string())
        .collect();
    let _ = writeln!(
        out,
        "- round {}: you picked {} (bet {}) then {} (bet {}), {} ({:+} points); others finally picked {}",
        past.round,
        past.first_choice,
        past.first_bet,
        past.second_choice,
        past.second_bet,
        if past.correct { "correct" } else { "wrong" },
        past.delta,
        peers.join(" "),
    );
}

pub fn user_prompt(request: &ProviderRequest) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Round {} of {}.", request.round, request.total_rounds);

    if request.round_history.is_empty() {
        out.push_str("No earlier rounds.\n");
    } else {
        let skip = request.round_history.len().saturating_sub(HISTORY_WINDOW);
        out.push_str("Recent rounds:\n");
        for past in &request.round_history[skip..] {
            render_round(&mut out, past);
        }
    }

    match request.stage {
        Stage::First => out.push_str("\nFirst stage: make your pick and bet.\n"),
        Stage::Second => {
            if let (Some(choice), Some(bet)) = (request.own_first_choice, request.own_first_bet) {
                let _ = writeln!(out, "\nThis round you first picked {choice} with bet {bet}.");
            }
            let peers: Vec<String> = request
                .visible_peer_choices
                .iter()
                .map(|p| format!("player {} picked {}", p.slot, p.choice))
                .collect();
            let _ = writeln!(out, "The others: {}.", peers.join(", "));
            out.push_str("Second stage: make your final pick and bet.\n");
        }
    }

    let _ = writeln!(out, "You have {} ms to answer.", request.deadline_millis);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_prompts_differ_by_persona() {
        let standard = system_prompt(HeuristicStrategy::Standard, 20);
        let risky = system_prompt(HeuristicStrategy::RiskTaking, 20);
        assert_ne!(standard, risky);
        assert!(risky.contains("never 2"));
        assert!(standard.contains("\"choice\""));
    }

    #[test]
    fn test_system_prompt_uses_configured_reward_unit() {
        let prompt = system_prompt(HeuristicStrategy::Standard, 50);
        assert!(prompt.contains("wins 50 points per bet unit"));
        assert!(!prompt.contains("20 points"));
    }
}
