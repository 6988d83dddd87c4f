//! Rock Paper Scissors

use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Move {
    Rock,
    Paper,
    Scissors,
}

impl Move {
    pub const ALL: [Move; 3] = [Move::Rock, Move::Paper, Move::Scissors];

    pub fn as_str(&self) -> &'static str {
        match self {
            Move::Rock => "rock",
            Move::Paper => "paper",
            Move::Scissors => "scissors",
        }
    }

    fn beats(&self, other: Move) -> bool {
        matches!(
            (self, other),
            (Move::Rock, Move::Scissors) | (Move::Paper, Move::Rock) | (Move::Scissors, Move::Paper)
        )
    }
}

impl fmt::Display for Move {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Only an exact move name (any case, surrounding whitespace ignored) parses
impl FromStr for Move {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "rock" => Ok(Move::Rock),
            "paper" => Ok(Move::Paper),
            "scissors" => Ok(Move::Scissors),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundResult {
    Draw,
    UserWins,
    BotWins,
}

impl RoundResult {
    pub fn decide(user: Move, bot: Move) -> Self {
        if user == bot {
            RoundResult::Draw
        } else if user.beats(bot) {
            RoundResult::UserWins
        } else {
            RoundResult::BotWins
        }
    }

    fn verdict(&self) -> &'static str {
        match self {
            RoundResult::Draw => "Draw! 😒 🤝",
            RoundResult::UserWins => "You win 😏 😤",
            RoundResult::BotWins => "I win! 😌 🎉",
        }
    }
}

/// HTML reply for a finished round
pub fn render_round(user: Move, bot: Move) -> String {
    format!(
        "<b>✂️ RPS</b>\n\nYou: {}\nMe: {}\n\n{}",
        user,
        bot,
        RoundResult::decide(user, bot).verdict()
    )
}
