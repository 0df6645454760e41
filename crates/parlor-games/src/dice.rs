//! Best-of-N die-roll duels.
//!
//! Each round both players roll one six-sided die, in either order. The
//! higher roll takes the round; a tie discards both rolls and the round is
//! replayed. The first player to win more than half the rounds wins the match.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{GameError, GameResult};
use crate::seat::{Outcome, Seat};

/// Round counts a match may be played over.
pub const ROUND_OPTIONS: [u8; 3] = [3, 5, 9];

/// Roll a six-sided die.
pub fn roll(rng: &mut impl Rng) -> u8 {
    rng.random_range(1..=6)
}

/// A single resolved or tied round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundResult {
    /// The challenger's roll.
    pub challenger: u8,
    /// The opponent's roll.
    pub opponent: u8,
    /// Who took the round, or `None` on a tie.
    pub winner: Option<Seat>,
}

/// What a single roll did to the match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RollEffect {
    /// The first roll of a round; waiting for the other player.
    Waiting,
    /// The round was resolved (or tied) by this roll.
    Round(RoundResult),
}

/// State of a dice match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiceMatch {
    rounds: u8,
    scores: [u8; 2],
    pending: Option<(Seat, u8)>,
    history: Vec<RoundResult>,
    outcome: Option<Outcome>,
}

impl DiceMatch {
    /// Start a best-of-`rounds` match.
    pub fn new(rounds: u8) -> GameResult<Self> {
        if !ROUND_OPTIONS.contains(&rounds) {
            return Err(GameError::InvalidRounds(rounds));
        }
        Ok(Self {
            rounds,
            scores: [0, 0],
            pending: None,
            history: Vec::new(),
            outcome: None,
        })
    }

    /// Configured round count.
    pub fn rounds(&self) -> u8 {
        self.rounds
    }

    /// Rounds won by a seat.
    pub fn score(&self, seat: Seat) -> u8 {
        self.scores[seat.index()]
    }

    /// Rounds needed to take the match.
    pub fn target(&self) -> u8 {
        self.rounds / 2 + 1
    }

    /// Every round played so far, ties included.
    pub fn history(&self) -> &[RoundResult] {
        &self.history
    }

    /// The seat whose roll is still outstanding this round, if one already rolled.
    pub fn waiting_on(&self) -> Option<Seat> {
        self.pending.map(|(seat, _)| seat.other())
    }

    /// Whether `seat` may roll now.
    pub fn can_roll(&self, seat: Seat) -> bool {
        self.outcome.is_none() && self.pending.is_none_or(|(s, _)| s != seat)
    }

    /// The match result, once decided.
    pub fn outcome(&self) -> Option<Outcome> {
        self.outcome
    }

    /// Record a roll by `seat`.
    pub fn roll(&mut self, seat: Seat, value: u8) -> GameResult<RollEffect> {
        if self.outcome.is_some() {
            return Err(GameError::GameOver);
        }
        if !(1..=6).contains(&value) {
            return Err(GameError::InvalidDie(value));
        }
        let Some((first_seat, first_value)) = self.pending else {
            self.pending = Some((seat, value));
            return Ok(RollEffect::Waiting);
        };
        if first_seat == seat {
            return Err(GameError::NotYourTurn);
        }
        self.pending = None;

        let mut rolls = [0u8; 2];
        rolls[first_seat.index()] = first_value;
        rolls[seat.index()] = value;
        let winner = match rolls[0].cmp(&rolls[1]) {
            std::cmp::Ordering::Greater => Some(Seat::Challenger),
            std::cmp::Ordering::Less => Some(Seat::Opponent),
            std::cmp::Ordering::Equal => None,
        };
        let result = RoundResult {
            challenger: rolls[0],
            opponent: rolls[1],
            winner,
        };
        self.history.push(result);

        if let Some(w) = winner {
            self.scores[w.index()] += 1;
            if self.scores[w.index()] >= self.target() {
                self.outcome = Some(Outcome::Win(w));
            }
        }
        Ok(RollEffect::Round(result))
    }

    /// Scoreline as `challenger-opponent`.
    pub fn render(&self) -> String {
        format!(
            "best of {}: {}-{}",
            self.rounds, self.scores[0], self.scores[1]
        )
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::*;

    #[test]
    fn best_of_three_scenario() {
        let mut m = DiceMatch::new(3).unwrap();
        m.roll(Seat::Challenger, 4).unwrap();
        m.roll(Seat::Opponent, 2).unwrap();
        m.roll(Seat::Challenger, 1).unwrap();
        m.roll(Seat::Opponent, 5).unwrap();
        assert_eq!(m.outcome(), None);
        m.roll(Seat::Challenger, 6).unwrap();
        let effect = m.roll(Seat::Opponent, 3).unwrap();
        assert_eq!(
            effect,
            RollEffect::Round(RoundResult {
                challenger: 6,
                opponent: 3,
                winner: Some(Seat::Challenger)
            })
        );
        assert_eq!(m.outcome(), Some(Outcome::Win(Seat::Challenger)));
        assert_eq!(m.score(Seat::Challenger), 2);
        assert_eq!(m.score(Seat::Opponent), 1);
    }

    #[test]
    fn tie_replays_round() {
        let mut m = DiceMatch::new(3).unwrap();
        m.roll(Seat::Opponent, 3).unwrap();
        let effect = m.roll(Seat::Challenger, 3).unwrap();
        assert!(matches!(effect, RollEffect::Round(RoundResult { winner: None, .. })));
        assert_eq!(m.score(Seat::Challenger), 0);
        assert_eq!(m.score(Seat::Opponent), 0);
        assert!(m.can_roll(Seat::Challenger));
        assert!(m.can_roll(Seat::Opponent));
    }

    #[test]
    fn double_roll_rejected() {
        let mut m = DiceMatch::new(5).unwrap();
        m.roll(Seat::Challenger, 2).unwrap();
        let before = m.clone();
        assert_eq!(m.roll(Seat::Challenger, 6), Err(GameError::NotYourTurn));
        assert_eq!(m, before);
        assert_eq!(m.waiting_on(), Some(Seat::Opponent));
    }

    #[test]
    fn invalid_values() {
        assert_eq!(DiceMatch::new(4), Err(GameError::InvalidRounds(4)));
        let mut m = DiceMatch::new(9).unwrap();
        assert_eq!(m.roll(Seat::Challenger, 0), Err(GameError::InvalidDie(0)));
        assert_eq!(m.roll(Seat::Challenger, 7), Err(GameError::InvalidDie(7)));
    }

    #[test]
    fn targets() {
        assert_eq!(DiceMatch::new(3).unwrap().target(), 2);
        assert_eq!(DiceMatch::new(5).unwrap().target(), 3);
        assert_eq!(DiceMatch::new(9).unwrap().target(), 5);
    }

    #[test]
    fn no_rolls_after_match() {
        let mut m = DiceMatch::new(3).unwrap();
        for _ in 0..2 {
            m.roll(Seat::Challenger, 6).unwrap();
            m.roll(Seat::Opponent, 1).unwrap();
        }
        assert_eq!(m.roll(Seat::Opponent, 4), Err(GameError::GameOver));
    }

    #[test]
    fn rolls_in_range() {
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..200 {
            assert!((1..=6).contains(&roll(&mut rng)));
        }
    }
}
