//! Stake settlement.
//!
//! [`settle`] turns a completed session into ledger deltas and media
//! trophies. It is pure; exactly-once application is guaranteed by the
//! caller, which settles only on the step that completed the session.

use parlor_core::{MediaKind, Stake, UserId};
use parlor_games::Seat;

use crate::session::{Resolution, Session};

/// A forfeited media stake, posted to the group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trophy {
    /// Who staked it.
    pub owner: UserId,
    /// Media kind.
    pub kind: MediaKind,
    /// Platform reference.
    pub reference: String,
}

/// Side effects of a resolved session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Settlement {
    /// Ledger deltas, in application order.
    pub deltas: Vec<(UserId, i64)>,
    /// Media to expose.
    pub trophies: Vec<Trophy>,
}

impl Settlement {
    /// Whether nothing changes hands.
    pub fn is_empty(&self) -> bool {
        self.deltas.is_empty() && self.trophies.is_empty()
    }

    /// Net ledger change across all users.
    pub fn net(&self) -> i64 {
        self.deltas.iter().map(|(_, d)| d).sum()
    }

    /// `owner` loses `stake`, optionally to `beneficiary`.
    fn forfeit(&mut self, owner: UserId, stake: &Stake, beneficiary: Option<UserId>) {
        match stake {
            Stake::Points { amount } => {
                if let Some(to) = beneficiary {
                    self.deltas.push((to, *amount));
                }
                self.deltas.push((owner, -amount));
            }
            Stake::Media { kind, reference } => self.trophies.push(Trophy {
                owner,
                kind: *kind,
                reference: reference.clone(),
            }),
        }
    }
}

/// Compute what a completed session settles. Friendly and unresolved
/// sessions settle nothing.
pub fn settle(session: &Session) -> Settlement {
    let mut out = Settlement::default();
    if !session.staked {
        return out;
    }
    let Some(resolution) = &session.resolution else {
        return out;
    };
    match resolution {
        Resolution::Won { winner, loser } => {
            if let Some(stake) = session
                .seat_of(*loser)
                .and_then(|seat| session.stakes.of(seat))
            {
                out.forfeit(*loser, stake, Some(*winner));
            }
        }
        Resolution::Draw
        | Resolution::Cancelled {
            forfeit: true, ..
        } => {
            for seat in [Seat::Challenger, Seat::Opponent] {
                if let Some(stake) = session.stakes.of(seat) {
                    out.forfeit(session.user_at(seat), stake, None);
                }
            }
        }
        Resolution::Refused { by } => match &session.revenge_of {
            Some(link) => {
                if let Some(stake) = &link.conceded {
                    out.forfeit(*by, stake, Some(session.challenger));
                }
            }
            None => {
                if let Some(stake) = &session.stakes.challenger {
                    out.forfeit(session.challenger, stake, None);
                }
            }
        },
        Resolution::Cancelled { forfeit: false, .. } => {}
    }
    out
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Utc};
    use parlor_core::{GroupId, SessionId};
    use proptest::prelude::*;

    use super::*;
    use crate::session::{CancelReason, RevengeLink, SessionStatus, Stakes};

    const ANN: UserId = UserId(1);
    const BO: UserId = UserId(2);

    fn done(resolution: Resolution, challenger: Stake, opponent: Option<Stake>) -> Session {
        let mut s = Session::new(GroupId(1), ANN, BO, true, DateTime::<Utc>::default()).unwrap();
        s.status = SessionStatus::Complete;
        s.stakes = Stakes {
            challenger: Some(challenger),
            opponent,
        };
        s.resolution = Some(resolution);
        s
    }

    fn pts(amount: i64) -> Stake {
        Stake::Points { amount }
    }

    fn photo(r: &str) -> Stake {
        Stake::Media {
            kind: MediaKind::Photo,
            reference: r.into(),
        }
    }

    #[test]
    fn winner_takes_loser_points() {
        let s = done(
            Resolution::Won {
                winner: ANN,
                loser: BO,
            },
            pts(10),
            Some(pts(30)),
        );
        let out = settle(&s);
        assert_eq!(out.deltas, vec![(ANN, 30), (BO, -30)]);
        assert_eq!(out.net(), 0);
        assert!(out.trophies.is_empty());
    }

    #[test]
    fn media_loss_becomes_trophy() {
        let s = done(
            Resolution::Won {
                winner: BO,
                loser: ANN,
            },
            photo("p-1"),
            Some(pts(5)),
        );
        let out = settle(&s);
        assert!(out.deltas.is_empty());
        assert_eq!(out.trophies[0].owner, ANN);
        assert_eq!(out.trophies[0].reference, "p-1");
    }

    #[test]
    fn draw_costs_both_stakes() {
        let s = done(Resolution::Draw, pts(10), Some(photo("p-2")));
        let out = settle(&s);
        assert_eq!(out.deltas, vec![(ANN, -10)]);
        assert_eq!(out.trophies.len(), 1);
        assert_eq!(out.trophies[0].owner, BO);
    }

    #[test]
    fn cancellation_forfeits_only_when_flagged() {
        let forfeit = done(
            Resolution::Cancelled {
                reason: CancelReason::Timeout,
                forfeit: true,
            },
            pts(10),
            Some(pts(20)),
        );
        assert_eq!(settle(&forfeit).deltas, vec![(ANN, -10), (BO, -20)]);
        let early = done(
            Resolution::Cancelled {
                reason: CancelReason::AcceptanceExpired,
                forfeit: false,
            },
            pts(10),
            None,
        );
        assert!(settle(&early).is_empty());
    }

    #[test]
    fn refusal_forfeits_challenger_stake() {
        let s = done(Resolution::Refused { by: BO }, pts(15), None);
        assert_eq!(settle(&s).deltas, vec![(ANN, -15)]);
    }

    #[test]
    fn refused_revenge_concedes_original_stake() {
        let mut s = done(Resolution::Refused { by: BO }, pts(15), None);
        s.revenge_of = Some(RevengeLink {
            session: SessionId::new(),
            conceded: Some(pts(40)),
        });
        assert_eq!(settle(&s).deltas, vec![(ANN, 40), (BO, -40)]);
    }

    #[test]
    fn friendly_settles_nothing() {
        let mut s = done(
            Resolution::Won {
                winner: ANN,
                loser: BO,
            },
            pts(10),
            Some(pts(10)),
        );
        s.staked = false;
        assert!(settle(&s).is_empty());
    }

    proptest! {
        #[test]
        fn wins_move_points_without_creating_them(a in 1i64..10_000, b in 1i64..10_000, challenger_wins: bool) {
            let (winner, loser) = if challenger_wins { (ANN, BO) } else { (BO, ANN) };
            let s = done(Resolution::Won { winner, loser }, pts(a), Some(pts(b)));
            let out = settle(&s);
            prop_assert_eq!(out.net(), 0);
            let lost = if challenger_wins { b } else { a };
            prop_assert_eq!(out.deltas, vec![(winner, lost), (loser, -lost)]);
        }

        #[test]
        fn forfeits_only_destroy_points(a in 1i64..10_000, b in 1i64..10_000) {
            let s = done(Resolution::Draw, pts(a), Some(pts(b)));
            prop_assert_eq!(settle(&s).net(), -(a + b));
        }
    }
}
