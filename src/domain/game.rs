//! Wake-up challenge: a Simon-says memory round that gates stopping a
//! ringing alarm.
//!
//! The caller arms a game, plays the target sequence back to the player,
//! then feeds taps in. A wrong tap redraws the whole sequence and restarts
//! playback; the player keeps nothing from the failed run. A completed
//! sequence reports [`TapOutcome::Won`] exactly once. Loss is never reported
//! outward, and there is no move limit or timeout.

use rand::Rng;
use tokio::sync::mpsc;
use tokio::time::{sleep, Duration};

pub const SEQUENCE_LEN: usize = 4;

/// Lead-in before playback starts.
pub const LEAD_IN_MS: u64 = 1000;
/// How long each color stays lit during playback.
pub const HIGHLIGHT_MS: u64 = 600;
/// Gap between consecutive colors.
pub const GAP_MS: u64 = 300;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameColor {
    Red,
    Green,
    Blue,
    Yellow,
}

impl GameColor {
    pub const ALL: [GameColor; 4] = [
        GameColor::Red,
        GameColor::Green,
        GameColor::Blue,
        GameColor::Yellow,
    ];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GamePhase {
    /// Target sequence is being played back; taps are ignored.
    Displaying,
    /// Waiting for player taps.
    AwaitingInput,
    /// Challenge completed; the game is inert.
    Won,
}

/// Result of feeding one tap into the game.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TapOutcome {
    /// Tap arrived outside input mode (playback running, or already won).
    Ignored,
    /// Correct tap, sequence not yet complete.
    Progress,
    /// Wrong tap: a fresh sequence was drawn and must be replayed.
    Restarted,
    /// Final correct tap. Reported exactly once per game.
    Won,
}

/// Playback cue for whatever renders the colors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackCue {
    Highlight(GameColor),
    Clear,
}

#[derive(Debug)]
pub struct WakeUpGame {
    sequence: Vec<GameColor>,
    player: Vec<GameColor>,
    phase: GamePhase,
}

impl WakeUpGame {
    /// Arm a fresh challenge with a newly drawn target sequence.
    pub fn arm(rng: &mut impl Rng) -> Self {
        Self {
            sequence: draw_sequence(rng),
            player: Vec::with_capacity(SEQUENCE_LEN),
            phase: GamePhase::Displaying,
        }
    }

    pub fn sequence(&self) -> &[GameColor] {
        &self.sequence
    }

    pub fn phase(&self) -> GamePhase {
        self.phase
    }

    /// Reveal the target sequence one color at a time, then enter input
    /// mode. Cue sends are best-effort: if the consumer is gone the timers
    /// still run but nothing observes them.
    pub async fn play_back(&mut self, cues: &mpsc::UnboundedSender<PlaybackCue>) {
        self.phase = GamePhase::Displaying;
        sleep(Duration::from_millis(LEAD_IN_MS)).await;
        for &color in &self.sequence {
            let _ = cues.send(PlaybackCue::Highlight(color));
            sleep(Duration::from_millis(HIGHLIGHT_MS)).await;
            let _ = cues.send(PlaybackCue::Clear);
            sleep(Duration::from_millis(GAP_MS)).await;
        }
        self.phase = GamePhase::AwaitingInput;
    }

    /// Feed one player tap. On a wrong tap the whole run is discarded: a new
    /// sequence is drawn and the game returns to playback phase; the caller
    /// is expected to call [`play_back`](Self::play_back) again.
    pub fn tap(&mut self, color: GameColor, rng: &mut impl Rng) -> TapOutcome {
        if self.phase != GamePhase::AwaitingInput {
            return TapOutcome::Ignored;
        }

        self.player.push(color);
        let position = self.player.len() - 1;

        if self.sequence[position] != color {
            self.sequence = draw_sequence(rng);
            self.player.clear();
            self.phase = GamePhase::Displaying;
            return TapOutcome::Restarted;
        }

        if self.player.len() == self.sequence.len() {
            self.phase = GamePhase::Won;
            return TapOutcome::Won;
        }

        TapOutcome::Progress
    }
}

/// Four independent uniform draws; repeats allowed, not a permutation.
fn draw_sequence(rng: &mut impl Rng) -> Vec<GameColor> {
    (0..SEQUENCE_LEN)
        .map(|_| GameColor::ALL[rng.gen_range(0..GameColor::ALL.len())])
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn rng() -> StdRng {
        StdRng::seed_from_u64(0xa1a7)
    }

    fn enter_input_mode(game: &mut WakeUpGame) {
        // Skip playback in tests that only exercise tap handling.
        game.phase = GamePhase::AwaitingInput;
    }

    fn wrong_color(expected: GameColor) -> GameColor {
        GameColor::ALL
            .into_iter()
            .find(|&c| c != expected)
            .unwrap()
    }

    #[test]
    fn armed_game_has_four_colors_and_displays_first() {
        let game = WakeUpGame::arm(&mut rng());
        assert_eq!(game.sequence().len(), SEQUENCE_LEN);
        assert_eq!(game.phase(), GamePhase::Displaying);
    }

    #[test]
    fn taps_during_playback_are_ignored() {
        let mut r = rng();
        let mut game = WakeUpGame::arm(&mut r);
        assert_eq!(game.tap(GameColor::Red, &mut r), TapOutcome::Ignored);
    }

    #[test]
    fn wrong_tap_discards_progress_and_redraws() {
        let mut r = rng();
        let mut game = WakeUpGame::arm(&mut r);
        enter_input_mode(&mut game);

        // Two correct taps, then a deliberate miss at position 2.
        let first = game.sequence()[0];
        let second = game.sequence()[1];
        assert_eq!(game.tap(first, &mut r), TapOutcome::Progress);
        assert_eq!(game.tap(second, &mut r), TapOutcome::Progress);

        let miss = wrong_color(game.sequence()[2]);
        assert_eq!(game.tap(miss, &mut r), TapOutcome::Restarted);

        assert_eq!(game.phase(), GamePhase::Displaying);
        assert!(game.player.is_empty());
        assert_eq!(game.sequence().len(), SEQUENCE_LEN);
    }

    #[test]
    fn four_correct_taps_win_exactly_once() {
        let mut r = rng();
        let mut game = WakeUpGame::arm(&mut r);
        enter_input_mode(&mut game);

        let target: Vec<GameColor> = game.sequence().to_vec();
        let mut outcomes = Vec::new();
        for color in target {
            outcomes.push(game.tap(color, &mut r));
        }
        assert_eq!(
            outcomes,
            vec![
                TapOutcome::Progress,
                TapOutcome::Progress,
                TapOutcome::Progress,
                TapOutcome::Won,
            ]
        );

        // The game is inert after a win; no second win can fire.
        assert_eq!(game.phase(), GamePhase::Won);
        assert_eq!(game.tap(GameColor::Red, &mut r), TapOutcome::Ignored);
    }

    #[test]
    fn win_after_restart_matches_the_redrawn_sequence() {
        let mut r = rng();
        let mut game = WakeUpGame::arm(&mut r);
        enter_input_mode(&mut game);

        let miss = wrong_color(game.sequence()[0]);
        assert_eq!(game.tap(miss, &mut r), TapOutcome::Restarted);

        enter_input_mode(&mut game);
        let target: Vec<GameColor> = game.sequence().to_vec();
        let last = target
            .into_iter()
            .map(|c| game.tap(c, &mut r))
            .last()
            .unwrap();
        assert_eq!(last, TapOutcome::Won);
    }

    #[tokio::test(start_paused = true)]
    async fn playback_cues_follow_the_sequence_then_enter_input_mode() {
        let mut r = rng();
        let mut game = WakeUpGame::arm(&mut r);
        let target: Vec<GameColor> = game.sequence().to_vec();

        let (tx, mut rx) = mpsc::unbounded_channel();
        game.play_back(&tx).await;
        drop(tx);

        let mut cues = Vec::new();
        while let Some(cue) = rx.recv().await {
            cues.push(cue);
        }

        let expected: Vec<PlaybackCue> = target
            .into_iter()
            .flat_map(|c| [PlaybackCue::Highlight(c), PlaybackCue::Clear])
            .collect();
        assert_eq!(cues, expected);
        assert_eq!(game.phase(), GamePhase::AwaitingInput);
    }
}
