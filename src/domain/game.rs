//! The navigation state machine.
//!
//! States are room ids. The only ways to change the current room, the move
//! counter or the completed sets are [`Game::take_exit`] and
//! [`Game::complete_current_challenge`].

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use super::{ChallengeId, Player, Room, RoomId, SessionSnapshot};
use crate::challenge::{Challenge, ChallengeBody};
use crate::error::{ConfigurationError, SnapshotError, TransitionError};

#[derive(Debug)]
pub struct Game {
    player: Player,
    current_room: RoomId,
    start_room: RoomId,
    rooms: BTreeMap<RoomId, Room>,
    completed: bool,
}

impl Game {
    /// Start a new game in the start room. Fails if the room graph is malformed.
    pub fn new(player: Player, rooms: Vec<Room>) -> Result<Self, ConfigurationError> {
        let (rooms, start_room) = build_graph(rooms)?;
        let mut game = Self {
            player,
            current_room: start_room.clone(),
            start_room,
            rooms,
            completed: false,
        };
        game.refresh_completion();
        Ok(game)
    }

    /// Rebuild a game from a snapshot and the static room graph.
    pub fn from_snapshot(
        snapshot: &SessionSnapshot,
        rooms: Vec<Room>,
    ) -> Result<Self, SnapshotError> {
        let (rooms, start_room) = build_graph(rooms)?;

        if !rooms.contains_key(&snapshot.current_room_id) {
            return Err(SnapshotError::UnknownRoom(snapshot.current_room_id.clone()));
        }
        if let Some(unknown) = snapshot
            .completed_room_ids
            .iter()
            .find(|id| !rooms.contains_key(*id))
        {
            return Err(SnapshotError::UnknownRoom(unknown.clone()));
        }
        let known_challenges: BTreeSet<&ChallengeId> = rooms
            .values()
            .filter_map(|room| room.challenge().map(Challenge::id))
            .collect();
        if let Some(unknown) = snapshot
            .completed_challenge_ids
            .iter()
            .find(|id| !known_challenges.contains(id))
        {
            return Err(SnapshotError::UnknownChallenge(unknown.clone()));
        }

        let player = Player::restore(
            snapshot.player_name.clone(),
            snapshot.completed_room_ids.iter().cloned().collect(),
            snapshot.completed_challenge_ids.iter().cloned().collect(),
            snapshot.move_count,
            snapshot.game_started,
        );
        let mut game = Self {
            player,
            current_room: snapshot.current_room_id.clone(),
            start_room,
            rooms,
            completed: false,
        };
        game.refresh_completion();
        Ok(game)
    }

    pub fn snapshot(&self, saved_at: DateTime<Utc>) -> SessionSnapshot {
        SessionSnapshot {
            player_name: self.player.name().to_string(),
            current_room_id: self.current_room.clone(),
            completed_room_ids: self.player.completed_rooms().iter().cloned().collect(),
            completed_challenge_ids: self
                .player
                .completed_challenges()
                .iter()
                .cloned()
                .collect(),
            move_count: self.player.move_count(),
            saved_at,
            game_started: self.player.game_started(),
        }
    }

    pub fn player(&self) -> &Player {
        &self.player
    }

    pub fn current_room_id(&self) -> &RoomId {
        &self.current_room
    }

    pub fn start_room_id(&self) -> &RoomId {
        &self.start_room
    }

    pub fn current_room(&self) -> &Room {
        // build_graph and every transition keep current_room resolvable.
        &self.rooms[&self.current_room]
    }

    pub fn room(&self, id: &RoomId) -> Option<&Room> {
        self.rooms.get(id)
    }

    pub fn rooms(&self) -> impl Iterator<Item = &Room> {
        self.rooms.values()
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    pub fn is_completed(&self) -> bool {
        self.completed
    }

    /// True when the current room has no challenge or its challenge is done.
    pub fn current_challenge_satisfied(&self) -> bool {
        match self.current_room().challenge() {
            Some(challenge) => self.player.has_completed_challenge(challenge.id()),
            None => true,
        }
    }

    pub(crate) fn current_challenge_mut(&mut self) -> Option<&mut Challenge> {
        self.rooms
            .get_mut(&self.current_room)
            .and_then(Room::challenge_mut)
    }

    /// Follow an exit out of the current room.
    ///
    /// On rejection nothing is mutated, however often it is retried.
    pub fn take_exit(&mut self, direction: &str) -> Result<&Room, TransitionError> {
        let room = self.current_room();
        if let Some(challenge) = room.challenge() {
            if !self.player.has_completed_challenge(challenge.id()) {
                return Err(TransitionError::ChallengeIncomplete {
                    room: room.id().clone(),
                    challenge: challenge.id().clone(),
                });
            }
        }
        let Some(target) = room.exit(direction).cloned() else {
            return Err(TransitionError::NoSuchExit {
                room: room.id().clone(),
                direction: direction.to_string(),
            });
        };

        let from = std::mem::replace(&mut self.current_room, target);
        self.player.complete_room(from.clone());
        self.player.record_move();
        debug!(from = %from, to = %self.current_room, moves = self.player.move_count(), "moved");
        self.refresh_completion();
        Ok(self.current_room())
    }

    /// Record the current room's challenge as complete.
    ///
    /// Returns `true` when this completes the whole game.
    pub(crate) fn complete_current_challenge(&mut self) -> bool {
        let Some(id) = self.current_room().challenge().map(|c| c.id().clone()) else {
            return false;
        };
        if self.player.complete_challenge(id.clone()) {
            info!(challenge = %id, "challenge completed");
        }
        let was_completed = self.completed;
        self.refresh_completion();
        self.completed && !was_completed
    }

    fn refresh_completion(&mut self) {
        if self.completed {
            return;
        }
        if self.current_room().is_end() && self.current_challenge_satisfied() {
            self.completed = true;
            self.player.complete_room(self.current_room.clone());
            info!(room = %self.current_room, "game completed");
        }
    }
}

/// Index rooms by id and check the structural invariants of the graph.
///
/// Returns the indexed rooms and the start room id.
pub fn build_graph(
    rooms: Vec<Room>,
) -> Result<(BTreeMap<RoomId, Room>, RoomId), ConfigurationError> {
    let mut indexed = BTreeMap::new();
    let mut challenge_ids = BTreeSet::new();
    for room in rooms {
        if let Some(challenge) = room.challenge() {
            if !challenge_ids.insert(challenge.id().clone()) {
                return Err(ConfigurationError::DuplicateChallenge(challenge.id().clone()));
            }
            if let ChallengeBody::Quiz(quiz) = challenge.body() {
                if quiz.correct_index() >= quiz.options().len() {
                    return Err(ConfigurationError::QuizIndexOutOfRange {
                        challenge: challenge.id().clone(),
                        index: quiz.correct_index(),
                        options: quiz.options().len(),
                    });
                }
            }
        }
        if indexed.contains_key(room.id()) {
            return Err(ConfigurationError::DuplicateRoom(room.id().clone()));
        }
        indexed.insert(room.id().clone(), room);
    }

    let starts: Vec<RoomId> = indexed
        .values()
        .filter(|room| room.is_start())
        .map(|room| room.id().clone())
        .collect();
    let start = match starts.as_slice() {
        [] => return Err(ConfigurationError::NoStartRoom),
        [only] => only.clone(),
        _ => return Err(ConfigurationError::MultipleStartRooms(starts)),
    };

    if !indexed.values().any(Room::is_end) {
        return Err(ConfigurationError::NoEndRoom);
    }

    for room in indexed.values() {
        if room.is_end() && !room.exits().is_empty() {
            return Err(ConfigurationError::EndRoomHasExits(room.id().clone()));
        }
        for (direction, target) in room.exits() {
            if !indexed.contains_key(target) {
                return Err(ConfigurationError::DanglingExit {
                    room: room.id().clone(),
                    direction: direction.clone(),
                    target: target.clone(),
                });
            }
        }
    }

    let reachable = reachable_from(&indexed, &start);
    if !indexed
        .values()
        .any(|room| room.is_end() && reachable.contains(room.id()))
    {
        return Err(ConfigurationError::EndRoomUnreachable);
    }
    if let Some(orphan) = indexed.keys().find(|id| !reachable.contains(*id)) {
        return Err(ConfigurationError::UnreachableRoom(orphan.clone()));
    }

    Ok((indexed, start))
}

fn reachable_from(rooms: &BTreeMap<RoomId, Room>, start: &RoomId) -> BTreeSet<RoomId> {
    let mut seen = BTreeSet::from([start.clone()]);
    let mut queue = VecDeque::from([start.clone()]);
    while let Some(id) = queue.pop_front() {
        let Some(room) = rooms.get(&id) else { continue };
        for target in room.exits().values() {
            if seen.insert(target.clone()) {
                queue.push_back(target.clone());
            }
        }
    }
    seen
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::challenge::QuizChallenge;

    fn quiz(id: &str) -> Challenge {
        Challenge::quiz(
            id,
            "pick one",
            QuizChallenge::new("?", vec!["a".into(), "b".into()], 0),
        )
    }

    fn linear_rooms() -> Vec<Room> {
        vec![
            Room::new("hall", "Hall")
                .start()
                .with_challenge(quiz("hall-quiz"))
                .with_exit("forward", "vault"),
            Room::new("vault", "Vault").with_exit("forward", "exit"),
            Room::new("exit", "Exit").end(),
        ]
    }

    fn new_game() -> Game {
        Game::new(Player::new("tester", Utc::now()), linear_rooms()).expect("game")
    }

    #[test]
    fn starts_in_start_room() {
        let game = new_game();
        assert_eq!(game.current_room_id().as_str(), "hall");
        assert!(!game.is_completed());
    }

    #[test]
    fn blocked_move_never_mutates_state() {
        let mut game = new_game();
        let before = game.player().clone();
        for _ in 0..5 {
            let err = game.take_exit("forward").expect_err("locked");
            assert!(matches!(err, TransitionError::ChallengeIncomplete { .. }));
        }
        assert_eq!(game.player(), &before);
        assert_eq!(game.current_room_id().as_str(), "hall");
    }

    #[test]
    fn unknown_exit_is_rejected_without_mutation() {
        let mut game = new_game();
        game.complete_current_challenge();
        let before = game.player().clone();
        for _ in 0..3 {
            let err = game.take_exit("sideways").expect_err("no exit");
            assert!(matches!(err, TransitionError::NoSuchExit { .. }));
        }
        assert_eq!(game.player(), &before);
    }

    #[test]
    fn move_records_room_and_counts_once() {
        let mut game = new_game();
        game.complete_current_challenge();
        let room = game.take_exit("FORWARD").expect("move");
        assert_eq!(room.id().as_str(), "vault");
        assert_eq!(game.player().move_count(), 1);
        assert!(game.player().has_completed_room(&RoomId::from("hall")));
    }

    #[test]
    fn entering_unguarded_end_room_completes_game() {
        let mut game = new_game();
        game.complete_current_challenge();
        game.take_exit("forward").expect("to vault");
        game.take_exit("forward").expect("to exit");
        assert!(game.is_completed());
        assert!(game.player().has_completed_room(&RoomId::from("exit")));
        assert_eq!(game.player().move_count(), 2);
    }

    #[test]
    fn end_room_with_challenge_completes_after_challenge() {
        let rooms = vec![
            Room::new("start", "Start").start().with_exit("in", "finale"),
            Room::new("finale", "Finale").end().with_challenge(quiz("final")),
        ];
        let mut game = Game::new(Player::new("p", Utc::now()), rooms).expect("game");
        game.take_exit("in").expect("move");
        assert!(!game.is_completed());
        assert!(game.complete_current_challenge());
        assert!(game.is_completed());
    }

    #[test]
    fn rejects_missing_start_room() {
        let rooms = vec![Room::new("a", "A").end()];
        let err = Game::new(Player::new("p", Utc::now()), rooms).expect_err("no start");
        assert!(matches!(err, ConfigurationError::NoStartRoom));
    }

    #[test]
    fn rejects_two_start_rooms() {
        let rooms = vec![
            Room::new("a", "A").start().with_exit("x", "c"),
            Room::new("b", "B").start().with_exit("x", "c"),
            Room::new("c", "C").end(),
        ];
        let err = Game::new(Player::new("p", Utc::now()), rooms).expect_err("two starts");
        assert!(matches!(err, ConfigurationError::MultipleStartRooms(ids) if ids.len() == 2));
    }

    #[test]
    fn rejects_dangling_exit() {
        let rooms = vec![
            Room::new("a", "A").start().with_exit("x", "nowhere"),
            Room::new("b", "B").end(),
        ];
        let err = Game::new(Player::new("p", Utc::now()), rooms).expect_err("dangling");
        assert!(matches!(err, ConfigurationError::DanglingExit { .. }));
    }

    #[test]
    fn rejects_duplicate_room_id() {
        let rooms = vec![
            Room::new("a", "A").start().with_exit("x", "b"),
            Room::new("b", "B").end(),
            Room::new("b", "Also B").end(),
        ];
        let err = Game::new(Player::new("p", Utc::now()), rooms).expect_err("duplicate");
        assert!(matches!(err, ConfigurationError::DuplicateRoom(id) if id.as_str() == "b"));
    }

    #[test]
    fn rejects_end_room_with_exits() {
        let rooms = vec![
            Room::new("a", "A").start().with_exit("x", "b"),
            Room::new("b", "B").end().with_exit("back", "a"),
        ];
        let err = Game::new(Player::new("p", Utc::now()), rooms).expect_err("end exits");
        assert!(matches!(err, ConfigurationError::EndRoomHasExits(_)));
    }

    #[test]
    fn rejects_unreachable_rooms() {
        let rooms = vec![
            Room::new("a", "A").start().with_exit("x", "b"),
            Room::new("b", "B").end(),
            Room::new("island", "Island").with_exit("x", "b"),
        ];
        let err = Game::new(Player::new("p", Utc::now()), rooms).expect_err("island");
        assert!(matches!(err, ConfigurationError::UnreachableRoom(id) if id.as_str() == "island"));
    }

    #[test]
    fn rejects_unreachable_end_room() {
        let rooms = vec![
            Room::new("a", "A").start().with_exit("x", "b"),
            Room::new("b", "B").with_exit("back", "a"),
            Room::new("z", "Z").end(),
        ];
        let err = Game::new(Player::new("p", Utc::now()), rooms).expect_err("no path");
        assert!(matches!(err, ConfigurationError::EndRoomUnreachable));
    }

    #[test]
    fn snapshot_round_trip_restores_progress() {
        let mut game = new_game();
        game.complete_current_challenge();
        game.take_exit("forward").expect("move");

        let snapshot = game.snapshot(Utc::now());
        let restored = Game::from_snapshot(&snapshot, linear_rooms()).expect("restore");

        assert_eq!(restored.player(), game.player());
        assert_eq!(restored.current_room_id(), game.current_room_id());
        assert_eq!(restored.is_completed(), game.is_completed());
    }

    #[test]
    fn snapshot_with_unknown_room_is_rejected() {
        let mut snapshot = new_game().snapshot(Utc::now());
        snapshot.current_room_id = RoomId::from("attic");
        let err = Game::from_snapshot(&snapshot, linear_rooms()).expect_err("unknown");
        assert!(matches!(err, SnapshotError::UnknownRoom(_)));
    }
}
