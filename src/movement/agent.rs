//! Per-unit movement and behavior state machine
//!
//! Each tick the simulation hands an agent its unit's snapshot entry and an
//! [`AgentContext`]; the agent answers with one [`AgentAction`]. While a leg
//! between two tiles is in progress the agent just plays out its sub-moves;
//! decisions are only taken with no leg pending.

use std::collections::VecDeque;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::core::grid::{Compass, TilePos};
use crate::core::types::{Behavior, EntityRef, UnitId, Vec2};
use crate::movement::locomotion::{plan_leg, SubMove};
use crate::movement::pathfinding::Pathfinder;
use crate::movement::roam::choose_direction;
use crate::movement::tile_search::{approach_tile, find_settle_site};
use crate::population::{LeaderSlot, StepGrid};
use crate::settlement::is_free_site;
use crate::spatial::snapshot::{TickSnapshot, UnitSummary};

/// Movement sub-state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MoveState {
    /// Paused; resuming restores the state held before
    Stopped,
    #[default]
    Roam,
    SeekFreeTile,
    SeekSettlement,
    FollowTarget,
    SeekMagnet,
    WanderAtPoint,
}

/// What the agent wants to do this tick
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AgentAction {
    Stay,
    Advance(SubMove),
    /// Build a settlement on the tile
    Found(TilePos),
}

/// Everything an agent may read while deciding
pub struct AgentContext<'a> {
    pub pathfinder: Pathfinder<'a>,
    pub snapshot: &'a TickSnapshot,
    pub mid_target: Option<EntityRef>,
    pub wide_hint: Option<Vec2>,
    pub magnet: Option<TilePos>,
    pub leader: LeaderSlot,
    pub steps: &'a StepGrid,
    pub max_steps_in_direction: u32,
    pub settle_search_depth: i32,
}

/// Magnet the unit arrived at and the tile it oscillates from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Wander {
    magnet: TilePos,
    home: TilePos,
}

#[derive(Debug, Clone, Default)]
pub struct UnitAgent {
    state: MoveState,
    /// Single-slot history for pause/resume
    resume_state: Option<MoveState>,
    direction: Compass,
    steps_in_direction: u32,
    path: VecDeque<TilePos>,
    goal: Option<TilePos>,
    legs: VecDeque<SubMove>,
    settle_target: Option<TilePos>,
    wander: Option<Wander>,
    observed: Option<Behavior>,
}

impl UnitAgent {
    pub fn new(id: UnitId) -> Self {
        Self {
            direction: Compass::from_index(id.0 as i32),
            ..Self::default()
        }
    }

    pub fn state(&self) -> MoveState {
        self.state
    }

    pub fn direction(&self) -> Compass {
        self.direction
    }

    pub fn is_paused(&self) -> bool {
        self.state == MoveState::Stopped
    }

    pub fn settle_target(&self) -> Option<TilePos> {
        self.settle_target
    }

    pub fn pending_path(&self) -> usize {
        self.path.len()
    }

    pub fn has_pending_leg(&self) -> bool {
        !self.legs.is_empty()
    }

    /// Suspend or resume movement
    ///
    /// Pausing twice is the same as pausing once; resuming without a pause
    /// does nothing.
    pub fn pause(&mut self, paused: bool) {
        if paused {
            if self.state != MoveState::Stopped {
                self.resume_state = Some(self.state);
                self.state = MoveState::Stopped;
            }
        } else if self.state == MoveState::Stopped {
            self.state = self.resume_state.take().unwrap_or_default();
        }
    }

    /// Note the behavior in force; returns true when it changed
    ///
    /// A change drops every goal and starts over from roaming.
    pub fn observe_behavior(&mut self, behavior: Behavior) -> bool {
        if self.observed == Some(behavior) {
            return false;
        }
        self.observed = Some(behavior);
        self.clear_goals();
        if self.state == MoveState::Stopped {
            self.resume_state = Some(MoveState::Roam);
        } else {
            self.state = MoveState::Roam;
        }
        true
    }

    fn clear_goals(&mut self) {
        self.path.clear();
        self.goal = None;
        self.settle_target = None;
        self.wander = None;
    }

    /// Forget routes that may cross edited terrain
    pub fn clear_route(&mut self) {
        self.path.clear();
        self.goal = None;
        self.legs.clear();
    }

    pub fn decide(
        &mut self,
        me: &UnitSummary,
        ctx: &AgentContext,
        rng: &mut impl Rng,
    ) -> AgentAction {
        if self.state == MoveState::Stopped || me.in_fight {
            return AgentAction::Stay;
        }
        if let Some(sub) = self.legs.pop_front() {
            return AgentAction::Advance(sub);
        }

        match me.behavior {
            Behavior::Settle => self.settle(me, ctx, rng),
            Behavior::Gather | Behavior::Fight => self.chase(me, ctx, rng),
            Behavior::GoToMagnet => self.rally(me, ctx, rng),
        }
    }

    /// Start the leg to an adjacent tile and play its first sub-move
    fn begin_leg(&mut self, from: TilePos, to: TilePos, roamed: bool, ctx: &AgentContext) -> AgentAction {
        self.legs = plan_leg(from, to, roamed, ctx.pathfinder.terrain()).into();
        self.legs
            .pop_front()
            .map_or(AgentAction::Stay, AgentAction::Advance)
    }

    /// Next tile on the way to `goal`, re-planning when the goal changed or
    /// the cached route got blocked
    fn travel(&mut self, from: TilePos, goal: TilePos, ctx: &AgentContext) -> Option<TilePos> {
        let stale = self.goal != Some(goal)
            || self
                .path
                .front()
                .map_or(true, |&next| !ctx.pathfinder.can_step(from, next));
        if stale {
            self.path.clear();
            self.goal = None;
            let path = ctx.pathfinder.find_path(from, goal)?;
            self.path = path.into_iter().skip(1).collect();
            self.goal = Some(goal);
        }
        self.path.pop_front()
    }

    // === SETTLE ===

    fn abandon_site(&mut self) {
        self.settle_target = None;
        self.path.clear();
        self.goal = None;
        self.state = MoveState::Roam;
    }

    fn settle(&mut self, me: &UnitSummary, ctx: &AgentContext, rng: &mut impl Rng) -> AgentAction {
        let pathfinder = &ctx.pathfinder;

        if let Some(site) = self.settle_target {
            if !is_free_site(pathfinder.terrain(), pathfinder.structures(), site) {
                self.abandon_site();
            } else if me.tile.chebyshev(&site) <= 1 {
                self.abandon_site();
                return AgentAction::Found(site);
            } else {
                let next = approach_tile(site, me.tile, pathfinder)
                    .and_then(|goal| self.travel(me.tile, goal, ctx));
                match next {
                    Some(next) => return self.begin_leg(me.tile, next, false, ctx),
                    None => self.abandon_site(),
                }
            }
        }

        if let Some(site) = find_settle_site(me.tile, self.direction, ctx.settle_search_depth, pathfinder) {
            if me.tile.chebyshev(&site) <= 1 {
                self.state = MoveState::Roam;
                return AgentAction::Found(site);
            }
            let next = approach_tile(site, me.tile, pathfinder)
                .and_then(|goal| self.travel(me.tile, goal, ctx));
            if let Some(next) = next {
                self.state = MoveState::SeekFreeTile;
                self.settle_target = Some(site);
                return self.begin_leg(me.tile, next, false, ctx);
            }
            self.abandon_site();
        }

        self.roam(me, ctx, rng)
    }

    // === GATHER / FIGHT ===

    fn chase(&mut self, me: &UnitSummary, ctx: &AgentContext, rng: &mut impl Rng) -> AgentAction {
        if let Some(target) = ctx.mid_target.and_then(|t| ctx.snapshot.tile_of(t)) {
            self.state = MoveState::FollowTarget;
            self.path.clear();
            self.goal = None;
            return match ctx.pathfinder.step_toward(me.tile, target) {
                Some(next) => self.begin_leg(me.tile, next, false, ctx),
                None => AgentAction::Stay,
            };
        }

        if let Some(dir) = ctx.wide_hint.and_then(Compass::nearest) {
            if ctx.pathfinder.can_step(me.tile, me.tile.step(dir)) {
                self.state = MoveState::Roam;
                return self.roam_toward(dir, me, ctx);
            }
        }

        self.roam(me, ctx, rng)
    }

    // === MAGNET ===

    fn rally(&mut self, me: &UnitSummary, ctx: &AgentContext, rng: &mut impl Rng) -> AgentAction {
        let leads = ctx.leader == LeaderSlot::Unit(me.id);
        if !leads {
            match ctx.leader {
                LeaderSlot::Settlement(id) => {
                    if let Some(tile) = ctx.snapshot.settlements.get(&id).map(|s| s.tile) {
                        return self.seek_settlement(tile, me, ctx);
                    }
                }
                LeaderSlot::Unit(_) => {
                    if let Some(action) = self.follow_leader(me, ctx) {
                        return action;
                    }
                }
                LeaderSlot::None => {}
            }
        }

        // Leaders and leaderless units head for the magnet itself
        match ctx.magnet {
            Some(magnet) => self.seek_magnet(magnet, me, ctx),
            None => self.roam(me, ctx, rng),
        }
    }

    /// Step towards the faction's leader unit
    ///
    /// Returns `None`, and moves nothing, when there is no living leader
    /// unit to follow.
    pub fn follow_leader(&mut self, me: &UnitSummary, ctx: &AgentContext) -> Option<AgentAction> {
        let LeaderSlot::Unit(leader) = ctx.leader else {
            return None;
        };
        if leader == me.id {
            return None;
        }
        let target = ctx.snapshot.units.get(&leader).filter(|u| u.strength > 0)?.tile;

        self.state = MoveState::FollowTarget;
        self.path.clear();
        self.goal = None;
        Some(match ctx.pathfinder.step_toward(me.tile, target) {
            Some(next) => self.begin_leg(me.tile, next, false, ctx),
            None => AgentAction::Stay,
        })
    }

    fn seek_settlement(&mut self, tile: TilePos, me: &UnitSummary, ctx: &AgentContext) -> AgentAction {
        self.state = MoveState::SeekSettlement;
        if me.tile.chebyshev(&tile) <= 1 {
            // Close contact takes it from here
            return AgentAction::Stay;
        }
        let next = approach_tile(tile, me.tile, &ctx.pathfinder)
            .and_then(|goal| self.travel(me.tile, goal, ctx));
        match next {
            Some(next) => self.begin_leg(me.tile, next, false, ctx),
            None => AgentAction::Stay,
        }
    }

    fn seek_magnet(&mut self, magnet: TilePos, me: &UnitSummary, ctx: &AgentContext) -> AgentAction {
        if let Some(wander) = self.wander {
            if wander.magnet == magnet {
                return self.wander_step(wander, me, ctx);
            }
        }
        self.wander = None;
        self.state = MoveState::SeekMagnet;

        // A blocked magnet tile is approached from its nearest free neighbour
        let goal = if ctx.pathfinder.is_blocked(magnet) {
            match ctx.pathfinder.free_neighbor(magnet, me.tile) {
                Some(tile) => tile,
                None => return AgentAction::Stay,
            }
        } else {
            magnet
        };

        if me.tile == goal {
            let wander = Wander { magnet, home: goal };
            self.wander = Some(wander);
            self.path.clear();
            self.goal = None;
            return self.wander_step(wander, me, ctx);
        }

        match self.travel(me.tile, goal, ctx) {
            Some(next) => self.begin_leg(me.tile, next, false, ctx),
            None => AgentAction::Stay,
        }
    }

    /// Oscillate between the arrival tile and a reachable neighbour
    fn wander_step(&mut self, wander: Wander, me: &UnitSummary, ctx: &AgentContext) -> AgentAction {
        self.state = MoveState::WanderAtPoint;
        let pathfinder = &ctx.pathfinder;
        if me.tile != wander.home {
            if pathfinder.can_step(me.tile, wander.home) {
                return self.begin_leg(me.tile, wander.home, false, ctx);
            }
            // Cannot get back: adopt the current tile as home
            self.wander = Some(Wander {
                home: me.tile,
                ..wander
            });
            return AgentAction::Stay;
        }

        let next = (0..8)
            .map(|turn| self.direction.rotate(turn))
            .map(|dir| me.tile.step(dir))
            .find(|&tile| pathfinder.can_step(me.tile, tile));
        match next {
            Some(next) => self.begin_leg(me.tile, next, false, ctx),
            None => AgentAction::Stay,
        }
    }

    // === ROAM ===

    fn roam_toward(&mut self, dir: Compass, me: &UnitSummary, ctx: &AgentContext) -> AgentAction {
        if dir != self.direction {
            self.direction = dir;
            self.steps_in_direction = 0;
        }
        self.steps_in_direction += 1;
        self.begin_leg(me.tile, me.tile.step(dir), true, ctx)
    }

    fn roam(&mut self, me: &UnitSummary, ctx: &AgentContext, rng: &mut impl Rng) -> AgentAction {
        self.state = MoveState::Roam;
        let dir = choose_direction(
            me.tile,
            self.direction,
            self.steps_in_direction,
            ctx.max_steps_in_direction,
            &ctx.pathfinder,
            ctx.steps,
            rng,
        );
        match dir {
            Some(dir) => self.roam_toward(dir, me, ctx),
            None => AgentAction::Stay,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{Faction, SettlementId, UnitClass};
    use crate::settlement::{Structure, StructureMap};
    use crate::spatial::snapshot::SettlementSummary;
    use crate::terrain::{GridTerrain, TerrainFeature};
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn summary(id: u32, x: i32, z: i32, behavior: Behavior) -> UnitSummary {
        UnitSummary {
            id: UnitId(id),
            faction: Faction::Red,
            class: UnitClass::Walker,
            strength: 5,
            tile: TilePos::new(x, z),
            in_fight: false,
            behavior,
        }
    }

    struct World {
        terrain: GridTerrain,
        structures: StructureMap,
        snapshot: TickSnapshot,
        steps: StepGrid,
    }

    impl World {
        fn new() -> Self {
            Self {
                terrain: GridTerrain::flat(16, 2),
                structures: StructureMap::new(),
                snapshot: TickSnapshot::new(),
                steps: StepGrid::new(16),
            }
        }

        fn ctx(&self) -> AgentContext<'_> {
            AgentContext {
                pathfinder: Pathfinder::new(&self.terrain, &self.structures),
                snapshot: &self.snapshot,
                mid_target: None,
                wide_hint: None,
                magnet: None,
                leader: LeaderSlot::None,
                steps: &self.steps,
                max_steps_in_direction: 6,
                settle_search_depth: 4,
            }
        }
    }

    /// Play out one whole leg and return the tile reached
    fn finish_leg(agent: &mut UnitAgent, me: &UnitSummary, ctx: &AgentContext, rng: &mut ChaCha8Rng) -> Option<TilePos> {
        let mut action = agent.decide(me, ctx, rng);
        loop {
            match action {
                AgentAction::Advance(sub) if sub.completes_leg => return Some(sub.tile),
                AgentAction::Advance(_) => action = agent.decide(me, ctx, rng),
                _ => return None,
            }
        }
    }

    #[test]
    fn test_pause_is_idempotent() {
        let mut agent = UnitAgent::new(UnitId(1));
        agent.pause(false);
        assert_eq!(agent.state(), MoveState::Roam);

        agent.pause(true);
        agent.pause(true);
        assert!(agent.is_paused());
        agent.pause(false);
        assert_eq!(agent.state(), MoveState::Roam);
        agent.pause(false);
        assert_eq!(agent.state(), MoveState::Roam);
    }

    #[test]
    fn test_paused_agent_stays() {
        let world = World::new();
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let me = summary(1, 8, 8, Behavior::Gather);
        let mut agent = UnitAgent::new(me.id);
        agent.pause(true);
        assert_eq!(agent.decide(&me, &world.ctx(), &mut rng), AgentAction::Stay);
    }

    #[test]
    fn test_behavior_change_while_paused_resumes_roaming() {
        let mut agent = UnitAgent::new(UnitId(1));
        agent.observe_behavior(Behavior::Settle);
        agent.state = MoveState::SeekFreeTile;
        agent.settle_target = Some(TilePos::new(3, 3));
        agent.pause(true);

        assert!(agent.observe_behavior(Behavior::Fight));
        assert!(!agent.observe_behavior(Behavior::Fight));
        assert_eq!(agent.settle_target(), None);
        agent.pause(false);
        assert_eq!(agent.state(), MoveState::Roam);
    }

    #[test]
    fn test_settler_builds_next_to_itself() {
        let world = World::new();
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let me = summary(1, 8, 8, Behavior::Settle);
        let mut agent = UnitAgent::new(me.id);

        let action = agent.decide(&me, &world.ctx(), &mut rng);
        assert_eq!(action, AgentAction::Found(me.tile.step(agent.direction())));
    }

    #[test]
    fn test_settler_walks_to_distant_site() {
        let mut world = World::new();
        let origin = TilePos::new(8, 8);
        for tile in crate::core::grid::TileRange::around(origin, 2).tiles() {
            if tile != origin && tile != TilePos::new(8, 10) {
                world.terrain.set_feature(tile, TerrainFeature::Swamp);
            }
        }
        // Swamp is walkable but not a building site; only the cone finds land
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let me = summary(8, 8, 8, Behavior::Settle);
        let mut agent = UnitAgent::new(me.id);
        agent.direction = Compass::North;

        let action = agent.decide(&me, &world.ctx(), &mut rng);
        assert!(matches!(action, AgentAction::Advance(_)));
        assert_eq!(agent.state(), MoveState::SeekFreeTile);
        assert_eq!(agent.settle_target(), Some(TilePos::new(8, 10)));
    }

    #[test]
    fn test_site_taken_before_arrival_is_abandoned() {
        let mut world = World::new();
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let me = summary(1, 8, 8, Behavior::Settle);
        let mut agent = UnitAgent::new(me.id);
        agent.observe_behavior(Behavior::Settle);
        agent.state = MoveState::SeekFreeTile;
        agent.settle_target = Some(TilePos::new(8, 12));

        world
            .structures
            .place(TilePos::new(8, 12), Structure::Settlement(SettlementId(4)));
        let action = agent.decide(&me, &world.ctx(), &mut rng);
        assert_ne!(agent.settle_target(), Some(TilePos::new(8, 12)));
        assert!(!matches!(action, AgentAction::Found(tile) if tile == TilePos::new(8, 12)));
    }

    #[test]
    fn test_fighter_follows_mid_target() {
        let mut world = World::new();
        let enemy = UnitSummary {
            faction: Faction::Blue,
            ..summary(2, 12, 8, Behavior::Fight)
        };
        world.snapshot.units.insert(enemy.id, enemy);
        let me = summary(1, 8, 8, Behavior::Fight);
        world.snapshot.units.insert(me.id, me);

        let mut ctx = world.ctx();
        ctx.mid_target = Some(EntityRef::Unit(enemy.id));
        let mut agent = UnitAgent::new(me.id);
        let mut rng = ChaCha8Rng::seed_from_u64(1);

        let reached = finish_leg(&mut agent, &me, &ctx, &mut rng);
        assert_eq!(reached, Some(TilePos::new(9, 8)));
        assert_eq!(agent.state(), MoveState::FollowTarget);
    }

    #[test]
    fn test_wide_hint_biases_roam() {
        let world = World::new();
        let mut ctx = world.ctx();
        ctx.wide_hint = Some(Vec2::new(-1.0, 0.0));
        let me = summary(1, 8, 8, Behavior::Gather);
        let mut agent = UnitAgent::new(me.id);
        let mut rng = ChaCha8Rng::seed_from_u64(1);

        assert_eq!(finish_leg(&mut agent, &me, &ctx, &mut rng), Some(TilePos::new(7, 8)));
        assert_eq!(agent.direction(), Compass::West);
    }

    #[test]
    fn test_follow_leader_without_leader_does_nothing() {
        let world = World::new();
        let me = summary(1, 8, 8, Behavior::GoToMagnet);
        let mut agent = UnitAgent::new(me.id);
        assert_eq!(agent.follow_leader(&me, &world.ctx()), None);
        assert!(!agent.has_pending_leg());

        // A leader slot naming a unit that no longer exists is no leader
        let mut ctx = world.ctx();
        ctx.leader = LeaderSlot::Unit(UnitId(42));
        assert_eq!(agent.follow_leader(&me, &ctx), None);
        assert_eq!(agent.state(), MoveState::Roam);
    }

    #[test]
    fn test_follower_seeks_leader_settlement() {
        let mut world = World::new();
        let home = TilePos::new(12, 8);
        world
            .structures
            .place(home, Structure::Settlement(SettlementId(3)));
        world.snapshot.settlements.insert(
            SettlementId(3),
            SettlementSummary {
                id: SettlementId(3),
                faction: Some(Faction::Red),
                tile: home,
                followers: 4,
                capacity: 10,
                has_leader: true,
                attacked: false,
            },
        );
        let mut ctx = world.ctx();
        ctx.leader = LeaderSlot::Settlement(SettlementId(3));
        ctx.magnet = Some(TilePos::new(0, 0));

        let me = summary(1, 8, 8, Behavior::GoToMagnet);
        let mut agent = UnitAgent::new(me.id);
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        assert_eq!(finish_leg(&mut agent, &me, &ctx, &mut rng), Some(TilePos::new(9, 8)));
        assert_eq!(agent.state(), MoveState::SeekSettlement);
    }

    #[test]
    fn test_wander_at_magnet() {
        let world = World::new();
        let mut ctx = world.ctx();
        let magnet = TilePos::new(8, 8);
        ctx.magnet = Some(magnet);
        let mut agent = UnitAgent::new(UnitId(1));
        let mut rng = ChaCha8Rng::seed_from_u64(1);

        let mut me = summary(1, 8, 8, Behavior::GoToMagnet);
        let away = finish_leg(&mut agent, &me, &ctx, &mut rng).unwrap();
        assert_eq!(agent.state(), MoveState::WanderAtPoint);
        assert_eq!(away.chebyshev(&magnet), 1);

        me.tile = away;
        assert_eq!(finish_leg(&mut agent, &me, &ctx, &mut rng), Some(magnet));

        // Relocating the magnet sends the unit off again
        ctx.magnet = Some(TilePos::new(2, 8));
        me.tile = magnet;
        assert_eq!(finish_leg(&mut agent, &me, &ctx, &mut rng), Some(TilePos::new(7, 8)));
        assert_eq!(agent.state(), MoveState::SeekMagnet);
    }

    #[test]
    fn test_roam_counts_as_roam_step() {
        let mut world = World::new();
        let me = summary(1, 8, 8, Behavior::Settle);
        // Fields all round: walkable, but nowhere to build
        for (i, tile) in me.tile.neighbors().into_iter().enumerate() {
            world
                .structures
                .place(tile, Structure::Field(crate::core::types::FieldId(i as u32)));
        }
        let mut ctx = world.ctx();
        ctx.settle_search_depth = 1;
        let mut agent = UnitAgent::new(me.id);
        let mut rng = ChaCha8Rng::seed_from_u64(1);

        match agent.decide(&me, &ctx, &mut rng) {
            AgentAction::Advance(sub) => assert!(sub.roamed),
            other => panic!("expected a roam step, got {:?}", other),
        }
        assert_eq!(agent.state(), MoveState::Roam);
    }
}
