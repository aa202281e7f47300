//! Hit detection between fighters.
//!
//! Resolution runs once per tick after every volume has been posed:
//!
//! 1. **Clang.** Overlapping damage volumes of different fighters cancel
//!    each other unless one out-damages the other by at least the clang
//!    threshold. Near-equal trades rebound grounded attackers. Two grab
//!    volumes cancel each other, rebounding both owners, when the fighters
//!    face each other.
//! 2. **Candidates.** Every live hit volume is tested against every tangible
//!    hurt volume of other fighters, skipping groups the attacker has
//!    already landed on that victim. Grab volumes only reach grabbable
//!    fighters in front of their owner.
//! 3. **Arbitration.** For each `(attacker, victim, group)` only the
//!    highest-damage candidate connects; ties go to the lowest hit volume
//!    id, then the lowest region.
//! 4. **Grabs.** Fighters hit by an attack neither grab nor get grabbed.
//!    Each remaining grabber takes its closest victim; grabs are confirmed
//!    in fighter index order for grabbers nobody else is grabbing, and
//!    whatever is left is circular and rebounds.
//!
//! [`HitBits`] remember which groups have connected until the attacker's
//! script resets them, so a multi-tick swing hits once per group.

use fray_core::arena::{VolumeArena, VolumeId};
use fray_core::attributes::{GRAB_REBOUND_DAMAGE, MAX_FIGHTERS};
use fray_core::math::Vec2;
use fray_core::volume::{BlobKind, ClangMode, HitVolume, HurtVolume, Region};
use fray_core::FighterIndex;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// HitBits
// ---------------------------------------------------------------------------

/// Per attacker-victim pair, the mask of hit groups that already connected.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HitBits {
    rows: [[u32; MAX_FIGHTERS]; MAX_FIGHTERS],
}

impl HitBits {
    pub fn mask(&self, attacker: FighterIndex, victim: FighterIndex) -> u32 {
        self.rows[attacker][victim]
    }

    pub fn is_set(&self, attacker: FighterIndex, victim: FighterIndex, group: u8) -> bool {
        self.rows[attacker][victim] & (1 << group) != 0
    }

    pub fn set(&mut self, attacker: FighterIndex, victim: FighterIndex, group: u8) {
        self.rows[attacker][victim] |= 1 << group;
    }

    /// Let `attacker` hit everyone again.
    pub fn reset_attacker(&mut self, attacker: FighterIndex) {
        self.rows[attacker] = [0; MAX_FIGHTERS];
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

// ---------------------------------------------------------------------------
// Body
// ---------------------------------------------------------------------------

/// What resolution needs to know about a fighter besides its volumes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Body {
    pub position: Vec2,
    pub facing: i8,
    /// Selects the `can_hit_ground`/`can_hit_air` filter.
    pub grounded: bool,
    pub grabbable: bool,
}

impl Default for Body {
    fn default() -> Self {
        Self {
            position: Vec2::ZERO,
            facing: 1,
            grounded: true,
            grabbable: true,
        }
    }
}

impl Body {
    /// `other` is on the side this body faces. Equal positions count as
    /// in front.
    pub fn faces(&self, other: &Body) -> bool {
        match self.facing {
            f if f < 0 => other.position.x <= self.position.x,
            _ => other.position.x >= self.position.x,
        }
    }
}

fn facing_each_other(a: &Body, b: &Body) -> bool {
    a.faces(b) && b.faces(a)
}

// ---------------------------------------------------------------------------
// Outcome
// ---------------------------------------------------------------------------

/// A hit volume connecting with a hurt volume.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HitRecord {
    pub attacker: FighterIndex,
    pub victim: FighterIndex,
    pub hit: VolumeId,
    pub hurt: VolumeId,
    pub group: u8,
    pub damage: f32,
    pub region: Region,
}

/// Two hit volumes that clanged; at least one was cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClangRecord {
    pub first: VolumeId,
    pub second: VolumeId,
    pub first_owner: FighterIndex,
    pub second_owner: FighterIndex,
}

/// A confirmed grab.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GrabRecord {
    pub grabber: FighterIndex,
    pub victim: FighterIndex,
    /// The grabber's lowest-id grab volume touching the victim.
    pub hit: VolumeId,
}

/// Everything resolved in one tick.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CollisionOutcome {
    /// Winning damage hits, ordered by attacker, victim, then group.
    pub hits: Vec<HitRecord>,
    pub clangs: Vec<ClangRecord>,
    /// Confirmed grabs, ordered by grabber.
    pub grabs: Vec<GrabRecord>,
    /// Rebound damage per fighter; zero when no rebound applies.
    pub rebound: [f32; MAX_FIGHTERS],
}

// ---------------------------------------------------------------------------
// CollisionResolver
// ---------------------------------------------------------------------------

/// Resolves hits each tick, reusing its scratch storage.
#[derive(Debug, Clone, Default)]
pub struct CollisionResolver {
    live: Vec<VolumeId>,
    candidates: Vec<HitRecord>,
    grab_candidates: Vec<GrabRecord>,
    outcome: CollisionOutcome,
}

impl CollisionResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn outcome(&self) -> &CollisionOutcome {
        &self.outcome
    }

    /// Resolve this tick's hits. Volumes must already be posed.
    ///
    /// `bodies[i]` describes fighter `i`. Winning damage hits set their bits
    /// in `bits`; grabs leave them alone.
    pub fn resolve(
        &mut self,
        hits: &mut VolumeArena<HitVolume>,
        hurts: &VolumeArena<HurtVolume>,
        bits: &mut HitBits,
        bodies: &[Body],
        clang_threshold: f32,
    ) -> &CollisionOutcome {
        self.outcome.hits.clear();
        self.outcome.clangs.clear();
        self.outcome.grabs.clear();
        self.outcome.rebound = [0.0; MAX_FIGHTERS];

        self.resolve_clangs(hits, bodies, clang_threshold);
        self.collect_candidates(hits, hurts, bits, bodies);
        self.arbitrate(bits);
        self.resolve_grabs(bodies);
        &self.outcome
    }

    fn resolve_clangs(
        &mut self,
        hits: &mut VolumeArena<HitVolume>,
        bodies: &[Body],
        threshold: f32,
    ) {
        self.live.clear();
        self.live
            .extend(hits.iter().filter(|(_, h)| h.posed).map(|(id, _)| id));
        self.live.sort_by_key(|id| id.order_key());

        for i in 0..self.live.len() {
            for j in (i + 1)..self.live.len() {
                let (first, second) = (self.live[i], self.live[j]);
                let (Some(a), Some(b)) = (hits.get(first), hits.get(second)) else {
                    continue;
                };
                if a.owner == b.owner || a.def.kind != b.def.kind {
                    continue;
                }
                let (cancel_first, cancel_second) = match a.def.kind {
                    BlobKind::Damage => {
                        if !clangs(a.def.clang_mode) || !clangs(b.def.clang_mode) {
                            continue;
                        }
                        if !a.shape.intersects(&b.shape) {
                            continue;
                        }
                        let diff = a.def.damage - b.def.damage;
                        if diff.abs() < threshold {
                            for h in [a, b] {
                                if h.def.clang_mode == ClangMode::Ground {
                                    let r = &mut self.outcome.rebound[h.owner];
                                    *r = r.max(h.def.damage);
                                }
                            }
                        }
                        (diff < threshold, diff > -threshold)
                    }
                    BlobKind::Grab => {
                        let (body_a, body_b) = (body(bodies, a.owner), body(bodies, b.owner));
                        if !facing_each_other(&body_a, &body_b) || !a.shape.intersects(&b.shape) {
                            continue;
                        }
                        for owner in [a.owner, b.owner] {
                            let r = &mut self.outcome.rebound[owner];
                            *r = r.max(GRAB_REBOUND_DAMAGE);
                        }
                        (true, true)
                    }
                };
                let (first_owner, second_owner) = (a.owner, b.owner);

                if cancel_first {
                    if let Some(h) = hits.get_mut(first) {
                        h.cancelled = true;
                    }
                }
                if cancel_second {
                    if let Some(h) = hits.get_mut(second) {
                        h.cancelled = true;
                    }
                }
                if cancel_first || cancel_second {
                    self.outcome.clangs.push(ClangRecord {
                        first,
                        second,
                        first_owner,
                        second_owner,
                    });
                }
            }
        }
    }

    fn collect_candidates(
        &mut self,
        hits: &VolumeArena<HitVolume>,
        hurts: &VolumeArena<HurtVolume>,
        bits: &HitBits,
        bodies: &[Body],
    ) {
        self.candidates.clear();
        self.grab_candidates.clear();
        for (hit_id, hit) in hits.iter() {
            if !hit.posed || hit.cancelled {
                continue;
            }
            let attacker = body(bodies, hit.owner);
            for (hurt_id, hurt) in hurts.iter() {
                if !hurt.posed || hurt.intangible || hurt.owner == hit.owner {
                    continue;
                }
                let victim = body(bodies, hurt.owner);
                if victim.grounded && !hit.def.can_hit_ground {
                    continue;
                }
                if !victim.grounded && !hit.def.can_hit_air {
                    continue;
                }
                if bits.is_set(hit.owner, hurt.owner, hit.def.group) {
                    continue;
                }
                if hit.def.kind == BlobKind::Grab && (!victim.grabbable || !attacker.faces(&victim)) {
                    continue;
                }
                if !hit.shape.intersects(&hurt.shape) {
                    continue;
                }
                if hit.def.kind == BlobKind::Grab {
                    self.grab_candidates.push(GrabRecord {
                        grabber: hit.owner,
                        victim: hurt.owner,
                        hit: hit_id,
                    });
                    continue;
                }
                self.candidates.push(HitRecord {
                    attacker: hit.owner,
                    victim: hurt.owner,
                    hit: hit_id,
                    hurt: hurt_id,
                    group: hit.def.group,
                    damage: hit.def.damage,
                    region: hurt.def.region,
                });
            }
        }
    }

    fn arbitrate(&mut self, bits: &mut HitBits) {
        self.candidates.sort_by(|a, b| {
            (a.attacker, a.victim, a.group)
                .cmp(&(b.attacker, b.victim, b.group))
                .then(b.damage.total_cmp(&a.damage))
                .then(a.hit.order_key().cmp(&b.hit.order_key()))
                .then(a.region.cmp(&b.region))
                .then(a.hurt.order_key().cmp(&b.hurt.order_key()))
        });

        let mut last = None;
        for c in &self.candidates {
            let key = (c.attacker, c.victim, c.group);
            if last == Some(key) {
                continue;
            }
            last = Some(key);
            bits.set(c.attacker, c.victim, c.group);
            self.outcome.rebound[c.victim] = 0.0;
            self.outcome.hits.push(*c);
        }
    }

    fn resolve_grabs(&mut self, bodies: &[Body]) {
        if self.grab_candidates.is_empty() {
            return;
        }
        let mut hit_by_attack = [false; MAX_FIGHTERS];
        for h in &self.outcome.hits {
            hit_by_attack[h.victim] = true;
        }

        // Closest victim per grabber; equal distances go to the lower index.
        self.grab_candidates
            .sort_by_key(|g| (g.grabber, g.victim, g.hit.order_key()));
        let mut closest: [Option<GrabRecord>; MAX_FIGHTERS] = [None; MAX_FIGHTERS];
        for g in &self.grab_candidates {
            if hit_by_attack[g.grabber] || hit_by_attack[g.victim] {
                continue;
            }
            let from = body(bodies, g.grabber).position;
            let distance = |victim| from.distance_squared(body(bodies, victim).position);
            let best = &mut closest[g.grabber];
            if best.map_or(true, |b| distance(g.victim) < distance(b.victim)) {
                *best = Some(*g);
            }
        }

        let mut targets = closest.map(|g| g.map(|g| g.victim));
        let mut confirmed = [false; MAX_FIGHTERS];
        loop {
            let mut confirmed_some = false;
            for grabber in 0..MAX_FIGHTERS {
                let Some(victim) = targets[grabber] else {
                    continue;
                };
                if confirmed[grabber] || targets.contains(&Some(grabber)) {
                    continue;
                }
                for (other, target) in targets.iter_mut().enumerate() {
                    if other != grabber && *target == Some(victim) {
                        *target = None;
                    }
                }
                targets[victim] = None;
                confirmed[grabber] = true;
                confirmed_some = true;
            }
            let settled = targets
                .iter()
                .zip(confirmed)
                .all(|(target, done)| target.is_some() == done);
            if settled || !confirmed_some {
                break;
            }
        }

        for grabber in 0..MAX_FIGHTERS {
            let (Some(_), Some(record)) = (targets[grabber], closest[grabber]) else {
                continue;
            };
            if confirmed[grabber] {
                self.outcome.grabs.push(record);
            } else {
                self.outcome.rebound[grabber] = GRAB_REBOUND_DAMAGE;
            }
        }
    }
}

fn body(bodies: &[Body], fighter: FighterIndex) -> Body {
    bodies.get(fighter).copied().unwrap_or_default()
}

fn clangs(mode: ClangMode) -> bool {
    !matches!(mode, ClangMode::Ignore | ClangMode::Air)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use fray_core::action::ActionKind;
    use fray_core::math::{Affine3A, Vec3};
    use fray_core::volume::{HitVolumeDef, HurtVolumeDef};

    struct World {
        hits: VolumeArena<HitVolume>,
        hurts: VolumeArena<HurtVolume>,
        bits: HitBits,
        bodies: [Body; 4],
        resolver: CollisionResolver,
    }

    impl World {
        fn new() -> Self {
            Self {
                hits: VolumeArena::with_capacity(16),
                hurts: VolumeArena::with_capacity(16),
                bits: HitBits::default(),
                bodies: [Body::default(); 4],
                resolver: CollisionResolver::new(),
            }
        }

        fn stand(&mut self, fighter: FighterIndex, x: f32, facing: i8) {
            self.bodies[fighter].position = Vec2::new(x, 0.0);
            self.bodies[fighter].facing = facing;
        }

        fn grab(&mut self, owner: FighterIndex, x: f32, y: f32) -> VolumeId {
            let def = HitVolumeDef {
                origin: Vec3::new(x, y, 0.0),
                radius: 0.3,
                kind: BlobKind::Grab,
                ..HitVolumeDef::default()
            };
            let mut h = HitVolume::new("grab", owner, ActionKind::Grab, def);
            h.update_shape(&Affine3A::IDENTITY, &[]);
            self.hits.insert(h)
        }

        fn hit(&mut self, owner: FighterIndex, x: f32, group: u8, damage: f32) -> VolumeId {
            self.hit_with(owner, x, group, damage, ClangMode::Ground)
        }

        fn hit_with(
            &mut self,
            owner: FighterIndex,
            x: f32,
            group: u8,
            damage: f32,
            clang_mode: ClangMode,
        ) -> VolumeId {
            let def = HitVolumeDef {
                origin: Vec3::new(x, 1.0, 0.0),
                radius: 0.5,
                group,
                damage,
                clang_mode,
                ..HitVolumeDef::default()
            };
            let mut h = HitVolume::new("h", owner, ActionKind::NeutralFirst, def);
            h.update_shape(&Affine3A::IDENTITY, &[]);
            self.hits.insert(h)
        }

        fn hurt(&mut self, owner: FighterIndex, x: f32, region: Region) -> VolumeId {
            let def = HurtVolumeDef {
                origin_a: Vec3::new(x, 0.5, 0.0),
                origin_b: Vec3::new(x, 1.5, 0.0),
                radius: 0.5,
                region,
                ..HurtVolumeDef::default()
            };
            let mut h = HurtVolume::new("u", owner, def);
            h.update_shape(&Affine3A::IDENTITY, &[]);
            self.hurts.insert(h)
        }

        fn resolve(&mut self) -> CollisionOutcome {
            self.resolver
                .resolve(&mut self.hits, &self.hurts, &mut self.bits, &self.bodies, 9.0)
                .clone()
        }
    }

    // -- 1. Arbitration -----------------------------------------------------

    #[test]
    fn highest_damage_in_group_wins() {
        let mut w = World::new();
        w.hit(0, 1.0, 0, 10.0);
        let strong = w.hit(0, 1.2, 0, 15.0);
        w.hurt(1, 1.0, Region::Middle);

        let out = w.resolve();
        assert_eq!(out.hits.len(), 1);
        assert_eq!(out.hits[0].hit, strong);
        assert_eq!(out.hits[0].damage, 15.0);
        assert!(w.bits.is_set(0, 1, 0));
    }

    #[test]
    fn each_group_hits_once() {
        let mut w = World::new();
        w.hit(0, 1.0, 0, 5.0);
        w.hit(0, 1.0, 3, 6.0);
        w.hurt(1, 1.0, Region::Middle);

        assert_eq!(w.resolve().hits.len(), 2);
        assert!(w.resolve().hits.is_empty(), "bits block repeats");
        w.bits.reset_attacker(0);
        assert_eq!(w.resolve().hits.len(), 2);
    }

    #[test]
    fn tie_prefers_lowest_region() {
        let mut w = World::new();
        w.hit(0, 1.0, 0, 5.0);
        w.hurt(1, 1.0, Region::Upper);
        w.hurt(1, 1.0, Region::Lower);
        let out = w.resolve();
        assert_eq!(out.hits.len(), 1);
        assert_eq!(out.hits[0].region, Region::Lower);
    }

    #[test]
    fn own_and_intangible_volumes_ignored() {
        let mut w = World::new();
        w.hit(0, 1.0, 0, 5.0);
        w.hurt(0, 1.0, Region::Middle);
        let id = w.hurt(1, 1.0, Region::Middle);
        w.hurts.get_mut(id).unwrap().intangible = true;
        assert!(w.resolve().hits.is_empty());
    }

    #[test]
    fn air_only_volume_skips_grounded_victim() {
        let mut w = World::new();
        let id = w.hit(0, 1.0, 0, 5.0);
        w.hits.get_mut(id).unwrap().def.can_hit_ground = false;
        w.hurt(1, 1.0, Region::Middle);
        assert!(w.resolve().hits.is_empty());
    }

    // -- 2. Clang -----------------------------------------------------------

    #[test]
    fn close_trade_cancels_both_and_rebounds() {
        let mut w = World::new();
        w.hit(0, 0.0, 0, 10.0);
        w.hit(1, 0.5, 0, 12.0);
        w.hurt(1, 0.0, Region::Middle);
        w.hurt(0, 0.5, Region::Middle);

        let out = w.resolve();
        assert_eq!(out.clangs.len(), 1);
        assert!(out.hits.is_empty());
        assert_eq!(out.rebound[0], 10.0);
        assert_eq!(out.rebound[1], 12.0);
    }

    #[test]
    fn much_stronger_attack_goes_through() {
        let mut w = World::new();
        w.hit(0, 0.0, 0, 20.0);
        w.hit(1, 0.5, 0, 5.0);
        w.hurt(1, 0.0, Region::Middle);

        let out = w.resolve();
        assert_eq!(out.clangs.len(), 1);
        assert_eq!(out.hits.len(), 1);
        assert_eq!(out.hits[0].attacker, 0);
        assert_eq!(out.rebound, [0.0; MAX_FIGHTERS]);
    }

    #[test]
    fn aerial_volumes_never_clang() {
        let mut w = World::new();
        w.hit_with(0, 0.0, 0, 10.0, ClangMode::Air);
        w.hit(1, 0.5, 0, 10.0);
        let out = w.resolve();
        assert!(out.clangs.is_empty());
    }

    #[test]
    fn being_hit_clears_rebound() {
        let mut w = World::new();
        w.hit(0, 0.0, 0, 10.0);
        w.hit(1, 0.5, 0, 12.0);
        // A third fighter hits fighter 0.
        w.hit_with(2, 3.0, 0, 4.0, ClangMode::Ignore);
        w.hurt(0, 3.0, Region::Middle);

        let out = w.resolve();
        assert_eq!(out.rebound[0], 0.0);
        assert_eq!(out.rebound[1], 12.0);
    }

    // -- 3. Grabs -----------------------------------------------------------

    /// Fighter 0 at x=0 facing right, fighter 1 at x=1 facing left, both
    /// with a body.
    fn face_off() -> World {
        let mut w = World::new();
        w.stand(0, 0.0, 1);
        w.stand(1, 1.0, -1);
        w.hurt(0, 0.0, Region::Middle);
        w.hurt(1, 1.0, Region::Middle);
        w
    }

    #[test]
    fn grab_seizes_victim_in_front() {
        let mut w = face_off();
        let id = w.grab(0, 1.0, 1.4);
        let out = w.resolve();
        assert_eq!(
            out.grabs,
            vec![GrabRecord {
                grabber: 0,
                victim: 1,
                hit: id
            }]
        );
        assert!(out.hits.is_empty());
        assert_eq!(w.bits.mask(0, 1), 0, "grabs leave hit bits alone");
    }

    #[test]
    fn grab_misses_victim_behind_or_ungrabbable() {
        let mut w = face_off();
        w.grab(0, 1.0, 1.4);
        w.stand(0, 1.5, 1);
        assert!(w.resolve().grabs.is_empty(), "victim is behind");

        w.stand(0, 0.0, 1);
        w.bodies[1].grabbable = false;
        assert!(w.resolve().grabs.is_empty());
    }

    #[test]
    fn facing_grabs_clang_and_rebound() {
        let mut w = face_off();
        w.grab(0, 0.5, 1.0);
        w.grab(1, 0.5, 1.0);
        let out = w.resolve();
        assert_eq!(out.clangs.len(), 1);
        assert!(out.grabs.is_empty());
        assert_eq!(out.rebound[0], GRAB_REBOUND_DAMAGE);
        assert_eq!(out.rebound[1], GRAB_REBOUND_DAMAGE);
    }

    #[test]
    fn grabs_only_clang_face_to_face() {
        let mut w = face_off();
        w.stand(1, 1.0, 1);
        w.grab(0, 0.5, 1.0);
        w.grab(1, 0.5, 1.0);
        let out = w.resolve();
        assert!(out.clangs.is_empty());
        assert_eq!(out.grabs.len(), 1, "fighter 1 turned its back");
        assert_eq!(out.grabs[0].grabber, 0);
    }

    #[test]
    fn grab_ignores_damage_volumes() {
        let mut w = face_off();
        w.grab(0, 0.5, 1.0);
        w.hit_with(1, 0.5, 0, 10.0, ClangMode::Ground);
        let out = w.resolve();
        assert!(out.clangs.is_empty());
    }

    #[test]
    fn attack_beats_grab() {
        let mut w = face_off();
        w.grab(0, 1.0, 1.4);
        w.hit_with(2, 1.3, 0, 4.0, ClangMode::Ignore);
        let out = w.resolve();
        assert!(out.grabs.is_empty());
        assert_eq!(out.hits.len(), 1);
        assert_eq!(out.rebound, [0.0; MAX_FIGHTERS]);
    }

    #[test]
    fn circular_grabs_rebound() {
        let mut w = face_off();
        w.grab(0, 1.0, 1.4);
        w.grab(1, 0.0, 0.6);
        let out = w.resolve();
        assert!(out.clangs.is_empty(), "volumes do not touch");
        assert!(out.grabs.is_empty());
        assert_eq!(out.rebound[0], GRAB_REBOUND_DAMAGE);
        assert_eq!(out.rebound[1], GRAB_REBOUND_DAMAGE);
    }

    #[test]
    fn contested_victim_goes_to_lower_index() {
        let mut w = face_off();
        w.stand(2, 2.0, -1);
        w.grab(0, 1.0, 1.4);
        w.grab(2, 1.0, 0.6);
        let out = w.resolve();
        assert_eq!(out.grabs.len(), 1);
        assert_eq!((out.grabs[0].grabber, out.grabs[0].victim), (0, 1));
        assert_eq!(out.rebound[2], 0.0, "losing a contest is not circular");
    }

    #[test]
    fn grabbed_fighter_loses_its_own_grab() {
        let mut w = face_off();
        w.stand(1, 1.0, 1);
        w.stand(2, 2.0, -1);
        w.hurt(2, 2.0, Region::Middle);
        w.grab(0, 1.0, 1.4);
        w.grab(1, 2.0, 1.4);
        let out = w.resolve();
        assert_eq!(out.grabs.len(), 1);
        assert_eq!((out.grabs[0].grabber, out.grabs[0].victim), (0, 1));
        assert_eq!(out.rebound, [0.0; MAX_FIGHTERS]);
    }

    #[test]
    fn closest_victim_is_taken() {
        let mut w = face_off();
        w.stand(2, 0.6, 1);
        w.hurt(2, 0.6, Region::Middle);
        let grab = HitVolumeDef {
            origin: Vec3::new(0.8, 1.0, 0.0),
            origin_b: Some(Vec3::new(1.2, 1.0, 0.0)),
            radius: 0.3,
            kind: BlobKind::Grab,
            ..HitVolumeDef::default()
        };
        let mut h = HitVolume::new("grab", 0, ActionKind::Grab, grab);
        h.update_shape(&Affine3A::IDENTITY, &[]);
        w.hits.insert(h);
        let out = w.resolve();
        assert_eq!(out.grabs.len(), 1);
        assert_eq!(out.grabs[0].victim, 2);
    }
}
