//! Particle types: per-slot simulation state and the fixed-capacity slot pool

use glam::Vec3;

/// Mass given to particles when the emitter does not configure one
pub const DEFAULT_MASS: f32 = 0.5;

/// Kinematic and lifecycle state of one pool slot.
///
/// The fields of an inactive record are stale and must not be read until the
/// slot is activated again, which overwrites all of them.
#[derive(Clone, Debug, PartialEq)]
pub struct ParticleRecord {
    pub position: Vec3,
    pub previous_position: Vec3,
    pub velocity: Vec3,
    pub acceleration: Vec3,
    pub mass: f32,
    /// Simulation time at which the slot was last activated
    pub timestamp: f32,
    pub lifespan: f32,
    pub active: bool,
}

impl ParticleRecord {
    /// Build an active particle at rest acceleration. Negative mass or
    /// lifespan is coerced to its absolute value.
    pub fn new(position: Vec3, velocity: Vec3, mass: f32, lifespan: f32) -> Self {
        Self {
            position,
            previous_position: position,
            velocity,
            acceleration: Vec3::ZERO,
            mass: mass.abs(),
            timestamp: 0.0,
            lifespan: lifespan.abs(),
            active: true,
        }
    }

    pub fn inactive() -> Self {
        Self {
            position: Vec3::ZERO,
            previous_position: Vec3::ZERO,
            velocity: Vec3::ZERO,
            acceleration: Vec3::ZERO,
            mass: DEFAULT_MASS,
            timestamp: 0.0,
            lifespan: 0.0,
            active: false,
        }
    }

    /// Time elapsed since activation
    pub fn age(&self, t: f32) -> f32 {
        t - self.timestamp
    }

    /// Death is inclusive: a particle is expired once its age reaches its lifespan.
    pub fn is_expired(&self, t: f32) -> bool {
        self.age(t) >= self.lifespan
    }

    /// Normalized age in [0, 1]
    pub fn age_ratio(&self, t: f32) -> f32 {
        if self.lifespan <= 0.0 {
            1.0
        } else {
            (self.age(t) / self.lifespan).clamp(0.0, 1.0)
        }
    }
}

/// Fixed-capacity particle storage with an index free-stack.
///
/// Slots are allocated once and reused for the lifetime of the pool.
/// Activation pops an index from the free stack and deactivation pushes it
/// back, both O(1). There is no compact list of active slots, so every pass
/// over live particles scans all `capacity` slots and tests the active flag.
pub struct ParticlePool {
    slots: Vec<ParticleRecord>,
    free_stack: Vec<usize>,
    /// Number of free slots, and the stack pointer into `free_stack`
    free_top: usize,
    particle_mass: f32,
}

impl ParticlePool {
    pub fn new(capacity: usize) -> Self {
        Self::with_mass(capacity, DEFAULT_MASS)
    }

    /// Create a pool whose particles all carry `mass` (absolute value taken).
    pub fn with_mass(capacity: usize, mass: f32) -> Self {
        let mut pool = Self {
            slots: vec![ParticleRecord::inactive(); capacity],
            free_stack: vec![0; capacity],
            free_top: capacity,
            particle_mass: mass.abs(),
        };
        pool.clear();
        pool
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn free_count(&self) -> usize {
        self.free_top
    }

    pub fn active_count(&self) -> usize {
        self.slots.len() - self.free_top
    }

    pub fn particle_mass(&self) -> f32 {
        self.particle_mass
    }

    /// Deactivate every slot and refill the free stack with all indices in
    /// ascending order, as at construction.
    pub fn clear(&mut self) {
        for (i, slot) in self.slots.iter_mut().enumerate() {
            slot.active = false;
            self.free_stack[i] = i;
        }
        self.free_top = self.slots.len();
    }

    pub fn reset(&mut self) {
        self.clear();
    }

    /// Pop the top free index and initialize that slot.
    ///
    /// Returns `false` without touching any slot when the pool is exhausted;
    /// the spawn request is simply dropped.
    pub fn activate(&mut self, position: Vec3, velocity: Vec3, lifespan: f32, timestamp: f32) -> bool {
        if self.free_top == 0 {
            return false;
        }
        let index = self.free_stack[self.free_top - 1];
        let slot = &mut self.slots[index];
        assert!(
            !slot.active,
            "free-list corruption: slot {index} is on the free stack but still active"
        );
        *slot = ParticleRecord::new(position, velocity, self.particle_mass, lifespan);
        slot.timestamp = timestamp;
        self.free_top -= 1;
        true
    }

    /// Return an active slot to the free stack.
    ///
    /// # Panics
    /// If the slot is already inactive; that means the free list is corrupt.
    pub fn deactivate(&mut self, index: usize) {
        let slot = &mut self.slots[index];
        assert!(slot.active, "deactivating inactive particle slot {index}");
        slot.active = false;
        self.free_stack[self.free_top] = index;
        self.free_top += 1;
    }

    pub fn is_active(&self, index: usize) -> bool {
        self.slots.get(index).is_some_and(|p| p.active)
    }

    pub fn get(&self, index: usize) -> Option<&ParticleRecord> {
        self.slots.get(index)
    }

    /// All slots, active or not, in index order
    pub fn slots(&self) -> &[ParticleRecord] {
        &self.slots
    }

    /// Active slots with their indices, in ascending index order
    pub fn iter_active(&self) -> impl Iterator<Item = (usize, &ParticleRecord)> {
        self.slots.iter().enumerate().filter(|(_, p)| p.active)
    }

    pub fn for_each_active(&self, mut visit: impl FnMut(usize, &ParticleRecord)) {
        for (i, p) in self.iter_active() {
            visit(i, p);
        }
    }

    pub fn for_each_active_mut(&mut self, mut visit: impl FnMut(usize, &mut ParticleRecord)) {
        for (i, p) in self.slots.iter_mut().enumerate() {
            if p.active {
                visit(i, p);
            }
        }
    }

    /// Deactivate every active particle whose age at `t` has reached its
    /// lifespan. Returns the number culled.
    pub fn cull_expired(&mut self, t: f32) -> usize {
        let mut culled = 0;
        for i in 0..self.slots.len() {
            if self.slots[i].active && self.slots[i].is_expired(t) {
                self.deactivate(i);
                culled += 1;
            }
        }
        culled
    }

    /// Store `gravity - (drag / mass) * velocity` as each active particle's acceleration.
    pub fn accumulate_forces(&mut self, gravity: Vec3, drag: f32) {
        self.for_each_active_mut(|_, p| {
            let force = gravity * p.mass + (-drag) * p.velocity;
            p.acceleration = force / p.mass;
        });
    }

    /// Forward Euler step. Position advances with the velocity from before
    /// this step's velocity update.
    pub fn integrate(&mut self, dt: f32) {
        self.for_each_active_mut(|_, p| {
            let velocity_before = p.velocity;
            p.previous_position = p.position;
            p.velocity += dt * p.acceleration;
            p.position += dt * velocity_before;
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spawn(pool: &mut ParticlePool, x: f32, lifespan: f32, t: f32) -> bool {
        pool.activate(Vec3::new(x, 0.0, 0.0), Vec3::ZERO, lifespan, t)
    }

    fn assert_pool_consistent(pool: &ParticlePool) {
        let active = pool.slots().iter().filter(|p| p.active).count();
        assert_eq!(active, pool.active_count());
        assert_eq!(pool.active_count() + pool.free_count(), pool.capacity());

        let mut seen = vec![false; pool.capacity()];
        for &i in &pool.free_stack[..pool.free_top] {
            assert!(!seen[i], "index {i} on the free stack twice");
            assert!(!pool.slots[i].active, "index {i} both free and active");
            seen[i] = true;
        }
    }

    #[test]
    fn new_pool_is_all_free() {
        let pool = ParticlePool::new(5);
        assert_eq!(pool.capacity(), 5);
        assert_eq!(pool.active_count(), 0);
        assert_eq!(pool.free_count(), 5);
        assert_eq!(pool.free_stack, vec![0, 1, 2, 3, 4]);
        assert_pool_consistent(&pool);
    }

    #[test]
    fn activate_pops_highest_index_first() {
        let mut pool = ParticlePool::new(3);
        assert!(spawn(&mut pool, 1.0, 1.0, 0.0));
        assert!(pool.is_active(2));
        assert!(!pool.is_active(0));

        let p = pool.get(2).unwrap();
        assert_eq!(p.previous_position, p.position);
        assert_eq!(p.acceleration, Vec3::ZERO);
        assert!((p.mass - DEFAULT_MASS).abs() < 1e-6);
    }

    #[test]
    fn exhaustion_drops_spawns() {
        let mut pool = ParticlePool::new(4);
        let granted = (0..10).filter(|&i| spawn(&mut pool, i as f32, 1.0, 0.0)).count();
        assert_eq!(granted, 4);
        assert_eq!(pool.active_count(), pool.capacity());
        assert_eq!(pool.free_count(), 0);
        assert_pool_consistent(&pool);
    }

    #[test]
    fn deactivated_slot_is_reused() {
        let mut pool = ParticlePool::new(4);
        for i in 0..4 {
            spawn(&mut pool, i as f32, 1.0, 0.0);
        }
        pool.deactivate(1);
        assert_eq!(pool.free_count(), 1);
        assert!(spawn(&mut pool, 42.0, 1.0, 0.5));
        assert!(pool.is_active(1));
        assert!((pool.get(1).unwrap().position.x - 42.0).abs() < 1e-6);
        assert!((pool.get(1).unwrap().timestamp - 0.5).abs() < 1e-6);
        assert_pool_consistent(&pool);
    }

    #[test]
    fn invariant_holds_over_mixed_sequence() {
        let mut pool = ParticlePool::new(16);
        let mut state = 7u32;
        for step in 0..2000 {
            state = state.wrapping_mul(1_103_515_245).wrapping_add(12_345);
            if state % 3 == 0 {
                let active: Vec<usize> = pool.iter_active().map(|(i, _)| i).collect();
                if !active.is_empty() {
                    pool.deactivate(active[(state as usize / 3) % active.len()]);
                }
            } else {
                spawn(&mut pool, step as f32, 1.0, 0.0);
            }
            assert_pool_consistent(&pool);
        }
    }

    #[test]
    fn clear_restores_initial_state() {
        let mut pool = ParticlePool::new(6);
        for i in 0..4 {
            spawn(&mut pool, i as f32, 1.0, 0.0);
        }
        pool.deactivate(3);
        pool.clear();
        assert_eq!(pool.active_count(), 0);
        assert_eq!(pool.free_stack, vec![0, 1, 2, 3, 4, 5]);
        assert_pool_consistent(&pool);
    }

    #[test]
    #[should_panic(expected = "deactivating inactive")]
    fn double_deactivate_panics() {
        let mut pool = ParticlePool::new(2);
        spawn(&mut pool, 0.0, 1.0, 0.0);
        pool.deactivate(1);
        pool.deactivate(1);
    }

    #[test]
    #[should_panic(expected = "free-list corruption")]
    fn activating_live_slot_panics() {
        let mut pool = ParticlePool::new(3);
        assert!(spawn(&mut pool, 0.0, 1.0, 0.0));
        assert!(pool.is_active(2));
        // Make the next free entry point at the live slot
        let top = pool.free_top - 1;
        pool.free_stack[top] = 2;
        spawn(&mut pool, 1.0, 1.0, 0.0);
    }

    #[test]
    fn negative_mass_and_lifespan_are_coerced() {
        let p = ParticleRecord::new(Vec3::ZERO, Vec3::ZERO, -2.0, -3.0);
        assert!((p.mass - 2.0).abs() < 1e-6);
        assert!((p.lifespan - 3.0).abs() < 1e-6);

        let mut pool = ParticlePool::with_mass(1, -1.5);
        pool.activate(Vec3::ZERO, Vec3::ZERO, -0.25, 0.0);
        let p = pool.get(0).unwrap();
        assert!((p.mass - 1.5).abs() < 1e-6);
        assert!((p.lifespan - 0.25).abs() < 1e-6);
    }

    #[test]
    fn death_boundary_is_inclusive() {
        let mut pool = ParticlePool::new(1);
        spawn(&mut pool, 0.0, 1.0, 2.0);

        assert_eq!(pool.cull_expired(2.999), 0);
        assert!(pool.is_active(0));

        assert_eq!(pool.cull_expired(3.0), 1);
        assert!(!pool.is_active(0));
        assert_pool_consistent(&pool);
    }

    #[test]
    fn forces_combine_gravity_and_drag() {
        let mut pool = ParticlePool::with_mass(1, 2.0);
        pool.activate(Vec3::ZERO, Vec3::new(4.0, 0.0, -2.0), 1.0, 0.0);
        pool.accumulate_forces(Vec3::new(0.0, -9.8, 0.0), 0.5);

        let a = pool.get(0).unwrap().acceleration;
        // gravity - (drag / mass) * velocity
        assert!((a.x - -1.0).abs() < 1e-6);
        assert!((a.y - -9.8).abs() < 1e-6);
        assert!((a.z - 0.5).abs() < 1e-6);
    }

    #[test]
    fn euler_three_step_trace() {
        let mut pool = ParticlePool::with_mass(1, 1.0);
        pool.activate(Vec3::ZERO, Vec3::ZERO, 10.0, 0.0);
        let gravity = Vec3::new(0.0, -9.8, 0.0);

        let expected = [
            // (previous y, y, vy) after each step
            (0.0, 0.0, -0.98),
            (0.0, -0.098, -1.96),
            (-0.098, -0.294, -2.94),
        ];
        for (prev_y, y, vy) in expected {
            pool.accumulate_forces(gravity, 0.0);
            pool.integrate(0.1);
            let p = pool.get(0).unwrap();
            assert!((p.previous_position.y - prev_y).abs() < 1e-5);
            assert!((p.position.y - y).abs() < 1e-5);
            assert!((p.velocity.y - vy).abs() < 1e-5);
            assert!(p.position.x.abs() < 1e-6 && p.position.z.abs() < 1e-6);
        }
    }

    #[test]
    fn free_fall_matches_closed_form() {
        let mut pool = ParticlePool::with_mass(1, 1.0);
        pool.activate(Vec3::ZERO, Vec3::ZERO, 10.0, 0.0);
        let gravity = Vec3::new(0.0, -9.8, 0.0);
        let dt = 0.001;
        for _ in 0..1000 {
            pool.accumulate_forces(gravity, 0.0);
            pool.integrate(dt);
        }
        let y = pool.get(0).unwrap().position.y;
        let exact = -0.5 * 9.8 * 1.0 * 1.0;
        assert!((y - exact).abs() < 0.01, "y = {y}, exact = {exact}");
    }

    #[test]
    fn inactive_slots_are_not_integrated() {
        let mut pool = ParticlePool::new(2);
        spawn(&mut pool, 0.0, 1.0, 0.0);
        pool.deactivate(1);
        let before = pool.get(1).unwrap().clone();
        pool.accumulate_forces(Vec3::new(0.0, -9.8, 0.0), 0.0);
        pool.integrate(0.1);
        assert_eq!(pool.get(1).unwrap(), &before);
    }
}
