//! Health/power bookkeeping and the damage formula.

/// Health and power of one combatant. Every mutation clamps to
/// `0..=max`, so the invariant holds no matter what the caller passes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Vitals {
    health: i32,
    max_health: i32,
    power: i32,
    max_power: i32,
}

impl Vitals {
    pub fn new(health: i32, max_health: i32, power: i32, max_power: i32) -> Self {
        let max_health = max_health.max(0);
        let max_power = max_power.max(0);
        Self {
            health: health.clamp(0, max_health),
            max_health,
            power: power.clamp(0, max_power),
            max_power,
        }
    }

    pub fn health(&self) -> i32 {
        self.health
    }

    pub fn max_health(&self) -> i32 {
        self.max_health
    }

    pub fn power(&self) -> i32 {
        self.power
    }

    pub fn max_power(&self) -> i32 {
        self.max_power
    }

    pub fn is_alive(&self) -> bool {
        self.health > 0
    }

    /// Subtract up to `amount` health. Returns the health actually lost.
    pub fn take_damage(&mut self, amount: i32) -> i32 {
        let lost = amount.clamp(0, self.health);
        self.health -= lost;
        lost
    }

    /// Add up to `amount` health. Returns the health actually gained.
    pub fn heal(&mut self, amount: i32) -> i32 {
        let gained = amount.clamp(0, self.max_health - self.health);
        self.health += gained;
        gained
    }

    /// Pay `cost` power if affordable.
    pub fn spend_power(&mut self, cost: i32) -> bool {
        let cost = cost.max(0);
        if self.power < cost {
            return false;
        }
        self.power -= cost;
        true
    }

    /// Add up to `amount` power. Returns the power actually gained.
    pub fn restore_power(&mut self, amount: i32) -> i32 {
        let gained = amount.clamp(0, self.max_power - self.power);
        self.power += gained;
        gained
    }
}

/// Damage dealt by a hit: `max(1, base + floor(0.1 * attack) - floor(0.5 * defense))`.
pub fn compute_damage(base: i32, attacker_attack: i32, defender_defense: i32) -> i32 {
    let attack_bonus = (f64::from(attacker_attack) * 0.1).floor() as i32;
    let mitigation = (f64::from(defender_defense) * 0.5).floor() as i32;
    (base + attack_bonus - mitigation).max(1)
}

/// Healing of a negative-damage spell; zero for damaging spells.
pub fn heal_amount(base: i32) -> i32 {
    if base < 0 { base.saturating_abs() } else { 0 }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_clamps() {
        let v = Vitals::new(150, 100, -5, 50);
        assert_eq!(v.health(), 100);
        assert_eq!(v.power(), 0);
    }

    #[test]
    fn test_damage_never_below_zero() {
        let mut v = Vitals::new(10, 100, 0, 0);
        assert_eq!(v.take_damage(25), 10);
        assert_eq!(v.health(), 0);
        assert!(!v.is_alive());
        assert_eq!(v.take_damage(5), 0);
    }

    #[test]
    fn test_heal_capped_at_max() {
        let mut v = Vitals::new(90, 100, 0, 0);
        assert_eq!(v.heal(40), 10);
        assert_eq!(v.health(), 100);
    }

    #[test]
    fn test_negative_amounts_ignored() {
        let mut v = Vitals::new(50, 100, 20, 40);
        assert_eq!(v.take_damage(-10), 0);
        assert_eq!(v.heal(-10), 0);
        assert_eq!(v.restore_power(-3), 0);
        assert_eq!(v, Vitals::new(50, 100, 20, 40));
    }

    #[test]
    fn test_spend_power() {
        let mut v = Vitals::new(50, 100, 20, 40);
        assert!(!v.spend_power(25));
        assert_eq!(v.power(), 20);
        assert!(v.spend_power(20));
        assert_eq!(v.power(), 0);
    }

    #[test]
    fn test_restore_power_capped() {
        let mut v = Vitals::new(50, 100, 39, 40);
        assert_eq!(v.restore_power(1), 1);
        assert_eq!(v.restore_power(1), 0);
    }

    #[test]
    fn test_damage_formula() {
        // 30 + floor(2.5) - floor(4.5) = 30 + 2 - 4
        assert_eq!(compute_damage(30, 25, 9), 28);
    }

    #[test]
    fn test_damage_floor_of_one() {
        assert_eq!(compute_damage(2, 0, 100), 1);
    }

    #[test]
    fn test_heal_amount() {
        assert_eq!(heal_amount(-40), 40);
        assert_eq!(heal_amount(15), 0);
    }
}
