//! Register and coil storage with a per-slot access policy.
//!
//! Both files are fixed-capacity and zero-initialised. The policy is decided
//! once at construction and never changes afterwards.

use serde::{Deserialize, Serialize};

/// Register capacity of the stock device map.
pub const DEFAULT_REGISTER_COUNT: u16 = 33;
/// Coil capacity of the stock device map.
pub const DEFAULT_COIL_COUNT: u16 = 44;

/// Registers the bus master may read but not write on the stock map.
pub const DEFAULT_READ_ONLY_REGISTERS: &[u16] = &[0, 1, 2, 3, 13, 28, 29];
/// Coils the bus master may read but not write on the stock map.
pub const DEFAULT_READ_ONLY_COILS: &[u16] = &[
    0, 1, 8, 20, 21, 22, 23, 24, 25, 26, 27, 28, 29, 37, 38, 39, 40, 41, 42,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Access {
    #[default]
    ReadWrite,
    ReadOnly,
}

impl Access {
    pub fn is_read_only(self) -> bool {
        self == Access::ReadOnly
    }
}

/// Build a policy table of `count` slots with the listed ids marked read-only.
///
/// Ids outside the table are ignored; configuration validation reports them.
pub fn policy_table(count: u16, read_only: &[u16]) -> Vec<Access> {
    let mut table = vec![Access::ReadWrite; count as usize];
    for &id in read_only {
        if let Some(slot) = table.get_mut(id as usize) {
            *slot = Access::ReadOnly;
        }
    }
    table
}

#[derive(Debug, Clone)]
pub struct RegisterFile {
    values: Vec<u16>,
    policy: Vec<Access>,
}

impl RegisterFile {
    pub fn new(policy: Vec<Access>) -> Self {
        Self {
            values: vec![0; policy.len()],
            policy,
        }
    }

    pub fn capacity(&self) -> usize {
        self.values.len()
    }

    pub fn access(&self, id: usize) -> Access {
        self.policy[id]
    }

    pub fn get(&self, id: usize) -> u16 {
        assert!(
            id < self.capacity(),
            "register id {id} out of range (capacity {})",
            self.capacity()
        );
        self.values[id]
    }

    pub fn set(&mut self, id: usize, value: u16) {
        assert!(
            id < self.capacity(),
            "register id {id} out of range (capacity {})",
            self.capacity()
        );
        self.values[id] = value;
    }
}

impl Default for RegisterFile {
    fn default() -> Self {
        Self::new(policy_table(
            DEFAULT_REGISTER_COUNT,
            DEFAULT_READ_ONLY_REGISTERS,
        ))
    }
}

/// Coils packed eight per byte, lowest id in bit 0.
#[derive(Debug, Clone)]
pub struct CoilFile {
    bits: Vec<u8>,
    policy: Vec<Access>,
}

impl CoilFile {
    pub fn new(policy: Vec<Access>) -> Self {
        Self {
            bits: vec![0; policy.len().div_ceil(8)],
            policy,
        }
    }

    pub fn capacity(&self) -> usize {
        self.policy.len()
    }

    pub fn access(&self, id: usize) -> Access {
        self.policy[id]
    }

    fn locate(&self, id: usize) -> (usize, u8) {
        assert!(
            id < self.capacity(),
            "coil id {id} out of range (capacity {})",
            self.capacity()
        );
        (id / 8, 1 << (id % 8))
    }

    pub fn get(&self, id: usize) -> bool {
        let (byte, mask) = self.locate(id);
        self.bits[byte] & mask != 0
    }

    pub fn write(&mut self, id: usize, on: bool) {
        let (byte, mask) = self.locate(id);
        if on {
            self.bits[byte] |= mask;
        } else {
            self.bits[byte] &= !mask;
        }
    }

    pub fn set(&mut self, id: usize) {
        self.write(id, true);
    }

    pub fn clear(&mut self, id: usize) {
        self.write(id, false);
    }

    pub fn toggle(&mut self, id: usize) {
        let (byte, mask) = self.locate(id);
        self.bits[byte] ^= mask;
    }
}

impl Default for CoilFile {
    fn default() -> Self {
        Self::new(policy_table(DEFAULT_COIL_COUNT, DEFAULT_READ_ONLY_COILS))
    }
}
