use serde::{Deserialize, Serialize};

/// Privilege ids granted to the gateway for a single vehicle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Privileges(Vec<u32>);

impl Privileges {
    /// Set requested for every vehicle-scoped route: 1, 4 and 6.
    pub const VEHICLE_READ: [u32; 3] = [1, 4, 6];

    pub fn vehicle_read() -> Self {
        Self(Self::VEHICLE_READ.to_vec())
    }

    pub fn as_slice(&self) -> &[u32] {
        &self.0
    }
}

impl Default for Privileges {
    fn default() -> Self {
        Self::vehicle_read()
    }
}
