use serde::{Deserialize, Serialize};

/**
 * Small interface that provides access to the physical location information about a cluster.
 * All values should be defaulted to -1 if unavailable.  ReadGroup and Tile should only allow
 * non-zero positive integers, x and y coordinates may be negative.
 */
pub(crate) trait PhysicalLocation {
    const NO_VALUE: i32 = -1;

    fn get_read_group(&self) -> i16;

    fn set_read_group(&mut self, read_group: i16);

    fn get_tile(&self) -> i16;

    fn set_tile(&mut self, tile: i16);

    fn get_x(&self) -> i32;

    fn set_x(&mut self, x: i32);

    fn get_y(&self) -> i32;

    fn set_y(&mut self, y: i32);

    /** Default implementation of a method to check whether real location data has been set. */
    fn has_location(&self) -> bool {
        self.get_tile() as i32 != Self::NO_VALUE
    }
}

/// Read group, tile and x/y of a cluster. x and y are ints so they do not overflow within a
/// patterned-flowcell tile.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct PhysicalLocationInt {
    pub(crate) read_group: i16,
    pub(crate) tile: i16,
    pub(crate) x: i32,
    pub(crate) y: i32,
}

impl Default for PhysicalLocationInt {
    fn default() -> Self {
        Self {
            read_group: -1,
            tile: -1,
            x: -1,
            y: -1,
        }
    }
}

macro_rules! impl_physical_location_core {
    ($self:ident, $pl:expr) => {
        fn get_read_group(&$self) -> i16 {
            $pl.read_group
        }

        fn set_read_group(&mut $self, read_group: i16) {
            $pl.read_group = read_group;
        }

        fn get_tile(&$self) -> i16 {
            $pl.tile
        }

        fn set_tile(&mut $self, tile: i16) {
            $pl.tile = tile;
        }

        fn get_x(&$self) -> i32 {
            $pl.x
        }

        fn set_x(&mut $self, x: i32) {
            $pl.x = x;
        }

        fn get_y(&$self) -> i32 {
            $pl.y
        }

        fn set_y(&mut $self, y: i32) {
            $pl.y = y;
        }
    };
}

pub(crate) use impl_physical_location_core;

impl PhysicalLocation for PhysicalLocationInt {
    impl_physical_location_core!(self, self);
}
